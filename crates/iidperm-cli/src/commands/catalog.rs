use iidperm_tests::TestId;

use super::run::EXIT_OK;

pub fn run(json: bool) -> i32 {
    if json {
        let entries: Vec<serde_json::Value> = TestId::ALL
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id(),
                    "name": t.name(),
                    "pretty_name": t.pretty_name(),
                    "uses_lag": t.uses_lag(),
                    "integer_valued": t.is_integer(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize test list: {e}");
                return super::run::EXIT_FAILED_ANALYSIS;
            }
        }
        return EXIT_OK;
    }

    println!("{:>3}  {:<24} {:<44} Lag", "Id", "Name", "Statistic");
    println!("{}", "-".repeat(78));
    for t in TestId::ALL {
        println!(
            "{:>3}  {:<24} {:<44} {}",
            t.id(),
            t.name(),
            t.pretty_name(),
            if t.uses_lag() { "yes" } else { "" }
        );
    }
    EXIT_OK
}
