//! Fisher-Yates shuffle.

use rand::Rng;

/// Shuffle `seq` in place with the Fisher-Yates algorithm.
///
/// For `i` from `len - 1` down to `1`, swaps `seq[i]` with `seq[j]` for a
/// uniform `j` in `[0, i]`. Every permutation is equally likely as long as
/// `rng` is uniform.
pub fn fisher_yates<T, R: Rng + ?Sized>(seq: &mut [T], rng: &mut R) {
    for i in (1..seq.len()).rev() {
        let j = rng.random_range(0..=i);
        seq.swap(i, j);
    }
}

/// Shuffled private copy of `seq`; the input is left untouched.
pub fn shuffled_copy<R: Rng + ?Sized>(seq: &[u8], rng: &mut R) -> Vec<u8> {
    let mut copy = seq.to_vec();
    fisher_yates(&mut copy, rng);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use statrs::distribution::{ChiSquared, ContinuousCDF};

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let original: Vec<u8> = (0..50).collect();
        let shuffled = shuffled_copy(&original, &mut rng);
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
        assert_eq!(original, (0..50).collect::<Vec<u8>>());
    }

    #[test]
    fn test_shuffle_trivial_lengths() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: [u8; 0] = [];
        fisher_yates(&mut empty, &mut rng);
        let mut one = [9u8];
        fisher_yates(&mut one, &mut rng);
        assert_eq!(one, [9]);
    }

    #[test]
    fn test_shuffle_position_uniformity() {
        // Each of the 5 elements should land in each of the 5 positions with
        // probability 1/5. Chi-square over the 25 cells, 16 degrees of freedom.
        const N: usize = 5;
        const TRIALS: usize = 50_000;
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = [[0u64; N]; N];
        let base: Vec<u8> = (0..N as u8).collect();
        for _ in 0..TRIALS {
            let s = shuffled_copy(&base, &mut rng);
            for (pos, &v) in s.iter().enumerate() {
                counts[v as usize][pos] += 1;
            }
        }
        let expected = TRIALS as f64 / N as f64;
        let chi2: f64 = counts
            .iter()
            .flatten()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();
        let df = ((N - 1) * (N - 1)) as f64;
        let p = ChiSquared::new(df).unwrap().sf(chi2);
        assert!(p > 1e-4, "chi2={chi2:.2}, p={p:.6}");
    }

    #[test]
    fn test_shuffle_all_permutations_reachable() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            seen.insert(shuffled_copy(&[0, 1, 2, 3], &mut rng));
        }
        assert_eq!(seen.len(), 24);
    }
}
