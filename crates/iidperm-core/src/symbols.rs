//! Symbol reader: slices a binary file into fixed-width symbols.
//!
//! Symbols are unpacked most significant bits first, so with the default
//! 4-bit width the byte `0xA7` yields the symbols `10, 7`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IidError, Result};

/// Chunk size used when streaming whole files.
pub const DEFAULT_CHUNK_LEN: usize = 1 << 20;

/// Number of bits per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SymbolWidth {
    One,
    Two,
    #[default]
    Four,
    Eight,
}

impl SymbolWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Number of distinct symbol values, `2^bits`.
    pub fn alphabet_size(self) -> usize {
        1 << self.bits()
    }

    pub fn symbols_per_byte(self) -> usize {
        (8 / self.bits()) as usize
    }

    /// Bytes needed to hold `n_symbols` symbols.
    pub fn bytes_for(self, n_symbols: usize) -> usize {
        n_symbols.div_ceil(self.symbols_per_byte())
    }
}

impl TryFrom<u8> for SymbolWidth {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(format!("symbol width must be 1, 2, 4 or 8 bits, got {other}")),
        }
    }
}

impl From<SymbolWidth> for u8 {
    fn from(width: SymbolWidth) -> u8 {
        width.bits() as u8
    }
}

/// Which end of the file a sequence is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPosition {
    #[default]
    First,
    Last,
}

/// Unpack bytes into symbols, most significant bits first.
pub fn symbols_from_bytes(bytes: &[u8], width: SymbolWidth) -> Vec<u8> {
    let bits = width.bits();
    let per_byte = width.symbols_per_byte();
    let mask = ((1u16 << bits) - 1) as u8;
    let mut symbols = Vec::with_capacity(bytes.len() * per_byte);
    for &byte in bytes {
        for k in (0..per_byte as u32).rev() {
            symbols.push((byte >> (k * bits)) & mask);
        }
    }
    symbols
}

/// Read exactly `n_symbols` symbols from the start or the end of a file.
pub fn read_sequence(
    path: &Path,
    n_symbols: usize,
    width: SymbolWidth,
    position: ReadPosition,
) -> Result<Vec<u8>> {
    let needed = width.bytes_for(n_symbols);
    let mut file = File::open(path).map_err(|e| IidError::io(path, e))?;
    let available = file.metadata().map_err(|e| IidError::io(path, e))?.len();
    if available < needed as u64 {
        return Err(IidError::InsufficientData {
            path: path.to_path_buf(),
            needed: needed as u64,
            available,
        });
    }
    if position == ReadPosition::Last {
        file.seek(SeekFrom::End(-(needed as i64)))
            .map_err(|e| IidError::io(path, e))?;
    }
    let mut buf = vec![0u8; needed];
    file.read_exact(&mut buf).map_err(|e| IidError::io(path, e))?;

    let mut symbols = symbols_from_bytes(&buf, width);
    match position {
        ReadPosition::First => symbols.truncate(n_symbols),
        ReadPosition::Last => {
            let extra = symbols.len() - n_symbols;
            symbols.drain(..extra);
        }
    }
    log::debug!(
        "read {} symbols ({}-bit) from {}",
        symbols.len(),
        width.bits(),
        path.display()
    );
    Ok(symbols)
}

/// Stream a file in chunks, handing each decoded chunk to `f`.
pub fn for_each_symbol_chunk<F>(path: &Path, width: SymbolWidth, mut f: F) -> Result<()>
where
    F: FnMut(&[u8]),
{
    let mut file = File::open(path).map_err(|e| IidError::io(path, e))?;
    let mut buf = vec![0u8; DEFAULT_CHUNK_LEN];
    loop {
        let n = file.read(&mut buf).map_err(|e| IidError::io(path, e))?;
        if n == 0 {
            break;
        }
        f(&symbols_from_bytes(&buf[..n], width));
    }
    Ok(())
}

/// Occurrences of every symbol value in a whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCounts {
    /// Indexed by symbol value, `alphabet_size` entries.
    pub counts: Vec<u64>,
    pub total: u64,
}

/// Count symbol occurrences over a whole file, streamed in chunks.
pub fn count_symbol_occurrences(path: &Path, width: SymbolWidth) -> Result<SymbolCounts> {
    let mut counts = vec![0u64; width.alphabet_size()];
    let mut total = 0u64;
    for_each_symbol_chunk(path, width, |chunk| {
        for &s in chunk {
            counts[s as usize] += 1;
        }
        total += chunk.len() as u64;
    })?;
    log::debug!("counted {total} symbols in {}", path.display());
    Ok(SymbolCounts { counts, total })
}
