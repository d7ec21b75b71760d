//! Balanced ternary helpers for tryte encoded ledger data.
//!
//! A tryte is one character of the alphabet `9ABCDEFGHIJKLMNOPQRSTUVWXYZ`
//! and packs three balanced trits (`-1`, `0`, `1`), least significant first.

use thiserror::Error;

/// A single balanced ternary digit.
pub type Trit = i8;

pub const TRITS_PER_TRYTE: usize = 3;

/// Tryte alphabet, indexed by the unsigned tryte value `0..27`.
pub const TRYTE_ALPHABET: &[u8; 27] = b"9ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TernaryError {
    #[error("invalid tryte {found:?} at position {position}")]
    InvalidTryte { position: usize, found: char },
}

/// Returns true if every character of `s` belongs to the tryte alphabet.
pub fn is_trytes(s: &str) -> bool {
    s.bytes().all(|b| b == b'9' || b.is_ascii_uppercase())
}

fn tryte_value(tryte: u8) -> Option<i8> {
    match tryte {
        b'9' => Some(0),
        b'A'..=b'M' => Some((tryte - b'A') as i8 + 1),
        b'N'..=b'Z' => Some((tryte - b'N') as i8 - 13),
        _ => None,
    }
}

fn value_to_tryte(value: i8) -> u8 {
    let index = if value < 0 { value + 27 } else { value };
    TRYTE_ALPHABET[index as usize]
}

/// Splits `value` into balanced trits, least significant first.
/// Bits that do not fit into `len` trits are dropped.
pub fn int_to_trits(value: i64, len: usize) -> Vec<Trit> {
    let mut trits = vec![0; len];
    let mut rest = value;
    for trit in &mut trits {
        let mut remainder = (rest % 3) as i8;
        rest /= 3;
        if remainder > 1 {
            remainder -= 3;
            rest += 1;
        } else if remainder < -1 {
            remainder += 3;
            rest -= 1;
        }
        *trit = remainder;
    }
    trits
}

pub fn trits_to_int(trits: &[Trit]) -> i64 {
    trits
        .iter()
        .rev()
        .fold(0i64, |acc, trit| acc * 3 + i64::from(*trit))
}

pub fn trytes_to_trits(trytes: &str) -> Result<Vec<Trit>, TernaryError> {
    let mut trits = Vec::with_capacity(trytes.len() * TRITS_PER_TRYTE);
    for (position, tryte) in trytes.bytes().enumerate() {
        let value = tryte_value(tryte).ok_or(TernaryError::InvalidTryte {
            position,
            found: char::from(tryte),
        })?;
        trits.extend(int_to_trits(i64::from(value), TRITS_PER_TRYTE));
    }
    Ok(trits)
}

/// Packs trits back into trytes. A trailing group shorter than three trits
/// is padded with zeros.
pub fn trits_to_trytes(trits: &[Trit]) -> String {
    trits
        .chunks(TRITS_PER_TRYTE)
        .map(|chunk| char::from(value_to_tryte(trits_to_int(chunk) as i8)))
        .collect()
}
