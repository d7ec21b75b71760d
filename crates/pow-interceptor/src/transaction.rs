//! Wire layout of a single ledger transaction and the subset of it the
//! interceptor decodes for bundle telemetry.

use std::ops::Range;

use thiserror::Error;

use crate::ternary::{
    TRITS_PER_TRYTE,
    TernaryError,
    is_trytes,
    trits_to_int,
    trytes_to_trits,
};

/// Number of trytes in a serialized transaction.
pub const TRANSACTION_TRYTES: usize = 2673;
/// Number of trits in a serialized transaction.
pub const TRANSACTION_TRITS: usize = TRANSACTION_TRYTES * TRITS_PER_TRYTE;
/// Number of trytes in an address, bundle or transaction hash.
pub const HASH_TRYTES: usize = 81;

/// Only the low 33 trits of the value field may be used.
const VALUE_USED_TRYTES: usize = 11;

/// Tryte offsets of every field in a serialized transaction.
pub mod layout {
    use std::ops::Range;

    pub const SIGNATURE_MESSAGE_FRAGMENT: Range<usize> = 0..2187;
    pub const ADDRESS: Range<usize> = 2187..2268;
    pub const VALUE: Range<usize> = 2268..2295;
    pub const OBSOLETE_TAG: Range<usize> = 2295..2322;
    pub const TIMESTAMP: Range<usize> = 2322..2331;
    pub const CURRENT_INDEX: Range<usize> = 2331..2340;
    pub const LAST_INDEX: Range<usize> = 2340..2349;
    pub const BUNDLE: Range<usize> = 2349..2430;
    pub const TRUNK: Range<usize> = 2430..2511;
    pub const BRANCH: Range<usize> = 2511..2592;
    pub const TAG: Range<usize> = 2592..2619;
    pub const ATTACHMENT_TIMESTAMP: Range<usize> = 2619..2628;
    pub const ATTACHMENT_TIMESTAMP_LOWER_BOUND: Range<usize> = 2628..2637;
    pub const ATTACHMENT_TIMESTAMP_UPPER_BOUND: Range<usize> = 2637..2646;
    pub const NONCE: Range<usize> = 2646..2673;
}

/// Converts a tryte range of the layout into the matching trit range.
pub fn trit_range(trytes: Range<usize>) -> Range<usize> {
    trytes.start * TRITS_PER_TRYTE..trytes.end * TRITS_PER_TRYTE
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("expected 2673 trytes, got {0}")]
    InvalidLength(usize),
    #[error(transparent)]
    InvalidTrytes(#[from] TernaryError),
    #[error("value field uses more than 33 trits")]
    ValueOutOfRange,
}

/// Fields of a transaction that are relevant for bundle telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub address: String,
    pub value: i64,
    pub bundle_hash: String,
}

impl DecodedTransaction {
    pub fn from_trytes(trytes: &str) -> Result<Self, TransactionError> {
        validate_transaction_trytes(trytes)?;

        let value_trits = trytes_to_trits(&trytes[layout::VALUE])?;
        Ok(Self {
            address: trytes[layout::ADDRESS].to_string(),
            value: trits_to_int(&value_trits),
            bundle_hash: trytes[layout::BUNDLE].to_string(),
        })
    }
}

/// Checks length, alphabet and value bounds of a serialized transaction.
pub fn validate_transaction_trytes(trytes: &str) -> Result<(), TransactionError> {
    if trytes.len() != TRANSACTION_TRYTES {
        return Err(TransactionError::InvalidLength(trytes.len()));
    }
    if !is_trytes(trytes) {
        // Surface the first offending tryte.
        trytes_to_trits(trytes)?;
    }

    let unused_value = layout::VALUE.start + VALUE_USED_TRYTES..layout::VALUE.end;
    if trytes[unused_value].bytes().any(|tryte| tryte != b'9') {
        return Err(TransactionError::ValueOutOfRange);
    }
    Ok(())
}

/// Returns true if `hash` is a well formed 81 tryte hash.
pub fn is_hash(hash: &str) -> bool {
    hash.len() == HASH_TRYTES && is_trytes(hash)
}
