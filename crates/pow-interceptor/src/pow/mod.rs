//! Proof-of-work primitive used by the compute stage.
//!
//! The interceptor only depends on [`ProofOfWork`]; [`CurlProofOfWork`] is the
//! portable CPU implementation shipped with the binary.

use std::sync::Arc;

use thiserror::Error;

use crate::transaction::TransactionError;

pub mod cpu;
pub mod curl;

pub use cpu::CurlProofOfWork;

#[derive(Debug, Error)]
pub enum PowError {
    #[error("invalid {field} transaction hash")]
    InvalidHash { field: &'static str },
    #[error("invalid transaction at index {index}: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: TransactionError,
    },
    #[error("min weight magnitude {0} exceeds the hash length")]
    MwmTooHigh(u8),
    #[error("nonce search finished without a result")]
    NonceNotFound,
    #[error("expected {expected} transactions from proof of work, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("failed to start nonce search workers: {0}")]
    ThreadPool(String),
    #[error("proof of work task failed: {0}")]
    Task(String),
}

/// Attaches a bundle to the ledger graph by chaining it onto `trunk` and
/// `branch` and searching a nonce for every transaction.
///
/// Implementations are CPU bound and are called from a blocking context.
/// The returned bundle has the same length and order as `trytes`.
pub trait ProofOfWork: Send + Sync {
    /// Human readable name of the implementation, logged on startup.
    fn name(&self) -> &str;

    fn attach(
        &self,
        trunk: &str,
        branch: &str,
        trytes: &[String],
        mwm: u8,
    ) -> Result<Vec<String>, PowError>;
}

pub type SharedProofOfWork = Arc<dyn ProofOfWork>;
