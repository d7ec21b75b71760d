//! Bundle decoding for telemetry. Nothing decoded here changes what is sent
//! to the proof of work; a bundle that does not decode is rejected outright.

use thiserror::Error;
use tracing::info;

use crate::transaction::{
    DecodedTransaction,
    TransactionError,
};

/// Iotas per Mi, the unit values are reported in.
pub const IOTAS_PER_MI: f64 = 1_000_000.0;

pub fn to_mi(iotas: i64) -> f64 {
    iotas as f64 / IOTAS_PER_MI
}

/// A transaction of the bundle that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction {index} of the bundle is malformed: {source}")]
pub struct MalformedBundle {
    pub index: usize,
    #[source]
    pub source: TransactionError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    /// Decoded transactions, in bundle order.
    pub transactions: Vec<DecodedTransaction>,
    /// True if any transaction moves value.
    pub is_value_bundle: bool,
    /// Sum of all input (negative) values, in iotas.
    pub input_value: i64,
}

impl BundleSummary {
    pub fn bundle_hash(&self) -> Option<&str> {
        self.transactions.first().map(|tx| tx.bundle_hash.as_str())
    }
}

/// Decodes every transaction from last to first and logs the value legs,
/// the bundle hash and the total input. Fails on the first transaction that
/// does not decode.
pub fn inspect_bundle(trytes: &[String]) -> Result<BundleSummary, MalformedBundle> {
    let mut transactions = Vec::with_capacity(trytes.len());
    let mut is_value_bundle = false;
    let mut input_value: i64 = 0;

    for (index, raw) in trytes.iter().enumerate().rev() {
        let tx = DecodedTransaction::from_trytes(raw)
            .map_err(|source| MalformedBundle { index, source })?;
        if tx.value != 0 {
            is_value_bundle = true;
            if tx.value < 0 {
                input_value = input_value.saturating_add(tx.value);
                info!(
                    target: "pow_interceptor::bundle",
                    address = %tx.address,
                    "{} - [input] {:.6} Mi",
                    tx.address,
                    to_mi(tx.value)
                );
            } else {
                info!(
                    target: "pow_interceptor::bundle",
                    address = %tx.address,
                    "{} - [output] {:.6} Mi",
                    tx.address,
                    to_mi(tx.value)
                );
            }
        }
        transactions.push(tx);
    }
    transactions.reverse();

    let summary = BundleSummary {
        transactions,
        is_value_bundle,
        input_value,
    };

    if let Some(bundle) = summary.bundle_hash() {
        info!(target: "pow_interceptor::bundle", %bundle, "bundle: {bundle}");
    }
    if summary.is_value_bundle {
        info!(
            target: "pow_interceptor::bundle",
            input_iotas = summary.input_value,
            "bundle is using {:.6} Mi as input",
            to_mi(summary.input_value)
        );
    }

    Ok(summary)
}
