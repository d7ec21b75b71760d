//! `attachToTangle` proof of work interceptor.
//!
//! Sits in front of a ledger node's HTTP API. `attachToTangle` calls are
//! validated against the configured [`Limits`], their bundle is decoded for
//! telemetry, and the proof of work is done locally, one bundle at a time.
//! Everything else is forwarded to the node with its original bytes.
//!
//! The pieces can be embedded on their own: [`Interceptor`] handles a single
//! `hyper` request, [`ComputeExecutor`] serializes any [`ProofOfWork`]
//! implementation, and [`Upstream`] abstracts the passthrough.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

pub mod bundle;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod pow;
pub mod server;
pub mod ternary;
pub mod transaction;
pub mod upstream;
pub mod validation;

#[cfg(test)]
mod test_utils;

pub use config::{
    Config,
    Limits,
};
pub use error::{
    InterceptError,
    Result,
};
pub use executor::ComputeExecutor;
pub use interceptor::Interceptor;
pub use pow::{
    CurlProofOfWork,
    ProofOfWork,
    SharedProofOfWork,
};
pub use server::InterceptorServer;
pub use upstream::{
    ForwardBody,
    HttpUpstream,
    SharedUpstream,
    Upstream,
};
