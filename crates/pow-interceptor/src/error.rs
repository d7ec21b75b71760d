use hyper::StatusCode;
use thiserror::Error;

use crate::{
    bundle::MalformedBundle,
    pow::PowError,
};

pub type Result<T, E = InterceptError> = std::result::Result<T, E>;

/// Every way an intercepted request can fail. The display text is what the
/// caller receives as the response body.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("missing body")]
    MissingBody,
    #[error("MWM is higher than max allowed MWM or less than 0: use mwm between 1-{max}")]
    InvalidMwm { max: u8 },
    #[error(
        "the number of transactions in the bundle exceed the attachToTangle limit: max allowed is {max}"
    )]
    BundleTooLarge { max: usize },
    #[error("couldn't build transaction from trytes")]
    MalformedTransaction(#[source] MalformedBundle),
    #[error("failed to do Proof of Work")]
    ProofOfWork(#[source] PowError),
    #[error("proof of work queue is full, retry later")]
    Busy,
    #[error("couldn't build response")]
    BuildingResponse(#[from] serde_json::Error),
    #[error("upstream request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl InterceptError {
    /// HTTP status returned to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingBody
            | Self::InvalidMwm { .. }
            | Self::BundleTooLarge { .. }
            | Self::MalformedTransaction(_)
            | Self::ProofOfWork(_) => StatusCode::BAD_REQUEST,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Reqwest(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidConfig(_) | Self::BuildingResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::MissingBody => "missing_body",
            Self::InvalidMwm { .. } => "invalid_mwm",
            Self::BundleTooLarge { .. } => "bundle_too_large",
            Self::MalformedTransaction(_) => "malformed_transaction",
            Self::ProofOfWork(_) => "proof_of_work",
            Self::Busy => "busy",
            Self::BuildingResponse(_) => "building_response",
            Self::Reqwest(_) | Self::Upstream(_) => "upstream",
        }
    }
}
