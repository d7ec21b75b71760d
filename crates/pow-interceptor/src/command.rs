//! Envelope of the node API command that is intercepted, and the decision
//! whether an inbound request is that command at all.

use std::fmt;

use hyper::Method;
use serde::{
    Deserialize,
    Serialize,
};

/// Name of the intercepted command.
pub const ATTACH_TO_TANGLE: &str = "attachToTangle";

/// `attachToTangle` request body. Missing fields decode to their defaults, so
/// any JSON object decodes and the `command` field decides what happens next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttachToTangleRequest {
    pub command: String,
    pub trunk_transaction: String,
    pub branch_transaction: String,
    pub min_weight_magnitude: i64,
    pub trytes: Vec<String>,
}

/// `attachToTangle` response body, shaped like the node's own reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachToTangleResponse {
    pub trytes: Vec<String>,
    /// Milliseconds spent handling the request.
    pub duration: u64,
}

/// Why a request is passed through to the node untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardReason {
    /// Only POST requests carry commands.
    NotWrite,
    /// The body is not a command envelope this interceptor understands.
    Undecodable,
    /// A valid envelope for a different command.
    OtherCommand,
    /// An `attachToTangle` call without transactions.
    EmptyBundle,
}

impl ForwardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotWrite => "not_write",
            Self::Undecodable => "undecodable",
            Self::OtherCommand => "other_command",
            Self::EmptyBundle => "empty_bundle",
        }
    }
}

impl fmt::Display for ForwardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Forward(ForwardReason),
    Intercept(AttachToTangleRequest),
}

/// Decides whether a request is intercepted. `body` is only inspected for
/// POST requests and is never modified.
pub fn classify(method: &Method, body: &[u8]) -> Classification {
    if method != Method::POST {
        return Classification::Forward(ForwardReason::NotWrite);
    }

    let Ok(request) = serde_json::from_slice::<AttachToTangleRequest>(body) else {
        return Classification::Forward(ForwardReason::Undecodable);
    };

    if request.command != ATTACH_TO_TANGLE {
        return Classification::Forward(ForwardReason::OtherCommand);
    }

    Classification::Intercept(request)
}
