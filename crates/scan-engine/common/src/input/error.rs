use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{lnurl::error::RemoteError, network::BitcoinNetwork};

/// Why a piece of text could not be turned into a [`super::PaymentInput`].
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClassificationError {
    #[error("Input is not a recognized payment request")]
    Malformed,

    #[error("Request is for {actual}, the wallet runs on {expected}")]
    ChainMismatch {
        expected: BitcoinNetwork,
        actual: BitcoinNetwork,
    },

    #[error("Unsupported LNURL tag: {tag}")]
    UnsupportedLnurlTag { tag: String },

    #[error("LNURL does not point to an https url")]
    NonHttpsLnurl,

    #[error("Missing or empty field: {name}")]
    EmptyOrMissingField { name: String },

    #[error("Invalid field {name}: {detail}")]
    InvalidField { name: String, detail: String },

    #[error("Unhandled required parameters: {}", params.join(", "))]
    UnhandledRequiredParams { params: Vec<String> },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ClassificationError {
    pub fn missing(name: &str) -> Self {
        Self::EmptyOrMissingField {
            name: name.to_string(),
        }
    }

    pub fn invalid(name: &str, detail: impl Into<String>) -> Self {
        Self::InvalidField {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}

pub type ClassificationResult<T, E = ClassificationError> = Result<T, E>;
