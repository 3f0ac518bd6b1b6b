use scan_engine_common::lnurl::error::{RemoteError, RequestInputError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum LnurlPayError {
    #[error(transparent)]
    InvalidInput(#[from] RequestInputError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Payment failed: {0}")]
    PaymentEngine(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum LnurlWithdrawError {
    #[error(transparent)]
    InvalidInput(#[from] RequestInputError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Could not create the invoice: {0}")]
    PaymentEngine(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum LnurlAuthError {
    /// The service answered, but rejected the login.
    #[error("Login rejected: {0}")]
    ServerError(RemoteError),

    #[error("Login failed: {0}")]
    NetworkError(RemoteError),

    #[error(transparent)]
    OtherError(#[from] AuthOtherError),
}

impl From<RemoteError> for LnurlAuthError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NetworkFailure { .. } => Self::NetworkError(err),
            _ => Self::ServerError(err),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuthOtherError {
    #[error("Could not determine the domain of the service")]
    CouldNotDetermineDomain,

    #[error("The login challenge is not 32 bytes of hex")]
    InvalidChallenge,

    #[error("Key derivation failed: {reason}")]
    KeyDerivation { reason: String },
}
