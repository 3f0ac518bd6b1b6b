use platform_utils::HttpError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ensure_input, network::BitcoinNetwork};

/// Failure of a round trip with an LNURL service.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RemoteError {
    /// The request never got a response: DNS, connect, TLS or timeout.
    #[error("Could not reach the service: {detail}")]
    NetworkFailure { detail: String },

    #[error("Service responded with HTTP status {code}")]
    HttpFailure { code: u16 },

    #[error("Service returned an error: {message}")]
    ServerReportedError { message: String },

    #[error("Service returned an unreadable response")]
    UnreadableBody,

    #[error("Service response is invalid: {detail}")]
    ResponseValidationFailure { detail: ResponseValidation },
}

/// What was wrong with an otherwise well formed service response.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResponseValidation {
    #[error("the invoice was already paid")]
    AlreadyPaidInvoice,

    #[error("the invoice is for {actual}, expected {expected}")]
    ChainMismatch {
        expected: BitcoinNetwork,
        actual: BitcoinNetwork,
    },

    #[error("invoice amount {invoice_msat:?} msat does not match requested {requested_msat} msat")]
    InvalidAmount {
        requested_msat: u64,
        invoice_msat: Option<u64>,
    },

    #[error("malformed invoice: {reason}")]
    MalformedInvoice { reason: String },

    #[error("invalid success action: {reason}")]
    InvalidSuccessAction { reason: String },

    #[error("invalid callback url: {reason}")]
    InvalidCallback { reason: String },
}

impl From<HttpError> for RemoteError {
    fn from(err: HttpError) -> Self {
        Self::NetworkFailure {
            detail: err.to_string(),
        }
    }
}

impl From<ResponseValidation> for RemoteError {
    fn from(detail: ResponseValidation) -> Self {
        Self::ResponseValidationFailure { detail }
    }
}

pub type LnurlResult<T, E = RemoteError> = Result<T, E>;

/// A user supplied value outside of what the service advertised. Detected
/// before any network call.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestInputError {
    #[error("Amount {amount_msat} msat is below the minimum of {min_msat} msat")]
    AmountBelowMinimum { amount_msat: u64, min_msat: u64 },

    #[error("Amount {amount_msat} msat is above the maximum of {max_msat} msat")]
    AmountAboveMaximum { amount_msat: u64, max_msat: u64 },

    #[error("Comment has {length} characters, at most {max_length} are allowed")]
    CommentTooLong { length: usize, max_length: usize },
}

/// Checks `amount_msat` against the inclusive range advertised by a service.
pub fn ensure_amount_in_range(
    amount_msat: u64,
    min_msat: u64,
    max_msat: u64,
) -> Result<(), RequestInputError> {
    ensure_input!(
        amount_msat >= min_msat,
        RequestInputError::AmountBelowMinimum {
            amount_msat,
            min_msat,
        }
    );
    ensure_input!(
        amount_msat <= max_msat,
        RequestInputError::AmountAboveMaximum {
            amount_msat,
            max_msat,
        }
    );
    Ok(())
}
