//! Transport error types.

use thiserror::Error;

/// Failure to complete an HTTP exchange.
///
/// A response with a non-2xx status is not an error at this layer: it is
/// returned as an [`crate::HttpResponse`] so callers can still read the body.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("Connect error: {0}")]
    Connect(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Redirect error: {0}")]
    Redirect(String),
    #[error("Request error: {0}")]
    Request(String),
    #[error("Body error: {0}")]
    Body(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl From<bitreq::Error> for HttpError {
    fn from(err: bitreq::Error) -> Self {
        let err_str = format!("{err:?}");
        match &err {
            bitreq::Error::IoError(io_err) => {
                if io_err.kind() == std::io::ErrorKind::TimedOut {
                    Self::Timeout(err_str)
                } else {
                    Self::Connect(err_str)
                }
            }
            bitreq::Error::InvalidUtf8InBody(_) | bitreq::Error::InvalidUtf8InResponse => {
                Self::Decode(err_str)
            }
            bitreq::Error::TooManyRedirections
            | bitreq::Error::InfiniteRedirectionLoop
            | bitreq::Error::RedirectLocationMissing => Self::Redirect(err_str),
            bitreq::Error::AddressNotFound => Self::Connect(err_str),
            bitreq::Error::InvalidUrl(_) => Self::Request(err_str),
            bitreq::Error::BodyOverflow => Self::Body(err_str),
            bitreq::Error::Other(msg) => Self::Other((*msg).to_string()),
            _ => Self::Other(err_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitreq_error_mapping() {
        assert!(matches!(
            HttpError::from(bitreq::Error::AddressNotFound),
            HttpError::Connect(_)
        ));
        assert!(matches!(
            HttpError::from(bitreq::Error::TooManyRedirections),
            HttpError::Redirect(_)
        ));
        assert!(matches!(
            HttpError::from(bitreq::Error::BodyOverflow),
            HttpError::Body(_)
        ));
    }
}
