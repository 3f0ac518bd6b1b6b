use thiserror::Error;

/// Error type for the engine and its collaborators.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("Flow is no longer running")]
    FlowClosed,

    #[error("Payment history error: {0}")]
    PaymentHistory(String),

    #[error("Payment engine error: {0}")]
    PaymentEngine(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Error: {0}")]
    Generic(String),
}

impl From<figment::Error> for EngineError {
    fn from(e: figment::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl From<bitcoin::bip32::Error> for EngineError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        EngineError::KeyDerivation(e.to_string())
    }
}

impl From<bip39::Error> for EngineError {
    fn from(e: bip39::Error) -> Self {
        EngineError::KeyDerivation(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Generic(e.to_string())
    }
}
