use serde::{Deserialize, Serialize};

/// Receives the engine's log lines of level INFO and above.
pub trait Logger: Send + Sync {
    fn log(&self, l: LogEntry);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub line: String,
    pub level: String,
}

/// Key derivation rule used for LNURL-auth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginScheme {
    /// LUD-05 keys derived from the wallet's master key.
    #[default]
    Default,
    /// Keys of wallets that registered with services before LUD-05 settled,
    /// derived from the legacy node key.
    Legacy,
}

/// Acknowledgement of the payment engine that an invoice was paid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAck {
    pub payment_hash: String,
    /// Known once the payment settled. Needed to decrypt AES success
    /// actions.
    pub preimage: Option<[u8; 32]>,
}

/// A receive invoice created by the payment engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedInvoice {
    pub bolt11: String,
    pub payment_hash: String,
}
