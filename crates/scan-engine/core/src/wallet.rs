use bitcoin::secp256k1::PublicKey;
use scan_engine_common::{
    invoice::Bolt11InvoiceDetails, network::BitcoinNetwork, utils::now_secs,
    validation::WalletSnapshot,
};
use tokio::sync::watch;

use crate::error::EngineError;

/// Live facts about the local wallet.
pub trait WalletState: Send + Sync {
    fn network(&self) -> BitcoinNetwork;

    /// Identity key of the local Lightning node.
    fn node_id(&self) -> PublicKey;

    /// Spendable balance in millisatoshi. Every change is published on the
    /// returned channel.
    fn balance(&self) -> watch::Receiver<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PaymentHistory: Send + Sync {
    /// Whether an outgoing payment with `payment_hash` (hex) succeeded.
    async fn has_succeeded_payment(&self, payment_hash: &str) -> Result<bool, EngineError>;
}

/// Gathers the facts `invoice` is validated against. The payment history
/// is asked about this invoice every time, so a failed attempt is never
/// mistaken for a paid one.
pub(crate) async fn wallet_snapshot(
    wallet: &dyn WalletState,
    history: &dyn PaymentHistory,
    invoice: &Bolt11InvoiceDetails,
) -> Result<WalletSnapshot, EngineError> {
    let already_paid = history
        .has_succeeded_payment(&invoice.payment_hash)
        .await?;
    Ok(WalletSnapshot {
        network: wallet.network(),
        node_id: wallet.node_id().to_string(),
        now_secs: now_secs(),
        already_paid,
    })
}
