use crate::{
    error::EngineError,
    models::{GeneratedInvoice, PaymentAck},
};

/// The Lightning node that actually moves funds.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PaymentEngine: Send + Sync {
    /// Pays `bolt11`. `amount_msat` is only set for amountless invoices.
    async fn pay_invoice(
        &self,
        bolt11: &str,
        amount_msat: Option<u64>,
    ) -> Result<PaymentAck, EngineError>;

    async fn generate_invoice(
        &self,
        amount_msat: u64,
        description: &str,
    ) -> Result<GeneratedInvoice, EngineError>;
}
