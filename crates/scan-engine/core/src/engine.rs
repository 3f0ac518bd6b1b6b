use std::sync::Arc;

use platform_utils::HttpClient;
use scan_engine_common::{
    input::{ClassificationResult, InputParser, PaymentInput},
    invoice::Bolt11InvoiceDetails,
    lnurl::{
        auth::LnurlAuthRequestDetails, pay::LnurlPayRequestDetails,
        withdraw::LnurlWithdrawRequestDetails,
    },
    validation::{ValidationOutcome, ValidationPolicy, validate},
};
use tracing::info;

use crate::{
    config::Config,
    error::EngineError,
    flow::{
        FlowHandle,
        auth::{LnurlAuthFlow, LnurlAuthIntent, LnurlAuthState},
        pay::{LnurlPayFlow, LnurlPayIntent, LnurlPayState},
        scan::{ScanFlow, ScanIntent, ScanState},
        spawn_flow,
        withdraw::{LnurlWithdrawFlow, LnurlWithdrawIntent, LnurlWithdrawState},
    },
    payment_engine::PaymentEngine,
    psl::PublicSuffixList,
    signer::KeyDerivation,
    wallet::{PaymentHistory, WalletState, wallet_snapshot},
};

/// Entry point for turning user input into payments. Built with
/// [`crate::ScanEngineBuilder`].
///
/// The flow constructors spawn tokio tasks and must be called from within
/// a runtime.
pub struct ScanEngine {
    pub(crate) config: Config,
    pub(crate) parser: Arc<InputParser<dyn HttpClient>>,
    pub(crate) http_client: Arc<dyn HttpClient>,
    pub(crate) wallet: Arc<dyn WalletState>,
    pub(crate) payment_history: Arc<dyn PaymentHistory>,
    pub(crate) payment_engine: Arc<dyn PaymentEngine>,
    pub(crate) key_derivation: Arc<dyn KeyDerivation>,
    pub(crate) public_suffix_list: Option<Arc<dyn PublicSuffixList>>,
}

impl ScanEngine {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classifies `text`, fetching LNURL terms when needed.
    pub async fn classify(&self, text: &str) -> ClassificationResult<PaymentInput> {
        self.parser.classify(text).await
    }

    /// Classifies `text` without any network access.
    pub fn inspect_clipboard(&self, text: &str) -> PaymentInput {
        self.parser.inspect_clipboard(text)
    }

    /// Checks `invoice` against the wallet as it is right now.
    pub async fn validate_invoice(
        &self,
        invoice: &Bolt11InvoiceDetails,
        policy: ValidationPolicy,
    ) -> Result<ValidationOutcome, EngineError> {
        let snapshot =
            wallet_snapshot(self.wallet.as_ref(), self.payment_history.as_ref(), invoice).await?;
        Ok(validate(invoice, &snapshot, policy))
    }

    pub fn scan(&self) -> FlowHandle<ScanIntent, ScanState> {
        let flow = ScanFlow::new(
            Arc::clone(&self.parser),
            Arc::clone(&self.wallet),
            Arc::clone(&self.payment_history),
            Arc::clone(&self.payment_engine),
        );
        spawn_flow(flow, self.wallet.balance())
    }

    pub fn lnurl_pay(
        &self,
        pay_request: LnurlPayRequestDetails,
    ) -> FlowHandle<LnurlPayIntent, LnurlPayState> {
        info!("Starting LNURL-pay flow with {}", pay_request.domain);
        let flow = LnurlPayFlow::new(
            pay_request,
            self.config.network,
            Arc::clone(&self.http_client),
            Arc::clone(&self.payment_history),
            Arc::clone(&self.payment_engine),
            self.wallet.balance(),
        );
        spawn_flow(flow, self.wallet.balance())
    }

    pub fn lnurl_withdraw(
        &self,
        withdraw_request: LnurlWithdrawRequestDetails,
    ) -> FlowHandle<LnurlWithdrawIntent, LnurlWithdrawState> {
        info!("Starting LNURL-withdraw flow with {}", withdraw_request.domain);
        let flow = LnurlWithdrawFlow::new(
            withdraw_request,
            Arc::clone(&self.http_client),
            Arc::clone(&self.payment_engine),
        );
        spawn_flow(flow, self.wallet.balance())
    }

    pub fn lnurl_auth(
        &self,
        auth_request: LnurlAuthRequestDetails,
    ) -> FlowHandle<LnurlAuthIntent, LnurlAuthState> {
        info!("Starting LNURL-auth flow with {}", auth_request.domain);
        let flow = LnurlAuthFlow::new(
            auth_request,
            self.public_suffix_list.as_deref(),
            Arc::clone(&self.http_client),
            Arc::clone(&self.key_derivation),
            self.config.login_min_success_delay(),
        );
        spawn_flow(flow, self.wallet.balance())
    }
}
