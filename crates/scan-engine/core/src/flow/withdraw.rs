//! LNURL-withdraw, LUD-03.

use std::sync::Arc;

use platform_utils::HttpClient;
use scan_engine_common::lnurl::{
    error::RemoteError,
    withdraw::{LnurlWithdrawRequestDetails, submit_withdraw_invoice},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    balance::BalanceProjection, error::EngineError, models::GeneratedInvoice,
    payment_engine::PaymentEngine,
};

use super::{CancellableOperation, FlowActor, FlowPhase, FlowState, error::LnurlWithdrawError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LnurlWithdrawIntent {
    Withdraw {
        amount_msat: u64,
        /// Falls back to the service's default description.
        description: Option<String>,
    },
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LnurlWithdrawState {
    Init,
    GeneratingInvoice { amount_msat: u64 },
    SendingInvoice { invoice: GeneratedInvoice },
    /// The service accepted the invoice. It is paid asynchronously, the
    /// invoice stays pending until then.
    Succeeded { payment_hash: String },
    Failed { error: LnurlWithdrawError },
}

impl BalanceProjection for LnurlWithdrawState {
    fn project_balance(&mut self, _balance_msat: u64) {}
}

impl FlowState for LnurlWithdrawState {
    fn phase(&self) -> FlowPhase {
        match self {
            LnurlWithdrawState::Init => FlowPhase::AwaitingUserAmount,
            LnurlWithdrawState::GeneratingInvoice { .. }
            | LnurlWithdrawState::SendingInvoice { .. } => FlowPhase::Submitting,
            LnurlWithdrawState::Succeeded { .. } => FlowPhase::Succeeded,
            LnurlWithdrawState::Failed { .. } => FlowPhase::Failed,
        }
    }
}

#[derive(Debug)]
pub(crate) enum WithdrawStep {
    InvoiceGenerated(Result<GeneratedInvoice, EngineError>),
    InvoiceSubmitted(Result<String, RemoteError>),
}

pub(crate) struct LnurlWithdrawFlow {
    withdraw_request: Arc<LnurlWithdrawRequestDetails>,
    http_client: Arc<dyn HttpClient>,
    payment_engine: Arc<dyn PaymentEngine>,
    state: LnurlWithdrawState,
}

impl LnurlWithdrawFlow {
    pub(crate) fn new(
        withdraw_request: LnurlWithdrawRequestDetails,
        http_client: Arc<dyn HttpClient>,
        payment_engine: Arc<dyn PaymentEngine>,
    ) -> Self {
        Self {
            withdraw_request: Arc::new(withdraw_request),
            http_client,
            payment_engine,
            state: LnurlWithdrawState::Init,
        }
    }

    fn fail(&mut self, error: LnurlWithdrawError) {
        warn!(
            "LNURL-withdraw from {} failed: {error}",
            self.withdraw_request.domain
        );
        self.state = LnurlWithdrawState::Failed { error };
    }

    fn withdraw(
        &mut self,
        amount_msat: u64,
        description: Option<String>,
        operation: &mut CancellableOperation<WithdrawStep>,
    ) {
        if let Err(e) = self.withdraw_request.validate_amount(amount_msat) {
            self.fail(e.into());
            return;
        }

        let description = description
            .filter(|description| !description.trim().is_empty())
            .unwrap_or_else(|| self.withdraw_request.default_description.clone());
        let payment_engine = Arc::clone(&self.payment_engine);
        operation.launch(async move {
            WithdrawStep::InvoiceGenerated(
                payment_engine
                    .generate_invoice(amount_msat, &description)
                    .await,
            )
        });
        self.state = LnurlWithdrawState::GeneratingInvoice { amount_msat };
    }
}

impl FlowActor for LnurlWithdrawFlow {
    type Intent = LnurlWithdrawIntent;
    type State = LnurlWithdrawState;
    type Output = WithdrawStep;

    fn state(&self) -> &LnurlWithdrawState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LnurlWithdrawState {
        &mut self.state
    }

    fn handle_intent(
        &mut self,
        intent: LnurlWithdrawIntent,
        operation: &mut CancellableOperation<WithdrawStep>,
    ) {
        match intent {
            LnurlWithdrawIntent::Withdraw {
                amount_msat,
                description,
            } => {
                if matches!(
                    self.state,
                    LnurlWithdrawState::Init | LnurlWithdrawState::Failed { .. }
                ) {
                    self.withdraw(amount_msat, description, operation);
                } else {
                    debug!("Ignoring withdraw in phase {:?}", self.state.phase());
                }
            }
            LnurlWithdrawIntent::Cancel => {
                if matches!(
                    self.state,
                    LnurlWithdrawState::GeneratingInvoice { .. }
                        | LnurlWithdrawState::SendingInvoice { .. }
                ) {
                    operation.cancel();
                    self.state = LnurlWithdrawState::Init;
                }
            }
        }
    }

    fn handle_completed(
        &mut self,
        output: WithdrawStep,
        operation: &mut CancellableOperation<WithdrawStep>,
    ) {
        match output {
            WithdrawStep::InvoiceGenerated(Ok(invoice)) => {
                let withdraw_request = Arc::clone(&self.withdraw_request);
                let http_client = Arc::clone(&self.http_client);
                let bolt11 = invoice.bolt11.clone();
                let payment_hash = invoice.payment_hash.clone();
                operation.continue_with(async move {
                    let submitted =
                        submit_withdraw_invoice(http_client.as_ref(), &withdraw_request, &bolt11)
                            .await;
                    WithdrawStep::InvoiceSubmitted(submitted.map(|()| payment_hash))
                });
                self.state = LnurlWithdrawState::SendingInvoice { invoice };
            }
            WithdrawStep::InvoiceGenerated(Err(e)) => {
                self.fail(LnurlWithdrawError::PaymentEngine(e.to_string()));
            }
            WithdrawStep::InvoiceSubmitted(Ok(payment_hash)) => {
                info!("Withdraw request sent to {}", self.withdraw_request.domain);
                self.state = LnurlWithdrawState::Succeeded { payment_hash };
            }
            WithdrawStep::InvoiceSubmitted(Err(e)) => self.fail(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use scan_engine_common::{
        lnurl::error::RequestInputError, test_utils::mock_rest_client::MockRestClient,
    };
    use tokio::sync::watch;

    use crate::{
        flow::{FlowHandle, spawn_flow},
        payment_engine::MockPaymentEngine,
        test_utils::GatedHttpClient,
    };

    use super::*;

    fn withdraw_request() -> LnurlWithdrawRequestDetails {
        LnurlWithdrawRequestDetails {
            callback: "https://service.com/lnurlw/callback".to_string(),
            k1: "k1value".to_string(),
            default_description: "sample withdraw".to_string(),
            min_withdrawable: 3000,
            max_withdrawable: 12000,
            domain: "service.com".to_string(),
        }
    }

    fn invoice_engine(expected_description: &'static str) -> MockPaymentEngine {
        let mut engine = MockPaymentEngine::new();
        engine
            .expect_generate_invoice()
            .returning(move |amount_msat, description| {
                assert_eq!(description, expected_description);
                Ok(GeneratedInvoice {
                    bolt11: format!("lnbc{amount_msat}"),
                    payment_hash: "ab".repeat(32),
                })
            });
        engine
    }

    fn start(
        http_client: Arc<dyn HttpClient>,
        engine: MockPaymentEngine,
    ) -> FlowHandle<LnurlWithdrawIntent, LnurlWithdrawState> {
        let (_balance_tx, balance_rx) = watch::channel(0);
        spawn_flow(
            LnurlWithdrawFlow::new(withdraw_request(), http_client, Arc::new(engine)),
            balance_rx,
        )
    }

    fn is_done(state: &LnurlWithdrawState) -> bool {
        matches!(state.phase(), FlowPhase::Succeeded | FlowPhase::Failed)
    }

    #[test_log::test(tokio::test)]
    async fn test_withdraw_succeeds() -> anyhow::Result<()> {
        let http_client = Arc::new(MockRestClient::new());
        http_client.add_response(200, r#"{"status":"OK"}"#);
        let flow = start(http_client.clone(), invoice_engine("sample withdraw"));

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 5000,
            description: None,
        })?;
        let model = flow.wait_for(|m| is_done(&m.state)).await?;
        assert_eq!(
            model.state,
            LnurlWithdrawState::Succeeded {
                payment_hash: "ab".repeat(32)
            }
        );
        assert_eq!(
            http_client.requests()[0].url,
            "https://service.com/lnurlw/callback?k1=k1value&pr=lnbc5000"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_uses_custom_description() -> anyhow::Result<()> {
        let http_client = Arc::new(MockRestClient::new());
        http_client.add_response(200, r#"{"status":"OK"}"#);
        let flow = start(http_client, invoice_engine("coffee"));

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 3000,
            description: Some("coffee".to_string()),
        })?;
        let model = flow.wait_for(|m| is_done(&m.state)).await?;
        assert!(matches!(model.state, LnurlWithdrawState::Succeeded { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_out_of_range() -> anyhow::Result<()> {
        let http_client = Arc::new(MockRestClient::new());
        let flow = start(http_client.clone(), MockPaymentEngine::new());

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 12001,
            description: None,
        })?;
        let model = flow.wait_for(|m| is_done(&m.state)).await?;
        assert_eq!(
            model.state,
            LnurlWithdrawState::Failed {
                error: LnurlWithdrawError::InvalidInput(RequestInputError::AmountAboveMaximum {
                    amount_msat: 12001,
                    max_msat: 12000,
                })
            }
        );
        assert!(http_client.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_server_error() -> anyhow::Result<()> {
        let http_client = Arc::new(MockRestClient::new());
        http_client.add_response(400, r#"{"status":"ERROR","reason":"Withdraw link used"}"#);
        let flow = start(http_client, invoice_engine("sample withdraw"));

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 5000,
            description: None,
        })?;
        let model = flow.wait_for(|m| is_done(&m.state)).await?;
        assert_eq!(
            model.state,
            LnurlWithdrawState::Failed {
                error: LnurlWithdrawError::Remote(RemoteError::ServerReportedError {
                    message: "Withdraw link used".to_string()
                })
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_invoice_generation_fails() -> anyhow::Result<()> {
        let mut engine = MockPaymentEngine::new();
        engine
            .expect_generate_invoice()
            .returning(|_, _| Err(EngineError::PaymentEngine("node offline".to_string())));
        let flow = start(Arc::new(MockRestClient::new()), engine);

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 5000,
            description: None,
        })?;
        let model = flow.wait_for(|m| is_done(&m.state)).await?;
        assert!(matches!(
            model.state,
            LnurlWithdrawState::Failed {
                error: LnurlWithdrawError::PaymentEngine(_)
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_while_sending_invoice() -> anyhow::Result<()> {
        let http_client = Arc::new(GatedHttpClient::new());
        http_client.mock().add_response(200, r#"{"status":"OK"}"#);
        let flow = start(http_client.clone(), invoice_engine("sample withdraw"));

        flow.send(LnurlWithdrawIntent::Withdraw {
            amount_msat: 5000,
            description: None,
        })?;
        http_client.wait_for_requests(1).await;
        flow.send(LnurlWithdrawIntent::Cancel)?;
        let model = flow
            .wait_for(|m| m.state == LnurlWithdrawState::Init)
            .await?;
        assert_eq!(model.epoch, 2);

        http_client.release(1);
        tokio::task::yield_now().await;
        assert_eq!(flow.model().state, LnurlWithdrawState::Init);
        Ok(())
    }
}
