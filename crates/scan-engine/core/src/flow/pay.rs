//! LNURL-pay, LUD-06.

use std::sync::Arc;

use platform_utils::HttpClient;
use scan_engine_common::{
    invoice::Bolt11InvoiceDetails,
    lnurl::{
        error::RemoteError,
        pay::{
            LnurlPayRequestDetails, PayCallbackResponse, request_invoice, validate_pay_invoice,
            validate_user_input,
        },
        success_action::{ProcessedSuccessAction, SuccessAction},
    },
    network::BitcoinNetwork,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    balance::BalanceProjection,
    error::EngineError,
    models::PaymentAck,
    payment_engine::PaymentEngine,
    wallet::PaymentHistory,
};

use super::{CancellableOperation, FlowActor, FlowPhase, FlowState, error::LnurlPayError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LnurlPayIntent {
    RequestInvoice {
        amount_msat: u64,
        comment: Option<String>,
    },
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LnurlPayState {
    Init {
        balance_msat: u64,
    },
    RequestingInvoice {
        amount_msat: u64,
    },
    PayingInvoice {
        invoice: Bolt11InvoiceDetails,
    },
    Succeeded {
        payment_hash: String,
        success_action: Option<ProcessedSuccessAction>,
    },
    Failed {
        error: LnurlPayError,
        balance_msat: u64,
    },
}

impl BalanceProjection for LnurlPayState {
    fn project_balance(&mut self, balance: u64) {
        match self {
            LnurlPayState::Init { balance_msat } | LnurlPayState::Failed { balance_msat, .. } => {
                *balance_msat = balance;
            }
            _ => {}
        }
    }
}

impl FlowState for LnurlPayState {
    fn phase(&self) -> FlowPhase {
        match self {
            LnurlPayState::Init { .. } => FlowPhase::AwaitingUserAmount,
            LnurlPayState::RequestingInvoice { .. } => FlowPhase::FetchingTerms,
            LnurlPayState::PayingInvoice { .. } => FlowPhase::Submitting,
            LnurlPayState::Succeeded { .. } => FlowPhase::Succeeded,
            LnurlPayState::Failed { .. } => FlowPhase::Failed,
        }
    }
}

#[derive(Debug)]
pub(crate) enum PayStep {
    InvoiceReceived(Result<PayCallbackResponse, LnurlPayError>),
    Paid {
        result: Result<PaymentAck, EngineError>,
        success_action: Option<SuccessAction>,
    },
}

pub(crate) struct LnurlPayFlow {
    pay_request: Arc<LnurlPayRequestDetails>,
    network: BitcoinNetwork,
    http_client: Arc<dyn HttpClient>,
    payment_history: Arc<dyn PaymentHistory>,
    payment_engine: Arc<dyn PaymentEngine>,
    balance: watch::Receiver<u64>,
    state: LnurlPayState,
}

impl LnurlPayFlow {
    pub(crate) fn new(
        pay_request: LnurlPayRequestDetails,
        network: BitcoinNetwork,
        http_client: Arc<dyn HttpClient>,
        payment_history: Arc<dyn PaymentHistory>,
        payment_engine: Arc<dyn PaymentEngine>,
        balance: watch::Receiver<u64>,
    ) -> Self {
        let balance_msat = *balance.borrow();
        Self {
            pay_request: Arc::new(pay_request),
            network,
            http_client,
            payment_history,
            payment_engine,
            balance,
            state: LnurlPayState::Init { balance_msat },
        }
    }

    fn balance_msat(&self) -> u64 {
        *self.balance.borrow()
    }

    fn fail(&mut self, error: LnurlPayError) {
        warn!("LNURL-pay to {} failed: {error}", self.pay_request.domain);
        self.state = LnurlPayState::Failed {
            error,
            balance_msat: self.balance_msat(),
        };
    }

    fn request_invoice(
        &mut self,
        amount_msat: u64,
        comment: Option<String>,
        operation: &mut CancellableOperation<PayStep>,
    ) {
        if let Err(e) = validate_user_input(&self.pay_request, amount_msat, comment.as_deref()) {
            self.fail(e.into());
            return;
        }

        let pay_request = Arc::clone(&self.pay_request);
        let http_client = Arc::clone(&self.http_client);
        let payment_history = Arc::clone(&self.payment_history);
        let network = self.network;
        operation.launch(async move {
            PayStep::InvoiceReceived(
                fetch_invoice(
                    http_client.as_ref(),
                    payment_history.as_ref(),
                    &pay_request,
                    network,
                    amount_msat,
                    comment.as_deref(),
                )
                .await,
            )
        });
        self.state = LnurlPayState::RequestingInvoice { amount_msat };
    }
}

/// Asks the service for an invoice and checks it before anything is paid.
async fn fetch_invoice(
    http_client: &dyn HttpClient,
    payment_history: &dyn PaymentHistory,
    pay_request: &LnurlPayRequestDetails,
    network: BitcoinNetwork,
    amount_msat: u64,
    comment: Option<&str>,
) -> Result<PayCallbackResponse, LnurlPayError> {
    let response = request_invoice(http_client, pay_request, amount_msat, comment).await?;
    let already_paid = payment_history
        .has_succeeded_payment(&response.invoice.payment_hash)
        .await
        .map_err(|e| LnurlPayError::PaymentEngine(e.to_string()))?;
    validate_pay_invoice(&response.invoice, network, amount_msat, already_paid)
        .map_err(RemoteError::from)?;
    Ok(response)
}

impl FlowActor for LnurlPayFlow {
    type Intent = LnurlPayIntent;
    type State = LnurlPayState;
    type Output = PayStep;

    fn state(&self) -> &LnurlPayState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LnurlPayState {
        &mut self.state
    }

    fn handle_intent(
        &mut self,
        intent: LnurlPayIntent,
        operation: &mut CancellableOperation<PayStep>,
    ) {
        match intent {
            LnurlPayIntent::RequestInvoice {
                amount_msat,
                comment,
            } => {
                if matches!(
                    self.state,
                    LnurlPayState::Init { .. } | LnurlPayState::Failed { .. }
                ) {
                    self.request_invoice(amount_msat, comment, operation);
                } else {
                    debug!("Ignoring invoice request in phase {:?}", self.state.phase());
                }
            }
            LnurlPayIntent::Cancel => match self.state {
                LnurlPayState::RequestingInvoice { .. } => {
                    operation.cancel();
                    self.state = LnurlPayState::Init {
                        balance_msat: self.balance_msat(),
                    };
                }
                LnurlPayState::PayingInvoice { .. } => {
                    debug!("Invoice is already with the payment engine, ignoring cancel");
                }
                _ => debug!("Nothing to cancel"),
            },
        }
    }

    fn handle_completed(
        &mut self,
        output: PayStep,
        operation: &mut CancellableOperation<PayStep>,
    ) {
        match output {
            PayStep::InvoiceReceived(Ok(response)) => {
                let PayCallbackResponse {
                    invoice,
                    success_action,
                } = response;
                let payment_engine = Arc::clone(&self.payment_engine);
                let bolt11 = invoice.bolt11.clone();
                operation.continue_with(async move {
                    PayStep::Paid {
                        result: payment_engine.pay_invoice(&bolt11, None).await,
                        success_action,
                    }
                });
                self.state = LnurlPayState::PayingInvoice { invoice };
            }
            PayStep::InvoiceReceived(Err(error)) => self.fail(error),
            PayStep::Paid {
                result: Ok(ack),
                success_action,
            } => {
                info!("LNURL-pay to {} succeeded", self.pay_request.domain);
                self.state = LnurlPayState::Succeeded {
                    success_action: success_action
                        .map(|action| action.process(ack.preimage.as_ref())),
                    payment_hash: ack.payment_hash,
                };
            }
            PayStep::Paid { result: Err(e), .. } => {
                self.fail(LnurlPayError::PaymentEngine(e.to_string()));
            }
        }
    }
}
