//! Screen state for "the user pasted or scanned something".

use std::sync::Arc;

use platform_utils::HttpClient;
use scan_engine_common::{
    input::{ClassificationError, InputParser, OnchainAddressDetails, PaymentInput},
    invoice::Bolt11InvoiceDetails,
    lnurl::{
        auth::LnurlAuthRequestDetails, error::RemoteError, pay::LnurlPayRequestDetails,
        withdraw::LnurlWithdrawRequestDetails,
    },
    validation::{ValidationOutcome, ValidationPolicy, ValidationReason, validate},
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    balance::BalanceProjection,
    error::EngineError,
    models::PaymentAck,
    payment_engine::PaymentEngine,
    wallet::{PaymentHistory, WalletState, wallet_snapshot},
};

use super::{CancellableOperation, FlowActor, FlowPhase, FlowState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanIntent {
    Parse { text: String },
    /// Stops resolving an LNURL.
    CancelFetch,
    /// Accepts the risk reported by [`ScanState::DangerousRequest`].
    ConfirmDangerous,
    /// `amount_msat` is required for invoices without an amount.
    SendInvoicePayment { amount_msat: Option<u64> },
    Reset,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BadRequestReason {
    /// The input is not a usable payment request.
    Classification(ClassificationError),
    /// The LNURL service could not be reached or refused the request.
    ServiceError(RemoteError),
    Rejected(ValidationReason),
    MissingAmount,
    Wallet(String),
}

impl From<ClassificationError> for BadRequestReason {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::Remote(e) => Self::ServiceError(e),
            other => Self::Classification(other),
        }
    }
}

impl From<EngineError> for BadRequestReason {
    fn from(err: EngineError) -> Self {
        Self::Wallet(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanState {
    Ready,
    /// The input is being classified or validated, which may include
    /// fetching LNURL terms.
    ResolvingLnurl,
    BadRequest {
        reason: BadRequestReason,
    },
    DangerousRequest {
        invoice: Bolt11InvoiceDetails,
        reason: ValidationReason,
    },
    InvoiceRequest {
        invoice: Bolt11InvoiceDetails,
        balance_msat: u64,
    },
    OnchainRequest {
        details: OnchainAddressDetails,
    },
    LnurlPayRequest {
        details: LnurlPayRequestDetails,
    },
    LnurlWithdrawRequest {
        details: LnurlWithdrawRequestDetails,
    },
    LnurlAuthRequest {
        details: LnurlAuthRequestDetails,
    },
    Sending {
        invoice: Bolt11InvoiceDetails,
    },
    Sent {
        payment_hash: String,
    },
}

impl BalanceProjection for ScanState {
    fn project_balance(&mut self, balance: u64) {
        if let ScanState::InvoiceRequest { balance_msat, .. } = self {
            *balance_msat = balance;
        }
    }
}

impl FlowState for ScanState {
    fn phase(&self) -> FlowPhase {
        match self {
            ScanState::Ready => FlowPhase::Idle,
            ScanState::ResolvingLnurl => FlowPhase::FetchingTerms,
            ScanState::DangerousRequest { .. }
            | ScanState::InvoiceRequest { .. }
            | ScanState::OnchainRequest { .. }
            | ScanState::LnurlPayRequest { .. }
            | ScanState::LnurlWithdrawRequest { .. }
            | ScanState::LnurlAuthRequest { .. } => FlowPhase::AwaitingUserAmount,
            ScanState::Sending { .. } => FlowPhase::Submitting,
            ScanState::Sent { .. } => FlowPhase::Succeeded,
            ScanState::BadRequest { .. } => FlowPhase::Failed,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ScanStep {
    Resolved(Result<Resolution, BadRequestReason>),
    Sent(Result<PaymentAck, EngineError>),
}

/// A classified input. Invoices carry the outcome of their validation.
#[derive(Debug)]
pub(crate) enum Resolution {
    Invoice {
        invoice: Bolt11InvoiceDetails,
        outcome: ValidationOutcome,
    },
    Other(PaymentInput),
}

pub(crate) struct ScanFlow {
    parser: Arc<InputParser<dyn HttpClient>>,
    wallet: Arc<dyn WalletState>,
    payment_history: Arc<dyn PaymentHistory>,
    payment_engine: Arc<dyn PaymentEngine>,
    balance: watch::Receiver<u64>,
    state: ScanState,
}

impl ScanFlow {
    pub(crate) fn new(
        parser: Arc<InputParser<dyn HttpClient>>,
        wallet: Arc<dyn WalletState>,
        payment_history: Arc<dyn PaymentHistory>,
        payment_engine: Arc<dyn PaymentEngine>,
    ) -> Self {
        Self {
            parser,
            balance: wallet.balance(),
            wallet,
            payment_history,
            payment_engine,
            state: ScanState::Ready,
        }
    }

    fn parse(&mut self, text: String, operation: &mut CancellableOperation<ScanStep>) {
        let parser = Arc::clone(&self.parser);
        let wallet = Arc::clone(&self.wallet);
        let payment_history = Arc::clone(&self.payment_history);
        operation.launch(async move {
            let resolution = match parser.classify(&text).await {
                Ok(PaymentInput::LightningInvoice(invoice)) => {
                    check_invoice(
                        wallet.as_ref(),
                        payment_history.as_ref(),
                        invoice,
                        ValidationPolicy::default(),
                    )
                    .await
                }
                Ok(input) => Ok(Resolution::Other(input)),
                Err(e) => Err(e.into()),
            };
            ScanStep::Resolved(resolution)
        });
        self.state = ScanState::ResolvingLnurl;
    }

    fn confirm_dangerous(
        &mut self,
        invoice: Bolt11InvoiceDetails,
        operation: &mut CancellableOperation<ScanStep>,
    ) {
        let wallet = Arc::clone(&self.wallet);
        let payment_history = Arc::clone(&self.payment_history);
        operation.launch(async move {
            let policy = ValidationPolicy {
                amountless_acknowledged: true,
            };
            ScanStep::Resolved(
                check_invoice(wallet.as_ref(), payment_history.as_ref(), invoice, policy).await,
            )
        });
        self.state = ScanState::ResolvingLnurl;
    }

    fn send_payment(
        &mut self,
        invoice: Bolt11InvoiceDetails,
        amount_msat: Option<u64>,
        operation: &mut CancellableOperation<ScanStep>,
    ) {
        let amount_msat = match (invoice.amount_msat, amount_msat) {
            (Some(_), _) => None,
            (None, Some(amount_msat)) if amount_msat > 0 => Some(amount_msat),
            (None, _) => {
                self.state = ScanState::BadRequest {
                    reason: BadRequestReason::MissingAmount,
                };
                return;
            }
        };

        let payment_engine = Arc::clone(&self.payment_engine);
        let bolt11 = invoice.bolt11.clone();
        operation.launch(async move {
            ScanStep::Sent(payment_engine.pay_invoice(&bolt11, amount_msat).await)
        });
        self.state = ScanState::Sending { invoice };
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        self.state = match resolution {
            Resolution::Invoice { invoice, outcome } => match outcome {
                ValidationOutcome::Accepted => ScanState::InvoiceRequest {
                    invoice,
                    balance_msat: *self.balance.borrow(),
                },
                ValidationOutcome::Rejected { reason } => {
                    info!("Invoice rejected: {reason}");
                    ScanState::BadRequest {
                        reason: BadRequestReason::Rejected(reason),
                    }
                }
                ValidationOutcome::NeedsConfirmation { reason } => {
                    ScanState::DangerousRequest { invoice, reason }
                }
            },
            Resolution::Other(PaymentInput::OnchainAddress(details)) => {
                ScanState::OnchainRequest { details }
            }
            Resolution::Other(PaymentInput::LnurlPay(details)) => {
                ScanState::LnurlPayRequest { details }
            }
            Resolution::Other(PaymentInput::LnurlWithdraw(details)) => {
                ScanState::LnurlWithdrawRequest { details }
            }
            Resolution::Other(PaymentInput::LnurlAuth(details)) => {
                ScanState::LnurlAuthRequest { details }
            }
            Resolution::Other(PaymentInput::LightningInvoice(_) | PaymentInput::Unrecognized) => {
                ScanState::BadRequest {
                    reason: ClassificationError::Malformed.into(),
                }
            }
        };
    }
}

/// Validates `invoice` against a snapshot taken now.
async fn check_invoice(
    wallet: &dyn WalletState,
    payment_history: &dyn PaymentHistory,
    invoice: Bolt11InvoiceDetails,
    policy: ValidationPolicy,
) -> Result<Resolution, BadRequestReason> {
    let snapshot = wallet_snapshot(wallet, payment_history, &invoice).await?;
    let outcome = validate(&invoice, &snapshot, policy);
    debug!("Invoice {} validated: {outcome:?}", invoice.payment_hash);
    Ok(Resolution::Invoice { invoice, outcome })
}

impl FlowActor for ScanFlow {
    type Intent = ScanIntent;
    type State = ScanState;
    type Output = ScanStep;

    fn state(&self) -> &ScanState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ScanState {
        &mut self.state
    }

    fn handle_intent(
        &mut self,
        intent: ScanIntent,
        operation: &mut CancellableOperation<ScanStep>,
    ) {
        if matches!(self.state, ScanState::Sending { .. }) {
            debug!("Payment in flight, ignoring {intent:?}");
            return;
        }

        match intent {
            ScanIntent::Parse { text } => self.parse(text, operation),
            ScanIntent::CancelFetch => {
                if matches!(self.state, ScanState::ResolvingLnurl) {
                    operation.cancel();
                    self.state = ScanState::Ready;
                }
            }
            ScanIntent::ConfirmDangerous => {
                if let ScanState::DangerousRequest { invoice, .. } = &self.state {
                    let invoice = invoice.clone();
                    self.confirm_dangerous(invoice, operation);
                }
            }
            ScanIntent::SendInvoicePayment { amount_msat } => {
                if let ScanState::InvoiceRequest { invoice, .. } = &self.state {
                    let invoice = invoice.clone();
                    self.send_payment(invoice, amount_msat, operation);
                }
            }
            ScanIntent::Reset => {
                operation.cancel();
                self.state = ScanState::Ready;
            }
        }
    }

    fn handle_completed(
        &mut self,
        output: ScanStep,
        _operation: &mut CancellableOperation<ScanStep>,
    ) {
        match output {
            ScanStep::Resolved(Ok(resolution)) => self.apply_resolution(resolution),
            ScanStep::Resolved(Err(reason)) => {
                warn!("Input not usable: {reason:?}");
                self.state = ScanState::BadRequest { reason };
            }
            ScanStep::Sent(Ok(ack)) => {
                info!("Invoice {} paid", ack.payment_hash);
                self.state = ScanState::Sent {
                    payment_hash: ack.payment_hash,
                };
            }
            ScanStep::Sent(Err(e)) => {
                warn!("Invoice payment failed: {e}");
                self.state = ScanState::BadRequest { reason: e.into() };
            }
        }
    }
}
