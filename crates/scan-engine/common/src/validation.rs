//! Checks a decoded Lightning invoice against the wallet before it is paid.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{invoice::Bolt11InvoiceDetails, network::BitcoinNetwork};

/// Wallet facts an invoice is checked against. Built fresh for every
/// validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub network: BitcoinNetwork,
    /// Own node id, hex encoded.
    pub node_id: String,
    pub now_secs: u64,
    /// Whether a payment with the invoice's payment hash already succeeded.
    pub already_paid: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Set once the user confirmed paying an amountless invoice that does
    /// not advertise trampoline support.
    pub amountless_acknowledged: bool,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationReason {
    AlreadyPaid,
    SelfPayment,
    Expired,
    ChainMismatch,
    AmountlessPreTrampoline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValidationOutcome {
    Accepted,
    Rejected { reason: ValidationReason },
    NeedsConfirmation { reason: ValidationReason },
}

/// Runs the checks in a fixed order, the first failing one decides.
pub fn validate(
    invoice: &Bolt11InvoiceDetails,
    snapshot: &WalletSnapshot,
    policy: ValidationPolicy,
) -> ValidationOutcome {
    let rejection = if invoice.network != snapshot.network {
        Some(ValidationReason::ChainMismatch)
    } else if invoice.is_expired_at(snapshot.now_secs) {
        Some(ValidationReason::Expired)
    } else if invoice.payee_pubkey.eq_ignore_ascii_case(&snapshot.node_id) {
        Some(ValidationReason::SelfPayment)
    } else if snapshot.already_paid {
        Some(ValidationReason::AlreadyPaid)
    } else {
        None
    };
    if let Some(reason) = rejection {
        return ValidationOutcome::Rejected { reason };
    }

    if invoice.amount_msat.is_none()
        && !invoice.allows_trampoline
        && !policy.amountless_acknowledged
    {
        return ValidationOutcome::NeedsConfirmation {
            reason: ValidationReason::AmountlessPreTrampoline,
        };
    }

    ValidationOutcome::Accepted
}
