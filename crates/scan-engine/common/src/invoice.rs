use lightning::bolt11_invoice::{Bolt11Invoice, Bolt11InvoiceDescriptionRef};
use serde::{Deserialize, Serialize};

use crate::network::BitcoinNetwork;

/// Feature bits advertising trampoline payments: the `trampoline_routing`
/// pair and the older `trampoline_payment_prototype` pair.
const TRAMPOLINE_FEATURE_BITS: [usize; 4] = [56, 57, 148, 149];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bolt11InvoiceDetails {
    pub bolt11: String,
    pub amount_msat: Option<u64>,
    /// Destination node id, hex encoded.
    pub payee_pubkey: String,
    pub payment_hash: String,
    pub description: Option<String>,
    pub description_hash: Option<String>,
    /// Seconds after `timestamp` during which the invoice can be paid.
    pub expiry: u64,
    pub timestamp: u64,
    pub network: BitcoinNetwork,
    pub allows_trampoline: bool,
}

impl Bolt11InvoiceDetails {
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.expiry)
    }

    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        now_secs > self.expires_at()
    }
}

/// Decodes a BOLT11 invoice. Returns `None` if `input` is not an invoice.
pub fn parse_invoice(input: &str) -> Option<Bolt11InvoiceDetails> {
    let bolt11: Bolt11Invoice = input.parse().ok()?;

    let (description, description_hash) = match bolt11.description() {
        Bolt11InvoiceDescriptionRef::Direct(description) => (Some(description.to_string()), None),
        Bolt11InvoiceDescriptionRef::Hash(sha256) => (None, Some(sha256.0.to_string())),
    };

    Some(Bolt11InvoiceDetails {
        bolt11: input.to_string(),
        amount_msat: bolt11.amount_milli_satoshis(),
        payee_pubkey: bolt11.get_payee_pub_key().to_string(),
        payment_hash: bolt11.payment_hash().to_string(),
        description,
        description_hash,
        expiry: bolt11.expiry_time().as_secs(),
        timestamp: bolt11.duration_since_epoch().as_secs(),
        network: bolt11.network().into(),
        allows_trampoline: bolt11
            .features()
            .is_some_and(|features| has_trampoline_bit(features.le_flags())),
    })
}

fn has_trampoline_bit(le_flags: &[u8]) -> bool {
    TRAMPOLINE_FEATURE_BITS.iter().any(|bit| {
        le_flags
            .get(bit / 8)
            .is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
    })
}
