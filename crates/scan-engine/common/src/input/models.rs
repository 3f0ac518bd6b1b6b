use serde::{Deserialize, Serialize};

use crate::{
    invoice::Bolt11InvoiceDetails,
    lnurl::{
        auth::LnurlAuthRequestDetails, pay::LnurlPayRequestDetails,
        withdraw::LnurlWithdrawRequestDetails,
    },
    network::BitcoinNetwork,
};

/// What a piece of user supplied text resolved to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentInput {
    LightningInvoice(Bolt11InvoiceDetails),
    OnchainAddress(OnchainAddressDetails),
    LnurlAuth(LnurlAuthRequestDetails),
    LnurlPay(LnurlPayRequestDetails),
    LnurlWithdraw(LnurlWithdrawRequestDetails),
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainAddressDetails {
    pub address: String,
    pub network: BitcoinNetwork,
    pub amount_sat: Option<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
    /// Set when the URI carried a `lightning` invoice that was not preferred
    /// over the on-chain address.
    pub embedded_invoice: Option<Box<Bolt11InvoiceDetails>>,
    /// Keys of optional URI parameters the wallet does not understand.
    pub ignored_params: Vec<String>,
}
