use std::sync::Arc;

use platform_utils::HttpClient;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    input::{
        ClassificationError, ClassificationResult, OnchainAddressDetails, PaymentInput,
        bip21::{Bip21Uri, parse_bip21},
        normalize::normalize,
    },
    invoice::{Bolt11InvoiceDetails, parse_invoice},
    lnurl::{
        auth::{LnurlAuthRequestDetails, parse_auth_request},
        decode_lnurl, from_json, get_json, non_blank_string,
        pay::parse_pay_terms,
        resolve_lnurl_alias,
        withdraw::parse_withdraw_terms,
    },
    network::BitcoinNetwork,
};

const LIGHTNING_ADDRESS_PATH: &str = "/.well-known/lnurlp/";

/// The `tag` every LNURL terms response carries.
#[derive(Debug, Deserialize)]
struct LnurlTag {
    #[serde(default, deserialize_with = "non_blank_string")]
    tag: Option<String>,
}

/// Where an LNURL leads before any request is made.
#[derive(Debug)]
enum LnurlTarget {
    /// `tag=login` URLs are resolved offline.
    Auth(LnurlAuthRequestDetails),
    /// Everything else needs the service terms.
    Service {
        url: Url,
        lightning_address: Option<String>,
    },
}

/// Turns untrusted text into a [`PaymentInput`].
///
/// Probes run in a fixed order and the first one that recognizes the text
/// wins: BOLT11 invoice, LNURL, then bitcoin address or BIP-21 URI.
pub struct InputParser<C: ?Sized> {
    http_client: Arc<C>,
    network: BitcoinNetwork,
    prefer_lightning_in_bip21: bool,
}

impl<C> InputParser<C>
where
    C: HttpClient + ?Sized,
{
    pub fn new(http_client: Arc<C>, network: BitcoinNetwork) -> Self {
        InputParser {
            http_client,
            network,
            prefer_lightning_in_bip21: true,
        }
    }

    /// When unset, a `lightning` invoice found in a BIP-21 URI is attached
    /// to the on-chain result instead of replacing it.
    #[must_use]
    pub fn with_prefer_lightning_in_bip21(mut self, prefer: bool) -> Self {
        self.prefer_lightning_in_bip21 = prefer;
        self
    }

    pub fn network(&self) -> BitcoinNetwork {
        self.network
    }

    pub async fn classify(&self, text: &str) -> ClassificationResult<PaymentInput> {
        let input = normalize(text);
        if input.is_empty() {
            return Err(ClassificationError::Malformed);
        }

        if let Some(invoice) = parse_invoice(&input) {
            debug!("Input is a BOLT11 invoice");
            return Ok(PaymentInput::LightningInvoice(invoice));
        }

        if let Some(target) = probe_lnurl(&input)? {
            return self.resolve_lnurl(target).await;
        }

        let uri = parse_bip21(&input, self.network)?;
        self.resolve_bip21(uri).await
    }

    /// Offline variant of [`Self::classify`] for clipboard previews: never
    /// issues a request and answers [`PaymentInput::Unrecognized`] for
    /// anything it cannot resolve locally.
    pub fn inspect_clipboard(&self, text: &str) -> PaymentInput {
        let input = normalize(text);
        if let Some(invoice) = parse_invoice(&input) {
            return PaymentInput::LightningInvoice(invoice);
        }

        match probe_lnurl(&input) {
            Ok(Some(LnurlTarget::Auth(details))) => return PaymentInput::LnurlAuth(details),
            Ok(Some(LnurlTarget::Service { .. })) | Err(_) => return PaymentInput::Unrecognized,
            Ok(None) => {}
        }

        let Ok(mut uri) = parse_bip21(&input, self.network) else {
            return PaymentInput::Unrecognized;
        };
        let invoice = uri
            .lightning
            .take()
            .and_then(|lightning| parse_invoice(&normalize(&lightning)));
        match (invoice, self.prefer_lightning_in_bip21 || uri.address.is_none()) {
            (Some(invoice), true) => PaymentInput::LightningInvoice(invoice),
            (invoice, _) => onchain_details(uri, invoice.map(Box::new))
                .map_or(PaymentInput::Unrecognized, PaymentInput::OnchainAddress),
        }
    }

    async fn resolve_lnurl(&self, target: LnurlTarget) -> ClassificationResult<PaymentInput> {
        let (url, lightning_address) = match target {
            LnurlTarget::Auth(details) => {
                debug!("Input is an LNURL-auth challenge for {}", details.domain);
                return Ok(PaymentInput::LnurlAuth(details));
            }
            LnurlTarget::Service {
                url,
                lightning_address,
            } => (url, lightning_address),
        };

        info!("Fetching LNURL terms from {}", url.host_str().unwrap_or_default());
        let json: Value = get_json(self.http_client.as_ref(), &url).await?;
        let LnurlTag { tag } = from_json(json.clone())?;
        match tag.as_deref() {
            Some("payRequest") => Ok(PaymentInput::LnurlPay(parse_pay_terms(
                from_json(json)?,
                &url,
                lightning_address,
            )?)),
            Some("withdrawRequest") => Ok(PaymentInput::LnurlWithdraw(parse_withdraw_terms(
                from_json(json)?,
                &url,
            )?)),
            Some(tag) => {
                warn!("Unsupported LNURL tag: {tag}");
                Err(ClassificationError::UnsupportedLnurlTag {
                    tag: tag.to_string(),
                })
            }
            None => Err(ClassificationError::missing("tag")),
        }
    }

    async fn resolve_bip21(&self, mut uri: Bip21Uri) -> ClassificationResult<PaymentInput> {
        let lightning = match uri.lightning.take() {
            Some(value) => match self.resolve_lightning_param(&value).await {
                Ok(resolved) => Some(resolved),
                Err(e) if uri.address.is_some() => {
                    warn!("Ignoring unusable lightning parameter: {e}");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let mut embedded_invoice = None;
        match lightning {
            Some(resolved) if self.prefer_lightning_in_bip21 || uri.address.is_none() => {
                return Ok(resolved);
            }
            Some(PaymentInput::LightningInvoice(invoice)) => {
                embedded_invoice = Some(Box::new(invoice));
            }
            _ => {}
        }

        onchain_details(uri, embedded_invoice)
            .map(PaymentInput::OnchainAddress)
            .ok_or(ClassificationError::Malformed)
    }

    /// Classifies the `lightning` parameter of a BIP-21 URI. Only Lightning
    /// kinds are accepted there.
    async fn resolve_lightning_param(&self, value: &str) -> ClassificationResult<PaymentInput> {
        let value = normalize(value);
        if let Some(invoice) = parse_invoice(&value) {
            return Ok(PaymentInput::LightningInvoice(invoice));
        }
        match probe_lnurl(&value)? {
            Some(target) => self.resolve_lnurl(target).await,
            None => Err(ClassificationError::Malformed),
        }
    }
}

/// Recognizes every spelling of an LNURL. `Ok(None)` means the text is not
/// an LNURL at all and the next probe should run.
fn probe_lnurl(input: &str) -> ClassificationResult<Option<LnurlTarget>> {
    let url = match decode_lnurl(input) {
        Ok(url) => url,
        Err(ClassificationError::Malformed) => match resolve_lnurl_alias(input) {
            Some(Ok(url)) => url,
            Some(Err(ClassificationError::Malformed)) | None => return Ok(None),
            Some(Err(e)) => return Err(e),
        },
        Err(e) => return Err(e),
    };

    let is_login = url
        .query_pairs()
        .any(|(key, value)| key == "tag" && value == "login");
    if is_login {
        return Ok(Some(LnurlTarget::Auth(parse_auth_request(&url)?)));
    }

    let lightning_address = (input.contains('@') && url.path().starts_with(LIGHTNING_ADDRESS_PATH))
        .then(|| input.to_lowercase());
    Ok(Some(LnurlTarget::Service {
        url,
        lightning_address,
    }))
}

fn onchain_details(
    uri: Bip21Uri,
    embedded_invoice: Option<Box<Bolt11InvoiceDetails>>,
) -> Option<OnchainAddressDetails> {
    let (address, network) = uri.address?;
    Some(OnchainAddressDetails {
        address,
        network,
        amount_sat: uri.amount_sat,
        label: uri.label,
        message: uri.message,
        embedded_invoice,
        ignored_params: uri.ignored_params,
    })
}

#[cfg(test)]
mod tests;
