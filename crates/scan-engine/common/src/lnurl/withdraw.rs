use platform_utils::HttpClient;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use tracing::info;
use url::Url;

use crate::input::{ClassificationError, ClassificationResult};

use super::{
    get_json, lenient_msat, non_blank_string, require_https,
    error::{LnurlResult, RemoteError, RequestInputError, ResponseValidation, ensure_amount_in_range},
    url_domain,
};

/// Terms of an LNURL-withdraw service, as per
/// <https://github.com/lnurl/luds/blob/luds/03.md>
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlWithdrawRequestDetails {
    pub callback: String,
    pub k1: String,
    pub default_description: String,
    /// The minimum amount, in millisats, that this service can send.
    /// Never zero and never above `max_withdrawable`.
    pub min_withdrawable: u64,
    /// The maximum amount, in millisats, that this service can send.
    pub max_withdrawable: u64,
    pub domain: String,
}

impl LnurlWithdrawRequestDetails {
    pub fn validate_amount(&self, amount_msat: u64) -> Result<(), RequestInputError> {
        ensure_amount_in_range(amount_msat, self.min_withdrawable, self.max_withdrawable)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WithdrawTermsResponse {
    #[serde(default, deserialize_with = "non_blank_string")]
    callback: Option<String>,
    #[serde(default, deserialize_with = "non_blank_string")]
    k1: Option<String>,
    #[serde(default, deserialize_with = "lenient_msat")]
    min_withdrawable: Option<u64>,
    #[serde(default, deserialize_with = "lenient_msat")]
    max_withdrawable: Option<u64>,
    #[serde(default, deserialize_with = "non_blank_string")]
    default_description: Option<String>,
}

pub(crate) fn parse_withdraw_terms(
    response: WithdrawTermsResponse,
    url: &Url,
) -> ClassificationResult<LnurlWithdrawRequestDetails> {
    let callback = response
        .callback
        .ok_or_else(|| ClassificationError::missing("callback"))?;
    let callback_url =
        Url::parse(&callback).map_err(|e| ClassificationError::invalid("callback", e.to_string()))?;
    require_https(&callback_url)?;
    let k1 = response.k1.ok_or_else(|| ClassificationError::missing("k1"))?;

    // A missing or zero minimum falls back to 1 msat, clamped so that the
    // range never inverts.
    let floor = response.min_withdrawable.unwrap_or_default().max(1);
    let max_withdrawable = response
        .max_withdrawable
        .filter(|max| *max > 0)
        .unwrap_or(floor);
    let min_withdrawable = floor.min(max_withdrawable);

    Ok(LnurlWithdrawRequestDetails {
        callback: callback_url.to_string(),
        k1,
        default_description: response.default_description.unwrap_or_default(),
        min_withdrawable,
        max_withdrawable,
        domain: url_domain(url)?,
    })
}

pub fn build_withdraw_callback_url(
    withdraw_request: &LnurlWithdrawRequestDetails,
    bolt11: &str,
) -> LnurlResult<Url> {
    let mut url = Url::parse(&withdraw_request.callback).map_err(|e| {
        RemoteError::from(ResponseValidation::InvalidCallback {
            reason: e.to_string(),
        })
    })?;
    url.query_pairs_mut()
        .append_pair("k1", &withdraw_request.k1)
        .append_pair("pr", bolt11);
    Ok(url)
}

/// Second step of LNURL-withdraw: hands `bolt11` to the service, which
/// pays it asynchronously.
pub async fn submit_withdraw_invoice<C: HttpClient + ?Sized>(
    http_client: &C,
    withdraw_request: &LnurlWithdrawRequestDetails,
    bolt11: &str,
) -> LnurlResult<()> {
    let url = build_withdraw_callback_url(withdraw_request, bolt11)?;
    let _: IgnoredAny = get_json(http_client, &url).await?;
    info!("Withdraw invoice accepted by {}", withdraw_request.domain);
    Ok(())
}
