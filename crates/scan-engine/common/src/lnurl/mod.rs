pub mod auth;
pub mod error;
pub mod pay;
pub mod success_action;
pub mod withdraw;

use platform_utils::{HttpClient, HttpResponse};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    input::{
        ClassificationError, ClassificationResult,
        normalize::{has_prefix, strip_prefix_ignore_case},
    },
    utils::sanitize_reason,
};

use self::error::{LnurlResult, RemoteError};

const LNURL_HRP: &str = "lnurl";

/// Prefixes a pasted LNURL may carry on top of the generic scheme prefixes.
const LNURL_PREFIXES: [&str; 2] = ["lnurl://", "lnurl:"];

/// LUD-17 schemes, all resolved over https.
const LNURL_SCHEME_PREFIXES: [&str; 4] = ["lnurlp://", "lnurlw://", "lnurlc://", "keyauth://"];

/// Longest server supplied error reason shown to the user.
const MAX_REASON_CHARS: usize = 90;

/// Decodes a bech32 LNURL into the https URL it encodes.
///
/// Fails with [`ClassificationError::Malformed`] if `input` is not a bech32
/// string with the `lnurl` prefix and with [`ClassificationError::NonHttpsLnurl`]
/// if the encoded URL uses any other scheme than https.
pub fn decode_lnurl(input: &str) -> ClassificationResult<Url> {
    let input = LNURL_PREFIXES
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(input, prefix))
        .unwrap_or(input);
    let (hrp, data) = bech32::decode(input).map_err(|_| ClassificationError::Malformed)?;
    if hrp.to_lowercase() != LNURL_HRP {
        return Err(ClassificationError::Malformed);
    }

    let decoded = String::from_utf8(data).map_err(|_| ClassificationError::Malformed)?;
    let url = Url::parse(&decoded).map_err(|_| ClassificationError::Malformed)?;
    require_https(&url)?;
    Ok(url)
}

/// Encodes a URL as a bech32 LNURL, lowercase.
pub fn encode_lnurl(url: &str) -> Result<String, String> {
    let hrp = bech32::Hrp::parse(LNURL_HRP).map_err(|e| e.to_string())?;
    let encoded =
        bech32::encode::<bech32::Bech32>(hrp, url.as_bytes()).map_err(|e| e.to_string())?;
    Ok(encoded.to_lowercase())
}

/// Resolves the non-bech32 spellings of an LNURL: LUD-17 schemes, Lightning
/// addresses (LUD-16) and https URLs carrying a `lightning` fallback
/// parameter. Returns `None` when `input` is none of these.
pub(crate) fn resolve_lnurl_alias(input: &str) -> Option<ClassificationResult<Url>> {
    if let Some(rest) = LNURL_SCHEME_PREFIXES
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(input, prefix))
    {
        return Some(Url::parse(&format!("https://{rest}")).map_err(|_| ClassificationError::Malformed));
    }

    if let Some(url) = lightning_address_url(input) {
        return Some(Ok(url));
    }

    if has_prefix(input, "https://") || has_prefix(input, "http://") {
        let url = Url::parse(input).ok()?;
        let fallback = url
            .query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("lightning"))
            .map(|(_, value)| value.into_owned())?;
        return Some(decode_lnurl(&fallback));
    }

    None
}

/// Maps `user@domain` to its LUD-16 well-known URL.
fn lightning_address_url(input: &str) -> Option<Url> {
    let (user, domain) = input.split_once('@')?;
    let user = user.to_lowercase();
    let valid_user = !user.is_empty()
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'));
    if !valid_user || !domain.contains('.') || domain.contains(['/', '?', '#']) {
        return None;
    }

    Url::parse(&format!("https://{domain}/.well-known/lnurlp/{user}")).ok()
}

pub(crate) fn require_https(url: &Url) -> ClassificationResult<()> {
    if url.scheme() != "https" {
        return Err(ClassificationError::NonHttpsLnurl);
    }
    Ok(())
}

/// Host of an LNURL, which is what the user is shown and what keys are
/// scoped to.
pub(crate) fn url_domain(url: &Url) -> ClassificationResult<String> {
    url.host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| ClassificationError::missing("domain"))
}

/// `status`/`reason` pair any LNURL endpoint may answer with.
#[derive(Debug, Default, Deserialize)]
struct LnurlErrorDetails {
    #[serde(default, deserialize_with = "non_blank_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "non_blank_string")]
    reason: Option<String>,
}

/// Interprets an LNURL endpoint response and deserializes it into `T`.
///
/// The body is read as JSON whatever the status code, because services
/// report `{"status":"ERROR","reason":...}` with both 2xx and 4xx codes.
pub fn read_json_response<T: DeserializeOwned>(response: &HttpResponse) -> LnurlResult<T> {
    let json = match response.json::<Value>() {
        Ok(json @ Value::Object(_)) => json,
        _ => {
            warn!("Unreadable LNURL response with status {}", response.status);
            return Err(if response.is_success() {
                RemoteError::UnreadableBody
            } else {
                RemoteError::HttpFailure {
                    code: response.status,
                }
            });
        }
    };

    let details = LnurlErrorDetails::deserialize(&json).unwrap_or_default();
    let is_error_status = details
        .status
        .is_some_and(|status| status.eq_ignore_ascii_case("error"));
    if is_error_status {
        let reason = details
            .reason
            .map(|reason| sanitize_reason(&reason, MAX_REASON_CHARS))
            .unwrap_or_default();
        debug!("LNURL service reported an error: {reason}");
        return Err(match (reason.is_empty(), response.is_success()) {
            (false, _) => RemoteError::ServerReportedError { message: reason },
            (true, true) => RemoteError::UnreadableBody,
            (true, false) => RemoteError::HttpFailure {
                code: response.status,
            },
        });
    }

    if !response.is_success() {
        return Err(RemoteError::HttpFailure {
            code: response.status,
        });
    }

    from_json(json)
}

/// Deserializes a JSON value already read by [`read_json_response`].
pub(crate) fn from_json<T: DeserializeOwned>(json: Value) -> LnurlResult<T> {
    serde_json::from_value(json).map_err(|e| {
        warn!("Unexpected LNURL response: {e}");
        RemoteError::UnreadableBody
    })
}

/// Issues a GET and deserializes the LNURL JSON response.
pub async fn get_json<C: HttpClient + ?Sized, T: DeserializeOwned>(
    http_client: &C,
    url: &Url,
) -> LnurlResult<T> {
    let response = http_client.get(url.to_string(), None).await?;
    read_json_response(&response)
}

/// Reads a non-blank string. Any other JSON value counts as absent.
pub(crate) fn non_blank_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => Some(value.trim().to_string()).filter(|value| !value.is_empty()),
        _ => None,
    })
}

/// Reads a millisatoshi amount. Services send integers, floats or numeric
/// strings; fractions are truncated, negative and other values count as
/// absent.
pub(crate) fn lenient_msat<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    Ok(msat_from_value(&Value::deserialize(deserializer)?))
}

fn msat_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(f64_to_msat)
        }),
        Value::String(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| value.trim().parse::<f64>().ok().filter(|v| *v >= 0.0).map(f64_to_msat)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_msat(value: f64) -> u64 {
    value as u64
}
