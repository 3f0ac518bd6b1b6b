use platform_utils::HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    ensure_input,
    input::{ClassificationError, ClassificationResult},
    invoice::{Bolt11InvoiceDetails, parse_invoice},
    network::BitcoinNetwork,
};

use super::{
    get_json, lenient_msat, non_blank_string, require_https,
    error::{LnurlResult, RemoteError, RequestInputError, ResponseValidation, ensure_amount_in_range},
    success_action::SuccessAction,
    url_domain,
};

/// Terms of an LNURL-pay service, as per
/// <https://github.com/lnurl/luds/blob/luds/06.md>
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayRequestDetails {
    pub callback: String,
    /// The minimum amount, in millisats, that this service accepts
    pub min_sendable: u64,
    /// The maximum amount, in millisats, that this service accepts
    pub max_sendable: u64,
    /// The `metadata` string exactly as served.
    pub metadata_str: String,
    pub metadata: LnurlPayMetadata,
    /// Longest comment accepted, 0 when comments are not supported (LUD-12).
    pub comment_allowed: u16,
    /// Host of the LNURL-pay endpoint, shown to the user.
    pub domain: String,
    pub url: String,
    /// Set when the service was reached through a Lightning address.
    pub lightning_address: Option<String>,
}

/// Parsed entries of the LNURL-pay `metadata` array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayMetadata {
    pub plain_text: String,
    pub long_desc: Option<String>,
    /// Base64 encoded thumbnail.
    pub image_png: Option<String>,
    pub image_jpeg: Option<String>,
    pub identifier: Option<String>,
    pub email: Option<String>,
}

/// Invoice returned by the pay callback, not yet checked against the
/// wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayCallbackResponse {
    pub invoice: Bolt11InvoiceDetails,
    pub success_action: Option<SuccessAction>,
}

/// Raw `payRequest` response. Fields are checked by [`parse_pay_terms`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PayTermsResponse {
    #[serde(default, deserialize_with = "non_blank_string")]
    callback: Option<String>,
    #[serde(default, deserialize_with = "lenient_msat")]
    min_sendable: Option<u64>,
    #[serde(default, deserialize_with = "lenient_msat")]
    max_sendable: Option<u64>,
    #[serde(default, deserialize_with = "non_blank_string")]
    metadata: Option<String>,
    #[serde(default, deserialize_with = "lenient_msat")]
    comment_allowed: Option<u64>,
}

/// Raw response of the pay callback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayCallbackBody {
    #[serde(default, deserialize_with = "non_blank_string")]
    pr: Option<String>,
    #[serde(default)]
    success_action: Option<Value>,
}

pub(crate) fn parse_pay_terms(
    response: PayTermsResponse,
    url: &Url,
    lightning_address: Option<String>,
) -> ClassificationResult<LnurlPayRequestDetails> {
    let callback = response
        .callback
        .ok_or_else(|| ClassificationError::missing("callback"))?;
    let callback_url =
        Url::parse(&callback).map_err(|e| ClassificationError::invalid("callback", e.to_string()))?;
    require_https(&callback_url)?;

    let min_sendable = response
        .min_sendable
        .filter(|min| *min > 0)
        .ok_or_else(|| ClassificationError::missing("minSendable"))?;
    let max_sendable = response
        .max_sendable
        .ok_or_else(|| ClassificationError::missing("maxSendable"))?
        .max(min_sendable);

    let metadata_str = response
        .metadata
        .ok_or_else(|| ClassificationError::missing("metadata"))?;
    let metadata = parse_metadata(&metadata_str)?;

    let comment_allowed = response
        .comment_allowed
        .map(|len| u16::try_from(len).unwrap_or(u16::MAX))
        .unwrap_or_default();

    Ok(LnurlPayRequestDetails {
        callback: callback_url.to_string(),
        min_sendable,
        max_sendable,
        metadata_str,
        metadata,
        comment_allowed,
        domain: url_domain(url)?,
        url: url.to_string(),
        lightning_address,
    })
}

/// Parses the `[[mime, value], ...]` metadata string. A `text/plain`
/// entry is mandatory, unknown entries are skipped.
pub fn parse_metadata(raw: &str) -> ClassificationResult<LnurlPayMetadata> {
    let entries: Vec<Value> = serde_json::from_str(raw)
        .map_err(|e| ClassificationError::invalid("metadata", e.to_string()))?;

    let mut plain_text = None;
    let mut metadata = LnurlPayMetadata::default();
    for entry in &entries {
        let Some([Value::String(mime), Value::String(value)]) =
            entry.as_array().map(Vec::as_slice)
        else {
            debug!("Skipping unreadable metadata entry: {entry}");
            continue;
        };
        let value = Some(value.clone());
        match mime.as_str() {
            "text/plain" => plain_text = value,
            "text/long-desc" => metadata.long_desc = value,
            "image/png;base64" => metadata.image_png = value,
            "image/jpeg;base64" => metadata.image_jpeg = value,
            "text/identifier" => metadata.identifier = value,
            "text/email" => metadata.email = value,
            other => debug!("Ignoring metadata entry of type {other}"),
        }
    }

    metadata.plain_text = plain_text.ok_or_else(|| ClassificationError::missing("text/plain"))?;
    Ok(metadata)
}

/// Checks the user's amount and comment against the service terms.
pub fn validate_user_input(
    pay_request: &LnurlPayRequestDetails,
    amount_msat: u64,
    comment: Option<&str>,
) -> Result<(), RequestInputError> {
    ensure_amount_in_range(amount_msat, pay_request.min_sendable, pay_request.max_sendable)?;

    let length = comment.map_or(0, |comment| comment.chars().count());
    let max_length = usize::from(pay_request.comment_allowed);
    ensure_input!(
        length <= max_length,
        RequestInputError::CommentTooLong { length, max_length }
    );
    Ok(())
}

pub fn build_pay_callback_url(
    pay_request: &LnurlPayRequestDetails,
    amount_msat: u64,
    comment: Option<&str>,
) -> LnurlResult<Url> {
    let mut url = Url::parse(&pay_request.callback).map_err(|e| {
        RemoteError::from(ResponseValidation::InvalidCallback {
            reason: e.to_string(),
        })
    })?;
    url.query_pairs_mut()
        .append_pair("amount", &amount_msat.to_string());
    if let Some(comment) = comment.filter(|comment| !comment.is_empty()) {
        url.query_pairs_mut().append_pair("comment", comment);
    }
    Ok(url)
}

/// Second step of LNURL-pay: asks the service for an invoice of
/// `amount_msat`. The returned invoice still needs
/// [`validate_pay_invoice`].
pub async fn request_invoice<C: HttpClient + ?Sized>(
    http_client: &C,
    pay_request: &LnurlPayRequestDetails,
    amount_msat: u64,
    comment: Option<&str>,
) -> LnurlResult<PayCallbackResponse> {
    let url = build_pay_callback_url(pay_request, amount_msat, comment)?;
    let body: PayCallbackBody = get_json(http_client, &url).await?;

    let pr = body.pr.ok_or_else(|| malformed("response has no invoice"))?;
    let invoice = parse_invoice(&pr).ok_or_else(|| malformed("not a bolt11 invoice"))?;

    let success_action = match body.success_action {
        None => None,
        Some(value) => {
            let action: SuccessAction = serde_json::from_value(value).map_err(|e| {
                ResponseValidation::InvalidSuccessAction {
                    reason: e.to_string(),
                }
            })?;
            action.validate(&url)?;
            Some(action)
        }
    };

    Ok(PayCallbackResponse {
        invoice,
        success_action,
    })
}

/// Checks the invoice returned by a pay callback against the request and
/// the wallet, in a fixed order.
pub fn validate_pay_invoice(
    invoice: &Bolt11InvoiceDetails,
    network: BitcoinNetwork,
    requested_msat: u64,
    already_paid: bool,
) -> Result<(), ResponseValidation> {
    ensure_input!(!already_paid, ResponseValidation::AlreadyPaidInvoice);
    ensure_input!(
        invoice.network == network,
        ResponseValidation::ChainMismatch {
            expected: network,
            actual: invoice.network,
        }
    );
    ensure_input!(
        invoice.amount_msat == Some(requested_msat),
        ResponseValidation::InvalidAmount {
            requested_msat,
            invoice_msat: invoice.amount_msat,
        }
    );
    Ok(())
}

fn malformed(reason: &str) -> RemoteError {
    ResponseValidation::MalformedInvoice {
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use crate::{
        invoice::tests::MAINNET_INVOICE, lnurl::read_json_response,
        test_utils::mock_rest_client::MockRestClient,
    };
    use platform_utils::HttpResponse;

    use super::*;

    pub(crate) fn pay_terms_json() -> Value {
        json!({
            "tag": "payRequest",
            "callback": "https://service.com/lnurlp/callback",
            "minSendable": 1000,
            "maxSendable": 100_000,
            "metadata": "[[\"text/plain\",\"Pay to service\"],[\"text/identifier\",\"satoshi@service.com\"],[\"image/png;base64\",\"iVBOR\"],[\"custom/type\",\"x\"]]",
            "commentAllowed": 20,
        })
    }

    fn parse(body: Value) -> ClassificationResult<LnurlPayRequestDetails> {
        let response = read_json_response(&HttpResponse {
            status: 200,
            body: body.to_string(),
        })
        .unwrap();
        let url = Url::parse("https://service.com/.well-known/lnurlp/satoshi").unwrap();
        parse_pay_terms(response, &url, Some("satoshi@service.com".into()))
    }

    #[test]
    fn test_parse_pay_terms() {
        let terms = parse(pay_terms_json()).unwrap();
        assert_eq!(terms.min_sendable, 1000);
        assert_eq!(terms.max_sendable, 100_000);
        assert_eq!(terms.comment_allowed, 20);
        assert_eq!(terms.domain, "service.com");
        assert_eq!(terms.metadata.plain_text, "Pay to service");
        assert_eq!(terms.metadata.identifier.as_deref(), Some("satoshi@service.com"));
        assert_eq!(terms.metadata.image_png.as_deref(), Some("iVBOR"));
        assert_eq!(terms.metadata.long_desc, None);
    }

    #[test]
    fn test_parse_pay_terms_coerces_max() {
        let mut body = pay_terms_json();
        body["maxSendable"] = json!(10);
        let terms = parse(body).unwrap();
        assert_eq!(terms.max_sendable, terms.min_sendable);
    }

    #[test]
    fn test_parse_pay_terms_missing_fields() {
        for field in ["callback", "minSendable", "maxSendable", "metadata"] {
            let mut body = pay_terms_json();
            body.as_object_mut().unwrap().remove(field);
            assert_eq!(parse(body), Err(ClassificationError::missing(field)));
        }

        let mut body = pay_terms_json();
        body["minSendable"] = json!(0);
        assert_eq!(parse(body), Err(ClassificationError::missing("minSendable")));

        let mut body = pay_terms_json();
        body["metadata"] = json!("[[\"text/long-desc\",\"no plain text\"]]");
        assert_eq!(parse(body), Err(ClassificationError::missing("text/plain")));

        let mut body = pay_terms_json();
        body["callback"] = json!("http://service.com/callback");
        assert_eq!(parse(body), Err(ClassificationError::NonHttpsLnurl));
    }

    #[test]
    fn test_validate_user_input() {
        let terms = parse(pay_terms_json()).unwrap();
        assert!(validate_user_input(&terms, 1000, None).is_ok());
        assert!(validate_user_input(&terms, 100_000, Some("thanks")).is_ok());
        assert_eq!(
            validate_user_input(&terms, 999, None),
            Err(RequestInputError::AmountBelowMinimum {
                amount_msat: 999,
                min_msat: 1000
            })
        );
        assert!(matches!(
            validate_user_input(&terms, 100_001, None),
            Err(RequestInputError::AmountAboveMaximum { .. })
        ));
        assert_eq!(
            validate_user_input(&terms, 5000, Some(&"a".repeat(21))),
            Err(RequestInputError::CommentTooLong {
                length: 21,
                max_length: 20
            })
        );
    }

    #[test]
    fn test_build_pay_callback_url() {
        let terms = parse(pay_terms_json()).unwrap();
        let url = build_pay_callback_url(&terms, 5000, Some("gm & gn")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://service.com/lnurlp/callback?amount=5000&comment=gm+%26+gn"
        );
        let url = build_pay_callback_url(&terms, 5000, Some("")).unwrap();
        assert_eq!(url.as_str(), "https://service.com/lnurlp/callback?amount=5000");
    }

    #[test_log::test(tokio::test)]
    async fn test_request_invoice() -> anyhow::Result<()> {
        let terms = parse(pay_terms_json())?;
        let mock = MockRestClient::new();
        mock.add_response(
            200,
            json!({
                "pr": MAINNET_INVOICE,
                "routes": [],
                "successAction": {"tag": "message", "message": "Thanks"},
            })
            .to_string(),
        );

        let response = request_invoice(&mock, &terms, 11_000, None).await?;
        assert_eq!(response.invoice.amount_msat, Some(11_000));
        assert_eq!(
            response.success_action,
            Some(SuccessAction::Message {
                message: "Thanks".into()
            })
        );
        assert_eq!(
            mock.requests()[0].url,
            "https://service.com/lnurlp/callback?amount=11000"
        );
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_request_invoice_errors() {
        let terms = parse(pay_terms_json()).unwrap();
        let mock = MockRestClient::new();
        mock.add_response(200, json!({"status": "ERROR", "reason": "Route not found"}).to_string())
            .add_response(200, json!({"pr": "lnbc1garbage"}).to_string())
            .add_response(200, json!({"pr": MAINNET_INVOICE, "successAction": {"tag": "unknown"}}).to_string());

        assert_eq!(
            request_invoice(&mock, &terms, 11_000, None).await,
            Err(RemoteError::ServerReportedError {
                message: "Route not found".into()
            })
        );
        assert!(matches!(
            request_invoice(&mock, &terms, 11_000, None).await,
            Err(RemoteError::ResponseValidationFailure {
                detail: ResponseValidation::MalformedInvoice { .. }
            })
        ));
        assert!(matches!(
            request_invoice(&mock, &terms, 11_000, None).await,
            Err(RemoteError::ResponseValidationFailure {
                detail: ResponseValidation::InvalidSuccessAction { .. }
            })
        ));
    }

    #[test]
    fn test_validate_pay_invoice() {
        let invoice = parse_invoice(MAINNET_INVOICE).unwrap();
        assert!(validate_pay_invoice(&invoice, BitcoinNetwork::Bitcoin, 11_000, false).is_ok());
        assert_eq!(
            validate_pay_invoice(&invoice, BitcoinNetwork::Bitcoin, 11_000, true),
            Err(ResponseValidation::AlreadyPaidInvoice)
        );
        assert_eq!(
            validate_pay_invoice(&invoice, BitcoinNetwork::Regtest, 12_000, false),
            Err(ResponseValidation::ChainMismatch {
                expected: BitcoinNetwork::Regtest,
                actual: BitcoinNetwork::Bitcoin
            })
        );
        assert_eq!(
            validate_pay_invoice(&invoice, BitcoinNetwork::Bitcoin, 12_000, false),
            Err(ResponseValidation::InvalidAmount {
                requested_msat: 12_000,
                invoice_msat: Some(11_000)
            })
        );
    }
}
