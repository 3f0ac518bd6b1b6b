use std::sync::Arc;

use platform_utils::HttpError;
use rstest::rstest;
use serde_json::json;

use crate::{
    input::{ClassificationError, PaymentInput, parser::InputParser},
    invoice::tests::MAINNET_INVOICE,
    lnurl::{
        auth::tests::K1, encode_lnurl, error::RemoteError, pay::tests::pay_terms_json,
        withdraw::tests::withdraw_terms_json,
    },
    network::BitcoinNetwork,
    test_utils::mock_rest_client::MockRestClient,
};

fn test_parser() -> (InputParser<MockRestClient>, Arc<MockRestClient>) {
    let mock = Arc::new(MockRestClient::new());
    (InputParser::new(Arc::clone(&mock), BitcoinNetwork::Bitcoin), mock)
}

fn auth_lnurl() -> String {
    encode_lnurl(&format!("https://auth.service.com/login?tag=login&k1={K1}")).unwrap()
}

fn pay_lnurl() -> String {
    encode_lnurl("https://service.com/lnurlp/satoshi").unwrap()
}

#[rstest]
#[case("")]
#[case("lightning:")]
#[case("LIGHTNING:")]
#[case("lightning://")]
#[case("bitcoin:")]
#[case("Bitcoin://")]
#[tokio::test]
async fn test_prefix_stripping_is_idempotent(#[case] prefix: &str) {
    let (parser, mock) = test_parser();
    for bare in [
        MAINNET_INVOICE.to_string(),
        "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
        auth_lnurl(),
    ] {
        let expected = parser.classify(&bare).await.unwrap();
        let prefixed = parser.classify(&format!("{prefix}{bare}")).await.unwrap();
        assert_eq!(prefixed, expected);
    }
    assert!(mock.requests().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_lnurl_auth_is_resolved_without_request() {
    let (parser, mock) = test_parser();
    let input = parser.classify(&auth_lnurl()).await.unwrap();
    let PaymentInput::LnurlAuth(details) = input else {
        panic!("Expected LnurlAuth, got {input:?}");
    };
    assert_eq!(details.k1, K1);
    assert_eq!(details.domain, "auth.service.com");
    assert!(mock.requests().is_empty());

    let keyauth = parser
        .classify(&format!("keyauth://auth.service.com/login?tag=login&k1={K1}"))
        .await
        .unwrap();
    assert!(matches!(keyauth, PaymentInput::LnurlAuth(_)));
    assert!(mock.requests().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_lnurl_auth_requires_k1() {
    let (parser, mock) = test_parser();
    let lnurl = encode_lnurl("https://auth.service.com/login?tag=login").unwrap();
    assert_eq!(
        parser.classify(&lnurl).await,
        Err(ClassificationError::missing("k1"))
    );
    assert!(mock.requests().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_lnurl_must_be_https() {
    let (parser, mock) = test_parser();
    let lnurl = encode_lnurl("http://example.com").unwrap();
    assert_eq!(
        parser.classify(&lnurl).await,
        Err(ClassificationError::NonHttpsLnurl)
    );
    assert_eq!(
        parser.classify(&format!("lnurl:{lnurl}")).await,
        Err(ClassificationError::NonHttpsLnurl)
    );
    assert!(mock.requests().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_lnurl_pay() -> anyhow::Result<()> {
    let (parser, mock) = test_parser();
    mock.add_response(200, pay_terms_json().to_string());

    let input = parser.classify(&pay_lnurl()).await?;
    let PaymentInput::LnurlPay(details) = input else {
        panic!("Expected LnurlPay, got {input:?}");
    };
    assert_eq!(details.min_sendable, 1000);
    assert_eq!(details.max_sendable, 100_000);
    assert_eq!(details.comment_allowed, 20);
    assert_eq!(details.domain, "service.com");
    assert_eq!(details.lightning_address, None);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "https://service.com/lnurlp/satoshi");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_lightning_address() -> anyhow::Result<()> {
    let (parser, mock) = test_parser();
    mock.add_response(200, pay_terms_json().to_string());

    let input = parser.classify("lightning:Satoshi@Service.com").await?;
    let PaymentInput::LnurlPay(details) = input else {
        panic!("Expected LnurlPay, got {input:?}");
    };
    assert_eq!(
        details.lightning_address.as_deref(),
        Some("satoshi@service.com")
    );
    assert_eq!(
        mock.requests()[0].url,
        "https://service.com/.well-known/lnurlp/satoshi"
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_lnurl_withdraw_range() -> anyhow::Result<()> {
    let (parser, mock) = test_parser();
    let mut terms = withdraw_terms_json();
    terms.as_object_mut().unwrap().remove("minWithdrawable");
    terms["maxWithdrawable"] = json!(100_000);
    mock.add_response(200, terms.to_string());

    let lnurl = encode_lnurl("https://service.com/lnurlw").unwrap();
    let input = parser.classify(&lnurl).await?;
    let PaymentInput::LnurlWithdraw(details) = input else {
        panic!("Expected LnurlWithdraw, got {input:?}");
    };
    assert_eq!(details.min_withdrawable, 1);
    assert_eq!(details.max_withdrawable, 100_000);
    assert!(details.min_withdrawable <= details.max_withdrawable);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_lnurl_tag_dispatch_errors() {
    let (parser, mock) = test_parser();
    mock.add_response(200, json!({"tag": "channelRequest", "k1": "00"}).to_string())
        .add_response(200, json!({"callback": "https://service.com/cb"}).to_string());

    assert_eq!(
        parser.classify(&pay_lnurl()).await,
        Err(ClassificationError::UnsupportedLnurlTag {
            tag: "channelRequest".into()
        })
    );
    assert_eq!(
        parser.classify(&pay_lnurl()).await,
        Err(ClassificationError::missing("tag"))
    );
}

#[test_log::test(tokio::test)]
async fn test_lnurl_remote_errors_are_distinct() {
    let (parser, mock) = test_parser();
    mock.add_response(400, json!({"status": "ERROR", "reason": "Link expired"}).to_string())
        .add_response(404, "Not found")
        .add_error(HttpError::Connect("connection refused".into()));

    assert_eq!(
        parser.classify(&pay_lnurl()).await,
        Err(ClassificationError::Remote(RemoteError::ServerReportedError {
            message: "Link expired".into()
        }))
    );
    assert_eq!(
        parser.classify(&pay_lnurl()).await,
        Err(ClassificationError::Remote(RemoteError::HttpFailure {
            code: 404
        }))
    );
    assert!(matches!(
        parser.classify(&pay_lnurl()).await,
        Err(ClassificationError::Remote(RemoteError::NetworkFailure { .. }))
    ));
}

#[test_log::test(tokio::test)]
async fn test_bip21_unknown_param_is_ignored() {
    let (parser, _) = test_parser();
    let input = parser
        .classify("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?somethingunknown=50")
        .await
        .unwrap();
    let PaymentInput::OnchainAddress(details) = input else {
        panic!("Expected OnchainAddress, got {input:?}");
    };
    assert_eq!(details.address, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
    assert_eq!(details.network, BitcoinNetwork::Bitcoin);
    assert_eq!(details.ignored_params, vec!["somethingunknown".to_string()]);
}

#[test_log::test(tokio::test)]
async fn test_bip21_required_param_is_fatal() {
    let (parser, _) = test_parser();
    assert_eq!(
        parser
            .classify("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?req-foo=50")
            .await,
        Err(ClassificationError::UnhandledRequiredParams {
            params: vec!["req-foo".into()]
        })
    );
}

#[test_log::test(tokio::test)]
async fn test_bip21_chain_mismatch() {
    let mock = Arc::new(MockRestClient::new());
    let parser = InputParser::new(mock, BitcoinNetwork::Regtest);
    assert_eq!(
        parser.classify("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").await,
        Err(ClassificationError::ChainMismatch {
            expected: BitcoinNetwork::Regtest,
            actual: BitcoinNetwork::Bitcoin
        })
    );
}

#[test_log::test(tokio::test)]
async fn test_bip21_lightning_param() -> anyhow::Result<()> {
    let uri = format!(
        "bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?amount=0.00000011&lightning={MAINNET_INVOICE}"
    );

    let (parser, _) = test_parser();
    let input = parser.classify(&uri).await?;
    assert!(matches!(input, PaymentInput::LightningInvoice(_)));

    let (parser, _) = test_parser();
    let parser = parser.with_prefer_lightning_in_bip21(false);
    let input = parser.classify(&uri).await?;
    let PaymentInput::OnchainAddress(details) = input else {
        panic!("Expected OnchainAddress, got {input:?}");
    };
    assert_eq!(details.amount_sat, Some(11));
    assert_eq!(
        details.embedded_invoice.map(|invoice| invoice.bolt11),
        Some(MAINNET_INVOICE.to_string())
    );

    let input = parser
        .classify(&format!("bitcoin:?lightning={MAINNET_INVOICE}"))
        .await?;
    assert!(matches!(input, PaymentInput::LightningInvoice(_)));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_bip21_unusable_lightning_param_falls_back() -> anyhow::Result<()> {
    let (parser, _) = test_parser();
    let input = parser
        .classify("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?lightning=garbage")
        .await?;
    assert!(matches!(input, PaymentInput::OnchainAddress(_)));

    assert_eq!(
        parser.classify("bitcoin:?lightning=garbage").await,
        Err(ClassificationError::Malformed)
    );
    Ok(())
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("hello world")]
#[case("lnbc1notaninvoice")]
#[case("bitcoin:")]
#[tokio::test]
async fn test_malformed(#[case] input: &str) {
    let (parser, mock) = test_parser();
    assert_eq!(
        parser.classify(input).await,
        Err(ClassificationError::Malformed)
    );
    assert!(mock.requests().is_empty());
}

#[test]
fn test_inspect_clipboard_is_offline() {
    let (parser, mock) = test_parser();
    assert!(matches!(
        parser.inspect_clipboard(MAINNET_INVOICE),
        PaymentInput::LightningInvoice(_)
    ));
    assert!(matches!(
        parser.inspect_clipboard(&auth_lnurl()),
        PaymentInput::LnurlAuth(_)
    ));
    assert!(matches!(
        parser.inspect_clipboard("bitcoin:1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa?amount=1"),
        PaymentInput::OnchainAddress(_)
    ));
    assert_eq!(parser.inspect_clipboard(&pay_lnurl()), PaymentInput::Unrecognized);
    assert_eq!(
        parser.inspect_clipboard("satoshi@service.com"),
        PaymentInput::Unrecognized
    );
    assert_eq!(parser.inspect_clipboard("hello"), PaymentInput::Unrecognized);
    assert!(mock.requests().is_empty());
}
