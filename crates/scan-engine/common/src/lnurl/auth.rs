use bitcoin::{
    bip32::{ChildNumber, DerivationPath},
    hashes::{Hash, HashEngine, hmac, sha256},
    secp256k1::{PublicKey, ecdsa::Signature},
};
use platform_utils::HttpClient;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use strum::{Display, EnumString};
use tracing::{info, warn};
use url::Url;

use crate::input::{ClassificationError, ClassificationResult};

use super::{
    error::{LnurlResult, RemoteError, ResponseValidation},
    get_json, url_domain,
};

/// Purpose of the LNURL-auth challenge, LUD-04.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LnurlAuthAction {
    Register,
    Login,
    Link,
    Auth,
}

/// An LNURL-auth challenge, as per
/// <https://github.com/lnurl/luds/blob/luds/04.md>
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlAuthRequestDetails {
    /// Hex encoded 32 byte challenge.
    pub k1: String,
    pub action: Option<LnurlAuthAction>,
    /// Host of the login URL.
    pub domain: String,
    pub url: String,
}

impl LnurlAuthRequestDetails {
    pub fn k1_bytes(&self) -> Option<[u8; 32]> {
        hex::decode(&self.k1).ok()?.try_into().ok()
    }
}

/// Services that registered users with keys derived from a shorter domain
/// than their login host, LUD-04 era.
const LEGACY_DOMAINS: [(&str, &str); 9] = [
    ("auth.geyser.fund", "geyser.fund"),
    ("api.kollider.xyz", "kollider.xyz"),
    ("api.lnmarkets.com", "lnmarkets.com"),
    ("getalby.com", "getalby.com"),
    ("lightning.video", "lightning.video"),
    ("api.loft.trade", "loft.trade"),
    ("lnshort.it", "lnshort.it"),
    ("stacker.news", "stacker.news"),
    ("auth.bolt.fun", "bolt.fun"),
];

/// Domain the keys of a login host are derived from. Also tells whether
/// the host may use legacy keys.
pub fn derivation_domain(host: &str) -> (&str, bool) {
    LEGACY_DOMAINS
        .iter()
        .find(|(legacy_host, _)| legacy_host.eq_ignore_ascii_case(host))
        .map_or((host, false), |(_, domain)| (*domain, true))
}

/// Builds an auth request from a `tag=login` URL. No network access.
pub(crate) fn parse_auth_request(url: &Url) -> ClassificationResult<LnurlAuthRequestDetails> {
    let query = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let k1 = query("k1").ok_or_else(|| ClassificationError::missing("k1"))?;
    let k1_len = hex::decode(&k1)
        .map_err(|e| ClassificationError::invalid("k1", e.to_string()))?
        .len();
    if k1_len != 32 {
        return Err(ClassificationError::invalid(
            "k1",
            format!("expected 32 bytes, got {k1_len}"),
        ));
    }

    let action = query("action")
        .map(|action| {
            action
                .parse::<LnurlAuthAction>()
                .map_err(|_| ClassificationError::invalid("action", action))
        })
        .transpose()?;

    Ok(LnurlAuthRequestDetails {
        k1,
        action,
        domain: url_domain(url)?,
        url: url.to_string(),
    })
}

/// LUD-05 linking key path, `m/138'/<a>/<b>/<c>/<d>`, from the hashing
/// private key and the derivation domain.
pub fn linking_key_path(hashing_key: &[u8], domain: &str) -> DerivationPath {
    let mut engine = hmac::HmacEngine::<sha256::Hash>::new(hashing_key);
    engine.input(domain.as_bytes());
    let hmac = hmac::Hmac::<sha256::Hash>::from_engine(engine).to_byte_array();

    let mut path = vec![ChildNumber::Hardened { index: 138 }];
    path.extend(hmac[..16].chunks_exact(4).map(|chunk| {
        let mut element = [0u8; 4];
        element.copy_from_slice(chunk);
        ChildNumber::from(u32::from_be_bytes(element))
    }));
    DerivationPath::from(path)
}

/// Hashing key path, `m/138'/0`.
pub fn hashing_key_path() -> DerivationPath {
    DerivationPath::from(vec![
        ChildNumber::Hardened { index: 138 },
        ChildNumber::Normal { index: 0 },
    ])
}

pub fn build_auth_callback_url(
    auth_request: &LnurlAuthRequestDetails,
    signature: &Signature,
    linking_key: &PublicKey,
) -> LnurlResult<Url> {
    let mut url = Url::parse(&auth_request.url).map_err(|e| {
        warn!("LNURL-auth url is invalid: {e:?}");
        RemoteError::from(ResponseValidation::InvalidCallback {
            reason: e.to_string(),
        })
    })?;
    url.query_pairs_mut()
        .append_pair("sig", &hex::encode(signature.serialize_der()))
        .append_pair("key", &hex::encode(linking_key.serialize()));
    Ok(url)
}

/// Sends the signed challenge to the service.
pub async fn submit_auth<C: HttpClient + ?Sized>(
    http_client: &C,
    auth_request: &LnurlAuthRequestDetails,
    signature: &Signature,
    linking_key: &PublicKey,
) -> LnurlResult<()> {
    let url = build_auth_callback_url(auth_request, signature, linking_key)?;
    let _: IgnoredAny = get_json(http_client, &url).await?;
    info!("Logged in to {}", auth_request.domain);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
    use serde_json::json;

    use crate::test_utils::mock_rest_client::MockRestClient;

    use super::*;

    pub(crate) const K1: &str = "1a855505699c3e01be41bddd32007bfcc5ff93505dec0cbca64b4b8ff590b822";

    fn login_url(query: &str) -> Url {
        Url::parse(&format!("https://auth.service.com/lnurl-login?{query}")).unwrap()
    }

    #[test]
    fn test_parse_auth_request() {
        let details = parse_auth_request(&login_url(&format!("tag=login&k1={K1}&action=LOGIN")))
            .unwrap();
        assert_eq!(details.k1, K1);
        assert_eq!(details.action, Some(LnurlAuthAction::Login));
        assert_eq!(details.domain, "auth.service.com");
        assert!(details.k1_bytes().is_some());
    }

    #[test]
    fn test_parse_auth_request_rejects_bad_fields() {
        assert_eq!(
            parse_auth_request(&login_url("tag=login")),
            Err(ClassificationError::missing("k1"))
        );
        assert_eq!(
            parse_auth_request(&login_url("tag=login&k1=")),
            Err(ClassificationError::missing("k1"))
        );
        assert!(matches!(
            parse_auth_request(&login_url("tag=login&k1=abcd")),
            Err(ClassificationError::InvalidField { .. })
        ));
        assert!(matches!(
            parse_auth_request(&login_url(&format!("tag=login&k1={K1}&action=pay"))),
            Err(ClassificationError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_derivation_domain() {
        assert_eq!(derivation_domain("api.lnmarkets.com"), ("lnmarkets.com", true));
        assert_eq!(derivation_domain("stacker.news"), ("stacker.news", true));
        assert_eq!(derivation_domain("auth.service.com"), ("auth.service.com", false));
    }

    #[test]
    fn test_linking_key_path() {
        let hashing_key =
            hex::decode("7d417a6a5e9a6a4a879aeaba11a11838764c8fa2b959c242d43dea682b3e409b")
                .unwrap();
        let path = linking_key_path(&hashing_key, "site.com");
        assert_eq!(
            path.to_string(),
            "138'/1588488367/511787106'/38110259/1988853114'"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_submit_auth() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public_key = secret_key.public_key(&secp);
        let details = parse_auth_request(&login_url(&format!("tag=login&k1={K1}"))).unwrap();
        let message = Message::from_digest(details.k1_bytes().unwrap());
        let signature = secp.sign_ecdsa(&message, &secret_key);

        let mock = MockRestClient::new();
        mock.add_response(200, json!({"status": "OK"}).to_string())
            .add_response(403, json!({"status": "ERROR", "reason": "bad sig"}).to_string());

        submit_auth(&mock, &details, &signature, &public_key)
            .await
            .unwrap();
        let sent = Url::parse(&mock.requests()[0].url).unwrap();
        let sig = sent
            .query_pairs()
            .find(|(key, _)| key == "sig")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        let key = sent
            .query_pairs()
            .find(|(key, _)| key == "key")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(key, public_key.to_string());
        let der = Signature::from_der(&hex::decode(sig).unwrap()).unwrap();
        assert!(secp.verify_ecdsa(&message, &der, &public_key).is_ok());

        assert_eq!(
            submit_auth(&mock, &details, &signature, &public_key).await,
            Err(RemoteError::ServerReportedError {
                message: "bad sig".into()
            })
        );
    }
}
