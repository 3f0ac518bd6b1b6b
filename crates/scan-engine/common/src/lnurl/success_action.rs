//! LNURL-pay success actions (LUD-09, LUD-10).

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ensure_input;

use super::error::ResponseValidation;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const MAX_TEXT_LEN: usize = 144;
const MAX_CIPHERTEXT_LEN: usize = 4096;
const IV_LEN: usize = 24;

/// Action the payer's wallet performs once the payment succeeded.
///
/// Unknown tags fail deserialization, which aborts the payment as LUD-09
/// requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum SuccessAction {
    Message {
        message: String,
    },
    Url {
        description: String,
        url: String,
    },
    Aes {
        description: String,
        /// Base64 AES-256-CBC ciphertext keyed with the payment preimage.
        ciphertext: String,
        /// Base64 initialization vector.
        iv: String,
    },
}

/// A [`SuccessAction`] ready to be shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProcessedSuccessAction {
    Message { message: String },
    Url { description: String, url: String },
    Decrypted { description: String, plaintext: String },
    Undecryptable { description: String, reason: String },
}

impl SuccessAction {
    pub fn validate(&self, callback: &Url) -> Result<(), ResponseValidation> {
        match self {
            SuccessAction::Message { message } => {
                ensure_input!(message.chars().count() <= MAX_TEXT_LEN, invalid("message too long"));
            }
            SuccessAction::Url { description, url } => {
                ensure_input!(
                    description.chars().count() <= MAX_TEXT_LEN,
                    invalid("description too long")
                );
                let url = Url::parse(url).map_err(|_| invalid("url is not valid"))?;
                ensure_input!(url.scheme() == "https", invalid("url is not https"));
                ensure_input!(
                    url.domain() == callback.domain(),
                    invalid("url domain differs from the callback domain")
                );
            }
            SuccessAction::Aes {
                description,
                ciphertext,
                iv,
            } => {
                ensure_input!(
                    description.chars().count() <= MAX_TEXT_LEN,
                    invalid("description too long")
                );
                ensure_input!(
                    ciphertext.len() <= MAX_CIPHERTEXT_LEN,
                    invalid("ciphertext too long")
                );
                ensure_input!(iv.len() == IV_LEN, invalid("iv has unexpected length"));
                BASE64_STANDARD
                    .decode(ciphertext)
                    .map_err(|_| invalid("ciphertext is not base64"))?;
                BASE64_STANDARD
                    .decode(iv)
                    .map_err(|_| invalid("iv is not base64"))?;
            }
        }
        Ok(())
    }

    /// Turns the action into its displayable form. AES payloads are
    /// decrypted with `preimage` when it is known.
    pub fn process(self, preimage: Option<&[u8; 32]>) -> ProcessedSuccessAction {
        match self {
            SuccessAction::Message { message } => ProcessedSuccessAction::Message { message },
            SuccessAction::Url { description, url } => {
                ProcessedSuccessAction::Url { description, url }
            }
            SuccessAction::Aes {
                description,
                ciphertext,
                iv,
            } => match preimage.map(|key| decrypt(key, &iv, &ciphertext)) {
                Some(Ok(plaintext)) => ProcessedSuccessAction::Decrypted {
                    description,
                    plaintext,
                },
                Some(Err(reason)) => ProcessedSuccessAction::Undecryptable {
                    description,
                    reason,
                },
                None => ProcessedSuccessAction::Undecryptable {
                    description,
                    reason: "payment preimage not available".to_string(),
                },
            },
        }
    }
}

fn decrypt(key: &[u8; 32], iv: &str, ciphertext: &str) -> Result<String, String> {
    let iv = BASE64_STANDARD.decode(iv).map_err(|e| e.to_string())?;
    let ciphertext = BASE64_STANDARD.decode(ciphertext).map_err(|e| e.to_string())?;
    let plaintext = Aes256CbcDec::new_from_slices(key, &iv)
        .map_err(|e| e.to_string())?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| e.to_string())?;
    String::from_utf8(plaintext).map_err(|e| e.to_string())
}

fn invalid(reason: &str) -> ResponseValidation {
    ResponseValidation::InvalidSuccessAction {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use aes::cipher::BlockEncryptMut;

    use super::*;

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    fn callback() -> Url {
        Url::parse("https://service.com/lnurlp/callback").unwrap()
    }

    #[test]
    fn test_success_action_wire_format() {
        let action: SuccessAction =
            serde_json::from_str(r#"{"tag":"message","message":"Thanks!"}"#).unwrap();
        assert_eq!(
            action,
            SuccessAction::Message {
                message: "Thanks!".to_string()
            }
        );
        assert!(serde_json::from_str::<SuccessAction>(r#"{"tag":"confetti"}"#).is_err());
    }

    #[test]
    fn test_validate_limits() {
        let long = "x".repeat(145);
        assert!(
            SuccessAction::Message { message: long }
                .validate(&callback())
                .is_err()
        );
        assert!(
            SuccessAction::Url {
                description: "Receipt".into(),
                url: "https://service.com/receipt/1".into()
            }
            .validate(&callback())
            .is_ok()
        );
        assert!(
            SuccessAction::Url {
                description: "Receipt".into(),
                url: "https://phishing.com/receipt/1".into()
            }
            .validate(&callback())
            .is_err()
        );
        assert!(
            SuccessAction::Aes {
                description: "Code".into(),
                ciphertext: "AAAA".into(),
                iv: "short".into()
            }
            .validate(&callback())
            .is_err()
        );
    }

    #[test]
    fn test_process_decrypts_with_preimage() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(b"voucher 1234");
        let action = SuccessAction::Aes {
            description: "Your voucher".into(),
            ciphertext: BASE64_STANDARD.encode(ciphertext),
            iv: BASE64_STANDARD.encode(iv),
        };
        action.validate(&callback()).unwrap();

        assert_eq!(
            action.clone().process(Some(&key)),
            ProcessedSuccessAction::Decrypted {
                description: "Your voucher".into(),
                plaintext: "voucher 1234".into()
            }
        );
        assert!(matches!(
            action.process(None),
            ProcessedSuccessAction::Undecryptable { .. }
        ));
    }
}
