use std::str::FromStr;

use bitcoin::{
    bip32::{DerivationPath, Xpriv},
    secp256k1::{self, Keypair, Message, Secp256k1, ecdsa::Signature},
};
use scan_engine_common::{
    lnurl::auth::{hashing_key_path, linking_key_path},
    network::BitcoinNetwork,
};
use tracing::debug;

use crate::{error::EngineError, models::LoginScheme};

use super::KeyDerivation;

/// Node key path of the legacy wallet on mainnet. The legacy login keys hang
/// off this node key instead of the master key.
const LEGACY_NODE_KEY_PATH_MAINNET: &str = "m/47'/0'/0'";
const LEGACY_NODE_KEY_PATH_TESTNET: &str = "m/46'/0'/0'";

/// LUD-05 key derivation from a BIP-32 seed.
pub struct SeedKeyDerivation {
    master: Xpriv,
    network: BitcoinNetwork,
    secp: Secp256k1<secp256k1::All>,
}

impl SeedKeyDerivation {
    pub fn from_seed(seed: &[u8], network: BitcoinNetwork) -> Result<Self, EngineError> {
        let master = Xpriv::new_master(bitcoin::Network::from(network), seed)?;
        Ok(Self {
            master,
            network,
            secp: Secp256k1::new(),
        })
    }

    pub fn from_mnemonic(
        mnemonic: &str,
        passphrase: Option<&str>,
        network: BitcoinNetwork,
    ) -> Result<Self, EngineError> {
        let mnemonic = bip39::Mnemonic::parse(mnemonic)?;
        let seed = mnemonic.to_seed(passphrase.unwrap_or_default());
        Self::from_seed(&seed, network)
    }

    fn legacy_node_key(&self) -> Result<Xpriv, EngineError> {
        let path = match self.network {
            BitcoinNetwork::Bitcoin => LEGACY_NODE_KEY_PATH_MAINNET,
            _ => LEGACY_NODE_KEY_PATH_TESTNET,
        };
        Ok(self
            .master
            .derive_priv(&self.secp, &DerivationPath::from_str(path)?)?)
    }
}

#[async_trait::async_trait]
impl KeyDerivation for SeedKeyDerivation {
    async fn derive_login_key(
        &self,
        domain: &str,
        scheme: LoginScheme,
    ) -> Result<Keypair, EngineError> {
        debug!("Deriving {scheme:?} login key for {domain}");
        // Default: both keys come from the master key. Legacy: the hashing key
        // comes from the legacy node key and the linking key from the hashing key.
        let (hashing_key, linking_root) = match scheme {
            LoginScheme::Default => {
                let hashing_key = self.master.derive_priv(&self.secp, &hashing_key_path())?;
                (hashing_key, self.master)
            }
            LoginScheme::Legacy => {
                let hashing_key = self
                    .legacy_node_key()?
                    .derive_priv(&self.secp, &hashing_key_path())?;
                (hashing_key, hashing_key)
            }
        };
        let path = linking_key_path(&hashing_key.private_key.secret_bytes(), domain);
        let linking_key = linking_root.derive_priv(&self.secp, &path)?;
        Ok(Keypair::from_secret_key(&self.secp, &linking_key.private_key))
    }

    async fn sign(&self, key: &Keypair, challenge: &[u8; 32]) -> Result<Signature, EngineError> {
        let message = Message::from_digest(*challenge);
        Ok(self.secp.sign_ecdsa(&message, &key.secret_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn signer() -> SeedKeyDerivation {
        SeedKeyDerivation::from_mnemonic(MNEMONIC, None, BitcoinNetwork::Bitcoin).unwrap()
    }

    #[tokio::test]
    async fn test_login_key_is_scoped_to_domain() {
        let signer = signer();
        let key = signer
            .derive_login_key("service.com", LoginScheme::Default)
            .await
            .unwrap();
        let again = signer
            .derive_login_key("service.com", LoginScheme::Default)
            .await
            .unwrap();
        let other = signer
            .derive_login_key("other.com", LoginScheme::Default)
            .await
            .unwrap();
        let legacy = signer
            .derive_login_key("service.com", LoginScheme::Legacy)
            .await
            .unwrap();

        assert_eq!(key.public_key(), again.public_key());
        assert_ne!(key.public_key(), other.public_key());
        assert_ne!(key.public_key(), legacy.public_key());
    }

    #[tokio::test]
    async fn test_signature_verifies_against_challenge() {
        let signer = signer();
        let key = signer
            .derive_login_key("service.com", LoginScheme::Default)
            .await
            .unwrap();
        let challenge = [7u8; 32];
        let signature = signer.sign(&key, &challenge).await.unwrap();

        let secp = Secp256k1::verification_only();
        assert!(
            secp.verify_ecdsa(&Message::from_digest(challenge), &signature, &key.public_key())
                .is_ok()
        );
    }

    #[rstest::rstest]
    #[case(BitcoinNetwork::Bitcoin, "m/47'/0'/0'")]
    #[case(BitcoinNetwork::Testnet3, "m/46'/0'/0'")]
    #[tokio::test]
    async fn test_legacy_key_derivation_chain(
        #[case] network: BitcoinNetwork,
        #[case] node_key_path: &str,
    ) {
        let signer = SeedKeyDerivation::from_mnemonic(MNEMONIC, None, network).unwrap();
        let key = signer
            .derive_login_key("geyser.fund", LoginScheme::Legacy)
            .await
            .unwrap();

        let secp = Secp256k1::new();
        let seed = bip39::Mnemonic::parse(MNEMONIC).unwrap().to_seed("");
        let master = Xpriv::new_master(bitcoin::Network::from(network), &seed).unwrap();
        let node_key = master
            .derive_priv(&secp, &DerivationPath::from_str(node_key_path).unwrap())
            .unwrap();
        let hashing_key = node_key.derive_priv(&secp, &hashing_key_path()).unwrap();
        let path = linking_key_path(&hashing_key.private_key.secret_bytes(), "geyser.fund");
        let expected = hashing_key.derive_priv(&secp, &path).unwrap();

        assert_eq!(key.secret_key(), expected.private_key);
    }

    #[tokio::test]
    async fn test_default_key_derivation_chain() {
        let signer = signer();
        let key = signer
            .derive_login_key("service.com", LoginScheme::Default)
            .await
            .unwrap();

        let secp = Secp256k1::new();
        let seed = bip39::Mnemonic::parse(MNEMONIC).unwrap().to_seed("");
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &seed).unwrap();
        let hashing_key = master.derive_priv(&secp, &hashing_key_path()).unwrap();
        let path = linking_key_path(&hashing_key.private_key.secret_bytes(), "service.com");
        let expected = master.derive_priv(&secp, &path).unwrap();

        assert_eq!(key.secret_key(), expected.private_key);
    }

    #[test]
    fn test_rejects_invalid_mnemonic() {
        assert!(matches!(
            SeedKeyDerivation::from_mnemonic("not a mnemonic", None, BitcoinNetwork::Bitcoin),
            Err(EngineError::KeyDerivation(_))
        ));
    }
}
