use bitcoin::secp256k1::{Keypair, ecdsa::Signature};

use crate::{error::EngineError, models::LoginScheme};

mod seed;

pub use seed::SeedKeyDerivation;

/// Source of LNURL-auth linking keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait KeyDerivation: Send + Sync {
    /// Derives the linking key for `domain`.
    async fn derive_login_key(
        &self,
        domain: &str,
        scheme: LoginScheme,
    ) -> Result<Keypair, EngineError>;

    /// Signs the 32 byte `challenge` as is, without hashing it again.
    async fn sign(&self, key: &Keypair, challenge: &[u8; 32]) -> Result<Signature, EngineError>;
}
