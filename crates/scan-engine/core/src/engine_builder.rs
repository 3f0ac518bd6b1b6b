use std::sync::Arc;

use platform_utils::{HttpClient, create_http_client};
use scan_engine_common::input::InputParser;
use tracing::debug;

use crate::{
    config::Config,
    engine::ScanEngine,
    error::EngineError,
    payment_engine::PaymentEngine,
    psl::PublicSuffixList,
    signer::{KeyDerivation, SeedKeyDerivation},
    wallet::{PaymentHistory, WalletState},
};

/// Builder for creating `ScanEngine` instances with customizable components.
pub struct ScanEngineBuilder {
    config: Config,
    wallet: Arc<dyn WalletState>,
    payment_history: Arc<dyn PaymentHistory>,
    payment_engine: Arc<dyn PaymentEngine>,
    key_derivation: Option<Arc<dyn KeyDerivation>>,
    mnemonic: Option<(String, Option<String>)>,
    http_client: Option<Arc<dyn HttpClient>>,
    public_suffix_list: Option<Arc<dyn PublicSuffixList>>,
}

impl ScanEngineBuilder {
    /// Creates a new `ScanEngineBuilder` with the wallet collaborators the
    /// engine cannot work without.
    /// Arguments:
    /// - `config`: The configuration to be used.
    /// - `wallet`: Network, node id and balance of the wallet.
    /// - `payment_history`: Lookup of past payments.
    /// - `payment_engine`: The node paying and creating invoices.
    pub fn new(
        config: Config,
        wallet: Arc<dyn WalletState>,
        payment_history: Arc<dyn PaymentHistory>,
        payment_engine: Arc<dyn PaymentEngine>,
    ) -> Self {
        ScanEngineBuilder {
            config,
            wallet,
            payment_history,
            payment_engine,
            key_derivation: None,
            mnemonic: None,
            http_client: None,
            public_suffix_list: None,
        }
    }

    /// Sets the source of LNURL-auth keys.
    #[must_use]
    pub fn with_key_derivation(mut self, key_derivation: Arc<dyn KeyDerivation>) -> Self {
        self.key_derivation = Some(key_derivation);
        self
    }

    /// Derives LNURL-auth keys from the given mnemonic.
    /// Arguments:
    /// - `mnemonic`: BIP-39 mnemonic phrase of the wallet.
    /// - `passphrase`: Optional BIP-39 passphrase.
    #[must_use]
    pub fn with_mnemonic(mut self, mnemonic: String, passphrase: Option<String>) -> Self {
        self.mnemonic = Some((mnemonic, passphrase));
        self
    }

    /// Sets the HTTP client used for LNURL requests. Defaults to a client
    /// sending the configured user agent.
    #[must_use]
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Sets the public suffix list. Without it LNURL-auth cannot show the
    /// service domain and refuses to log in.
    #[must_use]
    pub fn with_public_suffix_list(mut self, public_suffix_list: Arc<dyn PublicSuffixList>) -> Self {
        self.public_suffix_list = Some(public_suffix_list);
        self
    }

    /// Builds the `ScanEngine`.
    pub fn build(self) -> Result<ScanEngine, EngineError> {
        let wallet_network = self.wallet.network();
        if wallet_network != self.config.network {
            return Err(EngineError::Config(format!(
                "Wallet runs on {wallet_network}, configuration is for {}",
                self.config.network
            )));
        }

        let key_derivation: Arc<dyn KeyDerivation> = match (self.key_derivation, self.mnemonic) {
            (Some(key_derivation), _) => key_derivation,
            (None, Some((mnemonic, passphrase))) => Arc::new(SeedKeyDerivation::from_mnemonic(
                &mnemonic,
                passphrase.as_deref(),
                self.config.network,
            )?),
            (None, None) => {
                return Err(EngineError::Config(
                    "A key derivation or a mnemonic is required".to_string(),
                ));
            }
        };

        let http_client = self.http_client.unwrap_or_else(|| {
            debug!("Using default HTTP client");
            Arc::from(create_http_client(self.config.user_agent.as_deref()))
        });
        let parser = InputParser::new(Arc::clone(&http_client), self.config.network)
            .with_prefer_lightning_in_bip21(self.config.prefer_lightning_in_bip21);

        Ok(ScanEngine {
            config: self.config,
            parser: Arc::new(parser),
            http_client,
            wallet: self.wallet,
            payment_history: self.payment_history,
            payment_engine: self.payment_engine,
            key_derivation,
            public_suffix_list: self.public_suffix_list,
        })
    }
}
