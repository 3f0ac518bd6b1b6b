use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use scan_engine_common::network::BitcoinNetwork;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

const ENV_PREFIX: &str = "SCAN_ENGINE_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Chain the wallet runs on. Inputs for other chains are rejected.
    pub network: BitcoinNetwork,
    /// A successful LNURL-auth login is reported no earlier than this many
    /// milliseconds after the attempt started.
    pub login_min_success_delay_ms: u64,
    /// Whether a Lightning request embedded in a BIP-21 URI replaces the
    /// on-chain address.
    pub prefer_lightning_in_bip21: bool,
    /// Sent as `User-Agent` with every LNURL request when set.
    pub user_agent: Option<String>,
    /// `tracing` env filter directives used by [`crate::init_logging`].
    pub log_filter: Option<String>,
}

impl Config {
    /// Loads the configuration for `network`, overridden by the TOML file at
    /// `path` if it exists and then by `SCAN_ENGINE_*` environment
    /// variables.
    pub fn load(network: BitcoinNetwork, path: Option<&Path>) -> Result<Config, EngineError> {
        let mut figment = Figment::new().merge(Serialized::defaults(default_config(network)));
        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn login_min_success_delay(&self) -> Duration {
        Duration::from_millis(self.login_min_success_delay_ms)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self
            .user_agent
            .as_ref()
            .is_some_and(|agent| agent.trim().is_empty())
        {
            return Err(EngineError::Config("user_agent must not be blank".to_string()));
        }
        Ok(())
    }
}

pub fn default_config(network: BitcoinNetwork) -> Config {
    Config {
        network,
        login_min_success_delay_ms: 1000,
        prefer_lightning_in_bip21: true,
        user_agent: None,
        log_filter: None,
    }
}
