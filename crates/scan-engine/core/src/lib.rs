mod balance;
mod config;
mod engine;
mod engine_builder;
mod error;
pub mod flow;
mod logger;
mod models;
mod payment_engine;
mod psl;
mod signer;
mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use balance::BalanceProjection;
pub use config::{Config, default_config};
pub use engine::ScanEngine;
pub use engine_builder::ScanEngineBuilder;
pub use error::EngineError;
pub use logger::init_logging;
pub use models::*;
pub use payment_engine::PaymentEngine;
pub use psl::PublicSuffixList;
pub use signer::{KeyDerivation, SeedKeyDerivation};
pub use wallet::{PaymentHistory, WalletState};

pub use scan_engine_common::{input, invoice, lnurl, network, validation};
