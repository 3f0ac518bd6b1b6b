use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetwork {
    /// Mainnet
    Bitcoin,
    Testnet3,
    Testnet4,
    Signet,
    Regtest,
}

impl BitcoinNetwork {
    pub const ALL: [BitcoinNetwork; 5] = [
        BitcoinNetwork::Bitcoin,
        BitcoinNetwork::Regtest,
        BitcoinNetwork::Signet,
        BitcoinNetwork::Testnet3,
        BitcoinNetwork::Testnet4,
    ];
}

impl From<bitcoin::Network> for BitcoinNetwork {
    fn from(network: bitcoin::Network) -> Self {
        match network {
            bitcoin::Network::Testnet => BitcoinNetwork::Testnet3,
            bitcoin::Network::Testnet4 => BitcoinNetwork::Testnet4,
            bitcoin::Network::Signet => BitcoinNetwork::Signet,
            bitcoin::Network::Regtest => BitcoinNetwork::Regtest,
            // `bitcoin::Network` is non-exhaustive
            _ => BitcoinNetwork::Bitcoin,
        }
    }
}

impl From<BitcoinNetwork> for bitcoin::Network {
    fn from(network: BitcoinNetwork) -> Self {
        match network {
            BitcoinNetwork::Bitcoin => bitcoin::Network::Bitcoin,
            BitcoinNetwork::Testnet3 => bitcoin::Network::Testnet,
            BitcoinNetwork::Testnet4 => bitcoin::Network::Testnet4,
            BitcoinNetwork::Signet => bitcoin::Network::Signet,
            BitcoinNetwork::Regtest => bitcoin::Network::Regtest,
        }
    }
}
