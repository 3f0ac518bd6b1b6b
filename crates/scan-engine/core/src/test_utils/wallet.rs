use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use scan_engine_common::network::BitcoinNetwork;
use tokio::sync::watch;

use crate::wallet::WalletState;

/// Wallet with a fixed node key and a balance tests can change.
pub struct TestWallet {
    network: BitcoinNetwork,
    node_id: PublicKey,
    balance_tx: watch::Sender<u64>,
}

impl TestWallet {
    pub fn new(network: BitcoinNetwork, balance_msat: u64) -> Self {
        let node_key = SecretKey::from_slice(&[1; 32]).unwrap();
        let (balance_tx, _) = watch::channel(balance_msat);
        Self {
            network,
            node_id: PublicKey::from_secret_key(&Secp256k1::new(), &node_key),
            balance_tx,
        }
    }

    pub fn set_balance(&self, balance_msat: u64) {
        self.balance_tx.send_replace(balance_msat);
    }
}

impl WalletState for TestWallet {
    fn network(&self) -> BitcoinNetwork {
        self.network
    }

    fn node_id(&self) -> PublicKey {
        self.node_id
    }

    fn balance(&self) -> watch::Receiver<u64> {
        self.balance_tx.subscribe()
    }
}
