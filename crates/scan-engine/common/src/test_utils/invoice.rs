use bitcoin::{
    hashes::{Hash, sha256},
    secp256k1::{Secp256k1, SecretKey},
};
use lightning::bolt11_invoice::{Currency, InvoiceBuilder, PaymentSecret};

use crate::network::BitcoinNetwork;

/// Key of the node issuing [`make_invoice`] invoices.
pub const PAYEE_SECRET_KEY: [u8; 32] = [42; 32];

/// Creates a signed invoice timestamped now, expiring in an hour.
pub fn make_invoice(
    network: BitcoinNetwork,
    amount_msat: Option<u64>,
    payment_hash: [u8; 32],
) -> String {
    let payee_key = SecretKey::from_slice(&PAYEE_SECRET_KEY).unwrap();
    let builder = InvoiceBuilder::new(Currency::from(bitcoin::Network::from(network)))
        .description("test invoice".to_string())
        .payment_hash(sha256::Hash::from_byte_array(payment_hash))
        .payment_secret(PaymentSecret([7; 32]))
        .current_timestamp()
        .min_final_cltv_expiry_delta(144);
    let builder = match amount_msat {
        Some(amount_msat) => builder.amount_milli_satoshis(amount_msat),
        None => builder,
    };
    builder
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &payee_key))
        .unwrap()
        .to_string()
}
