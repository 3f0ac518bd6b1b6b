mod gated_http_client;
mod wallet;

pub use gated_http_client::GatedHttpClient;
pub use wallet::TestWallet;
