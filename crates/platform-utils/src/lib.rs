//! Transport primitives shared by the scan engine crates.

mod error;
pub mod http;

pub use error::HttpError;
pub use http::{DefaultHttpClient, HttpClient, HttpResponse, create_http_client};
