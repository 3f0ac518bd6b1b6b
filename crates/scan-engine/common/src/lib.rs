pub mod input;
pub mod invoice;
pub mod lnurl;
pub mod network;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
