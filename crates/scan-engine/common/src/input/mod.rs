mod bip21;
mod error;
mod models;
pub(crate) mod normalize;
mod parser;

pub use error::*;
pub use models::*;
pub use normalize::normalize;
pub use parser::InputParser;
