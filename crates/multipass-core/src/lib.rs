pub mod error;
pub mod example;
pub mod varint;

pub use error::{Error, Result};
pub use example::{Example, Feature, Namespace};
