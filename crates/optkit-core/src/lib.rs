//! Shared leaf types for optkit: value codecs, value kinds, and errors.

pub mod error;
pub mod types;
pub mod value;

pub use error::ConfigError;
pub use types::{OutputFormat, ValueKind};
pub use value::{BoundedValue, Color, OptionValue};
