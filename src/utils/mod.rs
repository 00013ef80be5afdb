//! Utility module

mod span;
mod error;

pub use span::Location;
pub use error::{Error, Result};
