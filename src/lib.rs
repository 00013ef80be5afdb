//! KernelScript front end
//!
//! Lexer, parser, semantic analyzer and control flow graph builder for a
//! small C-like language.

pub mod feedback;
pub mod frontend;
pub mod middle;
pub mod types;
pub mod utils;

pub use utils::{Error, Location, Result};
