//! Error handling for KernelScript

use crate::utils::Location;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler diagnostic
///
/// Every kind carries a message, an optional source position and the name of
/// the file it came from, when one was supplied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unrecognized character in the source text
    #[error("lex error{}: {message}", place(.location, .filename))]
    Lex {
        message: String,
        location: Option<Location>,
        filename: Option<String>,
    },

    /// Grammar violation or premature end of input
    #[error("parse error{}: {message}", place(.location, .filename))]
    Parse {
        message: String,
        location: Option<Location>,
        filename: Option<String>,
    },

    /// Redefinition, unresolved name, mutation of a constant, ...
    #[error("compile error{}: {message}", place(.location, .filename))]
    Compile {
        message: String,
        location: Option<Location>,
        filename: Option<String>,
    },

    #[error("runtime error{}: {message}", place(.location, .filename))]
    Runtime {
        message: String,
        location: Option<Location>,
        filename: Option<String>,
    },
}

fn place(location: &Option<Location>, filename: &Option<String>) -> String {
    match (filename, location) {
        (Some(file), Some(loc)) => format!(" at {}:{}", file, loc),
        (None, Some(loc)) => format!(" at {}", loc),
        (Some(file), None) => format!(" in {}", file),
        (None, None) => String::new(),
    }
}

impl Error {
    pub fn lex(message: impl Into<String>, location: Location) -> Self {
        Self::Lex {
            message: message.into(),
            location: Some(location),
            filename: None,
        }
    }

    pub fn parse(message: impl Into<String>, location: Location) -> Self {
        Self::Parse {
            message: message.into(),
            location: Some(location),
            filename: None,
        }
    }

    pub fn compile(message: impl Into<String>, location: Location) -> Self {
        Self::Compile {
            message: message.into(),
            location: Some(location),
            filename: None,
        }
    }

    /// Attach a file name to this diagnostic
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Self::Lex { filename, .. }
            | Self::Parse { filename, .. }
            | Self::Compile { filename, .. }
            | Self::Runtime { filename, .. } => *filename = Some(name.into()),
        }
        self
    }

    /// Get the location associated with this error
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::Lex { location, .. }
            | Self::Parse { location, .. }
            | Self::Compile { location, .. }
            | Self::Runtime { location, .. } => *location,
        }
    }

    /// The bare message, without kind or position
    pub fn message(&self) -> &str {
        match self {
            Self::Lex { message, .. }
            | Self::Parse { message, .. }
            | Self::Compile { message, .. }
            | Self::Runtime { message, .. } => message,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Lex { filename, .. }
            | Self::Parse { filename, .. }
            | Self::Compile { filename, .. }
            | Self::Runtime { filename, .. } => filename.as_deref(),
        }
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_with_location_and_file() {
        let err = Error::lex("unexpected character '$'", Location::new(3, 7)).with_filename("main.ks");
        assert_eq!(err.to_string(), "lex error at main.ks:3:7: unexpected character '$'");
        assert_eq!(err.filename(), Some("main.ks"));
    }

    #[test]
    fn test_display_without_location() {
        let err = Error::Runtime {
            message: "stack overflow".to_string(),
            location: None,
            filename: None,
        };
        assert_eq!(err.to_string(), "runtime error: stack overflow");
        assert_eq!(err.location(), None);
    }
}
