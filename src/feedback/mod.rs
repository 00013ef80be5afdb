//! Structured Feedback Module
//!
//! Provides machine-readable output for tools and editors:
//! - JSON diagnostic reports with fix suggestions
//! - Compilation statistics

use serde::{Deserialize, Serialize};

use crate::frontend::ast::{Node, NodeKind};
use crate::utils::Error;

// ==================== Structured Error Report ====================

/// A structured diagnostic report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Diagnostic code (e.g., "E0001")
    pub code: String,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    pub location: Option<Location>,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    /// 0 when only the line is known
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

impl Suggestion {
    fn new(message: impl Into<String>, confidence: f64) -> Self {
        Self {
            message: message.into(),
            confidence,
        }
    }
}

// ==================== Compilation Feedback ====================

/// Complete result of checking one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationFeedback {
    pub success: bool,

    pub source_file: String,

    /// All errors and warnings
    pub diagnostics: Vec<ErrorReport>,

    pub stats: CompilationStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationStats {
    /// Lex and parse time in milliseconds
    pub parse_time_ms: u64,

    /// Semantic analysis time
    pub semantic_time_ms: u64,

    pub total_time_ms: u64,

    pub token_count: usize,

    /// Top-level function prototypes and definitions
    pub function_count: usize,

    /// struct, union, enum and typedef declarations
    pub type_count: usize,

    /// Lines of code
    pub loc: usize,
}

impl CompilationStats {
    /// Count the declarations of a parsed program
    pub fn from_program(program: &Node, source: &str) -> Self {
        let mut stats = Self {
            loc: source.lines().count(),
            ..Self::default()
        };
        if let NodeKind::Program { declarations } = &program.kind {
            for decl in declarations {
                match decl.kind {
                    NodeKind::FunctionDecl { .. } => stats.function_count += 1,
                    NodeKind::StructDecl { .. }
                    | NodeKind::UnionDecl { .. }
                    | NodeKind::EnumDecl { .. }
                    | NodeKind::Typedef { .. } => stats.type_count += 1,
                    _ => {}
                }
            }
        }
        stats
    }
}

// ==================== Error Conversion ====================

impl ErrorReport {
    /// Create a report from a compiler error
    pub fn from_error(error: &Error, file_name: &str) -> Self {
        let code = match error {
            Error::Lex { .. } => "E0001",
            Error::Parse { .. } => "E0002",
            Error::Compile { .. } => "E0003",
            Error::Runtime { .. } => "E0004",
        };

        let location = error.location().map(|loc| Location {
            file: error.filename().unwrap_or(file_name).to_string(),
            line: loc.line,
            column: loc.column,
        });

        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message: error.message().to_string(),
            location,
            suggestions: suggest(error.message()),
        }
    }

    /// Create a report from an analyzer warning (`Line <n>: <message>`)
    pub fn from_warning(warning: &str, file_name: &str) -> Self {
        let (line, message) = warning
            .strip_prefix("Line ")
            .and_then(|rest| rest.split_once(": "))
            .and_then(|(line, message)| Some((line.parse::<usize>().ok()?, message)))
            .map_or((None, warning), |(line, message)| (Some(line), message));

        Self {
            code: "W0001".to_string(),
            severity: Severity::Warning,
            message: message.to_string(),
            location: line.map(|line| Location {
                file: file_name.to_string(),
                line,
                column: 0,
            }),
            suggestions: suggest(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Fix suggestions for the diagnostics the front end produces
fn suggest(message: &str) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if let Some(name) = quoted(message) {
        if message.starts_with("unused") {
            suggestions.push(Suggestion::new(format!("Remove '{}' if it is not needed", name), 0.6));
            suggestions.push(Suggestion::new(format!("Rename it to '_{}' to silence this warning", name), 0.5));
        } else if message.starts_with("undefined variable") {
            suggestions.push(Suggestion::new(format!("Declare '{}' before using it", name), 0.8));
        } else if message.starts_with("unknown type") {
            suggestions.push(Suggestion::new(
                format!("Declare '{}' with struct, union, enum or typedef before using it", name),
                0.8,
            ));
        } else if message.starts_with("redefinition") {
            suggestions.push(Suggestion::new(format!("Rename one of the declarations of '{}'", name), 0.7));
        } else if message.starts_with("cannot assign to constant") {
            suggestions.push(Suggestion::new(format!("Assign to a variable instead of '{}'", name), 0.6));
        } else if message.starts_with("function") {
            suggestions.push(Suggestion::new("Add a return statement at the end of the function", 0.8));
        }
    } else if message == "division by zero" {
        suggestions.push(Suggestion::new("Check the divisor before dividing", 0.7));
    }

    suggestions
}

/// First single-quoted word of a message
fn quoted(message: &str) -> Option<&str> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(&message[start..start + len])
}

impl CompilationFeedback {
    /// Build feedback from the diagnostics of one run; success means no errors
    pub fn new(source_file: String, diagnostics: Vec<ErrorReport>, stats: CompilationStats) -> Self {
        Self {
            success: !diagnostics.iter().any(ErrorReport::is_error),
            source_file,
            diagnostics,
            stats,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Output as compact JSON (for programmatic use)
    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Location as SourceLocation;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_codes_by_kind() {
        let lex = Error::lex("unrecognized character '$'", SourceLocation::new(1, 4));
        let compile = Error::compile("undefined variable 'y'", SourceLocation::new(3, 9));

        let report = ErrorReport::from_error(&lex, "a.ks");
        assert_eq!(report.code, "E0001");
        assert_eq!(
            report.location,
            Some(Location {
                file: "a.ks".to_string(),
                line: 1,
                column: 4
            })
        );

        let report = ErrorReport::from_error(&compile, "a.ks");
        assert_eq!(report.code, "E0003");
        assert_eq!(report.suggestions[0].message, "Declare 'y' before using it");
    }

    #[test]
    fn test_warning_line_is_recovered() {
        let report = ErrorReport::from_warning("Line 12: unused 'count'", "main.ks");
        assert_eq!(report.code, "W0001");
        assert_eq!(report.message, "unused 'count'");
        assert_eq!(report.location.map(|l| l.line), Some(12));
        assert_eq!(report.suggestions.len(), 2);

        let report = ErrorReport::from_warning("no line here", "main.ks");
        assert_eq!(report.location, None);
    }

    #[test]
    fn test_feedback_json() {
        let feedback = CompilationFeedback::new(
            "main.ks".to_string(),
            vec![ErrorReport::from_warning("Line 1: unused 'x'", "main.ks")],
            CompilationStats::default(),
        );
        assert!(feedback.success);

        let value: serde_json::Value = serde_json::from_str(&feedback.to_json()).unwrap();
        assert_eq!(value["diagnostics"][0]["severity"], "Warning");
        assert_eq!(value["diagnostics"][0]["location"]["line"], 1);
    }
}
