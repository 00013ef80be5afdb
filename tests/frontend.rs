//! End-to-end tests of the KernelScript front end

use kernelscript::feedback::{CompilationFeedback, CompilationStats, ErrorReport};
use kernelscript::frontend::ast::{BinOp, Node, NodeKind};
use kernelscript::frontend::lexer::{lex, tokenize};
use kernelscript::frontend::parser::{parse, Parser};
use kernelscript::frontend::semantic::SemanticAnalyzer;
use kernelscript::frontend::token::TokenKind;
use kernelscript::middle::{build, print_cfg};
use kernelscript::Error;
use pretty_assertions::assert_eq;

const PROGRAM: &str = r#"
#include <stdio.h>
#define MAX 16

struct Packet {
    int len;
    char data[64];
};

typedef struct_ptr_unused_target_free_form int_alias_guard;

enum State { IDLE, RUNNING = 4, DONE };

int checksum(char *buf, int len) {
    int sum = 0;
    int i = 0;
    while (i < len) {
        sum = sum + buf[i];
        i++;
    }
    if (sum > MAX) {
        return sum % MAX;
    }
    return sum;
}

int main(void) {
    Packet p;
    State s = RUNNING;
    p.len = checksum(p.data, sizeof(int) * 2);
    return s == DONE ? 0 : 1;
}
"#;

fn program(source: &str) -> Node {
    parse(tokenize(source, Some("test.ks")).unwrap())
}

fn declarations(node: &Node) -> &[Node] {
    match &node.kind {
        NodeKind::Program { declarations } => declarations,
        _ => panic!("not a program"),
    }
}

#[test]
fn test_pipeline_counts_every_top_level_construct() {
    let tree = program(PROGRAM);
    let kinds: Vec<_> = declarations(&tree).iter().map(|d| d.kind.name()).collect();
    assert_eq!(
        kinds,
        vec![
            "Include",
            "Define",
            "StructDecl",
            "Typedef",
            "EnumDecl",
            "FunctionDecl",
            "FunctionDecl"
        ]
    );
}

#[test]
fn test_analysis_reports_first_error_after_full_walk() {
    let tree = program(PROGRAM);
    let mut analyzer = SemanticAnalyzer::new();
    let err = analyzer.analyze(&tree).unwrap_err();

    // The typedef target is not a known type
    assert_eq!(err.message(), "unknown type 'struct_ptr_unused_target_free_form'");
    assert_eq!(analyzer.errors().len(), 1);
    // The sweep still ran
    assert!(analyzer
        .warnings()
        .iter()
        .any(|w| w.ends_with("unused 'int_alias_guard'")));
}

#[test]
fn test_clean_program_passes() {
    let source = "int square(int x) { return x * x; }\nint main() { int _ignored = square(3); return 0; }";
    let tree = program(source);
    let mut analyzer = SemanticAnalyzer::new();
    assert_eq!(analyzer.analyze(&tree), Ok(()));
    assert_eq!(analyzer.warnings(), &[] as &[String]);
}

#[test]
fn test_precedence_through_public_api() {
    let tree = program("int r = 1 + 2 * 3;");
    let NodeKind::VariableDecl { value: Some(value), .. } = &declarations(&tree)[0].kind else {
        panic!("expected initialized variable");
    };
    let NodeKind::BinaryOp { op, right, .. } = &value.kind else {
        panic!("expected binary op");
    };
    assert_eq!(*op, BinOp::Add);
    assert!(matches!(right.kind, NodeKind::BinaryOp { op: BinOp::Mul, .. }));
}

#[test]
fn test_lex_error_carries_file_and_position() {
    let err = tokenize("int x = 1;\nint y = @;", Some("bad.ks")).unwrap_err();
    assert!(matches!(err, Error::Lex { .. }));
    assert_eq!(err.filename(), Some("bad.ks"));
    assert_eq!(err.location().map(|l| (l.line, l.column)), Some((2, 9)));

    // Tokens before the bad character are still produced lazily
    let good: Vec<_> = lex("int x = 1;\nint y = @;", None)
        .take_while(|t| t.is_ok())
        .collect();
    assert_eq!(good.len(), 8);
}

#[test]
fn test_string_round_trip() {
    let tokens = tokenize(r#""tab\there" 'q' '\0' "quote\"d\\""#, None).unwrap();
    let rebuilt: Vec<_> = tokens.iter().map(|t| t.to_source()).collect();
    let relexed = tokenize(&rebuilt.join(" "), None).unwrap();
    let values = |tokens: &[kernelscript::frontend::token::Token]| -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    };
    assert_eq!(values(&relexed), values(&tokens));
}

#[test]
fn test_debug_parser_collects_recovered_errors() {
    let tokens = tokenize("int ok = 1; int = 2; int fine;", None).unwrap();
    let mut parser = Parser::new(tokens).with_debug(true);
    let tree = parser.parse();
    let names: Vec<_> = declarations(&tree)
        .iter()
        .filter_map(|d| match &d.kind {
            NodeKind::VariableDecl { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["ok", "fine"]);
    assert!(!parser.recovered().is_empty());
}

#[test]
fn test_cfg_of_checksum() {
    let tree = program(PROGRAM);
    let checksum = &declarations(&tree)[5];
    let cfg = build(checksum);

    let labels: Vec<_> = cfg.blocks().iter().map(|b| b.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "func_checksum",
            "entry",
            "loop_header",
            "entry",
            "loop_exit",
            "cond",
            "entry",
            "return",
            "unreachable",
            "merge",
            "return",
            "unreachable"
        ]
    );
    assert!(print_cfg(&cfg).contains("[loop header]"));
}

#[test]
fn test_feedback_report_for_failed_check() {
    let tree = program("int main() { return missing; }");
    let mut analyzer = SemanticAnalyzer::new();
    assert!(analyzer.analyze(&tree).is_err());

    let diagnostics: Vec<_> = analyzer
        .errors()
        .iter()
        .map(|e| ErrorReport::from_error(e, "test.ks"))
        .collect();
    let feedback = CompilationFeedback::new("test.ks".to_string(), diagnostics, CompilationStats::default());
    assert!(!feedback.success);
    assert_eq!(feedback.diagnostics[0].code, "E0003");
    assert!(feedback.to_json_compact().contains("undefined variable 'missing'"));
}
