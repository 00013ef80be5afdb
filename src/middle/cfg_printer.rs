//! CFG Printer - Pretty print control flow graphs
//!
//! Outputs a human-readable listing for debugging.

use std::fmt;

use crate::middle::cfg::{BasicBlock, ControlFlowGraph};

/// Render every block of `cfg`, marking the start block
pub fn print_cfg(cfg: &ControlFlowGraph) -> String {
    cfg.to_string()
}

impl fmt::Display for ControlFlowGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; blocks: {}", self.len())?;
        for block in self.blocks() {
            write_block(f, block, block.id == self.entry())?;
        }
        Ok(())
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &BasicBlock, is_entry: bool) -> fmt::Result {
    let mut flags = Vec::new();
    if is_entry {
        flags.push("start");
    }
    if block.is_loop_header {
        flags.push("loop header");
    }
    if block.is_exit {
        flags.push("exit");
    }

    write!(f, "{} {}:", block.id, block.label)?;
    if !flags.is_empty() {
        write!(f, " [{}]", flags.join(", "))?;
    }
    writeln!(f)?;

    for stmt in &block.statements {
        // First line of the outline names the statement
        let dump = stmt.dump();
        let summary = dump.lines().next().unwrap_or_default();
        writeln!(f, "    {} (line {})", summary, stmt.line())?;
    }

    if let (Some(t), Some(e)) = (block.true_branch, block.false_branch) {
        writeln!(f, "    br {}, {}", t, e)?;
    }
    if let Some(next) = block.next {
        writeln!(f, "    goto {}", next)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::NodeKind;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use crate::middle::cfg::build;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_matches_listing() {
        let program = parse(tokenize("int x;", None).unwrap());
        let cfg = build(&program);
        assert_eq!(cfg.to_string(), "; blocks: 1\nbb0 unknown: [start]\n");
        assert_eq!(print_cfg(&cfg), cfg.to_string());
    }

    #[test]
    fn test_print_if_without_else() {
        let program = parse(tokenize("void f(int c) {\n  if (c) c = 1;\n  return;\n}", None).unwrap());
        let NodeKind::Program { declarations } = &program.kind else {
            panic!("expected program");
        };
        let cfg = build(&declarations[0]);

        let expected = "\
; blocks: 7
bb0 func_f: [start]
    goto bb1
bb1 entry:
    goto bb2
bb2 cond:
    Variable c (line 2)
    br bb3, bb4
bb3 entry:
    ExprStmt (line 2)
bb4 merge:
    goto bb5
bb5 return: [exit]
    Return (line 3)
bb6 unreachable:
";
        assert_eq!(print_cfg(&cfg), expected);
    }
}
