//! Control flow graph construction
//!
//! Builds a graph of basic blocks for one block or function body. Only
//! `if`, `while` and `return` split blocks; every other statement is
//! appended to the current block. Statements after a `return` land in a
//! block with no incoming edge, so dead code stays visible.

use std::fmt;

use log::trace;

use crate::frontend::ast::{Node, NodeKind};

/// Index of a block inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Basic Block - a straight-line run of statements
#[derive(Debug, Clone)]
pub struct BasicBlock<'a> {
    pub id: BlockId,
    pub label: String,
    pub statements: Vec<&'a Node>,
    /// Unconditional successor
    pub next: Option<BlockId>,
    pub true_branch: Option<BlockId>,
    pub false_branch: Option<BlockId>,
    pub is_loop_header: bool,
    pub is_exit: bool,
}

impl<'a> BasicBlock<'a> {
    fn new(id: BlockId, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            statements: Vec::new(),
            next: None,
            true_branch: None,
            false_branch: None,
            is_loop_header: false,
            is_exit: false,
        }
    }

    /// Outgoing edges: `next`, then `true_branch`, then `false_branch`
    pub fn successors(&self) -> Vec<BlockId> {
        [self.next, self.true_branch, self.false_branch]
            .into_iter()
            .flatten()
            .collect()
    }

    /// A block that branches on a condition
    pub fn is_conditional(&self) -> bool {
        self.true_branch.is_some() || self.false_branch.is_some()
    }
}

/// Blocks of one body, addressed by `BlockId`
#[derive(Debug, Clone)]
pub struct ControlFlowGraph<'a> {
    blocks: Vec<BasicBlock<'a>>,
    entry: BlockId,
}

impl<'a> ControlFlowGraph<'a> {
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock<'a> {
        &self.blocks[id.0]
    }

    pub fn blocks(&self) -> &[BasicBlock<'a>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks with an edge into `id`
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.successors().contains(&id))
            .map(|b| b.id)
            .collect()
    }
}

/// Build the control flow graph of a `Block` or a `FunctionDecl` with a body.
///
/// Any other node yields a graph holding a single `unknown` block.
pub fn build(node: &Node) -> ControlFlowGraph<'_> {
    let mut builder = CfgBuilder { blocks: Vec::new() };

    let entry = match &node.kind {
        NodeKind::Block { statements } => builder.build_statements(statements).0,
        NodeKind::FunctionDecl {
            name,
            body: Some(body),
            ..
        } => {
            let func = builder.new_block(&format!("func_{}", name));
            let (body_entry, _) = builder.build_body(body);
            builder.blocks[func.0].next = Some(body_entry);
            func
        }
        _ => builder.new_block("unknown"),
    };

    trace!("built control flow graph with {} blocks", builder.blocks.len());
    ControlFlowGraph {
        blocks: builder.blocks,
        entry,
    }
}

struct CfgBuilder<'a> {
    blocks: Vec<BasicBlock<'a>>,
}

impl<'a> CfgBuilder<'a> {
    fn new_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, label));
        id
    }

    fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock<'a> {
        &mut self.blocks[id.0]
    }

    /// Branch bodies that are not blocks count as one-statement blocks
    fn build_body(&mut self, body: &'a Node) -> (BlockId, BlockId) {
        match &body.kind {
            NodeKind::Block { statements } => self.build_statements(statements),
            _ => self.build_statements(std::slice::from_ref(body)),
        }
    }

    /// Returns the entry block and the block the cursor ends in
    fn build_statements(&mut self, statements: &'a [Node]) -> (BlockId, BlockId) {
        let entry = self.new_block("entry");
        let mut current = entry;

        for stmt in statements {
            match &stmt.kind {
                NodeKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let cond = self.new_block("cond");
                    self.block_mut(cond).statements.push(condition);
                    let (then_entry, _) = self.build_body(then_branch);
                    let otherwise = match else_branch {
                        Some(else_branch) => self.build_body(else_branch).0,
                        None => self.new_block("merge"),
                    };

                    self.block_mut(current).next = Some(cond);
                    let block = self.block_mut(cond);
                    block.true_branch = Some(then_entry);
                    block.false_branch = Some(otherwise);
                    current = otherwise;
                }
                NodeKind::While { condition, body } => {
                    let header = self.new_block("loop_header");
                    self.block_mut(header).is_loop_header = true;
                    self.block_mut(header).statements.push(condition);

                    let (body_entry, body_tail) = self.build_body(body);
                    let exit = self.new_block("loop_exit");

                    self.block_mut(current).next = Some(header);
                    let block = self.block_mut(header);
                    block.true_branch = Some(body_entry);
                    block.false_branch = Some(exit);

                    // Back edge from wherever the body falls off its end
                    let tail = self.block_mut(body_tail);
                    if tail.next.is_none() && !tail.is_conditional() {
                        tail.next = Some(header);
                    }
                    current = exit;
                }
                NodeKind::Return { .. } => {
                    let ret = self.new_block("return");
                    let block = self.block_mut(ret);
                    block.is_exit = true;
                    block.statements.push(stmt);
                    self.block_mut(current).next = Some(ret);
                    current = self.new_block("unreachable");
                }
                _ => self.block_mut(current).statements.push(stmt),
            }
        }

        (entry, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use crate::frontend::parser::parse;
    use pretty_assertions::assert_eq;

    fn function(source: &str) -> Node {
        let program = parse(tokenize(source, None).unwrap());
        match program.kind {
            NodeKind::Program { mut declarations } => declarations.remove(0),
            _ => unreachable!(),
        }
    }

    fn labels(cfg: &ControlFlowGraph, ids: &[BlockId]) -> Vec<String> {
        ids.iter().map(|id| cfg.block(*id).label.clone()).collect()
    }

    fn find<'g>(cfg: &'g ControlFlowGraph, label: &str) -> &'g BasicBlock<'g> {
        cfg.blocks()
            .iter()
            .find(|b| b.label == label)
            .unwrap_or_else(|| panic!("no block labelled {}", label))
    }

    #[test]
    fn test_if_else_has_no_merge_block() {
        let func = function("void f(int c) { if (c) { c = 1; } else { c = 2; } }");
        let cfg = build(&func);

        assert_eq!(cfg.block(cfg.entry()).label, "func_f");
        let cond = find(&cfg, "cond");
        assert!(cond.true_branch.is_some());
        assert!(cond.false_branch.is_some());
        assert!(cfg.blocks().iter().all(|b| b.label != "merge"));

        let then_block = cfg.block(cond.true_branch.unwrap());
        assert_eq!(then_block.statements.len(), 1);
    }

    #[test]
    fn test_if_without_else_synthesizes_merge() {
        let func = function("void f(int c) { if (c) { c = 1; } }");
        let cfg = build(&func);

        let cond = find(&cfg, "cond");
        let merge = cfg.block(cond.false_branch.unwrap());
        assert_eq!(merge.label, "merge");
        assert!(merge.statements.is_empty());
        assert_eq!(merge.next, None);
    }

    #[test]
    fn test_while_loop_edges() {
        let func = function("void f(int n) { while (n > 0) n = n - 1; n = 5; }");
        let cfg = build(&func);

        let header = find(&cfg, "loop_header");
        assert!(header.is_loop_header);
        let body = header.true_branch.unwrap();
        let exit = header.false_branch.unwrap();
        assert_eq!(cfg.block(body).next, Some(header.id));
        assert_eq!(cfg.block(exit).label, "loop_exit");
        // The statement after the loop continues in the exit block
        assert_eq!(cfg.block(exit).statements.len(), 1);
        assert_eq!(cfg.predecessors(header.id).len(), 2);
    }

    #[test]
    fn test_code_after_return_is_unreachable() {
        let func = function("int f() { int x = 1; return x; x = 2; }");
        let cfg = build(&func);

        let ret = find(&cfg, "return");
        assert!(ret.is_exit);
        let dead = find(&cfg, "unreachable");
        assert_eq!(dead.statements.len(), 1);
        assert!(cfg.predecessors(dead.id).is_empty());
        assert_eq!(labels(&cfg, &cfg.predecessors(ret.id)), vec!["entry"]);
        assert_eq!(ret.successors(), Vec::<BlockId>::new());
    }

    #[test]
    fn test_other_nodes_build_unknown() {
        let func = function("int f();");
        let cfg = build(&func);
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.block(cfg.entry()).label, "unknown");
    }
}
