//! Middle-end module - control flow graphs

pub mod cfg;
pub mod cfg_printer;

pub use cfg::{build, BasicBlock, BlockId, ControlFlowGraph};
pub use cfg_printer::print_cfg;
