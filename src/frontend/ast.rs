//! Abstract Syntax Tree definitions for KernelScript

use std::fmt;

use crate::frontend::token::NumberValue;
use crate::utils::Location;

/// An AST node: a kind plus the position of its first token
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
}

impl Node {
    pub fn new(kind: NodeKind, location: Location) -> Self {
        Self { kind, location }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    /// Every child node, in source order.
    ///
    /// Passes that have no specific rule for a node kind recurse through
    /// this list.
    pub fn children(&self) -> Vec<&Node> {
        use NodeKind::*;

        let mut out = Vec::new();
        match &self.kind {
            Program { declarations } => out.extend(declarations),
            Define { value, .. } => out.extend(value.as_deref()),
            ExprStmt { expr } => out.push(&**expr),
            VariableDecl { value, .. } => out.extend(value.as_deref()),
            ArrayDeclaration { size, values, .. } => {
                out.extend(size.as_deref());
                out.extend(values.iter().flatten());
            }
            FunctionDecl { params, body, .. } => {
                out.extend(params);
                out.extend(body.as_deref());
            }
            Block { statements } => out.extend(statements),
            Return { value } => out.extend(value.as_deref()),
            If { condition, then_branch, else_branch } => {
                out.push(&**condition);
                out.push(&**then_branch);
                out.extend(else_branch.as_deref());
            }
            While { condition, body } => {
                out.push(&**condition);
                out.push(&**body);
            }
            For { init, condition, increment, body } => {
                out.extend(init.as_deref());
                out.extend(condition.as_deref());
                out.extend(increment.as_deref());
                out.push(&**body);
            }
            DoWhile { body, condition } => {
                out.push(&**body);
                out.push(&**condition);
            }
            Switch { expr, cases } => {
                out.push(&**expr);
                out.extend(cases);
            }
            Case { value, statements } => {
                out.push(&**value);
                out.extend(statements);
            }
            Default { statements } => out.extend(statements),
            Label { statement, .. } => out.push(&**statement),
            BinaryOp { left, right, .. } => {
                out.push(&**left);
                out.push(&**right);
            }
            UnaryOp { operand, .. } => out.push(&**operand),
            Call { callee, args } => {
                out.push(&**callee);
                out.extend(args);
            }
            ArrayAccess { array, index } => {
                out.push(&**array);
                out.push(&**index);
            }
            MemberAccess { object, .. } => out.push(&**object),
            Cast { expr, .. } => out.push(&**expr),
            SizeOf { arg: SizeOfArg::Expr(expr) } => out.push(&**expr),
            Ternary { condition, then_expr, else_expr } => {
                out.push(&**condition);
                out.push(&**then_expr);
                out.push(&**else_expr);
            }
            Assignment { target, value, .. } => {
                out.push(&**target);
                out.push(&**value);
            }
            StructDecl { fields, .. } | UnionDecl { fields, .. } => out.extend(fields),
            EnumDecl { variants, .. } => {
                out.extend(variants.iter().filter_map(|v| v.initializer.as_ref()));
            }
            Include { .. }
            | Param { .. }
            | Break
            | Continue
            | Goto { .. }
            | SizeOf { arg: SizeOfArg::Type(_) }
            | Variable { .. }
            | Number(_)
            | String(_)
            | Char(_)
            | Bool(_)
            | Null
            | Typedef { .. } => {}
        }
        out
    }

    /// Render the tree as an indented outline, one node per line
    pub fn dump(&self) -> std::string::String {
        self.to_string()
    }

    fn write_outline(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{}{}", "  ".repeat(indent), self.kind.name())?;
        let detail = self.kind.detail();
        if !detail.is_empty() {
            write!(f, " {}", detail)?;
        }
        for child in self.children() {
            writeln!(f)?;
            child.write_outline(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_outline(f, 0)
    }
}

/// Node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program {
        declarations: Vec<Node>,
    },
    /// `#include <file>` or `#include "file"`
    Include {
        filename: String,
    },
    /// `#define NAME [value]`
    Define {
        name: String,
        value: Option<Box<Node>>,
    },
    /// Expression used as a statement
    ExprStmt {
        expr: Box<Node>,
    },
    VariableDecl {
        ty: TypeSpec,
        name: String,
        value: Option<Box<Node>>,
    },
    ArrayDeclaration {
        ty: TypeSpec,
        name: String,
        size: Option<Box<Node>>,
        /// Brace-enclosed initializer list
        values: Option<Vec<Node>>,
    },
    FunctionDecl {
        return_type: TypeSpec,
        name: String,
        /// `Param` nodes
        params: Vec<Node>,
        /// `None` for a prototype
        body: Option<Box<Node>>,
    },
    Param {
        ty: TypeSpec,
        name: Option<String>,
    },
    Block {
        statements: Vec<Node>,
    },
    Return {
        value: Option<Box<Node>>,
    },
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        condition: Option<Box<Node>>,
        increment: Option<Box<Node>>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        condition: Box<Node>,
    },
    // The parser never produces the next five kinds; later passes may.
    Switch {
        expr: Box<Node>,
        cases: Vec<Node>,
    },
    Case {
        value: Box<Node>,
        statements: Vec<Node>,
    },
    Default {
        statements: Vec<Node>,
    },
    Goto {
        label: String,
    },
    Label {
        name: String,
        statement: Box<Node>,
    },
    Break,
    Continue,
    BinaryOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    ArrayAccess {
        array: Box<Node>,
        index: Box<Node>,
    },
    /// `object.member` or `object->member`
    MemberAccess {
        object: Box<Node>,
        member: String,
        arrow: bool,
    },
    Cast {
        ty: TypeSpec,
        expr: Box<Node>,
    },
    SizeOf {
        arg: SizeOfArg,
    },
    Ternary {
        condition: Box<Node>,
        then_expr: Box<Node>,
        else_expr: Box<Node>,
    },
    Assignment {
        target: Box<Node>,
        op: AssignOp,
        value: Box<Node>,
    },
    Variable {
        name: String,
    },
    Number(NumberValue),
    String(String),
    Char(String),
    Bool(bool),
    Null,
    StructDecl {
        name: Option<String>,
        /// `VariableDecl` or `ArrayDeclaration` nodes
        fields: Vec<Node>,
    },
    UnionDecl {
        name: Option<String>,
        fields: Vec<Node>,
    },
    EnumDecl {
        name: Option<String>,
        variants: Vec<Enumerator>,
    },
    /// Only the first alias of a multi-alias typedef is kept
    Typedef {
        target: TypeSpec,
        array_rank: usize,
        alias: String,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        use NodeKind::*;
        match self {
            Program { .. } => "Program",
            Include { .. } => "Include",
            Define { .. } => "Define",
            ExprStmt { .. } => "ExprStmt",
            VariableDecl { .. } => "VariableDecl",
            ArrayDeclaration { .. } => "ArrayDeclaration",
            FunctionDecl { .. } => "FunctionDecl",
            Param { .. } => "Param",
            Block { .. } => "Block",
            Return { .. } => "Return",
            If { .. } => "If",
            While { .. } => "While",
            For { .. } => "For",
            DoWhile { .. } => "DoWhile",
            Switch { .. } => "Switch",
            Case { .. } => "Case",
            Default { .. } => "Default",
            Goto { .. } => "Goto",
            Label { .. } => "Label",
            Break => "Break",
            Continue => "Continue",
            BinaryOp { .. } => "BinaryOp",
            UnaryOp { .. } => "UnaryOp",
            Call { .. } => "Call",
            ArrayAccess { .. } => "ArrayAccess",
            MemberAccess { .. } => "MemberAccess",
            Cast { .. } => "Cast",
            SizeOf { .. } => "SizeOf",
            Ternary { .. } => "Ternary",
            Assignment { .. } => "Assignment",
            Variable { .. } => "Variable",
            Number(_) => "Number",
            String(_) => "String",
            Char(_) => "Char",
            Bool(_) => "Bool",
            Null => "Null",
            StructDecl { .. } => "StructDecl",
            UnionDecl { .. } => "UnionDecl",
            EnumDecl { .. } => "EnumDecl",
            Typedef { .. } => "Typedef",
        }
    }

    /// One-line summary of the node's own (non-child) data
    fn detail(&self) -> std::string::String {
        use NodeKind::*;
        match self {
            Program { declarations } => format!("({} declarations)", declarations.len()),
            Include { filename } => format!("<{}>", filename),
            Define { name, .. } | Variable { name } | Label { name, .. } => name.clone(),
            VariableDecl { ty, name, .. } => format!("{} {}", ty, name),
            ArrayDeclaration { ty, name, .. } => format!("{} {}[]", ty, name),
            FunctionDecl { return_type, name, .. } => format!("{} -> {}", name, return_type),
            Param { ty, name } => match name {
                Some(name) => format!("{} {}", ty, name),
                None => ty.to_string(),
            },
            Block { statements } => format!("({} statements)", statements.len()),
            Goto { label } => label.clone(),
            BinaryOp { op, .. } => op.symbol().to_string(),
            UnaryOp { op, .. } => op.symbol().to_string(),
            MemberAccess { member, arrow, .. } => {
                format!("{}{}", if *arrow { "->" } else { "." }, member)
            }
            Cast { ty, .. } => format!("({})", ty),
            SizeOf { arg: SizeOfArg::Type(ty) } => format!("({})", ty),
            Assignment { op, .. } => op.symbol().to_string(),
            Number(n) => n.to_string(),
            String(s) => format!("{:?}", s),
            Char(c) => format!("{:?}", c),
            Bool(b) => b.to_string(),
            StructDecl { name, .. } | UnionDecl { name, .. } => {
                name.clone().unwrap_or_else(|| "<anonymous>".to_string())
            }
            EnumDecl { name, variants } => {
                let values: Vec<_> = variants
                    .iter()
                    .map(|v| format!("{}={}", v.name, v.value))
                    .collect();
                format!(
                    "{} {{{}}}",
                    name.as_deref().unwrap_or("<anonymous>"),
                    values.join(", ")
                )
            }
            Typedef { target, array_rank, alias } => {
                format!("{}{} {}", target, "[]".repeat(*array_rank), alias)
            }
            _ => std::string::String::new(),
        }
    }
}

/// Operand of `sizeof`: a parenthesized type or an expression
#[derive(Debug, Clone, PartialEq)]
pub enum SizeOfArg {
    Type(TypeSpec),
    Expr(Box<Node>),
}

/// One member of an enum declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub name: String,
    /// Value from auto-increment, reset by literal initializers
    pub value: i128,
    /// Initializer expression as written, evaluated only when literal
    pub initializer: Option<Node>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// A written type: `[signed|unsigned] base *...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub signedness: Option<Signedness>,
    /// Keyword or identifier naming the base type
    pub base: std::string::String,
    pub pointer_depth: usize,
}

impl TypeSpec {
    pub fn named(base: &str) -> Self {
        Self {
            signedness: None,
            base: base.to_string(),
            pointer_depth: 0,
        }
    }

    pub fn is_void(&self) -> bool {
        self.base == "void" && self.pointer_depth == 0
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signedness {
            Some(Signedness::Signed) => write!(f, "signed ")?,
            Some(Signedness::Unsigned) => write!(f, "unsigned ")?,
            None => {}
        }
        write!(f, "{}{}", self.base, "*".repeat(self.pointer_depth))
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn from_symbol(s: &str) -> Option<BinOp> {
        Some(match s {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// `+x`
    Plus,
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
    /// `*x`
    Deref,
    /// `&x`
    AddrOf,
    /// `x++`
    PostInc,
    /// `x--`
    PostDec,
}

impl UnOp {
    /// Prefix operator for a token spelling
    pub fn prefix(s: &str) -> Option<UnOp> {
        Some(match s {
            "+" => UnOp::Plus,
            "-" => UnOp::Neg,
            "!" => UnOp::Not,
            "~" => UnOp::BitNot,
            "++" => UnOp::PreInc,
            "--" => UnOp::PreDec,
            "*" => UnOp::Deref,
            "&" => UnOp::AddrOf,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnOp::Plus => "+",
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc => "++",
            UnOp::PreDec => "--",
            UnOp::Deref => "*",
            UnOp::AddrOf => "&",
            UnOp::PostInc => "++ (post)",
            UnOp::PostDec => "-- (post)",
        }
    }
}

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl AssignOp {
    pub fn from_symbol(s: &str) -> Option<AssignOp> {
        Some(match s {
            "=" => AssignOp::Assign,
            "+=" => AssignOp::AddAssign,
            "-=" => AssignOp::SubAssign,
            "*=" => AssignOp::MulAssign,
            "/=" => AssignOp::DivAssign,
            "%=" => AssignOp::ModAssign,
            "&=" => AssignOp::AndAssign,
            "|=" => AssignOp::OrAssign,
            "^=" => AssignOp::XorAssign,
            "<<=" => AssignOp::ShlAssign,
            ">>=" => AssignOp::ShrAssign,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::AndAssign => "&=",
            AssignOp::OrAssign => "|=",
            AssignOp::XorAssign => "^=",
            AssignOp::ShlAssign => "<<=",
            AssignOp::ShrAssign => ">>=",
        }
    }
}
