//! Semantic Analysis for KernelScript
//!
//! Performs:
//! - Symbol table management (scopes, definitions, shadowing)
//! - Name resolution for variables and types
//! - Constant, division and array size checks
//! - Missing return and unused symbol warnings
//!
//! Errors are collected rather than raised, so one walk reports every
//! problem. `analyze` returns the first error only after the walk and the
//! unused symbol sweep have both finished.

use std::collections::HashMap;

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::token::NumberValue;
use crate::types::{PrimitiveType, TypeDescriptor};
use crate::utils::{Error, Location, Result};

// ==================== Symbol Table ====================

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Pre-registered primitive type name
    BuiltinType,
    /// struct, union, enum or typedef name
    Type,
    Function,
    Variable,
    Parameter,
    Enumerator,
    /// `#define` name
    Macro,
}

/// Symbol information
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    pub name: String,
    pub ty: TypeDescriptor,
    pub kind: SymbolKind,
    /// Declaring node, `None` for built-ins
    pub node: Option<&'a Node>,
    pub location: Location,
    pub level: usize,
    pub is_constant: bool,
    pub is_used: bool,
    pub is_initialized: bool,
}

impl<'a> Symbol<'a> {
    fn new(name: &str, ty: TypeDescriptor, kind: SymbolKind, node: &'a Node) -> Self {
        Self {
            name: name.to_string(),
            ty,
            kind,
            node: Some(node),
            location: node.location,
            level: 0,
            is_constant: false,
            is_used: false,
            is_initialized: false,
        }
    }

    fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }

    fn initialized(mut self) -> Self {
        self.is_initialized = true;
        self
    }

    fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}

/// A scope containing symbols
#[derive(Debug)]
pub struct Scope<'a> {
    pub name: String,
    pub parent: Option<ScopeId>,
    pub level: usize,
    pub children: Vec<ScopeId>,
    symbols: HashMap<String, Symbol<'a>>,
}

impl<'a> Scope<'a> {
    pub fn get(&self, name: &str) -> Option<&Symbol<'a>> {
        self.symbols.get(name)
    }

    /// Symbols in declaration order
    pub fn symbols(&self) -> Vec<&Symbol<'a>> {
        let mut symbols: Vec<_> = self.symbols.values().collect();
        symbols.sort_by_key(|s| (s.location.line, s.location.column));
        symbols
    }
}

/// Symbol table with nested scopes.
///
/// Scopes are kept in an arena and never removed, so the whole tree is
/// still available once the walk has returned to the global scope.
pub struct SymbolTable<'a> {
    scopes: Vec<Scope<'a>>,
    current: ScopeId,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        // Create global scope
        let global = Scope {
            name: "global".to_string(),
            parent: None,
            level: 0,
            children: Vec::new(),
            symbols: HashMap::new(),
        };
        Self {
            scopes: vec![global],
            current: ScopeId(0),
        }
    }

    /// Enter a new child of the current scope
    pub fn enter_scope(&mut self, name: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let level = self.scopes[self.current.0].level + 1;
        self.scopes.push(Scope {
            name: name.into(),
            parent: Some(self.current),
            level,
            children: Vec::new(),
            symbols: HashMap::new(),
        });
        self.scopes[self.current.0].children.push(id);
        self.current = id;
        id
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn level(&self) -> usize {
        self.scopes[self.current.0].level
    }

    pub fn scope(&self, id: ScopeId) -> &Scope<'a> {
        &self.scopes[id.0]
    }

    /// Every scope ever entered, parents before children
    pub fn scopes(&self) -> impl Iterator<Item = &Scope<'a>> {
        self.scopes.iter()
    }

    /// Define a symbol in the current scope
    pub fn define(&mut self, mut symbol: Symbol<'a>) -> Result<()> {
        let scope = &mut self.scopes[self.current.0];
        if scope.symbols.contains_key(&symbol.name) {
            return Err(Error::compile(
                format!("redefinition of '{}'", symbol.name),
                symbol.location,
            ));
        }
        symbol.level = scope.level;
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look up a symbol, searching from current scope upward
    pub fn lookup(&self, name: &str) -> Option<&Symbol<'a>> {
        let id = self.resolve(name)?;
        self.scopes[id.0].symbols.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol<'a>> {
        let id = self.resolve(name)?;
        self.scopes[id.0].symbols.get_mut(name)
    }

    /// Look up a symbol only in the current scope
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol<'a>> {
        self.scopes[self.current.0].symbols.get(name)
    }

    fn resolve(&self, name: &str) -> Option<ScopeId> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if self.scopes[id.0].symbols.contains_key(name) {
                return Some(id);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }
}

impl Default for SymbolTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer<'a> {
    symbols: SymbolTable<'a>,
    errors: Vec<Error>,
    warnings: Vec<String>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new() -> Self {
        let mut analyzer = Self {
            symbols: SymbolTable::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        analyzer.register_builtins();
        analyzer
    }

    /// Register primitive type names in the global scope
    fn register_builtins(&mut self) {
        for prim in PrimitiveType::ALL {
            let symbol = Symbol {
                name: prim.name().to_string(),
                ty: TypeDescriptor::primitive(prim.name()),
                kind: SymbolKind::BuiltinType,
                node: None,
                location: Location::default(),
                level: 0,
                is_constant: true,
                is_used: false,
                is_initialized: true,
            };
            if let Err(e) = self.symbols.define(symbol) {
                self.errors.push(e);
            }
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Warnings as `Line <n>: <message>`
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    /// Analyze a program, returning the first error found
    pub fn analyze(&mut self, program: &'a Node) -> Result<()> {
        self.symbols.enter_scope("program");
        self.visit(program);
        self.symbols.exit_scope();
        self.find_unused();

        debug!(
            "analysis finished: {} errors, {} warnings, {} scopes",
            self.errors.len(),
            self.warnings.len(),
            self.symbols.scopes.len()
        );

        match self.errors.first() {
            Some(first) => Err(first.clone()),
            None => Ok(()),
        }
    }

    fn error(&mut self, message: impl Into<String>, location: Location) {
        self.errors.push(Error::compile(message, location));
    }

    fn warning(&mut self, message: impl AsRef<str>, line: usize) {
        self.warnings.push(format!("Line {}: {}", line, message.as_ref()));
    }

    fn define(&mut self, symbol: Symbol<'a>) {
        if let Err(e) = self.symbols.define(symbol) {
            self.errors.push(e);
        }
    }

    /// Warn on unused symbols in every scope of the tree
    fn find_unused(&mut self) {
        let mut unused = Vec::new();
        for scope in self.symbols.scopes() {
            for symbol in scope.symbols() {
                let exempt = matches!(
                    symbol.kind,
                    SymbolKind::BuiltinType
                        | SymbolKind::Function
                        | SymbolKind::Enumerator
                        | SymbolKind::Macro
                );
                if !symbol.is_used && !exempt && !symbol.name.starts_with('_') {
                    unused.push((symbol.name.clone(), symbol.location.line));
                }
            }
        }
        for (name, line) in unused {
            self.warning(format!("unused '{}'", name), line);
        }
    }

    // ==================== Type Resolution ====================

    /// Resolve a written type, reporting unknown names
    fn resolve_type(&mut self, spec: &TypeSpec, location: Location) -> TypeDescriptor {
        let found = self
            .symbols
            .lookup_mut(&spec.base)
            .filter(|sym| matches!(sym.kind, SymbolKind::BuiltinType | SymbolKind::Type))
            .map(|sym| {
                sym.is_used = true;
                sym.ty.clone()
            });
        let base = match found {
            Some(ty) => ty,
            None => {
                self.error(format!("unknown type '{}'", spec.base), location);
                TypeDescriptor::primitive(spec.base.as_str())
            }
        };
        base.pointer_to(spec.pointer_depth)
    }

    // ==================== Node Visitors ====================

    fn visit(&mut self, node: &'a Node) {
        match &node.kind {
            NodeKind::FunctionDecl {
                return_type,
                name,
                params,
                body,
            } => self.visit_function(node, return_type, name, params, body.as_deref()),
            NodeKind::VariableDecl { ty, name, value } => {
                self.visit_variable(node, ty, name, value.as_deref())
            }
            NodeKind::ArrayDeclaration {
                ty,
                name,
                size,
                values,
            } => self.visit_array(node, ty, name, size.as_deref(), values.as_deref()),
            NodeKind::Assignment { target, value, .. } => {
                self.visit(target);
                self.visit(value);
                if let NodeKind::Variable { name } = &target.kind {
                    if let Some(sym) = self.symbols.lookup_mut(name) {
                        sym.is_used = true;
                        if sym.is_constant {
                            let message = format!("cannot assign to constant '{}'", name);
                            self.error(message, node.location);
                        }
                    }
                }
            }
            NodeKind::Variable { name } => match self.symbols.lookup_mut(name) {
                Some(sym) => sym.is_used = true,
                None => self.error(format!("undefined variable '{}'", name), node.location),
            },
            NodeKind::BinaryOp { op, left, right } => {
                self.visit(left);
                self.visit(right);
                if *op == BinOp::Div {
                    if let NodeKind::Number(n) = &right.kind {
                        if n.is_zero() {
                            self.error("division by zero", right.location);
                        }
                    }
                }
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit(condition);
                self.visit_scoped("if_then", then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_scoped("if_else", else_branch);
                }
            }
            NodeKind::While { condition, body } => {
                self.visit(condition);
                self.visit_scoped("while", body);
            }
            NodeKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                for clause in [init, condition, increment].into_iter().flatten() {
                    self.visit(clause);
                }
                self.visit_scoped("for", body);
            }
            NodeKind::DoWhile { body, condition } => {
                self.visit_scoped("do", body);
                self.visit(condition);
            }
            NodeKind::StructDecl { name, fields } => {
                let ty = TypeDescriptor::Struct {
                    name: name.clone().unwrap_or_default(),
                };
                self.visit_record(node, "struct", name.as_deref(), ty, fields);
            }
            NodeKind::UnionDecl { name, fields } => {
                let ty = TypeDescriptor::Union {
                    name: name.clone().unwrap_or_default(),
                };
                self.visit_record(node, "union", name.as_deref(), ty, fields);
            }
            NodeKind::EnumDecl { name, variants } => self.visit_enum(node, name.as_deref(), variants),
            NodeKind::Typedef {
                target,
                array_rank,
                alias,
            } => {
                let target = (0..*array_rank).fold(self.resolve_type(target, node.location), |ty, _| ty.array_of());
                let ty = TypeDescriptor::Alias {
                    target: Box::new(target),
                };
                self.define(Symbol::new(alias, ty, SymbolKind::Type, node).constant());
            }
            NodeKind::Define { name, value } => {
                if let Some(value) = value {
                    self.visit(value);
                }
                let ty = TypeDescriptor::primitive("int");
                self.define(
                    Symbol::new(name, ty, SymbolKind::Macro, node)
                        .constant()
                        .initialized(),
                );
            }
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }

    fn visit_scoped(&mut self, scope: &str, node: &'a Node) {
        self.symbols.enter_scope(scope);
        self.visit(node);
        self.symbols.exit_scope();
    }

    fn visit_function(
        &mut self,
        node: &'a Node,
        return_type: &TypeSpec,
        name: &str,
        params: &'a [Node],
        body: Option<&'a Node>,
    ) {
        let ty = self.resolve_type(return_type, node.location).function_returning();

        // A prototype may be followed by its definition
        let previous = self
            .symbols
            .lookup_local(name)
            .filter(|sym| sym.kind == SymbolKind::Function && sym.ty.is_function())
            .and_then(|sym| sym.node);
        match previous {
            Some(prev) if !(has_body(prev) && body.is_some()) => {
                if body.is_some() {
                    if let Some(sym) = self.symbols.lookup_mut(name) {
                        sym.node = Some(node);
                        sym.location = node.location;
                    }
                }
            }
            _ => self.define(Symbol::new(name, ty, SymbolKind::Function, node).constant()),
        }

        let Some(body) = body else {
            return;
        };

        self.symbols.enter_scope(format!("function {}", name));
        for param in params {
            if let NodeKind::Param {
                ty,
                name: Some(param_name),
            } = &param.kind
            {
                let ty = self.resolve_type(ty, param.location);
                self.define(Symbol::new(param_name, ty, SymbolKind::Parameter, param).initialized());
            }
        }
        self.visit(body);

        if !return_type.is_void() && !guarantees_return(body) {
            self.warning(format!("function '{}' may not return a value", name), node.line());
        }
        self.symbols.exit_scope();
    }

    fn visit_variable(&mut self, node: &'a Node, ty: &TypeSpec, name: &str, value: Option<&'a Node>) {
        let descriptor = self.resolve_type(ty, node.location);
        self.define(Symbol::new(name, descriptor, SymbolKind::Variable, node));

        let Some(value) = value else {
            return;
        };
        self.visit(value);
        if matches!(value.kind, NodeKind::Number(_))
            && !ty.base.contains("int")
            && !ty.base.contains("float")
        {
            self.warning(format!("initializing '{}' with a number", ty), node.line());
        }
        self.mark_initialized(name);
    }

    fn visit_array(
        &mut self,
        node: &'a Node,
        ty: &TypeSpec,
        name: &str,
        size: Option<&'a Node>,
        values: Option<&'a [Node]>,
    ) {
        let descriptor = self.resolve_type(ty, node.location).array_of();
        self.define(Symbol::new(name, descriptor, SymbolKind::Variable, node));

        if let Some(size) = size {
            self.visit(size);
            let non_positive = match &size.kind {
                NodeKind::Number(NumberValue::Int(i)) => *i <= 0,
                NodeKind::Number(NumberValue::Float(f)) => *f <= 0.0,
                _ => false,
            };
            if non_positive {
                self.error("array size must be positive", size.location);
            }
        }

        if let Some(values) = values {
            for value in values {
                self.visit(value);
            }
            self.mark_initialized(name);
        }
    }

    fn mark_initialized(&mut self, name: &str) {
        if let Some(sym) = self.symbols.lookup_mut(name) {
            sym.is_initialized = true;
        }
    }

    /// struct or union: a constant type symbol plus a scope for the fields
    fn visit_record(
        &mut self,
        node: &'a Node,
        keyword: &str,
        name: Option<&str>,
        ty: TypeDescriptor,
        fields: &'a [Node],
    ) {
        if let Some(name) = name {
            self.define(Symbol::new(name, ty, SymbolKind::Type, node).constant());
        }

        self.symbols
            .enter_scope(format!("{} {}", keyword, name.unwrap_or("<anonymous>")));
        for field in fields {
            self.visit(field);
        }
        self.symbols.exit_scope();
    }

    fn visit_enum(&mut self, node: &'a Node, name: Option<&str>, variants: &'a [Enumerator]) {
        let ty = match name {
            Some(name) => {
                let ty = TypeDescriptor::Enum {
                    name: name.to_string(),
                };
                self.define(Symbol::new(name, ty.clone(), SymbolKind::Type, node).constant());
                ty
            }
            None => TypeDescriptor::primitive("int"),
        };

        for variant in variants {
            if let Some(init) = &variant.initializer {
                self.visit(init);
            }
            self.define(
                Symbol::new(&variant.name, ty.clone(), SymbolKind::Enumerator, node)
                    .at(variant.location)
                    .constant()
                    .initialized(),
            );
        }
    }
}

impl Default for SemanticAnalyzer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn has_body(node: &Node) -> bool {
    matches!(node.kind, NodeKind::FunctionDecl { body: Some(_), .. })
}

/// Whether every path through `node` ends in a `return`, judged on syntax alone
fn guarantees_return(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Return { .. } => true,
        NodeKind::Block { statements } => statements.iter().any(guarantees_return),
        NodeKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => guarantees_return(then_branch) && guarantees_return(else_branch),
        _ => false,
    }
}
