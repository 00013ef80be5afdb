//! Parser for KernelScript
//!
//! Recursive descent parser with Pratt parsing for binary expressions.
//!
//! Nested rules return `Err` on the first grammar violation and never recover
//! on their own. Rules that must choose between several grammars save the
//! cursor, try one alternative, and restore the cursor before trying the
//! next. Only the top-level loop recovers: it drops one token and resumes.

use log::{debug, warn};

use crate::frontend::ast::*;
use crate::frontend::token::{NumberValue, Token, TokenKind};
use crate::utils::{Error, Location, Result};

/// Keywords that can name a base type
const BASE_TYPE_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "bool",
];

/// Where a variable declaration appears; decides whether it owns a `;`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclContext {
    Global,
    Local,
    /// Initializer clause of a `for`, terminated by the loop header itself
    ForInit,
}

/// Parse a complete token vector into a `Program` node
pub fn parse(tokens: Vec<Token>) -> Node {
    Parser::new(tokens).parse()
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Returned when reading past the last token
    eof: Token,
    /// Print recovered top-level errors
    debug: bool,
    /// Set while a function body is being parsed
    in_function: bool,
    /// Errors the top-level loop recovered from
    recovered: Vec<Error>,
    /// Failed alternative that got furthest, with the cursor it failed at
    furthest: Option<(usize, Error)>,
}

impl Parser {
    /// Create a parser from pre-tokenized input
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_location = tokens
            .last()
            .map(|t| t.location)
            .unwrap_or_else(|| Location::new(1, 1));
        Self {
            tokens,
            pos: 0,
            eof: Token::eof(eof_location),
            debug: false,
            in_function: false,
            recovered: Vec::new(),
            furthest: None,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Errors skipped over by the last `parse` call, in order
    pub fn recovered(&self) -> &[Error] {
        &self.recovered
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.current().is_eof()
    }

    fn check_op(&self, op: &str) -> bool {
        self.current().is_operator(op)
    }

    fn check_kw(&self, kw: &str) -> bool {
        self.current().is_keyword(kw)
    }

    fn current_keyword(&self) -> Option<String> {
        match &self.current().kind {
            TokenKind::Keyword(kw) => Some(kw.clone()),
            _ => None,
        }
    }

    fn consume_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Error describing the current token as not being `expected`
    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        let message = if token.is_eof() {
            format!("expected {}, but reached end of file", expected)
        } else {
            format!(
                "expected {}, found {} '{}'",
                expected,
                token.kind.category(),
                token.kind
            )
        };
        Error::parse(message, token.location)
    }

    fn expect_op(&mut self, op: &str) -> Result<Token> {
        if self.check_op(op) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{}'", op)))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<Token> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{}'", kw)))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Location)> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let location = self.advance().location;
                Ok((name, location))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn consume_ident(&mut self) -> Option<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// Run one alternative; on failure rewind the cursor and return `None`.
    ///
    /// Failures stay silent here. The one that got furthest is kept so the
    /// top-level loop can report it.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        let saved = self.pos;
        match f(self) {
            Ok(value) => Some(value),
            Err(e) => {
                if self.furthest.as_ref().map_or(true, |(pos, _)| self.pos > *pos) {
                    self.furthest = Some((self.pos, e));
                }
                self.pos = saved;
                None
            }
        }
    }

    // ==================== Parsing Methods ====================

    /// Parse the whole token vector into a `Program`.
    ///
    /// Never fails: a declaration that does not parse is reported (when
    /// debugging) and skipped one token at a time.
    pub fn parse(&mut self) -> Node {
        let location = self.current().location;
        let mut declarations = Vec::new();
        self.pos = 0;
        self.recovered.clear();

        while !self.is_at_end() {
            let start = self.pos;
            let result = if matches!(self.current().kind, TokenKind::Preproc(_)) {
                self.parse_preprocessor()
            } else {
                self.parse_top_level_declaration().map(Some)
            };

            match result {
                Ok(Some(decl)) => declarations.push(decl),
                Ok(None) => {}
                Err(e) => {
                    if self.debug {
                        eprintln!("{}", e);
                    }
                    warn!("recovering from {}", e);
                    self.recovered.push(e);
                    self.in_function = false;
                    self.pos = start;
                    self.advance();
                }
            }
        }

        debug!(
            "parsed {} top-level declarations ({} recovered errors)",
            declarations.len(),
            self.recovered.len()
        );
        Node::new(NodeKind::Program { declarations }, location)
    }

    /// Parse `#include`, `#define` or skip any other directive line
    fn parse_preprocessor(&mut self) -> Result<Option<Node>> {
        let directive = self.advance();
        let location = directive.location;

        match &directive.kind {
            TokenKind::Preproc(word) if word == "#include" => {
                let filename = if self.consume_op("<") {
                    let mut parts = String::new();
                    while !self.check_op(">") && !self.is_at_end() {
                        parts.push_str(&self.advance().kind.to_string());
                    }
                    self.expect_op(">")?;
                    parts
                } else {
                    match &self.current().kind {
                        TokenKind::Str(name) => {
                            let name = name.clone();
                            self.advance();
                            name
                        }
                        _ => return Err(self.unexpected("file name")),
                    }
                };
                Ok(Some(Node::new(NodeKind::Include { filename }, location)))
            }
            TokenKind::Preproc(word) if word == "#define" => {
                let (name, name_loc) = self.expect_ident("macro name")?;
                let value = if !self.is_at_end() && self.current().location.line == name_loc.line {
                    Some(Box::new(self.parse_expression()?))
                } else {
                    None
                };
                Ok(Some(Node::new(NodeKind::Define { name, value }, location)))
            }
            _ => {
                while !self.is_at_end() && self.current().location.line == location.line {
                    self.advance();
                }
                Ok(None)
            }
        }
    }

    /// Aggregates, then function, then variable, then expression statement
    fn parse_top_level_declaration(&mut self) -> Result<Node> {
        if let Some(decl) = self.parse_aggregate()? {
            return Ok(decl);
        }

        self.furthest = None;
        if let Some(func) = self.attempt(|p| p.parse_function()) {
            return Ok(func);
        }
        if let Some(decl) = self.attempt(|p| p.parse_declaration(DeclContext::Global)) {
            return Ok(decl);
        }
        if let Some(stmt) = self.attempt(|p| p.parse_expression_statement()) {
            return Ok(stmt);
        }

        match self.furthest.take() {
            Some((_, e)) => Err(e),
            None => Err(self.unexpected("declaration")),
        }
    }

    /// struct, union, enum or typedef, chosen by the leading keyword
    fn parse_aggregate(&mut self) -> Result<Option<Node>> {
        let node = match self.current_keyword().as_deref() {
            Some("struct") => self.parse_record(false)?,
            Some("union") => self.parse_record(true)?,
            Some("enum") => self.parse_enum()?,
            Some("typedef") => self.parse_typedef()?,
            _ => return Ok(None),
        };
        Ok(Some(node))
    }

    fn parse_type_specifier(&mut self) -> Result<TypeSpec> {
        let signedness = if self.check_kw("signed") {
            self.advance();
            Some(Signedness::Signed)
        } else if self.check_kw("unsigned") {
            self.advance();
            Some(Signedness::Unsigned)
        } else {
            None
        };

        let base = match &self.current().kind {
            TokenKind::Keyword(kw) if BASE_TYPE_KEYWORDS.contains(&kw.as_str()) => kw.clone(),
            TokenKind::Ident(name) => name.clone(),
            _ => return Err(self.unexpected("type")),
        };
        self.advance();

        let mut pointer_depth = 0;
        while self.consume_op("*") {
            pointer_depth += 1;
        }

        Ok(TypeSpec {
            signedness,
            base,
            pointer_depth,
        })
    }

    fn requires_terminator(&self, context: DeclContext) -> bool {
        match context {
            DeclContext::Local => true,
            DeclContext::Global => !self.in_function,
            DeclContext::ForInit => false,
        }
    }

    /// Variable or array declaration
    fn parse_declaration(&mut self, context: DeclContext) -> Result<Node> {
        let location = self.current().location;
        let ty = self.parse_type_specifier()?;
        let (name, _) = self.expect_ident("variable name")?;

        if self.check_op("[") {
            return self.parse_array_declaration(ty, name, location, context);
        }

        let value = if self.consume_op("=") {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        if self.requires_terminator(context) {
            self.expect_op(";")?;
        }

        Ok(Node::new(NodeKind::VariableDecl { ty, name, value }, location))
    }

    fn parse_array_declaration(
        &mut self,
        ty: TypeSpec,
        name: String,
        location: Location,
        context: DeclContext,
    ) -> Result<Node> {
        self.expect_op("[")?;
        let size = if self.check_op("]") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_op("]")?;

        let values = if self.consume_op("=") {
            Some(self.parse_initializer_list()?)
        } else {
            None
        };

        if self.requires_terminator(context) {
            self.expect_op(";")?;
        }

        Ok(Node::new(
            NodeKind::ArrayDeclaration { ty, name, size, values },
            location,
        ))
    }

    /// `{ a, b, c }` with an optional trailing comma
    fn parse_initializer_list(&mut self) -> Result<Vec<Node>> {
        self.expect_op("{")?;
        let mut values = Vec::new();
        while !self.check_op("}") {
            values.push(self.parse_expression()?);
            if !self.consume_op(",") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(values)
    }

    /// Prototype or definition
    fn parse_function(&mut self) -> Result<Node> {
        let location = self.current().location;
        let return_type = self.parse_type_specifier()?;
        let (name, _) = self.expect_ident("function name")?;

        self.expect_op("(")?;
        let params = self.parse_params()?;
        self.expect_op(")")?;

        let body = if self.check_op("{") {
            let outer = std::mem::replace(&mut self.in_function, true);
            let body = self.parse_block();
            self.in_function = outer;
            Some(Box::new(body?))
        } else {
            self.expect_op(";")?;
            None
        };

        Ok(Node::new(
            NodeKind::FunctionDecl {
                return_type,
                name,
                params,
                body,
            },
            location,
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<Node>> {
        let mut params = Vec::new();
        if self.check_op(")") {
            return Ok(params);
        }
        if self.check_kw("void") && self.peek(1).is_operator(")") {
            self.advance();
            return Ok(params);
        }

        loop {
            let location = self.current().location;
            let ty = self.parse_type_specifier()?;
            let name = self.consume_ident();
            params.push(Node::new(NodeKind::Param { ty, name }, location));

            if !self.consume_op(",") || self.check_op(")") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_block(&mut self) -> Result<Node> {
        let location = self.expect_op("{")?.location;

        let mut statements = Vec::new();
        while !self.check_op("}") {
            if self.is_at_end() {
                return Err(Error::parse(
                    "unexpected end of file: unclosed block",
                    self.current().location,
                ));
            }
            if let Some(stmt) = self.parse_statement()? {
                statements.push(stmt);
            }
        }
        self.expect_op("}")?;

        Ok(Node::new(NodeKind::Block { statements }, location))
    }

    /// Parse one statement; the empty statement `;` yields `None`
    fn parse_statement(&mut self) -> Result<Option<Node>> {
        if self.consume_op(";") {
            return Ok(None);
        }
        if self.check_op("{") {
            return self.parse_block().map(Some);
        }

        if let Some(decl) = self.parse_aggregate()? {
            return Ok(Some(decl));
        }

        if let Some(kw) = self.current_keyword() {
            let stmt = match kw.as_str() {
                "return" => Some(self.parse_return()?),
                "if" => Some(self.parse_if()?),
                "while" => Some(self.parse_while()?),
                "for" => Some(self.parse_for()?),
                "do" => Some(self.parse_do_while()?),
                "break" | "continue" => {
                    let token = self.advance();
                    self.expect_op(";")?;
                    let kind = if token.is_keyword("break") {
                        NodeKind::Break
                    } else {
                        NodeKind::Continue
                    };
                    Some(Node::new(kind, token.location))
                }
                _ => None,
            };
            if stmt.is_some() {
                return Ok(stmt);
            }
        }

        if let Some(decl) = self.attempt(|p| p.parse_declaration(DeclContext::Local)) {
            return Ok(Some(decl));
        }
        if let Some(stmt) = self.attempt(|p| p.parse_expression_statement()) {
            return Ok(Some(stmt));
        }

        Err(self.unexpected("statement"))
    }

    /// Body of a control construct; `;` becomes an empty block
    fn parse_body(&mut self) -> Result<Box<Node>> {
        let location = self.current().location;
        let stmt = self.parse_statement()?;
        Ok(Box::new(stmt.unwrap_or_else(|| {
            Node::new(NodeKind::Block { statements: Vec::new() }, location)
        })))
    }

    fn parse_expression_statement(&mut self) -> Result<Node> {
        let location = self.current().location;
        let expr = self.parse_expression()?;
        self.expect_op(";")?;
        Ok(Node::new(NodeKind::ExprStmt { expr: Box::new(expr) }, location))
    }

    fn parse_return(&mut self) -> Result<Node> {
        let location = self.expect_kw("return")?.location;
        let value = if self.check_op(";") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_op(";")?;
        Ok(Node::new(NodeKind::Return { value }, location))
    }

    fn parse_condition(&mut self) -> Result<Box<Node>> {
        self.expect_op("(")?;
        let condition = self.parse_expression()?;
        self.expect_op(")")?;
        Ok(Box::new(condition))
    }

    fn parse_if(&mut self) -> Result<Node> {
        let location = self.expect_kw("if")?.location;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_body()?;
        let else_branch = if self.check_kw("else") {
            self.advance();
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            },
            location,
        ))
    }

    fn parse_while(&mut self) -> Result<Node> {
        let location = self.expect_kw("while")?.location;
        let condition = self.parse_condition()?;
        let body = self.parse_body()?;
        Ok(Node::new(NodeKind::While { condition, body }, location))
    }

    fn parse_for(&mut self) -> Result<Node> {
        let location = self.expect_kw("for")?.location;
        self.expect_op("(")?;

        let init = if self.check_op(";") {
            None
        } else {
            let decl = self.attempt(|p| p.parse_declaration(DeclContext::ForInit));
            Some(Box::new(match decl {
                Some(decl) => decl,
                None => self.parse_expression()?,
            }))
        };
        self.expect_op(";")?;

        let condition = if self.check_op(";") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_op(";")?;

        let increment = if self.check_op(")") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_op(")")?;

        let body = self.parse_body()?;
        Ok(Node::new(
            NodeKind::For {
                init,
                condition,
                increment,
                body,
            },
            location,
        ))
    }

    fn parse_do_while(&mut self) -> Result<Node> {
        let location = self.expect_kw("do")?.location;
        let body = self.parse_body()?;
        self.expect_kw("while")?;
        let condition = self.parse_condition()?;
        self.expect_op(";")?;
        Ok(Node::new(NodeKind::DoWhile { body, condition }, location))
    }

    // ==================== Struct, Union, Enum, Typedef ====================

    /// `struct|union [Name] [{ fields }] ;`
    fn parse_record(&mut self, is_union: bool) -> Result<Node> {
        let location = self.advance().location;
        let name = self.consume_ident();

        let mut fields = Vec::new();
        if self.consume_op("{") {
            while !self.check_op("}") {
                fields.push(self.parse_field()?);
            }
            self.expect_op("}")?;
        }
        self.expect_op(";")?;

        let kind = if is_union {
            NodeKind::UnionDecl { name, fields }
        } else {
            NodeKind::StructDecl { name, fields }
        };
        Ok(Node::new(kind, location))
    }

    fn parse_field(&mut self) -> Result<Node> {
        let location = self.current().location;
        let ty = self.parse_type_specifier()?;
        let (name, _) = self.expect_ident("field name")?;

        let kind = if self.consume_op("[") {
            let size = if self.check_op("]") {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            self.expect_op("]")?;
            NodeKind::ArrayDeclaration {
                ty,
                name,
                size,
                values: None,
            }
        } else {
            NodeKind::VariableDecl {
                ty,
                name,
                value: None,
            }
        };
        self.expect_op(";")?;
        Ok(Node::new(kind, location))
    }

    /// `enum [Name] [{ A, B = 4, C }] ;`
    fn parse_enum(&mut self) -> Result<Node> {
        let location = self.expect_kw("enum")?.location;
        let name = self.consume_ident();

        let mut variants = Vec::new();
        if self.consume_op("{") {
            let mut next_value: i128 = 0;
            while !self.check_op("}") {
                if !variants.is_empty() {
                    self.expect_op(",")?;
                    if self.check_op("}") {
                        break;
                    }
                }
                let (variant, variant_loc) = self.expect_ident("enumerator name")?;
                let initializer = if self.consume_op("=") {
                    let expr = self.parse_expression()?;
                    // Only literal numbers reset the counter
                    match &expr.kind {
                        NodeKind::Number(NumberValue::Int(n)) => next_value = *n,
                        NodeKind::Number(NumberValue::Float(f)) => next_value = *f as i128,
                        _ => {}
                    }
                    Some(expr)
                } else {
                    None
                };
                variants.push(Enumerator {
                    name: variant,
                    value: next_value,
                    initializer,
                    location: variant_loc,
                });
                next_value = next_value.wrapping_add(1);
            }
            self.expect_op("}")?;
        }
        self.expect_op(";")?;

        Ok(Node::new(NodeKind::EnumDecl { name, variants }, location))
    }

    /// `typedef base [*]alias[[]]..., ...;` keeping only the first alias
    fn parse_typedef(&mut self) -> Result<Node> {
        let location = self.expect_kw("typedef")?.location;
        let base = self.parse_type_specifier()?;

        let mut aliases = Vec::new();
        loop {
            let mut target = base.clone();
            while self.consume_op("*") {
                target.pointer_depth += 1;
            }
            let (alias, _) = self.expect_ident("type alias")?;

            let mut array_rank = 0;
            while self.consume_op("[") {
                if !self.check_op("]") {
                    self.parse_expression()?;
                }
                self.expect_op("]")?;
                array_rank += 1;
            }
            aliases.push((target, array_rank, alias));

            if !self.consume_op(",") {
                break;
            }
        }
        self.expect_op(";")?;

        let (target, array_rank, alias) = aliases.swap_remove(0);
        Ok(Node::new(
            NodeKind::Typedef {
                target,
                array_rank,
                alias,
            },
            location,
        ))
    }

    // ==================== Expression Parsing ====================

    pub fn parse_expression(&mut self) -> Result<Node> {
        self.parse_assignment()
    }

    /// Right-associative: `a = b = c` is `a = (b = c)`
    fn parse_assignment(&mut self) -> Result<Node> {
        let target = self.parse_ternary()?;

        let op = match &self.current().kind {
            TokenKind::Operator(s) => AssignOp::from_symbol(s),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };

        let location = self.advance().location;
        let value = self.parse_assignment()?;
        Ok(Node::new(
            NodeKind::Assignment {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            location,
        ))
    }

    fn parse_ternary(&mut self) -> Result<Node> {
        let condition = self.parse_binary(0)?;
        if !self.check_op("?") {
            return Ok(condition);
        }

        let location = self.advance().location;
        let then_expr = self.parse_expression()?;
        self.expect_op(":")?;
        let else_expr = self.parse_ternary()?;
        Ok(Node::new(
            NodeKind::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            location,
        ))
    }

    /// Precedence of a binary operator, `||` lowest
    fn binary_precedence(op: BinOp) -> u8 {
        match op {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::BitOr => 3,
            BinOp::BitXor => 4,
            BinOp::BitAnd => 5,
            BinOp::Eq | BinOp::Ne => 6,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 7,
            BinOp::Shl | BinOp::Shr => 8,
            BinOp::Add | BinOp::Sub => 9,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 10,
        }
    }

    /// Left-associative binary operators with binding power >= `min_bp`
    fn parse_binary(&mut self, min_bp: u8) -> Result<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current().kind {
                TokenKind::Operator(s) => BinOp::from_symbol(s),
                _ => None,
            };
            let Some(op) = op else {
                break;
            };
            let bp = Self::binary_precedence(op);
            if bp < min_bp {
                break;
            }

            let location = self.advance().location;
            let right = self.parse_binary(bp + 1)?;
            left = Node::new(
                NodeKind::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                location,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let location = self.current().location;

        let prefix = match &self.current().kind {
            TokenKind::Operator(s) => UnOp::prefix(s),
            _ => None,
        };
        if let Some(op) = prefix {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Node::new(
                NodeKind::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        if self.check_kw("sizeof") {
            self.advance();
            let ty = self.attempt(|p| {
                p.expect_op("(")?;
                let ty = p.parse_type_specifier()?;
                p.expect_op(")")?;
                Ok(ty)
            });
            let arg = match ty {
                Some(ty) => SizeOfArg::Type(ty),
                None => SizeOfArg::Expr(Box::new(self.parse_unary()?)),
            };
            return Ok(Node::new(NodeKind::SizeOf { arg }, location));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut expr = self.parse_primary()?;

        loop {
            let location = self.current().location;
            let kind = if self.consume_op("[") {
                let index = self.parse_expression()?;
                self.expect_op("]")?;
                NodeKind::ArrayAccess {
                    array: Box::new(expr),
                    index: Box::new(index),
                }
            } else if self.consume_op("(") {
                let mut args = Vec::new();
                if !self.check_op(")") {
                    args.push(self.parse_expression()?);
                    while self.consume_op(",") {
                        args.push(self.parse_expression()?);
                    }
                }
                self.expect_op(")")?;
                NodeKind::Call {
                    callee: Box::new(expr),
                    args,
                }
            } else if self.check_op(".") || self.check_op("->") {
                let arrow = self.advance().is_operator("->");
                let (member, _) = self.expect_ident("member name")?;
                NodeKind::MemberAccess {
                    object: Box::new(expr),
                    member,
                    arrow,
                }
            } else if self.check_op("++") || self.check_op("--") {
                let op = if self.advance().is_operator("++") {
                    UnOp::PostInc
                } else {
                    UnOp::PostDec
                };
                NodeKind::UnaryOp {
                    op,
                    operand: Box::new(expr),
                }
            } else {
                break;
            };
            expr = Node::new(kind, location);
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let token = self.current().clone();
        let location = token.location;

        let kind = match token.kind {
            TokenKind::Eof => {
                return Err(Error::parse("unexpected end of file", location));
            }
            TokenKind::Operator(ref op) if op == "(" => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_op(")")?;
                return Ok(expr);
            }
            TokenKind::Ident(name) => NodeKind::Variable { name },
            TokenKind::Number(value) => NodeKind::Number(value),
            TokenKind::Str(value) => NodeKind::String(value),
            TokenKind::Char(value) => NodeKind::Char(value),
            TokenKind::Keyword(ref kw) if kw == "true" || kw == "false" => NodeKind::Bool(kw == "true"),
            TokenKind::Keyword(ref kw) if kw == "null" => NodeKind::Null,
            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(Node::new(kind, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Node {
        parse(tokenize(source, None).unwrap())
    }

    fn declarations(program: Node) -> Vec<Node> {
        match program.kind {
            NodeKind::Program { declarations } => declarations,
            other => panic!("expected program, got {:?}", other),
        }
    }

    fn expr(source: &str) -> Node {
        let mut parser = Parser::new(tokenize(source, None).unwrap());
        parser.parse_expression().unwrap()
    }

    /// Compact s-expression rendering of an expression tree
    fn sexp(node: &Node) -> String {
        match &node.kind {
            NodeKind::Number(n) => n.to_string(),
            NodeKind::Variable { name } => name.clone(),
            NodeKind::BinaryOp { op, left, right } => {
                format!("({} {} {})", op.symbol(), sexp(left), sexp(right))
            }
            NodeKind::Assignment { target, op, value } => {
                format!("({} {} {})", op.symbol(), sexp(target), sexp(value))
            }
            NodeKind::UnaryOp { op, operand } => format!("({} {})", op.symbol(), sexp(operand)),
            NodeKind::Ternary { condition, then_expr, else_expr } => format!(
                "(? {} {} {})",
                sexp(condition),
                sexp(then_expr),
                sexp(else_expr)
            ),
            NodeKind::Call { callee, args } => {
                let args: Vec<_> = args.iter().map(sexp).collect();
                format!("(call {} {})", sexp(callee), args.join(" "))
            }
            NodeKind::ArrayAccess { array, index } => format!("([] {} {})", sexp(array), sexp(index)),
            NodeKind::MemberAccess { object, member, arrow } => {
                format!("({} {} {})", if *arrow { "->" } else { "." }, sexp(object), member)
            }
            NodeKind::SizeOf { arg: SizeOfArg::Type(ty) } => format!("(sizeof-type {})", ty),
            NodeKind::SizeOf { arg: SizeOfArg::Expr(e) } => format!("(sizeof {})", sexp(e)),
            other => other.name().to_string(),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(sexp(&expr("1 + 2 * 3")), "(+ 1 (* 2 3))");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(sexp(&expr("a = b = 1")), "(= a (= b 1))");
    }

    #[test]
    fn test_binary_is_left_associative() {
        assert_eq!(sexp(&expr("a - b - c")), "(- (- a b) c)");
        assert_eq!(sexp(&expr("a || b && c | d")), "(|| a (&& b (| c d)))");
    }

    #[test]
    fn test_ternary_nests_to_the_right() {
        assert_eq!(sexp(&expr("a ? b : c ? d : e")), "(? a b (? c d e))");
    }

    #[test]
    fn test_unary_and_postfix() {
        assert_eq!(sexp(&expr("-x++")), "(- (++ (post) x))");
        assert_eq!(sexp(&expr("*p->next")), "(* (-> p next))");
        assert_eq!(sexp(&expr("f(a, b[1]).y")), "(. (call f a ([] b 1)) y)");
    }

    #[test]
    fn test_sizeof_type_or_expression() {
        assert_eq!(sexp(&expr("sizeof(unsigned int*)")), "(sizeof-type unsigned int*)");
        assert_eq!(sexp(&expr("sizeof(x + 1)")), "(sizeof (+ x 1))");
        assert_eq!(sexp(&expr("sizeof -y")), "(sizeof (- y))");
    }

    #[test]
    fn test_top_level_declaration_count() {
        let source = r#"
            #include <stdio.h>
            #include "local.h"
            #define LIMIT 10
            #pragma once
            struct Point { int x; int y; };
            union Value { int i; float f[2]; };
            enum Color { RED, GREEN = 5, BLUE };
            typedef unsigned int uint, *uintp;
            int counter = 0;
            int table[3] = {1, 2, 3,};
            int add(int a, int b);
            int add(int a, int b) { return a + b; }
            add(1, 2);
        "#;
        let decls = declarations(parse_source(source));
        let kinds: Vec<_> = decls.iter().map(|d| d.kind.name()).collect();
        assert_eq!(
            kinds,
            vec![
                "Include",
                "Include",
                "Define",
                "StructDecl",
                "UnionDecl",
                "EnumDecl",
                "Typedef",
                "VariableDecl",
                "ArrayDeclaration",
                "FunctionDecl",
                "FunctionDecl",
                "ExprStmt",
            ]
        );
        assert!(matches!(&decls[0].kind, NodeKind::Include { filename } if filename == "stdio.h"));
        assert!(matches!(&decls[1].kind, NodeKind::Include { filename } if filename == "local.h"));
    }

    #[test]
    fn test_enum_auto_increment() {
        let decls = declarations(parse_source("enum E { A, B = 10, C, D = A + 1, F };"));
        let NodeKind::EnumDecl { variants, .. } = &decls[0].kind else {
            panic!("expected enum");
        };
        let values: Vec<_> = variants.iter().map(|v| (v.name.as_str(), v.value)).collect();
        assert_eq!(values, vec![("A", 0), ("B", 10), ("C", 11), ("D", 12), ("F", 13)]);
        assert!(variants[3].initializer.is_some());
    }

    #[test]
    fn test_typedef_keeps_first_alias() {
        let decls = declarations(parse_source("typedef char *str, names[4];"));
        match &decls[0].kind {
            NodeKind::Typedef { target, array_rank, alias } => {
                assert_eq!(alias, "str");
                assert_eq!(target.to_string(), "char*");
                assert_eq!(*array_rank, 0);
            }
            other => panic!("expected typedef, got {:?}", other),
        }
    }

    #[test]
    fn test_void_and_empty_parameter_lists() {
        for source in ["int f(void);", "int f();"] {
            let decls = declarations(parse_source(source));
            assert!(matches!(&decls[0].kind, NodeKind::FunctionDecl { params, body: None, .. } if params.is_empty()));
        }
        let decls = declarations(parse_source("void g(int, char *name) {}"));
        let NodeKind::FunctionDecl { params, .. } = &decls[0].kind else {
            panic!("expected function");
        };
        let names: Vec<_> = params
            .iter()
            .map(|p| match &p.kind {
                NodeKind::Param { name, .. } => name.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![None, Some("name".to_string())]);
    }

    #[test]
    fn test_statements() {
        let source = r#"
            int main() {
                int i;
                for (int j = 0; j < 10; j++) { i += j; }
                while (i > 0) i--;
                do { i++; } while (i < 3);
                if (i) ; else { return 1; }
                for (;;) break;
                return 0;
            }
        "#;
        let decls = declarations(parse_source(source));
        let NodeKind::FunctionDecl { body: Some(body), .. } = &decls[0].kind else {
            panic!("expected function body");
        };
        let NodeKind::Block { statements } = &body.kind else {
            panic!("expected block");
        };
        let kinds: Vec<_> = statements.iter().map(|s| s.kind.name()).collect();
        assert_eq!(kinds, vec!["VariableDecl", "For", "While", "DoWhile", "If", "For", "Return"]);
    }

    #[test]
    fn test_braced_blocks_nest_as_statements() {
        let tokens = tokenize(
            "int main() { int x = 1; if (x) { int x = 2; return x; } { x++; } return x; }",
            None,
        )
        .unwrap();
        let mut parser = Parser::new(tokens);
        let decls = declarations(parser.parse());
        assert!(parser.recovered().is_empty());
        assert_eq!(decls.len(), 1);

        let NodeKind::FunctionDecl { body: Some(body), .. } = &decls[0].kind else {
            panic!("expected function body");
        };
        let NodeKind::Block { statements } = &body.kind else {
            panic!("expected block");
        };
        let kinds: Vec<_> = statements.iter().map(|s| s.kind.name()).collect();
        assert_eq!(kinds, vec!["VariableDecl", "If", "Block", "Return"]);
        let NodeKind::If { then_branch, .. } = &statements[1].kind else {
            panic!("expected if");
        };
        assert!(matches!(&then_branch.kind, NodeKind::Block { statements } if statements.len() == 2));
    }

    #[test]
    fn test_recovery_skips_bad_declaration() {
        let tokens = tokenize("int x = ; int y = 2;", None).unwrap();
        let mut parser = Parser::new(tokens);
        let decls = declarations(parser.parse());
        assert_eq!(decls.len(), 1);
        assert!(matches!(&decls[0].kind, NodeKind::VariableDecl { name, .. } if name == "y"));
        assert!(!parser.recovered().is_empty());
    }

    #[test]
    fn test_eof_inside_block_is_reported() {
        let tokens = tokenize("int main() { return 0;", None).unwrap();
        let mut parser = Parser::new(tokens).with_debug(false);
        parser.parse();
        let first = &parser.recovered()[0];
        assert_eq!(first.message(), "unexpected end of file: unclosed block");
    }

    #[test]
    fn test_define_without_value() {
        let decls = declarations(parse_source("#define DEBUG\nint x;"));
        assert!(matches!(&decls[0].kind, NodeKind::Define { name, value: None } if name == "DEBUG"));
        assert_eq!(decls[1].kind.name(), "VariableDecl");
    }
}
