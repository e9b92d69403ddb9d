//! Recursive-descent parser for the JavaScript subset the mutator works on.
//!
//! Anything outside the subset (templates, regex literals, destructuring,
//! spread, labels, modules, generators, async) is reported as
//! `ParseError::Unsupported`, which the corpus treats like any other
//! unparseable seed.

use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::symbol::Symbol;
use crate::tree::{
    AssignOp, BinaryOp, Catch, Class, Declarator, Function, Literal, LogicalOp, MemberProp,
    Method, Node, NodeId, Program, PropKey, Property, UnaryOp, UpdateOp, VarKind,
};

const RESERVED: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

/// Parse a whole source file.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()?;
    Ok(parser.program)
}

#[derive(Copy, Clone)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Infix {
    fn precedence(self) -> u8 {
        match self {
            Infix::Binary(op) => op.precedence(),
            Infix::Logical(op) => op.precedence(),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    program: Program,
    /// Set while parsing a `for` head, where `in` starts the loop instead of
    /// being a binary operator.
    no_in: bool,
}

impl Parser {
    /// `tokens` must end with `TokenKind::Eof`, as `tokenize` guarantees.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            program: Program::new(),
            no_in: false,
        }
    }

    pub fn parse_program(&mut self) -> Result<(), ParseError> {
        while !self.at_eof() {
            let stmt = self.statement()?;
            self.program.push_toplevel(stmt);
        }
        Ok(())
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    // ---------------------------------------------------------------
    // Token plumbing
    // ---------------------------------------------------------------

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.position + offset).min(last)]
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Punct(q) if q == p)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Word(word) if word == w)
    }

    fn peek_word(&self) -> Option<String> {
        match &self.peek().kind {
            TokenKind::Word(w) => Some(w.clone()),
            _ => None,
        }
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        let found = self.is_punct(p);
        if found {
            self.advance();
        }
        found
    }

    fn eat_word(&mut self, w: &str) -> bool {
        let found = self.is_word(w);
        if found {
            self.advance();
        }
        found
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{p}'")))
        }
    }

    fn expect_word(&mut self, w: &str) -> Result<(), ParseError> {
        if self.eat_word(w) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{w}'")))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        unexpected_token(self.peek(), expected)
    }

    fn unsupported(&self, what: &'static str) -> ParseError {
        let token = self.peek();
        ParseError::Unsupported {
            what,
            line: token.line,
            column: token.column,
        }
    }

    fn identifier(&mut self) -> Result<Symbol, ParseError> {
        match self.peek_word() {
            Some(w) if !is_reserved(&w) => {
                self.advance();
                Ok(self.program.to_sym(&w))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Property and method names may be reserved words.
    fn property_name(&mut self) -> Result<Symbol, ParseError> {
        match self.peek_word() {
            Some(w) => {
                self.advance();
                Ok(self.program.to_sym(&w))
            }
            None => Err(self.unexpected("property name")),
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.program.alloc(node)
    }

    /// Run `f` with the `in` operator re-enabled, as inside brackets.
    fn allow_in<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn statement(&mut self) -> Result<NodeId, ParseError> {
        if self.is_punct("{") {
            return self.block();
        }
        if self.eat_punct(";") {
            return Ok(self.alloc(Node::Empty));
        }

        match self.peek_word().as_deref() {
            Some("var" | "let" | "const") => {
                let decl = self.var_decl()?;
                self.consume_semicolon()?;
                Ok(decl)
            }
            Some("function") => self.function_decl(),
            Some("class") => self.class_decl(),
            Some("if") => self.if_statement(),
            Some("for") => self.for_statement(),
            Some("while") => {
                self.advance();
                let test = self.paren_expression()?;
                let body = self.statement()?;
                Ok(self.alloc(Node::While { test, body }))
            }
            Some("do") => {
                self.advance();
                let body = self.statement()?;
                self.expect_word("while")?;
                let test = self.paren_expression()?;
                self.eat_punct(";");
                Ok(self.alloc(Node::DoWhile { body, test }))
            }
            Some("switch") => self.switch_statement(),
            Some("with") => {
                self.advance();
                let object = self.paren_expression()?;
                let body = self.statement()?;
                Ok(self.alloc(Node::With { object, body }))
            }
            Some(word @ ("break" | "continue")) => {
                self.advance();
                if matches!(self.peek().kind, TokenKind::Word(_)) && !self.peek().newline_before {
                    return Err(self.unsupported("labels"));
                }
                self.consume_semicolon()?;
                let node = if word == "break" {
                    Node::Break
                } else {
                    Node::Continue
                };
                Ok(self.alloc(node))
            }
            Some("return") => {
                self.advance();
                let ends = self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before;
                let arg = if ends {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                Ok(self.alloc(Node::Return(arg)))
            }
            Some("throw") => {
                self.advance();
                let arg = self.expression()?;
                self.consume_semicolon()?;
                Ok(self.alloc(Node::Throw(arg)))
            }
            Some("try") => self.try_statement(),
            Some("import" | "export") => Err(self.unsupported("module syntax")),
            Some("debugger") => Err(self.unsupported("debugger statement")),
            _ => {
                let expr = self.expression()?;
                self.consume_semicolon()?;
                Ok(self.alloc(Node::Expr(expr)))
            }
        }
    }

    fn block(&mut self) -> Result<NodeId, ParseError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(self.alloc(Node::Block { body }))
    }

    fn var_kind(&mut self) -> Result<VarKind, ParseError> {
        let kind = match self.peek_word().as_deref() {
            Some("var") => VarKind::Var,
            Some("let") => VarKind::Let,
            Some("const") => VarKind::Const,
            _ => return Err(self.unexpected("declaration")),
        };
        self.advance();
        Ok(kind)
    }

    fn declarator(&mut self, name: Symbol) -> Result<Declarator, ParseError> {
        let init = if self.eat_punct("=") {
            Some(self.assignment()?)
        } else {
            None
        };
        Ok(Declarator { name, init })
    }

    fn var_decl(&mut self) -> Result<NodeId, ParseError> {
        let kind = self.var_kind()?;
        let mut declarators = Vec::new();
        loop {
            if self.is_punct("[") || self.is_punct("{") {
                return Err(self.unsupported("destructuring"));
            }
            let name = self.identifier()?;
            declarators.push(self.declarator(name)?);
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(self.alloc(Node::VarDecl { kind, declarators }))
    }

    fn function_decl(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("function")?;
        if self.is_punct("*") {
            return Err(self.unsupported("generator function"));
        }
        let name = self.identifier()?;
        let function = self.function_parts(Some(name))?;
        Ok(self.alloc(Node::FunctionDecl(function)))
    }

    fn function_parts(&mut self, name: Option<Symbol>) -> Result<Function, ParseError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.is_punct(")") {
            if self.is_punct("...") {
                return Err(self.unsupported("rest parameter"));
            }
            params.push(self.identifier()?);
            if self.is_punct("=") {
                return Err(self.unsupported("default parameter"));
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        let body = self.allow_in(|p| p.block())?;
        Ok(Function { name, params, body })
    }

    fn class_decl(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("class")?;
        let name = self.identifier()?;
        let superclass = if self.eat_word("extends") {
            Some(self.lhs_expression()?)
        } else {
            None
        };
        self.expect_punct("{")?;
        let mut methods = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct(";") {
                continue;
            }
            let is_static = self.is_word("static")
                && !matches!(self.peek_at(1).kind, TokenKind::Punct("("));
            if is_static {
                self.advance();
            }
            let accessor = (self.is_word("get") || self.is_word("set"))
                && matches!(self.peek_at(1).kind, TokenKind::Word(_));
            if accessor {
                return Err(self.unsupported("accessor"));
            }
            let name = self.property_name()?;
            let parts = self.function_parts(None)?;
            let function = self.alloc(Node::FunctionExpr(parts));
            methods.push(Method {
                name,
                is_static,
                function,
            });
        }
        Ok(self.alloc(Node::ClassDecl(Class {
            name,
            superclass,
            methods,
        })))
    }

    fn paren_expression(&mut self) -> Result<NodeId, ParseError> {
        self.expect_punct("(")?;
        let expr = self.allow_in(|p| p.expression())?;
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("if")?;
        let test = self.paren_expression()?;
        let consequent = self.statement()?;
        let alternate = if self.eat_word("else") {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(self.alloc(Node::If {
            test,
            consequent,
            alternate,
        }))
    }

    fn for_statement(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("for")?;
        if self.is_word("await") {
            return Err(self.unsupported("for await"));
        }
        self.expect_punct("(")?;

        let saved = std::mem::replace(&mut self.no_in, true);
        let head = self.for_head();
        self.no_in = saved;

        let init = match head? {
            ForHead::Each(left) => return self.for_each(left),
            ForHead::Init(init) => init,
        };

        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.allow_in(|p| p.expression())?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.allow_in(|p| p.expression())?)
        };
        self.expect_punct(")")?;
        let body = self.statement()?;
        Ok(self.alloc(Node::For {
            init,
            test,
            update,
            body,
        }))
    }

    fn for_head(&mut self) -> Result<ForHead, ParseError> {
        if self.is_punct(";") {
            return Ok(ForHead::Init(None));
        }

        if matches!(self.peek_word().as_deref(), Some("var" | "let" | "const")) {
            let kind = self.var_kind()?;
            let name = self.identifier()?;
            if self.is_word("in") || self.is_word("of") {
                let left = self.alloc(Node::VarDecl {
                    kind,
                    declarators: vec![Declarator { name, init: None }],
                });
                return Ok(ForHead::Each(left));
            }
            let mut declarators = vec![self.declarator(name)?];
            while self.eat_punct(",") {
                let name = self.identifier()?;
                declarators.push(self.declarator(name)?);
            }
            let decl = self.alloc(Node::VarDecl { kind, declarators });
            return Ok(ForHead::Init(Some(decl)));
        }

        let expr = self.expression()?;
        if self.is_word("in") || self.is_word("of") {
            Ok(ForHead::Each(expr))
        } else {
            Ok(ForHead::Init(Some(expr)))
        }
    }

    fn for_each(&mut self, left: NodeId) -> Result<NodeId, ParseError> {
        let is_of = self.is_word("of");
        self.advance();
        let right = if is_of {
            self.assignment()?
        } else {
            self.expression()?
        };
        self.expect_punct(")")?;
        let body = self.statement()?;
        let node = if is_of {
            Node::ForOf { left, right, body }
        } else {
            Node::ForIn { left, right, body }
        };
        Ok(self.alloc(node))
    }

    fn switch_statement(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("switch")?;
        let discriminant = self.paren_expression()?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.eat_punct("}") {
            let test = if self.eat_word("case") {
                Some(self.expression()?)
            } else if self.eat_word("default") {
                None
            } else {
                return Err(self.unexpected("'case' or 'default'"));
            };
            self.expect_punct(":")?;
            let mut consequent = Vec::new();
            while !(self.is_word("case") || self.is_word("default") || self.is_punct("}")) {
                if self.at_eof() {
                    return Err(self.unexpected("'}'"));
                }
                consequent.push(self.statement()?);
            }
            cases.push(self.alloc(Node::SwitchCase { test, consequent }));
        }
        Ok(self.alloc(Node::Switch {
            discriminant,
            cases,
        }))
    }

    fn try_statement(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("try")?;
        let block = self.block()?;
        let handler = if self.eat_word("catch") {
            let param = if self.eat_punct("(") {
                let param = self.identifier()?;
                self.expect_punct(")")?;
                Some(param)
            } else {
                None
            };
            let body = self.block()?;
            Some(Catch { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_word("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(self.alloc(Node::Try {
            block,
            handler,
            finalizer,
        }))
    }

    // ---------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------

    pub fn expression(&mut self) -> Result<NodeId, ParseError> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.assignment()?);
        }
        Ok(self.alloc(Node::Sequence(items)))
    }

    fn assignment(&mut self) -> Result<NodeId, ParseError> {
        if let Some(arrow) = self.arrow()? {
            return Ok(arrow);
        }

        let target = self.conditional()?;
        let op = match self.peek().kind {
            TokenKind::Punct(p) => AssignOp::from_punct(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };
        if !matches!(self.program[target], Node::Ident(_) | Node::Member { .. }) {
            return Err(self.unsupported("assignment to a non-reference"));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(self.alloc(Node::Assign { op, target, value }))
    }

    /// Parse an arrow function if one starts here, without consuming
    /// anything otherwise.
    fn arrow(&mut self) -> Result<Option<NodeId>, ParseError> {
        let params = match &self.peek().kind {
            TokenKind::Word(w)
                if !is_reserved(w) && matches!(self.peek_at(1).kind, TokenKind::Punct("=>")) =>
            {
                let param = self.identifier()?;
                vec![param]
            }
            TokenKind::Punct("(") => {
                let Some(close) = self.matching_paren() else {
                    return Ok(None);
                };
                let arrow_follows = matches!(
                    self.tokens.get(close + 1).map(|t| &t.kind),
                    Some(TokenKind::Punct("=>"))
                );
                if !arrow_follows {
                    return Ok(None);
                }
                self.advance();
                let mut params = Vec::new();
                while !self.is_punct(")") {
                    params.push(self.identifier()?);
                    if self.is_punct("=") || self.is_punct("...") {
                        return Err(self.unsupported("arrow parameter pattern"));
                    }
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(")")?;
                params
            }
            _ => return Ok(None),
        };

        self.expect_punct("=>")?;
        let (body, expression) = if self.is_punct("{") {
            (self.allow_in(|p| p.block())?, false)
        } else {
            (self.assignment()?, true)
        };
        Ok(Some(self.alloc(Node::Arrow {
            params,
            body,
            expression,
        })))
    }

    /// Index of the `)` matching the `(` at the current position.
    fn matching_paren(&self) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.position) {
            match token.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
        }
        None
    }

    fn conditional(&mut self) -> Result<NodeId, ParseError> {
        let test = self.binary(LogicalOp::Or.precedence())?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.allow_in(|p| p.assignment())?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(self.alloc(Node::Conditional {
            test,
            consequent,
            alternate,
        }))
    }

    fn peek_infix(&self) -> Option<Infix> {
        match &self.peek().kind {
            TokenKind::Punct("&&") => Some(Infix::Logical(LogicalOp::And)),
            TokenKind::Punct("||") => Some(Infix::Logical(LogicalOp::Or)),
            TokenKind::Punct(p) => BinaryOp::from_punct(p).map(Infix::Binary),
            TokenKind::Word(w) if w == "instanceof" => Some(Infix::Binary(BinaryOp::InstanceOf)),
            TokenKind::Word(w) if w == "in" && !self.no_in => Some(Infix::Binary(BinaryOp::In)),
            _ => None,
        }
    }

    /// Precedence climbing over binary and logical operators.
    fn binary(&mut self, min_precedence: u8) -> Result<NodeId, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(infix) = self.peek_infix() {
            let precedence = infix.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right_assoc = matches!(infix, Infix::Binary(BinaryOp::Exp));
            let next = if right_assoc {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.binary(next)?;
            let node = match infix {
                Infix::Binary(op) => Node::Binary { op, lhs, rhs },
                Infix::Logical(op) => Node::Logical { op, lhs, rhs },
            };
            lhs = self.alloc(node);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<NodeId, ParseError> {
        let op = match &self.peek().kind {
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Word(w) if w == "typeof" => Some(UnaryOp::Typeof),
            TokenKind::Word(w) if w == "void" => Some(UnaryOp::Void),
            TokenKind::Word(w) if w == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.unary()?;
            return Ok(self.alloc(Node::Unary { op, arg }));
        }

        let update = match self.peek().kind {
            TokenKind::Punct("++") => Some(UpdateOp::Increment),
            TokenKind::Punct("--") => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.advance();
            let arg = self.unary()?;
            return Ok(self.alloc(Node::Update {
                op,
                prefix: true,
                arg,
            }));
        }

        let expr = self.lhs_expression()?;
        let postfix = match self.peek().kind {
            TokenKind::Punct("++") => Some(UpdateOp::Increment),
            TokenKind::Punct("--") => Some(UpdateOp::Decrement),
            _ => None,
        };
        match postfix {
            Some(op) if !self.peek().newline_before => {
                self.advance();
                Ok(self.alloc(Node::Update {
                    op,
                    prefix: false,
                    arg: expr,
                }))
            }
            _ => Ok(expr),
        }
    }

    /// Member accesses and calls, including `new`.
    fn lhs_expression(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = if self.is_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if let Some(member) = self.member_suffix(expr)? {
                expr = member;
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = self.alloc(Node::Call { callee: expr, args });
            } else {
                return Ok(expr);
            }
        }
    }

    fn member_suffix(&mut self, object: NodeId) -> Result<Option<NodeId>, ParseError> {
        let property = if self.eat_punct(".") {
            MemberProp::Named(self.property_name()?)
        } else if self.eat_punct("[") {
            let prop = self.allow_in(|p| p.expression())?;
            self.expect_punct("]")?;
            MemberProp::Computed(prop)
        } else {
            return Ok(None);
        };
        Ok(Some(self.alloc(Node::Member { object, property })))
    }

    fn new_expression(&mut self) -> Result<NodeId, ParseError> {
        self.expect_word("new")?;
        if self.is_punct(".") {
            return Err(self.unsupported("new.target"));
        }
        let mut callee = if self.is_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        while let Some(member) = self.member_suffix(callee)? {
            callee = member;
        }
        let args = if self.is_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(self.alloc(Node::New { callee, args }))
    }

    fn arguments(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect_punct("(")?;
        let args = self.allow_in(|p| {
            let mut args = Vec::new();
            while !p.is_punct(")") {
                if p.is_punct("...") {
                    return Err(p.unsupported("spread argument"));
                }
                args.push(p.assignment()?);
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(args)
        })?;
        self.expect_punct(")")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<NodeId, ParseError> {
        let token = self.advance();
        let node = match token.kind {
            TokenKind::Word(ref w) => match w.as_str() {
                "this" => Node::This,
                "null" => Node::Literal(Literal::Null),
                "true" => Node::Literal(Literal::Bool(true)),
                "false" => Node::Literal(Literal::Bool(false)),
                "function" => {
                    if self.is_punct("*") {
                        return Err(self.unsupported("generator function"));
                    }
                    let name = if self.is_punct("(") {
                        None
                    } else {
                        Some(self.identifier()?)
                    };
                    Node::FunctionExpr(self.function_parts(name)?)
                }
                "class" => {
                    return Err(ParseError::Unsupported {
                        what: "class expression",
                        line: token.line,
                        column: token.column,
                    })
                }
                "super" => {
                    return Err(ParseError::Unsupported {
                        what: "super",
                        line: token.line,
                        column: token.column,
                    })
                }
                word if is_reserved(word) => return Err(unexpected_token(&token, "expression")),
                word => Node::Ident(self.program.to_sym(word)),
            },
            TokenKind::Number(raw) => Node::Literal(Literal::Number(raw)),
            TokenKind::String(raw) => Node::Literal(Literal::String(raw)),
            TokenKind::Punct("(") => {
                let expr = self.allow_in(|p| p.expression())?;
                self.expect_punct(")")?;
                return Ok(expr);
            }
            TokenKind::Punct("[") => return self.array(),
            TokenKind::Punct("{") => return self.object(),
            TokenKind::Punct("/" | "/=") => {
                return Err(ParseError::Unsupported {
                    what: "regular expression",
                    line: token.line,
                    column: token.column,
                })
            }
            _ => return Err(unexpected_token(&token, "expression")),
        };
        Ok(self.alloc(node))
    }

    /// Called with the opening `[` already consumed.
    fn array(&mut self) -> Result<NodeId, ParseError> {
        let items = self.allow_in(|p| {
            let mut items = Vec::new();
            while !p.is_punct("]") {
                if p.is_punct(",") {
                    return Err(p.unsupported("array hole"));
                }
                if p.is_punct("...") {
                    return Err(p.unsupported("spread element"));
                }
                items.push(p.assignment()?);
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(items)
        })?;
        self.expect_punct("]")?;
        Ok(self.alloc(Node::Array(items)))
    }

    /// Called with the opening `{` already consumed.
    fn object(&mut self) -> Result<NodeId, ParseError> {
        let props = self.allow_in(|p| {
            let mut props = Vec::new();
            while !p.is_punct("}") {
                props.push(p.property()?);
                if !p.eat_punct(",") {
                    break;
                }
            }
            Ok(props)
        })?;
        self.expect_punct("}")?;
        Ok(self.alloc(Node::Object(props)))
    }

    fn property(&mut self) -> Result<Property, ParseError> {
        let accessor = (self.is_word("get") || self.is_word("set"))
            && matches!(self.peek_at(1).kind, TokenKind::Word(_));
        if accessor {
            return Err(self.unsupported("accessor"));
        }
        let token = self.advance();
        let (key, shorthand) = match token.kind {
            TokenKind::Word(ref w) => {
                let sym = self.program.to_sym(w);
                let shorthand = if is_reserved(w) { None } else { Some(sym) };
                (PropKey::Ident(sym), shorthand)
            }
            TokenKind::String(raw) => (PropKey::String(raw), None),
            TokenKind::Number(raw) => (PropKey::Number(raw), None),
            TokenKind::Punct("[") => {
                return Err(ParseError::Unsupported {
                    what: "computed property key",
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::Punct("...") => {
                return Err(ParseError::Unsupported {
                    what: "object spread",
                    line: token.line,
                    column: token.column,
                })
            }
            _ => return Err(unexpected_token(&token, "property")),
        };

        let value = if self.eat_punct(":") {
            self.assignment()?
        } else if self.is_punct("(") {
            let parts = self.function_parts(None)?;
            self.alloc(Node::FunctionExpr(parts))
        } else if let Some(sym) = shorthand {
            self.alloc(Node::Ident(sym))
        } else {
            return Err(self.unexpected("':'"));
        };
        Ok(Property { key, value })
    }
}

enum ForHead {
    Init(Option<NodeId>),
    Each(NodeId),
}

fn unexpected_token(token: &Token, expected: &str) -> ParseError {
    ParseError::Unexpected {
        expected: expected.to_string(),
        found: token.describe(),
        line: token.line,
        column: token.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_statement(source: &str) -> (Program, NodeId) {
        let program = parse(source).expect("parsing should succeed");
        let first = program.body()[0];
        (program, first)
    }

    #[test]
    fn parses_for_in_with_declaration() {
        let (program, stmt) = first_statement("for (var k in obj) { total += obj[k]; }");
        match &program[stmt] {
            Node::ForIn { left, .. } => {
                assert!(matches!(program[*left], Node::VarDecl { .. }));
            }
            other => panic!("expected for-in, found {:?}", other),
        }
    }

    #[test]
    fn for_init_does_not_swallow_in() {
        let (program, stmt) = first_statement("for (var i = 0, n = a.length; i < n; i++) {}");
        match &program[stmt] {
            Node::For {
                init: Some(init),
                test: Some(_),
                update: Some(_),
                ..
            } => match &program[*init] {
                Node::VarDecl { declarators, .. } => assert_eq!(declarators.len(), 2),
                other => panic!("expected declaration, found {:?}", other),
            },
            other => panic!("expected for loop, found {:?}", other),
        }
    }

    #[test]
    fn binary_precedence_and_associativity() {
        let (program, stmt) = first_statement("a - b - c * d;");
        let Node::Expr(expr) = program[stmt] else {
            panic!("expected expression statement");
        };
        match &program[expr] {
            Node::Binary {
                op: BinaryOp::Sub,
                lhs,
                rhs,
            } => {
                assert!(matches!(program[*lhs], Node::Binary { op: BinaryOp::Sub, .. }));
                assert!(matches!(program[*rhs], Node::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected subtraction, found {:?}", other),
        }
    }

    #[test]
    fn automatic_semicolons_on_line_breaks() {
        let program = parse("var a = 1\nvar b = a\nb++\nreturn_value()").expect("parsing should succeed");
        assert_eq!(program.body().len(), 4);
    }

    #[test]
    fn parses_arrows_and_parenthesized_expressions() {
        let (program, stmt) = first_statement("f((a, b) => a + b, (c), x => { return x; });");
        let Node::Expr(call) = program[stmt] else {
            panic!("expected expression statement");
        };
        match &program[call] {
            Node::Call { args, .. } => {
                assert!(matches!(program[args[0]], Node::Arrow { expression: true, .. }));
                assert!(matches!(program[args[1]], Node::Ident(_)));
                assert!(matches!(program[args[2]], Node::Arrow { expression: false, .. }));
            }
            other => panic!("expected call, found {:?}", other),
        }
    }

    #[test]
    fn parses_classes_and_new() {
        let program = parse(
            "class Counter extends Base { constructor(n) { this.n = n; } static make() { return new Counter(1); } }\nvar c = new Counter;",
        )
        .expect("parsing should succeed");
        match &program[program.body()[0]] {
            Node::ClassDecl(class) => {
                assert_eq!(program.from_sym(class.name), "Counter");
                assert_eq!(class.methods.len(), 2);
                assert!(class.methods[1].is_static);
            }
            other => panic!("expected class, found {:?}", other),
        }
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(matches!(
            parse("import Builder from './Builder.js'"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(parse("var [a, b] = c;"), Err(ParseError::Unsupported { .. })));
        assert!(matches!(
            parse("var r = /ab+c/g;"),
            Err(ParseError::Unsupported {
                what: "regular expression",
                ..
            })
        ));
        assert!(matches!(
            parse("if (/=/.test(s)) {}"),
            Err(ParseError::Unsupported {
                what: "regular expression",
                ..
            })
        ));
        assert!(parse("x = a / b;").is_ok());
        assert!(parse("a +").is_err());
        assert!(parse("{ a; ").is_err());
    }
}
