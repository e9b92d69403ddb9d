//! Pretty-printer. Output always reparses to the same tree: parentheses are
//! inserted from operator precedence, not remembered from the source.

use crate::symbol::Symbol;
use crate::tree::{
    BinaryOp, Declarator, Function, Literal, MemberProp, Node, NodeId, Program, PropKey, VarKind,
};

const SEQUENCE: u8 = 0;
const ASSIGN: u8 = 1;
const CONDITIONAL: u8 = 2;
const PREFIX: u8 = 14;
const POSTFIX: u8 = 15;
const LHS: u8 = 16;
const PRIMARY: u8 = 17;

struct Emitter<'a> {
    program: &'a Program,
    indent: usize,
    output: String,
    /// The next statement continues the current line (`else if`).
    inline_next: bool,
    /// Inside a `for` head, where a bare `in` would end the initializer.
    no_in: bool,
}

impl<'a> Emitter<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            program,
            indent: 0,
            output: String::new(),
            inline_next: false,
            no_in: false,
        }
    }

    fn emit_inline(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn emit_block(&mut self, s: &str) {
        self.output.push('\n');
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(s);
    }

    fn enter_block(&mut self) {
        self.indent += 1
    }

    fn exit_block(&mut self) {
        self.indent -= 1
    }

    fn start(&mut self, s: &str) {
        if std::mem::take(&mut self.inline_next) {
            self.emit_inline(s);
        } else {
            self.emit_block(s);
        }
    }

    // Statements

    fn statement(&mut self, id: NodeId) {
        let program = self.program;
        match &program[id] {
            Node::Program { body } => {
                for stmt in body {
                    self.statement(*stmt);
                }
            }
            Node::VarDecl { kind, declarators } => {
                self.start("");
                self.var_decl(*kind, declarators);
                self.emit_inline(";");
            }
            Node::FunctionDecl(f) => {
                self.start("");
                self.function(f);
            }
            Node::ClassDecl(c) => {
                self.start("class ");
                self.emit_inline(program.from_sym(c.name));
                if let Some(superclass) = c.superclass {
                    self.emit_inline(" extends ");
                    self.expr(superclass, LHS);
                }
                if c.methods.is_empty() {
                    self.emit_inline(" {}");
                    return;
                }
                self.emit_inline(" {");
                self.enter_block();
                for method in &c.methods {
                    self.emit_block(if method.is_static { "static " } else { "" });
                    self.emit_inline(program.from_sym(method.name));
                    if let Node::FunctionExpr(f) = &program[method.function] {
                        self.params(&f.params);
                        self.emit_inline(" ");
                        self.block(f.body);
                    }
                }
                self.exit_block();
                self.emit_block("}");
            }
            Node::Return(arg) => {
                self.start("return");
                if let Some(arg) = arg {
                    self.emit_inline(" ");
                    self.expr(*arg, SEQUENCE);
                }
                self.emit_inline(";");
            }
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                self.start("if (");
                self.expr(*test, SEQUENCE);
                self.emit_inline(")");
                let Some(alternate) = alternate else {
                    self.body(*consequent);
                    return;
                };
                // A braced consequent keeps the `else` from binding to a
                // nested `if`.
                self.emit_inline(" ");
                self.block(*consequent);
                match &program[*alternate] {
                    Node::If { .. } => {
                        self.emit_inline(" else ");
                        self.inline_next = true;
                        self.statement(*alternate);
                    }
                    Node::Block { .. } => {
                        self.emit_inline(" else ");
                        self.block(*alternate);
                    }
                    _ => {
                        self.emit_inline(" else");
                        self.indented(*alternate);
                    }
                }
            }
            Node::For {
                init,
                test,
                update,
                body,
            } => {
                self.start("for (");
                if let Some(init) = init {
                    let saved = std::mem::replace(&mut self.no_in, true);
                    self.for_left(*init, SEQUENCE);
                    self.no_in = saved;
                }
                self.emit_inline(";");
                if let Some(test) = test {
                    self.emit_inline(" ");
                    self.expr(*test, SEQUENCE);
                }
                self.emit_inline(";");
                if let Some(update) = update {
                    self.emit_inline(" ");
                    self.expr(*update, SEQUENCE);
                }
                self.emit_inline(")");
                self.body(*body);
            }
            Node::ForIn { left, right, body } => {
                self.start("for (");
                self.for_left(*left, LHS);
                self.emit_inline(" in ");
                self.expr(*right, SEQUENCE);
                self.emit_inline(")");
                self.body(*body);
            }
            Node::ForOf { left, right, body } => {
                self.start("for (");
                self.for_left(*left, LHS);
                self.emit_inline(" of ");
                self.expr(*right, ASSIGN);
                self.emit_inline(")");
                self.body(*body);
            }
            Node::While { test, body } => {
                self.start("while (");
                self.expr(*test, SEQUENCE);
                self.emit_inline(")");
                self.body(*body);
            }
            Node::DoWhile { body, test } => {
                self.start("do");
                if matches!(program[*body], Node::Block { .. }) {
                    self.emit_inline(" ");
                    self.block(*body);
                    self.emit_inline(" while (");
                } else {
                    self.indented(*body);
                    self.emit_block("while (");
                }
                self.expr(*test, SEQUENCE);
                self.emit_inline(");");
            }
            Node::Switch {
                discriminant,
                cases,
            } => {
                self.start("switch (");
                self.expr(*discriminant, SEQUENCE);
                self.emit_inline(") {");
                self.enter_block();
                for case in cases {
                    self.statement(*case);
                }
                self.exit_block();
                self.emit_block("}");
            }
            Node::SwitchCase { test, consequent } => {
                match test {
                    Some(test) => {
                        self.start("case ");
                        self.expr(*test, SEQUENCE);
                        self.emit_inline(":");
                    }
                    None => self.start("default:"),
                }
                self.enter_block();
                for stmt in consequent {
                    self.statement(*stmt);
                }
                self.exit_block();
            }
            Node::Block { body } => {
                self.start("");
                self.block_body(body);
            }
            Node::With { object, body } => {
                self.start("with (");
                self.expr(*object, SEQUENCE);
                self.emit_inline(")");
                self.body(*body);
            }
            Node::Break => self.start("break;"),
            Node::Continue => self.start("continue;"),
            Node::Throw(arg) => {
                self.start("throw ");
                self.expr(*arg, SEQUENCE);
                self.emit_inline(";");
            }
            Node::Try {
                block,
                handler,
                finalizer,
            } => {
                self.start("try ");
                self.block(*block);
                if let Some(handler) = handler {
                    match handler.param {
                        Some(param) => {
                            self.emit_inline(" catch (");
                            self.emit_inline(program.from_sym(param));
                            self.emit_inline(") ");
                        }
                        None => self.emit_inline(" catch "),
                    }
                    self.block(handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.emit_inline(" finally ");
                    self.block(*finalizer);
                }
            }
            Node::Expr(expr) => {
                self.start("");
                self.expression_statement(*expr);
            }
            Node::Empty => self.start(";"),
            _ => {
                self.start("");
                self.expression_statement(id);
            }
        }
    }

    fn expression_statement(&mut self, expr: NodeId) {
        let ambiguous = matches!(
            self.program[self.leftmost(expr)],
            Node::Object(_) | Node::FunctionExpr(_)
        );
        if ambiguous {
            self.emit_inline("(");
            self.expr(expr, SEQUENCE);
            self.emit_inline(")");
        } else {
            self.expr(expr, SEQUENCE);
        }
        self.emit_inline(";");
    }

    fn block_body(&mut self, body: &[NodeId]) {
        if body.is_empty() {
            self.emit_inline("{}");
            return;
        }
        self.emit_inline("{");
        self.enter_block();
        for stmt in body {
            self.statement(*stmt);
        }
        self.exit_block();
        self.emit_block("}");
    }

    /// Print `id` as a braced block, adding braces if it is not a block.
    fn block(&mut self, id: NodeId) {
        let program = self.program;
        match &program[id] {
            Node::Block { body } => self.block_body(body),
            _ => {
                self.emit_inline("{");
                self.indented(id);
                self.emit_block("}");
            }
        }
    }

    /// Body of a control statement, on the same line when it is a block.
    fn body(&mut self, id: NodeId) {
        if matches!(self.program[id], Node::Block { .. }) {
            self.emit_inline(" ");
            self.block(id);
        } else {
            self.indented(id);
        }
    }

    fn indented(&mut self, id: NodeId) {
        self.enter_block();
        self.statement(id);
        self.exit_block();
    }

    fn var_decl(&mut self, kind: VarKind, declarators: &[Declarator]) {
        self.emit_inline(kind.as_str());
        for (i, declarator) in declarators.iter().enumerate() {
            self.emit_inline(if i == 0 { " " } else { ", " });
            self.emit_inline(self.program.from_sym(declarator.name));
            if let Some(init) = declarator.init {
                self.emit_inline(" = ");
                self.expr(init, ASSIGN);
            }
        }
    }

    fn for_left(&mut self, id: NodeId, min: u8) {
        let program = self.program;
        match &program[id] {
            Node::VarDecl { kind, declarators } => self.var_decl(*kind, declarators),
            _ => self.expr(id, min),
        }
    }

    fn function(&mut self, f: &Function) {
        self.emit_inline("function");
        if let Some(name) = f.name {
            self.emit_inline(" ");
            self.emit_inline(self.program.from_sym(name));
        }
        self.params(&f.params);
        self.emit_inline(" ");
        self.block(f.body);
    }

    fn params(&mut self, params: &[Symbol]) {
        self.emit_inline("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.emit_inline(", ");
            }
            self.emit_inline(self.program.from_sym(*param));
        }
        self.emit_inline(")");
    }

    // Expressions

    fn precedence(&self, id: NodeId) -> u8 {
        match &self.program[id] {
            Node::Sequence(_) => SEQUENCE,
            Node::Assign { .. } | Node::Arrow { .. } => ASSIGN,
            Node::Conditional { .. } => CONDITIONAL,
            Node::Logical { op, .. } => op.precedence(),
            Node::Binary { op, .. } => op.precedence(),
            Node::Unary { .. } | Node::Update { prefix: true, .. } => PREFIX,
            Node::Update { .. } => POSTFIX,
            Node::Call { .. } | Node::New { .. } | Node::Member { .. } => LHS,
            Node::Literal(Literal::Number(raw)) if raw.starts_with(['+', '-']) => PREFIX,
            _ => PRIMARY,
        }
    }

    /// The node whose text begins the printed expression.
    fn leftmost(&self, mut id: NodeId) -> NodeId {
        loop {
            id = match &self.program[id] {
                Node::Binary { lhs, .. } | Node::Logical { lhs, .. } => *lhs,
                Node::Assign { target, .. } => *target,
                Node::Conditional { test, .. } => *test,
                Node::Sequence(items) if !items.is_empty() => items[0],
                Node::Call { callee, .. } => *callee,
                Node::Member { object, .. } => *object,
                Node::Update {
                    prefix: false, arg, ..
                } => *arg,
                _ => return id,
            };
        }
    }

    fn expr(&mut self, id: NodeId, min: u8) {
        let in_operator = matches!(
            self.program[id],
            Node::Binary {
                op: BinaryOp::In,
                ..
            }
        );
        if self.precedence(id) < min || (self.no_in && in_operator) {
            self.emit_inline("(");
            let saved = std::mem::replace(&mut self.no_in, false);
            self.expr_inner(id);
            self.no_in = saved;
            self.emit_inline(")");
        } else {
            self.expr_inner(id);
        }
    }

    fn expr_inner(&mut self, id: NodeId) {
        let program = self.program;
        match &program[id] {
            Node::Ident(sym) => self.emit_inline(program.from_sym(*sym)),
            Node::Literal(lit) => match lit {
                Literal::Number(raw) | Literal::String(raw) => self.emit_inline(raw),
                Literal::Bool(true) => self.emit_inline("true"),
                Literal::Bool(false) => self.emit_inline("false"),
                Literal::Null => self.emit_inline("null"),
            },
            Node::This => self.emit_inline("this"),
            Node::Array(items) => {
                self.emit_inline("[");
                self.list(items);
                self.emit_inline("]");
            }
            Node::Object(props) => {
                if props.is_empty() {
                    self.emit_inline("{}");
                    return;
                }
                self.emit_inline("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.emit_inline(", ");
                    }
                    match &prop.key {
                        PropKey::Ident(sym) => self.emit_inline(program.from_sym(*sym)),
                        PropKey::String(raw) | PropKey::Number(raw) => self.emit_inline(raw),
                    }
                    self.emit_inline(": ");
                    self.expr(prop.value, ASSIGN);
                }
                self.emit_inline(" }");
            }
            Node::FunctionExpr(f) => self.function(f),
            Node::Arrow {
                params,
                body,
                expression,
            } => {
                self.params(params);
                self.emit_inline(" => ");
                if !*expression {
                    self.block(*body);
                } else if matches!(program[self.leftmost(*body)], Node::Object(_)) {
                    self.emit_inline("(");
                    self.expr(*body, SEQUENCE);
                    self.emit_inline(")");
                } else {
                    self.expr(*body, ASSIGN);
                }
            }
            Node::Sequence(items) => self.list(items),
            Node::Unary { op, arg } => {
                self.emit_inline(op.as_str());
                if op.is_keyword() {
                    self.emit_inline(" ");
                    self.expr(*arg, PREFIX);
                    return;
                }
                // `- -x` and `+ ++x` must not fuse into `--x` and `+++x`.
                let at = self.output.len();
                self.expr(*arg, PREFIX);
                if self.output[at..].starts_with(op.as_str()) {
                    self.output.insert(at, ' ');
                }
            }
            Node::Update { op, prefix, arg } => {
                if *prefix {
                    self.emit_inline(op.as_str());
                    self.expr(*arg, LHS);
                } else {
                    self.expr(*arg, LHS);
                    self.emit_inline(op.as_str());
                }
            }
            Node::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                let (left, right) = if *op == BinaryOp::Exp {
                    (POSTFIX, p)
                } else {
                    (p, p + 1)
                };
                self.expr(*lhs, left);
                self.emit_inline(" ");
                self.emit_inline(op.as_str());
                self.emit_inline(" ");
                self.expr(*rhs, right);
            }
            Node::Logical { op, lhs, rhs } => {
                let p = op.precedence();
                self.expr(*lhs, p);
                self.emit_inline(" ");
                self.emit_inline(op.as_str());
                self.emit_inline(" ");
                self.expr(*rhs, p + 1);
            }
            Node::Assign { op, target, value } => {
                self.expr(*target, LHS);
                self.emit_inline(" ");
                self.emit_inline(op.as_str());
                self.emit_inline(" ");
                self.expr(*value, ASSIGN);
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(*test, CONDITIONAL + 1);
                self.emit_inline(" ? ");
                self.expr(*consequent, ASSIGN);
                self.emit_inline(" : ");
                self.expr(*alternate, ASSIGN);
            }
            Node::Call { callee, args } => {
                self.expr(*callee, LHS);
                self.emit_inline("(");
                self.list(args);
                self.emit_inline(")");
            }
            Node::New { callee, args } => {
                self.emit_inline("new ");
                // `new f().g` would call `f` as the constructor.
                if self.precedence(*callee) < LHS || self.contains_call(*callee) {
                    self.emit_inline("(");
                    self.expr(*callee, SEQUENCE);
                    self.emit_inline(")");
                } else {
                    self.expr(*callee, LHS);
                }
                self.emit_inline("(");
                self.list(args);
                self.emit_inline(")");
            }
            Node::Member { object, property } => {
                if matches!(program[*object], Node::Literal(Literal::Number(_))) {
                    self.emit_inline("(");
                    self.expr(*object, SEQUENCE);
                    self.emit_inline(")");
                } else {
                    self.expr(*object, LHS);
                }
                match property {
                    MemberProp::Named(sym) => {
                        self.emit_inline(".");
                        self.emit_inline(program.from_sym(*sym));
                    }
                    MemberProp::Computed(prop) => {
                        self.emit_inline("[");
                        self.expr(*prop, SEQUENCE);
                        self.emit_inline("]");
                    }
                }
            }
            // Statements never appear in expression position.
            _ => {}
        }
    }

    fn list(&mut self, items: &[NodeId]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.emit_inline(", ");
            }
            self.expr(*item, ASSIGN);
        }
    }

    fn contains_call(&self, mut id: NodeId) -> bool {
        loop {
            match &self.program[id] {
                Node::Call { .. } => return true,
                Node::Member { object, .. } => id = *object,
                _ => return false,
            }
        }
    }
}

/// Anything that prints as JavaScript source.
pub trait Emit {
    fn emit(&self) -> String;
}

impl Emit for Program {
    fn emit(&self) -> String {
        let mut e = Emitter::new(self);
        e.statement(self.root);
        let mut out = e.output.trim_start_matches('\n').to_string();
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Source text of a single subtree, for diagnostics.
pub fn emit_node(program: &Program, id: NodeId) -> String {
    let mut e = Emitter::new(program);
    e.statement(id);
    e.output.trim_start_matches('\n').to_string()
}
