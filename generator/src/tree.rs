use std::ops::{Index, IndexMut};

use la_arena::{Arena, Idx};

use crate::symbol::{Symbol, SymbolTable};

pub type NodeId = Idx<Node>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    InstanceOf,
}

impl BinaryOp {
    pub const ARITHMETIC: [BinaryOp; 6] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::Exp,
    ];
    pub const BITWISE: [BinaryOp; 6] = [
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::UShr,
    ];
    pub const COMPARISON: [BinaryOp; 8] = [
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::StrictEq,
        BinaryOp::StrictNotEq,
        BinaryOp::Lt,
        BinaryOp::LtEq,
        BinaryOp::Gt,
        BinaryOp::GtEq,
    ];
    pub const RELATIONAL: [BinaryOp; 2] = [BinaryOp::In, BinaryOp::InstanceOf];

    /// The set of operators this one may be swapped for.
    pub fn class(self) -> &'static [BinaryOp] {
        match self {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Exp => &Self::ARITHMETIC,
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::UShr => &Self::BITWISE,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::StrictEq
            | BinaryOp::StrictNotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => &Self::COMPARISON,
            BinaryOp::In | BinaryOp::InstanceOf => &Self::RELATIONAL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Exp => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::InstanceOf => "instanceof",
        }
    }

    pub fn from_punct(s: &str) -> Option<BinaryOp> {
        let op = match s {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "**" => BinaryOp::Exp,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            ">>>" => BinaryOp::UShr,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            "in" => BinaryOp::In,
            "instanceof" => BinaryOp::InstanceOf,
            _ => return None,
        };
        Some(op)
    }

    /// Binding power, higher binds tighter. Shared by parser and printer.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::BitOr => 5,
            BinaryOp::BitXor => 6,
            BinaryOp::BitAnd => 7,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 8,
            BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::InstanceOf => 9,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 10,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
            BinaryOp::Exp => 13,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub const ALL: [LogicalOp; 2] = [LogicalOp::And, LogicalOp::Or];

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            LogicalOp::Or => 3,
            LogicalOp::And => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Exp,
    Div,
    Rem,
    BitAnd,
    BitXor,
    BitOr,
    Shl,
    Shr,
    UShr,
}

impl AssignOp {
    pub const ALL: [AssignOp; 13] = [
        AssignOp::Assign,
        AssignOp::Add,
        AssignOp::Sub,
        AssignOp::Mul,
        AssignOp::Exp,
        AssignOp::Div,
        AssignOp::Rem,
        AssignOp::BitAnd,
        AssignOp::BitXor,
        AssignOp::BitOr,
        AssignOp::Shl,
        AssignOp::Shr,
        AssignOp::UShr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Exp => "**=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitXor => "^=",
            AssignOp::BitOr => "|=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
        }
    }

    pub fn from_punct(s: &str) -> Option<AssignOp> {
        AssignOp::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    /// Operators the expression mutator swaps between.
    pub const SYMBOLIC: [UnaryOp; 4] = [UnaryOp::Neg, UnaryOp::Plus, UnaryOp::Not, UnaryOp::BitNot];

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }

    pub fn is_keyword(self) -> bool {
        matches!(self, UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub const ALL: [UpdateOp; 2] = [UpdateOp::Increment, UpdateOp::Decrement];

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }
}

/// Literals keep their source spelling so that alternate numeric forms
/// (`0x0`, `01000`, `1E+02`) survive a parse/emit cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Declarator {
    pub name: Symbol,
    pub init: Option<NodeId>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Function {
    pub name: Option<Symbol>,
    pub params: Vec<Symbol>,
    /// Always a `Node::Block`.
    pub body: NodeId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Method {
    pub name: Symbol,
    pub is_static: bool,
    /// Always a `Node::FunctionExpr`.
    pub function: NodeId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Class {
    pub name: Symbol,
    pub superclass: Option<NodeId>,
    pub methods: Vec<Method>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Catch {
    pub param: Option<Symbol>,
    pub body: NodeId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PropKey {
    Ident(Symbol),
    String(String),
    Number(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Property {
    pub key: PropKey,
    pub value: NodeId,
}

/// Named member properties (`a.b`) are not identifier references and so
/// are stored as plain symbols, never as `Node::Ident`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemberProp {
    Named(Symbol),
    Computed(NodeId),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Program {
        body: Vec<NodeId>,
    },
    VarDecl {
        kind: VarKind,
        declarators: Vec<Declarator>,
    },
    FunctionDecl(Function),
    ClassDecl(Class),
    Return(Option<NodeId>),
    If {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    For {
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    },
    ForIn {
        left: NodeId,
        right: NodeId,
        body: NodeId,
    },
    ForOf {
        left: NodeId,
        right: NodeId,
        body: NodeId,
    },
    While {
        test: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        test: NodeId,
    },
    Switch {
        discriminant: NodeId,
        cases: Vec<NodeId>,
    },
    SwitchCase {
        test: Option<NodeId>,
        consequent: Vec<NodeId>,
    },
    Block {
        body: Vec<NodeId>,
    },
    With {
        object: NodeId,
        body: NodeId,
    },
    Break,
    Continue,
    Throw(NodeId),
    Try {
        block: NodeId,
        handler: Option<Catch>,
        finalizer: Option<NodeId>,
    },
    Expr(NodeId),
    Empty,
    Ident(Symbol),
    Literal(Literal),
    This,
    Array(Vec<NodeId>),
    Object(Vec<Property>),
    FunctionExpr(Function),
    Arrow {
        params: Vec<Symbol>,
        /// A `Node::Block` unless `expression` is set.
        body: NodeId,
        expression: bool,
    },
    Sequence(Vec<NodeId>),
    Unary {
        op: UnaryOp,
        arg: NodeId,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        arg: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Logical {
        op: LogicalOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Assign {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    Conditional {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    New {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    Member {
        object: NodeId,
        property: MemberProp,
    },
}

/// Payload-free mirror of `Node`, used to request "a node of the same kind".
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Program,
    VarDecl,
    FunctionDecl,
    ClassDecl,
    Return,
    If,
    For,
    ForIn,
    ForOf,
    While,
    DoWhile,
    Switch,
    SwitchCase,
    Block,
    With,
    Break,
    Continue,
    Throw,
    Try,
    Expr,
    Empty,
    Ident,
    Literal,
    This,
    Array,
    Object,
    FunctionExpr,
    Arrow,
    Sequence,
    Unary,
    Update,
    Binary,
    Logical,
    Assign,
    Conditional,
    Call,
    New,
    Member,
}

impl NodeKind {
    pub fn is_function(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDecl | NodeKind::FunctionExpr | NodeKind::Arrow
        )
    }

    pub fn is_loop(self) -> bool {
        matches!(
            self,
            NodeKind::For
                | NodeKind::ForIn
                | NodeKind::ForOf
                | NodeKind::While
                | NodeKind::DoWhile
        )
    }

    pub fn is_switch(self) -> bool {
        self == NodeKind::Switch
    }

    /// Leaves, the root, control transfers and the simple operator
    /// expressions are never replaced wholesale.
    pub fn is_mutation_site(self) -> bool {
        !matches!(
            self,
            NodeKind::Program
                | NodeKind::Ident
                | NodeKind::Literal
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Return
                | NodeKind::Binary
                | NodeKind::Logical
                | NodeKind::Assign
                | NodeKind::Unary
                | NodeKind::Update
        )
    }
}

/// Rewrites the references held by a node. Used to move subtrees between
/// arenas that do not share ids or symbol tables.
pub trait Remap {
    fn node(&mut self, id: NodeId) -> NodeId;
    fn symbol(&mut self, sym: Symbol) -> Symbol;
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Program { .. } => NodeKind::Program,
            Node::VarDecl { .. } => NodeKind::VarDecl,
            Node::FunctionDecl(_) => NodeKind::FunctionDecl,
            Node::ClassDecl(_) => NodeKind::ClassDecl,
            Node::Return(_) => NodeKind::Return,
            Node::If { .. } => NodeKind::If,
            Node::For { .. } => NodeKind::For,
            Node::ForIn { .. } => NodeKind::ForIn,
            Node::ForOf { .. } => NodeKind::ForOf,
            Node::While { .. } => NodeKind::While,
            Node::DoWhile { .. } => NodeKind::DoWhile,
            Node::Switch { .. } => NodeKind::Switch,
            Node::SwitchCase { .. } => NodeKind::SwitchCase,
            Node::Block { .. } => NodeKind::Block,
            Node::With { .. } => NodeKind::With,
            Node::Break => NodeKind::Break,
            Node::Continue => NodeKind::Continue,
            Node::Throw(_) => NodeKind::Throw,
            Node::Try { .. } => NodeKind::Try,
            Node::Expr(_) => NodeKind::Expr,
            Node::Empty => NodeKind::Empty,
            Node::Ident(_) => NodeKind::Ident,
            Node::Literal(_) => NodeKind::Literal,
            Node::This => NodeKind::This,
            Node::Array(_) => NodeKind::Array,
            Node::Object(_) => NodeKind::Object,
            Node::FunctionExpr(_) => NodeKind::FunctionExpr,
            Node::Arrow { .. } => NodeKind::Arrow,
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Unary { .. } => NodeKind::Unary,
            Node::Update { .. } => NodeKind::Update,
            Node::Binary { .. } => NodeKind::Binary,
            Node::Logical { .. } => NodeKind::Logical,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Conditional { .. } => NodeKind::Conditional,
            Node::Call { .. } => NodeKind::Call,
            Node::New { .. } => NodeKind::New,
            Node::Member { .. } => NodeKind::Member,
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self {
            Node::Program { body } | Node::Block { body } => out.extend(body.iter().copied()),
            Node::VarDecl { declarators, .. } => {
                out.extend(declarators.iter().filter_map(|d| d.init));
            }
            Node::FunctionDecl(f) | Node::FunctionExpr(f) => out.push(f.body),
            Node::ClassDecl(c) => {
                out.extend(c.superclass);
                out.extend(c.methods.iter().map(|m| m.function));
            }
            Node::Return(arg) => out.extend(*arg),
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                out.push(*test);
                out.push(*consequent);
                out.extend(*alternate);
            }
            Node::For {
                init,
                test,
                update,
                body,
            } => {
                out.extend(*init);
                out.extend(*test);
                out.extend(*update);
                out.push(*body);
            }
            Node::ForIn { left, right, body } | Node::ForOf { left, right, body } => {
                out.extend([*left, *right, *body]);
            }
            Node::While { test, body } => out.extend([*test, *body]),
            Node::DoWhile { body, test } => out.extend([*body, *test]),
            Node::Switch {
                discriminant,
                cases,
            } => {
                out.push(*discriminant);
                out.extend(cases.iter().copied());
            }
            Node::SwitchCase { test, consequent } => {
                out.extend(*test);
                out.extend(consequent.iter().copied());
            }
            Node::With { object, body } => out.extend([*object, *body]),
            Node::Throw(arg) | Node::Expr(arg) => out.push(*arg),
            Node::Try {
                block,
                handler,
                finalizer,
            } => {
                out.push(*block);
                out.extend(handler.as_ref().map(|h| h.body));
                out.extend(*finalizer);
            }
            Node::Break
            | Node::Continue
            | Node::Empty
            | Node::Ident(_)
            | Node::Literal(_)
            | Node::This => {}
            Node::Array(items) | Node::Sequence(items) => out.extend(items.iter().copied()),
            Node::Object(props) => out.extend(props.iter().map(|p| p.value)),
            Node::Arrow { body, .. } => out.push(*body),
            Node::Unary { arg, .. } | Node::Update { arg, .. } => out.push(*arg),
            Node::Binary { lhs, rhs, .. } | Node::Logical { lhs, rhs, .. } => {
                out.extend([*lhs, *rhs]);
            }
            Node::Assign { target, value, .. } => out.extend([*target, *value]),
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => out.extend([*test, *consequent, *alternate]),
            Node::Call { callee, args } | Node::New { callee, args } => {
                out.push(*callee);
                out.extend(args.iter().copied());
            }
            Node::Member { object, property } => {
                out.push(*object);
                if let MemberProp::Computed(p) = property {
                    out.push(*p);
                }
            }
        }
        out
    }

    /// Rebuild this node with every child id and symbol passed through `r`.
    pub fn remap<R: Remap>(&self, r: &mut R) -> Node {
        fn ids<R: Remap>(items: &[NodeId], r: &mut R) -> Vec<NodeId> {
            items.iter().map(|id| r.node(*id)).collect()
        }
        fn function<R: Remap>(f: &Function, r: &mut R) -> Function {
            Function {
                name: f.name.map(|n| r.symbol(n)),
                params: f.params.iter().map(|p| r.symbol(*p)).collect(),
                body: r.node(f.body),
            }
        }

        match self {
            Node::Program { body } => Node::Program { body: ids(body, r) },
            Node::VarDecl { kind, declarators } => Node::VarDecl {
                kind: *kind,
                declarators: declarators
                    .iter()
                    .map(|d| Declarator {
                        name: r.symbol(d.name),
                        init: d.init.map(|i| r.node(i)),
                    })
                    .collect(),
            },
            Node::FunctionDecl(f) => Node::FunctionDecl(function(f, r)),
            Node::FunctionExpr(f) => Node::FunctionExpr(function(f, r)),
            Node::ClassDecl(c) => Node::ClassDecl(Class {
                name: r.symbol(c.name),
                superclass: c.superclass.map(|s| r.node(s)),
                methods: c
                    .methods
                    .iter()
                    .map(|m| Method {
                        name: r.symbol(m.name),
                        is_static: m.is_static,
                        function: r.node(m.function),
                    })
                    .collect(),
            }),
            Node::Return(arg) => Node::Return(arg.map(|a| r.node(a))),
            Node::If {
                test,
                consequent,
                alternate,
            } => Node::If {
                test: r.node(*test),
                consequent: r.node(*consequent),
                alternate: alternate.map(|a| r.node(a)),
            },
            Node::For {
                init,
                test,
                update,
                body,
            } => Node::For {
                init: init.map(|i| r.node(i)),
                test: test.map(|t| r.node(t)),
                update: update.map(|u| r.node(u)),
                body: r.node(*body),
            },
            Node::ForIn { left, right, body } => Node::ForIn {
                left: r.node(*left),
                right: r.node(*right),
                body: r.node(*body),
            },
            Node::ForOf { left, right, body } => Node::ForOf {
                left: r.node(*left),
                right: r.node(*right),
                body: r.node(*body),
            },
            Node::While { test, body } => Node::While {
                test: r.node(*test),
                body: r.node(*body),
            },
            Node::DoWhile { body, test } => Node::DoWhile {
                body: r.node(*body),
                test: r.node(*test),
            },
            Node::Switch {
                discriminant,
                cases,
            } => Node::Switch {
                discriminant: r.node(*discriminant),
                cases: ids(cases, r),
            },
            Node::SwitchCase { test, consequent } => Node::SwitchCase {
                test: test.map(|t| r.node(t)),
                consequent: ids(consequent, r),
            },
            Node::Block { body } => Node::Block { body: ids(body, r) },
            Node::With { object, body } => Node::With {
                object: r.node(*object),
                body: r.node(*body),
            },
            Node::Break => Node::Break,
            Node::Continue => Node::Continue,
            Node::Throw(arg) => Node::Throw(r.node(*arg)),
            Node::Try {
                block,
                handler,
                finalizer,
            } => Node::Try {
                block: r.node(*block),
                handler: handler.as_ref().map(|h| Catch {
                    param: h.param.map(|p| r.symbol(p)),
                    body: r.node(h.body),
                }),
                finalizer: finalizer.map(|f| r.node(f)),
            },
            Node::Expr(e) => Node::Expr(r.node(*e)),
            Node::Empty => Node::Empty,
            Node::Ident(sym) => Node::Ident(r.symbol(*sym)),
            Node::Literal(lit) => Node::Literal(lit.clone()),
            Node::This => Node::This,
            Node::Array(items) => Node::Array(ids(items, r)),
            Node::Object(props) => Node::Object(
                props
                    .iter()
                    .map(|p| Property {
                        key: match &p.key {
                            PropKey::Ident(sym) => PropKey::Ident(r.symbol(*sym)),
                            other => other.clone(),
                        },
                        value: r.node(p.value),
                    })
                    .collect(),
            ),
            Node::Arrow {
                params,
                body,
                expression,
            } => Node::Arrow {
                params: params.iter().map(|p| r.symbol(*p)).collect(),
                body: r.node(*body),
                expression: *expression,
            },
            Node::Sequence(items) => Node::Sequence(ids(items, r)),
            Node::Unary { op, arg } => Node::Unary {
                op: *op,
                arg: r.node(*arg),
            },
            Node::Update { op, prefix, arg } => Node::Update {
                op: *op,
                prefix: *prefix,
                arg: r.node(*arg),
            },
            Node::Binary { op, lhs, rhs } => Node::Binary {
                op: *op,
                lhs: r.node(*lhs),
                rhs: r.node(*rhs),
            },
            Node::Logical { op, lhs, rhs } => Node::Logical {
                op: *op,
                lhs: r.node(*lhs),
                rhs: r.node(*rhs),
            },
            Node::Assign { op, target, value } => Node::Assign {
                op: *op,
                target: r.node(*target),
                value: r.node(*value),
            },
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => Node::Conditional {
                test: r.node(*test),
                consequent: r.node(*consequent),
                alternate: r.node(*alternate),
            },
            Node::Call { callee, args } => Node::Call {
                callee: r.node(*callee),
                args: ids(args, r),
            },
            Node::New { callee, args } => Node::New {
                callee: r.node(*callee),
                args: ids(args, r),
            },
            Node::Member { object, property } => Node::Member {
                object: r.node(*object),
                property: match property {
                    MemberProp::Named(sym) => MemberProp::Named(r.symbol(*sym)),
                    MemberProp::Computed(p) => MemberProp::Computed(r.node(*p)),
                },
            },
        }
    }
}

/// A parsed source file. Nodes live in an arena and are addressed by id; a
/// node is part of the program only if it is reachable from `root`, so a
/// replaced subtree simply becomes unreachable.
#[derive(Clone, Debug)]
pub struct Program {
    pub nodes: Arena<Node>,
    pub root: NodeId,
    pub symbol_table: SymbolTable,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = nodes.alloc(Node::Program { body: Vec::new() });
        Program {
            nodes,
            root,
            symbol_table: SymbolTable::new(),
        }
    }

    pub fn to_sym(&mut self, name: &str) -> Symbol {
        self.symbol_table.to_sym(name)
    }

    pub fn from_sym(&self, sym: Symbol) -> &str {
        self.symbol_table.from_sym(sym)
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.alloc(node)
    }

    /// Top-level statements.
    pub fn body(&self) -> &[NodeId] {
        match &self.nodes[self.root] {
            Node::Program { body } => body,
            _ => &[],
        }
    }

    pub fn push_toplevel(&mut self, id: NodeId) {
        if let Node::Program { body } = &mut self.nodes[self.root] {
            body.push(id);
        }
    }

    /// Put the node at `with` in place of the node at `site`. Ids held by
    /// the parent stay valid because the slot is overwritten in place.
    pub fn replace(&mut self, site: NodeId, with: NodeId) {
        let node = self.nodes[with].clone();
        self.nodes[site] = node;
    }

    /// Deep-copy the subtree rooted at `id` in `src` into this program,
    /// re-interning every name. Returns the id of the copied root, which is
    /// not yet reachable from `self.root`.
    pub fn copy_subtree(&mut self, src: &Program, id: NodeId) -> NodeId {
        let mut copier = SubtreeCopy { src, dst: self };
        copier.node(id)
    }

    /// Reachable nodes under `from` in depth-first pre-order.
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        self.preorder_with_parent(from)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn preorder_with_parent(&self, from: NodeId) -> Vec<(NodeId, Option<NodeId>)> {
        let mut out = Vec::new();
        let mut stack = vec![(from, None)];
        while let Some((id, parent)) = stack.pop() {
            out.push((id, parent));
            for child in self.nodes[id].children().into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }
        out
    }
}

impl Index<NodeId> for Program {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for Program {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

struct SubtreeCopy<'a> {
    src: &'a Program,
    dst: &'a mut Program,
}

impl Remap for SubtreeCopy<'_> {
    fn node(&mut self, id: NodeId) -> NodeId {
        let src = self.src;
        let copied = src.nodes[id].remap(self);
        self.dst.alloc(copied)
    }

    fn symbol(&mut self, sym: Symbol) -> Symbol {
        let name = self.src.from_sym(sym);
        self.dst.to_sym(name)
    }
}
