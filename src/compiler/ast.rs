use std::fmt;
use std::rc::Rc;

use crate::compiler::lexer::Span;

/// A complete program: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

/// A function definition (named or anonymous).
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Shared so that evaluating a lambda does not copy its body.
    pub body: Rc<Block>,
    pub span: Span,
}

/// Statements in the language.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let {
        name: String,
        init: Expr,
        span: Span,
    },
    /// `fun name(params) { ... }`
    FnDecl(FnDef),
    Assign {
        target: AssignTarget,
        value: Expr,
        span: Span,
    },
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },
    ForIn {
        var: String,
        iterable: Expr,
        body: Block,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Throw {
        value: Expr,
        span: Span,
    },
    Try {
        try_block: Block,
        catch_var: String,
        catch_block: Block,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Ident(String),
    Field { object: Expr, field: String },
    Index { object: Expr, index: Expr },
}

/// A property key in an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    /// `name: value` or `"name": value`
    Named(String),
    /// `[expr]: value`
    Computed(Expr),
}

/// Expressions in the language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Nil {
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    /// Plain array literal: `[1, 2, 3]`
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    /// Object literal: `{x: 1, "y": 2, [Symbol.sequenceLiteral]: f}`
    Object {
        properties: Vec<(PropertyKey, Expr)>,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Field {
        object: Box<Expr>,
        field: String,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// Lambda expression: `fun(x) { return x + 1; }`
    Lambda(FnDef),
    /// Extensible collection literal: `Ctor#[a, b]` or `Ctor#{k: v}`.
    /// Removed by the desugar phase.
    Literal(LiteralNode),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Float { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Str { span, .. }
            | Expr::Nil { span }
            | Expr::Ident { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Index { span, .. }
            | Expr::Field { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. } => *span,
            Expr::Lambda(fn_def) => fn_def.span,
            Expr::Literal(node) => node.span,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// One `Ctor#[...]` or `Ctor#{...}` literal as parsed.
///
/// The body's element order is source order, which is also construction
/// order after desugaring.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralNode {
    /// Evaluated once, before any element.
    pub constructor: Box<Expr>,
    pub body: LiteralBody,
    /// Location of the marker token.
    pub span: Span,
}

impl LiteralNode {
    pub fn kind(&self) -> LiteralKind {
        match self.body {
            LiteralBody::Sequence(_) => LiteralKind::Sequence,
            LiteralBody::Mapping(_) => LiteralKind::Mapping,
        }
    }

    pub fn len(&self) -> usize {
        match &self.body {
            LiteralBody::Sequence(elements) => elements.len(),
            LiteralBody::Mapping(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The elements of a literal; the variant is fixed by the opening bracket.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralBody {
    /// `#[e1, e2, ...]`
    Sequence(Vec<Expr>),
    /// `#{k1: v1, k2: v2, ...}`
    Mapping(Vec<Entry>),
}

/// A `key: value` entry of a mapping literal. Both sides are full expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Expr,
    pub value: Expr,
}

/// Which form a literal takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Sequence,
    Mapping,
}

impl LiteralKind {
    /// The protocol method a constructor must expose for this form.
    pub fn protocol(self) -> WellKnownSymbol {
        match self {
            LiteralKind::Sequence => WellKnownSymbol::SequenceLiteral,
            LiteralKind::Mapping => WellKnownSymbol::MappingLiteral,
        }
    }
}

/// Collision-free property keys reachable as `Symbol.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    SequenceLiteral,
    MappingLiteral,
}

impl WellKnownSymbol {
    pub const ALL: [WellKnownSymbol; 2] = [
        WellKnownSymbol::SequenceLiteral,
        WellKnownSymbol::MappingLiteral,
    ];

    /// Property name on the global `Symbol` object.
    pub fn name(self) -> &'static str {
        match self {
            WellKnownSymbol::SequenceLiteral => "sequenceLiteral",
            WellKnownSymbol::MappingLiteral => "mappingLiteral",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sym| sym.name() == name)
    }
}

impl fmt::Display for WellKnownSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol.{}", self.name())
    }
}
