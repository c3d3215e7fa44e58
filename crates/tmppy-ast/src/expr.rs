//! tmppy-ast - expression node definitions

use tmppy_util::{Span, Symbol};

/// An expression node from the surface AST. Shapes are preserved verbatim
/// from the source grammar (no desugaring has happened yet) so the
/// elaborator can recognize built-ins like `Type(...)` or `match(...)` by
/// callee shape, per spec.
#[derive(Debug, Clone)]
pub enum Expr {
    Name(NameExpr),
    Num(NumExpr),
    Str(StrExpr),
    NameConstant(NameConstantExpr),
    List(ListExpr),
    Set(SetExpr),
    Tuple(TupleExpr),
    Dict(DictExpr),
    ListComp(ListCompExpr),
    SetComp(SetCompExpr),
    Attribute(AttributeExpr),
    Compare(CompareExpr),
    BoolOp(BoolOpExpr),
    UnaryOp(UnaryOpExpr),
    BinOp(BinOpExpr),
    Call(CallExpr),
    Lambda(LambdaExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Name(e) => e.span,
            Expr::Num(e) => e.span,
            Expr::Str(e) => e.span,
            Expr::NameConstant(e) => e.span,
            Expr::List(e) => e.span,
            Expr::Set(e) => e.span,
            Expr::Tuple(e) => e.span,
            Expr::Dict(e) => e.span,
            Expr::ListComp(e) => e.span,
            Expr::SetComp(e) => e.span,
            Expr::Attribute(e) => e.span,
            Expr::Compare(e) => e.span,
            Expr::BoolOp(e) => e.span,
            Expr::UnaryOp(e) => e.span,
            Expr::BinOp(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Lambda(e) => e.span,
        }
    }
}

/// A bare identifier reference, e.g. `x`.
#[derive(Debug, Clone)]
pub struct NameExpr {
    pub id: Symbol,
    pub span: Span,
}

/// An integer literal. Stored as `i128` (wider than the accepted i64 range)
/// so the elaborator can diagnose out-of-range literals instead of
/// truncating or panicking on the parse.
#[derive(Debug, Clone)]
pub struct NumExpr {
    pub value: i128,
    pub span: Span,
}

/// A string literal, e.g. the message of an `assert` or the atomic C++
/// type name passed to `Type(...)`.
#[derive(Debug, Clone)]
pub struct StrExpr {
    pub value: String,
    pub span: Span,
}

/// `True` / `False`. The source language's `None` is not part of this
/// subset and is rejected upstream of this crate.
#[derive(Debug, Clone)]
pub struct NameConstantExpr {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ListExpr {
    pub elts: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SetExpr {
    pub elts: Vec<Expr>,
    pub span: Span,
}

/// A parenthesized tuple, used as a match pattern key when a match has more
/// than one subject expression, and as an unpacking-assignment target.
#[derive(Debug, Clone)]
pub struct TupleExpr {
    pub elts: Vec<Expr>,
    pub span: Span,
}

/// A `{...: ..., ...}` literal. The only place this shape appears in the
/// accepted subset is as the body of a `match(...)`'s lambda.
#[derive(Debug, Clone)]
pub struct DictExpr {
    pub keys: Vec<Expr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

/// `[elt for target in iter]` — a single loop variable, no `if` clauses.
#[derive(Debug, Clone)]
pub struct ListCompExpr {
    pub elt: Box<Expr>,
    pub target: Symbol,
    pub iter: Box<Expr>,
    pub span: Span,
}

/// `{elt for target in iter}`.
#[derive(Debug, Clone)]
pub struct SetCompExpr {
    pub elt: Box<Expr>,
    pub target: Symbol,
    pub iter: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AttributeExpr {
    pub value: Box<Expr>,
    pub attr: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
}

/// A single binary comparison. The surface grammar allows chained
/// comparisons (`a < b < c`); this subset only accepts one comparator, which
/// the upstream parser is expected to have already enforced, so only a
/// binary shape is modeled here.
#[derive(Debug, Clone)]
pub struct CompareExpr {
    pub left: Box<Expr>,
    pub op: CmpOp,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

/// `a and b and c` / `a or b or c` — an n-ary chain as parsed; the
/// elaborator is the one that right-folds this into binary `HExpr` nodes.
#[derive(Debug, Clone)]
pub struct BoolOpExpr {
    pub op: BoolOpKind,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    USub,
}

#[derive(Debug, Clone)]
pub struct UnaryOpExpr {
    pub op: UnaryOpKind,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mult,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone)]
pub struct BinOpExpr {
    pub left: Box<Expr>,
    pub op: BinOpKind,
    pub right: Box<Expr>,
    pub span: Span,
}

/// A keyword argument in a call, e.g. `f(x=1)`. The accepted subset never
/// permits these; they are modeled only so the elaborator can reject them
/// with a precise diagnostic instead of the parser silently dropping them.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub arg: Option<Symbol>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub span: Span,
}

/// `lambda v1, ..., vk: <dict literal>` — only used as the second argument
/// to `match(...)`.
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Symbol>,
    pub body: Box<Expr>,
    pub span: Span,
}
