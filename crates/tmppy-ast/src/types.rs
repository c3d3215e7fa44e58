//! tmppy-ast - syntactic type-annotation nodes
//!
//! The source language writes type annotations as ordinary expressions
//! (`bool`, `int`, `List[int]`, `Callable[[int, bool], int]`, or a class
//! name). This module gives that expression-shaped syntax its own node type
//! rather than reusing [`crate::Expr`], since annotations are never
//! evaluated and the type-declaration resolver (spec §2, stage 2) consumes
//! them through a dedicated path.

use tmppy_util::{Span, Symbol};

#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// A bare name: `bool`, `int`, or a user-defined class name.
    Name(NameTypeExpr),
    /// `Outer[Arg1, Arg2, ...]`, e.g. `List[int]`, `Set[MyClass]`.
    Subscript(SubscriptTypeExpr),
    /// The argument-list literal inside `Callable[[A, B], R]`.
    List(ListTypeExpr),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name(t) => t.span,
            TypeExpr::Subscript(t) => t.span,
            TypeExpr::List(t) => t.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameTypeExpr {
    pub id: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SubscriptTypeExpr {
    pub value: Box<TypeExpr>,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ListTypeExpr {
    pub elts: Vec<TypeExpr>,
    pub span: Span,
}
