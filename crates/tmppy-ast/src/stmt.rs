//! tmppy-ast - statement and top-level item node definitions

use crate::expr::Expr;
use crate::types::TypeExpr;
use tmppy_util::{Span, Symbol};

#[derive(Debug, Clone)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Assign(Assign),
    UnpackingAssign(UnpackingAssign),
    Return(Return),
    If(If),
    Raise(Raise),
    Try(Try),
    Assert(Assert),
    Import(Import),
    ImportFrom(ImportFrom),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::FunctionDef(s) => s.span,
            Stmt::ClassDef(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::UnpackingAssign(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::Raise(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::ImportFrom(s) => s.span,
        }
    }
}

/// A single function parameter. The first parameter of a method is named
/// `self` and (per spec §4.5) must carry no annotation; every other
/// parameter is required to have one.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Symbol,
    pub annotation: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Symbol,
    pub args: Vec<Arg>,
    pub returns: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `class C:` or `class C(Exception):`. The source language does not
/// support multiple inheritance or decorators; `bases` holds whatever the
/// parser saw so the elaborator can reject anything other than zero bases
/// or exactly `Exception`.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Symbol,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// The left-hand side of an [`Assign`]. Plain module/function-body
/// assignments only ever target a bare name; inside a class's `__init__`
/// body, the only assignment shape the subset accepts is `self.field = ...`,
/// which the parser delivers as `SelfAttr` rather than forcing the
/// elaborator to pattern-match an `Attribute` expression target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignTarget {
    Name(Symbol),
    SelfAttr(Symbol),
}

/// `x = e` (also covers `x: T = e`, the parser folds the two into one shape
/// with an optional `annotation`).
#[derive(Debug, Clone)]
pub struct Assign {
    pub target: AssignTarget,
    pub annotation: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

/// `[x, y] = e` or `x, y = e` — destructuring a runtime list of statically
/// known length.
#[derive(Debug, Clone)]
pub struct UnpackingAssign {
    pub targets: Vec<Symbol>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Return {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct If {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
    pub span: Span,
}

/// `raise <exc>` or `raise <exc> from <cause>`. `cause` is modeled so the
/// elaborator can reject the `from` form with a precise diagnostic rather
/// than the parser discarding it silently.
#[derive(Debug, Clone)]
pub struct Raise {
    pub exc: Expr,
    pub cause: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub exc_type: Option<Expr>,
    pub name: Option<Symbol>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Try {
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Assert {
    pub test: Expr,
    pub msg: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub names: Vec<Symbol>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportFrom {
    pub module: Symbol,
    pub names: Vec<Symbol>,
    pub span: Span,
}
