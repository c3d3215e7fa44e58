//! IR-high expressions and statements (spec §3.2): a typed, explicit tree
//! produced by elaboration. Every expression node carries the [`HType`] the
//! elaborator assigned it, so downstream passes never need to re-derive it.

use crate::types::HType;
use tmppy_util::{Span, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// One `(patterns) -> result` arm of a `match` expression. `patterns` has
/// one entry per matched subject; `used_params` is the subset of the
/// match's lambda parameters this branch's patterns mention, needed so the
/// lowering pass knows which parameters the result expression may
/// legitimately reference (spec §4.2).
#[derive(Debug, Clone)]
pub struct MatchBranch {
    pub patterns: Vec<HExpr>,
    pub result: HExpr,
    pub used_params: Vec<Symbol>,
    /// True iff every pattern in this branch is a bare variable reference —
    /// the "main definition" / catch-all branch.
    pub is_main_definition: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCtorKind {
    Pointer,
    Reference,
    RvalueReference,
    Const,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    Sum,
    All,
    Any,
}

/// An IR-high expression (spec §3.2). Every variant's doc names the `HType`
/// it always produces; the elaborator is the only place that constructs
/// these, so the invariant holds by construction rather than by runtime
/// check.
#[derive(Debug, Clone)]
pub enum HExpr {
    BoolLiteral(bool, Span),
    IntLiteral(i64, Span),
    /// An atomic C++ type name, e.g. `Type("int")`. Always [`HType::TypeRef`].
    AtomicTypeLiteral(String, Span),

    /// A reference to a bound name. `is_global_function` distinguishes a
    /// reference to a module-level function (which lowers to a named
    /// template) from a local value; `may_throw` is copied from the
    /// symbol's `may_throw_if_function` flag at the point of reference.
    VarRef {
        name: Symbol,
        ty: HType,
        is_global_function: bool,
        may_throw: bool,
        span: Span,
    },

    ListLiteral {
        elem_type: HType,
        elems: Vec<HExpr>,
        span: Span,
    },
    SetLiteral {
        elem_type: HType,
        elems: Vec<HExpr>,
        span: Span,
    },
    /// `[elt for target in iter]` / `{elt for target in iter}`; `is_set`
    /// distinguishes the two surface forms.
    Comprehension {
        is_set: bool,
        elt: Box<HExpr>,
        target: Symbol,
        target_type: HType,
        iter: Box<HExpr>,
        result_elem_type: HType,
        span: Span,
    },

    Attribute {
        value: Box<HExpr>,
        attr: Symbol,
        ty: HType,
        span: Span,
    },

    IntBinOp {
        left: Box<HExpr>,
        op: crate::hir::IntBinOpKind,
        right: Box<HExpr>,
        span: Span,
    },
    /// Polymorphic `+`: integer addition or list concatenation, both
    /// operands sharing `elem_type` exactly (spec §4.2).
    ListConcat {
        elem_type: HType,
        left: Box<HExpr>,
        right: Box<HExpr>,
        span: Span,
    },
    Compare {
        left: Box<HExpr>,
        op: CmpOp,
        right: Box<HExpr>,
        span: Span,
    },
    /// Structural `==`/`!=` between two values of a type that supports
    /// equality per the asymmetric rule in spec §9 (distinct from the
    /// numeric/boolean [`HExpr::Compare`], which only ever compares `Int`).
    Equals {
        left: Box<HExpr>,
        negate: bool,
        right: Box<HExpr>,
        span: Span,
    },
    BoolOp {
        op: BoolOp,
        left: Box<HExpr>,
        right: Box<HExpr>,
        span: Span,
    },
    Not(Box<HExpr>, Span),
    UnaryMinus(Box<HExpr>, Span),

    Call {
        callee: Box<HExpr>,
        args: Vec<HExpr>,
        ret_type: HType,
        may_throw: bool,
        span: Span,
    },

    Match {
        subjects: Vec<HExpr>,
        params: Vec<Symbol>,
        branches: Vec<MatchBranch>,
        result_type: HType,
        span: Span,
    },

    TypeCtor {
        kind: TypeCtorKind,
        operand: Box<HExpr>,
        span: Span,
    },
    FunctionTypeCtor {
        ret: Box<HExpr>,
        args: Vec<HExpr>,
        span: Span,
    },
    TemplateInstantiation {
        name: String,
        args: Vec<HExpr>,
        span: Span,
    },
    TemplateMemberAccess {
        class: Box<HExpr>,
        member: Symbol,
        args: Vec<HExpr>,
        span: Span,
    },

    Reduce {
        kind: ReduceKind,
        elem_type: HType,
        iterable: Box<HExpr>,
        span: Span,
    },

    /// Construction of a custom class: `C(arg1, ..., argn)`.
    CustomConstruct {
        ty: HType,
        args: Vec<HExpr>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBinOpKind {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
}

impl HExpr {
    pub fn span(&self) -> Span {
        match self {
            HExpr::BoolLiteral(_, s)
            | HExpr::IntLiteral(_, s)
            | HExpr::AtomicTypeLiteral(_, s)
            | HExpr::Not(_, s)
            | HExpr::UnaryMinus(_, s) => *s,
            HExpr::VarRef { span, .. }
            | HExpr::ListLiteral { span, .. }
            | HExpr::SetLiteral { span, .. }
            | HExpr::Comprehension { span, .. }
            | HExpr::Attribute { span, .. }
            | HExpr::IntBinOp { span, .. }
            | HExpr::ListConcat { span, .. }
            | HExpr::Compare { span, .. }
            | HExpr::Equals { span, .. }
            | HExpr::BoolOp { span, .. }
            | HExpr::Call { span, .. }
            | HExpr::Match { span, .. }
            | HExpr::TypeCtor { span, .. }
            | HExpr::FunctionTypeCtor { span, .. }
            | HExpr::TemplateInstantiation { span, .. }
            | HExpr::TemplateMemberAccess { span, .. }
            | HExpr::Reduce { span, .. }
            | HExpr::CustomConstruct { span, .. } => *span,
        }
    }

    /// The type this expression was elaborated at. Mirrors the `type` field
    /// every elaborated node carries in the original implementation.
    pub fn ty(&self) -> HType {
        match self {
            HExpr::BoolLiteral(..) => HType::Bool,
            HExpr::IntLiteral(..) => HType::Int,
            HExpr::AtomicTypeLiteral(..) => HType::TypeRef,
            HExpr::VarRef { ty, .. } => ty.clone(),
            HExpr::ListLiteral { elem_type, .. } => HType::list_of(elem_type.clone()),
            HExpr::SetLiteral { elem_type, .. } => HType::set_of(elem_type.clone()),
            HExpr::Comprehension { is_set, result_elem_type, .. } => {
                if *is_set {
                    HType::set_of(result_elem_type.clone())
                } else {
                    HType::list_of(result_elem_type.clone())
                }
            }
            HExpr::Attribute { ty, .. } => ty.clone(),
            HExpr::IntBinOp { .. } => HType::Int,
            HExpr::ListConcat { elem_type, .. } => HType::list_of(elem_type.clone()),
            HExpr::Compare { .. } | HExpr::Equals { .. } | HExpr::BoolOp { .. } | HExpr::Not(..) => {
                HType::Bool
            }
            HExpr::UnaryMinus(..) => HType::Int,
            HExpr::Call { ret_type, .. } => ret_type.clone(),
            HExpr::Match { result_type, .. } => result_type.clone(),
            HExpr::TypeCtor { .. }
            | HExpr::FunctionTypeCtor { .. }
            | HExpr::TemplateInstantiation { .. }
            | HExpr::TemplateMemberAccess { .. } => HType::TypeRef,
            HExpr::Reduce { kind, .. } => match kind {
                ReduceKind::Sum => HType::Int,
                ReduceKind::All | ReduceKind::Any => HType::Bool,
            },
            HExpr::CustomConstruct { ty, .. } => ty.clone(),
        }
    }

    /// Whether referencing this expression might throw at compile time
    /// (i.e. propagate a C++-side `static_assert` failure upward). Only a
    /// function call can; everything else is pure.
    pub fn may_throw(&self) -> bool {
        matches!(self, HExpr::Call { may_throw: true, .. })
    }
}

/// An IR-high statement (spec §3.2).
#[derive(Debug, Clone)]
pub enum HStmt {
    Assign {
        target: Symbol,
        value: HExpr,
        span: Span,
    },
    /// `[x, y] = e` — `e` must be `List[T]`; `error_message` is the
    /// runtime-formatted diagnostic template fired on a length mismatch
    /// (spec §4.3).
    UnpackingAssign {
        targets: Vec<Symbol>,
        elem_type: HType,
        value: HExpr,
        error_message: String,
        span: Span,
    },
    Return {
        value: Option<HExpr>,
        span: Span,
    },
    If {
        test: HExpr,
        body: Vec<HStmt>,
        orelse: Vec<HStmt>,
        span: Span,
    },
    Raise {
        exc: HExpr,
        span: Span,
    },
    TryExcept {
        body: Vec<HStmt>,
        exc_type: HType,
        exc_name: Symbol,
        handler_body: Vec<HStmt>,
        span: Span,
    },
    Assert {
        test: HExpr,
        /// The fully-formatted runtime diagnostic string (source filename,
        /// line, offending source text, and the user's message, all
        /// embedded and escaped per spec §4.3), or the empty string if no
        /// message was supplied.
        message: String,
        span: Span,
    },
}

impl HStmt {
    pub fn span(&self) -> Span {
        match self {
            HStmt::Assign { span, .. }
            | HStmt::UnpackingAssign { span, .. }
            | HStmt::Return { span, .. }
            | HStmt::If { span, .. }
            | HStmt::Raise { span, .. }
            | HStmt::TryExcept { span, .. }
            | HStmt::Assert { span, .. } => *span,
        }
    }

    /// Whether control never falls through past this statement — used by
    /// the reachability check (spec §4.3) and by branch-merge (spec §4.1) to
    /// decide whether a branch's bindings need only-partial treatment.
    pub fn always_returns(&self) -> bool {
        match self {
            HStmt::Return { .. } | HStmt::Raise { .. } => true,
            HStmt::If { body, orelse, .. } => {
                !orelse.is_empty()
                    && block_always_returns(body)
                    && block_always_returns(orelse)
            }
            HStmt::TryExcept { body, handler_body, .. } => {
                block_always_returns(body) && block_always_returns(handler_body)
            }
            HStmt::Assign { .. }
            | HStmt::UnpackingAssign { .. }
            | HStmt::Assert { .. } => false,
        }
    }
}

pub fn block_always_returns(stmts: &[HStmt]) -> bool {
    stmts.last().is_some_and(HStmt::always_returns)
}

/// A fully elaborated function: signature plus body. `may_throw` holds
/// whenever the body contains a reachable `raise` or calls another
/// `may_throw` function (spec §3.3 symbol entries carry this flag).
#[derive(Debug, Clone)]
pub struct HFunction {
    pub name: Symbol,
    pub params: Vec<(Symbol, HType)>,
    pub ret_type: HType,
    pub body: Vec<HStmt>,
    pub may_throw: bool,
    pub is_public: bool,
    pub span: Span,
}

/// A fully elaborated module: its public functions, custom classes, and
/// top-level assertions (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct HModule {
    pub functions: Vec<HFunction>,
    pub classes: Vec<std::rc::Rc<crate::types::CustomType>>,
    pub toplevel_asserts: Vec<HStmt>,
}
