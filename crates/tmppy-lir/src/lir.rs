//! IR-low data model (spec §3.4), reproduced from the original
//! `_py2tmp/ir0.py`: a closed, five-case type system over C++ compile-time
//! constructs, and the expression/declaration shapes the emitter in
//! `tmppy-codegen` knows how to print.

use std::collections::BTreeSet;

/// The kind of a C++ compile-time value: what it would be declared as in a
/// template parameter list. Closed over five cases — richer IR-high types
/// (`List`, `Set`, `Function`, `Custom`) are erased to `Type` by the
/// lowering pass; see SPEC_FULL.md §3.1 for why that asymmetry is
/// intentional.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LType {
    Bool,
    Int64,
    Type,
    Template(Vec<LType>),
    Variadic,
}

impl LType {
    /// Whether this kind is ever represented by a C++ `template <...> class`
    /// parameter (as opposed to a plain value/type parameter).
    pub fn is_template(&self) -> bool {
        matches!(self, LType::Template(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
}

impl ComparisonOp {
    pub fn as_cpp_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::LtE => "<=",
            ComparisonOp::GtE => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Int64BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Int64BinOp {
    pub fn as_cpp_str(self) -> &'static str {
        match self {
            Int64BinOp::Add => "+",
            Int64BinOp::Sub => "-",
            Int64BinOp::Mul => "*",
            Int64BinOp::Div => "/",
            Int64BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Literal {
    Bool(bool),
    Int64(i64),
}

/// A reference to a named C++ entity: a template parameter bound in the
/// enclosing specialization (`is_local`), or a toplevel name such as a
/// `TemplateDefn`'s own name or a builtin. `is_metafunction_that_may_return_error`
/// holds for template-kind literals whose instantiation might not define a
/// nested `::type`/`::value` (used by the lowering pass's error-propagation
/// machinery upstream of this crate; this crate only carries the flag).
#[derive(Debug, Clone)]
pub struct AtomicTypeLiteral {
    pub cpp_type: String,
    pub is_local: bool,
    pub is_metafunction_that_may_return_error: bool,
    pub ty: LType,
}

impl AtomicTypeLiteral {
    pub fn for_local(cpp_type: impl Into<String>, ty: LType) -> Self {
        let is_metafunction_that_may_return_error = matches!(ty, LType::Template(_));
        AtomicTypeLiteral {
            cpp_type: cpp_type.into(),
            is_local: true,
            is_metafunction_that_may_return_error,
            ty,
        }
    }

    pub fn for_nonlocal(
        cpp_type: impl Into<String>,
        ty: LType,
        is_metafunction_that_may_return_error: bool,
    ) -> Self {
        AtomicTypeLiteral {
            cpp_type: cpp_type.into(),
            is_local: false,
            is_metafunction_that_may_return_error,
            ty,
        }
    }

    pub fn for_nonlocal_type(cpp_type: impl Into<String>) -> Self {
        Self::for_nonlocal(cpp_type, LType::Type, false)
    }

    pub fn for_nonlocal_template(
        cpp_type: impl Into<String>,
        arg_types: Vec<LType>,
        is_metafunction_that_may_return_error: bool,
    ) -> Self {
        Self::for_nonlocal(
            cpp_type,
            LType::Template(arg_types),
            is_metafunction_that_may_return_error,
        )
    }

    pub fn from_template_defn(defn: &TemplateDefn, is_metafunction_that_may_return_error: bool) -> Self {
        Self::for_nonlocal_template(
            defn.name.clone(),
            defn.args.iter().map(|a| a.ty.clone()).collect(),
            is_metafunction_that_may_return_error,
        )
    }
}

/// An IR-low expression. Every variant corresponds to a C++ compile-time
/// construct the emitter knows how to print (spec §3.4/§4.7).
#[derive(Debug, Clone)]
pub enum LExpr {
    Literal(Literal),
    AtomicTypeLiteral(AtomicTypeLiteral),
    Not(Box<LExpr>),
    UnaryMinus(Box<LExpr>),
    Comparison {
        lhs: Box<LExpr>,
        op: ComparisonOp,
        rhs: Box<LExpr>,
    },
    Int64BinOp {
        lhs: Box<LExpr>,
        op: Int64BinOp,
        rhs: Box<LExpr>,
    },
    /// `instantiation_might_trigger_static_assert` holds unless the lowering
    /// pass can prove the instantiated template never fires a
    /// `static_assert`; the emitter's deferred-evaluation machinery (spec
    /// §4.8) treats `true` conservatively.
    TemplateInstantiation {
        template: Box<LExpr>,
        args: Vec<LExpr>,
        instantiation_might_trigger_static_assert: bool,
    },
    ClassMemberAccess {
        object: Box<LExpr>,
        member_name: String,
        member_type: LType,
    },
    PointerType(Box<LExpr>),
    ReferenceType(Box<LExpr>),
    RvalueReferenceType(Box<LExpr>),
    ConstType(Box<LExpr>),
    ArrayType(Box<LExpr>),
    FunctionType {
        return_type: Box<LExpr>,
        arg_types: Vec<LExpr>,
    },
    VariadicTypeExpansion(Box<LExpr>),
}

impl LExpr {
    /// The kind this expression evaluates to, mirroring the `type` field
    /// every `ir0.Expr` subclass carries in the original.
    pub fn ty(&self) -> LType {
        match self {
            LExpr::Literal(Literal::Bool(_)) => LType::Bool,
            LExpr::Literal(Literal::Int64(_)) => LType::Int64,
            LExpr::AtomicTypeLiteral(lit) => lit.ty.clone(),
            LExpr::Not(_) => LType::Bool,
            LExpr::UnaryMinus(_) => LType::Int64,
            LExpr::Comparison { .. } => LType::Bool,
            LExpr::Int64BinOp { .. } => LType::Int64,
            LExpr::TemplateInstantiation { .. } => LType::Type,
            LExpr::ClassMemberAccess { member_type, .. } => member_type.clone(),
            LExpr::PointerType(_)
            | LExpr::ReferenceType(_)
            | LExpr::RvalueReferenceType(_)
            | LExpr::ConstType(_)
            | LExpr::ArrayType(_)
            | LExpr::FunctionType { .. } => LType::Type,
            LExpr::VariadicTypeExpansion(_) => LType::Type,
        }
    }

    /// Whether this expression's syntax tree mentions any of the given
    /// (locally bound) C++ identifiers — the test the deferred-evaluation
    /// machinery (spec §4.8) uses to decide whether a `static_assert` or
    /// template instantiation needs a dependency guard.
    pub fn references_any_of(&self, names: &std::collections::HashSet<String>) -> bool {
        match self {
            LExpr::Literal(_) => false,
            LExpr::AtomicTypeLiteral(lit) => names.contains(&lit.cpp_type),
            LExpr::Not(e) | LExpr::UnaryMinus(e) => e.references_any_of(names),
            LExpr::Comparison { lhs, rhs, .. } | LExpr::Int64BinOp { lhs, rhs, .. } => {
                lhs.references_any_of(names) || rhs.references_any_of(names)
            }
            LExpr::TemplateInstantiation { template, args, .. } => {
                template.references_any_of(names) || args.iter().any(|a| a.references_any_of(names))
            }
            LExpr::ClassMemberAccess { object, .. } => object.references_any_of(names),
            LExpr::PointerType(e)
            | LExpr::ReferenceType(e)
            | LExpr::RvalueReferenceType(e)
            | LExpr::ConstType(e)
            | LExpr::ArrayType(e)
            | LExpr::VariadicTypeExpansion(e) => e.references_any_of(names),
            LExpr::FunctionType { return_type, arg_types } => {
                return_type.references_any_of(names) || arg_types.iter().any(|a| a.references_any_of(names))
            }
        }
    }
}

/// One formal parameter of a `TemplateDefn`/`TemplateSpecialization`: its
/// kind and (for a main definition; specializations may reuse the name from
/// the parent defn) its bound name.
#[derive(Debug, Clone)]
pub struct TemplateArgDecl {
    pub ty: LType,
    pub name: String,
}

/// An element that can appear inside a template's body.
#[derive(Debug, Clone)]
pub enum TemplateBodyElement {
    StaticAssert { expr: LExpr, message: String },
    ConstantDef { name: String, expr: LExpr },
    Typedef { name: String, expr: LExpr },
    TemplateDefn(TemplateDefn),
}

impl TemplateBodyElement {
    pub fn static_assert(expr: LExpr, message: impl Into<String>) -> Self {
        debug_assert_eq!(expr.ty(), LType::Bool);
        TemplateBodyElement::StaticAssert { expr, message: message.into() }
    }

    pub fn constant_def(name: impl Into<String>, expr: LExpr) -> Self {
        debug_assert!(matches!(expr.ty(), LType::Bool | LType::Int64));
        TemplateBodyElement::ConstantDef { name: name.into(), expr }
    }

    pub fn typedef(name: impl Into<String>, expr: LExpr) -> Self {
        debug_assert!(matches!(expr.ty(), LType::Type | LType::Template(_)));
        TemplateBodyElement::Typedef { name: name.into(), expr }
    }
}

/// One `template <args> struct Name { body };` or, when `patterns` is
/// `Some`, one `template <args> struct Name<patterns> { body };`
/// specialization.
#[derive(Debug, Clone)]
pub struct TemplateSpecialization {
    pub args: Vec<TemplateArgDecl>,
    pub patterns: Option<Vec<LExpr>>,
    pub body: Vec<TemplateBodyElement>,
}

/// A named C++ template: either a main (catch-all) definition, one or more
/// pattern specializations, or both.
#[derive(Debug, Clone)]
pub struct TemplateDefn {
    pub name: String,
    pub args: Vec<TemplateArgDecl>,
    pub main_definition: Option<TemplateSpecialization>,
    pub specializations: Vec<TemplateSpecialization>,
    pub description: String,
    pub result_element_names: Vec<String>,
}

impl TemplateDefn {
    pub fn new(
        name: impl Into<String>,
        args: Vec<TemplateArgDecl>,
        main_definition: Option<TemplateSpecialization>,
        specializations: Vec<TemplateSpecialization>,
        description: impl Into<String>,
        mut result_element_names: Vec<String>,
    ) -> Self {
        debug_assert!(main_definition.is_some() || !specializations.is_empty());
        if let Some(main) = &main_definition {
            debug_assert!(main.patterns.is_none());
        }
        let description = description.into();
        debug_assert!(!description.contains('\n'));
        result_element_names.sort();
        TemplateDefn {
            name: name.into(),
            args,
            main_definition,
            specializations,
            description,
            result_element_names,
        }
    }
}

/// A single toplevel (non-template) declaration.
#[derive(Debug, Clone)]
pub enum ToplevelElement {
    StaticAssert { expr: LExpr, message: String },
    ConstantDef { name: String, expr: LExpr },
    Typedef { name: String, expr: LExpr },
}

/// The complete output of the back end's data model: a set of template
/// definitions, a handful of toplevel declarations/assertions, and the
/// subset of names a consumer of the generated header may reference.
#[derive(Debug, Clone)]
pub struct Header {
    pub template_defns: Vec<TemplateDefn>,
    pub toplevel_content: Vec<ToplevelElement>,
    pub public_names: BTreeSet<String>,
}
