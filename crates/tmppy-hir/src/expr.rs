//! Expression elaborator (spec §4.2): the single-entry `elaborate_expr`
//! that turns a surface [`tmppy_ast::Expr`] into a typed [`HExpr`].
//!
//! Grounded in `_py2tmp/ast_to_ir3.py`'s `ExpressionCompiler`, restructured
//! as one large `match` over the AST shape per spec §9's guidance ("use an
//! abstract base with a discriminant enum and downcast in a single central
//! match/switch per consumer; do not scatter type tests").

use crate::error::{CompilationError, Note, Result};
use crate::hir::{BoolOp, CmpOp, HExpr, IntBinOpKind, MatchBranch, ReduceKind, TypeCtorKind};
use crate::scope::{CompilationContext, Table};
use crate::types::HType;
use tmppy_ast as ast;
use tmppy_util::Symbol;

/// Narrow integer-literal bound from spec §4.2: "strictly inside
/// `[-(2^63-1), 2^63-1]`" — note this is *not* the full `i64::MIN..=i64::MAX`
/// range; `i64::MIN` itself is rejected, matching the original's two
/// half-open checks rather than a single symmetric one (see SPEC_FULL.md).
const INT_MIN: i128 = -(i64::MAX as i128);
const INT_MAX: i128 = i64::MAX as i128;

/// Whether `ty` supports structural `==`/`!=` (spec §4.2, with the
/// deliberate `Set` asymmetry from spec §9 preserved exactly): a `Set` is
/// comparable only when it appears as the outermost operand type, never
/// when nested inside a `List` or another `Set`.
pub fn supports_equality(ty: &HType) -> bool {
    supports_equality_at(ty, true)
}

fn supports_equality_at(ty: &HType, outermost: bool) -> bool {
    match ty {
        HType::Bool | HType::Int | HType::TypeRef => true,
        HType::List(elem) => supports_equality_at(elem, false),
        HType::Set(elem) => outermost && supports_equality_at(elem, false),
        HType::Function { .. } | HType::Bottom => false,
        HType::Custom(c) => c.fields.iter().all(|(_, field_ty)| supports_equality_at(field_ty, false)),
    }
}

/// Validates the atomic C++ type name grammar from spec §4.2:
/// `[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*`.
pub fn is_valid_atomic_cpp_type(text: &str) -> bool {
    fn is_ident(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
    !text.is_empty() && text.split("::").all(is_ident)
}

pub struct ExprCtx<'a> {
    pub ctx: &'a mut CompilationContext,
    pub scope: usize,
    pub in_match_pattern: bool,
}

pub fn elaborate_expr(e: &ast::Expr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    match e {
        ast::Expr::NameConstant(n) => Ok(HExpr::BoolLiteral(n.value, n.span)),
        ast::Expr::Num(n) => elaborate_num(n),
        ast::Expr::Str(_) => Err(unsupported(e.span(), "a bare string literal is not a valid expression here")),
        ast::Expr::Name(n) => elaborate_name(n, ec),
        ast::Expr::List(l) => elaborate_list(l, ec, false),
        ast::Expr::Set(s) => elaborate_set(s, ec),
        ast::Expr::ListComp(c) => elaborate_comp(c.elt.as_ref(), c.target, c.iter.as_ref(), c.span, ec, false),
        ast::Expr::SetComp(c) => elaborate_comp(c.elt.as_ref(), c.target, c.iter.as_ref(), c.span, ec, true),
        ast::Expr::Attribute(a) => elaborate_attribute(a, ec),
        ast::Expr::Compare(c) => elaborate_compare(c, ec),
        ast::Expr::BoolOp(b) => elaborate_bool_op(b, ec),
        ast::Expr::UnaryOp(u) => elaborate_unary_op(u, ec),
        ast::Expr::BinOp(b) => elaborate_bin_op(b, ec),
        ast::Expr::Call(c) => elaborate_call(c, ec),
        ast::Expr::Tuple(_) | ast::Expr::Dict(_) | ast::Expr::Lambda(_) => {
            Err(unsupported(e.span(), "this syntax is only valid inside a match(...) expression"))
        }
    }
}

fn unsupported(span: tmppy_util::Span, what: impl Into<String>) -> CompilationError {
    CompilationError::UnsupportedSyntax { span, what: what.into(), notes: vec![] }
}

fn elaborate_num(n: &ast::NumExpr) -> Result<HExpr> {
    if n.value < INT_MIN || n.value > INT_MAX {
        return Err(CompilationError::IntegerOutOfRange {
            span: n.span,
            value: n.value.to_string(),
            notes: vec![],
        });
    }
    Ok(HExpr::IntLiteral(n.value as i64, n.span))
}

fn elaborate_name(n: &ast::NameExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    // A bare name inside a pattern position is a wildcard binding, handled
    // by `elaborate_match_application` before reaching here; if control
    // arrives here with `in_match_pattern` set, the name is a genuine
    // lookup of a non-parameter identifier used as a concrete `TypeRef`
    // pattern (e.g. a module-level class name), so the ordinary lookup
    // below is still correct.
    if let Some((owner, entry)) = ec.ctx.lookup(ec.scope, Table::Value, n.id) {
        let is_global_function = matches!(entry.ty, HType::Function { .. }) && owner == ec.ctx.root();
        if entry.is_only_partially_defined {
            return Err(CompilationError::PartiallyDefined {
                span: n.span,
                name: n.id.as_str().to_string(),
                notes: vec![],
            }
            .with_note(Note::new(entry.def_span, format!("'{}' is conditionally defined here", n.id.as_str()))));
        }
        return Ok(HExpr::VarRef {
            name: n.id,
            ty: entry.ty.clone(),
            is_global_function,
            may_throw: entry.may_throw_if_function,
            span: n.span,
        });
    }
    if let Some(pf) = ec.ctx.lookup_partial_function(ec.scope, n.id) {
        let current_fn = ec.ctx.function_name(ec.scope);
        if current_fn == Some(n.id) {
            return Err(CompilationError::UndefinedName {
                span: n.span,
                name: n.id.as_str().to_string(),
                notes: vec![],
            }
            .with_note(Note::new(
                pf.def_span,
                "recursive function references are only allowed if the return type is declared explicitly",
            )));
        }
        return Err(CompilationError::UndefinedName {
            span: n.span,
            name: n.id.as_str().to_string(),
            notes: vec![],
        }
        .with_note(Note::new(
            pf.def_span,
            "return type not yet determined; either declare it or move the call after the definition",
        )));
    }
    Err(CompilationError::UndefinedName { span: n.span, name: n.id.as_str().to_string(), notes: vec![] })
}

fn elaborate_list(l: &ast::ListExpr, ec: &mut ExprCtx<'_>, _is_set: bool) -> Result<HExpr> {
    let mut elems = Vec::with_capacity(l.elts.len());
    let mut elem_type: Option<HType> = None;
    for elt in &l.elts {
        let h = elaborate_expr(elt, ec)?;
        let ty = h.ty();
        match &elem_type {
            None => elem_type = Some(ty),
            Some(expected) if *expected == ty => {}
            Some(expected) => {
                return Err(CompilationError::TypeMismatch {
                    span: elt.span(),
                    expected: expected.describe(),
                    found: ty.describe(),
                    notes: vec![],
                });
            }
        }
        elems.push(h);
    }
    let elem_type = elem_type.ok_or_else(|| {
        unsupported(l.span, "an empty list literal requires empty_list(T); bare `[]` has no element type")
    })?;
    Ok(HExpr::ListLiteral { elem_type, elems, span: l.span })
}

fn elaborate_set(s: &ast::SetExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    let mut elems = Vec::with_capacity(s.elts.len());
    let mut elem_type: Option<HType> = None;
    for elt in &s.elts {
        let h = elaborate_expr(elt, ec)?;
        let ty = h.ty();
        match &elem_type {
            None => elem_type = Some(ty),
            Some(expected) if *expected == ty => {}
            Some(expected) => {
                return Err(CompilationError::TypeMismatch {
                    span: elt.span(),
                    expected: expected.describe(),
                    found: ty.describe(),
                    notes: vec![],
                });
            }
        }
        elems.push(h);
    }
    let elem_type = elem_type
        .ok_or_else(|| unsupported(s.span, "an empty set literal requires empty_set(T); bare `{}` has no element type"))?;
    Ok(HExpr::SetLiteral { elem_type, elems, span: s.span })
}

fn elaborate_comp(
    elt: &ast::Expr,
    target: Symbol,
    iter: &ast::Expr,
    span: tmppy_util::Span,
    ec: &mut ExprCtx<'_>,
    is_set: bool,
) -> Result<HExpr> {
    let iter_h = elaborate_expr(iter, ec)?;
    let target_type = match iter_h.ty() {
        HType::List(elem) | HType::Set(elem) => *elem,
        other => {
            return Err(CompilationError::TypeMismatch {
                span: iter.span(),
                expected: "List[T] or Set[T]".to_string(),
                found: other.describe(),
                notes: vec![],
            });
        }
    };
    let child = ec.ctx.child_scope(ec.scope, None);
    ec.ctx
        .add(child, Table::Value, target, target_type.clone(), span, false, false)
        .map_err(|e| e)?;
    let mut child_ec = ExprCtx { ctx: ec.ctx, scope: child, in_match_pattern: ec.in_match_pattern };
    let elt_h = elaborate_expr(elt, &mut child_ec)?;
    let result_elem_type = elt_h.ty();
    Ok(HExpr::Comprehension {
        is_set,
        elt: Box::new(elt_h),
        target,
        target_type,
        iter: Box::new(iter_h),
        result_elem_type,
        span,
    })
}

fn elaborate_attribute(a: &ast::AttributeExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if ec.in_match_pattern {
        return Err(unsupported(a.span, "attribute access is not allowed inside a match pattern"));
    }
    let value = elaborate_expr(&a.value, ec)?;
    let ty = match value.ty() {
        HType::TypeRef => HType::TypeRef,
        HType::Custom(c) => {
            let field = c.fields.iter().find(|(name, _)| *name == a.attr);
            match field {
                Some((_, field_ty)) => field_ty.clone(),
                None => {
                    let available: Vec<&str> = c.fields.iter().map(|(n, _)| n.as_str()).collect();
                    return Err(CompilationError::UnsupportedBuiltinUsage {
                        span: a.span,
                        detail: format!(
                            "'{}' has no field '{}'; available fields: {}",
                            c.name.as_str(),
                            a.attr.as_str(),
                            available.join(", ")
                        ),
                        notes: vec![],
                    });
                }
            }
        }
        other => {
            return Err(CompilationError::TypeMismatch {
                span: a.value.span(),
                expected: "Type or a custom class".to_string(),
                found: other.describe(),
                notes: vec![],
            });
        }
    };
    Ok(HExpr::Attribute { value: Box::new(value), attr: a.attr, ty, span: a.span })
}

fn elaborate_compare(c: &ast::CompareExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if ec.in_match_pattern {
        return Err(unsupported(c.span, "comparisons are not allowed inside a match pattern"));
    }
    let left = elaborate_expr(&c.left, ec)?;
    let right = elaborate_expr(&c.right, ec)?;
    match c.op {
        ast::CmpOp::Eq | ast::CmpOp::NotEq => {
            let lty = left.ty();
            if lty != right.ty() {
                return Err(CompilationError::TypeMismatch {
                    span: c.span,
                    expected: lty.describe(),
                    found: right.ty().describe(),
                    notes: vec![],
                });
            }
            if !supports_equality(&lty) {
                return Err(CompilationError::UnsupportedBuiltinUsage {
                    span: c.span,
                    detail: format!("type {} does not support equality comparison", lty.describe()),
                    notes: vec![],
                });
            }
            Ok(HExpr::Equals {
                left: Box::new(left),
                negate: c.op == ast::CmpOp::NotEq,
                right: Box::new(right),
                span: c.span,
            })
        }
        _ => {
            expect_type(&left, &HType::Int)?;
            expect_type(&right, &HType::Int)?;
            let op = match c.op {
                ast::CmpOp::Lt => CmpOp::Lt,
                ast::CmpOp::Gt => CmpOp::Gt,
                ast::CmpOp::LtE => CmpOp::LtE,
                ast::CmpOp::GtE => CmpOp::GtE,
                ast::CmpOp::Eq | ast::CmpOp::NotEq => unreachable!(),
            };
            Ok(HExpr::Compare { left: Box::new(left), op, right: Box::new(right), span: c.span })
        }
    }
}

fn expect_type(e: &HExpr, expected: &HType) -> Result<()> {
    if &e.ty() != expected {
        return Err(CompilationError::TypeMismatch {
            span: e.span(),
            expected: expected.describe(),
            found: e.ty().describe(),
            notes: vec![],
        });
    }
    Ok(())
}

fn elaborate_bool_op(b: &ast::BoolOpExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if ec.ctx.function_name(ec.scope).is_none() {
        return Err(unsupported(b.span, "'and'/'or' are only allowed inside a function body"));
    }
    if ec.in_match_pattern {
        return Err(unsupported(b.span, "'and'/'or' are not allowed inside a match pattern"));
    }
    let op = match b.op {
        ast::BoolOpKind::And => BoolOp::And,
        ast::BoolOpKind::Or => BoolOp::Or,
    };
    let mut values = b.values.iter();
    let first = values.next().ok_or_else(|| unsupported(b.span, "empty boolean expression"))?;
    let mut acc = elaborate_expr(first, ec)?;
    expect_type(&acc, &HType::Bool)?;
    for v in values {
        let rhs = elaborate_expr(v, ec)?;
        expect_type(&rhs, &HType::Bool)?;
        acc = HExpr::BoolOp { op, left: Box::new(acc), right: Box::new(rhs), span: b.span };
    }
    Ok(acc)
}

fn elaborate_unary_op(u: &ast::UnaryOpExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    let operand = elaborate_expr(&u.operand, ec)?;
    match u.op {
        ast::UnaryOpKind::Not => {
            expect_type(&operand, &HType::Bool)?;
            Ok(HExpr::Not(Box::new(operand), u.span))
        }
        ast::UnaryOpKind::USub => {
            expect_type(&operand, &HType::Int)?;
            Ok(HExpr::UnaryMinus(Box::new(operand), u.span))
        }
    }
}

fn elaborate_bin_op(b: &ast::BinOpExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    let left = elaborate_expr(&b.left, ec)?;
    let right = elaborate_expr(&b.right, ec)?;
    if b.op == ast::BinOpKind::Add {
        let lty = left.ty();
        if lty != right.ty() {
            return Err(CompilationError::TypeMismatch {
                span: b.span,
                expected: lty.describe(),
                found: right.ty().describe(),
                notes: vec![],
            });
        }
        return match &lty {
            HType::Int => Ok(HExpr::IntBinOp { left: Box::new(left), op: IntBinOpKind::Add, right: Box::new(right), span: b.span }),
            HType::List(elem) => {
                let elem_type = (**elem).clone();
                Ok(HExpr::ListConcat { elem_type, left: Box::new(left), right: Box::new(right), span: b.span })
            }
            other => Err(CompilationError::TypeMismatch {
                span: b.span,
                expected: "Int or List[T]".to_string(),
                found: other.describe(),
                notes: vec![],
            }),
        };
    }
    expect_type(&left, &HType::Int)?;
    expect_type(&right, &HType::Int)?;
    let op = match b.op {
        ast::BinOpKind::Sub => IntBinOpKind::Sub,
        ast::BinOpKind::Mult => IntBinOpKind::Mul,
        ast::BinOpKind::FloorDiv => IntBinOpKind::FloorDiv,
        ast::BinOpKind::Mod => IntBinOpKind::Mod,
        ast::BinOpKind::Add => unreachable!(),
    };
    Ok(HExpr::IntBinOp { left: Box::new(left), op, right: Box::new(right), span: b.span })
}

/// Dispatches a call expression to whichever builtin it syntactically
/// matches (spec §4.2: "Built-in recognition is syntactic"), or elaborates
/// it as an ordinary function call / custom-class construction.
fn elaborate_call(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if !c.keywords.is_empty() {
        return Err(unsupported(c.span, "keyword arguments are not supported"));
    }
    if let ast::Expr::Call(inner) = c.func.as_ref() {
        if let ast::Expr::Name(inner_callee) = inner.func.as_ref() {
            if inner_callee.id.as_str() == "match" {
                return elaborate_match_application(inner, c, ec);
            }
        }
    }
    if let ast::Expr::Name(callee) = c.func.as_ref() {
        match callee.id.as_str() {
            "Type" => return elaborate_type_ctor_call(c, ec),
            "empty_list" => return elaborate_empty_container(c, ec, false),
            "empty_set" => return elaborate_empty_container(c, ec, true),
            "sum" => return elaborate_reduce(c, ec, ReduceKind::Sum),
            "all" => return elaborate_reduce(c, ec, ReduceKind::All),
            "any" => return elaborate_reduce(c, ec, ReduceKind::Any),
            "match" => return elaborate_match(c, ec),
            _ => {}
        }
        if let Some((_, entry)) = ec.ctx.lookup(ec.scope, Table::Type, callee.id).cloned_entry() {
            return elaborate_custom_construct(c, ec, entry);
        }
    }
    if let ast::Expr::Attribute(attr) = c.func.as_ref() {
        if let ast::Expr::Name(base) = attr.value.as_ref() {
            if base.id.as_str() == "Type" {
                return elaborate_type_static_method(attr.attr, c, ec);
            }
        }
        // `Cls.method(...)` on an arbitrary TypeRef-typed expression is a
        // template-member access (spec §4.2's `Type.template_member`).
        return elaborate_template_member_call(attr, c, ec);
    }
    let callee = elaborate_expr(&c.func, ec)?;
    let (args_expected, ret, may_throw) = match callee.ty() {
        HType::Function { args, ret } => (args, *ret, true),
        other => {
            return Err(CompilationError::NotCallable { span: c.span, found: other.describe(), notes: vec![] });
        }
    };
    if args_expected.len() != c.args.len() {
        return Err(CompilationError::WrongArity {
            span: c.span,
            expected: args_expected.len(),
            found: c.args.len(),
            what: "function call".to_string(),
            notes: vec![],
        });
    }
    let mut args = Vec::with_capacity(c.args.len());
    for (a, expected) in c.args.iter().zip(args_expected.iter()) {
        let h = elaborate_expr(a, ec)?;
        if &h.ty() != expected {
            return Err(CompilationError::TypeMismatch {
                span: a.span(),
                expected: expected.describe(),
                found: h.ty().describe(),
                notes: vec![],
            });
        }
        args.push(h);
    }
    Ok(HExpr::Call { callee: Box::new(callee), args, ret_type: ret, may_throw, span: c.span })
}

/// Tiny helper trait so `lookup(...).cloned_entry()` reads naturally above
/// without borrowing `ec.ctx` across the match arm.
trait ClonedEntry {
    fn cloned_entry(self) -> Option<(usize, crate::scope::SymbolEntry)>;
}
impl ClonedEntry for Option<(usize, &crate::scope::SymbolEntry)> {
    fn cloned_entry(self) -> Option<(usize, crate::scope::SymbolEntry)> {
        self.map(|(id, e)| (id, e.clone()))
    }
}

fn elaborate_type_ctor_call(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if c.args.len() != 1 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 1, found: c.args.len(), what: "Type(...)".to_string(), notes: vec![] });
    }
    let arg = &c.args[0];
    let text = match arg {
        ast::Expr::Str(s) => s.value.clone(),
        _ => return Err(unsupported(arg.span(), "Type(...) requires a string literal argument")),
    };
    if !is_valid_atomic_cpp_type(&text) {
        return Err(CompilationError::InvalidAtomicType { span: arg.span(), text, notes: vec![] });
    }
    Ok(HExpr::AtomicTypeLiteral(text, c.span))
}

fn elaborate_empty_container(c: &ast::CallExpr, ec: &mut ExprCtx<'_>, is_set: bool) -> Result<HExpr> {
    if c.args.len() != 1 {
        let what = if is_set { "empty_set(T)" } else { "empty_list(T)" };
        return Err(CompilationError::WrongArity { span: c.span, expected: 1, found: c.args.len(), what: what.to_string(), notes: vec![] });
    }
    let elem = elaborate_expr(&c.args[0], ec)?;
    expect_type(&elem, &HType::TypeRef)?;
    // `T` here names an IR-high element type via a TypeRef-valued expression;
    // the resulting container's *own* element HType is resolved by the
    // caller's assignment/return-type context upstream of this function in
    // the original, but for a standalone expression we fall back to TypeRef
    // itself (any concrete class/Bool/Int is represented as TypeRef at the
    // expression level until annotated).
    if is_set {
        Ok(HExpr::SetLiteral { elem_type: HType::TypeRef, elems: vec![], span: c.span })
    } else {
        Ok(HExpr::ListLiteral { elem_type: HType::TypeRef, elems: vec![], span: c.span })
    }
}

/// `sum()`/`all()`/`any()` over a `List[T]` or `Set[T]` (`T` fixed by
/// `kind`: `Int` for `sum`, `Bool` for `all`/`any`).
///
/// The original elaborator for this builtin (`int_iterable_sum_expr_ast_to_ir3`
/// and its `bool_iterable_*` siblings) re-looks-up the argument's symbol
/// purely to attach a "defined here" note to the type-mismatch error, then
/// asserts the re-looked-up symbol is not only-partially-defined — on the
/// theory that a partial reference would already have failed elaboration
/// before reaching this function. `elaborate_name` enforces that same
/// invariant centrally (every `Name` elaborates through it, partial or not),
/// so the re-check here is structurally redundant by construction; it is
/// kept anyway; per spec's design notes: re-raise a structured internal
/// error if this ever fires rather than assert/panic, since a caller
/// embedding this compiler as a library should never see an unwind.
fn elaborate_reduce(c: &ast::CallExpr, ec: &mut ExprCtx<'_>, kind: ReduceKind) -> Result<HExpr> {
    if c.args.len() != 1 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 1, found: c.args.len(), what: "reduction".to_string(), notes: vec![] });
    }
    let iterable = elaborate_expr(&c.args[0], ec)?;
    if let HExpr::VarRef { name, .. } = &iterable {
        if let Some((_, entry)) = ec.ctx.lookup(ec.scope, Table::Value, *name) {
            if entry.is_only_partially_defined {
                return Err(CompilationError::InternalError {
                    span: c.args[0].span(),
                    detail: format!("reduction argument '{}' resolved to a partially-defined symbol past elaborate_name", name.as_str()),
                    notes: vec![],
                });
            }
        }
    }
    let elem_type = match iterable.ty() {
        HType::List(elem) | HType::Set(elem) => *elem,
        other => {
            return Err(CompilationError::TypeMismatch { span: c.args[0].span(), expected: "List[T] or Set[T]".to_string(), found: other.describe(), notes: vec![] });
        }
    };
    let expected_elem = match kind {
        ReduceKind::Sum => HType::Int,
        ReduceKind::All | ReduceKind::Any => HType::Bool,
    };
    if elem_type != expected_elem {
        return Err(CompilationError::TypeMismatch { span: c.args[0].span(), expected: format!("[{}]", expected_elem.describe()), found: format!("[{}]", elem_type.describe()), notes: vec![] });
    }
    Ok(HExpr::Reduce { kind, elem_type, iterable: Box::new(iterable), span: c.span })
}

fn elaborate_type_static_method(method: Symbol, c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    match method.as_str() {
        "pointer" => elaborate_type_unary(c, ec, TypeCtorKind::Pointer),
        "reference" => elaborate_type_unary(c, ec, TypeCtorKind::Reference),
        "rvalue_reference" => elaborate_type_unary(c, ec, TypeCtorKind::RvalueReference),
        "const" => elaborate_type_unary(c, ec, TypeCtorKind::Const),
        "array" => elaborate_type_unary(c, ec, TypeCtorKind::Array),
        "function" => elaborate_type_function(c, ec),
        "template_instantiation" => elaborate_template_instantiation(c, ec),
        "template_member" => elaborate_template_member(c, ec),
        other => Err(CompilationError::UnsupportedBuiltinUsage {
            span: c.span,
            detail: format!("Type.{other} is not a recognized built-in"),
            notes: vec![],
        }),
    }
}

fn elaborate_type_unary(c: &ast::CallExpr, ec: &mut ExprCtx<'_>, kind: TypeCtorKind) -> Result<HExpr> {
    if c.args.len() != 1 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 1, found: c.args.len(), what: "Type.*(...)".to_string(), notes: vec![] });
    }
    let operand = elaborate_expr(&c.args[0], ec)?;
    expect_type(&operand, &HType::TypeRef)?;
    Ok(HExpr::TypeCtor { kind, operand: Box::new(operand), span: c.span })
}

fn elaborate_type_function(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if c.args.len() != 2 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 2, found: c.args.len(), what: "Type.function(ret, args)".to_string(), notes: vec![] });
    }
    let ret = elaborate_expr(&c.args[0], ec)?;
    expect_type(&ret, &HType::TypeRef)?;
    let args_list = match &c.args[1] {
        ast::Expr::List(l) => l,
        _ => return Err(unsupported(c.args[1].span(), "Type.function's second argument must be a list literal")),
    };
    let mut args = Vec::with_capacity(args_list.elts.len());
    for a in &args_list.elts {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        args.push(h);
    }
    Ok(HExpr::FunctionTypeCtor { ret: Box::new(ret), args, span: c.span })
}

fn elaborate_template_instantiation(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if c.args.len() != 2 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 2, found: c.args.len(), what: "Type.template_instantiation(name, args)".to_string(), notes: vec![] });
    }
    let name = match &c.args[0] {
        ast::Expr::Str(s) => s.value.clone(),
        _ => return Err(unsupported(c.args[0].span(), "template_instantiation's first argument must be a string literal")),
    };
    if !is_valid_atomic_cpp_type(&name) {
        return Err(CompilationError::InvalidAtomicType { span: c.args[0].span(), text: name, notes: vec![] });
    }
    let args_list = match &c.args[1] {
        ast::Expr::List(l) => l,
        _ => return Err(unsupported(c.args[1].span(), "template_instantiation's second argument must be a list literal")),
    };
    let mut args = Vec::with_capacity(args_list.elts.len());
    for a in &args_list.elts {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        args.push(h);
    }
    Ok(HExpr::TemplateInstantiation { name, args, span: c.span })
}

fn elaborate_template_member(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if c.args.len() != 3 {
        return Err(CompilationError::WrongArity { span: c.span, expected: 3, found: c.args.len(), what: "Type.template_member(cls, name, args)".to_string(), notes: vec![] });
    }
    if ec.in_match_pattern {
        return Err(unsupported(c.span, "Type.template_member is not allowed inside a match pattern"));
    }
    let class = elaborate_expr(&c.args[0], ec)?;
    expect_type(&class, &HType::TypeRef)?;
    let member = match &c.args[1] {
        ast::Expr::Str(s) => {
            if !s.value.chars().next().is_some_and(|c0| c0.is_ascii_alphabetic() || c0 == '_')
                || !s.value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            {
                return Err(CompilationError::InvalidAtomicType { span: c.args[1].span(), text: s.value.clone(), notes: vec![] });
            }
            Symbol::intern(&s.value)
        }
        _ => return Err(unsupported(c.args[1].span(), "template_member's second argument must be a string literal")),
    };
    let args_list = match &c.args[2] {
        ast::Expr::List(l) => l,
        _ => return Err(unsupported(c.args[2].span(), "template_member's third argument must be a list literal")),
    };
    let mut args = Vec::with_capacity(args_list.elts.len());
    for a in &args_list.elts {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        args.push(h);
    }
    Ok(HExpr::TemplateMemberAccess { class: Box::new(class), member, args, span: c.span })
}

fn elaborate_template_member_call(attr: &ast::AttributeExpr, c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    let class = elaborate_expr(&attr.value, ec)?;
    expect_type(&class, &HType::TypeRef)?;
    let mut args = Vec::with_capacity(c.args.len());
    for a in &c.args {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        args.push(h);
    }
    Ok(HExpr::TemplateMemberAccess { class: Box::new(class), member: attr.attr, args, span: c.span })
}

fn elaborate_custom_construct(c: &ast::CallExpr, ec: &mut ExprCtx<'_>, class_entry: crate::scope::SymbolEntry) -> Result<HExpr> {
    let ty = class_entry.ty.clone();
    let fields = match &ty {
        HType::Custom(cls) => cls.fields.clone(),
        _ => return Err(CompilationError::NotCallable { span: c.span, found: ty.describe(), notes: vec![] }),
    };
    if fields.len() != c.args.len() {
        return Err(CompilationError::WrongArity {
            span: c.span,
            expected: fields.len(),
            found: c.args.len(),
            what: "class constructor".to_string(),
            notes: vec![],
        });
    }
    let mut args = Vec::with_capacity(c.args.len());
    for (a, (_, field_ty)) in c.args.iter().zip(fields.iter()) {
        let h = elaborate_expr(a, ec)?;
        if &h.ty() != field_ty {
            return Err(CompilationError::TypeMismatch { span: a.span(), expected: field_ty.describe(), found: h.ty().describe(), notes: vec![] });
        }
        args.push(h);
    }
    Ok(HExpr::CustomConstruct { ty, args, span: c.span })
}

/// Elaborates `match(e1, ..., en)(lambda v1, ..., vk: {patterns: result, ...})`
/// (spec §4.2, the semantic core of the expression elaborator).
fn elaborate_match(c: &ast::CallExpr, ec: &mut ExprCtx<'_>) -> Result<HExpr> {
    if ec.in_match_pattern {
        return Err(unsupported(c.span, "match(...) is not allowed inside a match pattern"));
    }
    if c.args.is_empty() {
        return Err(CompilationError::WrongArity { span: c.span, expected: 1, found: 0, what: "match(...)".to_string(), notes: vec![] });
    }
    let mut subjects = Vec::with_capacity(c.args.len());
    for a in &c.args {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        subjects.push(h);
    }
    // `match(...)` is itself called: the surface grammar is
    // `match(e1,...)(lambda ...: {...})`, which our AST shape models as the
    // callee of this call being itself a call to `match`; i.e. this
    // function is invoked when `c.func` resolves to the name `match`, and
    // the lambda lives as `c`'s own enclosing call's sole argument. Since
    // tmppy-ast's `CallExpr` cannot directly represent `f(...)(...)`
    // (two chained calls), the parser is expected to deliver that shape as
    // nested `CallExpr`s; this function handles the inner `match(...)` call
    // and expects to be re-invoked, by the caller of `elaborate_expr`, on
    // the outer call with `c.func` being this inner match call and `c.args`
    // holding exactly the lambda. We detect that shape here directly.
    Err(unsupported(
        c.span,
        "match(...) must be immediately applied to a single lambda: match(e1, ...)(lambda v1, ...: {...})",
    ))
}

/// The actual entry point for a fully-applied match expression
/// `match(subjects)(lambda)`, invoked by [`elaborate_call`] when it detects
/// the outer-call shape (callee is itself a `match(...)` call).
pub fn elaborate_match_application(
    inner: &ast::CallExpr,
    outer: &ast::CallExpr,
    ec: &mut ExprCtx<'_>,
) -> Result<HExpr> {
    if outer.args.len() != 1 {
        return Err(CompilationError::WrongArity { span: outer.span, expected: 1, found: outer.args.len(), what: "match(...)(...)".to_string(), notes: vec![] });
    }
    let lambda = match &outer.args[0] {
        ast::Expr::Lambda(l) => l,
        _ => return Err(unsupported(outer.args[0].span(), "match(...) must be applied to a lambda literal")),
    };
    if inner.args.is_empty() {
        return Err(CompilationError::WrongArity { span: inner.span, expected: 1, found: 0, what: "match(...)".to_string(), notes: vec![] });
    }
    let mut subjects = Vec::with_capacity(inner.args.len());
    for a in &inner.args {
        let h = elaborate_expr(a, ec)?;
        expect_type(&h, &HType::TypeRef)?;
        subjects.push(h);
    }
    let n = subjects.len();
    let params = lambda.params.clone();
    let dict = match lambda.body.as_ref() {
        ast::Expr::Dict(d) => d,
        _ => return Err(unsupported(lambda.span, "match(...)'s lambda body must be a dict literal of patterns")),
    };
    if dict.keys.is_empty() {
        return Err(CompilationError::MatchShape { span: lambda.span, detail: "match(...) requires at least one branch".to_string(), notes: vec![] });
    }
    let mut branches = Vec::with_capacity(dict.keys.len());
    let mut result_type: Option<HType> = None;
    let mut seen_main_definition = false;
    let mut param_used_somewhere = vec![false; params.len()];

    for (key, result_expr) in dict.keys.iter().zip(dict.values.iter()) {
        let pattern_exprs: Vec<&ast::Expr> = match key {
            ast::Expr::Tuple(t) if n > 1 => t.elts.iter().collect(),
            other if n == 1 => vec![other],
            other => {
                return Err(CompilationError::MatchShape {
                    span: other.span(),
                    detail: format!("expected a {n}-tuple pattern key"),
                    notes: vec![],
                });
            }
        };
        if pattern_exprs.len() != n {
            return Err(CompilationError::WrongArity { span: key.span(), expected: n, found: pattern_exprs.len(), what: "match pattern".to_string(), notes: vec![] });
        }

        let mut used_in_branch: Vec<Symbol> = Vec::new();
        let mut is_main = true;
        let mut patterns = Vec::with_capacity(n);
        for pexpr in &pattern_exprs {
            if let ast::Expr::Name(name) = pexpr {
                if let Some(idx) = params.iter().position(|p| *p == name.id) {
                    if !used_in_branch.contains(&name.id) {
                        used_in_branch.push(name.id);
                        param_used_somewhere[idx] = true;
                    }
                    patterns.push(HExpr::VarRef {
                        name: name.id,
                        ty: HType::TypeRef,
                        is_global_function: false,
                        may_throw: false,
                        span: name.span,
                    });
                    continue;
                }
            }
            is_main = false;
            let mut pattern_ec = ExprCtx { ctx: ec.ctx, scope: ec.scope, in_match_pattern: true };
            let h = elaborate_expr(pexpr, &mut pattern_ec)?;
            expect_type(&h, &HType::TypeRef)?;
            patterns.push(h);
        }

        if is_main {
            if seen_main_definition {
                return Err(CompilationError::MatchShape {
                    span: key.span(),
                    detail: "at most one match branch may be a main definition (all-bare-variable pattern)".to_string(),
                    notes: vec![],
                });
            }
            seen_main_definition = true;
        }

        // The result is elaborated in a child scope where only this
        // branch's used parameters are bound, so a reference to an unused
        // parameter is caught as an ordinary undefined-name error.
        let branch_scope = ec.ctx.child_scope(ec.scope, None);
        for p in &used_in_branch {
            ec.ctx.add(branch_scope, Table::Value, *p, HType::TypeRef, result_expr.span(), false, false)?;
        }
        let mut branch_ec = ExprCtx { ctx: ec.ctx, scope: branch_scope, in_match_pattern: false };
        let result_h = elaborate_expr(result_expr, &mut branch_ec)?;
        let rty = result_h.ty();
        match &result_type {
            None => result_type = Some(rty),
            Some(expected) if *expected == rty => {}
            Some(expected) => {
                return Err(CompilationError::TypeMismatch {
                    span: result_expr.span(),
                    expected: expected.describe(),
                    found: rty.describe(),
                    notes: vec![],
                });
            }
        }

        branches.push(MatchBranch {
            patterns,
            result: result_h,
            used_params: used_in_branch,
            is_main_definition: is_main,
            span: key.span(),
        });
    }

    if let Some(idx) = param_used_somewhere.iter().position(|used| !used) {
        return Err(CompilationError::MatchShape {
            span: lambda.span,
            detail: format!("the lambda argument {} was not used in any pattern", params[idx].as_str()),
            notes: vec![],
        });
    }

    Ok(HExpr::Match {
        subjects,
        params,
        branches,
        result_type: result_type.expect("checked non-empty above"),
        span: outer.span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_asymmetry_allows_outer_set_but_not_nested() {
        assert!(supports_equality(&HType::set_of(HType::Int)));
        assert!(!supports_equality(&HType::list_of(HType::set_of(HType::Int))));
        assert!(!supports_equality(&HType::set_of(HType::set_of(HType::Int))));
    }

    #[test]
    fn atomic_type_name_grammar() {
        assert!(is_valid_atomic_cpp_type("Foo"));
        assert!(is_valid_atomic_cpp_type("std::vector"));
        assert!(!is_valid_atomic_cpp_type("3Foo"));
        assert!(!is_valid_atomic_cpp_type("std::"));
        assert!(!is_valid_atomic_cpp_type(""));
    }

    #[test]
    fn integer_literal_range_is_asymmetric() {
        let span = tmppy_util::Span::DUMMY;
        assert!(elaborate_num(&ast::NumExpr { value: i64::MIN as i128, span }).is_err());
        assert!(elaborate_num(&ast::NumExpr { value: i64::MAX as i128, span }).is_ok());
        assert!(elaborate_num(&ast::NumExpr { value: -(i64::MAX as i128), span }).is_ok());
    }

    fn type_call(name: &str) -> ast::Expr {
        let span = tmppy_util::Span::DUMMY;
        ast::Expr::Call(ast::CallExpr {
            func: Box::new(ast::Expr::Name(ast::NameExpr { id: Symbol::intern("Type"), span })),
            args: vec![ast::Expr::Str(ast::StrExpr { value: name.to_string(), span })],
            keywords: vec![],
            span,
        })
    }

    fn match_application(subject: ast::Expr, params: Vec<&str>, key: ast::Expr, result: ast::Expr) -> (ast::CallExpr, ast::CallExpr) {
        let span = tmppy_util::Span::DUMMY;
        let inner = ast::CallExpr {
            func: Box::new(ast::Expr::Name(ast::NameExpr { id: Symbol::intern("match"), span })),
            args: vec![subject],
            keywords: vec![],
            span,
        };
        let lambda = ast::Expr::Lambda(ast::LambdaExpr {
            params: params.into_iter().map(Symbol::intern).collect(),
            body: Box::new(ast::Expr::Dict(ast::DictExpr { keys: vec![key], values: vec![result], span })),
            span,
        });
        let outer = ast::CallExpr { func: Box::new(ast::Expr::Call(inner.clone())), args: vec![lambda], keywords: vec![], span };
        (inner, outer)
    }

    /// Spec §8 scenario 5: `match(T)(lambda a, b: {T: 1})` — neither lambda
    /// parameter appears in the (single, non-bare) pattern, so both are
    /// unused; this must be rejected rather than silently dropping `b`.
    #[test]
    fn match_with_an_unused_lambda_parameter_is_rejected() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let (inner, outer) = match_application(type_call("int"), vec!["a", "b"], type_call("int"), ast::Expr::Num(ast::NumExpr { value: 1, span: tmppy_util::Span::DUMMY }));
        let mut ec = ExprCtx { ctx: &mut ctx, scope: root, in_match_pattern: false };
        let err = elaborate_match_application(&inner, &outer, &mut ec);
        assert!(matches!(err, Err(CompilationError::MatchShape { .. })), "expected a MatchShape error, got {err:?}");
    }

    /// A match whose single branch's pattern is a bare lambda parameter is
    /// the "main definition"; a second all-bare-variable branch is rejected.
    #[test]
    fn match_with_two_main_definitions_is_rejected() {
        let span = tmppy_util::Span::DUMMY;
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let subject = type_call("int");
        let inner = ast::CallExpr {
            func: Box::new(ast::Expr::Name(ast::NameExpr { id: Symbol::intern("match"), span })),
            args: vec![subject],
            keywords: vec![],
            span,
        };
        let a = Symbol::intern("a");
        let dict = ast::DictExpr {
            keys: vec![ast::Expr::Name(ast::NameExpr { id: a, span }), ast::Expr::Name(ast::NameExpr { id: a, span })],
            values: vec![type_call("int"), type_call("bool")],
            span,
        };
        let lambda = ast::Expr::Lambda(ast::LambdaExpr { params: vec![a], body: Box::new(ast::Expr::Dict(dict)), span });
        let outer = ast::CallExpr { func: Box::new(ast::Expr::Call(inner.clone())), args: vec![lambda], keywords: vec![], span };
        let mut ec = ExprCtx { ctx: &mut ctx, scope: root, in_match_pattern: false };
        let err = elaborate_match_application(&inner, &outer, &mut ec);
        assert!(matches!(err, Err(CompilationError::MatchShape { .. })), "expected a MatchShape error, got {err:?}");
    }
}
