//! Expression and template-instantiation emission (spec §4.7/§4.8).
//! Reproduced from `ir0_to_cpp.py`'s `expr_to_cpp`, `*_expr_to_cpp`,
//! `template_instantiation_to_cpp` and `class_member_access_to_cpp`.

use crate::defer::guard_instantiation_args;
use crate::error::{CodegenError, Result};
use crate::types::type_expr_to_cpp;
use crate::writer::{ExprWriter, Writer};
use tmppy_lir::{LExpr, LType, Literal, TemplateArgDecl};

pub fn expr_to_cpp(expr: &LExpr, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<String> {
    match expr {
        LExpr::Literal(lit) => Ok(literal_to_cpp(*lit)),
        LExpr::Comparison { lhs, op, rhs } => Ok(format!(
            "({}) {} ({})",
            expr_to_cpp(lhs, enclosing_args, writer)?,
            op.as_cpp_str(),
            expr_to_cpp(rhs, enclosing_args, writer)?
        )),
        LExpr::Not(inner) => Ok(format!("!({})", expr_to_cpp(inner, enclosing_args, writer)?)),
        LExpr::UnaryMinus(inner) => Ok(format!("-({})", expr_to_cpp(inner, enclosing_args, writer)?)),
        LExpr::Int64BinOp { lhs, op, rhs } => Ok(format!(
            "({}) {} ({})",
            expr_to_cpp(lhs, enclosing_args, writer)?,
            op.as_cpp_str(),
            expr_to_cpp(rhs, enclosing_args, writer)?
        )),
        _ => {
            let mut expr_writer = ExprWriter::new(writer);
            type_expr_to_cpp(expr, enclosing_args, &mut expr_writer)
        }
    }
}

fn literal_to_cpp(lit: Literal) -> String {
    match lit {
        Literal::Bool(true) => "true".to_string(),
        Literal::Bool(false) => "false".to_string(),
        Literal::Int64(v) => format!("{v}LL"),
    }
}

/// `instantiation_expr` must be `LExpr::TemplateInstantiation`.
pub fn template_instantiation_to_cpp(instantiation_expr: &LExpr, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<String> {
    template_instantiation_to_cpp_impl(instantiation_expr, enclosing_args, writer, false)
}

fn template_instantiation_to_cpp_impl(
    instantiation_expr: &LExpr,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
    omit_typename: bool,
) -> Result<String> {
    let LExpr::TemplateInstantiation { template, args, instantiation_might_trigger_static_assert } = instantiation_expr else {
        return Err(CodegenError::Internal("template_instantiation_to_cpp called with a non-TemplateInstantiation expression".to_string()));
    };

    let args = guard_instantiation_args(args.clone(), *instantiation_might_trigger_static_assert, enclosing_args, writer)?;

    let mut rendered_args = Vec::with_capacity(args.len());
    for a in &args {
        rendered_args.push(expr_to_cpp(a, enclosing_args, writer)?);
    }
    let template_params = rendered_args.join(", ");

    let cpp_fun = match template.as_ref() {
        LExpr::ClassMemberAccess { .. } => {
            class_member_access_to_cpp(template, enclosing_args, writer, omit_typename, true)?
        }
        _ => expr_to_cpp(template, enclosing_args, writer)?,
    };

    Ok(format!("{cpp_fun}<{template_params}>"))
}

/// `expr` must be `LExpr::ClassMemberAccess`.
pub fn class_member_access_to_cpp(
    expr: &LExpr,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
    omit_typename: bool,
    parent_is_template_instantiation: bool,
) -> Result<String> {
    let LExpr::ClassMemberAccess { object, member_name, member_type } = expr else {
        return Err(CodegenError::Internal("class_member_access_to_cpp called with a non-ClassMemberAccess expression".to_string()));
    };

    let cpp_fun = match object.as_ref() {
        LExpr::TemplateInstantiation { .. } => template_instantiation_to_cpp_impl(object, enclosing_args, writer, true)?,
        LExpr::ClassMemberAccess { .. } => class_member_access_to_cpp(object, enclosing_args, writer, true, false)?,
        _ => expr_to_cpp(object, enclosing_args, writer)?,
    };

    match member_type {
        LType::Bool | LType::Int64 => Ok(format!("{cpp_fun}::{member_name}")),
        LType::Type | LType::Template(_) => {
            let maybe_typename = if omit_typename || (matches!(member_type, LType::Template(_)) && !parent_is_template_instantiation) {
                ""
            } else {
                "typename "
            };
            let maybe_template = if matches!(member_type, LType::Template(_)) { "template " } else { "" };
            Ok(format!("{maybe_typename}{cpp_fun}::{maybe_template}{member_name}"))
        }
        LType::Variadic => Err(CodegenError::Internal("a ClassMemberAccess's member_type is never Variadic".to_string())),
    }
}
