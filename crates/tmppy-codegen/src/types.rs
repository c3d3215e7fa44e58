//! Type-expression emission (spec §4.7): C++ declarators read "inside out",
//! so a type built from nested pointer/reference/array/function-type
//! wrappers can't be printed with simple top-down recursion — each layer
//! contributes a prefix (written before the inner expression) and a suffix
//! (written after it), and `FunctionTypeExpr`/array wrappers need to know
//! whether an enclosing modifier has already opened a `(...)` group around
//! them. Reproduced from `ir0_to_cpp.py`'s `type_expr_to_cpp_prefix_suffix`
//! family, with the prefix/suffix closures replaced by plain returned
//! strings (Rust borrows make capturing `writer` in a closure awkward for
//! no benefit here).

use crate::error::{CodegenError, Result};
use crate::expr::{class_member_access_to_cpp, template_instantiation_to_cpp};
use crate::writer::Writer;
use tmppy_lir::{LExpr, LType, TemplateArgDecl};

/// C++ declares a template value/type parameter differently per [`LType`]
/// kind (spec §4.7's mapping table).
pub fn type_to_template_param_declaration(ty: &LType) -> String {
    match ty {
        LType::Bool => "bool".to_string(),
        LType::Int64 => "int64_t".to_string(),
        LType::Type => "typename".to_string(),
        LType::Template(arg_types) => {
            let inner = arg_types.iter().map(type_to_template_param_declaration).collect::<Vec<_>>().join(", ");
            format!("template <{inner}> class")
        }
        LType::Variadic => "typename...".to_string(),
    }
}

pub fn template_arg_decl_to_cpp(arg: &TemplateArgDecl) -> String {
    format!("{} {}", type_to_template_param_declaration(&arg.ty), arg.name)
}

/// C++ can't express `int & &&` (or any double reference); the compiler's
/// own reference-collapsing rule folds such chains down to a single `&` if
/// either side was an lvalue reference, `&&` otherwise. The emitter applies
/// the same rule before printing rather than relying on it ever reaching a
/// real C++ compiler in an invalid intermediate form.
fn simplify_toplevel_references(mut expr: &LExpr) -> LExpr {
    let mut has_reference = false;
    loop {
        match expr {
            LExpr::ReferenceType(inner) => {
                has_reference = true;
                expr = inner;
            }
            LExpr::RvalueReferenceType(inner) => {
                expr = inner;
            }
            _ => break,
        }
    }
    if has_reference {
        LExpr::ReferenceType(Box::new(expr.clone()))
    } else {
        LExpr::RvalueReferenceType(Box::new(expr.clone()))
    }
}

/// Emits a complete type expression (a leaf consumer of the prefix/suffix
/// machinery — used wherever a type is printed standalone rather than as
/// part of a larger declarator, e.g. a `Typedef`'s right-hand side).
pub fn type_expr_to_cpp(expr: &LExpr, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<String> {
    let (prefix, suffix) = type_expr_to_cpp_prefix_suffix(expr, enclosing_args, writer, false)?;
    Ok(format!("{prefix}{suffix}"))
}

fn type_expr_to_cpp_prefix_suffix(
    expr: &LExpr,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
    has_modifiers: bool,
) -> Result<(String, String)> {
    let simplified;
    let expr = match expr {
        LExpr::ReferenceType(_) | LExpr::RvalueReferenceType(_) => {
            simplified = simplify_toplevel_references(expr);
            &simplified
        }
        _ => expr,
    };

    match expr {
        LExpr::FunctionType { return_type, arg_types } => {
            function_type_expr_to_cpp_prefix_suffix(return_type, arg_types, enclosing_args, writer, has_modifiers)
        }
        LExpr::PointerType(inner) => unary_modifier_prefix_suffix("*", inner, enclosing_args, writer),
        LExpr::ReferenceType(inner) => unary_modifier_prefix_suffix(" &", inner, enclosing_args, writer),
        LExpr::RvalueReferenceType(inner) => unary_modifier_prefix_suffix(" &&", inner, enclosing_args, writer),
        LExpr::ConstType(inner) => unary_modifier_prefix_suffix(" const ", inner, enclosing_args, writer),
        LExpr::ArrayType(inner) => unary_modifier_prefix_suffix("[]", inner, enclosing_args, writer),
        LExpr::AtomicTypeLiteral(lit) => Ok((lit.cpp_type.clone(), String::new())),
        LExpr::TemplateInstantiation { .. } => {
            Ok((template_instantiation_to_cpp(expr, enclosing_args, writer)?, String::new()))
        }
        LExpr::ClassMemberAccess { .. } => {
            Ok((class_member_access_to_cpp(expr, enclosing_args, writer, false, false)?, String::new()))
        }
        LExpr::VariadicTypeExpansion(inner) => {
            Ok((format!("{}...", type_expr_to_cpp(inner, enclosing_args, writer)?), String::new()))
        }
        other => Err(CodegenError::Internal(format!("not a type expression: {other:?}"))),
    }
}

/// C++'s inside-out function-pointer-type syntax. The worked examples from
/// spec §4.7:
///
/// ```text
/// X1 -> Y                          |  Y(*) (X1)
/// X2 -> (X1 -> Y)                  |  Y(*(*) (X2)) (X1)
/// ```
fn function_type_expr_to_cpp_prefix_suffix(
    return_type: &LExpr,
    arg_types: &[LExpr],
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
    has_modifiers: bool,
) -> Result<(String, String)> {
    let (ret_prefix, ret_suffix) = type_expr_to_cpp_prefix_suffix(return_type, enclosing_args, writer, false)?;

    let mut prefix = ret_prefix;
    if has_modifiers {
        prefix.push('(');
    }

    let mut suffix = String::new();
    if has_modifiers {
        suffix.push(')');
    }
    suffix.push_str(" (");
    for (i, arg) in arg_types.iter().enumerate() {
        if i != 0 {
            suffix.push_str(", ");
        }
        suffix.push_str(&type_expr_to_cpp(arg, enclosing_args, writer)?);
    }
    suffix.push(')');
    suffix.push_str(&ret_suffix);

    Ok((prefix, suffix))
}

fn unary_modifier_prefix_suffix(
    modifier: &str,
    sub_expr: &LExpr,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
) -> Result<(String, String)> {
    let (sub_prefix, sub_suffix) = type_expr_to_cpp_prefix_suffix(sub_expr, enclosing_args, writer, true)?;
    Ok((format!("{sub_prefix}{modifier}"), sub_suffix))
}
