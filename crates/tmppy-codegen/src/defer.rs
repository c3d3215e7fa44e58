//! Deferred evaluation (spec §4.8): the two hazards of printing C++
//! template metaprogramming code naively are (a) a `static_assert` that
//! only depends on already-known constants firing before the enclosing
//! template is ever instantiated, and (b) a `TemplateInstantiation` with
//! the same property triggering *its* static asserts early. Both are fixed
//! the same way — tie the otherwise-constant expression to one of the
//! enclosing template's own parameters, so the C++ compiler cannot
//! evaluate it until that template is instantiated with real arguments.
//! Reproduced from `ir0_to_cpp.py`'s `static_assert_to_cpp` and the guard
//! half of `template_instantiation_to_cpp`.

use crate::body::{constant_def_to_cpp, typedef_to_cpp};
use crate::error::{CodegenError, Result};
use crate::expr::expr_to_cpp;
use crate::types::type_to_template_param_declaration;
use crate::writer::Writer;
use std::collections::HashSet;
use tmppy_lir::{AtomicTypeLiteral, LExpr, LType, TemplateArgDecl, TemplateBodyElement};

/// Emits `static_assert(<expr>, "<message>");`, guarded by an
/// `AlwaysTrueFrom*` wrapper when `expr` mentions none of
/// `enclosing_args`'s bound names.
pub fn static_assert_to_cpp(expr: &LExpr, message: &str, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    let bound: HashSet<String> = enclosing_args.iter().map(|a| a.name.clone()).collect();
    let cpp_expr = expr_to_cpp(expr, enclosing_args, writer)?;

    if bound.is_empty() || expr.references_any_of(&bound) {
        writer.write_template_body_elem(format!("static_assert({cpp_expr}, \"{message}\");\n"));
        return Ok(());
    }

    for arg in enclosing_args {
        let wrapper = match arg.ty {
            LType::Bool => Some("AlwaysTrueFromBool"),
            LType::Int64 => Some("AlwaysTrueFromInt64"),
            LType::Type => Some("AlwaysTrueFromType"),
            _ => None,
        };
        if let Some(wrapper) = wrapper {
            let bound_var = &arg.name;
            writer.write_template_body_elem(format!(
                "static_assert({wrapper}<{bound_var}>::value && {cpp_expr}, \"{message}\");\n"
            ));
            return Ok(());
        }
    }

    // Every parameter is a template-template parameter; none of the
    // predefined `AlwaysTrueFrom*` wrappers apply, so define a fresh one
    // shaped for this specific template-template parameter.
    let always_true_id = writer.new_id();
    let template_param_decl = type_to_template_param_declaration(&enclosing_args[0].ty);
    let template_param = &enclosing_args[0].name;
    writer.write_template_body_elem(format!(
        "// Custom AlwaysTrueFor* template\n\
         template <{template_param_decl}>\n\
         struct {always_true_id} {{\n\
         \x20 static constexpr bool value = true;\n\
         }};\n\
         static_assert({always_true_id}<{template_param}>::value && {cpp_expr}, \"{message}\");\n"
    ));
    Ok(())
}

fn select_best_arg_decl_for_select1st(args: &[TemplateArgDecl]) -> &TemplateArgDecl {
    args.iter().find(|a| !a.ty.is_template()).unwrap_or(&args[0])
}

fn select_best_arg_index_for_select1st(args: &[LExpr]) -> usize {
    args.iter().position(|a| !a.ty().is_template()).unwrap_or(0)
}

/// The predefined `Select1stXY<first, second>` variant name for a
/// `(replaced-argument-kind, bound-parameter-kind)` pair, when neither side
/// is a template-template parameter. Spec §9's open question calls out that
/// a variadic-kind bound parameter reuses the `Type`-suffixed variant name
/// — asymmetrically so for the `Int64` row, matching the upstream
/// implementation exactly rather than "fixing" what looks like a
/// copy-paste slip there.
fn predefined_select1st_variant(replaced_kind: &LType, bound_kind: &LType) -> Option<&'static str> {
    use LType::*;
    Some(match (replaced_kind, bound_kind) {
        (Bool, Bool) => "Select1stBoolBool",
        (Bool, Int64) => "Select1stBoolInt64",
        (Bool, Type) => "Select1stBoolType",
        (Bool, Variadic) => "Select1stBoolType",
        (Int64, Bool) => "Select1stInt64Bool",
        (Int64, Int64) => "Select1stInt64Int64",
        (Int64, Type) => "Select1stInt64Type",
        (Int64, Variadic) => "Select1stInt64TypeType",
        (Type, Bool) => "Select1stTypeBool",
        (Type, Int64) => "Select1stTypeInt64",
        (Type, Type) => "Select1stTypeType",
        (Type, Variadic) => "Select1stTypeType",
        _ => return None,
    })
}

/// If `args` are all constant (none references an enclosing bound
/// parameter) and the instantiation might trigger a `static_assert`,
/// replaces one argument with `Select1stXY<original, bound_param>::value`
/// to tie the instantiation to the enclosing template. Returns the
/// (possibly rewritten) argument list.
pub fn guard_instantiation_args(
    args: Vec<LExpr>,
    might_trigger_static_assert: bool,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
) -> Result<Vec<LExpr>> {
    if !might_trigger_static_assert || enclosing_args.is_empty() {
        return Ok(args);
    }
    let bound: HashSet<String> = enclosing_args.iter().map(|a| a.name.clone()).collect();
    if args.iter().any(|a| a.references_any_of(&bound)) {
        return Ok(args);
    }

    let arg_decl = select_best_arg_decl_for_select1st(enclosing_args).clone();
    let arg_index = select_best_arg_index_for_select1st(&args);
    let arg_to_replace = args[arg_index].clone();
    let replaced_kind = arg_to_replace.ty();

    let select1st_variant = if !arg_decl.ty.is_template() && !replaced_kind.is_template() {
        predefined_select1st_variant(&replaced_kind, &arg_decl.ty)
            .ok_or_else(|| CodegenError::Internal("Bool/Int64/Type/Variadic should be exhaustive once neither side is a template".to_string()))?
            .to_string()
    } else {
        define_fresh_select1st_variant(&replaced_kind, &arg_decl.ty, enclosing_args, writer)?
    };

    let select1st_type = LType::Template(vec![replaced_kind.clone(), arg_decl.ty.clone()]);
    let select1st_instantiation = LExpr::TemplateInstantiation {
        template: Box::new(LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local(select1st_variant, select1st_type))),
        args: vec![
            arg_to_replace,
            LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local(arg_decl.name.clone(), arg_decl.ty.clone())),
        ],
        instantiation_might_trigger_static_assert: false,
    };
    let new_arg = LExpr::ClassMemberAccess {
        object: Box::new(select1st_instantiation),
        member_name: "value".to_string(),
        member_type: replaced_kind,
    };

    let mut args = args;
    args[arg_index] = new_arg;
    Ok(args)
}

fn define_fresh_select1st_variant(
    replaced_kind: &LType,
    bound_kind: &LType,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
) -> Result<String> {
    let select1st_variant = writer.new_id();
    let forwarded_param_id = writer.new_id();
    let template_param_decl1 = type_to_template_param_declaration(replaced_kind);
    let template_param_decl2 = type_to_template_param_declaration(bound_kind);

    let mut body_writer = writer.create_child_writer();
    match replaced_kind {
        LType::Bool | LType::Int64 => {
            let expr = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local(forwarded_param_id.clone(), replaced_kind.clone()));
            constant_def_to_cpp(&TemplateBodyElement::constant_def("value", expr), enclosing_args, &mut body_writer)?;
        }
        _ => {
            // A variadic-kind argument value can't arise here (spec §3.4
            // invariant: a `TemplateInstantiation`'s argument is always
            // `Type`-kinded even when it expands a pack), but fall back to
            // `Type` defensively rather than assume it's unreachable.
            let replaced_for_typedef = if matches!(replaced_kind, LType::Variadic) { LType::Type } else { replaced_kind.clone() };
            let expr = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local(forwarded_param_id.clone(), replaced_for_typedef));
            typedef_to_cpp(&TemplateBodyElement::typedef("value", expr), enclosing_args, &mut body_writer)?;
        }
    }
    let body_str = body_writer.strings.join("");

    writer.write_template_body_elem(format!(
        "// Custom Select1st* template\n\
         template <{template_param_decl1} {forwarded_param_id}, {template_param_decl2}>\n\
         struct {select1st_variant} {{\n\
         {body_str}\
         }};\n"
    ));

    Ok(select1st_variant)
}
