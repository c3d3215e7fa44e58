//! Emission of template-body elements and whole `TemplateDefn`s (spec
//! §4.7). Reproduced from `ir0_to_cpp.py`'s `constant_def_to_cpp`,
//! `typedef_to_cpp`, `template_specialization_to_cpp`, and
//! `template_defn_to_cpp`.

use crate::defer::static_assert_to_cpp;
use crate::error::{CodegenError, Result};
use crate::expr::{expr_to_cpp, template_instantiation_to_cpp};
use crate::types::{template_arg_decl_to_cpp, type_expr_to_cpp};
use crate::writer::Writer;
use tmppy_lir::{AtomicTypeLiteral, LExpr, LType, TemplateArgDecl, TemplateBodyElement, TemplateDefn, TemplateSpecialization};

pub fn static_assert_elem_to_cpp(expr: &LExpr, message: &str, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    static_assert_to_cpp(expr, message, enclosing_args, writer)
}

pub fn constant_def_to_cpp(elem: &TemplateBodyElement, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    let TemplateBodyElement::ConstantDef { name, expr } = elem else {
        return Err(CodegenError::Internal("constant_def_to_cpp called with a non-ConstantDef element".to_string()));
    };
    let type_cpp = match expr.ty() {
        LType::Bool => "bool",
        LType::Int64 => "int64_t",
        other => return Err(CodegenError::Internal(format!("a constant def's expression must be Bool or Int64, got {other:?}"))),
    };
    let cpp_expr = expr_to_cpp(expr, enclosing_args, writer)?;
    writer.write_template_body_elem(format!("static constexpr {type_cpp} {name} = {cpp_expr};\n"));
    Ok(())
}

pub fn typedef_to_cpp(elem: &TemplateBodyElement, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    let TemplateBodyElement::Typedef { name, expr } = elem else {
        return Err(CodegenError::Internal("typedef_to_cpp called with a non-Typedef element".to_string()));
    };
    match expr.ty() {
        LType::Type => {
            let cpp_expr = type_expr_to_cpp(expr, enclosing_args, writer)?;
            writer.write_template_body_elem(format!("using {name} = {cpp_expr};\n"));
        }
        LType::Template(arg_types) => {
            let template_args: Vec<TemplateArgDecl> =
                arg_types.iter().map(|ty| TemplateArgDecl { ty: ty.clone(), name: writer.new_id() }).collect();
            let template_args_decl = template_args.iter().map(template_arg_decl_to_cpp).collect::<Vec<_>>().join(", ");

            let instantiation_args = template_args
                .iter()
                .map(|a| LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local(a.name.clone(), a.ty.clone())))
                .collect();
            let instantiation = LExpr::TemplateInstantiation {
                template: Box::new(expr.clone()),
                args: instantiation_args,
                // Conservative: a fully general lowering pass would prove
                // some instantiations can never trigger, but that analysis
                // is out of scope (spec §4.8 only specifies the guard
                // mechanism, not when it can be proven unnecessary).
                instantiation_might_trigger_static_assert: true,
            };
            let cpp_expr = template_instantiation_to_cpp(&instantiation, enclosing_args, writer)?;

            writer.write_template_body_elem(format!("template <{template_args_decl}>\nusing {name} = {cpp_expr};\n"));
        }
        other => return Err(CodegenError::Internal(format!("a typedef's expression must be Type or Template, got {other:?}"))),
    }
    Ok(())
}

fn template_body_elem_to_cpp(elem: &TemplateBodyElement, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    match elem {
        TemplateBodyElement::StaticAssert { expr, message } => static_assert_elem_to_cpp(expr, message, enclosing_args, writer),
        TemplateBodyElement::ConstantDef { .. } => constant_def_to_cpp(elem, enclosing_args, writer),
        TemplateBodyElement::Typedef { .. } => typedef_to_cpp(elem, enclosing_args, writer),
        TemplateBodyElement::TemplateDefn(defn) => template_defn_to_cpp(defn, enclosing_args, writer),
    }
}

fn template_specialization_to_cpp(
    spec: &TemplateSpecialization,
    cxx_name: &str,
    enclosing_args: &[TemplateArgDecl],
    writer: &mut dyn Writer,
) -> Result<()> {
    let mut body_writer = writer.create_child_writer();
    for elem in &spec.body {
        template_body_elem_to_cpp(elem, &spec.args, &mut body_writer)?;
    }
    let body_str = body_writer.strings.join("");

    let template_args = spec.args.iter().map(template_arg_decl_to_cpp).collect::<Vec<_>>().join(", ");

    match &spec.patterns {
        Some(patterns) => {
            let mut rendered_patterns = Vec::with_capacity(patterns.len());
            for p in patterns {
                rendered_patterns.push(expr_to_cpp(p, enclosing_args, writer)?);
            }
            let patterns_str = rendered_patterns.join(", ");
            writer.write_template_body_elem(format!(
                "template <{template_args}>\nstruct {cxx_name}<{patterns_str}> {{\n{body_str}}};\n"
            ));
        }
        None => {
            writer.write_template_body_elem(format!("template <{template_args}>\nstruct {cxx_name} {{\n{body_str}}};\n"));
        }
    }
    Ok(())
}

pub fn template_defn_to_cpp_forward_decl(defn: &TemplateDefn, writer: &mut dyn Writer) {
    let template_args = defn.args.iter().map(template_arg_decl_to_cpp).collect::<Vec<_>>().join(", ");
    writer.write_toplevel_elem(format!("template <{template_args}>\nstruct {};\n", defn.name));
}

pub fn template_defn_to_cpp(defn: &TemplateDefn, enclosing_args: &[TemplateArgDecl], writer: &mut dyn Writer) -> Result<()> {
    if let Some(main) = &defn.main_definition {
        if !defn.description.is_empty() {
            writer.write_toplevel_elem(format!("// {}\n", defn.description));
        }
        template_specialization_to_cpp(main, &defn.name, enclosing_args, writer)?;
    }
    for spec in &defn.specializations {
        if !defn.description.is_empty() {
            writer.write_toplevel_elem(format!("// {}\n", defn.description));
        }
        template_specialization_to_cpp(spec, &defn.name, enclosing_args, writer)?;
    }
    Ok(())
}
