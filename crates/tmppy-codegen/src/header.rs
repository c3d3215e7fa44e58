//! Top-level header emission (spec §4.7): assembles the `#include`s,
//! forward declarations, template definitions, and toplevel content into
//! the final C++ source text. Reproduced from `ir0_to_cpp.py`'s
//! `header_to_cpp`/`toplevel_elem_to_cpp`.

use crate::body::{static_assert_elem_to_cpp, template_defn_to_cpp, template_defn_to_cpp_forward_decl};
use crate::error::{CodegenError, Result};
use crate::expr::expr_to_cpp;
use crate::types::type_expr_to_cpp;
use crate::writer::{ToplevelWriter, Writer};
use tmppy_lir::{Header, IdentifierGenerator, LType, ToplevelElement};

fn toplevel_elem_to_cpp(elem: &ToplevelElement, writer: &mut dyn Writer) -> Result<()> {
    match elem {
        ToplevelElement::StaticAssert { expr, message } => static_assert_elem_to_cpp(expr, message, &[], writer),
        ToplevelElement::ConstantDef { name, expr } => {
            let type_cpp = match expr.ty() {
                LType::Bool => "bool",
                LType::Int64 => "int64_t",
                other => return Err(CodegenError::Internal(format!("a toplevel constant must be Bool or Int64, got {other:?}"))),
            };
            let cpp_expr = expr_to_cpp(expr, &[], writer)?;
            writer.write_toplevel_elem(format!("static constexpr {type_cpp} {name} = {cpp_expr};\n"));
            Ok(())
        }
        ToplevelElement::Typedef { name, expr } => {
            let cpp_expr = type_expr_to_cpp(expr, &[], writer)?;
            writer.write_toplevel_elem(format!("using {name} = {cpp_expr};\n"));
            Ok(())
        }
    }
}

/// Emits the complete C++17 header text for `header`. `emit_preamble`
/// controls whether the `#include <tmppy/tmppy.h>` / `#include
/// <type_traits>` lines are written — a driver assembling several
/// generated fragments into one file may want to emit the preamble once
/// (spec §6: the companion runtime header supplies `AlwaysTrueFrom*`/
/// `Select1st*`).
pub fn header_to_cpp(header: &Header, ids: &mut IdentifierGenerator, emit_preamble: bool) -> Result<String> {
    let span = tracing::info_span!("emit_header", templates = header.template_defns.len());
    let _enter = span.enter();

    let mut writer = ToplevelWriter::new(ids);

    if emit_preamble {
        writer.write_toplevel_elem("#include <tmppy/tmppy.h>\n#include <type_traits>\n\n".to_string());
    }

    for defn in &header.template_defns {
        template_defn_to_cpp_forward_decl(defn, &mut writer);
    }
    for defn in &header.template_defns {
        template_defn_to_cpp(defn, &[], &mut writer)?;
    }
    for elem in &header.toplevel_content {
        toplevel_elem_to_cpp(elem, &mut writer)?;
    }

    Ok(writer.strings.join(""))
}
