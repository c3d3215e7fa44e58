//! The IR-low rewrite framework (spec §3.5/§4.6): a generic visitor whose
//! writer contexts can inject fresh top-level definitions while rewriting a
//! tree. Reproduced from `_py2tmp/transform_ir0.py`'s `Writer`/
//! `ToplevelWriter`/`TemplateBodyWriter`/`Transformation` split, adapted to
//! Rust's ownership model: rather than a chain of `parent_writer` back
//! pointers resolved dynamically, a `TemplateBodyWriter` borrows its
//! enclosing `ToplevelWriter` directly, so "forward to the enclosing
//! writer" is an ordinary borrow rather than indirection through a trait
//! object.

use crate::lir::{
    AtomicTypeLiteral, Header, LExpr, LType, Literal, TemplateArgDecl, TemplateBodyElement,
    TemplateDefn, TemplateSpecialization, ToplevelElement,
};

/// The sequential state every writer in a compilation shares: a single
/// monotonic counter whose advancement order is the one piece of
/// cross-cutting mutable state in the whole pipeline (spec §5).
#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    prefix: String,
    next: u64,
}

impl IdentifierGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        IdentifierGenerator { prefix: prefix.into(), next: 0 }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        IdentifierGenerator::new("TmppyInternal_")
    }
}

/// Owns a header's template definitions and toplevel content as they're
/// (re)built, plus the shared identifier generator.
pub struct ToplevelWriter<'g> {
    ids: &'g mut IdentifierGenerator,
    pub template_defns: Vec<TemplateDefn>,
    pub toplevel_elems: Vec<ToplevelElement>,
}

impl<'g> ToplevelWriter<'g> {
    pub fn new(ids: &'g mut IdentifierGenerator) -> Self {
        ToplevelWriter { ids, template_defns: Vec::new(), toplevel_elems: Vec::new() }
    }

    pub fn new_id(&mut self) -> String {
        self.ids.next_id()
    }

    pub fn write_template_defn(&mut self, defn: TemplateDefn) {
        self.template_defns.push(defn);
    }

    pub fn write_toplevel(&mut self, elem: ToplevelElement) {
        self.toplevel_elems.push(elem);
    }

    /// Open a child writer collecting one template specialization's body,
    /// forwarding `new_id`/toplevel injection back up to this writer.
    pub fn child(&mut self) -> TemplateBodyWriter<'_, 'g> {
        TemplateBodyWriter { toplevel: self, elems: Vec::new() }
    }

    /// Allocate a fresh name, write it as a `ConstantDef` or `Typedef`
    /// (picked by `expr`'s kind) at the toplevel, and return an
    /// `AtomicTypeLiteral` referencing it.
    pub fn new_constant_or_typedef(&mut self, expr: LExpr) -> AtomicTypeLiteral {
        let id = self.new_id();
        let ty = expr.ty();
        match ty {
            LType::Bool | LType::Int64 => {
                self.write_toplevel(ToplevelElement::ConstantDef { name: id.clone(), expr })
            }
            LType::Type | LType::Template(_) => {
                self.write_toplevel(ToplevelElement::Typedef { name: id.clone(), expr })
            }
            LType::Variadic => unreachable!("a Variadic-kind expression cannot be named by a constant or typedef"),
        }
        AtomicTypeLiteral::for_local(id, ty)
    }
}

/// Collects one template specialization's body while a `Transformation`
/// rewrites it; forwards anything that doesn't belong in the body (a fresh
/// sibling `TemplateDefn`, a toplevel `StaticAssert`) to the enclosing
/// `ToplevelWriter`.
pub struct TemplateBodyWriter<'p, 'g> {
    toplevel: &'p mut ToplevelWriter<'g>,
    pub elems: Vec<TemplateBodyElement>,
}

impl<'p, 'g> TemplateBodyWriter<'p, 'g> {
    pub fn new_id(&mut self) -> String {
        self.toplevel.new_id()
    }

    pub fn write(&mut self, elem: TemplateBodyElement) {
        self.elems.push(elem);
    }

    pub fn write_toplevel(&mut self, elem: ToplevelElement) {
        self.toplevel.write_toplevel(elem);
    }

    pub fn get_toplevel(&mut self) -> &mut ToplevelWriter<'g> {
        self.toplevel
    }

    pub fn new_constant_or_typedef(&mut self, expr: LExpr) -> AtomicTypeLiteral {
        let id = self.new_id();
        let ty = expr.ty();
        match ty {
            LType::Bool | LType::Int64 => {
                self.write(TemplateBodyElement::ConstantDef { name: id.clone(), expr })
            }
            LType::Type | LType::Template(_) => {
                self.write(TemplateBodyElement::Typedef { name: id.clone(), expr })
            }
            LType::Variadic => unreachable!("a Variadic-kind expression cannot be named by a constant or typedef"),
        }
        AtomicTypeLiteral::for_local(id, ty)
    }
}

/// A structure-preserving rewrite over IR-low. The default method for every
/// node rebuilds a shallow copy with transformed children; a concrete
/// lowering or optimization pass overrides only the cases it changes,
/// exactly the idiom spec's Design Notes call for (one central dispatch per
/// consumer, not type tests scattered through the pass).
pub trait Transformation {
    fn transform_header(&mut self, header: &Header, ids: &mut IdentifierGenerator) -> Header {
        let mut writer = ToplevelWriter::new(ids);
        for defn in &header.template_defns {
            let new_defn = self.transform_template_defn(defn, &mut writer);
            writer.write_template_defn(new_defn);
        }
        for elem in &header.toplevel_content {
            self.transform_toplevel_elem(elem, &mut writer);
        }
        Header {
            template_defns: writer.template_defns,
            toplevel_content: writer.toplevel_elems,
            public_names: header.public_names.clone(),
        }
    }

    fn transform_toplevel_elem(&mut self, elem: &ToplevelElement, writer: &mut ToplevelWriter) {
        let rebuilt = match elem {
            ToplevelElement::StaticAssert { expr, message } => ToplevelElement::StaticAssert {
                expr: self.transform_expr(expr, writer),
                message: message.clone(),
            },
            ToplevelElement::ConstantDef { name, expr } => ToplevelElement::ConstantDef {
                name: name.clone(),
                expr: self.transform_expr(expr, writer),
            },
            ToplevelElement::Typedef { name, expr } => ToplevelElement::Typedef {
                name: name.clone(),
                expr: self.transform_expr(expr, writer),
            },
        };
        writer.write_toplevel(rebuilt);
    }

    fn transform_template_defn(&mut self, defn: &TemplateDefn, writer: &mut ToplevelWriter) -> TemplateDefn {
        TemplateDefn::new(
            defn.name.clone(),
            defn.args.iter().map(|a| self.transform_template_arg_decl(a)).collect(),
            defn.main_definition
                .as_ref()
                .map(|spec| self.transform_template_specialization(spec, writer)),
            defn.specializations
                .iter()
                .map(|spec| self.transform_template_specialization(spec, writer))
                .collect(),
            defn.description.clone(),
            defn.result_element_names.clone(),
        )
    }

    fn transform_template_arg_decl(&mut self, arg: &TemplateArgDecl) -> TemplateArgDecl {
        arg.clone()
    }

    fn transform_template_specialization(
        &mut self,
        spec: &TemplateSpecialization,
        writer: &mut ToplevelWriter,
    ) -> TemplateSpecialization {
        let patterns = spec
            .patterns
            .as_ref()
            .map(|ps| ps.iter().map(|p| self.transform_pattern(p, writer)).collect());

        let mut body_writer = writer.child();
        for elem in &spec.body {
            self.transform_template_body_elem(elem, &mut body_writer);
        }

        TemplateSpecialization {
            args: spec.args.iter().map(|a| self.transform_template_arg_decl(a)).collect(),
            patterns,
            body: body_writer.elems,
        }
    }

    fn transform_pattern(&mut self, expr: &LExpr, writer: &mut ToplevelWriter) -> LExpr {
        self.transform_expr(expr, writer)
    }

    fn transform_template_body_elem(&mut self, elem: &TemplateBodyElement, writer: &mut TemplateBodyWriter) {
        let rebuilt = match elem {
            TemplateBodyElement::StaticAssert { expr, message } => TemplateBodyElement::StaticAssert {
                expr: self.transform_expr(expr, writer.get_toplevel()),
                message: message.clone(),
            },
            TemplateBodyElement::ConstantDef { name, expr } => TemplateBodyElement::ConstantDef {
                name: name.clone(),
                expr: self.transform_expr(expr, writer.get_toplevel()),
            },
            TemplateBodyElement::Typedef { name, expr } => TemplateBodyElement::Typedef {
                name: name.clone(),
                expr: self.transform_expr(expr, writer.get_toplevel()),
            },
            TemplateBodyElement::TemplateDefn(defn) => {
                TemplateBodyElement::TemplateDefn(self.transform_template_defn(defn, writer.get_toplevel()))
            }
        };
        writer.write(rebuilt);
    }

    fn transform_expr(&mut self, expr: &LExpr, writer: &mut ToplevelWriter) -> LExpr {
        match expr {
            LExpr::Literal(lit) => self.transform_literal(*lit, writer),
            LExpr::AtomicTypeLiteral(lit) => self.transform_type_literal(lit, writer),
            LExpr::Not(e) => LExpr::Not(Box::new(self.transform_expr(e, writer))),
            LExpr::UnaryMinus(e) => LExpr::UnaryMinus(Box::new(self.transform_expr(e, writer))),
            LExpr::Comparison { lhs, op, rhs } => LExpr::Comparison {
                lhs: Box::new(self.transform_expr(lhs, writer)),
                op: *op,
                rhs: Box::new(self.transform_expr(rhs, writer)),
            },
            LExpr::Int64BinOp { lhs, op, rhs } => LExpr::Int64BinOp {
                lhs: Box::new(self.transform_expr(lhs, writer)),
                op: *op,
                rhs: Box::new(self.transform_expr(rhs, writer)),
            },
            LExpr::TemplateInstantiation { template, args, instantiation_might_trigger_static_assert } => {
                LExpr::TemplateInstantiation {
                    template: Box::new(self.transform_expr(template, writer)),
                    args: args.iter().map(|a| self.transform_expr(a, writer)).collect(),
                    instantiation_might_trigger_static_assert: *instantiation_might_trigger_static_assert,
                }
            }
            LExpr::ClassMemberAccess { object, member_name, member_type } => LExpr::ClassMemberAccess {
                object: Box::new(self.transform_expr(object, writer)),
                member_name: member_name.clone(),
                member_type: member_type.clone(),
            },
            LExpr::PointerType(e) => LExpr::PointerType(Box::new(self.transform_expr(e, writer))),
            LExpr::ReferenceType(e) => LExpr::ReferenceType(Box::new(self.transform_expr(e, writer))),
            LExpr::RvalueReferenceType(e) => LExpr::RvalueReferenceType(Box::new(self.transform_expr(e, writer))),
            LExpr::ConstType(e) => LExpr::ConstType(Box::new(self.transform_expr(e, writer))),
            LExpr::ArrayType(e) => LExpr::ArrayType(Box::new(self.transform_expr(e, writer))),
            LExpr::FunctionType { return_type, arg_types } => LExpr::FunctionType {
                return_type: Box::new(self.transform_expr(return_type, writer)),
                arg_types: arg_types.iter().map(|a| self.transform_expr(a, writer)).collect(),
            },
            LExpr::VariadicTypeExpansion(e) => LExpr::VariadicTypeExpansion(Box::new(self.transform_expr(e, writer))),
        }
    }

    fn transform_literal(&mut self, lit: Literal, _writer: &mut ToplevelWriter) -> LExpr {
        LExpr::Literal(lit)
    }

    fn transform_type_literal(&mut self, lit: &AtomicTypeLiteral, _writer: &mut ToplevelWriter) -> LExpr {
        LExpr::AtomicTypeLiteral(lit.clone())
    }
}

/// The no-op transformation: rebuilds a structurally identical `Header`.
/// Useful as a baseline in tests and as a sanity check that a fresh
/// `IdentifierGenerator` run through it is deterministic.
pub struct IdentityTransformation;

impl Transformation for IdentityTransformation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::*;

    fn bool_template() -> TemplateDefn {
        TemplateDefn::new(
            "Foo",
            vec![TemplateArgDecl { ty: LType::Bool, name: "b".to_string() }],
            Some(TemplateSpecialization {
                args: vec![TemplateArgDecl { ty: LType::Bool, name: "b".to_string() }],
                patterns: None,
                body: vec![TemplateBodyElement::constant_def(
                    "value",
                    LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local("b", LType::Bool)),
                )],
            }),
            vec![],
            "",
            vec!["value".to_string()],
        )
    }

    #[test]
    fn identity_transformation_preserves_structure() {
        let header = Header {
            template_defns: vec![bool_template()],
            toplevel_content: vec![],
            public_names: ["Foo".to_string()].into_iter().collect(),
        };
        let mut ids = IdentifierGenerator::default();
        let out = IdentityTransformation.transform_header(&header, &mut ids);
        assert_eq!(out.template_defns.len(), 1);
        assert_eq!(out.template_defns[0].name, "Foo");
        assert_eq!(out.public_names, header.public_names);
    }

    #[test]
    fn identifier_generator_is_deterministic() {
        let mut a = IdentifierGenerator::default();
        let mut b = IdentifierGenerator::default();
        let ids_a: Vec<_> = (0..5).map(|_| a.next_id()).collect();
        let ids_b: Vec<_> = (0..5).map(|_| b.next_id()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
