use crate::expr::expr_to_cpp;
use crate::header::header_to_cpp;
use crate::types::type_expr_to_cpp;
use crate::writer::{ToplevelWriter, Writer};
use tmppy_lir::{
    AtomicTypeLiteral, ComparisonOp, Header, IdentifierGenerator, Int64BinOp, LExpr, LType, Literal, TemplateArgDecl, TemplateBodyElement,
    TemplateDefn, TemplateSpecialization, ToplevelElement,
};

fn int64_lit(v: i64) -> LExpr {
    LExpr::Literal(Literal::Int64(v))
}

fn bool_lit(v: bool) -> LExpr {
    LExpr::Literal(Literal::Bool(v))
}

#[test]
fn literal_emission() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    assert_eq!(expr_to_cpp(&int64_lit(42), &[], &mut writer).unwrap(), "42LL");
    assert_eq!(expr_to_cpp(&int64_lit(-3), &[], &mut writer).unwrap(), "-3LL");
    assert_eq!(expr_to_cpp(&bool_lit(true), &[], &mut writer).unwrap(), "true");
    assert_eq!(expr_to_cpp(&bool_lit(false), &[], &mut writer).unwrap(), "false");
}

#[test]
fn arithmetic_and_comparison_rendering() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let sum = LExpr::Int64BinOp { lhs: Box::new(int64_lit(2)), op: Int64BinOp::Add, rhs: Box::new(int64_lit(3)) };
    let eq = LExpr::Comparison { lhs: Box::new(sum), op: ComparisonOp::Eq, rhs: Box::new(int64_lit(5)) };
    assert_eq!(expr_to_cpp(&eq, &[], &mut writer).unwrap(), "((2LL) + (3LL)) == (5LL)");
}

#[test]
fn not_expression_rendering() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let not_expr = LExpr::Not(Box::new(bool_lit(false)));
    assert_eq!(expr_to_cpp(&not_expr, &[], &mut writer).unwrap(), "!(false)");
}

#[test]
fn atomic_type_literal_is_printed_verbatim() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let ty = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("MyStruct"));
    assert_eq!(type_expr_to_cpp(&ty, &[], &mut writer).unwrap(), "MyStruct");
}

#[test]
fn pointer_and_reference_declarators_are_inside_out() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let ty = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("int"));
    let ptr = LExpr::PointerType(Box::new(ty));
    assert_eq!(type_expr_to_cpp(&ptr, &[], &mut writer).unwrap(), "int*");

    let ty = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("int"));
    let r#ref = LExpr::ReferenceType(Box::new(ty));
    assert_eq!(type_expr_to_cpp(&r#ref, &[], &mut writer).unwrap(), "int &");
}

#[test]
fn reference_collapsing_folds_to_a_single_ampersand() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let int_ty = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("int"));
    // & && chain: C++'s own collapsing rule would fold this to &.
    let nested = LExpr::RvalueReferenceType(Box::new(LExpr::ReferenceType(Box::new(int_ty))));
    assert_eq!(type_expr_to_cpp(&nested, &[], &mut writer).unwrap(), "int &");
}

#[test]
fn reference_collapsing_folds_to_rvalue_when_no_lvalue_ref_present() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let int_ty = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("int"));
    let nested = LExpr::RvalueReferenceType(Box::new(LExpr::RvalueReferenceType(Box::new(int_ty))));
    assert_eq!(type_expr_to_cpp(&nested, &[], &mut writer).unwrap(), "int &&");
}

#[test]
fn function_type_declarator_matches_worked_example() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let x1 = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("X1"));
    let y = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("Y"));
    let fn_type = LExpr::FunctionType { return_type: Box::new(y), arg_types: vec![x1] };
    assert_eq!(type_expr_to_cpp(&fn_type, &[], &mut writer).unwrap(), "Y (X1)");
}

#[test]
fn static_assert_without_enclosing_args_is_emitted_unguarded() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    crate::defer::static_assert_to_cpp(&bool_lit(true), "oops", &[], &mut writer).unwrap();
    let out = writer.strings.join("");
    assert_eq!(out, "static_assert(true, \"oops\");\n");
}

#[test]
fn static_assert_referencing_a_bound_arg_is_emitted_unguarded() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let arg = TemplateArgDecl { ty: LType::Int64, name: "N".to_string() };
    let expr = LExpr::Comparison {
        lhs: Box::new(LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local("N", LType::Int64))),
        op: ComparisonOp::GtE,
        rhs: Box::new(int64_lit(0)),
    };
    crate::defer::static_assert_to_cpp(&expr, "must be non-negative", std::slice::from_ref(&arg), &mut writer).unwrap();
    let out = writer.strings.join("");
    assert!(out.starts_with("static_assert("));
    assert!(!out.contains("AlwaysTrueFrom"));
}

#[test]
fn static_assert_of_a_constant_inside_a_template_is_guarded() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let arg = TemplateArgDecl { ty: LType::Type, name: "T".to_string() };
    // A constant expression that mentions none of the enclosing args must
    // be tied to one via AlwaysTrueFromType, or the static_assert would
    // fire as soon as the template is parsed rather than instantiated.
    let expr = LExpr::Comparison { lhs: Box::new(int64_lit(2)), op: ComparisonOp::Eq, rhs: Box::new(int64_lit(2)) };
    crate::defer::static_assert_to_cpp(&expr, "trivially true", std::slice::from_ref(&arg), &mut writer).unwrap();
    let out = writer.strings.join("");
    assert!(out.contains("AlwaysTrueFromType<T>::value"), "expected a guard wrapper, got: {out}");
}

#[test]
fn template_instantiation_renders_angle_bracket_args() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let template = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_template("Foo", vec![LType::Type], false));
    let instantiation = LExpr::TemplateInstantiation {
        template: Box::new(template),
        args: vec![LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("Bar"))],
        instantiation_might_trigger_static_assert: false,
    };
    assert_eq!(type_expr_to_cpp(&instantiation, &[], &mut writer).unwrap(), "Foo<Bar>");
}

#[test]
fn class_member_access_of_a_value_member_omits_typename() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let object = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("Foo"));
    let access = LExpr::ClassMemberAccess { object: Box::new(object), member_name: "value".to_string(), member_type: LType::Int64 };
    assert_eq!(expr_to_cpp(&access, &[], &mut writer).unwrap(), "Foo::value");
}

#[test]
fn class_member_access_of_a_type_member_adds_typename() {
    let mut ids = IdentifierGenerator::default();
    let mut writer = ToplevelWriter::new(&mut ids);
    let object = LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_nonlocal_type("Foo"));
    let access = LExpr::ClassMemberAccess { object: Box::new(object), member_name: "type".to_string(), member_type: LType::Type };
    assert_eq!(type_expr_to_cpp(&access, &[], &mut writer).unwrap(), "typename Foo::type");
}

#[test]
fn two_runs_with_fresh_identifier_generators_are_deterministic() {
    let render = || {
        let mut ids = IdentifierGenerator::default();
        let arg = TemplateArgDecl { ty: LType::Type, name: "T".to_string() };
        let mut writer = ToplevelWriter::new(&mut ids);
        let expr = LExpr::Comparison { lhs: Box::new(int64_lit(1)), op: ComparisonOp::Eq, rhs: Box::new(int64_lit(1)) };
        crate::defer::static_assert_to_cpp(&expr, "m", std::slice::from_ref(&arg), &mut writer).unwrap();
        writer.strings.join("")
    };
    assert_eq!(render(), render());
}

#[test]
fn header_to_cpp_emits_toplevel_constant() {
    let mut ids = IdentifierGenerator::default();
    let header = Header {
        template_defns: Vec::new(),
        toplevel_content: vec![ToplevelElement::ConstantDef { name: "kAnswer".to_string(), expr: int64_lit(42) }],
        public_names: Default::default(),
    };
    let out = header_to_cpp(&header, &mut ids, false).unwrap();
    assert_eq!(out, "static constexpr int64_t kAnswer = 42LL;\n");
}

#[test]
fn header_to_cpp_emits_preamble_when_requested() {
    let mut ids = IdentifierGenerator::default();
    let header = Header { template_defns: Vec::new(), toplevel_content: Vec::new(), public_names: Default::default() };
    let out = header_to_cpp(&header, &mut ids, true).unwrap();
    assert!(out.starts_with("#include <tmppy/tmppy.h>"));
}

#[test]
fn header_to_cpp_emits_a_template_with_a_static_assert_body() {
    let mut ids = IdentifierGenerator::default();
    let arg = TemplateArgDecl { ty: LType::Int64, name: "N".to_string() };
    let body_expr = LExpr::Comparison {
        lhs: Box::new(LExpr::AtomicTypeLiteral(AtomicTypeLiteral::for_local("N", LType::Int64))),
        op: ComparisonOp::GtE,
        rhs: Box::new(int64_lit(0)),
    };
    let spec = TemplateSpecialization {
        args: vec![arg.clone()],
        patterns: None,
        body: vec![TemplateBodyElement::static_assert(body_expr, "N must be non-negative")],
    };
    let defn = TemplateDefn::new("CheckNonNegative", vec![arg], Some(spec), Vec::new(), "", Vec::new());
    let header = Header { template_defns: vec![defn], toplevel_content: Vec::new(), public_names: Default::default() };
    let out = header_to_cpp(&header, &mut ids, false).unwrap();
    assert!(out.contains("template <int64_t N>\nstruct CheckNonNegative;\n"));
    assert!(out.contains("struct CheckNonNegative {"));
    assert!(out.contains("static_assert("));
}
