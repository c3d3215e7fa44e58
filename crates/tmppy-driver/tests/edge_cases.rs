//! Edge-case coverage for the driver's pipeline wiring: an empty module,
//! and a user-defined exception class (spec §4.5) compiled end to end.

use tmppy_ast::{Arg, Assign, AssignTarget, ClassDef, Expr, FunctionDef, Module, NameExpr, NameTypeExpr, StrExpr, Stmt, TypeExpr};
use tmppy_driver::{CompilationSession, CompileOptions};
use tmppy_util::{Span, Symbol};

fn int_annotation() -> TypeExpr {
    TypeExpr::Name(NameTypeExpr { id: Symbol::intern("int"), span: Span::DUMMY })
}

#[test]
fn an_empty_module_compiles_to_an_empty_header() {
    let module = Module::new(vec![], "empty.tmppy", vec![]);
    let mut session = CompilationSession::new(CompileOptions::default());
    let cpp = session.compile_module(&module).expect("an empty module is a valid program");
    assert!(cpp.contains("#include <tmppy/tmppy.h>"));
}

#[test]
fn an_exception_class_elaborates_and_lowers_without_error() {
    let init = FunctionDef {
        name: Symbol::intern("__init__"),
        args: vec![
            Arg { name: Symbol::intern("self"), annotation: None, span: Span::DUMMY },
            Arg { name: Symbol::intern("code"), annotation: Some(int_annotation()), span: Span::DUMMY },
        ],
        returns: None,
        body: vec![
            Stmt::Assign(Assign {
                target: AssignTarget::SelfAttr(Symbol::intern("message")),
                annotation: None,
                value: Expr::Str(StrExpr { value: "bad code".to_string(), span: Span::DUMMY }),
                span: Span::DUMMY,
            }),
            Stmt::Assign(Assign {
                target: AssignTarget::SelfAttr(Symbol::intern("code")),
                annotation: None,
                value: Expr::Name(NameExpr { id: Symbol::intern("code"), span: Span::DUMMY }),
                span: Span::DUMMY,
            }),
        ],
        span: Span::DUMMY,
    };
    let class = ClassDef {
        name: Symbol::intern("BadCodeError"),
        bases: vec![Expr::Name(NameExpr { id: Symbol::intern("Exception"), span: Span::DUMMY })],
        body: vec![Stmt::FunctionDef(init)],
        span: Span::DUMMY,
    };
    let module = Module::new(
        vec![Stmt::ClassDef(class)],
        "errors.tmppy",
        vec![
            "class BadCodeError(Exception):".to_string(),
            "    def __init__(self, code: int):".to_string(),
            "        self.message = \"bad code\"".to_string(),
            "        self.code = code".to_string(),
        ],
    );

    let mut session = CompilationSession::new(CompileOptions::default());
    let cpp = session.compile_module(&module).expect("a well-formed exception class should compile");
    // A class with no top-level functions or asserts referencing it emits
    // no template for the class itself (spec's custom-class elaboration
    // only registers the type; instantiation happens via the functions
    // that use it) — so the only meaningful check here is that
    // elaboration + lowering + emission ran to completion.
    assert!(cpp.contains("#include <tmppy/tmppy.h>"));
}
