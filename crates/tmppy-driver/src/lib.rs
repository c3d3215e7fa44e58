//! tmppy-driver - compilation session and pipeline orchestration
//!
//! Ties the three independently-specified stages together: `tmppy-hir`'s
//! elaborator (AST → IR-high), its lowering pass (IR-high → IR-low), and
//! `tmppy-codegen`'s emitter (IR-low → C++ text). There is no CLI here —
//! parsing source text into a [`tmppy_ast::Module`] and writing the
//! resulting header to disk are both out of scope (spec §1's Non-goals);
//! a caller hands in an already-parsed `Module` and gets back rendered
//! C++ source or a [`CompilationError`].
//!
//! Uses a `Config`/`Session` split: a small, cheaply cloned options struct
//! separate from the mutable per-compilation session state (here, only the
//! identifier generator), rather than one struct that conflates "how to
//! compile" with "what is being compiled".

use thiserror::Error;
use tmppy_ast::Module;
use tmppy_hir::{CompilationError, SourceContext};
use tmppy_lir::IdentifierGenerator;
use tmppy_util::diagnostic::{Diagnostic, Handler};

/// Options controlling a single compilation, independent of any particular
/// source module (spec §2 Row D).
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Prefix used for compiler-synthesized identifiers (`Select1st*`,
    /// `AlwaysTrueFrom*` helpers, per-`if` branch templates). Defaults to
    /// the same `TmppyInternal_` prefix `tmppy-lir::IdentifierGenerator`
    /// uses on its own, kept configurable so two outputs destined for the
    /// same translation unit can be told apart.
    pub identifier_prefix: String,

    /// Whether to emit the `#include <tmppy/tmppy.h>` / `#include
    /// <type_traits>` preamble lines (spec §6: the companion runtime
    /// header supplies `AlwaysTrueFrom*`/`Select1st*`). A driver assembling
    /// several generated fragments into one file may want to emit the
    /// preamble once and suppress it for the rest.
    pub emit_preamble: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { identifier_prefix: "TmppyInternal_".to_string(), emit_preamble: true }
    }
}

/// A single compilation's mutable state: the identifier generator (spec
/// §5's one cross-cutting sequential counter, shared by the lowering pass
/// and the emitter so fresh names never collide across the two stages),
/// plus the `Handler` every `CompilationError` this session's elaboration
/// raises is also reported through (the same `Handler`/`DiagnosticBuilder`
/// plumbing `faxc-drv::Session` keeps alongside its own pipeline state),
/// so a caller can inspect accumulated diagnostics rather than only the
/// single `CompilationError` a failed `compile_module` call returns.
pub struct CompilationSession {
    options: CompileOptions,
    ids: IdentifierGenerator,
    handler: Handler,
}

impl CompilationSession {
    pub fn new(options: CompileOptions) -> Self {
        let ids = IdentifierGenerator::new(options.identifier_prefix.clone());
        CompilationSession { options, ids, handler: Handler::new() }
    }

    /// Runs the full pipeline on one already-parsed module: elaboration,
    /// lowering, then emission. Returns the rendered C++ header text.
    pub fn compile_module(&mut self, module: &Module) -> Result<String, DriverError> {
        let span = tracing::info_span!("compile_module", file = module.filename.as_str());
        let _enter = span.enter();

        tracing::debug!("elaborating module");
        let hir_module = tmppy_hir::elaborate_module(module).map_err(|err| {
            let ctx = SourceContext { filename: module.filename.as_str(), lines: &module.source_lines };
            err.emit(&ctx, &self.handler);
            err
        })?;

        tracing::debug!("lowering to IR-low");
        let header = tmppy_hir::lower_module(&hir_module);

        tracing::debug!("emitting C++");
        let cpp = tmppy_codegen::header_to_cpp(&header, &mut self.ids, self.options.emit_preamble)?;

        Ok(cpp)
    }

    /// Every diagnostic reported by elaboration across this session's
    /// `compile_module` calls, in report order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.handler.diagnostics()
    }
}

/// Installs a `tracing` subscriber that writes the spans `compile_module`
/// opens (symbol table construction, elaboration, lowering, emission,
/// spec §2 Row C) to stderr. An embedding application calls this once at
/// startup; tests and library-only callers can skip it entirely.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
}

/// Everything that can go wrong running the pipeline end to end: either an
/// error reported by the elaborator at a specific source location, or an
/// internal invariant violation surfaced by the emitter (spec §7: internal
/// invariant violations are bugs, reported structurally rather than via a
/// panic).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Codegen(#[from] tmppy_codegen::CodegenError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmppy_ast::{Assert, Expr, FunctionDef, Module, NameExpr, NameTypeExpr, NumExpr, Return, Stmt, TypeExpr};
    use tmppy_util::{Span, Symbol};

    fn int_annotation() -> TypeExpr {
        TypeExpr::Name(NameTypeExpr { id: Symbol::intern("int"), span: Span::DUMMY })
    }

    fn identity_module() -> Module {
        let body = vec![Stmt::FunctionDef(FunctionDef {
            name: Symbol::intern("answer"),
            args: vec![],
            returns: Some(int_annotation()),
            body: vec![Stmt::Return(Return { value: Some(Expr::Num(NumExpr { value: 42, span: Span::DUMMY })), span: Span::DUMMY })],
            span: Span::DUMMY,
        })];
        Module::new(body, "test.tmppy", vec!["def answer() -> int:".to_string(), "    return 42".to_string()])
    }

    #[test]
    fn compiles_a_trivial_module_to_cpp() {
        let mut session = CompilationSession::new(CompileOptions::default());
        let cpp = session.compile_module(&identity_module()).expect("compilation should succeed");
        assert!(cpp.contains("#include <tmppy/tmppy.h>"));
        assert!(cpp.contains("answer"));
    }

    #[test]
    fn emit_preamble_false_omits_includes() {
        let options = CompileOptions { emit_preamble: false, ..CompileOptions::default() };
        let mut session = CompilationSession::new(options);
        let cpp = session.compile_module(&identity_module()).expect("compilation should succeed");
        assert!(!cpp.contains("#include"));
    }

    #[test]
    fn elaboration_errors_propagate_as_driver_errors() {
        let bad_module = Module::new(
            vec![Stmt::Assert(Assert { test: Expr::Name(NameExpr { id: Symbol::intern("undefined"), span: Span::DUMMY }), msg: None, span: Span::DUMMY })],
            "bad.tmppy",
            vec!["assert undefined".to_string()],
        );
        let mut session = CompilationSession::new(CompileOptions::default());
        let err = session.compile_module(&bad_module).unwrap_err();
        assert!(matches!(err, DriverError::Compilation(CompilationError::UndefinedName { .. })));
    }

    #[test]
    fn elaboration_errors_are_also_recorded_on_the_session_handler() {
        let bad_module = Module::new(
            vec![Stmt::Assert(Assert { test: Expr::Name(NameExpr { id: Symbol::intern("undefined"), span: Span::DUMMY }), msg: None, span: Span::DUMMY })],
            "bad.tmppy",
            vec!["assert undefined".to_string()],
        );
        let mut session = CompilationSession::new(CompileOptions::default());
        assert!(session.compile_module(&bad_module).is_err());

        let diags = session.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("undefined"));
    }
}
