//! Statement elaborator (spec §4.3): `elaborate_block` walks a sequence of
//! surface statements, threading the symbol table and reachability state
//! spec §4.3 describes (unreachable-statement detection, branch merge via
//! [`crate::scope::CompilationContext::join_definitions`], try/except
//! nesting discipline).

use crate::error::{CompilationError, Note, Result};
use crate::expr::{elaborate_expr, ExprCtx};
use crate::hir::{HExpr, HStmt};
use crate::scope::{CompilationContext, Table};
use crate::types::HType;
use tmppy_ast as ast;
use tmppy_util::Span;

/// The first concrete `return` the caller can use to unify a function's
/// inferred return type, kept distinct from `Bottom`-typed paths that never
/// return (spec §4.3's `elaborate_block` return value).
pub struct BlockResult {
    pub stmts: Vec<HStmt>,
    pub first_return: Option<(HType, Span)>,
}

/// The filename and raw source lines an `assert` needs to embed in its
/// runtime-formatted failure message (spec §4.3).
#[derive(Clone, Copy)]
pub struct SourceText<'a> {
    pub filename: &'a str,
    pub lines: &'a [String],
}

impl<'a> SourceText<'a> {
    pub fn line(&self, line: u32) -> &'a str {
        self.lines.get(line.saturating_sub(1) as usize).map(String::as_str).unwrap_or("")
    }
}

pub struct StmtCtx<'a> {
    pub ctx: &'a mut CompilationContext,
    pub scope: usize,
    pub in_try_body: bool,
    pub expected_return_type: Option<HType>,
    pub source: SourceText<'a>,
}

pub fn elaborate_block(stmts: &[ast::Stmt], sc: &mut StmtCtx<'_>, must_return: bool) -> Result<BlockResult> {
    let mut out = Vec::with_capacity(stmts.len());
    let mut first_return = None;
    let mut returned_at: Option<Span> = None;

    for (i, stmt) in stmts.iter().enumerate() {
        if let Some(prev_span) = returned_at {
            return Err(CompilationError::Unreachable { span: stmt.span(), notes: vec![] }
                .with_note(Note::new(prev_span, "unreachable because this statement always returns")));
        }
        let h = elaborate_stmt(stmt, sc)?;
        if let HStmt::Return { value, span } = &h {
            if first_return.is_none() {
                let ty = value.as_ref().map(HExpr::ty).unwrap_or(HType::Bottom);
                first_return = Some((ty, *span));
            }
        }
        if h.always_returns() {
            returned_at = Some(stmt.span());
        }
        out.push(h);
        let _ = i;
    }

    if must_return && returned_at.is_none() {
        let span = stmts.last().map(|s| s.span()).unwrap_or(Span::DUMMY);
        return Err(CompilationError::ReturnMissing {
            span,
            function: sc.ctx.function_name(sc.scope).map(|s| s.as_str().to_string()).unwrap_or_default(),
            notes: vec![],
        });
    }

    Ok(BlockResult { stmts: out, first_return })
}

pub(crate) fn elaborate_stmt(stmt: &ast::Stmt, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    match stmt {
        ast::Stmt::Assign(a) => elaborate_assign(a, sc),
        ast::Stmt::UnpackingAssign(u) => elaborate_unpacking_assign(u, sc),
        ast::Stmt::Return(r) => elaborate_return(r, sc),
        ast::Stmt::If(i) => elaborate_if(i, sc),
        ast::Stmt::Raise(r) => elaborate_raise(r, sc),
        ast::Stmt::Try(t) => elaborate_try(t, sc),
        ast::Stmt::Assert(a) => elaborate_assert(a, sc),
        ast::Stmt::FunctionDef(_) | ast::Stmt::ClassDef(_) | ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_) => {
            Err(CompilationError::UnsupportedSyntax {
                span: stmt.span(),
                what: "this statement is only valid at module top level".to_string(),
                notes: vec![],
            })
        }
    }
}

fn expr_ctx<'a>(sc: &'a mut StmtCtx<'_>) -> ExprCtx<'a> {
    ExprCtx { ctx: sc.ctx, scope: sc.scope, in_match_pattern: false }
}

fn elaborate_assign(a: &ast::Assign, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    let target = match a.target {
        ast::AssignTarget::Name(name) => name,
        ast::AssignTarget::SelfAttr(_) => {
            return Err(CompilationError::UnsupportedSyntax {
                span: a.span,
                what: "'self.x = ...' is only valid inside a class's __init__ body".to_string(),
                notes: vec![],
            });
        }
    };
    let value = {
        let mut ec = expr_ctx(sc);
        elaborate_expr(&a.value, &mut ec)?
    };
    if let Some(annotation) = &a.annotation {
        let declared = crate::module::resolve_type_annotation(annotation, sc.ctx, sc.scope)?;
        if declared != value.ty() {
            return Err(CompilationError::TypeMismatch {
                span: a.span,
                expected: declared.describe(),
                found: value.ty().describe(),
                notes: vec![],
            });
        }
    }
    sc.ctx.add(sc.scope, Table::Value, target, value.ty(), a.span, false, false)?;
    Ok(HStmt::Assign { target, value, span: a.span })
}

fn elaborate_unpacking_assign(u: &ast::UnpackingAssign, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    let value = {
        let mut ec = expr_ctx(sc);
        elaborate_expr(&u.value, &mut ec)?
    };
    let elem_type = match value.ty() {
        HType::List(elem) => *elem,
        other => {
            return Err(CompilationError::TypeMismatch {
                span: u.value.span(),
                expected: "List[T]".to_string(),
                found: other.describe(),
                notes: vec![],
            });
        }
    };
    for target in &u.targets {
        sc.ctx.add(sc.scope, Table::Value, *target, elem_type.clone(), u.span, false, false)?;
    }
    let error_message = format!(
        "unpacking assignment expected a list of length {}, got a different length at runtime",
        u.targets.len()
    );
    Ok(HStmt::UnpackingAssign { targets: u.targets.clone(), elem_type, value, error_message, span: u.span })
}

fn elaborate_return(r: &ast::Return, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    let value = match &r.value {
        Some(e) => {
            let mut ec = expr_ctx(sc);
            Some(elaborate_expr(e, &mut ec)?)
        }
        None => None,
    };
    if let (Some(expected), Some(v)) = (&sc.expected_return_type, &value) {
        if *expected != v.ty() {
            return Err(CompilationError::ReturnTypeMismatch {
                span: r.span,
                expected: expected.describe(),
                found: v.ty().describe(),
                notes: vec![],
            });
        }
    }
    Ok(HStmt::Return { value, span: r.span })
}

fn elaborate_if(i: &ast::If, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    let test = {
        let mut ec = expr_ctx(sc);
        let h = elaborate_expr(&i.test, &mut ec)?;
        if h.ty() != HType::Bool {
            return Err(CompilationError::TypeMismatch {
                span: i.test.span(),
                expected: "bool".to_string(),
                found: h.ty().describe(),
                notes: vec![],
            });
        }
        h
    };

    let then_scope = sc.ctx.child_scope(sc.scope, None);
    let mut then_sc = StmtCtx { ctx: sc.ctx, scope: then_scope, in_try_body: sc.in_try_body, expected_return_type: sc.expected_return_type.clone(), source: sc.source };
    let then_result = elaborate_block(&i.body, &mut then_sc, false)?;
    let then_returns = crate::hir::block_always_returns(&then_result.stmts);

    let else_scope = sc.ctx.child_scope(sc.scope, None);
    let (orelse_stmts, else_returns) = if i.orelse.is_empty() {
        (vec![], false)
    } else {
        let mut else_sc = StmtCtx { ctx: sc.ctx, scope: else_scope, in_try_body: sc.in_try_body, expected_return_type: sc.expected_return_type.clone(), source: sc.source };
        let r = elaborate_block(&i.orelse, &mut else_sc, false)?;
        let returns = crate::hir::block_always_returns(&r.stmts);
        (r.stmts, returns)
    };

    sc.ctx.join_definitions(sc.scope, then_scope, then_returns, else_scope, else_returns, i.span)?;

    // Spec §4.3: "if `must_return` is set and no `else` is present, it is a
    // 'missing return statement' error." `HStmt::always_returns` already
    // requires a non-empty `orelse` before treating an `if` as
    // always-returning, so `elaborate_block`'s own `must_return` check
    // against the block's final statement enforces this without this
    // function needing to duplicate it.

    Ok(HStmt::If { test, body: then_result.stmts, orelse: orelse_stmts, span: i.span })
}

fn elaborate_raise(r: &ast::Raise, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    if r.cause.is_some() {
        return Err(CompilationError::InvalidException {
            span: r.span,
            detail: "'raise ... from ...' is not supported".to_string(),
            notes: vec![],
        });
    }
    let exc = {
        let mut ec = expr_ctx(sc);
        elaborate_expr(&r.exc, &mut ec)?
    };
    match exc.ty() {
        HType::Custom(c) if c.is_exception => {}
        other => {
            return Err(CompilationError::InvalidException {
                span: r.exc.span(),
                detail: format!("'raise' target must be an exception type, found {}", other.describe()),
                notes: vec![],
            });
        }
    }
    Ok(HStmt::Raise { exc, span: r.span })
}

fn elaborate_try(t: &ast::Try, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    if sc.in_try_body {
        return Err(CompilationError::UnsupportedSyntax {
            span: t.span,
            what: "nested try/except is not supported".to_string(),
            notes: vec![],
        });
    }
    if !t.orelse.is_empty() || !t.finalbody.is_empty() {
        return Err(CompilationError::UnsupportedSyntax {
            span: t.span,
            what: "try/except does not support 'else' or 'finally'".to_string(),
            notes: vec![],
        });
    }
    if t.handlers.len() != 1 {
        return Err(CompilationError::UnsupportedSyntax {
            span: t.span,
            what: "try/except must have exactly one handler".to_string(),
            notes: vec![],
        });
    }
    let handler = &t.handlers[0];
    let (exc_type_expr, exc_name) = match (&handler.exc_type, handler.name) {
        (Some(e), Some(n)) => (e, n),
        _ => {
            return Err(CompilationError::UnsupportedSyntax {
                span: handler.span,
                what: "handlers must be of the form 'except T as name'".to_string(),
                notes: vec![],
            });
        }
    };
    // A bare class name used as an except-clause type (not called) elaborates
    // through the ordinary name lookup, which resolves a class to its
    // `Custom` type directly (the same entry that makes the name callable as
    // a constructor) rather than to `TypeRef` — mirrors `elaborate_raise`'s
    // own check on a constructed exception value just below.
    let exc_type = {
        let mut ec = expr_ctx(sc);
        let h = elaborate_expr(exc_type_expr, &mut ec)?;
        match h.ty() {
            HType::Custom(c) if c.is_exception => HType::Custom(c),
            other => {
                return Err(CompilationError::InvalidException {
                    span: exc_type_expr.span(),
                    detail: format!("except clause must name an exception class, found {}", other.describe()),
                    notes: vec![],
                });
            }
        }
    };

    let body_scope = sc.ctx.child_scope(sc.scope, None);
    let mut body_sc = StmtCtx { ctx: sc.ctx, scope: body_scope, in_try_body: true, expected_return_type: sc.expected_return_type.clone(), source: sc.source };
    let body_result = elaborate_block(&t.body, &mut body_sc, false)?;
    let body_returns = crate::hir::block_always_returns(&body_result.stmts);

    let handler_scope = sc.ctx.child_scope(sc.scope, None);
    sc.ctx.add(handler_scope, Table::Value, exc_name, exc_type.clone(), handler.span, false, false)?;
    let mut handler_sc = StmtCtx { ctx: sc.ctx, scope: handler_scope, in_try_body: true, expected_return_type: sc.expected_return_type.clone(), source: sc.source };
    let handler_result = elaborate_block(&handler.body, &mut handler_sc, false)?;
    let handler_returns = crate::hir::block_always_returns(&handler_result.stmts);

    sc.ctx.join_definitions(sc.scope, body_scope, body_returns, handler_scope, handler_returns, t.span)?;

    Ok(HStmt::TryExcept {
        body: body_result.stmts,
        exc_type,
        exc_name,
        handler_body: handler_result.stmts,
        span: t.span,
    })
}

fn elaborate_assert(a: &ast::Assert, sc: &mut StmtCtx<'_>) -> Result<HStmt> {
    let test = {
        let mut ec = expr_ctx(sc);
        let h = elaborate_expr(&a.test, &mut ec)?;
        if h.ty() != HType::Bool {
            return Err(CompilationError::TypeMismatch { span: a.test.span(), expected: "bool".to_string(), found: h.ty().describe(), notes: vec![] });
        }
        h
    };
    let user_msg = match &a.msg {
        Some(ast::Expr::Str(s)) => Some(s.value.clone()),
        Some(other) => return Err(CompilationError::UnsupportedSyntax { span: other.span(), what: "assert message must be a string literal".to_string(), notes: vec![] }),
        None => None,
    };
    // spec §4.3: embed the source filename, line number, and offending
    // source line alongside the user's message (empty string if absent).
    let message = format!(
        "TMPPy assertion failed: {}{}:{}: {}",
        user_msg.as_deref().map(|m| format!("{}\n", escape_runtime_string(m))).unwrap_or_default(),
        escape_runtime_string(sc.source.filename),
        a.span.line,
        escape_runtime_string(sc.source.line(a.span.line)),
    );
    Ok(HStmt::Assert { test, message, span: a.span })
}

/// Escapes backslashes, double-quotes and newlines, per spec §4.3's
/// "backslashes, double-quotes, and newlines are escaped".
fn escape_runtime_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_handles_all_three_characters() {
        assert_eq!(escape_runtime_string("a\\b\"c\nd"), "a\\\\b\\\"c\\nd");
    }
}
