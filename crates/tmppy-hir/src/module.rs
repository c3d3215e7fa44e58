//! Module-level two-pass elaborator and custom-class elaboration
//! (spec §4.4, §4.5). Grounded in `_py2tmp/ast_to_ir3.py`'s
//! `ModuleElaboration`, which processes signatures before bodies so mutually
//! recursive functions can reference each other regardless of definition
//! order, as long as every function in the cycle declares its return type.

use crate::error::{CompilationError, Result};
use crate::hir::{HFunction, HModule, HStmt};
use crate::scope::{CompilationContext, Table};
use crate::stmt::{elaborate_block, elaborate_stmt, SourceText, StmtCtx};
use crate::types::{CustomType, HType};
use std::rc::Rc;
use tmppy_ast as ast;
use tmppy_util::Symbol;

/// The fixed import allow-list (spec §4.4).
const TMPPY_IMPORTS: &[&str] = &["Type", "empty_list", "empty_set", "match"];
const TYPING_IMPORTS: &[&str] = &["List", "Set", "Callable"];

/// Maps a syntactic type annotation to an `HType` (spec §2 stage 2: "maps
/// syntactic type annotations to IR-high types").
pub fn resolve_type_annotation(t: &ast::TypeExpr, ctx: &CompilationContext, scope: usize) -> Result<HType> {
    match t {
        ast::TypeExpr::Name(n) => match n.id.as_str() {
            "bool" => Ok(HType::Bool),
            "int" => Ok(HType::Int),
            _ => match ctx.lookup(scope, Table::Type, n.id) {
                Some((_, entry)) => Ok(entry.ty.clone()),
                None => Err(CompilationError::UndefinedName { span: n.span, name: n.id.as_str().to_string(), notes: vec![] }),
            },
        },
        ast::TypeExpr::Subscript(s) => {
            let base = match &*s.value {
                ast::TypeExpr::Name(n) => n.id.as_str().to_string(),
                _ => return Err(CompilationError::UnsupportedSyntax { span: s.span, what: "unsupported generic type annotation".to_string(), notes: vec![] }),
            };
            match base.as_str() {
                "List" => {
                    let elem = resolve_single_arg(s, ctx, scope)?;
                    Ok(HType::list_of(elem))
                }
                "Set" => {
                    let elem = resolve_single_arg(s, ctx, scope)?;
                    Ok(HType::set_of(elem))
                }
                "Callable" => {
                    if s.args.len() != 2 {
                        return Err(CompilationError::WrongArity { span: s.span, expected: 2, found: s.args.len(), what: "Callable[[...], R]".to_string(), notes: vec![] });
                    }
                    let args = match &s.args[0] {
                        ast::TypeExpr::List(l) => {
                            let mut out = Vec::with_capacity(l.elts.len());
                            for a in &l.elts {
                                out.push(resolve_type_annotation(a, ctx, scope)?);
                            }
                            out
                        }
                        _ => return Err(CompilationError::UnsupportedSyntax { span: s.args[0].span(), what: "Callable's first argument must be a parameter-type list".to_string(), notes: vec![] }),
                    };
                    let ret = resolve_type_annotation(&s.args[1], ctx, scope)?;
                    Ok(HType::function(args, ret))
                }
                other => Err(CompilationError::UnsupportedSyntax { span: s.span, what: format!("unsupported generic type '{other}'"), notes: vec![] }),
            }
        }
        ast::TypeExpr::List(l) => Err(CompilationError::UnsupportedSyntax { span: l.span, what: "a bare argument-type list is only valid inside Callable[...]".to_string(), notes: vec![] }),
    }
}

fn resolve_single_arg(s: &ast::SubscriptTypeExpr, ctx: &CompilationContext, scope: usize) -> Result<HType> {
    if s.args.len() != 1 {
        return Err(CompilationError::WrongArity { span: s.span, expected: 1, found: s.args.len(), what: "generic type argument".to_string(), notes: vec![] });
    }
    resolve_type_annotation(&s.args[0], ctx, scope)
}

/// Elaborates an entire module (spec §4.4): pass 1 processes imports,
/// classes, and function signatures; pass 2 elaborates bodies and
/// top-level asserts.
pub fn elaborate_module(module: &ast::Module) -> Result<HModule> {
    let mut ctx = CompilationContext::new();
    let root = ctx.root();
    let source = SourceText { filename: module.filename.as_str(), lines: &module.source_lines };

    let mut classes: Vec<Rc<CustomType>> = Vec::new();
    let mut fn_defs: Vec<&ast::FunctionDef> = Vec::new();

    // Pass 1: imports, classes, function signatures.
    for stmt in &module.body {
        match stmt {
            ast::Stmt::Import(i) => check_import(None, &i.names, i.span)?,
            ast::Stmt::ImportFrom(i) => check_import(Some(i.module), &i.names, i.span)?,
            ast::Stmt::ClassDef(c) => {
                let class = elaborate_class(c, &mut ctx, root)?;
                classes.push(class);
            }
            ast::Stmt::FunctionDef(f) => {
                fn_defs.push(f);
                match &f.returns {
                    Some(ret_annotation) => {
                        let mut params = Vec::with_capacity(f.args.len());
                        for arg in &f.args {
                            let ann = arg.annotation.as_ref().ok_or_else(|| {
                                CompilationError::UnsupportedSyntax {
                                    span: arg.span,
                                    what: "every parameter must carry a type annotation".to_string(),
                                    notes: vec![],
                                }
                            })?;
                            params.push(resolve_type_annotation(ann, &ctx, root)?);
                        }
                        let ret = resolve_type_annotation(ret_annotation, &ctx, root)?;
                        ctx.add(root, Table::Value, f.name, HType::function(params, ret), f.span, false, true)?;
                    }
                    None => ctx.record_partial_function(root, f.name, f.span),
                }
            }
            ast::Stmt::Assert(_) => {}
            other => {
                return Err(CompilationError::UnsupportedSyntax {
                    span: other.span(),
                    what: "only imports, class definitions, function definitions, and assertions are allowed at module top level".to_string(),
                    notes: vec![],
                });
            }
        }
    }

    // Pass 2: function bodies, then top-level assertions.
    let mut functions = Vec::with_capacity(fn_defs.len());
    for f in &fn_defs {
        functions.push(elaborate_function_body(f, &mut ctx, root, source)?);
    }

    let mut toplevel_asserts = Vec::new();
    for stmt in &module.body {
        if let ast::Stmt::Assert(_) = stmt {
            let mut sc = StmtCtx { ctx: &mut ctx, scope: root, in_try_body: false, expected_return_type: None, source };
            toplevel_asserts.push(elaborate_stmt(stmt, &mut sc)?);
        }
    }

    Ok(HModule { functions, classes, toplevel_asserts })
}

fn check_import(module: Option<Symbol>, names: &[Symbol], span: tmppy_util::Span) -> Result<()> {
    let allowed: &[&str] = match module.map(|m| m.as_str().to_string()) {
        Some(ref m) if m == "tmppy" => TMPPY_IMPORTS,
        Some(ref m) if m == "typing" => TYPING_IMPORTS,
        None => {
            return Err(CompilationError::UnsupportedSyntax { span, what: "bare 'import x' is not supported; use 'from tmppy import ...' or 'from typing import ...'".to_string(), notes: vec![] });
        }
        Some(other) => {
            return Err(CompilationError::UnsupportedSyntax { span, what: format!("import from '{other}' is not supported"), notes: vec![] });
        }
    };
    for name in names {
        if !allowed.contains(&name.as_str()) {
            return Err(CompilationError::UnsupportedSyntax {
                span,
                what: format!("'{}' is not among the allowed imports ({})", name.as_str(), allowed.join(", ")),
                notes: vec![],
            });
        }
    }
    Ok(())
}

/// Elaborates a function's body, inferring and completing its return type
/// when it was left partial in pass 1 (spec §4.4).
fn elaborate_function_body(
    f: &ast::FunctionDef,
    ctx: &mut CompilationContext,
    module_scope: usize,
    source: SourceText<'_>,
) -> Result<HFunction> {
    let fn_scope = ctx.child_scope(module_scope, Some(f.name));
    let mut params = Vec::with_capacity(f.args.len());
    for arg in &f.args {
        let ann = arg.annotation.as_ref().ok_or_else(|| CompilationError::UnsupportedSyntax {
            span: arg.span,
            what: "every parameter must carry a type annotation".to_string(),
            notes: vec![],
        })?;
        let ty = resolve_type_annotation(ann, ctx, module_scope)?;
        ctx.add(fn_scope, Table::Value, arg.name, ty.clone(), arg.span, false, false)?;
        params.push((arg.name, ty));
    }

    let declared_ret = match &f.returns {
        Some(ann) => Some(resolve_type_annotation(ann, ctx, module_scope)?),
        None => None,
    };

    let mut sc = StmtCtx {
        ctx,
        scope: fn_scope,
        in_try_body: false,
        expected_return_type: declared_ret.clone(),
        source,
    };
    let result = elaborate_block(&f.body, &mut sc, true)?;
    let may_throw = body_may_throw(&result.stmts);

    let ret_type = match declared_ret {
        Some(t) => t,
        None => match &result.first_return {
            Some((t, _)) => t.clone(),
            None => HType::Bottom,
        },
    };

    if f.returns.is_none() {
        ctx.complete_partial_function(
            module_scope,
            f.name,
            HType::function(params.iter().map(|(_, t)| t.clone()).collect(), ret_type.clone()),
            f.span,
            may_throw,
        )?;
    }

    let is_public = !f.name.as_str().starts_with('_');

    Ok(HFunction { name: f.name, params, ret_type, body: result.stmts, may_throw, is_public, span: f.span })
}

fn body_may_throw(stmts: &[HStmt]) -> bool {
    stmts.iter().any(stmt_may_throw)
}

fn stmt_may_throw(s: &HStmt) -> bool {
    match s {
        HStmt::Raise { .. } => true,
        HStmt::Assign { value, .. } => value.may_throw(),
        HStmt::UnpackingAssign { value, .. } => value.may_throw(),
        HStmt::Return { value, .. } => value.as_ref().is_some_and(|v| v.may_throw()),
        HStmt::If { test, body, orelse, .. } => test.may_throw() || body_may_throw(body) || body_may_throw(orelse),
        HStmt::TryExcept { body, handler_body, .. } => body_may_throw(body) || body_may_throw(handler_body),
        HStmt::Assert { test, .. } => test.may_throw(),
    }
}

/// Elaborates `class C:` / `class C(Exception):` (spec §4.5).
fn elaborate_class(c: &ast::ClassDef, ctx: &mut CompilationContext, module_scope: usize) -> Result<Rc<CustomType>> {
    let is_exception = match c.bases.len() {
        0 => false,
        1 => match &c.bases[0] {
            ast::Expr::Name(n) if n.id.as_str() == "Exception" => true,
            _ => {
                return Err(CompilationError::InvalidException {
                    span: c.span,
                    detail: "a class may only derive from 'Exception' or nothing".to_string(),
                    notes: vec![],
                });
            }
        },
        _ => {
            return Err(CompilationError::InvalidException {
                span: c.span,
                detail: "multiple inheritance is not supported".to_string(),
                notes: vec![],
            });
        }
    };

    let init_methods: Vec<&ast::FunctionDef> = c
        .body
        .iter()
        .filter_map(|s| match s {
            ast::Stmt::FunctionDef(f) if f.name.as_str() == "__init__" => Some(f),
            _ => None,
        })
        .collect();
    if init_methods.len() != 1 {
        return Err(CompilationError::InvalidException {
            span: c.span,
            detail: format!("class '{}' must contain exactly one __init__ method", c.name.as_str()),
            notes: vec![],
        });
    }
    let init = init_methods[0];

    if init.args.is_empty() || init.args[0].name.as_str() != "self" || init.args[0].annotation.is_some() {
        return Err(CompilationError::InvalidException {
            span: init.span,
            detail: "__init__'s first parameter must be named 'self' with no annotation".to_string(),
            notes: vec![],
        });
    }

    let mut fields = Vec::with_capacity(init.args.len() - 1);
    let mut seen_names = std::collections::HashSet::new();
    for arg in &init.args[1..] {
        if arg.annotation.is_none() {
            return Err(CompilationError::InvalidException {
                span: arg.span,
                detail: format!("parameter '{}' must carry a type annotation", arg.name.as_str()),
                notes: vec![],
            });
        }
        if !seen_names.insert(arg.name) {
            return Err(CompilationError::Redefinition { span: arg.span, name: arg.name.as_str().to_string(), notes: vec![] });
        }
        let ty = resolve_type_annotation(arg.annotation.as_ref().unwrap(), ctx, module_scope)?;
        fields.push((arg.name, ty));
    }

    let mut body = init.body.iter();
    let message = if is_exception {
        let first = body.next().ok_or_else(|| CompilationError::InvalidException {
            span: init.span,
            detail: "an exception class's __init__ must start with 'self.message = \"...\"'".to_string(),
            notes: vec![],
        })?;
        Some(expect_self_message_assignment(first)?)
    } else {
        None
    };

    let mut assigned = std::collections::HashSet::new();
    for stmt in body {
        let (field, value_name) = expect_self_field_assignment(stmt)?;
        if !seen_names.contains(&field) {
            return Err(CompilationError::UnsupportedSyntax {
                span: stmt.span(),
                what: format!("'self.{}' does not name an __init__ parameter", field.as_str()),
                notes: vec![],
            });
        }
        if field != value_name {
            return Err(CompilationError::UnsupportedSyntax {
                span: stmt.span(),
                what: format!("field '{}' must be assigned from the identically-named parameter", field.as_str()),
                notes: vec![],
            });
        }
        if !assigned.insert(field) {
            return Err(CompilationError::Redefinition { span: stmt.span(), name: field.as_str().to_string(), notes: vec![] });
        }
    }
    if assigned.len() != seen_names.len() {
        return Err(CompilationError::InvalidException {
            span: init.span,
            detail: "every __init__ parameter must be assigned to an identically-named field exactly once".to_string(),
            notes: vec![],
        });
    }

    let custom = Rc::new(CustomType { name: c.name, fields, is_exception, message });
    let ty = HType::Custom(custom.clone());
    ctx.add(module_scope, Table::Type, c.name, ty.clone(), c.span, false, false)?;
    // Registered as a value too: the class name is callable as its own
    // constructor (spec §4.5).
    ctx.add(module_scope, Table::Value, c.name, ty, c.span, false, false)?;
    Ok(custom)
}

fn expect_self_message_assignment(stmt: &ast::Stmt) -> Result<String> {
    match stmt {
        ast::Stmt::Assign(a) if matches!(a.target, ast::AssignTarget::SelfAttr(n) if n.as_str() == "message") => {
            match &a.value {
                ast::Expr::Str(s) => Ok(s.value.clone()),
                other => Err(CompilationError::UnsupportedSyntax { span: other.span(), what: "self.message must be assigned a string literal".to_string(), notes: vec![] }),
            }
        }
        _ => Err(CompilationError::InvalidException {
            span: stmt.span(),
            detail: "an exception class's __init__ must start with 'self.message = \"...\"'".to_string(),
            notes: vec![],
        }),
    }
}

fn expect_self_field_assignment(stmt: &ast::Stmt) -> Result<(Symbol, Symbol)> {
    match stmt {
        ast::Stmt::Assign(a) => {
            let field = match a.target {
                ast::AssignTarget::SelfAttr(name) => name,
                ast::AssignTarget::Name(_) => {
                    return Err(CompilationError::UnsupportedSyntax { span: a.span, what: "a field assignment must be of the form 'self.X = X'".to_string(), notes: vec![] });
                }
            };
            match &a.value {
                ast::Expr::Name(n) => Ok((field, n.id)),
                _ => Err(CompilationError::UnsupportedSyntax { span: a.span, what: "a field assignment must be of the form 'self.X = X'".to_string(), notes: vec![] }),
            }
        }
        _ => Err(CompilationError::UnsupportedSyntax { span: stmt.span(), what: "an __init__ body may only contain field assignments".to_string(), notes: vec![] }),
    }
}
