//! Symbol table & compilation context (spec §3.3, §4.1): a tree of scopes
//! linked by parent pointers, plus the partial-function bookkeeping the
//! two-pass module elaborator needs for mutually-recursive functions.
//!
//! Uses an arena-of-scopes-by-index style rib stack, adapted here to an
//! explicit parent-pointer arena per spec §9's guidance ("a unique-owner
//! representation with back-pointers... both work; the spec requires only
//! that lookup walks parents").

use crate::error::{CompilationError, Note};
use crate::types::HType;
use std::collections::HashMap;
use tmppy_util::{Span, Symbol};

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: Symbol,
    pub ty: HType,
    pub def_span: Span,
    pub is_only_partially_defined: bool,
    pub may_throw_if_function: bool,
}

/// A pending module-level function whose return type could not be
/// syntactically declared; holds just enough to let pass 2 promote it once
/// its body has been elaborated (spec §4.4).
#[derive(Debug, Clone)]
pub struct PartialFunction {
    pub name: Symbol,
    pub def_span: Span,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<usize>,
    /// `None` for the function-agnostic scopes (module top level, class
    /// bodies); `Some(name)` inside a function body, inherited by nested
    /// child scopes created for `if`/`try` blocks.
    function_name: Option<Symbol>,
    values: HashMap<Symbol, SymbolEntry>,
    /// Custom-class names, resolved through a separate table per spec
    /// §3.3 ("two parallel tables per scope: the value table and the type
    /// table").
    types: HashMap<Symbol, SymbolEntry>,
    partial_functions: HashMap<Symbol, PartialFunction>,
}

/// An arena of scopes with the root scope (module top level) at index 0.
/// Lookup walks `parent` links; `add`/`record_partial_function` mutate only
/// the scope whose id is passed in, never reaching across siblings.
pub struct CompilationContext {
    scopes: Vec<Scope>,
}

/// Which table a lookup or insertion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Value,
    Type,
}

impl CompilationContext {
    pub fn new() -> Self {
        CompilationContext { scopes: vec![Scope::default()] }
    }

    pub fn root(&self) -> usize {
        0
    }

    /// Create a fresh scope nested under `parent`. `function_name` inherits
    /// from the parent when `None` is passed and the parent itself is
    /// inside a function, so nested `if`/`try` blocks still know which
    /// function they belong to (needed by the "try/except only at the
    /// outermost level of a function body" rule, spec §4.3).
    pub fn child_scope(&mut self, parent: usize, function_name: Option<Symbol>) -> usize {
        let inherited = function_name.or(self.scopes[parent].function_name);
        self.scopes.push(Scope {
            parent: Some(parent),
            function_name: inherited,
            ..Scope::default()
        });
        self.scopes.len() - 1
    }

    pub fn function_name(&self, scope: usize) -> Option<Symbol> {
        self.scopes[scope].function_name
    }

    /// Walks `scope` and its ancestors; returns the entry and the id of the
    /// scope that owns it.
    pub fn lookup(&self, scope: usize, table: Table, name: Symbol) -> Option<(usize, &SymbolEntry)> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let map = match table {
                Table::Value => &self.scopes[id].values,
                Table::Type => &self.scopes[id].types,
            };
            if let Some(entry) = map.get(&name) {
                return Some((id, entry));
            }
            cur = self.scopes[id].parent;
        }
        None
    }

    pub fn lookup_partial_function(&self, scope: usize, name: Symbol) -> Option<&PartialFunction> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(pf) = self.scopes[id].partial_functions.get(&name) {
                return Some(pf);
            }
            cur = self.scopes[id].parent;
        }
        None
    }

    /// Binds `name` in `scope`'s table, rejecting a duplicate in the same
    /// scope (spec §3.3: "`add_symbol`... rejects duplicate names in the
    /// same scope").
    pub fn add(
        &mut self,
        scope: usize,
        table: Table,
        name: Symbol,
        ty: HType,
        def_span: Span,
        is_only_partially_defined: bool,
        may_throw_if_function: bool,
    ) -> Result<(), CompilationError> {
        let map = match table {
            Table::Value => &mut self.scopes[scope].values,
            Table::Type => &mut self.scopes[scope].types,
        };
        if let Some(existing) = map.get(&name) {
            let note_message = if existing.is_only_partially_defined {
                format!("'{}' may already have been initialised here", name.as_str())
            } else {
                format!("'{}' previously defined here", name.as_str())
            };
            return Err(CompilationError::Redefinition {
                span: def_span,
                name: name.as_str().to_string(),
                notes: vec![],
            }
            .with_note(Note::new(existing.def_span, note_message)));
        }
        map.insert(
            name,
            SymbolEntry { name, ty, def_span, is_only_partially_defined, may_throw_if_function },
        );
        Ok(())
    }

    /// Records `name` as pending return-type inference (spec §4.4 pass 1).
    pub fn record_partial_function(&mut self, scope: usize, name: Symbol, def_span: Span) {
        self.scopes[scope].partial_functions.insert(name, PartialFunction { name, def_span });
    }

    /// Removes the partial entry and installs the full function symbol once
    /// its body has been elaborated and its return type inferred.
    pub fn complete_partial_function(
        &mut self,
        scope: usize,
        name: Symbol,
        function_type: HType,
        def_span: Span,
        may_throw: bool,
    ) -> Result<(), CompilationError> {
        self.scopes[scope].partial_functions.remove(&name);
        self.add(scope, Table::Value, name, function_type, def_span, false, may_throw)
    }

    /// Branch merge (spec §4.1): given the scopes created for an `if`'s two
    /// arms (or a `try`'s body/handler) and whether each arm always-returns,
    /// fold every name bound on at least one non-returning arm back into
    /// `parent`. A name bound on both sides with conflicting types is a
    /// hard error; a name bound on only one non-returning side becomes
    /// `partially_defined`.
    pub fn join_definitions(
        &mut self,
        parent: usize,
        left: usize,
        left_always_returns: bool,
        right: usize,
        right_always_returns: bool,
        join_span: Span,
    ) -> Result<(), CompilationError> {
        if left_always_returns && right_always_returns {
            return Ok(());
        }
        let left_values = self.scopes[left].values.clone();
        let right_values = self.scopes[right].values.clone();

        let mut names: Vec<Symbol> = left_values.keys().chain(right_values.keys()).copied().collect();
        names.sort_by_key(|s| s.as_str().to_string());
        names.dedup();

        for name in names {
            // A name bound only inside an always-returning branch never
            // reaches the merge point with that branch's control flow, so
            // it does not participate in the join at all.
            let in_left = (!left_always_returns).then(|| left_values.get(&name)).flatten();
            let in_right = (!right_always_returns).then(|| right_values.get(&name)).flatten();

            match (in_left, in_right) {
                (Some(l), Some(r)) => {
                    if l.ty != r.ty {
                        return Err(CompilationError::TypeMismatch {
                            span: join_span,
                            expected: l.ty.describe(),
                            found: r.ty.describe(),
                            notes: vec![],
                        }
                        .with_note(Note::new(l.def_span, format!("'{}' defined with type {} here", name.as_str(), l.ty.describe())))
                        .with_note(Note::new(r.def_span, format!("'{}' defined with type {} here", name.as_str(), r.ty.describe()))));
                    }
                    let partial = l.is_only_partially_defined || r.is_only_partially_defined;
                    self.force_insert(parent, name, l.clone(), partial);
                }
                // Defined only on the left. If the right branch is itself
                // live (not always-returning) but doesn't define `name`,
                // the merged binding is only partially defined. If the
                // right branch always-returns, execution only ever reaches
                // the merge point through the left branch, so the merged
                // binding is as defined as it was there — inherit the
                // left entry's own partial flag rather than forcing it.
                (Some(l), None) => {
                    let partial = if right_always_returns { l.is_only_partially_defined } else { true };
                    self.force_insert(parent, name, l.clone(), partial);
                }
                (None, Some(r)) => {
                    let partial = if left_always_returns { r.is_only_partially_defined } else { true };
                    self.force_insert(parent, name, r.clone(), partial);
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn force_insert(&mut self, scope: usize, name: Symbol, mut entry: SymbolEntry, partial: bool) {
        entry.is_only_partially_defined = partial;
        self.scopes[scope].values.insert(name, entry);
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn lookup_walks_parents() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        ctx.add(root, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        let child = ctx.child_scope(root, None);
        let (owner, entry) = ctx.lookup(child, Table::Value, sym("x")).unwrap();
        assert_eq!(owner, root);
        assert_eq!(entry.ty, HType::Int);
    }

    #[test]
    fn redefinition_in_same_scope_errors() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        ctx.add(root, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        let err = ctx.add(root, Table::Value, sym("x"), HType::Bool, Span::DUMMY, false, false);
        assert!(matches!(err, Err(CompilationError::Redefinition { .. })));
    }

    #[test]
    fn join_definitions_fully_defines_both_branch_bindings() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let left = ctx.child_scope(root, None);
        let right = ctx.child_scope(root, None);
        ctx.add(left, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        ctx.add(right, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        ctx.join_definitions(root, left, false, right, false, Span::DUMMY).unwrap();
        let (_, entry) = ctx.lookup(root, Table::Value, sym("x")).unwrap();
        assert!(!entry.is_only_partially_defined);
    }

    #[test]
    fn join_definitions_partial_when_only_one_branch_defines() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let left = ctx.child_scope(root, None);
        let right = ctx.child_scope(root, None);
        ctx.add(left, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        ctx.join_definitions(root, left, false, right, false, Span::DUMMY).unwrap();
        let (_, entry) = ctx.lookup(root, Table::Value, sym("x")).unwrap();
        assert!(entry.is_only_partially_defined);
    }

    #[test]
    fn join_definitions_skips_an_always_returning_side() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let left = ctx.child_scope(root, None);
        let right = ctx.child_scope(root, None);
        ctx.add(left, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        // right always-returns (e.g. `else: return`), so its absence of `x`
        // doesn't make the merged `x` partial.
        ctx.join_definitions(root, left, false, right, true, Span::DUMMY).unwrap();
        let (_, entry) = ctx.lookup(root, Table::Value, sym("x")).unwrap();
        assert!(!entry.is_only_partially_defined);
    }

    #[test]
    fn join_definitions_conflicting_types_errors() {
        let mut ctx = CompilationContext::new();
        let root = ctx.root();
        let left = ctx.child_scope(root, None);
        let right = ctx.child_scope(root, None);
        ctx.add(left, Table::Value, sym("x"), HType::Int, Span::DUMMY, false, false).unwrap();
        ctx.add(right, Table::Value, sym("x"), HType::Bool, Span::DUMMY, false, false).unwrap();
        let err = ctx.join_definitions(root, left, false, right, false, Span::DUMMY);
        assert!(matches!(err, Err(CompilationError::TypeMismatch { .. })));
    }
}
