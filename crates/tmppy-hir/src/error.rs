//! `CompilationError` — the single error type elaboration ever raises
//! (spec §7). Every variant carries enough to reproduce the stable
//! `file:line:col: error|note: message` diagnostic format from spec §6;
//! rendering and handler emission both route through `tmppy_util::
//! diagnostic`'s `DiagnosticBuilder`/`Diagnostic`/`Handler` (the same
//! `DiagnosticBuilder::error(...).span(...).emit(&self.handler)` idiom
//! `faxc-sem::analysis::SemanticAnalyzer::type_error` uses) rather than
//! formatting the stable string by hand. Each [`Note`] carries its own
//! [`Span`], which `tmppy_util::diagnostic::Diagnostic::notes` (plain,
//! unlocated strings) cannot model; `SourceSnippet` can, since it already
//! pairs a message (`label`) with its own source line/line-number/column,
//! so that is what a `Note` becomes once this error is turned into a real
//! `Diagnostic`.

use std::fmt;
use tmppy_util::diagnostic::{DiagnosticBuilder, DiagnosticCode, Handler, Level, SourceSnippet};
use tmppy_util::Span;

/// One secondary location attached to an error, rendered as a `note:` line
/// that always points at another source location (spec §6).
#[derive(Debug, Clone)]
pub struct Note {
    pub span: Span,
    pub message: String,
}

impl Note {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Note { span, message: message.into() }
    }
}

/// The source filename and line table an error needs to render itself,
/// independent of which module raised it. Elaboration threads this through
/// rather than baking a `SourceMap` dependency into every error site.
#[derive(Debug, Clone)]
pub struct SourceContext<'a> {
    pub filename: &'a str,
    pub lines: &'a [String],
}

impl<'a> SourceContext<'a> {
    pub fn line(&self, line: u32) -> &str {
        self.lines.get(line.saturating_sub(1) as usize).map(String::as_str).unwrap_or("")
    }
}

/// All ways elaboration can fail (spec §7's non-exhaustive kind list, made
/// exhaustive here since this crate owns every site that raises one).
#[derive(Debug, Clone)]
pub enum CompilationError {
    UnsupportedSyntax { span: Span, what: String, notes: Vec<Note> },
    UndefinedName { span: Span, name: String, notes: Vec<Note> },
    PartiallyDefined { span: Span, name: String, notes: Vec<Note> },
    Redefinition { span: Span, name: String, notes: Vec<Note> },
    TypeMismatch { span: Span, expected: String, found: String, notes: Vec<Note> },
    WrongArity { span: Span, expected: usize, found: usize, what: String, notes: Vec<Note> },
    NotCallable { span: Span, found: String, notes: Vec<Note> },
    UnsupportedBuiltinUsage { span: Span, detail: String, notes: Vec<Note> },
    MatchShape { span: Span, detail: String, notes: Vec<Note> },
    InvalidException { span: Span, detail: String, notes: Vec<Note> },
    InvalidAtomicType { span: Span, text: String, notes: Vec<Note> },
    IntegerOutOfRange { span: Span, value: String, notes: Vec<Note> },
    ReturnMissing { span: Span, function: String, notes: Vec<Note> },
    ReturnTypeMismatch { span: Span, expected: String, found: String, notes: Vec<Note> },
    Unreachable { span: Span, notes: Vec<Note> },
    /// Reached only by the path spec §9's second Open Question names: the
    /// original asserts a partial lookup is unreachable here and we
    /// deliberately do not guess whether that guards a real invariant.
    /// Surfaced as a structured error rather than a panic.
    InternalError { span: Span, detail: String, notes: Vec<Note> },
}

impl CompilationError {
    fn span(&self) -> Span {
        match self {
            CompilationError::UnsupportedSyntax { span, .. }
            | CompilationError::UndefinedName { span, .. }
            | CompilationError::PartiallyDefined { span, .. }
            | CompilationError::Redefinition { span, .. }
            | CompilationError::TypeMismatch { span, .. }
            | CompilationError::WrongArity { span, .. }
            | CompilationError::NotCallable { span, .. }
            | CompilationError::UnsupportedBuiltinUsage { span, .. }
            | CompilationError::MatchShape { span, .. }
            | CompilationError::InvalidException { span, .. }
            | CompilationError::InvalidAtomicType { span, .. }
            | CompilationError::IntegerOutOfRange { span, .. }
            | CompilationError::ReturnMissing { span, .. }
            | CompilationError::ReturnTypeMismatch { span, .. }
            | CompilationError::Unreachable { span, .. }
            | CompilationError::InternalError { span, .. } => *span,
        }
    }

    fn notes(&self) -> &[Note] {
        match self {
            CompilationError::UnsupportedSyntax { notes, .. }
            | CompilationError::UndefinedName { notes, .. }
            | CompilationError::PartiallyDefined { notes, .. }
            | CompilationError::Redefinition { notes, .. }
            | CompilationError::TypeMismatch { notes, .. }
            | CompilationError::WrongArity { notes, .. }
            | CompilationError::NotCallable { notes, .. }
            | CompilationError::UnsupportedBuiltinUsage { notes, .. }
            | CompilationError::MatchShape { notes, .. }
            | CompilationError::InvalidException { notes, .. }
            | CompilationError::InvalidAtomicType { notes, .. }
            | CompilationError::IntegerOutOfRange { notes, .. }
            | CompilationError::ReturnMissing { notes, .. }
            | CompilationError::ReturnTypeMismatch { notes, .. }
            | CompilationError::Unreachable { notes, .. }
            | CompilationError::InternalError { notes, .. } => notes,
        }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes_mut().push(note);
        self
    }

    fn notes_mut(&mut self) -> &mut Vec<Note> {
        match self {
            CompilationError::UnsupportedSyntax { notes, .. }
            | CompilationError::UndefinedName { notes, .. }
            | CompilationError::PartiallyDefined { notes, .. }
            | CompilationError::Redefinition { notes, .. }
            | CompilationError::TypeMismatch { notes, .. }
            | CompilationError::WrongArity { notes, .. }
            | CompilationError::NotCallable { notes, .. }
            | CompilationError::UnsupportedBuiltinUsage { notes, .. }
            | CompilationError::MatchShape { notes, .. }
            | CompilationError::InvalidException { notes, .. }
            | CompilationError::InvalidAtomicType { notes, .. }
            | CompilationError::IntegerOutOfRange { notes, .. }
            | CompilationError::ReturnMissing { notes, .. }
            | CompilationError::ReturnTypeMismatch { notes, .. }
            | CompilationError::Unreachable { notes, .. }
            | CompilationError::InternalError { notes, .. } => notes,
        }
    }

    /// The one-line, notes-free message body (everything after `error: `).
    pub fn message(&self) -> String {
        match self {
            CompilationError::UnsupportedSyntax { what, .. } => {
                format!("unsupported syntax: {what}")
            }
            CompilationError::UndefinedName { name, .. } => format!("undefined name '{name}'"),
            CompilationError::PartiallyDefined { name, .. } => {
                format!("'{name}' is only partially defined here")
            }
            CompilationError::Redefinition { name, .. } => {
                format!("'{name}' is already defined in this scope")
            }
            CompilationError::TypeMismatch { expected, found, .. } => {
                format!("expected type {expected}, found {found}")
            }
            CompilationError::WrongArity { expected, found, what, .. } => {
                format!("{what} expects {expected} argument(s), found {found}")
            }
            CompilationError::NotCallable { found, .. } => {
                format!("value of type {found} is not callable")
            }
            CompilationError::UnsupportedBuiltinUsage { detail, .. } => detail.clone(),
            CompilationError::MatchShape { detail, .. } => detail.clone(),
            CompilationError::InvalidException { detail, .. } => detail.clone(),
            CompilationError::InvalidAtomicType { text, .. } => {
                format!("'{text}' is not a valid atomic C++ type name")
            }
            CompilationError::IntegerOutOfRange { value, .. } => {
                format!("integer literal {value} does not fit in a signed 64-bit value")
            }
            CompilationError::ReturnMissing { function, .. } => {
                format!("missing return statement in function '{function}'")
            }
            CompilationError::ReturnTypeMismatch { expected, found, .. } => {
                format!("function declared to return {expected} but returns {found}")
            }
            CompilationError::Unreachable { .. } => "unreachable statement".to_string(),
            CompilationError::InternalError { detail, .. } => {
                format!("internal compiler error: {detail}")
            }
        }
    }

    /// The `tmppy_util::diagnostic` code that best categorizes this error,
    /// reusing the corpus's existing lexer/parser/semantic code space
    /// where a variant's shape genuinely matches one of its codes, and
    /// left uncoded where none does rather than forcing a mismatched fit.
    fn code(&self) -> Option<DiagnosticCode> {
        match self {
            CompilationError::UnsupportedSyntax { .. } => Some(DiagnosticCode::E0001),
            CompilationError::UndefinedName { .. } => Some(DiagnosticCode::E_SEMANTIC_UNDEFINED_VAR),
            CompilationError::Redefinition { .. } => Some(DiagnosticCode::E_PARSER_DUPLICATE_DEF),
            CompilationError::TypeMismatch { .. } | CompilationError::ReturnTypeMismatch { .. } => {
                Some(DiagnosticCode::E_SEMANTIC_TYPE_MISMATCH)
            }
            _ => None,
        }
    }

    /// Builds the `tmppy_util::diagnostic::Diagnostic` this error both
    /// renders from and emits to a `Handler`: the main message/span/code,
    /// plus one `SourceSnippet` per [`Note`] (its own span rendered as a
    /// line/column/source-line triple, its message carried as the
    /// snippet's `label`).
    fn to_diagnostic(&self, ctx: &SourceContext<'_>) -> tmppy_util::diagnostic::Diagnostic {
        let mut builder = DiagnosticBuilder::error(self.message()).span(self.span());
        if let Some(code) = self.code() {
            builder = builder.code(code);
        }
        for note in self.notes() {
            let snippet = SourceSnippet::point(ctx.line(note.span.line), note.span.line as usize, note.span.column as usize)
                .with_label(note.message.clone());
            builder = builder.snippet(snippet);
        }
        builder.build()
    }

    /// Emits this error to `handler`, the same `DiagnosticBuilder::error(...)
    /// .span(...).emit(&self.handler)` shape `faxc-sem`'s analyzer uses for
    /// every diagnostic it reports, so a caller that wants to accumulate
    /// diagnostics across a run (rather than abort on the stable string
    /// from [`Self::render`]) has a real path to do so.
    pub fn emit(&self, ctx: &SourceContext<'_>, handler: &Handler) {
        handler.emit_diagnostic(self.to_diagnostic(ctx));
    }

    /// Render the stable multi-line diagnostic string from spec §6:
    /// one `error:` header line, then zero or more `note:` lines (one per
    /// [`SourceSnippet`] on the `Diagnostic` built by [`Self::to_diagnostic`]),
    /// each followed by its source line and a caret pointing at the column.
    pub fn render(&self, ctx: &SourceContext<'_>) -> String {
        let diag = self.to_diagnostic(ctx);
        let mut out = String::new();
        render_one(&mut out, ctx.filename, self.span(), Level::Error, &diag.message, ctx);
        for snippet in &diag.snippets {
            let note_span = Span::new(0, 0, snippet.line_number as u32, snippet.start_column as u32);
            let message = snippet.label.clone().unwrap_or_default();
            render_one(&mut out, ctx.filename, note_span, Level::Note, &message, ctx);
        }
        out
    }
}

fn render_one(out: &mut String, filename: &str, span: Span, level: Level, message: &str, ctx: &SourceContext<'_>) {
    use std::fmt::Write;
    let _ = writeln!(out, "{filename}:{}:{}: {level}: {message}", span.line, span.column);
    let line = ctx.line(span.line);
    let _ = writeln!(out, "{line}");
    let col = span.column.saturating_sub(1) as usize;
    let _ = writeln!(out, "{}^", " ".repeat(col));
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: error: {}", self.span().line, self.span().column, self.message())
    }
}

impl std::error::Error for CompilationError {}

pub type Result<T> = std::result::Result<T, CompilationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_matches_stable_format() {
        let span = Span::new(10, 11, 3, 5);
        let err = CompilationError::UndefinedName { span, name: "x".to_string(), notes: vec![] };
        let lines = vec!["".to_string(), "".to_string(), "  foo(x)".to_string()];
        let ctx = SourceContext { filename: "a.py", lines: &lines };
        let rendered = err.render(&ctx);
        let mut it = rendered.lines();
        assert_eq!(it.next().unwrap(), "a.py:3:5: error: undefined name 'x'");
        assert_eq!(it.next().unwrap(), "  foo(x)");
        assert_eq!(it.next().unwrap(), "    ^");
    }

    #[test]
    fn notes_render_after_the_header() {
        let span = Span::new(0, 1, 1, 1);
        let note_span = Span::new(5, 6, 2, 3);
        let lines = vec!["x = 1".to_string(), "  y = 2".to_string()];
        let ctx = SourceContext { filename: "b.py", lines: &lines };
        let err = CompilationError::Redefinition { span, name: "x".to_string(), notes: vec![] }
            .with_note(Note::new(note_span, "previously defined here"));
        let rendered = err.render(&ctx);
        assert!(rendered.contains("b.py:1:1: error:"));
        assert!(rendered.contains("b.py:2:3: note: previously defined here"));
    }

    #[test]
    fn emit_reports_through_the_shared_diagnostic_handler() {
        let span = Span::new(0, 1, 1, 1);
        let lines = vec!["undefined".to_string()];
        let ctx = SourceContext { filename: "c.py", lines: &lines };
        let err = CompilationError::UndefinedName { span, name: "undefined".to_string(), notes: vec![] };

        let handler = Handler::new();
        err.emit(&ctx, &handler);

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 1);
        let diags = handler.diagnostics();
        assert_eq!(diags[0].code, Some(DiagnosticCode::E_SEMANTIC_UNDEFINED_VAR));
        assert_eq!(diags[0].message, "undefined name 'undefined'");
    }

    #[test]
    fn notes_become_source_snippets_on_the_diagnostic() {
        let span = Span::new(0, 1, 1, 1);
        let note_span = Span::new(5, 6, 2, 3);
        let lines = vec!["x = 1".to_string(), "  y = 2".to_string()];
        let ctx = SourceContext { filename: "d.py", lines: &lines };
        let err = CompilationError::Redefinition { span, name: "x".to_string(), notes: vec![] }
            .with_note(Note::new(note_span, "previously defined here"));

        let diag = err.to_diagnostic(&ctx);
        assert_eq!(diag.snippets.len(), 1);
        assert_eq!(diag.snippets[0].line_number, 2);
        assert_eq!(diag.snippets[0].start_column, 3);
        assert_eq!(diag.snippets[0].label.as_deref(), Some("previously defined here"));
    }
}
