//! The emitter's own writer hierarchy (spec §4.7), reproduced from
//! `_py2tmp/ir0_to_cpp.py`'s `Writer`/`ToplevelWriter`/`TemplateElemWriter`/
//! `ExprWriter` split. This is a sibling of `tmppy_lir::transform`'s writer
//! framework, not the same one: that framework rewrites `LExpr` trees and
//! can inject fresh *nodes*; this one accumulates already-rendered *C++ text
//! fragments* while walking a tree that is no longer being rewritten, only
//! printed. Both share the same underlying [`IdentifierGenerator`] so a
//! `fresh_identifier()` call from either layer advances the one
//! cross-cutting sequential counter the whole pipeline shares (spec §5).

use tmppy_lir::IdentifierGenerator;

/// Where a freshly rendered C++ fragment belongs: the header's toplevel,
/// the body of the template specialization currently being printed, or (for
/// `ExprWriter`) nowhere — expression fragments are returned, not written.
pub trait Writer {
    fn new_id(&mut self) -> String;
    fn write_toplevel_elem(&mut self, s: String);
    fn write_template_body_elem(&mut self, s: String);
    fn create_child_writer(&mut self) -> TemplateElemWriter<'_>;
    fn get_toplevel_strings(&mut self) -> &mut Vec<String>;
}

/// Owns the header-level output: forward declarations, template
/// definitions, and toplevel static asserts/constants/typedefs, all
/// flattened to one string buffer in emission order.
pub struct ToplevelWriter<'g> {
    ids: &'g mut IdentifierGenerator,
    pub strings: Vec<String>,
}

impl<'g> ToplevelWriter<'g> {
    pub fn new(ids: &'g mut IdentifierGenerator) -> Self {
        ToplevelWriter { ids, strings: Vec::new() }
    }
}

impl<'g> Writer for ToplevelWriter<'g> {
    fn new_id(&mut self) -> String {
        self.ids.next_id()
    }

    fn write_toplevel_elem(&mut self, s: String) {
        self.strings.push(s);
    }

    fn write_template_body_elem(&mut self, s: String) {
        self.write_toplevel_elem(s);
    }

    fn create_child_writer(&mut self) -> TemplateElemWriter<'_> {
        TemplateElemWriter { toplevel: self, strings: Vec::new() }
    }

    fn get_toplevel_strings(&mut self) -> &mut Vec<String> {
        &mut self.strings
    }
}

/// Collects one template specialization's body text while forwarding
/// anything that belongs one level up (a fresh sibling `Select1st*`/
/// `AlwaysTrueFrom*` helper, spec §4.8) to the enclosing `ToplevelWriter`.
pub struct TemplateElemWriter<'p> {
    toplevel: &'p mut dyn Writer,
    pub strings: Vec<String>,
}

impl<'p> Writer for TemplateElemWriter<'p> {
    fn new_id(&mut self) -> String {
        self.toplevel.new_id()
    }

    fn write_toplevel_elem(&mut self, s: String) {
        self.toplevel.write_toplevel_elem(s);
    }

    fn write_template_body_elem(&mut self, s: String) {
        self.strings.push(s);
    }

    fn create_child_writer(&mut self) -> TemplateElemWriter<'_> {
        TemplateElemWriter { toplevel: self.toplevel, strings: Vec::new() }
    }

    fn get_toplevel_strings(&mut self) -> &mut Vec<String> {
        self.toplevel.get_toplevel_strings()
    }
}

/// Builds one C++ expression fragment. Unlike its siblings it never writes
/// a body/toplevel element itself — `fragment` accumulates the pieces of
/// the expression currently being printed, and any statement-shaped thing
/// produced along the way (a helper template definition) is forwarded to
/// the parent.
pub struct ExprWriter<'p> {
    parent: &'p mut dyn Writer,
    pub fragment: String,
}

impl<'p> ExprWriter<'p> {
    pub fn new(parent: &'p mut dyn Writer) -> Self {
        ExprWriter { parent, fragment: String::new() }
    }

    pub fn write_fragment(&mut self, s: &str) {
        self.fragment.push_str(s);
    }
}

impl<'p> Writer for ExprWriter<'p> {
    fn new_id(&mut self) -> String {
        self.parent.new_id()
    }

    fn write_toplevel_elem(&mut self, s: String) {
        self.parent.write_toplevel_elem(s);
    }

    fn write_template_body_elem(&mut self, s: String) {
        self.parent.write_template_body_elem(s);
    }

    fn create_child_writer(&mut self) -> TemplateElemWriter<'_> {
        unimplemented!("an ExprWriter cannot open a template-body child writer")
    }

    fn get_toplevel_strings(&mut self) -> &mut Vec<String> {
        self.parent.get_toplevel_strings()
    }
}
