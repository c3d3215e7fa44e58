//! tmppy-codegen - the C++ emitter (spec §4.7/§4.8)
//!
//! Pretty-prints IR-low (`tmppy_lir::Header`) to a C++17 header whose
//! template instantiations, once compiled, evaluate the original program.
//! The one non-trivial trick the emitter owns on top of straightforward
//! tree printing is deferred evaluation (`defer`): synthesising
//! dependent-type wrappers so a `static_assert` or `TemplateInstantiation`
//! that looks constant to the C++ compiler doesn't fire before the
//! enclosing template is actually instantiated.
//!
//! Reproduced from `_py2tmp/ir0_to_cpp.py`, split along the same seams the
//! original function names suggest: `writer` (the `Writer` hierarchy),
//! `types` (declarator prefix/suffix composition + reference collapsing),
//! `expr` (expression/template-instantiation printing), `defer`
//! (`Select1st*`/`AlwaysTrueFrom*` synthesis), `body` (template-body
//! elements and whole `TemplateDefn`s), `header` (the toplevel assembly).

pub mod body;
pub mod defer;
pub mod error;
pub mod expr;
pub mod header;
pub mod types;
pub mod writer;

pub use error::{CodegenError, Result};
pub use header::header_to_cpp;

#[cfg(test)]
mod tests;
