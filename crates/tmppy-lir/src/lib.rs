//! tmppy-lir - the template-metaprogramming intermediate representation
//!
//! IR-low models C++ compile-time constructs directly: `ExprKind`/[`LType`]
//! mirrors the five kinds a C++ template parameter can have (`bool`,
//! `int64_t`, `typename`, a template-template parameter, or a variadic
//! pack); [`LExpr`] mirrors the compile-time expression forms the emitter in
//! `tmppy-codegen` knows how to print; [`TemplateDefn`]/[`Header`] mirror the
//! C++ declarations the emitter ultimately produces. None of this crate
//! prints C++ text — that is `tmppy-codegen`'s job — but it does own the
//! generic rewrite framework ([`transform`]) that any lowering or
//! optimization pass over this IR rides on.

pub mod lir;
pub mod transform;

pub use lir::*;
pub use transform::*;
