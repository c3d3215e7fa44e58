//! Error type for the back-end emitter.
//!
//! Every function in this crate consumes IR-low produced by `tmppy-hir`'s
//! lowering pass, which only ever builds well-typed trees; the cases here
//! are invariant violations (spec §7: "internal invariant violations use
//! assertions and are bugs") rather than anything a source program can
//! trigger. We surface them as a structured error instead of panicking so a
//! driver can report a bug cleanly rather than crash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("internal codegen error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CodegenError>;
