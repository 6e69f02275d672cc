//! Crate-wide error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One variant per error kind the object-tree engine distinguishes.
#[derive(Debug, Error)]
pub enum Error {
    /// NULL / zero-size inputs to public APIs.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed JSON or path text. `offset` is the byte offset in the
    /// input at which the parser stopped; callers may inspect the
    /// residual input starting there.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Filter/compare requested on structurally mismatched data from an
    /// adaptor (e.g. a POD-backed source).
    #[error("incompatible operand: {0}")]
    Incompatible(String),

    /// A feature combination the engine does not implement (e.g. certain
    /// range/step/flag combinations in a filter).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A registry round-trip failed. This is only ever surfaced
    /// out-of-band (logged) for an `expensive` entry, which becomes
    /// `null` instead of propagating the error; this variant exists for
    /// adaptor implementations that need to report the failure to
    /// something other than the node itself.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("out of memory")]
    OutOfMemory,
}
