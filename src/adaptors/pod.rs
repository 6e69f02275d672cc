//! Contract for a POD-backed OT source.
//!
//! The SPA POD binary layout and its filter/compare utilities are out
//! of scope for this crate (see the crate's top-level purpose notes);
//! this module fixes only the *shape* a POD decoder must present to
//! the rest of the engine, so that a path or predicate written against
//! a POD-backed root behaves exactly like one written against JSON or
//! a dict.

use crate::error::{Error, Result};
use crate::node::Node;

/// A decoded POD value exposed as an OT root. Implementors translate
/// their own binary layout into [`Node`]s on demand; this crate ships
/// no implementation of the trait itself.
pub trait PodSource {
    /// The root OT node for this POD value.
    fn root(&self) -> Result<Node>;

    /// Structural compatibility check used before a filter/compare
    /// operation runs; `Err(Error::Incompatible)` propagates as the
    /// producer error the step/predicate engines already know how to
    /// surface.
    fn check_compatible(&self, other: &dyn PodSource) -> Result<()>;
}

/// The range/step/flag combinations the original POD filter path left
/// unimplemented are preserved as an explicit `NotSupported` surface
/// rather than guessed at. A real `PodSource` should route any filter
/// request it cannot express through its own POD compare primitives to
/// this helper instead of inventing new semantics.
pub fn unsupported_filter(detail: impl Into<String>) -> Error {
    Error::NotSupported(detail.into())
}
