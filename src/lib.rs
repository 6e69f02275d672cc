//! `ot-query`: a lazy object-tree query and projection engine.
//!
//! Heterogeneous, sometimes expensive-to-fetch structured data — a live
//! graph of daemon objects, nested property bags, parsed POD values,
//! parsed JSON — is exposed through one uniform iterable tree model
//! ([`node`]), evaluated against a JSONPath-like path language with
//! embedded filter predicates ([`path`], [`predicate`]).
//!
//! Module dependency order (leaves first): [`node`] has no internal
//! dependents; [`json`] and [`adaptors`] depend only on it; [`predicate`]
//! and [`path`]'s evaluator depend on each other (a predicate may embed
//! a sub-path; a step's filter invokes the predicate engine); [`path`]'s
//! parser produces the compiled steps both of those consume; [`dump`]
//! and the CLI sit on top of everything.

pub mod adaptors;
pub mod config;
pub mod dump;
pub mod error;
pub mod json;
pub mod node;
pub mod path;
pub mod predicate;

pub use error::{Error, Result};
pub use node::Node;
