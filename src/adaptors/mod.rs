//! Bridges from external data sources to the OT model. `dict` and
//! `registry` are concrete; `pod` fixes only the contract a POD-backed
//! source must expose — no binary POD decoder is implemented (out of
//! scope, per the crate's purpose).

pub mod dict;
pub mod pod;
pub mod registry;
