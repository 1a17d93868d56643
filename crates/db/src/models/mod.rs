//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct per table and the
//! conversions to and from the core domain types.

pub mod active_revision;
pub mod vendor_request;
