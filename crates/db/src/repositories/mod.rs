//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod active_revision_repo;
pub mod request_identifier_repo;

pub use active_revision_repo::{ActiveRevisionRepo, PgMappingStore};
pub use request_identifier_repo::RequestIdentifierRepo;
