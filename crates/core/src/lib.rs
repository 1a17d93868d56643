//! Active revision mapping engine for translation workflows.
//!
//! Decides, per language and viewed revision, which revision's translation
//! is rendered, and keeps the per-item mapping record consistent as revisions
//! are validated, published and deleted. Host integrations come in through
//! [`graph::RevisionSource`] and [`content::TranslationContent`]; persistence
//! goes through [`store::MappingStore`].

pub mod audit;
pub mod candidates;
pub mod content;
pub mod describe;
pub mod error;
pub mod graph;
pub mod mapping;
pub mod memory;
pub mod mutator;
pub mod request_identifier;
pub mod resolver;
pub mod revision;
pub mod store;
pub mod types;
