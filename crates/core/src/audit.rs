//! Audit entries for mapping changes.
//!
//! Every mutation emits one human-readable entry on the `transflow::audit`
//! tracing target. Subscribers decide where entries end up.

use crate::mapping::{MappingTarget, Scope};
use crate::types::ContentRef;

/// Tracing target carrying audit entries.
pub const AUDIT_TARGET: &str = "transflow::audit";

// ---------------------------------------------------------------------------
// Action constants
// ---------------------------------------------------------------------------

/// Known action types for audit entries.
pub mod actions {
    pub const MAPPING_SET: &str = "mapping_set";
    pub const MAPPING_ADDED: &str = "mapping_added";
    pub const MAPPING_REMOVED: &str = "mapping_removed";
    pub const MAPPINGS_CLEARED: &str = "mappings_cleared";
    pub const LIFECYCLE_APPLIED: &str = "lifecycle_applied";
    pub const TRANSLATION_DELETED: &str = "translation_deleted";
    pub const REVISION_DELETED: &str = "revision_deleted";
    pub const ITEM_DELETED: &str = "item_deleted";
    pub const IDENTIFIER_ISSUED: &str = "identifier_issued";
}

/// Emit an audit entry for `item`.
pub fn record(action: &'static str, item: &ContentRef, message: &str) {
    tracing::info!(target: "transflow::audit", action, item = %item, "{message}");
}

/// `fr (any) -> revision 3`, `fr (published) -> "hidden"`.
pub fn describe_write(langcode: &str, scope: Scope, target: MappingTarget) -> String {
    format!("{langcode} ({scope}) -> {target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_description_names_language_scope_and_target() {
        assert_eq!(
            describe_write("fr", Scope::Any, MappingTarget::Revision(3)),
            "fr (any) -> revision 3"
        );
        assert_eq!(
            describe_write("it", Scope::Published, MappingTarget::Hidden),
            "it (published) -> \"hidden\""
        );
    }
}
