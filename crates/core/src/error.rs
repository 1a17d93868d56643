use crate::mapping::Scope;
use crate::types::RevisionId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Revision {revision_id} is not a valid mapping target for language '{language}': {reason}")]
    InvalidCandidate {
        language: String,
        revision_id: RevisionId,
        reason: String,
    },

    #[error("A mapping for language '{language}' with scope {scope} already exists")]
    DuplicateMapping { language: String, scope: Scope },

    #[error("No language mappings exist for {item}")]
    EmptyMappingRemoval { item: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
