//! Active revision record rows.

use serde::Serialize;
use sqlx::FromRow;
use transflow_core::error::CoreError;
use transflow_core::mapping::{ActiveRevisionRecord, LanguageRevisionMapping, Scope};
use transflow_core::types::{ContentRef, DbId, RevisionId, Timestamp};

/// A row from the `active_revisions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveRevisionRow {
    pub id: DbId,
    pub entity_type: String,
    pub entity_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ActiveRevisionRow {
    pub fn item(&self) -> ContentRef {
        ContentRef::new(self.entity_type.clone(), self.entity_id.clone())
    }
}

/// A row from the `active_revision_languages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveRevisionLanguageRow {
    pub id: DbId,
    pub active_revision_id: DbId,
    pub langcode: String,
    pub entity_revision_id: RevisionId,
    pub scope: i16,
    pub position: i32,
}

impl ActiveRevisionLanguageRow {
    pub fn to_mapping(&self, item: &ContentRef) -> Result<LanguageRevisionMapping, CoreError> {
        Ok(LanguageRevisionMapping {
            entity_type: item.entity_type.clone(),
            entity_id: item.entity_id.clone(),
            revision_id: self.entity_revision_id,
            langcode: self.langcode.clone(),
            scope: Scope::from_i16(self.scope)?,
        })
    }
}

/// Assemble a record from its parent row and its language rows.
///
/// Language rows must already be ordered by `position`.
pub fn to_record(
    parent: &ActiveRevisionRow,
    languages: &[ActiveRevisionLanguageRow],
) -> Result<ActiveRevisionRecord, CoreError> {
    let item = parent.item();
    let mappings = languages
        .iter()
        .map(|row| row.to_mapping(&item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ActiveRevisionRecord { item, mappings })
}

/// Per-item summary used by listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveRevisionSummary {
    pub entity_type: String,
    pub entity_id: String,
    pub mapping_count: i64,
    pub updated_at: Timestamp,
}
