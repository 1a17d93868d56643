//! Translation content collaborator.
//!
//! The engine never reads or writes translated fields itself; it asks the
//! host through [`TranslationContent`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ContentRef, RevisionId};

/// Translated fields of one language as stored on a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedContent {
    pub revision_id: RevisionId,
    pub langcode: String,
    pub fields: serde_json::Value,
}

#[async_trait]
pub trait TranslationContent: Send + Sync {
    /// Translated content of `langcode` on `revision_id`, carried-over
    /// translations included.
    async fn translated_content(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<Option<TranslatedContent>, CoreError>;

    /// Drop the translation from a single revision.
    async fn delete_translation(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<(), CoreError>;

    async fn has_translation(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<bool, CoreError> {
        Ok(self
            .translated_content(item, revision_id, langcode)
            .await?
            .is_some())
    }
}
