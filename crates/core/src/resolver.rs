//! Render-time resolution of language mappings.
//!
//! Given the revision being viewed and a language, decide which revision's
//! translated content is rendered. A mapping always wins over the viewed
//! revision's own content; a hidden mapping suppresses the translation.
//! Stale mappings never fail rendering, they degrade to no translation.

use std::sync::Arc;

use serde::Serialize;

use crate::content::{TranslatedContent, TranslationContent};
use crate::error::CoreError;
use crate::graph::{RevisionGraph, RevisionHistory};
use crate::mapping::ActiveRevisionRecord;
use crate::revision::Revision;
use crate::store::MappingStore;
use crate::types::{ContentRef, RevisionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "revision_id", rename_all = "snake_case")]
pub enum Resolution {
    /// Render the translation stored on this revision.
    Render(RevisionId),
    /// A hidden mapping suppresses the language.
    Hidden,
    /// No content to render for the language.
    Untranslated,
}

impl Resolution {
    pub fn revision_id(self) -> Option<RevisionId> {
        match self {
            Resolution::Render(id) => Some(id),
            Resolution::Hidden | Resolution::Untranslated => None,
        }
    }

    pub fn is_translated(self) -> bool {
        matches!(self, Resolution::Render(_))
    }
}

/// Resolve `langcode` on `viewed` against a loaded history and record.
pub fn resolve_in_history(
    history: &RevisionHistory,
    record: Option<&ActiveRevisionRecord>,
    viewed: &Revision,
    langcode: &str,
) -> Resolution {
    let line = viewed.line();
    let mapping = record.and_then(|r| r.lookup(langcode, line));

    let Some(mapping) = mapping else {
        return if viewed.has_translation(langcode) {
            Resolution::Render(viewed.id)
        } else {
            Resolution::Untranslated
        };
    };

    if mapping.is_hidden() {
        return Resolution::Hidden;
    }

    match history.find(mapping.revision_id) {
        Some(target) if target.has_translation(langcode) => Resolution::Render(target.id),
        Some(_) => {
            tracing::warn!(
                item = %history.item(),
                langcode,
                target = mapping.revision_id,
                scope = %mapping.scope,
                "Mapped revision has no translation for the language"
            );
            Resolution::Untranslated
        }
        None => {
            tracing::warn!(
                item = %history.item(),
                langcode,
                target = mapping.revision_id,
                scope = %mapping.scope,
                "Mapping points at a revision that no longer exists"
            );
            Resolution::Untranslated
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MappingResolver {
    graph: RevisionGraph,
    store: Arc<dyn MappingStore>,
    content: Arc<dyn TranslationContent>,
}

impl MappingResolver {
    pub fn new(
        graph: RevisionGraph,
        store: Arc<dyn MappingStore>,
        content: Arc<dyn TranslationContent>,
    ) -> Self {
        Self {
            graph,
            store,
            content,
        }
    }

    /// Which revision's translation to render when `viewed_revision` is shown
    /// in `langcode`. An unknown item or viewed revision is `NotFound`.
    pub async fn resolve(
        &self,
        item: &ContentRef,
        viewed_revision: RevisionId,
        langcode: &str,
    ) -> Result<Resolution, CoreError> {
        let history = self.graph.history(item).await?;
        let viewed = history.get(viewed_revision)?;
        let record = self.store.load(item).await?;
        Ok(resolve_in_history(
            &history,
            record.as_ref(),
            viewed,
            langcode,
        ))
    }

    /// Resolve and fetch the translated content to render, if any.
    pub async fn render(
        &self,
        item: &ContentRef,
        viewed_revision: RevisionId,
        langcode: &str,
    ) -> Result<Option<TranslatedContent>, CoreError> {
        let Resolution::Render(revision_id) =
            self.resolve(item, viewed_revision, langcode).await?
        else {
            return Ok(None);
        };
        let content = self
            .content
            .translated_content(item, revision_id, langcode)
            .await?;
        if content.is_none() {
            tracing::warn!(
                item = %item,
                langcode,
                revision_id,
                "Resolved revision returned no translated content"
            );
        }
        Ok(content)
    }
}
