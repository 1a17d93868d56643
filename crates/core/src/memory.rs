//! In-process host: revision history and translated content kept in memory.
//!
//! Stands in for the content platform in tests and tooling. New revisions
//! carry every translation of the revision they were created from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::content::{TranslatedContent, TranslationContent};
use crate::error::CoreError;
use crate::graph::RevisionSource;
use crate::revision::{ModerationState, Revision, Version};
use crate::types::{ContentRef, RevisionId};

#[derive(Debug, Default)]
struct HostItem {
    revisions: Vec<Revision>,
    content: HashMap<(RevisionId, String), serde_json::Value>,
}

#[derive(Debug)]
pub struct InMemoryHost {
    items: Mutex<HashMap<ContentRef, HostItem>>,
    next_revision_id: AtomicI64,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            // 0 is the hidden sentinel.
            next_revision_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a new revision of `item`, carrying the latest revision's
    /// translations. Creates the item on first use.
    pub fn create_revision(
        &self,
        item: &ContentRef,
        state: ModerationState,
        version: Version,
    ) -> Result<RevisionId, CoreError> {
        let id = self.next_revision_id.fetch_add(1, Ordering::Relaxed);
        let mut items = self.lock()?;
        let host_item = items.entry(item.clone()).or_default();

        let mut revision = Revision::new(id, state, version);
        if let Some(latest) = host_item.revisions.last() {
            revision.translations = latest.translations.clone();
            let carried: Vec<(String, serde_json::Value)> = host_item
                .content
                .iter()
                .filter(|((rev, _), _)| *rev == latest.id)
                .map(|((_, lang), value)| (lang.clone(), value.clone()))
                .collect();
            for (lang, value) in carried {
                host_item.content.insert((id, lang), value);
            }
        }
        host_item.revisions.push(revision);
        Ok(id)
    }

    /// Author a translation on `revision_id`.
    pub fn translate(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
        fields: serde_json::Value,
    ) -> Result<(), CoreError> {
        let mut items = self.lock()?;
        let host_item = items
            .get_mut(item)
            .ok_or_else(|| CoreError::not_found("content item", item))?;
        let revision = host_item
            .revisions
            .iter_mut()
            .find(|r| r.id == revision_id)
            .ok_or_else(|| CoreError::not_found("revision", revision_id))?;
        revision
            .translations
            .insert(langcode.to_string(), revision_id);
        host_item
            .content
            .insert((revision_id, langcode.to_string()), fields);
        Ok(())
    }

    pub fn set_state(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        state: ModerationState,
    ) -> Result<(), CoreError> {
        let mut items = self.lock()?;
        let revision = items
            .get_mut(item)
            .and_then(|i| i.revisions.iter_mut().find(|r| r.id == revision_id))
            .ok_or_else(|| CoreError::not_found("revision", revision_id))?;
        revision.state = state;
        Ok(())
    }

    pub fn delete_revision(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
    ) -> Result<(), CoreError> {
        let mut items = self.lock()?;
        let host_item = items
            .get_mut(item)
            .ok_or_else(|| CoreError::not_found("content item", item))?;
        let before = host_item.revisions.len();
        host_item.revisions.retain(|r| r.id != revision_id);
        if host_item.revisions.len() == before {
            return Err(CoreError::not_found("revision", revision_id));
        }
        host_item.content.retain(|(rev, _), _| *rev != revision_id);
        Ok(())
    }

    pub fn delete_item(&self, item: &ContentRef) -> Result<bool, CoreError> {
        Ok(self.lock()?.remove(item).is_some())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ContentRef, HostItem>>, CoreError> {
        self.items
            .lock()
            .map_err(|_| CoreError::Internal("Host state lock poisoned".into()))
    }
}

#[async_trait]
impl RevisionSource for InMemoryHost {
    async fn list_revisions(&self, item: &ContentRef) -> Result<Vec<Revision>, CoreError> {
        Ok(self
            .lock()?
            .get(item)
            .map(|i| i.revisions.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TranslationContent for InMemoryHost {
    async fn translated_content(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<Option<TranslatedContent>, CoreError> {
        let items = self.lock()?;
        Ok(items
            .get(item)
            .and_then(|i| i.content.get(&(revision_id, langcode.to_string())))
            .map(|fields| TranslatedContent {
                revision_id,
                langcode: langcode.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn delete_translation(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<(), CoreError> {
        let mut items = self.lock()?;
        let host_item = items
            .get_mut(item)
            .ok_or_else(|| CoreError::not_found("content item", item))?;
        let revision = host_item
            .revisions
            .iter_mut()
            .find(|r| r.id == revision_id)
            .ok_or_else(|| CoreError::not_found("revision", revision_id))?;
        revision.translations.remove(langcode);
        host_item
            .content
            .remove(&(revision_id, langcode.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn new_revisions_carry_translations() {
        let host = InMemoryHost::new();
        let item = ContentRef::new("node", "1");
        let v1 = host
            .create_revision(&item, ModerationState::Published, Version::new(1, 0, 0))
            .unwrap();
        host.translate(&item, v1, "fr", json!({"title": "Bonjour"}))
            .unwrap();
        let v2 = host
            .create_revision(&item, ModerationState::Draft, Version::new(2, 0, 0))
            .unwrap();

        let revisions = host.list_revisions(&item).await.unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[1].translation_origin("fr"), Some(v1));
        let content = host.translated_content(&item, v2, "fr").await.unwrap().unwrap();
        assert_eq!(content.fields["title"], "Bonjour");
    }

    #[tokio::test]
    async fn delete_translation_only_touches_one_revision() {
        let host = InMemoryHost::new();
        let item = ContentRef::new("node", "1");
        let v1 = host
            .create_revision(&item, ModerationState::Published, Version::new(1, 0, 0))
            .unwrap();
        host.translate(&item, v1, "fr", json!({"title": "Bonjour"}))
            .unwrap();
        let v2 = host
            .create_revision(&item, ModerationState::Published, Version::new(2, 0, 0))
            .unwrap();
        host.delete_translation(&item, v2, "fr").await.unwrap();
        assert!(!host.has_translation(&item, v2, "fr").await.unwrap());
        assert!(host.has_translation(&item, v1, "fr").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_item_lists_nothing() {
        let host = InMemoryHost::new();
        let revisions = host
            .list_revisions(&ContentRef::new("node", "404"))
            .await
            .unwrap();
        assert!(revisions.is_empty());
    }
}
