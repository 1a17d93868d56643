//! Persistence seam for active-revision records.
//!
//! Every mutation goes through [`MappingStore::modify`]: the store loads the
//! item's record (or an empty one) under a per-item lock, applies the edit,
//! validates the result and persists it. An empty result deletes the record;
//! a failed edit persists nothing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::mapping::{ActiveRevisionRecord, MappingTarget, Scope};
use crate::types::ContentRef;

/// Edit applied to a record inside the store's critical section.
pub type RecordEdit<'a> =
    Box<dyn FnOnce(&mut ActiveRevisionRecord) -> Result<(), CoreError> + Send + 'a>;

#[async_trait]
pub trait MappingStore: Send + Sync {
    /// The item's record, or `None` when it has no mappings.
    async fn load(&self, item: &ContentRef) -> Result<Option<ActiveRevisionRecord>, CoreError>;

    /// Atomic read-modify-write. Returns the stored record, `None` when the
    /// edit left it empty and it was deleted.
    async fn modify<'a>(
        &self,
        item: &ContentRef,
        edit: RecordEdit<'a>,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError>;

    /// Delete the whole record. Returns `true` if one existed.
    async fn delete(&self, item: &ContentRef) -> Result<bool, CoreError>;

    async fn get_mappings_for_item(
        &self,
        item: &ContentRef,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        self.load(item).await
    }

    async fn set_mapping(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Scope,
        target: MappingTarget,
    ) -> Result<ActiveRevisionRecord, CoreError> {
        let langcode = langcode.to_string();
        self.modify(
            item,
            Box::new(move |record| {
                record.set(&langcode, scope, target);
                Ok(())
            }),
        )
        .await?
        .ok_or_else(|| CoreError::Internal(format!("Record for {item} vanished after set")))
    }

    /// Remove the entry for `langcode` (in `scope`, or every scope).
    ///
    /// `EmptyMappingRemoval` when the item has no record, `NotFound` when
    /// the record holds no such entry.
    async fn remove_mapping(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Option<Scope>,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        let langcode = langcode.to_string();
        self.modify(
            item,
            Box::new(move |record| {
                if record.is_empty() {
                    return Err(CoreError::EmptyMappingRemoval {
                        item: record.item.to_string(),
                    });
                }
                if record.remove(&langcode, scope) == 0 {
                    return Err(CoreError::not_found(
                        "language mapping",
                        match scope {
                            Some(scope) => format!("{langcode} ({scope})"),
                            None => langcode.clone(),
                        },
                    ));
                }
                Ok(())
            }),
        )
        .await
    }

    async fn remove_all_mappings(&self, item: &ContentRef) -> Result<bool, CoreError> {
        self.delete(item).await
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-local store.
///
/// One mutex guards the record map, so read-modify-write on an item is
/// serialised. Edits run against a copy that only replaces the stored
/// record once the edit and validation succeeded.
#[derive(Default)]
pub struct InMemoryMappingStore {
    records: Mutex<HashMap<ContentRef, ActiveRevisionRecord>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ContentRef, ActiveRevisionRecord>>, CoreError>
    {
        self.records
            .lock()
            .map_err(|_| CoreError::Internal("Mapping store lock poisoned".into()))
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn load(&self, item: &ContentRef) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        Ok(self.lock()?.get(item).cloned())
    }

    async fn modify<'a>(
        &self,
        item: &ContentRef,
        edit: RecordEdit<'a>,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        let mut records = self.lock()?;
        let mut working = records
            .get(item)
            .cloned()
            .unwrap_or_else(|| ActiveRevisionRecord::new(item.clone()));

        edit(&mut working)?;
        working.validate()?;

        if working.is_empty() {
            if records.remove(item).is_some() {
                tracing::debug!(item = %item, "Deleted empty active revision record");
            }
            return Ok(None);
        }
        records.insert(item.clone(), working.clone());
        Ok(Some(working))
    }

    async fn delete(&self, item: &ContentRef) -> Result<bool, CoreError> {
        Ok(self.lock()?.remove(item).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn item() -> ContentRef {
        ContentRef::new("node", "1")
    }

    #[tokio::test]
    async fn load_returns_none_without_mappings() {
        let store = InMemoryMappingStore::new();
        assert!(store.get_mappings_for_item(&item()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_creates_record_lazily() {
        let store = InMemoryMappingStore::new();
        let record = store
            .set_mapping(&item(), "fr", Scope::Any, MappingTarget::Revision(2))
            .await
            .unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn removing_last_entry_deletes_record() {
        let store = InMemoryMappingStore::new();
        store
            .set_mapping(&item(), "fr", Scope::Any, MappingTarget::Revision(2))
            .await
            .unwrap();
        let remaining = store.remove_mapping(&item(), "fr", None).await.unwrap();
        assert!(remaining.is_none());
        assert!(store.load(&item()).await.unwrap().is_none());
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn remove_without_record_is_empty_mapping_removal() {
        let store = InMemoryMappingStore::new();
        assert_matches!(
            store.remove_mapping(&item(), "fr", None).await,
            Err(CoreError::EmptyMappingRemoval { .. })
        );
    }

    #[tokio::test]
    async fn remove_unknown_language_is_not_found() {
        let store = InMemoryMappingStore::new();
        store
            .set_mapping(&item(), "fr", Scope::Any, MappingTarget::Revision(2))
            .await
            .unwrap();
        assert_matches!(
            store
                .remove_mapping(&item(), "fr", Some(Scope::Published))
                .await,
            Err(CoreError::NotFound { entity: "language mapping", .. })
        );
        assert_eq!(store.load(&item()).await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_edit_leaves_record_untouched() {
        let store = InMemoryMappingStore::new();
        store
            .set_mapping(&item(), "fr", Scope::Any, MappingTarget::Revision(2))
            .await
            .unwrap();
        let result = store
            .modify(
                &item(),
                Box::new(|record| {
                    record.set("it", Scope::Any, MappingTarget::Revision(3));
                    Err(CoreError::Conflict("abort".into()))
                }),
            )
            .await;
        assert_matches!(result, Err(CoreError::Conflict(_)));
        let record = store.load(&item()).await.unwrap().unwrap();
        assert_eq!(record.languages(), vec!["fr"]);
    }

    #[tokio::test]
    async fn invalid_edit_result_is_rejected() {
        let store = InMemoryMappingStore::new();
        let result = store
            .modify(
                &item(),
                Box::new(|record| {
                    record.set("fr", Scope::Any, MappingTarget::Revision(2));
                    let dup = record.mappings[0].clone();
                    record.mappings.push(dup);
                    Ok(())
                }),
            )
            .await;
        assert_matches!(result, Err(CoreError::DuplicateMapping { .. }));
        assert!(store.load(&item()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_edits_do_not_lose_languages() {
        let store = Arc::new(InMemoryMappingStore::new());
        let langs = ["fr", "it", "de", "es", "pt", "nl", "pl", "el"];
        let mut handles = Vec::new();
        for (idx, lang) in langs.iter().enumerate() {
            let store = Arc::clone(&store);
            let lang = lang.to_string();
            handles.push(tokio::spawn(async move {
                store
                    .set_mapping(
                        &item(),
                        &lang,
                        Scope::Any,
                        MappingTarget::Revision(idx as i64 + 1),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let record = store.load(&item()).await.unwrap().unwrap();
        assert_eq!(record.len(), langs.len());
    }

    #[tokio::test]
    async fn remove_all_mappings_reports_existence() {
        let store = InMemoryMappingStore::new();
        assert!(!store.remove_all_mappings(&item()).await.unwrap());
        store
            .set_mapping(&item(), "fr", Scope::Any, MappingTarget::Hidden)
            .await
            .unwrap();
        assert!(store.remove_all_mappings(&item()).await.unwrap());
        assert!(store.load(&item()).await.unwrap().is_none());
    }
}
