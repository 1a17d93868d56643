//! Mapping mutations driven by lifecycle events and manual edits.
//!
//! Every operation runs its rules inside one [`MappingStore::modify`] call, so
//! the record is read, changed and written under the item's lock and a
//! failure leaves the previous record in place. Each successful change emits
//! an audit entry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::audit::{self, actions};
use crate::candidates;
use crate::content::TranslationContent;
use crate::error::CoreError;
use crate::graph::{RevisionGraph, RevisionHistory};
use crate::mapping::{ActiveRevisionRecord, MappingTarget, Scope, SetOutcome, HIDDEN_REVISION_ID};
use crate::resolver::{resolve_in_history, Resolution};
use crate::revision::Revision;
use crate::store::MappingStore;
use crate::types::{validate_langcode, ContentRef, RevisionId};

// ---------------------------------------------------------------------------
// Lifecycle choice
// ---------------------------------------------------------------------------

/// Whether a new revision changed translatable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    NeedsNewTranslations,
    NoNewTranslationsNeeded,
}

/// What happens to existing translations when new ones are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingTranslations {
    Keep,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleChoice {
    pub mode: TranslationMode,
    pub existing: ExistingTranslations,
}

impl Default for LifecycleChoice {
    fn default() -> Self {
        Self {
            mode: TranslationMode::NoNewTranslationsNeeded,
            existing: ExistingTranslations::Keep,
        }
    }
}

impl LifecycleChoice {
    pub const fn no_new_translations() -> Self {
        Self {
            mode: TranslationMode::NoNewTranslationsNeeded,
            existing: ExistingTranslations::Keep,
        }
    }

    pub const fn needs_new_translations(existing: ExistingTranslations) -> Self {
        Self {
            mode: TranslationMode::NeedsNewTranslations,
            existing,
        }
    }
}

/// What a lifecycle transition did to the item's mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    /// Default revision the new revision superseded.
    pub previous_default: Option<RevisionId>,
    /// Languages written at the requested scope.
    pub mapped: Vec<String>,
    /// Languages newly translated on the new revision, left unmapped.
    pub native: Vec<String>,
    /// Carried-over translations dropped from the new revision.
    pub deleted_translations: Vec<String>,
    /// Whether all mappings of the item were removed.
    pub cleared: bool,
}

impl LifecycleOutcome {
    pub fn is_noop(&self) -> bool {
        self.mapped.is_empty()
            && self.native.is_empty()
            && self.deleted_translations.is_empty()
            && !self.cleared
    }
}

// ---------------------------------------------------------------------------
// Manual edit request
// ---------------------------------------------------------------------------

/// A mapping edit as submitted by a UI or API caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MappingRequest {
    #[validate(length(min = 2, max = 35), custom(function = "validate_langcode_field"))]
    pub langcode: String,
    pub scope: Scope,
    /// `0` maps to hidden.
    #[validate(range(min = 0))]
    pub revision_id: RevisionId,
}

impl MappingRequest {
    pub fn target(&self) -> MappingTarget {
        MappingTarget::from_revision_id(self.revision_id)
    }
}

fn validate_langcode_field(langcode: &str) -> Result<(), ValidationError> {
    validate_langcode(langcode).map_err(|_| ValidationError::new("langcode"))
}

/// Result of a scoped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopedWrite {
    pub outcome: SetOutcome,
    pub lines_diverged: bool,
    /// An ANY write while the lines are diverged changes both of them.
    pub affects_both_lines: bool,
}

// ---------------------------------------------------------------------------
// Mutator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MappingMutator {
    graph: RevisionGraph,
    store: Arc<dyn MappingStore>,
    content: Arc<dyn TranslationContent>,
}

impl MappingMutator {
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

    /// Update mappings after `new_revision` became validated or published.
    pub async fn apply_lifecycle_choice(
        &self,
        item: &ContentRef,
        new_revision: RevisionId,
        choice: LifecycleChoice,
        scope: Scope,
    ) -> Result<LifecycleOutcome, CoreError> {
        let history = self.graph.history(item).await?;
        let new = history.get(new_revision)?;
        if !new.state.is_default_state() {
            return Err(CoreError::Validation(format!(
                "Revision {} is in state '{}'; translation handling applies to validated or published revisions",
                new.id, new.state
            )));
        }

        let Some(previous) = history.previous_default(new) else {
            tracing::debug!(item = %item, new_revision, "No previous default revision");
            return Ok(LifecycleOutcome::default());
        };

        let record = self.store.load(item).await?;
        let languages = languages_on(previous, record.as_ref());
        if languages.is_empty() {
            tracing::debug!(
                item = %item,
                previous = previous.id,
                "Previous default revision has no translations"
            );
            return Ok(LifecycleOutcome {
                previous_default: Some(previous.id),
                ..Default::default()
            });
        }

        let outcome = match (choice.mode, choice.existing) {
            (TranslationMode::NoNewTranslationsNeeded, _) => {
                self.carry_mappings(&history, new, previous, scope).await?
            }
            (TranslationMode::NeedsNewTranslations, ExistingTranslations::Keep) => {
                LifecycleOutcome {
                    previous_default: Some(previous.id),
                    ..Default::default()
                }
            }
            (TranslationMode::NeedsNewTranslations, ExistingTranslations::Delete) => {
                self.drop_translations(item, new, previous).await?
            }
        };

        if !outcome.is_noop() {
            audit::record(
                actions::LIFECYCLE_APPLIED,
                item,
                &format!(
                    "Revision {} ({:?}, {:?}, {scope}): mapped [{}], native [{}], deleted [{}]{}",
                    new.id,
                    choice.mode,
                    choice.existing,
                    outcome.mapped.join(", "),
                    outcome.native.join(", "),
                    outcome.deleted_translations.join(", "),
                    if outcome.cleared { ", mappings cleared" } else { "" },
                ),
            );
        }
        Ok(outcome)
    }

    async fn carry_mappings(
        &self,
        history: &RevisionHistory,
        new: &Revision,
        previous: &Revision,
        scope: Scope,
    ) -> Result<LifecycleOutcome, CoreError> {
        let mut outcome = LifecycleOutcome {
            previous_default: Some(previous.id),
            ..Default::default()
        };
        let out = &mut outcome;
        self.store
            .modify(
                history.item(),
                Box::new(move |record| {
                    let snapshot = record.clone();
                    let mut langcodes = languages_on(previous, Some(&snapshot));
                    for langcode in new.languages() {
                        if !langcodes.iter().any(|l| l == langcode) {
                            langcodes.push(langcode.to_string());
                        }
                    }
                    for langcode in langcodes {
                        let introduced = new
                            .translation_origin(&langcode)
                            .is_some_and(|origin| origin > previous.id);
                        if introduced {
                            record.remove(&langcode, Some(scope));
                            out.native.push(langcode);
                            continue;
                        }
                        let target =
                            match resolve_in_history(history, Some(&snapshot), previous, &langcode)
                            {
                                Resolution::Render(id) => MappingTarget::Revision(id),
                                Resolution::Hidden => MappingTarget::Hidden,
                                Resolution::Untranslated => continue,
                            };
                        record.set(&langcode, scope, target);
                        if scope == Scope::Any {
                            collapse_published(record, &langcode, target);
                        }
                        out.mapped.push(langcode);
                    }
                    Ok(())
                }),
            )
            .await?;
        Ok(outcome)
    }

    async fn drop_translations(
        &self,
        item: &ContentRef,
        new: &Revision,
        previous: &Revision,
    ) -> Result<LifecycleOutcome, CoreError> {
        let mut outcome = LifecycleOutcome {
            previous_default: Some(previous.id),
            ..Default::default()
        };
        for langcode in new.languages() {
            if new.is_carried_over(langcode) {
                self.content
                    .delete_translation(item, new.id, langcode)
                    .await?;
                outcome.deleted_translations.push(langcode.to_string());
            }
        }
        outcome.cleared = self.store.remove_all_mappings(item).await?;
        Ok(outcome)
    }

    /// Remove the mapping for `langcode` (in `scope`, or in every scope).
    pub async fn remove_mapping(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Option<Scope>,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        let remaining = self.store.remove_mapping(item, langcode, scope).await?;
        let scope_label = scope.map_or_else(|| "all scopes".to_string(), |s| s.to_string());
        audit::record(
            actions::MAPPING_REMOVED,
            item,
            &format!("Removed mapping for {langcode} ({scope_label})"),
        );
        if remaining.is_none() {
            tracing::debug!(item = %item, "Last mapping removed, record deleted");
        }
        Ok(remaining)
    }

    /// Create or update the mapping for `langcode` at `scope`.
    ///
    /// Concrete targets must be candidates for the language; hidden is always
    /// accepted. Writing the same target twice is a no-op.
    pub async fn set_or_update_mapping(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Scope,
        target: MappingTarget,
    ) -> Result<SetOutcome, CoreError> {
        let history = self.checked_history(item, langcode, target).await?;
        self.write(&history, langcode, scope, target, WriteMode::Upsert)
            .await
    }

    /// Validate and apply a [`MappingRequest`].
    pub async fn apply_request(
        &self,
        item: &ContentRef,
        request: &MappingRequest,
    ) -> Result<SetOutcome, CoreError> {
        request
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        self.set_or_update_mapping(item, &request.langcode, request.scope, request.target())
            .await
    }

    /// Create a mapping; an existing entry at `scope` is a `DuplicateMapping`.
    pub async fn add_mapping(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Scope,
        target: MappingTarget,
    ) -> Result<SetOutcome, CoreError> {
        let history = self.checked_history(item, langcode, target).await?;
        self.write(&history, langcode, scope, target, WriteMode::InsertOnly)
            .await
    }

    pub async fn hide_translation(
        &self,
        item: &ContentRef,
        langcode: &str,
        scope: Scope,
    ) -> Result<SetOutcome, CoreError> {
        self.set_or_update_mapping(item, langcode, scope, MappingTarget::Hidden)
            .await
    }

    /// Write exactly `scope` and report how the write relates to the lines.
    ///
    /// Never splits an ANY entry into per-line entries; callers that want
    /// different targets per line write each scope explicitly.
    pub async fn cascade_scope_on_write(
        &self,
        item: &ContentRef,
        langcode: &str,
        target: MappingTarget,
        scope: Scope,
    ) -> Result<ScopedWrite, CoreError> {
        let history = self.checked_history(item, langcode, target).await?;
        let lines_diverged = history.lines_diverged();
        let outcome = self
            .write(&history, langcode, scope, target, WriteMode::Upsert)
            .await?;
        Ok(ScopedWrite {
            outcome,
            lines_diverged,
            affects_both_lines: lines_diverged && scope == Scope::Any,
        })
    }

    /// Drop every mapping that targets a deleted revision.
    pub async fn on_revision_deleted(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
    ) -> Result<usize, CoreError> {
        if revision_id == HIDDEN_REVISION_ID {
            return Err(CoreError::Validation(
                "Revision id 0 is reserved for hidden mappings".into(),
            ));
        }
        let mut removed = 0;
        let count = &mut removed;
        self.store
            .modify(
                item,
                Box::new(move |record| {
                    *count = record.remove_targeting(revision_id);
                    Ok(())
                }),
            )
            .await?;
        if removed > 0 {
            audit::record(
                actions::REVISION_DELETED,
                item,
                &format!("Revision {revision_id} deleted, removed {removed} mapping(s)"),
            );
        }
        Ok(removed)
    }

    /// Drop the item's record. Returns `true` if one existed.
    pub async fn on_item_deleted(&self, item: &ContentRef) -> Result<bool, CoreError> {
        let existed = self.store.remove_all_mappings(item).await?;
        if existed {
            audit::record(actions::ITEM_DELETED, item, "Item deleted, mappings removed");
        }
        Ok(existed)
    }

    /// Delete the translation of `langcode` from one revision.
    ///
    /// Refused while a mapping governs the revision's line for the language;
    /// the mapping has to be removed first.
    pub async fn delete_translation(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
        langcode: &str,
    ) -> Result<(), CoreError> {
        let history = self.graph.history(item).await?;
        let revision = history.get(revision_id)?;
        if !revision.has_translation(langcode) {
            return Err(CoreError::not_found(
                "translation",
                format!("{langcode} on revision {revision_id}"),
            ));
        }
        let record = self.store.load(item).await?;
        if let Some(mapping) = record
            .as_ref()
            .and_then(|r| r.lookup(langcode, revision.line()))
        {
            return Err(CoreError::Conflict(format!(
                "Translation '{langcode}' of revision {revision_id} is mapped to {} ({}); remove the mapping first",
                mapping.target(),
                mapping.scope
            )));
        }
        self.content
            .delete_translation(item, revision_id, langcode)
            .await?;
        audit::record(
            actions::TRANSLATION_DELETED,
            item,
            &format!("Deleted {langcode} translation from revision {revision_id}"),
        );
        Ok(())
    }

    // -- internals --

    /// Load the history after checking the language and the target exist.
    async fn checked_history(
        &self,
        item: &ContentRef,
        langcode: &str,
        target: MappingTarget,
    ) -> Result<RevisionHistory, CoreError> {
        validate_langcode(langcode)?;
        let history = self.graph.history(item).await?;
        if let MappingTarget::Revision(id) = target {
            history.get(id)?;
        }
        Ok(history)
    }

    async fn write(
        &self,
        history: &RevisionHistory,
        langcode: &str,
        scope: Scope,
        target: MappingTarget,
        mode: WriteMode,
    ) -> Result<SetOutcome, CoreError> {
        let mut outcome = SetOutcome::Unchanged;
        let out = &mut outcome;
        self.store
            .modify(
                history.item(),
                Box::new(move |record| {
                    if let MappingTarget::Revision(id) = target {
                        check_candidate(history, record, langcode, id)?;
                    }
                    *out = match mode {
                        WriteMode::Upsert => record.set(langcode, scope, target),
                        WriteMode::InsertOnly => {
                            record.insert(langcode, scope, target)?;
                            SetOutcome::Inserted
                        }
                    };
                    Ok(())
                }),
            )
            .await?;

        let action = match mode {
            WriteMode::Upsert => actions::MAPPING_SET,
            WriteMode::InsertOnly => actions::MAPPING_ADDED,
        };
        match outcome {
            SetOutcome::Unchanged => {}
            SetOutcome::Inserted => audit::record(
                action,
                history.item(),
                &audit::describe_write(langcode, scope, target),
            ),
            SetOutcome::Updated { previous } => audit::record(
                action,
                history.item(),
                &format!(
                    "{} (was {previous})",
                    audit::describe_write(langcode, scope, target)
                ),
            ),
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Upsert,
    InsertOnly,
}

/// Languages with content on `previous` or with a mapping governing its line.
fn languages_on(previous: &Revision, record: Option<&ActiveRevisionRecord>) -> Vec<String> {
    let mut langs: Vec<String> = previous.languages().map(str::to_string).collect();
    if let Some(record) = record {
        for langcode in record.languages() {
            let governs = record.lookup(langcode, previous.line()).is_some();
            if governs && !langs.iter().any(|l| l == langcode) {
                langs.push(langcode.to_string());
            }
        }
    }
    langs
}

/// Fold a PUBLISHED entry into a fresh ANY entry with the same target.
fn collapse_published(record: &mut ActiveRevisionRecord, langcode: &str, target: MappingTarget) {
    let same = record
        .get(langcode, Scope::Published)
        .is_some_and(|m| m.target() == target);
    if same {
        record.remove(langcode, Some(Scope::Published));
    }
}

fn check_candidate(
    history: &RevisionHistory,
    record: &ActiveRevisionRecord,
    langcode: &str,
    revision_id: RevisionId,
) -> Result<(), CoreError> {
    let revision = history.get(revision_id)?;
    let invalid = |reason: String| CoreError::InvalidCandidate {
        language: langcode.to_string(),
        revision_id,
        reason,
    };
    if !revision.state.is_default_state() {
        return Err(invalid(format!(
            "revision is in state '{}'",
            revision.state
        )));
    }
    if !revision.has_translation(langcode) {
        return Err(invalid("revision has no translation for the language".into()));
    }
    let list = candidates::enumerate(history, Some(record), langcode, true);
    if !list.accepts(revision_id) {
        let listed: Vec<String> = list.candidates.iter().map(|c| c.label()).collect();
        return Err(invalid(format!(
            "not among the candidate versions [{}]",
            listed.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::{ModerationState, Version};

    #[test]
    fn default_choice_keeps_existing_translations() {
        assert_eq!(LifecycleChoice::default(), LifecycleChoice::no_new_translations());
    }

    #[test]
    fn request_validation_rejects_bad_langcode_and_negative_revision() {
        let ok = MappingRequest {
            langcode: "fr".into(),
            scope: Scope::Any,
            revision_id: 3,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.target(), MappingTarget::Revision(3));

        let bad_lang = MappingRequest {
            langcode: "French".into(),
            ..ok.clone()
        };
        assert!(bad_lang.validate().is_err());

        let negative = MappingRequest {
            revision_id: -1,
            ..ok.clone()
        };
        assert!(negative.validate().is_err());

        let hidden = MappingRequest {
            revision_id: 0,
            ..ok
        };
        assert_eq!(hidden.target(), MappingTarget::Hidden);
    }

    #[test]
    fn languages_on_merges_content_and_governing_mappings() {
        let item = ContentRef::new("node", "1");
        let previous = Revision::new(2, ModerationState::Published, Version::new(2, 0, 0))
            .with_carried_translation("fr", 1);
        let mut record = ActiveRevisionRecord::new(item);
        record.set("fr", Scope::Any, MappingTarget::Revision(1));
        record.set("it", Scope::Any, MappingTarget::Hidden);
        // Published-only entries do not govern the validated line.
        record.set("de", Scope::Published, MappingTarget::Revision(1));
        assert_eq!(languages_on(&previous, Some(&record)), vec!["fr", "it", "de"]);

        let validated = Revision::new(3, ModerationState::Validated, Version::new(3, 0, 0));
        assert_eq!(languages_on(&validated, Some(&record)), vec!["fr", "it"]);
    }

    #[test]
    fn collapse_removes_only_identical_published_entry() {
        let mut record = ActiveRevisionRecord::new(ContentRef::new("node", "1"));
        record.set("fr", Scope::Published, MappingTarget::Revision(1));
        record.set("fr", Scope::Any, MappingTarget::Revision(1));
        collapse_published(&mut record, "fr", MappingTarget::Revision(1));
        assert_eq!(record.len(), 1);
        assert_eq!(record.mappings[0].scope, Scope::Any);

        record.set("it", Scope::Published, MappingTarget::Revision(2));
        record.set("it", Scope::Any, MappingTarget::Revision(1));
        collapse_published(&mut record, "it", MappingTarget::Revision(1));
        assert!(record.get("it", Scope::Published).is_some());
    }
}
