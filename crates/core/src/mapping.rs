//! Language-revision mappings and the per-item record holding them.
//!
//! A mapping says: for `langcode`, in `scope`, render the translation of
//! `revision_id` instead of the viewed revision's own. `revision_id = 0` is
//! the hidden sentinel. The record keeps entries in insertion order and never
//! holds two entries for the same language and scope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::revision::ModerationLine;
use crate::types::{ContentRef, RevisionId};

/// Stored revision id meaning "hide this translation".
pub const HIDDEN_REVISION_ID: RevisionId = 0;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Applies whichever line is viewed.
    Any,
    /// Applies only when resolving the published line.
    Published,
}

impl Scope {
    pub fn as_i16(self) -> i16 {
        match self {
            Scope::Any => 0,
            Scope::Published => 1,
        }
    }

    pub fn from_i16(value: i16) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Scope::Any),
            1 => Ok(Scope::Published),
            other => Err(CoreError::Validation(format!(
                "Unknown mapping scope {other}"
            ))),
        }
    }

    /// Scopes consulted for a line, most specific first.
    pub fn lookup_order(line: ModerationLine) -> &'static [Scope] {
        match line {
            ModerationLine::Published => &[Scope::Published, Scope::Any],
            ModerationLine::Validated => &[Scope::Any],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Any => f.write_str("any"),
            Scope::Published => f.write_str("published"),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingTarget {
    Hidden,
    Revision(RevisionId),
}

impl MappingTarget {
    pub fn from_revision_id(revision_id: RevisionId) -> Self {
        if revision_id == HIDDEN_REVISION_ID {
            MappingTarget::Hidden
        } else {
            MappingTarget::Revision(revision_id)
        }
    }

    pub fn revision_id(self) -> RevisionId {
        match self {
            MappingTarget::Hidden => HIDDEN_REVISION_ID,
            MappingTarget::Revision(id) => id,
        }
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingTarget::Hidden => f.write_str("\"hidden\""),
            MappingTarget::Revision(id) => write!(f, "revision {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRevisionMapping {
    pub entity_type: String,
    pub entity_id: String,
    pub revision_id: RevisionId,
    pub langcode: String,
    pub scope: Scope,
}

impl LanguageRevisionMapping {
    pub fn target(&self) -> MappingTarget {
        MappingTarget::from_revision_id(self.revision_id)
    }

    pub fn is_hidden(&self) -> bool {
        self.revision_id == HIDDEN_REVISION_ID
    }
}

/// Result of an upsert on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    Inserted,
    Updated { previous: MappingTarget },
    Unchanged,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRevisionRecord {
    pub item: ContentRef,
    pub mappings: Vec<LanguageRevisionMapping>,
}

impl ActiveRevisionRecord {
    pub fn new(item: ContentRef) -> Self {
        Self {
            item,
            mappings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn get(&self, langcode: &str, scope: Scope) -> Option<&LanguageRevisionMapping> {
        self.mappings
            .iter()
            .find(|m| m.langcode == langcode && m.scope == scope)
    }

    pub fn for_language<'a>(
        &'a self,
        langcode: &'a str,
    ) -> impl Iterator<Item = &'a LanguageRevisionMapping> + 'a {
        self.mappings.iter().filter(move |m| m.langcode == langcode)
    }

    /// The entry governing `langcode` when resolving `line`.
    pub fn lookup(&self, langcode: &str, line: ModerationLine) -> Option<&LanguageRevisionMapping> {
        Scope::lookup_order(line)
            .iter()
            .find_map(|scope| self.get(langcode, *scope))
    }

    /// Distinct mapped languages, in first-seen order.
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = Vec::new();
        for m in &self.mappings {
            if !langs.contains(&m.langcode.as_str()) {
                langs.push(&m.langcode);
            }
        }
        langs
    }

    /// Insert or update the entry for `langcode` + `scope`.
    pub fn set(&mut self, langcode: &str, scope: Scope, target: MappingTarget) -> SetOutcome {
        let revision_id = target.revision_id();
        if let Some(existing) = self
            .mappings
            .iter_mut()
            .find(|m| m.langcode == langcode && m.scope == scope)
        {
            if existing.revision_id == revision_id {
                return SetOutcome::Unchanged;
            }
            let previous = existing.target();
            existing.revision_id = revision_id;
            return SetOutcome::Updated { previous };
        }
        let entry = self.entry(langcode, scope, revision_id);
        self.mappings.push(entry);
        SetOutcome::Inserted
    }

    /// Insert a new entry, refusing to touch an existing one.
    pub fn insert(
        &mut self,
        langcode: &str,
        scope: Scope,
        target: MappingTarget,
    ) -> Result<(), CoreError> {
        if self.get(langcode, scope).is_some() {
            return Err(CoreError::DuplicateMapping {
                language: langcode.to_string(),
                scope,
            });
        }
        let entry = self.entry(langcode, scope, target.revision_id());
        self.mappings.push(entry);
        Ok(())
    }

    /// Remove the entry for `langcode` in `scope`, or in every scope when
    /// `scope` is `None`. Returns how many entries were removed.
    pub fn remove(&mut self, langcode: &str, scope: Option<Scope>) -> usize {
        let before = self.mappings.len();
        self.mappings
            .retain(|m| !(m.langcode == langcode && scope.map_or(true, |s| s == m.scope)));
        before - self.mappings.len()
    }

    /// Remove every entry pointing at `revision_id`.
    pub fn remove_targeting(&mut self, revision_id: RevisionId) -> usize {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.revision_id != revision_id);
        before - self.mappings.len()
    }

    /// Check the structural invariants before the record is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (idx, m) in self.mappings.iter().enumerate() {
            if m.entity_type != self.item.entity_type || m.entity_id != self.item.entity_id {
                return Err(CoreError::Internal(format!(
                    "Mapping for '{}' belongs to {}/{}, not {}",
                    m.langcode, m.entity_type, m.entity_id, self.item
                )));
            }
            if m.revision_id < HIDDEN_REVISION_ID {
                return Err(CoreError::Validation(format!(
                    "Negative revision id {} for language '{}'",
                    m.revision_id, m.langcode
                )));
            }
            if self.mappings[..idx]
                .iter()
                .any(|other| other.langcode == m.langcode && other.scope == m.scope)
            {
                return Err(CoreError::DuplicateMapping {
                    language: m.langcode.clone(),
                    scope: m.scope,
                });
            }
        }
        Ok(())
    }

    fn entry(&self, langcode: &str, scope: Scope, revision_id: RevisionId) -> LanguageRevisionMapping {
        LanguageRevisionMapping {
            entity_type: self.item.entity_type.clone(),
            entity_id: self.item.entity_id.clone(),
            revision_id,
            langcode: langcode.to_string(),
            scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn record() -> ActiveRevisionRecord {
        ActiveRevisionRecord::new(ContentRef::new("node", "7"))
    }

    #[test]
    fn scope_round_trips_through_i16() {
        assert_eq!(Scope::from_i16(0).unwrap(), Scope::Any);
        assert_eq!(Scope::from_i16(1).unwrap(), Scope::Published);
        assert_eq!(Scope::Published.as_i16(), 1);
        assert!(Scope::from_i16(2).is_err());
    }

    #[test]
    fn zero_revision_is_hidden() {
        assert_eq!(MappingTarget::from_revision_id(0), MappingTarget::Hidden);
        assert_eq!(MappingTarget::from_revision_id(4), MappingTarget::Revision(4));
        assert_eq!(MappingTarget::Hidden.revision_id(), 0);
    }

    #[test]
    fn set_is_idempotent() {
        let mut rec = record();
        assert_eq!(rec.set("fr", Scope::Any, MappingTarget::Revision(3)), SetOutcome::Inserted);
        assert_eq!(rec.set("fr", Scope::Any, MappingTarget::Revision(3)), SetOutcome::Unchanged);
        assert_eq!(rec.len(), 1);
        assert_eq!(
            rec.set("fr", Scope::Any, MappingTarget::Hidden),
            SetOutcome::Updated {
                previous: MappingTarget::Revision(3)
            }
        );
        assert_eq!(rec.len(), 1);
        assert!(rec.mappings[0].is_hidden());
    }

    #[test]
    fn entries_carry_the_item_reference() {
        let mut rec = record();
        rec.set("fr", Scope::Any, MappingTarget::Revision(3));
        assert_eq!(rec.mappings[0].entity_type, "node");
        assert_eq!(rec.mappings[0].entity_id, "7");
    }

    #[test]
    fn insert_refuses_duplicates() {
        let mut rec = record();
        rec.insert("fr", Scope::Any, MappingTarget::Revision(3)).unwrap();
        assert_matches!(
            rec.insert("fr", Scope::Any, MappingTarget::Revision(4)),
            Err(CoreError::DuplicateMapping { scope: Scope::Any, .. })
        );
        rec.insert("fr", Scope::Published, MappingTarget::Revision(4))
            .unwrap();
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn lookup_prefers_published_scope_on_published_line() {
        let mut rec = record();
        rec.set("fr", Scope::Any, MappingTarget::Revision(1));
        rec.set("fr", Scope::Published, MappingTarget::Revision(2));
        assert_eq!(
            rec.lookup("fr", ModerationLine::Published).unwrap().revision_id,
            2
        );
        assert_eq!(
            rec.lookup("fr", ModerationLine::Validated).unwrap().revision_id,
            1
        );
    }

    #[test]
    fn published_only_entry_is_ignored_on_validated_line() {
        let mut rec = record();
        rec.set("fr", Scope::Published, MappingTarget::Revision(2));
        assert!(rec.lookup("fr", ModerationLine::Validated).is_none());
    }

    #[test]
    fn remove_without_scope_drops_all_scopes() {
        let mut rec = record();
        rec.set("fr", Scope::Any, MappingTarget::Revision(1));
        rec.set("fr", Scope::Published, MappingTarget::Revision(2));
        rec.set("it", Scope::Any, MappingTarget::Revision(2));
        assert_eq!(rec.remove("fr", Some(Scope::Published)), 1);
        assert_eq!(rec.remove("fr", None), 1);
        assert_eq!(rec.remove("fr", None), 0);
        assert_eq!(rec.languages(), vec!["it"]);
    }

    #[test]
    fn remove_targeting_drops_matching_entries() {
        let mut rec = record();
        rec.set("fr", Scope::Any, MappingTarget::Revision(1));
        rec.set("it", Scope::Any, MappingTarget::Revision(2));
        rec.set("de", Scope::Published, MappingTarget::Revision(1));
        assert_eq!(rec.remove_targeting(1), 2);
        assert_eq!(rec.languages(), vec!["it"]);
    }

    #[test]
    fn validate_detects_duplicates_and_foreign_entries() {
        let mut rec = record();
        rec.set("fr", Scope::Any, MappingTarget::Revision(1));
        assert!(rec.validate().is_ok());

        let mut dup = rec.clone();
        dup.mappings.push(dup.mappings[0].clone());
        assert_matches!(dup.validate(), Err(CoreError::DuplicateMapping { .. }));

        let mut foreign = rec.clone();
        foreign.mappings[0].entity_id = "8".into();
        assert_matches!(foreign.validate(), Err(CoreError::Internal(_)));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut rec = record();
        rec.set("it", Scope::Any, MappingTarget::Revision(2));
        rec.set("fr", Scope::Any, MappingTarget::Revision(1));
        rec.set("it", Scope::Any, MappingTarget::Hidden);
        let langs: Vec<_> = rec.mappings.iter().map(|m| m.langcode.as_str()).collect();
        assert_eq!(langs, vec!["it", "fr"]);
    }
}
