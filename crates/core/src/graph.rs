//! Read-only access to an item's revision history.
//!
//! The host implements [`RevisionSource`]; [`RevisionGraph`] wraps it and
//! answers the questions the mapping engine asks (defaults per line, latest
//! revision, divergence). [`RevisionHistory`] is a loaded snapshot so the
//! engine can run its rules synchronously, inside a store edit.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::revision::{ModerationLine, ModerationState, Revision};
use crate::types::{ContentRef, RevisionId};

/// Host collaborator listing the revisions of a content item.
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// All revisions of `item`. An unknown item yields an empty list.
    async fn list_revisions(&self, item: &ContentRef) -> Result<Vec<Revision>, CoreError>;
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The revisions of one item, oldest first. Never empty.
#[derive(Debug, Clone)]
pub struct RevisionHistory {
    item: ContentRef,
    revisions: Vec<Revision>,
}

impl RevisionHistory {
    /// Build a snapshot, ordering revisions by id.
    ///
    /// Returns `NotFound` when the host knows no revision for the item.
    pub fn new(item: ContentRef, mut revisions: Vec<Revision>) -> Result<Self, CoreError> {
        if revisions.is_empty() {
            return Err(CoreError::not_found("content item", &item));
        }
        revisions.sort_by_key(|r| r.id);
        revisions.dedup_by_key(|r| r.id);
        Ok(Self { item, revisions })
    }

    pub fn item(&self) -> &ContentRef {
        &self.item
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn latest(&self) -> &Revision {
        // Non-empty by construction.
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn find(&self, revision_id: RevisionId) -> Option<&Revision> {
        self.revisions
            .binary_search_by_key(&revision_id, |r| r.id)
            .ok()
            .map(|idx| &self.revisions[idx])
    }

    pub fn get(&self, revision_id: RevisionId) -> Result<&Revision, CoreError> {
        self.find(revision_id)
            .ok_or_else(|| CoreError::not_found("revision", revision_id))
    }

    /// Default revision of a moderation line.
    ///
    /// The published default is the newest published revision unless it has
    /// since been archived. The validated default is the newest validated or
    /// published revision.
    pub fn default_revision(&self, line: ModerationLine) -> Option<&Revision> {
        match line {
            ModerationLine::Published => {
                let newest = self.revisions.iter().rev().find(|r| {
                    matches!(
                        r.state,
                        ModerationState::Published | ModerationState::Archived
                    )
                })?;
                (newest.state == ModerationState::Published).then_some(newest)
            }
            ModerationLine::Validated => self
                .revisions
                .iter()
                .rev()
                .find(|r| r.state.is_default_state()),
        }
    }

    /// `true` when a validated version exists next to a different published one.
    pub fn lines_diverged(&self) -> bool {
        match (
            self.default_revision(ModerationLine::Published),
            self.default_revision(ModerationLine::Validated),
        ) {
            (Some(published), Some(validated)) => published.id != validated.id,
            _ => false,
        }
    }

    /// The default revision a new revision supersedes: the newest validated
    /// or published revision older than `revision` carrying another version.
    pub fn previous_default(&self, revision: &Revision) -> Option<&Revision> {
        self.revisions
            .iter()
            .rev()
            .filter(|r| r.id < revision.id)
            .find(|r| r.state.is_default_state() && r.version != revision.version)
    }
}

// ---------------------------------------------------------------------------
// Accessor
// ---------------------------------------------------------------------------

/// Async accessor over a [`RevisionSource`].
#[derive(Clone)]
pub struct RevisionGraph {
    source: Arc<dyn RevisionSource>,
}

impl RevisionGraph {
    pub fn new(source: Arc<dyn RevisionSource>) -> Self {
        Self { source }
    }

    /// Load a snapshot of the item's history.
    pub async fn history(&self, item: &ContentRef) -> Result<RevisionHistory, CoreError> {
        let revisions = self.source.list_revisions(item).await?;
        RevisionHistory::new(item.clone(), revisions)
    }

    pub async fn list_revisions(&self, item: &ContentRef) -> Result<Vec<Revision>, CoreError> {
        Ok(self.history(item).await?.revisions)
    }

    pub async fn default_revision(
        &self,
        item: &ContentRef,
        line: ModerationLine,
    ) -> Result<Option<Revision>, CoreError> {
        Ok(self.history(item).await?.default_revision(line).cloned())
    }

    pub async fn latest_revision(&self, item: &ContentRef) -> Result<Revision, CoreError> {
        Ok(self.history(item).await?.latest().clone())
    }

    pub async fn revision(
        &self,
        item: &ContentRef,
        revision_id: RevisionId,
    ) -> Result<Revision, CoreError> {
        self.history(item).await?.get(revision_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::Version;
    use assert_matches::assert_matches;

    fn item() -> ContentRef {
        ContentRef::new("node", "1")
    }

    fn rev(id: RevisionId, state: ModerationState, major: u32) -> Revision {
        Revision::new(id, state, Version::new(major, 0, 0))
    }

    #[test]
    fn empty_history_is_not_found() {
        assert_matches!(
            RevisionHistory::new(item(), vec![]),
            Err(CoreError::NotFound { entity: "content item", .. })
        );
    }

    #[test]
    fn revisions_are_sorted_by_id() {
        let history = RevisionHistory::new(
            item(),
            vec![
                rev(3, ModerationState::Draft, 2),
                rev(1, ModerationState::Draft, 1),
                rev(2, ModerationState::Published, 1),
            ],
        )
        .unwrap();
        let ids: Vec<_> = history.revisions().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(history.latest().id, 3);
    }

    #[test]
    fn defaults_converge_when_published_is_newest() {
        let history = RevisionHistory::new(
            item(),
            vec![
                rev(1, ModerationState::Validated, 1),
                rev(2, ModerationState::Published, 1),
                rev(3, ModerationState::Draft, 2),
            ],
        )
        .unwrap();
        assert_eq!(
            history.default_revision(ModerationLine::Published).unwrap().id,
            2
        );
        assert_eq!(
            history.default_revision(ModerationLine::Validated).unwrap().id,
            2
        );
        assert!(!history.lines_diverged());
    }

    #[test]
    fn parallel_validated_version_diverges_lines() {
        let history = RevisionHistory::new(
            item(),
            vec![
                rev(1, ModerationState::Published, 1),
                rev(2, ModerationState::Published, 2),
                rev(3, ModerationState::Validated, 3),
            ],
        )
        .unwrap();
        assert_eq!(
            history.default_revision(ModerationLine::Published).unwrap().id,
            2
        );
        assert_eq!(
            history.default_revision(ModerationLine::Validated).unwrap().id,
            3
        );
        assert!(history.lines_diverged());
    }

    #[test]
    fn archived_item_has_no_published_default() {
        let history = RevisionHistory::new(
            item(),
            vec![
                rev(1, ModerationState::Published, 1),
                rev(2, ModerationState::Archived, 1),
            ],
        )
        .unwrap();
        assert!(history.default_revision(ModerationLine::Published).is_none());
        assert!(!history.lines_diverged());
    }

    #[test]
    fn previous_default_skips_drafts_and_same_version() {
        let history = RevisionHistory::new(
            item(),
            vec![
                rev(1, ModerationState::Published, 1),
                rev(2, ModerationState::Draft, 2),
                rev(3, ModerationState::Validated, 2),
                rev(4, ModerationState::Published, 2),
            ],
        )
        .unwrap();
        let promoted = history.find(4).unwrap();
        assert_eq!(history.previous_default(promoted).unwrap().id, 1);
        let first = history.find(1).unwrap();
        assert!(history.previous_default(first).is_none());
    }

    #[test]
    fn get_unknown_revision_is_not_found() {
        let history =
            RevisionHistory::new(item(), vec![rev(1, ModerationState::Draft, 1)]).unwrap();
        assert_matches!(
            history.get(9),
            Err(CoreError::NotFound { entity: "revision", .. })
        );
    }
}
