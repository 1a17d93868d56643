//! Legal mapping targets for a language.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::graph::{RevisionGraph, RevisionHistory};
use crate::mapping::{ActiveRevisionRecord, Scope};
use crate::revision::{ModerationState, Revision, Version};
use crate::store::MappingStore;
use crate::types::{ContentRef, RevisionId};

pub const BOTH_LINES_NOTICE: &str = "Please be aware that updating this mapping will apply to \
     both the currently Published version and the new Validated major version.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub revision_id: RevisionId,
    pub version: Version,
    pub state: ModerationState,
    /// Later default revisions share this revision's translation.
    pub carried_over: bool,
    /// Those later revisions, outside the excluded current version. They are
    /// listed under this candidate and are legal targets too.
    pub carried_to: Vec<RevisionId>,
}

impl Candidate {
    /// `1.0.0`, or `1.0.0 (carried over)`.
    pub fn label(&self) -> String {
        if self.carried_over {
            format!("{} (carried over)", self.version)
        } else {
            self.version.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateList {
    pub language: String,
    pub candidates: Vec<Candidate>,
    /// The language's current ANY mapping governs two diverged lines.
    pub affects_both_lines: bool,
}

impl CandidateList {
    /// `true` when `revision_id` is listed as a candidate.
    pub fn contains(&self, revision_id: RevisionId) -> bool {
        self.candidates.iter().any(|c| c.revision_id == revision_id)
    }

    /// `true` when `revision_id` may be mapped to: a listed candidate or a
    /// later revision carrying a listed candidate's translation.
    pub fn accepts(&self, revision_id: RevisionId) -> bool {
        self.candidates
            .iter()
            .any(|c| c.revision_id == revision_id || c.carried_to.contains(&revision_id))
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn notice(&self) -> Option<&'static str> {
        self.affects_both_lines.then_some(BOTH_LINES_NOTICE)
    }
}

/// Enumerate candidates from a loaded history.
pub fn enumerate(
    history: &RevisionHistory,
    record: Option<&ActiveRevisionRecord>,
    langcode: &str,
    exclude_current: bool,
) -> CandidateList {
    // Newest validated/published revision per version that has the language.
    let mut per_version: BTreeMap<Version, &Revision> = BTreeMap::new();
    for revision in history.revisions() {
        if revision.state.is_default_state() && revision.has_translation(langcode) {
            per_version.insert(revision.version, revision);
        }
    }

    // Collapse revisions sharing a content origin onto the earliest one.
    let mut groups: BTreeMap<RevisionId, Vec<&Revision>> = BTreeMap::new();
    for revision in per_version.values() {
        let origin = revision.translation_origin(langcode).unwrap_or(revision.id);
        groups.entry(origin).or_default().push(revision);
    }

    let current_version = history.latest().version;
    let mut candidates: Vec<Candidate> = groups
        .values()
        .filter_map(|members| {
            let earliest = members.iter().min_by_key(|r| r.id)?;
            let carried_to = members
                .iter()
                .filter(|r| r.id != earliest.id)
                .filter(|r| !(exclude_current && r.version == current_version))
                .map(|r| r.id)
                .collect();
            Some(Candidate {
                revision_id: earliest.id,
                version: earliest.version,
                state: earliest.state,
                carried_over: members.len() > 1,
                carried_to,
            })
        })
        .filter(|c| !(exclude_current && c.version == current_version))
        .collect();
    candidates.sort_by_key(|c| (c.version, c.revision_id));

    let affects_both_lines = history.lines_diverged()
        && record
            .and_then(|r| r.get(langcode, Scope::Any))
            .is_some();

    CandidateList {
        language: langcode.to_string(),
        candidates,
        affects_both_lines,
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CandidateEnumerator {
    graph: RevisionGraph,
    store: Arc<dyn MappingStore>,
}

impl CandidateEnumerator {
    pub fn new(graph: RevisionGraph, store: Arc<dyn MappingStore>) -> Self {
        Self { graph, store }
    }

    pub async fn candidates_for(
        &self,
        item: &ContentRef,
        langcode: &str,
        exclude_current: bool,
    ) -> Result<CandidateList, CoreError> {
        let history = self.graph.history(item).await?;
        let record = self.store.load(item).await?;
        Ok(enumerate(&history, record.as_ref(), langcode, exclude_current))
    }
}
