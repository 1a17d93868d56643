//! Human-readable mapping state of one language.
//!
//! Reports, per moderation line, what an editor sees for the language
//! (mapped, hidden, native, carried over, untranslated) and which mapping
//! operations make sense from here.

use std::sync::Arc;

use serde::Serialize;

use crate::candidates::{self, CandidateList};
use crate::error::CoreError;
use crate::graph::{RevisionGraph, RevisionHistory};
use crate::mapping::{ActiveRevisionRecord, LanguageRevisionMapping, MappingTarget, Scope};
use crate::revision::{ModerationLine, Revision, Version};
use crate::store::MappingStore;
use crate::types::{ContentRef, RevisionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingStatus {
    Mapped {
        revision_id: RevisionId,
        version: Version,
    },
    Hidden,
    Native {
        revision_id: RevisionId,
        version: Version,
    },
    CarriedOver {
        revision_id: RevisionId,
        version: Version,
    },
    Untranslated,
}

impl MappingStatus {
    pub fn label(&self) -> String {
        match self {
            MappingStatus::Mapped { version, .. } => format!("Mapped to version {version}"),
            MappingStatus::Hidden => "Mapped to \"hidden\" (translation hidden)".to_string(),
            MappingStatus::Native { version, .. } => format!("Version {version}"),
            MappingStatus::CarriedOver { version, .. } => {
                format!("Version {version} (carried over to the current version)")
            }
            MappingStatus::Untranslated => "No translation".to_string(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, MappingStatus::Mapped { .. } | MappingStatus::Hidden)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineState {
    pub line: ModerationLine,
    /// The line's default revision, `None` when the line has none yet.
    pub default_revision: Option<RevisionId>,
    pub status: MappingStatus,
    /// Scope of the entry producing `status`, when mapped.
    pub scope: Option<Scope>,
    /// Target of that entry.
    pub target: Option<MappingTarget>,
    pub label: String,
}

/// Operations an editor may run on the language right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappingOperations {
    pub delete_translation: bool,
    pub add_mapping: bool,
    pub map_to_version: bool,
    pub remove_mapping: bool,
    pub update_mapping: bool,
    pub hide: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingState {
    pub item: ContentRef,
    pub language: String,
    /// Status on the line the latest revision belongs to.
    pub status: MappingStatus,
    /// One entry when the lines coincide, two when they have diverged.
    pub lines: Vec<LineState>,
    pub operations: MappingOperations,
    pub candidates: CandidateList,
}

impl MappingState {
    pub fn line(&self, line: ModerationLine) -> Option<&LineState> {
        self.lines.iter().find(|l| l.line == line)
    }
}

/// Describe `langcode` from a loaded history and record.
pub fn describe(
    history: &RevisionHistory,
    record: Option<&ActiveRevisionRecord>,
    langcode: &str,
) -> MappingState {
    let published = history.default_revision(ModerationLine::Published);
    let validated = history.default_revision(ModerationLine::Validated);

    let mut lines = Vec::with_capacity(2);
    if let Some(default) = published {
        lines.push(line_state(history, record, ModerationLine::Published, Some(default), langcode));
    }
    if history.lines_diverged() || published.is_none() {
        // Without any default the latest revision stands in for the line.
        let default = validated.or(Some(history.latest()));
        lines.push(line_state(history, record, ModerationLine::Validated, default, langcode));
    }

    let working_line = history.latest().line();
    let working = lines
        .iter()
        .find(|l| l.line == working_line)
        .or(lines.first());
    let status = working.map_or(MappingStatus::Untranslated, |l| l.status);

    let candidates = candidates::enumerate(history, record, langcode, true);
    let governing = record.and_then(|r| r.lookup(langcode, working_line));
    let operations = operations_for(working, governing, &candidates);

    MappingState {
        item: history.item().clone(),
        language: langcode.to_string(),
        status,
        lines,
        operations,
        candidates,
    }
}

fn line_state(
    history: &RevisionHistory,
    record: Option<&ActiveRevisionRecord>,
    line: ModerationLine,
    default: Option<&Revision>,
    langcode: &str,
) -> LineState {
    let mapping = record
        .and_then(|r| r.lookup(langcode, line))
        // Mapping a line to its own default changes nothing.
        .filter(|m| default.map_or(true, |d| m.revision_id != d.id));

    let status = match (mapping, default) {
        (Some(m), _) => mapped_status(history, m),
        (None, Some(default)) => own_status(history, default, langcode),
        (None, None) => MappingStatus::Untranslated,
    };

    LineState {
        line,
        default_revision: default.map(|d| d.id),
        status,
        scope: mapping.map(|m| m.scope),
        target: mapping.map(|m| m.target()),
        label: status.label(),
    }
}

fn mapped_status(history: &RevisionHistory, mapping: &LanguageRevisionMapping) -> MappingStatus {
    match mapping.target() {
        MappingTarget::Hidden => MappingStatus::Hidden,
        MappingTarget::Revision(id) => match history.find(id) {
            Some(target) => {
                // A target carrying an older version's translation shows that version.
                let origin = target
                    .translation_origin(&mapping.langcode)
                    .filter(|origin| *origin != target.id)
                    .and_then(|origin| history.find(origin))
                    .filter(|origin| origin.version != target.version);
                match origin {
                    Some(origin) => MappingStatus::CarriedOver {
                        revision_id: origin.id,
                        version: origin.version,
                    },
                    None => MappingStatus::Mapped {
                        revision_id: target.id,
                        version: target.version,
                    },
                }
            }
            None => {
                tracing::warn!(
                    item = %history.item(),
                    langcode = %mapping.langcode,
                    target = id,
                    "Mapping points at a revision that no longer exists"
                );
                MappingStatus::Untranslated
            }
        },
    }
}

fn own_status(history: &RevisionHistory, default: &Revision, langcode: &str) -> MappingStatus {
    let Some(origin_id) = default.translation_origin(langcode) else {
        return MappingStatus::Untranslated;
    };
    match history.find(origin_id) {
        Some(origin) if origin.id != default.id && origin.version != default.version => {
            MappingStatus::CarriedOver {
                revision_id: origin.id,
                version: origin.version,
            }
        }
        _ => MappingStatus::Native {
            revision_id: default.id,
            version: default.version,
        },
    }
}

fn operations_for(
    line: Option<&LineState>,
    governing: Option<&LanguageRevisionMapping>,
    candidates: &CandidateList,
) -> MappingOperations {
    let status = line.map_or(MappingStatus::Untranslated, |l| l.status);
    match line.and_then(|l| l.target) {
        Some(MappingTarget::Revision(revision_id)) => {
            return MappingOperations {
                remove_mapping: true,
                hide: true,
                update_mapping: candidates.candidates.iter().any(|c| {
                    c.revision_id != revision_id && !c.carried_to.contains(&revision_id)
                }),
                ..Default::default()
            };
        }
        Some(MappingTarget::Hidden) => {
            return MappingOperations {
                remove_mapping: true,
                map_to_version: !candidates.is_empty(),
                ..Default::default()
            };
        }
        None => {}
    }
    match status {
        MappingStatus::Native { .. } | MappingStatus::CarriedOver { .. } => MappingOperations {
            delete_translation: true,
            add_mapping: !candidates.is_empty(),
            hide: true,
            // A leftover entry pointing at the line's own default.
            remove_mapping: governing.is_some(),
            ..Default::default()
        },
        MappingStatus::Mapped { .. } | MappingStatus::Hidden | MappingStatus::Untranslated => {
            MappingOperations {
                add_mapping: !candidates.is_empty(),
                remove_mapping: governing.is_some(),
                ..Default::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MappingDescriber {
    graph: RevisionGraph,
    store: Arc<dyn MappingStore>,
}

impl MappingDescriber {
    pub fn new(graph: RevisionGraph, store: Arc<dyn MappingStore>) -> Self {
        Self { graph, store }
    }

    pub async fn describe_mapping_state(
        &self,
        item: &ContentRef,
        langcode: &str,
    ) -> Result<MappingState, CoreError> {
        let history = self.graph.history(item).await?;
        let record = self.store.load(item).await?;
        Ok(describe(&history, record.as_ref(), langcode))
    }
}
