//! Revision model as exposed by the host's versioning engine.
//!
//! A [`Revision`] carries its moderation state, the semantic version the
//! versioning collaborator assigned to it, and the languages that have
//! translated content on it. For every language the revision also records
//! the *origin*: the revision the translation was authored on. When the
//! origin is an earlier revision the translation was carried over unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::RevisionId;

// ---------------------------------------------------------------------------
// Moderation state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationState {
    Draft,
    NeedsReview,
    RequestValidation,
    Validated,
    Published,
    Archived,
}

impl ModerationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ModerationState::Draft => "draft",
            ModerationState::NeedsReview => "needs_review",
            ModerationState::RequestValidation => "request_validation",
            ModerationState::Validated => "validated",
            ModerationState::Published => "published",
            ModerationState::Archived => "archived",
        }
    }

    /// Validated and published revisions become the default revision of a
    /// line; every other state is an intermediate step.
    pub fn is_default_state(self) -> bool {
        matches!(self, ModerationState::Validated | ModerationState::Published)
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ModerationState::Draft),
            "needs_review" => Ok(ModerationState::NeedsReview),
            "request_validation" => Ok(ModerationState::RequestValidation),
            "validated" => Ok(ModerationState::Validated),
            "published" => Ok(ModerationState::Published),
            "archived" => Ok(ModerationState::Archived),
            other => Err(CoreError::Validation(format!(
                "Unknown moderation state '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Moderation line
// ---------------------------------------------------------------------------

/// The family of revisions a viewed revision belongs to.
///
/// The published line and the validated line coincide until a new major
/// version is validated next to the published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationLine {
    Published,
    Validated,
}

impl ModerationLine {
    pub fn for_state(state: ModerationState) -> Self {
        if state == ModerationState::Published {
            ModerationLine::Published
        } else {
            ModerationLine::Validated
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModerationLine::Published => "Published",
            ModerationLine::Validated => "Validated",
        }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub state: ModerationState,
    pub version: Version,
    /// Language code → revision the translation was authored on.
    pub translations: BTreeMap<String, RevisionId>,
}

impl Revision {
    pub fn new(id: RevisionId, state: ModerationState, version: Version) -> Self {
        Self {
            id,
            state,
            version,
            translations: BTreeMap::new(),
        }
    }

    /// Attach a translation authored on this revision.
    pub fn with_translation(mut self, langcode: &str) -> Self {
        self.translations.insert(langcode.to_string(), self.id);
        self
    }

    /// Attach a translation carried over from `origin`.
    pub fn with_carried_translation(mut self, langcode: &str, origin: RevisionId) -> Self {
        self.translations.insert(langcode.to_string(), origin);
        self
    }

    pub fn line(&self) -> ModerationLine {
        ModerationLine::for_state(self.state)
    }

    pub fn has_translation(&self, langcode: &str) -> bool {
        self.translations.contains_key(langcode)
    }

    /// Revision the translation in `langcode` was authored on, if any.
    pub fn translation_origin(&self, langcode: &str) -> Option<RevisionId> {
        self.translations.get(langcode).copied()
    }

    pub fn is_carried_over(&self, langcode: &str) -> bool {
        self.translation_origin(langcode)
            .is_some_and(|origin| origin != self.id)
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.translations.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_display() {
        assert_eq!(Version::new(2, 0, 1).to_string(), "2.0.1");
    }

    #[test]
    fn version_orders_semantically() {
        assert!(Version::new(1, 10, 0) > Version::new(1, 9, 3));
        assert!(Version::new(2, 0, 0) > Version::new(1, 99, 99));
    }

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            ModerationState::Draft,
            ModerationState::NeedsReview,
            ModerationState::RequestValidation,
            ModerationState::Validated,
            ModerationState::Published,
            ModerationState::Archived,
        ] {
            assert_eq!(state.as_str().parse::<ModerationState>().unwrap(), state);
        }
        assert!("expired".parse::<ModerationState>().is_err());
    }

    #[test]
    fn only_validated_and_published_are_default_states() {
        assert!(ModerationState::Validated.is_default_state());
        assert!(ModerationState::Published.is_default_state());
        assert!(!ModerationState::Draft.is_default_state());
        assert!(!ModerationState::Archived.is_default_state());
    }

    #[test]
    fn line_follows_state() {
        assert_eq!(
            ModerationLine::for_state(ModerationState::Published),
            ModerationLine::Published
        );
        assert_eq!(
            ModerationLine::for_state(ModerationState::Validated),
            ModerationLine::Validated
        );
        assert_eq!(
            ModerationLine::for_state(ModerationState::Draft),
            ModerationLine::Validated
        );
    }

    #[test]
    fn carried_translation_is_detected() {
        let rev = Revision::new(5, ModerationState::Published, Version::new(2, 0, 0))
            .with_translation("it")
            .with_carried_translation("fr", 2);
        assert!(!rev.is_carried_over("it"));
        assert!(rev.is_carried_over("fr"));
        assert!(!rev.is_carried_over("de"));
        assert_eq!(rev.translation_origin("fr"), Some(2));
        assert_eq!(rev.languages().collect::<Vec<_>>(), vec!["fr", "it"]);
    }
}
