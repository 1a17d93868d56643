use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Host-assigned revision identifier. Real revisions never use `0`.
pub type RevisionId = i64;

/// Language codes look like `fr`, `pt-pt` or `zh-hans`.
static LANGCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,8})*$").expect("valid regex"));

/// Reference to a content item owned by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl ContentRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Key used for per-item locking (`node/42`).
    pub fn lock_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Validate a language code against the lowercase `xx[-variant]` form.
pub fn validate_langcode(langcode: &str) -> Result<(), CoreError> {
    if LANGCODE_RE.is_match(langcode) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid language code '{langcode}'"
        )))
    }
}
