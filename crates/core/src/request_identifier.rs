//! Request identifiers for bulk translation jobs sent to the vendor.
//!
//! An identifier is `code/year/number/version/part`. The vendor assigns the
//! number the first time it sees a request without one (drawing from the
//! configured sequence). Later requests reuse the global number with the next
//! part until part 99; an item that was already sent keeps its identifier and
//! bumps the version.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default requester code.
pub const DEFAULT_IDENTIFIER_CODE: &str = "WEB";

/// Parts run from 0 to 99 on one number.
pub const MAX_PART: i32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIdentifier {
    pub code: String,
    pub year: i32,
    /// `None` until the vendor assigned a number.
    pub number: Option<i64>,
    pub version: i32,
    pub part: i32,
    /// Sequence the vendor draws a new number from.
    pub sequence: Option<String>,
}

impl RequestIdentifier {
    /// An identifier asking the vendor for a new number.
    pub fn fresh(settings: &IdentifierSettings, year: i32) -> Self {
        Self {
            code: settings.code.clone(),
            year,
            number: None,
            version: 0,
            part: 0,
            sequence: settings.sequence.clone(),
        }
    }

    pub fn requests_new_number(&self) -> bool {
        self.number.is_none()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.code.trim().is_empty() {
            return Err(CoreError::Validation("Identifier code is empty".into()));
        }
        if !(-1..=MAX_PART).contains(&self.part) {
            return Err(CoreError::Validation(format!(
                "Identifier part {} out of range",
                self.part
            )));
        }
        if self.version < 0 {
            return Err(CoreError::Validation(format!(
                "Identifier version {} is negative",
                self.version
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RequestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number {
            Some(number) => write!(
                f,
                "{}/{}/{}/{}/{}",
                self.code, self.year, number, self.version, self.part
            ),
            None => write!(
                f,
                "{}/{}/{}/{}/{}",
                self.code,
                self.year,
                self.sequence.as_deref().unwrap_or("-"),
                self.version,
                self.part
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSettings {
    pub code: String,
    pub sequence: Option<String>,
}

impl Default for IdentifierSettings {
    fn default() -> Self {
        Self {
            code: DEFAULT_IDENTIFIER_CODE.to_string(),
            sequence: None,
        }
    }
}

/// Bookkeeping consulted when allocating.
#[derive(Debug, Clone, Default)]
pub struct AllocationContext {
    /// A new number was requested explicitly.
    pub force_new: bool,
    /// Last identifier sent for the item, if any.
    pub last_for_item: Option<RequestIdentifier>,
    /// Number most recently assigned by the vendor.
    pub global_number: Option<i64>,
    /// Request with the highest part recorded on `global_number`.
    pub last_for_number: Option<RequestIdentifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationReason {
    Forced,
    NewVersion,
    FirstRequest,
    UntrackedNumber,
    NextPart,
    PartRollover,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub identifier: RequestIdentifier,
    pub reason: AllocationReason,
}

/// Compute the identifier for the next request about an item.
pub fn next_identifier(
    settings: &IdentifierSettings,
    context: &AllocationContext,
    current_year: i32,
) -> Allocation {
    let fresh = |reason| Allocation {
        identifier: RequestIdentifier::fresh(settings, current_year),
        reason,
    };

    if context.force_new {
        return fresh(AllocationReason::Forced);
    }

    if let Some(last) = &context.last_for_item {
        // Possibly an older number and year than the global ones.
        let mut identifier = last.clone();
        identifier.version += 1;
        return Allocation {
            identifier,
            reason: AllocationReason::NewVersion,
        };
    }

    let Some(number) = context.global_number else {
        return fresh(AllocationReason::FirstRequest);
    };

    let Some(last) = &context.last_for_number else {
        tracing::warn!(number, "No request recorded for the global number");
        return fresh(AllocationReason::UntrackedNumber);
    };

    let mut part = last.part;
    if part > -1 {
        part += 1;
    }
    if part > MAX_PART {
        return fresh(AllocationReason::PartRollover);
    }

    Allocation {
        identifier: RequestIdentifier {
            code: settings.code.clone(),
            year: last.year,
            number: Some(number),
            version: 0,
            part,
            sequence: None,
        },
        reason: AllocationReason::NextPart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn settings() -> IdentifierSettings {
        IdentifierSettings {
            code: "WEB".into(),
            sequence: Some("SEQ".into()),
        }
    }

    fn sent(number: i64, year: i32, part: i32, version: i32) -> RequestIdentifier {
        RequestIdentifier {
            code: "WEB".into(),
            year,
            number: Some(number),
            version,
            part,
            sequence: None,
        }
    }

    #[test]
    fn first_request_asks_for_a_number() {
        let allocation = next_identifier(&settings(), &AllocationContext::default(), 2024);
        assert_eq!(allocation.reason, AllocationReason::FirstRequest);
        assert!(allocation.identifier.requests_new_number());
        assert_eq!(allocation.identifier.sequence.as_deref(), Some("SEQ"));
        assert_eq!(allocation.identifier.year, 2024);
        assert_eq!(allocation.identifier.to_string(), "WEB/2024/SEQ/0/0");
    }

    #[test]
    fn forced_new_number_wins_over_history() {
        let context = AllocationContext {
            force_new: true,
            last_for_item: Some(sent(1000, 2023, 3, 1)),
            global_number: Some(1000),
            last_for_number: Some(sent(1000, 2023, 5, 0)),
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.reason, AllocationReason::Forced);
        assert!(allocation.identifier.requests_new_number());
    }

    #[test]
    fn resent_item_bumps_version_of_its_identifier() {
        let context = AllocationContext {
            last_for_item: Some(sent(900, 2022, 7, 2)),
            global_number: Some(1000),
            last_for_number: Some(sent(1000, 2024, 5, 0)),
            ..Default::default()
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.reason, AllocationReason::NewVersion);
        assert_eq!(allocation.identifier, sent(900, 2022, 7, 3));
    }

    #[test]
    fn new_item_takes_next_part_in_the_numbers_year() {
        let context = AllocationContext {
            global_number: Some(1000),
            last_for_number: Some(sent(1000, 2023, 5, 0)),
            ..Default::default()
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.reason, AllocationReason::NextPart);
        assert_eq!(allocation.identifier, sent(1000, 2023, 6, 0));
        assert_eq!(allocation.identifier.to_string(), "WEB/2023/1000/0/6");
    }

    #[test]
    fn part_100_rolls_over_to_a_new_number() {
        let context = AllocationContext {
            global_number: Some(1000),
            last_for_number: Some(sent(1000, 2023, 99, 0)),
            ..Default::default()
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.reason, AllocationReason::PartRollover);
        assert!(allocation.identifier.requests_new_number());
        assert_eq!(allocation.identifier.year, 2024);
    }

    #[test]
    fn untracked_number_asks_for_a_new_one() {
        let context = AllocationContext {
            global_number: Some(1000),
            ..Default::default()
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.reason, AllocationReason::UntrackedNumber);
        assert!(allocation.identifier.requests_new_number());
    }

    #[test]
    fn negative_part_is_kept() {
        let context = AllocationContext {
            global_number: Some(1000),
            last_for_number: Some(sent(1000, 2023, -1, 0)),
            ..Default::default()
        };
        let allocation = next_identifier(&settings(), &context, 2024);
        assert_eq!(allocation.identifier.part, -1);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(sent(1, 2024, 99, 0).validate().is_ok());
        assert_matches!(
            sent(1, 2024, 100, 0).validate(),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            sent(1, 2024, 0, -1).validate(),
            Err(CoreError::Validation(_))
        );
        let mut blank = sent(1, 2024, 0, 0);
        blank.code = " ".into();
        assert!(blank.validate().is_err());
    }
}
