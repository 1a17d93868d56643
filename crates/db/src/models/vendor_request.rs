//! Vendor request identifier rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use transflow_core::request_identifier::RequestIdentifier;
use transflow_core::types::{ContentRef, DbId, Timestamp};

/// A row from the `vendor_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VendorRequest {
    pub id: DbId,
    pub entity_type: String,
    pub entity_id: String,
    pub code: String,
    pub year: i32,
    pub number: Option<i64>,
    pub version: i32,
    pub part: i32,
    pub sequence: Option<String>,
    pub sent: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VendorRequest {
    pub fn identifier(&self) -> RequestIdentifier {
        RequestIdentifier {
            code: self.code.clone(),
            year: self.year,
            number: self.number,
            version: self.version,
            part: self.part,
            sequence: self.sequence.clone(),
        }
    }

    pub fn item(&self) -> ContentRef {
        ContentRef::new(self.entity_type.clone(), self.entity_id.clone())
    }
}

/// DTO for recording a request about to be sent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVendorRequest {
    pub item: ContentRef,
    pub identifier: RequestIdentifier,
}

/// The singleton row of `vendor_identifier_state`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VendorIdentifierState {
    pub global_number: Option<i64>,
    pub force_new: bool,
    pub updated_at: Timestamp,
}
