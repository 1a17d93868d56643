//! Repository for `vendor_identifier_state` and `vendor_requests`.

use sqlx::{PgConnection, PgPool};
use transflow_core::audit::{self, actions};
use transflow_core::request_identifier::{
    next_identifier, Allocation, AllocationContext, IdentifierSettings,
};
use transflow_core::types::{ContentRef, DbId};

use crate::models::vendor_request::{CreateVendorRequest, VendorIdentifierState, VendorRequest};

/// Column list for vendor_requests queries.
const COLUMNS: &str = "id, entity_type, entity_id, code, year, number, version, part, \
    sequence, sent, created_at, updated_at";

/// Advisory lock key serialising identifier allocation.
const ALLOCATION_LOCK_KEY: &str = "vendor_identifier";

/// Provides identifier bookkeeping for vendor translation requests.
pub struct RequestIdentifierRepo;

impl RequestIdentifierRepo {
    /// Current global number and force-new flag.
    pub async fn get_state(pool: &PgPool) -> Result<VendorIdentifierState, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::state_on(&mut conn).await
    }

    /// Overwrite the global number.
    pub async fn set_global_number(pool: &PgPool, number: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE vendor_identifier_state SET global_number = $1, updated_at = now() WHERE id = 1",
        )
        .bind(number)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Make the next allocation ask the vendor for a new number.
    pub async fn force_new_number(pool: &PgPool, force: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE vendor_identifier_state SET force_new = $1, updated_at = now() WHERE id = 1",
        )
        .bind(force)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Compute the next identifier for `item` and record it as a pending
    /// request, under a global advisory lock.
    pub async fn reserve(
        pool: &PgPool,
        settings: &IdentifierSettings,
        item: &ContentRef,
        current_year: i32,
    ) -> Result<(Allocation, VendorRequest), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(ALLOCATION_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let context = Self::context_on(&mut tx, item).await?;
        let allocation = next_identifier(settings, &context, current_year);
        let request = Self::insert_on(
            &mut tx,
            &CreateVendorRequest {
                item: item.clone(),
                identifier: allocation.identifier.clone(),
            },
        )
        .await?;
        tx.commit().await?;

        audit::record(
            actions::IDENTIFIER_ISSUED,
            item,
            &format!(
                "Reserved identifier {} ({:?})",
                allocation.identifier, allocation.reason
            ),
        );
        Ok((allocation, request))
    }

    /// Read the bookkeeping an allocation for `item` would use.
    pub async fn context_for(
        pool: &PgPool,
        item: &ContentRef,
    ) -> Result<AllocationContext, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::context_on(&mut conn, item).await
    }

    /// Mark a request as sent to the vendor.
    pub async fn mark_sent(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE vendor_requests SET sent = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the number the vendor assigned to a request.
    ///
    /// The number becomes the global one and a pending forced reset is
    /// cleared.
    pub async fn record_assigned_number(
        pool: &PgPool,
        id: DbId,
        number: i64,
    ) -> Result<Option<VendorRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "UPDATE vendor_requests
             SET number = $2, sequence = NULL, updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, VendorRequest>(&query)
            .bind(id)
            .bind(number)
            .fetch_optional(&mut *tx)
            .await?;
        if request.is_some() {
            sqlx::query(
                "UPDATE vendor_identifier_state
                 SET global_number = $1, force_new = FALSE, updated_at = now()
                 WHERE id = 1",
            )
            .bind(number)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(request)
    }

    /// List the requests recorded for an item, newest version first.
    pub async fn list_for_item(
        pool: &PgPool,
        item: &ContentRef,
    ) -> Result<Vec<VendorRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM vendor_requests
             WHERE entity_type = $1 AND entity_id = $2
             ORDER BY version DESC, id DESC"
        );
        sqlx::query_as::<_, VendorRequest>(&query)
            .bind(&item.entity_type)
            .bind(&item.entity_id)
            .fetch_all(pool)
            .await
    }

    async fn state_on(conn: &mut PgConnection) -> Result<VendorIdentifierState, sqlx::Error> {
        sqlx::query_as::<_, VendorIdentifierState>(
            "SELECT global_number, force_new, updated_at FROM vendor_identifier_state WHERE id = 1",
        )
        .fetch_one(&mut *conn)
        .await
    }

    async fn context_on(
        conn: &mut PgConnection,
        item: &ContentRef,
    ) -> Result<AllocationContext, sqlx::Error> {
        let state = Self::state_on(&mut *conn).await?;

        // Requests never sent do not count for the item.
        let query = format!(
            "SELECT {COLUMNS} FROM vendor_requests
             WHERE entity_type = $1 AND entity_id = $2 AND sent
             ORDER BY version DESC, id DESC
             LIMIT 1"
        );
        let last_for_item = sqlx::query_as::<_, VendorRequest>(&query)
            .bind(&item.entity_type)
            .bind(&item.entity_id)
            .fetch_optional(&mut *conn)
            .await?;

        let last_for_number = match state.global_number {
            Some(number) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM vendor_requests
                     WHERE number = $1
                     ORDER BY part DESC, id DESC
                     LIMIT 1"
                );
                sqlx::query_as::<_, VendorRequest>(&query)
                    .bind(number)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => None,
        };

        Ok(AllocationContext {
            force_new: state.force_new,
            last_for_item: last_for_item.map(|r| r.identifier()),
            global_number: state.global_number,
            last_for_number: last_for_number.map(|r| r.identifier()),
        })
    }

    async fn insert_on(
        conn: &mut PgConnection,
        input: &CreateVendorRequest,
    ) -> Result<VendorRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO vendor_requests
                (entity_type, entity_id, code, year, number, version, part, sequence)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VendorRequest>(&query)
            .bind(&input.item.entity_type)
            .bind(&input.item.entity_id)
            .bind(&input.identifier.code)
            .bind(input.identifier.year)
            .bind(input.identifier.number)
            .bind(input.identifier.version)
            .bind(input.identifier.part)
            .bind(&input.identifier.sequence)
            .fetch_one(&mut *conn)
            .await
    }
}
