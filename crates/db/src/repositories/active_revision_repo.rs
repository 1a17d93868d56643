//! Repository for the `active_revisions` and `active_revision_languages`
//! tables, and the PostgreSQL [`MappingStore`].

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use transflow_core::error::CoreError;
use transflow_core::mapping::ActiveRevisionRecord;
use transflow_core::store::{MappingStore, RecordEdit};
use transflow_core::types::{ContentRef, DbId};

use crate::models::active_revision::{
    to_record, ActiveRevisionLanguageRow, ActiveRevisionRow, ActiveRevisionSummary,
};

/// Column list for active_revisions queries.
const COLUMNS: &str = "id, entity_type, entity_id, created_at, updated_at";

/// Column list for active_revision_languages queries.
const LANGUAGE_COLUMNS: &str =
    "id, active_revision_id, langcode, entity_revision_id, scope, position";

/// Provides reads and writes of whole active revision records.
pub struct ActiveRevisionRepo;

impl ActiveRevisionRepo {
    /// Load the record of an item, or `None` when it has no mappings.
    pub async fn find_for_item(
        pool: &PgPool,
        item: &ContentRef,
    ) -> Result<Option<ActiveRevisionRecord>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::load_on(&mut conn, item).await
    }

    /// List items that have mappings, most recently changed first.
    pub async fn list_summaries(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ActiveRevisionSummary>, sqlx::Error> {
        sqlx::query_as::<_, ActiveRevisionSummary>(
            "SELECT ar.entity_type, ar.entity_id,
                    COUNT(arl.id) AS mapping_count,
                    ar.updated_at
             FROM active_revisions ar
             LEFT JOIN active_revision_languages arl ON arl.active_revision_id = ar.id
             GROUP BY ar.id
             ORDER BY ar.updated_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Delete the record of an item. Returns `true` if one existed.
    pub async fn delete_for_item(pool: &PgPool, item: &ContentRef) -> Result<bool, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::delete_on(&mut conn, item).await
    }

    /// Remove parents left without language rows.
    ///
    /// Writes through [`PgMappingStore`] never leave any; this repairs rows
    /// edited by hand. Returns the number of parents removed.
    pub async fn purge_empty(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM active_revisions ar
             WHERE NOT EXISTS (
                 SELECT 1 FROM active_revision_languages arl
                 WHERE arl.active_revision_id = ar.id
             )",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn load_on(
        conn: &mut PgConnection,
        item: &ContentRef,
    ) -> Result<Option<ActiveRevisionRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM active_revisions WHERE entity_type = $1 AND entity_id = $2"
        );
        let Some(parent) = sqlx::query_as::<_, ActiveRevisionRow>(&query)
            .bind(&item.entity_type)
            .bind(&item.entity_id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let query = format!(
            "SELECT {LANGUAGE_COLUMNS} FROM active_revision_languages
             WHERE active_revision_id = $1
             ORDER BY position ASC"
        );
        let languages = sqlx::query_as::<_, ActiveRevisionLanguageRow>(&query)
            .bind(parent.id)
            .fetch_all(&mut *conn)
            .await?;
        if languages.is_empty() {
            return Ok(None);
        }

        to_record(&parent, &languages)
            .map(Some)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    pub(crate) async fn delete_on(
        conn: &mut PgConnection,
        item: &ContentRef,
    ) -> Result<bool, sqlx::Error> {
        // Language rows go with the parent (ON DELETE CASCADE).
        let result =
            sqlx::query("DELETE FROM active_revisions WHERE entity_type = $1 AND entity_id = $2")
                .bind(&item.entity_type)
                .bind(&item.entity_id)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored entries of a non-empty record.
    pub(crate) async fn save_on(
        conn: &mut PgConnection,
        record: &ActiveRevisionRecord,
    ) -> Result<DbId, sqlx::Error> {
        let parent_id: DbId = sqlx::query_scalar(
            "INSERT INTO active_revisions (entity_type, entity_id)
             VALUES ($1, $2)
             ON CONFLICT (entity_type, entity_id)
             DO UPDATE SET updated_at = now()
             RETURNING id",
        )
        .bind(&record.item.entity_type)
        .bind(&record.item.entity_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM active_revision_languages WHERE active_revision_id = $1")
            .bind(parent_id)
            .execute(&mut *conn)
            .await?;

        for (position, mapping) in record.mappings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO active_revision_languages
                    (active_revision_id, langcode, entity_revision_id, scope, position)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(parent_id)
            .bind(&mapping.langcode)
            .bind(mapping.revision_id)
            .bind(mapping.scope.as_i16())
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
        }
        Ok(parent_id)
    }
}

// ---------------------------------------------------------------------------
// Mapping store
// ---------------------------------------------------------------------------

/// [`MappingStore`] backed by PostgreSQL.
///
/// Each `modify` runs in one transaction holding an advisory lock keyed by
/// the item, so concurrent edits of one item are serialised across
/// processes. A failed edit rolls the transaction back.
#[derive(Clone)]
pub struct PgMappingStore {
    pool: PgPool,
}

impl PgMappingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Active revision query failed");
    CoreError::Internal(format!("Database error: {err}"))
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn load(&self, item: &ContentRef) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        ActiveRevisionRepo::find_for_item(&self.pool, item)
            .await
            .map_err(db_error)
    }

    async fn modify<'a>(
        &self,
        item: &ContentRef,
        edit: RecordEdit<'a>,
    ) -> Result<Option<ActiveRevisionRecord>, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(item.lock_key())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let mut record = ActiveRevisionRepo::load_on(&mut tx, item)
            .await
            .map_err(db_error)?
            .unwrap_or_else(|| ActiveRevisionRecord::new(item.clone()));

        // Dropping `tx` on an early return rolls back.
        edit(&mut record)?;
        record.validate()?;

        let stored = if record.is_empty() {
            if ActiveRevisionRepo::delete_on(&mut tx, item)
                .await
                .map_err(db_error)?
            {
                tracing::debug!(item = %item, "Deleted empty active revision record");
            }
            None
        } else {
            ActiveRevisionRepo::save_on(&mut tx, &record)
                .await
                .map_err(db_error)?;
            Some(record)
        };

        tx.commit().await.map_err(db_error)?;
        Ok(stored)
    }

    async fn delete(&self, item: &ContentRef) -> Result<bool, CoreError> {
        ActiveRevisionRepo::delete_for_item(&self.pool, item)
            .await
            .map_err(db_error)
    }
}
