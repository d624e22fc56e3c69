//! # Scan Repository
//!
//! The Local Durable Store: one append-mostly table of [`ScanRecord`]s.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    scan_records Ownership                               │
//! │                                                                         │
//! │  Scan Intake ──────► insert()                 (new rows only)          │
//! │                                                                         │
//! │  Sync Engine ──────► apply_batch_outcomes()   ┐                        │
//! │                      update_sync_outcome()    ├ synced, sync_attempts, │
//! │                                               ┘ last_error, synced_at  │
//! │                                                                         │
//! │  Queue Inspector ──► clear_all()              (confirmed by caller)    │
//! │                                                                         │
//! │  Everyone ─────────► count_by_status() / list_recent() / get()         │
//! │                                                                         │
//! │  Schema triggers back this up: capture fields are immutable and         │
//! │  `synced` cannot go from 1 to 0.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use scanq_core::{QueueCounts, ScanRecord, SyncOutcome, MAX_PAGE_SIZE};

/// Columns mapped onto [`ScanRecord`] by its `FromRow` derive.
const RECORD_COLUMNS: &str =
    "id, barcode, barcode_type, scanned_at, synced, sync_attempts, last_error";

/// Tally of one `apply_batch_outcomes` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedOutcomes {
    /// Records now marked synced.
    pub accepted: u64,
    /// Records left pending with `last_error` set.
    pub rejected: u64,
    /// Outcomes whose record no longer exists (cleared mid-run).
    pub missing: u64,
}

/// Repository for the scan queue.
#[derive(Debug, Clone)]
pub struct ScanRepository {
    pool: SqlitePool,
    max_records: Option<u64>,
}

impl ScanRepository {
    /// Creates a new ScanRepository.
    pub fn new(pool: SqlitePool, max_records: Option<u64>) -> Self {
        ScanRepository { pool, max_records }
    }

    // =========================================================================
    // Write Path (Scan Intake)
    // =========================================================================

    /// Appends a new record and returns its id.
    ///
    /// The row is written as pending (`synced = 0`, no attempts, no error)
    /// regardless of what the passed record says; those fields belong to the
    /// Sync Engine. Durable once this returns (WAL + `synchronous = FULL`).
    ///
    /// ## Errors
    /// - [`DbError::StorageFull`] when `max_records` is reached or the disk is full
    /// - [`DbError::UniqueViolation`] if the id already exists
    pub async fn insert(&self, record: &ScanRecord) -> DbResult<String> {
        debug!(
            id = %record.id,
            barcode = %record.barcode,
            barcode_type = %record.barcode_type,
            "Inserting scan record"
        );

        let result = match self.max_records {
            // Capacity check and insert in one statement so concurrent
            // inserts cannot both squeeze past the limit.
            Some(max) => {
                sqlx::query(
                    r#"
                    INSERT INTO scan_records (id, barcode, barcode_type, scanned_at)
                    SELECT ?1, ?2, ?3, ?4
                    WHERE (SELECT COUNT(*) FROM scan_records) < ?5
                    "#,
                )
                .bind(&record.id)
                .bind(&record.barcode)
                .bind(record.barcode_type)
                .bind(record.scanned_at)
                .bind(i64::try_from(max).unwrap_or(i64::MAX))
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO scan_records (id, barcode, barcode_type, scanned_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.barcode)
                .bind(record.barcode_type)
                .bind(record.scanned_at)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            let max = self.max_records.unwrap_or_default();
            warn!(max_records = max, "Scan queue is at capacity, insert refused");
            return Err(DbError::StorageFull(format!(
                "capacity of {} records reached",
                max
            )));
        }

        Ok(record.id.clone())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Gets a record by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<ScanRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM scan_records WHERE id = ?1");

        let record = sqlx::query_as::<_, ScanRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Aggregate counts over every stored record.
    pub async fn count_by_status(&self) -> DbResult<QueueCounts> {
        let (total, pending, synced): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN synced = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN synced = 1 THEN 1 ELSE 0 END), 0)
            FROM scan_records
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueCounts {
            total,
            pending,
            synced,
        })
    }

    /// Number of records still waiting for an acknowledgement.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_records WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Lists the most recently queued records first.
    ///
    /// Ordered by intake sequence, not `scanned_at`, so a wall-clock step
    /// back cannot reorder the list. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<ScanRecord>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM scan_records \
             ORDER BY seq DESC LIMIT ?1"
        );

        let records = sqlx::query_as::<_, ScanRecord>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Every pending record, oldest intake first.
    pub async fn list_pending(&self) -> DbResult<Vec<ScanRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM scan_records WHERE synced = 0 ORDER BY seq ASC"
        );

        let records = sqlx::query_as::<_, ScanRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    // =========================================================================
    // Sync Path (Sync Engine only)
    // =========================================================================

    /// Writes one outcome. Idempotent: applying it twice changes nothing more.
    ///
    /// A rejection never touches a record that is already synced.
    pub async fn update_sync_outcome(&self, id: &str, outcome: &SyncOutcome) -> DbResult<()> {
        let changed = write_outcome(&self.pool, id, outcome, Utc::now()).await?;

        if changed == 0 && self.get(id).await?.is_none() {
            return Err(DbError::not_found("ScanRecord", id));
        }

        Ok(())
    }

    /// Applies the outcomes of one answered batch in a single transaction.
    ///
    /// ## What This Does
    /// 1. `sync_attempts += 1` for every record in the batch that is still pending
    /// 2. Writes each record's outcome
    ///
    /// Records deleted since the batch was read are counted as `missing` and
    /// otherwise ignored.
    pub async fn apply_batch_outcomes(
        &self,
        outcomes: &[(String, SyncOutcome)],
    ) -> DbResult<AppliedOutcomes> {
        let now = Utc::now();
        let mut applied = AppliedOutcomes::default();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for (id, _) in outcomes {
            sqlx::query(
                r#"
                UPDATE scan_records
                SET sync_attempts = sync_attempts + 1
                WHERE id = ?1 AND synced = 0
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        for (id, outcome) in outcomes {
            let changed = write_outcome(&mut *tx, id, outcome, now).await?;

            match (changed, outcome) {
                (0, _) => applied.missing += 1,
                (_, SyncOutcome::Accepted) => applied.accepted += 1,
                (_, SyncOutcome::Rejected { .. }) => applied.rejected += 1,
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            accepted = applied.accepted,
            rejected = applied.rejected,
            missing = applied.missing,
            "Batch outcomes applied"
        );

        Ok(applied)
    }

    // =========================================================================
    // Destructive Path (Queue Inspector only)
    // =========================================================================

    /// Deletes every record and returns how many were removed. Irreversible.
    ///
    /// The caller is responsible for having obtained user confirmation.
    pub async fn clear_all(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM scan_records")
            .execute(&self.pool)
            .await?;

        info!(deleted = result.rows_affected(), "Scan queue cleared");
        Ok(result.rows_affected())
    }
}

/// Shared outcome write, usable on the pool or inside a transaction.
///
/// Returns the number of rows changed: 0 means the record is gone, or it is a
/// rejection for a record that is already synced.
async fn write_outcome<'e, E>(
    executor: E,
    id: &str,
    outcome: &SyncOutcome,
    now: DateTime<Utc>,
) -> DbResult<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = match outcome {
        SyncOutcome::Accepted => {
            sqlx::query(
                r#"
                UPDATE scan_records
                SET synced = 1,
                    last_error = NULL,
                    synced_at = COALESCE(synced_at, ?2)
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(now)
            .execute(executor)
            .await?
        }
        SyncOutcome::Rejected { reason } => {
            sqlx::query(
                r#"
                UPDATE scan_records
                SET last_error = ?2
                WHERE id = ?1 AND synced = 0
                "#,
            )
            .bind(id)
            .bind(reason)
            .execute(executor)
            .await?
        }
    };

    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use scanq_core::BarcodeType;

    async fn repo() -> ScanRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().scans()
    }

    async fn seed(repo: &ScanRepository, codes: &[&str]) -> Vec<ScanRecord> {
        let base = Utc::now();
        let mut records = Vec::new();
        for (i, code) in codes.iter().enumerate() {
            let record = ScanRecord::new(code, base + Duration::seconds(i as i64));
            repo.insert(&record).await.unwrap();
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let record = ScanRecord::new("012345678905", Utc::now());

        let id = repo.insert(&record).await.unwrap();
        assert_eq!(id, record.id);

        let stored = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.barcode_type, BarcodeType::UpcA);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_always_writes_pending() {
        let repo = repo().await;
        let mut record = ScanRecord::new("96385074", Utc::now());
        record.synced = true;
        record.sync_attempts = 7;
        record.last_error = Some("stale".into());

        repo.insert(&record).await.unwrap();
        let stored = repo.get(&record.id).await.unwrap().unwrap();
        assert!(!stored.synced);
        assert_eq!(stored.sync_attempts, 0);
        assert_eq!(stored.last_error, None);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = repo().await;
        let record = ScanRecord::new("96385074", Utc::now());
        repo.insert(&record).await.unwrap();

        let err = repo.insert(&record).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.count_by_status().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_capacity_refuses_insert() {
        let db = Database::new(DbConfig::in_memory().max_records(Some(2)))
            .await
            .unwrap();
        let repo = db.scans();
        seed(&repo, &["A1", "A2"]).await;

        let err = repo
            .insert(&ScanRecord::new("A3", Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_storage_full());
        assert_eq!(repo.count_by_status().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let repo = repo().await;
        let records = seed(&repo, &["A1", "A2", "A3"]).await;

        let listed = repo.list_recent(10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                records[2].id.as_str(),
                records[1].id.as_str(),
                records[0].id.as_str()
            ]
        );

        // limit is honoured and 0 is clamped up to 1
        assert_eq!(repo.list_recent(2).await.unwrap().len(), 2);
        assert_eq!(repo.list_recent(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_recent_ties_use_intake_order() {
        let repo = repo().await;
        let at = Utc::now();
        let first = ScanRecord::new("SAME-1", at);
        let second = ScanRecord::new("SAME-2", at);
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let listed = repo.list_recent(10).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_list_recent_ignores_clock_step_back() {
        let repo = repo().await;
        let now = Utc::now();
        let first = ScanRecord::new("A1", now);
        let second = ScanRecord::new("A2", now - Duration::seconds(30));
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let listed = repo.list_recent(10).await.unwrap();
        let codes: Vec<_> = listed.iter().map(|r| r.barcode.as_str()).collect();
        assert_eq!(codes, vec!["A2", "A1"]);
    }

    #[tokio::test]
    async fn test_list_does_not_mutate() {
        let repo = repo().await;
        seed(&repo, &["A1", "A2"]).await;
        let before = repo.count_by_status().await.unwrap();
        let _ = repo.list_recent(50).await.unwrap();
        let _ = repo.list_pending().await.unwrap();
        assert_eq!(repo.count_by_status().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_sync_outcome_is_idempotent() {
        let repo = repo().await;
        let records = seed(&repo, &["A1"]).await;
        let id = &records[0].id;

        repo.update_sync_outcome(id, &SyncOutcome::rejected("bad"))
            .await
            .unwrap();
        repo.update_sync_outcome(id, &SyncOutcome::rejected("bad"))
            .await
            .unwrap();
        let once = repo.get(id).await.unwrap().unwrap();
        assert_eq!(once.last_error.as_deref(), Some("bad"));
        assert!(!once.synced);

        repo.update_sync_outcome(id, &SyncOutcome::Accepted)
            .await
            .unwrap();
        let accepted = repo.get(id).await.unwrap().unwrap();
        repo.update_sync_outcome(id, &SyncOutcome::Accepted)
            .await
            .unwrap();
        assert_eq!(repo.get(id).await.unwrap().unwrap(), accepted);
        assert!(accepted.synced);
        assert_eq!(accepted.last_error, None);
    }

    #[tokio::test]
    async fn test_rejection_never_reverts_synced() {
        let repo = repo().await;
        let records = seed(&repo, &["A1"]).await;
        let id = &records[0].id;

        repo.update_sync_outcome(id, &SyncOutcome::Accepted)
            .await
            .unwrap();
        repo.update_sync_outcome(id, &SyncOutcome::rejected("late failure"))
            .await
            .unwrap();

        let stored = repo.get(id).await.unwrap().unwrap();
        assert!(stored.synced);
        assert_eq!(stored.last_error, None);
        assert!(repo.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let repo = repo().await;
        let err = repo
            .update_sync_outcome("nope", &SyncOutcome::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_triggers_guard_invariants() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.scans();
        let records = seed(&repo, &["A1"]).await;
        let id = &records[0].id;
        repo.update_sync_outcome(id, &SyncOutcome::Accepted)
            .await
            .unwrap();

        let revert: DbError = sqlx::query("UPDATE scan_records SET synced = 0 WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(revert, DbError::InvariantViolation(_)));

        let rewrite: DbError = sqlx::query("UPDATE scan_records SET barcode = 'X' WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();
        assert!(matches!(rewrite, DbError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_apply_batch_outcomes_partial() {
        let repo = repo().await;
        let records = seed(&repo, &["A1", "A2", "A3"]).await;

        let outcomes = vec![
            (records[0].id.clone(), SyncOutcome::Accepted),
            (records[1].id.clone(), SyncOutcome::rejected("malformed barcode")),
            (records[2].id.clone(), SyncOutcome::Accepted),
        ];
        let applied = repo.apply_batch_outcomes(&outcomes).await.unwrap();
        assert_eq!(
            applied,
            AppliedOutcomes {
                accepted: 2,
                rejected: 1,
                missing: 0
            }
        );

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            QueueCounts {
                total: 3,
                pending: 1,
                synced: 2
            }
        );

        let rejected = repo.get(&records[1].id).await.unwrap().unwrap();
        assert_eq!(rejected.sync_attempts, 1);
        assert_eq!(rejected.last_error.as_deref(), Some("malformed barcode"));

        let accepted = repo.get(&records[0].id).await.unwrap().unwrap();
        assert_eq!(accepted.sync_attempts, 1);

        // A second answered batch only touches what is still pending
        let retry = vec![(records[1].id.clone(), SyncOutcome::Accepted)];
        repo.apply_batch_outcomes(&retry).await.unwrap();
        assert_eq!(repo.get(&records[1].id).await.unwrap().unwrap().sync_attempts, 2);
        assert_eq!(repo.get(&records[0].id).await.unwrap().unwrap().sync_attempts, 1);
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_batch_outcomes_skips_cleared_records() {
        let repo = repo().await;
        let records = seed(&repo, &["A1"]).await;
        repo.clear_all().await.unwrap();

        let outcomes = vec![(records[0].id.clone(), SyncOutcome::Accepted)];
        let applied = repo.apply_batch_outcomes(&outcomes).await.unwrap();
        assert_eq!(applied.missing, 1);
        assert!(repo.count_by_status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_is_total() {
        let repo = repo().await;
        let records = seed(&repo, &["A1", "A2", "A3"]).await;
        repo.update_sync_outcome(&records[0].id, &SyncOutcome::Accepted)
            .await
            .unwrap();

        assert_eq!(repo.clear_all().await.unwrap(), 3);
        assert_eq!(repo.count_by_status().await.unwrap(), QueueCounts::default());
        assert_eq!(repo.clear_all().await.unwrap(), 0);
    }
}
