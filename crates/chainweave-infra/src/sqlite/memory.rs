//! SQLite memory store implementation.
//!
//! Implements `MemoryStore` from `chainweave-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, writes through the
//! single-connection writer so appends serialize and are durable before
//! `append` returns.

use chrono::{DateTime, Utc};
use sqlx::Row;

use chainweave_core::memory::MemoryStore;
use chainweave_types::error::StoreError;
use chainweave_types::memory::{MemorySlice, NewSlice, SliceFilter, SortOrder, StoreStats};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MemoryStore`.
///
/// Cheap to clone: both underlying pools are handles.
#[derive(Clone)]
pub struct SqliteMemoryStore {
    pool: DatabasePool,
}

impl SqliteMemoryStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SliceRow {
    id: i64,
    run_id: String,
    step_name: String,
    content: String,
    classification: String,
    metadata: String,
    created_at: String,
}

impl SliceRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            step_name: row.try_get("step_name")?,
            content: row.try_get("content")?,
            classification: row.try_get("classification")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_slice(self) -> Result<MemorySlice, StoreError> {
        let classification = self
            .classification
            .parse()
            .map_err(|e: String| StoreError::CorruptSlice {
                id: self.id,
                message: e,
            })?;
        let metadata =
            serde_json::from_str(&self.metadata).map_err(|e| StoreError::CorruptSlice {
                id: self.id,
                message: format!("invalid metadata: {e}"),
            })?;
        let created_at = parse_datetime(self.id, &self.created_at)?;

        Ok(MemorySlice {
            id: self.id,
            run_id: self.run_id,
            step_name: self.step_name,
            content: self.content,
            classification,
            metadata,
            created_at,
        })
    }
}

fn parse_datetime(id: i64, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptSlice {
            id,
            message: format!("invalid created_at: {e}"),
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl MemoryStore for SqliteMemoryStore {
    async fn append(&self, slice: NewSlice) -> Result<MemorySlice, StoreError> {
        let metadata = serde_json::to_string(&slice.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO memory_slices (run_id, step_name, content, classification, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&slice.run_id)
        .bind(&slice.step_name)
        .bind(&slice.content)
        .bind(slice.classification.to_string())
        .bind(&metadata)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_err)?;

        Ok(MemorySlice {
            id: result.last_insert_rowid(),
            run_id: slice.run_id,
            step_name: slice.step_name,
            content: slice.content,
            classification: slice.classification,
            metadata: slice.metadata,
            created_at,
        })
    }

    async fn query(
        &self,
        filter: &SliceFilter,
        limit: Option<u32>,
        order: SortOrder,
    ) -> Result<Vec<MemorySlice>, StoreError> {
        let mut sql = String::from("SELECT * FROM memory_slices WHERE 1=1");
        if filter.run_id.is_some() {
            sql.push_str(" AND run_id = ?");
        }
        if filter.step_name.is_some() {
            sql.push_str(" AND step_name = ?");
        }
        if filter.classification.is_some() {
            sql.push_str(" AND classification = ?");
        }
        sql.push_str(match order {
            SortOrder::NewestFirst => " ORDER BY id DESC",
            SortOrder::OldestFirst => " ORDER BY id ASC",
        });
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(run_id) = &filter.run_id {
            query = query.bind(run_id);
        }
        if let Some(step_name) = &filter.step_name {
            query = query.bind(step_name);
        }
        if let Some(classification) = filter.classification {
            query = query.bind(classification.to_string());
        }
        if let Some(limit) = limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool.reader).await.map_err(db_err)?;
        rows.iter()
            .map(|row| SliceRow::from_row(row).map_err(db_err)?.into_slice())
            .collect()
    }

    async fn latest(&self, filter: &SliceFilter) -> Result<Option<MemorySlice>, StoreError> {
        let slices = self.query(filter, Some(1), SortOrder::NewestFirst).await?;
        Ok(slices.into_iter().next())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<MemorySlice>, StoreError> {
        self.query(&SliceFilter::for_run(run_id), None, SortOrder::OldestFirst)
            .await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (total_entries,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memory_slices")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_err)?;

        let (distinct_runs,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT run_id) FROM memory_slices")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(db_err)?;

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT classification, COUNT(*) FROM memory_slices GROUP BY classification",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(db_err)?;

        Ok(StoreStats {
            total_entries: total_entries as u64,
            distinct_runs: distinct_runs as u64,
            by_classification: rows
                .into_iter()
                .map(|(classification, count)| (classification, count as u64))
                .collect(),
        })
    }

    async fn cleanup(&self, older_than_days: u32) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));

        // created_at is stored as RFC 3339 in UTC, so string comparison
        // orders the same way the timestamps do.
        let result = sqlx::query("DELETE FROM memory_slices WHERE created_at < ?")
            .bind(format_datetime(&cutoff))
            .execute(&self.pool.writer)
            .await
            .map_err(db_err)?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted, older_than_days, "removed aged memory slices");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainweave_types::memory::Classification;
    use serde_json::json;

    // The TempDir guard must outlive the store or the database vanishes
    // mid-test.
    async fn test_store() -> (tempfile::TempDir, SqliteMemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (dir, SqliteMemoryStore::new(pool))
    }

    fn slice(run: &str, step: &str, content: &str) -> NewSlice {
        NewSlice::text(run, step, content, Classification::Output)
    }

    #[tokio::test]
    async fn test_append_and_fetch_round_trip() {
        let (_dir, store) = test_store().await;

        let mut metadata = serde_json::Map::new();
        metadata.insert("provider".to_string(), json!("anthropic"));
        let stored = store
            .append(slice("run_1", "draft", "the draft").with_metadata(metadata))
            .await
            .unwrap();
        assert!(stored.id > 0);

        let fetched = store
            .latest(&SliceFilter::for_run("run_1").step_name("draft"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, stored.id);
        assert_eq!(fetched.content, "the draft");
        assert_eq!(fetched.classification, Classification::Output);
        assert_eq!(fetched.metadata["provider"], "anthropic");
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (_dir, store) = test_store().await;
        let a = store.append(slice("run_1", "a", "1")).await.unwrap();
        let b = store.append(slice("run_1", "b", "2")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_query_filters_and_limit() {
        let (_dir, store) = test_store().await;
        store.append(slice("run_1", "a", "1")).await.unwrap();
        store.append(slice("run_2", "b", "2")).await.unwrap();
        store
            .append(NewSlice::text(
                "run_1",
                "__initial__",
                "q",
                Classification::UserPrompt,
            ))
            .await
            .unwrap();

        let run_1 = store
            .query(&SliceFilter::for_run("run_1"), None, SortOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(run_1.len(), 2);
        assert_eq!(run_1[0].classification, Classification::UserPrompt);

        let limited = store
            .query(&SliceFilter::for_run("run_1"), Some(1), SortOrder::OldestFirst)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].step_name, "a");

        let outputs = store
            .query(
                &SliceFilter::default().classification(Classification::Output),
                None,
                SortOrder::OldestFirst,
            )
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_history_ascending() {
        let (_dir, store) = test_store().await;
        for step in ["first", "second", "third"] {
            store.append(slice("run_1", step, step)).await.unwrap();
        }

        let history = store.history("run_1").await.unwrap();
        let names: Vec<&str> = history.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_dir, store) = test_store().await;
        store.append(slice("run_1", "a", "1")).await.unwrap();
        store.append(slice("run_2", "b", "2")).await.unwrap();
        store
            .append(NewSlice::text(
                "run_1",
                "__initial__",
                "q",
                Classification::UserPrompt,
            ))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.distinct_runs, 2);
        assert_eq!(stats.by_classification["output"], 2);
        assert_eq!(stats.by_classification["user_prompt"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_aged_slices() {
        let (_dir, store) = test_store().await;
        store.append(slice("run_1", "fresh", "new")).await.unwrap();

        // Backdate a slice past the retention window.
        let old = Utc::now() - chrono::Duration::days(60);
        sqlx::query(
            "INSERT INTO memory_slices (run_id, step_name, content, classification, metadata, created_at)
             VALUES ('run_0', 'ancient', 'old', 'output', '{}', ?)",
        )
        .bind(format_datetime(&old))
        .execute(&store.pool.writer)
        .await
        .unwrap();

        let deleted = store.cleanup(30).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.stats().await.unwrap();
        assert_eq!(remaining.total_entries, 1);
        assert!(store.history("run_0").await.unwrap().is_empty());
    }
}
