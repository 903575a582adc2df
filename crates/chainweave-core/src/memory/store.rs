//! MemoryStore trait definition and the in-memory test implementation.
//!
//! The store is append-only: slices are never updated, only added and
//! (by the retention sweep) bulk-deleted by age. Implementations must
//! make a slice durable before `append` returns and must assign strictly
//! increasing ids. The SQLite implementation lives in chainweave-infra.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use chainweave_types::error::StoreError;
use chainweave_types::memory::{MemorySlice, NewSlice, SliceFilter, SortOrder, StoreStats};

/// Repository trait for workflow memory slices.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait MemoryStore: Send + Sync {
    /// Append a slice. Returns the stored record with its assigned id.
    fn append(
        &self,
        slice: NewSlice,
    ) -> impl std::future::Future<Output = Result<MemorySlice, StoreError>> + Send;

    /// Query slices matching a filter, with optional limit.
    fn query(
        &self,
        filter: &SliceFilter,
        limit: Option<u32>,
        order: SortOrder,
    ) -> impl std::future::Future<Output = Result<Vec<MemorySlice>, StoreError>> + Send;

    /// The most recent slice matching a filter, if any.
    fn latest(
        &self,
        filter: &SliceFilter,
    ) -> impl std::future::Future<Output = Result<Option<MemorySlice>, StoreError>> + Send;

    /// Complete history of a run, oldest first.
    fn history(
        &self,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<MemorySlice>, StoreError>> + Send;

    /// Aggregate statistics over the whole store.
    fn stats(&self)
    -> impl std::future::Future<Output = Result<StoreStats, StoreError>> + Send;

    /// Delete slices older than the given number of days. Returns the
    /// number of deleted slices.
    fn cleanup(
        &self,
        older_than_days: u32,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    slices: Vec<MemorySlice>,
}

/// In-memory [`MemoryStore`] for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(slice: &MemorySlice, filter: &SliceFilter) -> bool {
    if let Some(run_id) = &filter.run_id {
        if &slice.run_id != run_id {
            return false;
        }
    }
    if let Some(step_name) = &filter.step_name {
        if &slice.step_name != step_name {
            return false;
        }
    }
    if let Some(classification) = filter.classification {
        if slice.classification != classification {
            return false;
        }
    }
    true
}

impl MemoryStore for InMemoryStore {
    async fn append(&self, slice: NewSlice) -> Result<MemorySlice, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let stored = MemorySlice {
            id: inner.next_id,
            run_id: slice.run_id,
            step_name: slice.step_name,
            content: slice.content,
            classification: slice.classification,
            metadata: slice.metadata,
            created_at: Utc::now(),
        };
        inner.slices.push(stored.clone());
        Ok(stored)
    }

    async fn query(
        &self,
        filter: &SliceFilter,
        limit: Option<u32>,
        order: SortOrder,
    ) -> Result<Vec<MemorySlice>, StoreError> {
        let inner = self.inner.lock().await;
        let mut results: Vec<MemorySlice> = inner
            .slices
            .iter()
            .filter(|s| matches(s, filter))
            .cloned()
            .collect();
        if order == SortOrder::NewestFirst {
            results.reverse();
        }
        if let Some(limit) = limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    async fn latest(&self, filter: &SliceFilter) -> Result<Option<MemorySlice>, StoreError> {
        let results = self.query(filter, Some(1), SortOrder::NewestFirst).await?;
        Ok(results.into_iter().next())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<MemorySlice>, StoreError> {
        self.query(
            &SliceFilter::for_run(run_id),
            None,
            SortOrder::OldestFirst,
        )
        .await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.inner.lock().await;
        let mut by_classification: BTreeMap<String, u64> = BTreeMap::new();
        let mut runs = std::collections::HashSet::new();
        for slice in &inner.slices {
            *by_classification
                .entry(slice.classification.to_string())
                .or_insert(0) += 1;
            runs.insert(slice.run_id.as_str());
        }
        Ok(StoreStats {
            total_entries: inner.slices.len() as u64,
            distinct_runs: runs.len() as u64,
            by_classification,
        })
    }

    async fn cleanup(&self, older_than_days: u32) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
        let mut inner = self.inner.lock().await;
        let before = inner.slices.len();
        inner.slices.retain(|s| s.created_at >= cutoff);
        Ok((before - inner.slices.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainweave_types::memory::Classification;

    fn slice(run: &str, step: &str, classification: Classification) -> NewSlice {
        NewSlice::text(run, step, format!("content of {step}"), classification)
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = InMemoryStore::new();
        let first = store
            .append(slice("run_1", "a", Classification::Output))
            .await
            .unwrap();
        let second = store
            .append(slice("run_1", "b", Classification::Output))
            .await
            .unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = InMemoryStore::new();
        store
            .append(slice("run_1", "a", Classification::Output))
            .await
            .unwrap();
        store
            .append(slice("run_2", "b", Classification::Output))
            .await
            .unwrap();
        store
            .append(slice("run_1", "c", Classification::UserPrompt))
            .await
            .unwrap();

        let run_1 = store
            .query(&SliceFilter::for_run("run_1"), None, SortOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(run_1.len(), 2);
        assert_eq!(run_1[0].step_name, "c");

        let outputs = store
            .query(
                &SliceFilter::default().classification(Classification::Output),
                None,
                SortOrder::OldestFirst,
            )
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].step_name, "a");
    }

    #[tokio::test]
    async fn test_latest_picks_newest_match() {
        let store = InMemoryStore::new();
        store
            .append(NewSlice::text("run_1", "draft", "v1", Classification::Output))
            .await
            .unwrap();
        store
            .append(NewSlice::text("run_1", "draft", "v2", Classification::Output))
            .await
            .unwrap();

        let latest = store
            .latest(&SliceFilter::for_run("run_1").step_name("draft"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.content, "v2");
    }

    #[tokio::test]
    async fn test_history_is_oldest_first() {
        let store = InMemoryStore::new();
        for step in ["a", "b", "c"] {
            store
                .append(slice("run_1", step, Classification::Output))
                .await
                .unwrap();
        }
        let history = store.history("run_1").await.unwrap();
        let names: Vec<&str> = history.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryStore::new();
        store
            .append(slice("run_1", "a", Classification::Output))
            .await
            .unwrap();
        store
            .append(slice("run_2", "b", Classification::UserPrompt))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.distinct_runs, 2);
        assert_eq!(stats.by_classification["output"], 1);
        assert_eq!(stats.by_classification["user_prompt"], 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let store = InMemoryStore::new();
        store
            .append(slice("run_1", "a", Classification::Output))
            .await
            .unwrap();
        let removed = store.cleanup(30).await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.history("run_1").await.unwrap().len(), 1);
    }
}
