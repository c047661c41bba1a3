//! Batched bulk deletion
//!
//! Keys are buffered per bucket and sent as one bulk delete when the batch
//! holds `MAX_BATCH` keys, when the bucket changes, and at the end.

use std::sync::Arc;

use crate::error::Result;
use crate::traits::ObjectStore;

/// Bulk delete limit of the store API
pub const MAX_BATCH: usize = 1000;

/// Totals of a batched deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Keys deleted (or that would be, in a dry run)
    pub deleted: usize,
    /// Bulk calls issued
    pub calls: usize,
    /// Keys the store refused, with its message
    pub failed: Vec<(String, String)>,
}

/// Accumulates keys and flushes them through `delete_objects`
pub struct BatchDeleter {
    store: Arc<dyn ObjectStore>,
    dry_run: bool,
    bucket: Option<String>,
    keys: Vec<String>,
    report: BatchReport,
}

impl BatchDeleter {
    pub fn new(store: Arc<dyn ObjectStore>, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            bucket: None,
            keys: Vec::with_capacity(MAX_BATCH),
            report: BatchReport::default(),
        }
    }

    /// Queue one key, flushing first if it belongs to another bucket
    pub async fn push(&mut self, bucket: &str, key: impl Into<String>) -> Result<()> {
        if self.bucket.as_deref() != Some(bucket) {
            self.flush().await?;
            self.bucket = Some(bucket.to_string());
        }

        self.keys.push(key.into());
        if self.keys.len() >= MAX_BATCH {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush the remainder and return the totals
    pub async fn finish(mut self) -> Result<BatchReport> {
        self.flush().await?;
        Ok(self.report)
    }

    async fn flush(&mut self) -> Result<()> {
        if self.keys.is_empty() {
            return Ok(());
        }
        let Some(bucket) = self.bucket.clone() else {
            return Ok(());
        };
        let keys = std::mem::replace(&mut self.keys, Vec::with_capacity(MAX_BATCH));

        if self.dry_run {
            self.report.deleted += keys.len();
            return Ok(());
        }

        tracing::debug!(bucket = %bucket, count = keys.len(), "Flushing delete batch");
        let outcome = self.store.delete_objects(&bucket, keys).await?;
        self.report.calls += 1;
        self.report.deleted += outcome.deleted.len();
        if !outcome.failed.is_empty() {
            tracing::warn!(
                bucket = %bucket,
                failed = outcome.failed.len(),
                "Bulk delete partially failed"
            );
            self.report.failed.extend(outcome.failed);
        }
        Ok(())
    }
}
