//! Best-effort replication to a remote store.
//!
//! Every local change is tried against the remote once. Failures land in a
//! FIFO retry queue kept in the local store, which a sweep drains later in
//! order, at most one sweep at a time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HighlightRepository, KeyValueStore};
use crate::anchoring::{Anchor, HighlightId};
use crate::error::{HighlightError, StoreError, SyncError};

pub const SYNC_QUEUE_KEY: &str = "__SYNC_QUEUE__";
pub const PROCESSING_FLAG_KEY: &str = "__SYNC_PROCESSING__";

/// An anchor as the remote stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHighlight {
    #[serde(flatten)]
    pub anchor: Anchor,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SyncOp {
    Save { highlight: RemoteHighlight },
    Delete { id: HighlightId },
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upsert(&self, record: &RemoteHighlight) -> Result<RemoteHighlight, SyncError>;

    async fn delete(&self, id: &HighlightId) -> Result<(), SyncError>;

    async fn list_by_url(&self, url: &str) -> Result<Vec<RemoteHighlight>, SyncError>;
}

/// Outcome of one queue sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Operations the remote accepted.
    pub processed: usize,
    /// Unreadable entries removed from the queue without a remote call.
    pub dropped: usize,
    pub remaining: usize,
    /// The sweep stopped early because the remote failed.
    pub stopped: bool,
    /// Another sweep held the processing flag, nothing was done.
    pub skipped: bool,
}

#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<dyn KeyValueStore>,
    batch_size: usize,
}

impl SyncQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    async fn load_raw(&self) -> Result<Vec<Value>, StoreError> {
        Ok(match self.store.get(SYNC_QUEUE_KEY).await? {
            Some(Value::Array(ops)) => ops,
            _ => Vec::new(),
        })
    }

    pub async fn enqueue(&self, op: SyncOp) -> Result<(), StoreError> {
        let mut ops = self.load_raw().await?;
        ops.push(serde_json::to_value(&op)?);
        self.store.set(SYNC_QUEUE_KEY, Value::Array(ops)).await
    }

    pub async fn pending(&self) -> Result<Vec<SyncOp>, StoreError> {
        Ok(self
            .load_raw()
            .await?
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect())
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load_raw().await?.len())
    }

    pub async fn is_processing(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(PROCESSING_FLAG_KEY)
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(false))
    }

    async fn set_processing(&self, processing: bool) -> Result<(), StoreError> {
        self.store
            .set(PROCESSING_FLAG_KEY, Value::Bool(processing))
            .await
    }

    /// Clear a processing flag left behind by a sweep that never finished.
    /// Call once at startup, before any sweep can be running.
    pub async fn recover(&self) -> Result<bool, StoreError> {
        if !self.is_processing().await? {
            return Ok(false);
        }
        log::warn!("Clearing stale sync processing flag");
        self.set_processing(false).await?;
        Ok(true)
    }

    /// Retry up to one batch of queued operations against `remote`, in
    /// order, stopping at the first failure. The processing flag is always
    /// cleared afterwards.
    pub async fn process(&self, remote: &dyn RemoteStore) -> Result<SweepReport, StoreError> {
        if self.is_processing().await? {
            log::debug!("Sync sweep already running");
            return Ok(SweepReport {
                skipped: true,
                ..Default::default()
            });
        }
        self.set_processing(true).await?;

        let result = self.sweep(remote).await;

        if let Err(e) = self.set_processing(false).await {
            log::warn!("Failed to clear sync processing flag: {e}");
            result?;
            return Err(e);
        }
        result
    }

    async fn sweep(&self, remote: &dyn RemoteStore) -> Result<SweepReport, StoreError> {
        let batch: Vec<Value> = self
            .load_raw()
            .await?
            .into_iter()
            .take(self.batch_size)
            .collect();
        let mut report = SweepReport::default();

        for value in batch {
            match serde_json::from_value::<SyncOp>(value) {
                Ok(op) => {
                    if let Err(e) = execute(remote, &op).await {
                        log::warn!("Sync retry failed, stopping sweep: {e}");
                        report.stopped = true;
                        break;
                    }
                    report.processed += 1;
                }
                Err(e) => {
                    log::warn!("Dropping malformed sync operation: {e}");
                    report.dropped += 1;
                }
            }
            // The queue may have grown meanwhile; only the head is ours
            let mut ops = self.load_raw().await?;
            if !ops.is_empty() {
                ops.remove(0);
            }
            self.store.set(SYNC_QUEUE_KEY, Value::Array(ops)).await?;
        }

        report.remaining = self.len().await?;
        if report.processed + report.dropped > 0 {
            log::info!(
                "Sync sweep processed {} operation(s), dropped {}, {} remaining",
                report.processed,
                report.dropped,
                report.remaining
            );
        }
        Ok(report)
    }
}

async fn execute(remote: &dyn RemoteStore, op: &SyncOp) -> Result<(), SyncError> {
    match op {
        SyncOp::Save { highlight } => remote.upsert(highlight).await.map(|_| ()),
        SyncOp::Delete { id } => remote.delete(id).await,
    }
}

/// Pushes local changes to the remote, falling back to the retry queue.
#[derive(Clone)]
pub struct Syncer {
    remote: Arc<dyn RemoteStore>,
    queue: SyncQueue,
    user_id: Option<String>,
}

impl Syncer {
    pub fn new(remote: Arc<dyn RemoteStore>, queue: SyncQueue) -> Self {
        Self {
            remote,
            queue,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Returns whether the remote accepted the change directly.
    pub async fn push_save(&self, url: &str, anchor: &Anchor) -> Result<bool, StoreError> {
        let record = RemoteHighlight {
            anchor: anchor.clone(),
            url: url.to_string(),
            user_id: self.user_id.clone(),
        };
        match self.remote.upsert(&record).await {
            Ok(_) => Ok(true),
            Err(e) => {
                log::warn!("Remote save of {} failed, queued for retry: {e}", anchor.id);
                self.queue.enqueue(SyncOp::Save { highlight: record }).await?;
                Ok(false)
            }
        }
    }

    pub async fn push_delete(&self, id: &HighlightId) -> Result<bool, StoreError> {
        match self.remote.delete(id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                log::warn!("Remote delete of {id} failed, queued for retry: {e}");
                self.queue.enqueue(SyncOp::Delete { id: id.clone() }).await?;
                Ok(false)
            }
        }
    }

    /// Fetch the remote records for `url` and merge them into the local
    /// collection. Returns how many were new.
    pub async fn pull(&self, url: &str, repo: &HighlightRepository) -> Result<usize, HighlightError> {
        let records = self.remote.list_by_url(url).await?;
        let anchors = records.into_iter().map(|record| record.anchor).collect();
        let added = repo.merge_remote(url, anchors).await?;
        log::info!("Pulled {added} new highlight(s) for {url}");
        Ok(added)
    }

    pub async fn process_queue(&self) -> Result<SweepReport, StoreError> {
        self.queue.process(self.remote.as_ref()).await
    }
}
