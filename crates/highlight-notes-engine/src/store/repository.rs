use std::sync::Arc;

use serde_json::{Value, json};

use super::KeyValueStore;
use crate::anchoring::{Anchor, AnchorPatch, HighlightId};
use crate::error::StoreError;

const ENABLED_KEY: &str = "highlighterEnabled";

/// Per-URL highlight collections, stored as `{ "highlights": [...] }` under
/// the page URL.
///
/// Entries that fail to parse are skipped when loading but left in place
/// when the collection is rewritten.
#[derive(Clone)]
pub struct HighlightRepository {
    store: Arc<dyn KeyValueStore>,
}

impl HighlightRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    async fn load_raw(&self, url: &str) -> Result<Vec<Value>, StoreError> {
        let Some(record) = self.store.get(url).await? else {
            return Ok(Vec::new());
        };
        match record.get("highlights") {
            Some(Value::Array(entries)) => Ok(entries.clone()),
            _ => {
                log::warn!("Malformed highlight record for {url}, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save_raw(&self, url: &str, entries: Vec<Value>) -> Result<(), StoreError> {
        self.store.set(url, json!({ "highlights": entries })).await
    }

    /// Anchors for `url` in creation order.
    pub async fn load(&self, url: &str) -> Result<Vec<Anchor>, StoreError> {
        let anchors = self
            .load_raw(url)
            .await?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Anchor>(entry) {
                Ok(anchor) => Some(anchor),
                Err(e) => {
                    log::warn!("Skipping malformed highlight for {url}: {e}");
                    None
                }
            })
            .collect();
        Ok(anchors)
    }

    pub async fn append(&self, url: &str, anchor: &Anchor) -> Result<(), StoreError> {
        let mut entries = self.load_raw(url).await?;
        let value = serde_json::to_value(anchor)?;
        match entries.iter_mut().find(|entry| entry_id(entry) == Some(anchor.id.as_str())) {
            Some(existing) => *existing = value,
            None => entries.push(value),
        }
        self.save_raw(url, entries).await?;
        log::debug!("Saved highlight {} for {url}", anchor.id);
        Ok(())
    }

    /// Apply a color/note patch. Returns the updated anchor, or `None` when
    /// the id is unknown.
    pub async fn update(
        &self,
        url: &str,
        id: &HighlightId,
        patch: &AnchorPatch,
    ) -> Result<Option<Anchor>, StoreError> {
        let mut entries = self.load_raw(url).await?;
        let Some(entry) = entries.iter_mut().find(|entry| entry_id(entry) == Some(id.as_str())) else {
            return Ok(None);
        };
        let mut anchor: Anchor = serde_json::from_value(entry.clone())?;
        patch.apply(&mut anchor);
        *entry = serde_json::to_value(&anchor)?;
        self.save_raw(url, entries).await?;
        log::debug!("Updated highlight {id} for {url}");
        Ok(Some(anchor))
    }

    /// Returns whether anything was removed.
    pub async fn delete(&self, url: &str, id: &HighlightId) -> Result<bool, StoreError> {
        let mut entries = self.load_raw(url).await?;
        let before = entries.len();
        entries.retain(|entry| entry_id(entry) != Some(id.as_str()));
        if entries.len() == before {
            return Ok(false);
        }
        self.save_raw(url, entries).await?;
        log::debug!("Deleted highlight {id} for {url}");
        Ok(true)
    }

    /// Append remote anchors that are not stored locally yet. Local order is
    /// kept; returns how many were added.
    pub async fn merge_remote(&self, url: &str, remote: Vec<Anchor>) -> Result<usize, StoreError> {
        let mut entries = self.load_raw(url).await?;
        let mut added = 0;
        for anchor in remote {
            if entries.iter().any(|entry| entry_id(entry) == Some(anchor.id.as_str())) {
                continue;
            }
            entries.push(serde_json::to_value(&anchor)?);
            added += 1;
        }
        if added > 0 {
            self.save_raw(url, entries).await?;
        }
        Ok(added)
    }

    /// Whether highlighting is switched on. Defaults to on.
    pub async fn load_enabled(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(ENABLED_KEY)
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(true))
    }

    pub async fn save_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.store.set(ENABLED_KEY, Value::Bool(enabled)).await
    }
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}
