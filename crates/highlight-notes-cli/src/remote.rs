use std::path::{Path, PathBuf};

use async_trait::async_trait;
use highlight_notes_engine::error::SyncError;
use highlight_notes_engine::{HighlightId, RemoteHighlight, RemoteStore};

/// Remote store kept in a directory, one `<id>.json` file per highlight.
/// Stands in for a hosted backend; a missing directory is unreachable.
pub struct DirRemoteStore {
    dir: PathBuf,
}

impl DirRemoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, id: &HighlightId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn ensure_reachable(&self) -> Result<(), SyncError> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(SyncError::Network(format!(
                "remote directory {} is not available",
                self.dir.display()
            ))),
        }
    }
}

fn io_error(path: &Path, e: std::io::Error) -> SyncError {
    SyncError::Network(format!("{}: {e}", path.display()))
}

#[async_trait]
impl RemoteStore for DirRemoteStore {
    async fn upsert(&self, record: &RemoteHighlight) -> Result<RemoteHighlight, SyncError> {
        self.ensure_reachable().await?;
        let path = self.record_path(&record.anchor.id);
        let content =
            serde_json::to_string_pretty(record).map_err(|e| SyncError::Rejected(e.to_string()))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(record.clone())
    }

    async fn delete(&self, id: &HighlightId) -> Result<(), SyncError> {
        self.ensure_reachable().await?;
        let path = self.record_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list_by_url(&self, url: &str) -> Result<Vec<RemoteHighlight>, SyncError> {
        self.ensure_reachable().await?;
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            match serde_json::from_str::<RemoteHighlight>(&content) {
                Ok(record) if record.url == url => records.push(record),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable remote record {}: {e}", path.display()),
            }
        }
        records.sort_by(|a, b| a.anchor.id.cmp(&b.anchor.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_notes_engine::Anchor;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, url: &str) -> RemoteHighlight {
        RemoteHighlight {
            anchor: Anchor {
                id: HighlightId::from(id),
                quote: "quote".to_string(),
                prefix: String::new(),
                suffix: String::new(),
                color: "#fff475".to_string(),
                note: None,
                start_offset: 0,
                end_offset: 5,
                structural_path: String::new(),
            },
            url: url.to_string(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_list_delete() {
        let dir = TempDir::new().unwrap();
        let remote = DirRemoteStore::new(dir.path());

        remote.upsert(&record("b", "u")).await.unwrap();
        remote.upsert(&record("a", "u")).await.unwrap();
        remote.upsert(&record("c", "other")).await.unwrap();
        remote.delete(&HighlightId::from("b")).await.unwrap();
        remote.delete(&HighlightId::from("never-existed")).await.unwrap();

        let listed = remote.list_by_url("u").await.unwrap();
        assert_eq!(listed, vec![record("a", "u")]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_unreachable() {
        let dir = TempDir::new().unwrap();
        let remote = DirRemoteStore::new(dir.path().join("offline"));

        assert!(matches!(
            remote.upsert(&record("a", "u")).await,
            Err(SyncError::Network(_))
        ));
    }
}
