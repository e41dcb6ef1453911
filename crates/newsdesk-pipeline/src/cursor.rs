//! Persisted high-water mark of processed source identifiers.
//!
//! The file holds a JSON object with a `last_processed_id` field. Other
//! fields in the object are left as they were when the cursor is saved.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use newsdesk_types::{NewsdeskError, Result};

const CURSOR_KEY: &str = "last_processed_id";

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> Result<u64>;

    async fn save(&self, cursor: u64) -> Result<()>;
}

/// Cursor kept in a small JSON file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_object(&self) -> Result<Option<serde_json::Map<String, Value>>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&text)? {
            Value::Object(map) => Ok(Some(map)),
            other => Err(NewsdeskError::Config(format!(
                "state file {} must hold a JSON object, found {}",
                self.path.display(),
                other
            ))),
        }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    /// A missing file is a configuration error: the state file is expected
    /// to be provisioned before the first run.
    async fn load(&self) -> Result<u64> {
        let map = self.read_object().await?.ok_or_else(|| {
            NewsdeskError::Config(format!("state file {} not found", self.path.display()))
        })?;
        match map.get(CURSOR_KEY) {
            None | Some(Value::Null) => Ok(0),
            Some(v) => v.as_u64().ok_or_else(|| {
                NewsdeskError::Config(format!(
                    "{CURSOR_KEY} in {} is not a non-negative integer: {v}",
                    self.path.display()
                ))
            }),
        }
    }

    async fn save(&self, cursor: u64) -> Result<()> {
        let mut map = self.read_object().await?.unwrap_or_default();
        map.insert(CURSOR_KEY.into(), json!(cursor));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&Value::Object(map))?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), cursor, "Cursor saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_reads_last_processed_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"last_processed_id": 42}"#)
            .await
            .unwrap();
        assert_eq!(FileCursorStore::new(&path).load().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("absent.json"));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, NewsdeskError::Config(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn missing_key_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{}").await.unwrap();
        assert_eq!(FileCursorStore::new(&path).load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn negative_cursor_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"last_processed_id": -3}"#)
            .await
            .unwrap();
        assert!(FileCursorStore::new(&path).load().await.is_err());
    }

    #[tokio::test]
    async fn save_keeps_unrelated_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"last_processed_id": 1, "owner": "desk"}"#)
            .await
            .unwrap();

        let store = FileCursorStore::new(&path);
        store.save(77).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 77);

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["owner"], "desk");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn save_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = FileCursorStore::new(&path);
        store.save(5).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 5);
    }
}
