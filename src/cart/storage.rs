use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::errors::ServiceError;

/// Fixed namespace the cart payload is stored under, mirrored in the file
/// name on disk so a snapshot is recognizable in either place.
pub const CART_STORAGE_KEY: &str = "angohost_cart";

/// Session ids become path components, so the charset is restricted to
/// alphanumerics, `-` and `_`.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

/// Durable storage for serialized cart snapshots, one per browsing session.
///
/// The payload is the raw JSON array of items; interpreting it (including
/// tolerating corrupt entries) is the store's job, not the storage's.
#[async_trait]
pub trait CartStorage: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<String>, ServiceError>;
    async fn save(&self, session_id: &str, payload: &str) -> Result<(), ServiceError>;
}

/// File-backed storage, one directory per session
pub struct FileCartStorage {
    base_dir: PathBuf,
}

impl FileCartStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn session_file(&self, session_id: &str) -> Result<PathBuf, ServiceError> {
        if !is_valid_session_id(session_id) {
            return Err(ServiceError::InvalidInput(
                "invalid session id".to_string(),
            ));
        }
        Ok(self
            .base_dir
            .join(session_id)
            .join(format!("{}.json", CART_STORAGE_KEY)))
    }
}

#[async_trait]
impl CartStorage for FileCartStorage {
    async fn load(&self, session_id: &str) -> Result<Option<String>, ServiceError> {
        let path = self.session_file(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::InternalError(format!(
                "Failed to read cart snapshot: {}",
                e
            ))),
        }
    }

    async fn save(&self, session_id: &str, payload: &str) -> Result<(), ServiceError> {
        let path = self.session_file(session_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ServiceError::InternalError(format!("Failed to create cart directory: {}", e))
            })?;
        }
        tokio::fs::write(&path, payload).await.map_err(|e| {
            ServiceError::InternalError(format!("Failed to write cart snapshot: {}", e))
        })?;
        debug!(session_id, "Persisted cart snapshot");
        Ok(())
    }
}

/// In-memory storage used by tests and ephemeral deployments
#[derive(Default)]
pub struct InMemoryCartStorage {
    snapshots: DashMap<String, String>,
}

impl InMemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStorage for InMemoryCartStorage {
    async fn load(&self, session_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.snapshots.get(session_id).map(|v| v.clone()))
    }

    async fn save(&self, session_id: &str, payload: &str) -> Result<(), ServiceError> {
        self.snapshots
            .insert(session_id.to_string(), payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_charset_is_enforced() {
        assert!(is_valid_session_id("sess-01_A"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../escape"));
        assert!(!is_valid_session_id("a/b"));
        assert!(!is_valid_session_id(&"x".repeat(129)));
    }

    #[tokio::test]
    async fn file_storage_round_trips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileCartStorage::new(dir.path());

        assert_eq!(storage.load("sess-1").await.unwrap(), None);

        storage.save("sess-1", r#"[{"id":"a"}]"#).await.unwrap();
        assert_eq!(
            storage.load("sess-1").await.unwrap().as_deref(),
            Some(r#"[{"id":"a"}]"#)
        );

        // Another session is an independent namespace
        assert_eq!(storage.load("sess-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_rejects_path_escaping_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileCartStorage::new(dir.path());
        assert!(storage.save("..", "[]").await.is_err());
        assert!(storage.load("a/../b").await.is_err());
    }

    #[tokio::test]
    async fn in_memory_storage_round_trips_payload() {
        let storage = InMemoryCartStorage::new();
        storage.save("sess-1", "[]").await.unwrap();
        assert_eq!(storage.load("sess-1").await.unwrap().as_deref(), Some("[]"));
    }
}
