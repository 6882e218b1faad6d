//! # Filesystem Ticket Store
//!
//! Local filesystem implementation of [`TicketStore`] for development and
//! single-node deployments. Each ticket is one JSON document.
//!
//! Layout, with the default collection names:
//! - `{base}/tickets/{ticket_id}.json`
//! - `{base}/requesters/{base64url(requester_id)}.json`

use crate::storage::{StorageError, TicketStore};
use crate::ticket::{RequesterRecord, Ticket, TicketPatch};
use crate::{RequesterId, TicketId, Timestamp};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Filesystem-backed document store
///
/// Writes go to a temporary file that is renamed into place. Read-modify-write
/// cycles are serialized within the process.
///
/// # Examples
///
/// ```no_run
/// use ticket_keeper_core::adapters::FilesystemTicketStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemTicketStore::new(PathBuf::from("./data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemTicketStore {
    base_path: PathBuf,
    tickets_collection: String,
    requesters_collection: String,
    write_lock: Arc<Mutex<()>>,
}

impl FilesystemTicketStore {
    /// Create store rooted at `base_path`, creating directories as needed
    ///
    /// # Errors
    ///
    /// Returns error if the directories cannot be created.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        Self::with_collections(base_path, "tickets", "requesters").await
    }

    /// Create store with custom collection directory names
    ///
    /// # Errors
    ///
    /// Returns error if a collection name is not a plain directory name or
    /// the directories cannot be created.
    pub async fn with_collections(
        base_path: PathBuf,
        tickets_collection: &str,
        requesters_collection: &str,
    ) -> Result<Self, StorageError> {
        for dir in [tickets_collection, requesters_collection] {
            if dir.is_empty()
                || !dir
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(StorageError::Unavailable {
                    message: format!("Invalid collection name '{}'", dir),
                });
            }

            fs::create_dir_all(base_path.join(dir))
                .await
                .map_err(|e| StorageError::Unavailable {
                    message: format!("Failed to create {} directory: {}", dir, e),
                })?;
        }

        Ok(Self {
            base_path,
            tickets_collection: tickets_collection.to_string(),
            requesters_collection: requesters_collection.to_string(),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn ticket_path(&self, id: &TicketId) -> PathBuf {
        // TicketId only admits [A-Za-z0-9_-], so it is a safe file name
        self.base_path
            .join(&self.tickets_collection)
            .join(format!("{}.json", id.as_str()))
    }

    fn requester_path(&self, requester_id: &RequesterId) -> PathBuf {
        let name = URL_SAFE_NO_PAD.encode(requester_id.as_str());
        self.base_path
            .join(&self.requesters_collection)
            .join(format!("{}.json", name))
    }

    async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::InternalError {
                    message: format!("Failed to read {}: {}", path.display(), e),
                })
            }
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::SerializationFailed {
                message: format!("Failed to deserialize {}: {}", path.display(), e),
            })
    }

    async fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StorageError> {
        let json =
            serde_json::to_string_pretty(document).map_err(|e| StorageError::SerializationFailed {
                message: format!("Failed to serialize document: {}", e),
            })?;

        let temp_path = path.with_extension("tmp");
        let result = Self::write_and_rename(&temp_path, path, json.as_bytes()).await;
        if result.is_err() {
            // Leave no partial document behind
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to create temp file: {}", e),
            })?;

        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to write document: {}", e),
            })?;

        file.flush()
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to flush file: {}", e),
            })?;
        drop(file);

        fs::rename(temp_path, path)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to rename temp file: {}", e),
            })
    }
}

#[async_trait]
impl TicketStore for FilesystemTicketStore {
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        Self::read_document(&self.ticket_path(id)).await
    }

    async fn create(&self, ticket: &Ticket) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.ticket_path(&ticket.id);

        let exists = fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to check {}: {}", path.display(), e),
            })?;
        if exists {
            return Err(StorageError::AlreadyExists {
                id: ticket.id.clone(),
            });
        }

        Self::write_document(&path, ticket).await
    }

    async fn update(&self, id: &TicketId, patch: &TicketPatch) -> Result<Ticket, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.ticket_path(id);

        let mut ticket: Ticket = Self::read_document(&path)
            .await?
            .ok_or_else(|| StorageError::NotFound { id: id.clone() })?;

        if !patch.precondition_holds(&ticket) {
            return Err(StorageError::PreconditionFailed {
                id: id.clone(),
                expected: patch.expected_status.clone().unwrap_or_default(),
                actual: ticket.status,
            });
        }

        patch.apply_to(&mut ticket);
        Self::write_document(&path, &ticket).await?;
        Ok(ticket)
    }

    async fn touch_requester(
        &self,
        requester_id: &RequesterId,
        seen_at: Timestamp,
    ) -> Result<RequesterRecord, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.requester_path(requester_id);

        let record = match Self::read_document::<RequesterRecord>(&path).await? {
            Some(mut existing) => {
                existing.touch(seen_at);
                existing
            }
            None => RequesterRecord::first_seen(requester_id.clone(), seen_at),
        };

        Self::write_document(&path, &record).await?;
        Ok(record)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let metadata = fs::metadata(self.base_path.join(&self.tickets_collection))
            .await
            .map_err(|e| StorageError::Unavailable {
                message: format!("Ticket directory not accessible: {}", e),
            })?;

        if !metadata.is_dir() {
            return Err(StorageError::Unavailable {
                message: "Ticket path is not a directory".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "filesystem_store_tests.rs"]
mod tests;
