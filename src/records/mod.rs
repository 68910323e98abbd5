//! Local record store for `users` and `tokens`
//!
//! Each store hands out auto-incrementing ids. Writing a record under an
//! explicit id moves the id generator past it, so later inserts never collide.
//! When a path is configured the whole store is rewritten atomically as JSON
//! after every mutation. A mutation becomes visible in memory only once that
//! write succeeded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record id {0} is out of range")]
    IdOutOfRange(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// User fields without an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: u64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectStore<T> {
    next_id: u64,
    records: BTreeMap<u64, T>,
}

impl<T> Default for ObjectStore<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

impl<T: Clone> ObjectStore<T> {
    fn add(&mut self, build: impl FnOnce(u64) -> T) -> Result<u64, RecordError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(RecordError::IdOutOfRange(id))?;
        self.records.insert(id, build(id));
        Ok(id)
    }

    /// The generator must stay ahead of every stored id, so `u64::MAX` is
    /// never accepted
    fn put(&mut self, id: u64, record: T) -> Result<(), RecordError> {
        let after = id.checked_add(1).ok_or(RecordError::IdOutOfRange(id))?;
        self.records.insert(id, record);
        self.next_id = self.next_id.max(after);
        Ok(())
    }

    fn all(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    users: ObjectStore<User>,
    #[serde(default)]
    tokens: ObjectStore<Token>,
}

pub struct RecordStore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl RecordStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(StoreData::default()),
        }
    }

    /// Open a store, loading `path` if it exists
    pub async fn open(path: Option<PathBuf>) -> Result<Self, RecordError> {
        let Some(path) = path else {
            return Ok(Self::in_memory());
        };

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "Opened record store");
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `change` to a copy of the store, persist the copy, then publish it
    async fn mutate<R>(
        &self,
        change: impl FnOnce(&mut StoreData) -> Result<R, RecordError>,
    ) -> Result<R, RecordError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let result = change(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(result)
    }

    async fn persist(&self, data: &StoreData) -> Result<(), RecordError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(data)?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    pub async fn add_user(&self, user: NewUser) -> Result<u64, RecordError> {
        let id = self
            .mutate(|data| {
                data.users.add(|id| User {
                    id,
                    name: user.name,
                    email: user.email,
                })
            })
            .await?;
        tracing::info!(id = id, "User stored");
        Ok(id)
    }

    pub async fn add_token(&self, token: impl Into<String>) -> Result<u64, RecordError> {
        let token = token.into();
        let id = self
            .mutate(|data| data.tokens.add(|id| Token { id, token }))
            .await?;
        tracing::info!(id = id, "Token stored");
        Ok(id)
    }

    pub async fn users(&self) -> Vec<User> {
        self.data.lock().await.users.all()
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.data.lock().await.tokens.all()
    }

    pub async fn get_user(&self, id: u64) -> Option<User> {
        self.data.lock().await.users.records.get(&id).cloned()
    }

    /// Replace the user stored under `id`, creating it if absent
    pub async fn update_user(&self, id: u64, user: NewUser) -> Result<User, RecordError> {
        let record = User {
            id,
            name: user.name,
            email: user.email,
        };
        let stored = record.clone();
        self.mutate(|data| data.users.put(id, stored)).await?;
        tracing::info!(id = id, "User updated");
        Ok(record)
    }

    /// Returns true if the user existed
    pub async fn delete_user(&self, id: u64) -> Result<bool, RecordError> {
        if self.get_user(id).await.is_none() {
            return Ok(false);
        }
        let existed = self
            .mutate(|data| Ok(data.users.records.remove(&id).is_some()))
            .await?;
        if existed {
            tracing::info!(id = id, "User deleted");
        }
        Ok(existed)
    }

    /// Returns true if the token existed
    pub async fn delete_token(&self, id: u64) -> Result<bool, RecordError> {
        if !self.data.lock().await.tokens.records.contains_key(&id) {
            return Ok(false);
        }
        let existed = self
            .mutate(|data| Ok(data.tokens.records.remove(&id).is_some()))
            .await?;
        if existed {
            tracing::info!(id = id, "Token deleted");
        }
        Ok(existed)
    }
}
