//! Persistence in a single serialized blob
//!
//! The whole board is one JSON array stored under a caller-chosen key.
//! Reads never fail: corrupt data and unusable storage are logged with
//! distinct diagnostics and both read as an empty board. Writes do fail,
//! which lets the store roll back.

use super::{BlobStore, PersistenceAdapter};
use crate::error::{KanbanError, Result};
use crate::types::{BoardItem, ColumnId, ColumnKey};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_COLUMN_FIELD: &str = "status";

fn value_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

/// Keeps all items as one JSON array in a [`BlobStore`]
pub struct LocalAdapter<T, K = ColumnId> {
    blobs: Arc<dyn BlobStore>,
    key: String,
    column_field: String,
    /// Held across each read-modify-write of the blob
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> (T, K)>,
}

impl<T, K> LocalAdapter<T, K>
where
    T: BoardItem + Serialize + DeserializeOwned,
    K: ColumnKey + Serialize,
{
    pub fn new(blobs: impl BlobStore + 'static, key: impl Into<String>) -> Self {
        Self::shared(Arc::new(blobs), key)
    }

    pub fn shared(blobs: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
            column_field: DEFAULT_COLUMN_FIELD.to_string(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Item field that holds the column id (default `status`)
    pub fn with_column_field(mut self, field: impl Into<String>) -> Self {
        self.column_field = field.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load items, reporting why loading failed
    ///
    /// A missing blob is an empty board. Undecodable data is
    /// [`KanbanError::CorruptData`]; a storage failure is
    /// [`KanbanError::StorageUnavailable`].
    pub async fn try_load(&self) -> Result<Vec<T>> {
        match self.read_blob().await? {
            Some(text) => serde_json::from_str(&text).map_err(|e| self.corrupt(e)),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite the stored board
    pub async fn save_items(&self, items: &[T]) -> Result<()> {
        let text = serde_json::to_string(items)?;
        let _guard = self.write_lock.lock().await;
        self.write_blob(&text).await
    }

    async fn read_blob(&self) -> Result<Option<String>> {
        self.blobs
            .read(&self.key)
            .await
            .map_err(|source| KanbanError::StorageUnavailable {
                key: self.key.clone(),
                source,
            })
    }

    async fn write_blob(&self, text: &str) -> Result<()> {
        self.blobs
            .write(&self.key, text)
            .await
            .map_err(|source| KanbanError::StorageUnavailable {
                key: self.key.clone(),
                source,
            })
    }

    fn corrupt(&self, err: serde_json::Error) -> KanbanError {
        KanbanError::CorruptData {
            key: self.key.clone(),
            message: err.to_string(),
        }
    }

    /// Raw stored values; writes edit these so unknown fields survive
    async fn load_values(&self) -> Result<Vec<Value>> {
        match self.read_blob().await? {
            Some(text) => serde_json::from_str(&text).map_err(|e| self.corrupt(e)),
            None => Ok(Vec::new()),
        }
    }

    async fn store_values(&self, values: &[Value]) -> Result<()> {
        let text = serde_json::to_string(values)?;
        self.write_blob(&text).await
    }

    fn position(values: &[Value], item_id: &str) -> Result<usize> {
        values
            .iter()
            .position(|value| value_id(value) == Some(item_id))
            .ok_or_else(|| KanbanError::ItemNotFound {
                id: item_id.to_string(),
            })
    }
}

#[async_trait]
impl<T, K> PersistenceAdapter<T, K> for LocalAdapter<T, K>
where
    T: BoardItem + Serialize + DeserializeOwned,
    K: ColumnKey + Serialize,
{
    async fn fetch_items(&self) -> Result<Vec<T>> {
        match self.try_load().await {
            Ok(items) => {
                debug!(key = %self.key, count = items.len(), "loaded items");
                Ok(items)
            }
            Err(KanbanError::CorruptData { key, message }) => {
                warn!(key = %key, error = %message, "stored board is corrupt; starting empty");
                Ok(Vec::new())
            }
            Err(KanbanError::StorageUnavailable { key, source }) => {
                warn!(
                    key = %key,
                    kind = ?source.kind(),
                    error = %source,
                    "storage unavailable; starting empty"
                );
                Ok(Vec::new())
            }
            Err(other) => Err(other),
        }
    }

    async fn update_item_column(&self, item_id: &str, column: &K) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_values().await?;
        let pos = Self::position(&values, item_id)?;
        let column = serde_json::to_value(column)?;
        match &mut values[pos] {
            Value::Object(fields) => {
                fields.insert(self.column_field.clone(), column);
            }
            _ => {
                return Err(KanbanError::CorruptData {
                    key: self.key.clone(),
                    message: format!("item {item_id} is not an object"),
                })
            }
        }
        self.store_values(&values).await
    }

    async fn create_item(&self, item: &T) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_values().await?;
        let value = serde_json::to_value(item)?;
        match Self::position(&values, item.id()) {
            Ok(pos) => values[pos] = value,
            Err(_) => values.push(value),
        }
        self.store_values(&values).await?;
        Ok(item.clone())
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_values().await?;
        let before = values.len();
        values.retain(|value| value_id(value) != Some(item_id));
        if values.len() == before {
            return Err(KanbanError::ItemNotFound {
                id: item_id.to_string(),
            });
        }
        self.store_values(&values).await
    }

    async fn update_item(&self, item: &T) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_values().await?;
        let pos = Self::position(&values, item.id())?;
        values[pos] = serde_json::to_value(item)?;
        self.store_values(&values).await
    }

    /// Rewrite the relative order of the listed items, leaving every other
    /// item in its slot
    async fn reorder_items(&self, column: &K, item_ids: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load_values().await?;
        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        let slots: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| value_id(value).is_some_and(|id| wanted.contains(id)))
            .map(|(pos, _)| pos)
            .collect();

        let ordered: Vec<Value> = item_ids
            .iter()
            .filter_map(|item_id| {
                slots
                    .iter()
                    .find(|&&pos| value_id(&values[pos]) == Some(item_id.as_str()))
                    .map(|&pos| values[pos].clone())
            })
            .collect();

        for (slot, value) in slots.into_iter().zip(ordered) {
            values[slot] = value;
        }
        debug!(key = %self.key, column = ?column, count = item_ids.len(), "reordered items");
        self.store_values(&values).await
    }
}
