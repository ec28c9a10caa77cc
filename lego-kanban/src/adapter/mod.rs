//! Persistence adapters
//!
//! The store talks to persistence only through [`PersistenceAdapter`]. Two
//! implementations ship here: [`RemoteAdapter`] for a REST collection and
//! [`LocalAdapter`] for a JSON blob in a [`BlobStore`].

mod blob;
mod local;
mod remote;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use local::LocalAdapter;
pub use remote::{RemoteAdapter, RemoteAdapterConfig};

use crate::error::{KanbanError, Result};
use crate::types::{BoardItem, ColumnId, ColumnKey};
use async_trait::async_trait;

/// Caller-supplied persistence for a store.
///
/// `fetch_items` and `update_item_column` are required. The remaining
/// operations default to [`KanbanError::Unsupported`], which the store treats
/// like any other failure and rolls back.
#[async_trait]
pub trait PersistenceAdapter<T, K = ColumnId>: Send + Sync
where
    T: BoardItem,
    K: ColumnKey,
{
    /// Load every item
    async fn fetch_items(&self) -> Result<Vec<T>>;

    /// Persist an item's new column
    async fn update_item_column(&self, item_id: &str, column: &K) -> Result<()>;

    /// Create an item; returns the stored item
    async fn create_item(&self, item: &T) -> Result<T> {
        let _ = item;
        Err(KanbanError::unsupported("create_item"))
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        let _ = item_id;
        Err(KanbanError::unsupported("delete_item"))
    }

    /// Replace an item's stored representation
    async fn update_item(&self, item: &T) -> Result<()> {
        let _ = item;
        Err(KanbanError::unsupported("update_item"))
    }

    /// Persist the order of one column's items
    async fn reorder_items(&self, column: &K, item_ids: &[String]) -> Result<()> {
        let _ = (column, item_ids);
        Err(KanbanError::unsupported("reorder_items"))
    }
}
