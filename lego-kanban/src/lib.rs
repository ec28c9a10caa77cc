//! Generic partitioned item store
//!
//! This crate provides the state container behind a kanban board: a set of
//! items partitioned into named columns, with moves between columns,
//! optimistic updates that roll back when persistence fails, and pluggable
//! persistence adapters.
//!
//! ## Overview
//!
//! - **Single source of truth** - every item lives in exactly one column
//! - **Synchronous mutations** - `move_item`, `add_item`, `remove_item`,
//!   `update_item` and `reorder_in_column` never suspend
//! - **Optimistic persistence** - `update_item_column` and friends call the
//!   adapter and undo the local change if the adapter fails
//! - **Silent fallback** - a failed fetch falls back to configured items and
//!   keeps the error field clear unless told otherwise
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use lego_kanban::{BoardItem, ColumnConfig, ColumnId, KanbanStore};
//!
//! #[derive(Debug, Clone)]
//! struct Card {
//!     id: String,
//!     status: String,
//! }
//!
//! impl BoardItem for Card {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//! }
//!
//! # fn example() -> lego_kanban::Result<()> {
//! let store = KanbanStore::builder(
//!     vec![
//!         ColumnConfig::new("todo", "To Do"),
//!         ColumnConfig::new("doing", "Doing"),
//!         ColumnConfig::new("done", "Done"),
//!     ],
//!     |card: &Card| ColumnId::from(card.status.as_str()),
//! )
//! .build()?;
//!
//! store.add_item(Card { id: "c1".into(), status: "todo".into() });
//! assert!(store.move_item("c1", &"todo".into(), &"doing".into(), None));
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! Two adapters ship with the crate:
//!
//! - [`RemoteAdapter`] talks to a REST collection (`GET`, `PATCH`, `POST`,
//!   `PUT`, `DELETE`).
//! - [`LocalAdapter`] keeps the whole board in one JSON blob inside a
//!   [`BlobStore`] ([`FileBlobStore`] or [`MemoryBlobStore`]).

pub mod adapter;
pub mod auto_color;
mod error;
pub mod selectors;
mod store;
pub mod types;

pub use adapter::{
    BlobStore, FileBlobStore, LocalAdapter, MemoryBlobStore, PersistenceAdapter, RemoteAdapter,
    RemoteAdapterConfig,
};
pub use error::{KanbanError, Result};
pub use store::{KanbanStore, KanbanStoreBuilder, StoreListener};
pub use types::{BoardItem, BoardState, ColumnConfig, ColumnId, ColumnKey, Columns};
