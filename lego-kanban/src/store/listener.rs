//! Callbacks fired by the store after a change has been applied

use crate::error::KanbanError;
use crate::types::{ColumnId, ColumnKey, Columns};

/// Observer of store changes.
///
/// Every method defaults to a no-op, so implementors override only what they
/// need. Callbacks run after the store's lock is released and may read the
/// store freely.
pub trait StoreListener<T, K = ColumnId>: Send + Sync
where
    K: ColumnKey,
{
    /// The columns changed; receives a snapshot
    fn on_items_changed(&self, columns: &Columns<T, K>) {
        let _ = columns;
    }

    /// An item moved between columns through `move_item`
    fn on_item_moved(&self, item: &T, from: &K, to: &K) {
        let _ = (item, from, to);
    }

    /// An error was written to the state's error field
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// A persisted action failed and its local change was undone
    fn on_rollback(&self, operation: &str, error: &KanbanError) {
        let _ = (operation, error);
    }
}
