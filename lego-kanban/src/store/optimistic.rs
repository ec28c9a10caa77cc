//! Persisted actions: apply locally, call the adapter, roll back on failure
//!
//! Every persisted action captures the board before its own local change.
//! When the adapter fails and nothing else touched the board in between, the
//! capture is restored verbatim. Otherwise only this action's change is
//! undone, so an out-of-order failure never reverts a later edit.
//!
//! Moves are the exception: `move_item` can run many times before anything
//! is persisted, so a pending move keeps only its origin. Undoing a move
//! with nothing else in between gives back the same board a capture would.

use super::{Inner, KanbanStore};
use crate::error::KanbanError;
use crate::types::{BoardItem, ColumnKey, Columns};
use tracing::{debug, warn};

/// A local change that is waiting on the adapter
pub(super) struct Optimistic<T, K: ColumnKey> {
    /// Columns before the change; dropped once another edit lands in between
    snapshot: Option<Columns<T, K>>,
    /// Revision right after the change
    revision: u64,
    undo: Undo<T, K>,
}

/// Inverse of one local change
enum Undo<T, K> {
    Move {
        item_id: String,
        column: K,
        index: usize,
    },
    Create {
        item_id: String,
    },
    Delete {
        item: T,
        column: K,
        index: usize,
    },
    Update {
        previous: T,
    },
    Reorder {
        column: K,
        item_id: String,
        index: usize,
    },
    Nothing,
}

impl<T: BoardItem, K: ColumnKey> Optimistic<T, K> {
    /// A move awaiting persistence; remembers only where the item came from
    pub(super) fn moved(revision: u64, item_id: &str, column: K, index: usize) -> Self {
        Self {
            snapshot: None,
            revision,
            undo: Undo::Move {
                item_id: item_id.to_string(),
                column,
                index,
            },
        }
    }

    /// True when a move starting at `revision_before` directly follows this
    /// one, with no other change to the board in between
    pub(super) fn continues_at(&self, revision_before: u64) -> bool {
        self.revision == revision_before
    }

    /// Fold a directly following move of the same item into this one,
    /// keeping the earliest origin
    pub(super) fn advance(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Nothing changed locally; a failure restores the board as it is now
    fn settled(inner: &Inner<T, K>) -> Self {
        Self {
            snapshot: Some(inner.board.columns.clone()),
            revision: inner.revision,
            undo: Undo::Nothing,
        }
    }

    fn new(snapshot: Option<Columns<T, K>>, inner: &Inner<T, K>, undo: Undo<T, K>) -> Self {
        Self {
            snapshot,
            revision: inner.revision,
            undo,
        }
    }
}

impl<T: BoardItem, K: ColumnKey> Undo<T, K> {
    fn apply(self, inner: &mut Inner<T, K>) {
        match self {
            Undo::Move {
                item_id,
                column,
                index,
            } => {
                // a newer unpersisted move of this item owns its position now
                if inner.pending_moves.contains_key(&item_id) {
                    return;
                }
                if let Some((_, _, item)) = inner.take(&item_id) {
                    inner.insert_at(item, &column, index);
                }
            }
            Undo::Create { item_id } => {
                inner.remove(&item_id);
            }
            Undo::Delete {
                item,
                column,
                index,
            } => {
                if !inner.contains(item.id()) {
                    inner.insert_at(item, &column, index);
                }
            }
            Undo::Update { previous } => {
                let item_id = previous.id().to_string();
                inner.replace(&item_id, previous);
            }
            Undo::Reorder {
                column,
                item_id,
                index,
            } => {
                if let Some(items) = inner.board.columns.get_mut(&column) {
                    if let Some(pos) = items.iter().position(|item| item.id() == item_id) {
                        let item = items.remove(pos);
                        let index = index.min(items.len());
                        items.insert(index, item);
                    }
                }
            }
            Undo::Nothing => {}
        }
    }
}

impl<T: BoardItem, K: ColumnKey> Inner<T, K> {
    fn roll_back(&mut self, optimistic: Optimistic<T, K>) {
        match optimistic.snapshot {
            Some(snapshot) if optimistic.revision == self.revision => {
                self.board.columns = snapshot;
            }
            _ => optimistic.undo.apply(self),
        }
        self.touch();
    }
}

impl<T, K> KanbanStore<T, K>
where
    T: BoardItem,
    K: ColumnKey,
{
    /// Persist an item's column through the adapter.
    ///
    /// Normally called after [`move_item`](Self::move_item). If the item is
    /// not yet in `column` the local move is applied first. When the adapter
    /// fails, the move is rolled back, the error field is set and listeners
    /// get `on_rollback`. Returns whether the change stands.
    pub async fn update_item_column(&self, item_id: &str, column: &K) -> bool {
        let Some(adapter) = self.adapter.clone() else {
            self.lock().pending_moves.remove(item_id);
            debug!(item_id, "no persistence adapter; local move stands");
            return true;
        };

        if let Some(from) = self.item_column(item_id) {
            if &from != column && !self.move_item(item_id, &from, column, None) {
                warn!(item_id, column = ?column, "cannot persist move to unknown column");
                return false;
            }
        }

        let optimistic = {
            let mut inner = self.lock();
            match inner.pending_moves.remove(item_id) {
                Some(pending) => pending,
                None => Optimistic::settled(&inner),
            }
        };

        match adapter.update_item_column(item_id, column).await {
            Ok(()) => {
                debug!(item_id, column = ?column, "column change persisted");
                true
            }
            Err(err) => {
                self.roll_back("update_item_column", optimistic, err);
                false
            }
        }
    }

    /// Add an item locally and create it through the adapter.
    ///
    /// The adapter's returned item replaces the local one, which picks up
    /// server-assigned fields. Returns whether the item stands.
    pub async fn create_item(&self, item: T) -> bool {
        let item_id = item.id().to_string();
        let optimistic = {
            let mut inner = self.lock();
            let snapshot = self.adapter.is_some().then(|| inner.board.columns.clone());
            let column = self.column_for(&item, &inner.board.columns);
            if !inner.insert(item.clone(), &column) {
                warn!(item_id = %item_id, "create ignored: id already on the board");
                return false;
            }
            let undo = Undo::Create {
                item_id: item_id.clone(),
            };
            Optimistic::new(snapshot, &inner, undo)
        };
        self.notify_changed();

        let Some(adapter) = self.adapter.clone() else {
            return true;
        };
        match adapter.create_item(&item).await {
            Ok(created) => {
                self.accept_created(&item_id, created);
                true
            }
            Err(err) => {
                self.roll_back("create_item", optimistic, err);
                false
            }
        }
    }

    fn accept_created(&self, item_id: &str, created: T) {
        let replaced = {
            let mut inner = self.lock();
            if created.id() != item_id && inner.contains(created.id()) {
                warn!(
                    item_id,
                    created_id = created.id(),
                    "created item collides with an existing id; keeping local copy"
                );
                false
            } else {
                inner.replace(item_id, created).is_some()
            }
        };
        if replaced {
            self.notify_changed();
        }
    }

    /// Remove an item locally and delete it through the adapter.
    ///
    /// Returns `false` when the item is unknown or the adapter failed, in
    /// which case the item is put back where it was.
    pub async fn delete_item(&self, item_id: &str) -> bool {
        let optimistic = {
            let mut inner = self.lock();
            let snapshot = self.adapter.is_some().then(|| inner.board.columns.clone());
            let Some((column, index, item)) = inner.remove(item_id) else {
                debug!(item_id, "delete ignored: item not found");
                return false;
            };
            let undo = Undo::Delete {
                item,
                column,
                index,
            };
            Optimistic::new(snapshot, &inner, undo)
        };
        self.notify_changed();

        let Some(adapter) = self.adapter.clone() else {
            return true;
        };
        match adapter.delete_item(item_id).await {
            Ok(()) => true,
            Err(err) => {
                self.roll_back("delete_item", optimistic, err);
                false
            }
        }
    }

    /// Edit an item locally and persist the edited item through the adapter
    pub async fn update_and_persist_item(&self, item_id: &str, update: impl FnOnce(&mut T)) -> bool {
        let (optimistic, updated) = {
            let mut inner = self.lock();
            let Some(edited) = Self::edited(&inner, item_id, update) else {
                return false;
            };
            let snapshot = self.adapter.is_some().then(|| inner.board.columns.clone());
            let Some(previous) = inner.replace(item_id, edited.clone()) else {
                return false;
            };
            (
                Optimistic::new(snapshot, &inner, Undo::Update { previous }),
                edited,
            )
        };
        self.notify_changed();

        let Some(adapter) = self.adapter.clone() else {
            return true;
        };
        match adapter.update_item(&updated).await {
            Ok(()) => true,
            Err(err) => {
                self.roll_back("update_item", optimistic, err);
                false
            }
        }
    }

    /// Reorder within a column and persist the column's new order
    pub async fn reorder_and_persist(&self, column: &K, from_index: usize, to_index: usize) -> bool {
        let (optimistic, order) = {
            let mut inner = self.lock();
            let snapshot = self.adapter.is_some().then(|| inner.board.columns.clone());
            let Some(item_id) = inner.reorder(column, from_index, to_index) else {
                debug!(column = ?column, from_index, to_index, "reorder ignored: index out of bounds");
                return false;
            };
            let order: Vec<String> = inner
                .board
                .columns
                .get(column)
                .map(|items| items.iter().map(|item| item.id().to_string()).collect())
                .unwrap_or_default();
            let undo = Undo::Reorder {
                column: column.clone(),
                item_id,
                index: from_index,
            };
            (Optimistic::new(snapshot, &inner, undo), order)
        };
        self.notify_changed();

        let Some(adapter) = self.adapter.clone() else {
            return true;
        };
        match adapter.reorder_items(column, &order).await {
            Ok(()) => true,
            Err(err) => {
                self.roll_back("reorder_items", optimistic, err);
                false
            }
        }
    }

    fn roll_back(&self, operation: &'static str, optimistic: Optimistic<T, K>, err: KanbanError) {
        let message = err.to_string();
        warn!(operation, error = %message, "persistence failed; rolling back");
        {
            let mut inner = self.lock();
            inner.roll_back(optimistic);
            inner.board.error = Some(message.clone());
        }
        for listener in &self.listeners {
            listener.on_rollback(operation, &err);
        }
        self.notify_error(&message);
        self.notify_changed();
    }
}
