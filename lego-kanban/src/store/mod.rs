//! KanbanStore - owner of the board state
//!
//! All synchronous actions take the internal lock, mutate, release, and only
//! then notify listeners. No action holds the lock across an `.await`, so
//! every synchronous action is atomic with respect to state reads.

mod builder;
mod listener;
mod optimistic;

pub use builder::KanbanStoreBuilder;
pub use listener::StoreListener;

use self::optimistic::Optimistic;
use crate::adapter::PersistenceAdapter;
use crate::types::state::empty_columns;
use crate::types::{BoardItem, BoardState, ColumnConfig, ColumnId, ColumnKey, Columns};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Extracts the column an item claims to belong to
pub(crate) type ColumnOf<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Lock-protected mutable part of the store
struct Inner<T, K: ColumnKey> {
    board: BoardState<T, K>,
    /// Bumped on every change to `board.columns`
    revision: u64,
    /// Origins of moves applied by `move_item` and not yet persisted, keyed
    /// by item id; at most one small entry per item on the board
    pending_moves: HashMap<String, Optimistic<T, K>>,
}

impl<T: BoardItem, K: ColumnKey> Inner<T, K> {
    /// Column index and position of an item
    fn locate(&self, item_id: &str) -> Option<(usize, usize)> {
        self.board
            .columns
            .values()
            .enumerate()
            .find_map(|(column_idx, items)| {
                items
                    .iter()
                    .position(|item| item.id() == item_id)
                    .map(|pos| (column_idx, pos))
            })
    }

    fn column_of_item(&self, item_id: &str) -> Option<K> {
        let (column_idx, _) = self.locate(item_id)?;
        self.board
            .columns
            .get_index(column_idx)
            .map(|(column, _)| column.clone())
    }

    fn contains(&self, item_id: &str) -> bool {
        self.locate(item_id).is_some()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Move an item between columns; returns the item and its original position
    fn move_item(
        &mut self,
        item_id: &str,
        from: &K,
        to: &K,
        index: Option<usize>,
    ) -> Option<(T, usize)> {
        let to_idx = self.board.columns.get_index_of(to)?;
        let from_idx = self.board.columns.get_index_of(from)?;
        let origin = self.board.columns[from_idx]
            .iter()
            .position(|item| item.id() == item_id)?;

        let item = self.board.columns[from_idx].remove(origin);
        let target = &mut self.board.columns[to_idx];
        match index {
            Some(index) if index <= target.len() => target.insert(index, item.clone()),
            _ => target.push(item.clone()),
        }
        self.touch();
        Some((item, origin))
    }

    /// Append an item to a column unless its id is already on the board
    fn insert(&mut self, item: T, column: &K) -> bool {
        if self.contains(item.id()) {
            return false;
        }
        let Some(items) = self.board.columns.get_mut(column) else {
            return false;
        };
        items.push(item);
        self.touch();
        true
    }

    /// Insert an item at a position, clamped to the column length
    fn insert_at(&mut self, item: T, column: &K, index: usize) {
        if let Some(items) = self.board.columns.get_mut(column) {
            let index = index.min(items.len());
            items.insert(index, item);
            self.touch();
        }
    }

    /// Take an item off the board; returns its column and position
    fn take(&mut self, item_id: &str) -> Option<(K, usize, T)> {
        let (column_idx, pos) = self.locate(item_id)?;
        let (column, items) = self.board.columns.get_index_mut(column_idx)?;
        let column = column.clone();
        let item = items.remove(pos);
        self.touch();
        Some((column, pos, item))
    }

    /// Remove an item for good, dropping any state that refers to it
    fn remove(&mut self, item_id: &str) -> Option<(K, usize, T)> {
        let removed = self.take(item_id)?;
        if self
            .board
            .active_item
            .as_ref()
            .is_some_and(|active| active.id() == item_id)
        {
            self.board.active_item = None;
        }
        self.pending_moves.remove(item_id);
        Some(removed)
    }

    /// Replace an item in place, keeping its position
    fn replace(&mut self, item_id: &str, replacement: T) -> Option<T> {
        let (column_idx, pos) = self.locate(item_id)?;
        let items = &mut self.board.columns[column_idx];
        let previous = std::mem::replace(&mut items[pos], replacement);
        self.touch();
        Some(previous)
    }

    /// Move an item within one column; returns the moved item's id
    fn reorder(&mut self, column: &K, from_index: usize, to_index: usize) -> Option<String> {
        let items = self.board.columns.get_mut(column)?;
        if from_index >= items.len() || to_index >= items.len() {
            return None;
        }
        let item = items.remove(from_index);
        let item_id = item.id().to_string();
        items.insert(to_index, item);
        self.touch();
        Some(item_id)
    }
}

/// Generic in-memory board: items partitioned into configured columns.
///
/// Share it behind an `Arc`; every action takes `&self`.
pub struct KanbanStore<T, K = ColumnId>
where
    T: BoardItem,
    K: ColumnKey,
{
    inner: Mutex<Inner<T, K>>,
    column_configs: Arc<[ColumnConfig<K>]>,
    column_of: ColumnOf<T, K>,
    default_column: K,
    adapter: Option<Arc<dyn PersistenceAdapter<T, K>>>,
    fallback_items: Vec<T>,
    surface_fallback_errors: bool,
    listeners: Vec<Arc<dyn StoreListener<T, K>>>,
}

impl<T, K> KanbanStore<T, K>
where
    T: BoardItem,
    K: ColumnKey,
{
    /// Start building a store from its columns and the column extractor
    pub fn builder<F>(
        columns: impl IntoIterator<Item = ColumnConfig<K>>,
        column_of: F,
    ) -> KanbanStoreBuilder<T, K>
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        KanbanStoreBuilder::new(columns.into_iter().collect(), Arc::new(column_of))
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Owned snapshot of the whole state
    pub fn state(&self) -> BoardState<T, K> {
        self.lock().board.clone()
    }

    /// Owned snapshot of all columns
    pub fn columns(&self) -> Columns<T, K> {
        self.lock().board.columns.clone()
    }

    /// Items of one column (empty for an unknown column)
    pub fn column_items(&self, column: &K) -> Vec<T> {
        self.lock()
            .board
            .columns
            .get(column)
            .cloned()
            .unwrap_or_default()
    }

    /// Column that currently holds the item
    pub fn item_column(&self, item_id: &str) -> Option<K> {
        self.lock().column_of_item(item_id)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().board.is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().board.error.clone()
    }

    pub fn active_item(&self) -> Option<T> {
        self.lock().board.active_item.clone()
    }

    pub fn column_configs(&self) -> Arc<[ColumnConfig<K>]> {
        Arc::clone(&self.column_configs)
    }

    /// Column used for items whose own column is not configured
    pub fn default_column(&self) -> &K {
        &self.default_column
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Replace the board with the adapter's items.
    ///
    /// On failure, or without an adapter, the board is rebuilt from the
    /// fallback items. The error field is only set when the store was built
    /// with `surface_fallback_errors(true)`.
    pub async fn fetch_items(&self) {
        {
            let mut inner = self.lock();
            inner.board.is_loading = true;
            inner.board.error = None;
        }

        let fetched = match &self.adapter {
            Some(adapter) => Some(adapter.fetch_items().await),
            None => None,
        };

        let surfaced = {
            let (columns, surfaced) = match fetched {
                Some(Ok(items)) => {
                    debug!(count = items.len(), "fetched board items");
                    (self.partition(items), None)
                }
                Some(Err(err)) => {
                    warn!(
                        error = %err,
                        fallback = self.fallback_items.len(),
                        "fetch failed; using fallback items"
                    );
                    let surfaced = self.surface_fallback_errors.then(|| err.to_string());
                    (self.partition(self.fallback_items.iter().cloned()), surfaced)
                }
                None => {
                    debug!("no persistence adapter; using fallback items");
                    (self.partition(self.fallback_items.iter().cloned()), None)
                }
            };

            let mut inner = self.lock();
            inner.board.columns = columns;
            inner.board.is_loading = false;
            inner.board.error = surfaced.clone();
            inner.pending_moves.clear();
            inner.touch();
            surfaced
        };

        if let Some(message) = surfaced {
            self.notify_error(&message);
        }
        self.notify_changed();
    }

    /// Split items into columns, keeping the first of any duplicated id
    fn partition(&self, items: impl IntoIterator<Item = T>) -> Columns<T, K> {
        let mut columns = empty_columns(&self.column_configs);
        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.id().to_string()) {
                warn!(item_id = item.id(), "duplicate item id; keeping first occurrence");
                continue;
            }
            let column = self.column_for(&item, &columns);
            if let Some(items) = columns.get_mut(&column) {
                items.push(item);
            }
        }
        columns
    }

    /// Column an item belongs in, falling back to the default column
    fn column_for(&self, item: &T, columns: &Columns<T, K>) -> K {
        let column = (self.column_of)(item);
        if columns.contains_key(&column) {
            column
        } else {
            debug!(
                item_id = item.id(),
                column = ?column,
                default = ?self.default_column,
                "item names an unknown column; using default"
            );
            self.default_column.clone()
        }
    }

    // =========================================================================
    // Synchronous actions
    // =========================================================================

    /// Move an item from one column to another.
    ///
    /// Inserts at `index` when it is within `0..=len`, otherwise appends.
    /// Returns `false` and leaves the board untouched when the item is not in
    /// `from` or either column is unknown. Never touches the adapter.
    pub fn move_item(&self, item_id: &str, from: &K, to: &K, index: Option<usize>) -> bool {
        let moved = {
            let mut inner = self.lock();
            let revision_before = inner.revision;

            let Some((item, origin)) = inner.move_item(item_id, from, to, index) else {
                debug!(item_id, from = ?from, to = ?to, "move ignored: item not in source column");
                return false;
            };

            if self.adapter.is_some() {
                let revision = inner.revision;
                match inner.pending_moves.get_mut(item_id) {
                    Some(pending) if pending.continues_at(revision_before) => {
                        pending.advance(revision)
                    }
                    // first move, or the board changed since the last one
                    _ => {
                        let pending = Optimistic::moved(revision, item_id, from.clone(), origin);
                        inner.pending_moves.insert(item_id.to_string(), pending);
                    }
                }
            }
            item
        };

        for listener in &self.listeners {
            listener.on_item_moved(&moved, from, to);
        }
        self.notify_changed();
        true
    }

    /// Set or clear the item being dragged or selected
    pub fn set_active_item(&self, item: Option<T>) {
        self.lock().board.active_item = item;
    }

    /// Add an item to the column it names (or the default column).
    ///
    /// Returns `false` when an item with the same id is already on the board.
    pub fn add_item(&self, item: T) -> bool {
        let added = {
            let mut inner = self.lock();
            let column = self.column_for(&item, &inner.board.columns);
            let item_id = item.id().to_string();
            let added = inner.insert(item, &column);
            if !added {
                warn!(item_id = %item_id, "add ignored: id already on the board");
            }
            added
        };
        if added {
            self.notify_changed();
        }
        added
    }

    /// Remove an item from whichever column holds it
    pub fn remove_item(&self, item_id: &str) -> Option<T> {
        let removed = self.lock().remove(item_id).map(|(_, _, item)| item);
        match removed {
            Some(item) => {
                self.notify_changed();
                Some(item)
            }
            None => {
                debug!(item_id, "remove ignored: item not found");
                None
            }
        }
    }

    /// Edit an item in place.
    ///
    /// The edit may not change the item's id; such edits are discarded and
    /// `false` is returned. The item stays in its current column.
    pub fn update_item(&self, item_id: &str, update: impl FnOnce(&mut T)) -> bool {
        let updated = {
            let mut inner = self.lock();
            match Self::edited(&inner, item_id, update) {
                Some(edited) => inner.replace(item_id, edited).is_some(),
                None => false,
            }
        };
        if updated {
            self.notify_changed();
        }
        updated
    }

    /// Apply an edit to a copy of the item, rejecting id changes
    fn edited(inner: &Inner<T, K>, item_id: &str, update: impl FnOnce(&mut T)) -> Option<T> {
        let (column_idx, pos) = inner.locate(item_id)?;
        let mut edited = inner.board.columns[column_idx][pos].clone();
        update(&mut edited);
        if edited.id() != item_id {
            warn!(item_id, new_id = edited.id(), "update ignored: item ids are immutable");
            return None;
        }
        Some(edited)
    }

    /// Move an item within one column.
    ///
    /// Returns `false` without changes when either index is out of bounds.
    pub fn reorder_in_column(&self, column: &K, from_index: usize, to_index: usize) -> bool {
        let reordered = self.lock().reorder(column, from_index, to_index).is_some();
        if reordered {
            self.notify_changed();
        } else {
            debug!(column = ?column, from_index, to_index, "reorder ignored: index out of bounds");
        }
        reordered
    }

    pub fn clear_error(&self) {
        self.lock().board.error = None;
    }

    /// Return to the freshly constructed state: every column empty
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.board = BoardState::empty(Arc::clone(&self.column_configs));
            inner.pending_moves.clear();
            inner.touch();
        }
        self.notify_changed();
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    fn notify_changed(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let columns = self.columns();
        for listener in &self.listeners {
            listener.on_items_changed(&columns);
        }
    }

    fn notify_error(&self, message: &str) {
        for listener in &self.listeners {
            listener.on_error(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Card {
        id: String,
        status: String,
    }

    impl Card {
        fn new(id: &str, status: &str) -> Self {
            Self {
                id: id.into(),
                status: status.into(),
            }
        }
    }

    impl BoardItem for Card {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn store() -> KanbanStore<Card> {
        KanbanStore::builder(
            vec![
                ColumnConfig::new("todo", "To Do"),
                ColumnConfig::new("doing", "Doing"),
                ColumnConfig::new("done", "Done"),
            ],
            |card: &Card| ColumnId::from(card.status.as_str()),
        )
        .build()
        .unwrap()
    }

    fn ids(store: &KanbanStore<Card>, column: &str) -> Vec<String> {
        store
            .column_items(&ColumnId::from(column))
            .into_iter()
            .map(|card| card.id)
            .collect()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = store();
        let state = store.state();
        assert_eq!(state.columns.len(), 3);
        assert!(state.columns.values().all(Vec::is_empty));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_add_item_uses_extracted_column() {
        let store = store();
        assert!(store.add_item(Card::new("t1", "doing")));
        assert_eq!(ids(&store, "doing"), vec!["t1"]);
    }

    #[test]
    fn test_add_item_unknown_column_uses_default() {
        let store = store();
        assert!(store.add_item(Card::new("t1", "archived")));
        assert_eq!(ids(&store, "todo"), vec!["t1"]);
    }

    #[test]
    fn test_add_item_rejects_duplicate_id() {
        let store = store();
        assert!(store.add_item(Card::new("t1", "todo")));
        assert!(!store.add_item(Card::new("t1", "done")));
        assert_eq!(ids(&store, "todo"), vec!["t1"]);
        assert!(ids(&store, "done").is_empty());
    }

    #[test]
    fn test_move_item_with_index() {
        let store = store();
        store.add_item(Card::new("a", "doing"));
        store.add_item(Card::new("b", "doing"));
        store.add_item(Card::new("t1", "todo"));

        assert!(store.move_item("t1", &"todo".into(), &"doing".into(), Some(1)));
        assert_eq!(ids(&store, "doing"), vec!["a", "t1", "b"]);
    }

    #[test]
    fn test_move_item_out_of_range_index_appends() {
        let store = store();
        store.add_item(Card::new("a", "doing"));
        store.add_item(Card::new("t1", "todo"));

        assert!(store.move_item("t1", &"todo".into(), &"doing".into(), Some(10)));
        assert_eq!(ids(&store, "doing"), vec!["a", "t1"]);
    }

    #[test]
    fn test_move_item_wrong_source_is_noop() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));
        let before = store.columns();

        assert!(!store.move_item("t1", &"doing".into(), &"done".into(), None));
        assert_eq!(store.columns(), before);
    }

    #[test]
    fn test_move_item_unknown_target_is_noop() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));

        assert!(!store.move_item("t1", &"todo".into(), &"archive".into(), None));
        assert_eq!(ids(&store, "todo"), vec!["t1"]);
    }

    #[test]
    fn test_remove_item_clears_active() {
        let store = store();
        let card = Card::new("t1", "todo");
        store.add_item(card.clone());
        store.set_active_item(Some(card.clone()));

        assert_eq!(store.remove_item("t1"), Some(card));
        assert!(store.active_item().is_none());
        assert!(store.remove_item("t1").is_none());
    }

    #[test]
    fn test_update_item_in_place() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));
        store.add_item(Card::new("t2", "todo"));

        assert!(store.update_item("t1", |card| card.status = "reviewed".into()));
        let todo = store.column_items(&"todo".into());
        assert_eq!(todo[0].status, "reviewed");
        assert_eq!(todo[1].id, "t2");
    }

    #[test]
    fn test_update_item_cannot_change_id() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));

        assert!(!store.update_item("t1", |card| card.id = "t9".into()));
        assert_eq!(ids(&store, "todo"), vec!["t1"]);
        assert!(!store.update_item("missing", |_| {}));
    }

    #[test]
    fn test_reorder_in_column_bounds() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.add_item(Card::new(id, "todo"));
        }

        assert!(store.reorder_in_column(&"todo".into(), 0, 2));
        assert_eq!(ids(&store, "todo"), vec!["b", "c", "a"]);

        assert!(!store.reorder_in_column(&"todo".into(), 0, 3));
        assert!(!store.reorder_in_column(&"todo".into(), 5, 0));
        assert!(!store.reorder_in_column(&"archive".into(), 0, 0));
        assert_eq!(ids(&store, "todo"), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_reset_empties_board() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));
        store.set_active_item(Some(Card::new("t1", "todo")));

        store.reset();

        let state = store.state();
        assert!(state.columns.values().all(Vec::is_empty));
        assert_eq!(state.columns.len(), 3);
        assert!(state.active_item.is_none());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = store();
        store.add_item(Card::new("t1", "todo"));

        let mut snapshot = store.state();
        snapshot.columns.clear();

        assert_eq!(ids(&store, "todo"), vec!["t1"]);
    }

    #[test]
    fn test_item_column_lookup() {
        let store = store();
        store.add_item(Card::new("t1", "done"));
        assert_eq!(store.item_column("t1"), Some(ColumnId::from("done")));
        assert_eq!(store.item_column("nope"), None);
    }
}
