//! Builder for KanbanStore

use super::{ColumnOf, Inner, KanbanStore, StoreListener};
use crate::adapter::PersistenceAdapter;
use crate::error::{KanbanError, Result};
use crate::types::{BoardItem, BoardState, ColumnConfig, ColumnId, ColumnKey};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Configures a [`KanbanStore`] before construction
pub struct KanbanStoreBuilder<T, K = ColumnId>
where
    T: BoardItem,
    K: ColumnKey,
{
    columns: Vec<ColumnConfig<K>>,
    column_of: ColumnOf<T, K>,
    default_column: Option<K>,
    adapter: Option<Arc<dyn PersistenceAdapter<T, K>>>,
    fallback_items: Vec<T>,
    surface_fallback_errors: bool,
    listeners: Vec<Arc<dyn StoreListener<T, K>>>,
}

impl<T, K> KanbanStoreBuilder<T, K>
where
    T: BoardItem,
    K: ColumnKey,
{
    pub(super) fn new(columns: Vec<ColumnConfig<K>>, column_of: ColumnOf<T, K>) -> Self {
        Self {
            columns,
            column_of,
            default_column: None,
            adapter: None,
            fallback_items: Vec::new(),
            surface_fallback_errors: false,
            listeners: Vec::new(),
        }
    }

    /// Column for items whose own column is not configured (default: the first)
    pub fn default_column(mut self, column: impl Into<K>) -> Self {
        self.default_column = Some(column.into());
        self
    }

    /// Persist through this adapter
    pub fn adapter<A>(self, adapter: A) -> Self
    where
        A: PersistenceAdapter<T, K> + 'static,
    {
        self.shared_adapter(Arc::new(adapter))
    }

    /// Persist through an adapter that is shared with other owners
    pub fn shared_adapter(mut self, adapter: Arc<dyn PersistenceAdapter<T, K>>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Items shown when fetching fails or no adapter is configured
    pub fn fallback_items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.fallback_items = items.into_iter().collect();
        self
    }

    /// Write fetch failures to the error field even when falling back
    pub fn surface_fallback_errors(mut self, surface: bool) -> Self {
        self.surface_fallback_errors = surface;
        self
    }

    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: StoreListener<T, K> + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn shared_listener(mut self, listener: Arc<dyn StoreListener<T, K>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the columns and build the store
    pub fn build(self) -> Result<KanbanStore<T, K>> {
        let first = self.columns.first().ok_or(KanbanError::NoColumns)?.id.clone();

        let mut seen = HashSet::new();
        for config in &self.columns {
            if !seen.insert(&config.id) {
                return Err(KanbanError::DuplicateColumn {
                    id: format!("{:?}", config.id),
                });
            }
        }

        let default_column = match self.default_column {
            Some(column) if seen.contains(&column) => column,
            Some(column) => return Err(KanbanError::unknown_column(&column)),
            None => first,
        };

        let column_configs: Arc<[ColumnConfig<K>]> = self.columns.into();
        tracing::debug!(
            columns = column_configs.len(),
            default = ?default_column,
            adapter = self.adapter.is_some(),
            "built kanban store"
        );

        Ok(KanbanStore {
            inner: Mutex::new(Inner {
                board: BoardState::empty(Arc::clone(&column_configs)),
                revision: 0,
                pending_moves: HashMap::new(),
            }),
            column_configs,
            column_of: self.column_of,
            default_column,
            adapter: self.adapter,
            fallback_items: self.fallback_items,
            surface_fallback_errors: self.surface_fallback_errors,
            listeners: self.listeners,
        })
    }
}
