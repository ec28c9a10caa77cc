//! Observable board state

use super::column::{ColumnConfig, ColumnKey};
use indexmap::IndexMap;
use std::sync::Arc;

/// Ordered mapping from column id to the ordered items in that column.
pub type Columns<T, K = crate::ColumnId> = IndexMap<K, Vec<T>>;

/// Snapshot of everything a view needs to render a board.
///
/// Values handed out by the store are owned copies; mutating one has no
/// effect on the store.
#[derive(Debug, Clone)]
pub struct BoardState<T, K = crate::ColumnId>
where
    K: ColumnKey,
{
    /// Items per column, in column configuration order
    pub columns: Columns<T, K>,
    pub is_loading: bool,
    /// Last persistence or fetch error, if surfaced
    pub error: Option<String>,
    /// Item currently being dragged or selected
    pub active_item: Option<T>,
    pub column_configs: Arc<[ColumnConfig<K>]>,
}

impl<T, K> BoardState<T, K>
where
    K: ColumnKey,
{
    /// Empty board with one empty sequence per configured column
    pub(crate) fn empty(column_configs: Arc<[ColumnConfig<K>]>) -> Self {
        Self {
            columns: empty_columns(&column_configs),
            is_loading: false,
            error: None,
            active_item: None,
            column_configs,
        }
    }
}

/// One empty sequence per configured column, in configuration order
pub(crate) fn empty_columns<T, K: ColumnKey>(configs: &[ColumnConfig<K>]) -> Columns<T, K> {
    configs
        .iter()
        .map(|config| (config.id.clone(), Vec::new()))
        .collect()
}
