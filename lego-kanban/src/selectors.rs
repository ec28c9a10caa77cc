//! Pure read helpers over a [`BoardState`] snapshot
//!
//! Lookups are linear scans; boards hold UI-scale item counts.

use crate::types::{BoardItem, BoardState, ColumnKey};
use indexmap::IndexMap;
use serde::Serialize;

/// Items of one column, empty for an unknown column
pub fn column_items<'a, T, K: ColumnKey>(state: &'a BoardState<T, K>, column: &K) -> &'a [T] {
    state.columns.get(column).map(Vec::as_slice).unwrap_or(&[])
}

pub fn total_item_count<T, K: ColumnKey>(state: &BoardState<T, K>) -> usize {
    state.columns.values().map(Vec::len).sum()
}

/// Item count per column, in column order
pub fn column_counts<T, K: ColumnKey>(state: &BoardState<T, K>) -> IndexMap<K, usize> {
    state
        .columns
        .iter()
        .map(|(column, items)| (column.clone(), items.len()))
        .collect()
}

/// Find an item by id along with the column holding it
pub fn find_item<'a, T: BoardItem, K: ColumnKey>(
    state: &'a BoardState<T, K>,
    item_id: &str,
) -> Option<(&'a K, &'a T)> {
    state.columns.iter().find_map(|(column, items)| {
        items
            .iter()
            .find(|item| item.id() == item_id)
            .map(|item| (column, item))
    })
}

/// Work-in-progress usage of a column with a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WipStatus {
    pub count: usize,
    pub limit: usize,
    pub over_limit: bool,
}

/// WIP usage of a column; `None` when the column is unknown or has no limit
pub fn wip_status<T, K: ColumnKey>(state: &BoardState<T, K>, column: &K) -> Option<WipStatus> {
    let limit = state
        .column_configs
        .iter()
        .find(|config| &config.id == column)?
        .wip_limit?;
    let count = state.columns.get(column).map_or(0, Vec::len);
    Some(WipStatus {
        count,
        limit,
        over_limit: count > limit,
    })
}

/// Columns holding more items than their WIP limit
pub fn columns_over_limit<T, K: ColumnKey>(state: &BoardState<T, K>) -> Vec<K> {
    state
        .column_configs
        .iter()
        .filter(|config| {
            wip_status(state, &config.id).is_some_and(|status| status.over_limit)
        })
        .map(|config| config.id.clone())
        .collect()
}
