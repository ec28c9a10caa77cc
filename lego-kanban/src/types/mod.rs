//! Core types for the partitioned item store

mod column;
mod ids;
mod item;
pub(crate) mod state;

pub use column::{ColumnConfig, ColumnKey};
pub use ids::ColumnId;
pub use item::BoardItem;
pub use state::{BoardState, Columns};
