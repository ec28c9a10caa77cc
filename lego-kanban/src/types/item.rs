//! The item capability required by the store

/// An item that can live on a board.
///
/// The only requirement is a stable, unique string id. The store clones items
/// when it hands out snapshots, so `Clone` should be reasonably cheap.
pub trait BoardItem: Clone + Send + Sync + 'static {
    /// Unique identifier of this item
    fn id(&self) -> &str;
}
