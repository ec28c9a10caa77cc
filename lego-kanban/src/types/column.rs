//! Column (partition) configuration

use crate::auto_color::auto_color;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Types usable as a column identifier.
///
/// Implemented for every type with the listed capabilities; [`ColumnId`]
/// is the default, but a caller-defined enum works just as well.
///
/// [`ColumnId`]: crate::ColumnId
pub trait ColumnKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> ColumnKey for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Immutable description of one column. Supplied once when the store is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig<K = crate::ColumnId> {
    pub id: K,
    pub title: String,
    /// 6-character hex color code without #
    pub color: String,
    /// Advisory work-in-progress limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl<K> ColumnConfig<K> {
    /// Create a column with a color derived from its title
    pub fn new(id: impl Into<K>, title: impl Into<String>) -> Self {
        let title = title.into();
        let color = auto_color(&title).to_string();
        Self {
            id: id.into(),
            title,
            color,
            wip_limit: None,
            description: None,
        }
    }

    /// Override the derived color
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Set a work-in-progress limit
    pub fn with_wip_limit(mut self, limit: usize) -> Self {
        self.wip_limit = Some(limit);
        self
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
