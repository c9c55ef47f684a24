use crate::record::RowShape;
use crate::statement::MergeSet;
use serde::Deserialize;

/// Configuration for a [`Session`](crate::Session).
///
/// Deserializable so applications can embed it in their own config files:
///
/// ```toml
/// [database.session]
/// row_shape = "positional"
/// merge_set = "excluded"
/// autocommit = false
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How rows are decoded.
    pub row_shape: RowShape,
    /// How merges render their `DO UPDATE SET` clause.
    pub merge_set: MergeSet,
    /// Run each statement on its own instead of opening a transaction block lazily.
    pub autocommit: bool,
}

impl SessionConfig {
    /// Create a new configuration with defaults (named rows, escaped merge literals,
    /// explicit transactions).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row shape.
    pub fn row_shape(mut self, shape: RowShape) -> Self {
        self.row_shape = shape;
        self
    }

    /// Set the merge SET rendering mode.
    pub fn merge_set(mut self, mode: MergeSet) -> Self {
        self.merge_set = mode;
        self
    }

    /// Enable or disable autocommit.
    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }
}
