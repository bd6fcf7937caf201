//! SheetTableRegistryEntry — a known spreadsheet table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Describes one sheet table the synchronizer is allowed to write to:
/// its identifiers, the internal→external field name map, and (for labels)
/// the convention for propagating forge labels into sheet columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetTableRegistryEntry {
    pub app_token: String,
    pub table_id: String,
    pub display_name: String,
    /// Internal field name (e.g. `"title"`) -> external column name.
    pub field_name_map: BTreeMap<String, String>,
    /// Label -> column name, for tables that propagate forge labels into
    /// sheet columns. Empty by default (no propagation), per spec.
    pub label_column_map: BTreeMap<String, String>,
    pub is_default: bool,
}

impl SheetTableRegistryEntry {
    pub fn column_for(&self, internal_field: &str) -> Option<&str> {
        self.field_name_map.get(internal_field).map(String::as_str)
    }
}
