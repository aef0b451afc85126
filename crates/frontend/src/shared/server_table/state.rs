use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One sorted column, `{"id":"creation","desc":true}` in the URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSort {
    pub id: String,
    pub desc: bool,
}

impl ColumnSort {
    pub fn asc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: false,
        }
    }

    pub fn desc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: true,
        }
    }
}

/// Column filter as the UI produces it: a scalar, an array of facet values,
/// or `{"operator": "...", "value": ...}` from date pickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub id: String,
    pub value: Value,
}

impl ColumnFilter {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// Interactive state of one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableUiState {
    pub pagination: PaginationState,
    pub sorting: Vec<ColumnSort>,
    pub column_filters: Vec<ColumnFilter>,
    /// Per-keystroke search text, not yet debounced
    pub global_filter: String,
    pub is_global_search_enabled: bool,
    pub column_visibility: BTreeMap<String, bool>,
    pub row_selection: BTreeMap<String, bool>,
}

/// Optional per-slice overrides used when the URL has nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialTableState {
    pub page_index: Option<usize>,
    pub page_size: Option<usize>,
    pub sorting: Option<Vec<ColumnSort>>,
    pub column_filters: Option<Vec<ColumnFilter>>,
    pub global_filter: Option<String>,
    pub is_global_search_enabled: Option<bool>,
    pub column_visibility: Option<BTreeMap<String, bool>>,
}
