//! Синхронизация состояния таблицы с параметрами URL.
//!
//! Every table that syncs uses its own prefix `K`; its parameters are
//! `K_page`, `K_size`, `K_sort`, `K_filters`, `K_search` and `K_global`.
//! Structured slices travel as JSON. Two mounted tables sharing a prefix
//! would overwrite each other, so prefixes must be unique per screen.

use super::state::{ColumnFilter, ColumnSort, InitialTableState, PaginationState, TableUiState};
use crate::shared::url_params::UrlParamStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSlice {
    PageIndex,
    PageSize,
    Sorting,
    Filters,
    Search,
    GlobalSearch,
}

impl UrlSlice {
    pub const ALL: [UrlSlice; 6] = [
        UrlSlice::PageIndex,
        UrlSlice::PageSize,
        UrlSlice::Sorting,
        UrlSlice::Filters,
        UrlSlice::Search,
        UrlSlice::GlobalSearch,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            UrlSlice::PageIndex => "page",
            UrlSlice::PageSize => "size",
            UrlSlice::Sorting => "sort",
            UrlSlice::Filters => "filters",
            UrlSlice::Search => "search",
            UrlSlice::GlobalSearch => "global",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlKeys {
    prefix: String,
}

impl UrlKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, slice: UrlSlice) -> String {
        format!("{}_{}", self.prefix, slice.suffix())
    }

    pub fn slice_for(&self, key: &str) -> Option<UrlSlice> {
        UrlSlice::ALL
            .into_iter()
            .find(|slice| self.key(*slice) == key)
    }
}

/// URL value of one slice; `None` means the parameter is absent (default).
pub fn encode_slice(state: &TableUiState, slice: UrlSlice) -> Option<String> {
    match slice {
        UrlSlice::PageIndex => Some(state.pagination.page_index.to_string()),
        UrlSlice::PageSize => Some(state.pagination.page_size.to_string()),
        UrlSlice::Sorting if state.sorting.is_empty() => None,
        UrlSlice::Sorting => serde_json::to_string(&state.sorting).ok(),
        UrlSlice::Filters if state.column_filters.is_empty() => None,
        UrlSlice::Filters => serde_json::to_string(&state.column_filters).ok(),
        UrlSlice::Search if state.global_filter.is_empty() => None,
        UrlSlice::Search => Some(state.global_filter.clone()),
        UrlSlice::GlobalSearch if state.is_global_search_enabled => Some("true".to_string()),
        UrlSlice::GlobalSearch => None,
    }
}

pub fn decode_page_index(raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid page index '{}': {}", raw, e))
}

pub fn decode_page_size(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("page size must be positive".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(format!("invalid page size '{}': {}", raw, e)),
    }
}

pub fn decode_sorting(raw: &str) -> Result<Vec<ColumnSort>, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid sorting '{}': {}", raw, e))
}

pub fn decode_filters(raw: &str) -> Result<Vec<ColumnFilter>, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid filters '{}': {}", raw, e))
}

pub fn decode_global(raw: &str) -> Result<bool, String> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(format!("invalid global search flag '{}'", other)),
    }
}

/// URL value if present and valid, else `fallback`.
fn resolve<T>(
    store: &dyn UrlParamStore,
    key: Option<String>,
    decode: impl Fn(&str) -> Result<T, String>,
    fallback: impl FnOnce() -> T,
) -> T {
    let Some(key) = key else {
        return fallback();
    };
    match store.get_param(&key) {
        Some(raw) => match decode(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("server_table: ignoring URL parameter '{}': {}", key, e);
                fallback()
            }
        },
        None => fallback(),
    }
}

/// Per slice: URL parameter, then explicit override, then hard default.
pub fn resolve_initial_state(
    store: &dyn UrlParamStore,
    keys: Option<&UrlKeys>,
    initial: &InitialTableState,
    default_page_size: usize,
) -> TableUiState {
    let key = |slice: UrlSlice| keys.map(|k| k.key(slice));

    let page_index = resolve(store, key(UrlSlice::PageIndex), decode_page_index, || {
        initial.page_index.unwrap_or(0)
    });
    let page_size = resolve(store, key(UrlSlice::PageSize), decode_page_size, || {
        initial.page_size.filter(|s| *s > 0).unwrap_or(default_page_size)
    });
    let sorting = resolve(store, key(UrlSlice::Sorting), decode_sorting, || {
        initial.sorting.clone().unwrap_or_default()
    });
    let column_filters = resolve(store, key(UrlSlice::Filters), decode_filters, || {
        initial.column_filters.clone().unwrap_or_default()
    });
    let global_filter = resolve(store, key(UrlSlice::Search), |raw| Ok(raw.to_string()), || {
        initial.global_filter.clone().unwrap_or_default()
    });
    let is_global_search_enabled = resolve(store, key(UrlSlice::GlobalSearch), decode_global, || {
        initial.is_global_search_enabled.unwrap_or(false)
    });

    TableUiState {
        pagination: PaginationState {
            page_index,
            page_size,
        },
        sorting,
        column_filters,
        global_filter,
        is_global_search_enabled,
        column_visibility: initial.column_visibility.clone().unwrap_or_default(),
        row_selection: Default::default(),
    }
}

/// Applies an externally changed parameter. A missing or unparseable value
/// resets the slice to its default. Returns `true` if the state changed.
pub fn apply_inbound(
    state: &mut TableUiState,
    slice: UrlSlice,
    raw: Option<&str>,
    default_page_size: usize,
) -> bool {
    fn or_default<T>(raw: Option<&str>, decode: impl Fn(&str) -> Result<T, String>, default: T) -> T {
        match raw.map(decode) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                log::warn!("server_table: resetting slice after bad URL value: {}", e);
                default
            }
            None => default,
        }
    }

    let before = state.clone();
    match slice {
        UrlSlice::PageIndex => {
            state.pagination.page_index = or_default(raw, decode_page_index, 0);
        }
        UrlSlice::PageSize => {
            state.pagination.page_size = or_default(raw, decode_page_size, default_page_size);
        }
        UrlSlice::Sorting => {
            state.sorting = or_default(raw, decode_sorting, Vec::new());
        }
        UrlSlice::Filters => {
            state.column_filters = or_default(raw, decode_filters, Vec::new());
        }
        UrlSlice::Search => {
            state.global_filter = raw.unwrap_or_default().to_string();
        }
        UrlSlice::GlobalSearch => {
            state.is_global_search_enabled = or_default(raw, decode_global, false);
        }
    }
    *state != before
}

/// Writes every slice whose encoded value differs from the URL, as a
/// single URL change. Returns the number of parameters written.
pub fn write_state(store: &dyn UrlParamStore, keys: &UrlKeys, state: &TableUiState) -> usize {
    let updates: Vec<(String, Option<String>)> = UrlSlice::ALL
        .into_iter()
        .map(|slice| (keys.key(slice), encode_slice(state, slice)))
        .filter(|(key, value)| store.get_param(key) != *value)
        .collect();
    if !updates.is_empty() {
        store.update_params(&updates);
    }
    updates.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::url_params::MemoryUrlParams;
    use serde_json::json;

    fn sample_state() -> TableUiState {
        TableUiState {
            pagination: PaginationState {
                page_index: 3,
                page_size: 50,
            },
            sorting: vec![ColumnSort::desc("creation")],
            column_filters: vec![
                ColumnFilter::new("status", json!(["Pending", "Approved"])),
                ColumnFilter::new(
                    "creation",
                    json!({"operator": "Between", "value": ["2024-01-01", "2024-02-01"]}),
                ),
            ],
            global_filter: "steel pipe".to_string(),
            is_global_search_enabled: true,
            ..TableUiState::default()
        }
    }

    #[test]
    fn test_url_round_trip() {
        let store = MemoryUrlParams::new();
        let keys = UrlKeys::new("pr");
        let state = sample_state();

        assert_eq!(write_state(&store, &keys, &state), 6);
        let restored = resolve_initial_state(&store, Some(&keys), &InitialTableState::default(), 10);
        assert_eq!(restored, state);
    }

    #[test]
    fn test_write_skips_unchanged_values() {
        let store = MemoryUrlParams::new();
        let keys = UrlKeys::new("pr");
        let mut state = sample_state();
        write_state(&store, &keys, &state);
        let writes = store.write_count();

        assert_eq!(write_state(&store, &keys, &state), 0);
        assert_eq!(store.write_count(), writes);

        state.pagination.page_index = 4;
        assert_eq!(write_state(&store, &keys, &state), 1);
        assert_eq!(store.get_param("pr_page").as_deref(), Some("4"));
    }

    #[test]
    fn test_multi_slice_change_is_one_url_write() {
        let store = MemoryUrlParams::new();
        let keys = UrlKeys::new("pr");
        let mut state = sample_state();
        write_state(&store, &keys, &state);
        assert_eq!(store.write_count(), 1);

        state.pagination = PaginationState {
            page_index: 0,
            page_size: 25,
        };
        state.global_filter.clear();
        state.is_global_search_enabled = false;
        assert_eq!(write_state(&store, &keys, &state), 4);
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get_param("pr_size").as_deref(), Some("25"));
        assert_eq!(store.get_param("pr_global"), None);
    }

    #[test]
    fn test_defaults_remove_parameters() {
        let store = MemoryUrlParams::new();
        let keys = UrlKeys::new("po");
        write_state(&store, &keys, &sample_state());
        write_state(&store, &keys, &TableUiState::default());

        assert_eq!(store.get_param("po_sort"), None);
        assert_eq!(store.get_param("po_filters"), None);
        assert_eq!(store.get_param("po_search"), None);
        assert_eq!(store.get_param("po_global"), None);
        assert_eq!(store.get_param("po_page").as_deref(), Some("0"));
    }

    #[test]
    fn test_initial_resolution_order() {
        let store = MemoryUrlParams::with_params([("pr_size", "25"), ("pr_sort", "not json")]);
        let keys = UrlKeys::new("pr");
        let initial = InitialTableState {
            page_size: Some(100),
            sorting: Some(vec![ColumnSort::asc("name")]),
            global_filter: Some("cement".to_string()),
            ..InitialTableState::default()
        };

        let state = resolve_initial_state(&store, Some(&keys), &initial, 10);
        // URL wins over the override
        assert_eq!(state.pagination.page_size, 25);
        // unparseable URL value falls back to the override
        assert_eq!(state.sorting, vec![ColumnSort::asc("name")]);
        assert_eq!(state.global_filter, "cement");
        assert_eq!(state.pagination.page_index, 0);
        assert!(!state.is_global_search_enabled);
    }

    #[test]
    fn test_without_sync_key_url_is_ignored() {
        let store = MemoryUrlParams::with_params([("pr_page", "7")]);
        let state = resolve_initial_state(&store, None, &InitialTableState::default(), 10);
        assert_eq!(state.pagination, PaginationState::default());
    }

    #[test]
    fn test_bad_page_values_fall_back() {
        let store = MemoryUrlParams::with_params([("t_page", "-1"), ("t_size", "0")]);
        let state = resolve_initial_state(&store, Some(&UrlKeys::new("t")), &InitialTableState::default(), 20);
        assert_eq!(state.pagination.page_index, 0);
        assert_eq!(state.pagination.page_size, 20);
    }

    #[test]
    fn test_inbound_parse_failure_resets_slice() {
        let mut state = sample_state();
        assert!(apply_inbound(&mut state, UrlSlice::Filters, Some("[{broken"), 10));
        assert!(state.column_filters.is_empty());

        assert!(apply_inbound(&mut state, UrlSlice::PageSize, Some("abc"), 10));
        assert_eq!(state.pagination.page_size, 10);

        assert!(!apply_inbound(&mut state, UrlSlice::Filters, None, 10));
    }

    #[test]
    fn test_slice_for_key() {
        let keys = UrlKeys::new("vendors");
        assert_eq!(keys.slice_for("vendors_page"), Some(UrlSlice::PageIndex));
        assert_eq!(keys.slice_for("vendors_global"), Some(UrlSlice::GlobalSearch));
        assert_eq!(keys.slice_for("items_page"), None);
    }
}
