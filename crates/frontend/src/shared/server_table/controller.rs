//! Состояние серверной таблицы: страница, сортировка, фильтры, поиск.
//!
//! [`ServerTableController`] is the source of truth for one table. It
//! derives a [`QueryDescriptor`] from its state, hands out fetch requests
//! when that descriptor changes and accepts only the response to the most
//! recently issued request. Time enters only through explicit `now_ms`
//! arguments, so the Leptos hook and the tests drive it the same way.

use std::collections::BTreeMap;

use contracts::shared::list_query::{PageSpec, QueryDescriptor, SearchSpec};
use serde_json::Value;

use super::fetcher::{FetchError, FetchOutcome, PendingFetch};
use super::filters::{translate_filters, translate_sorting};
use super::state::{
    ColumnFilter, ColumnSort, InitialTableState, PaginationState, TableUiState, DEFAULT_PAGE_SIZE,
};
use super::url_sync::{apply_inbound, resolve_initial_state, write_state, UrlKeys, UrlSlice};
use crate::shared::debounce::Debouncer;
use crate::shared::url_params::UrlParamStore;

pub const DEFAULT_SEARCH_DEBOUNCE_MS: u32 = 500;

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub doctype: String,
    pub fields: Vec<String>,
    /// `order_by` used while no column is sorted, e.g. `"creation desc"`
    pub default_sort: String,
    pub default_search_field: String,
    /// Prefix of the URL parameters; `None` disables URL sync
    pub url_sync_key: Option<String>,
    pub initial: InitialTableState,
    pub search_debounce_ms: u32,
    pub default_page_size: usize,
}

impl TableOptions {
    pub fn new(doctype: impl Into<String>) -> Self {
        Self {
            doctype: doctype.into(),
            fields: vec!["name".to_string()],
            default_sort: "creation desc".to_string(),
            default_search_field: "name".to_string(),
            url_sync_key: None,
            initial: InitialTableState::default(),
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_sort(mut self, order_by: impl Into<String>) -> Self {
        self.default_sort = order_by.into();
        self
    }

    pub fn search_field(mut self, field: impl Into<String>) -> Self {
        self.default_search_field = field.into();
        self
    }

    pub fn url_sync_key(mut self, key: impl Into<String>) -> Self {
        self.url_sync_key = Some(key.into());
        self
    }

    pub fn initial(mut self, initial: InitialTableState) -> Self {
        self.initial = initial;
        self
    }

    pub fn search_debounce_ms(mut self, delay_ms: u32) -> Self {
        self.search_debounce_ms = delay_ms;
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size.max(1);
        self
    }
}

pub struct ServerTableController<T> {
    options: TableOptions,
    url_keys: Option<UrlKeys>,
    state: TableUiState,
    debounced_search: String,
    search_debounce: Debouncer<String>,

    data: Vec<T>,
    total_count: usize,
    is_loading: bool,
    error: Option<FetchError>,
    issued_seq: u64,
    last_issued: Option<QueryDescriptor>,
}

impl<T> ServerTableController<T> {
    pub fn new(options: TableOptions, url_store: &dyn UrlParamStore) -> Self {
        let url_keys = options.url_sync_key.as_deref().map(UrlKeys::new);
        let state = resolve_initial_state(
            url_store,
            url_keys.as_ref(),
            &options.initial,
            options.default_page_size,
        );
        // A restored search term applies immediately, without waiting for the debounce
        let debounced_search = state.global_filter.clone();
        let search_debounce = Debouncer::new(options.search_debounce_ms);

        Self {
            options,
            url_keys,
            state,
            debounced_search,
            search_debounce,
            data: Vec::new(),
            total_count: 0,
            is_loading: false,
            error: None,
            issued_seq: 0,
            last_issued: None,
        }
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn ui_state(&self) -> &TableUiState {
        &self.state
    }

    // ---- state getters ----

    pub fn pagination(&self) -> PaginationState {
        self.state.pagination
    }

    pub fn sorting(&self) -> &[ColumnSort] {
        &self.state.sorting
    }

    pub fn column_filters(&self) -> &[ColumnFilter] {
        &self.state.column_filters
    }

    pub fn global_filter(&self) -> &str {
        &self.state.global_filter
    }

    pub fn debounced_search_term(&self) -> &str {
        &self.debounced_search
    }

    pub fn is_search_pending(&self) -> bool {
        self.search_debounce.is_pending()
    }

    pub fn is_global_search_enabled(&self) -> bool {
        self.state.is_global_search_enabled
    }

    pub fn column_visibility(&self) -> &BTreeMap<String, bool> {
        &self.state.column_visibility
    }

    pub fn row_selection(&self) -> &BTreeMap<String, bool> {
        &self.state.row_selection
    }

    pub fn selected_row_ids(&self) -> Vec<String> {
        self.state
            .row_selection
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    // ---- server data ----

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn page_count(&self) -> usize {
        let size = self.state.pagination.page_size.max(1);
        self.total_count.div_ceil(size).max(1)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    // ---- setters ----

    /// A changed page size sends the table back to the first page.
    pub fn set_pagination(&mut self, pagination: PaginationState) {
        let size_changed = pagination.page_size != self.state.pagination.page_size;
        self.state.pagination = PaginationState {
            page_index: if size_changed { 0 } else { pagination.page_index },
            page_size: pagination.page_size.max(1),
        };
    }

    pub fn set_page_index(&mut self, page_index: usize) {
        self.set_pagination(PaginationState {
            page_index,
            ..self.state.pagination
        });
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.set_pagination(PaginationState {
            page_size,
            ..self.state.pagination
        });
    }

    pub fn set_sorting(&mut self, sorting: Vec<ColumnSort>) {
        self.state.sorting = sorting;
    }

    pub fn set_column_filters(&mut self, filters: Vec<ColumnFilter>) {
        self.state.column_filters = filters;
    }

    /// Replaces the filter of one column; `None` or `null` removes it.
    pub fn set_column_filter(&mut self, id: &str, value: Option<Value>) {
        let filters = &mut self.state.column_filters;
        match value.filter(|v| !v.is_null()) {
            Some(value) => match filters.iter_mut().find(|f| f.id == id) {
                Some(existing) => existing.value = value,
                None => filters.push(ColumnFilter::new(id, value)),
            },
            None => filters.retain(|f| f.id != id),
        }
    }

    /// Stores the text at once and (re)starts the search debounce.
    /// Returns the generation to pass to [`Self::fire_search_debounce`].
    pub fn set_global_filter(&mut self, text: impl Into<String>, now_ms: i64) -> u64 {
        let text = text.into();
        self.state.global_filter = text.clone();
        self.search_debounce.schedule(text, now_ms)
    }

    /// Timer path of the search debounce.
    pub fn fire_search_debounce(&mut self, generation: u64) -> bool {
        match self.search_debounce.fire(generation) {
            Some(term) => self.apply_debounced_search(term),
            None => false,
        }
    }

    /// Clock path of the search debounce.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        match self.search_debounce.poll(now_ms) {
            Some(term) => self.apply_debounced_search(term),
            None => false,
        }
    }

    pub fn cancel_pending_search(&mut self) {
        self.search_debounce.cancel();
    }

    fn apply_debounced_search(&mut self, term: String) -> bool {
        if term == self.debounced_search {
            return false;
        }
        log::debug!("server_table: search term -> '{}'", term);
        self.debounced_search = term;
        self.state.pagination.page_index = 0;
        true
    }

    /// Switching the search scope drops the current term: the same text
    /// would mean something else under the other scope.
    pub fn set_global_search_enabled(&mut self, enabled: bool) {
        if enabled == self.state.is_global_search_enabled {
            return;
        }
        self.state.is_global_search_enabled = enabled;
        self.search_debounce.cancel();
        self.state.global_filter.clear();
        self.debounced_search.clear();
        self.state.pagination.page_index = 0;
    }

    pub fn set_column_visibility(&mut self, visibility: BTreeMap<String, bool>) {
        self.state.column_visibility = visibility;
    }

    pub fn set_column_visible(&mut self, column: &str, visible: bool) {
        self.state
            .column_visibility
            .insert(column.to_string(), visible);
    }

    pub fn set_row_selection(&mut self, selection: BTreeMap<String, bool>) {
        self.state.row_selection = selection;
    }

    pub fn toggle_row_selected(&mut self, row_id: &str) {
        let selected = self.state.row_selection.entry(row_id.to_string()).or_insert(false);
        *selected = !*selected;
    }

    pub fn clear_row_selection(&mut self) {
        self.state.row_selection.clear();
    }

    // ---- query derivation ----

    pub fn query_descriptor(&self) -> QueryDescriptor {
        let search = if self.debounced_search.is_empty() {
            None
        } else {
            let is_global = self.state.is_global_search_enabled;
            Some(SearchSpec {
                term: self.debounced_search.clone(),
                fields: if is_global {
                    Vec::new()
                } else {
                    vec![self.options.default_search_field.clone()]
                },
                is_global,
            })
        };

        QueryDescriptor {
            doctype: self.options.doctype.clone(),
            fields: self.options.fields.clone(),
            filters: translate_filters(&self.state.column_filters),
            sort: translate_sorting(&self.state.sorting),
            default_sort: self.options.default_sort.clone(),
            page: PageSpec::new(
                self.state.pagination.page_index,
                self.state.pagination.page_size,
            ),
            search,
        }
    }

    // ---- fetch orchestration ----

    /// A request when the descriptor changed since the last one issued.
    pub fn take_fetch_request(&mut self) -> Option<PendingFetch> {
        let descriptor = self.query_descriptor();
        if self.last_issued.as_ref() == Some(&descriptor) {
            return None;
        }
        Some(self.issue(descriptor))
    }

    /// Always issues a new request for the current state.
    pub fn refetch(&mut self) -> PendingFetch {
        let descriptor = self.query_descriptor();
        self.issue(descriptor)
    }

    fn issue(&mut self, descriptor: QueryDescriptor) -> PendingFetch {
        self.issued_seq += 1;
        self.is_loading = true;
        let request = descriptor.to_request();
        self.last_issued = Some(descriptor);
        PendingFetch {
            seq: self.issued_seq,
            request,
        }
    }

    /// Applies the outcome of the latest request; older ones are dropped.
    /// Returns `true` if the outcome was applied.
    pub fn complete_fetch(&mut self, outcome: FetchOutcome<T>) -> bool {
        if outcome.seq != self.issued_seq {
            log::debug!(
                "server_table: dropping stale response #{} (latest #{})",
                outcome.seq,
                self.issued_seq
            );
            return false;
        }
        self.is_loading = false;
        match outcome.result {
            Ok(response) => {
                self.data = response.data;
                self.total_count = response.total_count;
                self.error = None;
            }
            Err(e) => {
                self.data.clear();
                self.total_count = 0;
                self.error = Some(e);
            }
        }
        true
    }

    // ---- URL sync ----

    pub fn url_keys(&self) -> Option<&UrlKeys> {
        self.url_keys.as_ref()
    }

    /// Mirrors the synced slices into the URL, skipping unchanged values.
    pub fn write_url(&self, store: &dyn UrlParamStore) -> usize {
        match &self.url_keys {
            Some(keys) => write_state(store, keys, &self.state),
            None => 0,
        }
    }

    /// Applies a parameter changed outside the app (back/forward).
    pub fn apply_url_change(&mut self, key: &str, value: Option<&str>) -> bool {
        let Some(slice) = self.url_keys.as_ref().and_then(|k| k.slice_for(key)) else {
            return false;
        };
        let changed = apply_inbound(&mut self.state, slice, value, self.options.default_page_size);
        if slice == UrlSlice::Search && self.state.global_filter != self.debounced_search {
            self.search_debounce.cancel();
            self.debounced_search = self.state.global_filter.clone();
            return true;
        }
        changed
    }
}
