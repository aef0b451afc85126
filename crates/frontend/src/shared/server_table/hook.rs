//! Leptos-обвязка над [`ServerTableController`].
//!
//! The controller lives in a local `StoredValue`; a version signal is bumped
//! after every change so that views reading through [`ServerTable`] re-run.
//! Timers and requests check that the owner is still alive before touching
//! the controller, so nothing is applied after the table is unmounted.

use std::collections::BTreeMap;
use std::rc::Rc;

use contracts::shared::list_query::QueryDescriptor;
use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::controller::{ServerTableController, TableOptions};
use super::fetcher::{dispatch, FetchError, RemoteListFetcher};
use super::state::{ColumnFilter, ColumnSort, PaginationState, TableUiState};
use super::url_sync::UrlSlice;
use crate::shared::clock::now_ms;
use crate::shared::config::UiConfig;
use crate::shared::url_params::{BrowserUrlParams, ParamCallback, Subscription, UrlParamStore};

pub struct ServerTable<T: 'static> {
    core: StoredValue<ServerTableController<T>, LocalStorage>,
    fetcher: StoredValue<Rc<dyn RemoteListFetcher<T>>, LocalStorage>,
    version: RwSignal<u64>,
}

impl<T: 'static> Clone for ServerTable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for ServerTable<T> {}

fn bump(version: RwSignal<u64>) {
    version.try_update(|v| *v = v.wrapping_add(1));
}

/// Creates the table state for the current reactive owner.
pub fn use_server_table<T: 'static>(
    options: TableOptions,
    url_store: Rc<dyn UrlParamStore>,
    fetcher: Rc<dyn RemoteListFetcher<T>>,
) -> ServerTable<T> {
    let controller = ServerTableController::new(options, url_store.as_ref());
    let url_keys = controller.url_keys().cloned();

    let core = StoredValue::new_local(controller);
    let fetcher = StoredValue::new_local(fetcher);
    let store = StoredValue::new_local(url_store);
    let version = RwSignal::new(0_u64);

    // Back/forward navigation
    let subscriptions: Vec<Subscription> = match &url_keys {
        Some(keys) => UrlSlice::ALL
            .iter()
            .map(|slice| {
                let callback: ParamCallback = Rc::new(move |key: &str, value: Option<&str>| {
                    if core.try_update_value(|c| c.apply_url_change(key, value)) == Some(true) {
                        bump(version);
                    }
                });
                store.with_value(|s| s.subscribe(&keys.key(*slice), callback))
            })
            .collect(),
        None => Vec::new(),
    };
    // Dropped together with the owner, which unsubscribes
    let _subscriptions = StoredValue::new_local(subscriptions);

    let table = ServerTable {
        core,
        fetcher,
        version,
    };

    // Refetch whenever the query changes
    Effect::new(move |_| {
        version.track();
        let Some(Some(pending)) = core.try_update_value(|c| c.take_fetch_request()) else {
            return;
        };
        bump(version);
        let Some(fetcher) = fetcher.try_get_value() else {
            return;
        };
        spawn_local(async move {
            let outcome = dispatch(fetcher.as_ref(), pending).await;
            if core.try_update_value(|c| c.complete_fetch(outcome)) == Some(true) {
                bump(version);
            }
        });
    });

    // Mirror state into the URL
    if url_keys.is_some() {
        Effect::new(move |_| {
            version.track();
            store.with_value(|s| core.with_value(|c| c.write_url(s.as_ref())));
        });
    }

    table
}

/// Table over the page URL and the configured list method.
pub fn use_http_server_table<T: DeserializeOwned + 'static>(
    config: &UiConfig,
    options: TableOptions,
) -> ServerTable<T> {
    use_server_table(
        options,
        Rc::new(BrowserUrlParams::new()),
        Rc::new(config.list_fetcher::<T>()),
    )
}

impl<T: 'static> ServerTable<T> {
    fn read<R>(&self, f: impl FnOnce(&ServerTableController<T>) -> R) -> R {
        self.version.track();
        self.core.with_value(f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut ServerTableController<T>) -> R) -> Option<R> {
        let result = self.core.try_update_value(f);
        if result.is_some() {
            bump(self.version);
        }
        result
    }

    // ---- reads ----

    pub fn ui_state(&self) -> TableUiState {
        self.read(|c| c.ui_state().clone())
    }

    pub fn pagination(&self) -> PaginationState {
        self.read(|c| c.pagination())
    }

    pub fn sorting(&self) -> Vec<ColumnSort> {
        self.read(|c| c.sorting().to_vec())
    }

    pub fn column_filters(&self) -> Vec<ColumnFilter> {
        self.read(|c| c.column_filters().to_vec())
    }

    pub fn global_filter(&self) -> String {
        self.read(|c| c.global_filter().to_string())
    }

    pub fn debounced_search_term(&self) -> String {
        self.read(|c| c.debounced_search_term().to_string())
    }

    pub fn is_global_search_enabled(&self) -> bool {
        self.read(|c| c.is_global_search_enabled())
    }

    pub fn column_visibility(&self) -> BTreeMap<String, bool> {
        self.read(|c| c.column_visibility().clone())
    }

    pub fn selected_row_ids(&self) -> Vec<String> {
        self.read(|c| c.selected_row_ids())
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.read(|c| f(c.data()))
    }

    pub fn data(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.with_data(<[T]>::to_vec)
    }

    pub fn total_count(&self) -> usize {
        self.read(|c| c.total_count())
    }

    pub fn page_count(&self) -> usize {
        self.read(|c| c.page_count())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|c| c.is_loading())
    }

    pub fn error(&self) -> Option<FetchError> {
        self.read(|c| c.error().cloned())
    }

    pub fn query_descriptor(&self) -> QueryDescriptor {
        self.read(|c| c.query_descriptor())
    }

    // ---- writes ----

    pub fn set_pagination(&self, pagination: PaginationState) {
        self.write(|c| c.set_pagination(pagination));
    }

    pub fn set_page_index(&self, page_index: usize) {
        self.write(|c| c.set_page_index(page_index));
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.write(|c| c.set_page_size(page_size));
    }

    pub fn set_sorting(&self, sorting: Vec<ColumnSort>) {
        self.write(|c| c.set_sorting(sorting));
    }

    pub fn set_column_filters(&self, filters: Vec<ColumnFilter>) {
        self.write(|c| c.set_column_filters(filters));
    }

    pub fn set_column_filter(&self, id: &str, value: Option<Value>) {
        self.write(|c| c.set_column_filter(id, value));
    }

    /// Updates the input at once; the query follows after the debounce delay.
    pub fn set_global_filter(&self, text: impl Into<String>) {
        let text = text.into();
        let Some((generation, delay_ms)) = self.write(|c| {
            let generation = c.set_global_filter(text, now_ms());
            (generation, c.options().search_debounce_ms)
        }) else {
            return;
        };
        let core = self.core;
        let version = self.version;
        spawn_local(async move {
            TimeoutFuture::new(delay_ms).await;
            if core.try_update_value(|c| c.fire_search_debounce(generation)) == Some(true) {
                bump(version);
            }
        });
    }

    pub fn set_global_search_enabled(&self, enabled: bool) {
        self.write(|c| c.set_global_search_enabled(enabled));
    }

    pub fn set_column_visible(&self, column: &str, visible: bool) {
        self.write(|c| c.set_column_visible(column, visible));
    }

    pub fn set_column_visibility(&self, visibility: BTreeMap<String, bool>) {
        self.write(|c| c.set_column_visibility(visibility));
    }

    pub fn toggle_row_selected(&self, row_id: &str) {
        self.write(|c| c.toggle_row_selected(row_id));
    }

    pub fn set_row_selection(&self, selection: BTreeMap<String, bool>) {
        self.write(|c| c.set_row_selection(selection));
    }

    pub fn clear_row_selection(&self) {
        self.write(|c| c.clear_row_selection());
    }

    /// Re-issues the current query, e.g. after an edit elsewhere.
    pub fn refetch(&self) {
        let Some(pending) = self.write(|c| c.refetch()) else {
            return;
        };
        let Some(fetcher) = self.fetcher.try_get_value() else {
            return;
        };
        let core = self.core;
        let version = self.version;
        spawn_local(async move {
            let outcome = dispatch(fetcher.as_ref(), pending).await;
            if core.try_update_value(|c| c.complete_fetch(outcome)) == Some(true) {
                bump(version);
            }
        });
    }
}
