//! Серверная таблица: пагинация, сортировка, фильтры и поиск выполняются на сервере.

pub mod controller;
pub mod fetcher;
pub mod filters;
pub mod hook;
pub mod state;
pub mod url_sync;

pub use controller::{ServerTableController, TableOptions};
pub use fetcher::{FetchError, HttpListFetcher, RemoteListFetcher};
pub use hook::{use_http_server_table, use_server_table, ServerTable};
pub use state::{ColumnFilter, ColumnSort, InitialTableState, PaginationState, TableUiState};
