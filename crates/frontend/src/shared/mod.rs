pub mod api_utils;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod draft;
pub mod draft_store;
pub mod server_table;
pub mod url_params;
