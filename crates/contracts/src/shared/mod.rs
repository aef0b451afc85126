pub mod draft;
pub mod list_query;
