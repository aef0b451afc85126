use serde::Deserialize;

use super::draft::DraftOptions;
use super::server_table::{HttpListFetcher, TableOptions};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UiConfig {
    #[serde(default)]
    pub table: TableDefaults,
    #[serde(default)]
    pub draft: DraftDefaults,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TableDefaults {
    pub page_size: usize,
    pub search_debounce_ms: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DraftDefaults {
    pub autosave_delay_ms: u32,
    pub saving_indicator_ms: u32,
    pub relative_time_refresh_ms: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Method path of the paginated list-with-count call
    pub list_method: String,
}

/// Default configuration embedded in the bundle
const DEFAULT_CONFIG: &str = r#"
[table]
page_size = 10
search_debounce_ms = 500

[draft]
autosave_delay_ms = 1500
saving_indicator_ms = 600
relative_time_refresh_ms = 30000

[api]
list_method = "/api/method/frappe.client.get_list_with_count"
"#;

impl Default for TableDefaults {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 500,
        }
    }
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            autosave_delay_ms: 1_500,
            saving_indicator_ms: 600,
            relative_time_refresh_ms: 30_000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            list_method: "/api/method/frappe.client.get_list_with_count".to_string(),
        }
    }
}

/// Load UI configuration
///
/// `override_toml` (e.g. injected by the host page) may set any subset of
/// keys; the rest comes from the embedded defaults.
pub fn load_config(override_toml: Option<&str>) -> anyhow::Result<UiConfig> {
    match override_toml {
        Some(contents) if !contents.trim().is_empty() => {
            log::info!("Loading UI config from override");
            Ok(toml::from_str(contents)?)
        }
        _ => {
            log::info!("Using default embedded UI configuration");
            Ok(toml::from_str(DEFAULT_CONFIG)?)
        }
    }
}

impl UiConfig {
    pub fn table_options(&self, doctype: impl Into<String>) -> TableOptions {
        TableOptions::new(doctype)
            .default_page_size(self.table.page_size)
            .search_debounce_ms(self.table.search_debounce_ms)
    }

    pub fn list_fetcher<T>(&self) -> HttpListFetcher<T> {
        HttpListFetcher::new(self.api.list_method.clone())
    }

    pub fn draft_options(&self, owner_key: impl Into<String>) -> DraftOptions {
        DraftOptions {
            autosave_delay_ms: self.draft.autosave_delay_ms,
            saving_indicator_ms: self.draft.saving_indicator_ms,
            relative_time_refresh_ms: self.draft.relative_time_refresh_ms,
            ..DraftOptions::new(owner_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config: Result<UiConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.table.page_size, 10);
        assert_eq!(config.draft.autosave_delay_ms, 1500);
        assert_eq!(config, load_config(None).unwrap());
    }

    #[test]
    fn test_partial_override() {
        let config = load_config(Some("[table]\nsearch_debounce_ms = 300\n")).unwrap();
        assert_eq!(config.table.search_debounce_ms, 300);
        assert_eq!(config.table.page_size, 10);
        assert_eq!(config.draft.saving_indicator_ms, 600);
        assert_eq!(config.api.list_method, "/api/method/frappe.client.get_list_with_count");
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        assert!(load_config(Some("[table]\npage_size = \"ten\"")).is_err());
    }

    #[test]
    fn test_options_from_config() {
        let config = load_config(Some("[draft]\nautosave_delay_ms = 2000")).unwrap();
        let draft = config.draft_options("PR-0042");
        assert_eq!(draft.owner_key, "PR-0042");
        assert_eq!(draft.autosave_delay_ms, 2000);

        let table = config.table_options("Procurement Requests");
        assert_eq!(table.default_page_size, 10);
        assert_eq!(table.search_debounce_ms, 500);
    }
}
