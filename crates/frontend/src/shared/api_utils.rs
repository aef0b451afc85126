//! Адреса API на том же origin, что и приложение.

/// Origin of the current page, e.g. "https://erp.example.com".
/// Empty outside a browser, so URLs become relative.
pub fn api_base() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

/// Full URL of an API path ("/api/method/...")
pub fn api_url(path: &str) -> String {
    join_url(&api_base(), path)
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
