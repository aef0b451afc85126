//! Параметры адресной строки как хранилище ключ-значение.
//!
//! Tables mirror part of their state into the query string so that a link
//! reproduces the exact view. [`UrlParamStore`] is the narrow contract the
//! table controller depends on; [`BrowserUrlParams`] backs it with
//! `window.location` / `window.history`, [`MemoryUrlParams`] with a map.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::window;

/// Called with `(key, new_value)`; `None` means the parameter was removed.
pub type ParamCallback = Rc<dyn Fn(&str, Option<&str>)>;

pub trait UrlParamStore {
    fn get_param(&self, key: &str) -> Option<String>;

    /// Applies all updates as one URL change. `None` removes the parameter.
    fn update_params(&self, updates: &[(String, Option<String>)]);

    fn update_param(&self, key: &str, value: Option<&str>) {
        self.update_params(&[(key.to_string(), value.map(str::to_string))]);
    }

    /// Subscribes to changes made outside the application (back/forward).
    fn subscribe(&self, key: &str, callback: ParamCallback) -> Subscription;
}

/// Unsubscribes when dropped or on [`Subscription::unsubscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, String, ParamCallback)>>,
}

impl Subscribers {
    fn add(self: &Rc<Self>, key: &str, callback: ParamCallback) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.entries
            .borrow_mut()
            .push((id, key.to_string(), callback));

        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(subscribers) = weak.upgrade() {
                subscribers
                    .entries
                    .borrow_mut()
                    .retain(|(entry_id, _, _)| *entry_id != id);
            }
        })
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        // Callbacks may subscribe or unsubscribe, so the list is not borrowed while they run
        let matching: Vec<ParamCallback> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry_key, _)| entry_key == key)
            .map(|(_, _, callback)| callback.clone())
            .collect();
        for callback in matching {
            callback(key, value);
        }
    }

    fn notify_diff(&self, before: &BTreeMap<String, String>, after: &BTreeMap<String, String>) {
        let keys: Vec<&String> = before.keys().chain(after.keys()).collect();
        let mut seen: Vec<&String> = Vec::new();
        for key in keys {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            let new_value = after.get(key);
            if before.get(key) != new_value {
                self.notify(key, new_value.map(String::as_str));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// In-memory query string. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryUrlParams {
    params: Rc<RefCell<BTreeMap<String, String>>>,
    subscribers: Rc<Subscribers>,
    writes: Rc<Cell<usize>>,
}

impl MemoryUrlParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store.params.borrow_mut().extend(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        store
    }

    /// Number of updates that changed the query string.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.params.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Replaces the whole query string the way back/forward navigation
    /// does, notifying subscribers of every key that changed.
    pub fn navigate<K, V>(&self, params: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let after: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let before = self.params.replace(after.clone());
        self.subscribers.notify_diff(&before, &after);
    }
}

impl UrlParamStore for MemoryUrlParams {
    fn get_param(&self, key: &str) -> Option<String> {
        self.params.borrow().get(key).cloned()
    }

    fn update_params(&self, updates: &[(String, Option<String>)]) {
        if apply_updates(&mut self.params.borrow_mut(), updates) {
            self.writes.set(self.writes.get() + 1);
        }
    }

    fn subscribe(&self, key: &str, callback: ParamCallback) -> Subscription {
        self.subscribers.add(key, callback)
    }
}

struct BrowserInner {
    subscribers: Rc<Subscribers>,
    snapshot: RefCell<BTreeMap<String, String>>,
    listener: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>>,
}

impl BrowserInner {
    fn sync_from_location(&self) {
        let after = read_location();
        let before = self.snapshot.replace(after.clone());
        self.subscribers.notify_diff(&before, &after);
    }
}

impl Drop for BrowserInner {
    fn drop(&mut self) {
        if let (Some(closure), Some(w)) = (self.listener.borrow_mut().take(), window()) {
            let _ = w.remove_event_listener_with_callback(
                "popstate",
                closure.as_ref().unchecked_ref::<js_sys::Function>(),
            );
        }
    }
}

/// Query string of the current page. Every committed update is one history entry.
#[derive(Clone)]
pub struct BrowserUrlParams {
    inner: Rc<BrowserInner>,
}

impl BrowserUrlParams {
    pub fn new() -> Self {
        let inner = Rc::new(BrowserInner {
            subscribers: Rc::new(Subscribers::default()),
            snapshot: RefCell::new(read_location()),
            listener: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            if let Some(inner) = weak.upgrade() {
                inner.sync_from_location();
            }
        }) as Box<dyn FnMut(web_sys::Event)>);

        if let Some(w) = window() {
            if w
                .add_event_listener_with_callback(
                    "popstate",
                    closure.as_ref().unchecked_ref::<js_sys::Function>(),
                )
                .is_err()
            {
                log::warn!("url_params: failed to listen for popstate");
            }
        }
        *inner.listener.borrow_mut() = Some(closure);

        Self { inner }
    }
}

impl Default for BrowserUrlParams {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlParamStore for BrowserUrlParams {
    fn get_param(&self, key: &str) -> Option<String> {
        read_location().get(key).cloned()
    }

    fn update_params(&self, updates: &[(String, Option<String>)]) {
        let mut params = read_location();
        if !apply_updates(&mut params, updates) {
            return;
        }
        write_location(&params);
        // Own writes are not external changes
        *self.inner.snapshot.borrow_mut() = params;
    }

    fn subscribe(&self, key: &str, callback: ParamCallback) -> Subscription {
        self.inner.subscribers.add(key, callback)
    }
}

/// Returns `true` if anything changed.
fn apply_updates(params: &mut BTreeMap<String, String>, updates: &[(String, Option<String>)]) -> bool {
    let mut changed = false;
    for (key, value) in updates {
        changed |= match value {
            Some(value) => params.insert(key.clone(), value.clone()).as_ref() != Some(value),
            None => params.remove(key).is_some(),
        };
    }
    changed
}

fn read_location() -> BTreeMap<String, String> {
    let search = window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default();
    let query = search.trim_start_matches('?');
    if query.is_empty() {
        return BTreeMap::new();
    }
    serde_qs::from_str(query).unwrap_or_else(|e| {
        log::warn!("url_params: unreadable query string '{}': {}", query, e);
        BTreeMap::new()
    })
}

fn write_location(params: &BTreeMap<String, String>) {
    let Some(w) = window() else {
        return;
    };
    let new_url = if params.is_empty() {
        w.location().pathname().unwrap_or_else(|_| "/".to_string())
    } else {
        match serde_qs::to_string(params) {
            Ok(query) => format!("?{}", query),
            Err(e) => {
                log::warn!("url_params: failed to encode query string: {}", e);
                return;
            }
        }
    };
    if let Ok(history) = w.history() {
        if let Err(e) = history.push_state_with_url(&JsValue::NULL, "", Some(&new_url)) {
            log::warn!("url_params: pushState failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_counts_only_real_writes() {
        let store = MemoryUrlParams::new();
        store.update_param("pr_page", Some("2"));
        store.update_param("pr_page", Some("2"));
        store.update_param("pr_search", None);
        assert_eq!(store.write_count(), 1);

        store.update_param("pr_page", None);
        assert_eq!(store.get_param("pr_page"), None);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_batched_update_is_one_write() {
        let store = MemoryUrlParams::with_params([("pr_page", "3"), ("pr_sort", "x")]);
        store.update_params(&[
            ("pr_page".to_string(), Some("0".to_string())),
            ("pr_size".to_string(), Some("50".to_string())),
            ("pr_sort".to_string(), None),
        ]);
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get_param("pr_size").as_deref(), Some("50"));
        assert_eq!(store.get_param("pr_sort"), None);

        store.update_params(&[("pr_page".to_string(), Some("0".to_string()))]);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_navigate_notifies_changed_keys_only() {
        let store = MemoryUrlParams::with_params([("pr_page", "1"), ("pr_size", "10")]);
        let seen: Rc<RefCell<Vec<(String, Option<String>)>>> = Rc::new(RefCell::new(Vec::new()));

        let mut subs = Vec::new();
        for key in ["pr_page", "pr_size", "pr_search"] {
            let seen = seen.clone();
            subs.push(store.subscribe(
                key,
                Rc::new(move |k: &str, v: Option<&str>| {
                    seen.borrow_mut().push((k.to_string(), v.map(str::to_string)));
                }),
            ));
        }

        store.navigate([("pr_page", "4"), ("pr_search", "steel")]);

        let mut events = seen.borrow().clone();
        events.sort();
        assert_eq!(
            events,
            vec![
                ("pr_page".to_string(), Some("4".to_string())),
                ("pr_search".to_string(), Some("steel".to_string())),
                ("pr_size".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let store = MemoryUrlParams::new();
        let hits = Rc::new(Cell::new(0));

        let hits_in = hits.clone();
        let sub = store.subscribe("po_page", Rc::new(move |_: &str, _: Option<&str>| {
            hits_in.set(hits_in.get() + 1);
        }));
        assert_eq!(store.subscriber_count(), 1);

        store.navigate([("po_page", "1")]);
        drop(sub);
        store.navigate([("po_page", "2")]);

        assert_eq!(hits.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }
}
