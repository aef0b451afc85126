//! Хранилище черновиков в localStorage.
//!
//! Drafts survive page reloads in the same browser profile. Nothing guards
//! against two writers on one key: a draft belongs to a single tab.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use contracts::shared::draft::DraftDocument;
use thiserror::Error;
use web_sys::window;

const KEY_PREFIX: &str = "draft:";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftStoreError {
    #[error("local storage is not available")]
    Unavailable,

    #[error("failed to serialize draft: {0}")]
    Serialize(String),

    #[error("failed to write draft: {0}")]
    Write(String),
}

pub trait LocalDraftStore {
    /// A stored value that does not parse is reported as absent.
    fn get_draft(&self, owner_key: &str) -> Option<DraftDocument>;

    fn set_draft(&self, owner_key: &str, draft: &DraftDocument) -> Result<(), DraftStoreError>;

    fn remove_draft(&self, owner_key: &str);

    fn has_draft(&self, owner_key: &str) -> bool {
        self.get_draft(owner_key).is_some()
    }
}

impl<S: LocalDraftStore + ?Sized> LocalDraftStore for Rc<S> {
    fn get_draft(&self, owner_key: &str) -> Option<DraftDocument> {
        (**self).get_draft(owner_key)
    }

    fn set_draft(&self, owner_key: &str, draft: &DraftDocument) -> Result<(), DraftStoreError> {
        (**self).set_draft(owner_key, draft)
    }

    fn remove_draft(&self, owner_key: &str) {
        (**self).remove_draft(owner_key)
    }

    fn has_draft(&self, owner_key: &str) -> bool {
        (**self).has_draft(owner_key)
    }
}

fn storage_key(owner_key: &str) -> String {
    format!("{}{}", KEY_PREFIX, owner_key)
}

fn parse_draft(owner_key: &str, json: &str) -> Option<DraftDocument> {
    match serde_json::from_str::<DraftDocument>(json) {
        Ok(draft) => Some(draft),
        Err(e) => {
            log::warn!("draft_store: ignoring malformed draft '{}': {}", owner_key, e);
            None
        }
    }
}

/// Drafts kept as JSON strings, the same representation as localStorage.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `set_draft` fail like an exceeded quota.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn put_raw(&self, owner_key: &str, json: &str) {
        self.entries
            .borrow_mut()
            .insert(storage_key(owner_key), json.to_string());
    }
}

impl LocalDraftStore for MemoryDraftStore {
    fn get_draft(&self, owner_key: &str) -> Option<DraftDocument> {
        let json = self.entries.borrow().get(&storage_key(owner_key)).cloned()?;
        parse_draft(owner_key, &json)
    }

    fn set_draft(&self, owner_key: &str, draft: &DraftDocument) -> Result<(), DraftStoreError> {
        if self.fail_writes.get() {
            return Err(DraftStoreError::Write("quota exceeded".to_string()));
        }
        let json =
            serde_json::to_string(draft).map_err(|e| DraftStoreError::Serialize(e.to_string()))?;
        self.entries.borrow_mut().insert(storage_key(owner_key), json);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove_draft(&self, owner_key: &str) {
        self.entries.borrow_mut().remove(&storage_key(owner_key));
    }
}

/// `window.localStorage`, one entry per owner key
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDraftStore;

fn get_local_storage() -> Option<web_sys::Storage> {
    window()?.local_storage().ok()?
}

impl LocalDraftStore for BrowserDraftStore {
    fn get_draft(&self, owner_key: &str) -> Option<DraftDocument> {
        let json = get_local_storage()?
            .get_item(&storage_key(owner_key))
            .ok()??;
        parse_draft(owner_key, &json)
    }

    fn set_draft(&self, owner_key: &str, draft: &DraftDocument) -> Result<(), DraftStoreError> {
        let storage = get_local_storage().ok_or(DraftStoreError::Unavailable)?;
        let json =
            serde_json::to_string(draft).map_err(|e| DraftStoreError::Serialize(e.to_string()))?;
        storage
            .set_item(&storage_key(owner_key), &json)
            .map_err(|e| DraftStoreError::Write(format!("{:?}", e)))
    }

    fn remove_draft(&self, owner_key: &str) {
        if let Some(storage) = get_local_storage() {
            let _ = storage.remove_item(&storage_key(owner_key));
        }
    }
}
