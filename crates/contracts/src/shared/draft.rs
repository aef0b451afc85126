//! Черновик заявки: строки, категории, комментарий и стек отмены удаления.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Items in this status are removed for good when deleted: re-adding them
/// would submit the same item request twice.
pub const REQUEST_STATUS: &str = "Request";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Server row id, absent for rows not yet persisted
    #[serde(default)]
    pub name: Option<String>,
    pub item_id: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub quantity: f64,
    pub original_quantity: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub original_comment: String,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Identifies a line: by `name` when both sides have one, by `item_id` otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemKey {
    pub name: Option<String>,
    pub item_id: String,
}

impl LineItemKey {
    pub fn by_name(name: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            item_id: item_id.into(),
        }
    }

    pub fn by_item(item_id: impl Into<String>) -> Self {
        Self {
            name: None,
            item_id: item_id.into(),
        }
    }
}

impl LineItem {
    /// Line as loaded from the server: current values equal the originals.
    pub fn from_server(
        name: impl Into<String>,
        item_id: impl Into<String>,
        item_name: impl Into<String>,
        quantity: f64,
    ) -> Self {
        Self {
            name: Some(name.into()),
            item_id: item_id.into(),
            item_name: item_name.into(),
            category: None,
            unit: None,
            status: None,
            quantity,
            original_quantity: quantity,
            comment: String::new(),
            original_comment: String::new(),
            is_new: false,
            is_modified: false,
            is_deleted: false,
        }
    }

    /// Line added in the form, not known to the server yet.
    pub fn new_pending(item_id: impl Into<String>, item_name: impl Into<String>, quantity: f64) -> Self {
        Self {
            name: None,
            item_id: item_id.into(),
            item_name: item_name.into(),
            category: None,
            unit: None,
            status: None,
            quantity,
            original_quantity: 0.0,
            comment: String::new(),
            original_comment: String::new(),
            is_new: true,
            is_modified: true,
            is_deleted: false,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn key(&self) -> LineItemKey {
        LineItemKey {
            name: self.name.clone(),
            item_id: self.item_id.clone(),
        }
    }

    pub fn matches(&self, key: &LineItemKey) -> bool {
        match (&self.name, &key.name) {
            (Some(own), Some(other)) => own == other,
            _ => self.item_id == key.item_id,
        }
    }

    pub fn is_request_status(&self) -> bool {
        self.status.as_deref() == Some(REQUEST_STATUS)
    }

    pub fn refresh_modified(&mut self) {
        self.is_modified = self.is_new
            || self.quantity != self.original_quantity
            || self.comment != self.original_comment;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub makes: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            makes: Vec::new(),
        }
    }
}

/// Editable content of an order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingCopy {
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub comment: String,
    /// Most recent deletion last
    #[serde(default)]
    pub undo_stack: Vec<LineItem>,
}

/// The only shape submitted upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionData {
    pub items: Vec<LineItem>,
    pub categories: Vec<Category>,
}

impl WorkingCopy {
    pub fn submission(&self) -> SubmissionData {
        SubmissionData {
            items: self
                .items
                .iter()
                .filter(|item| !item.is_deleted)
                .cloned()
                .collect(),
            categories: self.categories.clone(),
        }
    }
}

/// Opaque server freshness marker, usually the document's `modified` value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionStamp(pub String);

const STAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl RevisionStamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn parse(&self) -> Option<NaiveDateTime> {
        let raw = self.0.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
        STAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    /// Strictly newer. Unparseable stamps compare as strings; an empty
    /// stamp is never newer.
    pub fn is_newer_than(&self, other: &RevisionStamp) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        let ordering = match (self.parse(), other.parse()) {
            (Some(own), Some(theirs)) => own.cmp(&theirs),
            _ => self.0.trim().cmp(other.0.trim()),
        };
        ordering == Ordering::Greater
    }
}

/// Locally persisted, not yet submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftDocument {
    pub owner_key: String,
    #[serde(flatten)]
    pub content: WorkingCopy,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    pub server_revision_stamp: RevisionStamp,
}
