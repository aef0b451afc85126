//! Локальный черновик заявки: автосохранение, сверка с сервером, отмена удаления.
//!
//! [`DraftReconciler`] owns the working copy of one order while its form is
//! open. Edits are saved to a [`LocalDraftStore`] after a quiet period; a
//! draft left from an earlier session is offered for resuming unless the
//! server copy changed since the draft was taken, in which case the draft is
//! dropped and the user is told.

use chrono::{DateTime, Utc};
use contracts::shared::draft::{
    Category, DraftDocument, LineItem, LineItemKey, RevisionStamp, SubmissionData, WorkingCopy,
};

use super::relative_time::format_relative;
use crate::shared::clock::to_datetime;
use crate::shared::debounce::Debouncer;
use crate::shared::draft_store::LocalDraftStore;

pub const DEFAULT_AUTOSAVE_DELAY_MS: u32 = 1_500;
pub const DEFAULT_SAVING_INDICATOR_MS: u32 = 600;
pub const DEFAULT_RELATIVE_TIME_REFRESH_MS: u32 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftOptions {
    /// Usually the request id
    pub owner_key: String,
    pub autosave_delay_ms: u32,
    pub saving_indicator_ms: u32,
    pub relative_time_refresh_ms: u32,
}

impl DraftOptions {
    pub fn new(owner_key: impl Into<String>) -> Self {
        Self {
            owner_key: owner_key.into(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            saving_indicator_ms: DEFAULT_SAVING_INDICATOR_MS,
            relative_time_refresh_ms: DEFAULT_RELATIVE_TIME_REFRESH_MS,
        }
    }
}

/// Order as the server currently has it
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    pub items: Vec<LineItem>,
    pub categories: Vec<Category>,
    pub comment: String,
    pub revision: RevisionStamp,
}

impl ServerSnapshot {
    fn working_copy(&self) -> WorkingCopy {
        let mut items = self.items.clone();
        items.iter_mut().for_each(LineItem::refresh_modified);
        WorkingCopy {
            items,
            categories: self.categories.clone(),
            comment: self.comment.clone(),
            undo_stack: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    Uninitialized,
    /// A valid stored draft waits for resume/discard; the form shows server data
    DraftPendingChoice,
    Active { using_draft: bool },
    SubmittedCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Server items not loaded yet; reconciliation may run later
    Skipped,
    AlreadyReconciled,
    NoDraft,
    StaleDiscarded,
    PendingChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftNotice {
    StaleDraftDiscarded,
}

impl DraftNotice {
    pub fn message(&self) -> &'static str {
        match self {
            DraftNotice::StaleDraftDiscarded => {
                "Your saved draft was discarded because this order was changed on the server."
            }
        }
    }
}

pub struct DraftReconciler<S> {
    options: DraftOptions,
    store: S,
    working: WorkingCopy,
    server: Option<ServerSnapshot>,
    /// Server revision the working copy was initialised against
    revision: RevisionStamp,
    phase: DraftPhase,
    reconciled: bool,
    pending_draft: Option<DraftDocument>,
    notice: Option<DraftNotice>,
    has_unsaved_changes: bool,
    autosave: Debouncer<()>,
    saving_until_ms: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl<S: LocalDraftStore> DraftReconciler<S> {
    pub fn new(options: DraftOptions, store: S) -> Self {
        let autosave = Debouncer::new(options.autosave_delay_ms);
        Self {
            options,
            store,
            working: WorkingCopy::default(),
            server: None,
            revision: RevisionStamp::default(),
            phase: DraftPhase::Uninitialized,
            reconciled: false,
            pending_draft: None,
            notice: None,
            has_unsaved_changes: false,
            autosave,
            saving_until_ms: None,
            created_at: None,
            last_saved_at: None,
        }
    }

    pub fn options(&self) -> &DraftOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- reconciliation ----

    /// Runs once per instance, on the first non-empty server snapshot.
    pub fn reconcile(&mut self, server: ServerSnapshot) -> ReconcileOutcome {
        if self.reconciled {
            return ReconcileOutcome::AlreadyReconciled;
        }
        if server.items.is_empty() {
            return ReconcileOutcome::Skipped;
        }
        self.reconciled = true;
        self.initialize_from(&server);

        let owner_key = self.options.owner_key.clone();
        let outcome = match self.store.get_draft(&owner_key) {
            None => {
                self.phase = DraftPhase::Active { using_draft: false };
                ReconcileOutcome::NoDraft
            }
            Some(draft) if server.revision.is_newer_than(&draft.server_revision_stamp) => {
                log::info!(
                    "draft: discarding stale draft '{}' ({} < {})",
                    owner_key,
                    draft.server_revision_stamp.as_str(),
                    server.revision.as_str()
                );
                self.store.remove_draft(&owner_key);
                self.notice = Some(DraftNotice::StaleDraftDiscarded);
                self.phase = DraftPhase::Active { using_draft: false };
                ReconcileOutcome::StaleDiscarded
            }
            Some(draft) => {
                log::debug!("draft: found draft '{}', waiting for resume/discard", owner_key);
                self.last_saved_at = Some(draft.last_saved_at);
                self.pending_draft = Some(draft);
                self.phase = DraftPhase::DraftPendingChoice;
                ReconcileOutcome::PendingChoice
            }
        };
        self.server = Some(server);
        outcome
    }

    /// Keeps the latest server data for discards without reconciling again.
    pub fn update_server_snapshot(&mut self, server: ServerSnapshot) {
        self.server = Some(server);
    }

    fn initialize_from(&mut self, server: &ServerSnapshot) {
        self.working = server.working_copy();
        self.revision = server.revision.clone();
        self.has_unsaved_changes = false;
        self.autosave.cancel();
    }

    pub fn resume_draft(&mut self) -> bool {
        let draft = match self.pending_draft.take() {
            Some(draft) => draft,
            None => match self.store.get_draft(&self.options.owner_key) {
                Some(draft) => draft,
                None => return false,
            },
        };
        self.autosave.cancel();
        self.working = draft.content;
        self.created_at = Some(draft.created_at);
        self.last_saved_at = Some(draft.last_saved_at);
        self.has_unsaved_changes = false;
        self.phase = DraftPhase::Active { using_draft: true };
        log::debug!("draft: resumed '{}'", self.options.owner_key);
        true
    }

    pub fn discard_draft(&mut self) {
        self.autosave.cancel();
        self.store.remove_draft(&self.options.owner_key);
        match self.server.clone() {
            Some(server) => self.initialize_from(&server),
            None => {
                self.working = WorkingCopy::default();
                self.has_unsaved_changes = false;
            }
        }
        self.reset_transient();
        self.phase = DraftPhase::Active { using_draft: false };
        log::debug!("draft: discarded '{}'", self.options.owner_key);
    }

    /// The working copy stays as is: the caller navigates away after submit.
    pub fn clear_draft_after_submit(&mut self) {
        self.autosave.cancel();
        self.store.remove_draft(&self.options.owner_key);
        self.has_unsaved_changes = false;
        self.reset_transient();
        self.phase = DraftPhase::SubmittedCleared;
    }

    fn reset_transient(&mut self) {
        self.pending_draft = None;
        self.notice = None;
        self.saving_until_ms = None;
        self.created_at = None;
        self.last_saved_at = None;
    }

    // ---- getters ----

    pub fn phase(&self) -> DraftPhase {
        self.phase
    }

    pub fn is_using_draft(&self) -> bool {
        self.phase == DraftPhase::Active { using_draft: true }
    }

    pub fn pending_draft(&self) -> Option<&DraftDocument> {
        self.pending_draft.as_ref()
    }

    pub fn notice(&self) -> Option<DraftNotice> {
        self.notice
    }

    pub fn take_notice(&mut self) -> Option<DraftNotice> {
        self.notice.take()
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.working
    }

    pub fn items(&self) -> &[LineItem] {
        &self.working.items
    }

    pub fn categories(&self) -> &[Category] {
        &self.working.categories
    }

    pub fn comment(&self) -> &str {
        &self.working.comment
    }

    pub fn undo_stack(&self) -> &[LineItem] {
        &self.working.undo_stack
    }

    pub fn can_undo(&self) -> bool {
        !self.working.undo_stack.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn revision(&self) -> &RevisionStamp {
        &self.revision
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn last_saved_label(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_saved_at.map(|saved| format_relative(saved, now))
    }

    pub fn is_saving(&self, now_ms: i64) -> bool {
        self.saving_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn submission(&self) -> SubmissionData {
        self.working.submission()
    }

    /// Generation of the pending autosave, for arming a timer.
    pub fn pending_autosave(&self) -> Option<u64> {
        self.autosave.pending_generation()
    }

    // ---- mutations ----

    fn touch(&mut self, now_ms: i64) {
        self.has_unsaved_changes = true;
        match self.phase {
            // No stored draft may be written before reconciliation or while it awaits a decision
            DraftPhase::Uninitialized
            | DraftPhase::DraftPendingChoice
            | DraftPhase::SubmittedCleared => {}
            _ => {
                self.autosave.schedule((), now_ms);
            }
        }
    }

    pub fn add_item(&mut self, mut item: LineItem, now_ms: i64) {
        item.refresh_modified();
        self.working.items.push(item);
        self.touch(now_ms);
    }

    pub fn update_quantity(&mut self, key: &LineItemKey, quantity: f64, now_ms: i64) -> bool {
        self.edit_item(key, now_ms, |item| item.quantity = quantity)
    }

    pub fn update_item_comment(&mut self, key: &LineItemKey, comment: &str, now_ms: i64) -> bool {
        self.edit_item(key, now_ms, |item| item.comment = comment.to_string())
    }

    fn edit_item(&mut self, key: &LineItemKey, now_ms: i64, edit: impl FnOnce(&mut LineItem)) -> bool {
        let Some(item) = self
            .working
            .items
            .iter_mut()
            .find(|item| !item.is_deleted && item.matches(key))
        else {
            return false;
        };
        edit(item);
        item.refresh_modified();
        self.touch(now_ms);
        true
    }

    /// Soft delete. Items in "Request" status cannot be brought back.
    pub fn delete_item(&mut self, key: &LineItemKey, now_ms: i64) -> bool {
        let Some(item) = self
            .working
            .items
            .iter_mut()
            .find(|item| !item.is_deleted && item.matches(key))
        else {
            return false;
        };
        let before = item.clone();
        item.is_deleted = true;
        if !before.is_request_status() {
            self.working.undo_stack.push(before);
        }
        self.touch(now_ms);
        true
    }

    /// Restores the most recent deletion.
    pub fn undo_delete(&mut self, now_ms: i64) -> Option<LineItem> {
        let entry = self.working.undo_stack.pop()?;
        let key = entry.key();
        let items = &mut self.working.items;
        let position = items
            .iter()
            .position(|item| item.is_deleted && item.matches(&key))
            .or_else(|| items.iter().position(|item| item.matches(&key)));
        match position {
            Some(index) => items[index].is_deleted = false,
            None => {
                // the list was replaced since the deletion
                let mut restored = entry.clone();
                restored.is_deleted = false;
                items.push(restored);
            }
        }
        self.touch(now_ms);
        Some(entry)
    }

    pub fn set_comment(&mut self, comment: impl Into<String>, now_ms: i64) {
        self.working.comment = comment.into();
        self.touch(now_ms);
    }

    pub fn replace_items(&mut self, mut items: Vec<LineItem>, now_ms: i64) {
        items.iter_mut().for_each(LineItem::refresh_modified);
        self.working.items = items;
        self.touch(now_ms);
    }

    pub fn set_categories(&mut self, categories: Vec<Category>, now_ms: i64) {
        self.working.categories = categories;
        self.touch(now_ms);
    }

    // ---- saving ----

    /// Clock path: saves when the autosave delay has passed.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        if self.saving_until_ms.is_some_and(|until| now_ms >= until) {
            self.saving_until_ms = None;
        }
        match self.autosave.poll(now_ms) {
            Some(()) => self.persist(now_ms),
            None => false,
        }
    }

    /// Timer path: saves if `generation` is still the pending autosave.
    pub fn fire_autosave(&mut self, generation: u64, now_ms: i64) -> bool {
        match self.autosave.fire(generation) {
            Some(()) => self.persist(now_ms),
            None => false,
        }
    }

    pub fn save_now(&mut self, now_ms: i64) -> bool {
        self.autosave.cancel();
        match self.phase {
            DraftPhase::Uninitialized
            | DraftPhase::DraftPendingChoice
            | DraftPhase::SubmittedCleared => false,
            _ => self.persist(now_ms),
        }
    }

    fn persist(&mut self, now_ms: i64) -> bool {
        let now = to_datetime(now_ms);
        let draft = DraftDocument {
            owner_key: self.options.owner_key.clone(),
            content: self.working.clone(),
            created_at: self.created_at.unwrap_or(now),
            last_saved_at: now,
            server_revision_stamp: self.revision.clone(),
        };
        match self.store.set_draft(&self.options.owner_key, &draft) {
            Ok(()) => {
                self.created_at = Some(draft.created_at);
                self.last_saved_at = Some(now);
                self.has_unsaved_changes = false;
                self.saving_until_ms = Some(now_ms + i64::from(self.options.saving_indicator_ms));
                true
            }
            Err(e) => {
                log::warn!("draft: failed to save '{}': {}", self.options.owner_key, e);
                false
            }
        }
    }
}
