//! Leptos-обвязка над [`DraftReconciler`] для формы заявки.

use std::rc::Rc;

use contracts::shared::draft::{Category, LineItem, LineItemKey, SubmissionData};
use gloo_timers::callback::Interval;
use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;

use super::reconciler::{
    DraftNotice, DraftOptions, DraftPhase, DraftReconciler, ReconcileOutcome, ServerSnapshot,
};
use crate::shared::clock::{now_ms, to_datetime};
use crate::shared::draft_store::LocalDraftStore;

type Core = DraftReconciler<Rc<dyn LocalDraftStore>>;

/// Copyable handle to the draft of one order form.
#[derive(Clone, Copy)]
pub struct DraftHandle {
    core: StoredValue<Core, LocalStorage>,
    version: RwSignal<u64>,
    /// Ticks so that "saved 5 minutes ago" stays current
    now: RwSignal<i64>,
}

fn bump(version: RwSignal<u64>) {
    version.try_update(|v| *v = v.wrapping_add(1));
}

pub fn use_draft_reconciler(options: DraftOptions, store: Rc<dyn LocalDraftStore>) -> DraftHandle {
    let refresh_ms = options.relative_time_refresh_ms;
    let core = StoredValue::new_local(DraftReconciler::new(options, store));
    let version = RwSignal::new(0_u64);
    let now = RwSignal::new(now_ms());

    let ticker = Interval::new(refresh_ms, move || {
        now.try_set(now_ms());
    });
    // Cancelled when the owner drops it
    let _ticker = StoredValue::new_local(ticker);

    DraftHandle { core, version, now }
}

impl DraftHandle {
    fn read<R>(&self, f: impl FnOnce(&Core) -> R) -> R {
        self.version.track();
        self.core.with_value(f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Core) -> R) -> Option<R> {
        let result = self.core.try_update_value(f);
        if result.is_some() {
            bump(self.version);
        }
        result
    }

    /// Mutation followed by arming the autosave timer.
    fn edit<R>(&self, f: impl FnOnce(&mut Core, i64) -> R) -> Option<R> {
        let result = self.write(|c| f(c, now_ms()));
        self.arm_autosave();
        result
    }

    fn arm_autosave(&self) {
        let Some(Some((generation, delay_ms))) = self.core.try_with_value(|c| {
            c.pending_autosave()
                .map(|generation| (generation, c.options().autosave_delay_ms))
        }) else {
            return;
        };
        let handle = *self;
        spawn_local(async move {
            TimeoutFuture::new(delay_ms).await;
            let saved = handle
                .core
                .try_update_value(|c| c.fire_autosave(generation, now_ms()));
            if saved == Some(true) {
                bump(handle.version);
                handle.hide_indicator_later();
            }
        });
    }

    fn hide_indicator_later(&self) {
        let Some(indicator_ms) = self.core.try_with_value(|c| c.options().saving_indicator_ms) else {
            return;
        };
        let version = self.version;
        spawn_local(async move {
            TimeoutFuture::new(indicator_ms).await;
            bump(version);
        });
    }

    // ---- lifecycle ----

    /// Call when server data arrives; only the first non-empty snapshot counts.
    pub fn reconcile(&self, server: ServerSnapshot) -> ReconcileOutcome {
        self.write(|c| {
            if c.phase() == DraftPhase::Uninitialized {
                c.reconcile(server)
            } else {
                c.update_server_snapshot(server);
                ReconcileOutcome::AlreadyReconciled
            }
        })
        .unwrap_or(ReconcileOutcome::Skipped)
    }

    pub fn resume_draft(&self) -> bool {
        self.write(|c| c.resume_draft()).unwrap_or(false)
    }

    pub fn discard_draft(&self) {
        self.write(|c| c.discard_draft());
    }

    pub fn clear_draft_after_submit(&self) {
        self.write(|c| c.clear_draft_after_submit());
    }

    pub fn save_now(&self) -> bool {
        let saved = self.write(|c| c.save_now(now_ms())).unwrap_or(false);
        if saved {
            self.hide_indicator_later();
        }
        saved
    }

    pub fn take_notice(&self) -> Option<DraftNotice> {
        self.write(|c| c.take_notice()).flatten()
    }

    // ---- edits ----

    pub fn add_item(&self, item: LineItem) {
        self.edit(|c, now| c.add_item(item, now));
    }

    pub fn update_quantity(&self, key: &LineItemKey, quantity: f64) -> bool {
        self.edit(|c, now| c.update_quantity(key, quantity, now))
            .unwrap_or(false)
    }

    pub fn update_item_comment(&self, key: &LineItemKey, comment: &str) -> bool {
        self.edit(|c, now| c.update_item_comment(key, comment, now))
            .unwrap_or(false)
    }

    pub fn delete_item(&self, key: &LineItemKey) -> bool {
        self.edit(|c, now| c.delete_item(key, now)).unwrap_or(false)
    }

    pub fn undo_delete(&self) -> Option<LineItem> {
        self.edit(|c, now| c.undo_delete(now)).flatten()
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        let comment = comment.into();
        self.edit(|c, now| c.set_comment(comment, now));
    }

    pub fn replace_items(&self, items: Vec<LineItem>) {
        self.edit(|c, now| c.replace_items(items, now));
    }

    pub fn set_categories(&self, categories: Vec<Category>) {
        self.edit(|c, now| c.set_categories(categories, now));
    }

    // ---- reads ----

    pub fn items(&self) -> Vec<LineItem> {
        self.read(|c| c.items().to_vec())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.read(|c| c.categories().to_vec())
    }

    pub fn comment(&self) -> String {
        self.read(|c| c.comment().to_string())
    }

    pub fn can_undo(&self) -> bool {
        self.read(|c| c.can_undo())
    }

    pub fn phase(&self) -> DraftPhase {
        self.read(|c| c.phase())
    }

    pub fn is_using_draft(&self) -> bool {
        self.read(|c| c.is_using_draft())
    }

    pub fn has_pending_choice(&self) -> bool {
        self.read(|c| c.phase() == DraftPhase::DraftPendingChoice)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.read(|c| c.has_unsaved_changes())
    }

    pub fn notice(&self) -> Option<DraftNotice> {
        self.read(|c| c.notice())
    }

    pub fn is_saving(&self) -> bool {
        self.read(|c| c.is_saving(now_ms()))
    }

    pub fn last_saved_label(&self) -> Option<String> {
        self.now.track();
        let now = to_datetime(now_ms());
        self.read(|c| c.last_saved_label(now))
    }

    pub fn submission(&self) -> SubmissionData {
        self.read(|c| c.submission())
    }
}
