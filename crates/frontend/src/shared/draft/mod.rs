pub mod hook;
pub mod reconciler;
pub mod relative_time;

pub use hook::{use_draft_reconciler, DraftHandle};
pub use reconciler::{
    DraftNotice, DraftOptions, DraftPhase, DraftReconciler, ReconcileOutcome, ServerSnapshot,
};
