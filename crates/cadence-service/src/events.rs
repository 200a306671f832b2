//! Audit events describing completed mutations. Events are collected while
//! an operation runs and flushed only after the repository save succeeds,
//! so a failed save never announces itself.

use chrono::NaiveDateTime;
use uuid::Uuid;

use cadence_domain::scope::MutationScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationAction {
    SeriesCreated,
    SetCreated,
    Updated,
    Cancelled,
    Uncancelled,
}

impl MutationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeriesCreated => "series_created",
            Self::SetCreated => "set_created",
            Self::Updated => "updated",
            Self::Cancelled => "cancelled",
            Self::Uncancelled => "uncancelled",
        }
    }
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event per logical user action, regardless of how many occurrences the
/// action fanned out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    /// The series (or set) the action applied to.
    pub subject_id: Uuid,
    pub action: MutationAction,
    /// Absent for create actions, which have no scope selector.
    pub scope: Option<MutationScope>,
    pub affected_occurrences: usize,
    pub occurred_at: NaiveDateTime,
}

/// Pending events held back until the transaction that produced them has
/// been committed.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<MutationEvent>,
}

impl PendingEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: MutationEvent) {
        self.events.push(event);
    }

    /// Drains the pending list for flushing.
    pub fn take(&mut self) -> Vec<MutationEvent> {
        std::mem::take(&mut self.events)
    }
}
