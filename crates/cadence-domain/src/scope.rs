//! Mutation-scope resolution: which occurrences a user-level edit, cancel or
//! uncancel touches. Resolved up front, before anything is mutated, so the
//! caller can size the work against the bulk threshold first.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::model::{Appointment, AppointmentSeries};

/// Which occurrences a mutation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationScope {
    ThisOccurrence,
    ThisAndAllFuture,
    AllFuture,
}

impl MutationScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThisOccurrence => "this_occurrence",
            Self::ThisAndAllFuture => "this_and_all_future",
            Self::AllFuture => "all_future",
        }
    }
}

impl std::fmt::Display for MutationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation being scoped. Uncancel requires the opposite starting
/// state to cancel, so resolution needs to know which one is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Edit,
    Cancel,
    Uncancel,
}

impl MutationKind {
    /// The verb used in validation messages and audit events.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Cancel => "cancel",
            Self::Uncancel => "uncancel",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action())
    }
}

/// ## Summary
/// Resolves `(target, scope, kind)` to the exact occurrence ids the mutation
/// must touch, in ascending sequence order.
///
/// The union set for range scopes is drawn from occurrences in the target's
/// own state: still-scheduled ones for edit and cancel, cancelled ones for
/// uncancel. `AllFuture` deliberately applies no positional filter, so it can
/// include matching occurrences that start before the target.
///
/// ## Errors
/// Returns a validation error, before anything is mutated, when the target
/// is deleted, is outside the edit window, or is in the wrong cancellation
/// state for the operation; not-found when the id is unknown.
pub fn resolve(
    series: &AppointmentSeries,
    target_id: Uuid,
    scope: MutationScope,
    kind: MutationKind,
    now: NaiveDateTime,
) -> DomainResult<Vec<Uuid>> {
    let target = series
        .occurrence(target_id)
        .ok_or_else(|| DomainError::NotFound(format!("Appointment {target_id}")))?;
    let action = kind.action();

    if target.is_deleted() {
        return Err(DomainError::ValidationError(format!(
            "Cannot {action} a deleted appointment"
        )));
    }
    if !target.is_editable(now) {
        return Err(DomainError::ValidationError(format!(
            "Cannot {action} an appointment more than 5 days ago"
        )));
    }
    match kind {
        MutationKind::Cancel if target.is_cancelled() => {
            return Err(DomainError::ValidationError(
                "Cannot cancel an already cancelled appointment".to_string(),
            ));
        }
        MutationKind::Uncancel if !target.is_cancelled() => {
            return Err(DomainError::ValidationError(
                "Cannot uncancel an appointment that has not been cancelled".to_string(),
            ));
        }
        MutationKind::Edit if target.is_cancelled() => {
            return Err(DomainError::ValidationError(
                "Cannot edit a cancelled appointment".to_string(),
            ));
        }
        _ => {}
    }

    let matching_state: Vec<&Appointment> = if target.is_cancelled() {
        series.cancelled_occurrences()
    } else {
        series.scheduled_occurrences(now)
    };

    let mut selected: Vec<&Appointment> = match scope {
        MutationScope::ThisOccurrence => vec![target],
        MutationScope::ThisAndAllFuture => {
            let mut selected = vec![target];
            selected.extend(
                matching_state
                    .into_iter()
                    .filter(|o| o.start_date_time() > target.start_date_time()),
            );
            selected
        }
        MutationScope::AllFuture => {
            let mut selected = vec![target];
            selected.extend(matching_state.into_iter().filter(|o| o.id != target.id));
            selected
        }
    };

    selected.sort_by_key(|o| o.sequence_number);
    tracing::trace!(
        target_id = %target_id,
        scope = %scope,
        kind = %kind,
        affected = selected.len(),
        "Resolved mutation scope"
    );
    Ok(selected.into_iter().map(|o| o.id).collect())
}
