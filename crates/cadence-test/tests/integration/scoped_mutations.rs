//! Scoped cancel, uncancel and update through the coordinator, all below
//! the bulk threshold so everything completes synchronously.

use cadence_test::adapters::harness;
use cadence_test::component::config::Settings;
use cadence_test::component::coordinator::{CancelRequest, UncancelRequest, UpdateRequest};
use cadence_test::component::error::ServiceError;
use cadence_test::component::events::MutationAction;
use cadence_test::component::model::{AppointmentEdit, CancellationReason, LocationUpdate};
use cadence_test::component::scope::MutationScope;

use crate::helpers::future_weekly_series;

fn cancel_request() -> CancelRequest {
    CancelRequest {
        reason: CancellationReason::cancelled("Staff shortage"),
        cancelled_by: "USER2".to_string(),
    }
}

#[test_log::test(tokio::test)]
async fn cancel_this_and_all_future_cancels_the_tail_and_stamps_the_series() {
    let harness = harness(Settings::default());
    let series = future_weekly_series(4, &[("A1234BC", 10001)]);
    let target = series.occurrences()[1].id;
    let target_date = series.occurrences()[1].date;
    harness.store.insert_series(series.clone());

    let summary = harness
        .coordinator
        .cancel(target, MutationScope::ThisAndAllFuture, cancel_request())
        .await
        .expect("cancel");

    assert!(summary.completed_synchronously);
    assert_eq!(summary.affected_occurrence_ids.len(), 3);

    let stored = harness.store.series_by_id(series.id).expect("stored");
    let cancelled: Vec<_> = stored
        .cancelled_occurrences()
        .iter()
        .map(|o| o.sequence_number)
        .collect();
    assert_eq!(cancelled, vec![2, 3, 4]);
    assert!(!stored.occurrences()[0].is_cancelled());

    let stamp = stored.cancellation().expect("series stamped");
    assert_eq!(stamp.start_date, target_date);
    assert_eq!(stamp.cancelled_by, "USER2");

    let events = harness.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, MutationAction::Cancelled);
    assert_eq!(events[0].scope, Some(MutationScope::ThisAndAllFuture));
    assert_eq!(events[0].affected_occurrences, 3);
}

#[test_log::test(tokio::test)]
async fn cancelling_an_already_cancelled_occurrence_is_rejected() {
    let harness = harness(Settings::default());
    let series = future_weekly_series(4, &[("A1234BC", 10001)]);
    let target = series.occurrences()[1].id;
    harness.store.insert_series(series.clone());

    harness
        .coordinator
        .cancel(target, MutationScope::ThisOccurrence, cancel_request())
        .await
        .expect("first cancel");

    let error = harness
        .coordinator
        .cancel(target, MutationScope::ThisAndAllFuture, cancel_request())
        .await
        .expect_err("second cancel");
    assert!(matches!(error, ServiceError::DomainError(_)));
    assert_eq!(
        error.to_string(),
        "Validation error: Cannot cancel an already cancelled appointment"
    );

    // Only the first action produced an event, and the rest of the series
    // is untouched.
    assert_eq!(harness.events.events().len(), 1);
    let stored = harness.store.series_by_id(series.id).expect("stored");
    assert_eq!(stored.cancelled_occurrences().len(), 1);
}

#[test_log::test(tokio::test)]
async fn uncancel_all_future_restores_the_cancelled_occurrences() {
    let harness = harness(Settings::default());
    let series = future_weekly_series(4, &[("A1234BC", 10001)]);
    let target = series.occurrences()[1].id;
    harness.store.insert_series(series.clone());

    harness
        .coordinator
        .cancel(target, MutationScope::ThisAndAllFuture, cancel_request())
        .await
        .expect("cancel");

    let summary = harness
        .coordinator
        .uncancel(
            target,
            MutationScope::AllFuture,
            UncancelRequest {
                updated_by: "USER3".to_string(),
            },
        )
        .await
        .expect("uncancel");
    assert_eq!(summary.affected_occurrence_ids.len(), 3);

    let stored = harness.store.series_by_id(series.id).expect("stored");
    assert!(stored.cancelled_occurrences().is_empty());
    assert!(stored.cancellation().is_none(), "series stamp cleared");

    let actions: Vec<_> = harness.events.events().iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![MutationAction::Cancelled, MutationAction::Uncancelled]);
}

#[test_log::test(tokio::test)]
async fn update_applies_field_changes_and_attendee_changes_to_the_scope() {
    let harness = harness(Settings::default());
    harness.identity.insert("B2345CD", 10002);
    let series = future_weekly_series(3, &[("A1234BC", 10001)]);
    let target = series.occurrences()[0].id;
    harness.store.insert_series(series.clone());

    let summary = harness
        .coordinator
        .update(
            target,
            MutationScope::ThisAndAllFuture,
            UpdateRequest {
                edit: AppointmentEdit {
                    location: Some(LocationUpdate::InCell),
                    ..AppointmentEdit::default()
                },
                add_prisoner_numbers: vec!["B2345CD".to_string()],
                remove_prisoner_numbers: vec!["A1234BC".to_string()],
                removal_reason: None,
                updated_by: "USER4".to_string(),
            },
        )
        .await
        .expect("update");
    assert_eq!(summary.affected_occurrence_ids.len(), 3);

    let stored = harness.store.series_by_id(series.id).expect("stored");
    for occurrence in stored.occurrences() {
        assert!(occurrence.in_cell);
        let live: Vec<_> = occurrence.live_attendees().collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].prisoner_number, "B2345CD");
        assert_eq!(occurrence.updated_by.as_deref(), Some("USER4"));
    }
}
