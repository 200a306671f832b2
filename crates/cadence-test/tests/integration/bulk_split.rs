//! The bulk threshold: at the boundary everything runs synchronously; one
//! instance over it, only the first occurrence is mutated inline and a
//! single tracked job completes the remainder.

use cadence_test::adapters::harness_with_threshold;
use cadence_test::component::coordinator::{CancelRequest, CreateSeriesRequest};
use cadence_test::component::job::JobType;
use cadence_test::component::model::{AppointmentKind, CancellationReason, Tier};
use cadence_test::component::recurrence::{Frequency, Schedule};
use cadence_test::component::scope::MutationScope;

use crate::helpers::{date, future_weekly_series, time, wait_until};

fn two_attendee_request(count: u32) -> CreateSeriesRequest {
    CreateSeriesRequest {
        facility_code: "LEI".to_string(),
        kind: AppointmentKind::Group,
        tier: Tier::Tier1,
        organiser: None,
        category_code: "EDUC".to_string(),
        custom_name: None,
        internal_location_id: Some(27),
        in_cell: false,
        start_date: date(2030, 1, 7),
        start_time: time(13, 30),
        end_time: Some(time(14, 30)),
        schedule: Some(Schedule::new(Frequency::Weekly, count)),
        extra_information: None,
        prisoner_numbers: vec!["A1234BC".to_string(), "B2345CD".to_string()],
        created_by: "USER1".to_string(),
    }
}

#[test_log::test(tokio::test)]
async fn a_product_equal_to_the_threshold_runs_fully_synchronously() {
    // 3 occurrences x 2 attendees = 6 = threshold.
    let harness = harness_with_threshold(6);
    harness.identity.insert("A1234BC", 10001);
    harness.identity.insert("B2345CD", 10002);

    let series = harness
        .coordinator
        .create_series(two_attendee_request(3))
        .await
        .expect("create series");

    assert_eq!(series.occurrences().len(), 3);
    assert!(harness.store.jobs().is_empty(), "no background job at the threshold");
}

#[test_log::test(tokio::test)]
async fn one_instance_over_the_threshold_splits_into_a_background_job() {
    // 3 occurrences x 2 attendees = 6 = threshold + 1.
    let harness = harness_with_threshold(5);
    harness.identity.insert("A1234BC", 10001);
    harness.identity.insert("B2345CD", 10002);

    let series = harness
        .coordinator
        .create_series(two_attendee_request(3))
        .await
        .expect("create series");

    // The caller gets one concrete, fully-booked occurrence back.
    assert_eq!(series.occurrences().len(), 1);
    assert_eq!(series.occurrences()[0].live_attendee_count(), 2);

    let series_id = series.id;
    wait_until("remaining occurrences to be created", || {
        harness
            .store
            .series_by_id(series_id)
            .is_some_and(|s| s.occurrences().len() == 3)
    })
    .await;

    let stored = harness.store.series_by_id(series_id).expect("stored");
    let sequence_numbers: Vec<_> =
        stored.occurrences().iter().map(|o| o.sequence_number).collect();
    assert_eq!(sequence_numbers, vec![1, 2, 3]);
    for occurrence in stored.occurrences() {
        assert_eq!(occurrence.live_attendee_count(), 2);
    }

    let jobs = harness.store.jobs();
    assert_eq!(jobs.len(), 1, "exactly one background job");
    assert_eq!(jobs[0].job_type, JobType::CreateRemainingOccurrences);
    assert!(jobs[0].successful);
}

#[test_log::test(tokio::test)]
async fn a_bulk_cancel_mutates_the_first_occurrence_inline_and_the_rest_behind() {
    let harness = harness_with_threshold(1);
    let series = future_weekly_series(4, &[("A1234BC", 10001)]);
    let target = series.occurrences()[1].id;
    harness.store.insert_series(series.clone());

    let summary = harness
        .coordinator
        .cancel(
            target,
            MutationScope::ThisAndAllFuture,
            CancelRequest {
                reason: CancellationReason::cancelled("Regime change"),
                cancelled_by: "USER2".to_string(),
            },
        )
        .await
        .expect("cancel");

    // Three occurrences are affected but only the target was mutated inline;
    // the rest complete in the background.
    assert!(!summary.completed_synchronously);
    assert_eq!(summary.affected_occurrence_ids.len(), 3);

    wait_until("remaining occurrences to be cancelled", || {
        harness
            .store
            .series_by_id(series.id)
            .is_some_and(|s| s.cancelled_occurrences().len() == 3)
    })
    .await;

    let stored = harness.store.series_by_id(series.id).expect("stored");
    assert!(!stored.occurrences()[0].is_cancelled(), "occurrence 1 untouched");

    let jobs = harness.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, JobType::CancelRemainingOccurrences);
    assert!(jobs[0].successful);

    // Still one event for the one logical action.
    assert_eq!(harness.events.events().len(), 1);
    assert_eq!(harness.events.events()[0].affected_occurrences, 3);
}
