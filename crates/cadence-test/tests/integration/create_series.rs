//! Series creation through the coordinator: full materialization, attendee
//! booking, denormalization and its degradation.

use std::sync::Arc;

use cadence_test::adapters::{FailingReferenceData, harness, harness_with_reference_data};
use cadence_test::component::config::Settings;
use cadence_test::component::coordinator::CreateSeriesRequest;
use cadence_test::component::events::MutationAction;
use cadence_test::component::model::{AppointmentKind, Tier};
use cadence_test::component::recurrence::{Frequency, Schedule};

use crate::helpers::{at, date, time};

fn weekly_request(count: u32, prisoner_numbers: Vec<String>) -> CreateSeriesRequest {
    CreateSeriesRequest {
        facility_code: "LEI".to_string(),
        kind: AppointmentKind::Group,
        tier: Tier::Tier1,
        organiser: None,
        category_code: "CHAP".to_string(),
        custom_name: None,
        internal_location_id: Some(5),
        in_cell: false,
        start_date: date(2024, 1, 1),
        start_time: time(9, 0),
        end_time: Some(time(10, 0)),
        schedule: Some(Schedule::new(Frequency::Weekly, count)),
        extra_information: None,
        prisoner_numbers,
        created_by: "USER1".to_string(),
    }
}

#[test_log::test(tokio::test)]
async fn weekly_series_materializes_every_occurrence_with_its_attendee() {
    let harness = harness(Settings::default());
    harness.identity.insert("A1234BC", 10001);

    let series = harness
        .coordinator
        .create_series(weekly_request(3, vec!["A1234BC".to_string()]))
        .await
        .expect("create series");

    let dates: Vec<_> = series.occurrences().iter().map(|o| o.date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]);

    let now = at(2023, 12, 31, 12, 0);
    for occurrence in series.occurrences() {
        assert!(occurrence.is_scheduled(now));
        let attendees: Vec<_> = occurrence.live_attendees().collect();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].prisoner_number, "A1234BC");
        assert_eq!(attendees[0].booking_id, 10001);
    }

    // Denormalized snapshots come from reference data.
    assert_eq!(series.occurrences()[0].category_description, "CHAP category");
    assert_eq!(series.occurrences()[0].location_description, "Room 5");

    // The aggregate is persisted and no background job was needed.
    let stored = harness.store.series_by_id(series.id).expect("stored");
    assert_eq!(stored.occurrences().len(), 3);
    assert!(harness.store.jobs().is_empty());

    // One structured event for the one logical action.
    let events = harness.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, MutationAction::SeriesCreated);
    assert_eq!(events[0].subject_id, series.id);
    assert_eq!(events[0].affected_occurrences, 3);
    assert_eq!(events[0].scope, None);
}

#[test_log::test(tokio::test)]
async fn attendee_without_a_booking_is_skipped_not_fatal() {
    let harness = harness(Settings::default());
    harness.identity.insert("A1234BC", 10001);
    // "Z9999ZZ" has no booking.

    let series = harness
        .coordinator
        .create_series(weekly_request(
            2,
            vec!["A1234BC".to_string(), "Z9999ZZ".to_string()],
        ))
        .await
        .expect("create series");

    for occurrence in series.occurrences() {
        assert_eq!(occurrence.live_attendee_count(), 1);
    }
    let messages = harness.monitoring.messages();
    assert!(messages.iter().any(|m| m.contains("Z9999ZZ")), "{messages:?}");
}

#[test_log::test(tokio::test)]
async fn reference_data_failures_degrade_descriptions_only() {
    let harness =
        harness_with_reference_data(Settings::default(), Arc::new(FailingReferenceData));
    harness.identity.insert("A1234BC", 10001);

    let series = harness
        .coordinator
        .create_series(weekly_request(2, vec!["A1234BC".to_string()]))
        .await
        .expect("create series despite reference data being down");

    assert_eq!(series.occurrences()[0].category_description, "CHAP");
    assert_eq!(series.occurrences()[0].location_description, "Location 5");
}

#[test_log::test(tokio::test)]
async fn individual_series_rejects_multiple_attendees_up_front() {
    let harness = harness(Settings::default());
    harness.identity.insert("A1234BC", 10001);
    harness.identity.insert("B2345CD", 10002);

    let mut request = weekly_request(2, vec!["A1234BC".to_string(), "B2345CD".to_string()]);
    request.kind = AppointmentKind::Individual;

    let error = harness
        .coordinator
        .create_series(request)
        .await
        .expect_err("individual series with two attendees");
    assert!(error.to_string().contains("individual"));

    // Nothing was created.
    assert!(harness.events.events().is_empty());
}
