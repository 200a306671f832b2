//! Appointment sets: a batch of one-off individual appointments created as
//! a single auditable unit.

use cadence_test::adapters::{harness, harness_with_threshold};
use cadence_test::component::config::Settings;
use cadence_test::component::coordinator::{CreateSetRequest, SetMemberRequest};
use cadence_test::component::events::MutationAction;
use cadence_test::component::job::JobType;
use cadence_test::component::model::{AppointmentKind, Tier};

use crate::helpers::{date, time, wait_until};

fn member(prisoner_number: &str, hour: u32) -> SetMemberRequest {
    SetMemberRequest {
        prisoner_number: prisoner_number.to_string(),
        start_time: time(hour, 0),
        end_time: Some(time(hour, 30)),
        extra_information: None,
    }
}

fn set_request(members: Vec<SetMemberRequest>) -> CreateSetRequest {
    CreateSetRequest {
        facility_code: "LEI".to_string(),
        tier: Tier::Tier1,
        category_code: "MEDO".to_string(),
        internal_location_id: Some(8),
        in_cell: false,
        start_date: date(2030, 2, 4),
        members,
        created_by: "USER1".to_string(),
    }
}

#[test_log::test(tokio::test)]
async fn a_set_books_every_resolvable_member_and_skips_the_rest() {
    let harness = harness(Settings::default());
    harness.identity.insert("A1234BC", 10001);
    harness.identity.insert("B2345CD", 10002);
    // "Z9999ZZ" has no booking.

    let set = harness
        .coordinator
        .create_set(set_request(vec![
            member("A1234BC", 9),
            member("Z9999ZZ", 10),
            member("B2345CD", 11),
        ]))
        .await
        .expect("create set");

    assert_eq!(set.series().len(), 2);
    for series in set.series() {
        assert_eq!(series.kind, AppointmentKind::Individual);
        assert_eq!(series.occurrences().len(), 1);
        assert_eq!(series.occurrences()[0].live_attendee_count(), 1);
        assert_eq!(series.start_date, date(2030, 2, 4));
    }

    assert!(
        harness.monitoring.messages().iter().any(|m| m.contains("Z9999ZZ")),
        "the unresolvable member is reported"
    );

    let events = harness.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, MutationAction::SetCreated);
    assert_eq!(events[0].affected_occurrences, 2);
}

#[test_log::test(tokio::test)]
async fn a_large_set_creates_the_first_member_inline_and_the_rest_behind() {
    let harness = harness_with_threshold(1);
    harness.identity.insert("A1234BC", 10001);
    harness.identity.insert("B2345CD", 10002);
    harness.identity.insert("C3456DE", 10003);

    let set = harness
        .coordinator
        .create_set(set_request(vec![
            member("A1234BC", 9),
            member("B2345CD", 10),
            member("C3456DE", 11),
        ]))
        .await
        .expect("create set");

    assert_eq!(set.series().len(), 1, "only the first member is created inline");

    let set_id = set.id;
    wait_until("remaining set members to be created", || {
        harness
            .store
            .set_by_id(set_id)
            .is_some_and(|s| s.series().len() == 3)
    })
    .await;

    let jobs = harness.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, JobType::CreateRemainingSetMembers);
    assert!(jobs[0].successful);

    // Every member series is reachable for later scoped mutations too.
    let stored = harness.store.set_by_id(set_id).expect("stored");
    for series in stored.series() {
        assert_eq!(series.occurrences()[0].live_attendee_count(), 1);
    }
}
