#![allow(dead_code, clippy::expect_used)]
//! Shared fixtures for integration tests.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use cadence_test::component::model::{
    AppointmentKind, AppointmentSeries, NewAppointmentSeries, Tier,
};
use cadence_test::component::recurrence::{Frequency, Schedule};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(year, month, day).and_time(time(hour, minute))
}

/// A weekly group series starting Monday 2030-01-07, far enough out that
/// every occurrence stays inside the edit window for years. Every attendee
/// is booked onto every occurrence.
pub fn future_weekly_series(count: u32, attendees: &[(&str, i64)]) -> AppointmentSeries {
    let created = at(2029, 12, 1, 10, 0);
    let mut series = AppointmentSeries::create(
        NewAppointmentSeries {
            facility_code: "LEI".to_string(),
            kind: AppointmentKind::Group,
            tier: Tier::Tier1,
            organiser: None,
            category_code: "GYMW".to_string(),
            category_description: "Gym - Weights".to_string(),
            custom_name: None,
            internal_location_id: Some(14),
            location_description: "Gym".to_string(),
            in_cell: false,
            start_date: date(2030, 1, 7),
            start_time: time(9, 0),
            end_time: Some(time(10, 0)),
            schedule: Some(Schedule::new(Frequency::Weekly, count)),
            extra_information: None,
        },
        created,
        "USER1",
    )
    .expect("create series");

    for sequence_number in 2..=count {
        let occurrence = series.materialize(sequence_number);
        series.add_occurrence(occurrence);
    }

    let occurrence_ids: Vec<_> = series.occurrences().iter().map(|o| o.id).collect();
    for occurrence_id in occurrence_ids {
        for (prisoner_number, booking_id) in attendees {
            series
                .add_attendee(occurrence_id, prisoner_number, *booking_id, created, "USER1")
                .expect("add attendee")
                .expect("attendee inserted");
        }
    }
    series
}

/// Polls until the condition holds. Background jobs are fire-and-forget, so
/// tests observe their effects by re-querying the store.
pub async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {description}");
}
