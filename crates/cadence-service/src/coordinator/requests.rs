//! Request payloads for coordinator operations. These carry raw codes and
//! person identifiers; the coordinator resolves descriptions and booking
//! references before anything touches the aggregate.

use chrono::{NaiveDate, NaiveTime};

use cadence_domain::model::{AppointmentEdit, AppointmentKind, CancellationReason, Tier};
use cadence_domain::recurrence::Schedule;

#[derive(Debug, Clone)]
pub struct CreateSeriesRequest {
    pub facility_code: String,
    pub kind: AppointmentKind,
    pub tier: Tier,
    pub organiser: Option<String>,
    pub category_code: String,
    pub custom_name: Option<String>,
    pub internal_location_id: Option<i64>,
    pub in_cell: bool,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub schedule: Option<Schedule>,
    pub extra_information: Option<String>,
    pub prisoner_numbers: Vec<String>,
    pub created_by: String,
}

/// One member of a batch of individually-booked one-off appointments.
#[derive(Debug, Clone)]
pub struct SetMemberRequest {
    pub prisoner_number: String,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub extra_information: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSetRequest {
    pub facility_code: String,
    pub tier: Tier,
    pub category_code: String,
    pub internal_location_id: Option<i64>,
    pub in_cell: bool,
    pub start_date: NaiveDate,
    pub members: Vec<SetMemberRequest>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub reason: CancellationReason,
    pub cancelled_by: String,
}

#[derive(Debug, Clone)]
pub struct UncancelRequest {
    pub updated_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub edit: AppointmentEdit,
    pub add_prisoner_numbers: Vec<String>,
    pub remove_prisoner_numbers: Vec<String>,
    pub removal_reason: Option<String>,
    pub updated_by: String,
}
