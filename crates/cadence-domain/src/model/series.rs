use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::recurrence::Schedule;

use super::attendee::AppointmentAttendee;
use super::occurrence::{Appointment, AppointmentKind, Tier};

/// Template for a new series. Descriptions are resolved snapshots, captured
/// here so occurrences created later (including by a background job) carry
/// the same denormalized text.
#[derive(Debug, Clone)]
pub struct NewAppointmentSeries {
    pub facility_code: String,
    pub kind: AppointmentKind,
    pub tier: Tier,
    pub organiser: Option<String>,
    pub category_code: String,
    pub category_description: String,
    pub custom_name: Option<String>,
    pub internal_location_id: Option<i64>,
    pub location_description: String,
    pub in_cell: bool,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub schedule: Option<Schedule>,
    pub extra_information: Option<String>,
}

/// Series-level cancellation stamp. A cancellation is itself scoped: it
/// applies from the recorded occurrence start onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCancellation {
    pub cancelled_at: NaiveDateTime,
    pub cancelled_by: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
}

/// The aggregate root: recurrence template plus owned occurrences.
///
/// A series is never deleted, only cancelled. All occurrence and attendee
/// mutation goes through methods on this type.
#[derive(Debug, Clone)]
pub struct AppointmentSeries {
    pub id: Uuid,
    pub facility_code: String,
    pub kind: AppointmentKind,
    pub tier: Tier,
    pub category_code: String,
    pub category_description: String,
    pub custom_name: Option<String>,
    pub internal_location_id: Option<i64>,
    pub location_description: String,
    pub in_cell: bool,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub extra_information: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
    pub updated_at: Option<NaiveDateTime>,
    pub updated_by: Option<String>,
    organiser: Option<String>,
    schedule: Option<Schedule>,
    cancellation: Option<SeriesCancellation>,
    occurrences: Vec<Appointment>,
}

impl AppointmentSeries {
    /// ## Summary
    /// Creates a series with its first occurrence already attached.
    ///
    /// ## Errors
    /// Returns a validation error when an organiser is supplied for a series
    /// whose tier does not permit one.
    pub fn create(
        template: NewAppointmentSeries,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) -> DomainResult<Self> {
        let mut series = Self {
            id: Uuid::new_v4(),
            facility_code: template.facility_code,
            kind: template.kind,
            tier: template.tier,
            category_code: template.category_code,
            category_description: template.category_description,
            custom_name: template.custom_name,
            internal_location_id: template.internal_location_id,
            location_description: template.location_description,
            in_cell: template.in_cell,
            start_date: template.start_date,
            start_time: template.start_time,
            end_time: template.end_time,
            extra_information: template.extra_information,
            created_at: now,
            created_by: by.into(),
            updated_at: None,
            updated_by: None,
            organiser: None,
            schedule: template.schedule,
            cancellation: None,
            occurrences: Vec::new(),
        };
        series.set_organiser(template.organiser)?;
        let first = series.materialize(1);
        series.add_occurrence(first);
        Ok(series)
    }

    /// The effective recurrence rule: an absent rule means a single daily
    /// occurrence.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.schedule.unwrap_or_else(Schedule::one_off)
    }

    /// Lazy, finite, restartable expansion of the recurrence rule.
    pub fn recurrence_dates(&self) -> impl Iterator<Item = (u32, NaiveDate)> {
        self.schedule().dates(self.start_date)
    }

    /// ## Summary
    /// Builds the occurrence at `sequence_number` from the series template,
    /// snapshotting category, location, tier and organiser.
    #[must_use]
    pub fn materialize(&self, sequence_number: u32) -> Appointment {
        let date = crate::recurrence::occurrence_date(
            self.start_date,
            sequence_number,
            self.schedule().frequency,
        );
        Appointment {
            id: Uuid::new_v4(),
            sequence_number,
            kind: self.kind,
            category_code: self.category_code.clone(),
            category_description: self.category_description.clone(),
            tier: self.tier,
            organiser: self.organiser.clone(),
            internal_location_id: self.internal_location_id,
            location_description: self.location_description.clone(),
            in_cell: self.in_cell,
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            extra_information: self.extra_information.clone(),
            updated_at: None,
            updated_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            deleted: false,
            attendees: Vec::new(),
        }
    }

    /// Attaches an occurrence, keeping the collection in sequence order.
    pub fn add_occurrence(&mut self, occurrence: Appointment) {
        self.occurrences.push(occurrence);
        self.occurrences.sort_by_key(|o| o.sequence_number);
    }

    #[must_use]
    pub fn occurrences(&self) -> &[Appointment] {
        &self.occurrences
    }

    #[must_use]
    pub fn occurrence(&self, id: Uuid) -> Option<&Appointment> {
        self.occurrences.iter().find(|o| o.id == id)
    }

    pub(crate) fn occurrence_mut(&mut self, id: Uuid) -> Option<&mut Appointment> {
        self.occurrences.iter_mut().find(|o| o.id == id)
    }

    /// Occurrences still to come: future-dated, not cancelled, not deleted.
    #[must_use]
    pub fn scheduled_occurrences(&self, now: NaiveDateTime) -> Vec<&Appointment> {
        self.occurrences.iter().filter(|o| o.is_scheduled(now)).collect()
    }

    #[must_use]
    pub fn cancelled_occurrences(&self) -> Vec<&Appointment> {
        self.occurrences.iter().filter(|o| o.is_cancelled()).collect()
    }

    #[must_use]
    pub fn occurrences_starting_at_or_after(&self, from: NaiveDateTime) -> Vec<&Appointment> {
        self.occurrences
            .iter()
            .filter(|o| o.start_date_time() >= from)
            .collect()
    }

    #[must_use]
    pub fn organiser(&self) -> Option<&str> {
        self.organiser.as_deref()
    }

    /// ## Summary
    /// Sets or clears the organiser. Checked here, at assignment time, not
    /// at save time.
    ///
    /// ## Errors
    /// Returns a validation error when the series tier does not permit an
    /// organiser.
    pub fn set_organiser(&mut self, organiser: Option<String>) -> DomainResult<()> {
        if organiser.is_some() && !self.tier.allows_organiser() {
            return Err(DomainError::ValidationError(format!(
                "Cannot add an organiser to a {} appointment series",
                self.tier
            )));
        }
        self.organiser = organiser;
        Ok(())
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&SeriesCancellation> {
        self.cancellation.as_ref()
    }

    /// Stamps the series as cancelled from the given occurrence start onward.
    pub fn cancel_from(
        &mut self,
        start_date: NaiveDate,
        start_time: NaiveTime,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) {
        self.cancellation = Some(SeriesCancellation {
            cancelled_at: now,
            cancelled_by: by.into(),
            start_date,
            start_time,
        });
    }

    pub fn clear_cancellation(&mut self) {
        self.cancellation = None;
    }

    /// ## Summary
    /// Adds a person to one occurrence via the aggregate root. Idempotent
    /// per `(occurrence, person)`; see [`Appointment::add_attendee`].
    ///
    /// ## Errors
    /// Returns not-found for an unknown occurrence id and propagates the
    /// occurrence-level attendee validation.
    pub fn add_attendee(
        &mut self,
        occurrence_id: Uuid,
        prisoner_number: &str,
        booking_id: i64,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) -> DomainResult<Option<&AppointmentAttendee>> {
        let occurrence = self
            .occurrence_mut(occurrence_id)
            .ok_or_else(|| DomainError::NotFound(format!("Appointment {occurrence_id}")))?;
        occurrence.add_attendee(prisoner_number, booking_id, now, by)
    }

    /// ## Summary
    /// Removes a person from one occurrence via the aggregate root, marking
    /// every live record for them as removed.
    ///
    /// ## Errors
    /// Returns not-found for an unknown occurrence id.
    pub fn remove_attendee(
        &mut self,
        occurrence_id: Uuid,
        prisoner_number: &str,
        reason: &str,
        now: NaiveDateTime,
        by: &str,
    ) -> DomainResult<usize> {
        let occurrence = self
            .occurrence_mut(occurrence_id)
            .ok_or_else(|| DomainError::NotFound(format!("Appointment {occurrence_id}")))?;
        Ok(occurrence.remove_attendee(prisoner_number, reason, now, by))
    }

    /// Applies `mutate` to the occurrence with the given id.
    ///
    /// ## Errors
    /// Returns not-found for an unknown occurrence id; otherwise whatever
    /// `mutate` returns.
    pub fn with_occurrence_mut<T>(
        &mut self,
        occurrence_id: Uuid,
        mutate: impl FnOnce(&mut Appointment) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let occurrence = self
            .occurrence_mut(occurrence_id)
            .ok_or_else(|| DomainError::NotFound(format!("Appointment {occurrence_id}")))?;
        mutate(occurrence)
    }
}
