use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

use super::attendee::AppointmentAttendee;

/// Occurrences stay editable for this long after they start: a five day
/// grace window plus the day itself.
const EDITABLE_DAYS_IN_PAST: i64 = 6;

/// Whether a series books one person or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppointmentKind {
    Individual,
    Group,
}

/// Tier designation copied onto every occurrence at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Tier1,
    Tier2,
    Foundation,
}

impl Tier {
    /// Only tier 2 events carry an organiser.
    #[must_use]
    pub const fn allows_organiser(self) -> bool {
        matches!(self, Self::Tier2)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "tier_1",
            Self::Tier2 => "tier_2",
            Self::Foundation => "foundation",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an occurrence was cancelled. `is_delete` marks "booked in error":
/// the occurrence is then reported as deleted rather than cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReason {
    pub description: String,
    pub is_delete: bool,
}

impl CancellationReason {
    #[must_use]
    pub fn cancelled(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_delete: false,
        }
    }

    #[must_use]
    pub fn booked_in_error() -> Self {
        Self {
            description: "Booked in error".to_string(),
            is_delete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationUpdate {
    InCell,
    At { id: i64, description: String },
}

/// Field-level changes applied by an edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentEdit {
    pub category: Option<CategoryUpdate>,
    pub location: Option<LocationUpdate>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub extra_information: Option<String>,
}

impl AppointmentEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One concrete dated occurrence of a series.
///
/// Category, location, tier and organiser are denormalized copies taken when
/// the occurrence is created, so later edits to the series template never
/// rewrite history.
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    /// 1-based position within the series.
    pub sequence_number: u32,
    pub kind: AppointmentKind,
    pub category_code: String,
    pub category_description: String,
    pub tier: Tier,
    pub organiser: Option<String>,
    pub internal_location_id: Option<i64>,
    pub location_description: String,
    pub in_cell: bool,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub extra_information: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
    pub updated_by: Option<String>,
    pub(crate) cancelled_at: Option<NaiveDateTime>,
    pub(crate) cancelled_by: Option<String>,
    pub(crate) cancellation_reason: Option<CancellationReason>,
    pub(crate) deleted: bool,
    pub(crate) attendees: Vec<AppointmentAttendee>,
}

impl Appointment {
    #[must_use]
    pub fn start_date_time(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// In the future, not cancelled, not deleted.
    #[must_use]
    pub fn is_scheduled(&self, now: NaiveDateTime) -> bool {
        self.start_date_time() > now && !self.is_cancelled() && !self.deleted
    }

    /// Carries a cancellation stamp and was not hard-deleted. A deleted
    /// occurrence is reported as deleted, never as cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some() && !self.deleted
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Starts no more than six days before `now`.
    #[must_use]
    pub fn is_editable(&self, now: NaiveDateTime) -> bool {
        self.start_date_time() >= now - TimeDelta::days(EDITABLE_DAYS_IN_PAST)
    }

    #[must_use]
    pub fn cancelled_at(&self) -> Option<NaiveDateTime> {
        self.cancelled_at
    }

    #[must_use]
    pub fn cancellation_reason(&self) -> Option<&CancellationReason> {
        self.cancellation_reason.as_ref()
    }

    #[must_use]
    pub fn attendees(&self) -> &[AppointmentAttendee] {
        &self.attendees
    }

    /// Attendee records that are neither removed nor soft-deleted.
    pub fn live_attendees(&self) -> impl Iterator<Item = &AppointmentAttendee> {
        self.attendees.iter().filter(|a| a.is_live())
    }

    #[must_use]
    pub fn live_attendee_count(&self) -> usize {
        self.live_attendees().count()
    }

    /// ## Summary
    /// Stamps the occurrence as cancelled. A reason flagged `is_delete`
    /// additionally hard-deletes it.
    pub fn cancel(&mut self, reason: CancellationReason, now: NaiveDateTime, by: impl Into<String>) {
        self.deleted = reason.is_delete;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(by.into());
        self.cancellation_reason = Some(reason);
    }

    /// ## Summary
    /// Clears the cancellation stamp and records the edit.
    ///
    /// ## Errors
    /// Returns a validation error for a hard-deleted occurrence: those are
    /// gone for good and cannot be resurrected.
    pub fn uncancel(&mut self, now: NaiveDateTime, by: impl Into<String>) -> DomainResult<()> {
        if self.deleted {
            return Err(DomainError::ValidationError(
                "Cannot uncancel a deleted appointment".to_string(),
            ));
        }
        self.cancelled_at = None;
        self.cancelled_by = None;
        self.cancellation_reason = None;
        self.updated_at = Some(now);
        self.updated_by = Some(by.into());
        Ok(())
    }

    /// ## Summary
    /// Applies the populated fields of `edit` and records the edit stamp.
    pub fn apply_edit(&mut self, edit: &AppointmentEdit, now: NaiveDateTime, by: impl Into<String>) {
        if let Some(category) = &edit.category {
            self.category_code.clone_from(&category.code);
            self.category_description.clone_from(&category.description);
        }
        match &edit.location {
            Some(LocationUpdate::InCell) => {
                self.internal_location_id = None;
                self.location_description = "In cell".to_string();
                self.in_cell = true;
            }
            Some(LocationUpdate::At { id, description }) => {
                self.internal_location_id = Some(*id);
                self.location_description.clone_from(description);
                self.in_cell = false;
            }
            None => {}
        }
        if let Some(date) = edit.date {
            self.date = date;
        }
        if let Some(start_time) = edit.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = edit.end_time {
            self.end_time = Some(end_time);
        }
        if let Some(extra_information) = &edit.extra_information {
            self.extra_information = Some(extra_information.clone());
        }
        self.updated_at = Some(now);
        self.updated_by = Some(by.into());
    }

    /// ## Summary
    /// Adds a person to the occurrence, idempotently per person.
    ///
    /// A prior removed record for the person is soft-deleted before the new
    /// record is inserted. Returns `None`, without touching anything, when a
    /// live record already exists; that is a no-op signal, not an error.
    ///
    /// ## Errors
    /// Returns a validation error when adding a second person to an
    /// individual appointment.
    pub fn add_attendee(
        &mut self,
        prisoner_number: &str,
        booking_id: i64,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) -> DomainResult<Option<&AppointmentAttendee>> {
        if self
            .attendees
            .iter()
            .any(|a| a.is_live() && a.prisoner_number == prisoner_number)
        {
            return Ok(None);
        }

        if self.kind == AppointmentKind::Individual && self.live_attendee_count() > 0 {
            return Err(DomainError::ValidationError(
                "Cannot add a second attendee to an individual appointment".to_string(),
            ));
        }

        for attendee in &mut self.attendees {
            if attendee.prisoner_number == prisoner_number && attendee.is_removed() {
                attendee.mark_deleted();
            }
        }

        self.attendees
            .push(AppointmentAttendee::new(prisoner_number, booking_id, now, by));
        Ok(self.attendees.last())
    }

    /// ## Summary
    /// Marks every live record for the person as removed. Returns how many
    /// records were stamped; zero means the person was not attending.
    pub fn remove_attendee(
        &mut self,
        prisoner_number: &str,
        reason: &str,
        now: NaiveDateTime,
        by: &str,
    ) -> usize {
        let mut stamped = 0;
        for attendee in &mut self.attendees {
            if attendee.is_live() && attendee.prisoner_number == prisoner_number {
                attendee.mark_removed(reason, now, by);
                stamped += 1;
            }
        }
        stamped
    }
}
