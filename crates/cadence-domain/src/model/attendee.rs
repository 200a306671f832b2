use chrono::NaiveDateTime;
use uuid::Uuid;

/// One person's attendance record on one occurrence.
///
/// A record is "live" until it is removed; a removed record is only ever
/// soft-deleted, and only when the same person is re-added afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentAttendee {
    pub id: Uuid,
    pub prisoner_number: String,
    pub booking_id: i64,
    pub added_at: NaiveDateTime,
    pub added_by: String,
    pub removed_at: Option<NaiveDateTime>,
    pub removal_reason: Option<String>,
    pub removed_by: Option<String>,
    deleted: bool,
}

impl AppointmentAttendee {
    #[must_use]
    pub fn new(
        prisoner_number: impl Into<String>,
        booking_id: i64,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prisoner_number: prisoner_number.into(),
            booking_id,
            added_at: now,
            added_by: by.into(),
            removed_at: None,
            removal_reason: None,
            removed_by: None,
            deleted: false,
        }
    }

    /// Present, not removed, not soft-deleted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.deleted && self.removed_at.is_none()
    }

    #[must_use]
    pub fn is_removed(&self) -> bool {
        !self.deleted && self.removed_at.is_some()
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_removed(
        &mut self,
        reason: impl Into<String>,
        now: NaiveDateTime,
        by: impl Into<String>,
    ) {
        self.removed_at = Some(now);
        self.removal_reason = Some(reason.into());
        self.removed_by = Some(by.into());
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}
