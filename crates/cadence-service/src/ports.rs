//! Collaborator interfaces consumed by the coordinator and job runner.
//!
//! Persistence, identity lookup, reference data, monitoring and audit
//! emission all live behind these narrow contracts. Attendee rows travel
//! with their owning occurrence; an occurrence save persists its attendee
//! records too.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use cadence_domain::model::{Appointment, AppointmentSeries, AppointmentSet};

use crate::events::MutationEvent;
use crate::job::Job;

/// An occurrence loaded outside its aggregate, paired with the id of the
/// series that owns it.
#[derive(Debug, Clone)]
pub struct OccurrenceRecord {
    pub series_id: Uuid,
    pub occurrence: Appointment,
}

#[async_trait]
pub trait SeriesRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AppointmentSeries>>;

    /// Loads the whole aggregate owning the given occurrence.
    async fn find_by_occurrence_id(&self, occurrence_id: Uuid)
    -> Result<Option<AppointmentSeries>>;

    async fn save(&self, series: &AppointmentSeries) -> Result<()>;

    async fn save_all(&self, series: &[AppointmentSeries]) -> Result<()>;
}

#[async_trait]
pub trait OccurrenceRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OccurrenceRecord>>;

    async fn save(&self, series_id: Uuid, occurrence: &Appointment) -> Result<()>;

    async fn save_all(&self, series_id: Uuid, occurrences: &[Appointment]) -> Result<()>;
}

#[async_trait]
pub trait SetRepository: Send + Sync {
    async fn save(&self, set: &AppointmentSet) -> Result<()>;

    /// Attaches a series to an already-saved set.
    async fn add_series(&self, set_id: Uuid, series: &AppointmentSeries) -> Result<()>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn save(&self, job: &Job) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<Job>>;
}

/// Reference-data lookups used only for denormalized descriptive text.
/// A failure here degrades the text, never the mutation.
#[async_trait]
pub trait ReferenceDataResolver: Send + Sync {
    async fn category_description(&self, code: &str) -> Result<String>;

    async fn location_description(&self, id: i64) -> Result<String>;

    async fn organiser_description(&self, code: &str) -> Result<String>;
}

/// Person-to-booking resolution. A failure is a hard error for that one
/// attendee and never aborts the rest of the batch.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn booking_id(&self, prisoner_number: &str) -> Result<i64>;
}

/// Best-effort failure reporting. Implementations must not block and their
/// own failures are ignored.
pub trait MonitoringSink: Send + Sync {
    fn capture(&self, message: &str);
}

/// Structured audit events, one per logical user action, emitted after the
/// persistence save. Fire-and-forget.
#[async_trait]
pub trait AuditEventSink: Send + Sync {
    async fn emit(&self, event: &MutationEvent) -> Result<()>;
}
