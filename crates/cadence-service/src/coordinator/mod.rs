//! The bulk-mutation coordinator: decides, per mutation, whether to execute
//! fully synchronously or to mutate the first occurrence inline and hand the
//! remainder to a background job. Bounds user-facing latency when a mutation
//! fans out across hundreds of occurrences and thousands of attendee rows.

mod create;
mod mutate;
mod requests;

pub use requests::{
    CancelRequest, CreateSeriesRequest, CreateSetRequest, SetMemberRequest, UncancelRequest,
    UpdateRequest,
};

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use cadence_core::config::Settings;

use crate::events::MutationEvent;
use crate::job::JobRunner;
use crate::ports::{
    AuditEventSink, IdentityResolver, MonitoringSink, OccurrenceRepository,
    ReferenceDataResolver, SeriesRepository, SetRepository,
};

/// Everything the coordinator needs. Collected into one context so
/// construction sites stay readable.
pub struct CoordinatorContext {
    pub series_repository: Arc<dyn SeriesRepository>,
    pub occurrence_repository: Arc<dyn OccurrenceRepository>,
    pub set_repository: Arc<dyn SetRepository>,
    pub reference_data: Arc<dyn ReferenceDataResolver>,
    pub identity: Arc<dyn IdentityResolver>,
    pub events: Arc<dyn AuditEventSink>,
    pub monitoring: Arc<dyn MonitoringSink>,
    pub job_runner: Arc<JobRunner>,
    pub settings: Settings,
}

/// What a mutation touched. When `completed_synchronously` is false, only
/// the first affected occurrence has been mutated so far; the rest complete
/// in the background and become visible by re-querying the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSummary {
    pub series_id: Uuid,
    pub affected_occurrence_ids: Vec<Uuid>,
    pub completed_synchronously: bool,
}

/// The wall-clock instant a mutation runs at, shared by every stamp and
/// predicate within that mutation.
fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub struct BulkMutationCoordinator {
    series_repository: Arc<dyn SeriesRepository>,
    occurrence_repository: Arc<dyn OccurrenceRepository>,
    set_repository: Arc<dyn SetRepository>,
    reference_data: Arc<dyn ReferenceDataResolver>,
    identity: Arc<dyn IdentityResolver>,
    events: Arc<dyn AuditEventSink>,
    monitoring: Arc<dyn MonitoringSink>,
    job_runner: Arc<JobRunner>,
    settings: Settings,
}

impl BulkMutationCoordinator {
    #[must_use]
    pub fn new(context: CoordinatorContext) -> Self {
        Self {
            series_repository: context.series_repository,
            occurrence_repository: context.occurrence_repository,
            set_repository: context.set_repository,
            reference_data: context.reference_data,
            identity: context.identity,
            events: context.events,
            monitoring: context.monitoring,
            job_runner: context.job_runner,
            settings: context.settings,
        }
    }

    fn sync_instance_threshold(&self) -> usize {
        self.settings.bulk.sync_instance_threshold
    }

    /// Resolves a category description, degrading to the raw code when the
    /// reference-data call fails.
    async fn describe_category(&self, code: &str) -> String {
        match self.reference_data.category_description(code).await {
            Ok(description) => description,
            Err(error) => {
                tracing::warn!(code, error = %error, "Falling back to the category code");
                code.to_string()
            }
        }
    }

    /// Resolves a location description, degrading to a generic label when
    /// the reference-data call fails.
    async fn describe_location(&self, internal_location_id: Option<i64>, in_cell: bool) -> String {
        if in_cell {
            return "In cell".to_string();
        }
        let Some(id) = internal_location_id else {
            return "Not specified".to_string();
        };
        match self.reference_data.location_description(id).await {
            Ok(description) => description,
            Err(error) => {
                tracing::warn!(location_id = id, error = %error, "Falling back to the location id");
                format!("Location {id}")
            }
        }
    }

    /// Resolves an organiser description for log output, degrading to the
    /// raw code when the reference-data call fails.
    async fn describe_organiser(&self, code: &str) -> String {
        match self.reference_data.organiser_description(code).await {
            Ok(description) => description,
            Err(error) => {
                tracing::warn!(code, error = %error, "Falling back to the organiser code");
                code.to_string()
            }
        }
    }

    /// Resolves every person to a booking reference. A person who cannot be
    /// resolved is skipped and reported; the rest of the batch continues.
    async fn resolve_bookings(&self, prisoner_numbers: &[String]) -> Vec<(String, i64)> {
        let mut bookings = Vec::with_capacity(prisoner_numbers.len());
        for prisoner_number in prisoner_numbers {
            match self.identity.booking_id(prisoner_number).await {
                Ok(booking_id) => bookings.push((prisoner_number.clone(), booking_id)),
                Err(error) => {
                    tracing::warn!(%prisoner_number, error = %error, "Skipping attendee without a booking");
                    self.monitoring
                        .capture(&format!("No booking found for {prisoner_number}"));
                }
            }
        }
        bookings
    }

    /// Emits pending events, after the save that produced them has
    /// committed. Emission failures are logged and swallowed.
    async fn flush_events(&self, events: Vec<MutationEvent>) {
        for event in events {
            if let Err(error) = self.events.emit(&event).await {
                tracing::warn!(action = %event.action, error = %error, "Failed to emit mutation event");
            }
        }
    }
}
