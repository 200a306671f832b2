//! In-memory implementations of the collaborator ports, plus a harness that
//! wires a coordinator to them. State sits behind plain mutexes so tests can
//! assert on it directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, bail};
use async_trait::async_trait;
use uuid::Uuid;

use cadence_core::config::Settings;
use cadence_domain::model::{Appointment, AppointmentSeries, AppointmentSet};
use cadence_service::coordinator::{BulkMutationCoordinator, CoordinatorContext};
use cadence_service::events::MutationEvent;
use cadence_service::job::{Job, JobRunner};
use cadence_service::ports::{
    AuditEventSink, IdentityResolver, JobRepository, MonitoringSink, OccurrenceRecord,
    OccurrenceRepository, ReferenceDataResolver, SeriesRepository, SetRepository,
};

/// Locks a mutex and recovers from poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            mutex.clear_poison();
            poisoned.into_inner()
        }
    }
}

/// Backing store shared by the series, occurrence, set and job repositories.
/// Saving a set also indexes its member series, so occurrence lookups work
/// across both aggregates.
#[derive(Default)]
pub struct InMemoryStore {
    series: Mutex<HashMap<Uuid, AppointmentSeries>>,
    sets: Mutex<HashMap<Uuid, AppointmentSet>>,
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryStore {
    /// Seeds a series directly, for tests that build aggregate state with
    /// the domain API instead of the coordinator.
    pub fn insert_series(&self, series: AppointmentSeries) {
        lock(&self.series).insert(series.id, series);
    }

    #[must_use]
    pub fn series_by_id(&self, id: Uuid) -> Option<AppointmentSeries> {
        lock(&self.series).get(&id).cloned()
    }

    #[must_use]
    pub fn set_by_id(&self, id: Uuid) -> Option<AppointmentSet> {
        lock(&self.sets).get(&id).cloned()
    }

    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        lock(&self.jobs).clone()
    }
}

#[async_trait]
impl SeriesRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AppointmentSeries>> {
        Ok(lock(&self.series).get(&id).cloned())
    }

    async fn find_by_occurrence_id(
        &self,
        occurrence_id: Uuid,
    ) -> Result<Option<AppointmentSeries>> {
        Ok(lock(&self.series)
            .values()
            .find(|series| series.occurrence(occurrence_id).is_some())
            .cloned())
    }

    async fn save(&self, series: &AppointmentSeries) -> Result<()> {
        lock(&self.series).insert(series.id, series.clone());
        Ok(())
    }

    async fn save_all(&self, series: &[AppointmentSeries]) -> Result<()> {
        let mut guard = lock(&self.series);
        for one in series {
            guard.insert(one.id, one.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl OccurrenceRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OccurrenceRecord>> {
        Ok(lock(&self.series).values().find_map(|series| {
            series.occurrence(id).map(|occurrence| OccurrenceRecord {
                series_id: series.id,
                occurrence: occurrence.clone(),
            })
        }))
    }

    async fn save(&self, series_id: Uuid, occurrence: &Appointment) -> Result<()> {
        let mut guard = lock(&self.series);
        let Some(series) = guard.get_mut(&series_id) else {
            bail!("series {series_id} not found");
        };
        if series.occurrence(occurrence.id).is_some() {
            series.with_occurrence_mut(occurrence.id, |existing| {
                *existing = occurrence.clone();
                Ok(())
            })?;
        } else {
            series.add_occurrence(occurrence.clone());
        }
        Ok(())
    }

    async fn save_all(&self, series_id: Uuid, occurrences: &[Appointment]) -> Result<()> {
        for occurrence in occurrences {
            OccurrenceRepository::save(self, series_id, occurrence).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SetRepository for InMemoryStore {
    async fn save(&self, set: &AppointmentSet) -> Result<()> {
        {
            let mut guard = lock(&self.series);
            for series in set.series() {
                guard.insert(series.id, series.clone());
            }
        }
        lock(&self.sets).insert(set.id, set.clone());
        Ok(())
    }

    async fn add_series(&self, set_id: Uuid, series: &AppointmentSeries) -> Result<()> {
        let mut guard = lock(&self.sets);
        let Some(set) = guard.get_mut(&set_id) else {
            bail!("set {set_id} not found");
        };
        set.add_series(series.clone());
        lock(&self.series).insert(series.id, series.clone());
        Ok(())
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn save(&self, job: &Job) -> Result<()> {
        lock(&self.jobs).push(job.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Job>> {
        Ok(lock(&self.jobs).clone())
    }
}

/// Reference data that answers every lookup with derived descriptive text.
#[derive(Default)]
pub struct StubReferenceData;

#[async_trait]
impl ReferenceDataResolver for StubReferenceData {
    async fn category_description(&self, code: &str) -> Result<String> {
        Ok(format!("{code} category"))
    }

    async fn location_description(&self, id: i64) -> Result<String> {
        Ok(format!("Room {id}"))
    }

    async fn organiser_description(&self, code: &str) -> Result<String> {
        Ok(format!("{code} organiser"))
    }
}

/// Reference data whose every lookup fails, for degradation tests.
#[derive(Default)]
pub struct FailingReferenceData;

#[async_trait]
impl ReferenceDataResolver for FailingReferenceData {
    async fn category_description(&self, _code: &str) -> Result<String> {
        bail!("reference data unavailable")
    }

    async fn location_description(&self, _id: i64) -> Result<String> {
        bail!("reference data unavailable")
    }

    async fn organiser_description(&self, _code: &str) -> Result<String> {
        bail!("reference data unavailable")
    }
}

/// Person-to-booking lookup backed by a fixed map. Unknown people fail,
/// which is how the real resolver behaves for someone not at the facility.
#[derive(Default)]
pub struct StubIdentityResolver {
    bookings: Mutex<HashMap<String, i64>>,
}

impl StubIdentityResolver {
    pub fn insert(&self, prisoner_number: &str, booking_id: i64) {
        lock(&self.bookings).insert(prisoner_number.to_string(), booking_id);
    }
}

#[async_trait]
impl IdentityResolver for StubIdentityResolver {
    async fn booking_id(&self, prisoner_number: &str) -> Result<i64> {
        match lock(&self.bookings).get(prisoner_number) {
            Some(booking_id) => Ok(*booking_id),
            None => bail!("no booking for {prisoner_number}"),
        }
    }
}

#[derive(Default)]
pub struct RecordingMonitoring {
    messages: Mutex<Vec<String>>,
}

impl RecordingMonitoring {
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl MonitoringSink for RecordingMonitoring {
    fn capture(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<MutationEvent>>,
}

impl RecordingEventSink {
    #[must_use]
    pub fn events(&self) -> Vec<MutationEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl AuditEventSink for RecordingEventSink {
    async fn emit(&self, event: &MutationEvent) -> Result<()> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

/// A coordinator wired to in-memory everything.
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<StubIdentityResolver>,
    pub monitoring: Arc<RecordingMonitoring>,
    pub events: Arc<RecordingEventSink>,
    pub coordinator: BulkMutationCoordinator,
}

#[must_use]
pub fn harness(settings: Settings) -> TestHarness {
    harness_with_reference_data(settings, Arc::new(StubReferenceData))
}

#[must_use]
pub fn harness_with_reference_data(
    settings: Settings,
    reference_data: Arc<dyn ReferenceDataResolver>,
) -> TestHarness {
    let store = Arc::new(InMemoryStore::default());
    let identity = Arc::new(StubIdentityResolver::default());
    let monitoring = Arc::new(RecordingMonitoring::default());
    let events = Arc::new(RecordingEventSink::default());
    let job_runner = Arc::new(JobRunner::new(
        Arc::clone(&store) as Arc<dyn JobRepository>,
        Arc::clone(&monitoring) as Arc<dyn MonitoringSink>,
        settings.jobs.extra_attempts,
    ));

    let coordinator = BulkMutationCoordinator::new(CoordinatorContext {
        series_repository: Arc::clone(&store) as Arc<dyn SeriesRepository>,
        occurrence_repository: Arc::clone(&store) as Arc<dyn OccurrenceRepository>,
        set_repository: Arc::clone(&store) as Arc<dyn SetRepository>,
        reference_data,
        identity: Arc::clone(&identity) as Arc<dyn IdentityResolver>,
        events: Arc::clone(&events) as Arc<dyn AuditEventSink>,
        monitoring: Arc::clone(&monitoring) as Arc<dyn MonitoringSink>,
        job_runner,
        settings,
    });

    TestHarness {
        store,
        identity,
        monitoring,
        events,
        coordinator,
    }
}

#[must_use]
pub fn harness_with_threshold(sync_instance_threshold: usize) -> TestHarness {
    let mut settings = Settings::default();
    settings.bulk.sync_instance_threshold = sync_instance_threshold;
    harness(settings)
}
