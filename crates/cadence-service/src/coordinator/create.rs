//! Series and set creation, including the split path that materializes only
//! the first occurrence synchronously and leaves the rest to a background
//! job.

use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use cadence_domain::error::DomainError;
use cadence_domain::model::{
    Appointment, AppointmentKind, AppointmentSeries, AppointmentSet, NewAppointmentSeries, Tier,
};

use crate::error::ServiceResult;
use crate::events::{MutationAction, MutationEvent, PendingEvents};
use crate::job::{JobDefinition, JobType};
use crate::ports::{MonitoringSink, OccurrenceRepository, SeriesRepository, SetRepository};

use super::requests::{CreateSeriesRequest, CreateSetRequest, SetMemberRequest};
use super::BulkMutationCoordinator;

/// Everything a set-member series shares with its siblings, resolved once
/// so the background job never re-queries reference data.
#[derive(Debug, Clone)]
struct SetSeriesTemplate {
    facility_code: String,
    tier: Tier,
    category_code: String,
    category_description: String,
    internal_location_id: Option<i64>,
    location_description: String,
    in_cell: bool,
    start_date: NaiveDate,
    created_by: String,
}

impl BulkMutationCoordinator {
    /// ## Summary
    /// Creates an appointment series with its attendees.
    ///
    /// Below the bulk threshold every occurrence is materialized inline.
    /// Above it, only the first occurrence comes back materialized and a
    /// background job fills in the rest; callers observe the remainder by
    /// re-querying the series.
    ///
    /// ## Errors
    /// Returns validation errors from the aggregate (organiser tier gate,
    /// individual series with more than one attendee) and propagates
    /// persistence failures.
    #[tracing::instrument(skip(self, request), fields(
        facility = %request.facility_code,
        category = %request.category_code,
        attendees = request.prisoner_numbers.len()
    ))]
    pub async fn create_series(
        &self,
        request: CreateSeriesRequest,
    ) -> ServiceResult<AppointmentSeries> {
        let now = super::now();

        if request.kind == AppointmentKind::Individual && request.prisoner_numbers.len() > 1 {
            return Err(DomainError::ValidationError(
                "Cannot create an individual appointment series with more than one attendee"
                    .to_string(),
            )
            .into());
        }

        let category_description = self.describe_category(&request.category_code).await;
        let location_description = self
            .describe_location(request.internal_location_id, request.in_cell)
            .await;
        let bookings = self.resolve_bookings(&request.prisoner_numbers).await;

        let mut series = AppointmentSeries::create(
            NewAppointmentSeries {
                facility_code: request.facility_code,
                kind: request.kind,
                tier: request.tier,
                organiser: request.organiser,
                category_code: request.category_code,
                category_description,
                custom_name: request.custom_name,
                internal_location_id: request.internal_location_id,
                location_description,
                in_cell: request.in_cell,
                start_date: request.start_date,
                start_time: request.start_time,
                end_time: request.end_time,
                schedule: request.schedule,
                extra_information: request.extra_information,
            },
            now,
            request.created_by.as_str(),
        )?;

        if let Some(organiser) = series.organiser() {
            let organiser = self.describe_organiser(organiser).await;
            tracing::debug!(%organiser, "Series organiser resolved");
        }

        let schedule = series.schedule();
        let occurrence_count = usize::try_from(schedule.count).unwrap_or(usize::MAX);
        let instance_count = occurrence_count.saturating_mul(bookings.len());

        let first_id = series.occurrences()[0].id;
        for (prisoner_number, booking_id) in &bookings {
            series.add_attendee(
                first_id,
                prisoner_number,
                *booking_id,
                now,
                request.created_by.as_str(),
            )?;
        }

        let mut pending = PendingEvents::new();
        pending.record(MutationEvent {
            subject_id: series.id,
            action: MutationAction::SeriesCreated,
            scope: None,
            affected_occurrences: occurrence_count,
            occurred_at: now,
        });

        let fully_synchronous = instance_count <= self.sync_instance_threshold();
        if fully_synchronous {
            for sequence_number in 2..=schedule.count {
                let occurrence = materialize_with_attendees(
                    &series,
                    sequence_number,
                    &bookings,
                    now,
                    &request.created_by,
                );
                series.add_occurrence(occurrence);
            }
        } else {
            tracing::info!(
                series_id = %series.id,
                instance_count,
                threshold = self.sync_instance_threshold(),
                "Deferring remaining occurrences to a background job"
            );
        }

        self.series_repository
            .save(&series)
            .await
            .context("failed to save appointment series")?;

        if !fully_synchronous {
            self.job_runner.submit(create_remainder_job(
                Arc::clone(&self.series_repository),
                Arc::clone(&self.occurrence_repository),
                Arc::clone(&self.monitoring),
                series.id,
                (2..=schedule.count).collect(),
                bookings,
                request.created_by.clone(),
            ));
        }

        self.flush_events(pending.take()).await;
        Ok(series)
    }

    /// ## Summary
    /// Creates a batch of individually-booked one-off appointments as one
    /// set. Members whose booking reference cannot be resolved are skipped
    /// and reported; the rest of the batch continues.
    ///
    /// ## Errors
    /// Propagates aggregate validation and persistence failures.
    #[tracing::instrument(skip(self, request), fields(
        facility = %request.facility_code,
        category = %request.category_code,
        members = request.members.len()
    ))]
    pub async fn create_set(&self, request: CreateSetRequest) -> ServiceResult<AppointmentSet> {
        let now = super::now();

        let category_description = self.describe_category(&request.category_code).await;
        let location_description = self
            .describe_location(request.internal_location_id, request.in_cell)
            .await;

        let template = SetSeriesTemplate {
            facility_code: request.facility_code.clone(),
            tier: request.tier,
            category_code: request.category_code.clone(),
            category_description,
            internal_location_id: request.internal_location_id,
            location_description,
            in_cell: request.in_cell,
            start_date: request.start_date,
            created_by: request.created_by.clone(),
        };

        let mut viable = Vec::with_capacity(request.members.len());
        for member in request.members {
            match self.identity.booking_id(&member.prisoner_number).await {
                Ok(booking_id) => viable.push((member, booking_id)),
                Err(error) => {
                    tracing::warn!(
                        prisoner_number = %member.prisoner_number,
                        error = %error,
                        "Skipping set member without a booking"
                    );
                    self.monitoring.capture(&format!(
                        "No booking found for {}",
                        member.prisoner_number
                    ));
                }
            }
        }

        let mut set = AppointmentSet::new(
            request.facility_code,
            request.category_code,
            request.start_date,
            now,
            request.created_by.as_str(),
        );

        let instance_count = viable.len();
        let fully_synchronous = instance_count <= self.sync_instance_threshold();
        let synchronous_members = if fully_synchronous { viable.len() } else { 1 };

        for (member, booking_id) in viable.iter().take(synchronous_members) {
            let series = member_series(&template, member, *booking_id, now)?;
            set.add_series(series);
        }

        self.set_repository
            .save(&set)
            .await
            .context("failed to save appointment set")?;

        if !fully_synchronous {
            tracing::info!(
                set_id = %set.id,
                instance_count,
                threshold = self.sync_instance_threshold(),
                "Deferring remaining set members to a background job"
            );
            self.job_runner.submit(set_remainder_job(
                Arc::clone(&self.set_repository),
                Arc::clone(&self.monitoring),
                set.id,
                template,
                viable.split_off(synchronous_members),
            ));
        }

        self.flush_events(vec![MutationEvent {
            subject_id: set.id,
            action: MutationAction::SetCreated,
            scope: None,
            affected_occurrences: instance_count,
            occurred_at: now,
        }])
        .await;
        Ok(set)
    }
}

/// Builds the occurrence at `sequence_number` with the full attendee list.
/// Shared by the synchronous path and the background job so both produce
/// identical occurrences.
fn materialize_with_attendees(
    series: &AppointmentSeries,
    sequence_number: u32,
    bookings: &[(String, i64)],
    now: NaiveDateTime,
    by: &str,
) -> Appointment {
    let mut occurrence = series.materialize(sequence_number);
    for (prisoner_number, booking_id) in bookings {
        if let Err(error) = occurrence.add_attendee(prisoner_number, *booking_id, now, by) {
            tracing::warn!(
                %prisoner_number,
                sequence_number,
                error = %error,
                "Skipping attendee on materialized occurrence"
            );
        }
    }
    occurrence
}

/// One one-off individual series for a set member. Shared by the
/// synchronous path and the background job.
fn member_series(
    template: &SetSeriesTemplate,
    member: &SetMemberRequest,
    booking_id: i64,
    now: NaiveDateTime,
) -> ServiceResult<AppointmentSeries> {
    let mut series = AppointmentSeries::create(
        NewAppointmentSeries {
            facility_code: template.facility_code.clone(),
            kind: AppointmentKind::Individual,
            tier: template.tier,
            organiser: None,
            category_code: template.category_code.clone(),
            category_description: template.category_description.clone(),
            custom_name: None,
            internal_location_id: template.internal_location_id,
            location_description: template.location_description.clone(),
            in_cell: template.in_cell,
            start_date: template.start_date,
            start_time: member.start_time,
            end_time: member.end_time,
            schedule: None,
            extra_information: member.extra_information.clone(),
        },
        now,
        template.created_by.as_str(),
    )?;
    let occurrence_id = series.occurrences()[0].id;
    series.add_attendee(
        occurrence_id,
        &member.prisoner_number,
        booking_id,
        now,
        template.created_by.as_str(),
    )?;
    Ok(series)
}

/// Background continuation for a large series create: materialize and save
/// every remaining occurrence, one at a time, in ascending sequence order.
fn create_remainder_job(
    series_repository: Arc<dyn SeriesRepository>,
    occurrence_repository: Arc<dyn OccurrenceRepository>,
    monitoring: Arc<dyn MonitoringSink>,
    series_id: Uuid,
    remaining: Vec<u32>,
    bookings: Vec<(String, i64)>,
    created_by: String,
) -> JobDefinition {
    JobDefinition::new(JobType::CreateRemainingOccurrences, move || {
        let series_repository = Arc::clone(&series_repository);
        let occurrence_repository = Arc::clone(&occurrence_repository);
        let monitoring = Arc::clone(&monitoring);
        let remaining = remaining.clone();
        let bookings = bookings.clone();
        let created_by = created_by.clone();
        async move {
            let now = chrono::Utc::now().naive_utc();
            let series = series_repository
                .find_by_id(series_id)
                .await
                .context("failed to load appointment series")?
                .ok_or_else(|| anyhow::anyhow!("appointment series {series_id} not found"))?;

            for sequence_number in remaining {
                let occurrence = materialize_with_attendees(
                    &series,
                    sequence_number,
                    &bookings,
                    now,
                    &created_by,
                );
                if let Err(error) = occurrence_repository.save(series_id, &occurrence).await {
                    tracing::error!(
                        series_id = %series_id,
                        sequence_number,
                        error = %error,
                        "Failed to save materialized occurrence"
                    );
                    monitoring.capture(&format!(
                        "Failed to create occurrence {sequence_number} of series {series_id}: {error:#}"
                    ));
                }
            }
            Ok(())
        }
    })
}

/// Background continuation for a large set create.
fn set_remainder_job(
    set_repository: Arc<dyn SetRepository>,
    monitoring: Arc<dyn MonitoringSink>,
    set_id: Uuid,
    template: SetSeriesTemplate,
    remaining: Vec<(SetMemberRequest, i64)>,
) -> JobDefinition {
    JobDefinition::new(JobType::CreateRemainingSetMembers, move || {
        let set_repository = Arc::clone(&set_repository);
        let monitoring = Arc::clone(&monitoring);
        let template = template.clone();
        let remaining = remaining.clone();
        async move {
            let now = chrono::Utc::now().naive_utc();
            for (member, booking_id) in &remaining {
                let prisoner_number = member.prisoner_number.clone();
                let outcome = match member_series(&template, member, *booking_id, now) {
                    Ok(series) => set_repository.add_series(set_id, &series).await,
                    Err(error) => Err(anyhow::anyhow!(error)),
                };
                if let Err(error) = outcome {
                    tracing::error!(
                        set_id = %set_id,
                        %prisoner_number,
                        error = %error,
                        "Failed to create set member appointment"
                    );
                    monitoring.capture(&format!(
                        "Failed to create set member appointment for {prisoner_number}: {error:#}"
                    ));
                }
            }
            Ok(())
        }
    })
}
