//! Scoped cancel, uncancel and update. The scope is resolved once, up
//! front, so the affected-instance count can be sized against the bulk
//! threshold before anything is mutated. The synchronous path and the
//! background remainder job apply the same [`OccurrenceMutation`], just with
//! different batch sizes.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDateTime;
use uuid::Uuid;

use cadence_domain::error::DomainResult;
use cadence_domain::model::{Appointment, AppointmentSeries};
use cadence_domain::scope::{self, MutationKind, MutationScope};

use crate::error::{ServiceError, ServiceResult};
use crate::events::{MutationAction, MutationEvent, PendingEvents};
use crate::job::{JobDefinition, JobType};
use crate::ports::{MonitoringSink, OccurrenceRepository};

use super::requests::{CancelRequest, UncancelRequest, UpdateRequest};
use super::{BulkMutationCoordinator, MutationSummary};

/// The per-occurrence semantics of one user-level mutation, shared verbatim
/// between the synchronous path and the background job.
#[derive(Debug, Clone)]
enum OccurrenceMutation {
    Cancel(CancelRequest),
    Uncancel(UncancelRequest),
    Update {
        request: UpdateRequest,
        /// Booking references resolved once, in the synchronous phase.
        added_bookings: Vec<(String, i64)>,
    },
}

impl OccurrenceMutation {
    const fn job_type(&self) -> JobType {
        match self {
            Self::Cancel(_) => JobType::CancelRemainingOccurrences,
            Self::Uncancel(_) => JobType::UncancelRemainingOccurrences,
            Self::Update { .. } => JobType::UpdateRemainingOccurrences,
        }
    }

    const fn kind(&self) -> MutationKind {
        match self {
            Self::Cancel(_) => MutationKind::Cancel,
            Self::Uncancel(_) => MutationKind::Uncancel,
            Self::Update { .. } => MutationKind::Edit,
        }
    }

    const fn action(&self) -> MutationAction {
        match self {
            Self::Cancel(_) => MutationAction::Cancelled,
            Self::Uncancel(_) => MutationAction::Uncancelled,
            Self::Update { .. } => MutationAction::Updated,
        }
    }

    fn apply(&self, occurrence: &mut Appointment, now: NaiveDateTime) -> DomainResult<()> {
        match self {
            Self::Cancel(request) => {
                occurrence.cancel(request.reason.clone(), now, request.cancelled_by.as_str());
                Ok(())
            }
            Self::Uncancel(request) => occurrence.uncancel(now, request.updated_by.as_str()),
            Self::Update {
                request,
                added_bookings,
            } => apply_update(occurrence, request, added_bookings, now),
        }
    }
}

fn apply_update(
    occurrence: &mut Appointment,
    request: &UpdateRequest,
    added_bookings: &[(String, i64)],
    now: NaiveDateTime,
) -> DomainResult<()> {
    occurrence.apply_edit(&request.edit, now, request.updated_by.as_str());
    for (prisoner_number, booking_id) in added_bookings {
        occurrence.add_attendee(prisoner_number, *booking_id, now, request.updated_by.as_str())?;
    }
    let reason = request
        .removal_reason
        .as_deref()
        .unwrap_or("Removed from appointment");
    for prisoner_number in &request.remove_prisoner_numbers {
        occurrence.remove_attendee(prisoner_number, reason, now, request.updated_by.as_str());
    }
    Ok(())
}

impl BulkMutationCoordinator {
    /// ## Summary
    /// Cancels the occurrences selected by `scope`. A range scope also
    /// stamps the series itself as cancelled from the target occurrence
    /// onward.
    ///
    /// ## Errors
    /// Returns the scope resolver's validation errors untouched (nothing is
    /// mutated on failure) and propagates persistence failures.
    #[tracing::instrument(skip(self, request), fields(occurrence_id = %occurrence_id, scope = %scope))]
    pub async fn cancel(
        &self,
        occurrence_id: Uuid,
        scope: MutationScope,
        request: CancelRequest,
    ) -> ServiceResult<MutationSummary> {
        self.execute_scoped(occurrence_id, scope, OccurrenceMutation::Cancel(request))
            .await
    }

    /// ## Summary
    /// Clears the cancellation on the occurrences selected by `scope`. A
    /// range scope also clears the series-level cancellation stamp.
    ///
    /// ## Errors
    /// Returns the scope resolver's validation errors untouched and
    /// propagates persistence failures.
    #[tracing::instrument(skip(self, request), fields(occurrence_id = %occurrence_id, scope = %scope))]
    pub async fn uncancel(
        &self,
        occurrence_id: Uuid,
        scope: MutationScope,
        request: UncancelRequest,
    ) -> ServiceResult<MutationSummary> {
        self.execute_scoped(occurrence_id, scope, OccurrenceMutation::Uncancel(request))
            .await
    }

    /// ## Summary
    /// Edits the occurrences selected by `scope`: field changes plus
    /// attendee additions and removals. Booking references for added people
    /// are resolved once, here, and reused by the background remainder.
    ///
    /// ## Errors
    /// Returns the scope resolver's validation errors untouched and
    /// propagates persistence failures.
    #[tracing::instrument(skip(self, request), fields(occurrence_id = %occurrence_id, scope = %scope))]
    pub async fn update(
        &self,
        occurrence_id: Uuid,
        scope: MutationScope,
        request: UpdateRequest,
    ) -> ServiceResult<MutationSummary> {
        let added_bookings = self.resolve_bookings(&request.add_prisoner_numbers).await;
        self.execute_scoped(
            occurrence_id,
            scope,
            OccurrenceMutation::Update {
                request,
                added_bookings,
            },
        )
        .await
    }

    async fn execute_scoped(
        &self,
        occurrence_id: Uuid,
        scope: MutationScope,
        mutation: OccurrenceMutation,
    ) -> ServiceResult<MutationSummary> {
        let now = super::now();

        let mut series = self
            .series_repository
            .find_by_occurrence_id(occurrence_id)
            .await
            .context("failed to load appointment series")?
            .ok_or_else(|| ServiceError::NotFound(format!("Appointment {occurrence_id}")))?;

        let affected = scope::resolve(&series, occurrence_id, scope, mutation.kind(), now)?;
        let instance_count: usize = affected
            .iter()
            .filter_map(|id| series.occurrence(*id))
            .map(Appointment::live_attendee_count)
            .sum();
        let target_start = series
            .occurrence(occurrence_id)
            .map(|o| (o.date, o.start_time));

        let split = instance_count > self.sync_instance_threshold();
        let synchronous_ids: &[Uuid] = if split { &affected[..1] } else { &affected };

        for id in synchronous_ids {
            series.with_occurrence_mut(*id, |occurrence| mutation.apply(occurrence, now))?;
        }
        apply_series_stamp(&mut series, &mutation, scope, target_start, now);

        if split {
            tracing::info!(
                series_id = %series.id,
                instance_count,
                threshold = self.sync_instance_threshold(),
                remaining = affected.len() - 1,
                "Deferring remaining occurrences to a background job"
            );
        }

        let mut pending = PendingEvents::new();
        pending.record(MutationEvent {
            subject_id: series.id,
            action: mutation.action(),
            scope: Some(scope),
            affected_occurrences: affected.len(),
            occurred_at: now,
        });

        self.series_repository
            .save(&series)
            .await
            .context("failed to save appointment series")?;

        if split {
            self.job_runner.submit(mutation_remainder_job(
                Arc::clone(&self.occurrence_repository),
                Arc::clone(&self.monitoring),
                affected[1..].to_vec(),
                mutation,
            ));
        }

        self.flush_events(pending.take()).await;
        Ok(MutationSummary {
            series_id: series.id,
            affected_occurrence_ids: affected,
            completed_synchronously: !split,
        })
    }
}

/// Range-scoped cancels and uncancels also stamp or clear the series-level
/// cancellation, with the target occurrence as the effective-from point.
fn apply_series_stamp(
    series: &mut AppointmentSeries,
    mutation: &OccurrenceMutation,
    scope: MutationScope,
    target_start: Option<(chrono::NaiveDate, chrono::NaiveTime)>,
    now: NaiveDateTime,
) {
    if scope == MutationScope::ThisOccurrence {
        return;
    }
    match mutation {
        OccurrenceMutation::Cancel(request) => {
            if let Some((date, time)) = target_start {
                series.cancel_from(date, time, now, request.cancelled_by.as_str());
            }
        }
        OccurrenceMutation::Uncancel(_) => series.clear_cancellation(),
        OccurrenceMutation::Update { .. } => {}
    }
}

/// Background continuation for a split mutation: re-resolve each remaining
/// occurrence by id, in ascending sequence order, and apply the same
/// mutation. One failing occurrence never stops the batch.
fn mutation_remainder_job(
    occurrence_repository: Arc<dyn OccurrenceRepository>,
    monitoring: Arc<dyn MonitoringSink>,
    remaining: Vec<Uuid>,
    mutation: OccurrenceMutation,
) -> JobDefinition {
    JobDefinition::new(mutation.job_type(), move || {
        let occurrence_repository = Arc::clone(&occurrence_repository);
        let monitoring = Arc::clone(&monitoring);
        let remaining = remaining.clone();
        let mutation = mutation.clone();
        async move {
            let now = chrono::Utc::now().naive_utc();
            for occurrence_id in remaining {
                match occurrence_repository.find_by_id(occurrence_id).await {
                    Ok(Some(mut record)) => {
                        if let Err(error) = mutation.apply(&mut record.occurrence, now) {
                            tracing::error!(
                                %occurrence_id,
                                error = %error,
                                "Mutation rejected by occurrence, continuing batch"
                            );
                            monitoring.capture(&format!(
                                "Failed to {} occurrence {occurrence_id}: {error}",
                                mutation.kind()
                            ));
                            continue;
                        }
                        if let Err(error) = occurrence_repository
                            .save(record.series_id, &record.occurrence)
                            .await
                        {
                            tracing::error!(
                                %occurrence_id,
                                error = %error,
                                "Failed to save mutated occurrence, continuing batch"
                            );
                            monitoring.capture(&format!(
                                "Failed to save occurrence {occurrence_id}: {error:#}"
                            ));
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(%occurrence_id, "Skipping missing occurrence");
                    }
                    Err(error) => {
                        tracing::error!(
                            %occurrence_id,
                            error = %error,
                            "Failed to load occurrence, continuing batch"
                        );
                        monitoring.capture(&format!(
                            "Failed to load occurrence {occurrence_id}: {error:#}"
                        ));
                    }
                }
            }
            Ok(())
        }
    })
}
