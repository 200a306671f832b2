//! Tracked execution of background units of work.
//!
//! Every attempt writes exactly one [`Job`] row: job type, start time, end
//! time and a success flag. Failures are additionally reported to the
//! monitoring sink and are never propagated to whatever triggered the job.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::ports::{JobRepository, MonitoringSink};

/// Tag identifying a named unit of work on operational dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    CreateRemainingOccurrences,
    CreateRemainingSetMembers,
    CancelRemainingOccurrences,
    UncancelRemainingOccurrences,
    UpdateRemainingOccurrences,
}

impl JobType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRemainingOccurrences => "create_remaining_occurrences",
            Self::CreateRemainingSetMembers => "create_remaining_set_members",
            Self::CancelRemainingOccurrences => "cancel_remaining_occurrences",
            Self::UncancelRemainingOccurrences => "uncancel_remaining_occurrences",
            Self::UpdateRemainingOccurrences => "update_remaining_occurrences",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of one execution attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub successful: bool,
}

type WorkFactory = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A named unit of work. The work is a factory rather than a future so a
/// retry can produce a fresh execution.
pub struct JobDefinition {
    job_type: JobType,
    work: WorkFactory,
}

impl JobDefinition {
    pub fn new<F, Fut>(job_type: JobType, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            job_type,
            work: Box::new(move || Box::pin(work())),
        }
    }

    #[must_use]
    pub const fn job_type(&self) -> JobType {
        self.job_type
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("job_type", &self.job_type)
            .finish_non_exhaustive()
    }
}

/// Executes job definitions and records their outcomes durably.
pub struct JobRunner {
    repository: Arc<dyn JobRepository>,
    monitoring: Arc<dyn MonitoringSink>,
    extra_attempts: u32,
}

impl JobRunner {
    #[must_use]
    pub fn new(
        repository: Arc<dyn JobRepository>,
        monitoring: Arc<dyn MonitoringSink>,
        extra_attempts: u32,
    ) -> Self {
        Self {
            repository,
            monitoring,
            extra_attempts,
        }
    }

    /// ## Summary
    /// Executes the definition once. Any failure is caught, recorded and
    /// reported; nothing is propagated to the caller beyond the returned
    /// flag.
    pub async fn run(&self, definition: &JobDefinition) -> bool {
        self.attempt(definition).await
    }

    /// ## Summary
    /// Executes the definition, re-running it on failure up to the
    /// configured number of extra attempts (default one, so at most two
    /// executions). One [`Job`] row is written per attempt.
    pub async fn run_with_retry(&self, definition: &JobDefinition) -> bool {
        let mut attempts_left = self.extra_attempts;
        loop {
            if self.attempt(definition).await {
                return true;
            }
            if attempts_left == 0 {
                return false;
            }
            attempts_left -= 1;
            tracing::warn!(job_type = %definition.job_type, "Retrying failed job");
        }
    }

    /// ## Summary
    /// Executes the definitions in order. As soon as one fails, every later
    /// definition is skipped without being invoked, and a synthetic failed
    /// [`Job`] row is written for each so dashboards show the whole intended
    /// chain. Dependent jobs assume the prior step's output exists; running
    /// them after an upstream failure would corrupt state.
    pub async fn run_dependent_chain(&self, definitions: &[JobDefinition]) -> bool {
        let mut upstream_failed = false;
        for definition in definitions {
            if upstream_failed {
                tracing::warn!(
                    job_type = %definition.job_type,
                    "Skipping dependent job after upstream failure"
                );
                let now = Utc::now().naive_utc();
                self.record(definition.job_type, now, now, false).await;
            } else if !self.attempt(definition).await {
                upstream_failed = true;
            } else {
                // Step succeeded, carry on down the chain.
            }
        }
        !upstream_failed
    }

    /// Fire-and-forget submission: the job runs on its own task and the
    /// caller returns before it starts or completes.
    pub fn submit(self: &Arc<Self>, definition: JobDefinition) {
        let runner = Arc::clone(self);
        drop(tokio::spawn(async move {
            runner.run(&definition).await;
        }));
    }

    async fn attempt(&self, definition: &JobDefinition) -> bool {
        tracing::info!(job_type = %definition.job_type, "Starting job");
        let started_at = Utc::now().naive_utc();
        let outcome = (definition.work)().await;
        let ended_at = Utc::now().naive_utc();

        let successful = match outcome {
            Ok(()) => {
                tracing::info!(job_type = %definition.job_type, "Job succeeded");
                true
            }
            Err(error) => {
                tracing::error!(job_type = %definition.job_type, error = %error, "Job failed");
                self.monitoring
                    .capture(&format!("Job {} failed: {error:#}", definition.job_type));
                false
            }
        };

        self.record(definition.job_type, started_at, ended_at, successful)
            .await;
        successful
    }

    async fn record(
        &self,
        job_type: JobType,
        started_at: NaiveDateTime,
        ended_at: NaiveDateTime,
        successful: bool,
    ) {
        let job = Job {
            id: Uuid::new_v4(),
            job_type,
            started_at,
            ended_at,
            successful,
        };
        // Losing the record must not fail the job itself.
        if let Err(error) = self.repository.save(&job).await {
            tracing::error!(job_type = %job_type, error = %error, "Failed to persist job record");
        }
    }
}
