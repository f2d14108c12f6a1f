pub mod progress;

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::client::BookingApi;
use crate::config::Config;
use crate::domain::{BookingRequest, RequestOutcome};
use crate::metrics::{BookingTally, TallySnapshot};

/// Shape of a run: how many users, how many iterations, how long at most
#[derive(Debug, Clone)]
pub struct LoadProfile {
    pub virtual_users: u32,
    pub iterations_per_user: u32,
    pub max_duration: Duration,
    pub event_id: i64,
    pub progress_interval: Option<Duration>,
}

impl LoadProfile {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            virtual_users: cfg.load.virtual_users,
            iterations_per_user: cfg.load.iterations_per_user,
            max_duration: cfg.load.max_duration(),
            event_id: cfg.target.event_id,
            progress_interval: cfg.load.progress_interval(),
        }
    }

    pub fn planned_requests(&self) -> u64 {
        u64::from(self.virtual_users) * u64::from(self.iterations_per_user)
    }
}

/// Why the run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every virtual user finished its iterations
    Completed,
    /// Max duration elapsed first
    Deadline,
    /// External shutdown (signal)
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Deadline => "deadline",
            Self::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub planned_requests: u64,
    /// Requests in flight when the run was stopped; never counted
    pub interrupted_requests: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    pub tally: TallySnapshot,
}

impl RunOutcome {
    pub fn attempted_requests(&self) -> u64 {
        self.tally.attempted
    }

    /// Iterations that were never started
    pub fn skipped_requests(&self) -> u64 {
        self.planned_requests
            .saturating_sub(self.attempted_requests() + self.interrupted_requests)
    }

    pub fn truncated(&self) -> bool {
        self.stop_reason != StopReason::Completed
    }
}

pub struct LoadRunner {
    api: Arc<dyn BookingApi>,
    profile: LoadProfile,
    tally: Arc<BookingTally>,
}

impl LoadRunner {
    pub fn new(api: Arc<dyn BookingApi>, profile: LoadProfile) -> Self {
        Self {
            api,
            profile,
            tally: Arc::new(BookingTally::new()),
        }
    }

    pub fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    /// Live tally, readable while the run is in progress
    pub fn tally(&self) -> Arc<BookingTally> {
        Arc::clone(&self.tally)
    }

    pub async fn run(&self) -> RunOutcome {
        self.run_until(CancellationToken::new()).await
    }

    /// Run until every virtual user is done, the max duration elapses or
    /// `shutdown` is cancelled, whichever comes first.
    pub async fn run_until(&self, shutdown: CancellationToken) -> RunOutcome {
        let started = Instant::now();
        let planned = self.profile.planned_requests();
        let stop = CancellationToken::new();
        let interrupted = Arc::new(AtomicU64::new(0));

        let mut users = JoinSet::new();
        for id in 1..=self.profile.virtual_users {
            let user = VirtualUser {
                id,
                iterations: self.profile.iterations_per_user,
                event_id: self.profile.event_id,
                api: Arc::clone(&self.api),
                tally: Arc::clone(&self.tally),
                stop: stop.clone(),
                interrupted: Arc::clone(&interrupted),
            };
            users.spawn(user.run().in_current_span());
        }

        let progress = self.profile.progress_interval.map(|every| {
            tokio::spawn(
                progress::report_progress(Arc::clone(&self.tally), planned, every, stop.clone())
                    .in_current_span(),
            )
        });

        info!(
            virtual_users = self.profile.virtual_users,
            iterations_per_user = self.profile.iterations_per_user,
            planned_requests = planned,
            max_duration_ms = self.profile.max_duration.as_millis() as u64,
            "virtual users started"
        );

        let deadline = tokio::time::sleep(self.profile.max_duration);
        tokio::pin!(deadline);
        let mut stop_reason = StopReason::Completed;

        loop {
            tokio::select! {
                joined = users.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => warn!(error = %e, "virtual user task failed"),
                    None => break,
                },
                _ = &mut deadline, if !stop.is_cancelled() => {
                    info!(max_duration_ms = self.profile.max_duration.as_millis() as u64, "max duration reached, stopping virtual users");
                    stop_reason = StopReason::Deadline;
                    stop.cancel();
                }
                _ = shutdown.cancelled(), if !stop.is_cancelled() => {
                    info!("shutdown requested, stopping virtual users");
                    stop_reason = StopReason::Shutdown;
                    stop.cancel();
                }
            }
        }

        stop.cancel();
        if let Some(handle) = progress {
            if let Err(e) = handle.await {
                warn!(error = %e, "progress reporter failed");
            }
        }

        let outcome = RunOutcome {
            planned_requests: planned,
            interrupted_requests: interrupted.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
            stop_reason,
            tally: self.tally.snapshot(),
        };

        info!(
            stop_reason = %outcome.stop_reason,
            attempted = outcome.attempted_requests(),
            interrupted = outcome.interrupted_requests,
            skipped = outcome.skipped_requests(),
            successful_bookings = outcome.tally.successful_bookings,
            failed_bookings = outcome.tally.failed_bookings,
            unclassified_anomalies = outcome.tally.unclassified_anomalies,
            transport_errors = outcome.tally.transport_errors,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "load run finished"
        );

        outcome
    }
}

struct VirtualUser {
    id: u32,
    iterations: u32,
    event_id: i64,
    api: Arc<dyn BookingApi>,
    tally: Arc<BookingTally>,
    stop: CancellationToken,
    interrupted: Arc<AtomicU64>,
}

impl VirtualUser {
    async fn run(self) {
        for iteration in 0..self.iterations {
            if self.stop.is_cancelled() {
                break;
            }

            let request = BookingRequest::for_iteration(self.event_id, self.id, iteration);
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    self.interrupted.fetch_add(1, Ordering::Relaxed);
                    debug!(vu = self.id, iteration, "in-flight booking dropped at stop");
                    break;
                }
                result = self.api.book(&request) => result,
            };

            let outcome = match result {
                Ok(status) => RequestOutcome::classify(status),
                Err(e) => {
                    warn!(
                        vu = self.id,
                        iteration,
                        user_id = %request.user_id,
                        error = %e,
                        "booking request got no response"
                    );
                    RequestOutcome::TransportFailure(e.to_string())
                }
            };

            if let RequestOutcome::Unexpected(status) = &outcome {
                warn!(
                    vu = self.id,
                    iteration,
                    user_id = %request.user_id,
                    status = status.as_u16(),
                    "check failed: status is not 200, 400 or 500"
                );
            }

            self.tally.record(&outcome, started.elapsed());
        }
    }
}
