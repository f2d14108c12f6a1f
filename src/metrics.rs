use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::RequestOutcome;

/// Process-wide result tally shared by every virtual user.
///
/// Each recorded outcome lands in exactly one of `successful_bookings` or
/// `failed_bookings`, so their sum is the number of attempts that completed.
/// `unclassified_anomalies` and `transport_errors` are sub-counts of
/// `failed_bookings`.
#[derive(Debug, Default)]
pub struct BookingTally {
    successful_bookings: AtomicU64,
    failed_bookings: AtomicU64,
    unclassified_anomalies: AtomicU64,
    transport_errors: AtomicU64,
    checks_passed: AtomicU64,
    checks_failed: AtomicU64,
    status_counts: Mutex<BTreeMap<u16, u64>>,
    latencies_us: Mutex<Vec<u64>>,
}

impl BookingTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &RequestOutcome, latency: Duration) {
        match outcome {
            RequestOutcome::Booked => {
                self.successful_bookings.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::Rejected(_) => {
                self.failed_bookings.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::Unexpected(_) => {
                self.failed_bookings.fetch_add(1, Ordering::Relaxed);
                self.unclassified_anomalies.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::TransportFailure(_) => {
                self.failed_bookings.fetch_add(1, Ordering::Relaxed);
                self.transport_errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        if outcome.check_passed() {
            self.checks_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.checks_failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(status) = outcome.status() {
            *self.status_counts.lock().entry(status.as_u16()).or_insert(0) += 1;
            self.latencies_us.lock().push(latency.as_micros() as u64);
        }
    }

    pub fn successful_bookings(&self) -> u64 {
        self.successful_bookings.load(Ordering::Relaxed)
    }

    pub fn failed_bookings(&self) -> u64 {
        self.failed_bookings.load(Ordering::Relaxed)
    }

    pub fn unclassified_anomalies(&self) -> u64 {
        self.unclassified_anomalies.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    pub fn attempted(&self) -> u64 {
        self.successful_bookings() + self.failed_bookings()
    }

    pub fn snapshot(&self) -> TallySnapshot {
        let successful_bookings = self.successful_bookings();
        let failed_bookings = self.failed_bookings();
        let unclassified_anomalies = self.unclassified_anomalies();
        let mut latencies = self.latencies_us.lock().clone();
        TallySnapshot {
            attempted: successful_bookings + failed_bookings,
            successful_bookings,
            failed_bookings,
            unclassified_anomalies,
            transport_errors: self.transport_errors(),
            checks_passed: self.checks_passed.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            status_counts: self.status_counts.lock().clone(),
            latency: LatencyStats::from_micros(&mut latencies),
        }
    }
}

/// Point-in-time copy of a [`BookingTally`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TallySnapshot {
    pub attempted: u64,
    pub successful_bookings: u64,
    pub failed_bookings: u64,
    pub unclassified_anomalies: u64,
    pub transport_errors: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub latency: Option<LatencyStats>,
}

impl TallySnapshot {
    pub fn check_pass_rate(&self) -> f64 {
        let total = self.checks_passed + self.checks_failed;
        if total == 0 {
            return 0.0;
        }
        self.checks_passed as f64 / total as f64
    }
}

/// Response latency over requests that got an HTTP answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    /// Sorts `samples` in place; `None` when there are no samples.
    pub fn from_micros(samples: &mut [u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let to_ms = |us: u64| us as f64 / 1000.0;
        let sum: u64 = samples.iter().sum();
        Some(Self {
            count: samples.len(),
            min_ms: to_ms(samples[0]),
            avg_ms: sum as f64 / samples.len() as f64 / 1000.0,
            p50_ms: to_ms(percentile(samples, 50.0)),
            p95_ms: to_ms(percentile(samples, 95.0)),
            p99_ms: to_ms(percentile(samples, 99.0)),
            max_ms: to_ms(samples[samples.len() - 1]),
        })
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[u64], pct: f64) -> u64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
