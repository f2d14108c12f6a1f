use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::client::BookingApi;
use crate::config::ReportFormat;
use crate::domain::{Event, Mode};
use crate::error::Result;
use crate::metrics::TallySnapshot;
use crate::runner::{LoadProfile, RunOutcome, StopReason};

/// Ticket inventory before and after a run, compared with accepted bookings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryAudit {
    pub event_id: i64,
    pub event_name: String,
    pub tickets_before: i64,
    pub tickets_after: i64,
    pub tickets_decremented: i64,
    pub successful_bookings: u64,
    /// Accepted bookings that never reached the inventory (lost updates)
    pub oversold: i64,
    pub negative_inventory: bool,
}

impl InventoryAudit {
    pub fn compute(before: &Event, after: &Event, successful_bookings: u64) -> Self {
        let tickets_decremented = before.total_tickets - after.total_tickets;
        Self {
            event_id: after.id,
            event_name: after.name.clone(),
            tickets_before: before.total_tickets,
            tickets_after: after.total_tickets,
            tickets_decremented,
            successful_bookings,
            oversold: successful_bookings as i64 - tickets_decremented,
            negative_inventory: after.total_tickets < 0,
        }
    }

    pub fn consistent(&self) -> bool {
        self.oversold == 0 && !self.negative_inventory
    }
}

/// Fetch the event, logging and swallowing any failure
pub async fn snapshot_inventory(api: &dyn BookingApi, event_id: i64) -> Option<Event> {
    match api.fetch_event(event_id).await {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event_id, error = %e, "inventory snapshot failed, audit skipped");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub target_url: String,
    pub mode: Mode,
    pub virtual_users: u32,
    pub iterations_per_user: u32,
    pub planned_requests: u64,
    pub attempted_requests: u64,
    pub interrupted_requests: u64,
    pub skipped_requests: u64,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
    pub truncated: bool,
    pub tally: TallySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryAudit>,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        target_url: String,
        mode: Mode,
        profile: &LoadProfile,
        outcome: RunOutcome,
        inventory: Option<InventoryAudit>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            target_url,
            mode,
            virtual_users: profile.virtual_users,
            iterations_per_user: profile.iterations_per_user,
            planned_requests: outcome.planned_requests,
            attempted_requests: outcome.attempted_requests(),
            interrupted_requests: outcome.interrupted_requests,
            skipped_requests: outcome.skipped_requests(),
            elapsed_seconds: outcome.elapsed.as_secs_f64(),
            stop_reason: outcome.stop_reason,
            truncated: outcome.truncated(),
            tally: outcome.tally,
            inventory,
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_string()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.tally;
        writeln!(f, "booking load run {} ({} mode)", self.run_id, self.mode)?;
        writeln!(f, "  target ................. POST {}", self.target_url)?;
        writeln!(
            f,
            "  virtual users .......... {} x {} iterations ({} planned)",
            self.virtual_users, self.iterations_per_user, self.planned_requests
        )?;
        writeln!(
            f,
            "  attempted .............. {} (interrupted {}, skipped {})",
            self.attempted_requests, self.interrupted_requests, self.skipped_requests
        )?;
        writeln!(
            f,
            "  elapsed ................ {:.2}s ({})",
            self.elapsed_seconds, self.stop_reason
        )?;
        writeln!(f, "  successful_bookings .... {}", t.successful_bookings)?;
        writeln!(
            f,
            "  failed_bookings ........ {} (unexpected status {}, transport errors {})",
            t.failed_bookings, t.unclassified_anomalies, t.transport_errors
        )?;
        writeln!(
            f,
            "  checks ................. {:.2}% ({} passed, {} failed)",
            t.check_pass_rate() * 100.0,
            t.checks_passed,
            t.checks_failed
        )?;

        if !t.status_counts.is_empty() {
            let statuses = t
                .status_counts
                .iter()
                .map(|(code, n)| format!("{code}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "  status codes ........... {statuses}")?;
        }

        if let Some(l) = &t.latency {
            writeln!(
                f,
                "  latency ................ min={:.1}ms avg={:.1}ms p50={:.1}ms p95={:.1}ms p99={:.1}ms max={:.1}ms",
                l.min_ms, l.avg_ms, l.p50_ms, l.p95_ms, l.p99_ms, l.max_ms
            )?;
        }

        if let Some(a) = &self.inventory {
            writeln!(
                f,
                "  inventory .............. event {} {:?}: {} -> {} tickets (decremented {}, oversold {})",
                a.event_id, a.event_name, a.tickets_before, a.tickets_after, a.tickets_decremented, a.oversold
            )?;
            if a.negative_inventory {
                writeln!(f, "  WARNING: inventory went negative")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn event(total_tickets: i64) -> Event {
        Event {
            id: 1,
            name: "Concert".to_string(),
            total_tickets,
        }
    }

    fn sample_report(inventory: Option<InventoryAudit>) -> RunReport {
        let profile = LoadProfile {
            virtual_users: 2,
            iterations_per_user: 3,
            max_duration: Duration::from_secs(30),
            event_id: 1,
            progress_interval: None,
        };
        let outcome = RunOutcome {
            planned_requests: 6,
            interrupted_requests: 0,
            elapsed: Duration::from_millis(1500),
            stop_reason: StopReason::Completed,
            tally: TallySnapshot {
                attempted: 6,
                successful_bookings: 2,
                failed_bookings: 4,
                unclassified_anomalies: 1,
                transport_errors: 0,
                checks_passed: 5,
                checks_failed: 1,
                status_counts: BTreeMap::from([(200, 2), (400, 3), (409, 1)]),
                latency: None,
            },
        };
        RunReport::new(
            Uuid::nil(),
            Utc::now(),
            "http://localhost:8080/book/safe".to_string(),
            Mode::Safe,
            &profile,
            outcome,
            inventory,
        )
    }

    #[test]
    fn test_audit_consistent_when_every_booking_decrements() {
        let audit = InventoryAudit::compute(&event(100), &event(90), 10);
        assert_eq!(audit.tickets_decremented, 10);
        assert_eq!(audit.oversold, 0);
        assert!(audit.consistent());
    }

    #[test]
    fn test_audit_detects_lost_updates() {
        // unsafe endpoint: 50 accepted bookings but only 12 decrements landed
        let audit = InventoryAudit::compute(&event(20), &event(8), 50);
        assert_eq!(audit.oversold, 38);
        assert!(!audit.consistent());
    }

    #[test]
    fn test_audit_flags_negative_inventory() {
        let audit = InventoryAudit::compute(&event(5), &event(-3), 8);
        assert!(audit.negative_inventory);
        assert_eq!(audit.oversold, 0);
        assert!(!audit.consistent());
    }

    #[test]
    fn test_text_report_lists_counters() {
        let text = sample_report(None).render(ReportFormat::Text).unwrap();
        assert!(text.contains("successful_bookings .... 2"));
        assert!(text.contains("failed_bookings ........ 4 (unexpected status 1, transport errors 0)"));
        assert!(text.contains("200=2 400=3 409=1"));
        assert!(text.contains("(completed)"));
        assert!(!text.contains("inventory"));
    }

    #[test]
    fn test_display_matches_text_render() {
        let audit = InventoryAudit::compute(&event(5), &event(-1), 6);
        let report = sample_report(Some(audit));
        let text = report.render(ReportFormat::Text).unwrap();
        assert_eq!(text, format!("{report}"));
        assert!(text.contains("event 1 \"Concert\": 5 -> -1 tickets (decremented 6, oversold 0)"));
        assert!(text.ends_with("WARNING: inventory went negative\n"));
    }

    #[test]
    fn test_json_report() {
        let audit = InventoryAudit::compute(&event(10), &event(8), 2);
        let json = sample_report(Some(audit)).render(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mode"], "safe");
        assert_eq!(value["stop_reason"], "completed");
        assert_eq!(value["truncated"], false);
        assert_eq!(value["tally"]["successful_bookings"], 2);
        assert_eq!(value["tally"]["status_counts"]["409"], 1);
        assert_eq!(value["inventory"]["oversold"], 0);
    }

    #[test]
    fn test_json_report_omits_missing_audit() {
        let json = sample_report(None).render(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("inventory").is_none());
    }
}
