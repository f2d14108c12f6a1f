use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::BookingApi;
use crate::config::Config;
use crate::report::{snapshot_inventory, InventoryAudit, RunReport};
use crate::runner::{LoadProfile, LoadRunner};

/// One complete load run: optional inventory snapshot, the run itself,
/// second snapshot, report.
pub async fn run_session(
    cfg: &Config,
    api: Arc<dyn BookingApi>,
    shutdown: CancellationToken,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = info_span!("load_run", %run_id, mode = %cfg.target.mode);
    execute(cfg, api, shutdown, run_id).instrument(span).await
}

async fn execute(
    cfg: &Config,
    api: Arc<dyn BookingApi>,
    shutdown: CancellationToken,
    run_id: Uuid,
) -> RunReport {
    let event_id = cfg.target.event_id;
    let audit = cfg.report.audit_inventory;

    let before = if audit {
        snapshot_inventory(api.as_ref(), event_id).await
    } else {
        None
    };
    if let Some(event) = &before {
        info!(event_id, tickets = event.total_tickets, "inventory before run");
    }

    let profile = LoadProfile::from_config(cfg);
    let started_at = Utc::now();
    let runner = LoadRunner::new(Arc::clone(&api), profile.clone());
    let outcome = runner.run_until(shutdown).await;

    let inventory = match before {
        Some(before) => snapshot_inventory(api.as_ref(), event_id)
            .await
            .map(|after| InventoryAudit::compute(&before, &after, outcome.tally.successful_bookings)),
        None => None,
    };
    if let Some(audit) = &inventory {
        if audit.consistent() {
            info!(
                tickets_after = audit.tickets_after,
                tickets_decremented = audit.tickets_decremented,
                "inventory matches accepted bookings"
            );
        } else {
            warn!(
                tickets_after = audit.tickets_after,
                tickets_decremented = audit.tickets_decremented,
                successful_bookings = audit.successful_bookings,
                oversold = audit.oversold,
                negative_inventory = audit.negative_inventory,
                "inventory does not match accepted bookings"
            );
        }
    }

    RunReport::new(
        run_id,
        started_at,
        cfg.booking_url(),
        cfg.target.mode,
        &profile,
        outcome,
        inventory,
    )
}
