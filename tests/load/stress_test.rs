//! Full default profile (50 virtual users x 20 iterations) against a mock
//! booking service that sells a fixed number of tickets.
//!
//! The mock answers 200 until its stock runs out and 400 afterwards, which
//! is what a correctly locked booking endpoint looks like from the outside.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use booking_loadgen::client::HttpBookingClient;
use booking_loadgen::config::Config;
use booking_loadgen::domain::{BookingRequest, Mode};
use booking_loadgen::runner::{LoadProfile, LoadRunner, StopReason};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const STOCK: i64 = 100;

struct LockedInventory {
    remaining: AtomicI64,
}

impl Respond for LockedInventory {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let taken = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then_some(left - 1)
            });
        match taken {
            Ok(_) => ResponseTemplate::new(200).set_delay(Duration::from_millis(5)),
            Err(_) => ResponseTemplate::new(400).set_delay(Duration::from_millis(5)),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore] // Ignore by default as this is a slow test
async fn test_default_profile_against_locked_inventory() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/book/safe"))
        .respond_with(LockedInventory {
            remaining: AtomicI64::new(STOCK),
        })
        .mount(&server)
        .await;

    let mut cfg = Config::default();
    cfg.target.base_url = server.uri();
    cfg.load.progress_interval_seconds = 1;
    let profile = LoadProfile::from_config(&cfg);
    assert_eq!(profile.planned_requests(), 1000);

    let api = Arc::new(HttpBookingClient::from_config(&cfg).unwrap());
    let outcome = LoadRunner::new(api, profile).run().await;

    println!(
        "successful_bookings={} failed_bookings={} elapsed={:?}",
        outcome.tally.successful_bookings, outcome.tally.failed_bookings, outcome.elapsed
    );

    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(outcome.attempted_requests(), 1000);
    assert_eq!(outcome.tally.successful_bookings, STOCK as u64);
    assert_eq!(outcome.tally.failed_bookings, 1000 - STOCK as u64);

    let requests = server.received_requests().await.unwrap();
    let user_ids: HashSet<String> = requests
        .iter()
        .map(|r| r.body_json::<BookingRequest>().unwrap().user_id)
        .collect();
    assert_eq!(user_ids.len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore] // Ignore by default as this is a slow test
async fn test_slow_server_hits_duration_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/book/unsafe"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let mut cfg = Config::default();
    cfg.target.base_url = server.uri();
    cfg.target.mode = Mode::Unsafe;
    cfg.load.max_duration_seconds = 3;
    cfg.load.progress_interval_seconds = 1;

    let api = Arc::new(HttpBookingClient::from_config(&cfg).unwrap());
    let outcome = LoadRunner::new(api, LoadProfile::from_config(&cfg)).run().await;

    // 300ms per request for 3s leaves room for ~10 of the 20 iterations
    assert_eq!(outcome.stop_reason, StopReason::Deadline);
    assert!(outcome.attempted_requests() < 1000);
    assert!(outcome.elapsed < Duration::from_secs(6));
}
