#![allow(clippy::unwrap_used)]
// Engine integration tests against a scripted RemoteControl.
//
// The mock counts every remote call and pops poll results from a
// script, so single-flight behavior, poll budgets, and implicit-fetch
// counts are all observable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use fordlink_api::{
    CommandId, CommandStatus, Error, RemoteControl, TokenSet, VehicleDescriptor,
    VehicleStatusEnvelope,
};
use fordlink_core::{
    CoreError, EngineSettings, RefreshScheduler, TerminalStatus, VehicleCommand, VehicleEngine,
};

// ── Mock remote ─────────────────────────────────────────────────────

/// One scripted poll response; an empty script falls back to
/// `default_poll`.
enum PollStep {
    Status(CommandStatus),
    TransportError,
}

struct MockRemote {
    issue_calls: AtomicU32,
    poll_calls: AtomicU32,
    fetch_calls: AtomicU32,
    renew_calls: AtomicU32,
    poll_script: Mutex<VecDeque<PollStep>>,
    default_poll: Mutex<CommandStatus>,
    /// Simulated latency on issuance, to hold the in-flight window
    /// open across an interleaving test.
    issue_delay: Mutex<Duration>,
    fail_issue: AtomicBool,
    fail_fetch: AtomicBool,
    fail_renew: AtomicBool,
    /// One-shot errors returned by status fetches before `fail_fetch`
    /// is consulted.
    fetch_errors: Mutex<VecDeque<Error>>,
    /// Fuel level reported by status fetches.
    fuel_level: Mutex<Option<f64>>,
}

impl MockRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            issue_calls: AtomicU32::new(0),
            poll_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            renew_calls: AtomicU32::new(0),
            poll_script: Mutex::new(VecDeque::new()),
            default_poll: Mutex::new(CommandStatus::Queued),
            issue_delay: Mutex::new(Duration::ZERO),
            fail_issue: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_renew: AtomicBool::new(false),
            fetch_errors: Mutex::new(VecDeque::new()),
            fuel_level: Mutex::new(Some(50.0)),
        })
    }

    fn script_polls(&self, steps: impl IntoIterator<Item = PollStep>) {
        self.poll_script.lock().unwrap().extend(steps);
    }

    fn set_default_poll(&self, status: CommandStatus) {
        *self.default_poll.lock().unwrap() = status;
    }

    fn api_error() -> Error {
        Error::Api {
            message: "boom".into(),
            status: 500,
        }
    }

    fn tokens(expires_in_secs: u64) -> TokenSet {
        TokenSet {
            access_token: "access".to_string().into(),
            refresh_token: "refresh".to_string().into(),
            expires_in_secs,
        }
    }
}

#[async_trait]
impl RemoteControl for MockRemote {
    async fn authenticate(&self) -> Result<TokenSet, Error> {
        Ok(Self::tokens(3600))
    }

    async fn renew_token(&self) -> Result<TokenSet, Error> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_renew.load(Ordering::SeqCst) {
            return Err(Self::api_error());
        }
        Ok(Self::tokens(3600))
    }

    async fn list_vehicles(&self) -> Result<Vec<VehicleDescriptor>, Error> {
        Ok(Vec::new())
    }

    async fn issue_command(
        &self,
        _vehicle_id: &str,
        command_type: &str,
    ) -> Result<CommandId, Error> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.issue_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_issue.load(Ordering::SeqCst) {
            return Err(Self::api_error());
        }
        Ok(CommandId(format!("cmd-{command_type}")))
    }

    async fn poll_command(
        &self,
        _command_id: &CommandId,
        _vehicle_id: &str,
        _command_type: &str,
    ) -> Result<CommandStatus, Error> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.poll_script.lock().unwrap().pop_front();
        match step {
            Some(PollStep::Status(status)) => Ok(status),
            Some(PollStep::TransportError) => Err(Self::api_error()),
            None => Ok(*self.default_poll.lock().unwrap()),
        }
    }

    async fn fetch_vehicle_status(
        &self,
        _vehicle_id: &str,
    ) -> Result<VehicleStatusEnvelope, Error> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fetch_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Self::api_error());
        }
        let fuel = *self.fuel_level.lock().unwrap();
        let envelope = serde_json::json!({
            "vehicleStatus": {
                "lockStatus": { "value": "LOCKED" },
                "ignitionStatus": { "value": "OFF" },
                "fuelLevel": { "value": fuel }
            }
        });
        Ok(serde_json::from_value(envelope).expect("mock envelope"))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn descriptor(vehicle_id: &str, name: &str) -> VehicleDescriptor {
    VehicleDescriptor {
        vehicle_id: vehicle_id.into(),
        make: None,
        model_name: None,
        model_year: None,
        nick_name: Some(name.into()),
    }
}

fn test_settings() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::ZERO,
        ..EngineSettings::default()
    }
}

/// Engine with one tracked vehicle "V1".
fn engine_with_v1(remote: &Arc<MockRemote>) -> VehicleEngine {
    engine_with(remote, test_settings())
}

fn engine_with(remote: &Arc<MockRemote>, settings: EngineSettings) -> VehicleEngine {
    let client: Arc<dyn RemoteControl> = Arc::clone(remote) as Arc<dyn RemoteControl>;
    let engine = VehicleEngine::new(client, settings);
    engine.sync_vehicles(&[descriptor("v1", "Test Car")]);
    engine
}

// ── Single-flight ───────────────────────────────────────────────────

#[tokio::test]
async fn second_issue_rejected_while_first_in_flight() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);

    let first = engine.issue_command("V1", VehicleCommand::Lock).await;
    assert!(first.is_ok());

    // Scenario: REFRESH arrives while LOCK is still polling.
    let second = engine.issue_command("V1", VehicleCommand::Refresh).await;
    assert!(
        matches!(second, Err(CoreError::CommandInProgress { .. })),
        "expected CommandInProgress, got: {second:?}"
    );
    // No second remote call was made.
    assert_eq!(remote.issue_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn interleaved_issues_resolve_to_one_winner() {
    let remote = MockRemote::new();
    *remote.issue_delay.lock().unwrap() = Duration::from_millis(20);
    let engine = engine_with_v1(&remote);

    let (a, b) = tokio::join!(
        engine.issue_command("V1", VehicleCommand::Lock),
        engine.issue_command("V1", VehicleCommand::Unlock),
    );

    let winners = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(winners, 1, "exactly one issue must win: {a:?} / {b:?}");
    assert_eq!(remote.issue_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lookup_is_case_insensitive() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);

    assert!(engine.vehicle("v1").is_some());
    assert!(engine.vehicle("V1").is_some());
    let result = engine.issue_command("zzz", VehicleCommand::Lock).await;
    assert!(matches!(result, Err(CoreError::VehicleNotFound { .. })));
}

// ── Flag release on every exit path ─────────────────────────────────

#[tokio::test]
async fn flag_released_after_success() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.script_polls([PollStep::Status(CommandStatus::Success)]);
    let id = handle.executor().issue(VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 30).await;

    assert_eq!(status, TerminalStatus::Success);
    assert!(!handle.executor().is_in_flight());
    // Executor accepts a new command immediately.
    remote.script_polls([PollStep::Status(CommandStatus::Success)]);
    assert!(handle.executor().issue(VehicleCommand::Unlock).await.is_ok());
}

#[tokio::test]
async fn flag_released_after_remote_failure() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.script_polls([PollStep::Status(CommandStatus::Failed)]);
    let id = handle.executor().issue(VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 30).await;

    assert_eq!(status, TerminalStatus::Failed);
    assert!(!handle.executor().is_in_flight());
    // Failed commands perform no implicit fetch.
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn flag_released_after_poll_transport_failure() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.script_polls([PollStep::TransportError]);
    let id = handle.executor().issue(VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 30).await;

    assert_eq!(status, TerminalStatus::Failed);
    assert!(!handle.executor().is_in_flight());
}

#[tokio::test]
async fn flag_released_when_issuance_fails() {
    let remote = MockRemote::new();
    remote.fail_issue.store(true, Ordering::SeqCst);
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    let result = handle.executor().issue(VehicleCommand::Lock).await;
    assert!(matches!(result, Err(CoreError::Api { .. })));
    assert!(!handle.executor().is_in_flight());

    remote.fail_issue.store(false, Ordering::SeqCst);
    assert!(handle.executor().issue(VehicleCommand::Lock).await.is_ok());
}

// ── Poll budget ─────────────────────────────────────────────────────

#[tokio::test]
async fn polling_stops_at_first_non_queued() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.script_polls([
        PollStep::Status(CommandStatus::Queued),
        PollStep::Status(CommandStatus::Queued),
        PollStep::Status(CommandStatus::Success),
    ]);

    let id = handle.executor().issue(VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 30).await;

    assert_eq!(status, TerminalStatus::Success);
    assert_eq!(remote.poll_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_attempts_while_queued_time_out() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    // Default poll is QUEUED forever.
    let id = handle.executor().issue(VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 3).await;

    assert_eq!(status, TerminalStatus::TimedOut);
    assert_eq!(remote.poll_calls.load(Ordering::SeqCst), 3);
    // Timeout performs no implicit fetch and releases the flag.
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);
    assert!(!handle.executor().is_in_flight());
}

// ── Implicit post-success fetch ─────────────────────────────────────

#[tokio::test]
async fn lock_success_fetches_state_exactly_once() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.script_polls([
        PollStep::Status(CommandStatus::Queued),
        PollStep::Status(CommandStatus::Success),
    ]);

    let id = engine.issue_command("V1", VehicleCommand::Lock).await.unwrap();
    let status = handle.executor().await_completion(&id, VehicleCommand::Lock, 30).await;

    assert_eq!(status, TerminalStatus::Success);
    assert_eq!(remote.poll_calls.load(Ordering::SeqCst), 2);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 1);
    assert!(!handle.executor().is_in_flight());
    // The fetched snapshot is visible to queries.
    let state = engine.vehicle_state("V1").unwrap();
    assert_eq!(state.fuel_level, Some(50.0));
}

#[tokio::test]
async fn refresh_success_fetches_nothing() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);

    remote.script_polls([PollStep::Status(CommandStatus::Success)]);
    let status = engine.execute_command("V1", VehicleCommand::Refresh).await.unwrap();

    assert_eq!(status, TerminalStatus::Success);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);
}

// ── Store atomicity ─────────────────────────────────────────────────

#[tokio::test]
async fn failed_refresh_retains_prior_snapshot() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    assert!(engine.vehicle_state("V1").is_none(), "absent before first refresh");

    handle.store().refresh().await.unwrap();
    assert_eq!(engine.vehicle_state("V1").unwrap().fuel_level, Some(50.0));

    *remote.fuel_level.lock().unwrap() = Some(75.0);
    remote.fail_fetch.store(true, Ordering::SeqCst);
    assert!(handle.store().refresh().await.is_err());
    // Prior snapshot untouched.
    assert_eq!(engine.vehicle_state("V1").unwrap().fuel_level, Some(50.0));

    remote.fail_fetch.store(false, Ordering::SeqCst);
    handle.store().refresh().await.unwrap();
    assert_eq!(engine.vehicle_state("V1").unwrap().fuel_level, Some(75.0));
}

#[tokio::test]
async fn expired_token_renews_once_and_retries_fetch() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    remote.fetch_errors.lock().unwrap().push_back(Error::TokenExpired);
    handle.store().refresh().await.unwrap();

    assert_eq!(remote.renew_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 2, "rejected fetch plus retry");
    assert_eq!(engine.vehicle_state("V1").unwrap().fuel_level, Some(50.0));
}

#[tokio::test]
async fn failed_renewal_fails_the_cycle_and_keeps_snapshot() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    handle.store().refresh().await.unwrap();

    remote.fail_renew.store(true, Ordering::SeqCst);
    remote.fetch_errors.lock().unwrap().push_back(Error::TokenExpired);
    let result = handle.store().refresh().await;

    assert!(matches!(result, Err(CoreError::Api { .. })), "got: {result:?}");
    assert_eq!(remote.renew_calls.load(Ordering::SeqCst), 1);
    // No retry after a failed renewal, and the old snapshot survives.
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 2);
    assert!(engine.vehicle_state("V1").is_some());
}

#[tokio::test]
async fn store_subscribers_wake_on_refresh() {
    let remote = MockRemote::new();
    let engine = engine_with_v1(&remote);
    let handle = engine.vehicle("V1").unwrap();

    let mut rx = handle.store().subscribe();
    handle.store().refresh().await.unwrap();

    rx.changed().await.unwrap();
    assert!(rx.borrow().is_some());
}

// ── Vehicle list reconciliation ─────────────────────────────────────

#[tokio::test]
async fn reconciliation_adds_removes_and_preserves() {
    let remote = MockRemote::new();
    let client: Arc<dyn RemoteControl> = Arc::clone(&remote) as Arc<dyn RemoteControl>;
    let engine = VehicleEngine::new(client, test_settings());

    engine.sync_vehicles(&[descriptor("a", "Car A"), descriptor("b", "Car B")]);
    let b_before = engine.vehicle("B").unwrap();

    // B has a command in flight across the reconciliation.
    engine.issue_command("B", VehicleCommand::Lock).await.unwrap();
    assert!(b_before.executor().is_in_flight());

    engine.sync_vehicles(&[descriptor("b", "Car B"), descriptor("c", "Car C")]);

    assert!(engine.vehicle("A").is_none(), "A must be removed");
    assert!(engine.vehicle("C").is_some(), "C must be added");
    let b_after = engine.vehicle("B").unwrap();
    assert!(Arc::ptr_eq(&b_before, &b_after), "B must keep its handle");
    assert!(b_after.executor().is_in_flight(), "B's command must be undisturbed");
}

// ── Scheduler ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scheduler_sweeps_and_renews_then_stops() {
    let remote = MockRemote::new();
    remote.set_default_poll(CommandStatus::Success);
    let settings = EngineSettings {
        full_refresh_interval: Duration::from_secs(300),
        poll_interval: Duration::ZERO,
        ..EngineSettings::default()
    };
    let engine = engine_with(&remote, settings);

    let scheduler = RefreshScheduler::new();
    // 70s lifetime -> renewal fires at the 60s floor.
    scheduler.start(&engine, &MockRemote::tokens(70));

    // Let the spawned timer tasks reach their first await so their
    // sleeps are registered before the paused clock jumps.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    tokio::time::advance(Duration::from_secs(301)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(remote.renew_calls.load(Ordering::SeqCst) >= 1, "token renewed");
    assert!(remote.issue_calls.load(Ordering::SeqCst) >= 1, "refresh command issued");
    assert!(remote.fetch_calls.load(Ordering::SeqCst) >= 1, "state fetched in sweep");

    scheduler.shutdown().await;
    let issues = remote.issue_calls.load(Ordering::SeqCst);
    let fetches = remote.fetch_calls.load(Ordering::SeqCst);

    tokio::time::advance(Duration::from_secs(1200)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(remote.issue_calls.load(Ordering::SeqCst), issues, "no sweeps after shutdown");
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), fetches);
}

#[tokio::test(start_paused = true)]
async fn auto_refresh_stops_when_vehicle_removed() {
    let remote = MockRemote::new();
    remote.set_default_poll(CommandStatus::Success);
    let settings = EngineSettings {
        auto_refresh: true,
        refresh_rate: Duration::from_secs(60),
        poll_interval: Duration::ZERO,
        ..EngineSettings::default()
    };
    let engine = engine_with(&remote, settings);

    // Let the spawned auto-refresh task reach its first await so its
    // sleep is registered before the paused clock jumps.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    tokio::time::advance(Duration::from_secs(61)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(remote.issue_calls.load(Ordering::SeqCst) >= 1, "auto refresh fired");

    // Removing the vehicle cancels its timer.
    engine.sync_vehicles(&[]);
    let issues = remote.issue_calls.load(Ordering::SeqCst);

    tokio::time::advance(Duration::from_secs(600)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(remote.issue_calls.load(Ordering::SeqCst), issues, "timer stopped with vehicle");
}
