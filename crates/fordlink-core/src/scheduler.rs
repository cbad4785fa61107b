// ── Background refresh scheduling ──
//
// Three timer families, all tied to cancellation tokens:
//   - token renewal, firing 10s before each access-token expiry
//   - a full-state refresh sweep over all tracked vehicles (5 min)
//   - optional per-vehicle auto-refresh (spawned by the engine, tied
//     to the vehicle handle's token so removal stops it)
//
// Overlap with user-triggered commands is resolved entirely by the
// executor's single-flight guard: the losing cycle sees
// `CommandInProgress` and skips, silently.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fordlink_api::{RemoteControl, TokenSet};

use crate::command::VehicleCommand;
use crate::engine::{VehicleEngine, VehicleHandle};

/// Margin before token expiry at which renewal fires.
const RENEWAL_MARGIN: Duration = Duration::from_secs(10);
/// Floor on the renewal delay; also the retry delay after a failed
/// renewal (fatal for that cycle only, never for the process).
const RENEWAL_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Process-wide timers with an explicit lifecycle.
///
/// [`start`](Self::start) is called once after initial authentication;
/// [`shutdown`](Self::shutdown) cancels and joins everything for clean
/// restarts and deterministic tests.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the token-renewal and full-refresh timers.
    ///
    /// `tokens` is the set returned by the initial authentication; its
    /// expiry seeds the first renewal delay.
    pub fn start(&self, engine: &VehicleEngine, tokens: &TokenSet) {
        let mut handles = self.handles.lock().expect("scheduler lock poisoned");

        handles.push(tokio::spawn(token_renewal_task(
            Arc::clone(engine.client()),
            tokens.expires_in_secs,
            self.cancel.child_token(),
        )));

        let interval = engine.settings().full_refresh_interval;
        if !interval.is_zero() {
            handles.push(tokio::spawn(full_refresh_task(
                engine.clone(),
                interval,
                self.cancel.child_token(),
            )));
        }
    }

    /// Cancel all timers and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<JoinHandle<()>> = {
            let mut handles = self.handles.lock().expect("scheduler lock poisoned");
            handles.drain(..).collect()
        };
        for handle in drained {
            let _ = handle.await;
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay until the next token renewal: 10s before expiry, floored so
/// a pathologically short lifetime cannot turn this into a busy loop.
fn renewal_delay(expires_in_secs: u64) -> Duration {
    let lifetime = Duration::from_secs(expires_in_secs);
    lifetime
        .saturating_sub(RENEWAL_MARGIN)
        .max(RENEWAL_RETRY_DELAY)
}

/// Renew the access token shortly before each expiry, rescheduling
/// with the fresh expiry after every renewal.
async fn token_renewal_task(
    client: Arc<dyn RemoteControl>,
    initial_expires_in_secs: u64,
    cancel: CancellationToken,
) {
    let mut expires_in_secs = initial_expires_in_secs;
    loop {
        let delay = renewal_delay(expires_in_secs);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {
                match client.renew_token().await {
                    Ok(tokens) => {
                        debug!(expires_in = tokens.expires_in_secs, "access token renewed");
                        expires_in_secs = tokens.expires_in_secs;
                    }
                    Err(e) => {
                        warn!(error = %e, "token renewal failed -- retrying");
                        expires_in_secs = RENEWAL_RETRY_DELAY.as_secs();
                    }
                }
            }
        }
    }
    debug!("token renewal task stopped");
}

/// Periodic full-state sweep: one refresh cycle per tracked vehicle.
/// A single vehicle's failure never halts the sweep or future sweeps.
async fn full_refresh_task(engine: VehicleEngine, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {
                debug!("full refresh sweep starting");
                let max_attempts = engine.settings().max_poll_attempts;
                for handle in engine.vehicles() {
                    refresh_vehicle(&handle, max_attempts).await;
                }
            }
        }
    }
    debug!("full refresh task stopped");
}

/// One refresh cycle for one vehicle: REFRESH through the executor,
/// then a best-effort state fetch. Timeout still fetches (the command
/// may have landed); a lost single-flight race skips the whole cycle.
pub(crate) async fn refresh_vehicle(handle: &VehicleHandle, max_attempts: u32) {
    match handle
        .executor()
        .execute(VehicleCommand::Refresh, max_attempts)
        .await
    {
        Ok(status) => {
            if !status.is_success() {
                debug!(
                    vehicle_id = %handle.vehicle_id(),
                    ?status,
                    "refresh command not confirmed -- fetching state anyway"
                );
            }
        }
        Err(e) if e.is_already_in_progress() => {
            debug!(vehicle_id = %handle.vehicle_id(), "refresh skipped -- command in flight");
            return;
        }
        Err(e) => {
            warn!(vehicle_id = %handle.vehicle_id(), error = %e, "refresh command failed");
        }
    }

    if let Err(e) = handle.store().refresh().await {
        warn!(vehicle_id = %handle.vehicle_id(), error = %e, "state fetch failed during sweep");
    }
}

/// Per-vehicle auto-refresh: issues a REFRESH command (not a raw state
/// fetch) every `every`, until the vehicle's token is cancelled.
pub(crate) async fn auto_refresh_task(
    handle: Arc<VehicleHandle>,
    every: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(every) => {
                debug!(vehicle_id = %handle.vehicle_id(), "auto refresh firing");
                match handle.executor().execute(VehicleCommand::Refresh, max_attempts).await {
                    Ok(status) => {
                        debug!(vehicle_id = %handle.vehicle_id(), ?status, "auto refresh finished");
                    }
                    Err(e) if e.is_already_in_progress() => {
                        debug!(vehicle_id = %handle.vehicle_id(), "auto refresh skipped -- command in flight");
                    }
                    Err(e) => {
                        warn!(vehicle_id = %handle.vehicle_id(), error = %e, "auto refresh failed");
                    }
                }
            }
        }
    }
    debug!(vehicle_id = %handle.vehicle_id(), "auto refresh task stopped");
}
