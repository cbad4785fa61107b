// ── Per-vehicle single-flight command execution ──
//
// The core correctness property of the engine: at most one command
// cycle per vehicle at any instant. Acquisition is a single atomic
// compare-and-swap (never check-then-set across an await point), and
// release is an RAII guard so the flag clears on every exit path of
// the wait loop, panics included.
//
// Command cycle: IDLE -> ISSUING -> POLLING -> terminal -> IDLE.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use fordlink_api::{CommandId, CommandStatus, RemoteControl};

use crate::command::{TerminalStatus, VehicleCommand};
use crate::error::CoreError;
use crate::model::VehicleId;
use crate::store::VehicleStateStore;

/// Default bound on status polls per command cycle.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Clears the in-flight flag when dropped.
struct InFlightRelease<'a>(&'a AtomicBool);

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes command issuance and drives the poll-until-terminal
/// loop for one vehicle.
pub struct CommandExecutor {
    vehicle_id: VehicleId,
    client: Arc<dyn RemoteControl>,
    store: Arc<VehicleStateStore>,
    in_flight: AtomicBool,
    /// Delay between poll attempts. Zero is valid (tests poll tight).
    poll_interval: Duration,
}

impl CommandExecutor {
    pub(crate) fn new(
        vehicle_id: VehicleId,
        client: Arc<dyn RemoteControl>,
        store: Arc<VehicleStateStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            vehicle_id,
            client,
            store,
            in_flight: AtomicBool::new(false),
            poll_interval,
        }
    }

    /// Whether a command cycle is currently active.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Issue a command to the vehicle.
    ///
    /// Rejects immediately with [`CoreError::CommandInProgress`] when a
    /// cycle is already active -- no queuing. On success the in-flight
    /// flag stays held for [`await_completion`](Self::await_completion);
    /// on transport failure it is released before returning.
    pub async fn issue(&self, command: VehicleCommand) -> Result<CommandId, CoreError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(vehicle_id = %self.vehicle_id, ?command, "command rejected -- already in flight");
            return Err(CoreError::CommandInProgress {
                vehicle_id: self.vehicle_id.to_string(),
            });
        }

        let token = command.remote_token();
        match self.client.issue_command(self.vehicle_id.as_str(), token).await {
            Ok(command_id) => {
                debug!(vehicle_id = %self.vehicle_id, ?command, %command_id, "command issued");
                Ok(command_id)
            }
            Err(e) => {
                self.in_flight.store(false, Ordering::Release);
                warn!(vehicle_id = %self.vehicle_id, ?command, error = %e, "command issuance failed");
                Err(e.into())
            }
        }
    }

    /// Poll the issued command until a terminal status, up to
    /// `max_attempts` polls, stopping at the first non-QUEUED result.
    ///
    /// Exhausting attempts while still QUEUED yields
    /// [`TerminalStatus::TimedOut`]; a poll transport failure yields
    /// [`TerminalStatus::Failed`]. A non-Refresh SUCCESS triggers
    /// exactly one follow-up state fetch before the flag is released,
    /// so cached state reflects the just-applied change. The in-flight
    /// flag is released on every exit path.
    pub async fn await_completion(
        &self,
        command_id: &CommandId,
        command: VehicleCommand,
        max_attempts: u32,
    ) -> TerminalStatus {
        let _release = InFlightRelease(&self.in_flight);
        let token = command.remote_token();

        for attempt in 1..=max_attempts {
            match self
                .client
                .poll_command(command_id, self.vehicle_id.as_str(), token)
                .await
            {
                Ok(CommandStatus::Queued) => {
                    if attempt < max_attempts && !self.poll_interval.is_zero() {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                Ok(CommandStatus::Success) => {
                    debug!(vehicle_id = %self.vehicle_id, ?command, attempt, "command succeeded");
                    if !command.is_refresh() {
                        if let Err(e) = self.store.refresh().await {
                            warn!(
                                vehicle_id = %self.vehicle_id,
                                error = %e,
                                "post-command state fetch failed"
                            );
                        }
                    }
                    return TerminalStatus::Success;
                }
                Ok(CommandStatus::Failed) => {
                    warn!(vehicle_id = %self.vehicle_id, ?command, %command_id, "command failed remotely");
                    return TerminalStatus::Failed;
                }
                Err(e) => {
                    warn!(vehicle_id = %self.vehicle_id, ?command, error = %e, "command poll failed");
                    return TerminalStatus::Failed;
                }
            }
        }

        debug!(
            vehicle_id = %self.vehicle_id,
            ?command,
            max_attempts,
            "command still queued after poll budget -- timing out"
        );
        TerminalStatus::TimedOut
    }

    /// Issue + await in one call. Used by the scheduler's refresh
    /// cycles; bridging layers that need the command id call the two
    /// steps separately.
    pub async fn execute(
        &self,
        command: VehicleCommand,
        max_attempts: u32,
    ) -> Result<TerminalStatus, CoreError> {
        let command_id = self.issue(command).await?;
        Ok(self.await_completion(&command_id, command, max_attempts).await)
    }
}
