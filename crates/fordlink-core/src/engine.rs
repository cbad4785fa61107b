// ── Engine composition root ──
//
// Owns one executor + one store per tracked vehicle, looked up
// through an explicit registry keyed by normalized vehicle id.
// Cheaply cloneable via `Arc<EngineInner>`; background tasks hold a
// clone and observe registry changes on their next cycle.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fordlink_api::{CommandId, RemoteControl, VehicleDescriptor};

use crate::command::{TerminalStatus, VehicleCommand};
use crate::config::EngineSettings;
use crate::error::CoreError;
use crate::executor::CommandExecutor;
use crate::model::{VehicleId, VehicleState};
use crate::scheduler::auto_refresh_task;
use crate::store::VehicleStateStore;

/// Everything the engine owns for one tracked vehicle.
pub struct VehicleHandle {
    vehicle_id: VehicleId,
    display_name: String,
    store: Arc<VehicleStateStore>,
    executor: CommandExecutor,
    /// Child of the engine token -- cancelled when the vehicle is
    /// removed from tracking, stopping its auto-refresh task.
    cancel: CancellationToken,
}

impl VehicleHandle {
    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn store(&self) -> &VehicleStateStore {
        &self.store
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }
}

/// The engine facade exposed to the bridging layer.
#[derive(Clone)]
pub struct VehicleEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    client: Arc<dyn RemoteControl>,
    settings: EngineSettings,
    vehicles: DashMap<VehicleId, Arc<VehicleHandle>>,
    cancel: CancellationToken,
}

impl VehicleEngine {
    pub fn new(client: Arc<dyn RemoteControl>, settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                client,
                settings,
                vehicles: DashMap::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub(crate) fn client(&self) -> &Arc<dyn RemoteControl> {
        &self.inner.client
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    // ── Vehicle tracking ─────────────────────────────────────────────

    /// Reconcile tracked vehicles against a fetched vehicle list.
    ///
    /// New entries get a fresh store/executor (and an auto-refresh
    /// task when enabled); entries absent from the list are removed
    /// and their tasks cancelled. Surviving vehicles are untouched --
    /// in-flight commands keep running.
    pub fn sync_vehicles(&self, descriptors: &[VehicleDescriptor]) {
        let incoming: HashSet<VehicleId> = descriptors
            .iter()
            .map(|d| VehicleId::new(&d.vehicle_id))
            .collect();

        for descriptor in descriptors {
            let id = VehicleId::new(&descriptor.vehicle_id);
            if !self.inner.vehicles.contains_key(&id) {
                self.track(id, descriptor.display_name());
            }
        }

        let stale: Vec<VehicleId> = self
            .inner
            .vehicles
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| !incoming.contains(id))
            .collect();
        for id in stale {
            if let Some((_, handle)) = self.inner.vehicles.remove(&id) {
                handle.cancel.cancel();
                info!(vehicle_id = %id, "vehicle removed from tracking");
            }
        }
    }

    /// Fetch the account's vehicle list and reconcile against it.
    pub async fn sync_from_remote(&self) -> Result<(), CoreError> {
        let descriptors = self.inner.client.list_vehicles().await?;
        debug!(count = descriptors.len(), "vehicle list fetched");
        self.sync_vehicles(&descriptors);
        Ok(())
    }

    fn track(&self, id: VehicleId, display_name: String) {
        let store = Arc::new(VehicleStateStore::new(id.clone(), Arc::clone(&self.inner.client)));
        let executor = CommandExecutor::new(
            id.clone(),
            Arc::clone(&self.inner.client),
            Arc::clone(&store),
            self.inner.settings.poll_interval,
        );
        let cancel = self.inner.cancel.child_token();

        let handle = Arc::new(VehicleHandle {
            vehicle_id: id.clone(),
            display_name,
            store,
            executor,
            cancel: cancel.clone(),
        });

        let settings = &self.inner.settings;
        if settings.auto_refresh && !settings.refresh_rate.is_zero() {
            tokio::spawn(auto_refresh_task(
                Arc::clone(&handle),
                settings.refresh_rate,
                settings.max_poll_attempts,
                cancel,
            ));
        }

        info!(vehicle_id = %id, name = %handle.display_name, "vehicle tracked");
        self.inner.vehicles.insert(id, handle);
    }

    /// Look up a tracked vehicle by id (any case).
    pub fn vehicle(&self, vehicle_id: &str) -> Option<Arc<VehicleHandle>> {
        self.inner
            .vehicles
            .get(&VehicleId::new(vehicle_id))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All tracked vehicle handles.
    pub fn vehicles(&self) -> Vec<Arc<VehicleHandle>> {
        self.inner
            .vehicles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    // ── Command / query contract ─────────────────────────────────────

    /// Issue a command on a vehicle. The in-flight flag stays held;
    /// callers follow up with
    /// [`CommandExecutor::await_completion`] via [`vehicle()`](Self::vehicle).
    pub async fn issue_command(
        &self,
        vehicle_id: &str,
        command: VehicleCommand,
    ) -> Result<CommandId, CoreError> {
        let handle = self.require(vehicle_id)?;
        handle.executor.issue(command).await
    }

    /// Full command cycle: issue, poll to terminal, implicit fetch.
    pub async fn execute_command(
        &self,
        vehicle_id: &str,
        command: VehicleCommand,
    ) -> Result<TerminalStatus, CoreError> {
        let handle = self.require(vehicle_id)?;
        handle
            .executor
            .execute(command, self.inner.settings.max_poll_attempts)
            .await
    }

    /// Cached state for a vehicle. Never triggers a network call;
    /// `None` for untracked vehicles or before the first refresh.
    pub fn vehicle_state(&self, vehicle_id: &str) -> Option<Arc<VehicleState>> {
        self.vehicle(vehicle_id).and_then(|handle| handle.store.current())
    }

    fn require(&self, vehicle_id: &str) -> Result<Arc<VehicleHandle>, CoreError> {
        self.vehicle(vehicle_id).ok_or_else(|| CoreError::VehicleNotFound {
            identifier: vehicle_id.to_owned(),
        })
    }

    /// Cancel all per-vehicle tasks. Scheduler shutdown is separate
    /// (see [`RefreshScheduler::shutdown`](crate::RefreshScheduler::shutdown)).
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}
