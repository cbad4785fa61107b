// ── Per-vehicle state store ──
//
// Last-good snapshot behind a `watch` channel. Reads are non-blocking
// Arc clones; a refresh either replaces the snapshot whole or leaves
// it untouched. There is no partial-application window: the new state
// is fully built before the channel is written.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use fordlink_api::{RemoteControl, VehicleStatusEnvelope};

use crate::error::CoreError;
use crate::model::{VehicleId, VehicleState};

/// Holds the last-known full state snapshot for one vehicle.
pub struct VehicleStateStore {
    vehicle_id: VehicleId,
    client: Arc<dyn RemoteControl>,
    snapshot: watch::Sender<Option<Arc<VehicleState>>>,
}

impl VehicleStateStore {
    pub(crate) fn new(vehicle_id: VehicleId, client: Arc<dyn RemoteControl>) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            vehicle_id,
            client,
            snapshot,
        }
    }

    /// Fetch fresh state and replace the stored snapshot atomically.
    ///
    /// An auth-expired rejection triggers one token renewal and one
    /// retry before the cycle is given up. On any failure the prior
    /// snapshot is retained unchanged; the next successful refresh
    /// self-corrects staleness.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let envelope = match self.fetch().await {
            Ok(envelope) => envelope,
            Err(e) if e.is_auth_expired() => {
                debug!(vehicle_id = %self.vehicle_id, "state fetch rejected -- renewing token");
                self.client.renew_token().await.map_err(|e| {
                    warn!(vehicle_id = %self.vehicle_id, error = %e, "token renewal failed");
                    CoreError::from(e)
                })?;
                self.fetch().await.map_err(|e| {
                    warn!(
                        vehicle_id = %self.vehicle_id,
                        error = %e,
                        "state fetch failed after renewal"
                    );
                    CoreError::from(e)
                })?
            }
            Err(e) => {
                warn!(vehicle_id = %self.vehicle_id, error = %e, "state fetch failed");
                return Err(e.into());
            }
        };

        let state = Arc::new(VehicleState::from_envelope(envelope, Utc::now()));
        self.snapshot.send_modify(|snap| *snap = Some(state));
        debug!(vehicle_id = %self.vehicle_id, "state snapshot replaced");
        Ok(())
    }

    async fn fetch(&self) -> Result<VehicleStatusEnvelope, fordlink_api::Error> {
        self.client.fetch_vehicle_status(self.vehicle_id.as_str()).await
    }

    /// The last good snapshot. `None` only before the first successful
    /// refresh. Never triggers a network call.
    pub fn current(&self) -> Option<Arc<VehicleState>> {
        self.snapshot.borrow().clone()
    }

    /// Change-notification receiver so a bridging layer can wake on
    /// refresh completion instead of busy-polling `current()`.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<VehicleState>>> {
        self.snapshot.subscribe()
    }
}
