// The client seam consumed by fordlink-core.
//
// Core logic never talks to reqwest directly -- it holds an
// `Arc<dyn RemoteControl>` so engine tests can substitute a scripted
// implementation for the real HTTP client.

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{CommandId, CommandStatus, TokenSet, VehicleDescriptor, VehicleStatusEnvelope};

/// Authenticated access to the remote vehicle service.
///
/// Every operation is asynchronous and fallible; implementations are
/// expected to be rate-limited by the remote side, not by the caller.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Exchange stored credentials for an access/refresh token pair.
    async fn authenticate(&self) -> Result<TokenSet, Error>;

    /// Renew the access token using the stored refresh token.
    async fn renew_token(&self) -> Result<TokenSet, Error>;

    /// List all vehicles on the account.
    async fn list_vehicles(&self) -> Result<Vec<VehicleDescriptor>, Error>;

    /// Issue a remote command. The vehicle executes it asynchronously;
    /// the returned id is the handle for status polling.
    async fn issue_command(&self, vehicle_id: &str, command_type: &str)
        -> Result<CommandId, Error>;

    /// Poll the status of a previously issued command.
    async fn poll_command(
        &self,
        command_id: &CommandId,
        vehicle_id: &str,
        command_type: &str,
    ) -> Result<CommandStatus, Error>;

    /// Fetch the full state snapshot for one vehicle.
    async fn fetch_vehicle_status(&self, vehicle_id: &str)
        -> Result<VehicleStatusEnvelope, Error>;
}
