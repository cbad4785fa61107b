//! Async client for the FordPass remote-vehicle API.
//!
//! Two surfaces:
//!
//! - **[`ConnectionClient`]** -- reqwest-based implementation covering
//!   SSO token exchange (`authenticate` / `renew_token`) and the
//!   vehicle API (`list_vehicles`, `issue_command`, `poll_command`,
//!   `fetch_vehicle_status`). Remote commands execute asynchronously
//!   on the vehicle side; issuance returns a [`CommandId`] to poll.
//!
//! - **[`RemoteControl`]** -- the trait seam `fordlink-core` consumes.
//!   Engine logic is written against `Arc<dyn RemoteControl>` so tests
//!   can script remote behavior without a server.

pub mod client;
pub mod error;
pub mod models;
pub mod remote;

pub use client::{ConnectionClient, ConnectionConfig};
pub use error::Error;
pub use models::{
    CommandId, CommandStatus, Field, TokenSet, VehicleDescriptor, VehicleDetailsSection,
    VehicleStatusEnvelope, VehicleStatusSection,
};
pub use remote::RemoteControl;
