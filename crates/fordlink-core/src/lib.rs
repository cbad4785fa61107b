//! Vehicle command/state engine between `fordlink-api` and a
//! home-automation bridging layer.
//!
//! The hard part this crate owns is the command lifecycle: a remote
//! command executes asynchronously on the vehicle, completion is
//! discovered by polling, and cached state must be reconciled with
//! freshly fetched state without overlapping requests per vehicle.
//!
//! - **[`VehicleEngine`]** — composition root: an explicit registry of
//!   per-vehicle handles, reconciled against the account's vehicle
//!   list, delegating commands and queries.
//!
//! - **[`CommandExecutor`]** — per-vehicle single-flight guard:
//!   atomic check-and-set issuance, bounded poll-until-terminal wait,
//!   unconditional flag release, implicit post-success state fetch.
//!
//! - **[`VehicleStateStore`]** — last-good snapshot per vehicle,
//!   replaced whole or not at all, read without blocking.
//!
//! - **[`RefreshScheduler`]** — token renewal and periodic refresh
//!   timers with an explicit `shutdown()` lifecycle.
//!
//! The bridging layer pulls: issue a command, then read the store (or
//! wait on its `watch` receiver) for the refreshed snapshot.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod scheduler;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{TerminalStatus, VehicleCommand};
pub use config::EngineSettings;
pub use engine::{VehicleEngine, VehicleHandle};
pub use error::CoreError;
pub use executor::{CommandExecutor, DEFAULT_MAX_POLL_ATTEMPTS};
pub use model::{IgnitionStatus, LockStatus, VehicleId, VehicleState, CHARGING_AC};
pub use scheduler::RefreshScheduler;
pub use store::VehicleStateStore;

// Wire types consumers need alongside the engine.
pub use fordlink_api::{CommandId, CommandStatus, TokenSet, VehicleDescriptor};
