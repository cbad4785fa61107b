// Domain model for the vehicle engine.
//
// `VehicleState` is an atomic snapshot: the store replaces it whole or
// not at all. The defaulting accessors implement the fail-safe policy
// consumers rely on (assume locked, assume off, full charge).

use chrono::{DateTime, Utc};
use fordlink_api::VehicleStatusEnvelope;
use serde::{Deserialize, Serialize};

/// Charging-status token reported while the vehicle draws AC power.
pub const CHARGING_AC: &str = "ChargingAC";

/// Opaque vehicle identity, case-normalized to uppercase.
///
/// The remote service is case-insensitive about ids but not consistent
/// in what it returns; normalizing at construction keeps registry
/// lookups and reconciliation exact-match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Door lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    Locked,
    Unlocked,
    Unknown,
}

impl LockStatus {
    fn from_token(token: &str) -> Self {
        match token {
            "LOCKED" => Self::Locked,
            "UNLOCKED" => Self::Unlocked,
            _ => Self::Unknown,
        }
    }
}

/// Engine ignition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnitionStatus {
    On,
    Off,
    Unknown,
}

impl IgnitionStatus {
    fn from_token(token: &str) -> Self {
        match token {
            "ON" => Self::On,
            "OFF" => Self::Off,
            _ => Self::Unknown,
        }
    }
}

/// Snapshot of a vehicle's observable state at one point in time.
///
/// Constructed only from a successful full status fetch -- never
/// field-merged. Consumers read through the defaulting accessors.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleState {
    pub lock_status: Option<LockStatus>,
    pub ignition_status: Option<IgnitionStatus>,
    /// Fuel tank level, percent.
    pub fuel_level: Option<f64>,
    /// Traction battery charge, percent (EV / PHEV only).
    pub battery_charge_level: Option<f64>,
    /// Raw charging-status token (e.g. [`CHARGING_AC`]).
    pub charging_status: Option<String>,
    /// Whether a charge cable is plugged in.
    pub plug_status: Option<bool>,
    pub fetched_at: DateTime<Utc>,
}

impl VehicleState {
    /// Build a snapshot from the wire envelope.
    pub fn from_envelope(envelope: VehicleStatusEnvelope, fetched_at: DateTime<Utc>) -> Self {
        let status = envelope.vehicle_status;
        let details = envelope.vehicle_details;
        Self {
            lock_status: status.lock_status.into_value().map(|t| LockStatus::from_token(&t)),
            ignition_status: status
                .ignition_status
                .into_value()
                .map(|t| IgnitionStatus::from_token(&t)),
            fuel_level: status.fuel_level.into_value(),
            battery_charge_level: details.battery_charge_level.into_value(),
            charging_status: status.charging_status.into_value(),
            plug_status: status.plug_status.into_value(),
            fetched_at,
        }
    }

    /// Lock state with the fail-closed default: absent means locked.
    pub fn lock_or_default(&self) -> LockStatus {
        self.lock_status.unwrap_or(LockStatus::Locked)
    }

    /// Ignition state, defaulting to off when absent.
    pub fn ignition_or_default(&self) -> IgnitionStatus {
        self.ignition_status.unwrap_or(IgnitionStatus::Off)
    }

    /// Combined charge level in [0, 100]: fuel when present, else
    /// traction battery, else 100.
    pub fn charge_level(&self) -> f64 {
        self.fuel_level
            .or(self.battery_charge_level)
            .unwrap_or(100.0)
            .clamp(0.0, 100.0)
    }

    /// Whether the vehicle is actively charging on AC.
    pub fn is_charging(&self) -> bool {
        self.charging_status.as_deref() == Some(CHARGING_AC)
    }

    /// Whether a charge cable is connected.
    pub fn is_plugged_in(&self) -> bool {
        self.plug_status.unwrap_or(false)
    }

    /// Low-charge threshold used for battery warnings.
    pub fn is_low_charge(&self) -> bool {
        self.charge_level() < 10.0
    }
}
