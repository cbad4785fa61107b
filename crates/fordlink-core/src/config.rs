// ── Engine runtime settings ──
//
// Tuning knobs for the engine and scheduler. Built by the host
// process (typically from `fordlink-config`) -- core never reads
// config files.

use std::time::Duration;

use crate::executor::DEFAULT_MAX_POLL_ATTEMPTS;

/// Runtime settings for a [`VehicleEngine`](crate::VehicleEngine).
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Enable per-vehicle auto-refresh timers.
    pub auto_refresh: bool,
    /// Interval between per-vehicle auto-refresh cycles.
    pub refresh_rate: Duration,
    /// Interval between full-state refresh sweeps over all vehicles.
    pub full_refresh_interval: Duration,
    /// Bound on status polls per command cycle.
    pub max_poll_attempts: u32,
    /// Delay between status polls. Zero means poll back-to-back.
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_rate: Duration::from_secs(180 * 60),
            full_refresh_interval: Duration::from_secs(5 * 60),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            poll_interval: Duration::from_secs(2),
        }
    }
}
