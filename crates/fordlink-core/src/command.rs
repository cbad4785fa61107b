// Command vocabulary.
//
// `VehicleCommand` is the closed set of requests the bridging layer
// may issue. The token mapping is total -- an unmapped command cannot
// be constructed, so there is no runtime "invalid command" path.

use serde::{Deserialize, Serialize};

/// A request to change or query vehicle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleCommand {
    /// Remote engine start.
    Start,
    /// Cancel a remote start.
    Stop,
    Lock,
    Unlock,
    /// Ask the vehicle to push fresh state to the service.
    Refresh,
}

impl VehicleCommand {
    /// The command-type token the remote API expects.
    pub fn remote_token(self) -> &'static str {
        match self {
            Self::Start => "remoteStart",
            Self::Stop => "stop",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Refresh => "status",
        }
    }

    /// Refresh is the one command whose success needs no follow-up
    /// state fetch -- the fetch is the caller's next step anyway.
    pub fn is_refresh(self) -> bool {
        matches!(self, Self::Refresh)
    }
}

/// Terminal outcome of a command cycle.
///
/// `TimedOut` is not an error: the command may still complete on the
/// vehicle side; callers typically proceed with a best-effort state
/// refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Success,
    Failed,
    TimedOut,
}

impl TerminalStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_tokens_match_the_service_vocabulary() {
        assert_eq!(VehicleCommand::Start.remote_token(), "remoteStart");
        assert_eq!(VehicleCommand::Stop.remote_token(), "stop");
        assert_eq!(VehicleCommand::Lock.remote_token(), "lock");
        assert_eq!(VehicleCommand::Unlock.remote_token(), "unlock");
        assert_eq!(VehicleCommand::Refresh.remote_token(), "status");
    }

    #[test]
    fn only_refresh_skips_the_follow_up_fetch() {
        assert!(VehicleCommand::Refresh.is_refresh());
        assert!(!VehicleCommand::Lock.is_refresh());
        assert!(!VehicleCommand::Start.is_refresh());
    }
}
