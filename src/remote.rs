//! # Remote Command Interface
//!
//! The contract the web layer drives: command tokens in, status out.
//!
//! Accepted tokens are `enable`, `disable`, `brush1`..`brush3` and
//! `wheel1`..`wheel3`. Each maps to exactly one [`ModeState`] operation and
//! answers with the resulting status. Any other token leaves the state
//! untouched and answers `{"status": "Unknown"}`.
//!
//! ```
//! use rover_teleop::mode::ModeState;
//! use rover_teleop::remote::handle_command;
//!
//! let mode = ModeState::new();
//! let reply = handle_command(&mode, "brush2");
//! assert_eq!(reply.to_json(), r#"{"enabled":false,"brush":2,"wheel":1}"#);
//! ```

use serde::Serialize;
use tracing::warn;

use crate::mode::{ModeCommand, ModeState, StatusSnapshot};

/// Reply to a remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RemoteResponse {
    /// Status after the command was applied.
    Status(StatusSnapshot),
    /// The token was not recognized.
    Unknown { status: &'static str },
}

impl RemoteResponse {
    const UNKNOWN: RemoteResponse = RemoteResponse::Unknown { status: "Unknown" };

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, RemoteResponse::Unknown { .. })
    }

    /// JSON body for the HTTP reply.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serializing plain structs of bools and integers cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Applies one command token and reports the resulting status.
pub fn handle_command(mode: &ModeState, token: &str) -> RemoteResponse {
    match token.parse::<ModeCommand>() {
        Ok(command) => {
            mode.apply(command);
            RemoteResponse::Status(mode.snapshot())
        }
        Err(e) => {
            warn!("Rejected remote command: {}", e);
            RemoteResponse::UNKNOWN
        }
    }
}

/// Current status, for the web layer's status endpoint.
#[must_use]
pub fn status(mode: &ModeState) -> RemoteResponse {
    RemoteResponse::Status(mode.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_maps_to_status() {
        let mode = ModeState::new();
        let expected = [
            ("enable", StatusSnapshot { enabled: true, brush: 0, wheel: 1 }),
            ("brush3", StatusSnapshot { enabled: true, brush: 3, wheel: 1 }),
            ("wheel2", StatusSnapshot { enabled: true, brush: 3, wheel: 2 }),
            ("brush1", StatusSnapshot { enabled: true, brush: 1, wheel: 2 }),
            ("wheel3", StatusSnapshot { enabled: true, brush: 1, wheel: 3 }),
            ("brush2", StatusSnapshot { enabled: true, brush: 2, wheel: 3 }),
            ("wheel1", StatusSnapshot { enabled: true, brush: 2, wheel: 1 }),
            ("disable", StatusSnapshot { enabled: false, brush: 2, wheel: 1 }),
        ];

        for (token, snapshot) in expected {
            assert_eq!(handle_command(&mode, token), RemoteResponse::Status(snapshot), "token {}", token);
        }
    }

    #[test]
    fn test_repeated_command_is_idempotent() {
        let mode = ModeState::new();
        let first = handle_command(&mode, "wheel3");
        let second = handle_command(&mode, "wheel3");
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_token_leaves_state_unchanged() {
        let mode = ModeState::new();
        handle_command(&mode, "brush2");
        let before = mode.snapshot();

        let reply = handle_command(&mode, "turbo");
        assert!(reply.is_unknown());
        assert_eq!(reply.to_json(), r#"{"status":"Unknown"}"#);
        assert_eq!(mode.snapshot(), before);
    }

    #[test]
    fn test_status_reply() {
        let mode = ModeState::new();
        mode.enable();
        let json: serde_json::Value = serde_json::from_str(&status(&mode).to_json()).unwrap();
        assert_eq!(json, serde_json::json!({"enabled": true, "brush": 0, "wheel": 1}));
    }

    #[test]
    fn test_commands_from_other_thread_visible() {
        use std::sync::Arc;

        let mode = Arc::new(ModeState::new());
        let remote = Arc::clone(&mode);
        std::thread::spawn(move || {
            handle_command(&remote, "enable");
            handle_command(&remote, "wheel2");
        })
        .join()
        .unwrap();

        assert!(mode.is_enabled());
        assert_eq!(mode.max_speed(), 45);
    }
}
