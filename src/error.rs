//! Command Gateway Errors
//!
//! Every failure a caller of the gateway can observe. Classification errors
//! (`NotWhitelisted`, `Forbidden`) are raised before anything is spawned.

use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Result alias for gateway operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Error types for command authorization and execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    #[error("Command not whitelisted: {command}")]
    NotWhitelisted { command: String },

    #[error("Command is forbidden: {command}")]
    Forbidden { command: String },

    #[error("No pending command with ID: {id}")]
    NotFound { id: Uuid },

    #[error("{reason}")]
    Denied { reason: String },

    #[error("Command execution failed: {command}: {cause}")]
    Execution {
        command: String,
        cause: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Command execution failed: {command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

impl CommandError {
    /// Spawn or IO failure with the underlying cause attached
    pub fn spawn_failed(command: &str, err: &std::io::Error) -> Self {
        Self::Execution {
            command: command.to_string(),
            cause: err.to_string(),
            exit_code: None,
            stderr: String::new(),
        }
    }

    /// True for the errors that reject a command before it reaches a process
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::NotWhitelisted { .. } | Self::Forbidden { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_displays_bare_reason() {
        let err = CommandError::Denied {
            reason: "not allowed".to_string(),
        };
        assert_eq!(err.to_string(), "not allowed");
    }

    #[test]
    fn test_policy_rejection() {
        assert!(CommandError::NotWhitelisted {
            command: "foo".to_string()
        }
        .is_policy_rejection());
        assert!(CommandError::Forbidden {
            command: "rm".to_string()
        }
        .is_policy_rejection());
        assert!(!CommandError::NotFound { id: Uuid::new_v4() }.is_policy_rejection());
    }

    #[test]
    fn test_spawn_failed_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CommandError::spawn_failed("ghost", &io);
        match err {
            CommandError::Execution {
                command,
                cause,
                exit_code,
                ..
            } => {
                assert_eq!(command, "ghost");
                assert!(cause.contains("no such file"));
                assert_eq!(exit_code, None);
            }
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_serialize_tagged() {
        let err = CommandError::Forbidden {
            command: "rm".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "forbidden");
        assert_eq!(json["command"], "rm");
    }
}
