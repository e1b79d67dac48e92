//! Pending Commands
//!
//! A pending command is a classified-but-unresolved invocation. Its fate is
//! published through a per-id `watch` channel carrying an `ApprovalStatus`,
//! which the blocking caller awaits or an external approver polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{CommandError, CommandResult};
use crate::tools::ExecutionResult;

/// A command awaiting approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommand {
    /// Unique identifier (UUID v4, never reused)
    pub id: Uuid,

    /// Command as originally requested (path included)
    pub command: String,

    pub args: Vec<String>,

    /// When the command was queued (UTC)
    pub requested_at: DateTime<Utc>,

    /// Who asked for it, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

impl PendingCommand {
    pub fn new(command: String, args: Vec<String>, requested_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            args,
            requested_at: Utc::now(),
            requested_by,
        }
    }

    /// Command line for display
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Completion state of a pending command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Not yet approved or denied
    Pending,
    /// Approved and executed successfully
    Approved(ExecutionResult),
    /// Denied with a reason
    Denied { reason: String },
    /// Approved but execution failed
    Failed { error: CommandError },
}

impl ApprovalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }

    /// Convert a settled status into the caller-facing result
    ///
    /// Returns `None` while still pending.
    pub fn into_result(self) -> Option<CommandResult<ExecutionResult>> {
        match self {
            ApprovalStatus::Pending => None,
            ApprovalStatus::Approved(result) => Some(Ok(result)),
            ApprovalStatus::Denied { reason } => Some(Err(CommandError::Denied { reason })),
            ApprovalStatus::Failed { error } => Some(Err(error)),
        }
    }
}

/// Handle on a queued command
///
/// Dropping the handle does not cancel anything; the command stays pending
/// until approved or denied.
#[derive(Debug, Clone)]
pub struct PendingHandle {
    id: Uuid,
    status: watch::Receiver<ApprovalStatus>,
}

impl PendingHandle {
    pub(crate) fn new(id: Uuid, status: watch::Receiver<ApprovalStatus>) -> Self {
        Self { id, status }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status without waiting
    pub fn status(&self) -> ApprovalStatus {
        self.status.borrow().clone()
    }

    /// Wait until the command is approved, denied or fails
    ///
    /// If the broker is dropped while the command is still pending the wait
    /// ends with a `Denied` error.
    pub async fn wait(mut self) -> CommandResult<ExecutionResult> {
        loop {
            if let Some(result) = self.status.borrow_and_update().clone().into_result() {
                return result;
            }
            if self.status.changed().await.is_err() {
                return self.status.borrow().clone().into_result().unwrap_or_else(|| {
                    Err(CommandError::Denied {
                        reason: "Approval broker shut down".to_string(),
                    })
                });
            }
        }
    }
}
