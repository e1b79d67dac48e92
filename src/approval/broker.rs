//! Approval Broker
//!
//! Owns the set of commands awaiting approval and drives each one through
//! `Pending -> {Approved, Denied}`. Resolution is single-shot: an id leaves
//! the pending set the moment it is claimed by `approve` or `deny`, and ids
//! are never reused.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::pending::{ApprovalStatus, PendingCommand, PendingHandle};
use crate::error::{CommandError, CommandResult};
use crate::events::{CommandEvent, EventBus, APPROVAL_TIMEOUT_MESSAGE};
use crate::tools::{CommandRunner, ExecutionResult};

/// Default delay before an `approval_timeout` notification
pub const DEFAULT_WATCHDOG_DELAY: Duration = Duration::from_secs(5);

/// Reason used when a denial gives none
pub const DEFAULT_DENIAL_REASON: &str = "Command denied";

struct PendingEntry {
    command: PendingCommand,
    status: watch::Sender<ApprovalStatus>,
    watchdog: Option<AbortHandle>,
}

impl PendingEntry {
    fn settle(self, status: ApprovalStatus) {
        if let Some(watchdog) = &self.watchdog {
            watchdog.abort();
        }
        // No receivers (non-blocking enqueue, handle dropped) is fine
        self.status.send_replace(status);
    }
}

type PendingMap = Arc<Mutex<HashMap<Uuid, PendingEntry>>>;

/// Broker for commands that require approval
pub struct ApprovalBroker {
    runner: Arc<dyn CommandRunner>,
    events: EventBus,
    pending: PendingMap,
    watchdog_delay: Duration,
}

impl ApprovalBroker {
    /// Create a broker that runs approved commands through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>, events: EventBus) -> Self {
        Self {
            runner,
            events,
            pending: Arc::new(Mutex::new(HashMap::new())),
            watchdog_delay: DEFAULT_WATCHDOG_DELAY,
        }
    }

    /// Override the watchdog delay
    pub fn with_watchdog_delay(mut self, delay: Duration) -> Self {
        self.watchdog_delay = delay;
        self
    }

    pub fn watchdog_delay(&self) -> Duration {
        self.watchdog_delay
    }

    /// Queue a command and return immediately
    ///
    /// The `pending` event is published before this returns. The handle may
    /// be dropped; the command then resolves only through `approve`/`deny`
    /// and its outcome is observable through events.
    pub fn enqueue_non_blocking(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        requested_by: Option<String>,
    ) -> PendingHandle {
        let pending = PendingCommand::new(command.into(), args, requested_by);
        let id = pending.id;
        let (status, receiver) = watch::channel(ApprovalStatus::Pending);

        self.pending.lock().insert(
            id,
            PendingEntry {
                command: pending.clone(),
                status,
                watchdog: None,
            },
        );

        debug!(%id, command = %pending.display_line(), "Queued for approval");
        self.events.publish(CommandEvent::Pending(pending));

        // Armed only once the entry is visible, so even a zero delay sees it
        if let Some(watchdog) = self.arm_watchdog(id) {
            match self.pending.lock().get_mut(&id) {
                Some(entry) => entry.watchdog = Some(watchdog),
                None => watchdog.abort(),
            }
        }

        PendingHandle::new(id, receiver)
    }

    /// Queue a command and wait until it is approved or denied
    ///
    /// # Errors
    ///
    /// - `CommandError::Denied` carrying the denial reason
    /// - the execution error if the approved command fails
    pub async fn enqueue_blocking(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        requested_by: Option<String>,
    ) -> CommandResult<ExecutionResult> {
        self.enqueue_non_blocking(command, args, requested_by)
            .wait()
            .await
    }

    /// Approve and execute a pending command
    ///
    /// The command is not re-validated against the whitelist; being queued
    /// already reflects the policy decision.
    ///
    /// # Errors
    ///
    /// - `CommandError::NotFound` if the id is unknown or already resolved
    /// - the execution error if the command fails (also published as `failed`)
    pub async fn approve(&self, id: Uuid) -> CommandResult<ExecutionResult> {
        let entry = self.claim(id)?;
        let command = entry.command.clone();
        info!(%id, command = %command.display_line(), "Running approved command");

        match self.runner.run(&command.command, &command.args, None).await {
            Ok(result) => {
                debug!(%id, stdout_len = result.stdout.len(), "Approved command finished");
                self.events.publish(CommandEvent::Approved {
                    id,
                    stdout: result.stdout.clone(),
                    stderr: result.stderr.clone(),
                });
                entry.settle(ApprovalStatus::Approved(result.clone()));
                Ok(result)
            }
            Err(err) => {
                error!(%id, error = %err, "Approved command failed");
                self.events.publish(CommandEvent::Failed {
                    id,
                    error: err.to_string(),
                });
                entry.settle(ApprovalStatus::Failed { error: err.clone() });
                Err(err)
            }
        }
    }

    /// Deny a pending command
    ///
    /// # Errors
    ///
    /// `CommandError::NotFound` if the id is unknown or already resolved
    pub fn deny(&self, id: Uuid, reason: Option<String>) -> CommandResult<()> {
        let entry = self.claim(id)?;
        let reason = reason.unwrap_or_else(|| DEFAULT_DENIAL_REASON.to_string());

        info!(%id, %reason, "Command denied");
        self.events.publish(CommandEvent::Denied {
            id,
            reason: reason.clone(),
        });
        entry.settle(ApprovalStatus::Denied { reason });
        Ok(())
    }

    /// Snapshot of pending commands, oldest first
    pub fn list(&self) -> Vec<PendingCommand> {
        let mut commands: Vec<PendingCommand> = self
            .pending
            .lock()
            .values()
            .map(|entry| entry.command.clone())
            .collect();
        commands.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        commands
    }

    /// Look up a pending command
    pub fn get(&self, id: Uuid) -> Option<PendingCommand> {
        self.pending.lock().get(&id).map(|entry| entry.command.clone())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Remove an entry so no other caller can resolve it
    fn claim(&self, id: Uuid) -> CommandResult<PendingEntry> {
        let entry = self.pending.lock().remove(&id);
        entry.ok_or_else(|| {
            debug!("No pending command with ID: {}", id);
            CommandError::NotFound { id }
        })
    }

    /// Schedule the observational timeout notification
    ///
    /// Never removes or denies the command.
    fn arm_watchdog(&self, id: Uuid) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; approval watchdog disabled for {}", id);
            return None;
        };

        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let delay = self.watchdog_delay;

        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let still_pending = pending.lock().contains_key(&id);
            if still_pending {
                warn!(%id, ?delay, "Command still awaiting approval");
                events.publish(CommandEvent::ApprovalTimeout {
                    id,
                    message: APPROVAL_TIMEOUT_MESSAGE.to_string(),
                });
            }
        });
        Some(task.abort_handle())
    }
}

impl Drop for ApprovalBroker {
    fn drop(&mut self) {
        for (_, entry) in self.pending.lock().drain() {
            if let Some(watchdog) = entry.watchdog {
                watchdog.abort();
            }
        }
    }
}
