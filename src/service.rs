//! Command Authorization Service
//!
//! The operation surface a transport exposes to remote callers. One service
//! instance owns its whitelist, its approval broker and its event bus; any
//! number of independent instances can coexist in a process.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::approval::{ApprovalBroker, PendingCommand, PendingHandle};
use crate::config::Config;
use crate::error::{CommandError, CommandResult};
use crate::events::{EventBus, EventReceiver};
use crate::platform::{HostPlatform, PlatformInfo, PlatformResolver};
use crate::tools::{
    Classification, CommandExecutor, CommandRunner, CommandValidator, ExecutionResult,
};
use crate::whitelist::{SecurityLevel, WhitelistEntry, WhitelistRegistry};

/// Per-call options for `execute_command`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Overrides the service-wide default timeout for a direct run
    pub timeout: Option<Duration>,

    /// Recorded on the pending entry if approval is needed
    pub requested_by: Option<String>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn requested_by(mut self, requester: impl Into<String>) -> Self {
        self.requested_by = Some(requester.into());
        self
    }
}

/// Result of `execute_command`
///
/// `Pending` is neither success nor failure: the command was queued and the
/// caller must surface it as "needs approval".
#[derive(Debug)]
pub enum CommandOutcome {
    Completed(ExecutionResult),
    Pending(PendingHandle),
}

impl CommandOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, CommandOutcome::Pending(_))
    }

    pub fn pending_id(&self) -> Option<Uuid> {
        match self {
            CommandOutcome::Pending(handle) => Some(handle.id()),
            CommandOutcome::Completed(_) => None,
        }
    }
}

/// Command authorization and execution service
pub struct CommandService {
    whitelist: RwLock<WhitelistRegistry>,
    runner: Arc<dyn CommandRunner>,
    broker: ApprovalBroker,
    events: EventBus,
    platform: PlatformInfo,
}

impl CommandService {
    /// Create a service around an explicit registry and runner
    pub fn new(whitelist: WhitelistRegistry, runner: Arc<dyn CommandRunner>) -> Self {
        let platform = HostPlatform;
        let info = PlatformInfo::new(
            platform.platform_family(),
            platform.default_shell_path(),
            false,
        );
        Self::with_parts(whitelist, runner, info)
    }

    fn with_parts(
        whitelist: WhitelistRegistry,
        runner: Arc<dyn CommandRunner>,
        platform: PlatformInfo,
    ) -> Self {
        let events = EventBus::new();
        let broker = ApprovalBroker::new(Arc::clone(&runner), events.clone());
        Self {
            whitelist: RwLock::new(whitelist),
            runner,
            broker,
            events,
            platform,
        }
    }

    /// Build a service from configuration on the running host
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with_platform(config, &HostPlatform)
    }

    /// Build a service from configuration with an explicit platform resolver
    ///
    /// The resolver is consulted for the initial whitelist and, when shell
    /// mode is on, for the shell.
    pub fn from_config_with_platform(config: &Config, platform: &dyn PlatformResolver) -> Self {
        let family = platform.platform_family();
        let executor = CommandExecutor::with_config(config.executor_config(platform));
        let info = PlatformInfo::new(
            family,
            config.shell_path(platform),
            config.execution.shell_mode,
        );

        let mut service = Self::with_parts(
            config.initial_whitelist(family),
            Arc::new(executor),
            info,
        );
        service.broker = service.broker.with_watchdog_delay(config.watchdog_delay());
        info!(
            "Command service ready: platform={}, {} whitelist entries",
            family,
            service.whitelist.read().len()
        );
        service
    }

    /// Change the approval watchdog delay
    pub fn with_watchdog_delay(mut self, delay: Duration) -> Self {
        self.broker = self.broker.with_watchdog_delay(delay);
        self
    }

    /// Classify without acting on the result
    pub fn classify(&self, command: &str, args: &[String]) -> Classification {
        let whitelist = self.whitelist.read();
        CommandValidator::new(&whitelist).classify(command, args)
    }

    /// Classify and either run, queue or reject a command
    ///
    /// Safe commands run immediately. Commands that need approval are queued
    /// without waiting and come back as `CommandOutcome::Pending`.
    ///
    /// # Errors
    ///
    /// - `CommandError::NotWhitelisted` / `CommandError::Forbidden` before
    ///   anything is spawned
    /// - execution or timeout errors from a direct run
    pub async fn execute_command(
        &self,
        command: &str,
        args: Vec<String>,
        options: ExecuteOptions,
    ) -> CommandResult<CommandOutcome> {
        match self.authorize(command, &args)? {
            SecurityLevel::Safe => self
                .runner
                .run(command, &args, options.timeout)
                .await
                .map(CommandOutcome::Completed),
            _ => Ok(CommandOutcome::Pending(self.broker.enqueue_non_blocking(
                command,
                args,
                options.requested_by,
            ))),
        }
    }

    /// Like `execute_command`, but waits for approval instead of returning
    /// a pending handle
    ///
    /// # Errors
    ///
    /// Everything `execute_command` returns, plus `CommandError::Denied` if
    /// the queued command is denied.
    pub async fn execute_command_and_wait(
        &self,
        command: &str,
        args: Vec<String>,
        options: ExecuteOptions,
    ) -> CommandResult<ExecutionResult> {
        match self.authorize(command, &args)? {
            SecurityLevel::Safe => self.runner.run(command, &args, options.timeout).await,
            _ => {
                self.broker
                    .enqueue_blocking(command, args, options.requested_by)
                    .await
            }
        }
    }

    /// Queue a command for approval without classifying it
    pub fn queue_command_for_approval_non_blocking(
        &self,
        command: &str,
        args: Vec<String>,
        requested_by: Option<String>,
    ) -> Uuid {
        self.broker
            .enqueue_non_blocking(command, args, requested_by)
            .id()
    }

    /// Resolve the classification to Safe or RequiresApproval, rejecting
    /// everything else
    fn authorize(&self, command: &str, args: &[String]) -> CommandResult<SecurityLevel> {
        match self.classify(command, args) {
            Classification::NotWhitelisted => {
                warn!("Rejected command not on whitelist: {}", command);
                Err(CommandError::NotWhitelisted {
                    command: command.to_string(),
                })
            }
            Classification::Level(SecurityLevel::Forbidden) => {
                warn!("Rejected forbidden command: {}", command);
                Err(CommandError::Forbidden {
                    command: command.to_string(),
                })
            }
            Classification::Level(level) => Ok(level),
        }
    }

    pub fn get_whitelist(&self) -> Vec<WhitelistEntry> {
        let mut entries = self.whitelist.read().list();
        entries.sort_by(|a, b| a.command.cmp(&b.command));
        entries
    }

    pub fn add_to_whitelist(&self, entry: WhitelistEntry) {
        info!(
            "Whitelist add: {} ({})",
            entry.command, entry.security_level
        );
        self.whitelist.write().add(entry);
    }

    /// Returns whether an entry existed
    pub fn update_security_level(&self, command: &str, level: SecurityLevel) -> bool {
        let updated = self.whitelist.write().update_level(command, level);
        if updated {
            info!("Whitelist update: {} -> {}", command, level);
        }
        updated
    }

    /// Returns whether an entry existed
    pub fn remove_from_whitelist(&self, command: &str) -> bool {
        let removed = self.whitelist.write().remove(command).is_some();
        if removed {
            info!("Whitelist remove: {}", command);
        }
        removed
    }

    pub fn get_pending_commands(&self) -> Vec<PendingCommand> {
        self.broker.list()
    }

    /// Approve and run a pending command
    ///
    /// # Errors
    ///
    /// `CommandError::NotFound` for unknown or resolved ids, or the
    /// command's execution error
    pub async fn approve_command(&self, id: Uuid) -> CommandResult<ExecutionResult> {
        self.broker.approve(id).await
    }

    /// Deny a pending command, with `"Command denied"` as the default reason
    ///
    /// # Errors
    ///
    /// `CommandError::NotFound` for unknown or resolved ids
    pub fn deny_command(&self, id: Uuid, reason: Option<String>) -> CommandResult<()> {
        self.broker.deny(id, reason)
    }

    /// Subscribe to lifecycle events published from now on
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn platform_info(&self) -> &PlatformInfo {
        &self.platform
    }
}
