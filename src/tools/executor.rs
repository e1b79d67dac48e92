//! Command Executor
//!
//! This module is the execution boundary: it spawns the external process,
//! captures its output and enforces the timeout. It performs no policy
//! checks of its own; callers classify first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use super::timeout::ExecutionTimeout;
use crate::error::{CommandError, CommandResult};
use crate::platform::PlatformFamily;

/// Maximum output size in bytes (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Captured output of a command that exited successfully
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output (truncated if too large)
    pub stdout: String,

    /// Standard error (truncated if too large)
    pub stderr: String,
}

/// Legacy shell routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellMode {
    /// Shell executable
    pub shell: String,

    /// Decides the command flag and quoting rules
    pub family: PlatformFamily,
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default timeout when a call gives none (default: 30 seconds)
    pub timeout: ExecutionTimeout,

    /// Maximum output size in bytes (default: 1MB)
    pub max_output_size: usize,

    /// Working directory for command execution (default: current directory)
    pub working_dir: Option<PathBuf>,

    /// Route through a shell instead of spawning the argument vector (default: off)
    pub shell_mode: Option<ShellMode>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: ExecutionTimeout::default(),
            max_output_size: MAX_OUTPUT_SIZE,
            working_dir: None,
            shell_mode: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor config with custom default timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: ExecutionTimeout::new(timeout),
            ..Default::default()
        }
    }

    /// Create a new executor config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }

    /// Create a new executor config with custom working directory
    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Enable legacy shell routing
    pub fn shell(mut self, shell_mode: ShellMode) -> Self {
        self.shell_mode = Some(shell_mode);
        self
    }
}

/// Something that can run an already-authorized command
///
/// The approval broker depends on this seam rather than on the concrete
/// executor so tests can observe whether anything was spawned.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> CommandResult<ExecutionResult>;
}

/// Subprocess executor
///
/// # Security
///
/// 1. Uses `tokio::process::Command` with an argument vector, so no shell
///    sees the arguments unless shell mode is explicitly configured
/// 2. Enforces a timeout and kills the child when it expires
/// 3. Limits captured output to prevent memory exhaustion
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    /// Create a new executor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Build the process for this invocation
    fn build_process(&self, command: &str, args: &[String]) -> TokioCommand {
        let mut process = match &self.config.shell_mode {
            None => {
                let mut process = TokioCommand::new(command);
                process.args(args);
                process
            }
            Some(shell_mode) => {
                let line = shell_command_line(shell_mode.family, command, args);
                debug!(
                    "Shell mode: {} {} {}",
                    shell_mode.shell,
                    shell_mode.family.shell_command_flag(),
                    line
                );
                let mut process = TokioCommand::new(&shell_mode.shell);
                process.arg(shell_mode.family.shell_command_flag());
                push_command_line(&mut process, shell_mode.family, line);
                process
            }
        };

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir);
        }

        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process
    }

    /// Execute a command and capture its output
    ///
    /// # Errors
    ///
    /// - `CommandError::Execution` if the process cannot be spawned or exits
    ///   with a non-zero status
    /// - `CommandError::Timeout` if the process outlives the timeout; the
    ///   child is killed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use shellgate::tools::CommandExecutor;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let executor = CommandExecutor::new();
    ///     let result = executor.execute("echo", &["hello".to_string()], None).await?;
    ///     assert_eq!(result.stdout, "hello\n");
    ///     Ok(())
    /// }
    /// ```
    pub async fn execute(
        &self,
        command: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> CommandResult<ExecutionResult> {
        let start = std::time::Instant::now();
        let timeout = self.config.timeout.resolve(timeout);

        // Log command (truncated for safety)
        let cmd_str = if args.len() > 3 {
            format!("{:?} ... ({} args)", command, args.len())
        } else {
            format!("{:?} {:?}", command, args)
        };
        info!("Executing: {}", cmd_str);

        let child = self
            .build_process(command, args)
            .spawn()
            .map_err(|e| CommandError::spawn_failed(command, &e))?;

        // The child moves into the future; on timeout the future is dropped
        // and kill_on_drop terminates the process.
        let output = timeout
            .run(command, async move {
                child
                    .wait_with_output()
                    .await
                    .map_err(|e| CommandError::spawn_failed(command, &e))
            })
            .await
            .inspect_err(|e| {
                if matches!(e, CommandError::Timeout { .. }) {
                    warn!("Command timed out after {:?}: {}", timeout.duration(), cmd_str);
                }
            })?;

        let stdout = truncate_string(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            self.config.max_output_size,
        );
        let stderr = truncate_string(
            String::from_utf8_lossy(&output.stderr).into_owned(),
            self.config.max_output_size,
        );

        if output.status.success() {
            info!(
                "Command succeeded: {} ({}ms, {} bytes output)",
                cmd_str,
                start.elapsed().as_millis(),
                stdout.len()
            );
            Ok(ExecutionResult { stdout, stderr })
        } else {
            let exit_code = output.status.code();
            warn!("Command failed: {} (exit code: {:?})", cmd_str, exit_code);
            Err(CommandError::Execution {
                command: command.to_string(),
                cause: format!("process exited with {}", output.status),
                exit_code,
                stderr,
            })
        }
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> CommandResult<ExecutionResult> {
        self.execute(command, args, timeout).await
    }
}

/// Render a command line for the given shell family
fn shell_command_line(family: PlatformFamily, command: &str, args: &[String]) -> String {
    let words = std::iter::once(command).chain(args.iter().map(String::as_str));
    match family {
        PlatformFamily::Windows => words.map(quote_windows).collect::<Vec<_>>().join(" "),
        _ => shell_words::join(words),
    }
}

/// cmd.exe must see the line verbatim; the default argument quoting
/// would wrap it in another layer of backslash escapes
#[cfg(windows)]
fn push_command_line(process: &mut TokioCommand, family: PlatformFamily, line: String) {
    if family == PlatformFamily::Windows {
        process.raw_arg(line);
    } else {
        process.arg(line);
    }
}

#[cfg(not(windows))]
fn push_command_line(process: &mut TokioCommand, _family: PlatformFamily, line: String) {
    process.arg(line);
}

/// Characters cmd.exe interprets before the program sees its arguments
const CMD_METACHARACTERS: &[char] = &['(', ')', '%', '!', '^', '"', '<', '>', '&', '|'];

/// Quote a word for the program's argument parser, then caret-escape every
/// cmd.exe metacharacter (quotes included) so cmd passes it through literally
fn quote_windows(word: &str) -> String {
    let needs_quotes =
        word.is_empty() || word.contains(|c: char| c == ' ' || c == '\t' || c == '"');
    let quoted = if needs_quotes {
        let mut quoted = String::from('"');
        let mut backslashes = 0;
        for c in word.chars() {
            match c {
                '\\' => backslashes += 1,
                '"' => {
                    quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                    quoted.push('"');
                    backslashes = 0;
                }
                _ => {
                    quoted.extend(std::iter::repeat('\\').take(backslashes));
                    quoted.push(c);
                    backslashes = 0;
                }
            }
        }
        quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
        quoted.push('"');
        quoted
    } else {
        word.to_string()
    };

    let mut escaped = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        if CMD_METACHARACTERS.contains(&c) {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
/// Limits too small for the marker cut without one.
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let marker = if max_len >= 3 { "..." } else { "" };
        let mut cut = max_len - marker.len();
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str(marker);
    }
    s
}
