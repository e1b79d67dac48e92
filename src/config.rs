// Configuration File Support
//
// TOML configuration for the shellgate gateway with environment variable
// overrides. The default location is the XDG config directory:
// ~/.config/shellgate/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform::{validate_shell_path, PlatformFamily, PlatformResolver};
use crate::tools::{bare_command_name, ExecutorConfig, ShellMode, MAX_OUTPUT_SIZE};
use crate::whitelist::{platform_default_commands, WhitelistEntry, WhitelistRegistry};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty", "compact"];

/// Smallest output limit that still leaves room for the truncation marker
pub const MIN_OUTPUT_BYTES: usize = 3;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Execution gateway configuration
    pub execution: ExecutionConfig,

    /// Approval broker configuration
    pub approval: ApprovalConfig,

    /// Initial whitelist
    pub whitelist: WhitelistConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Execution gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Timeout applied when a call gives none, in milliseconds
    pub default_timeout_ms: u64,

    /// Captured stdout/stderr limit in bytes
    pub max_output_bytes: usize,

    /// Working directory for spawned commands
    pub working_dir: Option<PathBuf>,

    /// Route commands through a shell instead of spawning them directly
    pub shell_mode: bool,

    /// Shell for shell mode; the platform default when unset
    pub shell: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_output_bytes: MAX_OUTPUT_SIZE,
            working_dir: None,
            shell_mode: false,
            shell: None,
        }
    }
}

/// Approval broker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Delay before the approval_timeout notification, in seconds
    pub watchdog_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { watchdog_secs: 5 }
    }
}

/// Initial whitelist configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Seed the registry with the platform's default entries
    pub include_platform_defaults: bool,

    /// Entries upserted on top of the defaults
    pub entries: Vec<WhitelistEntry>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            include_platform_defaults: true,
            entries: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. A missing file yields the defaults (with env
    /// overrides applied).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            let config = Self::default().apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        let config = config.apply_env_overrides();
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/shellgate/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "shellgate", "Shellgate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("shellgate")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SHELLGATE_LOG_LEVEL
    /// - SHELLGATE_LOG_FORMAT
    /// - SHELLGATE_DEFAULT_TIMEOUT_MS
    /// - SHELLGATE_SHELL_MODE
    /// - SHELLGATE_SHELL
    /// - SHELLGATE_WATCHDOG_SECS
    ///
    /// Unparsable or out-of-range values are ignored.
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SHELLGATE_LOG_LEVEL") {
            if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                self.logging.level = level;
            }
        }
        if let Ok(format) = std::env::var("SHELLGATE_LOG_FORMAT") {
            if LOG_FORMATS.contains(&format.to_lowercase().as_str()) {
                self.logging.format = format;
            }
        }

        if let Ok(timeout) = std::env::var("SHELLGATE_DEFAULT_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.execution.default_timeout_ms = timeout;
                }
            }
        }
        if let Ok(shell_mode) = std::env::var("SHELLGATE_SHELL_MODE") {
            self.execution.shell_mode = shell_mode.parse().unwrap_or(self.execution.shell_mode);
        }
        if let Ok(shell) = std::env::var("SHELLGATE_SHELL") {
            if !shell.trim().is_empty() {
                self.execution.shell = Some(shell);
            }
        }

        if let Ok(secs) = std::env::var("SHELLGATE_WATCHDOG_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    self.approval.watchdog_secs = secs;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }

        if !LOG_FORMATS.contains(&self.logging.format.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log format: {}. Must be one of: {}",
                self.logging.format,
                LOG_FORMATS.join(", ")
            );
        }

        if self.execution.default_timeout_ms == 0 {
            anyhow::bail!("Default timeout must be > 0");
        }
        if self.execution.max_output_bytes < MIN_OUTPUT_BYTES {
            anyhow::bail!("Output limit must be >= {} bytes", MIN_OUTPUT_BYTES);
        }
        if let Some(shell) = &self.execution.shell {
            if shell.trim().is_empty() {
                anyhow::bail!("Shell path must not be empty");
            }
            // Bare names like "pwsh.exe" resolve through PATH at spawn time
            if self.execution.shell_mode
                && Path::new(shell).is_absolute()
                && !validate_shell_path(shell)
            {
                anyhow::bail!("Configured shell {} does not exist or is not a file", shell);
            }
        }

        if self.approval.watchdog_secs == 0 {
            anyhow::bail!("Approval watchdog delay must be > 0");
        }

        for entry in &self.whitelist.entries {
            if bare_command_name(&entry.command).trim().is_empty() {
                anyhow::bail!("Whitelist entry has empty command: {:?}", entry.command);
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.default_timeout_ms)
    }

    pub fn watchdog_delay(&self) -> Duration {
        Duration::from_secs(self.approval.watchdog_secs)
    }

    /// Build the executor configuration, resolving the shell through `platform`
    pub fn executor_config(&self, platform: &dyn PlatformResolver) -> ExecutorConfig {
        let mut executor = ExecutorConfig::with_timeout(self.default_timeout());
        executor.max_output_size = self.execution.max_output_bytes;
        executor.working_dir = self.execution.working_dir.clone();
        if self.execution.shell_mode {
            executor = executor.shell(ShellMode {
                shell: self.shell_path(platform),
                family: platform.platform_family(),
            });
        }
        executor
    }

    /// Configured shell, or the platform default
    pub fn shell_path(&self, platform: &dyn PlatformResolver) -> String {
        self.execution
            .shell
            .clone()
            .unwrap_or_else(|| platform.default_shell_path())
    }

    /// Build the initial whitelist for `family`
    pub fn initial_whitelist(&self, family: PlatformFamily) -> WhitelistRegistry {
        let mut registry = if self.whitelist.include_platform_defaults {
            WhitelistRegistry::with_entries(platform_default_commands(family))
        } else {
            WhitelistRegistry::new()
        };
        for entry in &self.whitelist.entries {
            registry.add(entry.clone());
        }
        registry
    }
}
