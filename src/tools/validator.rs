//! Command Validation Module
//!
//! Classifies a command invocation against a whitelist snapshot. Validation
//! is pure: it never spawns anything and never mutates the registry.
//!
//! # Algorithm
//!
//! 1. Strip directory components (`/` and `\`) to get the bare name
//! 2. Unlisted commands classify as `NotWhitelisted`
//! 3. `FORBIDDEN` entries stay forbidden whatever the arguments
//! 4. If the entry has `allowed_args`, every argument must satisfy the
//!    constraint at its position; any miss (including surplus arguments)
//!    escalates the result to `REQUIRES_APPROVAL`
//! 5. Otherwise the declared level is returned unchanged

use crate::whitelist::{SecurityLevel, WhitelistEntry, WhitelistRegistry};
use serde::Serialize;
use tracing::debug;

/// Outcome of classifying a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "classification", content = "level")]
pub enum Classification {
    /// No whitelist entry for the bare command name
    NotWhitelisted,
    /// Effective security level after argument checks
    Level(SecurityLevel),
}

impl Classification {
    pub fn level(self) -> Option<SecurityLevel> {
        match self {
            Classification::NotWhitelisted => None,
            Classification::Level(level) => Some(level),
        }
    }
}

/// Strip directory components from a command path
///
/// Handles both `/` and `\` separators regardless of host platform.
///
/// # Example
///
/// ```
/// use shellgate::tools::bare_command_name;
///
/// assert_eq!(bare_command_name("/usr/bin/ls"), "ls");
/// assert_eq!(bare_command_name(r"C:\Windows\System32\where.exe"), "where.exe");
/// assert_eq!(bare_command_name("echo"), "echo");
/// ```
pub fn bare_command_name(command: &str) -> &str {
    command
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(command)
}

/// Command validator bound to a whitelist snapshot
pub struct CommandValidator<'a> {
    registry: &'a WhitelistRegistry,
}

impl<'a> CommandValidator<'a> {
    pub fn new(registry: &'a WhitelistRegistry) -> Self {
        Self { registry }
    }

    /// Classify a command and its arguments
    ///
    /// # Example
    ///
    /// ```
    /// use shellgate::tools::{Classification, CommandValidator};
    /// use shellgate::whitelist::{ArgPattern, SecurityLevel, WhitelistEntry, WhitelistRegistry};
    ///
    /// let registry = WhitelistRegistry::with_entries(vec![
    ///     WhitelistEntry::new("build", SecurityLevel::Safe)
    ///         .with_allowed_args(vec![ArgPattern::exact("--version")]),
    /// ]);
    /// let validator = CommandValidator::new(&registry);
    ///
    /// assert_eq!(
    ///     validator.classify("build", &["--bogus".to_string()]),
    ///     Classification::Level(SecurityLevel::RequiresApproval)
    /// );
    /// ```
    pub fn classify(&self, command: &str, args: &[String]) -> Classification {
        let base = bare_command_name(command);

        let Some(entry) = self.registry.get(base) else {
            debug!("Command '{}' not whitelisted", base);
            return Classification::NotWhitelisted;
        };

        let level = effective_level(entry, args);
        debug!(
            "Command '{}' classified as {} (declared {})",
            base, level, entry.security_level
        );
        Classification::Level(level)
    }
}

/// Apply an entry's argument constraints to its declared level
fn effective_level(entry: &WhitelistEntry, args: &[String]) -> SecurityLevel {
    if entry.security_level == SecurityLevel::Forbidden {
        return SecurityLevel::Forbidden;
    }

    if entry.allowed_args.is_empty() {
        return entry.security_level;
    }

    if args.len() > entry.allowed_args.len() {
        return SecurityLevel::RequiresApproval;
    }

    let all_match = args
        .iter()
        .zip(&entry.allowed_args)
        .all(|(arg, constraint)| constraint.matches(arg));

    if all_match {
        entry.security_level
    } else {
        SecurityLevel::RequiresApproval
    }
}
