//! Command Execution Subsystem
//!
//! This module classifies command invocations and executes the ones that
//! are authorized.
//!
//! # Security Features
//!
//! - **Whitelist Classification**: Every invocation is checked against the whitelist
//! - **List Invocation**: Commands are executed as argument vectors, never through a
//!   shell unless legacy shell mode is configured
//! - **Timeout Enforcement**: All executions have a timeout and the child is killed on expiry
//! - **Output Limits**: Captured output is truncated to a configurable size
//!
//! # Architecture
//!
//! - `validator.rs`: Bare-name extraction and classification
//! - `executor.rs`: Subprocess execution with timeout handling
//! - `timeout.rs`: Timeout resolution and enforcement
//!
//! # Example
//!
//! ```no_run
//! use shellgate::tools::{Classification, CommandExecutor, CommandValidator};
//! use shellgate::whitelist::{SecurityLevel, WhitelistEntry, WhitelistRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = WhitelistRegistry::with_entries(vec![
//!         WhitelistEntry::new("echo", SecurityLevel::Safe),
//!     ]);
//!     let args = vec!["hello".to_string()];
//!
//!     if CommandValidator::new(&registry).classify("echo", &args)
//!         == Classification::Level(SecurityLevel::Safe)
//!     {
//!         let output = CommandExecutor::new().execute("echo", &args, None).await?;
//!         println!("Stdout: {}", output.stdout);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod executor;
mod timeout;
mod validator;

pub use executor::{
    CommandExecutor, CommandRunner, ExecutionResult, ExecutorConfig, ShellMode, MAX_OUTPUT_SIZE,
};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT};
pub use validator::{bare_command_name, Classification, CommandValidator};
