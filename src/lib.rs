//! Shellgate Library
//!
//! Command authorization and execution gateway: every command invocation is
//! classified against a whitelist and then run immediately, queued for
//! explicit approval, or rejected before anything is spawned.
//!
//! `service::CommandService` is the entry point; `server` exposes it over a
//! JSON-lines stream.

pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod platform;
pub mod server;
pub mod service;
pub mod tools;
pub mod whitelist;

pub use error::{CommandError, CommandResult};
pub use service::{CommandOutcome, CommandService, ExecuteOptions};
