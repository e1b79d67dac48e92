// Command Whitelist
//
// Maps bare command names to their security policy:
// - SAFE: executed immediately
// - REQUIRES_APPROVAL: queued for an explicit approve/deny
// - FORBIDDEN: rejected outright
//
// Commands absent from the whitelist are rejected as well.

pub mod defaults;
pub mod entry;
pub mod registry;

pub use defaults::platform_default_commands;
pub use entry::{ArgPattern, SecurityLevel, WhitelistEntry};
pub use registry::WhitelistRegistry;
