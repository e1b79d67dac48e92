// Approval Module
//
// Holds commands whose classification is RequiresApproval until an
// external approver resolves them.
//
// Lifecycle:
// - Pending: queued, `pending` event published
// - Approved: executed, `approved` or `failed` event published
// - Denied: never executed, `denied` event published
//
// Approved and Denied are terminal. A command stuck in Pending gets an
// `approval_timeout` notification after the watchdog delay but stays
// pending until someone resolves it.

pub mod broker;
pub mod pending;

pub use broker::{ApprovalBroker, DEFAULT_DENIAL_REASON, DEFAULT_WATCHDOG_DELAY};
pub use pending::{ApprovalStatus, PendingCommand, PendingHandle};
