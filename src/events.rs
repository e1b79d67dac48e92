//! Command lifecycle notifications.
//!
//! Events are broadcast to every receiver subscribed at the moment of
//! publication. `publish` enqueues synchronously, so an event is visible to
//! receivers before the operation that triggered it returns.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::approval::PendingCommand;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Message attached to `approval_timeout` events.
pub const APPROVAL_TIMEOUT_MESSAGE: &str = "Command approval timed out. If you approved this command in the UI, please use get_pending_commands and approve_command to complete the process.";

/// A command lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandEvent {
    /// A command was queued for approval.
    Pending(PendingCommand),
    /// An approved command ran successfully.
    Approved {
        id: Uuid,
        stdout: String,
        stderr: String,
    },
    /// A pending command was denied.
    Denied { id: Uuid, reason: String },
    /// An approved command failed to run.
    Failed { id: Uuid, error: String },
    /// A command is still pending after the watchdog delay.
    ApprovalTimeout { id: Uuid, message: String },
}

impl CommandEvent {
    /// Event name as exposed to external subscribers.
    pub fn event_type(&self) -> &'static str {
        match self {
            CommandEvent::Pending(_) => "command:pending",
            CommandEvent::Approved { .. } => "command:approved",
            CommandEvent::Denied { .. } => "command:denied",
            CommandEvent::Failed { .. } => "command:failed",
            CommandEvent::ApprovalTimeout { .. } => "command:approval_timeout",
        }
    }

    /// The pending command id this event refers to.
    pub fn command_id(&self) -> Uuid {
        match self {
            CommandEvent::Pending(pending) => pending.id,
            CommandEvent::Approved { id, .. }
            | CommandEvent::Denied { id, .. }
            | CommandEvent::Failed { id, .. }
            | CommandEvent::ApprovalTimeout { id, .. } => *id,
        }
    }
}

/// In-process publish/subscribe channel for command events.
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<CommandEvent>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many receivers got it.
    pub fn publish(&self, event: CommandEvent) -> usize {
        trace!(event_type = event.event_type(), id = %event.command_id(), "Publishing event");
        // No receivers is fine
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }

    /// Subscribe to all events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<CommandEvent>>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once the bus is gone. Lagged events are skipped with a
    /// warning.
    pub async fn recv(&mut self) -> Option<Arc<CommandEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published event, if any.
    pub fn try_recv(&mut self) -> Option<Arc<CommandEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> CommandEvent {
        CommandEvent::Denied {
            id: Uuid::new_v4(),
            reason: "policy".to_string(),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(denied()), 0);
        let rx = bus.subscribe();
        drop(rx);
        assert_eq!(bus.publish(denied()), 0);
    }

    #[test]
    fn test_delivery_is_immediate() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let event = denied();

        assert_eq!(bus.publish(event.clone()), 1);
        assert_eq!(*rx.try_recv().unwrap(), event);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(denied());
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_clones_share_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        clone.publish(denied());
        assert!(rx.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(denied());
        drop(bus);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_event_names_and_json() {
        let id = Uuid::new_v4();
        let event = CommandEvent::ApprovalTimeout {
            id,
            message: APPROVAL_TIMEOUT_MESSAGE.to_string(),
        };
        assert_eq!(event.event_type(), "command:approval_timeout");
        assert_eq!(event.command_id(), id);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "approval_timeout");
        assert_eq!(json["id"], id.to_string());
    }
}
