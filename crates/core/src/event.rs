//! Domain event system for decoupled observation of a solving session.
//!
//! The controller and agent invoker publish events as turns progress.
//! Loggers, progress displays and tests subscribe without the loop knowing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A solver turn is about to start
    IterationStarted {
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// An agent received a model response
    LlmCalled {
        agent: String,
        model: String,
        input_tokens: u64,
        output_tokens: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A solver or validator turn finished
    TurnCompleted {
        agent: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The session reached a terminal state
    SessionEnded {
        success: bool,
        iterations: u32,
        error_code: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            agent: "solver".into(),
            tool_name: "solve_model".into(),
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "solve_model");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
