//! Notification sinks.
//!
//! The engine hands [`NotificationEvent`]s to a [`NotificationSink`]. Push,
//! email or in-app delivery lives behind that trait in the host application.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::EngineResult;
use crate::models::NotificationEvent;

/// Receives notification events from the engine.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Accepts one event. An error counts as a failed item for the caller.
    async fn emit(&self, event: NotificationEvent) -> EngineResult<()>;
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn emit(&self, event: NotificationEvent) -> EngineResult<()> {
        info!(
            organization_id = %event.organization_id,
            kind = ?event.kind,
            priority = ?event.priority,
            target_entity_id = %event.target_entity_id,
            title = %event.title,
            "Notification emitted"
        );
        Ok(())
    }
}

/// Keeps events in memory so they can be inspected.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationSink {
    events: Arc<RwLock<Vec<NotificationEvent>>>,
}

impl MemoryNotificationSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order.
    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn emit(&self, event: NotificationEvent) -> EngineResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
