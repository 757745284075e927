//! Notification events emitted by the engine.
//!
//! The engine only describes what happened; delivery is left to whatever
//! [`NotificationSink`](crate::engine::NotificationSink) the host wires in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Child, Enrollment, OrganizationId};

/// The kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The enrollment ends within the look-ahead window.
    EnrollmentExpiringSoon,
    /// The enrollment has been expired by the sweeper.
    EnrollmentExpired,
}

/// Dedup key of a notification: at most one per kind, target and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    /// What happened.
    pub kind: NotificationKind,
    /// The entity the event is about.
    pub target: Uuid,
    /// The enrollment end date the event refers to.
    pub date: NaiveDate,
}

/// A queued notification that has not been delivered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    /// Dedup key.
    pub key: NotificationKey,
    /// The event to deliver.
    pub event: NotificationEvent,
}

/// Delivery priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Informational.
    Low,
    /// Default.
    Normal,
    /// Needs attention.
    High,
}

/// An abstract notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Tenant the event belongs to.
    pub organization_id: OrganizationId,
    /// What happened.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// Delivery priority.
    pub priority: NotificationPriority,
    /// The entity the event is about.
    pub target_entity_id: Uuid,
}

impl NotificationEvent {
    /// The dedup key of this event for `date`.
    pub fn key(&self, date: NaiveDate) -> NotificationKey {
        NotificationKey {
            kind: self.kind,
            target: self.target_entity_id,
            date,
        }
    }

    /// "Renew soon" reminder for an enrollment nearing its end date.
    pub fn expiring_soon(enrollment: &Enrollment, child: &Child, end_date: NaiveDate) -> Self {
        Self {
            organization_id: enrollment.organization_id.clone(),
            kind: NotificationKind::EnrollmentExpiringSoon,
            title: "Enrollment expiring soon".to_string(),
            message: format!(
                "Enrollment {} for {} ends on {}. Please renew to keep attendance uninterrupted.",
                enrollment.enrollment_number,
                child.full_name(),
                end_date
            ),
            priority: NotificationPriority::Normal,
            target_entity_id: enrollment.id,
        }
    }

    /// Notice that an enrollment has expired.
    pub fn expired(enrollment: &Enrollment, child: &Child) -> Self {
        Self {
            organization_id: enrollment.organization_id.clone(),
            kind: NotificationKind::EnrollmentExpired,
            title: "Enrollment expired".to_string(),
            message: format!(
                "Enrollment {} for {} has expired. A new enrollment is required before the next check-in.",
                enrollment.enrollment_number,
                child.full_name()
            ),
            priority: NotificationPriority::High,
            target_entity_id: enrollment.id,
        }
    }
}
