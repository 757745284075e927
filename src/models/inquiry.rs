//! Read-only view of the CRM's inquiry pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrganizationId;

/// Pipeline stage of an inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    /// Just received.
    New,
    /// Family has been contacted.
    Contacted,
    /// Family visited the center.
    Visited,
    /// Converted into an enrollment.
    Enrolled,
    /// Did not convert.
    Lost,
}

/// The part of an inquiry the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryRecord {
    /// Inquiry identifier in the CRM.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Current stage.
    pub status: InquiryStatus,
}
