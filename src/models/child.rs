//! Child identity records.
//!
//! Children are never hard-removed: attendance and payments keep referring to
//! them after a tombstone, so removal is a lifecycle state rather than a
//! missing row.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::OrganizationId;

/// Lifecycle of an identity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
    /// The record is live.
    Active,
    /// The record was soft-deleted at the given time.
    Tombstoned {
        /// When the record was tombstoned.
        at: NaiveDateTime,
    },
}

/// Guardian contact details for a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianContact {
    /// Guardian's full name.
    pub name: String,
    /// Primary phone number.
    pub phone: String,
    /// Optional email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Relationship to the child (e.g., "mother").
    #[serde(default)]
    pub relationship: Option<String>,
}

/// Intake data for a new child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChild {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Guardian contact.
    pub guardian: GuardianContact,
    /// Medical flags such as allergies or conditions staff must know about.
    #[serde(default)]
    pub medical_flags: Vec<String>,
}

impl NewChild {
    /// Checks that the required intake fields are present.
    pub fn validate(&self) -> EngineResult<()> {
        if self.first_name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "first_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.guardian.name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "guardian.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.guardian.phone.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "guardian.phone".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A child known to the daycare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Internal identifier.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Human-readable unique code (e.g., "CH20260001").
    pub child_code: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Guardian contact.
    pub guardian: GuardianContact,
    /// Medical flags.
    pub medical_flags: Vec<String>,
    /// Active or tombstoned.
    pub record_state: RecordState,
    /// When the child was registered.
    pub created_at: NaiveDateTime,
}

impl Child {
    /// Builds a child record from validated intake data.
    pub fn new(
        organization_id: OrganizationId,
        child_code: String,
        intake: NewChild,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            child_code,
            first_name: intake.first_name,
            last_name: intake.last_name,
            date_of_birth: intake.date_of_birth,
            guardian: intake.guardian,
            medical_flags: intake.medical_flags,
            record_state: RecordState::Active,
            created_at,
        }
    }

    /// Returns true unless the child has been tombstoned.
    pub fn is_active(&self) -> bool {
        self.record_state == RecordState::Active
    }

    /// Returns "first last".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Soft-deletes the child.
    pub fn tombstone(&mut self, at: NaiveDateTime) -> EngineResult<()> {
        if !self.is_active() {
            return Err(EngineError::Conflict {
                message: format!("child {} is already tombstoned", self.child_code),
            });
        }
        self.record_state = RecordState::Tombstoned { at };
        Ok(())
    }
}
