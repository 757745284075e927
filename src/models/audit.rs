//! Audit trail types shared by the billing rules.

use serde::{Deserialize, Serialize};

/// A single step in the audit trace recording a billing decision.
///
/// Each step captures the input, output, and reasoning for a rule application,
/// so a parent-facing statement can explain exactly how a charge was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}
