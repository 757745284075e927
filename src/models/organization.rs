//! Tenant identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the organization (tenant) every engine operation is scoped to.
///
/// # Example
///
/// ```
/// use daycare_billing::models::OrganizationId;
///
/// let org = OrganizationId::new("sunrise-daycare");
/// assert_eq!(org.as_str(), "sunrise-daycare");
/// assert_eq!(org.to_string(), "sunrise-daycare");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    /// Creates an organization id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let org = OrganizationId::new("org_001");
        assert_eq!(serde_json::to_string(&org).unwrap(), "\"org_001\"");
    }
}
