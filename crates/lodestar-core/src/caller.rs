use serde::{Deserialize, Serialize};

/// Identity of whoever a reasoning run acts on behalf of.
///
/// Role and permission tables live outside this workspace; the core only
/// carries the resolved role name and permission labels so that tools can
/// receive the role and the reasoning prompt can summarize the permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Resolved role name, e.g. `DEVOPS_ENGINEER`.
    pub role: String,
    /// Permission labels granted to the role.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Caller {
    /// Creates a caller with a role and no permissions.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            permissions: Vec::new(),
        }
    }

    /// Adds a permission label. Chainable builder method.
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Comma-separated permission list for prompt rendering.
    pub fn permission_summary(&self) -> String {
        if self.permissions.is_empty() {
            "none".to_string()
        } else {
            self.permissions.join(", ")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_summary() {
        let caller = Caller::new("SRE")
            .with_permission("READ_CODE")
            .with_permission("K8S_EXEC");
        assert_eq!(caller.permission_summary(), "READ_CODE, K8S_EXEC");
        assert_eq!(Caller::new("GUEST").permission_summary(), "none");
    }

    #[test]
    fn test_caller_deserialize_without_permissions() {
        let caller: Caller = serde_json::from_str(r#"{"role":"HR_DIRECTOR"}"#).unwrap();
        assert_eq!(caller.role, "HR_DIRECTOR");
        assert!(caller.permissions.is_empty());
    }
}
