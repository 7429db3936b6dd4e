//! Roles and the capability flags derived from them.
//!
//! Role logic lives here only; consumers read `PermissionFlags` from the
//! session instead of comparing role strings themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of an authenticated user, as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Ceo,
    Hod,
    OperationLeader,
    OperationMember,
    SalesLeader,
    SalesMember,
    BusinessDevelopment,
    /// Any role string this client does not know. Grants nothing.
    Other(String),
}

impl Role {
    /// Parse a backend role string. Matching ignores case and surrounding spaces.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ceo" => Self::Ceo,
            "hod" => Self::Hod,
            "operation_leader" => Self::OperationLeader,
            "operation_member" => Self::OperationMember,
            "sales_leader" => Self::SalesLeader,
            "sales_member" => Self::SalesMember,
            "business_development" => Self::BusinessDevelopment,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Wire representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ceo => "ceo",
            Self::Hod => "hod",
            Self::OperationLeader => "operation_leader",
            Self::OperationMember => "operation_member",
            Self::SalesLeader => "sales_leader",
            Self::SalesMember => "sales_member",
            Self::BusinessDevelopment => "business_development",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precomputed capability flags.
///
/// All false when unauthenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PermissionFlags {
    /// Operation members and leaders.
    pub operation_member: bool,
    /// Sales members and leaders.
    pub sales_member: bool,
    pub business_development: bool,
    pub hod: bool,
    pub ceo: bool,
    /// Allowed to edit today-task distributions.
    pub can_edit_distribution: bool,
}

impl PermissionFlags {
    /// Derive the flags for a role. `None` yields the unauthenticated defaults.
    #[must_use]
    pub fn from_role(role: Option<&Role>) -> Self {
        let Some(role) = role else {
            return Self::default();
        };

        Self {
            operation_member: matches!(role, Role::OperationMember | Role::OperationLeader),
            sales_member: matches!(role, Role::SalesMember | Role::SalesLeader),
            business_development: matches!(role, Role::BusinessDevelopment),
            hod: matches!(role, Role::Hod),
            ceo: matches!(role, Role::Ceo),
            can_edit_distribution: matches!(
                role,
                Role::OperationLeader | Role::Hod | Role::Ceo
            ),
        }
    }

    /// Flags as `(name, value)` pairs.
    #[must_use]
    pub const fn entries(&self) -> [(&'static str, bool); 6] {
        [
            ("operation_member", self.operation_member),
            ("sales_member", self.sales_member),
            ("business_development", self.business_development),
            ("hod", self.hod),
            ("ceo", self.ceo),
            ("can_edit_distribution", self.can_edit_distribution),
        ]
    }

    /// Look a flag up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries()
            .into_iter()
            .find(|(flag, _)| *flag == name)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown_roles() {
        assert_eq!(Role::parse(" Operation_Leader "), Role::OperationLeader);
        assert_eq!(Role::parse("sales_member"), Role::SalesMember);
        assert_eq!(Role::parse("intern"), Role::Other("intern".to_string()));
        assert_eq!(Role::parse("hod").to_string(), "hod");
    }

    #[test]
    fn test_role_serde_uses_plain_string() {
        let role: Role = serde_json::from_str("\"ceo\"").unwrap();
        assert_eq!(role, Role::Ceo);
        assert_eq!(serde_json::to_string(&Role::SalesLeader).unwrap(), "\"sales_leader\"");
    }

    #[test]
    fn test_leaders_inherit_member_flags() {
        let flags = PermissionFlags::from_role(Some(&Role::OperationLeader));
        assert!(flags.operation_member);
        assert!(flags.can_edit_distribution);
        assert!(!flags.sales_member);

        let flags = PermissionFlags::from_role(Some(&Role::SalesLeader));
        assert!(flags.sales_member);
        assert!(!flags.can_edit_distribution);
    }

    #[test]
    fn test_unknown_role_grants_nothing() {
        let flags = PermissionFlags::from_role(Some(&Role::parse("guest")));
        assert_eq!(flags, PermissionFlags::default());
        assert_eq!(PermissionFlags::from_role(None), PermissionFlags::default());
    }

    #[test]
    fn test_lookup_by_name() {
        let flags = PermissionFlags::from_role(Some(&Role::Hod));
        assert_eq!(flags.get("hod"), Some(true));
        assert_eq!(flags.get("can_edit_distribution"), Some(true));
        assert_eq!(flags.get("ceo"), Some(false));
        assert_eq!(flags.get("nope"), None);
    }
}
