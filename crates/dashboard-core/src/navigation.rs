//! Sidebar entries and role-protected routes.

use serde::Serialize;

use crate::{Role, Session};

/// A sidebar link under `/dashboard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

const OPERATION_MEMBER: &[NavItem] = &[
    item("Over View", "over-view"),
    item("Projects", "projects"),
    item("Today Task", "todaytask"),
    item("Attendance", "attendance"),
    item("Team Perform", "teamperformance"),
    item("Self Perform", "performance"),
];

const OPERATION_MEMBER_TAIL: &[NavItem] = &[
    item("Update", "update-message"),
    item("Awards", "best_performance"),
];

const SALES_MEMBER: &[NavItem] = &[
    item("Over View", "over-view"),
    item("Projects", "projects"),
    item("Self Perform", "performance"),
    item("Special Order", "special-order"),
    item("Profile Ranking", "ranking-page"),
    item("Promotion", "promotion-summary"),
    item("Add Promotion", "promotion-add"),
    item("Update", "update-message"),
    item("Attendance", "attendance"),
    item("Quotation", "quotation-pdf-form"),
    item("Awards", "best_performance"),
];

const BUSINESS_DEVELOPMENT: &[NavItem] = &[
    item("Over View", "over-view"),
    item("Projects", "projects"),
    item("Special Order", "special-order"),
    item("Profile Ranking", "ranking-page"),
    item("Add Promotion", "promotion-add"),
    item("Attendance", "attendance"),
    item("Add Awards", "bestcontributors"),
    item("Awards", "best_performance"),
];

const HOD: &[NavItem] = &[
    item("Over View", "over-view"),
    item("Projects", "projects"),
    item("Distribution", "distribution"),
    item("User List", "userlist"),
    item("Team Create", "create-team"),
    item("Attendance", "attendance"),
    item("Department Create", "create-department"),
    item("Profile Create", "create-profile"),
    item("Profile List", "profile-List"),
    item("Awards", "best_performance"),
];

const CEO: &[NavItem] = &[
    item("Over View", "over-view"),
    item("Projects", "projects"),
    item("Today Task", "todaytask"),
    item("Attendance", "attendance"),
    item("Team Perform", "teamperformance"),
    item("Self Perform", "performance"),
    item("Distribution", "distribution"),
    item("Add Awards", "bestcontributors"),
    item("Special Order", "special-order"),
    item("Profile Ranking", "ranking-page"),
    item("Add Promotion", "promotion-add"),
    item("User List", "userlist"),
    item("Team Create", "create-team"),
    item("Update", "update-message"),
    item("Awards", "best_performance"),
];

/// Sidebar entries for a session, in display order.
///
/// The account status does not hide entries; shells show it separately.
#[must_use]
pub fn sidebar_items(session: &Session) -> Vec<NavItem> {
    let flags = session.permissions;
    let leader = session.role() == Some(&Role::OperationLeader);
    let mut items = Vec::new();

    if flags.operation_member {
        items.extend_from_slice(OPERATION_MEMBER);
        if leader {
            items.push(item("Distribution", "distribution"));
        }
        items.extend_from_slice(OPERATION_MEMBER_TAIL);
    }
    if flags.sales_member {
        items.extend_from_slice(SALES_MEMBER);
    }
    if flags.business_development {
        items.extend_from_slice(BUSINESS_DEVELOPMENT);
    }
    if flags.hod {
        items.extend_from_slice(HOD);
    }
    if flags.ceo {
        items.extend_from_slice(CEO);
    }

    items
}

/// Whether `role` may open the dashboard route at `path`.
///
/// Routes without a role list are open to every authenticated user.
#[must_use]
pub fn route_allowed(path: &str, role: &Role) -> bool {
    match path.trim_matches('/') {
        "projects" => matches!(
            role,
            Role::SalesMember | Role::OperationMember | Role::OperationLeader | Role::SalesLeader
        ),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionFlags, UserProfile};

    fn session(role: &str, status: &str) -> Session {
        let role = Role::parse(role);
        Session {
            token: Some("t".to_string()),
            permissions: PermissionFlags::from_role(Some(&role)),
            user: Some(UserProfile {
                id: 1,
                email: "a@b.c".to_string(),
                name: None,
                role,
                account_status: Some(status.to_string()),
            }),
        }
    }

    fn paths(items: &[NavItem]) -> Vec<&str> {
        items.iter().map(|i| i.path).collect()
    }

    #[test]
    fn test_operation_leader_gets_distribution() {
        let leader = sidebar_items(&session("operation_leader", "active"));
        let member = sidebar_items(&session("operation_member", "active"));

        assert!(paths(&leader).contains(&"distribution"));
        assert!(!paths(&member).contains(&"distribution"));
        assert_eq!(leader.len(), member.len() + 1);
    }

    #[test]
    fn test_hod_entries() {
        let items = sidebar_items(&session("hod", "active"));
        assert_eq!(items[0].label, "Over View");
        assert!(paths(&items).contains(&"create-department"));
        assert!(!paths(&items).contains(&"quotation-pdf-form"));
    }

    #[test]
    fn test_ceo_entries() {
        let items = sidebar_items(&session("ceo", "active"));
        assert_eq!(
            paths(&items),
            vec![
                "over-view",
                "projects",
                "todaytask",
                "attendance",
                "teamperformance",
                "performance",
                "distribution",
                "bestcontributors",
                "special-order",
                "ranking-page",
                "promotion-add",
                "userlist",
                "create-team",
                "update-message",
                "best_performance",
            ]
        );
    }

    #[test]
    fn test_account_status_does_not_hide_entries() {
        let pending = sidebar_items(&session("sales_member", "pending"));
        let active = sidebar_items(&session("sales_member", "active"));
        assert_eq!(pending, active);
        assert_eq!(pending.len(), 11);
    }

    #[test]
    fn test_anonymous_gets_nothing() {
        assert!(sidebar_items(&Session::default()).is_empty());
    }

    #[test]
    fn test_projects_route_guard() {
        assert!(route_allowed("projects", &Role::SalesLeader));
        assert!(!route_allowed("/projects/", &Role::Hod));
        assert!(route_allowed("attendance", &Role::Hod));
    }
}
