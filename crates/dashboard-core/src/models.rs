//! Reference records served by the backend.

use serde::{Deserialize, Serialize};

/// Entry of the department name list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentName {
    pub id: i64,
    pub department_name: String,
}

/// Entry of the marketplace profile name list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileName {
    pub id: i64,
    pub profile_name: String,
}

/// Team member of a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    #[serde(default, alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
