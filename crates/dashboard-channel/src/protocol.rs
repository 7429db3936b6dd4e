//! Wire format of the push channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ChannelError;

/// Event names understood by the push server.
pub mod events {
    pub const GET_DEPARTMENT_NAMES: &str = "getDepartmentNames";
    pub const DEPARTMENT_NAMES: &str = "getDepartmentName";
    pub const GET_PROFILE_NAMES: &str = "getProfilename";
    pub const PROFILE_NAMES: &str = "getProfilename";
    pub const GET_TEAM_MEMBERS_BY_DEPARTMENT: &str = "getTeamMemberByDepartment";
    pub const TEAM_MEMBERS: &str = "getTeamMember";
}

/// One text frame in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// # Errors
    /// Returns error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, ChannelError> {
        serde_json::to_string(self).map_err(|e| ChannelError::Frame(e.to_string()))
    }

    /// # Errors
    /// Returns error if the text is not a `{ event, payload }` object.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(text).map_err(|e| ChannelError::Frame(e.to_string()))
    }
}
