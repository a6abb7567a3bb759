//! User profile model.

use serde::{Deserialize, Serialize};

/// Role of a user profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Brigadista,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Brigadista => "brigadista",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "brigadista" => Some(UserRole::Brigadista),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Stored profile of an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: String,
}

/// Request body for changing a user's role.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}
