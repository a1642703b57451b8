//! Requester identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
}

impl OrgRole {
    /// Editors and admins may write to the General folder.
    pub fn is_editor(&self) -> bool {
        *self >= OrgRole::Editor
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrgRole::Viewer => write!(f, "Viewer"),
            OrgRole::Editor => write!(f, "Editor"),
            OrgRole::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(OrgRole::Viewer),
            "editor" => Ok(OrgRole::Editor),
            "admin" => Ok(OrgRole::Admin),
            other => Err(format!("unknown org role: {}", other)),
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInUser {
    pub user_id: i64,
    pub org_id: i64,
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub org_role: OrgRole,
}

impl SignedInUser {
    pub fn new(user_id: i64, org_id: i64, login: impl Into<String>, org_role: OrgRole) -> Self {
        Self {
            user_id,
            org_id,
            login: login.into(),
            name: String::new(),
            email: String::new(),
            avatar_url: String::new(),
            org_role,
        }
    }

    /// Name shown in `createdBy` / `updatedBy`.
    pub fn display_name(&self) -> &str {
        if self.login.is_empty() {
            &self.name
        } else {
            &self.login
        }
    }
}

/// Reference to the user who created or last updated an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub name: String,
    pub avatar_url: String,
}
