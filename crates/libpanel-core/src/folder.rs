//! Folder lookup and folder-level access control
//!
//! Folders and their ACLs belong to the host application. The store only
//! asks two questions: does folder F exist, and may this user read or
//! write it.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{LibraryElementError, Result};
use crate::user::{OrgRole, SignedInUser};

/// Id of the implicit root folder.
pub const GENERAL_FOLDER_ID: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub uid: String,
    pub title: String,
}

impl Folder {
    pub fn general() -> Self {
        Self {
            id: GENERAL_FOLDER_ID,
            uid: String::new(),
            title: "General".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderAction {
    Read,
    Write,
}

/// Folder collaborator supplied by the host.
pub trait FolderAccess: Send + Sync {
    /// Look up a non-General folder.
    fn folder(&self, org_id: i64, folder_id: i64) -> Option<Folder>;

    /// Whether `user` may perform `action` on an existing folder.
    fn can_access(&self, user: &SignedInUser, folder: &Folder, action: FolderAction) -> bool;
}

/// Resolve a folder and check the requester's permission on it.
///
/// The General folder always exists: everyone may read it, editors and
/// admins may write it.
pub fn require_folder(
    folders: &dyn FolderAccess,
    user: &SignedInUser,
    folder_id: i64,
    action: FolderAction,
) -> Result<Folder> {
    if folder_id == GENERAL_FOLDER_ID {
        return match action {
            FolderAction::Read => Ok(Folder::general()),
            FolderAction::Write if user.org_role.is_editor() => Ok(Folder::general()),
            FolderAction::Write => Err(LibraryElementError::FolderAccessDenied),
        };
    }

    let folder = folders
        .folder(user.org_id, folder_id)
        .ok_or(LibraryElementError::FolderNotFound)?;
    if !folders.can_access(user, &folder, action) {
        return Err(LibraryElementError::FolderAccessDenied);
    }
    Ok(folder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
    View,
    Edit,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclSubject {
    Role(OrgRole),
    User(i64),
}

/// One entry of a folder ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPermission {
    pub subject: AclSubject,
    pub level: PermissionLevel,
}

#[derive(Debug, Clone)]
struct FolderEntry {
    folder: Folder,
    acl: Vec<FolderPermission>,
}

/// In-process folder registry with per-folder ACLs.
///
/// A folder without ACL entries gets the default ACL: viewers may view,
/// editors may edit. Org admins always have full access.
#[derive(Debug, Default)]
pub struct InMemoryFolders {
    folders: RwLock<HashMap<(i64, i64), FolderEntry>>,
}

impl InMemoryFolders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a folder with the default ACL.
    pub fn insert(&self, org_id: i64, folder: Folder) {
        if let Ok(mut folders) = self.folders.write() {
            folders.insert(
                (org_id, folder.id),
                FolderEntry {
                    folder,
                    acl: Vec::new(),
                },
            );
        }
    }

    /// Replace a folder's ACL. Returns false for unknown folders.
    pub fn set_acl(&self, org_id: i64, folder_id: i64, acl: Vec<FolderPermission>) -> bool {
        match self.folders.write() {
            Ok(mut folders) => match folders.get_mut(&(org_id, folder_id)) {
                Some(entry) => {
                    entry.acl = acl;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn default_acl() -> Vec<FolderPermission> {
        vec![
            FolderPermission {
                subject: AclSubject::Role(OrgRole::Viewer),
                level: PermissionLevel::View,
            },
            FolderPermission {
                subject: AclSubject::Role(OrgRole::Editor),
                level: PermissionLevel::Edit,
            },
        ]
    }

    fn effective_level(acl: &[FolderPermission], user: &SignedInUser) -> Option<PermissionLevel> {
        acl.iter()
            .filter(|p| match p.subject {
                AclSubject::User(id) => id == user.user_id,
                // Roles inherit the grants of lower roles
                AclSubject::Role(role) => user.org_role >= role,
            })
            .map(|p| p.level)
            .max()
    }
}

impl FolderAccess for InMemoryFolders {
    fn folder(&self, org_id: i64, folder_id: i64) -> Option<Folder> {
        self.folders
            .read()
            .ok()?
            .get(&(org_id, folder_id))
            .map(|entry| entry.folder.clone())
    }

    fn can_access(&self, user: &SignedInUser, folder: &Folder, action: FolderAction) -> bool {
        if user.org_role == OrgRole::Admin {
            return true;
        }
        let Ok(folders) = self.folders.read() else {
            return false;
        };
        let Some(entry) = folders.get(&(user.org_id, folder.id)) else {
            return false;
        };
        let level = if entry.acl.is_empty() {
            Self::effective_level(&Self::default_acl(), user)
        } else {
            Self::effective_level(&entry.acl, user)
        };
        match (action, level) {
            (_, None) => false,
            (FolderAction::Read, Some(_)) => true,
            (FolderAction::Write, Some(level)) => level >= PermissionLevel::Edit,
        }
    }
}
