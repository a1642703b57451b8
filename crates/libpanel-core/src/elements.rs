//! Library element store: lifecycle, versioning and folder-gated access

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::element::{
    model_string, CreateLibraryElementCommand, LibraryElement, LibraryElementMeta,
    LibraryElementSearchResult, SearchLibraryElementsQuery, SortDirection,
    UpdateLibraryElementCommand,
};
use crate::error::{LibraryElementError, Result};
use crate::folder::{require_folder, Folder, FolderAccess, FolderAction};
use crate::persistence::repository::{self as rows, ElementFields, ElementRecord};
use crate::persistence::Repository;
use crate::user::SignedInUser;

lazy_static! {
    static ref UID_PATTERN: Regex = Regex::new(r"^[a-zA-Z0-9\-_]*$").expect("valid uid regex");
}

/// Longest uid accepted from callers.
pub const MAX_UID_LENGTH: usize = 40;

/// Whether a caller-supplied uid is acceptable.
pub fn is_valid_uid(uid: &str) -> bool {
    !uid.is_empty() && uid.len() <= MAX_UID_LENGTH && UID_PATTERN.is_match(uid)
}

fn generate_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// CRUD, versioning and access control for library elements.
pub struct LibraryElementService {
    repo: Arc<Repository>,
    folders: Arc<dyn FolderAccess>,
    search: SearchConfig,
}

impl LibraryElementService {
    pub fn new(repo: Arc<Repository>, folders: Arc<dyn FolderAccess>) -> Self {
        Self {
            repo,
            folders,
            search: SearchConfig::default(),
        }
    }

    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Attach folder meta to a stored record.
    fn to_element(record: ElementRecord, folder: &Folder) -> LibraryElement {
        LibraryElement {
            id: record.id,
            org_id: record.org_id,
            folder_id: record.folder_id,
            uid: record.uid,
            name: record.name,
            kind: record.kind,
            type_name: record.type_name,
            description: record.description,
            model: record.model,
            version: record.version,
            meta: LibraryElementMeta {
                folder_name: folder.title.clone(),
                folder_uid: folder.uid.clone(),
                connection_count: record.connection_count,
                created: record.created,
                updated: record.updated,
                created_by: record.created_by,
                updated_by: record.updated_by,
            },
        }
    }

    /// Keep only records the user may read, with their meta filled in.
    /// Unreadable folders are skipped silently.
    fn readable(&self, user: &SignedInUser, records: Vec<ElementRecord>) -> Vec<LibraryElement> {
        let mut folders: HashMap<i64, Option<Folder>> = HashMap::new();
        records
            .into_iter()
            .filter_map(|record| {
                let folder = folders
                    .entry(record.folder_id)
                    .or_insert_with(|| {
                        require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Read).ok()
                    })
                    .clone();
                match folder {
                    Some(folder) => Some(Self::to_element(record, &folder)),
                    None => {
                        tracing::warn!(uid = %record.uid, folder_id = record.folder_id, "skipping unreadable library element");
                        None
                    }
                }
            })
            .collect()
    }

    fn validate_model(model: &Value) -> Result<()> {
        if model.is_object() {
            Ok(())
        } else {
            Err(LibraryElementError::InvalidModel)
        }
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            Err(LibraryElementError::InvalidName)
        } else {
            Ok(())
        }
    }

    /// Create a library element at version 1.
    pub fn create(&self, user: &SignedInUser, cmd: CreateLibraryElementCommand) -> Result<LibraryElement> {
        Self::validate_name(&cmd.name)?;
        Self::validate_model(&cmd.model)?;
        let uid = match cmd.uid.as_deref() {
            Some(uid) if !uid.is_empty() => {
                if !is_valid_uid(uid) {
                    return Err(LibraryElementError::InvalidUid);
                }
                uid.to_string()
            }
            _ => generate_uid(),
        };

        let folder = require_folder(self.folders.as_ref(), user, cmd.folder_id, FolderAction::Write)?;
        let type_name = model_string(&cmd.model, "type");
        let description = model_string(&cmd.model, "description");
        let fields = ElementFields {
            folder_id: cmd.folder_id,
            name: &cmd.name,
            kind: cmd.kind,
            type_name: &type_name,
            description: &description,
            model: &cmd.model,
        };

        let record = self.repo.write(|tx| {
            rows::upsert_user(tx, user)?;
            rows::insert_element(tx, user.org_id, &uid, &fields, user.user_id, Utc::now())?;
            rows::find_element(tx, user.org_id, &uid)?.ok_or(LibraryElementError::NotFound)
        })?;

        tracing::debug!(uid = %record.uid, org_id = user.org_id, kind = %record.kind, "created library element");
        Ok(Self::to_element(record, &folder))
    }

    /// Get one element by uid.
    pub fn get(&self, user: &SignedInUser, uid: &str) -> Result<LibraryElement> {
        let record = self
            .repo
            .read(|tx| rows::find_element(tx, user.org_id, uid))?
            .ok_or(LibraryElementError::NotFound)?;
        let folder = require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Read)?;
        Ok(Self::to_element(record, &folder))
    }

    /// Get several elements by uid. Unknown or unreadable uids are left out.
    pub fn get_batch(&self, user: &SignedInUser, uids: &[String]) -> Result<HashMap<String, LibraryElement>> {
        let records = self.repo.read(|tx| rows::find_elements(tx, user.org_id, uids))?;
        Ok(self
            .readable(user, records)
            .into_iter()
            .map(|e| (e.uid.clone(), e))
            .collect())
    }

    /// Elements connected to a dashboard, keyed by uid. Unreadable elements
    /// are left out.
    pub fn get_elements_for_dashboard(
        &self,
        user: &SignedInUser,
        dashboard_id: i64,
    ) -> Result<HashMap<String, LibraryElement>> {
        let records = self
            .repo
            .read(|tx| rows::elements_for_dashboard(tx, user.org_id, dashboard_id))?;
        Ok(self
            .readable(user, records)
            .into_iter()
            .map(|e| (e.uid.clone(), e))
            .collect())
    }

    /// Search the elements the user can read.
    pub fn get_all(
        &self,
        user: &SignedInUser,
        query: &SearchLibraryElementsQuery,
    ) -> Result<LibraryElementSearchResult> {
        let per_page = query
            .per_page
            .filter(|n| *n > 0)
            .unwrap_or(self.search.default_per_page)
            .min(self.search.max_per_page);
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let needle = query
            .search_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let records = self.repo.read(|tx| rows::list_elements(tx, user.org_id))?;
        let mut matches: Vec<ElementRecord> = records
            .into_iter()
            .filter(|r| query.kind.map_or(true, |kind| r.kind == kind))
            .filter(|r| query.exclude_uid.as_deref() != Some(r.uid.as_str()))
            .filter(|r| {
                query
                    .folder_filter
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&r.folder_id))
            })
            .filter(|r| {
                query
                    .type_filter
                    .as_ref()
                    .map_or(true, |types| types.iter().any(|t| *t == r.type_name))
            })
            .filter(|r| {
                needle.as_ref().map_or(true, |needle| {
                    r.name.to_lowercase().contains(needle.as_str())
                        || r.description.to_lowercase().contains(needle.as_str())
                })
            })
            .collect();

        if query.sort_direction == SortDirection::AlphaDesc {
            matches.reverse();
        }

        let visible = self.readable(user, matches);
        let total_count = visible.len();
        let elements = visible
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(LibraryElementSearchResult {
            total_count,
            elements,
            page,
            per_page,
        })
    }

    /// Apply a versioned update.
    ///
    /// Fails with `VersionConflict` when `cmd.version` is not the stored
    /// version; nothing is written in that case.
    pub fn update(
        &self,
        user: &SignedInUser,
        uid: &str,
        cmd: UpdateLibraryElementCommand,
    ) -> Result<LibraryElement> {
        if let Some(name) = cmd.name.as_deref() {
            Self::validate_name(name)?;
        }
        if let Some(model) = cmd.model.as_ref() {
            Self::validate_model(model)?;
        }

        let (record, folder) = self.repo.write(|tx| {
            let current = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            let mut folder = require_folder(self.folders.as_ref(), user, current.folder_id, FolderAction::Write)?;
            let folder_id = cmd.folder_id.unwrap_or(current.folder_id);
            if folder_id != current.folder_id {
                folder = require_folder(self.folders.as_ref(), user, folder_id, FolderAction::Write)?;
            }
            if current.version != cmd.version {
                return Err(LibraryElementError::VersionConflict {
                    expected: cmd.version,
                    actual: current.version,
                });
            }

            let model = cmd.model.as_ref().unwrap_or(&current.model);
            let (type_name, description) = match cmd.model.as_ref() {
                Some(model) => (model_string(model, "type"), model_string(model, "description")),
                None => (current.type_name.clone(), current.description.clone()),
            };
            let fields = ElementFields {
                folder_id,
                name: cmd.name.as_deref().unwrap_or(&current.name),
                kind: cmd.kind.unwrap_or(current.kind),
                type_name: &type_name,
                description: &description,
                model,
            };

            rows::upsert_user(tx, user)?;
            let changed = rows::update_element(tx, current.id, cmd.version, &fields, user.user_id, Utc::now())?;
            if changed == 0 {
                return Err(LibraryElementError::VersionConflict {
                    expected: cmd.version,
                    actual: current.version,
                });
            }
            let updated = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            Ok((updated, folder))
        })?;

        tracing::debug!(uid = %record.uid, org_id = user.org_id, version = record.version, "updated library element");
        Ok(Self::to_element(record, &folder))
    }

    /// Delete an element that no dashboard references.
    pub fn delete(&self, user: &SignedInUser, uid: &str) -> Result<()> {
        self.repo.write(|tx| {
            let record = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Write)?;
            if rows::connection_count(tx, record.id)? > 0 {
                return Err(LibraryElementError::HasConnectedDashboards);
            }
            rows::delete_element(tx, record.id)?;
            Ok(())
        })?;

        tracing::debug!(uid = %uid, org_id = user.org_id, "deleted library element");
        Ok(())
    }
}
