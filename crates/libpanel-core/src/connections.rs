//! Dashboard connection tracking
//!
//! A connection records that a dashboard document references a library
//! element. Connections block element deletion.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;

use crate::dashboard::DashboardLookup;
use crate::error::{LibraryElementError, Result};
use crate::folder::{require_folder, FolderAccess, FolderAction};
use crate::persistence::repository as rows;
use crate::persistence::Repository;
use crate::user::SignedInUser;

pub struct ConnectionTracker {
    repo: Arc<Repository>,
    folders: Arc<dyn FolderAccess>,
    dashboards: Arc<dyn DashboardLookup>,
}

impl ConnectionTracker {
    pub fn new(
        repo: Arc<Repository>,
        folders: Arc<dyn FolderAccess>,
        dashboards: Arc<dyn DashboardLookup>,
    ) -> Self {
        Self {
            repo,
            folders,
            dashboards,
        }
    }

    fn require_dashboard(&self, org_id: i64, dashboard_id: i64) -> Result<()> {
        if self.dashboards.dashboard_exists(org_id, dashboard_id) {
            Ok(())
        } else {
            Err(LibraryElementError::DashboardNotFound)
        }
    }

    /// Connect an element to a dashboard. Connecting twice is a no-op.
    pub fn connect(&self, user: &SignedInUser, uid: &str, dashboard_id: i64) -> Result<()> {
        self.require_dashboard(user.org_id, dashboard_id)?;
        self.repo.write(|tx| {
            let record = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Read)?;
            rows::insert_connection(tx, record.id, dashboard_id, user.user_id, Utc::now())
        })?;
        tracing::debug!(uid = %uid, dashboard_id, org_id = user.org_id, "connected library element");
        Ok(())
    }

    /// Remove a connection if present.
    pub fn disconnect(&self, user: &SignedInUser, uid: &str, dashboard_id: i64) -> Result<()> {
        let removed = self.repo.write(|tx| {
            let record = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            rows::delete_connection(tx, record.id, dashboard_id)
        })?;
        if removed > 0 {
            tracing::debug!(uid = %uid, dashboard_id, org_id = user.org_id, "disconnected library element");
        }
        Ok(())
    }

    /// Uids of the elements connected to a dashboard.
    pub fn connections_for_dashboard(&self, org_id: i64, dashboard_id: i64) -> Result<BTreeSet<String>> {
        let rows = self
            .repo
            .read(|tx| rows::connected_elements(tx, org_id, dashboard_id))?;
        Ok(rows.into_iter().map(|(_, uid)| uid).collect())
    }

    /// Number of dashboards referencing an element.
    pub fn count_for_element(&self, org_id: i64, uid: &str) -> Result<i64> {
        self.repo.read(|tx| {
            let record = rows::find_element(tx, org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            rows::connection_count(tx, record.id)
        })
    }

    /// Ids of the dashboards referencing an element.
    pub fn connected_dashboards(&self, user: &SignedInUser, uid: &str) -> Result<Vec<i64>> {
        self.repo.read(|tx| {
            let record = rows::find_element(tx, user.org_id, uid)?.ok_or(LibraryElementError::NotFound)?;
            require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Read)?;
            rows::connected_dashboards(tx, record.id)
        })
    }

    /// Make `uids` the exact connection set of a dashboard.
    ///
    /// Every uid must exist and be readable; otherwise nothing changes.
    pub fn replace_for_dashboard(
        &self,
        user: &SignedInUser,
        dashboard_id: i64,
        uids: &BTreeSet<String>,
    ) -> Result<()> {
        self.require_dashboard(user.org_id, dashboard_id)?;
        let wanted: Vec<String> = uids.iter().cloned().collect();

        let (added, removed) = self.repo.write(|tx| {
            let records = rows::find_elements(tx, user.org_id, &wanted)?;
            let by_uid: HashMap<&str, i64> = records.iter().map(|r| (r.uid.as_str(), r.id)).collect();
            if let Some(missing) = wanted.iter().find(|uid| !by_uid.contains_key(uid.as_str())) {
                tracing::debug!(uid = %missing, dashboard_id, "cannot connect unknown library element");
                return Err(LibraryElementError::NotFound);
            }
            for record in &records {
                require_folder(self.folders.as_ref(), user, record.folder_id, FolderAction::Read)?;
            }

            let current = rows::connected_elements(tx, user.org_id, dashboard_id)?;
            let mut removed = 0;
            for (element_id, uid) in &current {
                if !uids.contains(uid) {
                    removed += rows::delete_connection(tx, *element_id, dashboard_id)?;
                }
            }
            let mut added = 0;
            let now = Utc::now();
            for record in &records {
                if !current.iter().any(|(id, _)| *id == record.id) {
                    rows::insert_connection(tx, record.id, dashboard_id, user.user_id, now)?;
                    added += 1;
                }
            }
            Ok((added, removed))
        })?;

        tracing::debug!(dashboard_id, org_id = user.org_id, added, removed, "replaced dashboard connections");
        Ok(())
    }

    /// Drop every connection of a deleted dashboard.
    pub fn disconnect_dashboard(&self, org_id: i64, dashboard_id: i64) -> Result<()> {
        let removed = self
            .repo
            .write(|tx| rows::delete_dashboard_connections(tx, org_id, dashboard_id))?;
        tracing::debug!(dashboard_id, org_id, removed, "disconnected dashboard");
        Ok(())
    }
}
