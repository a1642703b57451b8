//! Dashboard documents as seen by the panel synchronizer

use std::collections::HashSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dashboard document. `data` is the opaque JSON tree; only its
/// `panels` array is ever inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: i64,
    pub org_id: i64,
    pub data: Value,
}

impl Dashboard {
    pub fn new(id: i64, org_id: i64, data: Value) -> Self {
        Self { id, org_id, data }
    }

    /// The document's panel list, if it has one.
    pub fn panels(&self) -> Option<&Vec<Value>> {
        self.data.get("panels").and_then(Value::as_array)
    }

    /// Copy of this dashboard with `panels` replaced.
    pub fn with_panels(&self, panels: Vec<Value>) -> Self {
        let mut data = self.data.clone();
        if let Some(obj) = data.as_object_mut() {
            obj.insert("panels".to_string(), Value::Array(panels));
        }
        Self {
            id: self.id,
            org_id: self.org_id,
            data,
        }
    }
}

/// Dashboard collaborator supplied by the host.
pub trait DashboardLookup: Send + Sync {
    fn dashboard_exists(&self, org_id: i64, dashboard_id: i64) -> bool;
}

/// In-process set of known dashboards.
#[derive(Debug, Default)]
pub struct InMemoryDashboards {
    ids: RwLock<HashSet<(i64, i64)>>,
}

impl InMemoryDashboards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, org_id: i64, dashboard_id: i64) {
        if let Ok(mut ids) = self.ids.write() {
            ids.insert((org_id, dashboard_id));
        }
    }

    pub fn remove(&self, org_id: i64, dashboard_id: i64) {
        if let Ok(mut ids) = self.ids.write() {
            ids.remove(&(org_id, dashboard_id));
        }
    }
}

impl DashboardLookup for InMemoryDashboards {
    fn dashboard_exists(&self, org_id: i64, dashboard_id: i64) -> bool {
        self.ids
            .read()
            .map(|ids| ids.contains(&(org_id, dashboard_id)))
            .unwrap_or(false)
    }
}
