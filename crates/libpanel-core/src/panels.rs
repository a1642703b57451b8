//! Library panel references inside dashboard documents
//!
//! A dashboard stores a library panel as a stub `{id, gridPos, libraryPanel:
//! {uid, name}}`. Loading swaps each stub for the element's stored model;
//! cleaning reduces resolved entries back to stubs before the dashboard is
//! saved; connecting records which elements the dashboard references.
//!
//! Every operation builds a new panel list and returns a new [`Dashboard`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::connections::ConnectionTracker;
use crate::dashboard::Dashboard;
use crate::element::{LibraryElement, LibraryElementKind};
use crate::elements::LibraryElementService;
use crate::error::{LibraryElementError, Result};
use crate::user::SignedInUser;

pub struct LibraryPanelService {
    elements: Arc<LibraryElementService>,
    connections: Arc<ConnectionTracker>,
}

/// The `libraryPanel` header of a panel entry.
struct PanelRef<'a> {
    uid: &'a str,
    name: &'a str,
}

/// `libraryPanel` of an entry, when present and not null.
fn panel_ref(panel: &Value) -> Option<PanelRef<'_>> {
    let header = panel.get("libraryPanel").filter(|v| !v.is_null())?;
    Some(PanelRef {
        uid: header.get("uid").and_then(Value::as_str).unwrap_or_default(),
        name: header.get("name").and_then(Value::as_str).unwrap_or_default(),
    })
}

/// Document-local `id`: the entry's own integer id, or `fallback`.
///
/// Load falls back to 0; clean falls back to the entry's list index.
fn local_id(panel: &Value, fallback: usize) -> Value {
    match panel.get("id").and_then(Value::as_i64) {
        Some(id) => json!(id),
        None => json!(fallback),
    }
}

const LOAD_ID_FALLBACK: usize = 0;

/// Document-local `gridPos`: the entry's own object, or `{}`.
fn local_grid_pos(panel: &Value) -> Value {
    panel
        .get("gridPos")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn unresolved_type(name: &str, uid: &str) -> String {
    format!("Name: \"{}\", UID: \"{}\"", name, uid)
}

/// Stub for a reference that could not be resolved. Every other field of
/// the entry is kept.
fn unresolved_panel(panel: &Value, reference: &PanelRef<'_>) -> Value {
    let mut entry = panel.as_object().cloned().unwrap_or_default();
    entry.insert("id".to_string(), local_id(panel, LOAD_ID_FALLBACK));
    entry.insert("gridPos".to_string(), local_grid_pos(panel));
    entry.insert(
        "type".to_string(),
        json!(unresolved_type(reference.name, reference.uid)),
    );
    entry.insert(
        "libraryPanel".to_string(),
        json!({"uid": reference.uid, "name": reference.name}),
    );
    Value::Object(entry)
}

/// The element's model with the entry's layout and a full header.
fn resolved_panel(panel: &Value, element: &LibraryElement) -> Result<Value> {
    let mut entry = element.model.as_object().cloned().unwrap_or_default();
    entry.insert("id".to_string(), local_id(panel, LOAD_ID_FALLBACK));
    entry.insert("gridPos".to_string(), local_grid_pos(panel));
    entry.insert(
        "libraryPanel".to_string(),
        json!({
            "uid": element.uid,
            "name": element.name,
            "type": element.type_name,
            "description": element.description,
            "version": element.version,
            "meta": serde_json::to_value(&element.meta)?,
        }),
    );
    Ok(Value::Object(entry))
}

/// Reduce resolved library panels to `{id, gridPos, libraryPanel: {uid, name}}`.
///
/// Fails with `HeaderUidMissing` or `HeaderNameMissing` on an incomplete
/// header. Entries without a `libraryPanel` pass through.
pub fn clean_library_panels(dashboard: &Dashboard) -> Result<Dashboard> {
    let Some(panels) = dashboard.panels() else {
        return Ok(dashboard.clone());
    };

    let mut cleaned = Vec::with_capacity(panels.len());
    for (index, panel) in panels.iter().enumerate() {
        let Some(reference) = panel_ref(panel) else {
            cleaned.push(panel.clone());
            continue;
        };
        if reference.uid.is_empty() {
            return Err(LibraryElementError::HeaderUidMissing);
        }
        if reference.name.is_empty() {
            return Err(LibraryElementError::HeaderNameMissing);
        }
        cleaned.push(json!({
            "id": local_id(panel, index),
            "gridPos": local_grid_pos(panel),
            "libraryPanel": {"uid": reference.uid, "name": reference.name},
        }));
    }
    Ok(dashboard.with_panels(cleaned))
}

/// Uids referenced by a dashboard's panels.
fn referenced_uids(dashboard: &Dashboard) -> Result<BTreeSet<String>> {
    let mut uids = BTreeSet::new();
    for panel in dashboard.panels().into_iter().flatten() {
        if let Some(reference) = panel_ref(panel) {
            if reference.uid.is_empty() {
                return Err(LibraryElementError::HeaderUidMissing);
            }
            uids.insert(reference.uid.to_string());
        }
    }
    Ok(uids)
}

/// A dashboard of another org is invisible to the requester.
fn require_same_org(user: &SignedInUser, dashboard: &Dashboard) -> Result<()> {
    if dashboard.org_id == user.org_id {
        Ok(())
    } else {
        Err(LibraryElementError::DashboardNotFound)
    }
}

impl LibraryPanelService {
    pub fn new(elements: Arc<LibraryElementService>, connections: Arc<ConnectionTracker>) -> Self {
        Self {
            elements,
            connections,
        }
    }

    /// Replace library panel stubs with the stored panel models.
    ///
    /// Fails with `DashboardNotFound` when the dashboard belongs to another
    /// org than `user`. Only elements connected to the dashboard and readable by `user` are
    /// resolved. Anything else becomes a stub with an unresolved `type`.
    /// Non-panel elements are left as they are.
    pub fn load_library_panels(&self, user: &SignedInUser, dashboard: &Dashboard) -> Result<Dashboard> {
        require_same_org(user, dashboard)?;
        let Some(panels) = dashboard.panels() else {
            return Ok(dashboard.clone());
        };

        let elements: HashMap<String, LibraryElement> =
            self.elements.get_elements_for_dashboard(user, dashboard.id)?;

        let mut loaded = Vec::with_capacity(panels.len());
        for panel in panels {
            let Some(reference) = panel_ref(panel) else {
                loaded.push(panel.clone());
                continue;
            };
            if reference.uid.is_empty() {
                return Err(LibraryElementError::HeaderUidMissing);
            }

            match elements.get(reference.uid) {
                None => {
                    tracing::warn!(
                        uid = %reference.uid,
                        dashboard_id = dashboard.id,
                        "library panel could not be resolved"
                    );
                    loaded.push(unresolved_panel(panel, &reference));
                }
                Some(element) if element.kind != LibraryElementKind::Panel => {
                    loaded.push(panel.clone());
                }
                Some(element) => loaded.push(resolved_panel(panel, element)?),
            }
        }
        Ok(dashboard.with_panels(loaded))
    }

    /// Reduce resolved library panels to stubs before saving.
    pub fn clean_library_panels(&self, dashboard: &Dashboard) -> Result<Dashboard> {
        clean_library_panels(dashboard)
    }

    /// Make the dashboard's connection set match the library panels it
    /// references.
    pub fn connect_library_panels(&self, user: &SignedInUser, dashboard: &Dashboard) -> Result<()> {
        require_same_org(user, dashboard)?;
        let uids = referenced_uids(dashboard)?;
        self.connections.replace_for_dashboard(user, dashboard.id, &uids)
    }
}
