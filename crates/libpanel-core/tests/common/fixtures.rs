//! Shared wiring and fixture loading for integration tests

use std::path::PathBuf;
use std::sync::Arc;

use libpanel_core::{
    ConnectionTracker, CreateLibraryElementCommand, Dashboard, Folder, InMemoryDashboards,
    InMemoryFolders, LibraryElement, LibraryElementKind, LibraryElementService,
    LibraryPanelService, OrgRole, Repository, SignedInUser,
};
use serde_json::{json, Value};

/// Folder every scenario creates its elements in
pub const SCENARIO_FOLDER_ID: i64 = 1;

/// Dashboard id used by the fixture dashboard
pub const DASHBOARD_ID: i64 = 1;

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// Load a fixture file as a string
pub fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", name))
}

/// Load a dashboard fixture as a document owned by org 1
#[allow(dead_code)]
pub fn load_dashboard_fixture(name: &str, id: i64) -> Dashboard {
    let data: Value = serde_json::from_str(&load_fixture(&format!("dashboards/{}", name)))
        .unwrap_or_else(|e| panic!("Invalid dashboard fixture {}: {}", name, e));
    Dashboard::new(id, 1, data)
}

/// Fully wired services over one in-memory database.
#[allow(dead_code)]
pub struct TestEnv {
    pub repo: Arc<Repository>,
    pub folders: Arc<InMemoryFolders>,
    pub dashboards: Arc<InMemoryDashboards>,
    pub elements: Arc<LibraryElementService>,
    pub connections: Arc<ConnectionTracker>,
    pub panels: LibraryPanelService,
    pub admin: SignedInUser,
}

#[allow(dead_code)]
impl TestEnv {
    pub fn new() -> Self {
        Self::with_repository(Repository::in_memory().expect("in-memory repository"))
    }

    pub fn with_repository(repo: Repository) -> Self {
        let repo = Arc::new(repo);
        let folders = Arc::new(InMemoryFolders::new());
        folders.insert(
            1,
            Folder {
                id: SCENARIO_FOLDER_ID,
                uid: "scenario-folder".to_string(),
                title: "ScenarioFolder".to_string(),
            },
        );
        let dashboards = Arc::new(InMemoryDashboards::new());
        dashboards.insert(1, DASHBOARD_ID);

        let elements = Arc::new(LibraryElementService::new(repo.clone(), folders.clone()));
        let connections = Arc::new(ConnectionTracker::new(
            repo.clone(),
            folders.clone(),
            dashboards.clone(),
        ));
        let panels = LibraryPanelService::new(elements.clone(), connections.clone());

        let mut admin = SignedInUser::new(1, 1, "user_in_db", OrgRole::Admin);
        admin.name = "User In DB".to_string();
        admin.avatar_url = "/avatar/user_in_db".to_string();

        Self {
            repo,
            folders,
            dashboards,
            elements,
            connections,
            panels,
            admin,
        }
    }

    pub fn user(&self, user_id: i64, role: OrgRole) -> SignedInUser {
        SignedInUser::new(user_id, 1, format!("user_{}", user_id), role)
    }

    /// Create the "Text - Library Panel" element in the scenario folder.
    pub fn create_text_panel(&self) -> LibraryElement {
        self.create_panel("text-library-panel", "Text - Library Panel")
    }

    pub fn create_panel(&self, uid: &str, name: &str) -> LibraryElement {
        self.elements
            .create(&self.admin, text_panel_command(uid, name))
            .expect("create library panel")
    }
}

/// Create command for a text panel in the scenario folder.
#[allow(dead_code)]
pub fn text_panel_command(uid: &str, name: &str) -> CreateLibraryElementCommand {
    CreateLibraryElementCommand {
        folder_id: SCENARIO_FOLDER_ID,
        name: name.to_string(),
        model: json!({
            "datasource": "${DS_GDEV-TESTDATA}",
            "description": "A description",
            "id": 1,
            "title": "Text - Library Panel",
            "type": "text"
        }),
        kind: LibraryElementKind::Panel,
        uid: Some(uid.to_string()),
    }
}

/// A dashboard whose panels reference the given library panels.
#[allow(dead_code)]
pub fn dashboard_referencing(id: i64, refs: &[(&str, &str)]) -> Dashboard {
    let panels: Vec<Value> = refs
        .iter()
        .enumerate()
        .map(|(i, (uid, name))| {
            json!({
                "id": i + 1,
                "gridPos": {"h": 6, "w": 6, "x": 6 * i, "y": 0},
                "libraryPanel": {"uid": uid, "name": name}
            })
        })
        .collect();
    Dashboard::new(id, 1, json!({"title": "Testing", "panels": panels}))
}
