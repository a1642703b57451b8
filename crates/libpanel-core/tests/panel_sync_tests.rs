//! Load / clean / connect of library panel references in dashboards

mod common;

use common::fixtures::{dashboard_referencing, load_dashboard_fixture, TestEnv, DASHBOARD_ID};
use libpanel_core::{clean_library_panels, Dashboard, LibraryElementError, OrgRole};
use serde_json::json;

// === Load ===

#[test]
fn test_load_resolves_connected_text_panel() {
    let env = TestEnv::new();
    let element = env.create_text_panel();
    let dash = load_dashboard_fixture("library_panel.json", DASHBOARD_ID);
    env.connections.connect(&env.admin, &element.uid, DASHBOARD_ID).unwrap();

    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    let panels = loaded.panels().unwrap();

    // plain panel untouched
    assert_eq!(panels[0], dash.panels().unwrap()[0]);

    let panel = &panels[1];
    assert_eq!(panel["type"], "text");
    assert_eq!(panel["title"], "Text - Library Panel");
    assert_eq!(panel["datasource"], "${DS_GDEV-TESTDATA}");
    assert_eq!(panel["id"], 2);
    assert_eq!(panel["gridPos"], json!({"h": 6, "w": 6, "x": 12, "y": 0}));

    let header = &panel["libraryPanel"];
    assert_eq!(header["uid"], "text-library-panel");
    assert_eq!(header["name"], "Text - Library Panel");
    assert_eq!(header["type"], "text");
    assert_eq!(header["description"], "A description");
    assert_eq!(header["version"], 1);
    assert_eq!(header["meta"]["folderName"], "ScenarioFolder");
    assert_eq!(header["meta"]["folderUid"], "scenario-folder");
    assert_eq!(header["meta"]["connectedDashboards"], 1);
    assert_eq!(header["meta"]["createdBy"]["name"], "user_in_db");
    assert_eq!(header["meta"]["createdBy"]["avatarUrl"], "/avatar/user_in_db");

    // input document untouched
    assert!(dash.panels().unwrap()[1].get("type").is_none());
}

#[test]
fn test_load_dangling_uid_becomes_stub() {
    let env = TestEnv::new();
    let dash = Dashboard::new(
        DASHBOARD_ID,
        1,
        json!({"panels": [{
            "id": 4,
            "title": "kept",
            "libraryPanel": {"uid": "unknown-uid", "name": "Gone"}
        }]}),
    );

    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    let panel = &loaded.panels().unwrap()[0];
    assert_eq!(panel["type"], r#"Name: "Gone", UID: "unknown-uid""#);
    assert_eq!(panel["libraryPanel"], json!({"uid": "unknown-uid", "name": "Gone"}));
    assert_eq!(panel["id"], 4);
    assert_eq!(panel["gridPos"], json!({}));
    assert_eq!(panel["title"], "kept");
}

#[test]
fn test_missing_id_is_zero_on_load_and_index_on_clean() {
    let env = TestEnv::new();
    let element = env.create_text_panel();
    env.connections.connect(&env.admin, &element.uid, DASHBOARD_ID).unwrap();
    let dash = Dashboard::new(
        DASHBOARD_ID,
        1,
        json!({"panels": [
            {"id": 9, "type": "graph"},
            {"libraryPanel": {"uid": "text-library-panel", "name": "Text - Library Panel"}},
            {"libraryPanel": {"uid": "unknown-uid", "name": "Gone"}}
        ]}),
    );

    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    let panels = loaded.panels().unwrap();
    assert_eq!(panels[1]["id"], 0);
    assert_eq!(panels[1]["type"], "text");
    assert_eq!(panels[2]["id"], 0);

    let cleaned = clean_library_panels(&dash).unwrap();
    let panels = cleaned.panels().unwrap();
    assert_eq!(panels[1]["id"], 1);
    assert_eq!(panels[2]["id"], 2);
}

#[test]
fn test_load_unconnected_element_is_unresolved() {
    let env = TestEnv::new();
    env.create_text_panel();
    let dash = load_dashboard_fixture("library_panel.json", DASHBOARD_ID);

    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    let panel = &loaded.panels().unwrap()[1];
    assert_eq!(
        panel["type"],
        r#"Name: "Text - Library Panel", UID: "text-library-panel""#
    );
}

#[test]
fn test_load_unreadable_element_is_unresolved() {
    let env = TestEnv::new();
    let element = env.create_text_panel();
    env.connections.connect(&env.admin, &element.uid, DASHBOARD_ID).unwrap();
    // only the admin keeps access
    env.folders.set_acl(
        1,
        element.folder_id,
        vec![libpanel_core::FolderPermission {
            subject: libpanel_core::AclSubject::User(env.admin.user_id),
            level: libpanel_core::PermissionLevel::Admin,
        }],
    );

    let viewer = env.user(5, OrgRole::Viewer);
    let dash = load_dashboard_fixture("library_panel.json", DASHBOARD_ID);
    let loaded = env.panels.load_library_panels(&viewer, &dash).unwrap();
    assert_eq!(
        loaded.panels().unwrap()[1]["libraryPanel"],
        json!({"uid": "text-library-panel", "name": "Text - Library Panel"})
    );
}

#[test]
fn test_load_leaves_variables_alone() {
    let env = TestEnv::new();
    let mut cmd = common::fixtures::text_panel_command("query0", "query0");
    cmd.kind = libpanel_core::LibraryElementKind::Variable;
    cmd.model = json!({"type": "query", "name": "query0"});
    env.elements.create(&env.admin, cmd).unwrap();
    env.connections.connect(&env.admin, "query0", DASHBOARD_ID).unwrap();

    let dash = dashboard_referencing(DASHBOARD_ID, &[("query0", "query0")]);
    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    assert_eq!(loaded, dash);
}

#[test]
fn test_empty_uid_fails_everywhere() {
    let env = TestEnv::new();
    let dash = dashboard_referencing(DASHBOARD_ID, &[("", "Text - Library Panel")]);

    assert!(matches!(
        env.panels.load_library_panels(&env.admin, &dash),
        Err(LibraryElementError::HeaderUidMissing)
    ));
    assert!(matches!(
        env.panels.clean_library_panels(&dash),
        Err(LibraryElementError::HeaderUidMissing)
    ));
    assert!(matches!(
        env.panels.connect_library_panels(&env.admin, &dash),
        Err(LibraryElementError::HeaderUidMissing)
    ));
}

#[test]
fn test_dashboard_without_panels_passes_through() {
    let env = TestEnv::new();
    let dash = Dashboard::new(DASHBOARD_ID, 1, json!({"title": "empty"}));
    assert_eq!(env.panels.load_library_panels(&env.admin, &dash).unwrap(), dash);
    assert_eq!(env.panels.clean_library_panels(&dash).unwrap(), dash);
    env.panels.connect_library_panels(&env.admin, &dash).unwrap();
}

// === Clean ===

#[test]
fn test_clean_then_load_round_trip() {
    let env = TestEnv::new();
    let element = env.create_text_panel();
    env.connections.connect(&env.admin, &element.uid, DASHBOARD_ID).unwrap();
    let dash = load_dashboard_fixture("library_panel.json", DASHBOARD_ID);

    let loaded = env.panels.load_library_panels(&env.admin, &dash).unwrap();
    let cleaned = clean_library_panels(&loaded).unwrap();
    assert_eq!(
        cleaned.panels().unwrap()[1],
        json!({
            "id": 2,
            "gridPos": {"h": 6, "w": 6, "x": 12, "y": 0},
            "libraryPanel": {"uid": "text-library-panel", "name": "Text - Library Panel"}
        })
    );

    let reloaded = env.panels.load_library_panels(&env.admin, &cleaned).unwrap();
    assert_eq!(reloaded, loaded);
}

// === Connect ===

#[test]
fn test_connect_is_idempotent() {
    let env = TestEnv::new();
    env.create_panel("a", "A");
    env.create_panel("b", "B");
    let dash = dashboard_referencing(DASHBOARD_ID, &[("a", "A"), ("b", "B"), ("a", "A")]);

    env.panels.connect_library_panels(&env.admin, &dash).unwrap();
    let first = env.connections.connections_for_dashboard(1, DASHBOARD_ID).unwrap();
    env.panels.connect_library_panels(&env.admin, &dash).unwrap();
    let second = env.connections.connections_for_dashboard(1, DASHBOARD_ID).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(env.connections.count_for_element(1, "a").unwrap(), 1);
}

#[test]
fn test_connect_drops_removed_references() {
    let env = TestEnv::new();
    env.create_panel("a", "A");
    env.create_panel("b", "B");

    let both = dashboard_referencing(DASHBOARD_ID, &[("a", "A"), ("b", "B")]);
    env.panels.connect_library_panels(&env.admin, &both).unwrap();
    let only_b = dashboard_referencing(DASHBOARD_ID, &[("b", "B")]);
    env.panels.connect_library_panels(&env.admin, &only_b).unwrap();

    assert_eq!(env.connections.count_for_element(1, "a").unwrap(), 0);
    env.elements.delete(&env.admin, "a").unwrap();
    assert!(matches!(
        env.elements.delete(&env.admin, "b"),
        Err(LibraryElementError::HasConnectedDashboards)
    ));
}

#[test]
fn test_connect_unknown_dashboard() {
    let env = TestEnv::new();
    env.create_panel("a", "A");
    let dash = dashboard_referencing(404, &[("a", "A")]);
    assert!(matches!(
        env.panels.connect_library_panels(&env.admin, &dash),
        Err(LibraryElementError::DashboardNotFound)
    ));
}

#[test]
fn test_connect_dangling_uid_changes_nothing() {
    let env = TestEnv::new();
    env.create_panel("a", "A");
    let good = dashboard_referencing(DASHBOARD_ID, &[("a", "A")]);
    env.panels.connect_library_panels(&env.admin, &good).unwrap();

    let bad = dashboard_referencing(DASHBOARD_ID, &[("missing", "Missing")]);
    assert!(matches!(
        env.panels.connect_library_panels(&env.admin, &bad),
        Err(LibraryElementError::NotFound)
    ));
    assert_eq!(env.connections.count_for_element(1, "a").unwrap(), 1);
}

#[test]
fn test_dashboard_of_another_org_is_not_found() {
    let env = TestEnv::new();
    let element = env.create_text_panel();
    env.connections.connect(&env.admin, &element.uid, DASHBOARD_ID).unwrap();

    let foreign = Dashboard::new(
        DASHBOARD_ID,
        2,
        json!({"panels": [{"id": 1, "libraryPanel": {"uid": "text-library-panel", "name": "Text - Library Panel"}}]}),
    );
    assert!(matches!(
        env.panels.load_library_panels(&env.admin, &foreign),
        Err(LibraryElementError::DashboardNotFound)
    ));
    assert!(matches!(
        env.panels.connect_library_panels(&env.admin, &foreign),
        Err(LibraryElementError::DashboardNotFound)
    ));
    assert_eq!(env.connections.count_for_element(1, "text-library-panel").unwrap(), 1);
}
