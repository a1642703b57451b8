//! libpanel core - reusable dashboard panels and variables
//!
//! This crate provides the core functionality for library elements:
//!
//! - **Elements**: versioned, folder-scoped panels and variables with search
//! - **Connections**: which dashboards reference which elements; connected
//!   elements cannot be deleted
//! - **Panels**: load, clean and connect library panel references inside
//!   dashboard documents
//! - **Folder**: folder lookup and ACL evaluation collaborator
//! - **Dashboard**: dashboard documents and the existence lookup collaborator
//! - **Persistence**: SQLite storage for elements, connections and users
//! - **Config**: storage, server, search and folder settings
//!
//! # Wiring
//!
//! ```text
//! Repository ─┬─> LibraryElementService ─┐
//!             └─> ConnectionTracker ──────┴─> LibraryPanelService
//! ```
//!
//! All services share one [`Repository`] through `Arc` and receive the
//! folder and dashboard collaborators explicitly.

pub mod config;
pub mod connections;
pub mod dashboard;
pub mod element;
pub mod elements;
pub mod error;
pub mod folder;
pub mod panels;
pub mod persistence;
pub mod user;

pub use config::{
    ConfigError, DashboardConfig, DatabaseConfig, FolderConfig, LibPanelConfig, SearchConfig,
    ServerConfig,
};
pub use connections::ConnectionTracker;
pub use dashboard::{Dashboard, DashboardLookup, InMemoryDashboards};
pub use element::{
    CreateLibraryElementCommand, LibraryElement, LibraryElementKind, LibraryElementMeta,
    LibraryElementSearchResult, SearchLibraryElementsQuery, SortDirection,
    UpdateLibraryElementCommand,
};
pub use elements::{is_valid_uid, LibraryElementService};
pub use error::{LibraryElementError, PersistenceError, Result};
pub use folder::{
    require_folder, AclSubject, Folder, FolderAccess, FolderAction, FolderPermission,
    InMemoryFolders, PermissionLevel, GENERAL_FOLDER_ID,
};
pub use panels::{clean_library_panels, LibraryPanelService};
pub use persistence::{Repository, Schema};
pub use user::{OrgRole, SignedInUser, UserRef};
