//! libpanel server - library element HTTP API
//!
//! Thin axum layer over the element store and connection tracker.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use libpanel_core::{
    ConnectionTracker, InMemoryDashboards, InMemoryFolders, LibPanelConfig, LibraryElementService,
    Repository,
};

/// Shared application state
pub struct AppState {
    pub elements: Arc<LibraryElementService>,
    pub connections: Arc<ConnectionTracker>,
    pub folders: Arc<InMemoryFolders>,
    pub dashboards: Arc<InMemoryDashboards>,
}

impl AppState {
    /// Wire the services over an open repository.
    pub fn new(repo: Repository, config: &LibPanelConfig) -> Self {
        let repo = Arc::new(repo);
        let folders = Arc::new(config.folder_registry());
        let dashboards = Arc::new(config.dashboard_registry());
        let elements = Arc::new(
            LibraryElementService::new(repo.clone(), folders.clone())
                .with_search_config(config.search.clone()),
        );
        let connections = Arc::new(ConnectionTracker::new(repo, folders.clone(), dashboards.clone()));

        Self {
            elements,
            connections,
            folders,
            dashboards,
        }
    }

    /// Open the configured database, or an in-memory one when no path is set.
    pub fn from_config(config: &LibPanelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let repo = match &config.database.path {
            Some(path) => {
                tracing::info!("Opening library element database at {:?}", path);
                Repository::open(path)?
            }
            None => {
                tracing::warn!("No database path configured, library elements will not persist");
                Repository::in_memory()?
            }
        };
        Ok(Self::new(repo, config))
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/library-elements",
            get(http::list_elements).post(http::create_element),
        )
        .route(
            "/api/library-elements/{uid}",
            get(http::get_element)
                .patch(http::update_element)
                .delete(http::delete_element),
        )
        .route(
            "/api/library-elements/{uid}/connections",
            get(http::get_connections),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("libpanel server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
