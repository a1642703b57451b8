//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use libpanel_core::{
    CreateLibraryElementCommand, LibraryElement, LibraryElementError, LibraryElementKind,
    LibraryElementSearchResult, SearchLibraryElementsQuery, SortDirection,
    UpdateLibraryElementCommand,
};

use crate::auth::CurrentUser;
use crate::AppState;

/// Error returned by a handler
#[derive(Error, Debug)]
pub enum ApiError {
    /// A store failure, with the message shown when it is internal
    #[error("{context}: {source}")]
    Library {
        context: &'static str,
        #[source]
        source: LibraryElementError,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn library(context: &'static str) -> impl FnOnce(LibraryElementError) -> ApiError {
        move |source| ApiError::Library { context, source }
    }
}

/// Status code for a store error.
pub fn status_for(err: &LibraryElementError) -> StatusCode {
    match err {
        LibraryElementError::AlreadyExists
        | LibraryElementError::InvalidUid
        | LibraryElementError::InvalidName
        | LibraryElementError::InvalidModel => StatusCode::BAD_REQUEST,
        LibraryElementError::NotFound
        | LibraryElementError::DashboardNotFound
        | LibraryElementError::FolderNotFound => StatusCode::NOT_FOUND,
        LibraryElementError::HeaderUidMissing
        | LibraryElementError::HeaderNameMissing
        | LibraryElementError::VersionConflict { .. } => StatusCode::PRECONDITION_FAILED,
        LibraryElementError::FolderAccessDenied
        | LibraryElementError::HasConnectedDashboards => StatusCode::FORBIDDEN,
        LibraryElementError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Library { context, source } if source.is_internal() => {
                tracing::error!(error = %source, "{}", context);
                (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
            }
            ApiError::Library { source, .. } => (status_for(source), source.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

/// Successful response wrapper
#[derive(Debug, Serialize)]
pub struct ResultResponse<T> {
    pub result: T,
}

fn ok<T>(result: T) -> Json<ResultResponse<T>> {
    Json(ResultResponse { result })
}

/// Query string of the listing endpoint. List filters are comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search_string: Option<String>,
    pub kind: Option<i64>,
    pub sort_direction: Option<String>,
    pub exclude_uid: Option<String>,
    pub folder_filter: Option<String>,
    pub type_filter: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl TryFrom<ListParams> for SearchLibraryElementsQuery {
    type Error = ApiError;

    fn try_from(params: ListParams) -> Result<Self, Self::Error> {
        let kind = params
            .kind
            .map(LibraryElementKind::try_from)
            .transpose()
            .map_err(ApiError::BadRequest)?;
        let sort_direction = match params.sort_direction.as_deref() {
            None | Some("") | Some("alpha-asc") => SortDirection::AlphaAsc,
            Some("alpha-desc") => SortDirection::AlphaDesc,
            Some(other) => {
                return Err(ApiError::BadRequest(format!("invalid sortDirection: {}", other)))
            }
        };
        let folder_filter = match params.folder_filter.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(
                split_list(Some(raw))
                    .map(|id| {
                        id.parse::<i64>()
                            .map_err(|_| ApiError::BadRequest(format!("invalid folder id: {}", id)))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };
        let type_filter = match params.type_filter.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                Some(split_list(Some(raw)).map(str::to_string).collect())
            }
            _ => None,
        };

        Ok(SearchLibraryElementsQuery {
            page: params.page,
            per_page: params.per_page,
            search_string: params.search_string,
            sort_direction,
            kind,
            exclude_uid: params.exclude_uid.filter(|s| !s.is_empty()),
            folder_filter,
            type_filter,
        })
    }
}

/// Create a library element
pub async fn create_element(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(cmd): Json<CreateLibraryElementCommand>,
) -> Result<Json<ResultResponse<LibraryElement>>, ApiError> {
    let element = state
        .elements
        .create(&user, cmd)
        .map_err(ApiError::library("Failed to create library element"))?;
    Ok(ok(element))
}

/// Get a library element by uid
pub async fn get_element(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<String>,
) -> Result<Json<ResultResponse<LibraryElement>>, ApiError> {
    let element = state
        .elements
        .get(&user, &uid)
        .map_err(ApiError::library("Failed to get library element"))?;
    Ok(ok(element))
}

/// Search library elements
pub async fn list_elements(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ResultResponse<LibraryElementSearchResult>>, ApiError> {
    let query = SearchLibraryElementsQuery::try_from(params)?;
    let result = state
        .elements
        .get_all(&user, &query)
        .map_err(ApiError::library("Failed to get library elements"))?;
    Ok(ok(result))
}

/// Update a library element
pub async fn update_element(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<String>,
    Json(cmd): Json<UpdateLibraryElementCommand>,
) -> Result<Json<ResultResponse<LibraryElement>>, ApiError> {
    let element = state
        .elements
        .update(&user, &uid, cmd)
        .map_err(ApiError::library("Failed to update library element"))?;
    Ok(ok(element))
}

/// Delete a library element
pub async fn delete_element(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .elements
        .delete(&user, &uid)
        .map_err(ApiError::library("Failed to delete library element"))?;
    Ok(Json(serde_json::json!({ "message": "Library element deleted" })))
}

/// Dashboards connected to a library element
pub async fn get_connections(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(uid): Path<String>,
) -> Result<Json<ResultResponse<Vec<i64>>>, ApiError> {
    let ids = state
        .connections
        .connected_dashboards(&user, &uid)
        .map_err(ApiError::library("Failed to get connections"))?;
    Ok(ok(ids))
}
