use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::user::UserRef;

/// What a library element holds.
///
/// Serialized as its integer code (`1` panel, `2` variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LibraryElementKind {
    Panel,
    Variable,
}

impl LibraryElementKind {
    pub fn code(&self) -> i64 {
        match self {
            LibraryElementKind::Panel => 1,
            LibraryElementKind::Variable => 2,
        }
    }
}

impl TryFrom<i64> for LibraryElementKind {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(LibraryElementKind::Panel),
            2 => Ok(LibraryElementKind::Variable),
            other => Err(format!("unknown library element kind: {}", other)),
        }
    }
}

impl From<LibraryElementKind> for i64 {
    fn from(kind: LibraryElementKind) -> Self {
        kind.code()
    }
}

impl fmt::Display for LibraryElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryElementKind::Panel => write!(f, "panel"),
            LibraryElementKind::Variable => write!(f, "variable"),
        }
    }
}

/// Read-time metadata. Never stored; recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementMeta {
    pub folder_name: String,
    pub folder_uid: String,
    #[serde(rename = "connectedDashboards")]
    pub connection_count: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub created_by: UserRef,
    pub updated_by: UserRef,
}

/// A reusable panel or variable stored once and referenced by dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElement {
    pub id: i64,
    pub org_id: i64,
    pub folder_id: i64,
    pub uid: String,
    pub name: String,
    pub kind: LibraryElementKind,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    pub model: Value,
    pub version: i64,
    pub meta: LibraryElementMeta,
}

/// Request to create a library element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLibraryElementCommand {
    #[serde(default)]
    pub folder_id: i64,
    pub name: String,
    pub model: Value,
    pub kind: LibraryElementKind,
    /// Caller-chosen uid; generated when absent
    #[serde(default)]
    pub uid: Option<String>,
}

/// Request to update a library element.
///
/// `version` is the version the caller last read; absent fields keep
/// their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLibraryElementCommand {
    pub version: i64,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub kind: Option<LibraryElementKind>,
}

impl UpdateLibraryElementCommand {
    /// Replace only the model, as a plain versioned update.
    pub fn model(version: i64, model: Value) -> Self {
        Self {
            version,
            model: Some(model),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "alpha-asc")]
    AlphaAsc,
    #[serde(rename = "alpha-desc")]
    AlphaDesc,
}

/// Filters and paging for listing library elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLibraryElementsQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub search_string: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub kind: Option<LibraryElementKind>,
    #[serde(default)]
    pub exclude_uid: Option<String>,
    #[serde(default)]
    pub folder_filter: Option<Vec<i64>>,
    #[serde(default)]
    pub type_filter: Option<Vec<String>>,
}

/// One page of a library element listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementSearchResult {
    pub total_count: usize,
    pub elements: Vec<LibraryElement>,
    pub page: usize,
    pub per_page: usize,
}

/// `type` and `description` are copied out of the model.
pub(crate) fn model_string(model: &Value, key: &str) -> String {
    model
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
