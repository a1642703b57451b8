//! Error types for libpanel-core

use thiserror::Error;

/// Result type alias for library element operations
pub type Result<T> = std::result::Result<T, LibraryElementError>;

/// Domain errors returned by the element store, connection tracker and
/// panel synchronizer.
#[derive(Error, Debug)]
pub enum LibraryElementError {
    /// An element with the same name and kind already exists in the folder,
    /// or an explicit uid is already taken in the org
    #[error("library element with that name or uid already exists")]
    AlreadyExists,

    /// Element is absent or belongs to another org
    #[error("library element could not be found")]
    NotFound,

    /// Dashboard referenced by a connection does not exist
    #[error("against a dashboard that does not exist")]
    DashboardNotFound,

    /// A dashboard panel carries a `libraryPanel` reference without a uid
    #[error("library panel header is missing required property uid")]
    HeaderUidMissing,

    /// A dashboard panel carries a `libraryPanel` reference without a name
    #[error("library panel header is missing required property name")]
    HeaderNameMissing,

    /// Owning folder does not exist
    #[error("folder not found")]
    FolderNotFound,

    /// Requester lacks the required permission on the owning folder
    #[error("access denied to folder")]
    FolderAccessDenied,

    /// Element is still referenced by at least one dashboard
    #[error("the library element has connected dashboards")]
    HasConnectedDashboards,

    /// Optimistic concurrency check failed
    #[error("the library element has been changed by someone else (expected version {expected}, stored version {actual})")]
    VersionConflict { expected: i64, actual: i64 },

    /// Explicit uid does not match the uid format
    #[error("uid contains illegal characters or is too long")]
    InvalidUid,

    /// Element name is empty
    #[error("library element name cannot be empty")]
    InvalidName,

    /// Element model is not a JSON object
    #[error("library element model must be a JSON object")]
    InvalidModel,

    /// Anything the persistence layer reports that has no domain meaning
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl LibraryElementError {
    /// True for errors that carry no domain meaning and must not be shown
    /// to callers verbatim.
    pub fn is_internal(&self) -> bool {
        matches!(self, LibraryElementError::Persistence(_))
    }
}

/// Persistence-specific errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// The connection mutex was poisoned by a panicking holder
    #[error("Connection lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for LibraryElementError {
    fn from(err: rusqlite::Error) -> Self {
        LibraryElementError::Persistence(PersistenceError::from(err))
    }
}

impl From<serde_json::Error> for LibraryElementError {
    fn from(err: serde_json::Error) -> Self {
        LibraryElementError::Persistence(PersistenceError::from(err))
    }
}

/// True when a rusqlite error is a UNIQUE / constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
