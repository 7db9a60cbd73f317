use std::fmt;

use thiserror::Error;

/// Broad class of a data-access failure, used by the UI layer to pick a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Connection,
    Auth,
    Query,
    Decode,
    Other,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Connection => "connection",
            FetchErrorKind::Auth => "auth",
            FetchErrorKind::Query => "query",
            FetchErrorKind::Decode => "decode",
            FetchErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// SQLSTATE class 28 is invalid authorization, 42501 is insufficient privilege.
fn classify_sqlstate(code: &str) -> FetchErrorKind {
    if code.starts_with("28") || code == "42501" {
        FetchErrorKind::Auth
    } else if code.starts_with("08") {
        FetchErrorKind::Connection
    } else {
        FetchErrorKind::Query
    }
}

impl From<sqlx::Error> for FetchError {
    fn from(error: sqlx::Error) -> Self {
        let kind = match &error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => FetchErrorKind::Connection,
            sqlx::Error::Database(db) => db
                .code()
                .map(|code| classify_sqlstate(&code))
                .unwrap_or(FetchErrorKind::Query),
            sqlx::Error::RowNotFound => FetchErrorKind::Query,
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::Decode(_) => FetchErrorKind::Decode,
            _ => FetchErrorKind::Other,
        };
        FetchError::new(kind, error.to_string())
    }
}
