//! Rich diagnostic error types for jobmail.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know what went wrong and how to
//! fix it.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::email::EmailError;
pub use crate::extract::ExtractionError;
pub use crate::paths::PathError;

/// Top-level error type.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum JobmailError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

/// Convenience alias for top-level operations.
pub type JobmailResult<T> = std::result::Result<T, JobmailError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(jobmail::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb error: {message}")]
    #[diagnostic(
        code(jobmail::store::redb),
        help(
            "The job database reported an error. If another jobmail process holds \
             the database open, stop it first; otherwise the file may be corrupted."
        )
    )]
    Redb { message: String },

    #[error("record encoding error: {message}")]
    #[diagnostic(
        code(jobmail::store::codec),
        help(
            "A stored job record could not be (de)serialized. The database may have \
             been written by an incompatible version of jobmail."
        )
    )]
    Codec { message: String },
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_wraps_transparently() {
        let err: JobmailError = StoreError::Redb {
            message: "database already open".to_string(),
        }
        .into();
        assert!(err.to_string().contains("database already open"));
    }

    #[test]
    fn email_error_wraps_transparently() {
        let err: JobmailError = EmailError::Authentication {
            message: "bad password".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "mailbox authentication failed: bad password"
        );
    }
}
