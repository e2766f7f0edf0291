//! Mailbox subsystem error types with rich miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while talking to the mailbox or decoding its messages.
///
/// `Connection`, `Authentication` and `MailboxSelect` are session-level and
/// abort an ingestion run. `Fetch` ends the message stream early. `Decode`
/// only ever affects a single message.
#[derive(Debug, Error, Diagnostic)]
pub enum EmailError {
    #[error("mailbox connection failed: {message}")]
    #[diagnostic(
        code(jobmail::email::connection),
        help(
            "Check that the IMAP server is reachable and the host/port are correct. \
             Implicit TLS (IMAPS, usually port 993) is required."
        )
    )]
    Connection { message: String },

    #[error("mailbox authentication failed: {message}")]
    #[diagnostic(
        code(jobmail::email::auth),
        help(
            "Check the mailbox user and password. Gmail requires an app password \
             when two-factor authentication is enabled."
        )
    )]
    Authentication { message: String },

    #[error("cannot select mailbox \"{mailbox}\": {message}")]
    #[diagnostic(
        code(jobmail::email::select),
        help("Check that the mailbox exists. Names are case-sensitive except for INBOX.")
    )]
    MailboxSelect { mailbox: String, message: String },

    #[error("message fetch failed: {message}")]
    #[diagnostic(
        code(jobmail::email::fetch),
        help(
            "The server stopped answering FETCH requests. Messages received before \
             the failure are still processed; the next scheduled run retries the rest."
        )
    )]
    Fetch { message: String },

    #[error("message decoding failed: {message}")]
    #[diagnostic(
        code(jobmail::email::decode),
        help(
            "The MIME message could not be parsed or had no content. The message is \
             skipped and the run continues."
        )
    )]
    Decode { message: String },

    #[error("mailbox configuration invalid: {message}")]
    #[diagnostic(
        code(jobmail::email::config),
        help(
            "Check the [mailbox] section of the configuration. Required: host, port, \
             user, and a non-zero fetch_window and fetch_batch."
        )
    )]
    Config { message: String },
}

impl EmailError {
    /// Whether this error invalidates the whole session (as opposed to one message).
    pub fn is_session_level(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Authentication { .. } | Self::MailboxSelect { .. }
        )
    }
}

/// Convenience alias for mailbox operations.
pub type EmailResult<T> = std::result::Result<T, EmailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        let err = EmailError::Connection {
            message: "timed out after 5s".to_string(),
        };
        assert!(err.to_string().contains("timed out after 5s"));
    }

    #[test]
    fn select_error_names_mailbox() {
        let err = EmailError::MailboxSelect {
            mailbox: "Jobs".to_string(),
            message: "NO such mailbox".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("\"Jobs\""));
        assert!(text.contains("NO such mailbox"));
    }

    #[test]
    fn session_level_classification() {
        assert!(EmailError::Authentication { message: "x".into() }.is_session_level());
        assert!(
            EmailError::MailboxSelect {
                mailbox: "INBOX".into(),
                message: "x".into()
            }
            .is_session_level()
        );
        assert!(!EmailError::Fetch { message: "x".into() }.is_session_level());
        assert!(!EmailError::Decode { message: "x".into() }.is_session_level());
    }
}
