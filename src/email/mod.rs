//! Mailbox ingestion: IMAP sessions, windowed streaming fetch, MIME
//! decoding, and job-correspondence classification.

pub mod classify;
pub mod connector;
pub mod error;
pub mod fetch;
pub mod parser;

pub use classify::{ClassifierRules, Verdict};
pub use connector::{
    ImapConnector, MailboxConfig, MailboxConnector, MailboxSession, MockConnector, MockFailure,
    RawEmail,
};
pub use error::{EmailError, EmailResult};
pub use fetch::{MessageStream, SeqRange, stream_messages, window_range};
pub use parser::{ParsedEmail, UNKNOWN_DATE, UNKNOWN_SENDER, parse_raw};
