//! Mailbox transport abstraction: session traits + IMAP and mock implementations.
//!
//! `MailboxConnector` opens an authenticated, read-only session on one mailbox.
//! - `ImapConnector` uses the `imap` crate over `native-tls` (IMAPS).
//! - `MockConnector` serves an in-memory mailbox for unit testing.
//!
//! A `MailboxSession` owns its connection exclusively and logs out when
//! dropped, so every exit path of a run releases the server connection.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{EmailError, EmailResult};
use super::fetch::SeqRange;

// ── RawEmail ────────────────────────────────────────────────────────────

/// A raw message as delivered by the mailbox transport.
#[derive(Debug, Clone)]
pub struct RawEmail {
    /// Message sequence number within the selected mailbox.
    pub seq: u32,
    /// The mailbox this message was fetched from (e.g. "INBOX").
    pub mailbox: String,
    /// Raw RFC 5322 bytes. Empty when the server returned no body section.
    pub data: Vec<u8>,
}

// ── MailboxConfig ───────────────────────────────────────────────────────

/// Connection and fetch settings for the monitored mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAPS port (implicit TLS).
    pub port: u16,
    /// Login user, usually the full address.
    pub user: String,
    /// Login password or app password.
    pub pass: String,
    /// Mailbox to examine.
    pub mailbox: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum number of most-recent messages considered per run.
    pub fetch_window: u32,
    /// Messages requested per FETCH command.
    pub fetch_batch: u32,
}

impl MailboxConfig {
    /// Validate this configuration, returning an error if invalid.
    pub fn validate(&self) -> EmailResult<()> {
        if self.host.is_empty() {
            return Err(EmailError::Config {
                message: "host must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(EmailError::Config {
                message: "port must be non-zero".to_string(),
            });
        }
        if self.user.is_empty() {
            return Err(EmailError::Config {
                message: "user must not be empty (set it in the config or GMAIL_USER)"
                    .to_string(),
            });
        }
        if self.mailbox.is_empty() {
            return Err(EmailError::Config {
                message: "mailbox must not be empty".to_string(),
            });
        }
        if self.fetch_window == 0 {
            return Err(EmailError::Config {
                message: "fetch_window must be at least 1".to_string(),
            });
        }
        if self.fetch_batch == 0 {
            return Err(EmailError::Config {
                message: "fetch_batch must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            user: String::new(),
            pass: String::new(),
            mailbox: "INBOX".to_string(),
            connect_timeout_secs: 5,
            fetch_window: 1000,
            fetch_batch: 50,
        }
    }
}

// ── Traits ──────────────────────────────────────────────────────────────

/// An authenticated session with one mailbox selected read-only.
///
/// Implementations must be `Send`: the fetcher thread borrows the session
/// while the orchestrator consumes messages.
pub trait MailboxSession: Send {
    /// Name of the selected mailbox.
    fn mailbox(&self) -> &str;

    /// Number of messages in the mailbox at selection time.
    fn message_count(&self) -> u32;

    /// Fetch full messages for an inclusive sequence range, in ascending order.
    fn fetch(&mut self, range: SeqRange) -> EmailResult<Vec<RawEmail>>;

    /// Release the connection. Safe to call more than once.
    fn logout(&mut self);
}

/// Opens mailbox sessions.
pub trait MailboxConnector {
    /// Connect, authenticate, and select the mailbox read-only.
    fn open(&self) -> EmailResult<Box<dyn MailboxSession>>;
}

// ── ImapConnector ───────────────────────────────────────────────────────

type ImapTlsSession = imap::Session<native_tls::TlsStream<TcpStream>>;

/// IMAP connector using the `imap` crate (sync, implicit TLS).
pub struct ImapConnector {
    config: MailboxConfig,
}

impl ImapConnector {
    /// Create a new IMAP connector (does not connect yet).
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }

    /// Open the TCP + TLS stream within the configured connect timeout.
    fn connect_tls(&self) -> EmailResult<native_tls::TlsStream<TcpStream>> {
        let host = self.config.host.as_str();
        let addr = (host, self.config.port)
            .to_socket_addrs()
            .map_err(|e| EmailError::Connection {
                message: format!("cannot resolve {host}: {e}"),
            })?
            .next()
            .ok_or_else(|| EmailError::Connection {
                message: format!("{host} resolved to no addresses"),
            })?;

        let tcp = TcpStream::connect_timeout(&addr, self.config.connect_timeout()).map_err(
            |e| EmailError::Connection {
                message: format!("TCP connect to {addr} failed: {e}"),
            },
        )?;

        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| EmailError::Connection {
                message: format!("TLS connector build failed: {e}"),
            })?;

        tls.connect(host, tcp).map_err(|e| EmailError::Connection {
            message: format!("TLS handshake with {host} failed: {e}"),
        })
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .field("mailbox", &self.config.mailbox)
            .finish()
    }
}

impl MailboxConnector for ImapConnector {
    fn open(&self) -> EmailResult<Box<dyn MailboxSession>> {
        let stream = self.connect_tls()?;
        tracing::info!(host = %self.config.host, "connected, creating IMAP client");

        let mut client = imap::Client::new(stream);
        client.read_greeting().map_err(|e| EmailError::Connection {
            message: format!("IMAP greeting failed: {e}"),
        })?;

        let mut session = client
            .login(&self.config.user, &self.config.pass)
            .map_err(|e| EmailError::Authentication {
                message: format!("IMAP login as {} failed: {}", self.config.user, e.0),
            })?;
        tracing::info!(user = %self.config.user, "login successful");

        // EXAMINE (read-only) so no \Seen flags are touched.
        let mailbox = match session.examine(&self.config.mailbox) {
            Ok(mailbox) => mailbox,
            Err(e) => {
                if let Err(logout_err) = session.logout() {
                    tracing::warn!(
                        mailbox = %self.config.mailbox,
                        "IMAP logout after failed EXAMINE failed: {logout_err}"
                    );
                }
                return Err(EmailError::MailboxSelect {
                    mailbox: self.config.mailbox.clone(),
                    message: e.to_string(),
                });
            }
        };

        Ok(Box::new(ImapSession {
            session: Some(session),
            mailbox: self.config.mailbox.clone(),
            exists: mailbox.exists,
        }))
    }
}

/// A live IMAP session with the mailbox examined.
pub struct ImapSession {
    session: Option<ImapTlsSession>,
    mailbox: String,
    exists: u32,
}

impl MailboxSession for ImapSession {
    fn mailbox(&self) -> &str {
        &self.mailbox
    }

    fn message_count(&self) -> u32 {
        self.exists
    }

    fn fetch(&mut self, range: SeqRange) -> EmailResult<Vec<RawEmail>> {
        let session = self.session.as_mut().ok_or_else(|| EmailError::Fetch {
            message: "session already logged out".to_string(),
        })?;

        let fetches = session
            .fetch(range.to_imap_set(), "RFC822")
            .map_err(|e| EmailError::Fetch {
                message: format!("FETCH {range} failed: {e}"),
            })?;

        let mut emails: Vec<RawEmail> = fetches
            .iter()
            .map(|fetch| RawEmail {
                seq: fetch.message,
                mailbox: self.mailbox.clone(),
                data: fetch.body().map(<[u8]>::to_vec).unwrap_or_default(),
            })
            .collect();
        // Servers may answer out of order.
        emails.sort_by_key(|e| e.seq);
        Ok(emails)
    }

    fn logout(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.logout() {
                Ok(()) => tracing::debug!(mailbox = %self.mailbox, "logged out"),
                Err(e) => tracing::warn!(mailbox = %self.mailbox, "IMAP logout failed: {e}"),
            }
        }
    }
}

impl std::fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession")
            .field("mailbox", &self.mailbox)
            .field("exists", &self.exists)
            .field("open", &self.session.is_some())
            .finish()
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        self.logout();
    }
}

// ── MockConnector ───────────────────────────────────────────────────────

/// Session-level failure a `MockConnector` should simulate on `open()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Connect,
    Auth,
    Select,
}

/// In-memory mock connector for unit testing.
///
/// Messages pushed with `push_message` get sequence numbers 1, 2, 3, ...
/// Logouts and fetched ranges are recorded for assertions and shared across
/// clones, so a test can keep a clone after handing one to the pipeline.
#[derive(Clone, Default)]
pub struct MockConnector {
    mailbox: Vec<Vec<u8>>,
    failure: Option<MockFailure>,
    fail_fetch_from: Option<u32>,
    panic_fetch_from: Option<u32>,
    logouts: Arc<AtomicUsize>,
    fetched: Arc<Mutex<Vec<SeqRange>>>,
}

impl MockConnector {
    /// Create an empty mock mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw message to the mailbox.
    pub fn push_message(&mut self, data: impl Into<Vec<u8>>) {
        self.mailbox.push(data.into());
    }

    /// Make `open()` fail at the given stage.
    pub fn fail_with(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Make any FETCH whose range reaches `seq` fail.
    pub fn fail_fetch_from(mut self, seq: u32) -> Self {
        self.fail_fetch_from = Some(seq);
        self
    }

    /// Make any FETCH whose range reaches `seq` panic, as a broken transport might.
    pub fn panic_fetch_from(mut self, seq: u32) -> Self {
        self.panic_fetch_from = Some(seq);
        self
    }

    /// Number of sessions that have been logged out.
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    /// Every range passed to `fetch`, in call order.
    pub fn fetched_ranges(&self) -> Vec<SeqRange> {
        self.fetched.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnector")
            .field("messages", &self.mailbox.len())
            .field("failure", &self.failure)
            .field("logouts", &self.logouts())
            .finish()
    }
}

impl MailboxConnector for MockConnector {
    fn open(&self) -> EmailResult<Box<dyn MailboxSession>> {
        match self.failure {
            Some(MockFailure::Connect) => {
                return Err(EmailError::Connection {
                    message: "mock connect refused".to_string(),
                });
            }
            Some(MockFailure::Auth) => {
                return Err(EmailError::Authentication {
                    message: "mock credentials rejected".to_string(),
                });
            }
            Some(MockFailure::Select) => {
                // The real connector logs out before reporting a select failure.
                self.logouts.fetch_add(1, Ordering::SeqCst);
                return Err(EmailError::MailboxSelect {
                    mailbox: "INBOX".to_string(),
                    message: "mock mailbox missing".to_string(),
                });
            }
            None => {}
        }

        Ok(Box::new(MockSession {
            connector: self.clone(),
            open: true,
        }))
    }
}

struct MockSession {
    connector: MockConnector,
    open: bool,
}

impl MailboxSession for MockSession {
    fn mailbox(&self) -> &str {
        "INBOX"
    }

    fn message_count(&self) -> u32 {
        self.connector.mailbox.len() as u32
    }

    fn fetch(&mut self, range: SeqRange) -> EmailResult<Vec<RawEmail>> {
        if let Ok(mut fetched) = self.connector.fetched.lock() {
            fetched.push(range);
        }
        if let Some(limit) = self.connector.panic_fetch_from {
            if range.end >= limit {
                panic!("mock transport panicked during FETCH {range}");
            }
        }
        if let Some(limit) = self.connector.fail_fetch_from {
            if range.end >= limit {
                return Err(EmailError::Fetch {
                    message: format!("mock connection dropped during FETCH {range}"),
                });
            }
        }

        Ok((range.start..=range.end)
            .filter_map(|seq| {
                let data = self.connector.mailbox.get(seq.checked_sub(1)? as usize)?;
                Some(RawEmail {
                    seq,
                    mailbox: "INBOX".to_string(),
                    data: data.clone(),
                })
            })
            .collect())
    }

    fn logout(&mut self) {
        if self.open {
            self.open = false;
            self.connector.logouts.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.logout();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
