//! Ingestion pipeline: one pass over the mailbox window, plus a scheduler
//! that repeats passes.
//!
//! A pass opens a session, streams the most recent messages from a fetcher
//! thread, and for each message runs decode → classify → extract → status →
//! persist on the calling thread. Session-level failures abort the pass.
//! Anything that goes wrong with a single message, including a panic, is
//! logged and the pass moves on to the next message.

pub mod scheduler;

pub use scheduler::{Scheduler, ShutdownFlag};

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::config::JobmailConfig;
use crate::email::{
    ClassifierRules, EmailError, MailboxConnector, RawEmail, Verdict, parse_raw, stream_messages,
    window_range,
};
use crate::error::{JobmailError, JobmailResult, panic_message};
use crate::extract::{DetailExtractor, extract_or_fallback};
use crate::job::{NewJob, dedup_key, determine_status};
use crate::store::JobSink;

/// Lifecycle of one ingestion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connecting,
    Selecting,
    Streaming,
    Done,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Selecting => write!(f, "selecting"),
            Self::Streaming => write!(f, "streaming"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Step a single message is in. Reported when that step fails or panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStage {
    Decoding,
    Classifying,
    Extracting,
    Determining,
    Persisting,
}

impl std::fmt::Display for MessageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decoding => write!(f, "decoding"),
            Self::Classifying => write!(f, "classifying"),
            Self::Extracting => write!(f, "extracting"),
            Self::Determining => write!(f, "determining"),
            Self::Persisting => write!(f, "persisting"),
        }
    }
}

/// Counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages received from the fetcher.
    pub fetched: usize,
    /// Messages that decoded successfully.
    pub decoded: usize,
    /// Messages skipped because they could not be decoded.
    pub decode_failed: usize,
    /// Messages the classifier accepted.
    pub accepted: usize,
    /// Messages the classifier rejected.
    pub rejected: usize,
    /// New records written.
    pub stored: usize,
    /// Accepted messages whose dedup key was already stored.
    pub duplicates: usize,
    /// Accepted messages that used the fallback extractor after an error.
    pub degraded: usize,
    /// Messages dropped by a store error or a panic.
    pub failed: usize,
}

/// Per-pass knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Most recent messages considered per pass.
    pub window: u32,
    /// Messages per FETCH command.
    pub batch: u32,
    /// Clear the sink before streaming.
    pub rescan: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            window: 1000,
            batch: 50,
            rescan: false,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &JobmailConfig) -> Self {
        Self {
            window: config.mailbox.fetch_window,
            batch: config.mailbox.fetch_batch,
            rescan: config.schedule.rescan,
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Rejected(Verdict),
    Stored { degraded: bool },
    Duplicate { degraded: bool },
}

/// Runs ingestion passes against a mailbox, an extractor and a sink.
pub struct Ingestor<'a> {
    connector: &'a dyn MailboxConnector,
    extractor: &'a dyn DetailExtractor,
    sink: &'a dyn JobSink,
    rules: &'a ClassifierRules,
    options: RunOptions,
    state: RunState,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        connector: &'a dyn MailboxConnector,
        extractor: &'a dyn DetailExtractor,
        sink: &'a dyn JobSink,
        rules: &'a ClassifierRules,
        options: RunOptions,
    ) -> Self {
        Self {
            connector,
            extractor,
            sink,
            rules,
            options,
            state: RunState::Idle,
        }
    }

    /// State reached by the most recent pass.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run one pass.
    ///
    /// Returns an error only when the pass as a whole could not run: the
    /// connection, login or mailbox selection failed, or a requested rescan
    /// could not clear the sink. Per-message problems show up in the summary.
    pub fn run_once(&mut self) -> JobmailResult<RunSummary> {
        self.state = RunState::Connecting;
        let mut session = match self.connector.open() {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(stage = %abort_state(&e), "ingestion aborted: {e}");
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        self.state = RunState::Selecting;

        let message_count = session.message_count();
        tracing::info!(
            mailbox = session.mailbox(),
            message_count,
            window = self.options.window,
            "mailbox selected"
        );

        if self.options.rescan {
            if let Err(e) = self.sink.clear_all() {
                session.logout();
                tracing::error!("ingestion aborted, rescan could not clear the store: {e}");
                self.state = RunState::Aborted;
                return Err(e.into());
            }
            tracing::info!("rescan: store cleared");
        }

        let mut summary = RunSummary::default();
        let Some(range) = window_range(message_count, self.options.window) else {
            session.logout();
            self.state = RunState::Done;
            tracing::info!("mailbox is empty, nothing to ingest");
            return Ok(summary);
        };

        self.state = RunState::Streaming;
        let this = &*self;
        std::thread::scope(|scope| {
            let stream = stream_messages(
                scope,
                session.as_mut(),
                range,
                this.options.batch,
                range.len() as usize,
            );
            for raw in stream {
                summary.fetched += 1;
                this.process_contained(&raw, &mut summary);
            }
        });
        session.logout();
        self.state = RunState::Done;

        tracing::info!(
            %range,
            fetched = summary.fetched,
            accepted = summary.accepted,
            stored = summary.stored,
            duplicates = summary.duplicates,
            degraded = summary.degraded,
            failed = summary.failed + summary.decode_failed,
            "ingestion pass complete"
        );
        Ok(summary)
    }

    /// Run one pass, logging instead of returning an abort.
    pub fn run_logged(&mut self) -> Option<RunSummary> {
        // Aborts are already logged by `run_once`.
        self.run_once().ok()
    }

    /// Process one message, containing errors and panics.
    fn process_contained(&self, raw: &RawEmail, summary: &mut RunSummary) {
        let stage = Cell::new(MessageStage::Decoding);
        let result = catch_unwind(AssertUnwindSafe(|| self.process(raw, &stage)));

        match result {
            Ok(Ok(outcome)) => {
                summary.decoded += 1;
                match outcome {
                    Outcome::Rejected(verdict) => {
                        summary.rejected += 1;
                        tracing::trace!(seq = raw.seq, %verdict, "message rejected");
                    }
                    Outcome::Stored { degraded } => {
                        summary.accepted += 1;
                        summary.stored += 1;
                        summary.degraded += usize::from(degraded);
                    }
                    Outcome::Duplicate { degraded } => {
                        summary.accepted += 1;
                        summary.duplicates += 1;
                        summary.degraded += usize::from(degraded);
                    }
                }
            }
            Ok(Err(e)) if stage.get() == MessageStage::Decoding => {
                summary.decode_failed += 1;
                tracing::warn!(seq = raw.seq, "skipping message: {e}");
            }
            Ok(Err(e)) => {
                summary.decoded += 1;
                summary.accepted += 1;
                summary.failed += 1;
                tracing::warn!(seq = raw.seq, stage = %stage.get(), "skipping message: {e}");
            }
            Err(payload) => {
                let stage = stage.get();
                if stage != MessageStage::Decoding {
                    summary.decoded += 1;
                }
                if !matches!(stage, MessageStage::Decoding | MessageStage::Classifying) {
                    summary.accepted += 1;
                }
                summary.failed += 1;
                tracing::warn!(
                    seq = raw.seq,
                    %stage,
                    "message processing panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn process(&self, raw: &RawEmail, stage: &Cell<MessageStage>) -> JobmailResult<Outcome> {
        stage.set(MessageStage::Decoding);
        let email = parse_raw(raw)?;

        stage.set(MessageStage::Classifying);
        let verdict = self.rules.classify(&email.subject, &email.sender_address);
        if !verdict.is_accepted() {
            return Ok(Outcome::Rejected(verdict));
        }

        stage.set(MessageStage::Extracting);
        let extraction = extract_or_fallback(self.extractor, &email.subject, &email.plain_text_body);

        stage.set(MessageStage::Determining);
        let status = determine_status(&email.subject, &email.plain_text_body);

        stage.set(MessageStage::Persisting);
        let email_id = dedup_key(
            &email.message_id,
            &email.sender_address,
            &email.date,
            &email.subject,
        );
        let job = NewJob {
            company: extraction.details.company,
            title: extraction.details.title,
            status,
            email_id,
            date: email.date,
        };
        let degraded = extraction.degraded;

        let email_id = job.email_id.clone();
        if self.sink.upsert_ignoring(job).map_err(JobmailError::from)? {
            tracing::info!(seq = raw.seq, %email_id, %status, "stored job record");
            Ok(Outcome::Stored { degraded })
        } else {
            tracing::debug!(seq = raw.seq, %email_id, "duplicate, already stored");
            Ok(Outcome::Duplicate { degraded })
        }
    }
}

impl std::fmt::Debug for Ingestor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

/// The state a session-level failure interrupted.
fn abort_state(err: &EmailError) -> RunState {
    match err {
        EmailError::MailboxSelect { .. } => RunState::Selecting,
        _ => RunState::Connecting,
    }
}
