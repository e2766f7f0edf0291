//! Windowed, streaming message fetch.
//!
//! The fetcher runs as a producer thread that pulls the mailbox window in
//! batches and pushes each message into a bounded channel. The consumer sees a
//! lazy, finite, non-restartable [`MessageStream`]. A failed FETCH ends the
//! stream early; everything already sent is still delivered.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::Scope;

use super::connector::{MailboxSession, RawEmail};
use super::error::{EmailError, EmailResult};
use crate::error::panic_message;

// ── SeqRange ────────────────────────────────────────────────────────────

/// Inclusive, 1-based message sequence range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    pub start: u32,
    pub end: u32,
}

impl SeqRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of sequence numbers covered.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// IMAP sequence-set syntax (`start:end`).
    pub fn to_imap_set(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }

    /// Split into consecutive sub-ranges of at most `size` messages.
    pub fn batches(self, size: u32) -> impl Iterator<Item = SeqRange> {
        let size = size.max(1);
        let mut next = self.start;
        std::iter::from_fn(move || {
            if next > self.end || next == 0 {
                return None;
            }
            let end = next.saturating_add(size - 1).min(self.end);
            let batch = SeqRange::new(next, end);
            next = end.checked_add(1).unwrap_or(0);
            Some(batch)
        })
    }
}

impl std::fmt::Display for SeqRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// The most recent `window` messages of a mailbox holding `message_count`.
///
/// Returns `None` for an empty mailbox.
pub fn window_range(message_count: u32, window: u32) -> Option<SeqRange> {
    if message_count == 0 || window == 0 {
        return None;
    }
    let start = if message_count > window {
        message_count - window + 1
    } else {
        1
    };
    Some(SeqRange::new(start, message_count))
}

// ── MessageStream ───────────────────────────────────────────────────────

/// Consumer end of the fetch channel.
///
/// Yields messages in ascending sequence order and ends when the producer
/// finishes or gives up after a fetch failure.
#[derive(Debug)]
pub struct MessageStream {
    rx: Receiver<RawEmail>,
}

impl Iterator for MessageStream {
    type Item = RawEmail;

    fn next(&mut self) -> Option<RawEmail> {
        self.rx.recv().ok()
    }
}

/// Start the producer for `range` inside `scope`.
///
/// The channel holds at most `capacity` undelivered messages; the producer
/// blocks when it is full. The session is borrowed for the scope's lifetime,
/// so it cannot be logged out while the producer is still fetching.
pub fn stream_messages<'scope, S>(
    scope: &'scope Scope<'scope, '_>,
    session: &'scope mut S,
    range: SeqRange,
    batch_size: u32,
    capacity: usize,
) -> MessageStream
where
    S: MailboxSession + ?Sized,
{
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    scope.spawn(move || {
        let sent = produce(session, range, batch_size, tx);
        tracing::debug!(%range, sent, "fetcher finished");
    });
    MessageStream { rx }
}

/// Fetch `range` batch by batch and push every message into `tx`.
///
/// Returns the number of messages handed to the consumer. Dropping `tx` on
/// return closes the stream. A panicking FETCH is treated like a failed one.
fn produce<S>(session: &mut S, range: SeqRange, batch_size: u32, tx: SyncSender<RawEmail>) -> usize
where
    S: MailboxSession + ?Sized,
{
    let mut sent = 0;
    for batch in range.batches(batch_size) {
        let emails = match fetch_contained(session, batch) {
            Ok(emails) => emails,
            Err(e) => {
                tracing::warn!(%batch, sent, "fetch failed, ending stream early: {e}");
                return sent;
            }
        };
        for email in emails {
            if tx.send(email).is_err() {
                tracing::debug!("consumer hung up, stopping fetch");
                return sent;
            }
            sent += 1;
        }
    }
    sent
}

/// Run one FETCH, turning a panic in the transport into a `Fetch` error.
fn fetch_contained<S>(session: &mut S, batch: SeqRange) -> EmailResult<Vec<RawEmail>>
where
    S: MailboxSession + ?Sized,
{
    catch_unwind(AssertUnwindSafe(|| session.fetch(batch))).unwrap_or_else(|payload| {
        Err(EmailError::Fetch {
            message: format!("FETCH {batch} panicked: {}", panic_message(payload.as_ref())),
        })
    })
}

// ── Tests ───────────────────────────────────────────────────────────────
