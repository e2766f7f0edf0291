//! MIME decoding via `mail-parser`.
//!
//! Converts a `RawEmail` into a `ParsedEmail` with the header fields the
//! pipeline needs and a best-effort plain-text body.

use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::connector::RawEmail;
use super::error::{EmailError, EmailResult};

/// Maximum body text size (16 KB). Keeps extraction prompts bounded.
const MAX_BODY_TEXT: usize = 16 * 1024;

/// Sender placeholder when no address can be recovered.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Date placeholder when the Date header is missing or unparseable.
pub const UNKNOWN_DATE: &str = "unknown";

// ── ParsedEmail ─────────────────────────────────────────────────────────

/// Header fields and plain-text body of one decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Subject line (empty if absent).
    pub subject: String,
    /// First From address, or [`UNKNOWN_SENDER`].
    pub sender_address: String,
    /// RFC 5322 Message-ID without angle brackets. May be empty.
    pub message_id: String,
    /// `YYYY-MM-DD` in the sender's timezone, or [`UNKNOWN_DATE`].
    pub date: String,
    /// First `text/plain` part, truncated to `MAX_BODY_TEXT`. Empty if none.
    pub plain_text_body: String,
}

impl ParsedEmail {
    /// Subject and body joined for keyword scanning.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.subject, self.plain_text_body)
    }
}

// ── parse_raw ───────────────────────────────────────────────────────────

/// Decode a `RawEmail`.
///
/// Fails only when there is nothing to decode or the MIME structure is
/// unreadable. Missing headers degrade to placeholders, and a message without
/// any `text/plain` part yields an empty body.
pub fn parse_raw(raw: &RawEmail) -> EmailResult<ParsedEmail> {
    if raw.data.iter().all(u8::is_ascii_whitespace) {
        return Err(EmailError::Decode {
            message: format!("message {} has no body", raw.seq),
        });
    }

    let message = MessageParser::default()
        .parse(&raw.data)
        .ok_or_else(|| EmailError::Decode {
            message: format!(
                "failed to parse MIME message (seq: {}, {} bytes)",
                raw.seq,
                raw.data.len()
            ),
        })?;

    let subject = message.subject().unwrap_or_default().trim().to_string();

    let sender_address = message
        .from()
        .and_then(|from| from.first())
        .and_then(|addr| addr.address())
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let message_id = message
        .message_id()
        .map(|id| id.trim().to_string())
        .unwrap_or_default();

    let date = message
        .date()
        .filter(|dt| dt.month >= 1 && dt.day >= 1)
        .map(|dt| format!("{:04}-{:02}-{:02}", dt.year, dt.month, dt.day))
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    let plain_text_body = first_plain_text(&message)
        .map(|text| truncate(text, MAX_BODY_TEXT))
        .unwrap_or_default();

    Ok(ParsedEmail {
        subject,
        sender_address,
        message_id,
        date,
        plain_text_body,
    })
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Walk MIME parts in order and return the first `text/plain` one.
///
/// A leaf text part with no Content-Type header counts as `text/plain`
/// (RFC 2045 default).
fn first_plain_text<'a>(message: &'a mail_parser::Message<'_>) -> Option<&'a str> {
    message.parts.iter().find_map(|part| {
        let PartType::Text(text) = &part.body else {
            return None;
        };
        let is_plain = match part.content_type() {
            Some(ct) => {
                ct.ctype().eq_ignore_ascii_case("text")
                    && ct
                        .subtype()
                        .is_none_or(|sub| sub.eq_ignore_ascii_case("plain"))
            }
            None => true,
        };
        is_plain.then_some(text.as_ref())
    })
}

/// Truncate a string to at most `max_bytes` bytes (on a char boundary).
fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// ── Tests ───────────────────────────────────────────────────────────────
