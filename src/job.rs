//! Job application records and lifecycle status inference.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an application, inferred from email text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "Applied"),
            Self::Interview => write!(f, "Interview"),
            Self::Offer => write!(f, "Offer"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Ordered decision list: the first rule whose keyword appears wins.
const STATUS_RULES: &[(&str, Status)] = &[
    ("interview", Status::Interview),
    ("offer", Status::Offer),
    ("rejected", Status::Rejected),
    ("regret", Status::Rejected),
];

/// Infer the status from subject and body.
///
/// Interview beats Offer beats Rejected, so "interview ... rejected" is an
/// Interview. Anything without a keyword is Applied.
pub fn determine_status(subject: &str, body: &str) -> Status {
    let text = format!("{subject} {body}").to_lowercase();
    STATUS_RULES
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, status)| *status)
        .unwrap_or(Status::Applied)
}

/// A record ready to be stored; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub company: String,
    pub title: String,
    pub status: Status,
    /// Deduplication key (Message-ID, or a synthesized key when absent).
    pub email_id: String,
    pub date: String,
}

/// A stored job application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub company: String,
    pub title: String,
    pub status: Status,
    pub email_id: String,
    pub date: String,
}

impl JobRecord {
    pub fn from_new(id: u64, job: NewJob) -> Self {
        Self {
            id,
            company: job.company,
            title: job.title,
            status: job.status,
            email_id: job.email_id,
            date: job.date,
        }
    }
}

/// Dedup key for a message: its Message-ID, or a composite of sender, date
/// and subject when the Message-ID is empty.
///
/// The `synthetic:` prefix keeps composite keys from colliding with real ids.
pub fn dedup_key(message_id: &str, sender: &str, date: &str, subject: &str) -> String {
    let message_id = message_id.trim();
    if message_id.is_empty() {
        format!("synthetic:{}|{}|{}", sender.to_lowercase(), date, subject.trim())
    } else {
        message_id.to_string()
    }
}
