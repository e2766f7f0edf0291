//! Job-correspondence classification.
//!
//! Two pure substring predicates gate every message:
//! - **Subject relevance**: any configured keyword appears in the subject.
//! - **Sender plausibility**: the sender matches no deny pattern and at least
//!   one allow pattern (career platforms, ATS domains, no-reply mailers).
//!
//! Both sides are plain data tables so they can be tuned from configuration
//! without touching control flow.

use serde::{Deserialize, Serialize};

/// Subject keywords that mark job-application correspondence.
pub const SUBJECT_KEYWORDS: &[&str] = &[
    "applied",
    "thank you",
    "application received",
    "we regret",
    "journey",
];

/// Sender fragments of career platforms and recruiting mailers.
pub const ALLOWED_SENDERS: &[&str] = &[
    "indeed.com",
    "workdaymail.com",
    "myworkdayjobs.com",
    "glassdoor.com",
    "jobvite.com",
    "lever.co",
    "greenhouse.io",
    "jobs.noreply@",
    "careers@",
    "no-reply",
    "noreply",
    "talent",
];

/// Sender fragments rejected before the allow list is consulted.
///
/// LinkedIn sends job alerts and social digests from the same domains as its
/// application receipts, so it is denied outright.
pub const DENIED_SENDERS: &[&str] = &["linkedin.com"];

// ── Verdict ─────────────────────────────────────────────────────────────

/// Why a message was or was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    IrrelevantSubject,
    DeniedSender,
    UnknownSender,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::IrrelevantSubject => write!(f, "irrelevant subject"),
            Self::DeniedSender => write!(f, "denied sender"),
            Self::UnknownSender => write!(f, "sender not a career domain"),
        }
    }
}

// ── ClassifierRules ─────────────────────────────────────────────────────

/// Keyword and sender tables. Matching is case-insensitive substring search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    pub subject_keywords: Vec<String>,
    pub allowed_senders: Vec<String>,
    pub denied_senders: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            subject_keywords: owned(SUBJECT_KEYWORDS),
            allowed_senders: owned(ALLOWED_SENDERS),
            denied_senders: owned(DENIED_SENDERS),
        }
    }
}

impl ClassifierRules {
    /// Whether the subject mentions any job keyword.
    pub fn is_job_related(&self, subject: &str) -> bool {
        contains_any(subject, &self.subject_keywords)
    }

    /// Whether the sender looks like a career platform.
    ///
    /// The deny list wins over the allow list.
    pub fn is_career_sender(&self, address: &str) -> bool {
        !contains_any(address, &self.denied_senders)
            && contains_any(address, &self.allowed_senders)
    }

    /// Combine both predicates, reporting the first reason for rejection.
    pub fn classify(&self, subject: &str, sender: &str) -> Verdict {
        if !self.is_job_related(subject) {
            Verdict::IrrelevantSubject
        } else if contains_any(sender, &self.denied_senders) {
            Verdict::DeniedSender
        } else if !contains_any(sender, &self.allowed_senders) {
            Verdict::UnknownSender
        } else {
            Verdict::Accepted
        }
    }
}

fn owned(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

// ── Tests ───────────────────────────────────────────────────────────────
