// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # jobmail
//!
//! Turns job-application email into a deduplicated list of application
//! records.
//!
//! ## Architecture
//!
//! - **Mailbox** (`email`): IMAP session, windowed streaming fetch, MIME
//!   decoding, and the subject/sender classifier
//! - **Extraction** (`extract`): company and title via an OpenAI-compatible
//!   chat endpoint, with a deterministic fallback
//! - **Records** (`job`): status inference and dedup keys
//! - **Storage** (`store`): redb-backed insert-or-ignore sink
//! - **Pipeline** (`pipeline`): per-message fault isolation and the scheduler
//!
//! ## Library usage
//!
//! ```no_run
//! use jobmail::email::{ClassifierRules, MockConnector};
//! use jobmail::extract::FallbackExtractor;
//! use jobmail::pipeline::{Ingestor, RunOptions};
//! use jobmail::store::JobStore;
//!
//! let connector = MockConnector::new();
//! let store = JobStore::open(std::path::Path::new("/tmp/jobmail")).unwrap();
//! let rules = ClassifierRules::default();
//! let mut ingestor = Ingestor::new(
//!     &connector,
//!     &FallbackExtractor,
//!     &store,
//!     &rules,
//!     RunOptions::default(),
//! );
//! let summary = ingestor.run_once().unwrap();
//! println!("stored {} new records", summary.stored);
//! ```

pub mod config;
pub mod email;
pub mod error;
pub mod extract;
pub mod job;
pub mod paths;
pub mod pipeline;
pub mod store;
