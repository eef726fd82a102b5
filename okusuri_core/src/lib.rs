#![forbid(unsafe_code)]

//! Core domain model and business logic for the Okusuri medication tracker.
//!
//! This crate provides:
//! - Domain types (daily logs, medication status, notification settings)
//! - Status calculation (adherence streak, rest periods, bleeding runs)
//! - Reminder composition and dispatch with duplicate suppression
//! - Collaborator traits plus file-backed persistence and push outbox
//! - Configuration, logging and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod status;
pub mod dedup;
pub mod message;
pub mod subscription;
pub mod store;
pub mod journal;
pub mod json_store;
pub mod transport;
pub mod dispatch;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use status::{compute_status, medication_status};
pub use dedup::DedupCache;
pub use message::compose_message;
pub use subscription::PushSubscription;
pub use store::{record_log, LogStore, SettingsStore, UserDirectory};
pub use json_store::JsonStore;
pub use transport::{OutboxTransport, PushTransport};
pub use dispatch::{DispatchCoordinator, DispatchReport};
pub use export::write_logs_csv;
