//! Push delivery.
//!
//! The dispatcher only depends on [`PushTransport`]. The bundled
//! [`OutboxTransport`] queues each push as a record in a JSONL outbox
//! that an external Web Push relay drains.

use crate::config::{PushConfig, VapidCredentials};
use crate::subscription::PushSubscription;
use crate::{Error, PushPayload, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Black-box push delivery
pub trait PushTransport: Send + Sync {
    fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<()>;
}

/// One queued push, as read by the relay
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboxRecord {
    pub subscription: PushSubscription,
    pub vapid_public_key: String,
    pub subject: String,
    pub ttl_seconds: u32,
    pub payload: PushPayload,
    pub queued_at: DateTime<Utc>,
}

/// Transport that appends each push to a JSONL outbox file
#[derive(Clone, Debug)]
pub struct OutboxTransport {
    path: PathBuf,
    credentials: Option<VapidCredentials>,
    subject: String,
    ttl_seconds: u32,
}

impl OutboxTransport {
    pub fn new(path: impl Into<PathBuf>, config: &PushConfig) -> Self {
        Self {
            path: path.into(),
            credentials: config.credentials(),
            subject: config.subject.clone(),
            ttl_seconds: config.ttl_seconds,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PushTransport for OutboxTransport {
    fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(Error::MissingCredentials)?;

        let record = OutboxRecord {
            subscription: subscription.clone(),
            vapid_public_key: credentials.public_key.clone(),
            subject: self.subject.clone(),
            ttl_seconds: self.ttl_seconds,
            payload: payload.clone(),
            queued_at: Utc::now(),
        };
        let line = serde_json::to_string(&record)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Transport(format!("cannot open outbox: {}", e)))?;

        file.lock_exclusive()?;
        let written = append_line(&file, &line);
        file.unlock()?;
        written.map_err(|e| Error::Transport(format!("cannot write outbox: {}", e)))?;

        tracing::debug!("Queued push for {}", subscription.preview());
        Ok(())
    }
}

fn append_line(file: &File, line: &str) -> std::io::Result<()> {
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Read all queued pushes from an outbox file
pub fn read_outbox(path: &Path) -> Result<Vec<OutboxRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut records = Vec::new();
    for (line_num, line_result) in BufReader::new(&file).lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutboxRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Failed to parse outbox line {}: {}", line_num + 1, e),
        }
    }

    file.unlock()?;
    Ok(records)
}
