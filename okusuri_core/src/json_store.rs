//! File-backed store for logs, users and notification settings.
//!
//! Layout of the data directory:
//! - `logs.jsonl` — append-only log journal
//! - `users.json` — user directory
//! - `settings.json` — notification settings
//!
//! JSON documents are rewritten atomically (temp file + rename) while an
//! exclusive lock on a sibling `.lock` file serializes concurrent writers.

use crate::journal::LogJournal;
use crate::store::{LogStore, SettingsStore, UserDirectory};
use crate::{Error, LogEntry, NotificationSetting, Result, User};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

const LOGS_FILE: &str = "logs.jsonl";
const USERS_FILE: &str = "users.json";
const SETTINGS_FILE: &str = "settings.json";

/// Store rooted at a data directory
#[derive(Clone, Debug)]
pub struct JsonStore {
    dir: PathBuf,
    journal: LogJournal,
}

impl JsonStore {
    /// Open (and create if needed) a store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let journal = LogJournal::new(dir.join(LOGS_FILE));
        Ok(Self { dir, journal })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn logs_path(&self) -> PathBuf {
        self.dir.join(LOGS_FILE)
    }

    pub fn users_path(&self) -> PathBuf {
        self.dir.join(USERS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Insert a user, or update the name of an existing one
    ///
    /// Returns true if the user was newly added.
    pub fn add_user(&self, user: User) -> Result<bool> {
        update_document(&self.users_path(), |users: &mut Vec<User>| {
            if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
                existing.name = user.name;
                return false;
            }
            users.push(user);
            true
        })
    }
}

impl LogStore for JsonStore {
    fn logs_for_user(&self, user_id: &str) -> Result<Vec<LogEntry>> {
        let logs = self.journal.read_all()?;
        Ok(logs.into_iter().filter(|l| l.user_id == user_id).collect())
    }

    fn append_log(&self, entry: &LogEntry) -> Result<()> {
        self.journal.append(entry)
    }

    fn update_bleeding(&self, user_id: &str, id: Uuid, has_bleeding: bool) -> Result<LogEntry> {
        let mut entry = self
            .logs_for_user(user_id)?
            .into_iter()
            .find(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(format!("log {} for user {}", id, user_id)))?;

        entry.has_bleeding = has_bleeding;
        self.journal.append(&entry)?;
        tracing::info!("Updated log {} bleeding={}", id, has_bleeding);
        Ok(entry)
    }
}

impl UserDirectory for JsonStore {
    fn all_users(&self) -> Result<Vec<User>> {
        load_document(&self.users_path())
    }
}

impl SettingsStore for JsonStore {
    fn all_settings(&self) -> Result<Vec<NotificationSetting>> {
        load_document(&self.settings_path())
    }

    fn save_setting(&self, setting: NotificationSetting) -> Result<()> {
        update_document(
            &self.settings_path(),
            |settings: &mut Vec<NotificationSetting>| {
                let position = settings
                    .iter()
                    .position(|s| s.user_id == setting.user_id && s.platform == setting.platform);
                match position {
                    Some(index) => {
                        let existing = &mut settings[index];
                        existing.is_enabled = setting.is_enabled;
                        existing.subscription = setting.subscription;
                        existing.updated_at = setting.updated_at;
                    }
                    None => settings.push(setting),
                }
            },
        )
    }
}

/// Load a JSON document, returning the default if the file doesn't exist
///
/// A document that cannot be parsed is a store error: silently replacing it
/// would lose every record in it on the next write.
fn load_document<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    if contents.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&contents)
        .map_err(|e| Error::Store(format!("Failed to parse {:?}: {}", path, e)))
}

/// Load, modify and atomically save a JSON document under an exclusive lock
fn update_document<T, R, F>(path: &Path, f: F) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T) -> R,
{
    let parent = path
        .parent()
        .ok_or_else(|| Error::Store(format!("{:?} has no parent directory", path)))?;
    std::fs::create_dir_all(parent)?;

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path.with_extension("lock"))?;
    lock.lock_exclusive()?;

    let result = load_document(path).and_then(|mut document: T| {
        let result = f(&mut document);
        save_document(path, parent, &document)?;
        Ok(result)
    });

    lock.unlock()?;
    result
}

/// Atomically replace a JSON document
///
/// Writes to a temp file in the same directory, syncs it to disk and renames
/// it over the original.
fn save_document<T: Serialize>(path: &Path, parent: &Path, document: &T) -> Result<()> {
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, document)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}
