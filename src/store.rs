//! The record store: one JSON document per deployment, loaded and replaced
//! whole. Keyed access is a linear scan over the `users` and `subjects`
//! collections; the store does not police uniqueness (duplicate usernames are
//! accepted silently and first match wins on lookup).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::normalize::Record;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: Vec<Record>,
    #[serde(default)]
    pub subjects: Vec<Record>,
}

impl Document {
    /// First record whose username matches, if any.
    pub fn find_user(&self, username: &str) -> Option<&Record> {
        self.users
            .iter()
            .find(|r| r.get("username").and_then(Value::as_str) == Some(username))
    }

    pub fn find_subject(&self, code: &str) -> Option<&Record> {
        self.subjects
            .iter()
            .find(|r| r.get("code").and_then(Value::as_str) == Some(code))
    }

    /// Append. Uniqueness is the caller's responsibility.
    pub fn add_user(&mut self, record: Record) {
        self.users.push(record);
    }

    pub fn add_subject(&mut self, record: Record) {
        self.subjects.push(record);
    }

    /// Merge-patch the first matching user record. Returns whether a match
    /// was found.
    pub fn update_user(&mut self, username: &str, patch: &Record) -> bool {
        merge_first(&mut self.users, "username", username, patch)
    }

    pub fn update_subject(&mut self, code: &str, patch: &Record) -> bool {
        merge_first(&mut self.subjects, "code", code, patch)
    }

    /// Remove ALL records matching the username, not just the first. Returns
    /// whether anything was removed.
    pub fn delete_user(&mut self, username: &str) -> bool {
        let before = self.users.len();
        self.users
            .retain(|r| r.get("username").and_then(Value::as_str) != Some(username));
        self.users.len() != before
    }

    pub fn delete_subject(&mut self, code: &str) -> bool {
        let before = self.subjects.len();
        self.subjects
            .retain(|r| r.get("code").and_then(Value::as_str) != Some(code));
        self.subjects.len() != before
    }
}

fn merge_first(records: &mut [Record], key: &str, wanted: &str, patch: &Record) -> bool {
    for rec in records.iter_mut() {
        if rec.get(key).and_then(Value::as_str) == Some(wanted) {
            for (k, v) in patch {
                rec.insert(k.clone(), v.clone());
            }
            return true;
        }
    }
    false
}

pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.document_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. A missing file initializes an empty document
    /// on disk first; a present-but-unparsable file is corruption and is
    /// propagated, never repaired.
    pub fn load(&self) -> Result<Document, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "document missing, initializing empty");
                let doc = Document::default();
                self.save(&doc)?;
                return Ok(doc);
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Overwrite the document. Writes a sibling temp file and renames it over
    /// the target, so a load within this process never observes a partial
    /// write. No cross-process locking.
    pub fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let io_err = |e: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let text = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp).map_err(io_err)?;
            f.write_all(text.as_bytes()).map_err(io_err)?;
            f.flush().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
