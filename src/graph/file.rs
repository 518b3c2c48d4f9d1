// src/graph/file.rs

//! One build artifact, physical or virtual.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use tracing::{debug, trace};

use crate::graph::file_types::{CONTENT_HEAD_BYTES, FileTypes};
use crate::graph::hash::{compute_file_hash, compute_value_hash};
use crate::graph::paths::base_name;
use crate::types::JobName;

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Project-relative key.
    pub file_path: String,
    pub real_file_path: PathBuf,
    pub file_type: Option<String>,
    pub sub_type: Option<String>,
    pub is_virtual: bool,
    pub read_only: bool,
    pub hash: Option<String>,
    pub timestamp: Option<SystemTime>,
    pub value: Option<Value>,
    pub job_names: BTreeSet<JobName>,
    /// Changed since the last invalidation pass.
    pub has_been_updated: bool,
    /// Changed at any point during the current build.
    pub has_been_updated_cache: bool,
    /// Already offered to the rule catalog in this phase.
    pub analyzed: bool,
}

impl File {
    /// Construct the artifact for `key`.
    ///
    /// Returns `None` for a non-virtual path that is not a readable file.
    /// A freshly created physical file counts as updated.
    pub fn create(root: &Path, key: &str, file_types: &FileTypes) -> Option<File> {
        let real_file_path = root.join(key);
        let name = base_name(key);
        let class = file_types.classify(name, || read_head(&real_file_path));
        let is_virtual = class.as_ref().map(|c| c.is_virtual).unwrap_or(false);

        let mut file = File {
            file_path: key.to_string(),
            real_file_path,
            file_type: class.as_ref().map(|c| c.file_type.clone()),
            sub_type: class.and_then(|c| c.sub_type),
            is_virtual,
            read_only: false,
            hash: None,
            timestamp: None,
            value: None,
            job_names: BTreeSet::new(),
            has_been_updated: false,
            has_been_updated_cache: false,
            analyzed: false,
        };

        if !is_virtual {
            if !is_readable(&file.real_file_path) {
                trace!(file = %key, "not readable; artifact not created");
                return None;
            }
            file.refresh();
        }

        debug!(file = %key, file_type = ?file.file_type, "artifact created");
        Some(file)
    }

    /// Re-check the backing file. The timestamp follows the file's mtime and
    /// the artifact is marked updated only when the content hash changes.
    ///
    /// Returns `false` if the backing file has vanished. Virtual artifacts
    /// always exist.
    pub fn refresh(&mut self) -> bool {
        if self.is_virtual {
            return true;
        }
        let Ok(meta) = fs::metadata(&self.real_file_path) else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        let mtime = meta.modified().ok();
        if mtime == self.timestamp && self.hash.is_some() {
            return true;
        }
        self.timestamp = mtime;

        match compute_file_hash(&self.real_file_path) {
            Ok(hash) => {
                if self.hash.as_deref() != Some(hash.as_str()) {
                    trace!(file = %self.file_path, "content changed");
                    self.hash = Some(hash);
                    self.mark_updated();
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Assign a structured payload. Equal payloads and read-only artifacts
    /// are left alone. Returns whether anything changed.
    pub fn set_value(&mut self, value: Value) -> bool {
        if self.read_only {
            return false;
        }
        if self.value.as_ref() == Some(&value) {
            return false;
        }
        self.hash = Some(compute_value_hash(&value));
        self.value = Some(value);
        self.timestamp = Some(SystemTime::now());
        self.mark_updated();
        true
    }

    pub fn mark_updated(&mut self) {
        self.has_been_updated = true;
        self.has_been_updated_cache = true;
    }

    /// Start-of-phase reset: allow this phase to observe every change made
    /// during the build and offer the file to discovery again.
    pub fn phase_reset(&mut self) {
        self.has_been_updated = self.has_been_updated_cache;
        self.analyzed = false;
    }

    /// Start-of-build reset.
    pub fn clear_changes(&mut self) {
        self.has_been_updated = false;
        self.has_been_updated_cache = false;
    }

    pub fn file_name(&self) -> &str {
        base_name(&self.file_path)
    }

    pub fn has_type(&self, file_type: &str) -> bool {
        self.file_type.as_deref() == Some(file_type)
    }

    pub fn read_to_string(&self) -> std::io::Result<String> {
        fs::read_to_string(&self.real_file_path)
    }
}

fn is_readable(path: &Path) -> bool {
    path.is_file() && fs::File::open(path).is_ok()
}

fn read_head(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(CONTENT_HEAD_BYTES as u64).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}
