use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON-file persistence scoped to one directory.
///
/// Reads never fail: a missing file yields the caller's defaults and a
/// corrupt file is deleted and replaced by them. Writes go through a
/// backup-write-delete cycle so a failed write always leaves either the
/// old record or a `.backup` of it on disk.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    dir: PathBuf,
}

impl PreferenceStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    fn backup_path(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{filename}.backup"))
    }

    /// Load a record, falling back to `defaults`.
    ///
    /// Absent file: defaults, and nothing is written (files appear on first
    /// save). Unparseable file: the file is deleted so the next save starts
    /// clean. A readable record gets any missing default keys filled in;
    /// keys the defaults do not know are left untouched.
    pub fn load(&self, filename: &str, defaults: &Value) -> Value {
        let path = self.path_for(filename);
        let backup = self.backup_path(filename);
        if backup.exists() {
            // Leftover from a failed save. Kept for manual recovery; the
            // next successful save will replace it.
            warn!("found retained backup {}", backup.display());
        }
        if !path.exists() {
            return defaults.clone();
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("could not read {}: {e}", path.display());
                return defaults.clone();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(mut record) => {
                merge_defaults(&mut record, defaults);
                record
            }
            Err(e) => {
                warn!("corrupt preference file {}, resetting: {e}", path.display());
                if let Err(rm_err) = fs::remove_file(&path) {
                    warn!("could not remove corrupt file: {rm_err}");
                }
                defaults.clone()
            }
        }
    }

    /// Persist a record with backup-write-delete.
    ///
    /// The previous file (if any) is copied to `<filename>.backup` before
    /// the write and removed only after the write succeeds. On failure the
    /// backup stays behind for manual recovery and the error comes back to
    /// the caller.
    pub fn save(&self, filename: &str, record: &Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(filename);
        let backup = self.backup_path(filename);

        let serialized = serde_json::to_string_pretty(record)?;

        if path.exists() {
            fs::copy(&path, &backup)?;
            debug!("created backup {}", backup.display());
        }

        if let Err(e) = fs::write(&path, serialized) {
            if backup.exists() {
                warn!(
                    "failed to save {}, backup retained at {}",
                    path.display(),
                    backup.display()
                );
            }
            return Err(e.into());
        }

        if backup.exists() {
            if let Err(e) = fs::remove_file(&backup) {
                // Not worth failing the save over. A stale backup is
                // overwritten by the next one.
                warn!("saved {} but could not clean up backup: {e}", path.display());
            }
        }
        Ok(())
    }

    pub fn remove(&self, filename: &str) -> Result<(), StoreError> {
        let path = self.path_for(filename);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Fill missing top-level keys of `record` from `defaults`. Present keys
/// always win, so user settings survive a defaults change; non-object
/// records pass through unmodified.
pub fn merge_defaults(record: &mut Value, defaults: &Value) {
    let Some(default_map) = defaults.as_object() else {
        return;
    };
    let Some(record_map) = record.as_object_mut() else {
        return;
    };
    for (key, value) in default_map {
        record_map
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}
