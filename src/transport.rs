//! Save persistence boundary: the single-slot request queue, JSON encoding and
//! a file-backed store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::save::SaveRecord;

const SAVE_FILE: &str = "save.json";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("save io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed save payload: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("unable to encode save: {0}")]
    Serialization(#[source] serde_json::Error),
}

pub fn parse_save_record(raw: &str) -> Result<SaveRecord, TransportError> {
    serde_json::from_str(raw).map_err(TransportError::Deserialization)
}

pub fn encode_save_record(record: &SaveRecord) -> Result<String, TransportError> {
    serde_json::to_string_pretty(record).map_err(TransportError::Serialization)
}

/// At most one save in flight. A newer request replaces an older pending one.
#[derive(Debug, Default)]
pub struct SaveQueue {
    pending: Option<SaveRecord>,
    in_flight: Option<SaveRecord>,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a snapshot; returns true when it superseded an unsent one.
    pub fn request(&mut self, record: SaveRecord) -> bool {
        self.pending.replace(record).is_some()
    }

    /// Hands out the pending snapshot unless another one is still in flight.
    pub fn take(&mut self) -> Option<SaveRecord> {
        if self.in_flight.is_some() {
            return None;
        }
        let record = self.pending.take()?;
        self.in_flight = Some(record.clone());
        Some(record)
    }

    /// Acknowledges the in-flight save. A failed save is queued again unless a
    /// newer snapshot is already waiting.
    pub fn complete(&mut self, success: bool) {
        let flown = self.in_flight.take();
        if !success && self.pending.is_none() {
            self.pending = flown;
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Stores one save per colony under `<root>/<colony>/save.json`.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    root: PathBuf,
}

impl FileSaveStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, colony: &str) -> PathBuf {
        self.root.join(colony).join(SAVE_FILE)
    }

    pub fn has_save(&self, colony: &str) -> bool {
        self.path_for(colony).is_file()
    }

    pub fn write(&self, colony: &str, record: &SaveRecord) -> Result<PathBuf, TransportError> {
        let path = self.path_for(colony);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let payload = encode_save_record(record)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload)?;
        fs::rename(&staging, &path)?;
        info!(path = %path.display(), tiles = record.tiles.len(), "wrote save");
        Ok(path)
    }

    pub fn read(&self, colony: &str) -> Result<Option<SaveRecord>, TransportError> {
        let path = self.path_for(colony);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no save found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        parse_save_record(&raw).map(Some)
    }
}
