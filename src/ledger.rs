use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AtlasError;
use crate::fs_util::write_atomic;

pub const DEFAULT_GLOBAL: &str = "window.organismImages";

/// Persisted mapping from scientific name to downloaded image file name.
///
/// The file is a script assignment (`window.organismImages = {...};`) so the
/// study site can load it with a `<script>` tag. Every [`Ledger::put`]
/// rewrites the whole file.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: Utf8PathBuf,
    global: String,
    entries: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new(path: Utf8PathBuf, global: impl Into<String>) -> Self {
        Self {
            path,
            global: global.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Reads an existing ledger. Anything unreadable yields an empty ledger.
    pub fn load(path: Utf8PathBuf, global: impl Into<String>) -> Self {
        let mut ledger = Self::new(path, global);
        if !ledger.path.as_std_path().exists() {
            debug!(path = %ledger.path, "no ledger yet");
            return ledger;
        }
        match fs::read_to_string(ledger.path.as_std_path()) {
            Ok(content) => match parse_ledger(&content) {
                Some(entries) => ledger.entries = entries,
                None => warn!(path = %ledger.path, "ledger is not parseable, starting empty"),
            },
            Err(err) => warn!(path = %ledger.path, error = %err, "ledger unreadable, starting empty"),
        }
        ledger
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn get(&self, scientific: &str) -> Option<&str> {
        self.entries.get(scientific).map(String::as_str)
    }

    /// True when an entry exists and its image is still on disk.
    pub fn is_satisfied(&self, scientific: &str, image_dir: &Utf8Path) -> bool {
        self.get(scientific)
            .map(|file_name| image_dir.join(file_name).as_std_path().is_file())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Records an acquisition and flushes the full mapping.
    pub fn put(&mut self, scientific: &str, file_name: &str) -> Result<(), AtlasError> {
        self.entries
            .insert(scientific.to_string(), file_name.to_string());
        self.flush()
    }

    pub fn flush(&self) -> Result<(), AtlasError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| AtlasError::Ledger(err.to_string()))?;
        let content = format!("{} = {};\n", self.global, json);
        write_atomic(self.path.as_std_path(), content.as_bytes())
            .map_err(|err| AtlasError::Ledger(err.to_string()))?;
        debug!(path = %self.path, entries = self.entries.len(), "ledger flushed");
        Ok(())
    }
}

/// Entries whose value is not a string are dropped one by one.
fn parse_ledger(content: &str) -> Option<BTreeMap<String, String>> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    let object: Map<String, Value> = serde_json::from_str(&content[start..=end]).ok()?;
    let entries = object
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(file_name) => Some((key, file_name)),
            other => {
                warn!(scientific = %key, value = %other, "ignoring non-string ledger entry");
                None
            }
        })
        .collect();
    Some(entries)
}
