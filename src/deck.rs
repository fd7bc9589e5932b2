//! Anki `.apkg` archives to JSON card lists.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::DeckSettings;
use crate::error::AtlasError;
use crate::fs_util::{extract_first_entry, write_atomic};

/// Separator between note fields in `notes.flds`.
pub const FIELD_SEPARATOR: char = '\u{1f}';

const COLLECTION_ENTRIES: [&str; 2] = ["collection.anki2", "collection.anki21"];
const CARDS_QUERY: &str =
    "SELECT cards.id, notes.flds FROM cards JOIN notes ON cards.nid = notes.id ORDER BY cards.id";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeckStatus {
    Exported { cards: usize, output: String },
    Missing,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckItemResult {
    pub deck_id: String,
    pub archive: String,
    #[serde(flatten)]
    pub status: DeckStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckResult {
    pub decks: Vec<DeckItemResult>,
}

pub struct DeckConverter {
    settings: DeckSettings,
}

impl DeckConverter {
    pub fn new(settings: DeckSettings) -> Self {
        Self { settings }
    }

    /// Converts every configured deck. A missing or broken archive is
    /// reported and the remaining decks still run.
    pub fn convert_all(&self, sink: &dyn ProgressSink) -> DeckResult {
        let mut decks = Vec::with_capacity(self.settings.decks.len());
        for (deck_id, file_name) in &self.settings.decks {
            let archive = self.settings.input_dir.join(file_name);
            let status = if !archive.as_std_path().is_file() {
                warn!(deck = %deck_id, archive = %archive, "deck archive missing");
                sink.event(ProgressEvent::line(format!("[WARN] Missing apkg: {archive}")));
                DeckStatus::Missing
            } else {
                match self.convert_deck(deck_id, archive.as_std_path()) {
                    Ok((cards, output)) => {
                        info!(deck = %deck_id, cards, output = %output, "deck exported");
                        sink.event(ProgressEvent::line(format!(
                            "[OK] {deck_id}: {cards} cards -> {output}"
                        )));
                        DeckStatus::Exported { cards, output }
                    }
                    Err(err) => {
                        warn!(deck = %deck_id, error = %err, "deck conversion failed");
                        sink.event(ProgressEvent::line(format!("[ERROR] {deck_id}: {err}")));
                        DeckStatus::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            };
            decks.push(DeckItemResult {
                deck_id: deck_id.clone(),
                archive: archive.to_string(),
                status,
            });
        }
        DeckResult { decks }
    }

    /// Returns the number of cards written and the output path.
    pub fn convert_deck(&self, deck_id: &str, archive: &Path) -> Result<(usize, String), AtlasError> {
        let work_dir = tempfile::Builder::new()
            .prefix("organism-atlas-deck")
            .tempdir()
            .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
        let collection = extract_first_entry(archive, &COLLECTION_ENTRIES, work_dir.path())?;
        let cards = read_cards(&collection, self.settings.strip_html)?;

        let output = self.settings.output_dir.join(format!("{deck_id}.json"));
        let content = serde_json::to_vec_pretty(&cards)
            .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
        write_atomic(output.as_std_path(), &content)?;
        Ok((cards.len(), output.to_string()))
    }
}

pub fn read_cards(collection: &Path, strip_html: bool) -> Result<Vec<Card>, AtlasError> {
    let conn = Connection::open_with_flags(collection, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|err| AtlasError::Database(err.to_string()))?;
    let mut stmt = conn
        .prepare(CARDS_QUERY)
        .map_err(|err| AtlasError::Database(err.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(|err| AtlasError::Database(err.to_string()))?;

    let mut cards = Vec::new();
    for row in rows {
        let (id, fields) = row.map_err(|err| AtlasError::Database(err.to_string()))?;
        let (front, back) = split_fields(&fields, strip_html);
        cards.push(Card { id, front, back });
    }
    Ok(cards)
}

/// First two note fields; absent fields are empty.
pub fn split_fields(fields: &str, strip_html: bool) -> (String, String) {
    let mut parts = fields.split(FIELD_SEPARATOR);
    let front = parts.next().unwrap_or_default();
    let back = parts.next().unwrap_or_default();
    if strip_html {
        (strip_tags(front), strip_tags(back))
    } else {
        (front.to_string(), back.to_string())
    }
}

pub fn strip_tags(html: &str) -> String {
    HTML_TAG.replace_all(html, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_unit_separator() {
        let (front, back) = split_fields("Mitochondria\u{1f}Site of respiration\u{1f}extra", false);
        assert_eq!(front, "Mitochondria");
        assert_eq!(back, "Site of respiration");
    }

    #[test]
    fn missing_back_is_empty() {
        assert_eq!(
            split_fields("Only a front", false),
            ("Only a front".to_string(), String::new())
        );
    }

    #[test]
    fn strips_tags_when_requested() {
        let (front, back) = split_fields("<b>Osmosis</b> \u{1f}<div>water&nbsp;moves</div>", true);
        assert_eq!(front, "Osmosis");
        assert_eq!(back, "water&nbsp;moves");
    }
}
