use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_MARKER;
use crate::domain::{TaxonRank, default_search_ranks};
use crate::error::AtlasError;
use crate::ledger::DEFAULT_GLOBAL;

pub const DEFAULT_CONFIG_FILE: &str = "organism-atlas.json";
pub const DEFAULT_API_BASE: &str = "https://api.inaturalist.org/v1/taxa";

/// On-disk configuration. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub catalog_marker: Option<String>,
    #[serde(default)]
    pub image_dir: Option<String>,
    #[serde(default)]
    pub ledger_path: Option<String>,
    #[serde(default)]
    pub ledger_global: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub preferred_place_id: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub ranks: Option<Vec<String>>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub pause_ms: Option<u64>,
    #[serde(default)]
    pub deck_dir: Option<String>,
    #[serde(default)]
    pub deck_output_dir: Option<String>,
    #[serde(default)]
    pub decks: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub strip_html: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub api_base: String,
    pub locale: String,
    pub preferred_place_id: String,
    pub per_page: u32,
    pub ranks: Vec<TaxonRank>,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            locale: "en-GB".to_string(),
            preferred_place_id: "6857".to_string(),
            per_page: 10,
            ranks: default_search_ranks(),
            retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub catalog_path: Utf8PathBuf,
    pub catalog_marker: String,
    pub image_dir: Utf8PathBuf,
    pub ledger_path: Utf8PathBuf,
    pub ledger_global: String,
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckSettings {
    pub input_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub decks: BTreeMap<String, String>,
    pub strip_html: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub search: SearchSettings,
    pub images: ImageSettings,
    pub decks: DeckSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `organism-atlas.json` when present, or the defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, AtlasError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| AtlasError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| AtlasError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, AtlasError> {
        let defaults = SearchSettings::default();
        let ranks = match config.ranks {
            Some(ranks) if !ranks.is_empty() => ranks
                .iter()
                .map(|rank| rank.parse())
                .collect::<Result<Vec<TaxonRank>, AtlasError>>()?,
            _ => defaults.ranks,
        };
        let per_page = config.per_page.unwrap_or(defaults.per_page);
        if per_page == 0 {
            return Err(AtlasError::ConfigParse(
                "per_page must be at least 1".to_string(),
            ));
        }

        let search = SearchSettings {
            api_base: config.api_base.unwrap_or(defaults.api_base),
            locale: config.locale.unwrap_or(defaults.locale),
            preferred_place_id: config
                .preferred_place_id
                .unwrap_or(defaults.preferred_place_id),
            per_page,
            ranks,
            retries: config.retries.unwrap_or(defaults.retries),
            retry_delay: config
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
        };

        let images = ImageSettings {
            catalog_path: path_or(config.catalog_path, "organisms_data.js"),
            catalog_marker: config
                .catalog_marker
                .unwrap_or_else(|| DEFAULT_MARKER.to_string()),
            image_dir: path_or(config.image_dir, "images"),
            ledger_path: path_or(config.ledger_path, "organisms_images.js"),
            ledger_global: config
                .ledger_global
                .unwrap_or_else(|| DEFAULT_GLOBAL.to_string()),
            pause: Duration::from_millis(config.pause_ms.unwrap_or(200)),
        };

        let decks = DeckSettings {
            input_dir: path_or(config.deck_dir, "ANKI files"),
            output_dir: path_or(config.deck_output_dir, "data"),
            decks: config.decks.unwrap_or_else(default_decks),
            strip_html: config.strip_html.unwrap_or(false),
        };

        Ok(ResolvedConfig {
            search,
            images,
            decks,
        })
    }
}

pub fn default_decks() -> BTreeMap<String, String> {
    [
        ("biology", "IGCSE__Biology_v2.apkg"),
        ("chemistry", "IGCSE__Chemistry_v3.apkg"),
        ("physics", "IGCSE__Physics_v1.apkg"),
        ("physics-eqns", "IGCSE__Physics-eqns_v1.apkg"),
    ]
    .into_iter()
    .map(|(id, file)| (id.to_string(), file.to_string()))
    .collect()
}

fn path_or(value: Option<String>, default: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(value.unwrap_or_else(|| default.to_string()))
}
