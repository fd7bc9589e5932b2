use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::app::StopFlag;
use crate::config::SearchSettings;
use crate::domain::TaxonRank;
use crate::error::AtlasError;

const DEFAULT_IMAGE_EXT: &str = ".jpg";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaxonMatch {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub default_photo: Option<DefaultPhoto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DefaultPhoto {
    #[serde(default)]
    pub medium_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TaxonMatch>,
}

impl TaxonMatch {
    pub fn rank(&self) -> Option<TaxonRank> {
        self.rank.parse().ok()
    }

    pub fn is_species_level(&self) -> bool {
        self.rank().map(TaxonRank::is_species_level).unwrap_or(false)
    }

    pub fn name_matches(&self, query: &str) -> bool {
        self.name.to_lowercase() == query.to_lowercase()
    }

    /// Medium rendition when offered, else the default photo URL.
    pub fn photo_url(&self) -> Option<&str> {
        let photo = self.default_photo.as_ref()?;
        photo
            .medium_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| photo.url.as_deref().filter(|url| !url.is_empty()))
    }
}

pub trait TaxonClient: Send + Sync {
    fn search(&self, scientific: &str) -> Result<Vec<TaxonMatch>, AtlasError>;
    fn download_photo(&self, url: &str, destination: &Path) -> Result<(), AtlasError>;
}

#[derive(Clone)]
pub struct InaturalistHttpClient {
    client: Client,
    settings: SearchSettings,
    stop: StopFlag,
}

impl InaturalistHttpClient {
    pub fn new(settings: SearchSettings) -> Result<Self, AtlasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("organism-atlas/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AtlasError::TaxaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AtlasError::TaxaHttp(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            stop: StopFlag::new(),
        })
    }

    /// Gives up on pending retries once `stop` is raised.
    pub fn with_stop(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    fn rank_param(&self) -> String {
        self.settings
            .ranks
            .iter()
            .map(|rank| rank.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn search_once(&self, scientific: &str) -> Result<Vec<TaxonMatch>, AtlasError> {
        let per_page = self.settings.per_page.to_string();
        let ranks = self.rank_param();
        let response = self
            .client
            .get(&self.settings.api_base)
            .query(&[
                ("q", scientific),
                ("per_page", per_page.as_str()),
                ("locale", self.settings.locale.as_str()),
                ("preferred_place_id", self.settings.preferred_place_id.as_str()),
                ("rank", ranks.as_str()),
            ])
            .send()
            .map_err(|err| AtlasError::TaxaHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "iNaturalist request failed".to_string());
            return Err(AtlasError::TaxaStatus { status, message });
        }
        let body: SearchResponse = response
            .json()
            .map_err(|err| AtlasError::TaxaHttp(err.to_string()))?;
        Ok(body.results)
    }

    fn with_retries<T, F>(&self, mut op: F) -> Result<T, AtlasError>
    where
        F: FnMut() -> Result<T, AtlasError>,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.settings.retries && !self.stop.is_raised() => {
                    attempt += 1;
                    debug!(attempt, error = %err, "retrying taxa search");
                    thread::sleep(self.settings.retry_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl TaxonClient for InaturalistHttpClient {
    fn search(&self, scientific: &str) -> Result<Vec<TaxonMatch>, AtlasError> {
        debug!(query = scientific, "taxa.request");
        let results = self.with_retries(|| self.search_once(scientific))?;
        debug!(query = scientific, results = results.len(), "taxa.response");
        Ok(results)
    }

    fn download_photo(&self, url: &str, destination: &Path) -> Result<(), AtlasError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AtlasError::PhotoHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AtlasError::PhotoStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| AtlasError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("organism-photo")
            .tempfile_in(parent)
            .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut temp)
            .map_err(|err| AtlasError::PhotoHttp(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Picks the best candidate for `query`: an exact species-level name match,
/// then the first species-level result, then the first result.
pub fn select_taxon<'a>(results: &'a [TaxonMatch], query: &str) -> Option<&'a TaxonMatch> {
    results
        .iter()
        .find(|taxon| taxon.name_matches(query) && taxon.is_species_level())
        .or_else(|| results.iter().find(|taxon| taxon.is_species_level()))
        .or_else(|| results.first())
}

/// `Panthera leo` + `.../medium.JPG` -> `panthera_leo.jpg`.
pub fn image_file_name(scientific: &str, photo_url: &str) -> String {
    let stem = scientific.to_lowercase().replace(' ', "_");
    let ext = url_extension(photo_url).unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string());
    format!("{stem}{ext}")
}

fn url_extension(photo_url: &str) -> Option<String> {
    let path = match Url::parse(photo_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => photo_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    Path::new(segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}
