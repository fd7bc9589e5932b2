use std::time::Duration;

use assert_matches::assert_matches;

use organism_atlas::config::{Config, ConfigLoader, DEFAULT_API_BASE, default_decks};
use organism_atlas::domain::TaxonRank;
use organism_atlas::error::AtlasError;

#[test]
fn parse_config_overrides() {
    let config: Config = serde_json::from_str(
        r#"{
            "catalog_path": "interactive/organisms/organisms_data.js",
            "image_dir": "interactive/organisms/images",
            "ranks": ["species", "subspecies", "family"],
            "retry_delay_ms": 50,
            "pause_ms": 0,
            "strip_html": true
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(
        resolved.images.catalog_path.as_str(),
        "interactive/organisms/organisms_data.js"
    );
    assert_eq!(resolved.images.ledger_path.as_str(), "organisms_images.js");
    assert_eq!(
        resolved.search.ranks,
        vec![TaxonRank::Species, TaxonRank::Subspecies, TaxonRank::Family]
    );
    assert_eq!(resolved.search.api_base, DEFAULT_API_BASE);
    assert_eq!(resolved.search.retries, 2);
    assert_eq!(resolved.search.retry_delay, Duration::from_millis(50));
    assert_eq!(resolved.images.pause, Duration::ZERO);
    assert!(resolved.decks.strip_html);
    assert_eq!(resolved.decks.decks, default_decks());
}

#[test]
fn unknown_field_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("organism-atlas.json");
    std::fs::write(&path, r#"{ "catalogue": "organisms_data.js" }"#).unwrap();

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, AtlasError::ConfigParse(_));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, AtlasError::ConfigRead(_));
}

#[test]
fn zero_page_size_is_rejected() {
    let config = Config {
        per_page: Some(0),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, AtlasError::ConfigParse(_));
}
