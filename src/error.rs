use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AtlasError {
    #[error("failed to read catalog file at {0}")]
    CatalogRead(PathBuf),

    #[error("marker `{0}` not found in catalog source")]
    #[diagnostic(help("the catalog must contain a literal like `const sectionOrganisms = {{ ... }};`"))]
    LiteralMarkerMissing(String),

    #[error("unable to locate a balanced object literal after `{0}`")]
    LiteralUnbalanced(String),

    #[error("failed to parse catalog literal: {0}")]
    #[diagnostic(help(
        "the literal is normalized to JSON before parsing; nested quotes or `, word:` inside strings are not supported"
    ))]
    CatalogParse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid taxon rank: {0}")]
    InvalidRank(String),

    #[error("iNaturalist request failed: {0}")]
    TaxaHttp(String),

    #[error("iNaturalist returned status {status}: {message}")]
    TaxaStatus { status: u16, message: String },

    #[error("photo download failed: {0}")]
    PhotoHttp(String),

    #[error("photo host returned status {status} for {url}")]
    PhotoStatus { status: u16, url: String },

    #[error("failed to write ledger: {0}")]
    Ledger(String),

    #[error("deck archive error: {0}")]
    Archive(String),

    #[error("deck database error: {0}")]
    Database(String),

    #[error("failed to install interrupt handler: {0}")]
    Signal(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
