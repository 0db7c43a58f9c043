//! Static reference data for stack generation.
//!
//! This crate provides **wire models** and **format/translation helpers** for the two curated,
//! versioned datasets the pipeline consults:
//! - the evidence index (canonical supplement key → ordered citation URLs)
//! - the link catalogue (canonical supplement key → purchase-link variants and monthly cost)
//!
//! Both are parsed strictly from YAML, loaded once at startup and then shared read-only. A
//! default copy of each dataset is bundled into the binary.

pub mod evidence_index;
pub mod link_catalog;

pub use evidence_index::EvidenceIndex;
pub use link_catalog::{CatalogEntry, LinkCatalog};

/// Errors returned by the `reference-data` crate.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`ReferenceDataError`].
pub type ReferenceResult<T> = Result<T, ReferenceDataError>;

/// Deserialises YAML into a wire struct, reporting the failing path on mismatch.
pub(crate) fn parse_wire<T>(yaml_text: &str, what: &str) -> ReferenceResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    match serde_path_to_error::deserialize::<_, T>(deserializer) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(ReferenceDataError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Normalises a dataset key: trimmed, lower-cased, inner whitespace replaced by hyphens.
pub(crate) fn normalise_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn validate_url(key: &str, url: &str) -> ReferenceResult<()> {
    let url = url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) || url.contains(char::is_whitespace)
    {
        return Err(ReferenceDataError::InvalidInput(format!(
            "entry '{key}' has an invalid URL: {url}"
        )));
    }
    Ok(())
}
