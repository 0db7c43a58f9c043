//! Evidence index wire model and lookup.
//!
//! The evidence index maps a canonical supplement key (or alias slug) to an ordered list of
//! citation URLs, most authoritative first. It is versioned so that a persisted stack can be
//! traced back to the citation set it was generated against.
//!
//! Wire format:
//! ```yaml
//! version: "2026.09"
//! citations:
//!   magnesium:
//!     - https://ods.od.nih.gov/factsheets/Magnesium-HealthProfessional/
//! ```

use crate::{normalise_key, parse_wire, validate_url, ReferenceDataError, ReferenceResult};
use serde::{Deserialize, Serialize};
use stack_types::NonEmptyText;
use std::collections::BTreeMap;
use std::path::Path;

const BUNDLED_EVIDENCE_INDEX: &str = include_str!("../data/evidence_index.yaml");

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EvidenceIndexWire {
    version: String,
    citations: BTreeMap<String, Vec<String>>,
}

/// Immutable, versioned citation lookup table.
///
/// Keys are stored normalised (lower-case, whitespace replaced by hyphens) and iterate in
/// sorted order, which keeps fuzzy matching deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceIndex {
    version: NonEmptyText,
    citations: BTreeMap<String, Vec<String>>,
}

impl EvidenceIndex {
    /// Parse an evidence index from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceDataError`] if:
    /// - the YAML does not match the wire schema (unknown keys, wrong types),
    /// - the version is blank,
    /// - an entry has no citations or a URL that is not http(s),
    /// - two keys collide after normalisation.
    pub fn parse(yaml_text: &str) -> ReferenceResult<Self> {
        let wire: EvidenceIndexWire = parse_wire(yaml_text, "Evidence index")?;
        Self::from_entries(&wire.version, wire.citations)
    }

    /// Build an index from already-decoded entries, applying the same validation as `parse`.
    pub fn from_entries<I, K>(version: &str, entries: I) -> ReferenceResult<Self>
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: AsRef<str>,
    {
        let version = NonEmptyText::new(version).map_err(|_| {
            ReferenceDataError::InvalidInput("evidence index version cannot be empty".into())
        })?;

        let mut citations = BTreeMap::new();
        for (raw_key, urls) in entries {
            let key = normalise_key(raw_key.as_ref());
            if key.is_empty() {
                return Err(ReferenceDataError::InvalidInput(
                    "evidence index contains an empty key".into(),
                ));
            }
            if urls.is_empty() {
                return Err(ReferenceDataError::InvalidInput(format!(
                    "evidence index entry '{key}' has no citations"
                )));
            }
            let mut cleaned = Vec::with_capacity(urls.len());
            for url in urls {
                validate_url(&key, &url)?;
                cleaned.push(url.trim().to_string());
            }
            if citations.insert(key.clone(), cleaned).is_some() {
                return Err(ReferenceDataError::InvalidInput(format!(
                    "evidence index key '{key}' is duplicated after normalisation"
                )));
            }
        }

        Ok(Self { version, citations })
    }

    /// The evidence index compiled into the binary.
    pub fn bundled() -> ReferenceResult<Self> {
        Self::parse(BUNDLED_EVIDENCE_INDEX)
    }

    /// Load an evidence index from a YAML file.
    pub fn load(path: &Path) -> ReferenceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Render the index back to its YAML wire format.
    pub fn render(&self) -> ReferenceResult<String> {
        let wire = EvidenceIndexWire {
            version: self.version.as_str().to_string(),
            citations: self.citations.clone(),
        };
        Ok(serde_yaml::to_string(&wire)?)
    }

    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Exact-key lookup. The key is normalised the same way stored keys are.
    pub fn lookup(&self, key: &str) -> Option<&[String]> {
        self.citations.get(&normalise_key(key)).map(Vec::as_slice)
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.citations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_index_parses() {
        let index = EvidenceIndex::bundled().expect("bundled index should parse");
        assert!(!index.is_empty());
        assert!(index.lookup("magnesium").is_some());
        assert!(index.lookup("omega-3").is_some());
    }

    #[test]
    fn test_lookup_normalises_key() {
        let index = EvidenceIndex::from_entries(
            "test",
            [(
                "Vitamin D3",
                vec!["https://doi.org/10.1056/NEJMoa1809944".to_string()],
            )],
        )
        .unwrap();
        assert!(index.lookup("vitamin-d3").is_some());
        assert!(index.lookup("  VITAMIN d3 ").is_some());
        assert!(index.lookup("vitamin").is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_keys_with_path() {
        let input = r#"version: "1"
citations:
  magnesium:
    - https://example.org/a
unexpected: true
"#;
        let err = EvidenceIndex::parse(input).expect_err("should reject unknown key");
        match err {
            ReferenceDataError::Translation(msg) => assert!(msg.contains("unexpected")),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let input = r#"version: "1"
citations:
  magnesium: "not a list"
"#;
        let err = EvidenceIndex::parse(input).expect_err("should reject wrong type");
        match err {
            ReferenceDataError::Translation(msg) => assert!(msg.contains("magnesium")),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_empty_citation_list_and_bad_urls() {
        let empty = EvidenceIndex::from_entries("1", [("zinc", Vec::<String>::new())]);
        assert!(matches!(empty, Err(ReferenceDataError::InvalidInput(_))));

        let bad = EvidenceIndex::from_entries("1", [("zinc", vec!["ftp://x".to_string()])]);
        assert!(matches!(bad, Err(ReferenceDataError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_keys_colliding_after_normalisation() {
        let result = EvidenceIndex::from_entries(
            "1",
            [
                ("fish oil", vec!["https://example.org/a".to_string()]),
                ("Fish Oil", vec!["https://example.org/b".to_string()]),
            ],
        );
        assert!(matches!(result, Err(ReferenceDataError::InvalidInput(_))));
    }

    #[test]
    fn test_render_then_parse_preserves_entries() {
        let index = EvidenceIndex::bundled().unwrap();
        let yaml = index.render().unwrap();
        assert_eq!(EvidenceIndex::parse(&yaml).unwrap(), index);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.yaml");
        std::fs::write(
            &path,
            "version: \"2\"\ncitations:\n  creatine:\n    - https://pubmed.ncbi.nlm.nih.gov/28615996/\n",
        )
        .unwrap();
        let index = EvidenceIndex::load(&path).unwrap();
        assert_eq!(index.version(), "2");
        assert_eq!(index.len(), 1);
    }
}
