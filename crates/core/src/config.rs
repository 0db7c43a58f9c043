//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Nothing in the pipeline reads process-wide environment variables
//! during request handling; binaries call [`CoreConfig::from_env`] (or build a config from the
//! `*_from_env_value` helpers) exactly once.

use crate::constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_GENERATION_BASE_URL, DEFAULT_GENERATION_MODELS,
    DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_TEMPERATURE,
};
use crate::validator::ValidationPolicy;
use crate::{StackError, StackResult};
use reference_data::{EvidenceIndex, LinkCatalog};
use stack_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One generation attempt's model settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Settings for the generative backend client.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    api_key: Option<NonEmptyText>,
    base_url: String,
    models: Vec<ModelConfig>,
    timeout: Duration,
}

impl GenerationConfig {
    /// Create a new `GenerationConfig`.
    ///
    /// A missing API key is allowed here; generation fails with
    /// `StackError::MissingConfig` when it is actually attempted.
    pub fn new(
        api_key: Option<NonEmptyText>,
        base_url: String,
        models: Vec<ModelConfig>,
        timeout: Duration,
    ) -> StackResult<Self> {
        if models.is_empty() {
            return Err(StackError::InvalidInput(
                "at least one generation model must be configured".into(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StackError::InvalidInput(
                "generation base URL must be an http(s) URL".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(StackError::InvalidInput(
                "generation timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            models,
            timeout,
        })
    }

    pub fn api_key(&self) -> Option<&NonEmptyText> {
        self.api_key.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    generation: GenerationConfig,
    validation: ValidationPolicy,
    evidence_index_path: Option<PathBuf>,
    link_catalog_path: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        database_path: PathBuf,
        generation: GenerationConfig,
        validation: ValidationPolicy,
    ) -> StackResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(StackError::InvalidInput(
                "database path cannot be empty".into(),
            ));
        }

        Ok(Self {
            database_path,
            generation,
            validation,
            evidence_index_path: None,
            link_catalog_path: None,
        })
    }

    /// Use reference data files instead of the bundled datasets.
    pub fn with_reference_overrides(
        mut self,
        evidence_index_path: Option<PathBuf>,
        link_catalog_path: Option<PathBuf>,
    ) -> Self {
        self.evidence_index_path = evidence_index_path;
        self.link_catalog_path = link_catalog_path;
        self
    }

    /// Resolve the full configuration from the process environment.
    ///
    /// Intended to be called once from a binary's `main`, after `.env` has been loaded.
    pub fn from_env() -> StackResult<Self> {
        let var = |name: &str| std::env::var(name).ok();

        let generation = GenerationConfig::new(
            api_key_from_env_value(var("GENERATION_API_KEY")),
            var("GENERATION_BASE_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_GENERATION_BASE_URL.into()),
            models_from_env_value(var("GENERATION_MODELS")),
            timeout_from_env_value(var("GENERATION_TIMEOUT_SECS"))?,
        )?;

        let validation = validation_policy_from_env_values(
            var("STACK_MIN_WORDS"),
            var("STACK_MIN_TABLE_ROWS"),
            var("STACK_MIN_CITATIONS"),
        )?;

        let database_path = var("STACK_DATABASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Ok(Self::new(database_path, generation, validation)?.with_reference_overrides(
            var("STACK_EVIDENCE_INDEX").filter(|v| !v.trim().is_empty()).map(PathBuf::from),
            var("STACK_LINK_CATALOG").filter(|v| !v.trim().is_empty()).map(PathBuf::from),
        ))
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn validation(&self) -> &ValidationPolicy {
        &self.validation
    }

    /// Load the evidence index: the override file when configured, else the bundled index.
    pub fn load_evidence_index(&self) -> StackResult<EvidenceIndex> {
        let index = match &self.evidence_index_path {
            Some(path) => EvidenceIndex::load(path)?,
            None => EvidenceIndex::bundled()?,
        };
        tracing::info!(
            "evidence index {} loaded with {} keys",
            index.version(),
            index.len()
        );
        Ok(index)
    }

    /// Load the link catalogue: the override file when configured, else the bundled catalogue.
    pub fn load_link_catalog(&self) -> StackResult<LinkCatalog> {
        let catalog = match &self.link_catalog_path {
            Some(path) => LinkCatalog::load(path)?,
            None => LinkCatalog::bundled()?,
        };
        tracing::info!(
            "link catalogue {} loaded with {} products",
            catalog.version(),
            catalog.len()
        );
        Ok(catalog)
    }
}

/// Parse the backend API key. Blank values count as unset.
pub fn api_key_from_env_value(value: Option<String>) -> Option<NonEmptyText> {
    value.and_then(|v| NonEmptyText::new(v).ok())
}

/// Parse a comma-separated, ordered model list.
///
/// If `value` is `None` or contains no names, returns the default escalation order.
pub fn models_from_env_value(value: Option<String>) -> Vec<ModelConfig> {
    let models: Vec<ModelConfig> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ModelConfig::new)
        .collect();

    if models.is_empty() {
        DEFAULT_GENERATION_MODELS
            .iter()
            .map(|name| ModelConfig::new(*name))
            .collect()
    } else {
        models
    }
}

/// Parse the per-call backend timeout in seconds.
pub fn timeout_from_env_value(value: Option<String>) -> StackResult<Duration> {
    let secs = count_from_env_value("GENERATION_TIMEOUT_SECS", value, DEFAULT_GENERATION_TIMEOUT_SECS as usize)?;
    if secs == 0 {
        return Err(StackError::InvalidInput(
            "GENERATION_TIMEOUT_SECS must be greater than zero".into(),
        ));
    }
    Ok(Duration::from_secs(secs as u64))
}

/// Build a validation policy, overriding the defaults with any provided values.
pub fn validation_policy_from_env_values(
    min_words: Option<String>,
    min_table_rows: Option<String>,
    min_citations: Option<String>,
) -> StackResult<ValidationPolicy> {
    let defaults = ValidationPolicy::default();
    Ok(ValidationPolicy {
        min_words: count_from_env_value("STACK_MIN_WORDS", min_words, defaults.min_words)?,
        min_table_rows: count_from_env_value(
            "STACK_MIN_TABLE_ROWS",
            min_table_rows,
            defaults.min_table_rows,
        )?,
        min_citations: count_from_env_value(
            "STACK_MIN_CITATIONS",
            min_citations,
            defaults.min_citations,
        )?,
        ..defaults
    })
}

fn count_from_env_value(name: &str, value: Option<String>, default: usize) -> StackResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(v) => v.parse::<usize>().map_err(|_| {
            StackError::InvalidInput(format!("{name} must be a non-negative integer, got '{v}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_from_env_value() {
        let defaults = models_from_env_value(None);
        assert_eq!(
            defaults.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            vec!["gpt-4o-mini", "gpt-4o"]
        );
        assert_eq!(models_from_env_value(Some(" , ".into())), defaults);

        let custom = models_from_env_value(Some("small, large ,".into()));
        assert_eq!(custom.len(), 2);
        assert_eq!(custom[1].name, "large");
    }

    #[test]
    fn test_timeout_from_env_value() {
        assert_eq!(timeout_from_env_value(None).unwrap(), Duration::from_secs(90));
        assert_eq!(
            timeout_from_env_value(Some("30".into())).unwrap(),
            Duration::from_secs(30)
        );
        assert!(timeout_from_env_value(Some("0".into())).is_err());
        assert!(timeout_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn test_validation_policy_from_env_values() {
        let policy =
            validation_policy_from_env_values(Some("900".into()), None, Some(" ".into())).unwrap();
        assert_eq!(policy.min_words, 900);
        assert_eq!(policy.min_table_rows, 10);
        assert_eq!(policy.min_citations, 8);

        let err = validation_policy_from_env_values(None, Some("-1".into()), None);
        assert!(matches!(err, Err(StackError::InvalidInput(msg)) if msg.contains("STACK_MIN_TABLE_ROWS")));
    }

    #[test]
    fn test_api_key_blank_is_unset() {
        assert!(api_key_from_env_value(Some("   ".into())).is_none());
        assert!(api_key_from_env_value(None).is_none());
        assert_eq!(
            api_key_from_env_value(Some(" sk-test ".into())).unwrap().as_str(),
            "sk-test"
        );
    }

    #[test]
    fn test_generation_config_validates() {
        let models = vec![ModelConfig::new("m")];
        assert!(GenerationConfig::new(None, "ftp://x".into(), models.clone(), Duration::from_secs(1)).is_err());
        assert!(GenerationConfig::new(None, "https://x".into(), Vec::new(), Duration::from_secs(1)).is_err());
        let cfg = GenerationConfig::new(None, "https://x/v1/".into(), models, Duration::from_secs(1)).unwrap();
        assert_eq!(cfg.base_url(), "https://x/v1");
    }

    #[test]
    fn test_reference_overrides_load_from_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let index_path = dir.path().join("index.yaml");
        std::fs::write(
            &index_path,
            "version: \"override\"\ncitations:\n  zinc:\n    - https://pubmed.ncbi.nlm.nih.gov/1/\n",
        )
        .unwrap();

        let generation = GenerationConfig::new(
            None,
            DEFAULT_GENERATION_BASE_URL.into(),
            models_from_env_value(None),
            Duration::from_secs(5),
        )
        .unwrap();
        let cfg = CoreConfig::new(dir.path().join("db.sqlite"), generation, ValidationPolicy::default())
            .unwrap()
            .with_reference_overrides(Some(index_path), None);

        assert_eq!(cfg.load_evidence_index().unwrap().version(), "override");
        assert!(!cfg.load_link_catalog().unwrap().is_empty());
    }
}
