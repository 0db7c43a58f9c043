//! The `StackService` facade: one generation run from submission id to persisted stack.
//!
//! Stages run sequentially: load intake, orchestrate generation, parse, screen, resolve
//! evidence, attach links, assemble the document and persist it. Only configuration errors and
//! unknown submissions abort a run; every other failure degrades the result instead.

use crate::backend::{ChatCompletionsBackend, GenerativeBackend, TokenUsage};
use crate::config::CoreConfig;
use crate::evidence::EvidenceResolver;
use crate::item::{dedupe_by_name, monthly_cost, StackItem};
use crate::links::{apply_link_policy, attach_catalog, BrandBucket};
use crate::orchestrator::PromptOrchestrator;
use crate::parser::parse_items;
use crate::prompt::build_prompt;
use crate::report::{assemble, fallback_document};
use crate::repositories::sqlite::SqliteStore;
use crate::repositories::{StackRecord, StackRepository, StoredStack};
use crate::safety::{RuleBasedScreener, SafetyProfile, SafetyScreener};
use crate::submission::IntakeLoader;
use crate::validation::validate_submission_id;
use crate::validator::ValidationPolicy;
use crate::StackResult;
use chrono::Utc;
use reference_data::LinkCatalog;
use serde::Serialize;
use stack_types::{NormalizedName, SafetyStatus};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Everything one run produced. Returned even when persistence failed.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub submission_id: String,
    pub stack_id: Option<i64>,
    pub generation_id: Uuid,
    pub document: String,
    pub items: Vec<StackItem>,
    pub safety_status: SafetyStatus,
    pub validated: bool,
    pub model_used: Option<String>,
    pub usage: TokenUsage,
    pub monthly_cost: f64,
    pub saved: bool,
    pub items_inserted: usize,
}

/// Wires the pipeline stages together. Cheap to share behind an `Arc`.
pub struct StackService {
    intake: Arc<dyn IntakeLoader>,
    repository: Arc<dyn StackRepository>,
    screener: Arc<dyn SafetyScreener>,
    orchestrator: PromptOrchestrator,
    evidence: EvidenceResolver,
    catalog: Arc<LinkCatalog>,
    policy: ValidationPolicy,
}

impl StackService {
    pub fn new(
        intake: Arc<dyn IntakeLoader>,
        repository: Arc<dyn StackRepository>,
        screener: Arc<dyn SafetyScreener>,
        orchestrator: PromptOrchestrator,
        evidence: EvidenceResolver,
        catalog: Arc<LinkCatalog>,
        policy: ValidationPolicy,
    ) -> Self {
        Self {
            intake,
            repository,
            screener,
            orchestrator,
            evidence,
            catalog,
            policy,
        }
    }

    /// Build the production service: SQLite store, HTTP backend, rule-based screener and the
    /// configured reference data.
    pub fn from_config(cfg: &CoreConfig, store: Arc<SqliteStore>) -> StackResult<Self> {
        let backend: Arc<dyn GenerativeBackend> =
            Arc::new(ChatCompletionsBackend::new(cfg.generation())?);
        let orchestrator = PromptOrchestrator::new(
            backend,
            cfg.generation().models().to_vec(),
            *cfg.validation(),
        );
        let evidence = EvidenceResolver::new(Arc::new(cfg.load_evidence_index()?));
        let catalog = Arc::new(cfg.load_link_catalog()?);

        Ok(Self::new(
            store.clone(),
            store,
            Arc::new(RuleBasedScreener::new()),
            orchestrator,
            evidence,
            catalog,
            *cfg.validation(),
        ))
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Run the full pipeline for one submission.
    pub async fn generate(&self, submission_id: &str) -> StackResult<GenerationResult> {
        validate_submission_id(submission_id)?;
        let submission = self.intake.fetch(submission_id)?;
        let prompt = build_prompt(&submission, Utc::now().date_naive(), &self.policy);

        let outcome = self.orchestrator.run(&prompt).await?;

        let (document, items, safety_status) = match outcome.text.as_deref() {
            None => {
                tracing::warn!(
                    "no generation attempt produced text for {}; storing fallback document",
                    submission_id
                );
                let items: Vec<StackItem> = Vec::new();
                let document = assemble(&fallback_document(), &items, &[]);
                (document, items, SafetyStatus::Warning)
            }
            Some(text) => {
                let parsed = parse_items(text);
                let before: Vec<NormalizedName> =
                    parsed.iter().map(StackItem::normalized_name).collect();

                let profile = SafetyProfile::from(&submission);
                let safety = self.screener.check(&profile, parsed);
                let kept: HashSet<NormalizedName> =
                    safety.cleaned.iter().map(StackItem::normalized_name).collect();
                let removed: Vec<NormalizedName> =
                    before.into_iter().filter(|n| !kept.contains(n)).collect();
                tracing::info!(
                    "safety check for {}: {} kept, {} removed, status {}",
                    submission_id,
                    safety.cleaned.len(),
                    removed.len(),
                    safety.status
                );

                let mut items = safety.cleaned;
                let originals: Vec<NormalizedName> =
                    items.iter().map(StackItem::normalized_name).collect();
                self.evidence.resolve_all(&mut items);

                // Forms that share a canonical name collapse into one item; their own rows go
                // from the narrative along with the screened-out ones.
                let mut stripped = removed;
                stripped.extend(
                    dedupe_by_name(&mut items)
                        .into_iter()
                        .filter_map(|index| originals.get(index).cloned()),
                );
                attach_catalog(&mut items, &self.catalog);
                apply_link_policy(
                    &mut items,
                    BrandBucket::from_preference(submission.brand_preference.as_deref()),
                    submission.account_tier,
                );

                let document = assemble(text, &items, &stripped);
                (document, items, safety.status)
            }
        };

        let record = StackRecord {
            submission_id: submission_id.to_string(),
            generation_id: Uuid::new_v4(),
            model_used: outcome.model_used.clone(),
            usage: outcome.usage,
            safety_status,
            monthly_cost: monthly_cost(&items),
            validated: outcome.validated,
            narrative: document,
        };

        let (stack_id, saved, items_inserted) = match self.repository.save_stack(&record, &items) {
            Ok(receipt) => (Some(receipt.stack_id), true, receipt.items_inserted),
            Err(e) => {
                tracing::error!("failed to save stack for {} error: {:?}", submission_id, e);
                (None, false, 0)
            }
        };

        Ok(GenerationResult {
            submission_id: record.submission_id,
            stack_id,
            generation_id: record.generation_id,
            document: record.narrative,
            items,
            safety_status: record.safety_status,
            validated: record.validated,
            model_used: record.model_used,
            usage: record.usage,
            monthly_cost: record.monthly_cost,
            saved,
            items_inserted,
        })
    }

    /// The persisted stack for a submission, if one has been generated.
    pub fn stack_for(&self, submission_id: &str) -> StackResult<Option<StoredStack>> {
        validate_submission_id(submission_id)?;
        self.repository.load_stack(submission_id)
    }
}
