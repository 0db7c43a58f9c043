//! Bounded generate-and-validate loop.

use crate::backend::{GenerativeBackend, TokenUsage};
use crate::config::ModelConfig;
use crate::prompt::Prompt;
use crate::validator::{validate, ValidationPolicy, ValidationReport};
use crate::StackResult;
use std::sync::Arc;

/// Final state of the generation loop. Never an error once the backend is configured.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    /// Text of the most recent attempt that produced any.
    pub text: Option<String>,
    pub model_used: Option<String>,
    pub usage: TokenUsage,
    pub validated: bool,
    pub report: Option<ValidationReport>,
    pub attempts: usize,
}

pub struct PromptOrchestrator {
    backend: Arc<dyn GenerativeBackend>,
    models: Vec<ModelConfig>,
    policy: ValidationPolicy,
}

impl PromptOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        models: Vec<ModelConfig>,
        policy: ValidationPolicy,
    ) -> Self {
        Self {
            backend,
            models,
            policy,
        }
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    /// Try each model in order until one produces a document that passes validation.
    ///
    /// Returns `Err` only when the backend is not configured.
    pub async fn run(&self, prompt: &Prompt) -> StackResult<GenerationOutcome> {
        self.backend.ensure_configured()?;

        let mut outcome = GenerationOutcome::default();
        for model in &self.models {
            outcome.attempts += 1;
            let completion = match self.backend.generate(prompt, model).await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!("generation with {} failed: {}", model.name, e);
                    continue;
                }
            };
            outcome.usage.add(completion.usage);

            let report = validate(&completion.text, &self.policy);
            outcome.text = Some(completion.text);
            outcome.model_used = Some(model.name.clone());
            outcome.validated = report.passed;

            if report.passed {
                tracing::info!(
                    "generation with {} passed validation ({} words)",
                    model.name,
                    report.word_count
                );
                outcome.report = Some(report);
                break;
            }
            tracing::warn!(
                "generation with {} failed validation: {}",
                model.name,
                report.failures().join("; ")
            );
            outcome.report = Some(report);
        }

        Ok(outcome)
    }
}
