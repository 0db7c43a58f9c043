//! # API Shared
//!
//! Shared request/response types and utilities for the stack APIs.
//!
//! Contains:
//! - REST wire types with OpenAPI schemas
//! - Shared services like `HealthService`
//! - API-key checking
//!
//! These types deliberately carry plain strings and numbers so clients do not need the core
//! crate's domain types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod auth;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use health::HealthService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One recommended item as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StackItem {
    pub name: String,
    pub dose: Option<String>,
    /// `AM`, `PM`, `AM/PM` or free text.
    pub timing: Option<String>,
    pub rationale: Option<String>,
    pub caution: Option<String>,
    pub citations: Option<Vec<String>>,
    pub cost_estimate: Option<f64>,
    pub primary_marketplace: Option<String>,
    pub specialty_pharmacy: Option<String>,
    pub other: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerateRes {
    pub submission_id: String,
    /// Absent when the stack could not be saved.
    pub stack_id: Option<i64>,
    pub generation_id: String,
    /// `safe`, `warning` or `error`.
    pub safety_status: String,
    pub validated: bool,
    pub model_used: Option<String>,
    pub usage: TokenUsage,
    pub monthly_cost: f64,
    pub saved: bool,
    pub items_inserted: usize,
    pub items: Vec<StackItem>,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StackRes {
    pub stack_id: i64,
    pub submission_id: String,
    pub generation_id: String,
    pub safety_status: String,
    pub validated: bool,
    pub model_used: Option<String>,
    pub usage: TokenUsage,
    pub monthly_cost: f64,
    /// RFC 3339.
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<StackItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DocumentRes {
    pub submission_id: String,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidateReq {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidateRes {
    pub passed: bool,
    pub word_count: usize,
    pub table_rows: usize,
    pub citation_count: usize,
    pub missing_headings: Vec<String>,
    pub thin_sections: Vec<String>,
    pub failures: Vec<String>,
}
