//! Persistence of submissions and generated stacks.
//!
//! The pipeline only sees the [`StackRepository`] and [`crate::submission::IntakeLoader`]
//! traits; [`sqlite::SqliteStore`] implements both.

pub mod sqlite;

use crate::backend::TokenUsage;
use crate::item::StackItem;
use crate::StackResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stack_types::SafetyStatus;
use uuid::Uuid;

/// Parent row of a generated stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackRecord {
    pub submission_id: String,
    pub generation_id: Uuid,
    pub model_used: Option<String>,
    pub usage: TokenUsage,
    pub safety_status: SafetyStatus,
    pub monthly_cost: f64,
    pub validated: bool,
    pub narrative: String,
}

/// What a successful write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub stack_id: i64,
    pub items_inserted: usize,
}

/// A stack as read back from storage.
#[derive(Debug, Clone, Serialize)]
pub struct StoredStack {
    pub stack_id: i64,
    pub record: StackRecord,
    pub items: Vec<StackItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait StackRepository: Send + Sync {
    /// Upsert the parent row and replace its child rows atomically.
    ///
    /// Items whose normalized name is empty are skipped.
    fn save_stack(&self, record: &StackRecord, items: &[StackItem]) -> StackResult<SaveReceipt>;

    fn load_stack(&self, submission_id: &str) -> StackResult<Option<StoredStack>>;
}
