//! # Stack Core
//!
//! The stack generation and validation pipeline.
//!
//! This crate turns a stored intake submission into a persisted supplement stack:
//! - prompt construction and a bounded generate-and-validate loop over an async backend
//! - structural validation of the generated markdown
//! - parsing of the recommendation table, current stack and dosing notes into items
//! - safety screening, evidence resolution and purchase-link selection
//! - report assembly and transactional SQLite persistence
//!
//! **No API concerns**: HTTP servers, request types and authentication belong in `api-rest`
//! and `api-shared`.

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod evidence;
pub mod item;
pub mod links;
pub mod markdown;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod repositories;
pub mod safety;
pub mod submission;
pub mod validation;
pub mod validator;

pub use backend::{ChatCompletionsBackend, GenerativeBackend, TokenUsage};
pub use config::{CoreConfig, GenerationConfig, ModelConfig};
pub use error::{StackError, StackResult};
pub use item::StackItem;
pub use pipeline::{GenerationResult, StackService};
pub use repositories::sqlite::SqliteStore;
pub use repositories::{StackRepository, StoredStack};
pub use submission::{IntakeLoader, Submission};
pub use validator::{validate, ValidationPolicy, ValidationReport};
