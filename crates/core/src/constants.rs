//! Constants used throughout the stack core crate.
//!
//! This module holds the output document's heading sequence, the validator's default
//! thresholds and the defaults for runtime configuration, so that the prompt, the validator and
//! the assembler agree on one set of values.

/// Introductory summary heading.
pub const HEADING_SUMMARY: &str = "## Summary";
pub const HEADING_GOALS: &str = "## Your Goals";
pub const HEADING_CONTRAINDICATIONS: &str = "## Contraindications & Interactions";
/// Heading of the table describing what the person already takes.
pub const HEADING_CURRENT_STACK: &str = "## Current Stack";
/// Heading of the recommendation table the parser reads items from.
pub const HEADING_RECOMMENDATIONS: &str = "## Your Blueprint Recommendations";
pub const HEADING_DOSING: &str = "## Dosing & Notes";
pub const HEADING_EVIDENCE: &str = "## Evidence & References";
pub const HEADING_SHOPPING: &str = "## Shopping Links";
pub const HEADING_FOLLOW_UP: &str = "## Follow-up Plan";
pub const HEADING_LIFESTYLE: &str = "## Lifestyle Notes";
pub const HEADING_LONGEVITY: &str = "## Longevity Notes";
pub const HEADING_THIS_WEEK: &str = "## This Week Try";

/// Terminal marker closing every stored document.
pub const TERMINAL_MARKER: &str = "## END";

/// The complete ordered heading sequence, terminal marker last.
pub const REQUIRED_HEADINGS: &[&str] = &[
    HEADING_SUMMARY,
    HEADING_GOALS,
    HEADING_CONTRAINDICATIONS,
    HEADING_CURRENT_STACK,
    HEADING_RECOMMENDATIONS,
    HEADING_DOSING,
    HEADING_EVIDENCE,
    HEADING_SHOPPING,
    HEADING_FOLLOW_UP,
    HEADING_LIFESTYLE,
    HEADING_LONGEVITY,
    HEADING_THIS_WEEK,
    TERMINAL_MARKER,
];

/// Sections whose prose must reach the per-section sentence minimum.
pub const NARRATIVE_SECTIONS: &[&str] = &[
    HEADING_GOALS,
    HEADING_CONTRAINDICATIONS,
    HEADING_FOLLOW_UP,
    HEADING_LIFESTYLE,
    HEADING_LONGEVITY,
];

pub const DEFAULT_MIN_WORDS: usize = 1800;
pub const DEFAULT_MIN_TABLE_ROWS: usize = 10;
pub const DEFAULT_MIN_CITATIONS: usize = 8;
pub const DEFAULT_MIN_SECTION_SENTENCES: usize = 3;
pub const DEFAULT_MIN_SUMMARY_SENTENCES: usize = 2;

/// The Evidence section is padded to at least this many bullets.
pub const MIN_EVIDENCE_BULLETS: usize = 8;

/// Citations kept per item after resolution.
pub const MAX_CITATIONS_PER_ITEM: usize = 3;

/// Parsed names longer than this are treated as parser noise.
pub const MAX_ITEM_NAME_CHARS: usize = 40;

/// Stable landing page used by "Evidence pending" bullets.
pub const EVIDENCE_FALLBACK_URL: &str = "https://ods.od.nih.gov/factsheets/list-all/";

/// Default SQLite database path when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "stack_data/stacks.db";

pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.openai.com/v1";

/// Default escalation order: a fast model first, then a stronger one.
pub const DEFAULT_GENERATION_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 90;

/// Completion budget per attempt. A passing document is well over 1800 words.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 6_000;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
