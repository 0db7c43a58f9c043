//! Markdown-to-items parser.
//!
//! Three independent extraction passes feed one merge pass:
//! - the recommendation table gives one candidate per row (name, rationale, cost, row URLs);
//! - the current-stack table adds rows not already recommended, with dose and timing;
//! - the dosing-notes bullets (`name — dose[, timing]`) back-fill dose and timing or create new
//!   candidates;
//! - the merge drops parser noise and duplicate normalized names, keeping first occurrences.

use crate::constants::{HEADING_CURRENT_STACK, HEADING_DOSING, HEADING_RECOMMENDATIONS, MAX_ITEM_NAME_CHARS};
use crate::item::{ParsedDose, StackItem};
use crate::markdown::{self, Table};
use regex::Regex;
use stack_types::{DoseUnit, NormalizedName, Timing};
use std::collections::HashMap;
use std::sync::LazyLock;

static DOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mg|mcg|µg|ug|g|iu)\b").expect("valid dose regex")
});

static DOSING_NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)\s*(?:—|–|\s-{1,2}\s)\s*(?P<rest>.+)$").expect("valid dosing note regex")
});

static PUNCT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:punct:]]{3,}").expect("valid punctuation regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"));

/// Normalized names that are headings or table header words rather than supplements.
const NOISE_NAMES: &[&str] = &[
    "analysis",
    "summary",
    "supplement",
    "supplements",
    "name",
    "item",
    "product",
    "total",
    "notes",
    "note",
    "dose",
    "dosage",
    "timing",
    "recommendation",
    "recommendations",
    "current stack",
    "none",
    "na",
    "tbd",
];

/// Rows extracted by one pass, before filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub rationale: Option<String>,
    pub dose: Option<String>,
    pub timing: Option<Timing>,
    pub cost: Option<f64>,
    pub urls: Vec<String>,
}

impl Candidate {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn into_item(self) -> StackItem {
        let mut item = StackItem::new(self.name);
        item.dose_parsed = self.dose.as_deref().and_then(parse_dose);
        item.dose = self.dose;
        item.timing = self.timing;
        item.rationale = self.rationale;
        item.cost_estimate = self.cost;
        item.citations = (!self.urls.is_empty()).then_some(self.urls);
        item
    }
}

/// Reduce a dose string to amount and unit using the last numeric-plus-unit token.
///
/// Thousands separators are removed and grams are converted to milligrams:
/// `"500 mg"` is 500 mg, `"0.5 g"` is 500 mg, `"50mcg"` is 50 mcg, `"2,000 IU"` is 2000 IU.
pub fn parse_dose(raw: &str) -> Option<ParsedDose> {
    let cleaned = raw.replace(',', "");
    let captures = DOSE_RE.captures_iter(&cleaned).last()?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str().to_lowercase();

    if unit == "g" {
        return Some(ParsedDose {
            amount: (amount * 1000.0 * 1e6).round() / 1e6,
            unit: DoseUnit::Mg,
        });
    }
    let unit: DoseUnit = unit.parse().ok()?;
    Some(ParsedDose { amount, unit })
}

/// First number in a cost cell: `"$12/mo"` is 12.0, `"~$10-15"` is 10.0.
pub fn parse_cost(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|c| c.is_finite() && *c >= 0.0)
}

/// Strip markup from a name cell and any trailing parenthetical-free punctuation.
pub fn clean_name(raw: &str) -> String {
    markdown::clean_inline(raw)
        .trim_matches(|c: char| matches!(c, ':' | '-' | '–' | '—' | '.' | ','))
        .trim()
        .to_string()
}

/// True for names the merge pass must drop.
pub fn is_noise_name(name: &str) -> bool {
    if name.trim().is_empty() || name.chars().count() > MAX_ITEM_NAME_CHARS {
        return true;
    }
    if PUNCT_RUN_RE.is_match(name) {
        return true;
    }
    let normalized = NormalizedName::from_raw(name);
    normalized.is_empty()
        || NOISE_NAMES.contains(&normalized.as_str())
        || normalized.as_str().ends_with("analysis")
}

fn cell(row: &[String], index: Option<usize>) -> Option<String> {
    let value = markdown::clean_inline(row.get(index?)?);
    (!value.is_empty() && value != "-" && value != "—").then_some(value)
}

fn table_in(text: &str, heading: &str) -> Table {
    markdown::section_body(text, heading)
        .map(markdown::parse_table)
        .unwrap_or_default()
}

/// Pass (a): one candidate per recommendation-table row.
pub fn extract_recommendations(text: &str) -> Vec<Candidate> {
    let table = table_in(text, HEADING_RECOMMENDATIONS);
    let rationale_col = table
        .column(&["why", "rationale", "reason", "benefit"])
        .or(Some(1));
    let cost_col = table.column(&["cost", "price", "$"]);
    let dose_col = table.column(&["dose", "dosage", "amount"]);
    let timing_col = table.column(&["timing", "when"]);

    table
        .rows
        .iter()
        .filter_map(|row| {
            let name = clean_name(row.first()?);
            let mut candidate = Candidate::named(name);
            candidate.rationale = cell(row, rationale_col.filter(|c| Some(*c) != cost_col));
            candidate.cost = cost_col.and_then(|c| row.get(c)).and_then(|v| parse_cost(v));
            candidate.dose = cell(row, dose_col);
            candidate.timing = cell(row, timing_col).and_then(|t| Timing::parse(&t));
            candidate.urls = row.iter().flat_map(|c| markdown::extract_urls(c)).collect();
            Some(candidate)
        })
        .collect()
}

/// Pass (b): rows of the current-stack table.
pub fn extract_current_stack(text: &str) -> Vec<Candidate> {
    let table = table_in(text, HEADING_CURRENT_STACK);
    let rationale_col = table.column(&["why", "rationale", "reason", "purpose"]).or(Some(1));
    let dose_col = table.column(&["dose", "dosage", "amount"]).or(Some(2));
    let timing_col = table.column(&["timing", "when"]).or(Some(3));

    table
        .rows
        .iter()
        .filter_map(|row| {
            let mut candidate = Candidate::named(clean_name(row.first()?));
            candidate.rationale = cell(row, rationale_col);
            candidate.dose = cell(row, dose_col);
            candidate.timing = cell(row, timing_col).and_then(|t| Timing::parse(&t));
            Some(candidate)
        })
        .collect()
}

/// Pass (c): `name — dose[, timing]` bullets from the dosing notes.
pub fn extract_dosing_notes(text: &str) -> Vec<Candidate> {
    let Some(body) = markdown::section_body(text, HEADING_DOSING) else {
        return Vec::new();
    };

    markdown::bullets(body)
        .into_iter()
        .filter_map(|bullet| {
            let captures = DOSING_NOTE_RE.captures(bullet)?;
            let name = clean_name(captures.name("name")?.as_str());
            let rest = markdown::clean_inline(captures.name("rest")?.as_str());

            let (dose, timing) = match rest.split_once(", ") {
                Some((dose, timing)) => (dose.trim().to_string(), Timing::parse(timing)),
                None => (rest.trim().to_string(), None),
            };
            let mut candidate = Candidate::named(name);
            candidate.dose = (!dose.is_empty()).then_some(dose);
            candidate.timing = timing;
            Some(candidate)
        })
        .collect()
}

/// Merge pass: combine the three passes, back-fill, filter noise and de-duplicate.
pub fn merge_candidates(
    recommendations: Vec<Candidate>,
    current: Vec<Candidate>,
    dosing: Vec<Candidate>,
) -> Vec<StackItem> {
    let mut merged: Vec<Candidate> = Vec::new();
    let mut positions: HashMap<NormalizedName, usize> = HashMap::new();

    for candidate in recommendations.into_iter().chain(current) {
        let key = NormalizedName::from_raw(&candidate.name);
        if positions.contains_key(&key) {
            continue;
        }
        positions.insert(key, merged.len());
        merged.push(candidate);
    }

    for note in dosing {
        let key = NormalizedName::from_raw(&note.name);
        match positions.get(&key) {
            Some(&index) => {
                let existing = &mut merged[index];
                if existing.dose.is_none() {
                    existing.dose = note.dose;
                }
                if existing.timing.is_none() {
                    existing.timing = note.timing;
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(note);
            }
        }
    }

    let before = merged.len();
    let items: Vec<StackItem> = merged
        .into_iter()
        .filter(|c| {
            let noise = is_noise_name(&c.name);
            if noise {
                tracing::debug!("dropping parser noise row '{}'", c.name);
            }
            !noise
        })
        .map(Candidate::into_item)
        .collect();

    tracing::info!("parsed {} items ({} rows dropped)", items.len(), before - items.len());
    items
}

/// Parse every item out of a generated document.
pub fn parse_items(text: &str) -> Vec<StackItem> {
    merge_candidates(
        extract_recommendations(text),
        extract_current_stack(text),
        extract_dosing_notes(text),
    )
}
