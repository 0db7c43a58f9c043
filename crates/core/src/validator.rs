//! Structural validation of generated documents.
//!
//! A pure predicate over the raw text. Each check is reported separately so the orchestrator
//! can log why an attempt was rejected; `passed` is the conjunction of all checks.

use crate::constants::{
    DEFAULT_MIN_CITATIONS, DEFAULT_MIN_SECTION_SENTENCES, DEFAULT_MIN_SUMMARY_SENTENCES,
    DEFAULT_MIN_TABLE_ROWS, DEFAULT_MIN_WORDS, HEADING_EVIDENCE, HEADING_RECOMMENDATIONS,
    HEADING_SUMMARY, NARRATIVE_SECTIONS, REQUIRED_HEADINGS,
};
use crate::evidence::{is_article_link, is_trusted_citation_url};
use crate::markdown;
use serde::{Deserialize, Serialize};

/// Validator thresholds. Resolved per deployment at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub min_words: usize,
    pub min_table_rows: usize,
    pub min_citations: usize,
    pub min_section_sentences: usize,
    pub min_summary_sentences: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            min_table_rows: DEFAULT_MIN_TABLE_ROWS,
            min_citations: DEFAULT_MIN_CITATIONS,
            min_section_sentences: DEFAULT_MIN_SECTION_SENTENCES,
            min_summary_sentences: DEFAULT_MIN_SUMMARY_SENTENCES,
        }
    }
}

/// Per-check outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub word_count: usize,
    pub word_count_ok: bool,
    pub missing_headings: Vec<String>,
    pub headings_ok: bool,
    pub table_rows: usize,
    pub table_rows_ok: bool,
    pub citation_count: usize,
    pub citations_ok: bool,
    pub thin_sections: Vec<String>,
    pub narrative_ok: bool,
    pub passed: bool,
}

impl ValidationReport {
    /// Short human-readable list of the failed checks, for log lines.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if !self.word_count_ok {
            failures.push(format!("word count {}", self.word_count));
        }
        if !self.headings_ok {
            failures.push(format!("missing headings: {}", self.missing_headings.join(", ")));
        }
        if !self.table_rows_ok {
            failures.push(format!("table rows {}", self.table_rows));
        }
        if !self.citations_ok {
            failures.push(format!("citations {}", self.citation_count));
        }
        if !self.narrative_ok {
            failures.push(format!("thin sections: {}", self.thin_sections.join(", ")));
        }
        failures
    }
}

fn has_heading(text: &str, heading: &str) -> bool {
    text.lines().any(|l| markdown::is_heading_line(l, heading))
}

fn is_citation_bullet(bullet: &str) -> bool {
    markdown::extract_urls(bullet)
        .iter()
        .any(|u| is_trusted_citation_url(u) || is_article_link(u))
}

/// Count the Evidence section bullets that carry a qualifying URL.
pub fn count_citation_bullets(text: &str) -> usize {
    markdown::section_body(text, HEADING_EVIDENCE)
        .map(|body| {
            markdown::bullets(body)
                .into_iter()
                .filter(|b| is_citation_bullet(b))
                .count()
        })
        .unwrap_or(0)
}

/// Count the data rows of the recommendation table.
pub fn count_recommendation_rows(text: &str) -> usize {
    markdown::section_body(text, HEADING_RECOMMENDATIONS)
        .map(|body| markdown::parse_table(body).rows.len())
        .unwrap_or(0)
}

fn section_sentences(text: &str, heading: &str) -> usize {
    markdown::section_body(text, heading)
        .map(|body| markdown::count_sentences(&markdown::prose(body)))
        .unwrap_or(0)
}

/// Run every structural check against `text`.
pub fn validate(text: &str, policy: &ValidationPolicy) -> ValidationReport {
    let word_count = markdown::word_count(text);

    let missing_headings: Vec<String> = REQUIRED_HEADINGS
        .iter()
        .filter(|h| !has_heading(text, h))
        .map(|h| h.to_string())
        .collect();

    let table_rows = count_recommendation_rows(text);
    let citation_count = count_citation_bullets(text);

    let mut thin_sections = Vec::new();
    if section_sentences(text, HEADING_SUMMARY) < policy.min_summary_sentences {
        thin_sections.push(HEADING_SUMMARY.to_string());
    }
    for heading in NARRATIVE_SECTIONS {
        if section_sentences(text, heading) < policy.min_section_sentences {
            thin_sections.push(heading.to_string());
        }
    }

    let word_count_ok = word_count >= policy.min_words;
    let headings_ok = missing_headings.is_empty();
    let table_rows_ok = table_rows >= policy.min_table_rows;
    let citations_ok = citation_count >= policy.min_citations;
    let narrative_ok = thin_sections.is_empty();

    ValidationReport {
        word_count,
        word_count_ok,
        missing_headings,
        headings_ok,
        table_rows,
        table_rows_ok,
        citation_count,
        citations_ok,
        thin_sections,
        narrative_ok,
        passed: word_count_ok && headings_ok && table_rows_ok && citations_ok && narrative_ok,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::constants::*;

    const PROSE: &str = "This section explains the reasoning in plain language for you. \
        Each recommendation was matched against your goals and history. \
        Please review the notes with your clinician before starting anything new. \
        Small consistent habits matter more than any single product. ";

    /// A document that passes every check under the default policy.
    pub(crate) fn passing_document() -> String {
        let mut doc = String::new();
        let filler = PROSE.repeat(4);

        doc.push_str(&format!("{HEADING_SUMMARY}\n{filler}\n\n"));
        doc.push_str(&format!("{HEADING_GOALS}\n{filler}\n\n"));
        doc.push_str(&format!("{HEADING_CONTRAINDICATIONS}\n{filler}\n\n"));
        doc.push_str(&format!(
            "{HEADING_CURRENT_STACK}\n| Supplement | Why | Dose | Timing |\n|---|---|---|---|\n| Vitamin C | immunity | 500 mg | AM |\n\n"
        ));

        let names = [
            "Magnesium Glycinate",
            "Omega-3 (Fish Oil)",
            "Vitamin D3",
            "Creatine",
            "Ashwagandha",
            "L-Theanine",
            "CoQ10",
            "Zinc",
            "Probiotics",
            "Vitamin B12",
        ];
        doc.push_str(&format!(
            "{HEADING_RECOMMENDATIONS}\n| Supplement | Why It Helps | Est. Monthly Cost |\n|---|---|---|\n"
        ));
        for name in names {
            doc.push_str(&format!("| **{name}** | supports your goals | $12 |\n"));
        }
        doc.push('\n');

        doc.push_str(&format!("{HEADING_DOSING}\n"));
        doc.push_str("- Magnesium Glycinate — 400 mg, PM\n- Vitamin D3 — 2,000 IU, AM\n- Creatine — 5 g, AM\n\n");

        doc.push_str(&format!("{HEADING_EVIDENCE}\n"));
        for i in 0..8 {
            doc.push_str(&format!(
                "- Study {i}: https://pubmed.ncbi.nlm.nih.gov/{}/\n",
                1000 + i
            ));
        }
        doc.push('\n');

        doc.push_str(&format!("{HEADING_SHOPPING}\n- Magnesium: https://www.amazon.com/s?k=magnesium\n\n"));
        doc.push_str(&format!("{HEADING_FOLLOW_UP}\n{filler}\n\n"));
        doc.push_str(&format!("{HEADING_LIFESTYLE}\n{filler}\n\n"));
        doc.push_str(&format!("{HEADING_LONGEVITY}\n{filler}\n\n"));
        doc.push_str(&format!("{HEADING_THIS_WEEK}\n{}\n\n", PROSE.repeat(30)));
        doc.push_str(TERMINAL_MARKER);
        doc.push('\n');
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HEADING_LIFESTYLE, TERMINAL_MARKER};

    #[test]
    fn test_passing_document_passes() {
        let report = validate(&fixtures::passing_document(), &ValidationPolicy::default());
        assert!(report.passed, "failures: {:?}", report.failures());
        assert_eq!(report.table_rows, 10);
        assert_eq!(report.citation_count, 8);
    }

    #[test]
    fn test_missing_heading_and_terminal_marker_fail() {
        let doc = fixtures::passing_document()
            .replace(HEADING_LIFESTYLE, "## Habits")
            .replace(TERMINAL_MARKER, "");
        let report = validate(&doc, &ValidationPolicy::default());
        assert!(!report.passed);
        assert!(!report.headings_ok);
        assert!(report.missing_headings.contains(&HEADING_LIFESTYLE.to_string()));
        assert!(report.missing_headings.contains(&TERMINAL_MARKER.to_string()));
        assert!(report.thin_sections.contains(&HEADING_LIFESTYLE.to_string()));
    }

    #[test]
    fn test_short_document_fails_word_count_only() {
        let policy = ValidationPolicy {
            min_words: 100_000,
            ..ValidationPolicy::default()
        };
        let report = validate(&fixtures::passing_document(), &policy);
        assert!(!report.passed);
        assert!(!report.word_count_ok);
        assert!(report.headings_ok && report.table_rows_ok && report.citations_ok);
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn test_untrusted_evidence_links_do_not_count() {
        let doc = fixtures::passing_document()
            .replace("https://pubmed.ncbi.nlm.nih.gov/", "https://blog.example.com/post/");
        let report = validate(&doc, &ValidationPolicy::default());
        assert_eq!(report.citation_count, 0);
        assert!(!report.citations_ok);
    }

    #[test]
    fn test_article_links_count_as_citations() {
        let doc = fixtures::passing_document().replace(
            "https://pubmed.ncbi.nlm.nih.gov/",
            "https://journal.example.org/article/",
        );
        assert_eq!(count_citation_bullets(&doc), 8);
    }

    #[test]
    fn test_thin_summary_is_reported() {
        let text = "## Summary\nOnly one sentence here.\n\n## END\n";
        let report = validate(text, &ValidationPolicy::default());
        assert!(report.thin_sections.contains(&"## Summary".to_string()));
        assert!(!report.narrative_ok);
    }

    #[test]
    fn test_empty_text_fails_every_check() {
        let report = validate("", &ValidationPolicy::default());
        assert!(!report.passed);
        assert_eq!(report.word_count, 0);
        assert_eq!(report.missing_headings.len(), REQUIRED_HEADINGS.len());
        assert_eq!(report.failures().len(), 5);
    }
}
