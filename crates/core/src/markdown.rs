//! Markdown section, table and bullet utilities for generated stack documents.
//!
//! Generated documents are level-2 headed markdown. Everything downstream of generation (the
//! validator, the parser and the assembler) works on sections located by their exact heading
//! line, so the helpers here agree on what a heading line is and where a section ends.

use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>()\[\]"'|`]+"#).expect("valid URL regex"));

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid markdown link regex"));

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("valid sentence regex"));

/// True when `line` is the heading `heading`, optionally followed by a space or colon and more
/// text (`## Summary: for Sam` still counts as `## Summary`).
pub fn is_heading_line(line: &str, heading: &str) -> bool {
    let trimmed = line.trim();
    match trimmed.strip_prefix(heading) {
        Some("") => true,
        Some(rest) => rest.starts_with(' ') || rest.starts_with(':'),
        None => false,
    }
}

/// True for a level-1 or level-2 heading line. Deeper headings stay inside their section.
pub fn is_section_boundary(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("# ") || trimmed.starts_with("## ")
}

/// Byte span `[start, end)` of the section headed by `heading`, including the heading line.
///
/// The section runs to the next level-1/2 heading (the terminal marker included) or the end of
/// the text.
pub fn section_span(text: &str, heading: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    let mut start = None;

    for line in text.split_inclusive('\n') {
        match start {
            None if is_heading_line(line, heading) => start = Some(offset),
            Some(s) if is_section_boundary(line) => return Some((s, offset)),
            _ => {}
        }
        offset += line.len();
    }

    start.map(|s| (s, text.len()))
}

/// Body of the section headed by `heading`, heading line excluded.
pub fn section_body<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let (start, end) = section_span(text, heading)?;
    let section = &text[start..end];
    let body_start = section.find('\n').map(|i| i + 1).unwrap_or(section.len());
    Some(&section[body_start..])
}

/// A pipe table found in a section body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of the first header cell containing any of `keywords` (case-insensitive).
    pub fn column(&self, keywords: &[&str]) -> Option<usize> {
        let header = self.header.as_ref()?;
        header.iter().position(|cell| {
            let lowered = cell.to_lowercase();
            keywords.iter().any(|k| lowered.contains(k))
        })
    }
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' '))
        })
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Parse the first pipe table in `body`.
///
/// A row directly followed by a separator row (`|---|---|`) is the header; every other
/// non-separator row is data.
pub fn parse_table(body: &str) -> Table {
    let lines: Vec<&str> = body
        .lines()
        .skip_while(|l| !is_table_line(l))
        .take_while(|l| is_table_line(l))
        .collect();

    let mut table = Table::default();
    let mut index = 0;
    while index < lines.len() {
        let cells = split_row(lines[index]);
        if is_separator_row(&cells) {
            index += 1;
            continue;
        }
        let next_is_separator = lines
            .get(index + 1)
            .map(|l| is_separator_row(&split_row(l)))
            .unwrap_or(false);
        if next_is_separator && table.header.is_none() && table.rows.is_empty() {
            table.header = Some(cells);
        } else {
            table.rows.push(cells);
        }
        index += 1;
    }
    table
}

/// Content of a bullet line (`-`, `*`, `•` or `1.`), or `None` for other lines.
pub fn bullet_content(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = trimmed[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

/// The bullet lines of a section body, markers removed.
pub fn bullets(body: &str) -> Vec<&str> {
    body.lines().filter_map(bullet_content).collect()
}

/// Prose of a section body: lines that are neither table rows, bullets nor sub-headings.
pub fn prose(body: &str) -> String {
    body.lines()
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !is_table_line(t) && bullet_content(t).is_none() && !t.starts_with('#')
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count sentences: fragments ending in `.`, `!` or `?` (or running to the end) that hold at
/// least two words with letters.
pub fn count_sentences(prose: &str) -> usize {
    SENTENCE_END_RE
        .split(prose)
        .filter(|fragment| {
            fragment
                .split_whitespace()
                .filter(|w| w.chars().any(char::is_alphabetic))
                .count()
                >= 2
        })
        .count()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// Every http(s) URL in `text`, trailing sentence punctuation removed, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '*', '_']).to_string())
        .filter(|u| u.len() > "https://".len())
        .collect()
}

/// Strip inline markup from a table cell or bullet fragment: links collapse to their label,
/// emphasis and code markers are removed and whitespace is collapsed.
pub fn clean_inline(text: &str) -> String {
    let without_links = MARKDOWN_LINK_RE.replace_all(text, "$1");
    let without_markers: String = without_links
        .chars()
        .filter(|c| !matches!(c, '*' | '`'))
        .collect();
    without_markers
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches('_')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "## Summary\nFirst line.\n\n## Shopping Links\n- a\n### Sub\n- b\n## END\n";

    #[test]
    fn test_is_heading_line() {
        assert!(is_heading_line("## Summary", "## Summary"));
        assert!(is_heading_line("  ## Summary  ", "## Summary"));
        assert!(is_heading_line("## Summary: for you", "## Summary"));
        assert!(!is_heading_line("## Summaryx", "## Summary"));
        assert!(!is_heading_line("Summary", "## Summary"));
    }

    #[test]
    fn test_section_body_runs_to_next_level_two_heading() {
        let body = section_body(DOC, "## Shopping Links").unwrap();
        assert_eq!(body, "- a\n### Sub\n- b\n");
        assert_eq!(section_body(DOC, "## Summary").unwrap(), "First line.\n\n");
        assert!(section_body(DOC, "## Lifestyle Notes").is_none());
    }

    #[test]
    fn test_section_span_without_following_heading() {
        let text = "intro\n## Summary\nbody";
        let (start, end) = section_span(text, "## Summary").unwrap();
        assert_eq!(&text[start..end], "## Summary\nbody");
    }

    #[test]
    fn test_parse_table_separates_header_and_rows() {
        let body = "Intro text\n\n| Supplement | Why |\n|---|:---:|\n| Zinc | immunity |\n| **Iron** | energy |\n\nAfter";
        let table = parse_table(body);
        assert_eq!(
            table.header,
            Some(vec!["Supplement".to_string(), "Why".to_string()])
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][0], "**Iron**");
        assert_eq!(table.column(&["why"]), Some(1));
        assert_eq!(table.column(&["cost"]), None);
    }

    #[test]
    fn test_parse_table_without_header() {
        let table = parse_table("| Zinc | 15 mg |\n| Iron | 18 mg |\n");
        assert!(table.header.is_none());
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_bullet_content_and_prose() {
        assert_eq!(bullet_content("- Zinc"), Some("Zinc"));
        assert_eq!(bullet_content("  * Zinc "), Some("Zinc"));
        assert_eq!(bullet_content("• Zinc"), Some("Zinc"));
        assert_eq!(bullet_content("12. Zinc"), Some("Zinc"));
        assert_eq!(bullet_content("Zinc"), None);

        let body = "Sentence one. Sentence two!\n- bullet\n| a | b |\nThird one here?";
        let text = prose(body);
        assert!(!text.contains("bullet"));
        assert_eq!(count_sentences(&text), 3);
    }

    #[test]
    fn test_count_sentences_ignores_fragments_and_decimals() {
        assert_eq!(count_sentences("Take 2.5 g daily with food."), 1);
        assert_eq!(count_sentences("Ok. Fine."), 0);
        assert_eq!(count_sentences(""), 0);
    }

    #[test]
    fn test_extract_urls_trims_punctuation() {
        let urls = extract_urls(
            "See https://pubmed.ncbi.nlm.nih.gov/123/. Also [x](https://doi.org/10.1/abc), done",
        );
        assert_eq!(
            urls,
            vec![
                "https://pubmed.ncbi.nlm.nih.gov/123/".to_string(),
                "https://doi.org/10.1/abc".to_string()
            ]
        );
    }

    #[test]
    fn test_clean_inline() {
        assert_eq!(clean_inline("**Magnesium**  Glycinate"), "Magnesium Glycinate");
        assert_eq!(clean_inline("[Zinc](https://x.org)"), "Zinc");
        assert_eq!(clean_inline("_`CoQ10`_"), "CoQ10");
    }

    #[test]
    fn test_word_count_skips_pure_punctuation() {
        assert_eq!(word_count("one two - three |"), 3);
    }
}
