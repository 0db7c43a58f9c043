//! Report assembly.
//!
//! The assembler turns the generated narrative into the stored document:
//! - the Evidence and Shopping sections are rebuilt from resolved item data;
//! - rows and bullets for screened-out items are removed;
//! - the terminal marker is appended when missing.
//!
//! Assembling an already assembled document with the same items yields the same document.

use crate::constants::{
    EVIDENCE_FALLBACK_URL, HEADING_CONTRAINDICATIONS, HEADING_CURRENT_STACK, HEADING_DOSING,
    HEADING_EVIDENCE, HEADING_FOLLOW_UP, HEADING_GOALS, HEADING_LIFESTYLE, HEADING_LONGEVITY,
    HEADING_RECOMMENDATIONS, HEADING_SHOPPING, HEADING_SUMMARY, HEADING_THIS_WEEK,
    MIN_EVIDENCE_BULLETS, TERMINAL_MARKER,
};
use crate::item::{monthly_cost, StackItem};
use crate::markdown;
use stack_types::NormalizedName;
use std::collections::HashSet;

/// Append the terminal marker unless a terminal marker line is already present.
pub fn ensure_terminal_marker(text: &str) -> String {
    if text
        .lines()
        .any(|l| markdown::is_heading_line(l, TERMINAL_MARKER))
    {
        return text.to_string();
    }
    let body = text.trim_end();
    if body.is_empty() {
        format!("{TERMINAL_MARKER}\n")
    } else {
        format!("{body}\n\n{TERMINAL_MARKER}\n")
    }
}

/// The Evidence section for `items`, padded to the minimum bullet count.
pub fn render_evidence_section(items: &[StackItem]) -> String {
    let mut section = format!("{HEADING_EVIDENCE}\n\n");
    if items.is_empty() {
        section.push_str(
            "No recommendations were generated for this report, so there is no item-specific \
             evidence yet. The general references below describe how supplement evidence is \
             reviewed.\n\n",
        );
    }

    let mut bullets = Vec::new();
    for item in items {
        for url in item.citations.iter().flatten() {
            bullets.push(format!("- **{}**: {}", item.name, url));
        }
    }
    while bullets.len() < MIN_EVIDENCE_BULLETS {
        bullets.push(format!("- Evidence pending: {EVIDENCE_FALLBACK_URL}"));
    }

    section.push_str(&bullets.join("\n"));
    section.push_str("\n\n");
    section
}

/// The Shopping section for `items`, from their chosen links.
pub fn render_shopping_section(items: &[StackItem]) -> String {
    let mut section = format!("{HEADING_SHOPPING}\n\n");
    if items.is_empty() {
        section.push_str(
            "No recommendations were generated for this report. Complete or update your intake \
             form to receive personalised shopping links.\n\n",
        );
        return section;
    }

    for item in items {
        let links = &item.chosen_links;
        let mut parts = Vec::new();
        if let Some(url) = &links.primary_marketplace {
            parts.push(format!("[Marketplace]({url})"));
        }
        if let Some(url) = &links.specialty_pharmacy {
            parts.push(format!("[Specialty pharmacy]({url})"));
        }
        if let Some(url) = &links.other {
            parts.push(format!("[More options]({url})"));
        }
        let cost = item
            .cost_estimate
            .map(|c| format!(" (about ${c:.2}/month)"))
            .unwrap_or_default();

        if parts.is_empty() {
            section.push_str(&format!(
                "- **{}**{cost}: no link available yet, search your preferred retailer\n",
                item.name
            ));
        } else {
            section.push_str(&format!("- **{}**{cost}: {}\n", item.name, parts.join(" · ")));
        }
    }

    let total = monthly_cost(items);
    if total > 0.0 {
        section.push_str(&format!("\nEstimated monthly total: ${total:.2}\n"));
    }
    section.push('\n');
    section
}

/// Replace the section headed by `heading` with `replacement`, or insert `replacement` before
/// the terminal marker (appending at the end when there is none).
pub fn replace_section(text: &str, heading: &str, replacement: &str) -> String {
    if let Some((start, end)) = markdown::section_span(text, heading) {
        return format!("{}{}{}", &text[..start], replacement, &text[end..]);
    }

    if let Some((start, _)) = markdown::section_span(text, TERMINAL_MARKER) {
        return format!("{}{}{}", &text[..start], replacement, &text[start..]);
    }

    let body = text.trim_end();
    if body.is_empty() {
        replacement.to_string()
    } else {
        format!("{body}\n\n{replacement}")
    }
}

fn line_names_removed(line: &str, removed: &HashSet<NormalizedName>) -> bool {
    if let Some(content) = markdown::bullet_content(line) {
        let name = content
            .split(['—', '–'])
            .next()
            .unwrap_or(content)
            .split(" - ")
            .next()
            .unwrap_or(content);
        return removed.contains(&NormalizedName::from_raw(&markdown::clean_inline(name)));
    }
    if line.trim_start().starts_with('|') {
        let first_cell = line.trim().trim_start_matches('|').split('|').next().unwrap_or("");
        return removed.contains(&NormalizedName::from_raw(&markdown::clean_inline(first_cell)));
    }
    false
}

/// Remove table rows and bullets naming a removed item from the named section.
fn strip_removed_in(text: &str, heading: &str, removed: &HashSet<NormalizedName>) -> String {
    let Some((start, end)) = markdown::section_span(text, heading) else {
        return text.to_string();
    };
    let kept: String = text[start..end]
        .split_inclusive('\n')
        .filter(|line| !line_names_removed(line, removed))
        .collect();
    format!("{}{}{}", &text[..start], kept, &text[end..])
}

/// Remove screened-out items from the recommendation table and the dosing notes.
pub fn strip_removed(text: &str, removed: &[NormalizedName]) -> String {
    let removed: HashSet<NormalizedName> =
        removed.iter().filter(|n| !n.is_empty()).cloned().collect();
    if removed.is_empty() {
        return text.to_string();
    }
    let mut out = text.to_string();
    for heading in [HEADING_RECOMMENDATIONS, HEADING_DOSING] {
        out = strip_removed_in(&out, heading, &removed);
    }
    out
}

/// Build the stored document from the narrative and the final item set.
pub fn assemble(narrative: &str, items: &[StackItem], removed: &[NormalizedName]) -> String {
    let text = strip_removed(narrative, removed);
    let text = replace_section(&text, HEADING_EVIDENCE, &render_evidence_section(items));
    let text = replace_section(&text, HEADING_SHOPPING, &render_shopping_section(items));
    ensure_terminal_marker(&text)
}

/// Skeleton narrative used when no generation attempt produced text.
pub fn fallback_document() -> String {
    let sections: [(&str, &str); 12] = [
        (
            HEADING_SUMMARY,
            "We could not generate your personalised report right now. Your intake has been \
             saved and you can request a new report at any time.",
        ),
        (
            HEADING_GOALS,
            "Your goals from the intake form will be addressed once the report is generated.",
        ),
        (
            HEADING_CONTRAINDICATIONS,
            "Please review any new supplement with your clinician, especially alongside \
             prescription medication.",
        ),
        (HEADING_CURRENT_STACK, "Your current supplements are listed in your intake form."),
        (
            HEADING_RECOMMENDATIONS,
            "No recommendations are available yet.",
        ),
        (HEADING_DOSING, "Dosing guidance will appear here once recommendations exist."),
        (HEADING_EVIDENCE, "Evidence is listed once recommendations exist."),
        (HEADING_SHOPPING, "Shopping links are listed once recommendations exist."),
        (
            HEADING_FOLLOW_UP,
            "Request a new report to receive a follow-up plan.",
        ),
        (
            HEADING_LIFESTYLE,
            "Sleep, movement, and nutrition remain the foundation of any plan.",
        ),
        (HEADING_LONGEVITY, "Longevity notes will appear in your full report."),
        (HEADING_THIS_WEEK, "Try one small habit this week, such as a regular bedtime."),
    ];

    let mut doc: String = sections
        .iter()
        .map(|(heading, body)| format!("{heading}\n\n{body}\n\n"))
        .collect();
    doc.push_str(TERMINAL_MARKER);
    doc.push('\n');
    doc
}
