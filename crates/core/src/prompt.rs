//! Prompt construction for the generative backend.

use crate::constants::{HEADING_EVIDENCE, HEADING_RECOMMENDATIONS, REQUIRED_HEADINGS, TERMINAL_MARKER};
use crate::submission::Submission;
use crate::validator::ValidationPolicy;
use chrono::NaiveDate;

/// A system/user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn list_or_none(values: &[String]) -> String {
    let cleaned: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if cleaned.is_empty() {
        "none reported".to_string()
    } else {
        cleaned.join(", ")
    }
}

/// Build the prompt for one submission.
///
/// The instructions pin the heading sequence, the recommendation table shape and the citation
/// style the structural validator checks for.
pub fn build_prompt(submission: &Submission, today: NaiveDate, policy: &ValidationPolicy) -> Prompt {
    let headings = REQUIRED_HEADINGS
        .iter()
        .map(|h| format!("  {h}"))
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You are a careful supplement-planning assistant writing a personalised report.\n\
         Write at least {min_words} words of markdown using exactly these level-2 headings, in this order:\n\
         {headings}\n\
         Under {recs}, include a pipe table with the columns | Supplement | Why It Helps | Est. Monthly Cost | \
         and at least {min_rows} rows.\n\
         Under Dosing & Notes, write one bullet per item as `- Name — dose, timing` using AM, PM or AM/PM.\n\
         Under {evidence}, list at least {min_citations} bullets, each with a PubMed, PMC, DOI or NIH ODS URL.\n\
         Every narrative section needs at least {min_sentences} full sentences; the summary needs at least {min_summary}.\n\
         Never recommend anything that conflicts with the listed medications, conditions, allergies or pregnancy.\n\
         Finish with the line {end} and nothing after it.",
        min_words = policy.min_words,
        recs = HEADING_RECOMMENDATIONS,
        min_rows = policy.min_table_rows,
        evidence = HEADING_EVIDENCE,
        min_citations = policy.min_citations,
        min_sentences = policy.min_section_sentences,
        min_summary = policy.min_summary_sentences,
        end = TERMINAL_MARKER,
    );

    let age = submission
        .age_on(today)
        .map(|a| a.to_string())
        .unwrap_or_else(|| "not provided".into());

    let user = format!(
        "Intake details:\n\
         - Age: {age}\n\
         - Goals: {goals}\n\
         - Health conditions: {conditions}\n\
         - Medications: {medications}\n\
         - Current supplements: {supplements}\n\
         - Hormones: {hormones}\n\
         - Allergies: {allergies}\n\
         - Pregnant or breastfeeding: {pregnant}\n\
         - Dosing preference: {dosing}\n\
         - Brand preference: {brand}\n",
        goals = list_or_none(&submission.goals),
        conditions = list_or_none(&submission.health_conditions),
        medications = list_or_none(&submission.medications),
        supplements = list_or_none(&submission.supplements),
        hormones = list_or_none(&submission.hormones),
        allergies = list_or_none(&submission.allergies),
        pregnant = if submission.pregnant { "yes" } else { "no" },
        dosing = submission.dosing_preference.as_deref().unwrap_or("no preference"),
        brand = submission.brand_preference.as_deref().unwrap_or("no preference"),
    );

    Prompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_heading_and_threshold() {
        let policy = ValidationPolicy::default();
        let prompt = build_prompt(
            &Submission::default(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            &policy,
        );
        for heading in REQUIRED_HEADINGS {
            assert!(prompt.system.contains(heading), "missing {heading}");
        }
        assert!(prompt.system.contains("1800 words"));
        assert!(prompt.system.contains("at least 10 rows"));
        assert!(prompt.user.contains("Age: not provided"));
        assert!(prompt.user.contains("Medications: none reported"));
    }

    #[test]
    fn test_prompt_includes_intake_fields() {
        let submission = Submission {
            date_of_birth: NaiveDate::from_ymd_opt(1980, 3, 1),
            goals: vec!["Better sleep".into(), " ".into()],
            medications: vec!["Sertraline".into()],
            pregnant: true,
            brand_preference: Some("budget".into()),
            ..Submission::default()
        };
        let prompt = build_prompt(
            &submission,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            &ValidationPolicy::default(),
        );
        assert!(prompt.user.contains("Age: 46"));
        assert!(prompt.user.contains("Goals: Better sleep\n"));
        assert!(prompt.user.contains("Medications: Sertraline"));
        assert!(prompt.user.contains("Pregnant or breastfeeding: yes"));
        assert!(prompt.user.contains("Brand preference: budget"));
    }
}
