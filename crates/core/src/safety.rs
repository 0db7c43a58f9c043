//! Safety cross-check of parsed items against the person's profile.
//!
//! The pipeline consumes screeners through [`SafetyScreener`] and treats the result opaquely:
//! whatever is missing from `cleaned` is dropped from every later stage and `status` is
//! persisted verbatim. [`RuleBasedScreener`] is the bundled implementation, driven by a static
//! interaction table.

use crate::evidence::canonicalize;
use crate::item::StackItem;
use crate::submission::Submission;
use stack_types::{NormalizedName, SafetyStatus};

/// The parts of a submission a screener may look at, normalized for phrase matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyProfile {
    pub medications: Vec<NormalizedName>,
    pub conditions: Vec<NormalizedName>,
    pub allergies: Vec<NormalizedName>,
    pub pregnant: bool,
    pub preferences: Vec<NormalizedName>,
}

impl SafetyProfile {
    fn normalize_all(values: &[String]) -> Vec<NormalizedName> {
        values
            .iter()
            .map(|v| NormalizedName::from_raw(v))
            .filter(|n| !n.is_empty())
            .collect()
    }
}

impl From<&Submission> for SafetyProfile {
    fn from(submission: &Submission) -> Self {
        let mut conditions = Self::normalize_all(&submission.health_conditions);
        // Hormones are screened alongside conditions.
        conditions.extend(Self::normalize_all(&submission.hormones));

        let preferences = [&submission.dosing_preference, &submission.brand_preference]
            .into_iter()
            .flatten()
            .map(|p| NormalizedName::from_raw(p))
            .filter(|n| !n.is_empty())
            .collect();

        Self {
            medications: Self::normalize_all(&submission.medications),
            conditions,
            allergies: Self::normalize_all(&submission.allergies),
            pregnant: submission.pregnant,
            preferences,
        }
    }
}

/// Result of a screening pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyOutcome {
    pub cleaned: Vec<StackItem>,
    pub status: SafetyStatus,
}

/// A safety cross-check. Implementations must not add items.
pub trait SafetyScreener: Send + Sync {
    fn check(&self, profile: &SafetyProfile, items: Vec<StackItem>) -> SafetyOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Remove,
    Caution,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Medication(&'static [&'static str]),
    Condition(&'static [&'static str]),
    Allergy(&'static [&'static str]),
    Preference(&'static [&'static str]),
    Pregnancy,
}

#[derive(Debug, Clone, Copy)]
struct InteractionRule {
    trigger: Trigger,
    items: &'static [&'static str],
    severity: Severity,
    note: &'static str,
}

const ANTICOAGULANTS: &[&str] = &[
    "warfarin", "coumadin", "apixaban", "eliquis", "rivaroxaban", "xarelto", "dabigatran",
    "clopidogrel", "plavix",
];
const SEROTONERGIC: &[&str] = &[
    "sertraline", "zoloft", "fluoxetine", "prozac", "escitalopram", "lexapro", "citalopram",
    "paroxetine", "paxil", "venlafaxine", "effexor", "duloxetine", "cymbalta", "ssri", "snri",
    "maoi",
];
const SEDATIVES: &[&str] = &[
    "zolpidem", "ambien", "alprazolam", "xanax", "lorazepam", "ativan", "clonazepam",
    "klonopin", "diazepam", "benzodiazepine",
];

const RULES: &[InteractionRule] = &[
    InteractionRule {
        trigger: Trigger::Medication(ANTICOAGULANTS),
        items: &[
            "vitamin k", "vitamin k2", "k2", "ginkgo", "fish oil", "omega3", "omega 3",
            "vitamin e", "curcumin", "turmeric", "garlic",
        ],
        severity: Severity::Remove,
        note: "May alter anticoagulant effect.",
    },
    InteractionRule {
        trigger: Trigger::Medication(SEROTONERGIC),
        items: &["st johns wort", "5htp", "5 htp", "same", "tryptophan"],
        severity: Severity::Remove,
        note: "Risk of serotonin syndrome with antidepressants.",
    },
    InteractionRule {
        trigger: Trigger::Medication(SEDATIVES),
        items: &["melatonin", "valerian", "kava", "magnesium"],
        severity: Severity::Caution,
        note: "May add to sedation; take well apart from sleep medication.",
    },
    InteractionRule {
        trigger: Trigger::Medication(&["levothyroxine", "synthroid", "liothyronine"]),
        items: &["calcium", "iron", "magnesium", "zinc"],
        severity: Severity::Caution,
        note: "Separate from thyroid medication by at least four hours.",
    },
    InteractionRule {
        trigger: Trigger::Medication(&["lisinopril", "losartan", "spironolactone", "enalapril"]),
        items: &["potassium"],
        severity: Severity::Remove,
        note: "Risk of high potassium with blood pressure medication.",
    },
    InteractionRule {
        trigger: Trigger::Medication(&["metformin", "insulin", "glipizide", "semaglutide"]),
        items: &["berberine", "chromium"],
        severity: Severity::Caution,
        note: "May lower blood sugar further; monitor glucose.",
    },
    InteractionRule {
        trigger: Trigger::Condition(&["kidney disease", "ckd", "renal", "kidney"]),
        items: &["creatine"],
        severity: Severity::Remove,
        note: "Not advised with reduced kidney function.",
    },
    InteractionRule {
        trigger: Trigger::Condition(&["kidney disease", "ckd", "renal", "kidney"]),
        items: &["magnesium", "potassium", "vitamin c"],
        severity: Severity::Caution,
        note: "Dose should be cleared with your kidney specialist.",
    },
    InteractionRule {
        trigger: Trigger::Condition(&["hypertension", "high blood pressure"]),
        items: &["licorice", "yohimbine"],
        severity: Severity::Remove,
        note: "Can raise blood pressure.",
    },
    InteractionRule {
        trigger: Trigger::Condition(&["hyperthyroidism", "graves", "overactive thyroid"]),
        items: &["ashwagandha", "iodine", "kelp"],
        severity: Severity::Remove,
        note: "May increase thyroid hormone levels.",
    },
    InteractionRule {
        trigger: Trigger::Condition(&["iron overload", "hemochromatosis", "haemochromatosis"]),
        items: &["iron"],
        severity: Severity::Remove,
        note: "Iron supplementation is contraindicated with iron overload.",
    },
    InteractionRule {
        trigger: Trigger::Pregnancy,
        items: &[
            "ashwagandha", "vitamin a", "retinol", "black cohosh", "dong quai", "rhodiola",
            "berberine", "yohimbine",
        ],
        severity: Severity::Remove,
        note: "Not recommended during pregnancy.",
    },
    InteractionRule {
        trigger: Trigger::Allergy(&["fish", "seafood"]),
        items: &["fish oil", "omega3", "omega 3", "cod liver oil", "krill oil"],
        severity: Severity::Remove,
        note: "Derived from fish.",
    },
    InteractionRule {
        trigger: Trigger::Allergy(&["shellfish", "seafood", "crustacean"]),
        items: &["krill oil", "glucosamine", "chitosan"],
        severity: Severity::Remove,
        note: "Derived from shellfish.",
    },
    InteractionRule {
        trigger: Trigger::Preference(&["vegan", "vegetarian", "plant based"]),
        items: &["fish oil", "omega3", "omega 3", "collagen", "gelatin", "cod liver oil"],
        severity: Severity::Caution,
        note: "Choose a plant-based form (for example algae oil).",
    },
];

fn any_matches(haystacks: &[NormalizedName], phrases: &[&str]) -> bool {
    haystacks.iter().any(|h| {
        phrases
            .iter()
            .any(|p| h.contains_phrase(&NormalizedName::from_raw(p)))
    })
}

impl Trigger {
    fn fires(&self, profile: &SafetyProfile) -> bool {
        match self {
            Trigger::Medication(terms) => any_matches(&profile.medications, terms),
            Trigger::Condition(terms) => any_matches(&profile.conditions, terms),
            Trigger::Allergy(terms) => any_matches(&profile.allergies, terms),
            Trigger::Preference(terms) => any_matches(&profile.preferences, terms),
            Trigger::Pregnancy => profile.pregnant,
        }
    }
}

/// The item's own name plus the canonical name evidence resolution will later rename it to,
/// so spellings such as "Krill Oil" or "MK-7" meet the rules written for "Omega-3" or "K2".
fn screening_names(item: &StackItem) -> Vec<NormalizedName> {
    let name = item.normalized_name();
    let mut names = vec![name.clone()];
    if let Some(canonical) = canonicalize(&item.name).map(NormalizedName::from_raw) {
        if canonical != name {
            names.push(canonical);
        }
    }
    names
}

/// Screener backed by the bundled interaction table.
///
/// An item is also removed when its name contains one of the person's allergens verbatim.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedScreener;

impl RuleBasedScreener {
    pub fn new() -> Self {
        Self
    }
}

impl SafetyScreener for RuleBasedScreener {
    fn check(&self, profile: &SafetyProfile, items: Vec<StackItem>) -> SafetyOutcome {
        let active: Vec<&InteractionRule> =
            RULES.iter().filter(|r| r.trigger.fires(profile)).collect();

        let input_len = items.len();
        let mut fired = false;
        let mut cleaned = Vec::with_capacity(items.len());

        for mut item in items {
            let names = screening_names(&item);
            let mut remove = false;

            if let Some(allergen) = profile
                .allergies
                .iter()
                .find(|a| names.iter().any(|n| n.contains_phrase(a)))
            {
                tracing::warn!("removing '{}': matches allergy '{}'", item.name, allergen);
                remove = true;
            }

            for rule in &active {
                if !any_matches(&names, rule.items) {
                    continue;
                }
                match rule.severity {
                    Severity::Remove => {
                        tracing::warn!("removing '{}': {}", item.name, rule.note);
                        remove = true;
                    }
                    Severity::Caution => {
                        tracing::info!("caution on '{}': {}", item.name, rule.note);
                        item.add_caution(rule.note);
                        fired = true;
                    }
                }
            }

            if remove {
                fired = true;
            } else {
                cleaned.push(item);
            }
        }

        let status = if input_len > 0 && cleaned.is_empty() {
            SafetyStatus::Error
        } else if fired {
            SafetyStatus::Warning
        } else {
            SafetyStatus::Safe
        };

        tracing::info!(
            "safety screen kept {}/{} items, status {}",
            cleaned.len(),
            input_len,
            status
        );
        SafetyOutcome { cleaned, status }
    }
}
