//! The stack item record and the value types it carries.
//!
//! Items are created by the parser and then mutated in place by the later pipeline stages: the
//! safety screener appends cautions, the evidence resolver renames and attaches citations, and
//! the link policy fills `link_variants`, `cost_estimate` and `chosen_links`.

use serde::{Deserialize, Serialize};
use stack_types::{DoseUnit, NormalizedName, Timing};
use std::collections::HashMap;

/// A dose reduced to an amount and a unit. Grams are stored as milligrams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedDose {
    pub amount: f64,
    pub unit: DoseUnit,
}

/// Purchase-link variants for an item, populated from the link catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkVariants {
    pub budget: Option<String>,
    pub trusted: Option<String>,
    pub clean: Option<String>,
    pub default: Option<String>,
    pub specialty_pharmacy: Option<String>,
    pub other: Option<String>,
}

impl LinkVariants {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// The links actually shown to the account, chosen by the link policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChosenLinks {
    pub primary_marketplace: Option<String>,
    pub specialty_pharmacy: Option<String>,
    pub other: Option<String>,
}

impl ChosenLinks {
    pub fn is_empty(&self) -> bool {
        self.primary_marketplace.is_none() && self.specialty_pharmacy.is_none() && self.other.is_none()
    }
}

/// One recommended supplement.
///
/// `citations` holds URLs found next to the item in the generated text until evidence
/// resolution replaces them with index citations (or filters them to trusted sources).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItem {
    pub name: String,
    pub dose: Option<String>,
    pub dose_parsed: Option<ParsedDose>,
    pub timing: Option<Timing>,
    pub rationale: Option<String>,
    pub caution: Option<String>,
    pub citations: Option<Vec<String>>,
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub link_variants: LinkVariants,
    #[serde(default)]
    pub chosen_links: ChosenLinks,
}

impl StackItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dose: None,
            dose_parsed: None,
            timing: None,
            rationale: None,
            caution: None,
            citations: None,
            cost_estimate: None,
            link_variants: LinkVariants::default(),
            chosen_links: ChosenLinks::default(),
        }
    }

    /// The de-duplication key for this item.
    pub fn normalized_name(&self) -> NormalizedName {
        NormalizedName::from_raw(&self.name)
    }

    fn absorb(&mut self, other: StackItem) {
        if self.dose.is_none() {
            self.dose = other.dose;
            self.dose_parsed = other.dose_parsed;
        }
        if self.timing.is_none() {
            self.timing = other.timing;
        }
        if self.rationale.is_none() {
            self.rationale = other.rationale;
        }
        if self.citations.is_none() {
            self.citations = other.citations;
        }
        if self.cost_estimate.is_none() {
            self.cost_estimate = other.cost_estimate;
        }
        if self.link_variants.is_empty() {
            self.link_variants = other.link_variants;
        }
        if self.chosen_links.is_empty() {
            self.chosen_links = other.chosen_links;
        }
        if let Some(caution) = other.caution.as_deref() {
            self.add_caution(caution);
        }
    }

    /// Append a caution sentence, skipping exact repeats.
    pub fn add_caution(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        match &mut self.caution {
            Some(existing) if existing.contains(note) => {}
            Some(existing) => {
                existing.push(' ');
                existing.push_str(note);
            }
            None => self.caution = Some(note.to_string()),
        }
    }
}

/// Collapse items whose normalized name repeats an earlier one.
///
/// The first occurrence wins and back-fills its empty fields from the later duplicates; their
/// cautions are appended. Returns the input positions of the dropped duplicates.
pub fn dedupe_by_name(items: &mut Vec<StackItem>) -> Vec<usize> {
    let mut positions: HashMap<NormalizedName, usize> = HashMap::new();
    let mut kept: Vec<StackItem> = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();

    for (index, item) in items.drain(..).enumerate() {
        let key = item.normalized_name();
        match positions.get(&key) {
            Some(&at) => {
                kept[at].absorb(item);
                dropped.push(index);
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(item);
            }
        }
    }

    *items = kept;
    dropped
}

/// Sum of the known cost estimates, rounded to cents.
pub fn monthly_cost(items: &[StackItem]) -> f64 {
    let total: f64 = items.iter().filter_map(|i| i.cost_estimate).sum();
    (total * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_caution_appends_and_skips_repeats() {
        let mut item = StackItem::new("Omega-3");
        item.add_caution("Take with food.");
        item.add_caution("Take with food.");
        item.add_caution("Check with your clinician.");
        assert_eq!(
            item.caution.as_deref(),
            Some("Take with food. Check with your clinician.")
        );
        item.add_caution("   ");
        assert_eq!(
            item.caution.as_deref(),
            Some("Take with food. Check with your clinician.")
        );
    }

    #[test]
    fn test_dedupe_by_name_keeps_first_occurrence() {
        let mut first = StackItem::new("Vitamin D3");
        first.rationale = Some("first".into());
        let mut items = vec![
            first,
            StackItem::new("**vitamin d3**"),
            StackItem::new("Zinc"),
        ];
        let dropped = dedupe_by_name(&mut items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].rationale.as_deref(), Some("first"));
        assert_eq!(dropped, vec![1]);
    }

    #[test]
    fn test_dedupe_by_name_back_fills_from_duplicates() {
        let mut first = StackItem::new("Magnesium");
        first.rationale = Some("sleep".into());
        let mut second = StackItem::new("magnesium");
        second.dose = Some("200 mg".into());
        second.dose_parsed = Some(ParsedDose {
            amount: 200.0,
            unit: DoseUnit::Mg,
        });
        second.timing = Some(Timing::Pm);
        second.rationale = Some("cramps".into());
        second.caution = Some("Separate from thyroid medication.".into());

        let mut items = vec![first, StackItem::new("Zinc"), second];
        let dropped = dedupe_by_name(&mut items);

        assert_eq!(dropped, vec![2]);
        assert_eq!(items.len(), 2);
        let merged = &items[0];
        assert_eq!(merged.rationale.as_deref(), Some("sleep"));
        assert_eq!(merged.dose.as_deref(), Some("200 mg"));
        assert_eq!(merged.dose_parsed.map(|d| d.amount), Some(200.0));
        assert_eq!(merged.timing, Some(Timing::Pm));
        assert_eq!(
            merged.caution.as_deref(),
            Some("Separate from thyroid medication.")
        );
    }

    #[test]
    fn test_monthly_cost_ignores_unknown_costs() {
        let mut a = StackItem::new("A");
        a.cost_estimate = Some(10.25);
        let mut b = StackItem::new("B");
        b.cost_estimate = Some(5.5);
        let c = StackItem::new("C");
        assert_eq!(monthly_cost(&[a, b, c]), 15.75);
        assert_eq!(monthly_cost(&[]), 0.0);
    }

    #[test]
    fn test_item_serialises_with_link_blocks() {
        let item = StackItem::new("Zinc");
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["link_variants"].is_object());
        assert!(json["chosen_links"]["primary_marketplace"].is_null());
        assert!(item.link_variants.is_empty());
        assert!(item.chosen_links.is_empty());
    }
}
