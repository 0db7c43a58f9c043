//! Purchase-link selection.
//!
//! Catalogue data is attached to items first ([`attach_catalog`]); link choice is then a pure
//! function of the item, the brand preference bucket and the account tier ([`choose_links`]).

use crate::evidence::slugify;
use crate::item::{ChosenLinks, LinkVariants, StackItem};
use reference_data::LinkCatalog;
use stack_types::{AccountTier, NormalizedName};

/// The link variant a brand preference asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrandBucket {
    Budget,
    Trusted,
    Clean,
    #[default]
    Default,
}

impl BrandBucket {
    /// Map a free-text brand preference onto a bucket by whole-word phrase match.
    pub fn from_preference(preference: Option<&str>) -> Self {
        let Some(preference) = preference else {
            return BrandBucket::Default;
        };
        let normalized = NormalizedName::from_raw(preference);
        let has = |markers: &[&str]| {
            markers
                .iter()
                .any(|m| normalized.contains_phrase(&NormalizedName::from_raw(m)))
        };

        if has(&["budget", "cheap", "cheapest", "affordable", "best value", "good value", "low cost", "lowest price"]) {
            BrandBucket::Budget
        } else if has(&["trusted", "reputable", "third-party", "third party", "tested", "quality", "premium brand"]) {
            BrandBucket::Trusted
        } else if has(&["clean", "organic", "natural", "non-gmo", "additive free", "vegan"]) {
            BrandBucket::Clean
        } else {
            BrandBucket::Default
        }
    }

    fn variant<'a>(&self, variants: &'a LinkVariants) -> Option<&'a String> {
        match self {
            BrandBucket::Budget => variants.budget.as_ref(),
            BrandBucket::Trusted => variants.trusted.as_ref(),
            BrandBucket::Clean => variants.clean.as_ref(),
            BrandBucket::Default => variants.default.as_ref(),
        }
    }
}

/// Choose the links shown for one item.
///
/// The marketplace link is the bucket's variant when present, else the first of
/// default, trusted, budget, clean. Specialty-pharmacy and "other" links are only offered to
/// paid tiers.
pub fn choose_links(item: &StackItem, bucket: BrandBucket, tier: AccountTier) -> ChosenLinks {
    let variants = &item.link_variants;
    let primary_marketplace = bucket
        .variant(variants)
        .or(variants.default.as_ref())
        .or(variants.trusted.as_ref())
        .or(variants.budget.as_ref())
        .or(variants.clean.as_ref())
        .cloned();

    if tier.is_paid() {
        ChosenLinks {
            primary_marketplace,
            specialty_pharmacy: variants.specialty_pharmacy.clone(),
            other: variants.other.clone(),
        }
    } else {
        ChosenLinks {
            primary_marketplace,
            specialty_pharmacy: None,
            other: None,
        }
    }
}

/// Populate `link_variants` from the catalogue and fill a missing `cost_estimate`.
pub fn attach_catalog(items: &mut [StackItem], catalog: &LinkCatalog) {
    let mut matched = 0;
    for item in items.iter_mut() {
        let Some(entry) = catalog.get(&slugify(&item.name)) else {
            continue;
        };
        matched += 1;
        item.link_variants = LinkVariants {
            budget: entry.budget.clone(),
            trusted: entry.trusted.clone(),
            clean: entry.clean.clone(),
            default: entry.default.clone(),
            specialty_pharmacy: entry.specialty_pharmacy.clone(),
            other: entry.other.clone(),
        };
        if item.cost_estimate.is_none() {
            item.cost_estimate = entry.monthly_cost;
        }
    }
    tracing::info!(
        "link catalogue {} matched {}/{} items",
        catalog.version(),
        matched,
        items.len()
    );
}

/// Apply [`choose_links`] to every item.
pub fn apply_link_policy(items: &mut [StackItem], bucket: BrandBucket, tier: AccountTier) {
    for item in items.iter_mut() {
        item.chosen_links = choose_links(item, bucket, tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_all_variants() -> StackItem {
        let mut item = StackItem::new("Magnesium");
        item.link_variants = LinkVariants {
            budget: Some("https://shop.example/budget".into()),
            trusted: Some("https://shop.example/trusted".into()),
            clean: Some("https://shop.example/clean".into()),
            default: Some("https://shop.example/default".into()),
            specialty_pharmacy: Some("https://pharmacy.example/mg".into()),
            other: Some("https://other.example/mg".into()),
        };
        item
    }

    #[test]
    fn test_brand_bucket_from_preference() {
        assert_eq!(BrandBucket::from_preference(Some("Budget friendly")), BrandBucket::Budget);
        assert_eq!(
            BrandBucket::from_preference(Some("Third-party tested brands")),
            BrandBucket::Trusted
        );
        assert_eq!(BrandBucket::from_preference(Some("Clean label")), BrandBucket::Clean);
        assert_eq!(BrandBucket::from_preference(Some("no preference")), BrandBucket::Default);
        assert_eq!(BrandBucket::from_preference(None), BrandBucket::Default);
        assert_eq!(
            BrandBucket::from_preference(Some("I value third-party tested quality")),
            BrandBucket::Trusted
        );
        assert_eq!(BrandBucket::from_preference(Some("Best value please")), BrandBucket::Budget);
        assert_eq!(BrandBucket::from_preference(Some("Naturally flavoured")), BrandBucket::Default);
    }

    #[test]
    fn test_budget_free_tier_gets_only_budget_marketplace_link() {
        let chosen = choose_links(&item_with_all_variants(), BrandBucket::Budget, AccountTier::Free);
        assert_eq!(
            chosen,
            ChosenLinks {
                primary_marketplace: Some("https://shop.example/budget".into()),
                specialty_pharmacy: None,
                other: None,
            }
        );
    }

    #[test]
    fn test_paid_tier_gets_specialty_and_other_links() {
        let chosen =
            choose_links(&item_with_all_variants(), BrandBucket::Default, AccountTier::Premium);
        assert_eq!(chosen.primary_marketplace.as_deref(), Some("https://shop.example/default"));
        assert_eq!(chosen.specialty_pharmacy.as_deref(), Some("https://pharmacy.example/mg"));
        assert_eq!(chosen.other.as_deref(), Some("https://other.example/mg"));
    }

    #[test]
    fn test_marketplace_fall_through_order() {
        let mut item = item_with_all_variants();
        item.link_variants.budget = None;
        let chosen = choose_links(&item, BrandBucket::Budget, AccountTier::Free);
        assert_eq!(chosen.primary_marketplace.as_deref(), Some("https://shop.example/default"));

        item.link_variants.default = None;
        let chosen = choose_links(&item, BrandBucket::Budget, AccountTier::Free);
        assert_eq!(chosen.primary_marketplace.as_deref(), Some("https://shop.example/trusted"));

        item.link_variants.trusted = None;
        let chosen = choose_links(&item, BrandBucket::Budget, AccountTier::Free);
        assert_eq!(chosen.primary_marketplace.as_deref(), Some("https://shop.example/clean"));

        let chosen = choose_links(&StackItem::new("Unknown"), BrandBucket::Clean, AccountTier::Premium);
        assert!(chosen.is_empty());
    }

    #[test]
    fn test_attach_catalog_fills_variants_and_cost() {
        let catalog = LinkCatalog::bundled().unwrap();
        let mut items = vec![StackItem::new("Vitamin D3"), StackItem::new("Beetroot")];
        items[0].cost_estimate = None;
        attach_catalog(&mut items, &catalog);

        assert!(items[0].link_variants.default.is_some());
        assert!(items[0].cost_estimate.is_some());
        assert!(items[1].link_variants.is_empty());
        assert!(items[1].cost_estimate.is_none());
    }

    #[test]
    fn test_attach_catalog_keeps_generated_cost() {
        let catalog = LinkCatalog::bundled().unwrap();
        let mut items = vec![StackItem::new("Magnesium")];
        items[0].cost_estimate = Some(99.0);
        attach_catalog(&mut items, &catalog);
        assert_eq!(items[0].cost_estimate, Some(99.0));
    }
}
