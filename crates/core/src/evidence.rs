//! Evidence resolution: canonical names and citations for parsed items.
//!
//! Resolution runs per item:
//! 1. canonicalize the name through the alias table, renaming the item to the canonical
//!    display name;
//! 2. build ordered lookup candidates (canonical slug, original slug, hyphen-less variants,
//!    per-canonical expansions);
//! 3. exact lookup in the evidence index, keeping up to three URLs;
//! 4. fuzzy substring match in either direction between candidates and index keys of at least
//!    four characters;
//! 5. otherwise keep the backend-supplied URLs that point at trusted sources, or clear the
//!    citations.

use crate::constants::MAX_CITATIONS_PER_ITEM;
use crate::item::StackItem;
use reference_data::EvidenceIndex;
use regex::Regex;
use stack_types::NormalizedName;
use std::sync::{Arc, LazyLock};

const MIN_FUZZY_KEY_LEN: usize = 4;

static TRUSTED_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:[a-z0-9-]+\.)*(?:pubmed\.ncbi\.nlm\.nih\.gov|ncbi\.nlm\.nih\.gov/pmc|pmc\.ncbi\.nlm\.nih\.gov|doi\.org|ods\.od\.nih\.gov|nccih\.nih\.gov|nejm\.org|jamanetwork\.com|thelancet\.com|bmj\.com|nature\.com|sciencedirect\.com|academic\.oup\.com|mdpi\.com|cochranelibrary\.com)(?:[/?#]|$)",
    )
    .expect("valid trusted source regex")
});

static ARTICLE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://[^\s/]+/(?:\S*/)?(?:article|articles|abstract|fulltext|full|doi)(?:/|\?|$)\S*")
        .expect("valid article link regex")
});

/// True for PubMed, PMC, DOI, NIH ODS/NCCIH and allow-listed journal URLs.
pub fn is_trusted_citation_url(url: &str) -> bool {
    TRUSTED_SOURCE_RE.is_match(url.trim())
}

/// True for URLs shaped like a journal article page on any domain.
pub fn is_article_link(url: &str) -> bool {
    ARTICLE_LINK_RE.is_match(url.trim())
}

/// Canonical display names and the whole-word phrases (normalized) that map onto them.
///
/// Order matters: the first canonical with a matching phrase wins, so combination products
/// such as "Vitamin D3 with K2" resolve to the first listed ingredient.
const ALIASES: &[(&str, &[&str])] = &[
    (
        "Omega-3",
        &[
            "omega3", "omega 3", "fish oil", "krill oil", "cod liver oil", "algae oil",
            "algal oil", "epa", "dha",
        ],
    ),
    (
        "Vitamin D3",
        &["vitamin d3", "vitamin d", "vit d3", "vit d", "d3", "cholecalciferol"],
    ),
    ("Vitamin K2", &["vitamin k2", "vitamin k", "k2", "mk7", "mk 7", "menaquinone"]),
    ("Magnesium", &["magnesium"]),
    (
        "Vitamin B12",
        &["vitamin b12", "b12", "methylcobalamin", "cyanocobalamin", "cobalamin"],
    ),
    ("CoQ10", &["coq10", "coenzyme q10", "ubiquinol", "ubiquinone"]),
    ("Creatine", &["creatine"]),
    ("Ashwagandha", &["ashwagandha", "ksm66", "withania"]),
    ("Zinc", &["zinc"]),
    ("L-Theanine", &["ltheanine", "l theanine", "theanine"]),
    (
        "Probiotics",
        &["probiotic", "probiotics", "lactobacillus", "bifidobacterium"],
    ),
    ("Curcumin", &["curcumin", "turmeric"]),
    ("Melatonin", &["melatonin"]),
    ("Iron", &["iron", "ferrous", "ferritin"]),
    ("Vitamin C", &["vitamin c", "ascorbic acid"]),
    ("Folate", &["folate", "methylfolate", "folic acid", "5mthf", "5 mthf"]),
    ("Rhodiola Rosea", &["rhodiola"]),
    (
        "NAC",
        &["nac", "n acetyl cysteine", "nacetyl cysteine", "n acetylcysteine", "nacetylcysteine"],
    ),
];

/// Extra index keys worth trying for a canonical name.
const EXPANSIONS: &[(&str, &[&str])] = &[
    ("Omega-3", &["omega-3-fatty-acids", "fish-oil", "epa-dha"]),
    ("Vitamin D3", &["vitamin-d", "cholecalciferol"]),
    ("Vitamin K2", &["vitamin-k", "menaquinone"]),
    ("Magnesium", &["magnesium-glycinate", "magnesium-citrate"]),
    ("Vitamin B12", &["b12", "methylcobalamin"]),
    ("CoQ10", &["coenzyme-q10", "ubiquinol"]),
    ("Curcumin", &["turmeric"]),
    ("Folate", &["methylfolate", "folic-acid"]),
    ("L-Theanine", &["theanine"]),
    ("Probiotics", &["probiotic"]),
];

/// Map a raw item name to its canonical display name, if it has one.
pub fn canonicalize(name: &str) -> Option<&'static str> {
    let normalized = NormalizedName::from_raw(name);
    if normalized.is_empty() {
        return None;
    }
    ALIASES.iter().find_map(|(canonical, phrases)| {
        phrases
            .iter()
            .any(|p| normalized.contains_phrase(&NormalizedName::from_raw(p)))
            .then_some(*canonical)
    })
}

/// Lower-case, hyphen-separated slug of a display name: `"Vitamin D3"` becomes `"vitamin-d3"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Ordered, de-duplicated lookup keys for an item.
pub fn lookup_candidates(original: &str, canonical: Option<&str>) -> Vec<String> {
    let mut slugs = Vec::new();
    if let Some(canonical) = canonical {
        slugs.push(slugify(canonical));
    }
    slugs.push(slugify(original));

    let mut candidates: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    for slug in &slugs {
        push(slug.clone());
    }
    for slug in &slugs {
        push(slug.replace('-', ""));
    }
    if let Some(canonical) = canonical {
        if let Some((_, extra)) = EXPANSIONS.iter().find(|(c, _)| *c == canonical) {
            for key in extra.iter() {
                push((*key).to_string());
            }
        }
    }
    candidates
}

/// Resolves canonical names and citations against an injected evidence index.
#[derive(Debug, Clone)]
pub struct EvidenceResolver {
    index: Arc<EvidenceIndex>,
}

impl EvidenceResolver {
    pub fn new(index: Arc<EvidenceIndex>) -> Self {
        Self { index }
    }

    pub fn index_version(&self) -> &str {
        self.index.version()
    }

    /// Citations for a name: exact candidate hit first, then fuzzy. `None` when neither hits.
    pub fn citations_for(&self, original: &str, canonical: Option<&str>) -> Option<Vec<String>> {
        let candidates = lookup_candidates(original, canonical);

        let exact = candidates.iter().find_map(|c| self.index.lookup(c));
        let hit = exact.or_else(|| {
            candidates
                .iter()
                .filter(|c| c.len() >= MIN_FUZZY_KEY_LEN)
                .find_map(|candidate| {
                    self.index
                        .keys()
                        .filter(|key| key.len() >= MIN_FUZZY_KEY_LEN)
                        .find(|key| key.contains(candidate.as_str()) || candidate.contains(key))
                        .and_then(|key| self.index.lookup(key))
                })
        })?;

        Some(hit.iter().take(MAX_CITATIONS_PER_ITEM).cloned().collect())
    }

    /// Canonicalize one item in place and attach its citations.
    pub fn resolve(&self, item: &mut StackItem) {
        let original = item.name.clone();
        let canonical = canonicalize(&original);
        if let Some(canonical) = canonical {
            item.name = canonical.to_string();
        }

        match self.citations_for(&original, canonical) {
            Some(urls) => item.citations = Some(urls),
            None => {
                let trusted: Vec<String> = item
                    .citations
                    .take()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|u| is_trusted_citation_url(u))
                    .take(MAX_CITATIONS_PER_ITEM)
                    .collect();
                if trusted.is_empty() {
                    tracing::debug!("no evidence found for '{}'", original);
                }
                item.citations = (!trusted.is_empty()).then_some(trusted);
            }
        }
    }

    pub fn resolve_all(&self, items: &mut [StackItem]) {
        for item in items.iter_mut() {
            self.resolve(item);
        }
        let cited = items.iter().filter(|i| i.citations.is_some()).count();
        tracing::info!(
            "evidence resolved for {}/{} items (index {})",
            cited,
            items.len(),
            self.index.version()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> EvidenceResolver {
        EvidenceResolver::new(Arc::new(EvidenceIndex::bundled().unwrap()))
    }

    #[test]
    fn test_trusted_and_article_patterns() {
        assert!(is_trusted_citation_url("https://pubmed.ncbi.nlm.nih.gov/12345/"));
        assert!(is_trusted_citation_url(
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/"
        ));
        assert!(is_trusted_citation_url("https://doi.org/10.1000/xyz"));
        assert!(is_trusted_citation_url(
            "https://ods.od.nih.gov/factsheets/Zinc-HealthProfessional/"
        ));
        assert!(is_trusted_citation_url("https://www.nejm.org/doi/full/10.1056/x"));
        assert!(!is_trusted_citation_url("https://www.amazon.com/s?k=zinc"));
        assert!(!is_trusted_citation_url("https://doi.org.evil.example/x"));

        assert!(is_article_link("https://journal.example.org/article/123"));
        assert!(is_article_link("https://example.com/content/abstract/55"));
        assert!(!is_article_link("https://example.com/shop/zinc"));
    }

    #[test]
    fn test_canonicalize_aliases() {
        assert_eq!(canonicalize("Fish Oil (EPA/DHA)"), Some("Omega-3"));
        assert_eq!(canonicalize("**Omega-3**"), Some("Omega-3"));
        assert_eq!(canonicalize("Vitamin D3 + K2"), Some("Vitamin D3"));
        assert_eq!(canonicalize("Magnesium Glycinate"), Some("Magnesium"));
        assert_eq!(canonicalize("N-Acetyl Cysteine"), Some("NAC"));
        assert_eq!(canonicalize("L-Theanine"), Some("L-Theanine"));
        assert_eq!(canonicalize("Irony"), None);
        assert_eq!(canonicalize("Beetroot Powder"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Vitamin D3"), "vitamin-d3");
        assert_eq!(slugify("Omega-3 (Fish Oil)"), "omega-3-fish-oil");
        assert_eq!(slugify("  CoQ10 "), "coq10");
    }

    #[test]
    fn test_lookup_candidates_order() {
        let candidates = lookup_candidates("Fish Oil", Some("Omega-3"));
        assert_eq!(
            candidates,
            vec![
                "omega-3",
                "fish-oil",
                "omega3",
                "fishoil",
                "omega-3-fatty-acids",
                "epa-dha"
            ]
        );
    }

    #[test]
    fn test_resolve_exact_via_expansion() {
        let mut item = StackItem::new("Vitamin D (cholecalciferol)");
        resolver().resolve(&mut item);
        assert_eq!(item.name, "Vitamin D3");
        let citations = item.citations.unwrap();
        assert!(!citations.is_empty() && citations.len() <= MAX_CITATIONS_PER_ITEM);
    }

    #[test]
    fn test_resolve_fuzzy_match() {
        let index = EvidenceIndex::from_entries(
            "t",
            [(
                "omega-3-fatty-acids",
                vec!["https://ods.od.nih.gov/factsheets/Omega3FattyAcids-HealthProfessional/".to_string()],
            )],
        )
        .unwrap();
        let resolver = EvidenceResolver::new(Arc::new(index));
        assert!(resolver.citations_for("Omega 3", None).is_some());
        assert!(resolver.citations_for("Omg", None).is_none());
    }

    #[test]
    fn test_resolve_caps_citations_at_three() {
        let urls: Vec<String> = (0..5)
            .map(|i| format!("https://pubmed.ncbi.nlm.nih.gov/{i}/"))
            .collect();
        let index = EvidenceIndex::from_entries("t", [("zinc", urls)]).unwrap();
        let mut item = StackItem::new("Zinc Picolinate");
        EvidenceResolver::new(Arc::new(index)).resolve(&mut item);
        assert_eq!(item.name, "Zinc");
        assert_eq!(item.citations.unwrap().len(), 3);
    }

    #[test]
    fn test_resolve_falls_back_to_trusted_backend_urls() {
        let mut item = StackItem::new("Beetroot Powder");
        item.citations = Some(vec![
            "https://www.example-shop.com/beet".to_string(),
            "https://pubmed.ncbi.nlm.nih.gov/999/".to_string(),
        ]);
        resolver().resolve(&mut item);
        assert_eq!(item.name, "Beetroot Powder");
        assert_eq!(
            item.citations,
            Some(vec!["https://pubmed.ncbi.nlm.nih.gov/999/".to_string()])
        );

        let mut bare = StackItem::new("Beetroot Powder");
        bare.citations = Some(vec!["https://www.example-shop.com/beet".to_string()]);
        resolver().resolve(&mut bare);
        assert_eq!(bare.citations, None);
    }
}
