//! Link catalogue wire model and lookup.
//!
//! The link catalogue holds, per canonical supplement key, the purchase-link variants the link
//! policy chooses between and an indicative monthly cost.
//!
//! Wire format:
//! ```yaml
//! version: "2026.09"
//! products:
//!   magnesium:
//!     monthly_cost: 12.0
//!     default: https://www.amazon.com/s?k=magnesium+glycinate
//!     budget: https://www.amazon.com/s?k=magnesium+glycinate+value+size
//!     specialty_pharmacy: https://us.fullscript.com/catalog/search?query=magnesium
//! ```

use crate::{normalise_key, parse_wire, validate_url, ReferenceDataError, ReferenceResult};
use serde::{Deserialize, Serialize};
use stack_types::NonEmptyText;
use std::collections::BTreeMap;
use std::path::Path;

const BUNDLED_LINK_CATALOG: &str = include_str!("../data/link_catalog.yaml");

/// Purchase options and cost for one canonical supplement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty_pharmacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

impl CatalogEntry {
    fn validate(&self, key: &str) -> ReferenceResult<()> {
        if let Some(cost) = self.monthly_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(ReferenceDataError::InvalidInput(format!(
                    "catalogue entry '{key}' has an invalid monthly_cost"
                )));
            }
        }

        let links = [
            &self.default,
            &self.budget,
            &self.trusted,
            &self.clean,
            &self.specialty_pharmacy,
            &self.other,
        ];
        for url in links.into_iter().flatten() {
            validate_url(key, url)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkCatalogWire {
    version: String,
    products: BTreeMap<String, CatalogEntry>,
}

/// Immutable, versioned purchase-link catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCatalog {
    version: String,
    products: BTreeMap<String, CatalogEntry>,
}

impl LinkCatalog {
    /// Parse a link catalogue from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceDataError`] if the YAML does not match the wire schema, the version is
    /// blank, a cost is negative, or a link is not an http(s) URL.
    pub fn parse(yaml_text: &str) -> ReferenceResult<Self> {
        let wire: LinkCatalogWire = parse_wire(yaml_text, "Link catalogue")?;
        Self::from_entries(&wire.version, wire.products)
    }

    pub fn from_entries<I, K>(version: &str, entries: I) -> ReferenceResult<Self>
    where
        I: IntoIterator<Item = (K, CatalogEntry)>,
        K: AsRef<str>,
    {
        let version = NonEmptyText::new(version).map_err(|_| {
            ReferenceDataError::InvalidInput("link catalogue version cannot be empty".into())
        })?
        .into_string();

        let mut products = BTreeMap::new();
        for (raw_key, entry) in entries {
            let key = normalise_key(raw_key.as_ref());
            if key.is_empty() {
                return Err(ReferenceDataError::InvalidInput(
                    "link catalogue contains an empty key".into(),
                ));
            }
            entry.validate(&key)?;
            if products.insert(key.clone(), entry).is_some() {
                return Err(ReferenceDataError::InvalidInput(format!(
                    "link catalogue key '{key}' is duplicated after normalisation"
                )));
            }
        }

        Ok(Self { version, products })
    }

    /// The catalogue compiled into the binary.
    pub fn bundled() -> ReferenceResult<Self> {
        Self::parse(BUNDLED_LINK_CATALOG)
    }

    pub fn load(path: &Path) -> ReferenceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// An empty catalogue; every item then ends up without purchase links.
    pub fn empty() -> Self {
        Self {
            version: "empty".into(),
            products: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.products.get(&normalise_key(key))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
