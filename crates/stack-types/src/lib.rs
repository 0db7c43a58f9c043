//! Validated value types shared across the stack workspace.
//!
//! These types carry the small invariants that every crate relies on: non-empty text, the
//! normalized name used as the stack item de-duplication key, and the closed enumerations that
//! are persisted as strings (account tier, safety status, timing, dose unit).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input did not match any known value of a closed enumeration
    #[error("unrecognised {kind}: {value}")]
    Unrecognised { kind: &'static str, value: String },
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// The de-duplication key for supplement names.
///
/// Markup and punctuation are removed, whitespace is collapsed and the result is lower-cased,
/// so `"**Omega-3**  (Fish Oil)"` and `"omega3 fish oil"` share a key. The key may be empty;
/// callers treat an empty key as an invalid name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub fn from_raw(raw: &str) -> Self {
        let stripped: String = raw
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_lowercase().next().unwrap_or(c)
                } else if c.is_whitespace() {
                    ' '
                } else {
                    '\0'
                }
            })
            .filter(|c| *c != '\0')
            .collect();

        Self(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `phrase` occurs in this name as a run of whole words.
    pub fn contains_phrase(&self, phrase: &NormalizedName) -> bool {
        if phrase.is_empty() {
            return false;
        }
        format!(" {} ", self.0).contains(&format!(" {} ", phrase.0))
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription level of the account that owns a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[default]
    Free,
    Premium,
}

impl AccountTier {
    /// Maps a free-text plan label onto a tier. Anything that is not recognisably paid is free.
    pub fn from_plan_label(label: &str) -> Self {
        const PAID_MARKERS: &[&str] = &["premium", "pro", "paid", "plus", "member", "annual", "monthly"];
        let label = NormalizedName::from_raw(label);
        if PAID_MARKERS
            .iter()
            .any(|m| label.contains_phrase(&NormalizedName::from_raw(m)))
        {
            AccountTier::Premium
        } else {
            AccountTier::Free
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, AccountTier::Premium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::Free => "free",
            AccountTier::Premium => "premium",
        }
    }
}

/// Overall outcome of the safety cross-check, persisted verbatim on the stack row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyStatus {
    Safe,
    Warning,
    Error,
}

impl SafetyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyStatus::Safe => "safe",
            SafetyStatus::Warning => "warning",
            SafetyStatus::Error => "error",
        }
    }
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyStatus {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Ok(SafetyStatus::Safe),
            "warning" => Ok(SafetyStatus::Warning),
            "error" => Ok(SafetyStatus::Error),
            _ => Err(TextError::Unrecognised {
                kind: "safety status",
                value: s.to_string(),
            }),
        }
    }
}

/// When in the day an item should be taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timing {
    Am,
    Pm,
    AmPm,
    Other(String),
}

impl Timing {
    /// Parses a timing column or dosing-note fragment. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));

        let morning = has(&["am", "morning", "breakfast", "waking"]);
        let evening = has(&["pm", "evening", "night", "bedtime", "dinner", "bed"]);

        if (morning && evening) || has(&["twice", "split", "bid"]) {
            Some(Timing::AmPm)
        } else if morning {
            Some(Timing::Am)
        } else if evening {
            Some(Timing::Pm)
        } else {
            Some(Timing::Other(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Timing::Am => "AM",
            Timing::Pm => "PM",
            Timing::AmPm => "AM/PM",
            Timing::Other(text) => text,
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Timing {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Timing {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timing::parse(&s).ok_or_else(|| serde::de::Error::custom(TextError::Empty))
    }
}

/// Unit of a parsed dose. Grams never appear here: they are converted to milligrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseUnit {
    #[serde(rename = "mg")]
    Mg,
    #[serde(rename = "mcg")]
    Mcg,
    #[serde(rename = "IU")]
    Iu,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::Mg => "mg",
            DoseUnit::Mcg => "mcg",
            DoseUnit::Iu => "IU",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoseUnit {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mg" => Ok(DoseUnit::Mg),
            "mcg" | "µg" | "ug" => Ok(DoseUnit::Mcg),
            "iu" => Ok(DoseUnit::Iu),
            _ => Err(TextError::Unrecognised {
                kind: "dose unit",
                value: s.to_string(),
            }),
        }
    }
}
