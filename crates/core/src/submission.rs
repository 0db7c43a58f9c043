//! The intake submission aggregate and the loader contract.

use crate::StackResult;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use stack_types::AccountTier;

/// A normalized intake record. Read-only input to the pipeline.
///
/// Medications, current supplements and hormones are stored as child rows; the remaining list
/// fields live on the parent row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub id: String,
    pub date_of_birth: Option<NaiveDate>,
    pub goals: Vec<String>,
    pub health_conditions: Vec<String>,
    pub medications: Vec<String>,
    pub supplements: Vec<String>,
    pub hormones: Vec<String>,
    pub allergies: Vec<String>,
    pub pregnant: bool,
    pub dosing_preference: Option<String>,
    pub brand_preference: Option<String>,
    pub account_tier: AccountTier,
}

impl Submission {
    /// Age in whole years on `today`, if a plausible date of birth is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        u32::try_from(years).ok().filter(|y| *y < 130)
    }
}

/// Loads a submission aggregate by id.
///
/// Implementations return `StackError::SubmissionNotFound` for unknown ids.
pub trait IntakeLoader: Send + Sync {
    fn fetch(&self, submission_id: &str) -> StackResult<Submission>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_on_handles_birthday_boundary() {
        let submission = Submission {
            date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15),
            ..Submission::default()
        };
        let before = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(submission.age_on(before), Some(35));
        assert_eq!(submission.age_on(on), Some(36));
    }

    #[test]
    fn test_age_on_rejects_future_or_missing_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let future = Submission {
            date_of_birth: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..Submission::default()
        };
        assert_eq!(future.age_on(today), None);
        assert_eq!(Submission::default().age_on(today), None);
    }

    #[test]
    fn test_deserialises_partial_json() {
        let submission: Submission = serde_json::from_str(
            r#"{"id": "abc", "medications": ["Warfarin"], "account_tier": "premium"}"#,
        )
        .unwrap();
        assert_eq!(submission.id, "abc");
        assert_eq!(submission.medications, vec!["Warfarin".to_string()]);
        assert!(submission.account_tier.is_paid());
        assert!(!submission.pregnant);
    }
}
