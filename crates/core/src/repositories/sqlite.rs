//! SQLite-backed store for submissions and stacks.

use super::{SaveReceipt, StackRecord, StackRepository, StoredStack};
use crate::backend::TokenUsage;
use crate::item::{ChosenLinks, LinkVariants, ParsedDose, StackItem};
use crate::submission::{IntakeLoader, Submission};
use crate::{StackError, StackResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use stack_types::{AccountTier, DoseUnit, SafetyStatus, Timing};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
  id TEXT PRIMARY KEY,
  date_of_birth TEXT,
  goals_json TEXT NOT NULL,
  health_conditions_json TEXT NOT NULL,
  allergies_json TEXT NOT NULL,
  pregnant INTEGER NOT NULL,
  dosing_preference TEXT,
  brand_preference TEXT,
  account_tier TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submission_medications (
  submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
  position INTEGER NOT NULL,
  name TEXT NOT NULL,
  PRIMARY KEY (submission_id, position)
);

CREATE TABLE IF NOT EXISTS submission_supplements (
  submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
  position INTEGER NOT NULL,
  name TEXT NOT NULL,
  PRIMARY KEY (submission_id, position)
);

CREATE TABLE IF NOT EXISTS submission_hormones (
  submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
  position INTEGER NOT NULL,
  name TEXT NOT NULL,
  PRIMARY KEY (submission_id, position)
);

CREATE TABLE IF NOT EXISTS stacks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  submission_id TEXT NOT NULL UNIQUE,
  generation_id TEXT NOT NULL,
  model_used TEXT,
  prompt_tokens INTEGER NOT NULL,
  completion_tokens INTEGER NOT NULL,
  total_tokens INTEGER NOT NULL,
  safety_status TEXT NOT NULL,
  monthly_cost REAL NOT NULL,
  validated INTEGER NOT NULL,
  narrative TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stack_items (
  stack_id INTEGER NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
  position INTEGER NOT NULL,
  name TEXT NOT NULL,
  dose TEXT,
  dose_amount REAL,
  dose_unit TEXT,
  timing TEXT,
  rationale TEXT,
  caution TEXT,
  citations_json TEXT,
  cost_estimate REAL,
  link_variants_json TEXT NOT NULL,
  chosen_links_json TEXT NOT NULL,
  PRIMARY KEY (stack_id, position)
);
"#;

const SUBMISSION_CHILD_TABLES: [&str; 3] = [
    "submission_medications",
    "submission_supplements",
    "submission_hormones",
];

/// One mutex-guarded connection. Writers serialize on the lock and on SQLite's own
/// transaction locking.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating its parent directory when needed.
    pub fn open(path: impl AsRef<Path>) -> StackResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StackError::StorageDirCreation)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StackResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StackResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StackResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StackError::StoreLockPoisoned)
    }

    /// Insert or replace a submission aggregate.
    pub fn save_submission(&self, submission: &Submission) -> StackResult<()> {
        crate::validation::validate_submission_id(&submission.id)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO submissions (
              id, date_of_birth, goals_json, health_conditions_json, allergies_json, pregnant,
              dosing_preference, brand_preference, account_tier, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
              date_of_birth = excluded.date_of_birth,
              goals_json = excluded.goals_json,
              health_conditions_json = excluded.health_conditions_json,
              allergies_json = excluded.allergies_json,
              pregnant = excluded.pregnant,
              dosing_preference = excluded.dosing_preference,
              brand_preference = excluded.brand_preference,
              account_tier = excluded.account_tier,
              updated_at = excluded.updated_at
            "#,
            params![
                submission.id,
                submission.date_of_birth.map(|d| d.to_string()),
                to_json(&submission.goals)?,
                to_json(&submission.health_conditions)?,
                to_json(&submission.allergies)?,
                submission.pregnant,
                submission.dosing_preference,
                submission.brand_preference,
                submission.account_tier.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let lists = [
            &submission.medications,
            &submission.supplements,
            &submission.hormones,
        ];
        for (table, values) in SUBMISSION_CHILD_TABLES.iter().zip(lists) {
            write_name_list(&tx, table, &submission.id, values)?;
        }
        tx.commit()?;

        tracing::info!("stored submission {}", submission.id);
        Ok(())
    }
}

impl IntakeLoader for SqliteStore {
    fn fetch(&self, submission_id: &str) -> StackResult<Submission> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT date_of_birth, goals_json, health_conditions_json, allergies_json, pregnant,
                       dosing_preference, brand_preference, account_tier
                FROM submissions
                WHERE id = ?1
                "#,
                params![submission_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((dob, goals, conditions, allergies, pregnant, dosing, brand, tier)) = row else {
            return Err(StackError::SubmissionNotFound(submission_id.to_string()));
        };

        let date_of_birth = dob
            .map(|d| {
                NaiveDate::from_str(&d).map_err(|_| StackError::InvalidStoredValue {
                    column: "date_of_birth",
                    value: d.clone(),
                })
            })
            .transpose()?;

        Ok(Submission {
            id: submission_id.to_string(),
            date_of_birth,
            goals: from_json(&goals)?,
            health_conditions: from_json(&conditions)?,
            medications: read_name_list(&conn, SUBMISSION_CHILD_TABLES[0], submission_id)?,
            supplements: read_name_list(&conn, SUBMISSION_CHILD_TABLES[1], submission_id)?,
            hormones: read_name_list(&conn, SUBMISSION_CHILD_TABLES[2], submission_id)?,
            allergies: from_json(&allergies)?,
            pregnant,
            dosing_preference: dosing,
            brand_preference: brand,
            account_tier: AccountTier::from_plan_label(&tier),
        })
    }
}

impl StackRepository for SqliteStore {
    fn save_stack(&self, record: &StackRecord, items: &[StackItem]) -> StackResult<SaveReceipt> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            r#"
            INSERT INTO stacks (
              submission_id, generation_id, model_used, prompt_tokens, completion_tokens,
              total_tokens, safety_status, monthly_cost, validated, narrative, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            ON CONFLICT(submission_id) DO UPDATE SET
              generation_id = excluded.generation_id,
              model_used = excluded.model_used,
              prompt_tokens = excluded.prompt_tokens,
              completion_tokens = excluded.completion_tokens,
              total_tokens = excluded.total_tokens,
              safety_status = excluded.safety_status,
              monthly_cost = excluded.monthly_cost,
              validated = excluded.validated,
              narrative = excluded.narrative,
              updated_at = excluded.updated_at
            "#,
            params![
                record.submission_id,
                record.generation_id.to_string(),
                record.model_used,
                i64::from(record.usage.prompt_tokens),
                i64::from(record.usage.completion_tokens),
                i64::from(record.usage.total_tokens),
                record.safety_status.as_str(),
                record.monthly_cost,
                record.validated,
                record.narrative,
                now,
            ],
        )?;

        let stack_id: i64 = tx.query_row(
            "SELECT id FROM stacks WHERE submission_id = ?1",
            params![record.submission_id],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM stack_items WHERE stack_id = ?1", params![stack_id])?;

        let mut inserted = 0usize;
        for item in items {
            if item.normalized_name().is_empty() {
                tracing::warn!(
                    "skipping item with empty normalized name {:?} for stack {}",
                    item.name,
                    stack_id
                );
                continue;
            }
            insert_item(&tx, stack_id, inserted as i64, item)?;
            inserted += 1;
        }
        tx.commit()?;

        tracing::info!(
            "saved stack {} for submission {} with {} items",
            stack_id,
            record.submission_id,
            inserted
        );
        Ok(SaveReceipt {
            stack_id,
            items_inserted: inserted,
        })
    }

    fn load_stack(&self, submission_id: &str) -> StackResult<Option<StoredStack>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, generation_id, model_used, prompt_tokens, completion_tokens,
                       total_tokens, safety_status, monthly_cost, validated, narrative,
                       created_at, updated_at
                FROM stacks
                WHERE submission_id = ?1
                "#,
                params![submission_id],
                |row| {
                    Ok(StackRow {
                        id: row.get(0)?,
                        generation_id: row.get(1)?,
                        model_used: row.get(2)?,
                        prompt_tokens: row.get(3)?,
                        completion_tokens: row.get(4)?,
                        total_tokens: row.get(5)?,
                        safety_status: row.get(6)?,
                        monthly_cost: row.get(7)?,
                        validated: row.get(8)?,
                        narrative: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = read_items(&conn, row.id)?;
        let record = StackRecord {
            submission_id: submission_id.to_string(),
            generation_id: Uuid::parse_str(&row.generation_id).map_err(|_| {
                StackError::InvalidStoredValue {
                    column: "generation_id",
                    value: row.generation_id.clone(),
                }
            })?,
            model_used: row.model_used,
            usage: TokenUsage {
                prompt_tokens: stored_count("prompt_tokens", row.prompt_tokens)?,
                completion_tokens: stored_count("completion_tokens", row.completion_tokens)?,
                total_tokens: stored_count("total_tokens", row.total_tokens)?,
            },
            safety_status: SafetyStatus::from_str(&row.safety_status).map_err(|_| {
                StackError::InvalidStoredValue {
                    column: "safety_status",
                    value: row.safety_status.clone(),
                }
            })?,
            monthly_cost: row.monthly_cost,
            validated: row.validated,
            narrative: row.narrative,
        };

        Ok(Some(StoredStack {
            stack_id: row.id,
            record,
            items,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        }))
    }
}

struct StackRow {
    id: i64,
    generation_id: String,
    model_used: Option<String>,
    prompt_tokens: i64,
    completion_tokens: i64,
    total_tokens: i64,
    safety_status: String,
    monthly_cost: f64,
    validated: bool,
    narrative: String,
    created_at: String,
    updated_at: String,
}

struct ItemRow {
    name: String,
    dose: Option<String>,
    dose_amount: Option<f64>,
    dose_unit: Option<String>,
    timing: Option<String>,
    rationale: Option<String>,
    caution: Option<String>,
    citations_json: Option<String>,
    cost_estimate: Option<f64>,
    link_variants_json: String,
    chosen_links_json: String,
}

fn insert_item(tx: &Transaction<'_>, stack_id: i64, position: i64, item: &StackItem) -> StackResult<()> {
    let citations_json = item.citations.as_ref().map(to_json).transpose()?;
    tx.execute(
        r#"
        INSERT INTO stack_items (
          stack_id, position, name, dose, dose_amount, dose_unit, timing, rationale, caution,
          citations_json, cost_estimate, link_variants_json, chosen_links_json
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        params![
            stack_id,
            position,
            item.name,
            item.dose,
            item.dose_parsed.map(|d| d.amount),
            item.dose_parsed.map(|d| d.unit.as_str()),
            item.timing.as_ref().map(|t| t.as_str().to_string()),
            item.rationale,
            item.caution,
            citations_json,
            item.cost_estimate,
            to_json(&item.link_variants)?,
            to_json(&item.chosen_links)?,
        ],
    )?;
    Ok(())
}

fn read_items(conn: &Connection, stack_id: i64) -> StackResult<Vec<StackItem>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT name, dose, dose_amount, dose_unit, timing, rationale, caution, citations_json,
               cost_estimate, link_variants_json, chosen_links_json
        FROM stack_items
        WHERE stack_id = ?1
        ORDER BY position
        "#,
    )?;
    let rows = stmt
        .query_map(params![stack_id], |row| {
            Ok(ItemRow {
                name: row.get(0)?,
                dose: row.get(1)?,
                dose_amount: row.get(2)?,
                dose_unit: row.get(3)?,
                timing: row.get(4)?,
                rationale: row.get(5)?,
                caution: row.get(6)?,
                citations_json: row.get(7)?,
                cost_estimate: row.get(8)?,
                link_variants_json: row.get(9)?,
                chosen_links_json: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(item_from_row).collect()
}

fn item_from_row(row: ItemRow) -> StackResult<StackItem> {
    let dose_parsed = match (row.dose_amount, row.dose_unit) {
        (Some(amount), Some(unit)) => Some(ParsedDose {
            amount,
            unit: DoseUnit::from_str(&unit).map_err(|_| StackError::InvalidStoredValue {
                column: "dose_unit",
                value: unit.clone(),
            })?,
        }),
        _ => None,
    };
    let citations = row
        .citations_json
        .as_deref()
        .map(from_json::<Vec<String>>)
        .transpose()?;
    let link_variants: LinkVariants = from_json(&row.link_variants_json)?;
    let chosen_links: ChosenLinks = from_json(&row.chosen_links_json)?;

    Ok(StackItem {
        name: row.name,
        dose: row.dose,
        dose_parsed,
        timing: row.timing.as_deref().and_then(Timing::parse),
        rationale: row.rationale,
        caution: row.caution,
        citations,
        cost_estimate: row.cost_estimate,
        link_variants,
        chosen_links,
    })
}

fn write_name_list(
    tx: &Transaction<'_>,
    table: &str,
    submission_id: &str,
    values: &[String],
) -> StackResult<()> {
    tx.execute(
        &format!("DELETE FROM {table} WHERE submission_id = ?1"),
        params![submission_id],
    )?;
    let insert = format!("INSERT INTO {table} (submission_id, position, name) VALUES (?1, ?2, ?3)");
    let names = values.iter().map(|v| v.trim()).filter(|v| !v.is_empty());
    for (position, name) in names.enumerate() {
        tx.execute(&insert, params![submission_id, position as i64, name])?;
    }
    Ok(())
}

fn read_name_list(conn: &Connection, table: &str, submission_id: &str) -> StackResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name FROM {table} WHERE submission_id = ?1 ORDER BY position"
    ))?;
    let names = stmt
        .query_map(params![submission_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> StackResult<String> {
    serde_json::to_string(value).map_err(StackError::Serialization)
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> StackResult<T> {
    serde_json::from_str(raw).map_err(StackError::Deserialization)
}

fn stored_count(column: &'static str, value: i64) -> StackResult<u32> {
    u32::try_from(value).map_err(|_| StackError::InvalidStoredValue {
        column,
        value: value.to_string(),
    })
}

fn parse_timestamp(column: &'static str, value: &str) -> StackResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StackError::InvalidStoredValue {
            column,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(submission_id: &str) -> StackRecord {
        StackRecord {
            submission_id: submission_id.into(),
            generation_id: Uuid::new_v4(),
            model_used: Some("fast".into()),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
            safety_status: SafetyStatus::Safe,
            monthly_cost: 24.5,
            validated: true,
            narrative: "## Summary\n## END\n".into(),
        }
    }

    fn item(name: &str) -> StackItem {
        let mut item = StackItem::new(name);
        item.dose = Some("500 mg".into());
        item.dose_parsed = Some(ParsedDose {
            amount: 500.0,
            unit: DoseUnit::Mg,
        });
        item.timing = Some(Timing::Pm);
        item.citations = Some(vec!["https://pubmed.ncbi.nlm.nih.gov/1/".into()]);
        item.cost_estimate = Some(12.0);
        item.link_variants = LinkVariants {
            default: Some("https://shop.example/x".into()),
            ..LinkVariants::default()
        };
        item
    }

    #[test]
    fn test_submission_round_trip_keeps_child_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let submission = Submission {
            id: "sub-1".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 2, 3),
            goals: vec!["Sleep".into()],
            medications: vec!["Warfarin".into(), " ".into(), "Metformin".into()],
            hormones: vec!["Levothyroxine".into()],
            allergies: vec!["Shellfish".into()],
            account_tier: AccountTier::Premium,
            brand_preference: Some("budget".into()),
            ..Submission::default()
        };
        store.save_submission(&submission).unwrap();

        let loaded = store.fetch("sub-1").unwrap();
        assert_eq!(loaded.medications, vec!["Warfarin", "Metformin"]);
        assert_eq!(loaded.hormones, vec!["Levothyroxine"]);
        assert_eq!(loaded.date_of_birth, submission.date_of_birth);
        assert_eq!(loaded.account_tier, AccountTier::Premium);
        assert_eq!(loaded.allergies, vec!["Shellfish"]);
    }

    #[test]
    fn test_save_submission_replaces_children() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut submission = Submission {
            id: "sub-1".into(),
            medications: vec!["Warfarin".into(), "Metformin".into()],
            ..Submission::default()
        };
        store.save_submission(&submission).unwrap();
        submission.medications = vec!["Sertraline".into()];
        store.save_submission(&submission).unwrap();

        assert_eq!(store.fetch("sub-1").unwrap().medications, vec!["Sertraline"]);
    }

    #[test]
    fn test_fetch_unknown_submission_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.fetch("missing"),
            Err(StackError::SubmissionNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_save_and_load_stack() {
        let store = SqliteStore::open_in_memory().unwrap();
        let receipt = store
            .save_stack(&record("sub-1"), &[item("Magnesium"), item("Zinc")])
            .unwrap();
        assert_eq!(receipt.items_inserted, 2);

        let loaded = store.load_stack("sub-1").unwrap().unwrap();
        assert_eq!(loaded.stack_id, receipt.stack_id);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[0], item("Magnesium"));
        assert_eq!(loaded.items[1].name, "Zinc");
        assert_eq!(loaded.record.safety_status, SafetyStatus::Safe);
        assert_eq!(loaded.record.usage.total_tokens, 30);
        assert!(loaded.record.validated);

        assert!(store.load_stack("other").unwrap().is_none());
    }

    #[test]
    fn test_regeneration_replaces_all_items_and_keeps_stack_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .save_stack(&record("sub-1"), &[item("Magnesium"), item("Zinc"), item("Iron")])
            .unwrap();

        let mut second_record = record("sub-1");
        second_record.safety_status = SafetyStatus::Warning;
        let second = store.save_stack(&second_record, &[item("Creatine")]).unwrap();

        assert_eq!(first.stack_id, second.stack_id);
        let loaded = store.load_stack("sub-1").unwrap().unwrap();
        let names: Vec<&str> = loaded.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Creatine"]);
        assert_eq!(loaded.record.safety_status, SafetyStatus::Warning);
        assert_eq!(loaded.record.generation_id, second_record.generation_id);
    }

    #[test]
    fn test_items_with_empty_normalized_name_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let receipt = store
            .save_stack(&record("sub-1"), &[item("***"), item("Zinc"), StackItem::new("  ")])
            .unwrap();
        assert_eq!(receipt.items_inserted, 1);

        let loaded = store.load_stack("sub-1").unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "Zinc");
    }

    #[test]
    fn test_open_creates_parent_directory_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("stacks.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_stack(&record("sub-1"), &[item("Zinc")]).unwrap();
        }
        assert!(path.exists());

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_stack("sub-1").unwrap().unwrap().items.len(), 1);
    }
}
