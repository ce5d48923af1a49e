//! Daily step store
//!
//! Append-only SQLite log of committed daily tallies. Records are never updated
//! or deleted and are read back in insertion order.

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, Row};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::{RecordId, StepRecord};

/// Date format used for stored records
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const CREATE_STEPS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS steps (id INTEGER PRIMARY KEY AUTOINCREMENT, steps INTEGER, date TEXT);";

/// Parse a `YYYY-MM-DD` record date, rejecting non-canonical spellings
pub fn parse_record_date(date: &str) -> Result<NaiveDate, StoreError> {
    let invalid = || StoreError::InvalidDate(date.to_string());
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid())?;
    // the parser accepts unpadded fields and signed years
    if parsed.format(DATE_FORMAT).to_string() != date {
        return Err(invalid());
    }
    Ok(parsed)
}

fn row_to_record(row: &Row) -> Result<StepRecord, StoreError> {
    let steps: Option<i64> = row.get(1)?;
    let steps = steps.unwrap_or(0);
    let step_count = u32::try_from(steps).map_err(|_| StoreError::InvalidCount(steps))?;
    let date: Option<String> = row.get(2)?;

    Ok(StepRecord {
        id: row.get(0)?,
        step_count,
        date: date.unwrap_or_default(),
    })
}

/// SQLite-backed store of committed daily step counts
pub struct DailyStepStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DailyStepStore {
    /// Open (or create) the store at `path`.
    ///
    /// Fails if the directory, file or `steps` table cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;

        log::info!("Step store opened at {}", path.display());
        Ok(store)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_STEPS_TABLE)?;
        Ok(())
    }

    /// Database file backing this store, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record for `date` (YYYY-MM-DD)
    pub fn append(&self, step_count: u32, date: &str) -> Result<RecordId, StoreError> {
        parse_record_date(date)?;

        self.conn.execute(
            "INSERT INTO steps (steps, date) VALUES (?1, ?2)",
            params![step_count, date],
        )?;
        let id = self.conn.last_insert_rowid();

        log::info!("Recorded {} steps for {} (record {})", step_count, date, id);
        Ok(id)
    }

    /// Append a record dated with today's local calendar date
    pub fn append_today(&self, step_count: u32) -> Result<RecordId, StoreError> {
        let today = Local::now().date_naive();
        self.append(step_count, &today.format(DATE_FORMAT).to_string())
    }

    /// All records in insertion order
    pub fn list_all(&self) -> Result<Vec<StepRecord>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, steps, date FROM steps")?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(row_to_record(row)?);
        }
        Ok(records)
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM steps", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_append_then_list() {
        let store = DailyStepStore::open_in_memory().unwrap();
        let id = store.append(5, "2024-01-01").unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(
            records,
            vec![StepRecord {
                id,
                step_count: 5,
                date: "2024-01-01".to_string(),
            }]
        );
    }

    #[test]
    fn test_insertion_order_kept_for_out_of_order_dates() {
        let store = DailyStepStore::open_in_memory().unwrap();
        store.append(300, "2024-03-02").unwrap();
        store.append(100, "2024-03-01").unwrap();
        store.append(300, "2024-03-02").unwrap();

        let records = store.list_all().unwrap();
        let dates: Vec<&str> = records.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-02", "2024-03-01", "2024-03-02"]);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let store = DailyStepStore::open_in_memory().unwrap();
        for date in ["01/02/2024", "2024-1-5", "+2024-01-01", "2024-02-30", ""] {
            let result = store.append(10, date);
            assert!(
                matches!(result, Err(StoreError::InvalidDate(_))),
                "{date:?} should be rejected"
            );
        }
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_parse_record_date() {
        assert_eq!(
            parse_record_date("2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_record_date("2024-1-05").is_err());
        assert!(parse_record_date(" 2024-01-05").is_err());
    }

    #[test]
    fn test_null_columns_read_as_defaults() {
        let store = DailyStepStore::open_in_memory().unwrap();
        store
            .conn
            .execute("INSERT INTO steps (steps, date) VALUES (NULL, NULL)", [])
            .unwrap();

        let records = store.list_all().unwrap();
        assert_eq!(records[0].step_count, 0);
        assert_eq!(records[0].date, "");
    }

    #[test]
    fn test_negative_stored_count_is_error() {
        let store = DailyStepStore::open_in_memory().unwrap();
        store
            .conn
            .execute("INSERT INTO steps (steps, date) VALUES (-4, '2024-01-01')", [])
            .unwrap();

        assert!(matches!(
            store.list_all(),
            Err(StoreError::InvalidCount(-4))
        ));
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("steps.db");

        {
            let store = DailyStepStore::open(&path).unwrap();
            store.append(1200, "2024-05-10").unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = DailyStepStore::open(&path).unwrap();
        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].step_count, 1200);
    }

    #[test]
    fn test_open_fails_on_unusable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let result = DailyStepStore::open(blocker.join("steps.db"));
        assert!(result.is_err());
    }

    #[test]
    fn test_append_today_uses_iso_date() {
        let store = DailyStepStore::open_in_memory().unwrap();
        store.append_today(42).unwrap();

        let records = store.list_all().unwrap();
        assert!(NaiveDate::parse_from_str(&records[0].date, DATE_FORMAT).is_ok());
        assert_eq!(records[0].step_count, 42);
    }
}
