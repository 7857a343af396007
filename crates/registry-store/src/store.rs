//! SQLite-backed registry store.

use crate::error::StoreError;
use crate::types::*;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Single-row table holding the next member number.
const COUNTER_TABLE: &str = "AkCount";

/// Default busy timeout for the SQLite connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Durable registry of applicants across all cohorts plus the member counter.
///
/// Owns a single SQLite connection. Every access goes through the connection
/// mutex, and writes additionally run inside an `IMMEDIATE` transaction via
/// [`RegistryStore::with_transaction`].
pub struct RegistryStore {
    conn: Mutex<Connection>,
}

impl RegistryStore {
    /// Open (or create) the registry database at `path` and initialize its schema.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        initialize_schema(&mut conn)?;

        info!("Registry store opened at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory registry.
    pub fn in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        initialize_schema(&mut conn)?;

        debug!("In-memory registry store initialized");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Re-run schema initialization. Safe to call any number of times.
    pub fn initialize_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        initialize_schema(&mut conn)
    }

    /// Find the record registered under identifier A, searching every cohort.
    ///
    /// Cohorts are searched in [`Cohort::ALL`] order and the first hit wins.
    /// Multiple hits are logged as a data-integrity warning.
    #[instrument(skip(self))]
    pub fn find_by_identifier(&self, identifier: &str) -> Result<Option<ApplicantRecord>, StoreError> {
        let mut matches = self.find_matches(identifier)?;

        if matches.len() > 1 {
            let cohorts: Vec<Cohort> = matches.iter().map(|m| m.cohort).collect();
            warn!(
                identifier,
                ?cohorts,
                "Identifier registered more than once, using highest-precedence match"
            );
        }

        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0).record)
        })
    }

    /// All records registered under identifier A, in precedence order.
    pub fn find_matches(&self, identifier: &str) -> Result<Vec<CohortMatch>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut stmt = conn.prepare_cached(&union_lookup_sql())?;
        let rows = stmt.query_map(params![identifier], |row| {
            Ok((
                row.get::<_, i64>(4)?,
                ApplicantRecord {
                    display_name: row.get(0)?,
                    identifier_a: row.get(1)?,
                    identifier_b: row.get(2)?,
                    member_number: row.get(3)?,
                },
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (rank, record) = row?;
            if let Some(cohort) = Cohort::from_rank(rank) {
                matches.push(CohortMatch { cohort, record });
            }
        }

        Ok(matches)
    }

    /// Number of records in the writable cohort.
    pub fn member_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", Cohort::Current.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Run `f` as one serialized, isolated unit.
    ///
    /// Holds the connection mutex for the whole call and wraps it in an
    /// `IMMEDIATE` transaction. Commits if `f` returns `Ok`, rolls back otherwise.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTransaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let scope = StoreTransaction { tx };

        let value = f(&scope)?;

        scope.tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Close the underlying connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| StoreError::from(e))?;
        info!("Registry store closed");
        Ok(())
    }
}

/// Writer-side view of the store inside [`RegistryStore::with_transaction`].
///
/// The member counter is only reachable from here.
pub struct StoreTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTransaction<'_> {
    /// Current counter value, the next member number to assign.
    pub fn read_counter(&self) -> Result<MemberNumber, StoreError> {
        self.tx
            .query_row(
                &format!("SELECT UIDCount FROM {} LIMIT 1", COUNTER_TABLE),
                [],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::MissingCounter)
    }

    /// Overwrite the counter value.
    pub fn write_counter(&self, value: MemberNumber) -> Result<(), StoreError> {
        let updated = self.tx.execute(
            &format!("UPDATE {} SET UIDCount = ?1", COUNTER_TABLE),
            params![value],
        )?;

        if updated == 0 {
            return Err(StoreError::MissingCounter);
        }
        Ok(())
    }

    /// Whether the writable cohort already holds `identifier_a` or `identifier_b`.
    pub fn exists_by_either_identifier(
        &self,
        identifier_a: &str,
        identifier_b: &str,
    ) -> Result<bool, StoreError> {
        let found = self
            .tx
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE QQ = ?1 OR bili = ?2 LIMIT 1",
                    Cohort::Current.table()
                ),
                params![identifier_a, identifier_b],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Append a record to the writable cohort.
    pub fn insert(&self, record: &ApplicantRecord) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "INSERT INTO {} (nickname, QQ, bili, MemberID) VALUES (?1, ?2, ?3, ?4)",
                Cohort::Current.table()
            ),
            params![
                record.display_name,
                record.identifier_a,
                record.identifier_b,
                record.member_number
            ],
        )?;
        Ok(())
    }
}

/// Create the cohort tables and seed the counter if absent.
fn initialize_schema(conn: &mut Connection) -> Result<(), StoreError> {
    let schema_err = |e: rusqlite::Error| StoreError::Schema(e.to_string());

    let tx = conn.transaction().map_err(schema_err)?;

    for cohort in Cohort::ALL {
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                nickname TEXT NOT NULL,
                QQ TEXT NOT NULL,
                bili TEXT NOT NULL,
                MemberID INTEGER PRIMARY KEY AUTOINCREMENT
            );",
            cohort.table()
        ))
        .map_err(schema_err)?;
    }

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (UIDCount INTEGER PRIMARY KEY);",
        COUNTER_TABLE
    ))
    .map_err(schema_err)?;

    let rows: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {}", COUNTER_TABLE), [], |row| {
            row.get(0)
        })
        .map_err(schema_err)?;

    if rows == 0 {
        tx.execute(&format!("INSERT INTO {} (UIDCount) VALUES (0)", COUNTER_TABLE), [])
            .map_err(schema_err)?;
        info!("Seeded member counter at 0");
    }

    let counter: i64 = tx
        .query_row(&format!("SELECT UIDCount FROM {} LIMIT 1", COUNTER_TABLE), [], |row| {
            row.get(0)
        })
        .map_err(schema_err)?;
    let highest: Option<i64> = tx
        .query_row(
            &format!("SELECT MAX(MemberID) FROM {}", Cohort::Current.table()),
            [],
            |row| row.get(0),
        )
        .map_err(schema_err)?;

    if let Some(highest) = highest.filter(|h| counter <= *h) {
        warn!(
            counter,
            highest_member_number = highest,
            "Member counter is behind the writable cohort, signups will conflict"
        );
    }

    tx.commit().map_err(schema_err)?;
    debug!(counter, "Registry schema ready");
    Ok(())
}

/// Union of all cohorts on identifier A, ordered by cohort precedence.
fn union_lookup_sql() -> String {
    let selects: Vec<String> = Cohort::ALL
        .iter()
        .map(|c| {
            format!(
                "SELECT nickname, QQ, bili, MemberID, {} AS cohort_rank FROM {} WHERE QQ = ?1",
                c.rank(),
                c.table()
            )
        })
        .collect();

    format!("{} ORDER BY cohort_rank, MemberID", selects.join(" UNION ALL "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &RegistryStore, cohort: Cohort, record: &ApplicantRecord) {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (nickname, QQ, bili, MemberID) VALUES (?1, ?2, ?3, ?4)",
                cohort.table()
            ),
            params![
                record.display_name,
                record.identifier_a,
                record.identifier_b,
                record.member_number
            ],
        )
        .unwrap();
    }

    fn counter(store: &RegistryStore) -> MemberNumber {
        store
            .with_transaction(|tx| tx.read_counter())
            .unwrap()
    }

    #[test]
    fn test_fresh_store_counter_starts_at_zero() {
        let store = RegistryStore::in_memory().unwrap();
        assert_eq!(counter(&store), 0);
        assert_eq!(store.member_count().unwrap(), 0);
    }

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let store = RegistryStore::in_memory().unwrap();
        store
            .with_transaction(|tx| tx.write_counter(7))
            .unwrap();

        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();

        assert_eq!(counter(&store), 7);
    }

    #[test]
    fn test_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("members.db");

        let store = RegistryStore::open(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        store
            .with_transaction(|tx| {
                tx.insert(&ApplicantRecord::new("Alice", "qq1", "bili1", 0))?;
                tx.write_counter(1)
            })
            .unwrap();
        store.close().unwrap();

        let store = RegistryStore::open(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        assert_eq!(counter(&store), 1);
        assert_eq!(store.member_count().unwrap(), 1);
        assert_eq!(
            store.find_by_identifier("qq1").unwrap().unwrap().display_name,
            "Alice"
        );
    }

    #[test]
    fn test_exists_by_either_identifier() {
        let store = RegistryStore::in_memory().unwrap();
        store
            .with_transaction(|tx| tx.insert(&ApplicantRecord::new("Alice", "qq1", "bili1", 0)))
            .unwrap();

        store
            .with_transaction(|tx| {
                assert!(tx.exists_by_either_identifier("qq1", "new")?);
                assert!(tx.exists_by_either_identifier("new", "bili1")?);
                assert!(!tx.exists_by_either_identifier("new", "other")?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_exists_ignores_legacy_cohorts() {
        let store = RegistryStore::in_memory().unwrap();
        seed(&store, Cohort::LegacyA, &ApplicantRecord::new("Old", "qq1", "bili1", 3));

        let exists = store
            .with_transaction(|tx| tx.exists_by_either_identifier("qq1", "bili1"))
            .unwrap();
        assert!(!exists);
    }

    #[test]
    fn test_find_searches_legacy_cohorts() {
        let store = RegistryStore::in_memory().unwrap();
        seed(&store, Cohort::LegacyB, &ApplicantRecord::new("Archived", "qq9", "bili9", 42));

        let record = store.find_by_identifier("qq9").unwrap().unwrap();
        assert_eq!(record.display_name, "Archived");
        assert_eq!(record.member_number, 42);

        assert!(store.find_by_identifier("missing").unwrap().is_none());
    }

    #[test]
    fn test_find_matches_on_identifier_a_only() {
        let store = RegistryStore::in_memory().unwrap();
        seed(&store, Cohort::Current, &ApplicantRecord::new("Alice", "qq1", "bili1", 0));

        assert!(store.find_by_identifier("bili1").unwrap().is_none());
    }

    #[test]
    fn test_find_precedence_current_first() {
        let store = RegistryStore::in_memory().unwrap();
        seed(&store, Cohort::LegacyB, &ApplicantRecord::new("B", "qq1", "x", 1));
        seed(&store, Cohort::LegacyA, &ApplicantRecord::new("A", "qq1", "y", 2));
        seed(&store, Cohort::Current, &ApplicantRecord::new("Now", "qq1", "z", 3));

        let matches = store.find_matches("qq1").unwrap();
        let cohorts: Vec<Cohort> = matches.iter().map(|m| m.cohort).collect();
        assert_eq!(cohorts, Cohort::ALL.to_vec());

        let record = store.find_by_identifier("qq1").unwrap().unwrap();
        assert_eq!(record.display_name, "Now");
    }

    #[test]
    fn test_find_precedence_legacy_order() {
        let store = RegistryStore::in_memory().unwrap();
        seed(&store, Cohort::LegacyB, &ApplicantRecord::new("B", "qq1", "x", 1));
        seed(&store, Cohort::LegacyA, &ApplicantRecord::new("A", "qq1", "y", 2));

        let record = store.find_by_identifier("qq1").unwrap().unwrap();
        assert_eq!(record.display_name, "A");
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = RegistryStore::in_memory().unwrap();

        let result: Result<(), StoreError> = store.with_transaction(|tx| {
            tx.insert(&ApplicantRecord::new("Alice", "qq1", "bili1", 0))?;
            tx.write_counter(1)?;
            Err(StoreError::MissingCounter)
        });
        assert!(result.is_err());

        assert_eq!(counter(&store), 0);
        assert_eq!(store.member_count().unwrap(), 0);
    }

    #[test]
    fn test_insert_rejects_duplicate_member_number() {
        let store = RegistryStore::in_memory().unwrap();
        store
            .with_transaction(|tx| tx.insert(&ApplicantRecord::new("Alice", "qq1", "bili1", 0)))
            .unwrap();

        let result = store
            .with_transaction(|tx| tx.insert(&ApplicantRecord::new("Bob", "qq2", "bili2", 0)));
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_cohort_tables() {
        assert_eq!(Cohort::Current.table(), "Akmembers");
        assert_eq!(Cohort::LegacyA.table(), "another");
        assert_eq!(Cohort::LegacyB.table(), "rgmembers");
    }
}
