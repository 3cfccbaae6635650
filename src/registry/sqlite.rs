//! SQLite Unit Store
//!
//! Durable `UnitStore` over three tables: `units`, `digit_counts`, `near_misses`.
//! Uniqueness is enforced by the schema; leases and completion markers are single
//! conditional `UPDATE`s; each chunk insert runs in its own transaction.
//!
//! Values are stored as SQLite `INTEGER` (i64). Ranges and numbers above `i64::MAX`
//! are rejected rather than silently wrapped.

use super::store::{check_new_unit, UnitStore};
use super::types::*;
use crate::error::StoreError;

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS units (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    base           INTEGER NOT NULL,
    range_start    INTEGER NOT NULL UNIQUE,
    range_end      INTEGER NOT NULL UNIQUE,
    range_size     INTEGER NOT NULL,
    lease_holder   TEXT,
    lease_time     INTEGER,
    completed_by   TEXT,
    completed_time INTEGER,
    client_version TEXT
);
CREATE INDEX IF NOT EXISTS units_open_by_start
    ON units (range_start) WHERE completed_time IS NULL;
CREATE TABLE IF NOT EXISTS digit_counts (
    unit_id INTEGER NOT NULL REFERENCES units (id),
    key     INTEGER NOT NULL,
    count   INTEGER NOT NULL,
    UNIQUE (unit_id, key)
);
CREATE TABLE IF NOT EXISTS near_misses (
    unit_id      INTEGER NOT NULL REFERENCES units (id),
    number       INTEGER NOT NULL UNIQUE,
    key_at_match INTEGER NOT NULL
);
";

const UNIT_COLUMNS: &str = "id, base, range_start, range_end, range_size, lease_holder, \
     lease_time, completed_by, completed_time, client_version";

/// Lock wait inside SQLite; anything longer surfaces as `StoreError::Busy`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const ELIGIBLE: &str = "completed_time IS NULL AND (lease_time IS NULL OR lease_time < ?1)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like `open`, waiting at most `busy_timeout` on a locked database before
    /// reporting `StoreError::Busy` to the caller's retry policy.
    pub fn open_with_busy_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?, busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn with_connection(conn: Connection, busy_timeout: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

fn to_sql(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Backend(format!("{} {} exceeds the storable range", what, value)))
}

fn from_sql(value: i64) -> u64 {
    value.max(0) as u64
}

fn read_unit(row: &Row<'_>) -> rusqlite::Result<WorkUnit> {
    Ok(WorkUnit {
        id: UnitId(from_sql(row.get(0)?)),
        base: row.get(1)?,
        range_start: from_sql(row.get(2)?),
        range_end: from_sql(row.get(3)?),
        range_size: from_sql(row.get(4)?),
        lease_holder: row.get(5)?,
        lease_time: row.get::<_, Option<i64>>(6)?.map(from_sql),
        completed_by: row.get(7)?,
        completed_time: row.get::<_, Option<i64>>(8)?.map(from_sql),
        client_version: row.get(9)?,
    })
}

fn select_unit(conn: &Connection, id: UnitId) -> Result<Option<WorkUnit>, StoreError> {
    let sql = format!("SELECT {} FROM units WHERE id = ?1", UNIT_COLUMNS);
    let unit = conn
        .query_row(&sql, params![to_sql(id.0, "unit id")?], read_unit)
        .optional()?;
    Ok(unit)
}

impl UnitStore for SqliteStore {
    fn insert_unit(&self, unit: NewUnit) -> Result<UnitId, StoreError> {
        check_new_unit(&unit)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO units (base, range_start, range_end, range_size) VALUES (?1, ?2, ?3, ?4)",
            params![
                unit.base,
                to_sql(unit.range_start, "range_start")?,
                to_sql(unit.range_end, "range_end")?,
                to_sql(unit.effective_size(), "range_size")?,
            ],
        )?;
        Ok(UnitId(from_sql(conn.last_insert_rowid())))
    }

    fn get_unit(&self, id: UnitId) -> Result<Option<WorkUnit>, StoreError> {
        let conn = self.conn()?;
        select_unit(&conn, id)
    }

    fn earliest_eligible(&self, cutoff_ms: u64) -> Result<Option<UnitId>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT id FROM units WHERE {} ORDER BY range_start LIMIT 1",
            ELIGIBLE
        );
        let id: Option<i64> = conn
            .query_row(&sql, params![to_sql(cutoff_ms, "cutoff")?], |row| row.get(0))
            .optional()?;
        Ok(id.map(|id| UnitId(from_sql(id))))
    }

    fn pick_eligible(&self, cutoff_ms: u64, pick: u64) -> Result<Option<UnitId>, StoreError> {
        let conn = self.conn()?;
        let cutoff = to_sql(cutoff_ms, "cutoff")?;

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM units WHERE {}", ELIGIBLE),
            params![cutoff],
            |row| row.get(0),
        )?;
        if count <= 0 {
            return Ok(None);
        }

        let offset = (pick % count as u64) as i64;
        let sql = format!(
            "SELECT id FROM units WHERE {} ORDER BY range_start LIMIT 1 OFFSET ?2",
            ELIGIBLE
        );
        let id: Option<i64> = conn
            .query_row(&sql, params![cutoff, offset], |row| row.get(0))
            .optional()?;
        Ok(id.map(|id| UnitId(from_sql(id))))
    }

    fn try_lease(
        &self,
        id: UnitId,
        holder: &str,
        now_ms: u64,
        cutoff_ms: u64,
    ) -> Result<Option<WorkUnit>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE units SET lease_holder = ?2, lease_time = ?3 WHERE id = ?4 AND {}",
            ELIGIBLE
        );
        let changed = conn.execute(
            &sql,
            params![
                to_sql(cutoff_ms, "cutoff")?,
                holder,
                to_sql(now_ms, "lease_time")?,
                to_sql(id.0, "unit id")?,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        select_unit(&conn, id)
    }

    fn insert_digit_counts(&self, rows: &[DigitCount]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO digit_counts (unit_id, key, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT (unit_id, key) DO NOTHING",
            )?;
            let mut existing = tx.prepare_cached(
                "SELECT count FROM digit_counts WHERE unit_id = ?1 AND key = ?2",
            )?;
            for row in rows {
                let unit_id = to_sql(row.unit_id.0, "unit id")?;
                let count = to_sql(row.count, "count")?;
                if insert.execute(params![unit_id, row.key, count])? == 1 {
                    inserted += 1;
                    continue;
                }
                let stored: i64 = existing.query_row(params![unit_id, row.key], |r| r.get(0))?;
                if stored != count {
                    // Dropping `tx` rolls the chunk back.
                    return Err(StoreError::UniqueViolation(format!(
                        "digit count ({}, {}) already stored as {} (got {})",
                        row.unit_id, row.key, stored, row.count
                    )));
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn insert_near_misses(&self, rows: &[NearMiss]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO near_misses (unit_id, number, key_at_match) VALUES (?1, ?2, ?3)
                 ON CONFLICT (number) DO NOTHING",
            )?;
            let mut existing = tx.prepare_cached(
                "SELECT unit_id, key_at_match FROM near_misses WHERE number = ?1",
            )?;
            let mut owner_done = tx.prepare_cached(
                "SELECT completed_time IS NOT NULL FROM units WHERE id = ?1",
            )?;
            let mut take_over = tx.prepare_cached(
                "UPDATE near_misses SET unit_id = ?1, key_at_match = ?3 WHERE number = ?2",
            )?;
            for row in rows {
                let unit_id = to_sql(row.unit_id.0, "unit id")?;
                let number = to_sql(row.number, "number")?;
                if insert.execute(params![unit_id, number, row.key_at_match])? == 1 {
                    inserted += 1;
                    continue;
                }
                let (owner, key): (i64, u32) =
                    existing.query_row(params![number], |r| Ok((r.get(0)?, r.get(1)?)))?;
                if owner == unit_id && key == row.key_at_match {
                    continue;
                }
                let owner_completed: bool =
                    owner_done.query_row(params![owner], |r| r.get(0))?;
                if owner_completed {
                    return Err(StoreError::UniqueViolation(format!(
                        "near miss {} already reported by unit {}",
                        row.number, owner
                    )));
                }
                take_over.execute(params![unit_id, number, row.key_at_match])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn mark_completed(
        &self,
        id: UnitId,
        completed_by: &str,
        client_version: &str,
        completed_ms: u64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let unit_id = to_sql(id.0, "unit id")?;
        let changed = conn.execute(
            "UPDATE units SET completed_by = ?1, client_version = ?2, completed_time = ?3
             WHERE id = ?4 AND completed_time IS NULL",
            params![completed_by, client_version, to_sql(completed_ms, "completed_time")?, unit_id],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        if select_unit(&conn, id)?.is_none() {
            return Err(StoreError::Backend(format!("unit {} does not exist", id)));
        }
        Ok(false)
    }

    fn clear_pending_rows(&self, id: UnitId) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let unit_id = to_sql(id.0, "unit id")?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let completed: Option<bool> = tx
            .query_row(
                "SELECT completed_time IS NOT NULL FROM units WHERE id = ?1",
                params![unit_id],
                |row| row.get(0),
            )
            .optional()?;
        match completed {
            None => return Err(StoreError::Backend(format!("unit {} does not exist", id))),
            Some(true) => return Ok(false),
            Some(false) => {}
        }
        tx.execute("DELETE FROM digit_counts WHERE unit_id = ?1", params![unit_id])?;
        tx.execute("DELETE FROM near_misses WHERE unit_id = ?1", params![unit_id])?;
        tx.commit()?;
        Ok(true)
    }

    fn digit_counts(&self, id: UnitId) -> Result<Vec<DigitCount>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT key, count FROM digit_counts WHERE unit_id = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![to_sql(id.0, "unit id")?], |row| {
                Ok(DigitCount {
                    unit_id: id,
                    key: row.get(0)?,
                    count: from_sql(row.get(1)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn near_misses(&self, id: UnitId) -> Result<Vec<NearMiss>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT number, key_at_match FROM near_misses WHERE unit_id = ?1 ORDER BY number",
        )?;
        let rows = stmt
            .query_map(params![to_sql(id.0, "unit id")?], |row| {
                Ok(NearMiss {
                    unit_id: id,
                    number: from_sql(row.get(0)?),
                    key_at_match: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn progress(&self, cutoff_ms: u64) -> Result<Progress, StoreError> {
        let conn = self.conn()?;
        let (total, leased, completed): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(completed_time IS NULL AND lease_time IS NOT NULL AND lease_time >= ?1), 0),
                    COALESCE(SUM(completed_time IS NOT NULL), 0)
             FROM units",
            params![to_sql(cutoff_ms, "cutoff")?],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(Progress {
            total: from_sql(total),
            leased: from_sql(leased),
            completed: from_sql(completed),
        })
    }
}
