//! The candidate store: a narrow persistence layer over SQLite.
//!
//! One pipeline run owns a store exclusively. Stage tables are created
//! fresh, written once through batched transactions, and never mutated in
//! place afterwards (the single exception is the significance engine
//! populating the `fdr` column of its own result table). All SQL is rendered
//! from [`schema`] definitions with validated identifiers and bound
//! parameters.

pub mod records;
pub mod schema;

use crate::core::errors::{RedError, Result};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

use schema::{validate_identifier, IndexSpec, TableSchema};

/// Rows written per transaction during a bulk load. A crash loses at most
/// one uncommitted batch.
pub const BATCH_COMMIT_ROWS: usize = 5_000;

/// Row cadence for progress callbacks during large scans.
pub const PROGRESS_ROW_INTERVAL: u64 = 1_000;

/// A row type that knows its table layout.
pub trait Record: Sized {
    fn schema() -> TableSchema;
    fn to_values(&self) -> Vec<Value>;
    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: u64,
    /// Malformed rows skipped (logged, never fatal).
    pub skipped: u64,
}

/// Typed row filter rendered into a parameterized `WHERE` clause.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    Ge(String, Value),
    Le(String, Value),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.to_string(), value.into())
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Ne(column.to_string(), value.into())
    }

    pub fn ge(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Ge(column.to_string(), value.into())
    }

    pub fn le(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Le(column.to_string(), value.into())
    }

    fn sql(&self, params: &mut Vec<Value>) -> Result<String> {
        let binary = |col: &str, op: &str, val: &Value, params: &mut Vec<Value>| -> Result<String> {
            validate_identifier(col)?;
            params.push(val.clone());
            Ok(format!("\"{}\" {} ?", col, op))
        };
        match self {
            Predicate::Eq(col, val) => binary(col, "=", val, params),
            Predicate::Ne(col, val) => binary(col, "<>", val, params),
            Predicate::Ge(col, val) => binary(col, ">=", val, params),
            Predicate::Le(col, val) => binary(col, "<=", val, params),
            Predicate::And(preds) => {
                let mut parts = Vec::with_capacity(preds.len());
                for pred in preds {
                    parts.push(pred.sql(params)?);
                }
                Ok(format!("({})", parts.join(" AND ")))
            }
        }
    }
}

pub struct CandidateStore {
    conn: Connection,
}

impl CandidateStore {
    /// Open (or create) a file-backed store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        // PRAGMA settings are per-connection, so they are applied on every open.
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!("could not enable WAL journaling, running in {}", journal_mode);
        }
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;
        let store = CandidateStore { conn };
        store.ensure_meta_table()?;
        Ok(store)
    }

    /// Open an isolated in-memory store. Used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = CandidateStore { conn };
        store.ensure_meta_table()?;
        Ok(store)
    }

    fn ensure_meta_table(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stage_meta (
                 table_name TEXT PRIMARY KEY,
                 stage TEXT NOT NULL,
                 rows INTEGER NOT NULL,
                 params TEXT NOT NULL,
                 completed_at TEXT NOT NULL DEFAULT (datetime('now'))
             )",
        )?;
        Ok(())
    }

    /// Create `table` with the given shape. Idempotent when the table
    /// already exists with an identical shape; a shape mismatch is a schema
    /// error, reported before any write.
    pub fn create_table(
        &self,
        table: &str,
        schema: &TableSchema,
        index: Option<&IndexSpec>,
    ) -> Result<()> {
        let create = schema.create_sql(table)?;
        if let Some(existing) = self.table_columns(table)? {
            let wanted: Vec<String> = schema.column_names().map(|s| s.to_string()).collect();
            if existing != wanted {
                return Err(RedError::Schema(format!(
                    "table '{}' already exists with a different shape",
                    table
                )));
            }
            debug!("table '{}' already present with matching shape", table);
        } else {
            self.conn.execute(&create, [])?;
        }
        if let Some(idx) = index {
            self.conn.execute(&idx.create_sql(table)?, [])?;
        }
        Ok(())
    }

    /// Drop any previous incarnation of `table` (and its completion marker)
    /// and create it fresh. Stage outputs always start from this.
    pub fn recreate_table(
        &self,
        table: &str,
        schema: &TableSchema,
        index: Option<&IndexSpec>,
    ) -> Result<()> {
        // Render first so an invalid schema aborts before the drop.
        let create = schema.create_sql(table)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS \"{}\"", table), [])?;
        self.conn
            .execute("DELETE FROM stage_meta WHERE table_name = ?1", [table])?;
        self.conn.execute(&create, [])?;
        if let Some(idx) = index {
            self.conn.execute(&idx.create_sql(table)?, [])?;
        }
        Ok(())
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        validate_identifier(table)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS \"{}\"", table), [])?;
        self.conn
            .execute("DELETE FROM stage_meta WHERE table_name = ?1", [table])?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        validate_identifier(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(cols))
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        validate_identifier(table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM \"{}\"", table), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// A table is valid when it exists, holds at least one row, and any
    /// recorded completion marker agrees with its current row count. The
    /// orchestrator treats a valid, marker-matching table as an already
    /// finished stage.
    pub fn table_is_valid(&self, table: &str) -> Result<bool> {
        if !self.table_exists(table)? {
            return Ok(false);
        }
        let rows = self.row_count(table)?;
        if rows == 0 {
            return Ok(false);
        }
        let marker: Option<i64> = self
            .conn
            .query_row(
                "SELECT rows FROM stage_meta WHERE table_name = ?1",
                [table],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(marker.map_or(true, |recorded| recorded as u64 == rows))
    }

    /// Record that `stage` finished writing `table`. `params` captures the
    /// thresholds the stage ran with so a re-run with different settings is
    /// not skipped.
    pub fn record_completion(&self, stage: &str, table: &str, rows: u64, params: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO stage_meta (table_name, stage, rows, params, completed_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
            rusqlite::params![table, stage, rows as i64, params],
        )?;
        Ok(())
    }

    /// Whether `table` carries a completion marker matching both its row
    /// count and the given parameter fingerprint.
    pub fn completion_matches(&self, table: &str, params: &str) -> Result<bool> {
        let marker: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT rows, params FROM stage_meta WHERE table_name = ?1",
                [table],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match marker {
            Some((rows, recorded)) if recorded == params => {
                Ok(self.table_exists(table)? && self.row_count(table)? == rows as u64)
            }
            _ => Ok(false),
        }
    }

    /// Stream rows into `table`, committing every [`BATCH_COMMIT_ROWS`]
    /// rows. `observe` runs at each batch boundary with the running insert
    /// count; returning `false` cancels the load, keeping all committed
    /// batches.
    ///
    /// Malformed rows (parse errors from the source iterator) are logged,
    /// counted and skipped. Any other source error aborts the load.
    pub fn bulk_load<R, I>(
        &mut self,
        table: &str,
        rows: I,
        mut observe: impl FnMut(u64) -> bool,
    ) -> Result<LoadReport>
    where
        R: Record,
        I: IntoIterator<Item = Result<R>>,
    {
        let insert = R::schema().insert_sql(table)?;
        let mut report = LoadReport::default();
        let mut iter = rows.into_iter();
        let mut done = false;
        while !done {
            let tx = self
                .conn
                .transaction()
                .map_err(|e| RedError::Storage(format!("begin failed for '{}': {}", table, e)))?;
            {
                let mut stmt = tx.prepare_cached(&insert)?;
                let mut batch = 0usize;
                while batch < BATCH_COMMIT_ROWS {
                    match iter.next() {
                        Some(Ok(row)) => {
                            stmt.execute(params_from_iter(row.to_values())).map_err(
                                |e| RedError::Storage(format!("insert into '{}' failed: {}", table, e)),
                            )?;
                            report.inserted += 1;
                            batch += 1;
                        }
                        Some(Err(RedError::Parse(msg))) => {
                            warn!("skipping malformed row: {}", msg);
                            report.skipped += 1;
                        }
                        Some(Err(other)) => return Err(other),
                        None => {
                            done = true;
                            break;
                        }
                    }
                }
            }
            tx.commit()
                .map_err(|e| RedError::Storage(format!("commit failed for '{}': {}", table, e)))?;
            if !observe(report.inserted) {
                return Err(RedError::Cancelled);
            }
        }
        Ok(report)
    }

    fn select_sql<R: Record>(table: &str) -> Result<String> {
        let schema = R::schema();
        validate_identifier(table)?;
        let cols = schema
            .column_names()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("SELECT {} FROM \"{}\"", cols, table))
    }

    /// Materialize every row of `table`.
    pub fn scan<R: Record>(&self, table: &str) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(&Self::select_sql::<R>(table)?)?;
        let rows = stmt
            .query_map([], R::from_sql_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Stream rows of `table` through `f` without materializing the table.
    pub fn for_each<R: Record>(
        &self,
        table: &str,
        mut f: impl FnMut(R) -> Result<()>,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(&Self::select_sql::<R>(table)?)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            f(R::from_sql_row(row)?)?;
        }
        Ok(())
    }

    /// Rows of `table` matching a typed predicate.
    pub fn select_where<R: Record>(&self, table: &str, predicate: &Predicate) -> Result<Vec<R>> {
        let mut params: Vec<Value> = Vec::new();
        let clause = predicate.sql(&mut params)?;
        let sql = format!("{} WHERE {}", Self::select_sql::<R>(table)?, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), R::from_sql_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Inner join of two tables on `(chrom, pos)`; returns the distinct
    /// matching positions.
    pub fn join_positions(&self, left: &str, right: &str) -> Result<Vec<(String, u64)>> {
        validate_identifier(left)?;
        validate_identifier(right)?;
        let sql = format!(
            "SELECT DISTINCT l.\"chrom\", l.\"pos\" FROM \"{}\" l \
             INNER JOIN \"{}\" r ON l.\"chrom\" = r.\"chrom\" AND l.\"pos\" = r.\"pos\"",
            left, right
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Remove exact-duplicate rows from `table`. Overlapping reference
    /// windows can make a stage insert the same surviving record once per
    /// matching region; every stage deduplicates its output through this.
    pub fn distinct(&self, table: &str, index: Option<&IndexSpec>) -> Result<u64> {
        validate_identifier(table)?;
        let tmp = format!("{}__dedup", table);
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{tmp}\";
             CREATE TABLE \"{tmp}\" AS SELECT DISTINCT * FROM \"{table}\";
             DROP TABLE \"{table}\";
             ALTER TABLE \"{tmp}\" RENAME TO \"{table}\";"
        ))?;
        if let Some(idx) = index {
            self.conn.execute(&idx.create_sql(table)?, [])?;
        }
        self.row_count(table)
    }

    /// Delete rows matching a predicate. Returns the number removed.
    pub fn delete_where(&self, table: &str, predicate: &Predicate) -> Result<u64> {
        validate_identifier(table)?;
        let mut params: Vec<Value> = Vec::new();
        let clause = predicate.sql(&mut params)?;
        let deleted = self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE {}", table, clause),
            params_from_iter(params),
        )?;
        Ok(deleted as u64)
    }

    /// Set the `fdr` column for one `(chrom, pos)` row of an annotated table.
    pub fn update_fdr(&self, table: &str, chrom: &str, pos: u64, fdr: f64) -> Result<()> {
        validate_identifier(table)?;
        self.conn.execute(
            &format!(
                "UPDATE \"{}\" SET \"fdr\" = ?1 WHERE \"chrom\" = ?2 AND \"pos\" = ?3",
                table
            ),
            rusqlite::params![fdr, chrom, pos as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariantRecord;
    use schema::{variant_schema, ColumnType};

    fn variant(chrom: &str, pos: u64, qual: f64, ad: &str) -> VariantRecord {
        VariantRecord {
            chrom: chrom.to_string(),
            pos,
            id: ".".to_string(),
            ref_base: "A".to_string(),
            alt_base: "G".to_string(),
            qual,
            filter: "PASS".to_string(),
            info: ".".to_string(),
            gt: "0/1".to_string(),
            ad: ad.to_string(),
            dp: ".".to_string(),
            gq: ".".to_string(),
            pl: ".".to_string(),
        }
    }

    fn load(store: &mut CandidateStore, table: &str, rows: Vec<VariantRecord>) -> LoadReport {
        store
            .create_table(table, &variant_schema(), Some(&IndexSpec::chrom_pos()))
            .unwrap();
        store.bulk_load(table, rows.into_iter().map(Ok), |_| true).unwrap()
    }

    #[test]
    fn create_table_is_idempotent_for_same_shape() {
        let store = CandidateStore::in_memory().unwrap();
        store.create_table("calls", &variant_schema(), None).unwrap();
        store.create_table("calls", &variant_schema(), None).unwrap();
        let other = TableSchema::new().column("x", ColumnType::Text);
        assert!(matches!(
            store.create_table("calls", &other, None),
            Err(RedError::Schema(_))
        ));
    }

    #[test]
    fn empty_schema_fails_before_any_write() {
        let store = CandidateStore::in_memory().unwrap();
        assert!(matches!(
            store.create_table("calls", &TableSchema::new(), None),
            Err(RedError::Schema(_))
        ));
        assert!(!store.table_exists("calls").unwrap());
    }

    #[test]
    fn bulk_load_skips_malformed_rows() {
        let mut store = CandidateStore::in_memory().unwrap();
        store.create_table("calls", &variant_schema(), None).unwrap();
        let rows: Vec<crate::core::errors::Result<VariantRecord>> = vec![
            Ok(variant("chr1", 100, 25.0, "2/8")),
            Err(RedError::Parse("bad line 2".to_string())),
            Ok(variant("chr1", 200, 30.0, "3/7")),
        ];
        let report = store.bulk_load("calls", rows, |_| true).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.row_count("calls").unwrap(), 2);
    }

    #[test]
    fn cancelled_load_keeps_committed_rows() {
        let mut store = CandidateStore::in_memory().unwrap();
        store.create_table("calls", &variant_schema(), None).unwrap();
        let rows = (0..(BATCH_COMMIT_ROWS as u64 + 10))
            .map(|i| Ok(variant("chr1", i + 1, 25.0, "2/8")));
        let result = store.bulk_load("calls", rows, |inserted| inserted < BATCH_COMMIT_ROWS as u64);
        assert!(matches!(result, Err(RedError::Cancelled)));
        assert_eq!(store.row_count("calls").unwrap(), BATCH_COMMIT_ROWS as u64);
    }

    #[test]
    fn distinct_removes_exact_duplicates_only() {
        let mut store = CandidateStore::in_memory().unwrap();
        let dup = variant("chr1", 100, 25.0, "2/8");
        let mut near = dup.clone();
        near.qual = 26.0;
        load(&mut store, "calls", vec![dup.clone(), dup.clone(), near]);
        let rows = store
            .distinct("calls", Some(&IndexSpec::chrom_pos()))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn join_positions_matches_on_chrom_pos() {
        let mut store = CandidateStore::in_memory().unwrap();
        load(
            &mut store,
            "left_calls",
            vec![variant("chr1", 100, 25.0, "2/8"), variant("chr2", 100, 25.0, "2/8")],
        );
        load(
            &mut store,
            "right_calls",
            vec![variant("chr1", 100, 30.0, "5/5"), variant("chr1", 200, 30.0, "5/5")],
        );
        let joined = store.join_positions("left_calls", "right_calls").unwrap();
        assert_eq!(joined, vec![("chr1".to_string(), 100)]);
    }

    #[test]
    fn validity_tracks_completion_markers() {
        let mut store = CandidateStore::in_memory().unwrap();
        assert!(!store.table_is_valid("calls").unwrap());
        load(&mut store, "calls", vec![variant("chr1", 100, 25.0, "2/8")]);
        assert!(store.table_is_valid("calls").unwrap());

        store.record_completion("quality", "calls", 1, "q=20,d=6").unwrap();
        assert!(store.table_is_valid("calls").unwrap());
        assert!(store.completion_matches("calls", "q=20,d=6").unwrap());
        assert!(!store.completion_matches("calls", "q=30,d=6").unwrap());

        // A stale marker invalidates the table.
        store.record_completion("quality", "calls", 7, "q=20,d=6").unwrap();
        assert!(!store.table_is_valid("calls").unwrap());
    }

    #[test]
    fn select_where_applies_typed_predicates() {
        let mut store = CandidateStore::in_memory().unwrap();
        load(
            &mut store,
            "calls",
            vec![
                variant("chr1", 100, 25.0, "2/8"),
                variant("chr1", 200, 15.0, "2/8"),
                variant("chr2", 300, 40.0, "2/8"),
            ],
        );
        let rows: Vec<VariantRecord> = store
            .select_where(
                "calls",
                &Predicate::And(vec![
                    Predicate::ge("qual", 20.0),
                    Predicate::eq("chrom", "chr1".to_string()),
                ]),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pos, 100);
    }
}
