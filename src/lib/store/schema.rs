//! Table definitions as data.
//!
//! Stages describe their input/output tables with a [`TableSchema`] and the
//! store renders validated, quoted SQL from it. Values never appear in
//! generated SQL text; they always travel as bound parameters.

use crate::core::errors::{RedError, Result};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// Ordered column list for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new() -> Self {
        TableSchema::default()
    }

    pub fn column(mut self, name: &str, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Render `CREATE TABLE IF NOT EXISTS`. Fails with a schema error on an
    /// empty column list or any invalid identifier.
    pub fn create_sql(&self, table: &str) -> Result<String> {
        if self.is_empty() {
            return Err(RedError::Schema(format!(
                "table '{}' has an empty column list",
                table
            )));
        }
        validate_identifier(table)?;
        for col in &self.columns {
            validate_identifier(&col.name)?;
        }
        let cols = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.ty.sql()))
            .join(", ");
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            table, cols
        ))
    }

    /// Render a parameterized `INSERT` covering every column in order.
    pub fn insert_sql(&self, table: &str) -> Result<String> {
        if self.is_empty() {
            return Err(RedError::Schema(format!(
                "table '{}' has an empty column list",
                table
            )));
        }
        validate_identifier(table)?;
        let cols = self.columns.iter().map(|c| format!("\"{}\"", c.name)).join(", ");
        let marks = self.columns.iter().map(|_| "?").join(", ");
        Ok(format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table, cols, marks
        ))
    }
}

/// Secondary index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub columns: Vec<String>,
}

impl IndexSpec {
    pub fn on(columns: &[&str]) -> Self {
        IndexSpec {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// The index every variant and reference table carries: joins key on it.
    pub fn chrom_pos() -> Self {
        IndexSpec::on(&["chrom", "pos"])
    }

    pub fn create_sql(&self, table: &str) -> Result<String> {
        validate_identifier(table)?;
        for col in &self.columns {
            validate_identifier(col)?;
        }
        let cols = self.columns.iter().map(|c| format!("\"{}\"", c)).join(", ");
        Ok(format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{}_{}\" ON \"{}\" ({})",
            table,
            self.columns.iter().join("_"),
            table,
            cols
        ))
    }
}

/// Restrict identifiers to `[A-Za-z_][A-Za-z0-9_]*` so table and column
/// names supplied by callers can never smuggle SQL.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RedError::Schema(format!("invalid identifier '{}'", name)))
    }
}

/// The 13-column variant-call layout shared by every filter stage table.
pub fn variant_schema() -> TableSchema {
    TableSchema::new()
        .column("chrom", ColumnType::Text)
        .column("pos", ColumnType::Integer)
        .column("id", ColumnType::Text)
        .column("ref", ColumnType::Text)
        .column("alt", ColumnType::Text)
        .column("qual", ColumnType::Real)
        .column("filter", ColumnType::Text)
        .column("info", ColumnType::Text)
        .column("gt", ColumnType::Text)
        .column("ad", ColumnType::Text)
        .column("dp", ColumnType::Text)
        .column("gq", ColumnType::Text)
        .column("pl", ColumnType::Text)
}

/// Variant layout plus the columns the significance engine writes back.
pub fn annotated_schema() -> TableSchema {
    variant_schema()
        .column("level", ColumnType::Real)
        .column("pvalue", ColumnType::Real)
        .column("fdr", ColumnType::Real)
}

pub fn repeat_schema() -> TableSchema {
    TableSchema::new()
        .column("chrom", ColumnType::Text)
        .column("start", ColumnType::Integer)
        .column("end", ColumnType::Integer)
        .column("repeat_type", ColumnType::Text)
}

pub fn gene_schema() -> TableSchema {
    TableSchema::new()
        .column("chrom", ColumnType::Text)
        .column("tx_start", ColumnType::Integer)
        .column("tx_end", ColumnType::Integer)
        .column("cds_start", ColumnType::Integer)
        .column("cds_end", ColumnType::Integer)
        .column("feature_type", ColumnType::Text)
}

pub fn snp_schema() -> TableSchema {
    TableSchema::new()
        .column("chrom", ColumnType::Text)
        .column("pos", ColumnType::Integer)
}

pub fn editing_schema() -> TableSchema {
    TableSchema::new()
        .column("chrom", ColumnType::Text)
        .column("pos", ColumnType::Integer)
        .column("strand", ColumnType::Text)
        .column("ref", ColumnType::Text)
        .column("alt", ColumnType::Text)
        .column("origin", ColumnType::Text)
}
