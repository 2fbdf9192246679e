//! [`Record`] implementations binding the model types to their table
//! layouts. Column order here must match the canonical schemas.

use super::schema::{
    annotated_schema, editing_schema, gene_schema, repeat_schema, snp_schema, variant_schema,
    TableSchema,
};
use super::Record;
use crate::model::{
    AnnotatedSite, GeneAnnotation, KnownEditingSite, KnownSnp, RepeatRegion, VariantRecord,
};
use rusqlite::types::Value;

impl Record for VariantRecord {
    fn schema() -> TableSchema {
        variant_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.chrom.clone()),
            Value::from(self.pos as i64),
            Value::from(self.id.clone()),
            Value::from(self.ref_base.clone()),
            Value::from(self.alt_base.clone()),
            Value::from(self.qual),
            Value::from(self.filter.clone()),
            Value::from(self.info.clone()),
            Value::from(self.gt.clone()),
            Value::from(self.ad.clone()),
            Value::from(self.dp.clone()),
            Value::from(self.gq.clone()),
            Value::from(self.pl.clone()),
        ]
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(VariantRecord {
            chrom: row.get(0)?,
            pos: row.get::<_, i64>(1)? as u64,
            id: row.get(2)?,
            ref_base: row.get(3)?,
            alt_base: row.get(4)?,
            qual: row.get(5)?,
            filter: row.get(6)?,
            info: row.get(7)?,
            gt: row.get(8)?,
            ad: row.get(9)?,
            dp: row.get(10)?,
            gq: row.get(11)?,
            pl: row.get(12)?,
        })
    }
}

impl Record for AnnotatedSite {
    fn schema() -> TableSchema {
        annotated_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        let mut values = self.variant.to_values();
        values.push(Value::from(self.level));
        values.push(Value::from(self.pvalue));
        values.push(match self.fdr {
            Some(fdr) => Value::from(fdr),
            None => Value::Null,
        });
        values
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(AnnotatedSite {
            variant: VariantRecord::from_sql_row(row)?,
            level: row.get(13)?,
            pvalue: row.get(14)?,
            fdr: row.get::<_, Option<f64>>(15)?,
        })
    }
}

impl Record for RepeatRegion {
    fn schema() -> TableSchema {
        repeat_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.chrom.clone()),
            Value::from(self.start as i64),
            Value::from(self.end as i64),
            Value::from(self.repeat_type.clone()),
        ]
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RepeatRegion {
            chrom: row.get(0)?,
            start: row.get::<_, i64>(1)? as u64,
            end: row.get::<_, i64>(2)? as u64,
            repeat_type: row.get(3)?,
        })
    }
}

impl Record for GeneAnnotation {
    fn schema() -> TableSchema {
        gene_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.chrom.clone()),
            Value::from(self.tx_start as i64),
            Value::from(self.tx_end as i64),
            Value::from(self.cds_start as i64),
            Value::from(self.cds_end as i64),
            Value::from(self.feature_type.clone()),
        ]
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(GeneAnnotation {
            chrom: row.get(0)?,
            tx_start: row.get::<_, i64>(1)? as u64,
            tx_end: row.get::<_, i64>(2)? as u64,
            cds_start: row.get::<_, i64>(3)? as u64,
            cds_end: row.get::<_, i64>(4)? as u64,
            feature_type: row.get(5)?,
        })
    }
}

impl Record for KnownSnp {
    fn schema() -> TableSchema {
        snp_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::from(self.chrom.clone()), Value::from(self.pos as i64)]
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(KnownSnp {
            chrom: row.get(0)?,
            pos: row.get::<_, i64>(1)? as u64,
        })
    }
}

impl Record for KnownEditingSite {
    fn schema() -> TableSchema {
        editing_schema()
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.chrom.clone()),
            Value::from(self.pos as i64),
            Value::from(self.strand.clone()),
            Value::from(self.ref_base.clone()),
            Value::from(self.alt_base.clone()),
            Value::from(self.origin.clone()),
        ]
    }

    fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(KnownEditingSite {
            chrom: row.get(0)?,
            pos: row.get::<_, i64>(1)? as u64,
            strand: row.get(2)?,
            ref_base: row.get(3)?,
            alt_base: row.get(4)?,
            origin: row.get(5)?,
        })
    }
}
