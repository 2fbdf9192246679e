//! Per-chromosome interval indexes.
//!
//! Filter stages that test variant positions against genomic regions build a
//! [`Lapper`] per chromosome up front and answer each lookup in logarithmic
//! time. A linear scan over the region table per variant would not scale to
//! genome-sized inputs.

use rust_lapper::{Interval, Lapper};
use std::collections::HashMap;

/// Interval index keyed by canonical chromosome name.
pub struct ChromIntervals<T: Eq + Clone + Send + Sync> {
    lappers: HashMap<String, Lapper<u64, T>>,
}

impl<T: Eq + Clone + Send + Sync> ChromIntervals<T> {
    /// Build an index from `(chrom, start, stop_exclusive, value)` tuples.
    /// Tuples with `stop <= start` are ignored.
    pub fn new(regions: impl IntoIterator<Item = (String, u64, u64, T)>) -> Self {
        let mut per_chrom: HashMap<String, Vec<Interval<u64, T>>> = HashMap::new();
        for (chrom, start, stop, val) in regions {
            if stop <= start {
                continue;
            }
            per_chrom
                .entry(chrom)
                .or_default()
                .push(Interval { start, stop, val });
        }
        let lappers = per_chrom
            .into_iter()
            .map(|(chrom, ivs)| (chrom, Lapper::new(ivs)))
            .collect();
        ChromIntervals { lappers }
    }

    /// Iterate over all intervals overlapping the single position `pos`.
    pub fn overlapping(&self, chrom: &str, pos: u64) -> impl Iterator<Item = &Interval<u64, T>> {
        self.lappers
            .get(chrom)
            .into_iter()
            .flat_map(move |lapper| lapper.find(pos, pos + 1))
    }

    /// Whether any interval on `chrom` covers `pos`.
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        self.overlapping(chrom, pos).next().is_some()
    }
}
