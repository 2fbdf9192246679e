//! Statistical scoring: exact tests, FDR adjustment and the significance
//! engine that drives them over the surviving candidate set.

pub mod fdr;
pub mod fisher;
pub mod significance;

use crate::core::errors::{RedError, Result};
use rayon::prelude::*;

/// The two capabilities the significance engine needs from a statistics
/// implementation. Callers batch many contingency tables into a single
/// `exact_tests` call; a per-site round trip is the bottleneck this
/// interface exists to avoid.
pub trait StatisticsBackend: Send + Sync {
    /// Two-sided exact test p-value for the 2×2 table `[[a, b], [c, d]]`.
    fn exact_test(&self, a: u64, b: u64, c: u64, d: u64) -> Result<f64>;

    /// Batched form of [`exact_test`](Self::exact_test).
    fn exact_tests(&self, tables: &[[u64; 4]]) -> Result<Vec<f64>> {
        tables
            .iter()
            .map(|t| self.exact_test(t[0], t[1], t[2], t[3]))
            .collect()
    }

    /// Benjamini–Hochberg adjustment, returned in original input order.
    fn adjust_fdr(&self, p_values: &[f64]) -> Result<Vec<f64>>;
}

/// In-process backend: Fisher exact test + Benjamini–Hochberg.
#[derive(Debug, Default, Clone, Copy)]
pub struct FisherBackend;

impl StatisticsBackend for FisherBackend {
    fn exact_test(&self, a: u64, b: u64, c: u64, d: u64) -> Result<f64> {
        let p = fisher::fisher_exact_two_sided(a, b, c, d);
        if !(0.0..=1.0).contains(&p) || p.is_nan() {
            return Err(RedError::StatisticsBackend(format!(
                "exact test produced p={} for [[{},{}],[{},{}]]",
                p, a, b, c, d
            )));
        }
        Ok(p)
    }

    fn exact_tests(&self, tables: &[[u64; 4]]) -> Result<Vec<f64>> {
        tables
            .par_iter()
            .map(|t| self.exact_test(t[0], t[1], t[2], t[3]))
            .collect()
    }

    fn adjust_fdr(&self, p_values: &[f64]) -> Result<Vec<f64>> {
        if p_values.iter().any(|p| !(0.0..=1.0).contains(p) || p.is_nan()) {
            return Err(RedError::StatisticsBackend(
                "FDR adjustment received a p-value outside [0, 1]".to_string(),
            ));
        }
        Ok(fdr::benjamini_hochberg(p_values))
    }
}
