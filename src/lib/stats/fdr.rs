//! Benjamini–Hochberg false-discovery-rate adjustment.

/// Adjust a p-value collection with the Benjamini–Hochberg procedure,
/// returning q-values in the same order as the input
/// (R `p.adjust(method = "fdr")` semantics).
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return vec![];
    }

    let mut indexed: Vec<(usize, f64)> = p_values.iter().copied().enumerate().collect();
    // total_cmp gives NaN a total order (sorted last) instead of panicking.
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut q_values = vec![0.0; n];
    let n_f64 = n as f64;

    // Walk from the largest rank down, carrying the running minimum.
    let mut cummin = f64::INFINITY;
    for i in (0..n).rev() {
        let (orig_idx, p) = indexed[i];
        let rank = (i + 1) as f64;
        let adjusted = (p * n_f64 / rank).min(1.0);
        cummin = cummin.min(adjusted);
        q_values[orig_idx] = cummin;
    }

    q_values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matches_r_p_adjust() {
        // p.adjust(c(0.01, 0.04, 0.03, 0.5, 0.9), method = "fdr")
        let q = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.5, 0.9]);
        let expected = [0.05, 0.0666666667, 0.0666666667, 0.625, 0.9];
        for (got, want) in q.iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn q_values_never_drop_below_p() {
        let p = [0.001, 0.02, 0.05, 0.2, 0.7];
        for (p, q) in p.iter().zip(benjamini_hochberg(&p).iter()) {
            assert!(q >= p);
            assert!(*q <= 1.0);
        }
    }

    #[test]
    fn monotonic_over_sorted_input() {
        let mut p = vec![0.2, 0.004, 0.8, 0.03, 0.0001, 0.55];
        p.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let q = benjamini_hochberg(&p);
        for pair in q.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn preserves_input_order() {
        let p = [0.5, 0.001, 0.05];
        let q = benjamini_hochberg(&p);
        assert!(q[1] < q[2]);
        assert!(q[2] < q[0]);
    }

    #[test]
    fn empty_input() {
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn nan_input_does_not_panic() {
        let q = benjamini_hochberg(&[0.5, f64::NAN, 0.1]);
        assert_eq!(q.len(), 3);
        // The NaN ranks last; the finite entries still adjust normally.
        assert!(q[0].is_finite());
        assert!(q[2].is_finite());
        assert!(q[2] <= q[0]);
    }
}
