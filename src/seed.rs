//! Grouped-Average Seeder.
//!
//! The method-of-averages leaf: sort samples by X, split into contiguous
//! groups, and return per-group means. The estimator uses the group means as
//! anchor points for its initial parameter guess.

use std::collections::HashMap;

use ndarray::Array1;

/// Per-group arithmetic means of `vals_x` and `vals_y` after co-sorting by
/// `vals_x` and splitting into `num_groups` contiguous groups.
///
/// Groups are as even as possible: when N is not divisible by `num_groups`,
/// the first `N mod num_groups` groups hold one extra sample. Group order
/// follows ascending X, so group 0 averages the smallest X's. The sort is
/// stable, which keeps X/Y pairing correct when X carries ties.
///
/// # Panics
///
/// Panics if the arrays differ in length or `num_groups` is outside
/// `[1, N]`; these are programming errors, not recoverable conditions.
pub fn base_values_avg(
    sym_x: &str,
    sym_y: &str,
    vals_x: &Array1<f64>,
    vals_y: &Array1<f64>,
    num_groups: usize,
) -> HashMap<String, Array1<f64>> {
    grouped_averages(&[(sym_x, vals_x), (sym_y, vals_y)], num_groups)
}

/// Multi-column generalization used by the estimator: co-sort every column
/// by the first one and average each at identical group boundaries.
pub(crate) fn grouped_averages(
    columns: &[(&str, &Array1<f64>)],
    num_groups: usize,
) -> HashMap<String, Array1<f64>> {
    assert!(!columns.is_empty(), "at least one column is required");
    let n = columns[0].1.len();
    for (name, column) in columns {
        assert_eq!(
            column.len(),
            n,
            "sample arrays must have equal length (column '{}')",
            name
        );
    }
    assert!(
        (1..=n).contains(&num_groups),
        "num_groups must be in [1, {}], got {}",
        n,
        num_groups
    );

    // Stable argsort by the first column; applying the same permutation to
    // every column preserves sample pairing.
    let sort_key = columns[0].1;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| sort_key[a].total_cmp(&sort_key[b]));

    let base = n / num_groups;
    let extra = n % num_groups;

    let mut result = HashMap::with_capacity(columns.len());
    for (name, column) in columns {
        let mut means = Array1::zeros(num_groups);
        let mut start = 0;
        for group in 0..num_groups {
            let size = base + usize::from(group < extra);
            let sum: f64 = order[start..start + size].iter().map(|&i| column[i]).sum();
            means[group] = sum / size as f64;
            start += size;
        }
        result.insert(name.to_string(), means);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_single_group_is_global_mean() {
        let x = array![3.0, 1.0, 2.0];
        let y = array![30.0, 10.0, 20.0];
        let means = base_values_avg("x", "y", &x, &y, 1);
        assert_relative_eq!(means["x"][0], 2.0);
        assert_relative_eq!(means["y"][0], 20.0);
    }

    #[test]
    fn test_co_sorting_preserves_pairing() {
        let x = array![3.0, 1.0, 2.0];
        let y = array![30.0, 10.0, 20.0];
        let means = base_values_avg("x", "y", &x, &y, 3);
        // Sorted pairs: (1,10), (2,20), (3,30)
        assert_eq!(means["x"], array![1.0, 2.0, 3.0]);
        assert_eq!(means["y"], array![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_uneven_split_sizes() {
        // N = 10, groups = 3: sizes 4, 3, 3 (first groups take the extra)
        let x = Array1::from_iter((0..10).map(|i| i as f64));
        let y = x.mapv(|v| 2.0 * v);
        let means = base_values_avg("x", "y", &x, &y, 3);
        assert_relative_eq!(means["x"][0], (0.0 + 1.0 + 2.0 + 3.0) / 4.0);
        assert_relative_eq!(means["x"][1], (4.0 + 5.0 + 6.0) / 3.0);
        assert_relative_eq!(means["x"][2], (7.0 + 8.0 + 9.0) / 3.0);
        assert_relative_eq!(means["y"][2], 16.0);
    }

    #[test]
    fn test_group_means_non_decreasing() {
        let x = array![5.0, 3.0, 9.0, 1.0, 7.0, 2.0, 8.0, 4.0];
        let y = x.mapv(|v| -v);
        let means = base_values_avg("x", "y", &x, &y, 4);
        for g in 1..4 {
            assert!(means["x"][g] >= means["x"][g - 1]);
        }
    }

    #[test]
    fn test_ties_keep_pair_alignment() {
        // Equal X's must not scramble their Y partners.
        let x = array![1.0, 1.0, 0.0];
        let y = array![10.0, 20.0, 30.0];
        let means = base_values_avg("x", "y", &x, &y, 3);
        assert_eq!(means["y"], array![30.0, 10.0, 20.0]);
    }

    #[test]
    fn test_idempotence() {
        let x = array![5.0, 3.0, 9.0, 1.0];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let first = base_values_avg("x", "y", &x, &y, 2);
        let second = base_values_avg("x", "y", &x, &y, 2);
        assert_eq!(first["x"], second["x"]);
        assert_eq!(first["y"], second["y"]);
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn test_length_mismatch_panics() {
        let x = array![1.0, 2.0];
        let y = array![1.0];
        base_values_avg("x", "y", &x, &y, 1);
    }

    #[test]
    #[should_panic(expected = "num_groups")]
    fn test_num_groups_out_of_range_panics() {
        let x = array![1.0, 2.0];
        let y = array![1.0, 2.0];
        base_values_avg("x", "y", &x, &y, 3);
    }
}
