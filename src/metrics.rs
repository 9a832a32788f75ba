//! Summary statistics over attempt-scoped samples.
//!
//! Both helpers are total: empty input never panics or divides by zero.
//! A median of nothing is absent, a mean of nothing is `0.0`.

/// Median of a sample set.
///
/// Samples are sorted ascending under `f64::total_cmp`. An even count yields the
/// mean of the two middle elements; an odd count yields the middle element.
/// Returns `None` for an empty slice.
#[must_use]
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Divide a total by a count, yielding `0.0` for an empty group.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total / count as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_median_even() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }

    #[test]
    fn test_median_unsorted_input() {
        assert_eq!(median(&[9.0, 1.0, 5.0]), Some(5.0));
        assert_eq!(median(&[40.0, 10.0, 100.0, 0.0]), Some(25.0));
    }

    #[test]
    fn test_median_is_numeric_not_lexicographic() {
        // "10" < "9" lexicographically; numerically 9 is the middle
        assert_eq!(median(&[10.0, 9.0, 1.0]), Some(9.0));
    }

    #[test]
    fn test_median_with_nan_is_order_independent() {
        let forward = median(&[f64::NAN, 3.0, 1.0, 2.0]).unwrap();
        let backward = median(&[2.0, 1.0, 3.0, f64::NAN]).unwrap();
        // NaN sorts above every number, leaving 2 and 3 in the middle
        assert_eq!(forward, 2.5);
        assert_eq!(backward, 2.5);
    }

    #[test]
    fn test_median_single() {
        assert_eq!(median(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_reverse_invariant() {
        let samples = [3.5, 100.0, 0.0, 60.0, 40.0, 10.0, 7.25];
        let mut reversed = samples;
        reversed.reverse();
        assert_eq!(median(&samples), median(&reversed));

        let even = [5.0, 1.0, 8.0, 2.0];
        let mut even_reversed = even;
        even_reversed.reverse();
        assert_eq!(median(&even), median(&even_reversed));
    }

    #[test]
    fn test_median_does_not_mutate_input() {
        let samples = vec![3.0, 1.0, 2.0];
        let _ = median(&samples);
        assert_eq!(samples, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(300.0, 3), 100.0);
        assert_eq!(average(1.0, 4), 0.25);
    }

    #[test]
    fn test_average_empty_group() {
        assert_eq!(average(0.0, 0), 0.0);
        assert_eq!(average(10.0, 0), 0.0);
    }
}
