use std::cmp::Ordering;

/// Sums the present values, skipping nulls.
pub fn sum_present<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().sum()
}

/// Share of `part` in `total`, or 0.0 when the total is exactly zero.
pub fn safe_share(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total
    }
}

/// Arithmetic mean of the non-null values. Returns `None` when there is no data.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();

    if present.is_empty() {
        return None;
    }

    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Median of the non-null values. Even-sized inputs average the two middle values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();

    if present.is_empty() {
        return None;
    }

    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = present.len();
    if n % 2 == 1 {
        Some(present[n / 2])
    } else {
        Some((present[n / 2 - 1] + present[n / 2]) / 2.0)
    }
}

/// Total order for finite-or-infinite floats; NaN never reaches here.
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_present_skips_nulls() {
        assert_eq!(sum_present(vec![Some(1.0), None, Some(2.5)]), 3.5);
        assert_eq!(sum_present(Vec::<Option<f64>>::new()), 0.0);
    }

    #[test]
    fn test_safe_share_guards_zero_total() {
        assert_eq!(safe_share(5.0, 0.0), 0.0);
        assert_eq!(safe_share(0.0, 0.0), 0.0);
        assert_eq!(safe_share(25.0, 100.0), 0.25);
    }

    #[test]
    fn test_mean_and_median() {
        let values = vec![Some(300.0), Some(100.0), Some(200.0)];
        assert_eq!(mean(&values), Some(200.0));
        assert_eq!(median(&values), Some(200.0));

        let even = vec![Some(4.0), Some(1.0), None, Some(3.0), Some(2.0)];
        assert_eq!(median(&even), Some(2.5));
        assert_eq!(mean(&even), Some(2.5));
    }

    #[test]
    fn test_no_data_is_none() {
        assert_eq!(mean(&[None, None]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[Some(f64::NAN)]), None);
    }
}
