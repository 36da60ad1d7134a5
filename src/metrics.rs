//! Metric primitives shared by every analytics module.
//!
//! All of them are total: empty inputs and zero denominators produce a
//! defined value instead of NaN.

/// Percentage `numerator / denominator`, rounded to a whole number.
/// A zero denominator yields `default`.
pub fn rate(numerator: usize, denominator: usize, default: f64) -> f64 {
    if denominator == 0 {
        return default;
    }
    (numerator as f64 / denominator as f64 * 100.0).round()
}

/// Arithmetic mean; 0 for an empty slice.
pub fn average(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Mean of the most recent samples (up to 5) minus the mean of the earliest
/// half (rounded up). Positive means improving.
pub fn trend_delta(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }
    let early = &samples[..n.div_ceil(2)];
    let recent = &samples[n - n.min(5)..];
    average(recent) - average(early)
}

/// Share of `population` at or below `value`, 0..=100. Empty population is 0.
pub fn percentile_rank(value: f64, population: &[f64]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let at_or_below = population.iter().filter(|p| **p <= value).count();
    (at_or_below as f64 / population.len() as f64 * 100.0).round()
}

pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (x * factor).round() / factor
}

/// `marks` as a percentage of `total`; a non-positive total counts as 100.
pub fn percent_of(marks: f64, total: f64) -> f64 {
    let total = if total > 0.0 { total } else { 100.0 };
    marks / total * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_uses_default_for_zero_denominator() {
        assert_eq!(rate(0, 0, 50.0), 50.0);
        assert_eq!(rate(9, 10, 0.0), 90.0);
        assert_eq!(rate(1, 3, 0.0), 33.0);
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[90.0, 85.0, 92.0]), 89.0);
    }

    #[test]
    fn trend_compares_recent_to_early_half() {
        assert_eq!(trend_delta(&[]), 0.0);
        assert_eq!(trend_delta(&[70.0]), 0.0);
        // early = [50, 60], recent = all four
        assert_eq!(trend_delta(&[50.0, 60.0, 70.0, 80.0]), 10.0);
        // early = first 4, recent = last 5
        let samples = [10.0, 10.0, 10.0, 10.0, 60.0, 60.0, 60.0];
        assert_eq!(round_to(trend_delta(&samples), 2), 30.0);
    }

    #[test]
    fn percentile_rank_is_inclusive_and_bounded() {
        assert_eq!(percentile_rank(50.0, &[]), 0.0);
        assert_eq!(percentile_rank(50.0, &[40.0, 50.0, 60.0, 70.0]), 50.0);
        assert_eq!(percentile_rank(100.0, &[40.0, 50.0]), 100.0);
        assert_eq!(percentile_rank(0.0, &[40.0, 50.0]), 0.0);
    }

    #[test]
    fn percent_of_treats_missing_total_as_hundred() {
        assert_eq!(percent_of(40.0, 0.0), 40.0);
        assert_eq!(percent_of(10.0, 20.0), 50.0);
    }
}
