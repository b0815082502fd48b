pub struct StatsHelper;

impl StatsHelper {
    /// Mean of the non-missing values, `None` when every value is missing.
    pub fn nanmean<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = values
            .into_iter()
            .filter(|value| !value.is_nan())
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    pub fn nanmax<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        values
            .into_iter()
            .filter(|value| !value.is_nan())
            .fold(None, |acc: Option<f64>, value| {
                Some(acc.map_or(value, |current| current.max(value)))
            })
    }

    pub fn nanmin<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        values
            .into_iter()
            .filter(|value| !value.is_nan())
            .fold(None, |acc: Option<f64>, value| {
                Some(acc.map_or(value, |current| current.min(value)))
            })
    }

    /// Median of the non-missing values; even-length inputs average the two
    /// middle values.
    pub fn median<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = values.into_iter().filter(|value| !value.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    /// Consecutive differences, `n - 1` values for `n` inputs.
    pub fn diff(values: &[f64]) -> Vec<f64> {
        values.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanmean_skips_missing_values() {
        assert_eq!(StatsHelper::nanmean(vec![1.0, f64::NAN, 3.0]), Some(2.0));
        assert_eq!(StatsHelper::nanmean(vec![f64::NAN]), None);
        assert_eq!(StatsHelper::nanmean(Vec::new()), None);
    }

    #[test]
    fn extrema_ignore_missing_values() {
        let values = vec![f64::NAN, -3.0, 7.5, 2.0];
        assert_eq!(StatsHelper::nanmax(values.clone()), Some(7.5));
        assert_eq!(StatsHelper::nanmin(values), Some(-3.0));
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(StatsHelper::median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(StatsHelper::median(Vec::new()), None);
    }

    #[test]
    fn diff_yields_pairwise_steps() {
        assert_eq!(StatsHelper::diff(&[1.0, 1.5, 3.0]), vec![0.5, 1.5]);
        assert!(StatsHelper::diff(&[1.0]).is_empty());
    }
}
