//! Summary statistics over measured run durations.

use serde::Serialize;

/// Accumulates run durations in milliseconds.
///
/// Only the multiset of samples matters; insertion order does not affect any statistic. With no
/// samples, every statistic is `None`.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    samples: Vec<f64>,
}

impl Statistics {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a duration sample in milliseconds.
    pub fn add_sample(&mut self, duration_millis: f64) {
        self.samples.push(duration_millis);
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples were added.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples in insertion order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// The smallest sample.
    pub fn min(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::min)
    }

    /// The largest sample.
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// The arithmetic mean of all samples.
    pub fn mean(&self) -> Option<f64> {
        let (min, max) = (self.min()?, self.max()?);
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        // Rounding in the sum must not push the mean outside of the sample range.
        Some(mean.clamp(min, max))
    }

    /// Estimates the `p`-th percentile, with `p` in `0..=100`.
    ///
    /// The estimate is located at position `p * (n + 1) / 100` of the sorted samples, clamped to
    /// the first and last sample and linearly interpolated in between.
    ///
    /// # Panics
    ///
    /// Panics if `p` is outside of `0..=100`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        assert!((0.0..=100.0).contains(&p), "percentile {p} out of range");

        let mut sorted = self.samples.clone();
        sorted.sort_unstable_by(f64::total_cmp);

        let n = sorted.len();
        let (&first, &last) = (sorted.first()?, sorted.last()?);

        let pos = p * (n as f64 + 1.0) / 100.0;
        if pos < 1.0 {
            return Some(first);
        }
        if pos >= n as f64 {
            return Some(last);
        }

        let index = pos.floor() as usize;
        let fraction = pos - pos.floor();
        let lower = sorted[index - 1];
        let upper = sorted[index];
        Some(lower + fraction * (upper - lower))
    }

    /// Computes all summary statistics at once, or `None` without samples.
    pub fn snapshot(&self) -> Option<Snapshot> {
        Some(Snapshot {
            mean: self.mean()?,
            p50: self.percentile(50.0)?,
            min: self.min()?,
            max: self.max()?,
        })
    }
}

/// Summary statistics of a benchmark, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// The mean duration.
    pub mean: f64,
    /// The median duration.
    pub p50: f64,
    /// The fastest run.
    pub min: f64,
    /// The slowest run.
    pub max: f64,
}

/// Throughput of a summary statistic, reported as "Mbps".
///
/// This is `size / (millis * 1000)`, which is *not* a conversion to megabits per second (that
/// would be `size * 8 / (millis * 1000)`). The formula is kept as is so that reported numbers stay
/// comparable with earlier results.
pub fn throughput(size_bytes: u64, duration_millis: f64) -> f64 {
    size_bytes as f64 / (duration_millis * 1000.0)
}

/// Throughput of a single run, using the same formula as [`throughput`] in single precision.
pub fn run_throughput(size_bytes: u64, duration_millis: u64) -> f32 {
    size_bytes as f32 / (duration_millis as f32 * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_of(samples: &[f64]) -> Statistics {
        let mut stats = Statistics::new();
        for &sample in samples {
            stats.add_sample(sample);
        }
        stats
    }

    #[test]
    fn empty_has_no_statistics() {
        let stats = Statistics::new();

        assert!(stats.is_empty());
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.percentile(50.0), None);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.snapshot(), None);
    }

    #[test]
    fn basic_statistics() {
        let snapshot = stats_of(&[30.0, 10.0, 20.0]).snapshot().unwrap();

        assert_eq!(
            snapshot,
            Snapshot {
                mean: 20.0,
                p50: 20.0,
                min: 10.0,
                max: 30.0,
            }
        );
        assert_eq!(throughput(1000, snapshot.min), 0.1);
    }

    #[test]
    fn single_sample() {
        let snapshot = stats_of(&[42.0]).snapshot().unwrap();
        assert_eq!(snapshot.p50, 42.0);
        assert_eq!(snapshot.mean, 42.0);
    }

    #[test]
    fn median_interpolates_between_middle_samples() {
        let stats = stats_of(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.percentile(50.0), Some(2.5));
    }

    #[test]
    fn percentiles_clamp_to_extremes() {
        let stats = stats_of(&[5.0, 1.0, 3.0]);
        assert_eq!(stats.percentile(0.0), Some(1.0));
        assert_eq!(stats.percentile(10.0), Some(1.0));
        assert_eq!(stats.percentile(100.0), Some(5.0));
        assert_eq!(stats.percentile(90.0), Some(5.0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn percentile_rejects_invalid_rank() {
        stats_of(&[1.0]).percentile(101.0);
    }

    #[test]
    fn order_does_not_matter() {
        let forward = stats_of(&[3.0, 8.0, 1.0, 9.0, 4.0]).snapshot();
        let backward = stats_of(&[4.0, 9.0, 1.0, 8.0, 3.0]).snapshot();
        assert_eq!(forward, backward);
    }

    #[test]
    fn statistics_stay_within_range() {
        let sequences: &[&[f64]] = &[
            &[0.1, 0.1, 0.1],
            &[0.0],
            &[7.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0],
            &[1.0, 1000.0],
            &[13.0, 2.0, 999.0, 41.0, 41.0, 0.0, 8.0],
            &[0.3, 0.7, 0.1, 0.9, 0.2, 0.2],
        ];

        for samples in sequences {
            let snapshot = stats_of(samples).snapshot().unwrap();
            assert!(snapshot.min <= snapshot.p50, "{samples:?}");
            assert!(snapshot.p50 <= snapshot.max, "{samples:?}");
            assert!(snapshot.min <= snapshot.mean, "{samples:?}");
            assert!(snapshot.mean <= snapshot.max, "{samples:?}");
        }
    }

    #[test]
    fn run_throughput_uses_whole_millis() {
        assert_eq!(run_throughput(1000, 10), 0.1);
        assert_eq!(run_throughput(2_000_000, 1000), 2.0);
        assert!(run_throughput(1000, 0).is_infinite());
    }
}
