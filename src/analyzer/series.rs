use super::percentile::{percentile, PERCENTILE_RANKS};

#[derive(PartialEq, Debug, Clone)]
pub struct SeriesSummary {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Vec<(u32, f64)>,
}

/// Append-only samples in insertion order. Percentiles sort a copy.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct StatisticSeries {
    samples: Vec<f64>,
}

impl StatisticSeries {
    pub fn new() -> StatisticSeries {
        StatisticSeries { samples: Vec::new() }
    }

    pub fn add(&mut self, value: f64) {
        self.samples.push(value);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.samples.iter().sum()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.sum() / self.count() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.samples.iter().cloned().fold(None, |min, value| match min {
            Some(min) if min <= value => Some(min),
            _ => Some(value),
        })
    }

    pub fn max(&self) -> Option<f64> {
        self.samples.iter().cloned().fold(None, |max, value| match max {
            Some(max) if max >= value => Some(max),
            _ => Some(value),
        })
    }

    fn sorted(&self) -> Vec<f64> {
        let mut data_sorted = self.samples.clone();
        data_sorted.sort_by(|a, b| a.total_cmp(b));
        data_sorted
    }

    /// Summary with every value multiplied by `scale`, e.g. 0.001 for
    /// milliseconds to seconds.
    pub fn summary(&self, scale: f64) -> Option<SeriesSummary> {
        let (min, max, avg) = match (self.min(), self.max(), self.avg()) {
            (Some(min), Some(max), Some(avg)) => (min, max, avg),
            _ => return None,
        };

        let data_sorted = self.sorted();
        let percentiles = PERCENTILE_RANKS
            .iter()
            .filter_map(|&rank| percentile(&data_sorted, rank).map(|value| (rank, value * scale)))
            .collect();

        Some(SeriesSummary {
            count: self.count(),
            sum: self.sum() * scale,
            avg: avg * scale,
            min: min * scale,
            max: max * scale,
            percentiles,
        })
    }
}
