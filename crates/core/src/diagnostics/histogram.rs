//! Equal-width histograms with smoothing, peak counting and Otsu thresholding.
//!
//! Used to inspect degree and link-length distributions of a graph: a healthy
//! level-0 degree distribution is unimodal near the cap, while a second peak
//! near zero points at poorly connected regions.

use serde::{Deserialize, Serialize};

/// Rule for choosing the bucket count from the sample size `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistogramMode {
    /// `floor(sqrt(n))` buckets.
    #[default]
    Sqrt,
    /// Sturges-style `floor(1 + 3.2 * ln(n))` buckets.
    Log,
}

impl HistogramMode {
    pub fn bucket_count(self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let raw = match self {
            HistogramMode::Sqrt => (n as f64).sqrt(),
            HistogramMode::Log => 1.0 + 3.2 * (n as f64).ln(),
        };
        (raw.floor() as usize).max(1)
    }
}

/// Bucketed view of a sample of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    mode: HistogramMode,
    bounds: Vec<f32>,
    counts: Vec<usize>,
    values: Vec<f32>,
}

impl Histogram {
    /// Bucket `data`. Non-finite values are ignored.
    pub fn new(mode: HistogramMode, data: &[f32]) -> Self {
        let finite: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
        let buckets = mode.bucket_count(finite.len());
        if buckets == 0 {
            return Self {
                mode,
                bounds: Vec::new(),
                counts: Vec::new(),
                values: Vec::new(),
            };
        }

        let min = finite.iter().copied().fold(f32::INFINITY, f32::min);
        let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let width = (max - min) / buckets as f32;

        let bounds: Vec<f32> = (0..=buckets)
            .map(|i| if i == buckets { max } else { min + width * i as f32 })
            .collect();

        let mut counts = vec![0usize; buckets];
        for v in &finite {
            let idx = if width > 0.0 {
                (((v - min) / width) as usize).min(buckets - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }

        let values = counts.iter().map(|&c| c as f32).collect();
        Self {
            mode,
            bounds,
            counts,
            values,
        }
    }

    pub fn mode(&self) -> HistogramMode {
        self.mode
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Bucket edges; bucket `i` covers `bounds[i]..bounds[i + 1]`.
    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    /// Raw per-bucket counts.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Working values: the counts, possibly smoothed.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// 5-wide moving average. The two buckets at each edge keep their values.
    pub fn smooth(&mut self) {
        let n = self.values.len();
        if n < 5 {
            return;
        }
        let source = self.values.clone();
        for i in 2..n - 2 {
            self.values[i] = source[i - 2..=i + 2].iter().sum::<f32>() / 5.0;
        }
    }

    /// Indices of local maxima, found where the slope turns from rising to
    /// falling. The series is padded with zero on both sides so peaks in the
    /// edge buckets count; a plateau peak reports its first bucket.
    pub fn peaks(&self) -> Vec<usize> {
        let mut padded = Vec::with_capacity(self.values.len() + 2);
        padded.push(0.0);
        padded.extend_from_slice(&self.values);
        padded.push(0.0);

        let mut peaks = Vec::new();
        let mut rising = false;
        let mut top = 0usize;
        for i in 1..padded.len() {
            let slope = padded[i] - padded[i - 1];
            if slope > 0.0 {
                rising = true;
                top = i;
            } else if slope < 0.0 {
                if rising {
                    peaks.push(top - 1);
                }
                rising = false;
            }
        }
        peaks
    }

    pub fn peak_count(&self) -> usize {
        self.peaks().len()
    }

    /// Bucket index splitting the values into two classes with maximal
    /// between-class variance (Otsu). Buckets `0..=index` form the lower class.
    pub fn otsu_index(&self) -> Option<usize> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let total: f64 = self.values.iter().map(|&v| v as f64).sum();
        if total <= 0.0 {
            return None;
        }
        let weighted_total: f64 = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| i as f64 * v as f64)
            .sum();

        let mut best: Option<(usize, f64)> = None;
        let mut w0 = 0.0f64;
        let mut sum0 = 0.0f64;
        for (i, &v) in self.values[..n - 1].iter().enumerate() {
            w0 += v as f64;
            sum0 += i as f64 * v as f64;
            let w1 = total - w0;
            if w0 <= 0.0 || w1 <= 0.0 {
                continue;
            }
            let mu0 = sum0 / w0;
            let mu1 = (weighted_total - sum0) / w1;
            let between = w0 * w1 * (mu0 - mu1) * (mu0 - mu1);
            if best.map_or(true, |(_, b)| between > b) {
                best = Some((i, between));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Value at the upper edge of the Otsu bucket.
    pub fn otsu_threshold(&self) -> Option<f32> {
        self.otsu_index().map(|i| self.bounds[i + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_count_modes() {
        assert_eq!(HistogramMode::Sqrt.bucket_count(0), 0);
        assert_eq!(HistogramMode::Sqrt.bucket_count(1), 1);
        assert_eq!(HistogramMode::Sqrt.bucket_count(100), 10);
        assert_eq!(HistogramMode::Log.bucket_count(1), 1);
        // 1 + 3.2 * ln(100) = 15.73
        assert_eq!(HistogramMode::Log.bucket_count(100), 15);
    }

    #[test]
    fn test_counts_and_bounds() {
        let data = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let h = Histogram::new(HistogramMode::Sqrt, &data);
        assert_eq!(h.bucket_count(), 3);
        assert_eq!(h.counts(), &[3, 3, 3]);
        assert_eq!(h.bounds().len(), 4);
        assert_eq!(h.bounds()[0], 0.0);
        assert_eq!(h.bounds()[3], 8.0);
        assert_eq!(h.counts().iter().sum::<usize>(), data.len());
    }

    #[test]
    fn test_constant_data_single_bucket_hit() {
        let h = Histogram::new(HistogramMode::Sqrt, &[2.0; 16]);
        assert_eq!(h.counts()[0], 16);
        assert!(h.counts()[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_empty_and_nan() {
        let h = Histogram::new(HistogramMode::Log, &[f32::NAN]);
        assert!(h.is_empty());
        assert_eq!(h.mode(), HistogramMode::Log);
        assert!(h.peaks().is_empty());
        assert_eq!(h.otsu_index(), None);
    }

    #[test]
    fn test_smoothing_keeps_edges() {
        let mut h = Histogram::new(HistogramMode::Sqrt, &[0.0; 1]);
        h.values = vec![10.0, 0.0, 5.0, 0.0, 0.0, 0.0, 10.0];
        h.smooth();
        assert_eq!(h.values()[0], 10.0);
        assert_eq!(h.values()[1], 0.0);
        assert_eq!(h.values()[5], 0.0);
        assert_eq!(h.values()[6], 10.0);
        assert!((h.values()[2] - 3.0).abs() < 1e-6);
        assert!((h.values()[4] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_peaks_bimodal() {
        let mut h = Histogram::new(HistogramMode::Sqrt, &[0.0; 1]);
        h.values = vec![1.0, 4.0, 1.0, 0.0, 2.0, 6.0, 6.0, 2.0];
        assert_eq!(h.peaks(), vec![1, 5]);
        assert_eq!(h.peak_count(), 2);

        h.values = vec![9.0, 3.0, 1.0];
        assert_eq!(h.peaks(), vec![0], "edge bucket peak");
    }

    #[test]
    fn test_otsu_splits_clusters() {
        let mut data = vec![1.0f32; 50];
        data.extend(std::iter::repeat(9.0).take(50));
        data.extend([2.0, 8.0]);
        let h = Histogram::new(HistogramMode::Sqrt, &data);
        let idx = h.otsu_index().unwrap();
        let threshold = h.otsu_threshold().unwrap();
        assert!(idx < h.bucket_count() - 1);
        assert!(threshold > 1.0 && threshold < 9.0, "threshold {threshold}");
    }
}
