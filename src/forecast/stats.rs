/// A simple time series for the forecaster's heuristics.
pub struct TimeSeries {
    values: Vec<f64>,
}

/// `value = slope * index + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq_diff: f64 = self.values.iter().map(|&x| (x - mean).powi(2)).sum();
        sum_sq_diff / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Mean of the last `min(window, len)` values.
    pub fn moving_average(&self, window: usize) -> f64 {
        let window = window.min(self.values.len());
        if window == 0 {
            return 0.0;
        }
        let tail = &self.values[self.values.len() - window..];
        tail.iter().sum::<f64>() / window as f64
    }

    /// Least-squares fit against the sample index. A single distinct index
    /// has no slope, so the fit collapses to the mean.
    pub fn linear_regression(&self) -> LinearFit {
        let n = self.values.len() as f64;
        if self.values.is_empty() {
            return LinearFit {
                slope: 0.0,
                intercept: 0.0,
            };
        }

        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for (i, &y) in self.values.iter().enumerate() {
            let x = i as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        let slope = if denominator.abs() < f64::EPSILON {
            0.0
        } else {
            (n * sum_xy - sum_x * sum_y) / denominator
        };
        let intercept = (sum_y - slope * sum_x) / n;

        LinearFit { slope, intercept }
    }
}
