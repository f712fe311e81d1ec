// Savitzky-Golay smoothing of per-frame metric series
//
// Each output sample is the value at that position of a least-squares
// polynomial fitted over a sliding window. Near the ends, where the window
// cannot be centered, the polynomial fitted to the first (or last) full
// window is evaluated instead.

use nalgebra::DMatrix;
use thiserror::Error;

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_POLYORDER: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmoothingError {
    #[error("Window length must be at least 1")]
    EmptyWindow,

    #[error("Polynomial order {polyorder} must be less than window length {window}")]
    OrderTooHigh { window: usize, polyorder: usize },
}

/// Precomputed Savitzky-Golay filter for one window/order pair
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    polyorder: usize,
    // Row i holds the weights that give the fitted value at window position i
    projection: DMatrix<f64>,
}

impl SavitzkyGolay {
    /// Build a filter. An even window is bumped to the next odd length.
    pub fn new(window: usize, polyorder: usize) -> Result<Self, SmoothingError> {
        if window == 0 {
            return Err(SmoothingError::EmptyWindow);
        }
        let window = if window % 2 == 0 { window + 1 } else { window };

        if polyorder >= window {
            return Err(SmoothingError::OrderTooHigh { window, polyorder });
        }

        // Positions scaled to [-1, 1]; the hat matrix comes from an orthonormal
        // basis of the fit space so wide windows with high orders stay stable
        let center = (window / 2) as f64;
        let scale = center.max(1.0);
        let vandermonde = DMatrix::from_fn(window, polyorder + 1, |row, power| {
            ((row as f64 - center) / scale).powi(power as i32)
        });

        let basis = vandermonde.qr().q();
        let projection = &basis * basis.transpose();

        Ok(Self {
            window,
            polyorder,
            projection,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn polyorder(&self) -> usize {
        self.polyorder
    }

    /// Smooth a series. Series shorter than the window come back unchanged.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n < self.window {
            return data.to_vec();
        }

        let half = self.window / 2;
        let mut smoothed = Vec::with_capacity(n);

        // Leading edge: fit over the first window
        for i in 0..half {
            smoothed.push(self.fitted_value(&data[..self.window], i));
        }

        for center in half..n - half {
            smoothed.push(self.fitted_value(&data[center - half..=center + half], half));
        }

        // Trailing edge: fit over the last window
        let tail = &data[n - self.window..];
        for i in self.window - half..self.window {
            smoothed.push(self.fitted_value(tail, i));
        }

        smoothed
    }

    fn fitted_value(&self, window: &[f64], position: usize) -> f64 {
        self.projection
            .row(position)
            .iter()
            .zip(window)
            .map(|(weight, value)| weight * value)
            .sum()
    }
}

/// Smooth a metric series with a Savitzky-Golay filter.
///
/// Returns the input unchanged when it is shorter than the (odd-forced)
/// window or when the window/order pair cannot form a filter.
pub fn smooth_time_series(data: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    match SavitzkyGolay::new(window, polyorder) {
        Ok(filter) => filter.apply(data),
        Err(e) => {
            tracing::warn!("Skipping smoothing: {}", e);
            data.to_vec()
        }
    }
}
