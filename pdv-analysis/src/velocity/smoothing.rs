use crate::Real;
use serde::Serialize;
use std::f64::consts::PI;

/// Gaussian kernel of the velocity smoothing moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmoothingConfig {
    /// Kernel length in samples, odd.
    pub window: usize,
    /// The kernel spans `-wid..=wid` in units of `sigma`.
    pub wid: Real,
    pub amp: Real,
    pub sigma: Real,
    pub mu: Real,
}

impl SmoothingConfig {
    pub fn weights(&self) -> Vec<Real> {
        let norm = self.amp / (self.sigma * (2.0 * PI).sqrt());
        linspace(-self.wid, self.wid, self.window)
            .map(|x| norm * (-(x - self.mu).powi(2) / (2.0 * self.sigma.powi(2))).exp())
            .collect()
    }

    /// Samples each side of a point that the moving average reads.
    pub fn half_window(&self) -> usize {
        self.window / 2
    }

    /// Full width at half maximum of the kernel, in seconds.
    ///
    /// This is the analytic width `2·sqrt(2·ln 2)·sigma`, about 235.5 samples
    /// for the default kernel. Tools that measure the width on the sampled
    /// kernel report a slightly narrower value (about 234.4 samples).
    pub fn characteristic_time(&self, sample_rate: Real) -> Real {
        if self.window < 2 || self.wid <= 0.0 {
            return 1.0 / sample_rate;
        }
        let fwhm = 2.0 * (2.0 * (2.0 as Real).ln()).sqrt() * self.sigma;
        let sample_spacing = 2.0 * self.wid / (self.window - 1) as Real;
        fwhm / sample_spacing / sample_rate
    }
}

fn linspace(start: Real, end: Real, len: usize) -> impl Iterator<Item = Real> {
    let step = if len > 1 {
        (end - start) / (len - 1) as Real
    } else {
        0.0
    };
    (0..len).map(move |i| start + i as Real * step)
}

/// Weighted average of every full window of `values`, normalised by the
/// weight sum. The output is `weights.len() - 1` samples shorter.
pub fn weighted_moving_average(values: &[Real], weights: &[Real]) -> Vec<Real> {
    let total: Real = weights.iter().sum();
    values
        .windows(weights.len().max(1))
        .map(|window| {
            window
                .iter()
                .zip(weights)
                .map(|(v, w)| v * w)
                .sum::<Real>()
                / total
        })
        .collect()
}
