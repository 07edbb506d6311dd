use crate::{
    AnalysisConfig, DoiResult, Real,
    error::{NumericalError, PipelineError, PipelineResult, Stage},
    velocity::VelocityResult,
};
use rayon::prelude::*;
use std::f64::consts::{PI, TAU};
use tracing::{debug, instrument};

/// Point-wise uncertainty over the region of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyTrace {
    /// m/s
    pub velocity_uncertainty: Vec<Real>,
    /// Hz
    pub frequency_uncertainty: Vec<Real>,
    /// RMS fit residual relative to the fitted amplitude.
    pub noise_fraction: Vec<Real>,
    /// Local sinusoid fit evaluated at each sample.
    pub fitted_voltage: Vec<Real>,
    /// Characteristic time of the velocity smoothing, in seconds.
    pub tau: Real,
    pub freq_uncert_scaling: Real,
    /// Display multiplier for uncertainty bands.
    pub uncert_mult: Real,
}

impl UncertaintyTrace {
    pub fn unresolved(len: usize, tau: Real, uncert_mult: Real) -> Self {
        Self {
            velocity_uncertainty: vec![Real::NAN; len],
            frequency_uncertainty: vec![Real::NAN; len],
            noise_fraction: vec![Real::NAN; len],
            fitted_voltage: vec![Real::NAN; len],
            tau,
            freq_uncert_scaling: Real::NAN,
            uncert_mult,
        }
    }

    /// Lower and upper edges of `velocity ± uncert_mult·σ`.
    pub fn band(&self, velocity: &[Real]) -> (Vec<Real>, Vec<Real>) {
        velocity
            .iter()
            .zip(&self.velocity_uncertainty)
            .map(|(v, sigma)| {
                let half = self.uncert_mult * sigma;
                (v - half, v + half)
            })
            .unzip()
    }
}

/// Converts a noise fraction into a frequency uncertainty (Hz) for a
/// measurement window of `tau` seconds sampled at `sample_rate`.
pub fn frequency_uncertainty_scaling(sample_rate: Real, tau: Real) -> Real {
    (6.0 / (sample_rate * tau.powi(3))).sqrt() / PI
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SinusoidFit {
    cos: Real,
    sin: Real,
    offset: Real,
    rms_residual: Real,
}

impl SinusoidFit {
    fn unresolved() -> Self {
        Self {
            cos: Real::NAN,
            sin: Real::NAN,
            offset: Real::NAN,
            rms_residual: Real::NAN,
        }
    }

    fn noise_fraction(&self) -> Real {
        self.rms_residual / self.cos.hypot(self.sin)
    }
}

/// Solves the 3×3 system `m·x = rhs` by elimination with partial pivoting.
fn solve3(mut m: [[Real; 3]; 3], mut rhs: [Real; 3]) -> Option<[Real; 3]> {
    let scale = m
        .iter()
        .flatten()
        .fold(0.0, |acc: Real, v| acc.max(v.abs()));
    for column in 0..3 {
        let pivot = (column..3).max_by(|&a, &b| m[a][column].abs().total_cmp(&m[b][column].abs()))?;
        if m[pivot][column].abs() <= scale * 1e-12 {
            return None;
        }
        m.swap(column, pivot);
        rhs.swap(column, pivot);
        for row in column + 1..3 {
            let factor = m[row][column] / m[column][column];
            for k in column..3 {
                m[row][k] -= factor * m[column][k];
            }
            rhs[row] -= factor * rhs[column];
        }
    }
    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let known: Real = (row + 1..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - known) / m[row][row];
    }
    Some(x)
}

/// Least-squares fit of `a·cos(ωτ) + b·sin(ωτ) + c` to `voltage` sampled at
/// offsets `offsets` (seconds).
fn fit_sinusoid(offsets: &[Real], voltage: &[Real], angular_frequency: Real) -> SinusoidFit {
    let mut normal = [[0.0; 3]; 3];
    let mut rhs = [0.0; 3];
    for (&tau, &v) in offsets.iter().zip(voltage) {
        let (sin, cos) = (angular_frequency * tau).sin_cos();
        let basis = [cos, sin, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                normal[i][j] += basis[i] * basis[j];
            }
            rhs[i] += basis[i] * v;
        }
    }
    let Some([a, b, c]) = solve3(normal, rhs) else {
        return SinusoidFit::unresolved();
    };
    let squared: Real = offsets
        .iter()
        .zip(voltage)
        .map(|(&tau, &v)| {
            let (sin, cos) = (angular_frequency * tau).sin_cos();
            (v - a * cos - b * sin - c).powi(2)
        })
        .sum();
    SinusoidFit {
        cos: a,
        sin: b,
        offset: c,
        rms_residual: (squared / offsets.len() as Real).sqrt(),
    }
}

#[instrument(skip_all)]
pub fn instantaneous_uncertainty(
    doi: &DoiResult,
    velocity: &VelocityResult,
    carrier_frequency: Real,
    config: &AnalysisConfig,
) -> PipelineResult<UncertaintyTrace> {
    let recording = doi.recording;
    let time = recording.time();
    let voltage = recording.voltage();
    let sample_rate = recording.sample_rate();
    let smoothing = config.smoothing();
    let half = smoothing.half_window();
    let len = velocity.len();

    if velocity.velocity_f_smooth.len() != len {
        return Err(PipelineError::Numerical(
            NumericalError::LengthMismatch {
                what: "time and smoothed velocity",
                expected: len,
                actual: velocity.velocity_f_smooth.len(),
            },
            Stage::InstantaneousUncertainty,
        ));
    }
    if velocity.start_index < half || velocity.start_index + len + half > time.len() {
        return Err(PipelineError::Numerical(
            NumericalError::InsufficientPadding {
                required: half,
                start: velocity.start_index,
                end: velocity.start_index + len,
                len: time.len(),
            },
            Stage::InstantaneousUncertainty,
        ));
    }

    let fits: Vec<SinusoidFit> = (0..len)
        .into_par_iter()
        .map(|k| {
            let centre = velocity.start_index + k;
            let window = centre - half..=centre + half;
            let offsets: Vec<Real> = time[window.clone()]
                .iter()
                .map(|t| t - time[centre])
                .collect();
            let angular_frequency =
                TAU * (velocity.velocity_f_smooth[k] / config.lam + carrier_frequency);
            fit_sinusoid(&offsets, &voltage[window], angular_frequency)
        })
        .collect();

    let tau = smoothing.characteristic_time(sample_rate);
    let freq_uncert_scaling = frequency_uncertainty_scaling(sample_rate, tau);
    let noise_fraction: Vec<Real> = fits.iter().map(SinusoidFit::noise_fraction).collect();
    let frequency_uncertainty: Vec<Real> = noise_fraction
        .iter()
        .map(|nf| nf * freq_uncert_scaling)
        .collect();
    let velocity_uncertainty = frequency_uncertainty
        .iter()
        .map(|df| df * config.lam / 2.0)
        .collect();
    debug!("Smoothing characteristic time {tau} s, frequency scaling {freq_uncert_scaling}");

    Ok(UncertaintyTrace {
        velocity_uncertainty,
        frequency_uncertainty,
        noise_fraction,
        fitted_voltage: fits.iter().map(|fit| fit.cos + fit.offset).collect(),
        tau,
        freq_uncert_scaling,
        uncert_mult: config.uncert_mult,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    #[test]
    fn solves_a_well_posed_system() {
        let x = solve3(
            [[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 4.0]],
            [3.0, 5.0, 5.0],
        )
        .unwrap();
        assert_approx_eq!(x[0], 1.0);
        assert_approx_eq!(x[1], 1.0);
        assert_approx_eq!(x[2], 1.0);
    }

    #[test]
    fn singular_system_has_no_solution() {
        assert!(solve3([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [1.0, 0.0, 1.0]], [1.0; 3]).is_none());
    }

    #[test]
    fn clean_sinusoid_fits_exactly() {
        let omega = TAU * 3.0;
        let offsets: Vec<Real> = (-50..=50).map(|i| i as Real * 0.01).collect();
        let voltage: Vec<Real> = offsets
            .iter()
            .map(|t| 0.8 * (omega * t).cos() - 0.6 * (omega * t).sin() + 0.1)
            .collect();
        let fit = fit_sinusoid(&offsets, &voltage, omega);
        assert_approx_eq!(fit.cos, 0.8, 1e-9);
        assert_approx_eq!(fit.sin, -0.6, 1e-9);
        assert_approx_eq!(fit.offset, 0.1, 1e-9);
        assert_approx_eq!(fit.noise_fraction(), 0.0, 1e-9);
    }

    #[test]
    fn noise_fraction_tracks_noise_level() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let omega = TAU * 5.0;
        let offsets: Vec<Real> = (-500..=500).map(|i| i as Real * 0.001).collect();
        let voltage: Vec<Real> = offsets
            .iter()
            .map(|t| (omega * t).cos() + noise.sample(&mut rng))
            .collect();
        let fit = fit_sinusoid(&offsets, &voltage, omega);
        assert_approx_eq!(fit.noise_fraction(), 0.05, 0.01);
    }

    #[test]
    fn scaling_follows_window_and_rate() {
        let scaling = frequency_uncertainty_scaling(1e10, 1e-9);
        assert_approx_eq!(scaling, (6.0e17 as Real).sqrt() / PI, 1.0);
    }

    #[test]
    fn band_spans_multiplied_uncertainty() {
        let mut trace = UncertaintyTrace::unresolved(2, 1e-9, 10.0);
        trace.velocity_uncertainty = vec![1.0, 2.0];
        let (lower, upper) = trace.band(&[100.0, 200.0]);
        assert_eq!(lower, vec![90.0, 180.0]);
        assert_eq!(upper, vec![110.0, 220.0]);
    }
}
