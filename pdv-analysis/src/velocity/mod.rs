//! Velocity history from the phase of the carrier-filtered voltage.

mod derivative;
mod smoothing;
mod unwrap;

pub use derivative::{STENCIL_REACH, instantaneous_frequency};
pub use smoothing::{SmoothingConfig, weighted_moving_average};
pub use unwrap::unwrap;

use crate::{
    AnalysisConfig, Complex, DoiResult, Real,
    carrier::FilterResult,
    error::{NumericalError, PipelineError, PipelineResult, Stage},
    nearest_index,
    spectral::fourier,
};
use tracing::{info, instrument, warn};

/// Fewest samples the baseline is averaged over.
const MIN_BASELINE_SAMPLES: usize = 5;
const BASELINE_FRACTION: Real = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityResult {
    pub time_f: Vec<Real>,
    pub velocity_f: Vec<Real>,
    pub velocity_f_smooth: Vec<Real>,
    /// Unsmoothed velocity extended by half a smoothing window each side.
    pub velocity_pad: Vec<Real>,
    /// Instantaneous beat frequency `dφ/dt` over the region of interest, in Hz.
    pub frequency_f: Vec<Real>,
    /// Band-passed analytic voltage over the region of interest.
    pub voltage_filt: Vec<Complex>,
    /// First sample of the region of interest in the recording.
    pub start_index: usize,
    /// One past the last sample of the region of interest.
    pub end_index: usize,
    /// Offset removed from all velocity traces.
    pub baseline: Real,
}

impl VelocityResult {
    pub fn len(&self) -> usize {
        self.time_f.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_f.is_empty()
    }
}

/// Number of leading samples whose mean defines zero velocity.
pub fn baseline_samples(len: usize) -> usize {
    ((len as Real * BASELINE_FRACTION) as usize)
        .max(MIN_BASELINE_SAMPLES)
        .min(len)
}

fn numerical(error: NumericalError) -> PipelineError {
    PipelineError::Numerical(error, Stage::Velocity)
}

#[instrument(skip_all)]
pub fn calculate_velocity(
    doi: &DoiResult,
    filter: &FilterResult,
    carrier_frequency: Real,
    config: &AnalysisConfig,
) -> PipelineResult<VelocityResult> {
    let recording = doi.recording;
    let time = recording.time();
    let sample_rate = recording.sample_rate();
    if filter.voltage_filt.len() != time.len() {
        return Err(numerical(NumericalError::LengthMismatch {
            what: "filtered voltage and time",
            expected: time.len(),
            actual: filter.voltage_filt.len(),
        }));
    }

    let start_index = nearest_index(time, doi.t_doi_start);
    let end_index = nearest_index(time, doi.t_doi_end);
    let smoothing = config.smoothing();
    let pad = smoothing.half_window();
    if start_index < pad + STENCIL_REACH
        || end_index + pad + STENCIL_REACH > time.len()
        || end_index <= start_index
    {
        return Err(numerical(NumericalError::InsufficientPadding {
            required: pad + STENCIL_REACH,
            start: start_index,
            end: end_index,
            len: time.len(),
        }));
    }

    let analytic = fourier::band_pass(
        &filter.voltage_filt,
        sample_rate,
        config.freq_min,
        config.freq_max,
    );

    // Phase over the padded region plus the stencil reach
    let phase_offset = start_index - pad - STENCIL_REACH;
    let phase_end = end_index + pad + STENCIL_REACH;
    let wrapped: Vec<Real> = analytic[phase_offset..phase_end]
        .iter()
        .map(|z| z.arg())
        .collect();
    let phase = unwrap(&wrapped);

    let padded_len = end_index - start_index + 2 * pad;
    let frequency_pad =
        instantaneous_frequency(&phase, STENCIL_REACH..STENCIL_REACH + padded_len, sample_rate);
    let mut velocity_pad: Vec<Real> = frequency_pad
        .iter()
        .map(|f| config.lam * (f - carrier_frequency))
        .collect();

    let mut velocity_f_smooth = weighted_moving_average(&velocity_pad, &smoothing.weights());
    let len = end_index - start_index;
    if velocity_f_smooth.len() != len {
        return Err(numerical(NumericalError::LengthMismatch {
            what: "smoothed velocity and region of interest",
            expected: len,
            actual: velocity_f_smooth.len(),
        }));
    }

    let non_finite = velocity_f_smooth.iter().filter(|v| !v.is_finite()).count();
    if non_finite as Real > config.nonfinite_tolerance * len as Real {
        return Err(numerical(NumericalError::NonFinite {
            count: non_finite,
            total: len,
        }));
    }
    if non_finite > 0 {
        warn!("{non_finite} of {len} smoothed velocity samples are non-finite");
    }

    let baseline = finite_mean(&velocity_f_smooth[..baseline_samples(len)]);
    for v in velocity_f_smooth.iter_mut().chain(velocity_pad.iter_mut()) {
        *v -= baseline;
    }
    let velocity_f = velocity_pad[pad..pad + len].to_vec();
    info!("Velocity over {len} samples, baseline {baseline} m/s removed");

    Ok(VelocityResult {
        time_f: time[start_index..end_index].to_vec(),
        velocity_f,
        velocity_f_smooth,
        velocity_pad,
        frequency_f: frequency_pad[pad..pad + len].to_vec(),
        voltage_filt: analytic[start_index..end_index].to_vec(),
        start_index,
        end_index,
        baseline,
    })
}

fn finite_mean(values: &[Real]) -> Real {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as Real }
}
