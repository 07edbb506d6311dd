//! Signal start from the collapse of the demodulated carrier.
//!
//! Mixing the recording down by the carrier frequency turns the carrier into
//! a slowly varying phasor. Once the surface moves, the beat frequency leaves
//! the carrier and the low-passed phasor energy drops.

use crate::{
    Complex, Real, carrier,
    error::DetectionError,
    spectral::Spectrogram,
    recording::RawRecording,
};
use std::{f64::consts::TAU, ops::Range};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IqConfig {
    pub(crate) smoothing: usize,
    pub(crate) baseline_duration: Real,
    pub(crate) threshold_factor: Real,
}

pub(super) fn detect(
    recording: &RawRecording,
    spectrogram: &Spectrogram,
    band: Range<usize>,
    carrier_columns: usize,
    config: IqConfig,
) -> Result<(Real, Real), DetectionError> {
    let carrier_columns = carrier_columns.clamp(1, spectrogram.t().len());
    let profile = carrier::band_profile(spectrogram, band.clone(), 0..carrier_columns);
    let carrier = carrier::centroid(&profile, &spectrogram.f()[band])?;
    debug!("Demodulating at {carrier} Hz");

    let energy = demodulated_energy(recording, carrier, config.smoothing);
    let baseline_samples = ((config.baseline_duration * recording.sample_rate()).round()
        as usize)
        .clamp(1, energy.len());
    let baseline = crate::mean(&energy[..baseline_samples]);
    let threshold = config.threshold_factor * baseline;
    debug!("Carrier energy baseline {baseline}, threshold {threshold}");

    energy
        .iter()
        .skip(baseline_samples)
        .position(|&e| e < threshold)
        .map(|offset| (recording.time()[baseline_samples + offset], carrier))
        .ok_or(DetectionError::NoSignalStart("iq"))
}

/// `|z|²` of the recording mixed down by `carrier` and smoothed with a
/// centred moving average of `width` samples (shortened at the edges).
fn demodulated_energy(recording: &RawRecording, carrier: Real, width: usize) -> Vec<Real> {
    let origin = recording.time().first().copied().unwrap_or_default();
    let mixed = recording
        .time()
        .iter()
        .zip(recording.voltage())
        .map(|(&t, &v)| v * Complex::from_polar(1.0, -TAU * carrier * (t - origin)));

    let mut prefix = Vec::with_capacity(recording.len() + 1);
    prefix.push(Complex::default());
    for z in mixed {
        let previous = prefix.last().copied().unwrap_or_default();
        prefix.push(previous + z);
    }

    let half = width.max(1) / 2;
    let len = recording.len();
    (0..len)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(len);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as Real).norm_sqr()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn carrier_energy_is_a_quarter_of_the_amplitude_squared() {
        let sample_rate = 1000.0;
        let time: Vec<Real> = (0..2000).map(|i| i as Real / sample_rate).collect();
        let voltage = time.iter().map(|t| 2.0 * (TAU * 50.0 * t).cos()).collect();
        let recording = RawRecording::new(time, voltage).unwrap();
        let energy = demodulated_energy(&recording, 50.0, 200);
        // The mixed-down phasor is 1 plus a term at twice the carrier which
        // the moving average removes away from the edges.
        for &e in &energy[200..1800] {
            assert_approx_eq!(e, 1.0, 2e-2);
        }
    }

    #[test]
    fn energy_drops_when_the_tone_moves() {
        let sample_rate = 1000.0;
        let time: Vec<Real> = (0..2000).map(|i| i as Real / sample_rate).collect();
        let voltage = time
            .iter()
            .map(|&t| {
                let frequency = if t < 1.0 { 50.0 } else { 150.0 };
                (TAU * frequency * t).cos()
            })
            .collect();
        let recording = RawRecording::new(time, voltage).unwrap();
        let energy = demodulated_energy(&recording, 50.0, 100);
        assert!(energy[500] > 0.2);
        assert!(energy[1500] < 1e-3);
    }
}
