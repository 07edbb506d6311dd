use crate::{
    AnalysisConfig, CarrierFilterType, Complex, DoiResult, Real, nearest_index,
    spectral::fourier,
};
use tracing::{debug, instrument};

/// Voltage with the carrier tone suppressed from the signal start onwards,
/// aligned sample for sample with the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub filter: CarrierFilterType,
    pub voltage_filt: Vec<Complex>,
    /// First sample the filter was applied to.
    pub start_index: usize,
}

/// Frequency response rejecting `±carrier` with a super-Gaussian notch of
/// half-width `wid` and steepness `order`.
pub fn notch_response(frequency: Real, carrier: Real, wid: Real, order: i32) -> Real {
    1.0 - (-((frequency - carrier).abs() / wid).powi(order)).exp()
        - (-((frequency + carrier).abs() / wid).powi(order)).exp()
}

pub fn gaussian_notch(
    voltage: &[Real],
    sample_rate: Real,
    carrier: Real,
    wid: Real,
    order: i32,
) -> Vec<Complex> {
    fourier::apply_response(&fourier::to_complex(voltage), sample_rate, |frequency| {
        notch_response(frequency, carrier, wid, order)
    })
}

#[instrument(skip_all, fields(filter = %config.carrier_filter_type))]
pub fn filter_carrier(
    doi: &DoiResult,
    carrier_frequency: Real,
    config: &AnalysisConfig,
) -> FilterResult {
    let recording = doi.recording;
    let start_index = nearest_index(recording.time(), doi.t_start_corrected);
    let raw = fourier::to_complex(recording.voltage());
    let voltage_filt = match config.carrier_filter_type {
        CarrierFilterType::None => raw,
        CarrierFilterType::GaussianNotch => {
            let filtered = gaussian_notch(
                recording.voltage(),
                recording.sample_rate(),
                carrier_frequency,
                config.wid,
                config.order,
            );
            raw[..start_index]
                .iter()
                .chain(&filtered[start_index..])
                .copied()
                .collect()
        }
    };
    debug!("Filtered {} samples from index {start_index}", voltage_filt.len());
    FilterResult {
        filter: config.carrier_filter_type,
        voltage_filt,
        start_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::TAU;

    #[test]
    fn response_is_zero_at_carrier_and_one_far_away() {
        assert_approx_eq!(notch_response(2e9, 2e9, 5e7, 6), 0.0);
        assert_approx_eq!(notch_response(-2e9, 2e9, 5e7, 6), 0.0);
        assert_approx_eq!(notch_response(2.3e9, 2e9, 5e7, 6), 1.0);
        assert_approx_eq!(notch_response(2e9 + 5e7, 2e9, 5e7, 6), 1.0 - (-1.0 as Real).exp());
    }

    #[test]
    fn notch_removes_only_the_carrier() {
        let sample_rate = 1024.0;
        let voltage: Vec<Real> = (0..1024)
            .map(|i| {
                let t = i as Real / sample_rate;
                (TAU * 100.0 * t).cos() + 0.5 * (TAU * 300.0 * t).cos()
            })
            .collect();
        let filtered = gaussian_notch(&voltage, sample_rate, 100.0, 10.0, 6);
        for (i, z) in filtered.iter().enumerate() {
            let t = i as Real / sample_rate;
            assert_approx_eq!(z.re, 0.5 * (TAU * 300.0 * t).cos(), 1e-9);
            assert_approx_eq!(z.im, 0.0, 1e-9);
        }
    }
}
