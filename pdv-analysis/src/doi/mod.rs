//! Locates the signal start and the region of interest around it.

mod iq;
mod otsu;

use crate::{
    AnalysisConfig, Real, StartTimeStrategy, carrier,
    error::{DetectionError, PipelineError, PipelineResult, RecordingError, Stage},
    recording::RawRecording,
    spectral::{self, Spectrogram},
};
use iq::IqConfig;
use otsu::BlurConfig;
use std::ops::Range;
use tracing::{info, instrument};

/// Fewest recording samples a region of interest may hold.
pub const MIN_DOI_SAMPLES: usize = 16;

#[derive(Debug, Clone)]
pub struct DoiResult<'r> {
    pub recording: &'r RawRecording,
    pub strategy: StartTimeStrategy,
    pub spectrogram: Spectrogram,
    pub sample_rate: Real,
    pub time_resolution: Real,
    pub frequency_resolution: Real,
    /// Rows `[start, end)` of the spectrogram between `freq_min` and `freq_max`.
    pub band: Range<usize>,
    /// Leading spectrogram columns assumed to hold only the carrier.
    pub carrier_band_columns: usize,
    /// Spectrogram row, within `band`, at the top of the carrier: the upper
    /// edge of the binarised carrier for Otsu, otherwise the row nearest the
    /// carrier seen in the leading columns.
    pub carrier_top_index: usize,
    pub t_start_detected: Real,
    pub t_start_corrected: Real,
    pub t_doi_start: Real,
    pub t_doi_end: Real,
}

impl DoiResult<'_> {
    /// Frequencies of the band rows.
    pub fn f_doi(&self) -> &[Real] {
        &self.spectrogram.f()[self.band.clone()]
    }
}

fn detection_error(error: DetectionError) -> PipelineError {
    PipelineError::Detection(error, Stage::FindDoi)
}

#[instrument(skip_all, fields(strategy = %config.start_time_user))]
pub fn find_doi<'r>(
    recording: &'r RawRecording,
    config: &AnalysisConfig,
) -> PipelineResult<DoiResult<'r>> {
    let time = recording.time();
    let (first, last) = match (time.first(), time.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(RecordingError::TooShort(time.len()).into()),
    };
    let sample_rate = recording.sample_rate();
    let spectrogram = spectral::stft(
        recording.voltage(),
        sample_rate,
        first,
        &config.spectral(),
    )
    .map_err(|e| PipelineError::Spectral(e, Stage::Stft))?;

    let band = spectrogram.band_rows(config.freq_min, config.freq_max);
    if band.is_empty() {
        return Err(detection_error(DetectionError::EmptyBand {
            min: config.freq_min,
            max: config.freq_max,
        }));
    }
    let time_resolution = spectrogram.time_resolution();
    let frequency_resolution = spectrogram.frequency_resolution();
    let carrier_band_columns = if time_resolution.is_finite() {
        ((config.carrier_band_time / time_resolution).round() as usize)
            .clamp(1, spectrogram.t().len())
    } else {
        1
    };

    let (t_start_detected, carrier_top_index) = match config.start_time_user {
        StartTimeStrategy::Otsu => otsu::detect(
            &spectrogram,
            band.clone(),
            carrier_band_columns,
            BlurConfig {
                kernel: config.blur_kernel,
                sigma: (config.blur_sigx, config.blur_sigy),
            },
        ),
        StartTimeStrategy::Iq => iq::detect(
            recording,
            &spectrogram,
            band.clone(),
            carrier_band_columns,
            IqConfig {
                smoothing: config.nperseg,
                baseline_duration: config.carrier_band_time,
                threshold_factor: config.iq_threshold_factor,
            },
        )
        .map(|(start, carrier)| {
            let row = band.start + crate::nearest_index(&spectrogram.f()[band.clone()], carrier);
            (start, row)
        }),
        StartTimeStrategy::Fixed(start) if (first..=last).contains(&start) => {
            let profile =
                carrier::band_profile(&spectrogram, band.clone(), 0..carrier_band_columns);
            Ok((start, band.start + carrier::peak_row(&profile)))
        }
        StartTimeStrategy::Fixed(start) => Err(DetectionError::StartOutOfRange {
            time: start,
            first,
            last,
        }),
    }
    .map_err(detection_error)?;

    let t_start_corrected = t_start_detected + config.start_time_correction;
    let (t_doi_start, t_doi_end) = clamp_window(
        time,
        t_start_corrected - config.t_before,
        t_start_corrected + config.t_after,
    )
    .map_err(detection_error)?;
    info!(
        "Signal start {t_start_detected} s (corrected {t_start_corrected} s), region of interest {t_doi_start}..{t_doi_end} s"
    );

    Ok(DoiResult {
        recording,
        strategy: config.start_time_user,
        spectrogram,
        sample_rate,
        time_resolution,
        frequency_resolution,
        band,
        carrier_band_columns,
        carrier_top_index,
        t_start_detected,
        t_start_corrected,
        t_doi_start,
        t_doi_end,
    })
}

/// Clamps `start..=end` to the recording and checks it still holds at least
/// [MIN_DOI_SAMPLES] samples.
fn clamp_window(time: &[Real], start: Real, end: Real) -> Result<(Real, Real), DetectionError> {
    let first = time.first().copied().unwrap_or(Real::NAN);
    let last = time.last().copied().unwrap_or(Real::NAN);
    let start = start.max(first);
    let end = end.min(last);
    let samples = time
        .partition_point(|&t| t <= end)
        .saturating_sub(time.partition_point(|&t| t < start));
    if start >= end || samples < MIN_DOI_SAMPLES {
        return Err(DetectionError::DegenerateWindow {
            start,
            end,
            samples,
        });
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<Real> {
        (0..100).map(|i| i as Real).collect()
    }

    #[test]
    fn window_is_clamped_to_the_recording() {
        assert_eq!(clamp_window(&axis(), -10.0, 40.0).unwrap(), (0.0, 40.0));
        assert_eq!(clamp_window(&axis(), 60.0, 400.0).unwrap(), (60.0, 99.0));
    }

    #[test]
    fn degenerate_window_fails() {
        assert!(matches!(
            clamp_window(&axis(), 10.0, 20.0),
            Err(DetectionError::DegenerateWindow { samples: 11, .. })
        ));
        assert!(matches!(
            clamp_window(&axis(), 150.0, 200.0),
            Err(DetectionError::DegenerateWindow { samples: 0, .. })
        ));
        assert!(clamp_window(&axis(), 10.0, 25.0).is_ok());
    }
}
