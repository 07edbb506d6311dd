use crate::{
    CarrierEstimator, DoiResult, Real,
    error::{DetectionError, PipelineError, PipelineResult, Stage},
    spectral::Spectrogram,
};
use std::ops::Range;
use tracing::{info, instrument};

/// Mean magnitude of each row in `rows` over the columns `columns`.
pub(crate) fn band_profile(
    spectrogram: &Spectrogram,
    rows: Range<usize>,
    columns: Range<usize>,
) -> Vec<Real> {
    let magnitude = spectrogram
        .z()
        .slice(ndarray::s![rows, columns.clone()])
        .mapv(|z| z.norm());
    magnitude
        .rows()
        .into_iter()
        .map(|row| row.sum() / columns.len() as Real)
        .collect()
}

/// Index of the largest value, the lowest index on ties.
pub(crate) fn peak_row(profile: &[Real]) -> usize {
    profile
        .iter()
        .enumerate()
        .fold((0, Real::NEG_INFINITY), |best, (row, &value)| {
            if value > best.1 { (row, value) } else { best }
        })
        .0
}

/// Magnitude-weighted mean frequency over the contiguous rows around the
/// peak holding at least half of the peak magnitude.
pub(crate) fn centroid(profile: &[Real], frequencies: &[Real]) -> Result<Real, DetectionError> {
    let peak = peak_row(profile);
    let half = profile.get(peak).ok_or(DetectionError::NoCarrierPower)? / 2.0;
    let first = (0..peak)
        .rev()
        .take_while(|&row| profile[row] >= half)
        .last()
        .unwrap_or(peak);
    let last = (peak..profile.len())
        .take_while(|&row| profile[row] >= half)
        .last()
        .unwrap_or(peak);
    let (weighted, total) = (first..=last).fold((0.0, 0.0), |(weighted, total), row| {
        (
            weighted + profile[row] * frequencies[row],
            total + profile[row],
        )
    });
    if !(total > 0.0) {
        return Err(DetectionError::NoCarrierPower);
    }
    Ok(weighted / total)
}

/// Estimates the carrier frequency in Hz from the spectrogram columns that
/// precede the corrected signal start.
#[instrument(skip_all, fields(estimator = %estimator))]
pub fn estimate_frequency(doi: &DoiResult, estimator: CarrierEstimator) -> PipelineResult<Real> {
    let spectrogram = &doi.spectrogram;
    let columns = spectrogram
        .t()
        .partition_point(|&t| t < doi.t_start_corrected);
    if columns == 0 {
        return Err(PipelineError::Detection(
            DetectionError::NoPreSignalCarrier(doi.t_start_corrected),
            Stage::CarrierFrequency,
        ));
    }
    let profile = band_profile(spectrogram, doi.band.clone(), 0..columns);
    let frequencies = doi.f_doi();
    let frequency = match estimator {
        CarrierEstimator::Peak => frequencies[peak_row(&profile)],
        CarrierEstimator::Centroid => centroid(&profile, frequencies)
            .map_err(|e| PipelineError::Detection(e, Stage::CarrierFrequency))?,
    };
    info!("Carrier frequency {frequency} Hz from {columns} columns");
    Ok(frequency)
}
