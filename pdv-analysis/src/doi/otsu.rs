//! Signal start from a binarised spectrogram.
//!
//! The band of interest is converted to an 8-bit log-power image, blurred,
//! and split into foreground and background with Otsu's threshold. The
//! highest foreground row of every column traces the upper edge of the beat
//! signal; the start is where that edge first rises above the edge seen
//! while only the carrier is present.

use crate::{Real, error::DetectionError, spectral::Spectrogram};
use ndarray::{Array2, Axis};
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlurConfig {
    pub(crate) kernel: (usize, usize),
    pub(crate) sigma: (Real, Real),
}

pub(super) fn detect(
    spectrogram: &Spectrogram,
    band: Range<usize>,
    carrier_columns: usize,
    blur: BlurConfig,
) -> Result<(Real, usize), DetectionError> {
    let power = spectrogram
        .z()
        .slice(ndarray::s![band.clone(), ..])
        .mapv(|z| z.norm_sqr());
    let image = to_grayscale(&power)?;
    let kernel_x = gaussian_kernel(blur.kernel.0, blur.sigma.0);
    let kernel_y = gaussian_kernel(blur.kernel.1, blur.sigma.1);
    let blurred = gaussian_blur(&image, &kernel_x, &kernel_y);
    let threshold = otsu_threshold(&blurred);
    let top = top_line(&blurred, threshold);
    debug!("Otsu threshold {threshold}");

    let carrier_columns = carrier_columns.clamp(1, top.len());
    let carrier_top =
        top.iter().take(carrier_columns).sum::<usize>() as Real / carrier_columns as Real;
    let (peak_column, peak_row) = top
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0), |best, (column, row)| if row > best.1 { (column, row) } else { best });
    if peak_row as Real <= carrier_top {
        return Err(DetectionError::NoSignalStart("otsu"));
    }

    let start_column = (0..=peak_column)
        .rev()
        .find(|&column| top[column] as Real <= carrier_top)
        .ok_or(DetectionError::NoSignalStart("otsu"))?;

    let carrier_top_index = (band.start + carrier_top.round() as usize).min(band.end - 1);
    debug!(
        "Carrier edge at {} Hz, signal edge peaks in column {peak_column}",
        spectrogram.f()[carrier_top_index]
    );
    Ok((spectrogram.t()[start_column], carrier_top_index))
}

/// Maps `10·log10(power)` linearly onto `0..=255`, truncating.
fn to_grayscale(power: &Array2<Real>) -> Result<Array2<u8>, DetectionError> {
    let floor = power
        .iter()
        .copied()
        .filter(|&p| p > 0.0)
        .fold(Real::INFINITY, Real::min);
    if !floor.is_finite() {
        return Err(DetectionError::FlatSpectrogram);
    }
    let decibels = power.mapv(|p| 10.0 * p.max(floor).log10());
    let (min, max) = decibels
        .iter()
        .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), &d| {
            (lo.min(d), hi.max(d))
        });
    if max <= min {
        return Err(DetectionError::FlatSpectrogram);
    }
    let scale = 255.0 / (max - min);
    Ok(decibels.mapv(|d| ((d - min) * scale) as u8))
}

/// Normalised Gaussian weights of odd length `size`. A non-positive `sigma`
/// is derived from the size.
fn gaussian_kernel(size: usize, sigma: Real) -> Vec<Real> {
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as Real - 1.0) / 2.0 - 1.0) + 0.8
    };
    let centre = (size as Real - 1.0) / 2.0;
    let weights: Vec<Real> = (0..size)
        .map(|i| (-(i as Real - centre).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: Real = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirrors `index` into `0..len` without repeating the edge sample.
fn reflect_101(index: isize, len: usize) -> usize {
    if len < 2 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

fn convolve_axis(image: &Array2<Real>, kernel: &[Real], axis: Axis) -> Array2<Real> {
    let len = image.len_of(axis);
    let half = (kernel.len() / 2) as isize;
    Array2::from_shape_fn(image.dim(), |(row, column)| {
        let position = if axis == Axis(0) { row } else { column };
        kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| {
                let source = reflect_101(position as isize + k as isize - half, len);
                let value = if axis == Axis(0) {
                    image[(source, column)]
                } else {
                    image[(row, source)]
                };
                weight * value
            })
            .sum()
    })
}

/// Separable blur; `kernel_x` runs along time (columns), `kernel_y` along
/// frequency (rows).
fn gaussian_blur(image: &Array2<u8>, kernel_x: &[Real], kernel_y: &[Real]) -> Array2<u8> {
    let horizontal = convolve_axis(&image.mapv(Real::from), kernel_x, Axis(1));
    convolve_axis(&horizontal, kernel_y, Axis(0)).mapv(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Threshold maximising the between-class variance of the grey-level
/// histogram. Foreground pixels are those strictly above it.
fn otsu_threshold(image: &Array2<u8>) -> u8 {
    let mut histogram = [0usize; 256];
    for &pixel in image {
        histogram[usize::from(pixel)] += 1;
    }
    let total = image.len() as Real;
    let weighted_total: Real = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as Real * count as Real)
        .sum();

    let mut background = 0.0;
    let mut background_sum = 0.0;
    let mut best = (0u8, Real::NEG_INFINITY);
    for (level, &count) in histogram.iter().enumerate() {
        background += count as Real;
        background_sum += level as Real * count as Real;
        let foreground = total - background;
        if background == 0.0 || foreground == 0.0 {
            continue;
        }
        let mean_background = background_sum / background;
        let mean_foreground = (weighted_total - background_sum) / foreground;
        let variance = background * foreground * (mean_background - mean_foreground).powi(2);
        if variance > best.1 {
            best = (level as u8, variance);
        }
    }
    best.0
}

/// Highest foreground row of each column, 0 where a column has none.
fn top_line(image: &Array2<u8>, threshold: u8) -> Vec<usize> {
    image
        .columns()
        .into_iter()
        .map(|column| {
            column
                .iter()
                .rposition(|&pixel| pixel > threshold)
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(5, 0.0);
        assert_eq!(kernel.len(), 5);
        assert_approx_eq!(kernel.iter().sum::<Real>(), 1.0);
        assert_approx_eq!(kernel[0], kernel[4]);
        assert!(kernel[2] > kernel[1]);
    }

    #[test]
    fn reflection_skips_the_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 5), 3);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn blur_preserves_constant_image() {
        let image = Array2::from_elem((6, 7), 80u8);
        let kernel = gaussian_kernel(5, 1.3);
        assert_eq!(gaussian_blur(&image, &kernel, &kernel), image);
    }

    #[test]
    fn threshold_splits_bimodal_image() {
        let image = array![[10u8, 12, 11, 200], [9, 13, 210, 205], [10, 11, 12, 198]];
        let threshold = otsu_threshold(&image);
        assert!((13..198).contains(&threshold));
        assert_eq!(top_line(&image, threshold), vec![0, 0, 1, 2]);
    }

    #[test]
    fn grayscale_spans_full_range() {
        let power = array![[1.0, 10.0], [100.0, 0.0]];
        let image = to_grayscale(&power).unwrap();
        assert_eq!(image[(0, 0)], 0);
        assert_eq!(image[(1, 1)], 0);
        assert_eq!(image[(1, 0)], 255);
        assert_eq!(image[(0, 1)], 127);
    }

    #[test]
    fn flat_power_is_rejected() {
        assert!(matches!(
            to_grayscale(&Array2::from_elem((3, 3), 2.0)),
            Err(DetectionError::FlatSpectrogram)
        ));
        assert!(matches!(
            to_grayscale(&Array2::zeros((3, 3))),
            Err(DetectionError::FlatSpectrogram)
        ));
    }
}
