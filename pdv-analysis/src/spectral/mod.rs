//! Short-time Fourier transform and the spectrogram grid it produces.

pub mod fourier;
mod window;

pub use window::WindowKind;

use crate::{Complex, Real, error::SpectralError, nearest_index};
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use rustfft::FftPlanner;
use std::ops::Range;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralConfig {
    pub nperseg: usize,
    pub noverlap: usize,
    pub nfft: usize,
    pub window: WindowKind,
}

impl SpectralConfig {
    pub fn hop(&self) -> usize {
        self.nperseg - self.noverlap
    }

    fn validate(&self) -> Result<(), SpectralError> {
        if self.nperseg == 0 {
            return Err(SpectralError::ZeroSegmentLength);
        }
        if self.noverlap >= self.nperseg {
            return Err(SpectralError::OverlapTooLarge {
                noverlap: self.noverlap,
                nperseg: self.nperseg,
            });
        }
        if self.nfft < self.nperseg {
            return Err(SpectralError::FftTooShort {
                nfft: self.nfft,
                nperseg: self.nperseg,
            });
        }
        Ok(())
    }
}

/// Complex one-sided spectrogram, indexed by (frequency bin, time bin).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    f: Vec<Real>,
    t: Vec<Real>,
    z: Array2<Complex>,
}

impl Spectrogram {
    pub fn f(&self) -> &[Real] {
        &self.f
    }

    /// Segment centre times, in the time frame of the transformed signal.
    pub fn t(&self) -> &[Real] {
        &self.t
    }

    pub fn z(&self) -> &Array2<Complex> {
        &self.z
    }

    pub fn magnitude(&self) -> Array2<Real> {
        self.z.mapv(|z| z.norm())
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, Complex> {
        self.z.index_axis(Axis(1), index)
    }

    pub fn time_resolution(&self) -> Real {
        mean_step(&self.t)
    }

    pub fn frequency_resolution(&self) -> Real {
        mean_step(&self.f)
    }

    /// Rows of the grid from the bin nearest `min` up to, but excluding, the
    /// bin nearest `max`.
    pub fn band_rows(&self, min: Real, max: Real) -> Range<usize> {
        nearest_index(&self.f, min)..nearest_index(&self.f, max)
    }
}

fn mean_step(axis: &[Real]) -> Real {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) if axis.len() > 1 => (last - first) / (axis.len() - 1) as Real,
        _ => Real::NAN,
    }
}

/// Computes the spectrogram of `signal` sampled at `sample_rate`, whose first
/// sample is at time `start_time`.
///
/// Each of the `1 + (len - nperseg)/hop` segments is tapered, zero-padded to
/// `nfft` and transformed; the one-sided spectrum is scaled by the inverse of
/// the window sum so a unit cosine has magnitude one half.
#[instrument(skip_all, fields(len = signal.len(), nperseg = config.nperseg, nfft = config.nfft))]
pub fn stft(
    signal: &[Real],
    sample_rate: Real,
    start_time: Real,
    config: &SpectralConfig,
) -> Result<Spectrogram, SpectralError> {
    config.validate()?;
    if signal.len() < config.nperseg {
        return Err(SpectralError::SignalTooShort {
            len: signal.len(),
            nperseg: config.nperseg,
        });
    }

    let hop = config.hop();
    let segments = 1 + (signal.len() - config.nperseg) / hop;
    let bins = config.nfft / 2 + 1;
    let window = config.window.coefficients(config.nperseg);
    let scale = 1.0 / window.iter().sum::<Real>();
    let fft = FftPlanner::<Real>::new().plan_fft_forward(config.nfft);

    let columns: Vec<Vec<Complex>> = (0..segments)
        .into_par_iter()
        .map(|segment| {
            let offset = segment * hop;
            let mut buffer = vec![Complex::default(); config.nfft];
            for ((slot, &sample), &weight) in buffer
                .iter_mut()
                .zip(&signal[offset..offset + config.nperseg])
                .zip(&window)
            {
                *slot = Complex::new(sample * weight, 0.0);
            }
            fft.process(&mut buffer);
            buffer.truncate(bins);
            buffer.iter_mut().for_each(|z| *z *= scale);
            buffer
        })
        .collect();

    let z = Array2::from_shape_fn((bins, segments), |(k, j)| columns[j][k]);
    let f = (0..bins)
        .map(|k| k as Real * sample_rate / config.nfft as Real)
        .collect();
    let t = (0..segments)
        .map(|j| start_time + ((j * hop) as Real + config.nperseg as Real / 2.0) / sample_rate)
        .collect();
    debug!("Computed {bins}x{segments} spectrogram");
    Ok(Spectrogram { f, t, z })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::TAU;

    fn config(nperseg: usize, noverlap: usize, nfft: usize) -> SpectralConfig {
        SpectralConfig {
            nperseg,
            noverlap,
            nfft,
            window: WindowKind::Hann,
        }
    }

    fn tone(len: usize, sample_rate: Real, frequency: Real) -> Vec<Real> {
        (0..len)
            .map(|i| (TAU * frequency * i as Real / sample_rate).cos())
            .collect()
    }

    #[test]
    fn grid_shape_and_axes() {
        let spectrogram = stft(&tone(1000, 1000.0, 100.0), 1000.0, 2.0, &config(100, 50, 200))
            .unwrap();
        assert_eq!(spectrogram.f().len(), 101);
        assert_eq!(spectrogram.t().len(), 19);
        assert_eq!(spectrogram.z().dim(), (101, 19));
        assert_approx_eq!(spectrogram.t()[0], 2.05);
        assert_approx_eq!(spectrogram.time_resolution(), 0.05);
        assert_approx_eq!(spectrogram.frequency_resolution(), 5.0);
    }

    #[test]
    fn unit_cosine_peaks_at_half() {
        let spectrogram =
            stft(&tone(1024, 1024.0, 64.0), 1024.0, 0.0, &config(128, 96, 256)).unwrap();
        let magnitude = spectrogram.magnitude();
        let peak_row = nearest_index(spectrogram.f(), 64.0);
        for column in magnitude.columns() {
            let (argmax, max) = column
                .iter()
                .enumerate()
                .fold((0, 0.0), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
            assert_eq!(argmax, peak_row);
            assert_approx_eq!(max, 0.5, 1e-9);
        }
    }

    #[test]
    fn band_rows_select_nearest_bins() {
        let spectrogram = stft(&tone(512, 100.0, 10.0), 100.0, 0.0, &config(64, 32, 100)).unwrap();
        assert_eq!(spectrogram.band_rows(10.2, 20.4), 10..20);
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        let signal = tone(64, 1.0, 0.1);
        assert!(matches!(
            stft(&signal, 1.0, 0.0, &config(0, 0, 8)),
            Err(SpectralError::ZeroSegmentLength)
        ));
        assert!(matches!(
            stft(&signal, 1.0, 0.0, &config(16, 16, 16)),
            Err(SpectralError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            stft(&signal, 1.0, 0.0, &config(16, 8, 8)),
            Err(SpectralError::FftTooShort { .. })
        ));
        assert!(matches!(
            stft(&signal, 1.0, 0.0, &config(128, 8, 128)),
            Err(SpectralError::SignalTooShort { .. })
        ));
    }
}
