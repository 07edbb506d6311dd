//! Whole-signal frequency-domain helpers.

use crate::{Complex, Real};
use rustfft::FftPlanner;

/// Sample frequencies of an `n`-point transform, in the standard ordering:
/// zero, the positive frequencies, then the negative frequencies.
pub fn fftfreq(n: usize, sample_rate: Real) -> Vec<Real> {
    let scale = sample_rate / n as Real;
    (0..n)
        .map(|k| {
            if k < n.div_ceil(2) {
                k as Real * scale
            } else {
                (k as Real - n as Real) * scale
            }
        })
        .collect()
}

pub fn forward(signal: &[Complex]) -> Vec<Complex> {
    let mut buffer = signal.to_vec();
    FftPlanner::<Real>::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);
    buffer
}

/// Inverse transform normalised by `1/n`.
pub fn inverse(spectrum: &[Complex]) -> Vec<Complex> {
    let mut buffer = spectrum.to_vec();
    FftPlanner::<Real>::new()
        .plan_fft_inverse(buffer.len())
        .process(&mut buffer);
    let scale = 1.0 / buffer.len().max(1) as Real;
    for sample in buffer.iter_mut() {
        *sample *= scale;
    }
    buffer
}

/// Multiplies the spectrum of `signal` by `response(frequency)` and returns
/// the transformed-back signal.
pub fn apply_response<F>(signal: &[Complex], sample_rate: Real, response: F) -> Vec<Complex>
where
    F: Fn(Real) -> Real,
{
    let mut spectrum = forward(signal);
    for (bin, frequency) in spectrum
        .iter_mut()
        .zip(fftfreq(signal.len(), sample_rate))
    {
        *bin *= response(frequency);
    }
    inverse(&spectrum)
}

/// Rectangular band-pass keeping only the positive frequencies strictly
/// inside `(min, max)`, so the output is an analytic signal.
pub fn band_pass(signal: &[Complex], sample_rate: Real, min: Real, max: Real) -> Vec<Complex> {
    apply_response(signal, sample_rate, |frequency| {
        if frequency > min && frequency < max {
            1.0
        } else {
            0.0
        }
    })
}

pub fn to_complex(signal: &[Real]) -> Vec<Complex> {
    signal.iter().map(|&v| Complex::new(v, 0.0)).collect()
}
