use crate::Real;
use std::f64::consts::TAU;

/// Eighth-order central difference weights for offsets `-4..=4`.
const STENCIL: [Real; 9] = [
    1.0 / 280.0,
    -4.0 / 105.0,
    1.0 / 5.0,
    -4.0 / 5.0,
    0.0,
    4.0 / 5.0,
    -1.0 / 5.0,
    4.0 / 105.0,
    -1.0 / 280.0,
];

/// Samples the stencil needs on either side of the point it differentiates.
pub const STENCIL_REACH: usize = 4;

/// Time derivative of `phase` (radians) in Hz, evaluated at every index of
/// `range`. The caller guarantees `STENCIL_REACH` samples on either side.
pub fn instantaneous_frequency(
    phase: &[Real],
    range: std::ops::Range<usize>,
    sample_rate: Real,
) -> Vec<Real> {
    let scale = sample_rate / TAU;
    range
        .map(|i| {
            phase[i - STENCIL_REACH..=i + STENCIL_REACH]
                .iter()
                .zip(STENCIL)
                .map(|(p, w)| p * w)
                .sum::<Real>()
                * scale
        })
        .collect()
}
