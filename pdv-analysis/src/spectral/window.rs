use crate::Real;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Tapering applied to each spectrogram segment. All windows are periodic,
/// i.e. of length `len` taken from a symmetric window of length `len + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
    Blackman,
    #[serde(alias = "rectangular")]
    Boxcar,
}

impl WindowKind {
    pub fn coefficients(self, len: usize) -> Vec<Real> {
        let phase = |n: usize| n as Real * TAU / len as Real;
        match self {
            WindowKind::Boxcar => vec![1.0; len],
            WindowKind::Hann => (0..len).map(|n| 0.5 - 0.5 * phase(n).cos()).collect(),
            WindowKind::Hamming => (0..len).map(|n| 0.54 - 0.46 * phase(n).cos()).collect(),
            WindowKind::Blackman => (0..len)
                .map(|n| 0.42 - 0.5 * phase(n).cos() + 0.08 * (2.0 * phase(n)).cos())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn hann_is_periodic() {
        let window = WindowKind::Hann.coefficients(8);
        assert_eq!(window.len(), 8);
        assert_approx_eq!(window[0], 0.0);
        assert_approx_eq!(window[4], 1.0);
        assert_approx_eq!(window[2], window[6]);
        assert_approx_eq!(window.iter().sum::<Real>(), 4.0);
    }

    #[test]
    fn hamming_and_blackman_endpoints() {
        assert_approx_eq!(WindowKind::Hamming.coefficients(16)[0], 0.08);
        assert_approx_eq!(WindowKind::Blackman.coefficients(16)[0], 0.0);
        assert_approx_eq!(WindowKind::Blackman.coefficients(16)[8], 1.0);
    }

    #[test]
    fn names() {
        assert_eq!(WindowKind::Boxcar.to_string(), "boxcar");
        let kind: WindowKind = serde_json::from_str("\"rectangular\"").unwrap();
        assert_eq!(kind, WindowKind::Boxcar);
    }
}
