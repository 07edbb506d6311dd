//! Extraction of spall strength and Hugoniot elastic limit properties from
//! photonic Doppler velocimetry (PDV) voltage recordings.
//!
//! A run is a strict producer/consumer chain over a single recording:
//! ```text
//! RawRecording
//!     -> doi::find_doi              (spectrogram, signal start, region of interest)
//!     -> carrier::estimate_frequency
//!     -> carrier::filter_carrier
//!     -> velocity::calculate_velocity
//!     -> uncertainty::instantaneous_uncertainty
//!     -> spall::analyse_spall -> uncertainty::full_uncertainty
//!     -> hel::detect_hel            (optional)
//! ```
//! Every stage returns a freshly owned result record; [`pipeline::run`]
//! sequences them and applies the failure policy of each phase.

pub mod carrier;
pub mod config;
pub mod doi;
pub mod error;
pub mod hel;
pub mod pipeline;
pub mod recording;
pub mod spall;
pub mod spectral;
pub mod uncertainty;
pub mod velocity;

pub use config::{AnalysisConfig, CarrierEstimator, CarrierFilterType, StartTimeStrategy};
pub use doi::DoiResult;
pub use error::{PipelineError, PipelineResult, Stage};
pub use hel::HelResult;
pub use pipeline::{AnalysisOutput, RunSummary};
pub use recording::RawRecording;
pub use spall::{FeaturePoint, SpallEvent};
pub use spectral::{Spectrogram, WindowKind};
pub use uncertainty::{UncertaintyBounds, UncertaintyTrace};
pub use velocity::VelocityResult;

pub use pdv_common::Real;

pub type Complex = num::complex::Complex64;

/// Index of the element of `values` closest to `target`, the first on ties.
pub(crate) fn nearest_index(values: &[Real], target: Real) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, Real::INFINITY), |(best, best_distance), (i, v)| {
            let distance = (v - target).abs();
            if distance < best_distance {
                (i, distance)
            } else {
                (best, best_distance)
            }
        })
        .0
}

pub(crate) fn mean(values: &[Real]) -> Real {
    values.iter().sum::<Real>() / values.len() as Real
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_index_prefers_first_on_ties() {
        let values = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(nearest_index(&values, 1.5), 1);
        assert_eq!(nearest_index(&values, 2.6), 3);
        assert_eq!(nearest_index(&values, -4.0), 0);
        assert_eq!(nearest_index(&values, 10.0), 3);
    }
}
