//! Carrier frequency estimation and suppression.

mod filter;
mod frequency;

pub use filter::{FilterResult, filter_carrier, gaussian_notch, notch_response};
pub use frequency::estimate_frequency;
pub(crate) use frequency::{band_profile, centroid, peak_row};
