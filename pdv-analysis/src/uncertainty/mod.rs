//! Uncertainty of the velocity trace and of the quantities derived from it.

mod full;
mod instantaneous;

pub use full::{UncertaintyBounds, full_uncertainty};
pub use instantaneous::{
    UncertaintyTrace, frequency_uncertainty_scaling, instantaneous_uncertainty,
};
