//! Sequences the stages over one recording.
//!
//! The signal-to-velocity stages form one phase: the first error ends the
//! run. The analysis stages that follow degrade to unresolved values, and
//! HEL detection, when enabled, runs last and can affect nothing else.

mod summary;
#[cfg(test)]
mod tests;

pub use summary::{HelSummary, RunSummary};

use crate::{
    AnalysisConfig, DoiResult, HelResult, RawRecording, Real, SpallEvent, UncertaintyBounds,
    UncertaintyTrace, VelocityResult,
    carrier::{self, FilterResult},
    doi, hel, spall, uncertainty, velocity,
};
use pdv_common::seconds_to_nanoseconds;
use tracing::{error, info, info_span, instrument};

/// Every stage result of a run. Fields of the analysis phase hold their
/// unresolved values if their stage failed.
#[derive(Debug, Clone)]
pub struct AnalysisOutput<'r> {
    pub doi: DoiResult<'r>,
    /// Hz
    pub carrier_frequency: Real,
    pub filter: FilterResult,
    pub velocity: VelocityResult,
    pub uncertainty: UncertaintyTrace,
    pub spall: SpallEvent,
    pub bounds: UncertaintyBounds,
    /// `None` unless HEL detection is enabled.
    pub hel: Option<HelResult>,
}

impl AnalysisOutput<'_> {
    pub fn summary(&self, config: &AnalysisConfig) -> RunSummary {
        RunSummary::new(self, config)
    }
}

/// Runs every stage over `recording`.
///
/// # Errors
/// A configuration that fails [AnalysisConfig::validate], or any failure
/// from locating the region of interest up to the velocity history.
#[instrument(skip_all, fields(samples = recording.len()))]
pub fn run<'r>(
    recording: &'r RawRecording,
    config: &AnalysisConfig,
) -> crate::PipelineResult<AnalysisOutput<'r>> {
    config.validate()?;

    let doi = doi::find_doi(recording, config)?;
    let carrier_frequency = carrier::estimate_frequency(&doi, config.carrier_estimate)?;
    let filter = carrier::filter_carrier(&doi, carrier_frequency, config);
    let velocity = velocity::calculate_velocity(&doi, &filter, carrier_frequency, config)?;

    let uncertainty =
        uncertainty::instantaneous_uncertainty(&doi, &velocity, carrier_frequency, config)
            .unwrap_or_else(|e| {
                error!("{e}");
                info!("Continuing with undefined instantaneous uncertainty");
                UncertaintyTrace::unresolved(
                    velocity.len(),
                    config
                        .smoothing()
                        .characteristic_time(recording.sample_rate()),
                    config.uncert_mult,
                )
            });
    let spall = spall::analyse_spall(&velocity, &uncertainty, doi.t_start_corrected, config)
        .unwrap_or_else(|e| {
            error!("{e}");
            info!("Continuing with an unresolved spall event");
            SpallEvent::unresolved()
        });
    let bounds = uncertainty::full_uncertainty(&spall, carrier_frequency, uncertainty.tau, config);

    let hel = config.hel_detection_enabled.then(|| {
        let _guard = info_span!("hel").entered();
        let time_ns: Vec<Real> = velocity
            .time_f
            .iter()
            .copied()
            .map(seconds_to_nanoseconds)
            .collect();
        hel::detect_hel(
            &time_ns,
            &velocity.velocity_f_smooth,
            &uncertainty.velocity_uncertainty,
            &config.hel(),
        )
    });

    Ok(AnalysisOutput {
        doi,
        carrier_frequency,
        filter,
        velocity,
        uncertainty,
        spall,
        bounds,
        hel,
    })
}
