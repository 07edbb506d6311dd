use super::AnalysisOutput;
use crate::{AnalysisConfig, Real};
use serde::Serialize;

/// Scalar results of a run, in SI units, named as in the results table of
/// the analysis tool's output files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(rename = "Velocity at Max Compression")]
    pub velocity_at_max_compression: Real,
    #[serde(rename = "Time at Max Compression")]
    pub time_at_max_compression: Real,
    #[serde(rename = "Velocity at Max Tension")]
    pub velocity_at_max_tension: Real,
    #[serde(rename = "Time at Max Tension")]
    pub time_at_max_tension: Real,
    #[serde(rename = "Velocity at Recompression")]
    pub velocity_at_recompression: Real,
    #[serde(rename = "Time at Recompression")]
    pub time_at_recompression: Real,
    #[serde(rename = "Carrier Frequency")]
    pub carrier_frequency: Real,
    #[serde(rename = "Spall Strength")]
    pub spall_strength: Real,
    #[serde(rename = "Spall Strength Uncertainty")]
    pub spall_strength_uncertainty: Real,
    #[serde(rename = "Strain Rate")]
    pub strain_rate: Real,
    #[serde(rename = "Strain Rate Uncertainty")]
    pub strain_rate_uncertainty: Real,
    #[serde(rename = "Peak Shock Stress")]
    pub peak_shock_stress: Real,
    #[serde(rename = "Spect Time Res")]
    pub spect_time_res: Real,
    #[serde(rename = "Spect Freq Res")]
    pub spect_freq_res: Real,
    #[serde(rename = "Spect Velocity Res")]
    pub spect_velocity_res: Real,
    #[serde(rename = "Signal Start Time")]
    pub signal_start_time: Real,
    #[serde(rename = "Smoothing Characteristic Time")]
    pub smoothing_characteristic_time: Real,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub hel: Option<HelSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelSummary {
    #[serde(rename = "HEL Detected")]
    pub detected: bool,
    /// GPa
    #[serde(rename = "HEL Strength")]
    pub strength: Real,
    /// GPa
    #[serde(rename = "HEL Strength Uncertainty")]
    pub strength_uncertainty: Real,
    #[serde(rename = "HEL Free Surface Velocity")]
    pub free_surface_velocity: Real,
    /// ns
    #[serde(rename = "HEL Time")]
    pub time: Real,
    #[serde(rename = "HEL Points")]
    pub points: usize,
    #[serde(rename = "HEL Strain Rate")]
    pub strain_rate: Real,
}

impl RunSummary {
    pub(super) fn new(output: &AnalysisOutput, config: &AnalysisConfig) -> Self {
        let spall = &output.spall;
        Self {
            velocity_at_max_compression: spall.max_compression.velocity,
            time_at_max_compression: spall.max_compression.time,
            velocity_at_max_tension: spall.max_tension.velocity,
            time_at_max_tension: spall.max_tension.time,
            velocity_at_recompression: spall.recompression.velocity,
            time_at_recompression: spall.recompression.time,
            carrier_frequency: output.carrier_frequency,
            spall_strength: spall.spall_strength_est,
            spall_strength_uncertainty: output.bounds.spall_uncertainty,
            strain_rate: spall.strain_rate_est,
            strain_rate_uncertainty: output.bounds.strain_rate_uncertainty,
            peak_shock_stress: spall.peak_shock_stress,
            spect_time_res: output.doi.time_resolution,
            spect_freq_res: output.doi.frequency_resolution,
            spect_velocity_res: 0.5 * config.lam * output.doi.frequency_resolution,
            signal_start_time: output.doi.t_start_corrected,
            smoothing_characteristic_time: output.uncertainty.tau,
            hel: output.hel.as_ref().map(|hel| HelSummary {
                detected: hel.ok,
                strength: hel.strength_gpa,
                strength_uncertainty: hel.uncertainty_gpa,
                free_surface_velocity: hel.free_surface_velocity,
                time: hel.time_detection_ns,
                points: hel.consecutive_points,
                strain_rate: hel.strain_rate,
            }),
        }
    }
}
