//! Spall signature in the smoothed free-surface velocity.
//!
//! The search runs in three steps, each starting where the previous one
//! stopped: the first maximum after the signal start (peak compression),
//! the following minimum (peak tension, where the material fails) and the
//! following maximum (recompression). A step that finds nothing leaves its
//! own point and every later point unresolved.

use crate::{
    AnalysisConfig, Real,
    error::{NumericalError, PipelineError, PipelineResult, Stage},
    uncertainty::UncertaintyTrace,
    velocity::VelocityResult,
};
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeaturePoint {
    pub time: Real,
    pub velocity: Real,
}

impl FeaturePoint {
    pub fn unresolved() -> Self {
        Self {
            time: Real::NAN,
            velocity: Real::NAN,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.time.is_nan() && !self.velocity.is_nan()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpallEvent {
    pub max_compression: FeaturePoint,
    pub max_tension: FeaturePoint,
    pub recompression: FeaturePoint,
    /// Pa
    pub spall_strength_est: Real,
    /// 1/s
    pub strain_rate_est: Real,
    /// Pa
    pub peak_shock_stress: Real,
    pub freq_uncert_at_max_comp: Real,
    pub vel_uncert_at_max_comp: Real,
    pub freq_uncert_at_max_ten: Real,
    pub vel_uncert_at_max_ten: Real,
}

impl SpallEvent {
    pub fn unresolved() -> Self {
        Self {
            max_compression: FeaturePoint::unresolved(),
            max_tension: FeaturePoint::unresolved(),
            recompression: FeaturePoint::unresolved(),
            spall_strength_est: Real::NAN,
            strain_rate_est: Real::NAN,
            peak_shock_stress: Real::NAN,
            freq_uncert_at_max_comp: Real::NAN,
            vel_uncert_at_max_comp: Real::NAN,
            freq_uncert_at_max_ten: Real::NAN,
            vel_uncert_at_max_ten: Real::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Maximum,
    Minimum,
}

impl Extremum {
    fn beats(self, value: Real, other: Real) -> bool {
        match self {
            Extremum::Maximum => value > other,
            Extremum::Minimum => value < other,
        }
    }
}

/// Index of the first sample strictly beyond every sample within `order`
/// places of it. Neighbours past either end are replaced by the end sample,
/// so the two end samples never qualify.
fn first_extremum(values: &[Real], order: usize, kind: Extremum) -> Option<usize> {
    let last = values.len().checked_sub(1)?;
    (0..values.len()).find(|&i| {
        (1..=order.max(1)).all(|shift| {
            let before = i.saturating_sub(shift);
            let after = (i + shift).min(last);
            kind.beats(values[i], values[before]) && kind.beats(values[i], values[after])
        })
    })
}

/// Finds an extremum in `values[origin..]`, shifts it by `correction` and
/// returns its index into `values` if still in range.
fn search(
    values: &[Real],
    origin: usize,
    order: usize,
    correction: isize,
    kind: Extremum,
) -> Option<usize> {
    let found = origin + first_extremum(values.get(origin..)?, order, kind)?;
    found
        .checked_add_signed(correction)
        .filter(|&index| index < values.len())
}

#[instrument(skip_all)]
pub fn analyse_spall(
    velocity: &VelocityResult,
    uncertainty: &UncertaintyTrace,
    t_start_corrected: Real,
    config: &AnalysisConfig,
) -> PipelineResult<SpallEvent> {
    let trace = &velocity.velocity_f_smooth;
    if uncertainty.velocity_uncertainty.len() != trace.len() {
        return Err(PipelineError::Numerical(
            NumericalError::LengthMismatch {
                what: "velocity and uncertainty traces",
                expected: trace.len(),
                actual: uncertainty.velocity_uncertainty.len(),
            },
            Stage::Spall,
        ));
    }
    let point = |index: usize| FeaturePoint {
        time: velocity.time_f[index],
        velocity: trace[index],
    };
    let mut event = SpallEvent::unresolved();

    let origin = velocity
        .time_f
        .partition_point(|&t| t < t_start_corrected);
    let Some(compression) = search(
        trace,
        origin,
        config.pb_neighbors,
        config.pb_idx_correction,
        Extremum::Maximum,
    ) else {
        info!("No maximum compression found");
        return Ok(event);
    };
    event.max_compression = point(compression);
    event.freq_uncert_at_max_comp = uncertainty.frequency_uncertainty[compression];
    event.vel_uncert_at_max_comp = uncertainty.velocity_uncertainty[compression];

    let Some(tension) = search(
        trace,
        compression,
        config.pb_neighbors,
        config.pb_idx_correction,
        Extremum::Minimum,
    ) else {
        info!("No maximum tension found");
        return Ok(event);
    };
    event.max_tension = point(tension);
    event.freq_uncert_at_max_ten = uncertainty.frequency_uncertainty[tension];
    event.vel_uncert_at_max_ten = uncertainty.velocity_uncertainty[tension];

    match search(
        trace,
        tension,
        config.rc_neighbors,
        config.rc_idx_correction,
        Extremum::Maximum,
    ) {
        Some(recompression) => event.recompression = point(recompression),
        None => info!("No recompression peak found"),
    }

    if config.spall_calculation {
        let (strength, strain_rate, stress) = spall_estimates(
            &event.max_compression,
            &event.max_tension,
            config.density,
            config.c0,
        );
        event.spall_strength_est = strength;
        event.strain_rate_est = strain_rate;
        event.peak_shock_stress = stress;
        info!("Spall strength {strength} Pa at strain rate {strain_rate} 1/s");
    }
    Ok(event)
}

/// Spall strength and peak shock stress (Pa) and strain rate (1/s) from the
/// acoustic approximation. A non-positive time separation gives a NaN rate.
pub fn spall_estimates(
    compression: &FeaturePoint,
    tension: &FeaturePoint,
    density: Real,
    c0: Real,
) -> (Real, Real, Real) {
    let pullback = compression.velocity - tension.velocity;
    let dt = tension.time - compression.time;
    let strain_rate = if dt > 0.0 {
        pullback / (2.0 * c0 * dt)
    } else {
        Real::NAN
    };
    (
        0.5 * density * c0 * pullback,
        strain_rate,
        0.5 * density * c0 * compression.velocity,
    )
}
