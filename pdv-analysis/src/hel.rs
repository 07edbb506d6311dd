//! Hugoniot elastic limit from the earliest low-slope plateau of the
//! free-surface velocity.
//!
//! Times are in nanoseconds throughout, so slopes are in m/s per ns and the
//! plateau angle threshold is expressed against those units.

use crate::Real;
use tracing::{info, instrument, warn};

/// Fewer valid samples than this ends detection before any analysis.
const MIN_VALID_SAMPLES: usize = 6;
/// Fewest samples a filtered set or search window may hold.
const MIN_WINDOW_SAMPLES: usize = 10;
const PASCALS_PER_GIGAPASCAL: Real = 1e9;

#[derive(Debug, Clone, PartialEq)]
pub struct HelConfig {
    pub start_ns: Real,
    pub end_ns: Option<Real>,
    pub angle_threshold_deg: Real,
    pub min_points: usize,
    pub min_velocity: Real,
    /// kg/m³
    pub density: Option<Real>,
    /// Bulk sound speed, m/s.
    pub acoustic_velocity: Option<Real>,
    /// Longitudinal sound speed, m/s.
    pub c_l: Option<Real>,
}

impl Default for HelConfig {
    fn default() -> Self {
        Self {
            start_ns: 0.0,
            end_ns: None,
            angle_threshold_deg: 45.0,
            min_points: 3,
            min_velocity: 10.0,
            density: None,
            acoustic_velocity: None,
            c_l: None,
        }
    }
}

/// Arrays behind a detection, kept for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct HelDiagnostics {
    pub time_window: Vec<Real>,
    pub velocity_window: Vec<Real>,
    pub gradient_smooth: Vec<Real>,
    pub angles_deg: Vec<Real>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelResult {
    pub ok: bool,
    pub strength_gpa: Real,
    pub uncertainty_gpa: Real,
    pub free_surface_velocity: Real,
    pub time_detection_ns: Real,
    pub consecutive_points: usize,
    pub segment_duration_ns: Real,
    pub strain_rate: Real,
    pub segment_start_idx: Option<usize>,
    pub segment_end_idx: Option<usize>,
    pub diagnostics: Option<HelDiagnostics>,
}

impl HelResult {
    pub fn failed() -> Self {
        Self {
            ok: false,
            strength_gpa: Real::NAN,
            uncertainty_gpa: Real::NAN,
            free_surface_velocity: Real::NAN,
            time_detection_ns: Real::NAN,
            consecutive_points: 0,
            segment_duration_ns: Real::NAN,
            strain_rate: Real::NAN,
            segment_start_idx: None,
            segment_end_idx: None,
            diagnostics: None,
        }
    }
}

/// `(U_hel − U_0) / (2·C_L·(t_hel − t_0))`, NaN unless `t_hel > t_0`.
pub fn elastic_shock_strain_rate(c_l: Real, u_hel: Real, u_0: Real, t_hel: Real, t_0: Real) -> Real {
    let dt = t_hel - t_0;
    if dt > 0.0 {
        (u_hel - u_0) / dt / (2.0 * c_l)
    } else {
        Real::NAN
    }
}

/// Derivative of `values` against the non-uniform axis `time`: second-order
/// central differences inside, first-order one-sided at the ends.
fn gradient(values: &[Real], time: &[Real]) -> Vec<Real> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            if i == 0 {
                (values[1] - values[0]) / (time[1] - time[0])
            } else if i == n - 1 {
                (values[n - 1] - values[n - 2]) / (time[n - 1] - time[n - 2])
            } else {
                let hs = time[i] - time[i - 1];
                let hd = time[i + 1] - time[i];
                (hs * hs * values[i + 1] + (hd * hd - hs * hs) * values[i]
                    - hd * hd * values[i - 1])
                    / (hs * hd * (hd + hs))
            }
        })
        .collect()
}

/// Centred moving average of odd width `size`, repeating the end values
/// beyond either end.
fn uniform_filter(values: &[Real], size: usize) -> Vec<Real> {
    let Some(last) = values.len().checked_sub(1) else {
        return Vec::new();
    };
    let half = (size / 2) as isize;
    (0..values.len())
        .map(|i| {
            (-half..=half)
                .map(|offset| values[(i as isize + offset).clamp(0, last as isize) as usize])
                .sum::<Real>()
                / (2 * half + 1) as Real
        })
        .collect()
}

/// First run of at least `min_points` consecutive `true` values, as an
/// inclusive index range.
fn earliest_run(flags: &[bool], min_points: usize) -> Option<(usize, usize)> {
    let mut start = None;
    for (i, &flag) in flags.iter().chain([false].iter()).enumerate() {
        match (flag, start) {
            (true, None) => start = Some(i),
            (false, Some(first)) => {
                if i - first >= min_points {
                    return Some((first, i - 1));
                }
                start = None;
            }
            _ => {}
        }
    }
    None
}

/// Scans `velocity` (m/s) against `time_ns` for the HEL plateau.
///
/// The result is `ok` only if enough finite data remains, a plateau of at
/// least `min_points` samples exists, and its mean velocity reaches
/// `min_velocity`. A rejected plateau keeps its velocity and timing.
#[instrument(skip_all)]
pub fn detect_hel(
    time_ns: &[Real],
    velocity: &[Real],
    uncertainty: &[Real],
    config: &HelConfig,
) -> HelResult {
    if time_ns.len() != velocity.len() || velocity.len() != uncertainty.len() {
        warn!(
            "HEL: time, velocity and uncertainty lengths differ ({}, {}, {})",
            time_ns.len(),
            velocity.len(),
            uncertainty.len()
        );
    }
    let valid: Vec<(Real, Real, Real)> = time_ns
        .iter()
        .zip(velocity)
        .zip(uncertainty)
        .map(|((&t, &v), &u)| (t, v, u))
        .filter(|(_, v, _)| v.is_finite())
        .collect();
    if valid.len() < MIN_VALID_SAMPLES {
        warn!("HEL: insufficient valid data points");
        return HelResult::failed();
    }

    let max_velocity = valid
        .iter()
        .fold(0.0, |max: Real, (_, v, _)| max.max(v.abs()))
        .max(1e-9);
    let quiet: Vec<(Real, Real, Real)> = valid
        .iter()
        .copied()
        .filter(|(_, _, u)| u.abs() / max_velocity < 1.0)
        .collect();
    let clean = if quiet.len() < MIN_WINDOW_SAMPLES {
        valid
    } else {
        quiet
    };

    let in_window = |t: Real| {
        t >= config.start_ns
            && match config.end_ns {
                Some(end) if end > config.start_ns => t <= end,
                _ => true,
            }
    };
    let windowed: Vec<(Real, Real, Real)> =
        clean.iter().copied().filter(|&(t, _, _)| in_window(t)).collect();
    let window = if windowed.len() < MIN_WINDOW_SAMPLES {
        clean
    } else {
        windowed
    };
    if window.len() < MIN_WINDOW_SAMPLES {
        warn!("HEL: insufficient data points in search window");
        return HelResult::failed();
    }

    let time_window: Vec<Real> = window.iter().map(|&(t, _, _)| t).collect();
    let velocity_window: Vec<Real> = window.iter().map(|&(_, v, _)| v).collect();
    let uncertainty_window: Vec<Real> = window.iter().map(|&(_, _, u)| u).collect();

    let slope = gradient(&velocity_window, &time_window);
    let mut width = (slope.len() / 3).clamp(3, 5);
    if width % 2 == 0 {
        width += 1;
    }
    let gradient_smooth = uniform_filter(&slope, width);
    let angles_deg: Vec<Real> = gradient_smooth
        .iter()
        .map(|g| g.abs().atan().to_degrees())
        .collect();
    let low_slope: Vec<bool> = angles_deg
        .iter()
        .map(|&angle| angle < config.angle_threshold_deg)
        .collect();

    let run = earliest_run(&low_slope, config.min_points);
    let diagnostics = Some(HelDiagnostics {
        time_window,
        velocity_window,
        gradient_smooth,
        angles_deg,
    });
    let Some((first, last)) = run else {
        info!("HEL: no qualifying plateau found");
        return HelResult {
            diagnostics,
            ..HelResult::failed()
        };
    };

    let plateau_velocity: Vec<Real> = window[first..=last].iter().map(|&(_, v, _)| v).collect();
    let fsv = crate::mean(&plateau_velocity);
    let hel_time = window[first].0;
    let segment_duration_ns = window[last].0 - hel_time;
    let closest = first + crate::nearest_index(&plateau_velocity, fsv);
    let velocity_uncertainty = window[closest].2.abs();

    let mut result = HelResult {
        free_surface_velocity: fsv,
        time_detection_ns: hel_time,
        consecutive_points: last - first + 1,
        segment_duration_ns,
        segment_start_idx: Some(first),
        segment_end_idx: Some(last),
        diagnostics,
        ..HelResult::failed()
    };

    if fsv.abs() < config.min_velocity {
        info!(
            "HEL rejected: detected velocity {:.2} m/s below threshold {:.1} m/s",
            fsv.abs(),
            config.min_velocity
        );
        return result;
    }

    if let (Some(density), Some(acoustic_velocity)) = (config.density, config.acoustic_velocity) {
        result.strength_gpa = 0.5 * density * acoustic_velocity * fsv.abs() / PASCALS_PER_GIGAPASCAL;
        result.uncertainty_gpa =
            0.5 * density * acoustic_velocity * velocity_uncertainty / PASCALS_PER_GIGAPASCAL;
    }
    if let Some(c_l) = config.c_l.or(config.acoustic_velocity) {
        let (t_0, u_0, _) = window[first.saturating_sub(1)];
        result.strain_rate = elastic_shock_strain_rate(c_l, fsv, u_0, hel_time, t_0);
    }
    result.ok = true;
    info!(
        "HEL detected: {:.3} GPa at {:.1} ns ({} points, {:.3} ns duration)",
        result.strength_gpa, hel_time, result.consecutive_points, segment_duration_ns
    );
    result
}
