use crate::{AnalysisConfig, Real, SpallEvent};
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UncertaintyBounds {
    /// Pa
    pub spall_uncertainty: Real,
    /// 1/s
    pub strain_rate_uncertainty: Real,
}

impl UncertaintyBounds {
    pub fn unresolved() -> Self {
        Self {
            spall_uncertainty: Real::NAN,
            strain_rate_uncertainty: Real::NAN,
        }
    }
}

fn root_sum_square(terms: &[Real]) -> Real {
    terms.iter().map(|t| t * t).sum::<Real>().sqrt()
}

/// First-order propagation of the material, wavelength, angle, frequency and
/// timing uncertainties into the spall strength and strain rate.
///
/// With beat frequencies `f = v/λ + f_c` at peak compression and tension,
/// the strength is `½ρC₀λ(f_comp − f_ten)/cosθ` and the strain rate
/// `λ(f_comp − f_ten) / (2C₀(t_ten − t_comp)cosθ)`. Both feature times carry
/// an uncertainty of `tau`, the smoothing characteristic time. A bound is
/// NaN whenever the estimate it belongs to is NaN.
#[instrument(skip_all)]
pub fn full_uncertainty(
    spall: &SpallEvent,
    carrier_frequency: Real,
    tau: Real,
    config: &AnalysisConfig,
) -> UncertaintyBounds {
    if !spall.max_compression.is_resolved() || !spall.max_tension.is_resolved() {
        info!("Spall event unresolved, uncertainty bounds left undefined");
        return UncertaintyBounds::unresolved();
    }
    let rho = config.density;
    let c0 = config.c0;
    let lam = config.lam;
    let theta = config.theta.to_radians();
    let cos = theta.cos();
    let tan = theta.tan();

    let f_comp = spall.max_compression.velocity / lam + carrier_frequency;
    let f_ten = spall.max_tension.velocity / lam + carrier_frequency;
    let df = f_comp - f_ten;
    let dt = spall.max_tension.time - spall.max_compression.time;

    let strength = 0.5 * rho * c0 * lam * df / cos;
    let d_strength_d_freq = 0.5 * rho * c0 * lam / cos;
    let spall_uncertainty = if spall.spall_strength_est.is_nan() {
        Real::NAN
    } else {
        root_sum_square(&[
            strength / rho * config.delta_rho,
            strength / c0 * config.delta_c0,
            strength / lam * config.delta_lam,
            strength * tan * config.delta_theta.to_radians(),
            d_strength_d_freq * spall.freq_uncert_at_max_comp,
            d_strength_d_freq * spall.freq_uncert_at_max_ten,
        ])
    };

    let strain_rate_uncertainty = if dt > 0.0 && !spall.strain_rate_est.is_nan() {
        let strain_rate = lam * df / (2.0 * c0 * dt * cos);
        let d_rate_d_freq = lam / (2.0 * c0 * dt * cos);
        let d_rate_d_time = strain_rate / dt;
        root_sum_square(&[
            strain_rate / c0 * config.delta_c0,
            strain_rate / lam * config.delta_lam,
            strain_rate * tan * config.delta_theta.to_radians(),
            d_rate_d_freq * spall.freq_uncert_at_max_comp,
            d_rate_d_freq * spall.freq_uncert_at_max_ten,
            d_rate_d_time * tau,
            d_rate_d_time * tau,
        ])
    } else {
        Real::NAN
    };
    info!("Spall strength ± {spall_uncertainty} Pa, strain rate ± {strain_rate_uncertainty} 1/s");

    UncertaintyBounds {
        spall_uncertainty,
        strain_rate_uncertainty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeaturePoint;
    use assert_approx_eq::assert_approx_eq;

    fn event() -> SpallEvent {
        let max_compression = FeaturePoint {
            time: 1.0e-7,
            velocity: 600.0,
        };
        let max_tension = FeaturePoint {
            time: 1.2e-7,
            velocity: 400.0,
        };
        let (spall_strength_est, strain_rate_est, peak_shock_stress) =
            crate::spall::spall_estimates(&max_compression, &max_tension, 1730.0, 4540.0);
        SpallEvent {
            max_compression,
            max_tension,
            spall_strength_est,
            strain_rate_est,
            peak_shock_stress,
            freq_uncert_at_max_comp: 0.0,
            freq_uncert_at_max_ten: 0.0,
            ..SpallEvent::unresolved()
        }
    }

    fn exact_config() -> AnalysisConfig {
        AnalysisConfig {
            delta_rho: 0.0,
            delta_c0: 0.0,
            delta_lam: 0.0,
            delta_theta: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn unresolved_event_gives_nan_bounds() {
        let bounds = full_uncertainty(&SpallEvent::unresolved(), 2e9, 1e-9, &exact_config());
        assert!(bounds.spall_uncertainty.is_nan());
        assert!(bounds.strain_rate_uncertainty.is_nan());
    }

    #[test]
    fn skipped_estimates_give_nan_bounds() {
        let event = SpallEvent {
            spall_strength_est: Real::NAN,
            strain_rate_est: Real::NAN,
            peak_shock_stress: Real::NAN,
            ..event()
        };
        let bounds = full_uncertainty(&event, 2e9, 1e-9, &AnalysisConfig::default());
        assert!(bounds.spall_uncertainty.is_nan());
        assert!(bounds.strain_rate_uncertainty.is_nan());
    }

    #[test]
    fn exact_inputs_give_zero_strength_uncertainty() {
        let bounds = full_uncertainty(&event(), 2e9, 0.0, &exact_config());
        assert_approx_eq!(bounds.spall_uncertainty, 0.0);
        assert_approx_eq!(bounds.strain_rate_uncertainty, 0.0);
    }

    #[test]
    fn density_uncertainty_is_relative() {
        let config = AnalysisConfig {
            delta_rho: 17.3,
            ..exact_config()
        };
        let bounds = full_uncertainty(&event(), 2e9, 0.0, &config);
        let strength = 0.5 * 1730.0 * 4540.0 * 200.0;
        assert_approx_eq!(bounds.spall_uncertainty, strength * 0.01, 1e-3 * strength * 0.01);
        // The strain rate does not depend on density.
        assert_approx_eq!(bounds.strain_rate_uncertainty, 0.0);
    }

    #[test]
    fn timing_uncertainty_adds_in_quadrature() {
        let bounds = full_uncertainty(&event(), 2e9, 1e-9, &exact_config());
        let strain_rate = 200.0 / (2.0 * 4540.0 * 2e-8);
        let expected = (2.0 as Real).sqrt() * strain_rate * 1e-9 / 2e-8;
        assert_approx_eq!(bounds.strain_rate_uncertainty, expected, 1e-6 * expected);
        assert_approx_eq!(bounds.spall_uncertainty, 0.0);
    }

    #[test]
    fn frequency_uncertainty_reaches_both_bounds() {
        let mut event = event();
        event.freq_uncert_at_max_comp = 1e6;
        event.freq_uncert_at_max_ten = 1e6;
        let bounds = full_uncertainty(&event, 2e9, 0.0, &exact_config());
        let per_hz = 0.5 * 1730.0 * 4540.0 * 1.547461e-6;
        assert_approx_eq!(
            bounds.spall_uncertainty,
            (2.0 as Real).sqrt() * per_hz * 1e6,
            1e-6 * per_hz * 1e6
        );
        assert!(bounds.strain_rate_uncertainty > 0.0);
    }
}
