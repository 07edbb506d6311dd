//! Run configuration.
//!
//! Field names follow the option names of the configuration files written for
//! the original analysis tool, so those files deserialize unchanged. Options
//! this crate does not use (plotting, colour maps, ...) are ignored.

use crate::{
    Real, error::ConfigError, hel::HelConfig, spectral::SpectralConfig, velocity::SmoothingConfig,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

/// How the start of the velocity signal is located.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StartTimeUser", into = "StartTimeUser")]
pub enum StartTimeStrategy {
    /// Otsu binarisation of the spectrogram power.
    Otsu,
    /// Collapse of the carrier's demodulated in-phase/quadrature energy.
    Iq,
    /// A start time, in seconds, supplied by the user.
    Fixed(Real),
}

impl StartTimeStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Otsu => "otsu",
            Self::Iq => "iq",
            Self::Fixed(_) => "fixed",
        }
    }
}

impl Display for StartTimeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(time) => write!(f, "fixed({time})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StartTimeUser {
    Time(Real),
    Name(String),
}

impl TryFrom<StartTimeUser> for StartTimeStrategy {
    type Error = ConfigError;

    fn try_from(value: StartTimeUser) -> Result<Self, Self::Error> {
        match value {
            StartTimeUser::Time(time) => Ok(Self::Fixed(time)),
            StartTimeUser::Name(name) => match name.trim().to_lowercase().as_str() {
                "otsu" => Ok(Self::Otsu),
                "iq" => Ok(Self::Iq),
                other => other
                    .parse::<Real>()
                    .map(Self::Fixed)
                    .map_err(|_| ConfigError::UnknownStartStrategy(name.clone())),
            },
        }
    }
}

impl From<StartTimeStrategy> for StartTimeUser {
    fn from(value: StartTimeStrategy) -> Self {
        match value {
            StartTimeStrategy::Fixed(time) => Self::Time(time),
            other => Self::Name(other.name().to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CarrierFilterType {
    GaussianNotch,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CarrierEstimator {
    /// Magnitude-weighted mean frequency of the bins around the peak.
    Centroid,
    /// Centre frequency of the strongest bin.
    Peak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // Input
    pub header_lines: usize,
    pub time_to_skip: Real,
    pub time_to_take: Option<Real>,

    // Region of interest
    pub start_time_user: StartTimeStrategy,
    pub start_time_correction: Real,
    pub t_before: Real,
    pub t_after: Real,
    pub carrier_band_time: Real,
    pub blur_kernel: (usize, usize),
    pub blur_sigx: Real,
    pub blur_sigy: Real,
    pub iq_threshold_factor: Real,

    // Carrier
    pub carrier_filter_type: CarrierFilterType,
    pub carrier_estimate: CarrierEstimator,
    pub order: i32,
    pub wid: Real,
    pub freq_min: Real,
    pub freq_max: Real,

    // Spectrogram
    pub nperseg: usize,
    pub noverlap: usize,
    pub nfft: usize,
    pub window: crate::spectral::WindowKind,

    // Velocity
    pub lam: Real,
    pub smoothing_window: usize,
    pub smoothing_wid: Real,
    pub smoothing_amp: Real,
    pub smoothing_sigma: Real,
    pub smoothing_mu: Real,
    pub nonfinite_tolerance: Real,

    // Spall
    #[serde(deserialize_with = "deserialize_yes_no")]
    pub spall_calculation: bool,
    pub pb_neighbors: usize,
    pub pb_idx_correction: isize,
    pub rc_neighbors: usize,
    pub rc_idx_correction: isize,
    pub density: Real,
    #[serde(rename = "C0")]
    pub c0: Real,

    // Uncertainty
    pub delta_rho: Real,
    #[serde(rename = "delta_C0")]
    pub delta_c0: Real,
    pub delta_lam: Real,
    pub theta: Real,
    pub delta_theta: Real,
    pub uncert_mult: Real,

    // HEL
    #[serde(deserialize_with = "deserialize_yes_no")]
    pub hel_detection_enabled: bool,
    pub hel_start_time_ns: Real,
    pub hel_end_time_ns: Option<Real>,
    pub hel_angle_threshold_deg: Real,
    pub hel_detection_min_points: usize,
    #[serde(rename = "minimum_HEL_velocity_expected")]
    pub minimum_hel_velocity_expected: Real,
    #[serde(rename = "C_L")]
    pub c_l: Option<Real>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            header_lines: 1,
            time_to_skip: 0.0,
            time_to_take: None,
            start_time_user: StartTimeStrategy::Otsu,
            start_time_correction: 0.0,
            t_before: 5e-9,
            t_after: 5e-8,
            carrier_band_time: 2.5e-7,
            blur_kernel: (5, 5),
            blur_sigx: 0.0,
            blur_sigy: 0.0,
            iq_threshold_factor: 0.4,
            carrier_filter_type: CarrierFilterType::GaussianNotch,
            carrier_estimate: CarrierEstimator::Centroid,
            order: 6,
            wid: 5e7,
            freq_min: 1.5e9,
            freq_max: 4e9,
            nperseg: 512,
            noverlap: 435,
            nfft: 5120,
            window: crate::spectral::WindowKind::Hann,
            lam: 1.547461e-6,
            smoothing_window: 601,
            smoothing_wid: 3.0,
            smoothing_amp: 1.0,
            smoothing_sigma: 1.0,
            smoothing_mu: 0.0,
            nonfinite_tolerance: 0.01,
            spall_calculation: true,
            pb_neighbors: 400,
            pb_idx_correction: 0,
            rc_neighbors: 400,
            rc_idx_correction: 0,
            density: 1730.0,
            c0: 4540.0,
            delta_rho: 9.0,
            delta_c0: 23.0,
            delta_lam: 8e-18,
            theta: 0.0,
            delta_theta: 5.0,
            uncert_mult: 100.0,
            hel_detection_enabled: false,
            hel_start_time_ns: 0.0,
            hel_end_time_ns: None,
            hel_angle_threshold_deg: 45.0,
            hel_detection_min_points: 3,
            minimum_hel_velocity_expected: 10.0,
            c_l: None,
        }
    }
}

impl AnalysisConfig {
    pub fn spectral(&self) -> SpectralConfig {
        SpectralConfig {
            nperseg: self.nperseg,
            noverlap: self.noverlap,
            nfft: self.nfft,
            window: self.window,
        }
    }

    pub fn smoothing(&self) -> SmoothingConfig {
        SmoothingConfig {
            window: self.smoothing_window,
            wid: self.smoothing_wid,
            amp: self.smoothing_amp,
            sigma: self.smoothing_sigma,
            mu: self.smoothing_mu,
        }
    }

    pub fn hel(&self) -> HelConfig {
        HelConfig {
            start_ns: self.hel_start_time_ns,
            end_ns: self.hel_end_time_ns,
            angle_threshold_deg: self.hel_angle_threshold_deg,
            min_points: self.hel_detection_min_points,
            min_velocity: self.minimum_hel_velocity_expected,
            density: Some(self.density),
            acoustic_velocity: Some(self.c0),
            c_l: self.c_l,
        }
    }

    /// Rejects configurations no stage could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("t_after", self.t_after),
            ("carrier_band_time", self.carrier_band_time),
            ("wid", self.wid),
            ("freq_max", self.freq_max),
            ("lam", self.lam),
            ("smoothing_sigma", self.smoothing_sigma),
            ("density", self.density),
            ("C0", self.c0),
        ] {
            positive(name, value)?;
        }
        for (name, value) in [
            ("start_time_correction", self.start_time_correction),
            ("t_before", self.t_before),
            ("freq_min", self.freq_min),
            ("smoothing_wid", self.smoothing_wid),
            ("smoothing_amp", self.smoothing_amp),
            ("smoothing_mu", self.smoothing_mu),
            ("delta_rho", self.delta_rho),
            ("delta_C0", self.delta_c0),
            ("delta_lam", self.delta_lam),
            ("theta", self.theta),
            ("delta_theta", self.delta_theta),
            ("uncert_mult", self.uncert_mult),
            ("hel_start_time_ns", self.hel_start_time_ns),
            ("time_to_skip", self.time_to_skip),
        ] {
            finite(name, value)?;
        }
        if let StartTimeStrategy::Fixed(time) = self.start_time_user {
            finite("start_time_user", time)?;
        }
        if let Some(time_to_take) = self.time_to_take {
            positive("time_to_take", time_to_take)?;
        }
        if let Some(end) = self.hel_end_time_ns {
            finite("hel_end_time_ns", end)?;
        }
        if self.t_before < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "t_before",
                value: self.t_before,
                min: 0.0,
                max: Real::INFINITY,
            });
        }
        if self.freq_min >= self.freq_max {
            return Err(ConfigError::InvertedBand {
                min: self.freq_min,
                max: self.freq_max,
            });
        }
        if self.order < 1 {
            return Err(ConfigError::NotPositive {
                name: "order",
                value: self.order as Real,
            });
        }
        if self.smoothing_window == 0 || self.smoothing_window % 2 == 0 {
            return Err(ConfigError::NotOdd {
                name: "smoothing_window",
                value: self.smoothing_window,
            });
        }
        for (name, value) in [
            ("blur_kernel", self.blur_kernel.0),
            ("blur_kernel", self.blur_kernel.1),
        ] {
            if value % 2 == 0 {
                return Err(ConfigError::NotOdd { name, value });
            }
        }
        in_range("iq_threshold_factor", self.iq_threshold_factor, 0.0, 1.0)?;
        in_range("nonfinite_tolerance", self.nonfinite_tolerance, 0.0, 1.0)?;
        in_range("theta", self.theta, -89.0, 89.0)?;
        if self.hel_detection_min_points == 0 {
            return Err(ConfigError::NotPositive {
                name: "hel_detection_min_points",
                value: 0.0,
            });
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: Real) -> Result<(), ConfigError> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn finite(name: &'static str, value: Real) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { name, value })
    }
}

fn in_range(name: &'static str, value: Real, min: Real, max: Real) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YesNo {
    Flag(bool),
    Word(String),
}

fn deserialize_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match YesNo::deserialize(deserializer)? {
        YesNo::Flag(flag) => Ok(flag),
        YesNo::Word(word) => match word.trim().to_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected \"yes\" or \"no\", got {other:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn reads_original_option_names() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{
                "start_time_user": "iq",
                "carrier_filter_type": "none",
                "spall_calculation": "no",
                "C0": 5000,
                "C_L": 6000,
                "minimum_HEL_velocity_expected": 25,
                "cmap": "viridis",
                "plot_dpi": 300
            }"#,
        )
        .unwrap();
        assert_eq!(config.start_time_user, StartTimeStrategy::Iq);
        assert_eq!(config.carrier_filter_type, CarrierFilterType::None);
        assert!(!config.spall_calculation);
        assert_eq!(config.c0, 5000.0);
        assert_eq!(config.c_l, Some(6000.0));
        assert_eq!(config.minimum_hel_velocity_expected, 25.0);
        assert_eq!(config.nperseg, 512);
    }

    #[test]
    fn numeric_start_time_is_fixed_strategy() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"start_time_user": 7.5e-7}"#).unwrap();
        assert_eq!(config.start_time_user, StartTimeStrategy::Fixed(7.5e-7));
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"start_time_user": "7.5e-7"}"#).unwrap();
        assert_eq!(config.start_time_user, StartTimeStrategy::Fixed(7.5e-7));
    }

    #[test]
    fn unknown_start_strategy_is_rejected() {
        assert!(serde_json::from_str::<AnalysisConfig>(r#"{"start_time_user": "cusum"}"#).is_err());
    }

    #[test]
    fn start_strategy_serializes_back_to_option_values() {
        assert_eq!(
            serde_json::to_string(&StartTimeStrategy::Otsu).unwrap(),
            "\"otsu\""
        );
        assert_eq!(
            serde_json::to_string(&StartTimeStrategy::Fixed(1e-6)).unwrap(),
            "1e-6"
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = AnalysisConfig {
            freq_min: 4e9,
            freq_max: 1e9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBand { .. })
        ));

        let config = AnalysisConfig {
            smoothing_window: 600,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotOdd {
                name: "smoothing_window",
                ..
            })
        ));

        let config = AnalysisConfig {
            lam: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { name: "lam", .. })
        ));
    }
}
