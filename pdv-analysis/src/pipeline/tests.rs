use super::*;
use crate::{CarrierFilterType, StartTimeStrategy, velocity::baseline_samples};
use assert_approx_eq::assert_approx_eq;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;

const SAMPLE_RATE: Real = 20e9;
const SAMPLES: usize = 6000;
const CARRIER: Real = 2.0e9;
const WAVELENGTH: Real = 1.547461e-6;
const IMPACT: Real = 100e-9;

/// Free-surface velocity of a spalling sample: a shock to 600 m/s, pullback
/// to 400 m/s, recompression to 500 m/s and a release back to 400 m/s.
fn surface_velocity(t: Real) -> Real {
    let ns = t * 1e9;
    let ramp = |t0: Real, v0: Real, t1: Real, v1: Real| v0 + (v1 - v0) * (ns - t0) / (t1 - t0);
    match ns {
        ns if ns < 100.0 => 0.0,
        ns if ns < 104.0 => ramp(100.0, 0.0, 104.0, 600.0),
        ns if ns < 125.0 => ramp(104.0, 600.0, 125.0, 400.0),
        ns if ns < 135.0 => ramp(125.0, 400.0, 135.0, 500.0),
        ns if ns < 180.0 => ramp(135.0, 500.0, 180.0, 400.0),
        _ => 400.0,
    }
}

/// Beat signal whose instantaneous frequency is `CARRIER + v/λ`, with a
/// weak carrier reflection once the surface moves and seeded white noise.
fn synthetic_recording() -> RawRecording {
    let mut rng = StdRng::seed_from_u64(1234);
    let noise = Normal::new(0.0, 0.002).unwrap();
    let time: Vec<Real> = (0..SAMPLES).map(|i| i as Real / SAMPLE_RATE).collect();
    let mut phase: Real = 0.0;
    let voltage = time
        .iter()
        .map(|&t| {
            let mut v = phase.cos() + noise.sample(&mut rng);
            if t >= IMPACT {
                v += 0.2 * (TAU * CARRIER * t).cos();
            }
            phase += TAU * (CARRIER + surface_velocity(t) / WAVELENGTH) / SAMPLE_RATE;
            v
        })
        .collect();
    RawRecording::new(time, voltage).unwrap()
}

fn config(start_time_user: StartTimeStrategy) -> AnalysisConfig {
    AnalysisConfig {
        start_time_user,
        nperseg: 256,
        noverlap: 224,
        nfft: 1024,
        freq_min: 1.0e9,
        freq_max: 4.5e9,
        carrier_band_time: 50e-9,
        t_before: 10e-9,
        t_after: 80e-9,
        smoothing_window: 101,
        pb_neighbors: 100,
        rc_neighbors: 100,
        ..Default::default()
    }
}

#[test]
fn otsu_run_recovers_start_and_carrier() {
    let recording = synthetic_recording();
    let output = run(&recording, &config(StartTimeStrategy::Otsu)).unwrap();

    assert_approx_eq!(output.doi.t_start_corrected, IMPACT, 10e-9);
    assert_approx_eq!(
        output.carrier_frequency,
        CARRIER,
        2.0 * output.doi.frequency_resolution
    );
    let time = recording.time();
    assert!(output.doi.t_doi_start < output.doi.t_doi_end);
    assert!(output.doi.t_doi_start >= time[0]);
    assert!(output.doi.t_doi_end <= time[SAMPLES - 1]);
    assert!(output.doi.band.contains(&output.doi.carrier_top_index));
}

#[test]
fn iq_run_recovers_start() {
    let recording = synthetic_recording();
    let output = run(&recording, &config(StartTimeStrategy::Iq)).unwrap();
    assert_approx_eq!(output.doi.t_start_detected, IMPACT, 10e-9);
    assert!(output.doi.band.contains(&output.doi.carrier_top_index));
}

#[test]
fn fixed_start_reports_the_carrier_row() {
    let recording = synthetic_recording();
    let output = run(&recording, &config(StartTimeStrategy::Fixed(IMPACT))).unwrap();
    let doi = &output.doi;
    assert!(doi.band.contains(&doi.carrier_top_index));
    assert_approx_eq!(
        doi.spectrogram.f()[doi.carrier_top_index],
        CARRIER,
        2.0 * doi.frequency_resolution
    );
}

#[test]
fn velocity_follows_the_surface() {
    let recording = synthetic_recording();
    let output = run(&recording, &config(StartTimeStrategy::Fixed(IMPACT))).unwrap();
    let velocity = &output.velocity;

    assert_eq!(velocity.velocity_f.len(), velocity.len());
    assert_eq!(velocity.velocity_f_smooth.len(), velocity.len());
    assert_eq!(output.uncertainty.velocity_uncertainty.len(), velocity.len());
    assert!(velocity.time_f.windows(2).all(|pair| pair[0] < pair[1]));

    let baseline = &velocity.velocity_f_smooth[..baseline_samples(velocity.len())];
    assert_approx_eq!(crate::mean(baseline), 0.0, 1e-9);

    let sample = velocity.time_f.partition_point(|&t| t < 118e-9);
    assert_approx_eq!(
        velocity.velocity_f_smooth[sample],
        surface_velocity(velocity.time_f[sample]),
        30.0
    );
    assert!(
        output
            .uncertainty
            .velocity_uncertainty
            .iter()
            .all(|sigma| sigma.is_finite() && *sigma >= 0.0)
    );
}

#[test]
fn spall_features_are_found() {
    let recording = synthetic_recording();
    let config = config(StartTimeStrategy::Fixed(IMPACT));
    let output = run(&recording, &config).unwrap();
    let spall = &output.spall;

    assert!(spall.max_compression.is_resolved());
    assert!(spall.max_tension.is_resolved());
    assert!(spall.recompression.is_resolved());
    assert!((100e-9..=112e-9).contains(&spall.max_compression.time));
    assert!((118e-9..=130e-9).contains(&spall.max_tension.time));
    assert!((128e-9..=142e-9).contains(&spall.recompression.time));
    assert!(spall.max_compression.velocity > 500.0);
    assert_approx_eq!(spall.max_tension.velocity, 400.0, 30.0);
    assert!(spall.spall_strength_est > 0.0);
    assert!(spall.strain_rate_est > 0.0);
    assert!(output.bounds.spall_uncertainty > 0.0);
    assert!(output.hel.is_none());

    let summary = output.summary(&config);
    assert_eq!(summary.spall_strength, spall.spall_strength_est);
    assert_eq!(summary.peak_shock_stress, spall.peak_shock_stress);
    assert!(summary.peak_shock_stress > 0.0);
    assert_approx_eq!(
        summary.spect_velocity_res,
        0.5 * WAVELENGTH * output.doi.frequency_resolution
    );
    assert!(summary.hel.is_none());
}

#[test]
fn repeated_runs_are_bit_identical() {
    let recording = synthetic_recording();
    let config = AnalysisConfig {
        hel_detection_enabled: true,
        ..config(StartTimeStrategy::Fixed(IMPACT))
    };
    let first = run(&recording, &config).unwrap();
    let second = run(&recording, &config).unwrap();

    assert_eq!(first.velocity, second.velocity);
    assert_eq!(format!("{:?}", first.spall), format!("{:?}", second.spall));
    assert_eq!(format!("{:?}", first.bounds), format!("{:?}", second.bounds));
    assert_eq!(format!("{:?}", first.hel), format!("{:?}", second.hel));
    assert!(first.hel.is_some());
}

#[test]
fn unfiltered_carrier_still_yields_velocity() {
    let recording = synthetic_recording();
    let config = AnalysisConfig {
        carrier_filter_type: CarrierFilterType::None,
        ..config(StartTimeStrategy::Fixed(IMPACT))
    };
    let output = run(&recording, &config).unwrap();
    assert_eq!(output.filter.voltage_filt.len(), recording.len());
    assert!(output.velocity.velocity_f_smooth.iter().all(|v| v.is_finite()));
}

#[test]
fn missing_features_degrade_to_unresolved() {
    let recording = synthetic_recording();
    let config = AnalysisConfig {
        pb_idx_correction: 100_000,
        ..config(StartTimeStrategy::Fixed(IMPACT))
    };
    let output = run(&recording, &config).unwrap();
    assert!(!output.spall.max_compression.is_resolved());
    assert!(!output.spall.max_tension.is_resolved());
    assert!(output.spall.spall_strength_est.is_nan());
    assert!(output.bounds.spall_uncertainty.is_nan());
    assert!(!output.velocity.is_empty());
}

#[test]
fn invalid_configuration_fails_before_any_stage() {
    let recording = synthetic_recording();
    let config = AnalysisConfig {
        smoothing_window: 100,
        ..config(StartTimeStrategy::Otsu)
    };
    assert!(matches!(
        run(&recording, &config),
        Err(crate::PipelineError::Config(_))
    ));
}

#[test]
fn start_outside_the_recording_is_fatal() {
    let recording = synthetic_recording();
    let error = run(&recording, &config(StartTimeStrategy::Fixed(1e-3))).unwrap_err();
    assert!(error.is_detection_failure());
    assert_eq!(error.stage(), Some(crate::Stage::FindDoi));
}
