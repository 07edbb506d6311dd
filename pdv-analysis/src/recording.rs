use crate::{Real, error::RecordingError};
use itertools::Itertools;
use tracing::debug;

/// Relative deviation of a sample interval from the mean interval that is
/// still considered uniform sampling.
const SAMPLING_TOLERANCE: Real = 1e-3;

/// A single voltage trace with its time axis, in seconds and volts.
///
/// The only way to construct one is [RawRecording::new], so every instance
/// is known to be uniformly sampled, finite and strictly increasing in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecording {
    time: Vec<Real>,
    voltage: Vec<Real>,
    sample_rate: Real,
}

impl RawRecording {
    pub fn new(time: Vec<Real>, voltage: Vec<Real>) -> Result<Self, RecordingError> {
        if time.len() != voltage.len() {
            return Err(RecordingError::LengthMismatch {
                time: time.len(),
                voltage: voltage.len(),
            });
        }
        if time.len() < 2 {
            return Err(RecordingError::TooShort(time.len()));
        }
        if let Some(index) = time
            .iter()
            .zip(&voltage)
            .position(|(t, v)| !t.is_finite() || !v.is_finite())
        {
            return Err(RecordingError::NonFinite(index));
        }

        let steps = time.iter().tuple_windows().map(|(prev, next)| next - prev);
        if let Some(index) = steps.clone().position(|step| step <= 0.0) {
            return Err(RecordingError::NonMonotonicTime(index + 1));
        }
        let mean_step = steps.clone().sum::<Real>() / (time.len() - 1) as Real;
        if let Some(index) = steps.clone().position(|step| {
            ((step - mean_step) / mean_step).abs() > SAMPLING_TOLERANCE
        }) {
            return Err(RecordingError::NonUniformSampling {
                index: index + 1,
                mean_step,
            });
        }

        Ok(Self {
            time,
            voltage,
            sample_rate: 1.0 / mean_step,
        })
    }

    pub fn time(&self) -> &[Real] {
        &self.time
    }

    pub fn voltage(&self) -> &[Real] {
        &self.voltage
    }

    /// Samples per second, `1/mean(diff(time))`.
    pub fn sample_rate(&self) -> Real {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Returns the part of the recording starting `time_to_skip` seconds in
    /// and lasting `time_to_take` seconds, or running to the end when
    /// `time_to_take` is `None`.
    pub fn crop(
        &self,
        time_to_skip: Real,
        time_to_take: Option<Real>,
    ) -> Result<Self, RecordingError> {
        let skip = (time_to_skip.max(0.0) * self.sample_rate).round() as usize;
        let take = time_to_take
            .map(|duration| (duration * self.sample_rate).round() as usize)
            .unwrap_or(usize::MAX);
        let end = skip.saturating_add(take).min(self.len());
        if end.saturating_sub(skip) < 2 {
            return Err(RecordingError::CropOutOfRange {
                skip,
                len: self.len(),
            });
        }
        debug!("Cropping recording to samples {skip}..{end} of {}", self.len());
        Self::new(
            self.time.get(skip..end).unwrap_or_default().to_vec(),
            self.voltage.get(skip..end).unwrap_or_default().to_vec(),
        )
    }
}
