use crate::Real;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    #[strum(to_string = "stft")]
    Stft,
    #[strum(to_string = "find_doi")]
    FindDoi,
    #[strum(to_string = "estimate_frequency")]
    CarrierFrequency,
    #[strum(to_string = "calculate_velocity")]
    Velocity,
    #[strum(to_string = "instantaneous_uncertainty")]
    InstantaneousUncertainty,
    #[strum(to_string = "analyse_spall")]
    Spall,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: Real },
    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: Real },
    #[error("{name} must be odd, got {value}")]
    NotOdd { name: &'static str, value: usize },
    #[error("{name} must lie in {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: Real,
        min: Real,
        max: Real,
    },
    #[error("freq_min ({min}) must be below freq_max ({max})")]
    InvertedBand { min: Real, max: Real },
    #[error("Unknown start_time_user {0:?}, expected \"otsu\", \"iq\" or a time in seconds")]
    UnknownStartStrategy(String),
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Time and voltage lengths differ: {time} != {voltage}")]
    LengthMismatch { time: usize, voltage: usize },
    #[error("Recording needs at least 2 samples, got {0}")]
    TooShort(usize),
    #[error("Non-finite sample at index {0}")]
    NonFinite(usize),
    #[error("Time is not strictly increasing at index {0}")]
    NonMonotonicTime(usize),
    #[error("Sample interval at index {index} deviates from the mean interval {mean_step}")]
    NonUniformSampling { index: usize, mean_step: Real },
    #[error("Cropping {skip} samples leaves nothing of a {len} sample recording")]
    CropOutOfRange { skip: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("Segment length must be positive")]
    ZeroSegmentLength,
    #[error("Overlap {noverlap} must be less than the segment length {nperseg}")]
    OverlapTooLarge { noverlap: usize, nperseg: usize },
    #[error("FFT length {nfft} is shorter than the segment length {nperseg}")]
    FftTooShort { nfft: usize, nperseg: usize },
    #[error("Signal of {len} samples is shorter than one segment of {nperseg}")]
    SignalTooShort { len: usize, nperseg: usize },
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("No signal start found by the {0} strategy")]
    NoSignalStart(&'static str),
    #[error("Spectrogram power is flat over the frequency band")]
    FlatSpectrogram,
    #[error("Frequency band {min}..{max} Hz selects no spectrogram rows")]
    EmptyBand { min: Real, max: Real },
    #[error("Start time {time} lies outside the recording {first}..={last}")]
    StartOutOfRange { time: Real, first: Real, last: Real },
    #[error("Region of interest {start}..{end} holds only {samples} samples")]
    DegenerateWindow {
        start: Real,
        end: Real,
        samples: usize,
    },
    #[error("No carrier-only spectrogram columns precede the signal start {0}")]
    NoPreSignalCarrier(Real),
    #[error("Carrier band holds no spectral power")]
    NoCarrierPower,
}

#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("{count} of {total} samples are non-finite")]
    NonFinite { count: usize, total: usize },
    #[error(
        "Padding of {required} samples on each side of {start}..{end} exceeds the {len} sample recording"
    )]
    InsufficientPadding {
        required: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("Length mismatch between {what}: {expected} != {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid recording: {0}")]
    Recording(#[from] RecordingError),
    #[error("{0} at {1}")]
    Spectral(SpectralError, Stage),
    #[error("{0} at {1}")]
    Detection(DetectionError, Stage),
    #[error("{0} at {1}")]
    Numerical(NumericalError, Stage),
}

impl PipelineError {
    /// True for the detection failures that end a run because no region of
    /// interest (and therefore no velocity) exists.
    pub fn is_detection_failure(&self) -> bool {
        matches!(self, Self::Detection(..))
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Config(_) | Self::Recording(_) => None,
            Self::Spectral(_, stage) | Self::Detection(_, stage) | Self::Numerical(_, stage) => {
                Some(*stage)
            }
        }
    }
}
