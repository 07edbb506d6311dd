use pdv_analysis::{RawRecording, Real, error::RecordingError};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub(crate) enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: expected a time and a voltage column")]
    MissingColumn { line: usize },
    #[error("Line {line}: cannot parse {value:?} as a number")]
    Parse { line: usize, value: String },
    #[error("{0}")]
    Recording(#[from] RecordingError),
}

/// Reads a two column `time,voltage` file after skipping `header_lines`
/// rows, then crops it to the requested span.
pub(crate) fn load_recording(
    path: &Path,
    header_lines: usize,
    time_to_skip: Real,
    time_to_take: Option<Real>,
) -> Result<RawRecording, LoaderError> {
    let (time, voltage) = parse_columns(BufReader::new(File::open(path)?), header_lines)?;
    debug!("Read {} samples from {}", time.len(), path.display());
    Ok(RawRecording::new(time, voltage)?.crop(time_to_skip, time_to_take)?)
}

fn parse_columns<R: BufRead>(
    reader: R,
    header_lines: usize,
) -> Result<(Vec<Real>, Vec<Real>), LoaderError> {
    let mut time = Vec::new();
    let mut voltage = Vec::new();
    for (index, line) in reader.lines().enumerate().skip(header_lines) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty());
        let mut next = || {
            let value = fields
                .next()
                .ok_or(LoaderError::MissingColumn { line: index + 1 })?;
            value.parse::<Real>().map_err(|_| LoaderError::Parse {
                line: index + 1,
                value: value.to_owned(),
            })
        };
        time.push(next()?);
        voltage.push(next()?);
    }
    Ok((time, voltage))
}
