use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, TimeDelta};
use itertools::Itertools;
use pdv_analysis::{AnalysisConfig, AnalysisOutput, Real, RunSummary};
use serde_json::Value;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

/// Header fields of the results file, followed by the run summary.
#[derive(Serialize)]
pub(crate) struct RunRecord<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "File Name")]
    file_name: &'a str,
    /// Seconds
    #[serde(rename = "Run Time")]
    run_time: Real,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

impl<'a> RunRecord<'a> {
    pub(crate) fn new(
        file_name: &'a str,
        started: DateTime<Local>,
        run_time: TimeDelta,
        summary: &'a RunSummary,
    ) -> Self {
        Self {
            date: started.format("%b %d %Y").to_string(),
            time: started.format("%I:%M %p").to_string(),
            file_name,
            run_time: run_time.num_milliseconds() as Real / 1e3,
            summary,
        }
    }
}

/// Writes `rows` as comma separated lines.
fn write_rows<I, R>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = Real>,
{
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
    );
    for row in rows {
        writeln!(writer, "{}", row.into_iter().join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// `name,value` rows of every analysis option, values holding a comma
/// quoted.
fn input_rows(config: &AnalysisConfig) -> Result<Vec<String>> {
    let Value::Object(options) = serde_json::to_value(config)? else {
        bail!("Analysis options do not serialise to a map");
    };
    Ok(options
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            if value.contains(',') {
                format!("{name},\"{}\"", value.replace('"', "\"\""))
            } else {
                format!("{name},{value}")
            }
        })
        .collect())
}

fn write_inputs(path: &Path, config: &AnalysisConfig) -> Result<()> {
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
    );
    for row in input_rows(config)? {
        writeln!(writer, "{row}")?;
    }
    writer.flush()?;
    Ok(())
}

fn output_path(out_dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!("{stem}{suffix}"))
}

/// Saves the analysis options, the velocity, voltage, noise and uncertainty
/// traces and the results record of one run into `out_dir`. The voltage
/// trace is the carrier-filtered signal over the whole recording.
pub(crate) fn save_run(
    out_dir: &Path,
    file_name: &str,
    output: &AnalysisOutput,
    config: &AnalysisConfig,
    record: &RunRecord,
) -> Result<()> {
    write_inputs(&output_path(out_dir, file_name, "--inputs.csv"), config)?;

    let velocity = &output.velocity;
    let uncertainty = &output.uncertainty;
    let time = &velocity.time_f;
    let pairs = |values: &[Real]| {
        time.iter()
            .zip(values)
            .map(|(&t, &v)| [t, v])
            .collect::<Vec<_>>()
    };

    write_rows(
        &output_path(out_dir, file_name, "--velocity.csv"),
        pairs(&velocity.velocity_f),
    )?;
    write_rows(
        &output_path(out_dir, file_name, "--velocity--smooth.csv"),
        pairs(&velocity.velocity_f_smooth),
    )?;
    write_rows(
        &output_path(out_dir, file_name, "--voltage.csv"),
        output
            .doi
            .recording
            .time()
            .iter()
            .zip(&output.filter.voltage_filt)
            .map(|(&t, z)| [t, z.re, z.im]),
    )?;
    write_rows(
        &output_path(out_dir, file_name, "--noisefrac.csv"),
        pairs(&uncertainty.noise_fraction),
    )?;
    write_rows(
        &output_path(out_dir, file_name, "--veluncert.csv"),
        pairs(&uncertainty.velocity_uncertainty),
    )?;

    let results_path = output_path(out_dir, file_name, "--results.json");
    let file = File::create(&results_path)
        .with_context(|| format!("Cannot create {}", results_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), record)?;
    info!("Saved outputs for {file_name} to {}", out_dir.display());
    Ok(())
}
