mod loader;
mod saving;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use loader::load_recording;
use pdv_analysis::{AnalysisConfig, pipeline};
use pdv_common::init_tracer;
use saving::{RunRecord, save_run};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::{error, info, info_span, level_filters::LevelFilter, warn};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// JSON file of analysis options; defaults are used for any option it omits
    #[clap(long)]
    config: Option<PathBuf>,

    /// Recordings to analyse, as paths or glob patterns
    #[clap(required = true)]
    recordings: Vec<String>,

    /// Directory the outputs are written to
    #[clap(long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the velocity, voltage and uncertainty traces and the results file
    #[clap(long)]
    save: bool,

    /// Log level used when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Cannot open config file {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Cannot parse config file {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Expands each pattern, keeping patterns that match nothing as literal
/// paths so a missing file is reported when it is opened.
fn expand_recordings(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matched = glob::glob(pattern)
            .with_context(|| format!("Invalid pattern {pattern}"))?
            .collect::<Result<Vec<_>, _>>()?;
        if matched.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            paths.extend(matched);
        }
    }
    Ok(paths)
}

fn process_recording(path: &Path, config: &AnalysisConfig, args: &Cli) -> Result<()> {
    let started = Local::now();
    let recording = load_recording(
        path,
        config.header_lines,
        config.time_to_skip,
        config.time_to_take,
    )
    .with_context(|| format!("Cannot load {}", path.display()))?;

    let output = pipeline::run(&recording, config)?;
    let summary = output.summary(config);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let run_time = Local::now() - started;
    info!(
        "Spall strength {:.4e} Pa, strain rate {:.4e} 1/s, run time {} ms",
        summary.spall_strength,
        summary.strain_rate,
        run_time.num_milliseconds()
    );

    if args.save {
        let record = RunRecord::new(&file_name, started, run_time, &summary);
        save_run(&args.output_dir, &file_name, &output, config, &record)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let _tracer = init_tracer!(args.log_level);

    let config = load_config(args.config.as_deref())?;
    let recordings = expand_recordings(&args.recordings)?;
    if args.save {
        std::fs::create_dir_all(&args.output_dir).with_context(|| {
            format!("Cannot create output directory {}", args.output_dir.display())
        })?;
    }

    let mut failures = 0;
    for path in &recordings {
        let _guard = info_span!("recording", path = %path.display()).entered();
        if let Err(e) = process_recording(path, &config, &args) {
            error!("{e:#}");
            failures += 1;
        }
    }

    if failures == recordings.len() {
        bail!("No recording could be analysed");
    }
    if failures > 0 {
        warn!("{failures} of {} recordings failed", recordings.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_patterns_are_kept_as_paths() {
        let paths = expand_recordings(&["no-such-dir/*.csv".to_owned()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("no-such-dir/*.csv")]);
    }

    #[test]
    fn cli_requires_a_recording() {
        assert!(Cli::try_parse_from(["pdv-to-spall"]).is_err());
        let args = Cli::try_parse_from(["pdv-to-spall", "--save", "shot.csv"]).unwrap();
        assert!(args.save);
        assert_eq!(args.recordings, vec!["shot.csv".to_owned()]);
        assert_eq!(args.log_level, LevelFilter::INFO);
    }
}
