use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Layer as _;
use washer::{NoCapture, ResolutionOutcome, Resolver, TruthSet};

use crate::capture::CsvCapture;
use crate::report::Report;

mod capture;
mod parms;
mod report;

/// Entity resolution over delimited reference files: tokenize, correct,
/// block, score and cluster until the similarity threshold closes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Parameter files to run, in order.
    parm_files: Vec<PathBuf>,

    /// A text file listing parameter files to run, one path per line.
    #[arg(long, conflicts_with = "parm_files")]
    parms_list: Option<PathBuf>,

    /// Where the log file, the results report and the data capture folder
    /// are created.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Disable the per-stage CSV capture dumps.
    #[arg(long)]
    no_capture: bool,

    /// Log debug detail.
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let parm_files = gather_parm_files(&cli)?;
    if parm_files.is_empty() {
        bail!("no parameter files given; pass them as arguments or through --parms-list");
    }

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("cannot create output directory {}", cli.output_dir.display()))?;
    let tag = run_tag()?;
    // the log file carries the first input's name, like every other output
    let input_base = peek_input_base(&parm_files[0]).unwrap_or_else(|| "unknown".to_string());
    let log_path = cli.output_dir.join(format!("DWM_Log_{input_base}_{tag}.txt"));
    setup_logging(&log_path, cli.verbose)?;

    info!("datawasher {} run {tag}", env!("CARGO_PKG_VERSION"));
    let started = Instant::now();
    let mut report = Report::new(cli.output_dir.join(format!("DWM_Results_{tag}.csv")));

    for parm_file in &parm_files {
        run_one(parm_file, &cli, &tag, &mut report)?;
    }

    report.write().context("cannot write the results report")?;
    info!("total runtime: {:.2} minutes", started.elapsed().as_secs_f64() / 60.0);
    Ok(())
}

fn run_one(parm_file: &Path, cli: &Cli, tag: &str, report: &mut Report) -> anyhow::Result<()> {
    info!("running parameter file {}", parm_file.display());
    let started = Instant::now();

    let config = parms::read_parms(parm_file)?;
    let base = input_base(&config.input_file);

    let outcome = if cli.no_capture {
        Resolver::new(&config).run(&mut NoCapture)?
    } else {
        let truth = config.truth_file.as_deref().and_then(TruthSet::load);
        let mut capture = CsvCapture::new(
            &cli.output_dir.join("data_capture"),
            &base,
            tag,
            config.clone(),
            truth,
        )?;
        Resolver::new(&config).run(&mut capture)?
    };

    let link_path = cli.output_dir.join(format!("LinkIndex_{base}_{tag}.txt"));
    write_link_index(&link_path, &outcome)
        .with_context(|| format!("cannot write the link index to {}", link_path.display()))?;

    let runtime = started.elapsed().as_secs_f64();
    report.add_run(parm_file, &config, &outcome.state, runtime);
    info!("end of {} after {runtime:.2} seconds", parm_file.display());
    Ok(())
}

fn gather_parm_files(cli: &Cli) -> anyhow::Result<Vec<PathBuf>> {
    match &cli.parms_list {
        Some(list) => {
            let text = std::fs::read_to_string(list)
                .with_context(|| format!("cannot read the parameter list {}", list.display()))?;
            Ok(text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect())
        }
        None => Ok(cli.parm_files.clone()),
    }
}

fn run_tag() -> anyhow::Result<String> {
    let format = format_description!("[year][month][day]_[hour]_[minute]");
    Ok(OffsetDateTime::now_utc().format(&format)?)
}

/// The input file's base name, used to label every output of the run.
fn input_base(input_file: &Path) -> String {
    input_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Pre-scans a parameter file for `inputFileName` so the log file can be
/// named before the file is fully parsed (or logging is even up).
fn peek_input_base(parm_file: &Path) -> Option<String> {
    let text = std::fs::read_to_string(parm_file).ok()?;
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "inputFileName" {
                return Some(input_base(Path::new(value.trim())));
            }
        }
    }
    None
}

fn setup_logging(log_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let log_file = File::create(log_path)
        .with_context(|| format!("cannot create the log file {}", log_path.display()))?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(Targets::new().with_default(level));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(Targets::new().with_default(level));

    tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
    Ok(())
}

/// One `refID,clusterID` line per reference, sorted by external id.
fn write_link_index(path: &Path, outcome: &ResolutionOutcome) -> anyhow::Result<()> {
    let mut rows: Vec<(&str, &str)> = outcome
        .link_index
        .iter()
        .map(|(id, cluster)| {
            (
                outcome.references.name(id).unwrap_or_default(),
                outcome.references.name(cluster).unwrap_or_default(),
            )
        })
        .collect();
    rows.sort_unstable();

    let mut writer = BufWriter::new(File::create(path)?);
    for (ref_name, cluster_name) in rows {
        writeln!(writer, "{ref_name},{cluster_name}")?;
    }
    writer.flush()?;
    Ok(())
}
