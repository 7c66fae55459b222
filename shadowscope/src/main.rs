//! # shadowscope - Main Entry Point
//!
//! - **convert**: Chrome trace → container with real drawables and shadows
//! - **summary**: per-category statistics of a container
//! - **validate**: causality checks, nonzero exit on violations

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::Path;

use shadowscope::analysis::{validate_drawables, Pyramid, PyramidConfig, TraceSummary};
use shadowscope::cli::{Args, Command};
use shadowscope::convert::convert_file;
use shadowscope::export::{LogFile, LogFileExporter};
use shadowscope_common::ByteOrder;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_INVALID: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<i32> {
    let args = Args::parse();
    let quiet = args.quiet;

    match args.command {
        Command::Convert { input, output, leaf_bins, little_endian } => {
            let order = if little_endian { ByteOrder::LittleEndian } else { ByteOrder::BigEndian };
            convert(&input, &output, leaf_bins, order, quiet)?;
            Ok(EXIT_SUCCESS)
        }
        Command::Summary { file, json } => {
            summary(&file, json)?;
            Ok(EXIT_SUCCESS)
        }
        Command::Validate { file } => validate(&file, quiet),
    }
}

fn convert(input: &Path, output: &Path, leaf_bins: usize, order: ByteOrder, quiet: bool) -> Result<()> {
    let config = PyramidConfig::new(leaf_bins)?;
    let mut trace =
        convert_file(input).with_context(|| format!("Failed to convert {}", input.display()))?;
    info!(
        "Read {} drawables on {} rows from {}",
        trace.drawables.len(),
        trace.lines.len(),
        input.display()
    );
    if trace.dropped > 0 {
        warn!("{} events could not be paired and were dropped", trace.dropped);
    }

    let report = validate_drawables(&trace.drawables, &trace.table);
    for error in &report.errors {
        warn!("{error}");
    }

    let pyramid = Pyramid::build(&trace.drawables, &config).context("Failed to build shadow pyramid")?;
    pyramid.accumulate_summaries(&mut trace.table);
    let depth = pyramid.depth();

    let mut exporter = LogFileExporter::new(order);
    exporter.extend(trace.drawables);
    exporter.extend(pyramid.into_shadows().into_iter().map(Into::into));
    exporter
        .export_to_file(&mut trace.table, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        println!("wrote: {}", output.display());
        println!("drawables: {} ({depth} pyramid levels)", exporter.drawable_count());
    }
    Ok(())
}

fn open(file: &Path) -> Result<LogFile> {
    let mut log = LogFile::open(file).with_context(|| format!("Failed to read {}", file.display()))?;
    log.resolve_categories();
    Ok(log)
}

fn summary(file: &Path, json: bool) -> Result<()> {
    let log = open(file)?;
    let summary = TraceSummary::new(&log.drawables, &log.table);

    if json {
        let out = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{out}");
        return Ok(());
    }

    println!("window: [{:.6}, {:.6}] s", summary.earliest, summary.latest);
    println!("drawables: {} real, {} shadows", summary.real_drawables, summary.shadows);
    println!();
    println!("{:<24} {:>8} {:>8} {:>8}", "CATEGORY", "INCL", "EXCL", "COUNT");
    for row in &summary.categories {
        println!(
            "{:<24} {:>7.1}% {:>7.1}% {:>8}",
            row.name,
            row.inclusive_ratio * 100.0,
            row.exclusive_ratio * 100.0,
            row.count
        );
    }
    Ok(())
}

fn validate(file: &Path, quiet: bool) -> Result<i32> {
    let log = open(file)?;
    let report = validate_drawables(&log.drawables, &log.table);

    for warning in &report.warnings {
        warn!("{warning}");
    }
    for error in &report.errors {
        eprintln!("violation: {error}");
    }
    if !quiet {
        println!(
            "{} drawables, {} violations, {} warnings",
            log.drawables.len(),
            report.errors.len(),
            report.warnings.len()
        );
    }
    Ok(if report.is_valid() { EXIT_SUCCESS } else { EXIT_INVALID })
}
