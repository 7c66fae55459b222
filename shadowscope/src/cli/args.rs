//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::analysis::DEFAULT_LEAF_BINS;

#[derive(Parser)]
#[command(
    name = "shadowscope",
    version,
    about = "Aggregate trace timelines into zoomable shadow summaries",
    after_help = "\
EXAMPLES:
    shadowscope convert trace.json -o trace.shsc       Chrome trace to container
    shadowscope summary trace.shsc --json              Per-category statistics
    shadowscope validate trace.shsc                    Check time causality"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a Chrome Trace Event JSON file into a container with shadows
    Convert {
        /// Chrome trace (`{"traceEvents": [...]}` or a bare event array)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Container file to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Leaf bins of the shadow pyramid (power of two)
        #[arg(long, default_value_t = DEFAULT_LEAF_BINS)]
        leaf_bins: usize,

        /// Write the container little endian instead of network order
        #[arg(long)]
        little_endian: bool,
    },

    /// Print per-category statistics of a container
    Summary {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check every drawable of a container for causality violations
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}
