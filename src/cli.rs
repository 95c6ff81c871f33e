//! CLI argument parsing using Clap.

use clap::Parser;
use std::path::PathBuf;

/// Apply a waiver policy to a suite's result file in place
#[derive(Parser, Debug)]
#[command(name = "apply-waivers")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  apply-waivers SCT sct_results.json
  apply-waivers BSA bsa.json waiver.json test_category.json
  apply-waivers STANDALONE standalone.xml --quiet
")]
pub struct Cli {
    /// Suite family the result file belongs to (e.g. SCT, BSA, STANDALONE)
    pub suite_name: String,

    /// Result document to update (.json or .xml)
    pub result_file: PathBuf,

    /// Waiver policy document
    #[arg(env = "WAIVER_FILE", default_value = crate::config::DEFAULT_WAIVER_FILE)]
    pub waiver_file: PathBuf,

    /// Optional test-category document gating which test suites are waivable
    #[arg(env = "TEST_CATEGORY_FILE")]
    pub test_category_file: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Write one JSON line per applied waiver to this file
    #[arg(long, value_name = "PATH")]
    pub log_out: Option<PathBuf>,
}
