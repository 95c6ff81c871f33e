//! Run configuration resolved from the command line.

use crate::cli::Cli;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Policy file used when none is given.
pub const DEFAULT_WAIVER_FILE: &str = "waiver.json";

/// Physical encoding of a result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Xml,
}

impl DocumentFormat {
    /// Dispatch on the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("xml") => Ok(Self::Xml),
            _ => Err(Error::unsupported_format(path)),
        }
    }
}

/// Everything one waiver-application job needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub suite_name: String,
    pub result_file: PathBuf,
    pub waiver_file: PathBuf,
    pub test_category_file: Option<PathBuf>,
    pub format: DocumentFormat,
    pub log_out: Option<PathBuf>,
}

impl ApplyOptions {
    /// Options with the default policy file and no category gating.
    pub fn new(suite_name: impl Into<String>, result_file: impl Into<PathBuf>) -> Result<Self> {
        let result_file = result_file.into();
        let format = DocumentFormat::from_path(&result_file)?;
        Ok(Self {
            suite_name: suite_name.into(),
            result_file,
            waiver_file: PathBuf::from(DEFAULT_WAIVER_FILE),
            test_category_file: None,
            format,
            log_out: None,
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.suite_name.trim().is_empty() {
            return Err(Error::config("suite name must not be empty"));
        }
        let mut options = Self::new(cli.suite_name.trim(), cli.result_file.clone())?;
        options.waiver_file.clone_from(&cli.waiver_file);
        options.test_category_file.clone_from(&cli.test_category_file);
        options.log_out.clone_from(&cli.log_out);
        Ok(options)
    }

    #[must_use]
    pub fn with_waiver_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.waiver_file = path.into();
        self
    }

    #[must_use]
    pub fn with_test_category_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_category_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_log_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_out = Some(path.into());
        self
    }
}
