//! One waiver-application job: read, resolve, recompute, persist.

use crate::adapters::parse_document;
use crate::category::TestCategories;
use crate::config::ApplyOptions;
use crate::engine::{ApplyReport, WaiverDecision, WaiverEngine};
use crate::error::{Error, Result};
use crate::family::SuiteFamily;
use crate::policy::WaiverIndex;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// What a job did to its result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The policy has nothing for this suite; the file was not touched.
    NoWaivers,
    /// The file was rewritten.
    Applied(ApplyReport),
}

/// Result of one job in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub options: ApplyOptions,
    pub result: Result<ApplyOutcome>,
}

/// Apply the waiver policy named by `options` to its result file.
///
/// Input errors abort before anything is written. Policy and category
/// problems degrade to "no waivers" / "no gating".
pub fn apply_waivers(options: &ApplyOptions) -> Result<ApplyOutcome> {
    let path = &options.result_file;
    let content = fs::read_to_string(path)
        .map_err(|e| Error::input(format!("cannot read {}: {e}", path.display())))?;
    let family = SuiteFamily::from_name(&options.suite_name);
    let mut document = parse_document(&content, options.format, family)?;

    let index = WaiverIndex::from_path(&options.waiver_file, &options.suite_name);
    let categories = options
        .test_category_file
        .as_deref()
        .and_then(TestCategories::from_path);

    let engine = WaiverEngine::new(&options.suite_name, &index, categories.as_ref());
    if !engine.has_waivers() {
        tracing::info!(suite = %options.suite_name, "no waivers found for suite");
        return Ok(ApplyOutcome::NoWaivers);
    }

    let report = engine.apply(&mut *document);
    write_atomic(path, &document.to_bytes()?)?;

    if let Some(log_out) = &options.log_out {
        if let Err(err) = write_decision_log(log_out, options, &report.decisions) {
            tracing::warn!(path = %log_out.display(), "decision log not written: {err}");
        }
    }

    tracing::info!(
        suite = %options.suite_name,
        path = %path.display(),
        waived = report.waived_total(),
        skipped_entities = report.entities_skipped,
        "waivers applied"
    );
    Ok(ApplyOutcome::Applied(report))
}

/// Run independent jobs in order. A failing job never stops the others.
pub fn apply_batch(jobs: &[ApplyOptions]) -> Vec<BatchItem> {
    jobs.iter()
        .map(|options| {
            let result = apply_waivers(options);
            if let Err(err) = &result {
                tracing::error!(
                    suite = %options.suite_name,
                    path = %options.result_file.display(),
                    "waiver job failed: {err}"
                );
            }
            BatchItem {
                options: options.clone(),
                result,
            }
        })
        .collect()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::write(path, e.to_string()))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| Error::write(path, e.to_string()))?;
    tmp.persist(path)
        .map(|_| ())
        .map_err(|e| Error::write(path, e.error.to_string()))
}

#[derive(Serialize)]
struct DecisionRecord<'a> {
    applied_at: String,
    suite: &'a str,
    result_file: String,
    #[serde(flatten)]
    decision: &'a WaiverDecision,
}

fn write_decision_log(
    path: &Path,
    options: &ApplyOptions,
    decisions: &[WaiverDecision],
) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    let applied_at = chrono::Utc::now().to_rfc3339();
    for decision in decisions {
        let record = DecisionRecord {
            applied_at: applied_at.clone(),
            suite: &options.suite_name,
            result_file: options.result_file.display().to_string(),
            decision,
        };
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
