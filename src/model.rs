//! Format-independent view of a suite's results.
//!
//! Adapters snapshot their physical document into [`Entity`] / [`Leaf`]
//! values; the engine decides on those snapshots and hands mutations back to
//! the adapter, which persists them into the underlying tree.

use serde::Serialize;
use std::iter::Sum;
use std::ops::AddAssign;

/// Annotation appended to waived fail reasons and scalar statuses.
pub const WAIVER_MARKER: &str = "(WITH WAIVER)";

/// Status text used by result encodings that replace rather than annotate.
pub const WAIVED_STATUS: &str = "FAILED_WITH_WAIVER";

// ────────────────────────────────────────────────────────────────────────────
// Counters
// ────────────────────────────────────────────────────────────────────────────

/// Aggregate outcome counters.
///
/// `failed` always includes `failed_with_waiver`: waiving moves a failure into
/// the waived sub-bucket without removing it from the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub passed: u64,
    pub failed: u64,
    pub failed_with_waiver: u64,
    pub aborted: u64,
    pub skipped: u64,
    pub warnings: u64,
}

impl Counters {
    /// Failures that are not covered by a waiver.
    #[must_use]
    pub const fn unwaived_failed(&self) -> u64 {
        self.failed.saturating_sub(self.failed_with_waiver)
    }
}

impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.passed = self.passed.saturating_add(rhs.passed);
        self.failed = self.failed.saturating_add(rhs.failed);
        self.failed_with_waiver = self.failed_with_waiver.saturating_add(rhs.failed_with_waiver);
        self.aborted = self.aborted.saturating_add(rhs.aborted);
        self.skipped = self.skipped.saturating_add(rhs.skipped);
        self.warnings = self.warnings.saturating_add(rhs.warnings);
    }
}

impl Sum for Counters {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, item| {
            acc += item;
            acc
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Leaf outcomes
// ────────────────────────────────────────────────────────────────────────────

/// Classification of a scalar status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    Aborted,
    Skipped,
    Warning,
    Other,
}

impl Status {
    /// Classify by substring, failures first.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        if upper.contains("FAIL") {
            Self::Failed
        } else if upper.contains("ABORTED") {
            Self::Aborted
        } else if upper.contains("SKIPPED") {
            Self::Skipped
        } else if upper.contains("WARNING") {
            Self::Warning
        } else if upper.contains("PASS") {
            Self::Passed
        } else {
            Self::Other
        }
    }
}

/// Single status string, e.g. `"FAILED"` or `"FAILURE (WITH WAIVER)"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarResult {
    pub text: String,
}

impl ScalarResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::classify(&self.text)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    #[must_use]
    pub fn is_waived(&self) -> bool {
        let upper = self.text.to_ascii_uppercase();
        upper.contains(WAIVER_MARKER) || upper.contains(WAIVED_STATUS)
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        let mut counters = Counters::default();
        match self.status() {
            Status::Passed => counters.passed = 1,
            Status::Failed => {
                counters.failed = 1;
                if self.is_waived() {
                    counters.failed_with_waiver = 1;
                }
            }
            Status::Aborted => counters.aborted = 1,
            Status::Skipped => counters.skipped = 1,
            Status::Warning => counters.warnings = 1,
            Status::Other => {}
        }
        counters
    }

    fn mark_waived(&mut self) {
        if !self.is_waived() {
            self.text.push(' ');
            self.text.push_str(WAIVER_MARKER);
        }
    }
}

/// Counter block describing a small batch of identical checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountedResult {
    pub passed: u64,
    pub failed: u64,
    pub failed_with_waiver: u64,
    pub aborted: u64,
    pub skipped: u64,
    pub warnings: u64,
    pub fail_reasons: Vec<String>,
}

impl CountedResult {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed > 0
    }

    #[must_use]
    pub fn is_waived(&self) -> bool {
        self.failed_with_waiver > 0
            || self
                .fail_reasons
                .iter()
                .any(|reason| reason.contains(WAIVER_MARKER))
    }

    #[must_use]
    pub const fn counters(&self) -> Counters {
        Counters {
            passed: self.passed,
            failed: self.failed.saturating_add(self.failed_with_waiver),
            failed_with_waiver: self.failed_with_waiver,
            aborted: self.aborted,
            skipped: self.skipped,
            warnings: self.warnings,
        }
    }

    fn mark_waived(&mut self) {
        self.failed -= 1;
        self.failed_with_waiver = self.failed_with_waiver.saturating_add(1);
        for reason in &mut self.fail_reasons {
            *reason = annotate_reason(reason);
        }
    }
}

/// Append the waiver marker to a fail reason unless it already carries it.
#[must_use]
pub fn annotate_reason(reason: &str) -> String {
    if reason.ends_with(WAIVER_MARKER) {
        reason.to_string()
    } else {
        format!("{reason} {WAIVER_MARKER}")
    }
}

/// The two physical encodings of a leaf's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOutcome {
    Counted(CountedResult),
    Scalar(ScalarResult),
}

impl LeafOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        match self {
            Self::Counted(counted) => counted.is_failed(),
            Self::Scalar(scalar) => scalar.is_failed(),
        }
    }

    #[must_use]
    pub fn is_waived(&self) -> bool {
        match self {
            Self::Counted(counted) => counted.is_waived(),
            Self::Scalar(scalar) => scalar.is_waived(),
        }
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        match self {
            Self::Counted(counted) => counted.counters(),
            Self::Scalar(scalar) => scalar.counters(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entities and leaves
// ────────────────────────────────────────────────────────────────────────────

/// Position of a leaf inside a document: entity index, then leaf index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafAddr {
    pub entity: usize,
    pub leaf: usize,
}

/// A sub-test: the smallest unit a result and a waiver attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub addr: LeafAddr,
    pub description: String,
    pub id: Option<String>,
    pub outcome: LeafOutcome,
    pub waiver_reason: Option<String>,
}

impl Leaf {
    /// Failed and not yet waived.
    #[must_use]
    pub fn is_waivable(&self) -> bool {
        self.outcome.is_failed() && !self.outcome.is_waived() && self.waiver_reason.is_none()
    }

    /// Convert FAILED to FAILED_WITH_WAIVER and record `reason`.
    ///
    /// Returns `false` (and leaves the leaf untouched) when the leaf is not
    /// failed or already waived.
    pub fn mark_waived(&mut self, reason: &str) -> bool {
        if !self.is_waivable() {
            return false;
        }
        match &mut self.outcome {
            LeafOutcome::Counted(counted) => counted.mark_waived(),
            LeafOutcome::Scalar(scalar) => scalar.mark_waived(),
        }
        if !reason.is_empty() {
            self.waiver_reason = Some(reason.to_string());
        }
        true
    }
}

/// A named grouping of leaves (test suite, test case or sub-suite).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub index: usize,
    pub name: Option<String>,
    pub sub_suite: Option<String>,
    pub test_case: Option<String>,
    pub leaves: Vec<Leaf>,
}
