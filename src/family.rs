//! Suite families and the per-family rules that vary between test harnesses.
//!
//! Everything that used to be a string comparison against the suite name at
//! call sites lives here: which waiver levels are honored, how sub-test
//! descriptions are compared, and where a JSON entity keeps its summary.

use std::fmt;

/// Known test-harness families. Unrecognized names fall into [`SuiteFamily::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuiteFamily {
    Sct,
    BbsrSct,
    Standalone,
    BbsrFwts,
    Fwts,
    Bsa,
    Sbsa,
    Other(String),
}

/// How a sub-test waiver's description is compared with a leaf description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionMatch {
    /// Normalized waiver text must occur inside the normalized leaf text.
    Substring,
    /// Normalized strings must be identical.
    Exact,
}

impl SuiteFamily {
    /// Resolve a suite name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "SCT" => Self::Sct,
            "BBSR-SCT" => Self::BbsrSct,
            "STANDALONE" => Self::Standalone,
            "BBSR-FWTS" => Self::BbsrFwts,
            "FWTS" => Self::Fwts,
            "BSA" => Self::Bsa,
            "SBSA" => Self::Sbsa,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sct => "SCT",
            Self::BbsrSct => "BBSR-SCT",
            Self::Standalone => "STANDALONE",
            Self::BbsrFwts => "BBSR-FWTS",
            Self::Fwts => "FWTS",
            Self::Bsa => "BSA",
            Self::Sbsa => "SBSA",
            Self::Other(name) => name,
        }
    }

    /// Sub-suite and test-case waivers are only recognized for these families.
    #[must_use]
    pub const fn supports_entity_scoped_levels(&self) -> bool {
        matches!(
            self,
            Self::Sct | Self::Standalone | Self::BbsrSct | Self::BbsrFwts
        )
    }

    #[must_use]
    pub const fn description_match(&self) -> DescriptionMatch {
        match self {
            Self::Standalone => DescriptionMatch::Substring,
            _ => DescriptionMatch::Exact,
        }
    }

    /// JSON field holding an entity's summary counters.
    #[must_use]
    pub const fn entity_summary_field(&self) -> &'static str {
        match self {
            Self::Sct | Self::BbsrSct => "test_case_summary",
            _ => "test_suite_summary",
        }
    }
}

impl fmt::Display for SuiteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
