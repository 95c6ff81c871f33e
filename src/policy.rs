//! Waiver policy loading.
//!
//! A policy document looks like:
//!
//! ```json
//! { "Suites": [ { "Suite": "SCT", "Reason": "...",
//!     "TestSuites": [ { "TestSuite": "...", "Reason": "...",
//!                       "SubSuite": { "SubSuite": "...", "Reason": "...",
//!                                     "TestCase": { "SubTests": [...] } },
//!                       "TestCase": { "Test_case": "...", "Reason": "...",
//!                                     "SubTests": [ { "SubTestID": "...",
//!                                                     "sub_Test_Description": "...",
//!                                                     "Reason": "..." } ] } } ] } ] }
//! ```
//!
//! The document is navigated as a `serde_json::Value`: blocks with an
//! unexpected shape contribute nothing instead of failing the whole load.

use crate::error::{Error, Result};
use crate::family::SuiteFamily;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Hierarchy level a waiver attaches to, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaiverLevel {
    Suite,
    TestSuite,
    SubSuite,
    TestCase,
    SubTest,
}

impl WaiverLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Suite => "suite",
            Self::TestSuite => "test_suite",
            Self::SubSuite => "sub_suite",
            Self::TestCase => "test_case",
            Self::SubTest => "sub_test",
        }
    }
}

impl fmt::Display for WaiverLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys a waiver uses to select its targets.
///
/// `target` names the entity for test-suite/sub-suite/test-case waivers;
/// `by_id` and `by_description` select individual sub-tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaiverMatch {
    pub target: Option<String>,
    pub by_id: Option<String>,
    pub by_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiverEntry {
    pub level: WaiverLevel,
    pub matcher: WaiverMatch,
    pub reason: String,
}

impl WaiverEntry {
    fn suite(reason: &str) -> Self {
        Self {
            level: WaiverLevel::Suite,
            matcher: WaiverMatch::default(),
            reason: reason.to_string(),
        }
    }

    fn targeted(level: WaiverLevel, target: &str, reason: &str) -> Self {
        Self {
            level,
            matcher: WaiverMatch {
                target: Some(target.to_string()),
                ..WaiverMatch::default()
            },
            reason: reason.to_string(),
        }
    }
}

/// The five ordered waiver lists for one suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaiverIndex {
    pub suite: Vec<WaiverEntry>,
    pub test_suite: Vec<WaiverEntry>,
    pub sub_suite: Vec<WaiverEntry>,
    pub test_case: Vec<WaiverEntry>,
    pub sub_test: Vec<WaiverEntry>,
}

impl WaiverIndex {
    /// Extract the waivers for `suite_name` from a parsed policy document.
    ///
    /// A missing suite block yields an empty index. Sub-suite and test-case
    /// levels stay empty for families that do not support them.
    #[must_use]
    pub fn load(policy: &Value, suite_name: &str) -> Self {
        let mut index = Self::default();
        let family = SuiteFamily::from_name(suite_name);

        let Some(suites) = policy.get("Suites").and_then(Value::as_array) else {
            return index;
        };
        let Some(block) = suites.iter().find(|suite| {
            suite
                .get("Suite")
                .and_then(Value::as_str)
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(suite_name.trim()))
        }) else {
            return index;
        };

        if let Some(reason) = non_empty_str(block, "Reason") {
            index.suite.push(WaiverEntry::suite(reason));
        }

        let test_suites = block
            .get("TestSuites")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        for test_suite in test_suites {
            if let (Some(name), Some(reason)) = (
                test_suite_name(test_suite),
                non_empty_str(test_suite, "Reason"),
            ) {
                index
                    .test_suite
                    .push(WaiverEntry::targeted(WaiverLevel::TestSuite, name, reason));
            }

            if family.supports_entity_scoped_levels() {
                if let Some(sub_suite) = test_suite.get("SubSuite").filter(|v| v.is_object()) {
                    if let (Some(name), Some(reason)) = (
                        non_empty_str(sub_suite, "SubSuite"),
                        non_empty_str(sub_suite, "Reason"),
                    ) {
                        index
                            .sub_suite
                            .push(WaiverEntry::targeted(WaiverLevel::SubSuite, name, reason));
                    }
                }
                if let Some(test_case) = test_suite.get("TestCase").filter(|v| v.is_object()) {
                    if let (Some(name), Some(reason)) = (
                        non_empty_str(test_case, "Test_case"),
                        non_empty_str(test_case, "Reason"),
                    ) {
                        index
                            .test_case
                            .push(WaiverEntry::targeted(WaiverLevel::TestCase, name, reason));
                    }
                }
            }

            let direct = test_suite.get("TestCase");
            let nested = test_suite
                .get("SubSuite")
                .and_then(|sub_suite| sub_suite.get("TestCase"));
            for test_case in [direct, nested].into_iter().flatten() {
                index.sub_test.extend(sub_test_waivers(test_case));
            }
        }

        index
    }

    /// Read a policy file and extract the waivers for `suite_name`.
    ///
    /// A missing or unparsable file is a configuration problem: it is logged
    /// and treated as "no waivers".
    #[must_use]
    pub fn from_path(path: &Path, suite_name: &str) -> Self {
        match read_policy(path) {
            Ok(policy) => Self::load(&policy, suite_name),
            Err(err) => {
                tracing::warn!(path = %path.display(), "waiver policy unavailable: {err}");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.suite.len()
            + self.test_suite.len()
            + self.sub_suite.len()
            + self.test_case.len()
            + self.sub_test.len()
    }

    #[must_use]
    pub fn level(&self, level: WaiverLevel) -> &[WaiverEntry] {
        match level {
            WaiverLevel::Suite => &self.suite,
            WaiverLevel::TestSuite => &self.test_suite,
            WaiverLevel::SubSuite => &self.sub_suite,
            WaiverLevel::TestCase => &self.test_case,
            WaiverLevel::SubTest => &self.sub_test,
        }
    }
}

fn read_policy(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(Error::config(format!(
            "waiver file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        Error::config(format!("Invalid JSON in waiver file {}: {e}", path.display()))
    })
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// `TestSuite`, falling back to a string-valued `TestCase` (directly or under
/// `SubSuite`) when the block carries no explicit name.
fn test_suite_name(test_suite: &Value) -> Option<&str> {
    non_empty_str(test_suite, "TestSuite").or_else(|| {
        test_suite
            .get("TestCase")
            .or_else(|| test_suite.get("SubSuite").and_then(|s| s.get("TestCase")))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    })
}

fn sub_test_waivers(test_case: &Value) -> impl Iterator<Item = WaiverEntry> + '_ {
    test_case
        .get("SubTests")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
        .iter()
        .filter_map(|sub_test| {
            let reason = non_empty_str(sub_test, "Reason")?;
            Some(WaiverEntry {
                level: WaiverLevel::SubTest,
                matcher: WaiverMatch {
                    target: None,
                    by_id: id_value(sub_test.get("SubTestID")),
                    by_description: non_empty_str(sub_test, "sub_Test_Description")
                        .map(ToString::to_string),
                },
                reason: reason.to_string(),
            })
        })
}

/// Sub-test ids appear both as strings and as bare numbers.
fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
