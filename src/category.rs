//! Test-category gating: which test suites may be waived at all.

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;

/// Parsed test-category document.
///
/// Shape: `{ <category>: { <suite id>: { "SName: <suite>": [ { "TSName": ..., "Waivable": "yes" } ] } } }`.
#[derive(Debug, Clone)]
pub struct TestCategories {
    doc: Value,
}

impl TestCategories {
    #[must_use]
    pub const fn new(doc: Value) -> Self {
        Self { doc }
    }

    /// Load an optional category file. Read or parse failures are logged and
    /// behave as if no file was given.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match read_categories(path) {
            Ok(doc) => Some(Self::new(doc)),
            Err(err) => {
                tracing::warn!(path = %path.display(), "test category file ignored: {err}");
                None
            }
        }
    }

    /// True when an entry under `SName: <suite_name>` lists `test_suite`
    /// (case-insensitive) with `Waivable: yes`.
    #[must_use]
    pub fn is_waivable(&self, suite_name: &str, test_suite: &str) -> bool {
        let key = format!("SName: {suite_name}");
        let Some(categories) = self.doc.as_object() else {
            return false;
        };
        categories
            .values()
            .filter_map(Value::as_object)
            .flat_map(|suites| suites.values())
            .filter_map(|suite| suite.get(&key))
            .filter_map(Value::as_array)
            .flatten()
            .any(|entry| {
                let name_matches = entry
                    .get("TSName")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.eq_ignore_ascii_case(test_suite));
                let waivable = entry
                    .get("Waivable")
                    .and_then(Value::as_str)
                    .is_some_and(|flag| flag.eq_ignore_ascii_case("yes"));
                name_matches && waivable
            })
    }
}

/// Gate helper: without a category document every test suite is waivable.
#[must_use]
pub fn is_waivable(categories: Option<&TestCategories>, suite_name: &str, test_suite: &str) -> bool {
    categories.is_none_or(|c| c.is_waivable(suite_name, test_suite))
}

fn read_categories(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        Error::config(format!(
            "Invalid JSON in test category file {}: {e}",
            path.display()
        ))
    })
}
