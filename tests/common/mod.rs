//! Common test infrastructure for the waiver integration tests.
//!
//! Provides a temp-directory harness with JSON/XML fixture helpers.

#![allow(dead_code)]

use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test harness providing a temp directory and fixture helpers.
pub struct TestHarness {
    name: String,
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        eprintln!("[harness] Test '{name}' started in {}", temp_dir.path().display());
        Self { name, temp_dir }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn temp_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    /// Create a file in the temp directory with the given content.
    pub fn create_file(&self, name: impl AsRef<Path>, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.temp_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to create test file");
        path
    }

    pub fn create_json(&self, name: impl AsRef<Path>, value: &Value) -> PathBuf {
        let encoded = serde_json::to_string_pretty(value).expect("Failed to encode fixture");
        self.create_file(name, encoded)
    }

    pub fn read_file(&self, name: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.temp_path(name)).expect("Failed to read test file")
    }

    pub fn read_json(&self, name: impl AsRef<Path>) -> Value {
        serde_json::from_str(&self.read_file(name)).expect("Failed to parse JSON output")
    }

    /// Log a test section start.
    pub fn section(&self, name: &str) {
        eprintln!("[{}] == {name} ==", self.name);
    }
}

/// Policy with a single suite block.
pub fn policy(suite: &str, block: Value) -> Value {
    let mut block = block;
    if let Some(map) = block.as_object_mut() {
        map.insert("Suite".to_string(), Value::from(suite));
    }
    serde_json::json!({ "Suites": [block] })
}
