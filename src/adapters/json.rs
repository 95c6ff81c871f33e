//! Dynamic-document (JSON) adapter.
//!
//! Entities live in the root `test_results` array, the root array itself, or
//! are the root object. Leaves are the entity's `subtests`; a leaf's
//! `sub_test_result` is either a counter object or a status string. Every
//! field this adapter does not rewrite is kept as-is, key order included.

use crate::adapters::ResultDocument;
use crate::error::{Error, Result};
use crate::family::SuiteFamily;
use crate::model::{
    Counters, CountedResult, Entity, Leaf, LeafAddr, LeafOutcome, ScalarResult, annotate_reason,
};
use serde::Serialize;
use serde_json::{Map, Value};

const TEST_RESULTS: &str = "test_results";
const SUBTESTS: &str = "subtests";
const SUB_TEST_RESULT: &str = "sub_test_result";
const DESCRIPTION: &str = "sub_Test_Description";
const NUMBER: &str = "sub_Test_Number";
const WAIVER_REASON: &str = "waiver_reason";
const SUITE_SUMMARY_KEYS: [&str; 2] = ["suite_summary", "Suite_summary"];

/// Where the entity objects sit in the root value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    TestResults,
    RootArray,
    RootObject,
}

#[derive(Debug, Clone)]
pub struct JsonDocument {
    root: Value,
    family: SuiteFamily,
    layout: Layout,
}

impl JsonDocument {
    pub fn parse(content: &str, family: SuiteFamily) -> Result<Self> {
        let root: Value = serde_json::from_str(content)?;
        Self::from_value(root, family)
    }

    pub fn from_value(root: Value, family: SuiteFamily) -> Result<Self> {
        let layout = match &root {
            Value::Object(map) if map.get(TEST_RESULTS).is_some_and(Value::is_array) => {
                Layout::TestResults
            }
            Value::Object(_) => Layout::RootObject,
            Value::Array(_) => Layout::RootArray,
            _ => {
                return Err(Error::input(
                    "unexpected JSON structure: expected an object or an array",
                ));
            }
        };
        Ok(Self {
            root,
            family,
            layout,
        })
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.root
    }

    fn container(&self) -> Option<&Vec<Value>> {
        match self.layout {
            Layout::TestResults => self.root.get(TEST_RESULTS)?.as_array(),
            Layout::RootArray => self.root.as_array(),
            Layout::RootObject => None,
        }
    }

    fn container_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self.layout {
            Layout::TestResults => self.root.get_mut(TEST_RESULTS)?.as_array_mut(),
            Layout::RootArray => self.root.as_array_mut(),
            Layout::RootObject => None,
        }
    }

    /// Container positions of the items that are entities.
    fn slots(&self) -> Vec<usize> {
        match self.layout {
            Layout::RootObject => vec![0],
            _ => self
                .container()
                .map(|items| {
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| is_entity(item))
                        .map(|(pos, _)| pos)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    fn entity_value(&self, index: usize) -> Option<&Value> {
        let slot = *self.slots().get(index)?;
        match self.layout {
            Layout::RootObject => Some(&self.root),
            _ => self.container()?.get(slot),
        }
    }

    fn entity_value_mut(&mut self, index: usize) -> Option<&mut Value> {
        let slot = *self.slots().get(index)?;
        match self.layout {
            Layout::RootObject => Some(&mut self.root),
            _ => self.container_mut()?.get_mut(slot),
        }
    }

    fn subtest_mut(&mut self, addr: LeafAddr) -> Option<&mut Map<String, Value>> {
        self.entity_value_mut(addr.entity)?
            .get_mut(SUBTESTS)?
            .as_array_mut()?
            .get_mut(addr.leaf)?
            .as_object_mut()
    }

    fn suite_summary_mut(&mut self) -> Option<&mut Map<String, Value>> {
        if self.root.is_object() {
            let key = SUITE_SUMMARY_KEYS
                .into_iter()
                .find(|key| self.root.get(*key).is_some_and(Value::is_object))?;
            return self.root.get_mut(key)?.as_object_mut();
        }
        self.container_mut()?
            .iter_mut()
            .find_map(|item| item.get_mut("Suite_summary"))?
            .as_object_mut()
    }
}

/// Items that carry only the suite rollup are not entities.
fn is_entity(item: &Value) -> bool {
    let Some(map) = item.as_object() else {
        return false;
    };
    !(map.contains_key("Suite_summary") && !map.contains_key(SUBTESTS))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn parse_entity(index: usize, value: &Value) -> Entity {
    let leaves = value
        .get(SUBTESTS)
        .and_then(Value::as_array)
        .map(|subtests| {
            subtests
                .iter()
                .enumerate()
                .map(|(leaf, subtest)| parse_leaf(LeafAddr { entity: index, leaf }, subtest))
                .collect()
        })
        .unwrap_or_default();

    Entity {
        index,
        name: str_field(value, "Test_suite")
            .or_else(|| str_field(value, "Test_suite_name"))
            .map(ToString::to_string),
        sub_suite: str_field(value, "Sub_test_suite").map(ToString::to_string),
        test_case: str_field(value, "Test_case").map(ToString::to_string),
        leaves,
    }
}

fn parse_leaf(addr: LeafAddr, subtest: &Value) -> Leaf {
    let result = subtest.get(SUB_TEST_RESULT);
    let outcome = match result {
        Some(result @ Value::Object(_)) => {
            LeafOutcome::Counted(CountedResult {
                passed: count(result, "PASSED"),
                failed: count(result, "FAILED"),
                failed_with_waiver: count(result, "FAILED_WITH_WAIVER"),
                aborted: count(result, "ABORTED"),
                skipped: count(result, "SKIPPED"),
                warnings: count(result, "WARNINGS"),
                fail_reasons: result
                    .get("fail_reasons")
                    .and_then(Value::as_array)
                    .map(|reasons| {
                        reasons
                            .iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        }
        Some(Value::String(text)) => LeafOutcome::Scalar(ScalarResult::new(text.clone())),
        _ => LeafOutcome::Scalar(ScalarResult::new(String::new())),
    };

    let waiver_reason = match &outcome {
        LeafOutcome::Counted(_) => result.and_then(|r| str_field(r, WAIVER_REASON)),
        LeafOutcome::Scalar(_) => None,
    }
    .or_else(|| str_field(subtest, WAIVER_REASON))
    .map(ToString::to_string);

    Leaf {
        addr,
        description: str_field(subtest, DESCRIPTION).unwrap_or_default().to_string(),
        id: id_field(subtest, NUMBER),
        outcome,
        waiver_reason,
    }
}

/// Summary key names, following the style already used by the target block.
struct SummaryKeys {
    upper: bool,
}

impl SummaryKeys {
    fn detect(summary: &Map<String, Value>) -> Self {
        let upper = summary.keys().any(|key| {
            key.strip_prefix("total_")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_uppercase())
        });
        Self { upper }
    }

    fn key(&self, name: &str) -> String {
        if self.upper {
            format!("total_{}", name.to_ascii_uppercase())
        } else {
            format!("total_{name}")
        }
    }
}

fn store_counters(summary: &mut Map<String, Value>, counters: &Counters) {
    let keys = SummaryKeys::detect(summary);
    for (name, value) in [
        ("passed", counters.passed),
        ("failed", counters.failed),
        ("failed_with_waiver", counters.failed_with_waiver),
        ("aborted", counters.aborted),
        ("skipped", counters.skipped),
        ("warnings", counters.warnings),
    ] {
        summary.insert(keys.key(name), Value::from(value));
    }
}

impl ResultDocument for JsonDocument {
    fn entity_count(&self) -> usize {
        self.slots().len()
    }

    fn entity(&self, index: usize) -> Option<Entity> {
        self.entity_value(index)
            .map(|value| parse_entity(index, value))
    }

    fn set_waived(&mut self, addr: LeafAddr, reason: &str) -> bool {
        let Some(mut leaf) = self.leaves(addr.entity).into_iter().nth(addr.leaf) else {
            return false;
        };
        if !leaf.mark_waived(reason) {
            return false;
        }
        let Some(subtest) = self.subtest_mut(addr) else {
            return false;
        };

        match &leaf.outcome {
            LeafOutcome::Counted(counted) => {
                let Some(result) = subtest
                    .get_mut(SUB_TEST_RESULT)
                    .and_then(Value::as_object_mut)
                else {
                    return false;
                };
                result.insert("FAILED".to_string(), Value::from(counted.failed));
                result.insert(
                    "FAILED_WITH_WAIVER".to_string(),
                    Value::from(counted.failed_with_waiver),
                );
                if let Some(reasons) = result.get_mut("fail_reasons").and_then(Value::as_array_mut)
                {
                    for reason in reasons.iter_mut() {
                        if let Value::String(text) = reason {
                            *text = annotate_reason(text);
                        }
                    }
                }
                if let Some(reason) = &leaf.waiver_reason {
                    result.insert(WAIVER_REASON.to_string(), Value::from(reason.as_str()));
                }
            }
            LeafOutcome::Scalar(scalar) => {
                subtest.insert(
                    SUB_TEST_RESULT.to_string(),
                    Value::from(scalar.text.as_str()),
                );
                if let Some(reason) = &leaf.waiver_reason {
                    subtest.insert(WAIVER_REASON.to_string(), Value::from(reason.as_str()));
                }
            }
        }
        true
    }

    fn write_summary(&mut self, entity: usize, counters: &Counters) {
        let field = self.family.entity_summary_field();
        let Some(summary) = self
            .entity_value_mut(entity)
            .and_then(|value| value.get_mut(field))
            .and_then(Value::as_object_mut)
        else {
            return;
        };
        store_counters(summary, counters);
    }

    fn write_suite_summary(&mut self, counters: &Counters) {
        if let Some(summary) = self.suite_summary_mut() {
            store_counters(summary, counters);
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.root.serialize(&mut serializer)?;
        Ok(out)
    }
}
