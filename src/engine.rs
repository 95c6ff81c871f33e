//! Waiver resolution.
//!
//! The engine is configured once per suite with an ordered list of level
//! matchers (suite, test-suite, sub-suite, test-case, sub-test). Every failed
//! leaf of every waivable entity is offered to the matchers in that order and
//! the first one that produces a reason waives it. Summaries of the visited
//! entities and the suite rollup are recomputed afterwards.

use crate::adapters::ResultDocument;
use crate::category::{self, TestCategories};
use crate::family::{DescriptionMatch, SuiteFamily};
use crate::model::{Counters, Entity, Leaf};
use crate::normalize::normalize_description;
use crate::policy::{WaiverEntry, WaiverIndex, WaiverLevel};
use crate::summary;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

// ─── Matchers ───────────────────────────────────────────────────────────────

/// One waiver level's matching rule.
pub trait LevelMatcher: Send + Sync {
    fn level(&self) -> WaiverLevel;

    /// Reason of the waiver that covers `leaf`, if any.
    fn reason_for(&self, entity: &Entity, leaf: &Leaf) -> Option<&str>;

    fn is_empty(&self) -> bool;
}

/// Unconditional: the first suite-level reason covers every failed leaf.
#[derive(Debug, Clone)]
pub struct SuiteMatcher {
    reason: Option<String>,
}

impl SuiteMatcher {
    #[must_use]
    pub fn new(entries: &[WaiverEntry]) -> Self {
        Self {
            reason: entries.first().map(|entry| entry.reason.clone()),
        }
    }
}

impl LevelMatcher for SuiteMatcher {
    fn level(&self) -> WaiverLevel {
        WaiverLevel::Suite
    }

    fn reason_for(&self, _entity: &Entity, _leaf: &Leaf) -> Option<&str> {
        self.reason.as_deref()
    }

    fn is_empty(&self) -> bool {
        self.reason.is_none()
    }
}

/// Exact match of a waiver target against one entity attribute.
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    level: WaiverLevel,
    key: fn(&Entity) -> Option<&str>,
    entries: Vec<WaiverEntry>,
}

impl EntityMatcher {
    #[must_use]
    pub fn test_suite(entries: &[WaiverEntry]) -> Self {
        Self {
            level: WaiverLevel::TestSuite,
            key: |entity| entity.name.as_deref(),
            entries: entries.to_vec(),
        }
    }

    #[must_use]
    pub fn sub_suite(entries: &[WaiverEntry]) -> Self {
        Self {
            level: WaiverLevel::SubSuite,
            key: |entity| entity.sub_suite.as_deref(),
            entries: entries.to_vec(),
        }
    }

    #[must_use]
    pub fn test_case(entries: &[WaiverEntry]) -> Self {
        Self {
            level: WaiverLevel::TestCase,
            key: |entity| entity.test_case.as_deref(),
            entries: entries.to_vec(),
        }
    }
}

impl LevelMatcher for EntityMatcher {
    fn level(&self) -> WaiverLevel {
        self.level
    }

    fn reason_for(&self, entity: &Entity, _leaf: &Leaf) -> Option<&str> {
        let key = (self.key)(entity)?;
        self.entries
            .iter()
            .find(|entry| entry.matcher.target.as_deref() == Some(key))
            .map(|entry| entry.reason.as_str())
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-leaf matching: id equality first, then normalized descriptions.
#[derive(Debug, Clone)]
pub struct SubTestMatcher {
    mode: DescriptionMatch,
    entries: Vec<(WaiverEntry, Option<String>)>,
}

impl SubTestMatcher {
    #[must_use]
    pub fn new(entries: &[WaiverEntry], mode: DescriptionMatch) -> Self {
        let entries = entries
            .iter()
            .map(|entry| {
                let normalized = entry
                    .matcher
                    .by_description
                    .as_deref()
                    .map(normalize_description)
                    .filter(|text| !text.trim().is_empty());
                (entry.clone(), normalized)
            })
            .collect();
        Self { mode, entries }
    }

    fn by_id(&self, leaf: &Leaf) -> Option<&str> {
        let id = leaf.id.as_deref()?;
        self.entries
            .iter()
            .find(|(entry, _)| entry.matcher.by_id.as_deref() == Some(id))
            .map(|(entry, _)| entry.reason.as_str())
    }

    fn by_description(&self, leaf: &Leaf) -> Option<&str> {
        let description = normalize_description(&leaf.description);
        self.entries
            .iter()
            .find(|(_, wanted)| {
                wanted.as_deref().is_some_and(|wanted| match self.mode {
                    DescriptionMatch::Substring => description.contains(wanted),
                    DescriptionMatch::Exact => description == wanted,
                })
            })
            .map(|(entry, _)| entry.reason.as_str())
    }
}

impl LevelMatcher for SubTestMatcher {
    fn level(&self) -> WaiverLevel {
        WaiverLevel::SubTest
    }

    fn reason_for(&self, _entity: &Entity, leaf: &Leaf) -> Option<&str> {
        self.by_id(leaf).or_else(|| self.by_description(leaf))
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// One applied waiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaiverDecision {
    pub entity: Option<String>,
    pub entity_index: usize,
    pub leaf_index: usize,
    pub description: String,
    pub id: Option<String>,
    pub level: WaiverLevel,
    pub reason: String,
}

/// Outcome of one engine pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub entities_visited: usize,
    pub entities_skipped: usize,
    pub waived_by_level: BTreeMap<WaiverLevel, usize>,
    pub decisions: Vec<WaiverDecision>,
    pub suite_counters: Counters,
}

impl ApplyReport {
    #[must_use]
    pub fn waived_total(&self) -> usize {
        self.decisions.len()
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct WaiverEngine<'a> {
    suite_name: String,
    matchers: Vec<Box<dyn LevelMatcher>>,
    categories: Option<&'a TestCategories>,
}

impl<'a> WaiverEngine<'a> {
    #[must_use]
    pub fn new(
        suite_name: &str,
        index: &WaiverIndex,
        categories: Option<&'a TestCategories>,
    ) -> Self {
        let family = SuiteFamily::from_name(suite_name);
        let mut matchers: Vec<Box<dyn LevelMatcher>> = vec![
            Box::new(SuiteMatcher::new(&index.suite)),
            Box::new(EntityMatcher::test_suite(&index.test_suite)),
        ];
        if family.supports_entity_scoped_levels() {
            matchers.push(Box::new(EntityMatcher::sub_suite(&index.sub_suite)));
            matchers.push(Box::new(EntityMatcher::test_case(&index.test_case)));
        }
        matchers.push(Box::new(SubTestMatcher::new(
            &index.sub_test,
            family.description_match(),
        )));
        matchers.retain(|matcher| !matcher.is_empty());

        Self {
            suite_name: suite_name.to_string(),
            matchers,
            categories,
        }
    }

    /// False when no level has any waiver: applying would change nothing.
    #[must_use]
    pub fn has_waivers(&self) -> bool {
        !self.matchers.is_empty()
    }

    fn entity_is_waivable(&self, entity: &Entity) -> bool {
        match (self.categories, entity.name.as_deref()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(_), Some(name)) => category::is_waivable(self.categories, &self.suite_name, name),
        }
    }

    fn resolve<'m>(&'m self, entity: &Entity, leaf: &Leaf) -> Option<(WaiverLevel, &'m str)> {
        self.matchers.iter().find_map(|matcher| {
            matcher
                .reason_for(entity, leaf)
                .map(|reason| (matcher.level(), reason))
        })
    }

    /// Waive matching leaves in place and rewrite the affected summaries.
    ///
    /// Without any waiver the document is left exactly as it was, stored
    /// summaries included.
    pub fn apply<D: ResultDocument + ?Sized>(&self, doc: &mut D) -> ApplyReport {
        let mut report = ApplyReport::default();
        if !self.has_waivers() {
            return report;
        }

        for index in 0..doc.entity_count() {
            let Some(entity) = doc.entity(index) else {
                continue;
            };
            if !self.entity_is_waivable(&entity) {
                debug!(
                    suite = %self.suite_name,
                    entity = entity.name.as_deref().unwrap_or("<unnamed>"),
                    "test suite is not waivable, skipping"
                );
                report.entities_skipped += 1;
                continue;
            }
            report.entities_visited += 1;

            for leaf in entity.leaves.iter().filter(|leaf| leaf.is_waivable()) {
                let Some((level, reason)) = self.resolve(&entity, leaf) else {
                    continue;
                };
                if !doc.set_waived(leaf.addr, reason) {
                    continue;
                }
                debug!(
                    suite = %self.suite_name,
                    entity = entity.name.as_deref().unwrap_or("<unnamed>"),
                    %level,
                    description = %leaf.description,
                    "waiver applied: {reason}"
                );
                *report.waived_by_level.entry(level).or_default() += 1;
                report.decisions.push(WaiverDecision {
                    entity: entity.name.clone(),
                    entity_index: index,
                    leaf_index: leaf.addr.leaf,
                    description: leaf.description.clone(),
                    id: leaf.id.clone(),
                    level,
                    reason: reason.to_string(),
                });
            }

            if let Some(updated) = doc.entity(index) {
                doc.write_summary(index, &summary::recompute(&updated));
            }
        }

        let entities = doc.entities();
        report.suite_counters = summary::rollup(&entities);
        doc.write_suite_summary(&report.suite_counters);
        report
    }
}
