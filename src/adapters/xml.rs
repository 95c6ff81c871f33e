//! Element-tree (XML) adapter.
//!
//! Two dialects share one tree walk:
//!
//! - custom: `<Suite name=..>` entities whose leaves are every descendant
//!   `<SubTest result=.. description=.. id=..>` outside nested suites;
//! - JUnit: `<testsuite name="A :: B">` entities whose leaves are the direct
//!   `<testcase>` children, with the outcome carried by a `<failure>`,
//!   `<error>` or `<skipped>` child.
//!
//! Elements are addressed by child-index paths from the root so snapshots and
//! mutations agree without holding borrows across calls.
//!
//! Comments and processing instructions around the root element are kept and
//! written back in place; whitespace-only text between elements is not.

use crate::adapters::ResultDocument;
use crate::error::{Error, Result};
use crate::model::{
    Counters, Entity, Leaf, LeafAddr, LeafOutcome, ScalarResult, WAIVED_STATUS, WAIVER_MARKER,
};
use regex::Regex;
use std::sync::OnceLock;
use xmltree::{Element, EmitterConfig, XMLNode};

const WAIVER_REASON: &str = "waiver_reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Custom,
    JUnit,
}

#[derive(Debug, Clone)]
struct EntitySlot {
    dialect: Dialect,
    path: Vec<usize>,
    /// Leaf element paths, relative to the entity element.
    leaves: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct XmlDocument {
    prolog: Vec<XMLNode>,
    root: Element,
    epilog: Vec<XMLNode>,
    slots: Vec<EntitySlot>,
}

impl XmlDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let mut prolog = Element::parse_all(content.as_bytes())?;
        let Some(at) = prolog
            .iter()
            .position(|node| matches!(node, XMLNode::Element(_)))
        else {
            return Err(Error::XmlParse("document has no root element".to_string()));
        };
        let mut epilog = prolog.split_off(at);
        let XMLNode::Element(root) = epilog.remove(0) else {
            return Err(Error::XmlParse("document has no root element".to_string()));
        };
        prolog.retain(is_misc);
        epilog.retain(is_misc);

        let mut slots = Vec::new();
        discover(&root, &mut Vec::new(), &mut slots);
        Ok(Self {
            prolog,
            root,
            epilog,
            slots,
        })
    }

    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    fn slot_element(&self, slot: &EntitySlot) -> Option<&Element> {
        element_at(&self.root, &slot.path)
    }

    fn leaf_element_mut(&mut self, addr: LeafAddr) -> Option<(Dialect, &mut Element)> {
        let slot = self.slots.get(addr.entity)?;
        let dialect = slot.dialect;
        let path: Vec<usize> = slot
            .path
            .iter()
            .chain(slot.leaves.get(addr.leaf)?)
            .copied()
            .collect();
        element_at_mut(&mut self.root, &path).map(|el| (dialect, el))
    }
}

// ─── Tree walk ──────────────────────────────────────────────────────────────

fn is_misc(node: &XMLNode) -> bool {
    matches!(
        node,
        XMLNode::Comment(_) | XMLNode::ProcessingInstruction(..)
    )
}

fn write_misc(out: &mut Vec<u8>, nodes: &[XMLNode]) {
    for node in nodes {
        let text = match node {
            XMLNode::Comment(comment) => format!("<!--{comment}-->\n"),
            XMLNode::ProcessingInstruction(name, Some(data)) => format!("<?{name} {data}?>\n"),
            XMLNode::ProcessingInstruction(name, None) => format!("<?{name}?>\n"),
            _ => continue,
        };
        out.extend_from_slice(text.as_bytes());
    }
}

fn child_elements(el: &Element) -> impl Iterator<Item = (usize, &Element)> {
    el.children.iter().enumerate().filter_map(|(i, node)| match node {
        XMLNode::Element(child) => Some((i, child)),
        _ => None,
    })
}

fn discover(el: &Element, path: &mut Vec<usize>, out: &mut Vec<EntitySlot>) {
    match el.name.as_str() {
        "Suite" => {
            let mut leaves = Vec::new();
            collect_subtests(el, &mut Vec::new(), &mut leaves);
            out.push(EntitySlot {
                dialect: Dialect::Custom,
                path: path.clone(),
                leaves,
            });
        }
        "testsuite" => {
            let leaves = child_elements(el)
                .filter(|(_, child)| child.name == "testcase")
                .map(|(i, _)| vec![i])
                .collect();
            out.push(EntitySlot {
                dialect: Dialect::JUnit,
                path: path.clone(),
                leaves,
            });
        }
        _ => {}
    }
    for (i, child) in child_elements(el) {
        path.push(i);
        discover(child, path, out);
        path.pop();
    }
}

fn collect_subtests(el: &Element, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, child) in child_elements(el) {
        prefix.push(i);
        match child.name.as_str() {
            "SubTest" => out.push(prefix.clone()),
            "Suite" => {}
            _ => collect_subtests(child, prefix, out),
        }
        prefix.pop();
    }
}

fn element_at<'a>(root: &'a Element, path: &[usize]) -> Option<&'a Element> {
    path.iter()
        .try_fold(root, |el, &i| match el.children.get(i)? {
            XMLNode::Element(child) => Some(child),
            _ => None,
        })
}

fn element_at_mut<'a>(root: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    let mut el = root;
    for &i in path {
        el = match el.children.get_mut(i)? {
            XMLNode::Element(child) => child,
            _ => return None,
        };
    }
    Some(el)
}

// ─── Snapshots ──────────────────────────────────────────────────────────────

fn attr<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attributes
        .get(name)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn case_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\[(\d+)\]\s*(.*)$").expect("testcase name"))
}

/// Split a JUnit testcase name `"[12] description"` into id and description.
fn split_case_name(name: &str) -> (Option<String>, String) {
    case_name_pattern().captures(name).map_or_else(
        || (None, name.trim().to_string()),
        |caps| {
            (
                caps.get(1).map(|m| m.as_str().to_string()),
                caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            )
        },
    )
}

fn junit_status(testcase: &Element) -> String {
    if let Some(failure) = testcase.get_child("failure") {
        let waived = failure
            .attributes
            .get("message")
            .is_some_and(|message| message.contains(WAIVER_MARKER));
        return if waived {
            format!("FAILED {WAIVER_MARKER}")
        } else {
            "FAILED".to_string()
        };
    }
    if testcase.get_child("error").is_some() {
        "ABORTED".to_string()
    } else if testcase.get_child("skipped").is_some() {
        "SKIPPED".to_string()
    } else {
        "PASSED".to_string()
    }
}

fn property(testsuite: &Element, name: &str) -> Option<String> {
    let properties = testsuite.get_child("properties")?;
    child_elements(properties)
        .map(|(_, p)| p)
        .filter(|p| p.name == "property")
        .find(|p| attr(p, "name") == Some(name))
        .and_then(|p| attr(p, "value"))
        .map(ToString::to_string)
}

fn snapshot_leaf(dialect: Dialect, addr: LeafAddr, el: &Element) -> Leaf {
    let waiver_reason = attr(el, WAIVER_REASON).map(ToString::to_string);
    match dialect {
        Dialect::Custom => Leaf {
            addr,
            description: attr(el, "description").unwrap_or_default().to_string(),
            id: attr(el, "id").map(|id| id.trim().to_string()),
            outcome: LeafOutcome::Scalar(ScalarResult::new(
                el.attributes.get("result").cloned().unwrap_or_default(),
            )),
            waiver_reason,
        },
        Dialect::JUnit => {
            let (id, description) = split_case_name(attr(el, "name").unwrap_or_default());
            Leaf {
                addr,
                description,
                id,
                outcome: LeafOutcome::Scalar(ScalarResult::new(junit_status(el))),
                waiver_reason,
            }
        }
    }
}

fn snapshot_entity(index: usize, slot: &EntitySlot, el: &Element) -> Entity {
    let leaves = slot
        .leaves
        .iter()
        .enumerate()
        .filter_map(|(leaf, path)| {
            let addr = LeafAddr {
                entity: index,
                leaf,
            };
            element_at(el, path).map(|leaf_el| snapshot_leaf(slot.dialect, addr, leaf_el))
        })
        .collect();

    let (name, sub_suite, test_case) = match slot.dialect {
        Dialect::Custom => (attr(el, "name").map(ToString::to_string), None, None),
        Dialect::JUnit => {
            let full = attr(el, "name").unwrap_or_default();
            let (name, test_case) = match full.split_once(" :: ") {
                Some((name, case)) => (name.trim(), Some(case.trim().to_string())),
                None => (full.trim(), None),
            };
            (
                Some(name.to_string()).filter(|n| !n.is_empty()),
                property(el, "Sub_test_suite"),
                test_case.filter(|c| !c.is_empty()),
            )
        }
    };

    Entity {
        index,
        name,
        sub_suite,
        test_case,
        leaves,
    }
}

// ─── Summaries ──────────────────────────────────────────────────────────────

/// Rewrite attributes that already exist; the waived bucket is also added
/// when it has something to report.
fn store_attributes(el: &mut Element, values: &[(&str, u64)], waived: (&str, u64)) {
    for (name, value) in values {
        if el.attributes.contains_key(*name) {
            el.attributes.insert((*name).to_string(), value.to_string());
        }
    }
    let (name, value) = waived;
    if value > 0 || el.attributes.contains_key(name) {
        el.attributes.insert(name.to_string(), value.to_string());
    }
}

fn store_junit(el: &mut Element, counters: &Counters) {
    store_attributes(
        el,
        &[
            ("failures", counters.failed),
            ("errors", counters.aborted),
            ("skipped", counters.skipped),
        ],
        ("failures_with_waiver", counters.failed_with_waiver),
    );
}

fn store_custom(el: &mut Element, counters: &Counters) {
    store_attributes(
        el,
        &[
            ("passed", counters.passed),
            ("failed", counters.failed),
            ("aborted", counters.aborted),
            ("skipped", counters.skipped),
            ("warnings", counters.warnings),
        ],
        ("failed_with_waiver", counters.failed_with_waiver),
    );
}

impl ResultDocument for XmlDocument {
    fn entity_count(&self) -> usize {
        self.slots.len()
    }

    fn entity(&self, index: usize) -> Option<Entity> {
        let slot = self.slots.get(index)?;
        self.slot_element(slot)
            .map(|el| snapshot_entity(index, slot, el))
    }

    fn set_waived(&mut self, addr: LeafAddr, reason: &str) -> bool {
        let Some(mut leaf) = self.leaves(addr.entity).into_iter().nth(addr.leaf) else {
            return false;
        };
        if !leaf.mark_waived(reason) {
            return false;
        }
        let Some((dialect, el)) = self.leaf_element_mut(addr) else {
            return false;
        };

        match dialect {
            Dialect::Custom => {
                el.attributes
                    .insert("result".to_string(), WAIVED_STATUS.to_string());
            }
            Dialect::JUnit => {
                let Some(failure) = el.get_mut_child("failure") else {
                    return false;
                };
                let message = failure
                    .attributes
                    .get("message")
                    .map_or_else(String::new, |m| m.trim_end().to_string());
                let annotated = if message.is_empty() {
                    WAIVER_MARKER.to_string()
                } else {
                    format!("{message} {WAIVER_MARKER}")
                };
                failure.attributes.insert("message".to_string(), annotated);
            }
        }
        if let Some(reason) = &leaf.waiver_reason {
            el.attributes
                .insert(WAIVER_REASON.to_string(), reason.clone());
        }
        true
    }

    fn write_summary(&mut self, entity: usize, counters: &Counters) {
        let Some(slot) = self.slots.get(entity) else {
            return;
        };
        let dialect = slot.dialect;
        let path = slot.path.clone();
        let Some(el) = element_at_mut(&mut self.root, &path) else {
            return;
        };
        match dialect {
            Dialect::Custom => store_custom(el, counters),
            Dialect::JUnit => store_junit(el, counters),
        }
    }

    fn write_suite_summary(&mut self, counters: &Counters) {
        if self.root.name == "testsuites" {
            store_junit(&mut self.root, counters);
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_vec();
        write_misc(&mut out, &self.prolog);
        let config = EmitterConfig::new()
            .perform_indent(true)
            .write_document_declaration(false);
        self.root
            .write_with_config(&mut out, config)
            .map_err(|err| Error::XmlWrite(err.to_string()))?;
        out.push(b'\n');
        write_misc(&mut out, &self.epilog);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Results>
  <Suite name="PCIe" failed="1" passed="1">
    <Group>
      <SubTest id="1" description="Check ECAM" result="FAIL"/>
    </Group>
    <SubTest id="2" description="Check BARs" result="PASS"/>
    <Suite name="Nested">
      <SubTest id="3" description="Inner" result="FAILED"/>
    </Suite>
  </Suite>
</Results>"#;

    const JUNIT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites failures="2" errors="0" skipped="1">
  <testsuite name="BootServicesTest :: MemoryAllocationServicesTest" failures="2" errors="0" skipped="1">
    <properties>
      <property name="Sub_test_suite" value="AllocatePages_Func"/>
    </properties>
    <testcase name="[1] AllocatePages succeeds">
      <failure message="returned EFI_OUT_OF_RESOURCES"/>
    </testcase>
    <testcase name="[2] FreePages succeeds"/>
    <testcase name="Unnumbered case">
      <failure message="boom"/>
    </testcase>
    <testcase name="[4] Skipped case"><skipped/></testcase>
  </testsuite>
</testsuites>"#;

    #[test]
    fn custom_suites_collect_leaves_without_nested_suites() {
        let doc = XmlDocument::parse(CUSTOM).expect("parse");
        assert_eq!(doc.entity_count(), 2);

        let outer = doc.entity(0).expect("outer");
        assert_eq!(outer.name.as_deref(), Some("PCIe"));
        let descriptions: Vec<_> = outer.leaves.iter().map(|l| l.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Check ECAM", "Check BARs"]);
        assert!(outer.leaves[0].is_waivable());

        let inner = doc.entity(1).expect("inner");
        assert_eq!(inner.name.as_deref(), Some("Nested"));
        assert_eq!(inner.leaves.len(), 1);
    }

    #[test]
    fn custom_waive_replaces_result() {
        let mut doc = XmlDocument::parse(CUSTOM).expect("parse");
        assert!(doc.set_waived(LeafAddr { entity: 0, leaf: 0 }, "errata 12"));
        assert!(!doc.set_waived(LeafAddr { entity: 0, leaf: 0 }, "again"));
        assert!(!doc.set_waived(LeafAddr { entity: 0, leaf: 1 }, "passed"));

        let leaf = &doc.entity(0).expect("entity").leaves[0];
        assert_eq!(
            leaf.outcome,
            LeafOutcome::Scalar(ScalarResult::new("FAILED_WITH_WAIVER"))
        );
        assert_eq!(leaf.waiver_reason.as_deref(), Some("errata 12"));

        let counters = crate::summary::recompute(&doc.entity(0).expect("entity"));
        doc.write_summary(0, &counters);
        let suite = doc.root().get_child("Suite").expect("suite");
        assert_eq!(suite.attributes.get("failed").map(String::as_str), Some("1"));
        assert_eq!(
            suite.attributes.get("failed_with_waiver").map(String::as_str),
            Some("1")
        );
        assert!(!suite.attributes.contains_key("skipped"));
    }

    #[test]
    fn junit_entity_fields() {
        let doc = XmlDocument::parse(JUNIT).expect("parse");
        assert_eq!(doc.entity_count(), 1);
        let entity = doc.entity(0).expect("entity");
        assert_eq!(entity.name.as_deref(), Some("BootServicesTest"));
        assert_eq!(
            entity.test_case.as_deref(),
            Some("MemoryAllocationServicesTest")
        );
        assert_eq!(entity.sub_suite.as_deref(), Some("AllocatePages_Func"));

        let ids: Vec<_> = entity.leaves.iter().map(|l| l.id.clone()).collect();
        assert_eq!(
            ids,
            vec![Some("1".to_string()), Some("2".to_string()), None, Some("4".to_string())]
        );
        assert_eq!(entity.leaves[0].description, "AllocatePages succeeds");
        assert_eq!(entity.leaves[2].description, "Unnumbered case");
        assert!(entity.leaves[0].is_waivable());
        assert!(!entity.leaves[1].is_waivable());
        assert!(!entity.leaves[3].is_waivable());
    }

    #[test]
    fn junit_waive_annotates_failure_message() {
        let mut doc = XmlDocument::parse(JUNIT).expect("parse");
        assert!(doc.set_waived(LeafAddr { entity: 0, leaf: 0 }, "firmware bug"));
        assert!(!doc.set_waived(LeafAddr { entity: 0, leaf: 0 }, "firmware bug"));

        let testcase = doc
            .root()
            .get_child("testsuite")
            .and_then(|suite| suite.get_child("testcase"))
            .expect("testcase");
        assert_eq!(
            testcase.attributes.get("waiver_reason").map(String::as_str),
            Some("firmware bug")
        );
        let message = testcase
            .get_child("failure")
            .and_then(|f| f.attributes.get("message"))
            .cloned();
        assert_eq!(
            message.as_deref(),
            Some("returned EFI_OUT_OF_RESOURCES (WITH WAIVER)")
        );

        let entity = doc.entity(0).expect("entity");
        let counters = crate::summary::recompute(&entity);
        assert_eq!(counters.failed, 2);
        assert_eq!(counters.failed_with_waiver, 1);
        doc.write_summary(0, &counters);
        doc.write_suite_summary(&counters);
        assert_eq!(
            doc.root()
                .attributes
                .get("failures_with_waiver")
                .map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn output_keeps_declaration() {
        let doc = XmlDocument::parse(JUNIT).expect("parse");
        let text = String::from_utf8(doc.to_bytes().expect("write")).expect("utf8");
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("[2] FreePages succeeds"));
    }

    #[test]
    fn comments_around_and_inside_root_survive() {
        let text = "<?xml version=\"1.0\"?>\n<!-- generated by sct parser -->\n\
                    <testsuites><!-- run 3 --><testsuite name=\"A\"/></testsuites>\n<!-- end -->";
        let doc = XmlDocument::parse(text).expect("parse");
        assert_eq!(doc.entity_count(), 1);

        let out = String::from_utf8(doc.to_bytes().expect("write")).expect("utf8");
        assert!(out.starts_with("<?xml"));
        let leading = out.find("<!-- generated by sct parser -->").expect("leading comment");
        let root = out.find("<testsuites").expect("root");
        assert!(leading < root);
        assert!(out.contains("<!-- run 3 -->"));
        assert!(out.trim_end().ends_with("<!-- end -->"));
        assert_eq!(XmlDocument::parse(&out).expect("reparse").entity_count(), 1);
    }

    #[test]
    fn malformed_xml_is_fatal() {
        let err = XmlDocument::parse("<testsuite><testcase></testsuite>").expect_err("malformed");
        assert!(err.is_fatal_input());
    }

    #[test]
    fn case_name_split() {
        assert_eq!(
            split_case_name(" [17]   Check thing "),
            (Some("17".to_string()), "Check thing".to_string())
        );
        assert_eq!(split_case_name("plain"), (None, "plain".to_string()));
    }
}
