//! Format adapters exposing one entity/leaf contract over JSON and XML trees.
//!
//! The engine only ever talks to [`ResultDocument`]; which physical field or
//! element holds a leaf, a status or a summary is the adapter's business.

pub mod json;
pub mod xml;

use crate::config::DocumentFormat;
use crate::error::Result;
use crate::family::SuiteFamily;
use crate::model::{Counters, Entity, Leaf, LeafAddr};

pub use json::JsonDocument;
pub use xml::XmlDocument;

/// Iteration and mutation primitives shared by every result encoding.
pub trait ResultDocument {
    fn entity_count(&self) -> usize;

    /// Snapshot of one entity, leaves included, reflecting all mutations so far.
    fn entity(&self, index: usize) -> Option<Entity>;

    /// Persist a waiver on the addressed leaf.
    ///
    /// Returns `false` without touching the document when the leaf does not
    /// exist, is not failed, or is already waived.
    fn set_waived(&mut self, addr: LeafAddr, reason: &str) -> bool;

    /// Store recomputed counters in the entity's summary location.
    fn write_summary(&mut self, entity: usize, counters: &Counters);

    /// Store the suite-wide rollup, if the document carries one.
    fn write_suite_summary(&mut self, counters: &Counters);

    /// Serialize in the document's original physical format.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn entities(&self) -> Vec<Entity> {
        (0..self.entity_count())
            .filter_map(|index| self.entity(index))
            .collect()
    }

    fn leaves(&self, entity: usize) -> Vec<Leaf> {
        self.entity(entity)
            .map(|entity| entity.leaves)
            .unwrap_or_default()
    }
}

/// Parse `content` in the given format.
pub fn parse_document(
    content: &str,
    format: DocumentFormat,
    family: SuiteFamily,
) -> Result<Box<dyn ResultDocument>> {
    Ok(match format {
        DocumentFormat::Json => Box::new(JsonDocument::parse(content, family)?),
        DocumentFormat::Xml => Box::new(XmlDocument::parse(content)?),
    })
}
