//! Compliance waivers - apply a waiver policy to normalized test results
//!
//! Takes one suite's result document (JSON or XML, in any of the harness
//! dialects), a waiver policy and an optional test-category document, marks
//! the failures the policy accepts as waived, and recomputes every summary.
//!
//! ## Layout
//!
//! - [`policy`] loads the five ordered waiver lists for a suite
//! - [`engine`] resolves waivers level by level and mutates leaves
//! - [`adapters`] expose the JSON and XML trees through one contract
//! - [`summary`] recomputes per-entity and suite counters
//! - [`apply`] ties it together with file I/O

#![forbid(unsafe_code)]
#![cfg_attr(
    test,
    allow(
        clippy::uninlined_format_args,
        clippy::missing_const_for_fn,
        clippy::too_many_lines
    )
)]
#![allow(
    clippy::must_use_candidate,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod adapters;
pub mod apply;
pub mod category;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod family;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod summary;

pub use apply::{ApplyOutcome, BatchItem, apply_batch, apply_waivers};
pub use config::{ApplyOptions, DocumentFormat};
pub use engine::{ApplyReport, WaiverDecision, WaiverEngine};
pub use error::{Error, Result};
pub use family::SuiteFamily;
pub use policy::{WaiverIndex, WaiverLevel};
