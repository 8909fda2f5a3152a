//! Core library for financial document field extraction.
//!
//! This crate provides:
//! - An element index over parsed documents (positions, pages, syllabus
//!   tree, tables, crude-answer priors)
//! - A family of candidate resolvers driven by declarative predictor
//!   configs (regex, anchor-window, syllabus-scoped, table readers)
//! - Value normalization (full-width folding, Chinese numerals, dates,
//!   units) and enum post-mapping
//! - Fallback chains, row grouping under sub-primary-keys, and a schema
//!   walker that assembles the final answer tree
//!
//! Extraction is a pure function: `extract(config, index)` over immutable
//! inputs returns the same tree on every run. Documents may be processed in
//! parallel by running independent extractions; no cross-document state
//! exists.

pub mod answer;
pub mod chain;
pub mod element;
pub mod error;
pub mod group;
pub mod normalize;
pub mod pattern;
pub mod resolve;
pub mod schema;
pub mod walker;

pub use answer::{AnswerNode, AnswerTree, FieldAudit, LeafAnswer, LeafValue};
pub use element::index::{CrudeTag, ElementIndex};
pub use element::{elements_from_json, Element, ElementClass, TableGrid};
pub use error::{ConfigError, InputError, ProspectError, Result};
pub use schema::{EnumDef, FieldSpec, PredictorConfig};
pub use walker::extract;
