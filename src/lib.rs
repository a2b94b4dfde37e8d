//! # asreported
//!
//! A library for reconstructing "as reported" bank financial statements
//! from the SEC's quarterly Financial Statement Data Sets and deriving the
//! trailing-twelve-month (TTM) and average-balance metrics used in
//! bank-stock analysis ratios.
//!
//! ## Core Concepts
//!
//! - **Submission / Fact / Presentation Item**: the three per-quarter row
//!   sets (`sub.txt`, `num.txt`, `pre.txt`), streamed and filtered to the
//!   configured filer population and to consolidated facts only
//! - **Canonical Statement**: one filer's merged, stable, ordered line-item
//!   shape spanning filings that were never designed to line up
//! - **Tag Equivalence**: interchangeable concept identifiers, curated plus
//!   learned while merging, resolved as a pure lookup
//! - **Q4 Derivation**: fourth-quarter income figures inferred as annual
//!   minus the first three quarters, preferring quarters restated inside the
//!   annual filing
//! - **Null means not reported**: an unresolvable value is an explicit null
//!   plus a flag, never zero and never an error
//!
//! ## Example
//!
//! ```rust,ignore
//! use asreported::{run_pipeline, persist, EngineConfig};
//! use std::path::PathBuf;
//!
//! let config = EngineConfig::default();
//! let quarters = vec![PathBuf::from("data/2024q3"), PathBuf::from("data/2024q4")];
//!
//! let records = run_pipeline(config, &quarters)?;
//! persist::write_records(&records, &PathBuf::from("out"))?;
//! ```

pub mod average;
pub mod canonical;
pub mod config;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod persist;
pub mod presentation;
pub mod projection;
pub mod schema;
pub mod ttm;
pub mod utils;

pub use average::BalanceExtractor;
pub use canonical::build_canonical;
pub use config::{ConceptGroups, EngineConfig, PlausibilityBounds};
pub use engine::Engine;
pub use equivalence::TagEquivalences;
pub use error::{EngineError, Result};
pub use ingestion::{load_quarter, FactStore, FilerFacts};
pub use metrics::{compute_fundamentals, compute_ratios};
pub use presentation::primary_statements;
pub use projection::Projector;
pub use schema::*;
pub use ttm::{ttm_from_statements, TtmCalculator};
pub use utils::first_success;

use std::path::PathBuf;

/// Validates the configuration and runs the full pipeline: ingest every
/// quarter, build one record per filer. The convenience wrapper around
/// [`Engine`].
pub fn run_pipeline(config: EngineConfig, quarters: &[PathBuf]) -> Result<Vec<FilerRecord>> {
    Engine::new(config)?.run(quarters)
}
