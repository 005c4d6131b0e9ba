//! QTI response and outcome processing.
//!
//! This crate interprets the rule trees of QTI assessment items and tests:
//! response processing derives item outcomes (SCORE, ...) from a
//! candidate's responses, outcome processing aggregates them into test
//! totals, weighted totals and per-category totals. [`engine::ScoringEngine`]
//! runs both over a batch of assessment results.

pub mod config;
pub mod context;
pub mod custom_operators;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;
pub mod node;
pub mod outcome;
pub mod package;
pub mod registry;
pub mod report;
pub mod response;
pub mod traits;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use engine::ScoringEngine;
pub use error::ScoringError;
