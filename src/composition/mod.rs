// Copyright 2025 Cowboy AI, LLC.

//! Objective composition
//!
//! This module combines the objectives of independent applications into the
//! single set a device should carry:
//! - [`algebra`]: pure composition of selectors, treatments and objectives
//! - [`tables`]: per-node objective stores with provenance
//! - [`tree`]: the recursive per-device evaluator
//! - [`parser`]: policy expressions such as `(1+2)>3/4`

pub mod algebra;
pub mod parser;
pub mod tables;
pub mod tree;

pub use algebra::{
    compose_override, compose_parallel, compose_sequential, intersect_selector,
    revert_selector_through_treatment, union_treatment,
};
pub use parser::PolicyParser;
pub use tables::{FilterTable, ForwardTable, NextTable, ObjectiveTable, TableEntry};
pub use tree::{
    CompositionOperator, CompositionTree, DEFAULT_PRIORITY_ADDEND, DEFAULT_PRIORITY_MULTIPLIER,
};
