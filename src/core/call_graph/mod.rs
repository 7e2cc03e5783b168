// src/core/call_graph/mod.rs
//! Call-graph derivation and bounded expansion
//!
//! Edges come from `call`/`invoke` instructions that name a literal `@symbol`.
//! Expansion walks those edges breadth-first up to a depth limit.

mod call_graph;
mod expander;

pub use call_graph::{call_sites, CallGraph};
pub use expander::RecursiveExpander;
