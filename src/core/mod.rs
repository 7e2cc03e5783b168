// src/core/mod.rs
mod engine;
mod parser;
mod selector;
mod emitter;
mod cache;
mod report;

// Call graph extraction and expansion
mod call_graph;

pub use selector::{SelectionCriteria, Selector};
pub use emitter::{write_file_atomic, Emitter, StagedFile};
pub use cache::DocumentCache;
pub use report::ExtractionReport;
pub use call_graph::{call_sites, RecursiveExpander};

// Export the main engine
pub use engine::{Engine, ExtractionRequest};
