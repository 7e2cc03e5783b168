// src/core/report.rs
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::parser::{IrDocument, LineRange};
use super::selector::SelectionResult;

/// Machine-readable summary of one extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// SHA-256 of the input text
    pub input_sha256: String,
    pub generated_at: DateTime<Utc>,
    pub recursion_depth: usize,
    /// Extracted functions in document order
    pub functions: Vec<ExtractedFunction>,
    /// Called but not defined in the input, sorted
    pub external_callees: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFunction {
    pub name: String,
    pub depth: usize,
    pub line_range: LineRange,
}

impl ExtractionReport {
    pub fn new(
        input: &Path,
        output: &Path,
        input_sha256: &str,
        recursion_depth: usize,
        doc: &IrDocument,
        selection: &SelectionResult,
    ) -> Self {
        let functions = selection
            .in_document_order(doc)
            .into_iter()
            .filter_map(|name| {
                let func = doc.function(name)?;
                Some(ExtractedFunction {
                    name: name.to_string(),
                    depth: selection.depth_of(name)?,
                    line_range: func.line_range,
                })
            })
            .collect();

        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            input_sha256: input_sha256.to_string(),
            generated_at: Utc::now(),
            recursion_depth,
            functions,
            external_callees: selection.external().iter().cloned().collect(),
        }
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
