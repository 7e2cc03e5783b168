// src/core/selector.rs
use std::collections::{BTreeSet, HashMap, HashSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};
use super::parser::IrDocument;

/// Ordered, de-duplicated list of compiled regular expressions
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<(String, Regex)>,
}

impl PatternSet {
    /// Compile patterns, keeping the first occurrence of duplicates
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if !seen.insert(pattern.to_string()) {
                continue;
            }
            let regex = Regex::new(pattern).map_err(|e| {
                ExtractError::Config(format!("pattern '{}' is invalid: {}", pattern, e))
            })?;
            compiled.push((pattern.to_string(), regex));
        }

        Ok(Self { patterns: compiled })
    }

    /// Unanchored search: true when any pattern matches anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(text))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.patterns.iter().map(|(source, re)| (source.as_str(), re))
    }
}

/// What to extract and what to leave out
#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    /// Exact function names, de-duplicated in first-occurrence order
    pub function_names: Vec<String>,
    pub name_patterns: PatternSet,
    pub line_patterns: PatternSet,
    pub ignore_patterns: PatternSet,
    pub recursion_depth: usize,
}

impl SelectionCriteria {
    pub fn new(
        function_names: &[String],
        name_patterns: &[String],
        line_patterns: &[String],
        ignore_patterns: &[String],
        recursion_depth: usize,
    ) -> Result<Self> {
        if function_names.is_empty() && name_patterns.is_empty() && line_patterns.is_empty() {
            return Err(ExtractError::Config(
                "at least one function to extract by its name, pattern or a line pattern should be specified"
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let function_names = function_names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            function_names,
            name_patterns: PatternSet::compile(name_patterns)?,
            line_patterns: PatternSet::compile(line_patterns)?,
            ignore_patterns: PatternSet::compile(ignore_patterns)?,
            recursion_depth,
        })
    }

    /// Ignore matching is absolute: it applies to any name, defined or not
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.is_match(name)
    }
}

/// Selected function names, each tagged with the depth it was first reached at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionResult {
    depths: HashMap<String, usize>,
    /// Callees found during expansion that have no body in the document
    external: BTreeSet<String>,
}

impl SelectionResult {
    /// Record `name` at `depth` unless it is already present; returns whether it was added
    pub fn insert(&mut self, name: &str, depth: usize) -> bool {
        if self.depths.contains_key(name) {
            return false;
        }
        self.depths.insert(name.to_string(), depth);
        true
    }

    pub fn mark_external(&mut self, name: &str) -> bool {
        self.external.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.depths.contains_key(name)
    }

    pub fn depth_of(&self, name: &str) -> Option<usize> {
        self.depths.get(name).copied()
    }

    /// Names first reached at exactly `depth`, sorted for deterministic traversal
    pub fn at_depth(&self, depth: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .depths
            .iter()
            .filter(|(_, &d)| d == depth)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn external(&self) -> &BTreeSet<String> {
        &self.external
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    /// Selected names ordered by their position in the document
    pub fn in_document_order<'a>(&'a self, doc: &IrDocument) -> Vec<&'a str> {
        let mut names: Vec<(usize, &str)> = self
            .depths
            .keys()
            .filter_map(|name| doc.position(name).map(|pos| (pos, name.as_str())))
            .collect();
        names.sort_unstable();
        names.into_iter().map(|(_, name)| name).collect()
    }
}

/// Applies inclusion and exclusion criteria to a parsed document
pub struct Selector {
    /// Maximum number of ignored names listed at info level per pattern
    ignored_names_log_limit: usize,
}

impl Selector {
    pub fn new(ignored_names_log_limit: usize) -> Self {
        Self {
            ignored_names_log_limit,
        }
    }

    /// Compute the depth-0 selection: union of all positive criteria minus ignored names
    pub fn select(&self, doc: &IrDocument, criteria: &SelectionCriteria) -> SelectionResult {
        let ignored = self.find_ignored(doc, criteria);
        let mut result = SelectionResult::default();

        for name in &criteria.function_names {
            if !doc.contains(name) {
                warn!("no function with the name '{}' was found", name);
            } else if ignored.contains(name.as_str()) {
                debug!("found target function by name, but it is ignored: '{}'", name);
            } else if result.insert(name, 0) {
                info!("found target function by name: '{}'", name);
            }
        }

        for (source, re) in criteria.name_patterns.iter() {
            let mut matched = 0;
            for func in doc.functions().filter(|f| re.is_match(&f.name)) {
                matched += 1;
                if ignored.contains(func.name.as_str()) {
                    debug!(
                        "matching pattern '{}', found target function, but it is ignored: '{}'",
                        source, func.name
                    );
                } else if result.insert(&func.name, 0) {
                    info!("matching pattern '{}', found target function: '{}'", source, func.name);
                }
            }
            if matched == 0 {
                warn!("no functions matching pattern '{}' were found", source);
            }
        }

        for (source, re) in criteria.line_patterns.iter() {
            let mut matched = 0;
            for func in doc.functions() {
                let lines = matching_lines(doc.body(func), re);
                if lines.is_empty() {
                    continue;
                }
                matched += 1;
                for line in &lines {
                    debug!("line pattern '{}' matched in '{}': '{}'", source, func.name, line);
                }
                if ignored.contains(func.name.as_str()) {
                    debug!(
                        "matching line pattern '{}', found target function, but it is ignored: '{}'",
                        source, func.name
                    );
                } else if result.insert(&func.name, 0) {
                    info!(
                        "matching line pattern '{}', found target function: '{}' ({} line(s) matched)",
                        source,
                        func.name,
                        lines.len()
                    );
                }
            }
            if matched == 0 {
                warn!("no functions matching line pattern '{}' were found", source);
            }
        }

        result
    }

    /// Names of defined functions matched by any ignore pattern
    fn find_ignored<'a>(&self, doc: &'a IrDocument, criteria: &SelectionCriteria) -> HashSet<&'a str> {
        let mut ignored = HashSet::new();

        for (source, re) in criteria.ignore_patterns.iter() {
            let names: Vec<&str> = doc
                .functions()
                .filter(|f| re.is_match(&f.name))
                .map(|f| f.name.as_str())
                .collect();

            if names.is_empty() {
                warn!("the ignoring pattern '{}' is redundant, no functions matching it", source);
                continue;
            }

            let listing: String = names.iter().map(|n| format!("\n\t'{}'", n)).collect();
            if names.len() > self.ignored_names_log_limit {
                info!(
                    "matching pattern '{}', {} functions will be ignored ... (their full list is omitted)",
                    source,
                    names.len()
                );
                debug!("omitted list:{}", listing);
            } else {
                info!(
                    "matching pattern '{}', {} function(s) will be ignored:{}",
                    source,
                    names.len(),
                    listing
                );
            }
            ignored.extend(names);
        }

        ignored
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Definition lines matching `re`, leading whitespace stripped, blank lines skipped
fn matching_lines<'a>(body: &'a [String], re: &Regex) -> Vec<&'a str> {
    body.iter()
        .map(|line| line.trim_start())
        .filter(|line| !line.is_empty() && re.is_match(line))
        .collect()
}
