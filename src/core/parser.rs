// src/core/parser.rs
use std::collections::HashMap;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// Inclusive, 1-based line range in the source document
pub type LineRange = (usize, usize);

/// A `define ... @name(...) { ... }` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Symbol following `@` in the header, without surrounding quotes
    pub name: String,
    /// Header line through closing brace
    pub line_range: LineRange,
}

/// A one-line `declare ... @name(...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: Option<String>,
    pub line: usize,
}

/// Top-level items of an IR document, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopLevelEntity {
    Function(FunctionDefinition),
    Declaration(Declaration),
    /// Types, globals, attribute groups, metadata, comments, blank lines
    Other(LineRange),
}

/// Parsed textual IR: the source lines plus their top-level structure
#[derive(Debug, Clone)]
pub struct IrDocument {
    lines: Vec<String>,
    entities: Vec<TopLevelEntity>,
    /// Function name -> index into `entities`
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Define,
    Declare,
    Other,
}

/// `@name(` where name is a quoted string or a bare LLVM identifier
fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@("(?:[^"\\]|\\.)*"|[-a-zA-Z$._0-9]+)\s*\("#)
            .expect("Invalid symbol regex")
    })
}

/// Strip the quotes of a quoted LLVM identifier
pub(crate) fn unquote_symbol(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

impl IrDocument {
    /// Split IR text into top-level entities and build the name index
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut entities = Vec::new();
        let mut index = HashMap::new();
        let mut other_start: Option<usize> = None;
        let mut i = 0;

        while i < lines.len() {
            let kind = classify(&lines[i]);
            if kind != LineKind::Other {
                if let Some(start) = other_start.take() {
                    entities.push(TopLevelEntity::Other((start + 1, i)));
                }
            }

            match kind {
                LineKind::Define => {
                    let start = i;
                    let (name, params_at) = header_symbol(&lines[i]).ok_or_else(|| {
                        ExtractError::parse(start + 1, "function header without an extractable name")
                    })?;
                    let end = find_body_end(&lines, start, params_at)?;

                    if index.contains_key(&name) {
                        return Err(ExtractError::parse(
                            start + 1,
                            format!("duplicate definition of function '{}'", name),
                        ));
                    }
                    index.insert(name.clone(), entities.len());
                    entities.push(TopLevelEntity::Function(FunctionDefinition {
                        name,
                        line_range: (start + 1, end + 1),
                    }));
                    i = end + 1;
                }
                LineKind::Declare => {
                    entities.push(TopLevelEntity::Declaration(Declaration {
                        name: header_name(&lines[i]),
                        line: i + 1,
                    }));
                    i += 1;
                }
                LineKind::Other => {
                    other_start.get_or_insert(i);
                    i += 1;
                }
            }
        }

        if let Some(start) = other_start {
            entities.push(TopLevelEntity::Other((start + 1, lines.len())));
        }

        Ok(Self {
            lines,
            entities,
            index,
        })
    }

    pub fn entities(&self) -> &[TopLevelEntity] {
        &self.entities
    }

    /// All function definitions in document order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.entities.iter().filter_map(|entity| match entity {
            TopLevelEntity::Function(func) => Some(func),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        match self.index.get(name).map(|&idx| &self.entities[idx]) {
            Some(TopLevelEntity::Function(func)) => Some(func),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn function_count(&self) -> usize {
        self.index.len()
    }

    /// Position of a function among the document's entities
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Lines covered by an inclusive 1-based range
    pub fn lines_in(&self, range: LineRange) -> &[String] {
        &self.lines[range.0 - 1..range.1]
    }

    /// Header, body and closing brace of a definition
    pub fn body(&self, func: &FunctionDefinition) -> &[String] {
        self.lines_in(func.line_range)
    }

    pub fn line(&self, number: usize) -> &str {
        &self.lines[number - 1]
    }
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if starts_with_keyword(trimmed, "define") {
        LineKind::Define
    } else if starts_with_keyword(trimmed, "declare") {
        LineKind::Declare
    } else {
        LineKind::Other
    }
}

fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .map_or(false, |rest| rest.starts_with(|c: char| c.is_whitespace()))
}

/// Name of the first `@symbol(` on a header line
fn header_name(line: &str) -> Option<String> {
    header_symbol(line).map(|(name, _)| name)
}

/// Name of the first `@symbol(` and the byte offset just past its `(`
fn header_symbol(line: &str) -> Option<(String, usize)> {
    let caps = symbol_regex().captures(line)?;
    let name = unquote_symbol(caps.get(1)?.as_str());
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), caps.get(0)?.end()))
}

/// Parameter list and brace state of a definition being scanned
#[derive(Debug, Default)]
struct BodyScan {
    /// Open parentheses of the parameter list, starting inside `@name(`
    parens: i64,
    params_closed: bool,
    depth: i64,
    opened: bool,
}

impl BodyScan {
    fn new() -> Self {
        Self {
            parens: 1,
            ..Default::default()
        }
    }

    /// Braces only count once the parameter list is closed
    fn feed(&mut self, text: &str) {
        for c in structural_chars(text) {
            if !self.params_closed {
                match c {
                    '(' => self.parens += 1,
                    ')' => {
                        self.parens -= 1;
                        self.params_closed = self.parens == 0;
                    }
                    _ => {}
                }
                continue;
            }
            match c {
                '{' => {
                    self.depth += 1;
                    self.opened = true;
                }
                '}' => self.depth -= 1,
                _ => {}
            }
        }
    }
}

/// Index of the line where the body opened after the parameter list closes
fn find_body_end(lines: &[String], start: usize, params_at: usize) -> Result<usize> {
    let mut scan = BodyScan::new();

    for (offset, line) in lines[start..].iter().enumerate() {
        let text = if offset == 0 { &line[params_at..] } else { line.as_str() };
        scan.feed(text);

        if scan.depth < 0 {
            return Err(ExtractError::parse(
                start + offset + 1,
                "unbalanced closing brace in function body",
            ));
        }
        if scan.opened && scan.depth == 0 {
            return Ok(start + offset);
        }
    }

    Err(ExtractError::parse(
        start + 1,
        "unterminated function body (end of file reached with unbalanced braces)",
    ))
}

/// Characters outside quoted strings and `;` comments
fn structural_chars(line: &str) -> impl Iterator<Item = char> + '_ {
    line.chars()
        .scan((false, false), |(in_string, escaped), c| {
            if *in_string {
                match c {
                    _ if *escaped => *escaped = false,
                    '\\' => *escaped = true,
                    '"' => *in_string = false,
                    _ => {}
                }
                return Some(None);
            }
            match c {
                '"' => {
                    *in_string = true;
                    Some(None)
                }
                ';' => None,
                _ => Some(Some(c)),
            }
        })
        .flatten()
}
