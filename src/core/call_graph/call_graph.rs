// src/core/call_graph/call_graph.rs
use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::super::parser::{unquote_symbol, FunctionDefinition, IrDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Call,   // call / tail call / musttail call
    Invoke, // invoke ... to label ... unwind label ...
}

/// One direct call of a literal symbol inside a function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    /// 1-based line in the document
    pub line: usize,
    pub kind: CallKind,
}

/// Callees per function of one document, extracted on first request and memoized
#[derive(Debug)]
pub struct CallGraph {
    document: Rc<IrDocument>,
    callees: HashMap<String, OnceCell<BTreeSet<String>>>,
}

/// `call` or `invoke` keyword preceded by start of line, whitespace or `=`
fn call_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[\s=])(call|invoke)\s").expect("Invalid call keyword regex")
    })
}

/// `@name(` or `%name(` operand; like header symbols, whitespace may precede `(`
fn callee_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([@%])("(?:[^"\\]|\\.)*"|[-a-zA-Z$._0-9]+)(\s*)\("#)
            .expect("Invalid callee regex")
    })
}

impl CallGraph {
    pub fn new(document: Rc<IrDocument>) -> Self {
        let callees = document
            .functions()
            .map(|func| (func.name.clone(), OnceCell::new()))
            .collect();

        Self { document, callees }
    }

    pub fn document(&self) -> &IrDocument {
        &self.document
    }

    /// Deduplicated names directly called by `name`; empty for unknown functions
    pub fn callees(&self, name: &str) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();

        match (self.callees.get(name), self.document.function(name)) {
            (Some(cell), Some(func)) => cell.get_or_init(|| {
                call_sites(&self.document, func)
                    .into_iter()
                    .map(|site| site.callee)
                    .collect()
            }),
            _ => &EMPTY,
        }
    }

    /// Number of functions whose callees have been computed so far
    pub fn memoized_count(&self) -> usize {
        self.callees.values().filter(|cell| cell.get().is_some()).count()
    }
}

/// Every literal-symbol call site in a definition, in line order
pub fn call_sites(doc: &IrDocument, func: &FunctionDefinition) -> Vec<CallSite> {
    let first_line = func.line_range.0;
    doc.body(func)
        .iter()
        .enumerate()
        .flat_map(|(offset, line)| {
            calls_in_line(line)
                .into_iter()
                .map(move |(callee, kind)| CallSite {
                    callee,
                    line: first_line + offset,
                    kind,
                })
        })
        .collect()
}

/// Direct callees on a single line; indirect calls through `%values` yield nothing
fn calls_in_line(line: &str) -> Vec<(String, CallKind)> {
    let keywords: Vec<(usize, usize, CallKind)> = call_keyword_regex()
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let kind = if m.as_str() == "invoke" {
                CallKind::Invoke
            } else {
                CallKind::Call
            };
            (m.start(), m.end(), kind)
        })
        .collect();

    let mut calls = Vec::new();
    for (i, &(_, start, kind)) in keywords.iter().enumerate() {
        // Each call site owns the text up to the next call keyword
        let end = keywords.get(i + 1).map_or(line.len(), |&(next, _, _)| next);
        let segment = &line[start..end];

        // `%T (args...)` with a space is a struct-returning function type, not the operand
        let operand = callee_regex().captures_iter(segment).find(|caps| {
            let local = caps.get(1).map_or(false, |sigil| sigil.as_str() == "%");
            let spaced = caps.get(3).map_or(false, |gap| !gap.as_str().is_empty());
            !(local && spaced)
        });
        if let Some(caps) = operand {
            let is_global = caps.get(1).map_or(false, |sigil| sigil.as_str() == "@");
            if let (true, Some(name)) = (is_global, caps.get(2)) {
                calls.push((unquote_symbol(name.as_str()).to_string(), kind));
            }
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(line: &str) -> Vec<String> {
        calls_in_line(line).into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_plain_and_tail_calls() {
        assert_eq!(names("  %1 = call i32 @foo(i32 0)"), vec!["foo"]);
        assert_eq!(names("  tail call void @bar()"), vec!["bar"]);
        assert_eq!(names("  musttail call fastcc void @\"quoted fn\"(ptr %x)"), vec!["quoted fn"]);
    }

    #[test]
    fn test_varargs_function_type_and_struct_return() {
        assert_eq!(
            names("  %r = call i32 (ptr, ...) @printf(ptr @.str, i32 %v)"),
            vec!["printf"]
        );
        assert_eq!(names("  %s = call %struct.pair @make_pair(i32 1)"), vec!["make_pair"]);
    }

    #[test]
    fn test_space_before_argument_list() {
        assert_eq!(names("  call void @f (i32 0)"), vec!["f"]);
        assert_eq!(
            names("  %s = call %struct.S (ptr, ...) @make(ptr %p)"),
            vec!["make"]
        );
        assert!(names("  %v = call i32 %fp(i32 0)").is_empty());
    }

    #[test]
    fn test_invoke() {
        let calls = calls_in_line("  invoke void @may_throw() to label %ok unwind label %lpad");
        assert_eq!(calls, vec![("may_throw".to_string(), CallKind::Invoke)]);
    }

    #[test]
    fn test_indirect_call_has_no_edge() {
        assert!(names("  call void %fnptr(ptr @global_arg)").is_empty());
        assert!(names("  %3 = call i32 %2(i32 1)").is_empty());
    }

    #[test]
    fn test_non_call_references_have_no_edge() {
        assert!(names("  store ptr @callback, ptr %slot").is_empty());
        assert!(names("@vtable = global [1 x ptr] [ptr @call_me]").is_empty());
        assert!(names("  %x = load i32, ptr @recall").is_empty());
    }

    #[test]
    fn test_multiple_call_sites_on_one_line() {
        assert_eq!(
            names("  call void @a() call void %ind() call void @b(i32 0)"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_callees_are_deduplicated_and_memoized() {
        let text = r#"define void @main() {
  call void @helper()
  call void @helper()
  call void @puts(ptr null)
  ret void
}

define void @helper() {
  call void @main()
  ret void
}
"#;
        let doc = Rc::new(IrDocument::parse(text).unwrap());
        let graph = CallGraph::new(Rc::clone(&doc));
        assert_eq!(graph.memoized_count(), 0);

        let callees: Vec<&str> = graph.callees("main").iter().map(String::as_str).collect();
        assert_eq!(callees, vec!["helper", "puts"]);
        assert_eq!(graph.memoized_count(), 1);

        graph.callees("main");
        assert_eq!(graph.memoized_count(), 1);
        assert!(graph.callees("puts").is_empty());

        let sites = call_sites(&doc, doc.function("main").unwrap());
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].line, 2);
        assert_eq!(sites[2].callee, "puts");
    }
}
