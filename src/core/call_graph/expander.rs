// src/core/call_graph/expander.rs
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::CallGraph;
use super::super::selector::{SelectionCriteria, SelectionResult};

/// Breadth-first expansion of a selection along the call graph
pub struct RecursiveExpander {
    /// Maximum number of call-graph hops from a depth-0 function
    max_depth: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionStats {
    /// Functions added at each depth, index 0 being depth 1
    pub added_per_depth: Vec<usize>,
    /// Callees skipped because an ignore pattern matched them
    pub ignored_callees: usize,
    /// Depth at which the frontier ran empty, if it did before `max_depth`
    pub exhausted_at: Option<usize>,
}

impl ExpansionStats {
    pub fn total_added(&self) -> usize {
        self.added_per_depth.iter().sum()
    }
}

impl RecursiveExpander {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Add callees of selected functions, one depth level at a time
    ///
    /// A name is recorded at the lowest depth it is reached at and never
    /// visited twice, so cycles terminate after at most one addition per
    /// function. Ignored names are skipped at every depth. Callees without
    /// a definition in the document are recorded as external.
    pub fn expand(
        &self,
        graph: &CallGraph,
        criteria: &SelectionCriteria,
        mut selection: SelectionResult,
    ) -> (SelectionResult, ExpansionStats) {
        let doc = graph.document();
        let mut stats = ExpansionStats::default();

        for depth in 1..=self.max_depth {
            let frontier: Vec<String> = selection
                .at_depth(depth - 1)
                .into_iter()
                .map(str::to_string)
                .collect();

            if frontier.is_empty() {
                info!("all function calls have been found by recursion depth {}", depth - 1);
                stats.exhausted_at = Some(depth - 1);
                break;
            }

            let mut added = 0;
            for caller in frontier
                .iter()
                .filter(|name| doc.contains(name) && !criteria.is_ignored(name))
            {
                for callee in graph.callees(caller) {
                    if selection.contains(callee) {
                        continue;
                    }
                    if criteria.is_ignored(callee) {
                        stats.ignored_callees += 1;
                        debug!(
                            "found function call on recursion depth {}, but it is ignored: '{}'",
                            depth, callee
                        );
                        continue;
                    }
                    if !doc.contains(callee) {
                        if selection.mark_external(callee) {
                            debug!("'{}' calls external function '{}', nothing to extract", caller, callee);
                        }
                        continue;
                    }
                    if selection.insert(callee, depth) {
                        added += 1;
                        info!("found function call on recursion depth {}: '{}'", depth, callee);
                    }
                }
            }
            stats.added_per_depth.push(added);
        }

        if stats.exhausted_at.is_none() && self.max_depth > 0 {
            info!("function calls up to max recursion depth {} have been found", self.max_depth);
        }

        (selection, stats)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::core::parser::IrDocument;
    use crate::core::selector::Selector;

    const CHAIN: &str = r#"define void @main() {
  call void @helper()
  ret void
}

define void @helper() {
  call void @main()
  call void @leaf()
  call void @external_fn()
  ret void
}

define void @leaf() {
  call void @leaf()
  call void @deepest()
  ret void
}

define void @deepest() {
  ret void
}

define void @unused() {
  ret void
}
"#;

    fn run(names: &[&str], ignore: &[&str], depth: usize) -> SelectionResult {
        let doc = Rc::new(IrDocument::parse(CHAIN).unwrap());
        let graph = CallGraph::new(Rc::clone(&doc));
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let ignore: Vec<String> = ignore.iter().map(|s| s.to_string()).collect();
        let criteria = SelectionCriteria::new(&names, &[], &[], &ignore, depth).unwrap();
        let initial = Selector::default().select(&doc, &criteria);
        RecursiveExpander::new(depth).expand(&graph, &criteria, initial).0
    }

    #[test]
    fn test_depth_zero_is_identity() {
        let result = run(&["main"], &[], 0);
        assert_eq!(result.len(), 1);
        assert!(result.external().is_empty());
    }

    #[test]
    fn test_depths_are_lowest_first_reached() {
        let result = run(&["main"], &[], 10);
        assert_eq!(result.depth_of("main"), Some(0));
        assert_eq!(result.depth_of("helper"), Some(1));
        assert_eq!(result.depth_of("leaf"), Some(2));
        assert_eq!(result.depth_of("deepest"), Some(3));
        assert!(!result.contains("unused"));
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_external_callee_is_recorded_not_selected() {
        let result = run(&["helper"], &[], 1);
        assert!(!result.contains("external_fn"));
        assert!(result.external().contains("external_fn"));
    }

    #[test]
    fn test_ignored_callee_never_enters() {
        let result = run(&["main"], &["elp"], 5);
        assert_eq!(result.len(), 1);
        assert!(!result.contains("helper"));
        assert!(!result.contains("leaf"));
    }

    #[test]
    fn test_depth_monotonicity() {
        let mut previous: Vec<String> = Vec::new();
        for depth in 0..6 {
            let result = run(&["main"], &[], depth);
            for name in &previous {
                assert!(result.contains(name), "'{}' dropped at depth {}", name, depth);
            }
            previous = ["main", "helper", "leaf", "deepest"]
                .iter()
                .filter(|n| result.contains(n))
                .map(|n| n.to_string())
                .collect();
        }
        assert_eq!(previous.len(), 4);
    }

    #[test]
    fn test_cycles_terminate_with_stats() {
        let doc = Rc::new(IrDocument::parse(CHAIN).unwrap());
        let graph = CallGraph::new(Rc::clone(&doc));
        let criteria =
            SelectionCriteria::new(&["leaf".to_string()], &[], &[], &[], 1000).unwrap();
        let initial = Selector::default().select(&doc, &criteria);
        let (result, stats) = RecursiveExpander::new(1000).expand(&graph, &criteria, initial);

        assert_eq!(result.len(), 2);
        assert_eq!(stats.total_added(), 1);
        assert_eq!(stats.exhausted_at, Some(2));
    }
}
