// Dependency-graph operations for workflow steps

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::error::{Error, Result};

/// Topologically sort a step dependency graph (step -> set of steps it
/// depends on). Returns the steps in an order where dependencies come first.
/// A cycle makes the spec invalid.
pub fn sort_dependencies(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>> {
    let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (step, deps) in graph {
        g.add_node(step.as_str());
        for dep in deps {
            g.add_node(dep.as_str());
            g.add_edge(dep.as_str(), step.as_str(), ());
        }
    }

    match toposort(&g, None) {
        Ok(nodes) => Ok(nodes.into_iter().map(|n| n.to_string()).collect()),
        Err(cycle) => Err(Error::invalid_resource(format!(
            "could not sort workflow steps, cycle detected at '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        edges
            .iter()
            .map(|(step, deps)| {
                (
                    step.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn dependencies_sort_before_dependents() {
        let sorted =
            sort_dependencies(&graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])])).unwrap();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_graphs_sort() {
        let sorted = sort_dependencies(&graph(&[
            ("d", &["b", "c"]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("a", &[]),
        ]))
        .unwrap();
        let pos = |s: &str| sorted.iter().position(|x| x == s).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = sort_dependencies(&graph(&[("a", &["b"]), ("b", &["a"])])).unwrap_err();
        assert!(matches!(err, Error::InvalidResource(_)));
    }

    #[test]
    fn dependencies_on_undeclared_steps_still_sort() {
        // A dangling dependency is a graph node even without its own entry;
        // validity of the reference is checked elsewhere.
        let sorted = sort_dependencies(&graph(&[("b", &["ghost"])])).unwrap();
        let pos = |s: &str| sorted.iter().position(|x| x == s).unwrap();
        assert!(pos("ghost") < pos("b"));
    }
}
