//! Fixpoint driver.
//!
//! [`apply_rules`] runs a rule set to exhaustion, unpacking unnecessary
//! compound nodes after every successful application.
//! [`apply_abstract_rules`] is the variant used for the pre-pass: rules run
//! to exhaustion without cleanup, then unnecessary top-level compounds are
//! removed, until nothing changes.
//!
//! Neither loop detects oscillating rule sets; a rule set that never
//! reaches a fixpoint never returns.

use serde::{Deserialize, Serialize};

use flowopt_core::Graph;

use crate::edit::{is_unnecessary_compound, unpack_compound_node, LAMBDA};
use crate::error::RewriteError;
use crate::rule::{Rule, RuleCatalog, RuleMeta};
use crate::rules::remove_unnecessary_compounds;

/// Graph sizes before and after a run, and the number of rule
/// applications in between.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub initial_nodes: usize,
    pub initial_edges: usize,
    pub applied_rules: usize,
    pub final_nodes: usize,
    pub final_edges: usize,
}

impl Stats {
    fn start(graph: &Graph) -> Self {
        Stats {
            initial_nodes: graph.node_count(),
            initial_edges: graph.edge_count(),
            ..Stats::default()
        }
    }

    fn finish(mut self, graph: &Graph) -> Self {
        self.final_nodes = graph.node_count();
        self.final_edges = graph.edge_count();
        self
    }

    /// Statistics of two consecutive runs: initial sizes of `self`, final
    /// sizes of `later`, applications summed.
    pub fn merge(self, later: Stats) -> Stats {
        Stats {
            initial_nodes: self.initial_nodes,
            initial_edges: self.initial_edges,
            applied_rules: self.applied_rules + later.applied_rules,
            final_nodes: later.final_nodes,
            final_edges: later.final_edges,
        }
    }
}

/// Called after every rule application with the applied rule and the
/// graph after the rewrite.
pub type RuleCallback<'a> = dyn FnMut(&RuleMeta, &Graph) + 'a;

#[derive(Default)]
pub struct ApplyOptions<'a> {
    pub on_rule_applied: Option<Box<RuleCallback<'a>>>,
}

impl<'a> ApplyOptions<'a> {
    pub fn new() -> Self {
        ApplyOptions::default()
    }

    pub fn on_rule_applied(callback: impl FnMut(&RuleMeta, &Graph) + 'a) -> Self {
        ApplyOptions {
            on_rule_applied: Some(Box::new(callback)),
        }
    }

    fn notify(&mut self, meta: &RuleMeta, graph: &Graph) {
        if let Some(callback) = self.on_rule_applied.as_mut() {
            callback(meta, graph);
        }
    }
}

/// Applies `rule` once. Returns `true` if it changed the graph.
pub fn apply_rule_once(graph: &mut Graph, rule: &dyn Rule) -> Result<bool, RewriteError> {
    rule.apply(graph)
}

/// Applies `rule` until it no longer matches. Returns `true` if it was
/// applied at least once.
pub fn apply_rule(graph: &mut Graph, rule: &dyn Rule) -> Result<bool, RewriteError> {
    let mut applied = false;
    while apply_rule_once(graph, rule)? {
        applied = true;
    }
    Ok(applied)
}

/// Unpacks unnecessary compounds to exhaustion, counting the run as one
/// application.
fn decompoundify(graph: &mut Graph, stats: &mut Stats, options: &mut ApplyOptions<'_>) -> Result<(), RewriteError> {
    let cleanup = remove_unnecessary_compounds();
    if apply_rule(graph, &cleanup)? {
        stats.applied_rules += 1;
        options.notify(cleanup.meta(), graph);
    }
    Ok(())
}

/// Applies `rules` to a fixpoint, in place.
pub fn apply_rules(
    graph: &mut Graph,
    rules: &RuleCatalog,
    options: &mut ApplyOptions<'_>,
) -> Result<Stats, RewriteError> {
    let mut stats = Stats::start(graph);
    decompoundify(graph, &mut stats, options)?;
    loop {
        let mut any_applied = false;
        for rule in rules.iter() {
            if apply_rule_once(graph, rule)? {
                any_applied = true;
                stats.applied_rules += 1;
                options.notify(rule.meta(), graph);
                decompoundify(graph, &mut stats, options)?;
            }
        }
        if !any_applied {
            break;
        }
    }
    let stats = stats.finish(graph);
    tracing::info!(
        applied = stats.applied_rules,
        nodes = stats.final_nodes,
        edges = stats.final_edges,
        "rule set converged"
    );
    Ok(stats)
}

/// Applies the pre-pass `rules` to a fixpoint, in place.
pub fn apply_abstract_rules(
    graph: &mut Graph,
    rules: &RuleCatalog,
    options: &mut ApplyOptions<'_>,
) -> Result<Stats, RewriteError> {
    let mut stats = Stats::start(graph);
    let pseudo = RuleMeta::new("remove_root_compounds", "remove unneeded top-level compounds");
    loop {
        loop {
            let mut any_applied = false;
            for rule in rules.iter() {
                if apply_rule_once(graph, rule)? {
                    any_applied = true;
                    stats.applied_rules += 1;
                    options.notify(rule.meta(), graph);
                }
            }
            if !any_applied {
                break;
            }
        }
        let removed = remove_root_compounds(graph)?;
        if removed == 0 {
            break;
        }
        tracing::debug!(removed, "removed top-level compounds");
        options.notify(&pseudo, graph);
    }
    let stats = stats.finish(graph);
    tracing::info!(
        applied = stats.applied_rules,
        nodes = stats.final_nodes,
        edges = stats.final_edges,
        "abstract rules converged"
    );
    Ok(stats)
}

/// Unpacks the unnecessary compounds at the top of a scope: top-level
/// nodes, children of recursive roots and children of lambda
/// implementations. Returns how many were unpacked.
pub fn remove_root_compounds(graph: &mut Graph) -> Result<usize, RewriteError> {
    let roots: Vec<_> = graph
        .node_ids()
        .into_iter()
        .filter(|&n| match graph.parent(n) {
            None => true,
            Some(parent) => {
                graph.node(parent).is_some_and(|p| p.recursive_root)
                    || graph
                        .parent(parent)
                        .and_then(|pp| graph.node(pp))
                        .is_some_and(|pp| pp.kind == LAMBDA)
            }
        })
        .filter(|&n| is_unnecessary_compound(graph, n))
        .collect();
    for &n in &roots {
        unpack_compound_node(graph, n)?;
    }
    Ok(roots.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FnRule;
    use crate::walk::tests::{add, constant, edge};
    use flowopt_core::Node;

    #[test]
    fn merge_keeps_initial_and_final_sizes() {
        let a = Stats {
            initial_nodes: 10,
            initial_edges: 9,
            applied_rules: 2,
            final_nodes: 8,
            final_edges: 7,
        };
        let b = Stats {
            initial_nodes: 8,
            initial_edges: 7,
            applied_rules: 3,
            final_nodes: 4,
            final_edges: 3,
        };
        let merged = a.merge(b);
        assert_eq!(merged.initial_nodes, 10);
        assert_eq!(merged.applied_rules, 5);
        assert_eq!(merged.final_edges, 3);
    }

    #[test]
    fn stats_serialize_in_camel_case() {
        let stats = Stats {
            initial_nodes: 4,
            initial_edges: 3,
            applied_rules: 1,
            final_nodes: 2,
            final_edges: 1,
        };
        insta::assert_json_snapshot!(stats, @r###"
        {
          "initialNodes": 4,
          "initialEdges": 3,
          "appliedRules": 1,
          "finalNodes": 2,
          "finalEdges": 1
        }
        "###);
    }

    #[test]
    fn apply_rules_cleans_up_compounds_first() {
        let mut graph = Graph::new();
        let wrap = graph.add_node(Node::compound("wrap").with_output("out", "number"));
        let c = constant(&mut graph, 1, Some(wrap));
        edge(&mut graph, (c, "output"), (wrap, "out"));

        let mut seen = Vec::new();
        let stats = {
            let mut options = ApplyOptions::on_rule_applied(|meta: &RuleMeta, _: &Graph| {
                seen.push(meta.id.clone())
            });
            apply_rules(&mut graph, &RuleCatalog::new(), &mut options).unwrap()
        };
        assert!(!graph.contains_node(wrap));
        assert_eq!(stats.applied_rules, 1);
        assert_eq!(stats.initial_nodes, 2);
        assert_eq!(stats.final_nodes, 1);
        assert_eq!(seen, ["remove_unnecessary_compounds"]);
    }

    #[test]
    fn apply_rules_runs_every_rule_to_a_fixpoint() {
        let mut graph = Graph::new();
        for _ in 0..3 {
            add(&mut graph, None);
        }
        let rules = RuleCatalog::new().with(FnRule::new("drop_add", "drop one add", |graph: &mut Graph| {
            match graph.node_ids().into_iter().find(|&n| graph.node(n).is_some_and(|v| v.kind == "math/add")) {
                Some(n) => {
                    graph.remove_node(n)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }));
        let stats = apply_rules(&mut graph, &rules, &mut ApplyOptions::new()).unwrap();
        assert_eq!(stats.applied_rules, 3);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn root_compounds_inside_recursive_roots_are_unpacked() {
        let mut graph = Graph::new();
        let def = graph.add_node(Node::compound("f").with_output("out", "number").recursive_root());
        let inner = graph.add_node_in(Node::compound("inner").with_output("out", "number"), Some(def)).unwrap();
        let c = constant(&mut graph, 1, Some(inner));
        edge(&mut graph, (c, "output"), (inner, "out"));
        edge(&mut graph, (inner, "out"), (def, "out"));

        let mut calls = 0;
        {
            let mut options = ApplyOptions::on_rule_applied(|meta: &RuleMeta, _: &Graph| {
                assert_eq!(meta.id, "remove_root_compounds");
                calls += 1;
            });
            apply_abstract_rules(&mut graph, &RuleCatalog::new(), &mut options).unwrap();
        }
        assert_eq!(calls, 1);
        assert!(!graph.contains_node(inner));
        assert_eq!(graph.parent(c), Some(def));
        assert_eq!(graph.predecessors(def, "out").as_slice(), &[flowopt_core::Port::new(c, "output")]);
    }
}
