//! The optimization pipeline.

use flowopt_core::Graph;

use crate::driver::{apply_abstract_rules, apply_rules, ApplyOptions, RuleCallback, Stats};
use crate::error::RewriteError;
use crate::rule::{RuleCatalog, RuleMeta};
use crate::rules::{abstract_rules, cleanup_rules, default_rules, DEAD_CODE_RULES};

/// Configuration of [`optimize`].
#[derive(Default)]
pub struct OptimizeOptions<'a> {
    /// Replaces the default rule set. Used as given, `keep_dead_code` does
    /// not filter it.
    pub rules: Option<RuleCatalog>,
    /// Replaces the abstract pre-pass rule set.
    pub abstract_rules: Option<RuleCatalog>,
    /// Replaces the cleanup rule set. Used as given, like `rules`.
    pub cleanup_rules: Option<RuleCatalog>,
    /// Leaves dead code in place.
    pub keep_dead_code: bool,
    /// Called after every rule application.
    pub on_rule_applied: Option<Box<RuleCallback<'a>>>,
}

impl<'a> OptimizeOptions<'a> {
    pub fn on_rule_applied(mut self, callback: impl FnMut(&RuleMeta, &Graph) + 'a) -> Self {
        self.on_rule_applied = Some(Box::new(callback));
        self
    }
}

/// An optimized graph and the statistics of all phases.
#[derive(Debug, Clone)]
pub struct Optimized {
    pub graph: Graph,
    pub stats: Stats,
}

/// Runs the abstract pre-pass, the default rules and the cleanup rules on
/// `graph`, each to a fixpoint.
pub fn optimize(mut graph: Graph, options: OptimizeOptions<'_>) -> Result<Optimized, RewriteError> {
    let OptimizeOptions {
        rules,
        abstract_rules: abstract_override,
        cleanup_rules: cleanup_override,
        keep_dead_code,
        on_rule_applied,
    } = options;
    let without_dead_code = |catalog: RuleCatalog| {
        if keep_dead_code {
            catalog.without(&DEAD_CODE_RULES)
        } else {
            catalog
        }
    };
    let rules = rules.unwrap_or_else(|| without_dead_code(default_rules()));
    let abstract_rules = abstract_override.unwrap_or_else(abstract_rules);
    let cleanup = cleanup_override.unwrap_or_else(|| without_dead_code(cleanup_rules()));
    let mut apply = ApplyOptions { on_rule_applied };

    let abstract_stats = apply_abstract_rules(&mut graph, &abstract_rules, &mut apply)?;
    tracing::info!(phase = "abstract", applied = abstract_stats.applied_rules, "phase finished");
    let default_stats = apply_rules(&mut graph, &rules, &mut apply)?;
    tracing::info!(phase = "default", applied = default_stats.applied_rules, "phase finished");
    let cleanup_stats = apply_rules(&mut graph, &cleanup, &mut apply)?;
    tracing::info!(phase = "cleanup", applied = cleanup_stats.applied_rules, "phase finished");

    let stats = abstract_stats.merge(default_stats).merge(cleanup_stats);
    Ok(Optimized { graph, stats })
}
