//! Rules and rule catalogs.
//!
//! A rule is either a (matcher, rewriter) pair that rewrites the first
//! matching node of a scan ([`RewriteRule`]), or a whole-graph function
//! ([`FnRule`]). Applying a rule once reports whether it changed the graph.

use indexmap::IndexMap;
use serde::Serialize;

use flowopt_core::Graph;

use crate::error::RewriteError;
use crate::matcher::{test, BoxMatcher, Matcher, MatcherExt};
use crate::rewriter::{BoxRewriter, Rewriter};

/// Reporting metadata of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMeta {
    /// Stable identifier, the key in rule catalogs.
    pub id: String,
    /// Human-readable description.
    pub name: String,
}

impl RuleMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        RuleMeta {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub trait Rule {
    fn meta(&self) -> &RuleMeta;

    /// Applies the rule at most once. Returns `true` if the graph changed.
    fn apply(&self, graph: &mut Graph) -> Result<bool, RewriteError>;
}

/// Rewrites the first node, in node enumeration order, that the matcher
/// accepts.
pub struct RewriteRule {
    meta: RuleMeta,
    matcher: BoxMatcher,
    rewriter: BoxRewriter,
}

impl RewriteRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        matcher: impl Matcher + 'static,
        rewriter: impl Rewriter + 'static,
    ) -> Self {
        RewriteRule {
            meta: RuleMeta::new(id, name),
            matcher: matcher.boxed(),
            rewriter: Box::new(rewriter),
        }
    }
}

impl Rule for RewriteRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn apply(&self, graph: &mut Graph) -> Result<bool, RewriteError> {
        for node in graph.node_ids() {
            if !graph.contains_node(node) {
                continue;
            }
            if let Some(m) = test(&self.matcher, graph, node) {
                tracing::debug!(rule = %self.meta.id, node = %graph.label(node), "applying rule");
                self.rewriter.rewrite(graph, &m)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A rule implemented by a function over the whole graph.
pub struct FnRule<F> {
    meta: RuleMeta,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&mut Graph) -> Result<bool, RewriteError>,
{
    pub fn new(id: impl Into<String>, name: impl Into<String>, f: F) -> Self {
        FnRule {
            meta: RuleMeta::new(id, name),
            f,
        }
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&mut Graph) -> Result<bool, RewriteError>,
{
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn apply(&self, graph: &mut Graph) -> Result<bool, RewriteError> {
        let applied = (self.f)(graph)?;
        if applied {
            tracing::debug!(rule = %self.meta.id, "applied rule");
        }
        Ok(applied)
    }
}

pub type BoxRule = Box<dyn Rule>;

/// An ordered map from rule id to rule.
#[derive(Default)]
pub struct RuleCatalog {
    rules: IndexMap<String, BoxRule>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        RuleCatalog::default()
    }

    /// Appends a rule. A rule with the same id is replaced in place.
    pub fn push(&mut self, rule: impl Rule + 'static) {
        let id = rule.meta().id.clone();
        self.rules.insert(id, Box::new(rule));
    }

    pub fn with(mut self, rule: impl Rule + 'static) -> Self {
        self.push(rule);
        self
    }

    /// Appends every rule of `other`.
    pub fn extend(&mut self, other: RuleCatalog) {
        self.rules.extend(other.rules);
    }

    /// The catalog without the rules named in `ids`. Unknown ids are
    /// ignored.
    pub fn without<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        for id in ids {
            self.rules.shift_remove(id.as_ref());
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules.get(id).map(|r| r.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.values().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::by_id;
    use crate::rewriter;
    use crate::walk::tests::add;

    fn remove_adds() -> RewriteRule {
        RewriteRule::new(
            "remove_adds",
            "remove additions",
            by_id("math/add"),
            rewriter::from_fn(|graph: &mut Graph, m: &crate::matcher::Match| {
                graph.remove_node(m.node)?;
                Ok(())
            }),
        )
    }

    #[test]
    fn rewrite_rules_apply_to_one_node_per_call() {
        let mut graph = Graph::new();
        add(&mut graph, None);
        add(&mut graph, None);
        let rule = remove_adds();
        assert!(rule.apply(&mut graph).unwrap());
        assert_eq!(graph.node_count(), 1);
        assert!(rule.apply(&mut graph).unwrap());
        assert!(!rule.apply(&mut graph).unwrap());
    }

    #[test]
    fn fn_rules_report_changes() {
        let mut graph = Graph::new();
        let rule = FnRule::new("noop", "does nothing", |_: &mut Graph| Ok(false));
        assert!(!rule.apply(&mut graph).unwrap());
        assert_eq!(rule.meta().id, "noop");
    }

    #[test]
    fn catalogs_keep_order_and_filter_by_id() {
        let catalog = RuleCatalog::new()
            .with(FnRule::new("a", "a", |_: &mut Graph| Ok(false)))
            .with(remove_adds())
            .with(FnRule::new("b", "b", |_: &mut Graph| Ok(false)));
        assert_eq!(catalog.ids().collect::<Vec<_>>(), ["a", "remove_adds", "b"]);
        let filtered = catalog.without(&["remove_adds", "unknown"]);
        assert_eq!(filtered.ids().collect::<Vec<_>>(), ["a", "b"]);
        assert!(filtered.get("a").is_some());
        assert!(!filtered.contains("remove_adds"));
    }
}
