//! Term rewriting for hierarchical dataflow graphs.
//!
//! A rule pairs a [`matcher`] with a [`rewriter`]; the [`driver`] applies
//! rule catalogs to a fixpoint and [`optimize`] chains the three standard
//! phases.

pub mod api;
pub mod driver;
pub mod edit;
pub mod error;
pub mod eval;
pub mod matcher;
pub mod nodes;
pub mod recursion;
pub mod rewriter;
pub mod rule;
pub mod rules;
pub mod walk;

pub use api::{optimize, OptimizeOptions, Optimized};
pub use driver::{apply_abstract_rules, apply_rule, apply_rule_once, apply_rules, ApplyOptions, Stats};
pub use error::RewriteError;
pub use rule::{FnRule, RewriteRule, Rule, RuleCatalog, RuleMeta};
