//! Dataflow graph optimizer CLI.
//!
//! Provides the `flowopt` binary: reads a graph document, runs the
//! rewrite pipeline of `flowopt_rewrite::optimize` on it and writes the
//! optimized document.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use flowopt_core::Graph;
use flowopt_rewrite::rules::{abstract_rules, cleanup_rules, default_rules, DEAD_CODE_RULES};
use flowopt_rewrite::{optimize, OptimizeOptions, Rule, RuleCatalog, Stats};

/// Optimizes hierarchical dataflow graphs by term rewriting.
#[derive(Parser)]
#[command(name = "flowopt", about = "Optimize dataflow graphs by term rewriting")]
struct Cli {
    /// Graph document to optimize (default: stdin).
    #[arg(short = 'f', long)]
    graphfile: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Write a JSON array of the initial graph and the graph after every
    /// rule application instead of the final graph.
    #[arg(short, long)]
    include_intermediate: bool,

    /// Print statistics to stderr.
    #[arg(short, long)]
    stats: bool,

    /// Keep nodes that no sink depends on.
    #[arg(long)]
    keep_dead_code: bool,

    /// Disable a rule by id. May be repeated.
    #[arg(long = "disable", value_name = "RULE_ID")]
    disabled: Vec<String>,

    /// List the available rules and exit.
    #[arg(long)]
    list_rules: bool,
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if cli.list_rules {
        list_rules();
        return;
    }
    process::exit(run_optimize(&cli));
}

/// Rule sets of the three phases, in execution order.
fn phases() -> [(&'static str, RuleCatalog); 3] {
    [
        ("abstract", abstract_rules()),
        ("default", default_rules()),
        ("cleanup", cleanup_rules()),
    ]
}

fn list_rules() {
    for (phase, catalog) in phases() {
        for rule in catalog.iter() {
            let meta = rule.meta();
            println!("{:<10} {:<42} {}", phase, meta.id, meta.name);
        }
    }
}

/// Execute the optimization.
///
/// Returns exit code: 0 = success, 1 = optimization error,
/// 3 = I/O or parse error.
fn run_optimize(cli: &Cli) -> i32 {
    let input = match read_input(cli.graphfile.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read graph: {}", e);
            return 3;
        }
    };
    let graph = match Graph::from_json(&input) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: invalid graph document: {}", e);
            return 3;
        }
    };

    let known = phases();
    for id in &cli.disabled {
        if !known.iter().any(|(_, catalog)| catalog.contains(id)) {
            tracing::warn!(rule = %id, "cannot disable unknown rule");
        }
    }
    let [(_, abstract_set), (_, default_set), (_, cleanup_set)] = known.map(|(phase, catalog)| {
        let mut catalog = catalog.without(cli.disabled.as_slice());
        if cli.keep_dead_code {
            catalog = catalog.without(&DEAD_CODE_RULES);
        }
        (phase, catalog)
    });

    let mut intermediate = Vec::new();
    if cli.include_intermediate {
        intermediate.push(graph.to_json());
    }
    let result = {
        let mut options = OptimizeOptions {
            rules: Some(default_set),
            abstract_rules: Some(abstract_set),
            cleanup_rules: Some(cleanup_set),
            keep_dead_code: cli.keep_dead_code,
            on_rule_applied: None,
        };
        if cli.include_intermediate {
            options = options.on_rule_applied(|_, graph| intermediate.push(graph.to_json()));
        }
        optimize(graph, options)
    };
    let optimized = match result {
        Ok(optimized) => optimized,
        Err(e) => {
            eprintln!("Optimization error: {}", e);
            return 1;
        }
    };

    if cli.stats {
        print_stats(&optimized.stats);
    }

    let document = if cli.include_intermediate {
        Value::Array(intermediate)
    } else {
        optimized.graph.to_json()
    };
    match write_output(cli.out.as_deref(), &document) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("I/O error: {}", e);
            3
        }
    }
}

fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn write_output(path: Option<&Path>, document: &Value) -> io::Result<()> {
    let mut text = serde_json::to_string_pretty(document)?;
    text.push('\n');
    match path {
        Some(path) => fs::write(path, text),
        None => io::stdout().lock().write_all(text.as_bytes()),
    }
}

fn print_stats(stats: &Stats) {
    eprintln!("initial nodes: {}", stats.initial_nodes);
    eprintln!("initial edges: {}", stats.initial_edges);
    eprintln!("applied rules: {}", stats.applied_rules);
    eprintln!("final nodes:   {}", stats.final_nodes);
    eprintln!("final edges:   {}", stats.final_edges);
}
