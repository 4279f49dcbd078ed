//! Report rendering and output-directory plumbing: the per-run plan report,
//! the pre-run structural analysis (tree connections, potencies, sharing
//! potential), a Graphviz sketch of the forest, and the batch summaries.

use crate::analyzer::PlanReport;
use crate::runners::ScenarioResult;
use mixplan_core::{MixProblem, Objective, RunConfig};
use mixplan_error::MixResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Renders the full per-run report: configuration echo, totals, histogram,
/// and one mixing line per active node.
pub fn render_plan(
    problem: &MixProblem,
    config: &RunConfig,
    report: &PlanReport,
    run_name: &str,
    elapsed: Duration,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "==================================================");
    let _ = writeln!(out, " Mixing plan: {}", run_name);
    let _ = writeln!(out, "==================================================");
    let _ = writeln!(out);
    for target in problem.targets() {
        let _ = writeln!(
            out,
            "  - {}: ratios = {:?}, factors = {:?}",
            target.name, target.ratios, target.factors
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Settings:");
    let _ = writeln!(out, "  max_mixer_size:     {}", config.max_mixer_size);
    let _ = writeln!(out, "  max_sharing_volume: {:?}", config.max_sharing_volume);
    let _ = writeln!(out, "  max_level_diff:     {:?}", config.max_level_diff);
    let _ = writeln!(out, "  role_based_pruning: {}", config.role_based_pruning);
    let _ = writeln!(out, "  inter_sharing_mode: {:?}", config.inter_sharing_mode);
    let _ = writeln!(out);
    let _ = writeln!(out, "Objective: {}", report.objective);
    let _ = writeln!(out, "Optimal value: {}", report.objective_value);
    let _ = writeln!(out, "Elapsed: {:.2}s", elapsed.as_secs_f64());
    let _ = writeln!(out);
    let _ = writeln!(out, "Total operations:    {}", report.total_operations);
    let _ = writeln!(out, "Total waste:         {}", report.total_waste);
    let _ = writeln!(out, "Total reagent units: {}", report.total_reagent_units);
    let _ = writeln!(out);
    let _ = writeln!(out, "Reagent usage:");
    for (t, units) in report.reagent_usage.iter().enumerate() {
        let _ = writeln!(out, "  Reagent{}: {}", t + 1, units);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "--- Mixing operations ---");
    let mut current_target = usize::MAX;
    for node in &report.nodes {
        if node.target != current_target {
            current_target = node.target;
            let _ = writeln!(
                out,
                "\n[Target: {}]",
                problem.target(node.target).name
            );
        }
        let waste = node
            .waste
            .map(|w| format!(", waste {}", w))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {} (level {}, input {}{}): {}",
            node.node, node.level, node.total_input, waste, node.mixing
        );
        let _ = writeln!(out, "      ratios: {:?}", node.ratios);
    }

    out
}

/// The pre-run structural analysis, generated before any solving: the tree
/// connections the builder produced, the potency of every node, and the
/// admissible sharing edges the encoder will consider.
pub fn render_pre_run(problem: &MixProblem) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "--- Section 1: Generated Tree Structures (Node Connections) ---"
    );
    for (m, tree) in problem.forest().iter().enumerate() {
        let target = problem.target(m);
        let _ = writeln!(
            out,
            "\n[Target: {}] (Factors: {:?})",
            target.name, target.factors
        );
        for node in tree.nodes() {
            let children = tree.children(node);
            let listing = if children.is_empty() {
                "Reagents Only".to_string()
            } else {
                children
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(out, "  Node {} <-- [{}]", node, listing);
        }
    }

    let _ = writeln!(out, "\n--- Section 2: Calculated P-values per Node ---");
    for (m, _) in problem.forest().iter().enumerate() {
        let target = problem.target(m);
        let _ = writeln!(
            out,
            "\n[Target: {}] (Ratios: {:?}, Factors: {:?})",
            target.name, target.ratios, target.factors
        );
        for (node, p) in problem.potencies(m).iter() {
            let _ = writeln!(out, "  Node {}: P = {}", node, p);
        }
    }

    let _ = writeln!(
        out,
        "\n--- Section 3: Potential Sharing Connections ---"
    );
    let mut any = false;
    for sink in problem.nodes() {
        let sources = problem.sources(sink);
        if sources.is_empty() {
            continue;
        }
        any = true;
        let _ = writeln!(
            out,
            "\nNode {} (P={}) can receive from:",
            sink,
            problem.potency(sink)
        );
        for &source in sources {
            let _ = writeln!(out, "  -> {} (P={})", source, problem.potency(source));
        }
    }
    if !any {
        let _ = writeln!(out, "\nNo potential sharing connections were found.");
    }

    out
}

/// A Graphviz sketch of the forest: solid edges for tree structure, one
/// cluster per target.
pub fn render_dot(problem: &MixProblem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph forest {{");
    let _ = writeln!(out, "  rankdir=BT;");
    let _ = writeln!(out, "  node [shape=box];");

    for (m, tree) in problem.forest().iter().enumerate() {
        let _ = writeln!(out, "  subgraph cluster_{} {{", m);
        let _ = writeln!(out, "    label=\"{}\";", problem.target(m).name);
        for node in tree.nodes() {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\\nP={}\"];",
                node,
                node,
                problem.potency(node)
            );
        }
        for node in tree.nodes() {
            for &child in tree.children(node) {
                let _ = writeln!(out, "    \"{}\" -> \"{}\";", child, node);
            }
        }
        let _ = writeln!(out, "  }}");
    }

    let _ = writeln!(out, "}}");
    out
}

/// Renders the batch comparison table shared by the file-load, random and
/// permutation drivers.
pub fn render_batch_summary(results: &[ScenarioResult], objective: Objective) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "==================================================");
    let _ = writeln!(out, "         Summary of All Scenario Runs             ");
    let _ = writeln!(out, "==================================================");
    let _ = writeln!(out, "\nObjective: {}", objective);
    let _ = writeln!(out, "Scenarios executed: {}\n", results.len());

    for result in results {
        let _ = writeln!(out, "--------------------------------------------------");
        let _ = writeln!(out, "Run Name: {}", result.run_name);
        let _ = writeln!(out, "  -> Execution Time: {:.2} seconds", result.elapsed_s);
        match result.objective_value {
            Some(value) => {
                let _ = writeln!(out, "  -> Minimum Found: {}", value);
                let _ = writeln!(out, "  -> Total Operations: {}", result.total_operations);
                let _ = writeln!(out, "  -> Total Waste: {}", result.total_waste);
                let _ = writeln!(
                    out,
                    "  -> Total Reagent Units: {}",
                    result.total_reagent_units
                );
            }
            None => {
                let reason = result.error.as_deref().unwrap_or("no solution");
                let _ = writeln!(out, "  -> No solution recorded ({})", reason);
            }
        }
        let _ = writeln!(out, "  -> Target Configurations:");
        for target in &result.targets {
            let _ = writeln!(
                out,
                "    - {}: ratios = {:?}, factors = {:?}",
                target.name, target.ratios, target.factors
            );
        }
        let _ = writeln!(out);
    }

    if let Some(best) = results
        .iter()
        .filter(|r| r.objective_value.is_some())
        .min_by_key(|r| r.objective_value)
    {
        let _ = writeln!(out, "--------------------------------------------------");
        let _ = writeln!(
            out,
            "Best run: {} (minimum {})",
            best.run_name,
            best.objective_value.unwrap_or_default()
        );
    }

    out
}

/// Picks a directory under `root` that does not exist yet: `base`,
/// `base_1`, `base_2`, …
pub fn unique_output_dir(root: &Path, base: &str) -> PathBuf {
    let mut candidate = root.join(base);
    let mut counter = 1;
    while candidate.is_dir() {
        candidate = root.join(format!("{}_{}", base, counter));
        counter += 1;
    }
    candidate
}

/// Writes the per-run artifacts: plan report, pre-run analysis, tree sketch
/// and the machine-readable plan.
pub fn write_run_artifacts(
    dir: &Path,
    problem: &MixProblem,
    config: &RunConfig,
    report: &PlanReport,
    run_name: &str,
    elapsed: Duration,
) -> MixResult<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join("report.txt"),
        render_plan(problem, config, report, run_name, elapsed),
    )?;
    std::fs::write(dir.join("pre_run_analysis.txt"), render_pre_run(problem))?;
    std::fs::write(dir.join("forest.dot"), render_dot(problem))?;

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| mixplan_error::mix_err!(Serde: "plan report: {}", e))?;
    std::fs::write(dir.join("plan.json"), json)?;
    Ok(())
}

/// Writes the batch artifacts: comparison summary plus a JSON dump of every
/// scenario result.
pub fn write_batch_artifacts(
    dir: &Path,
    results: &[ScenarioResult],
    objective: Objective,
) -> MixResult<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join("summary.txt"),
        render_batch_summary(results, objective),
    )?;

    let json = serde_json::to_string_pretty(results)
        .map_err(|e| mixplan_error::mix_err!(Serde: "batch results: {}", e))?;
    std::fs::write(dir.join("results.json"), json)?;
    Ok(())
}
