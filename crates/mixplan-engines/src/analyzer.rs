//! Reads a solved variable table back into a structured plan report: which
//! nodes mix, what each consumes, what each holds, and the aggregate totals
//! the objective modes compete over.

use crate::encoder::EncodedPlan;
use mixplan_core::{MixProblem, NodeId, Objective};
use mixplan_solver::Assignment;
use serde::Serialize;

/// One active mixing operation in the plan.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: NodeId,
    pub target: usize,
    pub level: usize,
    pub total_input: i64,
    /// Reagent numerators over the node's potency.
    pub ratios: Vec<i64>,
    /// Pure reagent units fed directly in.
    pub reagents: Vec<i64>,
    /// Overproduction, absent for roots.
    pub waste: Option<i64>,
    /// Human-readable mixing recipe: non-zero reagents and non-zero
    /// incoming transfers by source node.
    pub mixing: String,
}

/// The analyzed solution for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub objective: Objective,
    pub objective_value: i64,
    /// Count of active mixing nodes, roots included.
    pub total_operations: u64,
    pub total_reagent_units: i64,
    pub total_waste: i64,
    /// Units consumed per reagent index.
    pub reagent_usage: Vec<i64>,
    pub nodes: Vec<NodeReport>,
}

/// Walks the variable table once and tallies the plan. Nodes with no input
/// are idle and omitted; the rest arrive sorted by (target, level, position)
/// because the encoder's table is keyed by [NodeId].
pub fn analyze(
    problem: &MixProblem,
    plan: &EncodedPlan,
    assignment: &Assignment,
) -> PlanReport {
    let reagent_count = problem.reagent_count();
    let mut report = PlanReport {
        objective: plan.objective,
        objective_value: assignment.objective(),
        total_operations: 0,
        total_reagent_units: 0,
        total_waste: 0,
        reagent_usage: vec![0; reagent_count],
        nodes: Vec::new(),
    };

    for (node, vars) in plan.nodes() {
        let total_input = assignment.value(vars.total_input);
        if total_input == 0 {
            continue;
        }

        report.total_operations += 1;

        let reagents: Vec<i64> = vars
            .reagents
            .iter()
            .map(|&var| assignment.value(var))
            .collect();
        for (t, &units) in reagents.iter().enumerate() {
            if units > 0 {
                report.total_reagent_units += units;
                report.reagent_usage[t] += units;
            }
        }

        let waste = vars.waste.map(|var| assignment.value(var));
        if let Some(wasted) = waste {
            report.total_waste += wasted;
        }

        report.nodes.push(NodeReport {
            node,
            target: node.target,
            level: node.level,
            total_input,
            ratios: vars
                .ratios
                .iter()
                .map(|&var| assignment.value(var))
                .collect(),
            reagents,
            waste,
            mixing: mixing_description(vars, assignment),
        });
    }

    report
}

fn mixing_description(
    vars: &crate::encoder::NodeVars,
    assignment: &Assignment,
) -> String {
    let mut parts = Vec::new();

    for (t, &var) in vars.reagents.iter().enumerate() {
        let units = assignment.value(var);
        if units > 0 {
            parts.push(format!("{} x Reagent{}", units, t + 1));
        }
    }
    for &(source, var) in &vars.incoming {
        let units = assignment.value(var);
        if units > 0 {
            parts.push(format!("{} x {}", units, source));
        }
    }

    parts.join(" + ")
}
