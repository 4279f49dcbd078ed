//! Translation of a [MixProblem] into the backend constraint model.
//!
//! Every decision variable of the plan (ratios, pure-reagent intakes,
//! transfer volumes, activity flags, waste) is created here, once, before
//! solving. The constraint families mirror the physics: conservation of
//! volume, exact integer concentration accounting, mixer capacity, activity
//! coupling, and a left-packing symmetry break within each level.

use mixplan_core::arith::lcm_all;
use mixplan_core::problem::names;
use mixplan_core::{MixProblem, NodeId, Objective};
use mixplan_solver::{LinExpr, Literal, Model, VarId};
use std::collections::BTreeMap;

/// The model variables belonging to one mixing node.
#[derive(Debug, Clone)]
pub struct NodeVars {
    /// Reagent-t numerator over the node's potency, one per reagent.
    pub ratios: Vec<VarId>,
    /// Pure reagent fed directly in, one per reagent.
    pub reagents: Vec<VarId>,
    /// Sum of all inputs; equals the level factor when the node is active.
    pub total_input: VarId,
    pub is_active: VarId,
    /// Produced-minus-consumed volume; roots never waste.
    pub waste: Option<VarId>,
    /// Transfer variables into this node, ordered like the problem's
    /// admissible-source list.
    pub incoming: Vec<(NodeId, VarId)>,
}

/// The encoded model plus the variable tables the analyzer reads back.
#[derive(Debug)]
pub struct EncodedPlan {
    pub model: Model,
    pub objective: Objective,
    nodes: BTreeMap<NodeId, NodeVars>,
    outgoing: BTreeMap<NodeId, Vec<VarId>>,
}

impl EncodedPlan {
    pub fn node(&self, id: NodeId) -> &NodeVars {
        &self.nodes[&id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeVars)> + '_ {
        self.nodes.iter().map(|(&id, vars)| (id, vars))
    }

    /// Transfer variables leaving `source`, across both sharing kinds.
    pub fn outgoing(&self, source: NodeId) -> &[VarId] {
        self.outgoing
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Encodes `problem` into a fresh backend model minimizing `objective`.
pub fn encode(problem: &MixProblem, objective: Objective) -> EncodedPlan {
    let mut model = Model::new();
    let reagents = problem.reagent_count();

    // Variable definition. Transfer variables are owned by their sink but
    // also indexed by source for the activity and waste rows.
    let mut nodes: BTreeMap<NodeId, NodeVars> = BTreeMap::new();
    let mut outgoing: BTreeMap<NodeId, Vec<VarId>> = BTreeMap::new();

    for node in problem.nodes() {
        let p = problem.potency(node) as i64;
        let f = problem.factor(node) as i64;

        let ratios: Vec<VarId> = (0..reagents)
            .map(|t| model.new_int_var(0, p, names::ratio(node, t)))
            .collect();
        let reagent_vars: Vec<VarId> = (0..reagents)
            .map(|t| model.new_int_var(0, f - 1, names::reagent(node, t)))
            .collect();

        let max_transfer = problem.max_transfer(node) as i64;
        let incoming: Vec<(NodeId, VarId)> = problem
            .sources(node)
            .iter()
            .map(|&source| {
                let w = model.new_int_var(0, max_transfer, names::transfer(source, node));
                outgoing.entry(source).or_default().push(w);
                (source, w)
            })
            .collect();

        let total_input = model.new_int_var(0, f, names::total_input(node));
        let is_active = model.new_bool_var(names::is_active(node));
        let waste =
            (!node.is_root()).then(|| model.new_int_var(0, f, names::waste(node)));

        nodes.insert(
            node,
            NodeVars {
                ratios,
                reagents: reagent_vars,
                total_input,
                is_active,
                waste,
                incoming,
            },
        );
    }

    // Initial: root ratios are the targets themselves.
    for (m, target) in problem.targets().iter().enumerate() {
        let root = problem.tree(m).root();
        let vars = &nodes[&root];
        for (t, &ratio) in target.ratios.iter().enumerate() {
            model.add_eq(LinExpr::from(vars.ratios[t]), ratio as i64);
        }
    }

    for node in problem.nodes() {
        let vars = &nodes[&node];
        let p = problem.potency(node) as i64;
        let f = problem.factor(node) as i64;

        // Conservation: produced volume is the sum of every input.
        let inputs = LinExpr::sum(
            vars.reagents
                .iter()
                .copied()
                .chain(vars.incoming.iter().map(|&(_, w)| w)),
        );
        model.add_eq(inputs.term(-1, vars.total_input), 0);

        // Concentration: per reagent, scale every contribution to the common
        // multiple of the potencies involved so the row is exact in integers.
        // Each source contributes W · Ratio_src, a bilinear term introduced
        // as a bounded auxiliary tied by multiplication equality.
        let common = lcm_all(
            std::iter::once(problem.potency(node))
                .chain(vars.incoming.iter().map(|&(src, _)| problem.potency(src))),
        ) as i64;
        let lhs_scale = common / p;

        for t in 0..reagents {
            let mut row = LinExpr::new()
                .term(f * lhs_scale, vars.ratios[t])
                .term(-common, vars.reagents[t]);

            for &(source, w) in &vars.incoming {
                let p_src = problem.potency(source) as i64;
                let ratio_src = nodes[&source].ratios[t];
                let bound = p_src * problem.max_transfer(node) as i64;

                let product =
                    model.new_int_var(0, bound, names::product(source, node, t));
                model.add_multiplication_equality(product, w, ratio_src);
                row = row.term(-(common / p_src), product);
            }

            model.add_eq(row, 0);
        }

        // Ratio sum: the numerators of an active node cover its potency
        // exactly; an inactive node is all zeros.
        model.add_eq(
            LinExpr::sum(vars.ratios.iter().copied()).term(-p, vars.is_active),
            0,
        );

        // Leaf identity: a node at its own factor's potency can only hold
        // pure reagent.
        if p == f {
            for t in 0..reagents {
                model.add_eq(
                    LinExpr::from(vars.ratios[t]).term(-1, vars.reagents[t]),
                    0,
                );
            }
        }

        // Mixer capacity. Roots always run.
        if node.is_root() {
            model.add_eq(LinExpr::from(vars.total_input), f);
            model.add_eq(LinExpr::from(vars.is_active), 1);
        } else {
            model.add_eq(
                LinExpr::from(vars.total_input).term(-f, vars.is_active),
                0,
            );
        }
    }

    // Activity coupling and waste accounting need the outgoing lists.
    for node in problem.nodes() {
        if node.is_root() {
            continue;
        }
        let vars = &nodes[&node];
        let consumed = LinExpr::sum(outgoing.get(&node).into_iter().flatten().copied());

        model.add_ge_if(consumed.clone(), 1, Literal::pos(vars.is_active));
        model.add_eq_if(consumed.clone(), 0, Literal::neg(vars.is_active));

        let waste = vars.waste.expect("non-root node carries a waste variable");
        model.add_eq(
            consumed.negated().term(1, vars.total_input).term(-1, waste),
            0,
        );
    }

    // Symmetry breaking: within each level, runs of equal-potency siblings
    // are interchangeable (same bounds, same admissible sources and
    // consumers), so their activity flags are left-packed. Siblings of
    // different potency live in different ratio spaces and stay free, and
    // role-based pruning keys admissibility on the sibling index, which
    // breaks the interchange.
    if !problem.policy().role_based_pruning {
        for tree in problem.forest() {
            for level in 1..tree.depth() {
                let level_nodes: Vec<NodeId> = tree.nodes_at_level(level).collect();
                for pair in level_nodes.windows(2) {
                    if problem.potency(pair[0]) != problem.potency(pair[1]) {
                        continue;
                    }
                    let left = nodes[&pair[0]].is_active;
                    let right = nodes[&pair[1]].is_active;
                    model.add_ge(LinExpr::from(left).term(-1, right), 0);
                }
            }
        }
    }

    // Objective.
    let waste_sum = LinExpr::sum(
        nodes
            .values()
            .filter_map(|vars| vars.waste),
    );
    let activity_sum = LinExpr::sum(nodes.values().map(|vars| vars.is_active));
    match objective {
        Objective::Waste => model.minimize(waste_sum),
        Objective::Operations => model.minimize(activity_sum),
    }

    // Label the structural decisions first: activity flags shape the plan,
    // transfers and reagent intakes fill it in, and the remaining variables
    // follow from propagation.
    let mut order: Vec<VarId> = nodes.values().map(|vars| vars.is_active).collect();
    order.extend(
        nodes
            .values()
            .flat_map(|vars| vars.incoming.iter().map(|&(_, w)| w)),
    );
    order.extend(nodes.values().flat_map(|vars| vars.reagents.iter().copied()));
    model.set_branching_order(order);

    EncodedPlan {
        model,
        objective,
        nodes,
        outgoing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixplan_core::{SharingPolicy, Target};

    fn single_target_problem() -> MixProblem {
        let targets = vec![Target::new("t1", vec![2, 11, 5], vec![3, 3, 2]).unwrap()];
        MixProblem::new(targets, SharingPolicy::default()).unwrap()
    }

    #[test]
    fn every_node_gets_its_variable_block() {
        let problem = single_target_problem();
        let plan = encode(&problem, Objective::Waste);

        assert_eq!(plan.nodes().count(), problem.node_count());
        for (node, vars) in plan.nodes() {
            assert_eq!(vars.ratios.len(), 3);
            assert_eq!(vars.reagents.len(), 3);
            assert_eq!(vars.waste.is_none(), node.is_root());
            assert_eq!(vars.incoming.len(), problem.sources(node).len());

            let p = problem.potency(node) as i64;
            let f = problem.factor(node) as i64;
            assert_eq!(plan.model.bounds(vars.ratios[0]), (0, p));
            assert_eq!(plan.model.bounds(vars.reagents[0]), (0, f - 1));
            assert_eq!(plan.model.bounds(vars.total_input), (0, f));
        }
    }

    #[test]
    fn outgoing_lists_mirror_incoming() {
        let problem = single_target_problem();
        let plan = encode(&problem, Objective::Waste);

        let incoming_total: usize = plan.nodes().map(|(_, v)| v.incoming.len()).sum();
        let outgoing_total: usize = problem
            .nodes()
            .map(|node| plan.outgoing(node).len())
            .sum();
        assert_eq!(incoming_total, outgoing_total);
        assert_eq!(incoming_total, problem.edge_count());
    }

    #[test]
    fn sharing_volume_cap_tightens_transfer_bounds() {
        let targets = vec![Target::new("t1", vec![2, 11, 5], vec![3, 3, 2]).unwrap()];
        let problem = MixProblem::new(
            targets,
            SharingPolicy {
                max_sharing_volume: Some(0),
                ..SharingPolicy::default()
            },
        )
        .unwrap();
        let plan = encode(&problem, Objective::Waste);

        for (_, vars) in plan.nodes() {
            for &(_, w) in &vars.incoming {
                assert_eq!(plan.model.bounds(w), (0, 0));
            }
        }
    }

    #[test]
    fn objective_choice_changes_only_the_minimized_sum() {
        let problem = single_target_problem();
        let waste = encode(&problem, Objective::Waste);
        let operations = encode(&problem, Objective::Operations);

        assert_eq!(waste.model.var_count(), operations.model.var_count());
        assert_eq!(
            waste.model.constraint_count(),
            operations.model.constraint_count()
        );
    }
}
