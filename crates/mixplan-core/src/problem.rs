//! The problem model: the forest plus its potencies, the name of every
//! decision variable, and the precomputed sharing graph: for each sink
//! node, the ordered list of source nodes from which a fluid transfer is
//! algebraically exact in integer arithmetic.

use crate::config::{InterSharingMode, RunConfig};
use crate::forest::{MixTree, NodeId, build_forest};
use crate::potency::PotencyTable;
use crate::target::{Target, validate_targets};
use mixplan_error::MixResult;
use std::collections::BTreeMap;

/// The sharing-edge admissibility switches, lifted out of [RunConfig] so the
/// model can be built without dragging the whole run record along.
#[derive(Debug, Clone, Default)]
pub struct SharingPolicy {
    pub max_sharing_volume: Option<u64>,
    pub max_level_diff: Option<usize>,
    pub role_based_pruning: bool,
    pub inter_sharing_mode: InterSharingMode,
}

impl SharingPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        SharingPolicy {
            max_sharing_volume: config.max_sharing_volume,
            max_level_diff: config.max_level_diff,
            role_based_pruning: config.role_based_pruning,
            inter_sharing_mode: config.inter_sharing_mode,
        }
    }
}

/// A fully-built multi-target mixing problem, ready for encoding.
#[derive(Debug, Clone)]
pub struct MixProblem {
    targets: Vec<Target>,
    forest: Vec<MixTree>,
    potencies: Vec<PotencyTable>,
    policy: SharingPolicy,
    reagent_count: usize,
    /// sink -> ordered admissible sources.
    sources: BTreeMap<NodeId, Vec<NodeId>>,
    /// source -> ordered sinks that admit it (reverse of `sources`).
    consumers: BTreeMap<NodeId, Vec<NodeId>>,
}

impl MixProblem {
    pub fn new(targets: Vec<Target>, policy: SharingPolicy) -> MixResult<Self> {
        validate_targets(&targets)?;

        let forest = build_forest(&targets)?;
        let potencies = forest
            .iter()
            .zip(&targets)
            .map(|(tree, target)| PotencyTable::evaluate(tree, &target.factors))
            .collect();

        let mut problem = MixProblem {
            reagent_count: targets[0].reagent_count(),
            targets,
            forest,
            potencies,
            policy,
            sources: BTreeMap::new(),
            consumers: BTreeMap::new(),
        };
        problem.precompute_sources();
        Ok(problem)
    }

    fn precompute_sources(&mut self) {
        let all: Vec<NodeId> = self.nodes().collect();

        let mut sources: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut consumers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for &sink in &all {
            sources.insert(sink, Vec::new());
            consumers.insert(sink, Vec::new());
        }

        for &sink in &all {
            for &source in &all {
                if self.admissible(sink, source) {
                    sources.get_mut(&sink).unwrap().push(source);
                    consumers.get_mut(&source).unwrap().push(sink);
                }
            }
        }

        self.sources = sources;
        self.consumers = consumers;
    }

    /// Whether fluid may flow `source -> sink`.
    ///
    /// Sources must be strictly deeper than their sink, within the optional
    /// level-difference bound, and concentration-compatible: the sink's
    /// pre-dilution potency `P_dst / f_dst` must be an exact multiple of the
    /// source potency, so the transferred ratios scale to integers in the
    /// sink's ratio space.
    ///
    /// Default (child -> parent) edges are then admitted unconditionally;
    /// the tree itself must stay realizable. All other candidates pass only
    /// while role-based pruning is off; with pruning on, the source's role
    /// (`(k + m) mod 3`) and the inter-sharing topology decide.
    pub fn admissible(&self, sink: NodeId, source: NodeId) -> bool {
        if source.level <= sink.level {
            return false;
        }
        if let Some(max_diff) = self.policy.max_level_diff {
            if source.level - sink.level > max_diff {
                return false;
            }
        }

        let p_sink = self.potency(sink);
        let f_sink = self.factor(sink);
        let p_source = self.potency(source);
        if (p_sink / f_sink) % p_source != 0 {
            return false;
        }

        if self.is_default_edge(sink, source) {
            return true;
        }

        if !self.policy.role_based_pruning {
            return true;
        }

        let role = Self::role_of(source);
        if source.target == sink.target {
            match role {
                0 => source.level - sink.level == 1,
                1 => source.level - sink.level > 1,
                _ => false,
            }
        } else {
            let count = self.targets.len();
            match self.policy.inter_sharing_mode {
                InterSharingMode::Ring => sink.target == (source.target + 1) % count,
                InterSharingMode::Linear => sink.target == source.target + 1,
                InterSharingMode::All => role == 2,
            }
        }
    }

    /// Mod-3 class deciding which sharing patterns a node may feed when
    /// role-based pruning is on: 0 feeds only the level right above, 1 only
    /// levels further up, 2 exports across targets.
    pub fn role_of(node: NodeId) -> usize {
        (node.index + node.target) % 3
    }

    pub fn is_default_edge(&self, sink: NodeId, source: NodeId) -> bool {
        source.target == sink.target && self.forest[sink.target].children(sink).contains(&source)
    }

    /// All nodes of the forest, ordered by (target, level, position).
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.forest.iter().flat_map(|tree| tree.nodes())
    }

    pub fn node_count(&self) -> usize {
        self.forest.iter().map(|tree| tree.node_count()).sum()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, index: usize) -> &Target {
        &self.targets[index]
    }

    pub fn forest(&self) -> &[MixTree] {
        &self.forest
    }

    pub fn tree(&self, index: usize) -> &MixTree {
        &self.forest[index]
    }

    pub fn reagent_count(&self) -> usize {
        self.reagent_count
    }

    pub fn policy(&self) -> &SharingPolicy {
        &self.policy
    }

    pub fn potency(&self, node: NodeId) -> u64 {
        self.potencies[node.target].get(node)
    }

    pub fn potencies(&self, target: usize) -> &PotencyTable {
        &self.potencies[target]
    }

    /// The level factor `f_ℓ` of the node: its mixer capacity and the unit
    /// count of fluid it produces when active.
    pub fn factor(&self, node: NodeId) -> u64 {
        self.targets[node.target].factors[node.level]
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.forest[node.target].is_leaf(node)
    }

    /// Ordered admissible sources for `sink`.
    pub fn sources(&self, sink: NodeId) -> &[NodeId] {
        self.sources
            .get(&sink)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Ordered sinks that may consume fluid from `source`.
    pub fn consumers(&self, source: NodeId) -> &[NodeId] {
        self.consumers
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    /// Upper bound for a single transfer into `sink`: the sink's capacity,
    /// tightened by the configured sharing-volume cap.
    pub fn max_transfer(&self, sink: NodeId) -> u64 {
        let f = self.factor(sink);
        match self.policy.max_sharing_volume {
            Some(cap) => f.min(cap),
            None => f,
        }
    }
}

/// Canonical decision-variable names. The solver model, the analyzer and
/// the reports all refer to variables through these, so a plan printed from
/// a solution can be traced back to the model text line by line.
pub mod names {
    use crate::forest::NodeId;

    pub fn ratio(node: NodeId, t: usize) -> String {
        format!(
            "R_m{}_l{}_k{}_t{}",
            node.target, node.level, node.index, t
        )
    }

    pub fn reagent(node: NodeId, t: usize) -> String {
        format!(
            "r_m{}_l{}_k{}_t{}",
            node.target, node.level, node.index, t
        )
    }

    pub fn total_input(node: NodeId) -> String {
        format!(
            "TotalInput_m{}_l{}_k{}",
            node.target, node.level, node.index
        )
    }

    pub fn is_active(node: NodeId) -> String {
        format!("IsActive_m{}_l{}_k{}", node.target, node.level, node.index)
    }

    pub fn waste(node: NodeId) -> String {
        format!("waste_m{}_l{}_k{}", node.target, node.level, node.index)
    }

    pub fn transfer(source: NodeId, sink: NodeId) -> String {
        if source.target == sink.target {
            format!(
                "w_intra_m{}_from_l{}k{}_to_l{}k{}",
                sink.target, source.level, source.index, sink.level, sink.index
            )
        } else {
            format!(
                "w_inter_from_m{}l{}k{}_to_m{}l{}k{}",
                source.target, source.level, source.index, sink.target, sink.level, sink.index
            )
        }
    }

    pub fn product(source: NodeId, sink: NodeId, t: usize) -> String {
        format!(
            "Prod_m{}l{}k{}_{}_r{}",
            sink.target,
            sink.level,
            sink.index,
            transfer(source, sink),
            t
        )
    }
}
