//! DFMM forest construction: one mixing tree per target, built bottom-up
//! from the ratio remainders at each level. The construction is fully
//! deterministic (node counts come from a ceiling division and children are
//! attached to parents round-robin), so the same target always produces the
//! same tree, which in turn fixes the legal mixing lattice.

use crate::target::Target;
use mixplan_error::{MixResult, ensure};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value-typed handle of a mixing node: target index, tree level (0 is the
/// root, deeper levels are intermediates), and position within the level.
///
/// The derived ordering (target, then level, then position) is what makes
/// every map iteration and report listing in the system deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId {
    pub target: usize,
    pub level: usize,
    pub index: usize,
}

impl NodeId {
    pub fn new(target: usize, level: usize, index: usize) -> Self {
        NodeId {
            target,
            level,
            index,
        }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v_m{}_l{}_k{}", self.target, self.level, self.index)
    }
}

/// The mixing tree of a single target: every node mapped to its ordered
/// child list. Children of a level-ℓ node all sit at level ℓ+1, and the
/// child lists partition each level exactly.
#[derive(Debug, Clone)]
pub struct MixTree {
    target: usize,
    depth: usize,
    children: BTreeMap<NodeId, Vec<NodeId>>,
}

impl MixTree {
    /// Builds the tree for `target` by the deterministic bottom-up DFMM
    /// construction, level by level starting at the deepest.
    ///
    /// At level ℓ with factor `f`, each running value contributes its
    /// remainder mod `f` as direct input at this level and carries its
    /// quotient upward; the level needs `⌈(Σ remainders + carried nodes) / f⌉`
    /// mixing nodes, and the nodes carried from below are attached to them
    /// round-robin.
    ///
    /// Fails with `TreeInfeasible` when level 0 does not collapse into a
    /// single root with nothing left to carry. Inputs are validated against
    /// `Σ ratios = Π factors` before building, so hitting this indicates a
    /// programming error rather than a bad target.
    pub fn build(target_index: usize, target: &Target) -> MixResult<Self> {
        let factors = &target.factors;
        let depth = factors.len();

        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut values: Vec<u64> = target.ratios.clone();
        let mut carried: Vec<NodeId> = Vec::new();

        for level in (0..depth).rev() {
            let f = factors[level];
            let remainder_sum: u64 = values.iter().map(|v| v % f).sum();
            let quotients: Vec<u64> = values.iter().map(|v| v / f).collect();

            let total_inputs = remainder_sum + carried.len() as u64;
            let count = if total_inputs > 0 {
                total_inputs.div_ceil(f) as usize
            } else {
                0
            };

            let ids: Vec<NodeId> = (0..count)
                .map(|k| NodeId::new(target_index, level, k))
                .collect();
            for id in &ids {
                children.insert(*id, Vec::new());
            }

            if count > 0 {
                for (i, child) in carried.iter().enumerate() {
                    let parent = ids[i % count];
                    children.get_mut(&parent).unwrap().push(*child);
                }
            }

            carried = ids;
            values = quotients;
        }

        ensure!(
            carried.len() == 1 && values.iter().all(|&v| v == 0),
            TreeInfeasible:
            "target '{}' did not collapse to a single root (level-0 nodes: {}, residues: {:?})",
            target.name,
            carried.len(),
            values
        );

        Ok(MixTree {
            target: target_index,
            depth,
            children,
        })
    }

    pub fn target_index(&self) -> usize {
        self.target
    }

    /// Mixing depth: number of levels, one per factor.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(self.target, 0, 0)
    }

    /// All nodes, ordered by (level, position).
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.children.len()
    }

    pub fn nodes_at_level(&self, level: usize) -> impl Iterator<Item = NodeId> + '_ {
        self.children
            .keys()
            .copied()
            .filter(move |id| id.level == level)
    }

    pub fn level_width(&self, level: usize) -> usize {
        self.nodes_at_level(level).count()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.children.contains_key(&id)
    }
}

/// Builds one tree per target. Target order is preserved; the tree at index
/// `m` belongs to `targets[m]`.
pub fn build_forest(targets: &[Target]) -> MixResult<Vec<MixTree>> {
    targets
        .iter()
        .enumerate()
        .map(|(m, target)| MixTree::build(m, target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(ratios: Vec<u64>, factors: Vec<u64>) -> MixTree {
        let target = Target::new("t", ratios, factors).unwrap();
        MixTree::build(0, &target).unwrap()
    }

    #[test]
    fn builds_known_tree_shape() {
        // [2, 11, 5] with factors [3, 3, 2]:
        //   level 2 (f=2): remainders [0,1,1] -> 1 node
        //   level 1 (f=3): remainders [1,2,2] + 1 carried -> 2 nodes
        //   level 0 (f=3): remainders [0,1,0] + 2 carried -> 1 root
        let tree = tree(vec![2, 11, 5], vec![3, 3, 2]);

        assert_eq!(tree.level_width(0), 1);
        assert_eq!(tree.level_width(1), 2);
        assert_eq!(tree.level_width(2), 1);
        assert_eq!(tree.node_count(), 4);

        let root = tree.root();
        assert_eq!(
            tree.children(root),
            &[NodeId::new(0, 1, 0), NodeId::new(0, 1, 1)]
        );
        // The single level-2 node lands on the first level-1 node.
        assert_eq!(tree.children(NodeId::new(0, 1, 0)), &[NodeId::new(0, 2, 0)]);
        assert!(tree.is_leaf(NodeId::new(0, 1, 1)));
        assert!(tree.is_leaf(NodeId::new(0, 2, 0)));
    }

    #[test]
    fn round_robin_distributes_children() {
        // [102, 26, 3, 3, 122] with factors [4, 4, 4, 4]: level 3 carries
        // three nodes into two level-2 parents, so the attachment must
        // alternate 0, 1, 0.
        let tree = tree(vec![102, 26, 3, 3, 122], vec![4, 4, 4, 4]);

        assert_eq!(tree.level_width(3), 3);
        assert_eq!(tree.level_width(2), 2);
        assert_eq!(
            tree.children(NodeId::new(0, 2, 0)),
            &[NodeId::new(0, 3, 0), NodeId::new(0, 3, 2)]
        );
        assert_eq!(tree.children(NodeId::new(0, 2, 1)), &[NodeId::new(0, 3, 1)]);
    }

    #[test]
    fn every_non_root_has_exactly_one_parent() {
        let tree = tree(vec![45, 26, 64], vec![5, 3, 3, 3]);

        for node in tree.nodes().filter(|n| !n.is_root()) {
            let parents = tree
                .nodes()
                .filter(|p| tree.children(*p).contains(&node))
                .count();
            assert_eq!(parents, 1, "{} should have one parent", node);
        }
        assert_eq!(
            tree.nodes()
                .filter(|p| tree.children(*p).contains(&tree.root()))
                .count(),
            0
        );
    }

    #[test]
    fn children_sit_one_level_below() {
        let tree = tree(vec![5, 6, 14], vec![5, 5]);
        for node in tree.nodes() {
            for child in tree.children(node) {
                assert_eq!(child.level, node.level + 1);
            }
        }
    }

    #[test]
    fn pure_single_reagent_target_is_infeasible() {
        // 100% of one reagent leaves no remainder anywhere, so no level-0
        // node is ever created. The builder reports it rather than emitting
        // an empty tree.
        let target = Target::new("pure", vec![5], vec![5]).unwrap();
        let err = MixTree::build(0, &target).unwrap_err();
        assert!(err.to_string().contains("pure"));
    }

    #[test]
    fn forest_preserves_target_order() {
        let targets = vec![
            Target::new("a", vec![2, 11, 5], vec![3, 3, 2]).unwrap(),
            Target::new("b", vec![5, 6, 14], vec![5, 5]).unwrap(),
        ];
        let forest = build_forest(&targets).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].target_index(), 0);
        assert_eq!(forest[1].target_index(), 1);
        assert!(forest[1].nodes().all(|n| n.target == 1));
    }
}
