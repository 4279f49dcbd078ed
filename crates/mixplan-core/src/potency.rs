//! Potency (P-value) evaluation. A node's potency is the integer
//! denominator of any concentration realizable at that node: `f_ℓ` for a
//! leaf, `f_ℓ · max(child potencies)` for an internal node. The root's
//! potency always equals the target's ratio sum.

use crate::forest::{MixTree, NodeId};
use std::collections::BTreeMap;

/// Memoized potencies for one tree.
#[derive(Debug, Clone)]
pub struct PotencyTable {
    values: BTreeMap<NodeId, u64>,
}

impl PotencyTable {
    /// Evaluates every node of `tree` by memoized recursion over the child
    /// lists. `factors` is the tree's level-factor list.
    pub fn evaluate(tree: &MixTree, factors: &[u64]) -> Self {
        let mut memo = BTreeMap::new();
        for node in tree.nodes() {
            Self::potency_of(tree, factors, node, &mut memo);
        }
        PotencyTable { values: memo }
    }

    fn potency_of(
        tree: &MixTree,
        factors: &[u64],
        node: NodeId,
        memo: &mut BTreeMap<NodeId, u64>,
    ) -> u64 {
        if let Some(&p) = memo.get(&node) {
            return p;
        }

        let f = factors[node.level];
        let children = tree.children(node);
        let p = if children.is_empty() {
            f
        } else {
            let max_child = children
                .iter()
                .map(|&child| Self::potency_of(tree, factors, child, memo))
                .max()
                .unwrap_or(1);
            f * max_child
        };

        memo.insert(node, p);
        p
    }

    pub fn get(&self, node: NodeId) -> u64 {
        self.values[&node]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, u64)> + '_ {
        self.values.iter().map(|(&id, &p)| (id, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::MixTree;
    use crate::target::Target;

    fn table(ratios: Vec<u64>, factors: Vec<u64>) -> (MixTree, PotencyTable) {
        let target = Target::new("t", ratios, factors.clone()).unwrap();
        let tree = MixTree::build(0, &target).unwrap();
        let table = PotencyTable::evaluate(&tree, &factors);
        (tree, table)
    }

    #[test]
    fn root_potency_equals_ratio_sum() {
        for (ratios, factors) in [
            (vec![2u64, 11, 5], vec![3u64, 3, 2]),
            (vec![5, 6, 14], vec![5, 5]),
            (vec![10, 55, 25], vec![5, 3, 3, 2]),
            (vec![45, 26, 64], vec![5, 3, 3, 3]),
        ] {
            let sum: u64 = ratios.iter().sum();
            let (tree, table) = table(ratios, factors);
            assert_eq!(table.get(tree.root()), sum);
        }
    }

    #[test]
    fn potencies_are_positive_and_parent_dominates() {
        let (tree, table) = table(vec![45, 26, 64], vec![5, 3, 3, 3]);
        let factors = [5u64, 3, 3, 3];

        for node in tree.nodes() {
            let p = table.get(node);
            assert!(p > 0);

            if let Some(max_child) = tree.children(node).iter().map(|&c| table.get(c)).max() {
                assert_eq!(p, factors[node.level] * max_child);
                assert!(p >= max_child);
            } else {
                assert_eq!(p, factors[node.level]);
            }
        }
    }

    #[test]
    fn known_potencies_for_small_tree() {
        // [2, 11, 5] / [3, 3, 2]: the deep chain root-(1,0)-(2,0) carries
        // the full product; the chainless sibling (1,1) is a bare leaf.
        let (_, table) = table(vec![2, 11, 5], vec![3, 3, 2]);
        assert_eq!(table.get(NodeId::new(0, 0, 0)), 18);
        assert_eq!(table.get(NodeId::new(0, 1, 0)), 6);
        assert_eq!(table.get(NodeId::new(0, 1, 1)), 3);
        assert_eq!(table.get(NodeId::new(0, 2, 0)), 2);
    }
}
