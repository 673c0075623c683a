//! The BDD-assertion pass (spec §3.3 invariants).

use super::node::Node;
use super::Bdd;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    MissingRoot,
    DanglingChild { parent: u64, child: u64 },
    DuplicateId(u64),
    PrevMismatch { node: u64, claimed_prev: u64 },
    BranchChildMissing { node: u64 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::MissingRoot => write!(f, "BDD has no root"),
            InvariantViolation::DanglingChild { parent, child } => {
                write!(f, "node {parent} points at non-existent child {child}")
            }
            InvariantViolation::DuplicateId(id) => write!(f, "node id {id} inserted twice"),
            InvariantViolation::PrevMismatch { node, claimed_prev } => write!(
                f,
                "node {node} claims prev {claimed_prev}, but that node does not list it as a child"
            ),
            InvariantViolation::BranchChildMissing { node } => {
                write!(f, "branch {node} has a null child")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

impl Bdd {
    /// Runs the BDD-assertion pass (spec §3.3): every non-root node has
    /// exactly one `prev`, listed as a child on the matching side; ids are
    /// unique; every Branch's two children are non-null.
    pub fn assert_invariants(&self) -> Result<(), InvariantViolation> {
        let root = self.root.ok_or(InvariantViolation::MissingRoot)?;

        let mut seen_ids = HashSet::new();
        for id in self.node_ids() {
            if !seen_ids.insert(id) {
                return Err(InvariantViolation::DuplicateId(id));
            }
        }

        for id in self.node_ids() {
            let node = self.get_node_by_id(id).unwrap();
            if let Node::Branch { on_true, on_false, .. } = node {
                for child in [on_true, on_false] {
                    if self.get_node_by_id(*child).is_none() {
                        return Err(InvariantViolation::DanglingChild { parent: id, child: *child });
                    }
                }
            }
            if let Node::Call { next: Some(n), .. } | Node::Route { next: Some(n), .. } = node {
                if self.get_node_by_id(*n).is_none() {
                    return Err(InvariantViolation::DanglingChild { parent: id, child: *n });
                }
            }

            if id != root {
                let prev = node.prev().ok_or(InvariantViolation::PrevMismatch { node: id, claimed_prev: id })?;
                let prev_node = self
                    .get_node_by_id(prev)
                    .ok_or(InvariantViolation::PrevMismatch { node: id, claimed_prev: prev })?;
                let lists_as_child = match prev_node {
                    Node::Branch { on_true, on_false, .. } => *on_true == id || *on_false == id,
                    Node::Call { next, .. } | Node::Route { next, .. } => *next == Some(id),
                };
                if !lists_as_child {
                    return Err(InvariantViolation::PrevMismatch { node: id, claimed_prev: prev });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::single_route_bdd;

    #[test]
    fn single_route_is_valid() {
        let bdd = single_route_bdd();
        assert!(bdd.assert_invariants().is_ok());
    }
}
