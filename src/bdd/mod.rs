//! The BDD graph (spec §3.3, §4.2, component B): an arena of [`Node`]s plus
//! the init-call prelude and the three distinguished symbols.

pub mod assert;
pub mod call;
pub mod io;
pub mod node;
mod ops;

pub use call::{has_side_effects, is_reorderable, object_arg_name, ArgSlot, CallRecord};
pub use node::{Node, NodeId, RouteOp};
pub use ops::{HashScope, VisitAction};

use crate::expr::Expr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The three distinguished symbols every BDD carries (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedSymbols {
    pub device: Arc<Expr>,
    pub packet_len: Arc<Expr>,
    pub time: Arc<Expr>,
}

/// A decision graph over symbolic states (spec §3.3).
///
/// The node arena is keyed by [`NodeId`] rather than indexed positionally:
/// reorder rewrites retire and mint ids out of sequence (spec §4.3.4), so a
/// `BTreeMap` gives stable ids, deterministic iteration for serialization
/// (spec §6.2), and O(log n) lookup without a separate freelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bdd {
    nodes: BTreeMap<NodeId, Node>,
    root: Option<NodeId>,
    next_id: NodeId,
    /// Linear list of allocator calls executed once at startup (spec §3.3).
    pub init_prelude: Vec<CallRecord>,
    pub symbols: DistinguishedSymbols,
}

impl Bdd {
    pub fn new(symbols: DistinguishedSymbols) -> Self {
        Bdd {
            nodes: BTreeMap::new(),
            root: None,
            next_id: 0,
            init_prelude: Vec::new(),
            symbols,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Allocates a fresh, never-before-used id.
    pub fn alloc_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, node: Node) {
        let id = node.id();
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        self.nodes.insert(id, node);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    /// spec §4.2 `get_node_by_id`.
    pub fn get_node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node_count_total(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Re-links `parent`'s child slot on `true_dir` (ignored for non-Branch
    /// parents) to `new_child`, and updates `new_child`'s `prev` to point
    /// back at `parent`. Keeps the §3.3 invariant "exactly one prev, listed
    /// as a child on the matching side" intact after a splice.
    pub fn relink(&mut self, parent: NodeId, true_dir: bool, new_child: NodeId) {
        if let Some(p) = self.get_node_mut(parent) {
            p.set_child(true_dir, Some(new_child));
        }
        if let Some(c) = self.get_node_mut(new_child) {
            c.set_prev(Some(parent));
        }
    }
}

/// Tiny fixtures shared by this module's and its siblings' `#[cfg(test)]` code.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    pub fn symbols() -> DistinguishedSymbols {
        DistinguishedSymbols {
            device: Expr::constant(0, 16),
            packet_len: Expr::constant(64, 16),
            time: Expr::constant(0, 64),
        }
    }

    pub fn single_route_bdd() -> Bdd {
        let mut bdd = Bdd::new(symbols());
        let id = bdd.alloc_id();
        bdd.insert(Node::Route {
            id,
            operation: RouteOp::Drop,
            constraints: Default::default(),
            next: None,
            prev: None,
        });
        bdd.set_root(id);
        bdd
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::*;
    use super::*;
    use crate::bdd::call::CallRecord;

    #[test]
    fn insert_and_lookup_roundtrip() {
        let bdd = single_route_bdd();
        let root = bdd.root().unwrap();
        assert!(matches!(bdd.get_node_by_id(root), Some(Node::Route { .. })));
    }

    #[test]
    fn relink_updates_both_ends() {
        let mut bdd = Bdd::new(symbols());
        let call_id = bdd.alloc_id();
        bdd.insert(Node::Call {
            id: call_id,
            call: CallRecord::new("map_get"),
            constraints: Default::default(),
            generated_symbols: Default::default(),
            next: None,
            prev: None,
        });
        let route_id = bdd.alloc_id();
        bdd.insert(Node::Route {
            id: route_id,
            operation: RouteOp::Drop,
            constraints: Default::default(),
            next: None,
            prev: None,
        });
        bdd.set_root(call_id);
        bdd.relink(call_id, true, route_id);
        assert_eq!(bdd.get_node_by_id(call_id).unwrap().child(true), Some(route_id));
        assert_eq!(bdd.get_node_by_id(route_id).unwrap().prev(), Some(call_id));
    }
}
