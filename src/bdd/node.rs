//! BDD node kinds (spec §3.3). Polymorphism over node kind is a sum type
//! per spec design note §9 ("Inheritance hierarchy... maps to sum types").

use crate::bdd::call::CallRecord;
use crate::expr::{ConstraintSet, Expr};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Index into a [`crate::bdd::Bdd`]'s node arena. Edges are ids, not
/// references (spec design note §9: "arena indexed by id; edges are ids").
pub type NodeId = u64;

/// A terminal forwarding decision (spec §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOp {
    Fwd { dst_port: u32 },
    Drop,
    Bcast,
}

/// One node of the BDD (spec §3.3). `prev` is a non-owning back-link,
/// populated by [`crate::bdd::Bdd::assert_invariants`] and kept in sync by
/// every mutating operation; it is the "computed back-link or stored id"
/// alternative to owning-pointer `prev` fields named in spec design note §9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch {
        id: NodeId,
        condition: Arc<Expr>,
        constraints: ConstraintSet,
        on_true: NodeId,
        on_false: NodeId,
        prev: Option<NodeId>,
    },
    Call {
        id: NodeId,
        call: CallRecord,
        constraints: ConstraintSet,
        /// Symbols first defined by this call (e.g. a `map_get`'s
        /// `out_of_space`-style boolean or lookup-result symbol).
        generated_symbols: BTreeSet<Arc<str>>,
        next: Option<NodeId>,
        prev: Option<NodeId>,
    },
    Route {
        id: NodeId,
        operation: RouteOp,
        constraints: ConstraintSet,
        next: Option<NodeId>,
        prev: Option<NodeId>,
    },
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Branch { id, .. } | Node::Call { id, .. } | Node::Route { id, .. } => *id,
        }
    }

    pub fn prev(&self) -> Option<NodeId> {
        match self {
            Node::Branch { prev, .. } | Node::Call { prev, .. } | Node::Route { prev, .. } => *prev,
        }
    }

    pub fn set_prev(&mut self, p: Option<NodeId>) {
        match self {
            Node::Branch { prev, .. } | Node::Call { prev, .. } | Node::Route { prev, .. } => *prev = p,
        }
    }

    pub fn constraints(&self) -> &ConstraintSet {
        match self {
            Node::Branch { constraints, .. } | Node::Call { constraints, .. } | Node::Route { constraints, .. } => {
                constraints
            }
        }
    }

    pub fn constraints_mut(&mut self) -> &mut ConstraintSet {
        match self {
            Node::Branch { constraints, .. } | Node::Call { constraints, .. } | Node::Route { constraints, .. } => {
                constraints
            }
        }
    }

    /// Children on the given direction, for a node-kind-agnostic walk.
    /// Non-branch nodes ignore `true_dir` and return their single `next`.
    pub fn child(&self, true_dir: bool) -> Option<NodeId> {
        match self {
            Node::Branch { on_true, on_false, .. } => Some(if true_dir { *on_true } else { *on_false }),
            Node::Call { next, .. } | Node::Route { next, .. } => *next,
        }
    }

    pub fn set_child(&mut self, true_dir: bool, target: Option<NodeId>) {
        match self {
            Node::Branch { on_true, on_false, .. } => {
                let slot = if true_dir { on_true } else { on_false };
                *slot = target.expect("Branch children must be non-null (spec §3.3 invariant)");
            }
            Node::Call { next, .. } | Node::Route { next, .. } => *next = target,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Node::Call { .. })
    }

    pub fn is_route(&self) -> bool {
        matches!(self, Node::Route { .. })
    }
}
