//! Traversal, cloning, hashing, and counting operations (spec §4.2).

use super::node::{Node, NodeId};
use super::Bdd;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Result of a [`Bdd::visit_nodes`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    VisitChildren,
    SkipChildren,
    Stop,
}

/// Scope for [`Bdd::hash`] — see SPEC_FULL §3 (hashing scope supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScope {
    Whole,
    Subtree(NodeId),
}

impl Bdd {
    /// spec §4.2 `visit_nodes`: pre-order traversal. The cookie is cloned at
    /// each Branch so the true/false subtrees see independent views.
    pub fn visit_nodes<C: Clone>(
        &self,
        start: NodeId,
        cookie: C,
        f: &mut dyn FnMut(&Bdd, NodeId, &C) -> VisitAction,
    ) {
        self.visit_inner(start, cookie, f);
    }

    fn visit_inner<C: Clone>(
        &self,
        id: NodeId,
        cookie: C,
        f: &mut dyn FnMut(&Bdd, NodeId, &C) -> VisitAction,
    ) -> bool {
        let Some(node) = self.get_node_by_id(id) else { return false };
        match f(self, id, &cookie) {
            VisitAction::Stop => return true,
            VisitAction::SkipChildren => return false,
            VisitAction::VisitChildren => {}
        }
        match node {
            Node::Branch { on_true, on_false, .. } => {
                if self.visit_inner(*on_true, cookie.clone(), f) {
                    return true;
                }
                if self.visit_inner(*on_false, cookie, f) {
                    return true;
                }
            }
            Node::Call { next, .. } | Node::Route { next, .. } => {
                if let Some(n) = next {
                    if self.visit_inner(*n, cookie, f) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// spec §4.2 `get_generated_symbols(upto)`: walk `prev` collecting
    /// symbols generated by every Call ancestor.
    pub fn get_generated_symbols(&self, upto: NodeId) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        let mut cur = Some(upto);
        while let Some(id) = cur {
            let Some(node) = self.get_node_by_id(id) else { break };
            if let Node::Call { generated_symbols, .. } = node {
                out.extend(generated_symbols.iter().cloned());
            }
            cur = node.prev();
        }
        out
    }

    /// spec §4.2 `count_children(recursive)`.
    pub fn count_children(&self, start: NodeId, recursive: bool) -> usize {
        if !recursive {
            return match self.get_node_by_id(start) {
                Some(Node::Branch { .. }) => 2,
                Some(Node::Call { next: Some(_), .. }) | Some(Node::Route { next: Some(_), .. }) => 1,
                Some(_) => 0,
                None => 0,
            };
        }
        let mut seen = BTreeSet::new();
        self.visit_nodes(start, (), &mut |_, id, _| {
            seen.insert(id);
            VisitAction::VisitChildren
        });
        seen.len().saturating_sub(1)
    }

    /// spec §4.2 `count_code_paths`: number of Route leaves reachable from
    /// `start`.
    pub fn count_code_paths(&self, start: NodeId) -> usize {
        let mut count = 0usize;
        self.visit_nodes(start, (), &mut |bdd, id, _| {
            if matches!(bdd.get_node_by_id(id), Some(Node::Route { .. })) {
                count += 1;
            }
            VisitAction::VisitChildren
        });
        count
    }

    /// spec §4.2 `hash(recursive)`: a stable fingerprint over the reachable
    /// set of node ids in visit order. `recursive == false` hashes only the
    /// node's own shape; `true` folds in every descendant (SPEC_FULL's
    /// collision-resistant upgrade also lives here via [`Bdd::hash_scoped`]).
    pub fn hash(&self, start: NodeId, recursive: bool) -> u64 {
        self.hash_scoped(if recursive { HashScope::Whole } else { HashScope::Subtree(start) }, start)
    }

    pub fn hash_scoped(&self, scope: HashScope, start: NodeId) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        match scope {
            HashScope::Subtree(_) => {
                self.hash_one(start, &mut hasher);
            }
            HashScope::Whole => {
                self.visit_nodes(start, (), &mut |bdd, id, _| {
                    bdd.hash_one(id, &mut hasher);
                    VisitAction::VisitChildren
                });
            }
        }
        hasher.finish()
    }

    fn hash_one(&self, id: NodeId, hasher: &mut impl Hasher) {
        id.hash(hasher);
        match self.get_node_by_id(id) {
            Some(Node::Branch { condition, .. }) => {
                0u8.hash(hasher);
                format!("{condition}").hash(hasher);
            }
            Some(Node::Call { call, .. }) => {
                1u8.hash(hasher);
                format!("{call}").hash(hasher);
            }
            Some(Node::Route { operation, .. }) => {
                2u8.hash(hasher);
                format!("{operation:?}").hash(hasher);
            }
            None => 3u8.hash(hasher),
        }
    }

    /// spec §4.2 `clone(recursive)`: deep copy of everything reachable from
    /// `start`. When `recursive`, ids are reassigned in a post-order sweep
    /// and the returned translation map lets callers rewrite any ids they
    /// held onto; otherwise ids (and hence external references to them,
    /// e.g. an in-flight anchor/candidate pair) are preserved verbatim.
    pub fn clone_from(&self, start: NodeId, recursive: bool) -> (Bdd, HashMap<NodeId, NodeId>) {
        let mut out = Bdd::new(self.symbols.clone());
        out.init_prelude = self.init_prelude.clone();

        if !recursive {
            let mut reachable = BTreeSet::new();
            self.visit_nodes(start, (), &mut |_, id, _| {
                reachable.insert(id);
                VisitAction::VisitChildren
            });
            for id in &reachable {
                if let Some(node) = self.get_node_by_id(*id) {
                    out.insert(node.clone());
                }
            }
            out.set_root(start);
            let identity = reachable.iter().map(|id| (*id, *id)).collect();
            return (out, identity);
        }

        // Post-order sweep: visit children before the node itself so every
        // translated id is already known when we rewrite a node's edges.
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        self.post_order(start, &mut seen, &mut order);

        let mut translate = HashMap::new();
        for id in &order {
            translate.insert(*id, out.alloc_id());
        }

        for id in &order {
            let node = self.get_node_by_id(*id).expect("reachable node must exist");
            let new_id = translate[id];
            let translated = translate_node(node, new_id, &translate);
            out.insert(translated);
        }
        out.set_root(translate[&start]);
        (out, translate)
    }

    fn post_order(&self, id: NodeId, seen: &mut BTreeSet<NodeId>, order: &mut Vec<NodeId>) {
        if !seen.insert(id) {
            return;
        }
        if let Some(node) = self.get_node_by_id(id) {
            match node {
                Node::Branch { on_true, on_false, .. } => {
                    self.post_order(*on_true, seen, order);
                    self.post_order(*on_false, seen, order);
                }
                Node::Call { next: Some(n), .. } | Node::Route { next: Some(n), .. } => {
                    self.post_order(*n, seen, order);
                }
                _ => {}
            }
        }
        order.push(id);
    }
}

fn translate_node(node: &Node, new_id: NodeId, translate: &HashMap<NodeId, NodeId>) -> Node {
    let prev = node.prev().and_then(|p| translate.get(&p).copied());
    match node {
        Node::Branch { condition, on_true, on_false, constraints, .. } => Node::Branch {
            id: new_id,
            condition: Arc::clone(condition),
            constraints: constraints.clone(),
            on_true: translate[on_true],
            on_false: translate[on_false],
            prev,
        },
        Node::Call { call, generated_symbols, next, constraints, .. } => Node::Call {
            id: new_id,
            call: call.clone(),
            constraints: constraints.clone(),
            generated_symbols: generated_symbols.clone(),
            next: next.map(|n| translate[&n]),
            prev,
        },
        Node::Route { operation, next, constraints, .. } => Node::Route {
            id: new_id,
            operation: *operation,
            constraints: constraints.clone(),
            next: next.map(|n| translate[&n]),
            prev,
        },
    }
}
