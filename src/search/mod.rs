//! Execution-plan search (spec §4.5, component E): the tree of target-tagged
//! [`Module`]s the driver loop builds by repeatedly asking every configured
//! target's generators to place the next unclaimed BDD node. Grounded on
//! `original_source/tools/synapse/execution_plan/execution_plan.cpp` (the
//! `EP`/`EPNode` tree and leaf-frontier shape) and `targets/module.cpp`
//! (per-module target/next-target tagging).

pub mod generator;

pub use generator::{GeneratorOutput, ModuleGenerator};

use crate::bdd::{Bdd, Node, NodeId, RouteOp};
use crate::expr::{ConstraintSet, Expr, Oracle};
use crate::placement::{PlacementContext, Target};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use std::sync::Arc;

pub type EpNodeId = u64;

/// What an [`EpNode`] actually does, independent of which target it runs on
/// (spec §4.5 Module = type-tag + target-tag + ...).
#[derive(Debug, Clone)]
pub enum ModuleKind {
    Call { call_name: Arc<str> },
    Branch,
    Route(RouteOp),
    /// `x86_tofino`'s no-op passthrough for bookkeeping nodes neither host
    /// nor switch claims outright (SPEC_FULL "Supplemented targets").
    Ignore,
    CurrentTime,
    ForwardThroughTofino,
}

/// spec §4.5: "Module = (type-tag, target-tag, next-target-tag, human name,
/// bound BDD node)".
#[derive(Debug, Clone)]
pub struct Module {
    pub kind: ModuleKind,
    pub target: Target,
    pub next_target: Target,
    pub name: String,
    pub bdd_node: NodeId,
}

/// One node of the execution plan (spec §4.5 "EP node = (id, module, prev,
/// children)").
#[derive(Debug, Clone)]
pub struct EpNode {
    pub id: EpNodeId,
    pub module: Module,
    pub prev: Option<EpNodeId>,
    pub children: Vec<EpNodeId>,
}

/// A point in the plan still awaiting expansion (spec §4.5 "EP leaf =
/// (ep_node?, next_bdd_node?)"). `ep_node` is the EPNode this leaf hangs off
/// of (`None` only for a fresh EP's very first leaf, before any module has
/// been placed). `next_bdd_node` is `None` for a terminal leaf — the BDD
/// path ended and there is nothing left to place here.
///
/// `pending_constraint`, if set, is the extra path predicate this leaf's
/// direction contributes (e.g. a Branch module's condition or its negation
/// for the false arm); it is folded into `constraints_per_node` the moment
/// this leaf is turned into an EPNode by [`Ep::process_leaf`], since no
/// EPNode id exists for it before then.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub ep_node: Option<EpNodeId>,
    pub next_bdd_node: Option<NodeId>,
    pub pending_constraint: Option<Arc<Expr>>,
}

impl Leaf {
    pub fn new(ep_node: Option<EpNodeId>, next_bdd_node: Option<NodeId>) -> Self {
        Leaf { ep_node, next_bdd_node, pending_constraint: None }
    }

    pub fn with_constraint(mut self, constraint: Arc<Expr>) -> Self {
        self.pending_constraint = Some(constraint);
        self
    }
}

/// The execution plan under construction (spec §4.5, §3.6 ownership: "An EP
/// holds a shared reference to its BDD (readonly) and owns its EPNodes.
/// Cloning an EP clones EPNodes, copies the context, and shares the BDD").
#[derive(Debug, Clone)]
pub struct Ep {
    id: u64,
    nodes: BTreeMap<EpNodeId, EpNode>,
    root: Option<EpNodeId>,
    frontier: VecDeque<Leaf>,
    next_ep_node_id: EpNodeId,
    initial_target: Target,
    pub context: PlacementContext,
    bdd: Arc<Bdd>,
}

impl Ep {
    pub fn new(id: u64, bdd: Arc<Bdd>, context: PlacementContext, initial_target: Target) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back(Leaf::new(None, bdd.root()));
        Ep { id, nodes: BTreeMap::new(), root: None, frontier, next_ep_node_id: 0, initial_target, context, bdd }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reassigns this EP's id. Used by the search driver when a generator
    /// hands back a clone of an existing EP: every candidate pushed onto
    /// `open` needs its own id for the priority queue's ascending-id
    /// tie-break (spec §5) to stay meaningful.
    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn bdd_arc(&self) -> &Arc<Bdd> {
        &self.bdd
    }

    pub fn root(&self) -> Option<EpNodeId> {
        self.root
    }

    pub fn node(&self, id: EpNodeId) -> Option<&EpNode> {
        self.nodes.get(&id)
    }

    pub fn active_leaf(&self) -> Option<&Leaf> {
        self.frontier.front()
    }

    pub fn frontier(&self) -> impl Iterator<Item = &Leaf> {
        self.frontier.iter()
    }

    pub fn is_complete(&self) -> bool {
        self.frontier.is_empty()
    }

    /// spec §4.5 "Current platform": the next target declared by the active
    /// leaf's module, or the initial target if the EP has no root yet.
    pub fn current_platform(&self) -> Target {
        match self.active_leaf() {
            Some(Leaf { ep_node: Some(parent), .. }) => self.nodes[parent].module.next_target,
            _ => self.initial_target,
        }
    }

    /// spec §4.4 `get_node_constraints`: walk `prev` until a stored entry is
    /// found.
    pub fn node_constraints(&self, node: EpNodeId) -> ConstraintSet {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if let Some(cs) = self.context.get_node_constraints(id) {
                return cs.clone();
            }
            cur = self.nodes.get(&id).and_then(|n| n.prev);
        }
        ConstraintSet::new()
    }

    /// True iff the BDD node a terminal leaf ended on is a `None` (already
    /// consumed) — i.e. this leaf carries nothing left to expand. Driver-side
    /// helper for the pseudocode's "if leaf.next is None" branch.
    pub fn drop_terminal_leaf(&mut self) -> bool {
        match self.frontier.front() {
            Some(Leaf { next_bdd_node: None, .. }) => {
                self.frontier.pop_front();
                true
            }
            _ => false,
        }
    }

    fn alloc_ep_node_id(&mut self) -> EpNodeId {
        let id = self.next_ep_node_id;
        self.next_ep_node_id += 1;
        id
    }

    /// spec §4.5 `process_leaf`: appends `module` as a child of the active
    /// leaf's EPNode (or sets it as root for the very first module), folds
    /// in any `pending_constraint` the consumed leaf carried, removes that
    /// leaf, and pushes `new_leaves` — to the front if they stay on the
    /// module's own target, to the back on a cross-target handoff.
    pub fn process_leaf(&mut self, module: Module, new_leaves: Vec<Leaf>) -> EpNodeId {
        let leaf = self.frontier.pop_front().expect("process_leaf called with an empty frontier");
        let new_id = self.alloc_ep_node_id();
        let same_target = module.target == module.next_target;

        let parent_constraints = leaf.ep_node.map(|p| self.node_constraints(p)).unwrap_or_default();
        let constraints = match &leaf.pending_constraint {
            Some(extra) => parent_constraints.extended(Arc::clone(extra)),
            None => parent_constraints,
        };
        self.context.update_constraints_per_node(new_id, constraints);

        let ep_node = EpNode { id: new_id, module, prev: leaf.ep_node, children: Vec::new() };
        self.nodes.insert(new_id, ep_node);

        match leaf.ep_node {
            Some(parent) => self.nodes.get_mut(&parent).unwrap().children.push(new_id),
            None => self.root = Some(new_id),
        }

        for new_leaf in new_leaves {
            if same_target {
                self.frontier.push_front(new_leaf);
            } else {
                self.frontier.push_back(new_leaf);
            }
        }

        new_id
    }
}

/// Debug pretty-print of an EP's module tree, one indented line per node:
/// `<target> <name> (bdd_node=<id>)`. Stands in for a real [`CodeEmitter`]
/// (spec non-goals: no working P4/C backend).
pub fn pretty_print(ep: &Ep) -> String {
    let mut out = String::new();
    if let Some(root) = ep.root() {
        pretty_print_node(ep, root, 0, &mut out);
    }
    out
}

fn pretty_print_node(ep: &Ep, id: EpNodeId, depth: usize, out: &mut String) {
    let Some(node) = ep.node(id) else { return };
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("[{}] {} (bdd_node={})\n", node.module.target, node.module.name, node.module.bdd_node));
    for child in &node.children {
        pretty_print_node(ep, *child, depth + 1, out);
    }
}

/// The `speculation_pps` lookahead (spec §4.4 `update_throughput_estimates`,
/// second scalar): from every leaf still in the frontier, greedily take the
/// best-speculating generator on the leaf's own target and sum the result
/// onto `estimate_pps`. Simplification: every leaf is speculated against
/// `ep.current_platform()` rather than a per-leaf platform, since the
/// minimal EP model built here only tracks per-leaf *module-level* target
/// transitions through `process_leaf`, not a standalone per-leaf platform
/// history; documented in `DESIGN.md`.
pub fn update_throughput_estimates(ep: &mut Ep, targets: &[crate::targets::TargetDef], oracle: &Oracle) {
    ep.context.recompute_throughput_estimate();
    let mut total = ep.context.throughput_estimate_pps();
    let platform = ep.current_platform();
    let bdd = Arc::clone(ep.bdd_arc());

    if let Some(def) = targets.iter().find(|t| t.target == platform) {
        for leaf in ep.frontier() {
            let Some(node) = leaf.next_bdd_node else { continue };
            let best = def.generators.iter().filter_map(|g| g.speculate(ep, node, &bdd, oracle)).max();
            if let Some(v) = best {
                total = total.saturating_add(v);
            }
        }
    }
    ep.context.set_speculation_pps(total);
}

struct QueueEntry(Ep);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.context.speculation_pps() == other.0.context.speculation_pps() && self.0.id() == other.0.id()
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Orders by `speculation_pps` ascending (so `BinaryHeap::pop` returns
    /// the highest), ties broken by EP id ascending (spec §5: "deterministic").
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .context
            .speculation_pps()
            .cmp(&other.0.context.speculation_pps())
            .then_with(|| other.0.id().cmp(&self.0.id()))
    }
}

/// spec §5 `SearchConfig::shard_count` knob: `1` is the default, exactly
/// single-threaded per spec §5; `>1` would partition the open set across
/// `std::thread::scope` workers, each with its own [`Oracle`] (per §5 "if
/// parallelised, each thread owns its own oracle instance"). Sharding itself
/// is not implemented — this toolchain's BDDs are small enough in the test
/// corpus that it was never exercised — the knob exists so a caller that
/// does need it has a declared, spec-grounded seam to implement against.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub shard_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig { shard_count: 1 }
    }
}

/// spec §4.6 external collaborator: "given a completed EP, walk it via a
/// visitor; must not mutate." A stub contract only (spec non-goals: "no
/// P4/C code emitters beyond the named trait interface") — `synthesizer`
/// uses a built-in debug pretty-printer instead of a real implementation of
/// this trait.
pub trait CodeEmitter {
    /// Human-readable identifier for the backend this emitter targets
    /// (e.g. `"p4"`, `"dpdk"`).
    fn name(&self) -> &str;

    /// Walks `ep` read-only, writing backend-specific source to `out`.
    fn emit(&self, ep: &Ep, out: &mut dyn std::io::Write) -> std::io::Result<()>;
}

/// Result of running the driver loop to exhaustion or to a cap.
pub struct SearchOutcome {
    pub best: Ep,
    /// spec §7 "Search exhaustion: ... flagged partial if any leaf is still
    /// active".
    pub partial: bool,
}

/// spec §4.5 driver loop.
pub fn search(
    bdd: Arc<Bdd>,
    initial_context: PlacementContext,
    initial_target: Target,
    targets: &[crate::targets::TargetDef],
    oracle: &Oracle,
    max_expansions: usize,
) -> Option<SearchOutcome> {
    let mut open: BinaryHeap<QueueEntry> = BinaryHeap::new();
    let mut next_ep_id = 0u64;
    let mut seed = Ep::new(next_ep_id, Arc::clone(&bdd), initial_context, initial_target);
    next_ep_id += 1;
    update_throughput_estimates(&mut seed, targets, oracle);
    open.push(QueueEntry(seed));

    let mut best: Option<Ep> = None;
    let mut expansions = 0usize;

    while let Some(QueueEntry(mut ep)) = open.pop() {
        if expansions >= max_expansions {
            break;
        }

        if ep.drop_terminal_leaf() {
            if ep.is_complete() {
                best = Some(ep);
                continue;
            }
            update_throughput_estimates(&mut ep, targets, oracle);
            open.push(QueueEntry(ep));
            continue;
        }

        let Some(leaf) = ep.active_leaf().cloned() else {
            best = Some(ep);
            continue;
        };
        let Some(next_node) = leaf.next_bdd_node else {
            // Handled by drop_terminal_leaf above; unreachable in practice.
            continue;
        };

        let platform = ep.current_platform();
        let Some(def) = targets.iter().find(|t| t.target == platform) else {
            continue;
        };

        expansions += 1;
        let mut any_expansion = false;
        for generator in &def.generators {
            for output in generator.generate(&ep, next_node, &bdd, oracle) {
                any_expansion = true;
                let GeneratorOutput { mut ep, module, leaves } = output;
                ep.process_leaf(module, leaves);
                ep.set_id(next_ep_id);
                next_ep_id += 1;
                update_throughput_estimates(&mut ep, targets, oracle);
                open.push(QueueEntry(ep));
            }
        }

        if !any_expansion {
            // No generator on the current platform claimed this node: drop
            // this candidate rather than looping forever on it.
            continue;
        }
    }

    best.map(|ep| {
        let partial = !ep.is_complete();
        SearchOutcome { best: ep, partial }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdd::tests_support::single_route_bdd;
    use crate::bdd::Node;
    use crate::placement::PlacementContext;
    use std::collections::BTreeMap;

    fn empty_context() -> PlacementContext {
        PlacementContext::new(BTreeMap::new())
    }

    #[test]
    fn new_ep_starts_with_one_pending_leaf_at_root() {
        let bdd = Arc::new(single_route_bdd());
        let ep = Ep::new(0, Arc::clone(&bdd), empty_context(), Target::HostCpu);
        assert_eq!(ep.active_leaf().unwrap().next_bdd_node, bdd.root());
        assert!(ep.root().is_none());
    }

    #[test]
    fn process_leaf_sets_root_and_advances_frontier() {
        let bdd = Arc::new(single_route_bdd());
        let mut ep = Ep::new(0, Arc::clone(&bdd), empty_context(), Target::HostCpu);
        let module = Module {
            kind: ModuleKind::Route(RouteOp::Drop),
            target: Target::HostCpu,
            next_target: Target::HostCpu,
            name: "Drop".into(),
            bdd_node: bdd.root().unwrap(),
        };
        let id = ep.process_leaf(module, vec![Leaf::new(Some(0), None)]);
        assert_eq!(ep.root(), Some(id));
        assert!(ep.drop_terminal_leaf());
        assert!(ep.is_complete());
    }

    #[test]
    fn cross_target_leaves_go_to_the_back() {
        let bdd = Arc::new(single_route_bdd());
        let mut ep = Ep::new(0, Arc::clone(&bdd), empty_context(), Target::HostCpu);
        let module = Module {
            kind: ModuleKind::ForwardThroughTofino,
            target: Target::HostCpu,
            next_target: Target::SwitchAsic,
            name: "ForwardThroughTofino".into(),
            bdd_node: bdd.root().unwrap(),
        };
        // Pre-seed a same-target leaf so we can observe ordering.
        ep.frontier.push_back(Leaf::new(None, None));
        let cross_leaf = Leaf::new(None, None);
        let same_leaf = Leaf::new(None, Some(99));
        ep.process_leaf(module, vec![cross_leaf, same_leaf.clone()]);
        // Both pushed to back (cross-target); original pre-seeded leaf stays
        // at the front since it was never touched by this process_leaf call.
        assert_eq!(ep.frontier.len(), 3);
    }

    #[test]
    fn branch_pending_constraint_is_folded_in_on_the_next_leaf() {
        let mut bdd = single_route_bdd();
        let branch_id = bdd.alloc_id();
        let cond = Expr::constant(1, 1);
        bdd.insert(Node::Branch {
            id: branch_id,
            condition: Arc::clone(&cond),
            constraints: ConstraintSet::new(),
            on_true: bdd.root().unwrap(),
            on_false: bdd.root().unwrap(),
            prev: None,
        });
        bdd.set_root(branch_id);
        let bdd = Arc::new(bdd);

        let mut ep = Ep::new(0, Arc::clone(&bdd), empty_context(), Target::HostCpu);
        let module = Module {
            kind: ModuleKind::Branch,
            target: Target::HostCpu,
            next_target: Target::HostCpu,
            name: "Branch".into(),
            bdd_node: branch_id,
        };
        let true_leaf = Leaf::new(None, Some(99)).with_constraint(Arc::clone(&cond));
        let branch_ep_node = ep.process_leaf(module, vec![true_leaf]);

        let next = ep.active_leaf().unwrap().clone();
        // Simulate turning that leaf into its own EPNode to exercise the
        // constraint fold.
        let route_module = Module {
            kind: ModuleKind::Route(RouteOp::Drop),
            target: Target::HostCpu,
            next_target: Target::HostCpu,
            name: "Drop".into(),
            bdd_node: next.next_bdd_node.unwrap(),
        };
        ep.process_leaf(route_module, vec![]);
        let leaf_node_id = ep.node(branch_ep_node).unwrap().children[0];
        let cs = ep.node_constraints(leaf_node_id);
        assert_eq!(cs.len(), 1);
    }
}
