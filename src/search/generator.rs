//! Module generator contract (spec §4.5): "Given `(ep, next_bdd_node)`,
//! return a list of `(new_ep, new_module, new_leaves)` triples, zero or
//! more." Grounded on
//! `original_source/tools/synapse/targets/module_generator.cpp`'s
//! `ModuleGenerator` base class (`process_node` dispatch + `speculate`).

use super::{Ep, Leaf, Module};
use crate::bdd::{Bdd, NodeId};
use crate::expr::Oracle;
use crate::placement::Target;

/// One `(new_ep, new_module, new_leaves)` triple a generator proposes for a
/// single BDD node. A generator may return several triples for the same
/// node (e.g. the reorderer surfacing more than one legal rewrite).
pub struct GeneratorOutput {
    pub ep: Ep,
    pub module: Module,
    pub leaves: Vec<Leaf>,
}

/// spec §4.5 "Module generator contract".
pub trait ModuleGenerator {
    fn target(&self) -> Target;

    /// Human-readable name, used in `Module::name` and in diagnostics.
    fn name(&self) -> &str;

    /// Proposes zero or more ways to place `node` (and, for generators that
    /// fold in a reorder, possibly nodes beyond it) on this generator's
    /// target. An empty result means "this generator has no opinion about
    /// `node`", not a failure — the driver tries the next generator.
    fn generate(&self, ep: &Ep, node: NodeId, bdd: &Bdd, oracle: &Oracle) -> Vec<GeneratorOutput>;

    /// Lookahead hook for `PlacementContext::update_throughput_estimates`'s
    /// *speculation_pps* (spec §4.4): an estimated per-packet cost delta for
    /// placing `node` here, without materialising an EP. `None` means this
    /// generator declines to speculate about `node` (same meaning as an
    /// empty `generate` result).
    fn speculate(&self, _ep: &Ep, _node: NodeId, _bdd: &Bdd, _oracle: &Oracle) -> Option<u64> {
        None
    }
}
