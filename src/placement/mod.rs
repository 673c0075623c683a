//! Placement context (spec §3.5, component D): per-object target decisions,
//! traffic split across targets, and per-EPNode path constraints. Grounded
//! on `original_source/tools/synapse/targets/context.{h,cpp}`'s `Context`
//! class; the Rust ownership shape (copy-on-write per EP successor, spec
//! §3.6) follows the teacher's `Cover` value semantics, where `minimize()`
//! returns a new instance rather than mutating in place.

mod config;

pub use config::{ChtConfig, DchainConfig, MapConfig, SketchConfig, VectorConfig};

use crate::expr::ConstraintSet;
use std::collections::BTreeMap;
use std::fmt;

/// One of the three concrete backends a BDD node's behaviour can be realised
/// on (SPEC_FULL "Supplemented targets").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    HostCpu,
    SwitchAsic,
    ControlCpu,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::HostCpu => write!(f, "host_cpu"),
            Target::SwitchAsic => write!(f, "switch_asic"),
            Target::ControlCpu => write!(f, "control_cpu"),
        }
    }
}

/// Per-target resource tally (spec §3.5 `target_ctxs`), e.g. stages used,
/// PHV bits, SRAM bits. One concrete type per [`Target`], defined in
/// `crate::targets`; this trait is the seam `PlacementContext` stores them
/// behind, grounded on `original_source`'s `TargetContext` base class.
pub trait TargetCtx: fmt::Debug {
    fn target(&self) -> Target;
    fn estimate_throughput_pps(&self) -> u64;
    fn clone_box(&self) -> Box<dyn TargetCtx>;

    /// Lets `crate::targets`' concrete generators downcast back to their own
    /// context type to update resource tallies (stages used, instructions
    /// per packet, ...) without `PlacementContext` knowing their shape.
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

impl Clone for Box<dyn TargetCtx> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// An object's address (the constant pointer value of a call's object
/// argument, e.g. `map_get`'s `map` slot). Objects are distinguished by
/// this address, matching `original_source`'s `addr_t`.
pub type ObjAddr = u64;

/// A per-target, per-data-structure-kind implementation choice for one
/// object (spec §3.5 `placements`). Variants mirror
/// `original_source/tools/synapse/targets/context.h`'s `PlacementDecision`
/// enum, restricted to the three targets SPEC_FULL supplements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlacementDecision {
    SwitchAsicTable,
    SwitchAsicRegister,
    ControlCpuMap,
    ControlCpuVector,
    ControlCpuDchain,
    ControlCpuCht,
    ControlCpuSketch,
    HostCpuMap,
    HostCpuVector,
    HostCpuDchain,
    HostCpuCht,
    HostCpuSketch,
}

/// spec §3.5 `expiration_data`: the single flow-expiration policy a BDD may
/// declare, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationData {
    pub expiration_time_ns: u64,
    pub freed_flows_symbol: std::sync::Arc<str>,
}

/// The full per-EP placement/resource state (spec §3.5). Cloning is a deep
/// value copy: per spec §3.6 "Context is copy-on-write per EP successor",
/// every EP successor gets its own `PlacementContext`, produced by cloning
/// the parent's rather than mutating it in place.
#[derive(Debug, Clone)]
pub struct PlacementContext {
    placements: BTreeMap<ObjAddr, PlacementDecision>,
    traffic_fractions: BTreeMap<Target, f64>,
    constraints_per_node: BTreeMap<u64, ConstraintSet>,
    target_ctxs: BTreeMap<Target, Box<dyn TargetCtx>>,
    map_configs: BTreeMap<ObjAddr, MapConfig>,
    vector_configs: BTreeMap<ObjAddr, VectorConfig>,
    dchain_configs: BTreeMap<ObjAddr, DchainConfig>,
    sketch_configs: BTreeMap<ObjAddr, SketchConfig>,
    cht_configs: BTreeMap<ObjAddr, ChtConfig>,
    expiration_data: Option<ExpirationData>,
    throughput_estimate_pps: u64,
    throughput_speculation_pps: u64,
}

impl PlacementContext {
    pub fn new(target_ctxs: BTreeMap<Target, Box<dyn TargetCtx>>) -> Self {
        PlacementContext {
            placements: BTreeMap::new(),
            traffic_fractions: BTreeMap::new(),
            constraints_per_node: BTreeMap::new(),
            target_ctxs,
            map_configs: BTreeMap::new(),
            vector_configs: BTreeMap::new(),
            dchain_configs: BTreeMap::new(),
            sketch_configs: BTreeMap::new(),
            cht_configs: BTreeMap::new(),
            expiration_data: None,
            throughput_estimate_pps: 0,
            throughput_speculation_pps: 0,
        }
    }

    /// spec §4.4 `can_place`: true if `obj` is unplaced or already placed
    /// identically to `decision`.
    pub fn can_place(&self, obj: ObjAddr, decision: PlacementDecision) -> bool {
        match self.placements.get(&obj) {
            None => true,
            Some(existing) => *existing == decision,
        }
    }

    /// spec §4.4 `place`: idempotent iff the prior decision agrees; a
    /// conflicting call is a programmer bug (spec §7 "Placement
    /// conflicts... assert and abort. The search is expected to have
    /// queried `can_place` first").
    pub fn place(&mut self, obj: ObjAddr, decision: PlacementDecision) {
        assert!(self.can_place(obj, decision), "conflicting placement for object {obj:#x}: already {:?}, asked for {decision:?}", self.placements[&obj]);
        self.placements.insert(obj, decision);
    }

    pub fn placements(&self) -> &BTreeMap<ObjAddr, PlacementDecision> {
        &self.placements
    }

    /// spec §4.4 `update_constraints_per_node`.
    pub fn update_constraints_per_node(&mut self, node: u64, constraints: ConstraintSet) {
        self.constraints_per_node.insert(node, constraints);
    }

    /// spec §4.4 `get_node_constraints`: the caller (the search driver) is
    /// responsible for walking `prev` until a stored entry is found, since
    /// only the search knows the EPNode tree; this just exposes the lookup.
    pub fn get_node_constraints(&self, node: u64) -> Option<&ConstraintSet> {
        self.constraints_per_node.get(&node)
    }

    pub fn traffic_fraction(&self, target: Target) -> f64 {
        *self.traffic_fractions.get(&target).unwrap_or(&0.0)
    }

    pub fn set_traffic_fraction(&mut self, target: Target, fraction: f64) {
        self.traffic_fractions.insert(target, fraction.clamp(0.0, 1.0));
    }

    /// spec §4.4 `update_traffic_fractions`: rebalance `fraction` of traffic
    /// from `old_target` to `new_target`; each component saturates at
    /// `[0, 1]`.
    pub fn update_traffic_fractions(&mut self, old_target: Target, new_target: Target, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let old = self.traffic_fraction(old_target);
        self.set_traffic_fraction(old_target, old - fraction);
        let new = self.traffic_fraction(new_target);
        self.set_traffic_fraction(new_target, new + fraction);
    }

    pub fn target_ctx(&self, target: Target) -> Option<&dyn TargetCtx> {
        self.target_ctxs.get(&target).map(|b| b.as_ref())
    }

    pub fn target_ctx_mut(&mut self, target: Target) -> Option<&mut Box<dyn TargetCtx>> {
        self.target_ctxs.get_mut(&target)
    }

    /// spec §4.4 `update_throughput_estimates`, first scalar:
    /// `estimate_pps = Σ_target target_ctx.estimate_throughput_pps() × traffic_fraction`.
    pub fn recompute_throughput_estimate(&mut self) {
        self.throughput_estimate_pps = self
            .target_ctxs
            .iter()
            .map(|(target, ctx)| {
                let pps = ctx.estimate_throughput_pps() as f64 * self.traffic_fraction(*target);
                pps as u64
            })
            .sum();
    }

    pub fn throughput_estimate_pps(&self) -> u64 {
        self.throughput_estimate_pps
    }

    /// The second scalar of `update_throughput_estimates`, *speculation_pps*,
    /// is a lookahead over every active leaf and is computed by the search
    /// driver (it needs the EP's leaves and the target generators' `speculate`
    /// hook, neither of which `PlacementContext` owns); this setter just
    /// records the result the driver produced.
    pub fn set_speculation_pps(&mut self, pps: u64) {
        self.throughput_speculation_pps = pps;
    }

    pub fn speculation_pps(&self) -> u64 {
        self.throughput_speculation_pps
    }

    pub fn map_config(&self, obj: ObjAddr) -> Option<&MapConfig> {
        self.map_configs.get(&obj)
    }

    pub fn vector_config(&self, obj: ObjAddr) -> Option<&VectorConfig> {
        self.vector_configs.get(&obj)
    }

    pub fn dchain_config(&self, obj: ObjAddr) -> Option<&DchainConfig> {
        self.dchain_configs.get(&obj)
    }

    pub fn sketch_config(&self, obj: ObjAddr) -> Option<&SketchConfig> {
        self.sketch_configs.get(&obj)
    }

    pub fn cht_config(&self, obj: ObjAddr) -> Option<&ChtConfig> {
        self.cht_configs.get(&obj)
    }

    pub fn expiration_data(&self) -> Option<&ExpirationData> {
        self.expiration_data.as_ref()
    }

    pub fn set_expiration_data(&mut self, data: ExpirationData) {
        self.expiration_data = Some(data);
    }

    /// Parses the per-object capacity/element-size configs out of the BDD's
    /// init-prelude (spec §3.5 "Initial per-object configurations parsed
    /// from the BDD's init-prelude"). See `config::parse_init_prelude`.
    pub fn load_configs_from_prelude(&mut self, prelude: &[crate::bdd::CallRecord], oracle: &crate::expr::Oracle) {
        config::parse_init_prelude(prelude, oracle, self);
    }

    pub(crate) fn insert_map_config(&mut self, obj: ObjAddr, cfg: MapConfig) {
        self.map_configs.insert(obj, cfg);
    }

    pub(crate) fn insert_vector_config(&mut self, obj: ObjAddr, cfg: VectorConfig) {
        self.vector_configs.insert(obj, cfg);
    }

    pub(crate) fn insert_dchain_config(&mut self, obj: ObjAddr, cfg: DchainConfig) {
        self.dchain_configs.insert(obj, cfg);
    }

    pub(crate) fn insert_sketch_config(&mut self, obj: ObjAddr, cfg: SketchConfig) {
        self.sketch_configs.insert(obj, cfg);
    }

    pub(crate) fn insert_cht_config(&mut self, obj: ObjAddr, cfg: ChtConfig) {
        self.cht_configs.insert(obj, cfg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct FakeCtx {
        target: Target,
        pps: u64,
    }
    impl TargetCtx for FakeCtx {
        fn target(&self) -> Target {
            self.target
        }
        fn estimate_throughput_pps(&self) -> u64 {
            self.pps
        }
        fn clone_box(&self) -> Box<dyn TargetCtx> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn ctx_map() -> BTreeMap<Target, Box<dyn TargetCtx>> {
        let mut m: BTreeMap<Target, Box<dyn TargetCtx>> = BTreeMap::new();
        m.insert(Target::HostCpu, Box::new(FakeCtx { target: Target::HostCpu, pps: 1000 }));
        m.insert(Target::SwitchAsic, Box::new(FakeCtx { target: Target::SwitchAsic, pps: 100_000 }));
        m
    }

    #[test]
    fn can_place_unplaced_object() {
        let ctx = PlacementContext::new(ctx_map());
        assert!(ctx.can_place(0x1000, PlacementDecision::HostCpuMap));
    }

    #[test]
    fn place_is_idempotent_for_identical_decision() {
        let mut ctx = PlacementContext::new(ctx_map());
        ctx.place(0x1000, PlacementDecision::HostCpuMap);
        ctx.place(0x1000, PlacementDecision::HostCpuMap);
        assert_eq!(ctx.placements().get(&0x1000), Some(&PlacementDecision::HostCpuMap));
    }

    #[test]
    #[should_panic(expected = "conflicting placement")]
    fn place_panics_on_conflicting_decision() {
        let mut ctx = PlacementContext::new(ctx_map());
        ctx.place(0x1000, PlacementDecision::HostCpuMap);
        ctx.place(0x1000, PlacementDecision::SwitchAsicTable);
    }

    #[test]
    fn update_traffic_fractions_rebalances_and_saturates() {
        let mut ctx = PlacementContext::new(ctx_map());
        ctx.set_traffic_fraction(Target::HostCpu, 1.0);
        ctx.update_traffic_fractions(Target::HostCpu, Target::SwitchAsic, 0.4);
        assert!((ctx.traffic_fraction(Target::HostCpu) - 0.6).abs() < 1e-9);
        assert!((ctx.traffic_fraction(Target::SwitchAsic) - 0.4).abs() < 1e-9);

        // Saturates at 0 rather than going negative.
        ctx.update_traffic_fractions(Target::HostCpu, Target::SwitchAsic, 10.0);
        assert_eq!(ctx.traffic_fraction(Target::HostCpu), 0.0);
    }

    #[test]
    fn recompute_throughput_estimate_weights_by_traffic_fraction() {
        let mut ctx = PlacementContext::new(ctx_map());
        ctx.set_traffic_fraction(Target::HostCpu, 0.25);
        ctx.set_traffic_fraction(Target::SwitchAsic, 0.75);
        ctx.recompute_throughput_estimate();
        assert_eq!(ctx.throughput_estimate_pps(), 250 + 75_000);
    }
}
