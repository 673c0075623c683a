//! Control-CPU target (`x86_tofino` in `original_source`): the glue CPU
//! that sits beside a switch ASIC, grounded on
//! `original_source/tools/synapse/execution_plan/modules/x86_tofino/{ignore,current_time,forward_through_tofino}.h`.
//! It claims bookkeeping calls with no host-visible effect
//! (`IgnoreGenerator`), the `current_time` call that seeds packet
//! timestamps for expiration (`CurrentTimeGenerator`), and the terminal
//! hand-off of a forwarding decision back onto the switch pipeline
//! (`ForwardThroughTofinoGenerator`).

use crate::bdd::{Bdd, Node, NodeId, RouteOp};
use crate::expr::Oracle;
use crate::placement::{Target, TargetCtx};
use crate::search::generator::{GeneratorOutput, ModuleGenerator};
use crate::search::{Ep, Leaf, Module, ModuleKind};
use std::sync::Arc;

/// Calls this target consumes without emitting a module of its own: purely
/// packet-buffer bookkeeping already accounted for by the Branch/Call
/// structure of the BDD itself.
const IGNORED_FUNCTIONS: &[&str] = &["packet_borrow_next_chunk", "packet_return_chunk", "packet_get_unread_length"];

#[derive(Debug, Clone, Default)]
pub struct ControlCpuCtx {
    calls_handled: u64,
    time_symbol: Option<Arc<str>>,
}

impl ControlCpuCtx {
    pub fn new() -> Self {
        ControlCpuCtx::default()
    }

    pub fn time_symbol(&self) -> Option<&str> {
        self.time_symbol.as_deref()
    }
}

impl TargetCtx for ControlCpuCtx {
    fn target(&self) -> Target {
        Target::ControlCpu
    }

    /// A lighter-weight companion core than the full data-path host CPU;
    /// its load is dominated by the number of glue calls it handles rather
    /// than per-packet instruction counts.
    fn estimate_throughput_pps(&self) -> u64 {
        const BASE_HZ: u64 = 2_000_000_000;
        const CYCLES_PER_CALL: u64 = 20;
        if self.calls_handled == 0 {
            return BASE_HZ;
        }
        BASE_HZ / (CYCLES_PER_CALL * self.calls_handled.min(1))
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

/// Drops bookkeeping calls from the execution plan: they leave no trace
/// beyond the BDD edge already walked.
pub struct IgnoreGenerator;

impl ModuleGenerator for IgnoreGenerator {
    fn target(&self) -> Target {
        Target::ControlCpu
    }

    fn name(&self) -> &str {
        "ignore"
    }

    fn generate(&self, ep: &Ep, node: NodeId, bdd: &Bdd, _oracle: &Oracle) -> Vec<GeneratorOutput> {
        let Some(Node::Call { call, next, .. }) = bdd.get_node_by_id(node) else { return Vec::new() };
        if !IGNORED_FUNCTIONS.contains(&&*call.name) {
            return Vec::new();
        }

        let mut ep = ep.clone();
        if let Some(ctx) = ep.context.target_ctx_mut(Target::ControlCpu) {
            if let Some(cpu) = ctx.as_any_mut().downcast_mut::<ControlCpuCtx>() {
                cpu.calls_handled += 1;
            }
        }

        let module = Module {
            kind: ModuleKind::Ignore,
            target: Target::ControlCpu,
            next_target: Target::ControlCpu,
            name: "Ignore".to_string(),
            bdd_node: node,
        };
        vec![GeneratorOutput { ep, module, leaves: vec![Leaf::new(None, *next)] }]
    }
}

/// Claims the `current_time` call, recording the symbol it binds so
/// expiration bookkeeping (spec §3.5) can later reference "now".
pub struct CurrentTimeGenerator;

impl ModuleGenerator for CurrentTimeGenerator {
    fn target(&self) -> Target {
        Target::ControlCpu
    }

    fn name(&self) -> &str {
        "current_time"
    }

    fn generate(&self, ep: &Ep, node: NodeId, bdd: &Bdd, _oracle: &Oracle) -> Vec<GeneratorOutput> {
        let Some(Node::Call { call, generated_symbols, next, .. }) = bdd.get_node_by_id(node) else {
            return Vec::new();
        };
        if &*call.name != "current_time" {
            return Vec::new();
        }

        let mut ep = ep.clone();
        if let Some(ctx) = ep.context.target_ctx_mut(Target::ControlCpu) {
            if let Some(cpu) = ctx.as_any_mut().downcast_mut::<ControlCpuCtx>() {
                cpu.calls_handled += 1;
                cpu.time_symbol = generated_symbols.iter().next().cloned();
            }
        }

        let module = Module {
            kind: ModuleKind::CurrentTime,
            target: Target::ControlCpu,
            next_target: Target::ControlCpu,
            name: "CurrentTime".to_string(),
            bdd_node: node,
        };
        vec![GeneratorOutput { ep, module, leaves: vec![Leaf::new(None, *next)] }]
    }
}

/// Claims a terminal forward-to-port Route and hands the packet back to
/// the switch ASIC for the actual forwarding: the cross-target seam
/// between the control CPU and the data-plane pipeline.
pub struct ForwardThroughTofinoGenerator;

impl ModuleGenerator for ForwardThroughTofinoGenerator {
    fn target(&self) -> Target {
        Target::ControlCpu
    }

    fn name(&self) -> &str {
        "forward_through_tofino"
    }

    fn generate(&self, ep: &Ep, node: NodeId, bdd: &Bdd, _oracle: &Oracle) -> Vec<GeneratorOutput> {
        let Some(Node::Route { operation, .. }) = bdd.get_node_by_id(node) else { return Vec::new() };
        if !matches!(operation, RouteOp::Fwd { .. }) {
            return Vec::new();
        }

        let module = Module {
            kind: ModuleKind::ForwardThroughTofino,
            target: Target::ControlCpu,
            next_target: Target::SwitchAsic,
            name: "ForwardThroughTofino".to_string(),
            bdd_node: node,
        };
        vec![GeneratorOutput { ep: ep.clone(), module, leaves: vec![Leaf::new(None, None)] }]
    }
}

pub fn generators() -> Vec<Box<dyn ModuleGenerator>> {
    vec![Box::new(IgnoreGenerator), Box::new(CurrentTimeGenerator), Box::new(ForwardThroughTofinoGenerator)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdd::tests_support::single_route_bdd;
    use crate::bdd::CallRecord;
    use crate::placement::PlacementContext;
    use std::collections::BTreeMap;

    fn ctx() -> PlacementContext {
        let mut m: BTreeMap<Target, Box<dyn TargetCtx>> = BTreeMap::new();
        m.insert(Target::ControlCpu, Box::new(ControlCpuCtx::new()));
        PlacementContext::new(m)
    }

    #[test]
    fn ignore_generator_drops_packet_borrow() {
        let mut bdd = single_route_bdd();
        let route_id = bdd.root().unwrap();
        let call_id = bdd.alloc_id();
        bdd.insert(Node::Call {
            id: call_id,
            call: CallRecord::new("packet_borrow_next_chunk"),
            constraints: Default::default(),
            generated_symbols: Default::default(),
            next: Some(route_id),
            prev: None,
        });
        bdd.set_root(call_id);

        let oracle = Oracle::default();
        let ep = Ep::new(0, Arc::new(bdd), ctx(), Target::ControlCpu);
        let gen = IgnoreGenerator;
        let outputs = gen.generate(&ep, call_id, ep.bdd(), &oracle);
        assert_eq!(outputs.len(), 1);
        assert!(matches!(outputs[0].module.kind, ModuleKind::Ignore));
    }

    #[test]
    fn ignore_generator_refuses_side_effecting_calls() {
        let bdd = single_route_bdd();
        let root = bdd.root().unwrap();
        let oracle = Oracle::default();
        let ep = Ep::new(0, Arc::new(bdd), ctx(), Target::ControlCpu);
        let gen = IgnoreGenerator;
        let outputs = gen.generate(&ep, root, ep.bdd(), &oracle);
        assert!(outputs.is_empty());
    }

    #[test]
    fn forward_through_tofino_hands_off_to_switch_asic() {
        let bdd = single_route_bdd();
        let root = bdd.root().unwrap();
        let oracle = Oracle::default();
        let ep = Ep::new(0, Arc::new(bdd), ctx(), Target::ControlCpu);
        let gen = ForwardThroughTofinoGenerator;
        let outputs = gen.generate(&ep, root, ep.bdd(), &oracle);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].module.next_target, Target::SwitchAsic);
    }
}
