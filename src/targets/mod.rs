//! Concrete target backends (spec "Supplemented targets"): the three
//! placement destinations a BDD node's behaviour can be realised on, each
//! contributing a [`crate::placement::TargetCtx`] resource tally and a
//! fixed-order list of [`crate::search::generator::ModuleGenerator`]s.
//! Grounded on `original_source/tools/synapse/targets/`'s per-backend
//! subdirectories (`x86/`, `tofino/`, `x86_tofino/`).

pub mod control_cpu;
pub mod host_cpu;
pub mod switch_asic;

use crate::placement::{Target, TargetCtx};
use crate::search::generator::ModuleGenerator;

/// One target's fresh resource context plus its ordered generator list,
/// ready to hand to [`crate::search::search`].
pub struct TargetDef {
    pub target: Target,
    pub generators: Vec<Box<dyn ModuleGenerator>>,
}

impl TargetDef {
    pub fn host_cpu() -> Self {
        TargetDef { target: Target::HostCpu, generators: host_cpu::generators() }
    }

    pub fn switch_asic() -> Self {
        TargetDef { target: Target::SwitchAsic, generators: switch_asic::generators() }
    }

    pub fn control_cpu() -> Self {
        TargetDef { target: Target::ControlCpu, generators: control_cpu::generators() }
    }

    /// The default three-target set (host CPU, switch ASIC, control CPU),
    /// in the order the CLI surfaces present them (spec §6.1).
    pub fn all() -> Vec<TargetDef> {
        vec![TargetDef::host_cpu(), TargetDef::switch_asic(), TargetDef::control_cpu()]
    }
}

/// A fresh, zeroed resource context for `target`, for seeding a new EP's
/// `target_ctxs` map (spec §3.5).
pub fn fresh_target_ctx(target: Target) -> Box<dyn TargetCtx> {
    match target {
        Target::HostCpu => Box::new(host_cpu::HostCpuCtx::new()),
        Target::SwitchAsic => Box::new(switch_asic::SwitchAsicCtx::new()),
        Target::ControlCpu => Box::new(control_cpu::ControlCpuCtx::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_returns_the_three_supplemented_targets() {
        let defs = TargetDef::all();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].target, Target::HostCpu);
        assert_eq!(defs[1].target, Target::SwitchAsic);
        assert_eq!(defs[2].target, Target::ControlCpu);
    }

    #[test]
    fn fresh_target_ctx_matches_requested_target() {
        assert_eq!(fresh_target_ctx(Target::HostCpu).target(), Target::HostCpu);
        assert_eq!(fresh_target_ctx(Target::SwitchAsic).target(), Target::SwitchAsic);
        assert_eq!(fresh_target_ctx(Target::ControlCpu).target(), Target::ControlCpu);
    }
}
