//! Per-object initial configuration, parsed out of the BDD's init-prelude
//! (spec §3.5). Grounded on
//! `original_source/tools/synapse/targets/context.cpp`'s `Context`
//! constructor, which walks `bdd->get_init()` and dispatches on each call's
//! `function_name` (`map_allocate`, `vector_allocate`, `dchain_allocate`,
//! `sketch_allocate`, `cht_fill_cht`) to populate `map_configs` /
//! `vector_configs` / ... via `bdd::get_*_config(addr)`.
//!
//! The `bdd::*_config_t` struct definitions those getters return are not
//! present in the retrieved sources (only their call sites, e.g.
//! `util.cpp`'s `is_counter` reading `cfg.elem_size`/`cfg.capacity`); the
//! field names below are this port's own reconstruction from those call
//! sites, documented as a resolved ambiguity in `DESIGN.md` rather than a
//! literal transcription.

use super::{ChtConfig, DchainConfig, MapConfig, ObjAddr, PlacementContext, SketchConfig, VectorConfig};
use crate::bdd::CallRecord;
use crate::expr::Oracle;

/// Reads a scalar argument of `call` named `arg` as a constant, defaulting
/// to `0` when absent or symbolic (init-prelude calls are, per spec §3.3,
/// always executed with concrete configuration values).
fn arg_value(oracle: &Oracle, call: &CallRecord, arg: &str) -> u64 {
    call.args
        .get(arg)
        .and_then(|slot| oracle.value_of(&slot.expr).ok())
        .unwrap_or(0)
}

/// The object address a call's `out`-pointer argument names, per
/// `original_source`'s `kutil::expr_addr_to_obj_addr(call.args.at(arg).out)`
/// pattern: the allocator writes the freshly-created object's address back
/// through an out-parameter.
fn out_addr(oracle: &Oracle, call: &CallRecord, arg: &str) -> Option<ObjAddr> {
    let slot = call.args.get(arg)?;
    let out = slot.out.as_ref()?;
    oracle.value_of(out).ok()
}

pub fn parse_init_prelude(prelude: &[CallRecord], oracle: &Oracle, ctx: &mut PlacementContext) {
    for call in prelude {
        match &*call.name {
            "map_allocate" => {
                if let Some(addr) = out_addr(oracle, call, "map_out") {
                    ctx.insert_map_config(
                        addr,
                        MapConfig {
                            capacity: arg_value(oracle, call, "capacity"),
                            key_size: arg_value(oracle, call, "key_size"),
                            value_size: arg_value(oracle, call, "value_size"),
                        },
                    );
                }
            }
            "vector_allocate" => {
                if let Some(addr) = out_addr(oracle, call, "vector_out") {
                    ctx.insert_vector_config(
                        addr,
                        VectorConfig {
                            capacity: arg_value(oracle, call, "capacity"),
                            elem_size: arg_value(oracle, call, "elem_size"),
                        },
                    );
                }
            }
            "dchain_allocate" => {
                if let Some(addr) = out_addr(oracle, call, "chain_out") {
                    ctx.insert_dchain_config(
                        addr,
                        DchainConfig { capacity: arg_value(oracle, call, "index_range") },
                    );
                }
            }
            "sketch_allocate" => {
                if let Some(addr) = out_addr(oracle, call, "sketch_out") {
                    ctx.insert_sketch_config(
                        addr,
                        SketchConfig {
                            capacity: arg_value(oracle, call, "capacity"),
                            num_hashes: arg_value(oracle, call, "num_hashes"),
                            threshold: arg_value(oracle, call, "threshold"),
                        },
                    );
                }
            }
            "cht_fill_cht" => {
                // `cht_fill_cht` names the object via its plain `expr`, not an
                // out-pointer: the CHT is allocated by a separate call this
                // family doesn't otherwise observe.
                if let Some(slot) = call.args.get("cht") {
                    if let Ok(addr) = oracle.value_of(&slot.expr) {
                        ctx.insert_cht_config(
                            addr,
                            ChtConfig {
                                height: arg_value(oracle, call, "cht_height"),
                                backend_capacity: arg_value(oracle, call, "backend_capacity"),
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

/// spec §3.5 map configuration: capacity and element widths, as carried by
/// `map_allocate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapConfig {
    pub capacity: u64,
    pub key_size: u64,
    pub value_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorConfig {
    pub capacity: u64,
    pub elem_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DchainConfig {
    pub capacity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchConfig {
    pub capacity: u64,
    pub num_hashes: u64,
    pub threshold: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChtConfig {
    pub height: u64,
    pub backend_capacity: u64,
}
