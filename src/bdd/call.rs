//! Call records, argument slots, and the side-effect / non-reorderable
//! lookup tables (spec §3.2).
//!
//! The tables below are transcribed from the original toolchain's
//! `fn_has_side_effects_lookup` / `fn_cannot_reorder_lookup`
//! (`tools/bdd-reorderer/bdd-reorderer.cpp`) — static maps keyed by
//! function-name string, per spec design note §9.

use crate::expr::Expr;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One argument slot of a call record (spec §3.2): the argument value
/// itself, plus the memory it points at before/after the call when the
/// argument is a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSlot {
    pub expr: Arc<Expr>,
    pub r#in: Option<Arc<Expr>>,
    pub out: Option<Arc<Expr>>,
    /// Where the bytes of `expr`/`in` came from, if known (e.g. "read from
    /// packet_chunks[14..18]"); informational only.
    pub byte_source: Option<String>,
}

impl ArgSlot {
    pub fn scalar(expr: Arc<Expr>) -> Self {
        ArgSlot { expr, r#in: None, out: None, byte_source: None }
    }

    pub fn pointer(expr: Arc<Expr>, r#in: Arc<Expr>, out: Option<Arc<Expr>>) -> Self {
        ArgSlot { expr, r#in: Some(r#in), out, byte_source: None }
    }
}

/// One NF library invocation (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub name: Arc<str>,
    pub args: BTreeMap<Arc<str>, ArgSlot>,
    /// Extra-variable (before, after) pairs threaded outside named args.
    pub extra_vars: BTreeMap<Arc<str>, (Arc<Expr>, Arc<Expr>)>,
    pub ret: Option<Arc<Expr>>,
    /// Function-pointer tag: the callback this call invoked, if any.
    pub fn_ptr_name: Option<Arc<str>>,
}

impl CallRecord {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        CallRecord {
            name: name.into(),
            args: BTreeMap::new(),
            extra_vars: BTreeMap::new(),
            ret: None,
            fn_ptr_name: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<Arc<str>>, slot: ArgSlot) -> Self {
        self.args.insert(name.into(), slot);
        self
    }

    /// The data-structure object this call addresses, if it has one: the
    /// `expr` (pointer value) of the argument named `object_arg_name` for
    /// this function family (e.g. "map" for `map_get`).
    pub fn object_of(&self, object_arg_name: &str) -> Option<&Arc<Expr>> {
        self.args.get(object_arg_name).map(|slot| &slot.expr)
    }
}

impl fmt::Display for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (k, v)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}:{}", v.expr)?;
        }
        write!(f, ")")
    }
}

/// Whether `fname` has observable side effects (spec §3.2 side-effect
/// table). Panics on an unknown function, matching the original's
/// `assert(found != ...)`: every call-producing function must be listed.
pub fn has_side_effects(fname: &str) -> bool {
    *SIDE_EFFECTS
        .iter()
        .find(|(n, _)| *n == fname)
        .map(|(_, v)| v)
        .unwrap_or_else(|| panic!("unknown NF library function `{fname}` has no side-effect entry"))
}

/// Whether `fname` may legally be reordered at all, independent of
/// position (spec §3.2 non-reorderable set).
pub fn is_reorderable(fname: &str) -> bool {
    !NON_REORDERABLE.contains(&fname)
}

/// The data-structure-object argument name for `fname`'s function family,
/// used by the RW rules (spec §4.3.3) and by invariant §3: "objects" are
/// compared via this argument's `expr`.
pub fn object_arg_name(fname: &str) -> Option<&'static str> {
    if fname.starts_with("map_") {
        Some("map")
    } else if fname.starts_with("vector_") {
        Some("vector")
    } else if fname.starts_with("dchain_") {
        Some("dchain")
    } else if fname.starts_with("sketch_") {
        Some("sketch")
    } else {
        None
    }
}

const SIDE_EFFECTS: &[(&str, bool)] = &[
    ("rte_ether_addr_hash", false),
    ("expire_items_single_map", true),
    ("expire_items_single_map_iteratively", true),
    ("packet_borrow_next_chunk", true),
    ("packet_get_unread_length", true),
    ("packet_return_chunk", true),
    ("vector_borrow", false),
    ("vector_return", true),
    ("map_get", false),
    ("map_put", true),
    ("map_erase", true),
    ("dchain_allocate_new_index", true),
    ("dchain_is_index_allocated", false),
    ("dchain_free_index", true),
    ("dchain_rejuvenate_index", true),
    ("cht_find_preferred_available_backend", false),
    ("load_balanced_flow_hash", false),
    ("sketch_expire", true),
    ("sketch_compute_hashes", true),
    ("sketch_refresh", true),
    ("sketch_fetch", false),
    ("sketch_touch_buckets", true),
    ("hash_obj", false),
    ("current_time", false),
    ("nf_set_rte_ipv4_udptcp_checksum", true),
];

const NON_REORDERABLE: &[&str] = &[
    "nf_set_rte_ipv4_udptcp_checksum",
    "packet_borrow_next_chunk",
    "packet_return_chunk",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_get_has_no_side_effects() {
        assert!(!has_side_effects("map_get"));
    }

    #[test]
    fn map_put_has_side_effects() {
        assert!(has_side_effects("map_put"));
    }

    #[test]
    fn packet_borrow_is_not_reorderable() {
        assert!(!is_reorderable("packet_borrow_next_chunk"));
    }

    #[test]
    fn map_get_is_reorderable() {
        assert!(is_reorderable("map_get"));
    }

    #[test]
    #[should_panic(expected = "no side-effect entry")]
    fn unknown_function_panics() {
        has_side_effects("totally_unknown_fn");
    }

    #[test]
    fn object_arg_names() {
        assert_eq!(object_arg_name("map_get"), Some("map"));
        assert_eq!(object_arg_name("vector_borrow"), Some("vector"));
        assert_eq!(object_arg_name("dchain_free_index"), Some("dchain"));
        assert_eq!(object_arg_name("sketch_fetch"), Some("sketch"));
        assert_eq!(object_arg_name("current_time"), None);
    }
}
