//! The expression oracle (spec §4.1, component A): the only part of the
//! toolchain allowed to consult the solver backend.

use super::backend::{with_constraints, SatResult, SolverBackend, StructuralBackend};
use super::{ConstraintSet, Expr, PacketChunkRead};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Raised by `value_of` when the expression is not a compile-time constant.
    NotConstant,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::NotConstant => write!(f, "expression is not constant"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Wraps a [`SolverBackend`] with the always-equal/always-true query surface
/// and an append-only, constraint-free result cache (spec §5: "The
/// expression-oracle's solver cache is append-only and safe for
/// single-threaded use").
pub struct Oracle {
    backend: Mutex<Box<dyn SolverBackend>>,
    /// Cache for queries that do not depend on any constraint set (pure
    /// structural facts about a single expression).
    const_cache: Mutex<HashMap<Arc<Expr>, Option<u64>>>,
}

impl Default for Oracle {
    fn default() -> Self {
        Oracle::new(Box::new(StructuralBackend::new()))
    }
}

impl Oracle {
    pub fn new(backend: Box<dyn SolverBackend>) -> Self {
        Oracle {
            backend: Mutex::new(backend),
            const_cache: Mutex::new(HashMap::new()),
        }
    }

    /// spec §4.1 `value_of`.
    pub fn value_of(&self, expr: &Arc<Expr>) -> Result<u64, OracleError> {
        if let Some(cached) = self.const_cache.lock().unwrap().get(expr) {
            return cached.ok_or(OracleError::NotConstant);
        }
        let value = expr.as_constant();
        self.const_cache.lock().unwrap().insert(Arc::clone(expr), value);
        value.ok_or(OracleError::NotConstant)
    }

    /// spec §4.1 `symbols_of`: symbol base names plus the packet-chunk reads
    /// among them, with their concrete byte offsets.
    pub fn symbols_of(&self, expr: &Arc<Expr>) -> (HashSet<Arc<str>>, Vec<PacketChunkRead>) {
        let mut names = HashSet::new();
        let mut chunks = Vec::new();
        self.collect_symbols(expr, &mut names, &mut chunks);
        (names, chunks)
    }

    fn collect_symbols(
        &self,
        expr: &Arc<Expr>,
        names: &mut HashSet<Arc<str>>,
        chunks: &mut Vec<PacketChunkRead>,
    ) {
        if let Expr::Read { array, index } = expr.as_ref() {
            names.insert(Arc::clone(&array.name));
            if &*array.name == "packet_chunks" {
                if let Ok(offset) = self.value_of(index) {
                    chunks.push(PacketChunkRead { byte_offset: offset });
                }
            }
            self.collect_symbols(index, names, chunks);
            return;
        }
        for child in children_of(expr) {
            self.collect_symbols(child, names, chunks);
        }
    }

    /// spec §4.1 `always_equal`: true iff provably equal under the union of
    /// `c1`/`c2`, with `e2`'s symbols optionally rewritten onto `e1`'s first.
    pub fn always_equal(&self, e1: &Arc<Expr>, e2: &Arc<Expr>, c1: &ConstraintSet, c2: &ConstraintSet) -> bool {
        if e1 == e2 {
            return true;
        }
        if let (Some(a), Some(b)) = (e1.as_constant(), e2.as_constant()) {
            return a == b;
        }
        let merged = c1.merge(c2);
        let claim = super::builder::not(super::builder::eq(Arc::clone(e1), Arc::clone(e2)));
        self.proves(&merged, &claim) == SatResult::Unsat
    }

    /// spec §4.1 `always_not_equal`.
    pub fn always_not_equal(&self, e1: &Arc<Expr>, e2: &Arc<Expr>, c1: &ConstraintSet, c2: &ConstraintSet) -> bool {
        if let (Some(a), Some(b)) = (e1.as_constant(), e2.as_constant()) {
            return a != b;
        }
        let merged = c1.merge(c2);
        let claim = super::builder::eq(Arc::clone(e1), Arc::clone(e2));
        self.proves(&merged, &claim) == SatResult::Unsat
    }

    /// spec §4.1 `always_true`.
    pub fn always_true(&self, c: &ConstraintSet, e: &Arc<Expr>) -> bool {
        if let Some(v) = e.as_constant() {
            return v != 0;
        }
        let negated = super::builder::not(Arc::clone(e));
        self.proves(c, &negated) == SatResult::Unsat
    }

    /// spec §4.1 `always_false`.
    pub fn always_false(&self, c: &ConstraintSet, e: &Arc<Expr>) -> bool {
        if let Some(v) = e.as_constant() {
            return v == 0;
        }
        self.proves(c, e) == SatResult::Unsat
    }

    /// Checks satisfiability of `constraints ∧ extra` via the backend.
    /// Monotonic by construction: callers only ever grow `constraints`.
    fn proves(&self, constraints: &ConstraintSet, extra: &Arc<Expr>) -> SatResult {
        let extended = constraints.extended(Arc::clone(extra));
        let mut backend = self.backend.lock().unwrap();
        with_constraints(&mut **backend, &extended, |b| b.check())
    }

    /// spec §4.1 `fresh_array`: a distinct symbolic array named
    /// `base_name` suffixed with the lowest unused `_r<N>`.
    pub fn fresh_array(
        &self,
        base_name: &str,
        size: usize,
        value_width: u32,
        index_width: u32,
        existing_names: &HashSet<Arc<str>>,
    ) -> super::SymbolicArray {
        let mut n = 0usize;
        loop {
            let candidate: Arc<str> = Arc::from(format!("{base_name}_r{n}"));
            if !existing_names.contains(&candidate) {
                return super::SymbolicArray {
                    name: candidate,
                    size,
                    index_width,
                    value_width,
                    constant_backing: None,
                };
            }
            n += 1;
        }
    }
}

fn children_of(expr: &Arc<Expr>) -> Vec<&Arc<Expr>> {
    match expr.as_ref() {
        Expr::Const { .. } | Expr::Read { .. } => Vec::new(),
        Expr::Extract { base, .. } | Expr::Not(base) => vec![base],
        Expr::Concat { hi, lo }
        | Expr::Add(hi, lo)
        | Expr::Sub(hi, lo)
        | Expr::Mul(hi, lo)
        | Expr::Eq(hi, lo)
        | Expr::Ult(hi, lo)
        | Expr::Slt(hi, lo)
        | Expr::And(hi, lo)
        | Expr::Or(hi, lo)
        | Expr::Xor(hi, lo) => vec![hi, lo],
        Expr::Ite { cond, t, f } => vec![cond, t, f],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn value_of_constant() {
        let oracle = Oracle::default();
        let e = Expr::constant(42, 32);
        assert_eq!(oracle.value_of(&e), Ok(42));
    }

    #[test]
    fn value_of_non_constant_fails() {
        let oracle = Oracle::default();
        let arr = Arc::new(super::super::SymbolicArray::new("pkt_len", 1, 0, 32));
        let e = Expr::read(arr, Expr::constant(0, 0));
        assert_eq!(oracle.value_of(&e), Err(OracleError::NotConstant));
    }

    #[test]
    fn always_equal_identical_constants() {
        let oracle = Oracle::default();
        let a = Expr::constant(5, 8);
        let b = Expr::constant(5, 8);
        assert!(oracle.always_equal(&a, &b, &ConstraintSet::new(), &ConstraintSet::new()));
    }

    #[test]
    fn always_not_equal_different_constants() {
        let oracle = Oracle::default();
        let a = Expr::constant(5, 8);
        let b = Expr::constant(6, 8);
        assert!(oracle.always_not_equal(&a, &b, &ConstraintSet::new(), &ConstraintSet::new()));
    }

    #[test]
    fn unknown_symbolic_equality_is_not_proved_either_way() {
        let oracle = Oracle::default();
        let arr = Arc::new(super::super::SymbolicArray::new("key", 1, 0, 32));
        let a = Expr::read(Arc::clone(&arr), Expr::constant(0, 0));
        let b = Expr::read(arr, Expr::constant(1, 0));
        let cs = ConstraintSet::new();
        assert!(!oracle.always_equal(&a, &b, &cs, &cs));
        assert!(!oracle.always_not_equal(&a, &b, &cs, &cs));
    }

    #[test]
    fn fresh_array_finds_lowest_unused_suffix() {
        let oracle = Oracle::default();
        let mut existing = HashSet::new();
        existing.insert(Arc::from("map_has_this_key_r0"));
        let fresh = oracle.fresh_array("map_has_this_key", 1, 1, 0, &existing);
        assert_eq!(&*fresh.name, "map_has_this_key_r1");
    }

    #[test]
    fn symbols_of_finds_packet_chunk_offsets() {
        let oracle = Oracle::default();
        let arr = Arc::new(super::super::SymbolicArray::new("packet_chunks", 1500, 16, 8));
        let e = Expr::read(arr, Expr::constant(14, 16));
        let (names, chunks) = oracle.symbols_of(&e);
        assert!(names.contains(&Arc::<str>::from("packet_chunks")));
        assert_eq!(chunks, vec![PacketChunkRead { byte_offset: 14 }]);
    }
}
