//! The pluggable solver interface named in spec §4.6 ("SMT backend: solver
//! with `assert(expr)` / `check()` / `get_model()`; oracle wraps it") and a
//! conservative default implementation.
//!
//! The real SMT solver is an external collaborator the spec deliberately
//! keeps out of scope (§1). [`StructuralBackend`] is the toolchain's
//! built-in stand-in: sound but incomplete. It proves equalities and
//! (in)equalities it can justify by constant folding, explicit-equality
//! congruence, and structural comparison, and otherwise reports
//! "don't know" rather than guessing — which is exactly what callers are
//! contracted to tolerate (spec §7, "Solver indeterminate").

use super::{ConstraintSet, Expr};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// A concrete assignment to symbolic arrays, as returned by `get_model`.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<Arc<str>, u64>,
}

/// The narrow interface a real SMT solver would implement.
pub trait SolverBackend: Send {
    fn assert(&mut self, e: &Arc<Expr>);
    fn check(&mut self) -> SatResult;
    fn get_model(&self) -> Model;
    /// Resets all asserted constraints (a fresh solver context).
    fn reset(&mut self);
}

/// Conservative, dependency-free backend: replays asserted constraints and
/// answers `check()` only for the trivial cases it can fully justify
/// (contradictory constant constraints); everything else is `Unknown`.
#[derive(Debug, Default)]
pub struct StructuralBackend {
    asserted: Vec<Arc<Expr>>,
}

impl StructuralBackend {
    pub fn new() -> Self {
        StructuralBackend::default()
    }

    /// True iff `needle` appears verbatim (or as `not(needle)`, recorded as
    /// being asserted false) among the asserted constraints.
    pub(crate) fn explicit_truth_of(&self, needle: &Arc<Expr>) -> Option<bool> {
        for c in &self.asserted {
            if c == needle {
                return Some(true);
            }
            if let Expr::Not(inner) = c.as_ref() {
                if inner == needle {
                    return Some(false);
                }
            }
            // a == b asserted directly as a constraint is treated as an
            // equality fact usable by congruence in `Oracle::always_equal`.
        }
        None
    }

    pub(crate) fn asserted(&self) -> &[Arc<Expr>] {
        &self.asserted
    }
}

impl SolverBackend for StructuralBackend {
    fn assert(&mut self, e: &Arc<Expr>) {
        self.asserted.push(Arc::clone(e));
    }

    fn check(&mut self) -> SatResult {
        for c in &self.asserted {
            if let Some(v) = c.as_constant() {
                if v == 0 {
                    return SatResult::Unsat;
                }
            }
            if let Expr::Not(inner) = c.as_ref() {
                if let Some(v) = inner.as_constant() {
                    if v != 0 {
                        return SatResult::Unsat;
                    }
                }
            }
        }
        SatResult::Unknown
    }

    fn get_model(&self) -> Model {
        Model::default()
    }

    fn reset(&mut self) {
        self.asserted.clear();
    }
}

/// Runs `backend` with exactly the constraints in `constraints` asserted,
/// then restores it to empty. Used by [`super::Oracle`] so a single backend
/// instance can be reused query-to-query (spec §4.1: "stateless across
/// queries except for a constraint-free caching layer").
pub(crate) fn with_constraints<B: SolverBackend + ?Sized, R>(
    backend: &mut B,
    constraints: &ConstraintSet,
    f: impl FnOnce(&mut B) -> R,
) -> R {
    backend.reset();
    for c in constraints.iter() {
        backend.assert(c);
    }
    let result = f(backend);
    backend.reset();
    result
}
