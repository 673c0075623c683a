//! Per-family read/write commutation rules (spec §4.3.3), grounded directly
//! on `bdd-reorderer.cpp`'s `*_can_reorder` handler table.

use crate::bdd::call::{has_side_effects, CallRecord};
use crate::bdd::Node;
use crate::expr::{ConstraintSet, Expr, Oracle};
use std::sync::Arc;

/// Outcome of checking whether a stateful `candidate` call may cross a
/// `between` node (spec §4.3.3).
pub enum RwOutcome {
    /// No conflict; reorder may proceed unconditionally.
    Commutes,
    /// Same object, same key/index: the call targets the same mutable state
    /// as `between`. Reordering past it would change semantics.
    Conflict,
    /// Same object, undetermined key/index relationship: reordering is only
    /// valid when this guard holds.
    Guarded(Arc<Expr>),
}

/// spec §4.3.3 dispatch table, by the candidate's function-name prefix.
pub fn rw_rule(
    oracle: &Oracle,
    between: &Node,
    candidate_call: &CallRecord,
    between_constraints: &ConstraintSet,
    candidate_constraints: &ConstraintSet,
) -> RwOutcome {
    if !has_side_effects(&candidate_call.name) {
        return RwOutcome::Commutes;
    }

    let Node::Call { call: between_call, .. } = between else {
        // A Branch between anchor and a side-effecting candidate always
        // aborts the reorder (spec §4.3.1 step 5, "may not cross a predicate
        // it could have produced"); callers check this before calling in.
        return RwOutcome::Conflict;
    };

    if candidate_call.name.starts_with("map_") {
        key_indexed_rule(oracle, between_call, candidate_call, "map", "key", between_constraints, candidate_constraints)
    } else if candidate_call.name.starts_with("vector_") {
        key_indexed_rule(oracle, between_call, candidate_call, "vector", "index", between_constraints, candidate_constraints)
    } else if candidate_call.name.starts_with("dchain_") {
        if same_object(oracle, between_call, candidate_call, "dchain") {
            RwOutcome::Conflict
        } else {
            RwOutcome::Commutes
        }
    } else if candidate_call.name == "cht_find_preferred_available_backend" {
        RwOutcome::Commutes
    } else if candidate_call.name.starts_with("sketch_") {
        if same_object(oracle, between_call, candidate_call, "sketch") {
            RwOutcome::Conflict
        } else {
            RwOutcome::Commutes
        }
    } else {
        RwOutcome::Commutes
    }
}

/// True iff `a` and `b` are both calls on the same family and their
/// `obj_name` argument (the data-structure object pointer) provably matches.
fn same_object(oracle: &Oracle, a: &CallRecord, b: &CallRecord, obj_name: &str) -> bool {
    let (Some(a_obj), Some(b_obj)) = (a.object_of(obj_name), b.object_of(obj_name)) else {
        return false;
    };
    oracle.always_equal(a_obj, b_obj, &ConstraintSet::new(), &ConstraintSet::new())
}

/// Shared shape of `map_*`/`vector_*`'s rule: different object commutes,
/// same object dispatches on the key/index expression's provable relation.
fn key_indexed_rule(
    oracle: &Oracle,
    between: &CallRecord,
    candidate: &CallRecord,
    obj_name: &str,
    key_arg: &str,
    between_constraints: &ConstraintSet,
    candidate_constraints: &ConstraintSet,
) -> RwOutcome {
    if !same_object(oracle, between, candidate, obj_name) {
        return RwOutcome::Commutes;
    }

    let (Some(between_slot), Some(candidate_slot)) = (between.args.get(key_arg), candidate.args.get(key_arg)) else {
        return RwOutcome::Conflict;
    };
    let between_key = between_slot.r#in.as_ref().unwrap_or(&between_slot.expr);
    let candidate_key = candidate_slot.r#in.as_ref().unwrap_or(&candidate_slot.expr);

    if oracle.always_equal(between_key, candidate_key, between_constraints, candidate_constraints) {
        return RwOutcome::Conflict;
    }
    if oracle.always_not_equal(between_key, candidate_key, between_constraints, candidate_constraints) {
        return RwOutcome::Commutes;
    }

    RwOutcome::Guarded(crate::expr::not(crate::expr::eq(Arc::clone(between_key), Arc::clone(candidate_key))))
}
