//! # NF Symbolic-BDD Synthesis Toolchain
//!
//! A pipeline for turning a packet-processing call-path BDD into a
//! placed, per-target execution plan:
//!
//! - [`expr`] — the expression oracle (`Expr`, `Oracle`, `ConstraintSet`).
//! - [`bdd`] — the BDD graph itself, its text format, and its invariant pass.
//! - [`reorder`] — the legality-checked reordering transform.
//! - [`placement`] — per-object, per-target placement bookkeeping.
//! - [`search`] — the execution-plan search driver and `Module` contract.
//! - [`targets`] — concrete `host_cpu` / `switch_asic` / `control_cpu`
//!   generator backends.
//! - [`error`] — the fatal-error taxonomy the three CLI binaries return.

pub mod bdd;
pub mod error;
pub mod expr;
pub mod placement;
pub mod reorder;
pub mod search;
pub mod targets;
