//! Symbolic bit-vector expressions, symbolic arrays, and constraint sets.
//!
//! Everything in this module is immutable once built: an [`Expr`] is a plain
//! recursive term, shared via `Arc` so cloning a subtree during a reorder
//! rewrite (see `crate::reorder`) is cheap.

mod builder;
pub mod oracle;
pub mod backend;

pub use builder::{and, concat, eq, extract, not};
pub use oracle::{Oracle, OracleError};
pub use backend::{SatResult, SolverBackend, StructuralBackend};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A symbolic array: a named, possibly constant-backed, block of bytes.
///
/// Matches spec §3.1: name, element count, index width, value width, and
/// optional constant backing (e.g. a packet buffer that starts life
/// uninitialised vs. a configuration table read from the init-prelude).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolicArray {
    pub name: Arc<str>,
    pub size: usize,
    pub index_width: u32,
    pub value_width: u32,
    pub constant_backing: Option<Arc<[u64]>>,
}

impl SymbolicArray {
    pub fn new(name: impl Into<Arc<str>>, size: usize, index_width: u32, value_width: u32) -> Self {
        SymbolicArray {
            name: name.into(),
            size,
            index_width,
            value_width,
            constant_backing: None,
        }
    }
}

/// A symbolic bit-vector term. Every variant has a fixed bit width, reported
/// by [`Expr::width`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const { value: u64, width: u32 },
    Read { array: Arc<SymbolicArray>, index: Arc<Expr> },
    Extract { base: Arc<Expr>, offset: u32, width: u32 },
    Concat { hi: Arc<Expr>, lo: Arc<Expr> },
    Add(Arc<Expr>, Arc<Expr>),
    Sub(Arc<Expr>, Arc<Expr>),
    Mul(Arc<Expr>, Arc<Expr>),
    Eq(Arc<Expr>, Arc<Expr>),
    Ult(Arc<Expr>, Arc<Expr>),
    Slt(Arc<Expr>, Arc<Expr>),
    And(Arc<Expr>, Arc<Expr>),
    Or(Arc<Expr>, Arc<Expr>),
    Xor(Arc<Expr>, Arc<Expr>),
    Not(Arc<Expr>),
    Ite { cond: Arc<Expr>, t: Arc<Expr>, f: Arc<Expr> },
}

impl Expr {
    pub fn constant(value: u64, width: u32) -> Arc<Expr> {
        Arc::new(Expr::Const { value, width })
    }

    pub fn read(array: Arc<SymbolicArray>, index: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Read { array, index })
    }

    /// The expression's fixed bit width.
    pub fn width(&self) -> u32 {
        match self {
            Expr::Const { width, .. } => *width,
            Expr::Read { array, .. } => array.value_width,
            Expr::Extract { width, .. } => *width,
            Expr::Concat { hi, lo } => hi.width() + lo.width(),
            Expr::Add(a, _) | Expr::Sub(a, _) | Expr::Mul(a, _) => a.width(),
            Expr::Eq(..) | Expr::Ult(..) | Expr::Slt(..) => 1,
            Expr::And(a, _) | Expr::Or(a, _) | Expr::Xor(a, _) => a.width(),
            Expr::Not(a) => a.width(),
            Expr::Ite { t, .. } => t.width(),
        }
    }

    /// True iff this expression is a constant node (spec §4.1 `value_of`).
    pub fn as_constant(&self) -> Option<u64> {
        match self {
            Expr::Const { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_read(&self) -> Option<(&Arc<SymbolicArray>, &Arc<Expr>)> {
        match self {
            Expr::Read { array, index } => Some((array, index)),
            _ => None,
        }
    }

    pub fn as_concat(&self) -> Option<(&Arc<Expr>, &Arc<Expr>)> {
        match self {
            Expr::Concat { hi, lo } => Some((hi, lo)),
            _ => None,
        }
    }

    /// Every symbolic-array name this expression reads from, transitively.
    pub fn array_names(&self) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        self.collect_array_names(&mut out);
        out
    }

    fn collect_array_names(&self, out: &mut BTreeSet<Arc<str>>) {
        match self {
            Expr::Const { .. } => {}
            Expr::Read { array, index } => {
                out.insert(Arc::clone(&array.name));
                index.collect_array_names(out);
            }
            Expr::Extract { base, .. } | Expr::Not(base) => base.collect_array_names(out),
            Expr::Concat { hi, lo }
            | Expr::Add(hi, lo)
            | Expr::Sub(hi, lo)
            | Expr::Mul(hi, lo)
            | Expr::Eq(hi, lo)
            | Expr::Ult(hi, lo)
            | Expr::Slt(hi, lo)
            | Expr::And(hi, lo)
            | Expr::Or(hi, lo)
            | Expr::Xor(hi, lo) => {
                hi.collect_array_names(out);
                lo.collect_array_names(out);
            }
            Expr::Ite { cond, t, f } => {
                cond.collect_array_names(out);
                t.collect_array_names(out);
                f.collect_array_names(out);
            }
        }
    }

    /// Every [`SymbolicArray`] this expression reads from, transitively,
    /// keyed by name. Used by the BDD file writer (spec §6.2 `kQuery`
    /// section) to declare each array's full shape, not just its name.
    pub fn arrays(&self, out: &mut std::collections::BTreeMap<Arc<str>, Arc<SymbolicArray>>) {
        match self {
            Expr::Const { .. } => {}
            Expr::Read { array, index } => {
                out.entry(Arc::clone(&array.name)).or_insert_with(|| Arc::clone(array));
                index.arrays(out);
            }
            Expr::Extract { base, .. } | Expr::Not(base) => base.arrays(out),
            Expr::Concat { hi, lo }
            | Expr::Add(hi, lo)
            | Expr::Sub(hi, lo)
            | Expr::Mul(hi, lo)
            | Expr::Eq(hi, lo)
            | Expr::Ult(hi, lo)
            | Expr::Slt(hi, lo)
            | Expr::And(hi, lo)
            | Expr::Or(hi, lo)
            | Expr::Xor(hi, lo) => {
                hi.arrays(out);
                lo.arrays(out);
            }
            Expr::Ite { cond, t, f } => {
                cond.arrays(out);
                t.arrays(out);
                f.arrays(out);
            }
        }
    }

    /// Replaces every occurrence of `from` with `to` (structural equality).
    /// Used by the oracle to rewrite `e2`'s symbols onto `e1` before asking
    /// `always_equal` (spec §4.1).
    pub fn substitute(self: &Arc<Expr>, from: &Arc<Expr>, to: &Arc<Expr>) -> Arc<Expr> {
        if Arc::ptr_eq(self, from) || self.as_ref() == from.as_ref() {
            return Arc::clone(to);
        }
        match self.as_ref() {
            Expr::Const { .. } => Arc::clone(self),
            Expr::Read { array, index } => {
                Expr::read(Arc::clone(array), index.substitute(from, to))
            }
            Expr::Extract { base, offset, width } => Arc::new(Expr::Extract {
                base: base.substitute(from, to),
                offset: *offset,
                width: *width,
            }),
            Expr::Concat { hi, lo } => Arc::new(Expr::Concat {
                hi: hi.substitute(from, to),
                lo: lo.substitute(from, to),
            }),
            Expr::Add(a, b) => Arc::new(Expr::Add(a.substitute(from, to), b.substitute(from, to))),
            Expr::Sub(a, b) => Arc::new(Expr::Sub(a.substitute(from, to), b.substitute(from, to))),
            Expr::Mul(a, b) => Arc::new(Expr::Mul(a.substitute(from, to), b.substitute(from, to))),
            Expr::Eq(a, b) => Arc::new(Expr::Eq(a.substitute(from, to), b.substitute(from, to))),
            Expr::Ult(a, b) => Arc::new(Expr::Ult(a.substitute(from, to), b.substitute(from, to))),
            Expr::Slt(a, b) => Arc::new(Expr::Slt(a.substitute(from, to), b.substitute(from, to))),
            Expr::And(a, b) => Arc::new(Expr::And(a.substitute(from, to), b.substitute(from, to))),
            Expr::Or(a, b) => Arc::new(Expr::Or(a.substitute(from, to), b.substitute(from, to))),
            Expr::Xor(a, b) => Arc::new(Expr::Xor(a.substitute(from, to), b.substitute(from, to))),
            Expr::Not(a) => Arc::new(Expr::Not(a.substitute(from, to))),
            Expr::Ite { cond, t, f } => Arc::new(Expr::Ite {
                cond: cond.substitute(from, to),
                t: t.substitute(from, to),
                f: f.substitute(from, to),
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const { value, width } => write!(f, "{value}:w{width}"),
            Expr::Read { array, index } => write!(f, "{}[{}]", array.name, index),
            Expr::Extract { base, offset, width } => write!(f, "extract({base}, {offset}, {width})"),
            Expr::Concat { hi, lo } => write!(f, "concat({hi}, {lo})"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Eq(a, b) => write!(f, "({a} == {b})"),
            Expr::Ult(a, b) => write!(f, "({a} <u {b})"),
            Expr::Slt(a, b) => write!(f, "({a} <s {b})"),
            Expr::And(a, b) => write!(f, "({a} & {b})"),
            Expr::Or(a, b) => write!(f, "({a} | {b})"),
            Expr::Xor(a, b) => write!(f, "({a} ^ {b})"),
            Expr::Not(a) => write!(f, "!{a}"),
            Expr::Ite { cond, t, f: e } => write!(f, "ite({cond}, {t}, {e})"),
        }
    }
}

/// A named symbol: a base tag, the array it reads, and the read expression
/// itself (spec §3.1). Symbols are how the reorderer's IO check (§4.3.1#3)
/// decides whether a candidate's inputs are available at an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub base_name: Arc<str>,
    pub array: Arc<SymbolicArray>,
    pub expr: Arc<Expr>,
}

/// A byte read from the distinguished `packet_chunks` array, with its
/// concrete byte offset (spec §4.1 `symbols_of`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketChunkRead {
    pub byte_offset: u64,
}

/// An ordered, implicitly-conjoined collection of boolean expressions
/// (spec §3.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<Arc<Expr>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        ConstraintSet::default()
    }

    pub fn push(&mut self, e: Arc<Expr>) {
        self.constraints.push(e);
    }

    pub fn extended(&self, e: Arc<Expr>) -> ConstraintSet {
        let mut out = self.clone();
        out.push(e);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Expr>> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn merge(&self, other: &ConstraintSet) -> ConstraintSet {
        let mut out = self.clone();
        out.constraints.extend(other.constraints.iter().cloned());
        out
    }
}
