//! Expression-rewrite helpers (spec §4.1: "Rewrite: not(e), eq(a,b), and(a,b),
//! extract(e,offset,width), concat(hi,lo)").
//!
//! These are thin smart constructors, not a simplifier: folding of obviously
//! redundant shapes (double negation, `extract` of a whole-width base) keeps
//! the graphs the reorderer works with small, but correctness never depends
//! on these folds firing.

use super::Expr;
use std::sync::Arc;

pub fn not(e: Arc<Expr>) -> Arc<Expr> {
    if let Expr::Not(inner) = e.as_ref() {
        return Arc::clone(inner);
    }
    Arc::new(Expr::Not(e))
}

pub fn eq(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    if a == b {
        return Expr::constant(1, 1);
    }
    Arc::new(Expr::Eq(a, b))
}

pub fn and(a: Arc<Expr>, b: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::And(a, b))
}

pub fn extract(e: Arc<Expr>, offset: u32, width: u32) -> Arc<Expr> {
    if offset == 0 && width == e.width() {
        return e;
    }
    Arc::new(Expr::Extract { base: e, offset, width })
}

pub fn concat(hi: Arc<Expr>, lo: Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::Concat { hi, lo })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_cancels() {
        let a = Expr::constant(1, 1);
        assert_eq!(not(not(Arc::clone(&a))), a);
    }

    #[test]
    fn extract_full_width_is_identity() {
        let a = Expr::constant(7, 8);
        assert_eq!(extract(Arc::clone(&a), 0, 8), a);
    }

    #[test]
    fn eq_of_identical_exprs_is_constant_true() {
        let a = Expr::constant(5, 32);
        let e = eq(Arc::clone(&a), Arc::clone(&a));
        assert_eq!(e.as_constant(), Some(1));
    }
}
