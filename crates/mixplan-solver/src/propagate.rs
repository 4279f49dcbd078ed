//! Bounds-consistency propagation over the model's rows.
//!
//! Domains are intervals. Every tightening is recorded on a trail so the
//! search can undo to a decision point in O(changes). Propagation runs all
//! constraints to a fixpoint; the models this backend serves are small
//! enough that the simple full-pass loop beats bookkeeping a wake queue.

use crate::model::{Constraint, LinExpr, Model, Rel, VarId};

/// Signals an empty domain somewhere below the current decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conflict;

/// Interval domains with an undo trail.
#[derive(Debug, Clone)]
pub(crate) struct DomainStore {
    lb: Vec<i64>,
    ub: Vec<i64>,
    trail: Vec<(u32, i64, i64)>,
}

impl DomainStore {
    pub fn new(model: &Model) -> Self {
        DomainStore {
            lb: model.vars.iter().map(|v| v.lb).collect(),
            ub: model.vars.iter().map(|v| v.ub).collect(),
            trail: Vec::new(),
        }
    }

    pub fn lb(&self, var: VarId) -> i64 {
        self.lb[var.index()]
    }

    pub fn ub(&self, var: VarId) -> i64 {
        self.ub[var.index()]
    }

    pub fn fixed(&self, var: VarId) -> Option<i64> {
        let i = var.index();
        (self.lb[i] == self.ub[i]).then_some(self.lb[i])
    }

    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let (var, lb, ub) = self.trail.pop().unwrap();
            self.lb[var as usize] = lb;
            self.ub[var as usize] = ub;
        }
    }

    pub fn set_lb(&mut self, var: VarId, value: i64) -> Result<bool, Conflict> {
        let i = var.index();
        if value <= self.lb[i] {
            return Ok(false);
        }
        if value > self.ub[i] {
            return Err(Conflict);
        }
        self.trail.push((var.0, self.lb[i], self.ub[i]));
        self.lb[i] = value;
        Ok(true)
    }

    pub fn set_ub(&mut self, var: VarId, value: i64) -> Result<bool, Conflict> {
        let i = var.index();
        if value >= self.ub[i] {
            return Ok(false);
        }
        if value < self.lb[i] {
            return Err(Conflict);
        }
        self.trail.push((var.0, self.lb[i], self.ub[i]));
        self.ub[i] = value;
        Ok(true)
    }

    pub fn fix(&mut self, var: VarId, value: i64) -> Result<bool, Conflict> {
        let a = self.set_lb(var, value)?;
        let b = self.set_ub(var, value)?;
        Ok(a || b)
    }
}

fn div_floor(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
}

fn div_ceil(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) == (b < 0)) { q + 1 } else { q }
}

fn clamp_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Minimum and maximum value of `expr` under the current domains.
pub(crate) fn activity(expr: &LinExpr, store: &DomainStore) -> (i128, i128) {
    let mut min = expr.constant as i128;
    let mut max = expr.constant as i128;
    for &(coeff, var) in &expr.terms {
        let c = coeff as i128;
        let (lo, hi) = (store.lb(var) as i128, store.ub(var) as i128);
        if c >= 0 {
            min += c * lo;
            max += c * hi;
        } else {
            min += c * hi;
            max += c * lo;
        }
    }
    (min, max)
}

/// Runs every constraint (plus the optional objective cut `obj <= bound`)
/// to a fixpoint.
pub(crate) fn propagate(
    model: &Model,
    store: &mut DomainStore,
    obj_cut: Option<(&LinExpr, i64)>,
) -> Result<(), Conflict> {
    loop {
        let mut changed = false;
        for constraint in &model.constraints {
            changed |= match constraint {
                Constraint::Linear {
                    expr,
                    rel,
                    enforce,
                } => propagate_linear(store, expr, *rel, *enforce)?,
                Constraint::Product {
                    product,
                    lhs,
                    rhs,
                } => propagate_product(store, *product, *lhs, *rhs)?,
            };
        }
        if let Some((obj, bound)) = obj_cut {
            let cut = obj.clone().plus(-bound);
            changed |= propagate_linear(store, &cut, Rel::Le, None)?;
        }
        if !changed {
            return Ok(());
        }
    }
}

fn impossible(rel: Rel, min: i128, max: i128) -> bool {
    match rel {
        Rel::Eq => min > 0 || max < 0,
        Rel::Le => min > 0,
        Rel::Ge => unreachable!("Ge rows are normalized to Le at build time"),
    }
}

fn propagate_linear(
    store: &mut DomainStore,
    expr: &LinExpr,
    rel: Rel,
    enforce: Option<crate::model::Literal>,
) -> Result<bool, Conflict> {
    let (min, max) = activity(expr, store);

    if let Some(lit) = enforce {
        match store.fixed(lit.var) {
            Some(v) if (v == 1) == lit.value => {}
            Some(_) => return Ok(false),
            None => {
                // The row cannot hold, so the guard cannot either.
                if impossible(rel, min, max) {
                    return store.fix(lit.var, if lit.value { 0 } else { 1 });
                }
                return Ok(false);
            }
        }
    }

    if impossible(rel, min, max) {
        return Err(Conflict);
    }

    let mut changed = false;
    for &(coeff, var) in &expr.terms {
        let c = coeff as i128;
        let (lo, hi) = (store.lb(var) as i128, store.ub(var) as i128);
        let (contrib_min, contrib_max) = if c >= 0 {
            (c * lo, c * hi)
        } else {
            (c * hi, c * lo)
        };
        let rest_min = min - contrib_min;
        let rest_max = max - contrib_max;

        match rel {
            Rel::Eq => {
                // c·x must land in [-rest_max, -rest_min].
                if c > 0 {
                    changed |= store.set_lb(var, clamp_i64(div_ceil(-rest_max, c)))?;
                    changed |= store.set_ub(var, clamp_i64(div_floor(-rest_min, c)))?;
                } else {
                    changed |= store.set_lb(var, clamp_i64(div_ceil(-rest_min, c)))?;
                    changed |= store.set_ub(var, clamp_i64(div_floor(-rest_max, c)))?;
                }
            }
            Rel::Le => {
                // c·x <= -rest_min.
                if c > 0 {
                    changed |= store.set_ub(var, clamp_i64(div_floor(-rest_min, c)))?;
                } else {
                    changed |= store.set_lb(var, clamp_i64(div_ceil(-rest_min, c)))?;
                }
            }
            Rel::Ge => unreachable!(),
        }
    }
    Ok(changed)
}

/// `product = lhs · rhs` over non-negative domains.
fn propagate_product(
    store: &mut DomainStore,
    product: VarId,
    lhs: VarId,
    rhs: VarId,
) -> Result<bool, Conflict> {
    let mut changed = false;

    let (x_lo, x_hi) = (store.lb(lhs) as i128, store.ub(lhs) as i128);
    let (y_lo, y_hi) = (store.lb(rhs) as i128, store.ub(rhs) as i128);

    changed |= store.set_lb(product, clamp_i64(x_lo * y_lo))?;
    changed |= store.set_ub(product, clamp_i64(x_hi * y_hi))?;

    let (z_lo, z_hi) = (store.lb(product) as i128, store.ub(product) as i128);

    // A positive product needs both factors positive.
    if z_lo > 0 {
        changed |= store.set_lb(lhs, 1)?;
        changed |= store.set_lb(rhs, 1)?;
    }

    let (x_lo, x_hi) = (store.lb(lhs) as i128, store.ub(lhs) as i128);
    let (y_lo, y_hi) = (store.lb(rhs) as i128, store.ub(rhs) as i128);

    if y_hi > 0 {
        changed |= store.set_lb(lhs, clamp_i64(div_ceil(z_lo, y_hi)))?;
    }
    if y_lo > 0 {
        changed |= store.set_ub(lhs, clamp_i64(div_floor(z_hi, y_lo)))?;
    }
    if x_hi > 0 {
        changed |= store.set_lb(rhs, clamp_i64(div_ceil(z_lo, x_hi)))?;
    }
    if x_lo > 0 {
        changed |= store.set_ub(rhs, clamp_i64(div_floor(z_hi, x_lo)))?;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinExpr, Literal, Model};

    #[test]
    fn linear_eq_tightens_both_sides() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 10, "x");
        let y = model.new_int_var(0, 10, "y");
        model.add_eq(LinExpr::sum([x, y]), 4);

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, None).unwrap();

        assert_eq!(store.ub(x), 4);
        assert_eq!(store.ub(y), 4);

        store.fix(x, 3).unwrap();
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.fixed(y), Some(1));
    }

    #[test]
    fn infeasible_row_conflicts() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 3, "x");
        model.add_ge(LinExpr::from(x), 5);

        let mut store = DomainStore::new(&model);
        assert_eq!(propagate(&model, &mut store, None), Err(Conflict));
    }

    #[test]
    fn enforced_row_propagates_only_when_guard_holds() {
        let mut model = Model::new();
        let active = model.new_bool_var("active");
        let x = model.new_int_var(0, 10, "x");
        model.add_ge_if(LinExpr::from(x), 6, Literal::pos(active));

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.lb(x), 0);

        store.fix(active, 1).unwrap();
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.lb(x), 6);
    }

    #[test]
    fn impossible_enforced_row_fixes_guard() {
        let mut model = Model::new();
        let active = model.new_bool_var("active");
        let x = model.new_int_var(0, 4, "x");
        model.add_ge_if(LinExpr::from(x), 6, Literal::pos(active));

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.fixed(active), Some(0));
    }

    #[test]
    fn product_bounds_flow_both_ways() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 5, "x");
        let y = model.new_int_var(0, 5, "y");
        let z = model.new_int_var(0, 100, "z");
        model.add_multiplication_equality(z, x, y);

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.ub(z), 25);

        store.fix(z, 6).unwrap();
        store.fix(x, 3).unwrap();
        propagate(&model, &mut store, None).unwrap();
        assert_eq!(store.fixed(y), Some(2));
    }

    #[test]
    fn positive_product_needs_positive_factors() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 5, "x");
        let y = model.new_int_var(0, 5, "y");
        let z = model.new_int_var(2, 100, "z");
        model.add_multiplication_equality(z, x, y);

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, None).unwrap();
        assert!(store.lb(x) >= 1);
        assert!(store.lb(y) >= 1);
    }

    #[test]
    fn objective_cut_prunes_domains() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 10, "x");
        let y = model.new_int_var(0, 10, "y");
        let obj = LinExpr::sum([x, y]);

        let mut store = DomainStore::new(&model);
        propagate(&model, &mut store, Some((&obj, 3))).unwrap();
        assert_eq!(store.ub(x), 3);
        assert_eq!(store.ub(y), 3);
    }

    #[test]
    fn trail_undo_restores_domains() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 10, "x");

        let mut store = DomainStore::new(&model);
        let mark = store.mark();
        store.fix(x, 7).unwrap();
        assert_eq!(store.fixed(x), Some(7));

        store.undo_to(mark);
        assert_eq!(store.lb(x), 0);
        assert_eq!(store.ub(x), 10);
    }
}
