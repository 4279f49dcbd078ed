//! Model construction: variables, linear rows, products, objective.
//!
//! A [Model] is a plain description: building one performs no propagation
//! and no solving. Once handed to a [crate::Solver] it is read-only; every
//! variable exists from build time, none is created during search.

use std::fmt;

/// Handle of a model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A boolean variable together with the polarity that makes a guarded
/// constraint active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub var: VarId,
    pub value: bool,
}

impl Literal {
    pub fn pos(var: VarId) -> Self {
        Literal { var, value: true }
    }

    pub fn neg(var: VarId) -> Self {
        Literal { var, value: false }
    }
}

/// Relation of a linear row against zero (rows are normalized to
/// `Σ cᵢ·xᵢ + c  rel  0` at build time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Eq,
    Le,
    Ge,
}

/// A linear expression `Σ cᵢ·xᵢ + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub(crate) terms: Vec<(i64, VarId)>,
    pub(crate) constant: i64,
}

impl LinExpr {
    pub fn new() -> Self {
        LinExpr::default()
    }

    /// Adds `coeff · var` to the expression.
    pub fn term(mut self, coeff: i64, var: VarId) -> Self {
        if coeff != 0 {
            self.terms.push((coeff, var));
        }
        self
    }

    pub fn plus(mut self, constant: i64) -> Self {
        self.constant += constant;
        self
    }

    /// `Σ vars` with unit coefficients.
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        let mut expr = LinExpr::new();
        for var in vars {
            expr.terms.push((1, var));
        }
        expr
    }

    pub fn negated(mut self) -> Self {
        for (coeff, _) in &mut self.terms {
            *coeff = -*coeff;
        }
        self.constant = -self.constant;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        LinExpr::new().term(1, var)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VarInfo {
    pub lb: i64,
    pub ub: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub(crate) enum Constraint {
    /// `expr rel 0`, active unconditionally or only when `enforce` holds.
    /// While the literal is unfixed the row still propagates in reverse:
    /// a row impossible under current bounds fixes the literal to the
    /// opposite polarity.
    Linear {
        expr: LinExpr,
        rel: Rel,
        enforce: Option<Literal>,
    },
    /// `product = lhs · rhs`, all three non-negative.
    Product {
        product: VarId,
        lhs: VarId,
        rhs: VarId,
    },
}

/// A bounded-integer constraint model under construction.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub(crate) vars: Vec<VarInfo>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) objective: Option<LinExpr>,
    pub(crate) branch_order: Vec<VarId>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    /// Creates an integer variable with inclusive bounds.
    ///
    /// Panics if `lb > ub`; the encoder computes every bound from potencies
    /// and factors, so an inverted range is a caller bug, not bad input.
    pub fn new_int_var(&mut self, lb: i64, ub: i64, name: impl Into<String>) -> VarId {
        let name = name.into();
        assert!(lb <= ub, "inverted bounds for {}", name);
        self.vars.push(VarInfo { lb, ub, name });
        VarId(self.vars.len() as u32 - 1)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarId {
        self.new_int_var(0, 1, name)
    }

    pub fn add_eq(&mut self, expr: LinExpr, rhs: i64) {
        self.push_linear(expr.plus(-rhs), Rel::Eq, None);
    }

    pub fn add_le(&mut self, expr: LinExpr, rhs: i64) {
        self.push_linear(expr.plus(-rhs), Rel::Le, None);
    }

    pub fn add_ge(&mut self, expr: LinExpr, rhs: i64) {
        self.push_linear(expr.plus(-rhs), Rel::Ge, None);
    }

    /// `expr == rhs` whenever `enforce` holds.
    pub fn add_eq_if(&mut self, expr: LinExpr, rhs: i64, enforce: Literal) {
        self.push_linear(expr.plus(-rhs), Rel::Eq, Some(enforce));
    }

    /// `expr <= rhs` whenever `enforce` holds.
    pub fn add_le_if(&mut self, expr: LinExpr, rhs: i64, enforce: Literal) {
        self.push_linear(expr.plus(-rhs), Rel::Le, Some(enforce));
    }

    /// `expr >= rhs` whenever `enforce` holds.
    pub fn add_ge_if(&mut self, expr: LinExpr, rhs: i64, enforce: Literal) {
        self.push_linear(expr.plus(-rhs), Rel::Ge, Some(enforce));
    }

    fn push_linear(&mut self, expr: LinExpr, rel: Rel, enforce: Option<Literal>) {
        // Ge is stored as its Le mirror so propagation handles two shapes,
        // not three.
        let (expr, rel) = match rel {
            Rel::Ge => (expr.negated(), Rel::Le),
            other => (expr, other),
        };
        self.constraints.push(Constraint::Linear {
            expr,
            rel,
            enforce,
        });
    }

    /// Ties `product == lhs · rhs`. All three variables must be
    /// non-negative; the encoder's products are volumes times ratio
    /// numerators, both counts.
    pub fn add_multiplication_equality(&mut self, product: VarId, lhs: VarId, rhs: VarId) {
        for var in [product, lhs, rhs] {
            assert!(
                self.vars[var.index()].lb >= 0,
                "multiplication over possibly-negative variable {}",
                self.vars[var.index()].name
            );
        }
        self.constraints.push(Constraint::Product {
            product,
            lhs,
            rhs,
        });
    }

    /// Sets the linear objective to minimize. A model without an objective
    /// is a satisfaction problem; the search stops at its first solution.
    pub fn minimize(&mut self, expr: LinExpr) {
        self.objective = Some(expr);
    }

    /// Variables the search branches on first, in order. Unlisted variables
    /// are labeled afterwards in creation order; with propagation they are
    /// usually already fixed by then.
    pub fn set_branching_order(&mut self, vars: Vec<VarId>) {
        self.branch_order = vars;
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.vars[var.index()].name
    }

    pub fn bounds(&self, var: VarId) -> (i64, i64) {
        let info = &self.vars[var.index()];
        (info.lb, info.ub)
    }

    pub fn objective_expr(&self) -> Option<&LinExpr> {
        self.objective.as_ref()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model: {} vars, {} constraints, objective: {}",
            self.vars.len(),
            self.constraints.len(),
            if self.objective.is_some() {
                "minimize"
            } else {
                "satisfy"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_keep_bounds_and_names() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 9, "x");
        let b = model.new_bool_var("b");

        assert_eq!(model.bounds(x), (0, 9));
        assert_eq!(model.bounds(b), (0, 1));
        assert_eq!(model.name(x), "x");
        assert_eq!(model.var_count(), 2);
    }

    #[test]
    fn ge_rows_are_stored_as_le_mirrors() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 9, "x");
        model.add_ge(LinExpr::from(x), 3);

        match &model.constraints[0] {
            Constraint::Linear { expr, rel, .. } => {
                assert_eq!(*rel, Rel::Le);
                assert_eq!(expr.terms, vec![(-1, x)]);
                assert_eq!(expr.constant, 3);
            }
            _ => panic!("expected linear"),
        }
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let mut model = Model::new();
        let x = model.new_int_var(0, 9, "x");
        let expr = LinExpr::new().term(0, x).term(2, x);
        assert_eq!(expr.terms.len(), 1);
    }
}
