//! Reference constraint-optimization backend.
//!
//! The mixing-plan encoder targets a deliberately small solver contract:
//! bounded integer variables, linear equalities and inequalities (optionally
//! guarded by a boolean enforcement literal), integer multiplication
//! equality, and minimization of a linear objective, with a callback invoked
//! for every strictly improving feasible solution. Any CP or MIP engine with
//! those primitives can stand in; this crate is the self-contained reference
//! implementation: bounds-consistency propagation under a depth-first
//! branch-and-bound, with an optional portfolio of seeded workers sharing
//! one incumbent.

pub mod model;
mod propagate;
pub mod search;

pub use model::{LinExpr, Literal, Model, Rel, VarId};
pub use search::{
    Assignment, SolutionHandler, SolveResult, SolveStatus, Solver, SolverParams,
};
