//! Provably optimal reagent-mixing plans for digital microfluidic biochips.
//!
//! Given a set of target mixtures (each an integer ratio vector whose sum
//! factors into mixer-capacity-bounded steps), mixplan builds one
//! deterministic mixing tree per target, precomputes which intermediate
//! fluids may be shared within and across trees, encodes the whole forest as
//! a bounded integer constraint model, and minimizes either the discarded
//! volume or the number of mixing operations.
//!
//! ```no_run
//! use mixplan::*;
//!
//! let mut engine = SolveEngine::builder()
//!     .target(Target::new("sample", vec![2, 11, 5], vec![3, 3, 2]).unwrap())
//!     .objective(Objective::Waste)
//!     .build()
//!     .unwrap();
//!
//! let outcome = engine.solve().unwrap();
//! println!("minimum waste: {}", outcome.objective_value);
//! ```

pub use mixplan_core::*;
pub use mixplan_engines::{
    EncodedPlan, EventHandler, EventLogger, NodeReport, PlanReport, ScenarioResult, SolveEngine,
    SolveEngineBuilder, SolveEvent, SolveOutcome, TargetSpec, analyze, dispatch, encode,
    init_logging, report, run_scenario, runners,
};
pub use mixplan_error::{MixError, MixResult};
pub use mixplan_solver::{SolveStatus, SolverParams};
