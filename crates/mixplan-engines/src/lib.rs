pub mod analyzer;
pub mod encoder;
pub mod engine;
mod events;
pub mod report;
pub mod runners;

pub use analyzer::{NodeReport, PlanReport, analyze};
pub use encoder::{EncodedPlan, NodeVars, encode};
pub use engine::{SolveEngine, SolveEngineBuilder, SolveOutcome};
pub use events::{EventHandler, EventLogger, SolveEvent};
pub use runners::{ScenarioResult, TargetSpec, dispatch, run_scenario};

pub use mixplan_core::*;
pub use mixplan_error::{MixError, MixResult, ensure, mix_bail, mix_err};
pub use mixplan_solver::{SolveStatus, SolverParams};

pub fn init_logging() {
    pub use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}
