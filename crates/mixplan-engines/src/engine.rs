//! The solve engine: owns a built problem, drives the backend with the
//! configured tuning, streams improving solutions to subscribed handlers,
//! and returns the analyzed best plan.

use crate::analyzer::{PlanReport, analyze};
use crate::encoder::encode;
use crate::events::{EventHandler, EventLogger, SolveEvent};
use mixplan_core::{MixProblem, Objective, RunConfig, SharingPolicy, SolverConfig, Target};
use mixplan_error::{MixResult, mix_bail};
use mixplan_solver::{Assignment, SolutionHandler, SolveStatus, Solver, SolverParams};
use std::time::{Duration, Instant};

/// The result of a successful solve: a plan was found, though not
/// necessarily proved optimal within the budget.
#[derive(Debug)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective_value: i64,
    pub report: PlanReport,
    pub elapsed: Duration,
    /// Number of strictly improving solutions the backend reported.
    pub solutions: usize,
}

impl SolveOutcome {
    pub fn is_proven_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Drives one scenario end to end. Build with [SolveEngine::builder].
pub struct SolveEngine {
    problem: MixProblem,
    objective: Objective,
    params: SolverParams,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl std::fmt::Debug for SolveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolveEngine")
            .field("problem", &self.problem)
            .field("objective", &self.objective)
            .field("params", &self.params)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl SolveEngine {
    pub fn builder() -> SolveEngineBuilder {
        SolveEngineBuilder::default()
    }

    pub fn problem(&self) -> &MixProblem {
        &self.problem
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Encodes, solves, analyzes.
    ///
    /// Returns the best captured plan for `OPTIMAL` and `FEASIBLE`
    /// terminations. `INFEASIBLE` and `UNKNOWN` surface as recoverable
    /// errors so batch drivers can record them and continue.
    pub fn solve(&mut self) -> MixResult<SolveOutcome> {
        let plan = encode(&self.problem, self.objective);
        let started = Instant::now();

        let mut handlers = std::mem::take(&mut self.handlers);
        publish(
            &mut handlers,
            &SolveEvent::Started {
                variables: plan.model.var_count(),
                constraints: plan.model.constraint_count(),
            },
        );

        let mut bridge = Bridge {
            handlers: &mut handlers,
            started,
            solutions: 0,
        };
        let result = Solver::new(self.params.clone()).solve_with(&plan.model, &mut bridge);

        publish(
            &mut handlers,
            &SolveEvent::Finished {
                status: result.status,
                objective: result.best.as_ref().map(|best| best.objective()),
                elapsed: result.elapsed,
            },
        );
        self.handlers = handlers;

        match result.best {
            Some(best) => {
                let report = analyze(&self.problem, &plan, &best);
                Ok(SolveOutcome {
                    status: result.status,
                    objective_value: best.objective(),
                    report,
                    elapsed: result.elapsed,
                    solutions: result.solutions,
                })
            }
            None if result.status == SolveStatus::Infeasible => {
                mix_bail!(
                    SolverInfeasible:
                    "no plan exists for objective '{}' under the configured sharing rules",
                    self.objective
                )
            }
            None => {
                mix_bail!(
                    SolverUnknown:
                    "no solution within budget ({:.2?} elapsed)",
                    result.elapsed
                )
            }
        }
    }
}

fn publish(handlers: &mut [Box<dyn EventHandler>], event: &SolveEvent) {
    for handler in handlers.iter_mut() {
        handler.handle(event);
    }
}

/// Adapts the backend's improving-solution stream onto the event handlers.
/// The backend serializes these calls, so plain mutable state suffices.
struct Bridge<'a> {
    handlers: &'a mut [Box<dyn EventHandler>],
    started: Instant,
    solutions: usize,
}

impl SolutionHandler for Bridge<'_> {
    fn on_improved(&mut self, snapshot: &Assignment) {
        self.solutions += 1;
        publish(
            self.handlers,
            &SolveEvent::Improved {
                objective: snapshot.objective(),
                solutions: self.solutions,
                elapsed: self.started.elapsed(),
            },
        );
    }
}

/// Fluent configuration for a [SolveEngine].
#[derive(Default)]
pub struct SolveEngineBuilder {
    targets: Vec<Target>,
    config: RunConfig,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl SolveEngineBuilder {
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Overrides the configured objective.
    pub fn objective(mut self, objective: Objective) -> Self {
        self.config.objective = objective;
        self
    }

    pub fn subscribe(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Subscribes the tracing-backed logger (and initializes logging).
    pub fn logging(self) -> Self {
        crate::init_logging();
        self.subscribe(EventLogger)
    }

    pub fn build(self) -> MixResult<SolveEngine> {
        self.config.validate()?;
        let problem = MixProblem::new(self.targets, SharingPolicy::from_config(&self.config))?;

        Ok(SolveEngine {
            problem,
            objective: self.config.objective,
            params: solver_params(&self.config.solver),
            handlers: self.handlers,
        })
    }
}

fn solver_params(config: &SolverConfig) -> SolverParams {
    SolverParams {
        workers: config.workers.max(1),
        time_limit: config.time_limit_s.map(Duration::from_secs_f64),
        absolute_gap: config.abs_gap,
        seed: config.seed,
    }
}
