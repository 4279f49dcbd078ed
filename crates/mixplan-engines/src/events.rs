//! The engine's event stream: build, improvement, and terminal events,
//! fanned out to owner-supplied handlers. Handlers are called on whichever
//! thread the backend reports from; the backend serializes improvement
//! callbacks, so handlers only need `Send`.

use mixplan_solver::SolveStatus;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub enum SolveEvent {
    /// The model was encoded and handed to the backend.
    Started {
        variables: usize,
        constraints: usize,
    },
    /// The backend proved a strictly better feasible solution.
    Improved {
        objective: i64,
        solutions: usize,
        elapsed: Duration,
    },
    /// The backend terminated.
    Finished {
        status: SolveStatus,
        objective: Option<i64>,
        elapsed: Duration,
    },
}

pub trait EventHandler: Send {
    fn handle(&mut self, event: &SolveEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&SolveEvent) + Send,
{
    fn handle(&mut self, event: &SolveEvent) {
        (self)(event)
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct EventLogger;

impl EventHandler for EventLogger {
    fn handle(&mut self, event: &SolveEvent) {
        match event {
            SolveEvent::Started {
                variables,
                constraints,
            } => {
                info!(variables, constraints, "model handed to backend");
            }
            SolveEvent::Improved {
                objective,
                solutions,
                elapsed,
            } => {
                info!(
                    "solution #{:<3} | objective: {:>6} | time: {:>6.2?}",
                    solutions, objective, elapsed
                );
            }
            SolveEvent::Finished {
                status,
                objective,
                elapsed,
            } => match objective {
                Some(value) => info!("{} | objective: {} | time: {:.2?}", status, value, elapsed),
                None => info!("{} | time: {:.2?}", status, elapsed),
            },
        }
    }
}
