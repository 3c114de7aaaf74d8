//! Shared plumbing for the Turtleworks command-line runner.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use turtleworks_core::{RunSummary, Scheduler, StepObserver, StepReport, World, WorldResult};

pub mod models;

pub use models::{Demo, ModelKind, ModelReport};

/// Observer that logs progress through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    every: u64,
}

impl LogObserver {
    /// Log at `info` every `every` steps (0 disables), `debug` otherwise.
    #[must_use]
    pub const fn new(every: u64) -> Self {
        Self { every }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StepObserver for LogObserver {
    fn on_step(&mut self, _world: &World, report: &StepReport) {
        if self.every > 0 && (report.step + 1) % self.every == 0 {
            info!(
                step = report.step + 1,
                ticks = ?report.ticks,
                turtles = report.turtles,
                links = report.links,
                "progress"
            );
        } else {
            debug!(step = report.step + 1, turtles = report.turtles, "step");
        }
    }
}

/// What a finished demo run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub report: ModelReport,
}

/// Build the demo's world, run it to completion or `max_steps`, and report.
pub fn run_demo(
    demo: &mut Demo,
    seed: Option<u64>,
    max_steps: u64,
    observer: &mut dyn StepObserver,
) -> WorldResult<(World, RunOutcome)> {
    let mut world = World::new(demo.world_config(seed))?;
    info!(model = %demo.kind(), seed = world.seed(), max_steps, "starting run");
    let summary = Scheduler::with_max_steps(max_steps).run(&mut world, &mut *demo, observer)?;
    let report = demo.report(&world)?;
    info!(
        model = %demo.kind(),
        steps = summary.steps,
        end = ?summary.end,
        "run finished"
    );
    Ok((world, RunOutcome { summary, report }))
}
