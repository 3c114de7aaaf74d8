//! Tick counter, stop signal and the loop that drives a model.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{WorldError, WorldResult};
use crate::world::World;

/// Tick state of a world: unset until [`Ticker::reset`], then counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ticker {
    current: Option<u64>,
}

impl Ticker {
    /// Start (or restart) counting from zero.
    pub fn reset(&mut self) {
        self.current = Some(0);
    }

    /// Return to the unset state.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Advance by one; fails before the counter was started.
    pub fn tick(&mut self) -> WorldResult<u64> {
        let next = self.current.ok_or(WorldError::SchedulerNotStarted)? + 1;
        self.current = Some(next);
        Ok(next)
    }

    pub fn ticks(&self) -> WorldResult<u64> {
        self.current.ok_or(WorldError::SchedulerNotStarted)
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.current.is_some()
    }
}

/// Outcome of a step or action: keep going, or stop the enclosing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
}

impl Flow {
    #[must_use]
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl From<()> for Flow {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

impl From<bool> for Flow {
    /// `true` means "stop".
    fn from(stop: bool) -> Self {
        if stop {
            Self::Stop
        } else {
            Self::Continue
        }
    }
}

/// A simulation written against the agent-set API.
pub trait Model {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Build the initial population; usually ends with `reset_ticks`.
    fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()>;

    /// One simulation step. Returning [`Flow::Stop`] ends the run.
    fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow>;
}

/// What happened in one driven step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based index of the step within the run.
    pub step: u64,
    /// Tick counter after the step, if started.
    pub ticks: Option<u64>,
    pub turtles: usize,
    pub links: usize,
    pub flow: Flow,
}

/// Synchronous call-out invoked after every step (display refresh, logging).
pub trait StepObserver {
    fn on_step(&mut self, world: &World, report: &StepReport);
}

/// Observer that ignores every step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_step(&mut self, _world: &World, _report: &StepReport) {}
}

impl<F> StepObserver for F
where
    F: FnMut(&World, &StepReport),
{
    fn on_step(&mut self, world: &World, report: &StepReport) {
        self(world, report);
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEnd {
    /// The model returned [`Flow::Stop`].
    Stopped,
    /// The step limit was reached first.
    StepLimit,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub model: String,
    pub seed: u64,
    pub steps: u64,
    pub ticks: Option<u64>,
    pub turtles: usize,
    pub links: usize,
    pub end: RunEnd,
}

/// Drives `setup` once, then `go` until it stops or the step limit is hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    max_steps: Option<u64>,
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self { max_steps: None }
    }

    /// Cap the number of `go` invocations; a model that never stops otherwise runs forever.
    #[must_use]
    pub const fn with_max_steps(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }

    #[must_use]
    pub const fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    /// Invoke `go` once and report the outcome.
    pub fn step(
        &self,
        world: &mut World,
        model: &mut dyn Model,
        step: u64,
    ) -> WorldResult<StepReport> {
        let flow = {
            let mut ctx = Context::new(world);
            model.go(&mut ctx)?
        };
        Ok(StepReport {
            step,
            ticks: world.ticks().ok(),
            turtles: world.count_living(),
            links: world.count_links(),
            flow,
        })
    }

    /// Run `setup` then step until stopped. Errors abort the run.
    pub fn run(
        &self,
        world: &mut World,
        model: &mut dyn Model,
        observer: &mut dyn StepObserver,
    ) -> WorldResult<RunSummary> {
        {
            let mut ctx = Context::new(world);
            model.setup(&mut ctx)?;
        }
        debug!(model = model.name(), seed = world.seed(), "setup complete");

        let mut steps = 0;
        let end = loop {
            if self.max_steps.is_some_and(|max| steps >= max) {
                break RunEnd::StepLimit;
            }
            let report = self.step(world, model, steps)?;
            steps += 1;
            observer.on_step(world, &report);
            if report.flow.is_stop() {
                break RunEnd::Stopped;
            }
        };
        debug!(model = model.name(), steps, ?end, "run finished");

        Ok(RunSummary {
            model: model.name().to_string(),
            seed: world.seed(),
            steps,
            ticks: world.ticks().ok(),
            turtles: world.count_living(),
            links: world.count_links(),
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    #[test]
    fn ticker_requires_reset_before_tick() {
        let mut ticker = Ticker::default();
        assert_eq!(ticker.tick(), Err(WorldError::SchedulerNotStarted));
        assert_eq!(ticker.ticks(), Err(WorldError::SchedulerNotStarted));
        ticker.reset();
        assert_eq!(ticker.ticks(), Ok(0));
        for expected in 1..=5 {
            assert_eq!(ticker.tick(), Ok(expected));
        }
        assert_eq!(ticker.ticks(), Ok(5));
        ticker.reset();
        assert_eq!(ticker.ticks(), Ok(0));
        ticker.clear();
        assert!(!ticker.is_started());
    }

    #[test]
    fn flow_conversions() {
        assert_eq!(Flow::from(()), Flow::Continue);
        assert!(Flow::from(true).is_stop());
        assert!(!Flow::from(false).is_stop());
    }

    struct Countdown {
        remaining: u32,
    }

    impl Model for Countdown {
        fn name(&self) -> &str {
            "countdown"
        }

        fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
            ctx.clear_all();
            ctx.create_turtles(3)?;
            ctx.reset_ticks();
            Ok(())
        }

        fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
            if self.remaining == 0 {
                return Ok(Flow::Stop);
            }
            self.remaining -= 1;
            ctx.tick()?;
            Ok(Flow::Continue)
        }
    }

    fn world() -> World {
        World::new(WorldConfig {
            rng_seed: Some(1),
            ..WorldConfig::with_bounds(-2, 2, -2, 2)
        })
        .expect("world")
    }

    #[test]
    fn run_stops_on_stop_signal() {
        let mut world = world();
        let mut model = Countdown { remaining: 4 };
        let mut seen = Vec::new();
        let mut observer = |_: &World, report: &StepReport| seen.push(report.flow);
        let summary = Scheduler::new()
            .run(&mut world, &mut model, &mut observer)
            .expect("run");
        assert_eq!(summary.end, RunEnd::Stopped);
        assert_eq!(summary.steps, 5);
        assert_eq!(summary.ticks, Some(4));
        assert_eq!(summary.turtles, 3);
        assert_eq!(seen.last(), Some(&Flow::Stop));
    }

    #[test]
    fn run_honors_step_limit() {
        let mut world = world();
        let mut model = Countdown { remaining: 100 };
        let summary = Scheduler::with_max_steps(10)
            .run(&mut world, &mut model, &mut NullObserver)
            .expect("run");
        assert_eq!(summary.end, RunEnd::StepLimit);
        assert_eq!(summary.steps, 10);
        assert_eq!(world.ticks(), Ok(10));
    }
}
