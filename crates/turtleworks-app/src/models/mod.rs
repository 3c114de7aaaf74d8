//! Demo models driven by the command-line runner.

pub mod kicks;
pub mod pairing;

use std::fmt;

use serde::{Deserialize, Serialize};
use turtleworks_core::{Context, Flow, Model, World, WorldConfig, WorldResult};

pub use kicks::{Kicks, KicksParams, KicksReport};
pub use pairing::{Pairing, PairingParams, PairingReport};

/// Which demo to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Walkers that couple, pass a condition on, and separate.
    Pairing,
    /// Goal kicks from a kick line.
    Kicks,
}

impl ModelKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pairing => "pairing",
            Self::Kicks => "kicks",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A demo model with its default parameters.
#[derive(Debug, Clone)]
pub enum Demo {
    Pairing(Pairing),
    Kicks(Kicks),
}

/// End-of-run statistics of a demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum ModelReport {
    Pairing(PairingReport),
    Kicks(KicksReport),
}

impl Demo {
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Pairing => Self::Pairing(Pairing::default()),
            ModelKind::Kicks => Self::Kicks(Kicks::default()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Pairing(_) => ModelKind::Pairing,
            Self::Kicks(_) => ModelKind::Kicks,
        }
    }

    /// World layout and variable declarations the model expects.
    #[must_use]
    pub fn world_config(&self, seed: Option<u64>) -> WorldConfig {
        match self {
            Self::Pairing(_) => Pairing::world_config(seed),
            Self::Kicks(_) => Kicks::world_config(seed),
        }
    }

    pub fn report(&self, world: &World) -> WorldResult<ModelReport> {
        Ok(match self {
            Self::Pairing(model) => ModelReport::Pairing(model.report(world)?),
            Self::Kicks(model) => ModelReport::Kicks(model.report(world)?),
        })
    }
}

impl Model for Demo {
    fn name(&self) -> &str {
        match self {
            Self::Pairing(model) => model.name(),
            Self::Kicks(model) => model.name(),
        }
    }

    fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
        match self {
            Self::Pairing(model) => model.setup(ctx),
            Self::Kicks(model) => model.setup(ctx),
        }
    }

    fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
        match self {
            Self::Pairing(model) => model.go(ctx),
            Self::Kicks(model) => model.go(ctx),
        }
    }
}
