//! Core runtime shared across the Turtleworks workspace.
//!
//! A [`World`] owns every turtle, patch and link. Model code drives it through
//! a [`Context`], whose collective operations (`ask`, `of`, `with`, ...) run
//! closures with an agent pushed as `self`. Randomness comes from a single
//! seeded [`RandomSource`], so equal seeds give equal runs.

mod agent;
mod agentset;
mod breed;
mod config;
mod context;
mod error;
mod rng;
mod scheduler;
mod value;
mod vars;
mod world;

pub use agent::{
    AgentKind, AgentRef, LINK_BUILTINS, Link, LinkId, PATCH_BUILTINS, Patch, PatchId,
    TURTLE_BUILTINS, Turtle, TurtleId, link_slot, normalize_heading, patch_slot, turtle_slot,
};
pub use agentset::AgentSet;
pub use breed::{Breed, BreedId, BreedRegistry, LINKS, TURTLES};
pub use config::{BreedSpec, LinkBreedSpec, ShapeCatalog, ShapeDef, WorldConfig};
pub use context::Context;
pub use error::{WorldError, WorldResult};
pub use rng::{NEAR_DIVISOR, NEAR_SAMPLES, RandomSource};
pub use scheduler::{
    Flow, Model, NullObserver, RunEnd, RunSummary, Scheduler, StepObserver, StepReport,
    Ticker,
};
pub use turtleworks_index::{IndexError, Topology};
pub use value::Value;
pub use vars::{Globals, VarKey, VarScope, VariableTable};
pub use world::{LinkSnapshot, PatchSnapshot, TurtleSnapshot, World, WorldSnapshot};
