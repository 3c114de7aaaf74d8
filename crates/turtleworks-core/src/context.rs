//! Call context: the `self`/`myself` frame stack and self-relative primitives.

use std::ops::{Deref, DerefMut};

use crate::agent::{AgentKind, AgentRef, LinkId, PatchId, TurtleId};
use crate::agentset::AgentSet;
use crate::error::{WorldError, WorldResult};
use crate::value::Value;
use crate::vars::VarKey;
use crate::world::World;

/// Mutable access to a world plus the stack of agents currently executing.
///
/// The top frame is `self`, the one below it `myself`. An empty stack is the
/// observer. Frames are pushed and popped only by the collective operations,
/// so the stack is strictly nested.
#[derive(Debug)]
pub struct Context<'w> {
    world: &'w mut World,
    frames: Vec<AgentRef>,
}

impl<'w> Context<'w> {
    /// Observer context over `world`.
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// Push `agent` as `self`, run `f`, and pop the frame whatever `f` returned.
    pub(crate) fn visit<T, F>(&mut self, agent: AgentRef, f: &mut F) -> WorldResult<T>
    where
        F: FnMut(&mut Self) -> WorldResult<T>,
    {
        self.frames.push(agent);
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Number of agent frames; zero in the observer.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The agent currently executing.
    pub fn self_agent(&self) -> WorldResult<AgentRef> {
        self.frames
            .last()
            .copied()
            .ok_or(WorldError::NoAgentContext("self"))
    }

    /// The agent that asked the current one.
    pub fn myself(&self) -> WorldResult<AgentRef> {
        self.frames
            .len()
            .checked_sub(2)
            .map(|idx| self.frames[idx])
            .ok_or(WorldError::NoAgentContext("myself"))
    }

    fn self_turtle(&self, operation: &'static str) -> WorldResult<TurtleId> {
        let agent = self.self_agent()?;
        agent.as_turtle().ok_or(WorldError::KindMismatch {
            operation,
            expected: AgentKind::Turtle,
            found: agent.kind(),
        })
    }

    fn self_patch(&self, operation: &'static str) -> WorldResult<PatchId> {
        let agent = self.self_agent()?;
        agent.as_patch().ok_or(WorldError::KindMismatch {
            operation,
            expected: AgentKind::Patch,
            found: agent.kind(),
        })
    }

    // ----- variables -----------------------------------------------------

    /// Read a variable of `self`. Turtles fall back to the variables of the
    /// patch they stand on.
    pub fn get<'k>(&self, key: impl Into<VarKey<'k>>) -> WorldResult<Value> {
        let agent = self.self_agent()?;
        let key = key.into();
        match self.world.get(agent, key) {
            Err(own @ WorldError::UnknownVariable { .. })
                if matches!((agent, key), (AgentRef::Turtle(_), VarKey::Name(_))) =>
            {
                match self.patch_get(key) {
                    Err(WorldError::UnknownVariable { .. }) => Err(own),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Write a variable of `self`, with the same patch fallback as [`Context::get`].
    pub fn set<'k>(&mut self, key: impl Into<VarKey<'k>>, value: impl Into<Value>) -> WorldResult<()> {
        let agent = self.self_agent()?;
        let key = key.into();
        let value = value.into();
        let resolved = self.world.schema_of(agent)?.resolve(key);
        if let Err(own) = resolved {
            if matches!((agent, key), (AgentRef::Turtle(_), VarKey::Name(_))) {
                return match self.patch_set(key, value) {
                    Err(WorldError::UnknownVariable { .. }) => Err(own),
                    other => other,
                };
            }
        }
        self.world.set(agent, key, value)
    }

    /// Numeric read of a variable of `self`.
    pub fn get_f64<'k>(&self, key: impl Into<VarKey<'k>>) -> WorldResult<f64> {
        self.get(key)?.as_number()
    }

    /// Read a variable of the patch under `self`.
    pub fn patch_get<'k>(&self, key: impl Into<VarKey<'k>>) -> WorldResult<Value> {
        let patch = self.patch_here()?;
        self.world.get(patch.into(), key)
    }

    /// Write a variable of the patch under `self`.
    pub fn patch_set<'k>(&mut self, key: impl Into<VarKey<'k>>, value: impl Into<Value>) -> WorldResult<()> {
        let patch = self.patch_here()?;
        self.world.set(patch.into(), key, value)
    }

    // ----- life and death ------------------------------------------------

    /// Kill `self`. The action keeps running; later reads of `self` fail
    /// with `NobodyReference`.
    pub fn die(&mut self) -> WorldResult<()> {
        let agent = self.self_agent()?;
        self.world.kill(agent)
    }

    /// Create turtles of `breed` on the patch `self` is.
    pub fn sprout(&mut self, breed: &str, count: usize) -> WorldResult<AgentSet> {
        let patch = self.self_patch("sprout")?;
        self.world.spawn(breed, count, Some(patch))
    }

    /// Copies of the turtle `self`.
    pub fn hatch(&mut self, count: usize) -> WorldResult<AgentSet> {
        let turtle = self.self_turtle("hatch")?;
        self.world.hatch(turtle, count)
    }

    /// `set` without `self`.
    pub fn other(&self, set: &AgentSet) -> WorldResult<AgentSet> {
        Ok(set.without(self.self_agent()?))
    }

    // ----- movement ------------------------------------------------------

    /// Move forward along the heading; returns the distance covered.
    pub fn forward(&mut self, distance: f64) -> WorldResult<f64> {
        let turtle = self.self_turtle("forward")?;
        self.world.forward(turtle, distance)
    }

    pub fn back(&mut self, distance: f64) -> WorldResult<f64> {
        self.forward(-distance)
    }

    /// Turn clockwise.
    pub fn right(&mut self, degrees: f64) -> WorldResult<()> {
        let turtle = self.self_turtle("right")?;
        self.world.rotate(turtle, degrees)
    }

    /// Turn counter-clockwise.
    pub fn left(&mut self, degrees: f64) -> WorldResult<()> {
        self.right(-degrees)
    }

    pub fn set_heading(&mut self, heading: f64) -> WorldResult<()> {
        let turtle = self.self_turtle("set heading")?;
        self.world.set(turtle.into(), crate::agent::turtle_slot::HEADING, heading)
    }

    /// Place `self` at `(x, y)`. Bounded edges reject outside points with `OffWorld`.
    pub fn set_xy(&mut self, x: f64, y: f64) -> WorldResult<()> {
        let turtle = self.self_turtle("setxy")?;
        self.world.move_turtle_to(turtle, x, y)
    }

    /// Jump onto another turtle's position or a patch center.
    pub fn move_to(&mut self, target: AgentRef) -> WorldResult<()> {
        let turtle = self.self_turtle("move-to")?;
        let (x, y) = self.world.position_of(target)?;
        self.world.move_turtle_to(turtle, x, y)
    }

    /// Turn to face `target`. Facing one's own position leaves the heading alone.
    pub fn face(&mut self, target: AgentRef) -> WorldResult<()> {
        let (x, y) = self.world.position_of(target)?;
        match self.towards_xy(x, y) {
            Ok(heading) => self.set_heading(heading),
            Err(WorldError::UndefinedHeading) => Ok(()),
            Err(err) => Err(err),
        }
    }

    // ----- spatial queries -----------------------------------------------

    /// Patch under `self` (a patch is its own patch-here).
    pub fn patch_here(&self) -> WorldResult<PatchId> {
        self.world.patch_of(self.self_agent()?)
    }

    /// Patch `distance` ahead along the heading, or `None` past a bounded edge.
    pub fn patch_ahead(&self, distance: f64) -> WorldResult<Option<PatchId>> {
        let turtle = self.self_turtle("patch-ahead")?;
        let record = self.world.turtle(turtle).ok_or(WorldError::NobodyReference)?;
        let (x, y) = record.position();
        let (sin, cos) = record.heading().to_radians().sin_cos();
        Ok(self.world.patch_containing(x + distance * sin, y + distance * cos))
    }

    /// Patch offset by `(dx, dy)` from the patch under `self`.
    pub fn patch_at(&self, dx: f64, dy: f64) -> WorldResult<Option<PatchId>> {
        self.world.patch_at(self.self_agent()?, dx, dy)
    }

    /// Turtles on the patch offset by `(dx, dy)` from `self`.
    pub fn turtles_at(&self, dx: f64, dy: f64) -> WorldResult<AgentSet> {
        self.world.turtles_at(self.self_agent()?, dx, dy)
    }

    /// Turtles on the patch under `self`, `self` included.
    pub fn turtles_here(&self) -> WorldResult<AgentSet> {
        Ok(self.world.turtles_on(self.patch_here()?))
    }

    /// The up to eight patches around the patch under `self`.
    pub fn neighbors(&self) -> WorldResult<AgentSet> {
        Ok(self.world.neighbors(self.patch_here()?))
    }

    /// The up to four edge-sharing patches around the patch under `self`.
    pub fn neighbors4(&self) -> WorldResult<AgentSet> {
        Ok(self.world.neighbors4(self.patch_here()?))
    }

    /// Heading from `self` to `(x, y)` along the shortest path.
    pub fn towards_xy(&self, x: f64, y: f64) -> WorldResult<f64> {
        let (sx, sy) = self.world.position_of(self.self_agent()?)?;
        self.world
            .topology()
            .towards(sx, sy, x, y)
            .ok_or(WorldError::UndefinedHeading)
    }

    pub fn towards(&self, target: AgentRef) -> WorldResult<f64> {
        let (x, y) = self.world.position_of(target)?;
        self.towards_xy(x, y)
    }

    /// Distance from `self` to `(x, y)` along the shortest path.
    pub fn distance_xy(&self, x: f64, y: f64) -> WorldResult<f64> {
        let (sx, sy) = self.world.position_of(self.self_agent()?)?;
        Ok(self.world.topology().distance(sx, sy, x, y))
    }

    pub fn distance(&self, target: AgentRef) -> WorldResult<f64> {
        self.world.distance(self.self_agent()?, target)
    }

    // ----- links ---------------------------------------------------------

    /// Undirected link between `self` and `other`.
    pub fn create_link_with(&mut self, other: TurtleId) -> WorldResult<LinkId> {
        let turtle = self.self_turtle("create-link-with")?;
        self.world.create_link_with(turtle, other)
    }

    /// Directed link from `self` to `other`.
    pub fn create_link_to(&mut self, other: TurtleId) -> WorldResult<LinkId> {
        let turtle = self.self_turtle("create-link-to")?;
        self.world.create_link_to(turtle, other)
    }

    /// Directed link from `other` to `self`.
    pub fn create_link_from(&mut self, other: TurtleId) -> WorldResult<LinkId> {
        let turtle = self.self_turtle("create-link-from")?;
        self.world.create_link_to(other, turtle)
    }

    pub fn my_links(&self) -> WorldResult<AgentSet> {
        self.world.my_links(self.self_turtle("my-links")?)
    }

    pub fn link_neighbors(&self) -> WorldResult<AgentSet> {
        self.world.link_neighbors(self.self_turtle("link-neighbors")?)
    }

    // ----- randomness ----------------------------------------------------

    pub fn random_int(&mut self, n: i64) -> i64 {
        self.world.rng().uniform_int(n)
    }

    pub fn random_float(&mut self, max: f64) -> f64 {
        self.world.rng().uniform_float(max)
    }

    /// Bell-shaped draw around `center`, see [`crate::RandomSource::near`].
    pub fn random_near(&mut self, center: f64) -> f64 {
        self.world.rng().near(center)
    }
}

impl Deref for Context<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for Context<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}
