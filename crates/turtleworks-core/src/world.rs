//! The world: owner of every agent, the patch grid, globals, breeds and ticks.

use serde::Serialize;
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};
use turtleworks_index::Topology;

use crate::agent::{
    AgentKind, AgentRef, Link, LinkId, PATCH_BUILTINS, Patch, PatchId, Turtle, TurtleId,
    link_slot, normalize_heading, patch_slot, turtle_slot,
};
use crate::agentset::AgentSet;
use crate::breed::{BreedId, BreedRegistry, TURTLES};
use crate::config::{ShapeCatalog, WorldConfig};
use crate::error::{WorldError, WorldResult};
use crate::rng::RandomSource;
use crate::scheduler::Ticker;
use crate::value::Value;
use crate::vars::{Globals, VarKey, VarScope, VariableTable};

/// Number of base colors a new turtle may be given.
const BASE_COLORS: i64 = 14;

/// Random base color: gray, red, orange, ... as `5 + 10 * k`.
fn base_color(k: i64) -> f64 {
    5.0 + 10.0 * k as f64
}

/// How far one can travel from `pos` by `step` per unit before leaving `[low, high)`.
fn axis_reach(pos: f64, step: f64, low: f64, high: f64, wraps: bool) -> f64 {
    if wraps || step == 0.0 {
        f64::INFINITY
    } else if step > 0.0 {
        (high - pos) / step
    } else {
        (low - pos) / step
    }
}

/// Complete simulation state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    topology: Topology,
    shapes: ShapeCatalog,
    rng: RandomSource,
    globals: Globals,
    patch_table: VariableTable,
    breeds: BreedRegistry,
    patches: Vec<Patch>,
    occupants: Vec<Vec<TurtleId>>,
    origin: PatchId,
    turtles: SlotMap<TurtleId, Turtle>,
    turtle_order: BTreeMap<u64, TurtleId>,
    links: SlotMap<LinkId, Link>,
    link_order: BTreeMap<u64, LinkId>,
    link_index: HashMap<(TurtleId, TurtleId, bool), LinkId>,
    next_who: u64,
    next_link: u64,
    ticker: Ticker,
}

impl World {
    /// Instantiate a world with an empty shape catalog.
    pub fn new(config: WorldConfig) -> WorldResult<Self> {
        Self::with_shapes(config, ShapeCatalog::default())
    }

    /// Instantiate a world from a validated configuration and shape catalog.
    pub fn with_shapes(config: WorldConfig, shapes: ShapeCatalog) -> WorldResult<Self> {
        let topology = config.validate()?;
        let globals = Globals::new(&config.globals, &config.interface_globals)?;
        let patch_table = VariableTable::new(
            VarScope::Patch,
            &PATCH_BUILTINS,
            &[patch_slot::PXCOR, patch_slot::PYCOR],
            &config.patches_own,
        )?;
        let mut breeds = BreedRegistry::new(&config.turtles_own, &config.links_own)?;
        for spec in &config.breeds {
            breeds.register_breed(&spec.name, &spec.variables, spec.default_shape.as_deref())?;
        }
        for spec in &config.link_breeds {
            breeds.register_link_breed(&spec.name, &spec.variables, spec.directed)?;
        }

        let count = topology.patch_count();
        let width = patch_table.width();
        let patches = (0..count)
            .map(|idx| {
                let (pxcor, pycor) = topology.coords_of(idx);
                Patch::new(pxcor, pycor, width)
            })
            .collect();
        let origin = topology
            .index_of(0, 0)
            .map(PatchId)
            .ok_or_else(|| WorldError::InvalidConfig("world has no origin patch".into()))?;
        let rng = config.seeded_rng();

        debug!(
            width = topology.width(),
            height = topology.height(),
            wrap_x = topology.wrap_x(),
            wrap_y = topology.wrap_y(),
            seed = rng.current_seed(),
            shapes = shapes.len(),
            "world created"
        );

        Ok(Self {
            config,
            topology,
            shapes,
            rng,
            globals,
            patch_table,
            breeds,
            patches,
            occupants: vec![Vec::new(); count],
            origin,
            turtles: SlotMap::with_key(),
            turtle_order: BTreeMap::new(),
            links: SlotMap::with_key(),
            link_order: BTreeMap::new(),
            link_index: HashMap::new(),
            next_who: 0,
            next_link: 0,
            ticker: Ticker::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    #[must_use]
    pub fn shapes(&self) -> &ShapeCatalog {
        &self.shapes
    }

    #[must_use]
    pub fn breeds(&self) -> &BreedRegistry {
        &self.breeds
    }

    pub fn rng(&mut self) -> &mut RandomSource {
        &mut self.rng
    }

    /// Seed the random source was last reset with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.rng.current_seed()
    }

    /// Restart the random stream.
    pub fn reseed(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    // ----- lifecycle ---------------------------------------------------

    /// Back to the post-construction state, keeping interface globals and breeds.
    pub fn clear_all(&mut self) {
        self.clear_globals();
        self.clear_ticks();
        self.clear_turtles();
        self.clear_patches();
        debug!("world cleared");
    }

    /// Kill every turtle (and with them every link) and restart `who` numbering.
    pub fn clear_turtles(&mut self) {
        self.turtles.clear();
        self.turtle_order.clear();
        for cell in &mut self.occupants {
            cell.clear();
        }
        self.next_who = 0;
        self.clear_links();
    }

    pub fn clear_links(&mut self) {
        self.links.clear();
        self.link_order.clear();
        self.link_index.clear();
        self.next_link = 0;
    }

    /// Reset every patch variable to its default.
    pub fn clear_patches(&mut self) {
        let width = self.patch_table.width();
        for patch in &mut self.patches {
            patch.reset(width);
        }
    }

    /// Zero all non-interface globals.
    pub fn clear_globals(&mut self) {
        self.globals.reset();
    }

    /// Return the tick counter to its unset state.
    pub fn clear_ticks(&mut self) {
        self.ticker.clear();
    }

    pub fn reset_ticks(&mut self) {
        self.ticker.reset();
        debug!("ticks reset");
    }

    pub fn tick(&mut self) -> WorldResult<u64> {
        self.ticker.tick()
    }

    pub fn ticks(&self) -> WorldResult<u64> {
        self.ticker.ticks()
    }

    // ----- globals and schemas -----------------------------------------

    pub fn global<'a>(&self, key: impl Into<VarKey<'a>>) -> WorldResult<&Value> {
        self.globals.get(key.into())
    }

    pub fn set_global<'a>(
        &mut self,
        key: impl Into<VarKey<'a>>,
        value: impl Into<Value>,
    ) -> WorldResult<()> {
        self.globals.set(key.into(), value.into())
    }

    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Size the global table to `count` slots.
    pub fn init_globals(&mut self, count: usize) -> WorldResult<()> {
        self.globals.init(count)
    }

    /// Size the declared turtle variables. Refused once turtles or turtle breeds exist.
    pub fn init_turtles_own(&mut self, count: usize) -> WorldResult<()> {
        if !self.turtles.is_empty() {
            return Err(WorldError::SchemaSealed {
                scope: VarScope::Turtle,
            });
        }
        self.breeds.init_own(AgentKind::Turtle, count)
    }

    /// Size the declared link variables. Refused once links or link breeds exist.
    pub fn init_links_own(&mut self, count: usize) -> WorldResult<()> {
        if !self.links.is_empty() {
            return Err(WorldError::SchemaSealed {
                scope: VarScope::Link,
            });
        }
        self.breeds.init_own(AgentKind::Link, count)
    }

    /// Size the declared patch variables, keeping current values. Refused once
    /// turtles or links exist or ticks have started.
    pub fn init_patches_own(&mut self, count: usize) -> WorldResult<()> {
        if !self.turtles.is_empty() || !self.links.is_empty() || self.ticker.is_started() {
            return Err(WorldError::SchemaSealed {
                scope: VarScope::Patch,
            });
        }
        self.patch_table.init(count)?;
        let width = self.patch_table.width();
        for patch in &mut self.patches {
            patch.vars.resize(width, Value::zero());
        }
        Ok(())
    }

    /// Register a turtle breed; its slot layout is fixed from here on.
    pub fn register_breed(
        &mut self,
        name: &str,
        variables: &[String],
        default_shape: Option<&str>,
    ) -> WorldResult<BreedId> {
        self.breeds.register_breed(name, variables, default_shape)
    }

    pub fn register_link_breed(
        &mut self,
        name: &str,
        variables: &[String],
        directed: bool,
    ) -> WorldResult<BreedId> {
        self.breeds.register_link_breed(name, variables, directed)
    }

    pub fn set_default_shape(&mut self, breed: &str, shape: &str) -> WorldResult<()> {
        self.breeds.set_default_shape(breed, shape)
    }

    // ----- creation ----------------------------------------------------

    /// Create `count` plain turtles at the origin.
    pub fn create_turtles(&mut self, count: usize) -> WorldResult<AgentSet> {
        self.spawn(TURTLES, count, None)
    }

    /// Create `count` turtles of `breed`, at `parent`'s center or the origin.
    ///
    /// Each turtle draws a random base color, then a random whole-degree heading.
    pub fn spawn(
        &mut self,
        breed: &str,
        count: usize,
        parent: Option<PatchId>,
    ) -> WorldResult<AgentSet> {
        let breed_id = self.breeds.lookup_kind(breed, AgentKind::Turtle)?;
        let patch = parent.unwrap_or(self.origin);
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let color = base_color(self.rng.uniform_int(BASE_COLORS));
            let heading = self.rng.uniform_int(360) as f64;
            members.push(AgentRef::Turtle(self.insert_turtle(breed_id, patch, color, heading)));
        }
        self.breed_members(breed_id, members)
    }

    /// Create `count` turtles of `breed` at the origin with evenly spaced headings
    /// and base colors taken in order.
    pub fn create_ordered_turtles(&mut self, breed: &str, count: usize) -> WorldResult<AgentSet> {
        let breed_id = self.breeds.lookup_kind(breed, AgentKind::Turtle)?;
        let mut members = Vec::with_capacity(count);
        for idx in 0..count {
            let heading = 360.0 * idx as f64 / count as f64;
            let color = base_color(idx as i64 % BASE_COLORS);
            let origin = self.origin;
            members.push(AgentRef::Turtle(self.insert_turtle(breed_id, origin, color, heading)));
        }
        self.breed_members(breed_id, members)
    }

    /// Copy `parent` `count` times: same breed, position, heading and variables, fresh `who`.
    pub fn hatch(&mut self, parent: TurtleId, count: usize) -> WorldResult<AgentSet> {
        let template = self
            .turtles
            .get(parent)
            .cloned()
            .ok_or(WorldError::NobodyReference)?;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let mut child = template.clone();
            child.who = self.next_who;
            self.next_who += 1;
            let id = self.turtles.insert(child);
            self.turtle_order.insert(self.next_who - 1, id);
            self.occupants[template.patch.0].push(id);
            members.push(AgentRef::Turtle(id));
        }
        self.breed_members(template.breed, members)
    }

    fn insert_turtle(
        &mut self,
        breed: BreedId,
        patch: PatchId,
        color: f64,
        heading: f64,
    ) -> TurtleId {
        let record = self.breeds.get(breed);
        let (pxcor, pycor) = self.patches[patch.0].coords();
        let who = self.next_who;
        let turtle = Turtle::new(
            who,
            breed,
            record.schema().width(),
            record.default_shape(),
            color,
            heading,
            (f64::from(pxcor), f64::from(pycor)),
            patch,
        );
        self.next_who += 1;
        let id = self.turtles.insert(turtle);
        self.turtle_order.insert(who, id);
        self.occupants[patch.0].push(id);
        trace!(who, breed = record.name(), "turtle created");
        id
    }

    fn breed_members(&self, breed: BreedId, members: Vec<AgentRef>) -> WorldResult<AgentSet> {
        let record = self.breeds.get(breed);
        let set = AgentSet::new(record.kind(), members)?;
        Ok(if breed == BreedRegistry::TURTLES || breed == BreedRegistry::LINKS {
            set
        } else {
            set.with_breed(record.name())
        })
    }

    /// Create an unbreeded undirected link.
    pub fn create_link_with(&mut self, a: TurtleId, b: TurtleId) -> WorldResult<LinkId> {
        self.insert_link(a, b, BreedRegistry::LINKS, false)
    }

    /// Create an unbreeded link directed from `from` to `to`.
    pub fn create_link_to(&mut self, from: TurtleId, to: TurtleId) -> WorldResult<LinkId> {
        self.insert_link(from, to, BreedRegistry::LINKS, true)
    }

    /// Create a link of `breed`; its directedness comes from the breed.
    pub fn create_link(&mut self, from: TurtleId, to: TurtleId, breed: &str) -> WorldResult<LinkId> {
        let breed_id = self.breeds.lookup_kind(breed, AgentKind::Link)?;
        let directed = self.breeds.get(breed_id).is_directed();
        self.insert_link(from, to, breed_id, directed)
    }

    fn insert_link(
        &mut self,
        from: TurtleId,
        to: TurtleId,
        breed: BreedId,
        directed: bool,
    ) -> WorldResult<LinkId> {
        let from_who = self.who_of(from)?;
        let to_who = self.who_of(to)?;
        if from == to {
            return Err(WorldError::SelfLink(from_who));
        }
        let (end1, end2, who1, who2) = if directed || from_who < to_who {
            (from, to, from_who, to_who)
        } else {
            (to, from, to_who, from_who)
        };
        let key = (end1, end2, directed);
        if self.link_index.contains_key(&key) {
            return Err(WorldError::DuplicateLink {
                end1: who1,
                end2: who2,
                directed,
            });
        }
        let width = self.breeds.get(breed).schema().width();
        let link_no = self.next_link;
        self.next_link += 1;
        let id = self
            .links
            .insert(Link::new(link_no, (end1, end2), directed, breed, width));
        self.link_order.insert(link_no, id);
        self.link_index.insert(key, id);
        trace!(end1 = who1, end2 = who2, directed, "link created");
        Ok(id)
    }

    // ----- death -------------------------------------------------------

    /// Remove an agent. Killing a dead agent is a no-op; patches cannot die.
    pub fn kill(&mut self, agent: AgentRef) -> WorldResult<()> {
        match agent {
            AgentRef::Turtle(id) => {
                self.kill_turtle(id);
                Ok(())
            }
            AgentRef::Link(id) => {
                self.kill_link(id);
                Ok(())
            }
            AgentRef::Patch(_) => Err(WorldError::KindMismatch {
                operation: "die",
                expected: AgentKind::Turtle,
                found: AgentKind::Patch,
            }),
        }
    }

    fn kill_turtle(&mut self, id: TurtleId) {
        let Some(turtle) = self.turtles.remove(id) else {
            return;
        };
        self.turtle_order.remove(&turtle.who);
        self.occupants[turtle.patch.0].retain(|other| *other != id);
        let attached: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, link)| link.end1 == id || link.end2 == id)
            .map(|(link_id, _)| link_id)
            .collect();
        for link in attached {
            self.kill_link(link);
        }
        trace!(who = turtle.who, "turtle died");
    }

    fn kill_link(&mut self, id: LinkId) {
        let Some(link) = self.links.remove(id) else {
            return;
        };
        self.link_order.remove(&link.id);
        self.link_index.remove(&(link.end1, link.end2, link.directed));
        trace!(link = link.id, "link died");
    }

    #[must_use]
    pub fn is_alive(&self, agent: AgentRef) -> bool {
        match agent {
            AgentRef::Turtle(id) => self.turtles.contains_key(id),
            AgentRef::Patch(id) => id.0 < self.patches.len(),
            AgentRef::Link(id) => self.links.contains_key(id),
        }
    }

    // ----- sets and lookups --------------------------------------------

    /// Every live turtle in `who` order.
    #[must_use]
    pub fn turtles(&self) -> AgentSet {
        AgentSet::from_members(
            AgentKind::Turtle,
            self.turtle_order.values().copied().map(AgentRef::Turtle).collect(),
        )
    }

    /// Every patch, top row first, left to right.
    #[must_use]
    pub fn patches(&self) -> AgentSet {
        AgentSet::from_members(
            AgentKind::Patch,
            (0..self.patches.len()).map(|idx| AgentRef::Patch(PatchId(idx))).collect(),
        )
    }

    /// Every live link in creation order.
    #[must_use]
    pub fn links(&self) -> AgentSet {
        AgentSet::from_members(
            AgentKind::Link,
            self.link_order.values().copied().map(AgentRef::Link).collect(),
        )
    }

    /// Live members of a turtle or link breed, in creation order.
    pub fn breed_set(&self, name: &str) -> WorldResult<AgentSet> {
        let breed = self.breeds.lookup(name)?;
        if breed == BreedRegistry::TURTLES {
            return Ok(self.turtles());
        }
        if breed == BreedRegistry::LINKS {
            return Ok(self.links());
        }
        let record = self.breeds.get(breed);
        let members = match record.kind() {
            AgentKind::Link => self
                .link_order
                .values()
                .filter(|id| self.links[**id].breed == breed)
                .map(|id| AgentRef::Link(*id))
                .collect(),
            _ => self
                .turtle_order
                .values()
                .filter(|id| self.turtles[**id].breed == breed)
                .map(|id| AgentRef::Turtle(*id))
                .collect(),
        };
        Ok(AgentSet::from_members(record.kind(), members).with_breed(record.name()))
    }

    /// Live turtle with the given `who` number.
    #[must_use]
    pub fn turtle_by_who(&self, who: u64) -> Option<TurtleId> {
        self.turtle_order.get(&who).copied()
    }

    #[must_use]
    pub fn turtle(&self, id: TurtleId) -> Option<&Turtle> {
        self.turtles.get(id)
    }

    #[must_use]
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    #[must_use]
    pub fn patch(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(id.0)
    }

    /// Patch at integer coordinates, if inside the world.
    #[must_use]
    pub fn patch_at_coords(&self, pxcor: i32, pycor: i32) -> Option<PatchId> {
        self.topology.index_of(pxcor, pycor).map(PatchId)
    }

    /// Patch containing a continuous point, after wrapping.
    #[must_use]
    pub fn patch_containing(&self, x: f64, y: f64) -> Option<PatchId> {
        self.topology.patch_containing(x, y).map(PatchId)
    }

    /// Link joining two turtles, in either direction for undirected links.
    #[must_use]
    pub fn link_between(&self, a: TurtleId, b: TurtleId) -> Option<LinkId> {
        [(a, b, true), (a, b, false), (b, a, false)]
            .iter()
            .find_map(|key| self.link_index.get(key).copied())
    }

    #[must_use]
    pub fn count_living(&self) -> usize {
        self.turtles.len()
    }

    #[must_use]
    pub fn count_links(&self) -> usize {
        self.links.len()
    }

    /// Links attached to `turtle`, in creation order.
    pub fn my_links(&self, turtle: TurtleId) -> WorldResult<AgentSet> {
        self.who_of(turtle)?;
        let members = self
            .link_order
            .values()
            .filter(|id| {
                let link = &self.links[**id];
                link.end1 == turtle || link.end2 == turtle
            })
            .map(|id| AgentRef::Link(*id))
            .collect();
        Ok(AgentSet::from_members(AgentKind::Link, members))
    }

    /// Turtles at the other end of every link attached to `turtle`, in `who` order.
    pub fn link_neighbors(&self, turtle: TurtleId) -> WorldResult<AgentSet> {
        self.who_of(turtle)?;
        let mut others: Vec<(u64, TurtleId)> = self
            .links
            .values()
            .filter_map(|link| link.other_end(turtle))
            .map(|other| (self.turtles[other].who, other))
            .collect();
        others.sort_unstable_by_key(|(who, _)| *who);
        others.dedup();
        Ok(AgentSet::from_members(
            AgentKind::Turtle,
            others.into_iter().map(|(_, id)| AgentRef::Turtle(id)).collect(),
        ))
    }

    // ----- spatial -----------------------------------------------------

    /// Patch an agent stands on: a turtle's containing patch or a patch itself.
    pub fn patch_of(&self, agent: AgentRef) -> WorldResult<PatchId> {
        match agent {
            AgentRef::Turtle(id) => self
                .turtles
                .get(id)
                .map(|turtle| turtle.patch)
                .ok_or(WorldError::NobodyReference),
            AgentRef::Patch(id) if id.0 < self.patches.len() => Ok(id),
            AgentRef::Patch(_) => Err(WorldError::NobodyReference),
            AgentRef::Link(_) => Err(WorldError::KindMismatch {
                operation: "patch-here",
                expected: AgentKind::Turtle,
                found: AgentKind::Link,
            }),
        }
    }

    /// Continuous position of a turtle, or the center of a patch.
    pub fn position_of(&self, agent: AgentRef) -> WorldResult<(f64, f64)> {
        match agent {
            AgentRef::Turtle(id) => self
                .turtles
                .get(id)
                .map(Turtle::position)
                .ok_or(WorldError::NobodyReference),
            other => {
                let (pxcor, pycor) = self.patches[self.patch_of(other)?.0].coords();
                Ok((f64::from(pxcor), f64::from(pycor)))
            }
        }
    }

    /// Patch offset by `(dx, dy)` from the agent's containing patch; `None` past a bounded edge.
    pub fn patch_at(&self, agent: AgentRef, dx: f64, dy: f64) -> WorldResult<Option<PatchId>> {
        let (pxcor, pycor) = self.patches[self.patch_of(agent)?.0].coords();
        Ok(self.topology.offset(pxcor, pycor, dx, dy).map(PatchId))
    }

    /// Distinct patches at each offset from the agent's patch, skipping off-world offsets.
    pub fn patches_at(&self, agent: AgentRef, offsets: &[(f64, f64)]) -> WorldResult<AgentSet> {
        let mut members: Vec<AgentRef> = Vec::with_capacity(offsets.len());
        for &(dx, dy) in offsets {
            if let Some(patch) = self.patch_at(agent, dx, dy)? {
                let member = AgentRef::Patch(patch);
                if !members.contains(&member) {
                    members.push(member);
                }
            }
        }
        Ok(AgentSet::from_members(AgentKind::Patch, members))
    }

    /// Turtles standing on `patch`, in `who` order.
    #[must_use]
    pub fn turtles_on(&self, patch: PatchId) -> AgentSet {
        let mut here: Vec<(u64, TurtleId)> = self
            .occupants
            .get(patch.0)
            .map(|cell| cell.iter().map(|id| (self.turtles[*id].who, *id)).collect())
            .unwrap_or_default();
        here.sort_unstable_by_key(|(who, _)| *who);
        AgentSet::from_members(
            AgentKind::Turtle,
            here.into_iter().map(|(_, id)| AgentRef::Turtle(id)).collect(),
        )
    }

    /// Turtles on the patch offset by `(dx, dy)` from the agent; empty past a bounded edge.
    pub fn turtles_at(&self, agent: AgentRef, dx: f64, dy: f64) -> WorldResult<AgentSet> {
        Ok(match self.patch_at(agent, dx, dy)? {
            Some(patch) => self.turtles_on(patch),
            None => AgentSet::empty(AgentKind::Turtle),
        })
    }

    /// The up to eight patches around `patch`.
    #[must_use]
    pub fn neighbors(&self, patch: PatchId) -> AgentSet {
        AgentSet::from_members(
            AgentKind::Patch,
            self.topology
                .neighbors(patch.0)
                .into_iter()
                .map(|idx| AgentRef::Patch(PatchId(idx)))
                .collect(),
        )
    }

    /// The up to four patches sharing an edge with `patch`.
    #[must_use]
    pub fn neighbors4(&self, patch: PatchId) -> AgentSet {
        AgentSet::from_members(
            AgentKind::Patch,
            self.topology
                .neighbors4(patch.0)
                .into_iter()
                .map(|idx| AgentRef::Patch(PatchId(idx)))
                .collect(),
        )
    }

    /// Shortest-path distance between two agents.
    pub fn distance(&self, a: AgentRef, b: AgentRef) -> WorldResult<f64> {
        let (x1, y1) = self.position_of(a)?;
        let (x2, y2) = self.position_of(b)?;
        Ok(self.topology.distance(x1, y1, x2, y2))
    }

    /// Place a turtle at `(x, y)`, wrapping per axis. A bounded axis rejects outside points.
    pub fn move_turtle_to(&mut self, id: TurtleId, x: f64, y: f64) -> WorldResult<()> {
        let (Some(wx), Some(wy)) = (self.topology.wrap_xcor(x), self.topology.wrap_ycor(y)) else {
            return Err(WorldError::OffWorld { x, y });
        };
        let patch = self
            .topology
            .patch_containing(wx, wy)
            .map(PatchId)
            .ok_or(WorldError::OffWorld { x, y })?;
        let turtle = self.turtles.get_mut(id).ok_or(WorldError::NobodyReference)?;
        turtle.xcor = wx;
        turtle.ycor = wy;
        let previous = std::mem::replace(&mut turtle.patch, patch);
        if previous != patch {
            self.occupants[previous.0].retain(|other| *other != id);
            self.occupants[patch.0].push(id);
        }
        Ok(())
    }

    /// Move a turtle along its heading as if in unit steps. A bounded edge stops it at the
    /// last whole step that stays inside; returns the distance actually covered.
    pub fn forward(&mut self, id: TurtleId, distance: f64) -> WorldResult<f64> {
        if !distance.is_finite() {
            return Err(WorldError::NonFiniteDistance(distance));
        }
        let turtle = self.turtles.get(id).ok_or(WorldError::NobodyReference)?;
        let (x, y) = turtle.position();
        let (sin, cos) = turtle.heading.to_radians().sin_cos();
        let sign = distance.signum();
        let (dx, dy) = (sign * sin, sign * cos);
        let inside = |t: f64| {
            self.topology.wrap_xcor(x + t * dx).is_some()
                && self.topology.wrap_ycor(y + t * dy).is_some()
        };

        let total = distance.abs();
        let covered = if inside(total) {
            total
        } else {
            let topo = &self.topology;
            let limit = axis_reach(x, dx, topo.min_xcor(), topo.max_xcor(), topo.wrap_x())
                .min(axis_reach(y, dy, topo.min_ycor(), topo.max_ycor(), topo.wrap_y()));
            let mut steps = limit.min(total).floor();
            while steps > 0.0 && !inside(steps) {
                steps -= 1.0;
            }
            steps.max(0.0)
        };
        if covered > 0.0 {
            self.move_turtle_to(id, x + covered * dx, y + covered * dy)?;
        }
        Ok(sign * covered)
    }

    /// Turn a turtle clockwise by `degrees`.
    pub fn rotate(&mut self, id: TurtleId, degrees: f64) -> WorldResult<()> {
        let turtle = self.turtles.get_mut(id).ok_or(WorldError::NobodyReference)?;
        turtle.heading = normalize_heading(turtle.heading + degrees);
        Ok(())
    }

    /// Uniform x coordinate inside the world.
    pub fn random_xcor(&mut self) -> f64 {
        let min = self.topology.min_xcor();
        min + self.rng.uniform_float(f64::from(self.topology.width()))
    }

    /// Uniform y coordinate inside the world.
    pub fn random_ycor(&mut self) -> f64 {
        let min = self.topology.min_ycor();
        min + self.rng.uniform_float(f64::from(self.topology.height()))
    }

    /// Uniformly chosen patch.
    pub fn random_patch(&mut self) -> PatchId {
        PatchId(self.rng.index(self.patches.len()))
    }

    // ----- variables ---------------------------------------------------

    fn who_of(&self, id: TurtleId) -> WorldResult<u64> {
        self.turtles
            .get(id)
            .map(|turtle| turtle.who)
            .ok_or(WorldError::NobodyReference)
    }

    /// Slot layout used by `agent`.
    pub fn schema_of(&self, agent: AgentRef) -> WorldResult<&VariableTable> {
        match agent {
            AgentRef::Turtle(id) => {
                let turtle = self.turtles.get(id).ok_or(WorldError::NobodyReference)?;
                Ok(self.breeds.get(turtle.breed).schema())
            }
            AgentRef::Link(id) => {
                let link = self.links.get(id).ok_or(WorldError::NobodyReference)?;
                Ok(self.breeds.get(link.breed).schema())
            }
            AgentRef::Patch(_) => Ok(&self.patch_table),
        }
    }

    /// Read an agent variable. Dead agents fail with `NobodyReference`.
    pub fn get<'a>(&self, agent: AgentRef, key: impl Into<VarKey<'a>>) -> WorldResult<Value> {
        let slot = self.schema_of(agent)?.resolve(key.into())?;
        match agent {
            AgentRef::Turtle(id) => {
                let turtle = &self.turtles[id];
                Ok(match slot {
                    turtle_slot::WHO => Value::Number(turtle.who as f64),
                    turtle_slot::HEADING => Value::Number(turtle.heading),
                    turtle_slot::XCOR => Value::Number(turtle.xcor),
                    turtle_slot::YCOR => Value::Number(turtle.ycor),
                    turtle_slot::BREED => Value::from(self.breeds.get(turtle.breed).name()),
                    _ => turtle.vars[slot].clone(),
                })
            }
            AgentRef::Patch(id) => self
                .patches
                .get(id.0)
                .map(|patch| patch.vars[slot].clone())
                .ok_or(WorldError::NobodyReference),
            AgentRef::Link(id) => {
                let link = &self.links[id];
                Ok(match slot {
                    link_slot::END1 => Value::from(link.end1),
                    link_slot::END2 => Value::from(link.end2),
                    link_slot::BREED => Value::from(self.breeds.get(link.breed).name()),
                    _ => link.vars[slot].clone(),
                })
            }
        }
    }

    /// Write an agent variable. Position and heading writes move the turtle.
    pub fn set<'a>(
        &mut self,
        agent: AgentRef,
        key: impl Into<VarKey<'a>>,
        value: impl Into<Value>,
    ) -> WorldResult<()> {
        let slot = self.schema_of(agent)?.resolve_writable(key.into())?;
        let value = value.into();
        match agent {
            AgentRef::Turtle(id) => match slot {
                turtle_slot::HEADING => {
                    let heading = value.as_number()?;
                    self.turtles[id].heading = normalize_heading(heading);
                    Ok(())
                }
                turtle_slot::XCOR => {
                    let x = value.as_number()?;
                    let y = self.turtles[id].ycor;
                    self.move_turtle_to(id, x, y)
                }
                turtle_slot::YCOR => {
                    let y = value.as_number()?;
                    let x = self.turtles[id].xcor;
                    self.move_turtle_to(id, x, y)
                }
                _ => {
                    self.turtles[id].vars[slot] = value;
                    Ok(())
                }
            },
            AgentRef::Patch(id) => {
                let patch = self
                    .patches
                    .get_mut(id.0)
                    .ok_or(WorldError::NobodyReference)?;
                patch.vars[slot] = value;
                Ok(())
            }
            AgentRef::Link(id) => {
                self.links[id].vars[slot] = value;
                Ok(())
            }
        }
    }

    /// Numeric convenience over [`World::get`].
    pub fn get_number<'a>(&self, agent: AgentRef, key: impl Into<VarKey<'a>>) -> WorldResult<f64> {
        self.get(agent, key)?.as_number()
    }

    // ----- snapshot ----------------------------------------------------

    /// Capture the observable state for comparison or serialization.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let turtles = self
            .turtle_order
            .values()
            .map(|id| {
                let turtle = &self.turtles[*id];
                TurtleSnapshot {
                    who: turtle.who,
                    breed: self.breeds.get(turtle.breed).name().to_string(),
                    xcor: turtle.xcor,
                    ycor: turtle.ycor,
                    heading: turtle.heading,
                    vars: turtle.vars.clone(),
                }
            })
            .collect();
        let patches = self
            .patches
            .iter()
            .map(|patch| PatchSnapshot {
                pxcor: patch.pxcor,
                pycor: patch.pycor,
                vars: patch.vars.clone(),
            })
            .collect();
        let links = self
            .link_order
            .values()
            .map(|id| {
                let link = &self.links[*id];
                LinkSnapshot {
                    id: link.id,
                    end1: self.turtles[link.end1].who,
                    end2: self.turtles[link.end2].who,
                    directed: link.directed,
                    breed: self.breeds.get(link.breed).name().to_string(),
                    vars: link.vars.clone(),
                }
            })
            .collect();
        WorldSnapshot {
            ticks: self.ticker.ticks().ok(),
            globals: self.globals.values().to_vec(),
            turtles,
            patches,
            links,
        }
    }
}

/// Serializable copy of a turtle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurtleSnapshot {
    pub who: u64,
    pub breed: String,
    pub xcor: f64,
    pub ycor: f64,
    pub heading: f64,
    pub vars: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchSnapshot {
    pub pxcor: i32,
    pub pycor: i32,
    pub vars: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSnapshot {
    pub id: u64,
    pub end1: u64,
    pub end2: u64,
    pub directed: bool,
    pub breed: String,
    pub vars: Vec<Value>,
}

/// Tick-by-tick state of a world, used for determinism checks and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub ticks: Option<u64>,
    pub globals: Vec<Value>,
    pub turtles: Vec<TurtleSnapshot>,
    pub patches: Vec<PatchSnapshot>,
    pub links: Vec<LinkSnapshot>,
}
