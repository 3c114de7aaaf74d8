//! Agent sets and the collective operations that run over them.
//!
//! A set holds identities only. Every traversal works on a copy of the member
//! list taken at entry and re-checks liveness before each visit, so agents
//! created during a traversal are not visited and agents that died are skipped.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentKind, AgentRef};
use crate::context::Context;
use crate::error::{WorldError, WorldResult};
use crate::scheduler::Flow;
use crate::value::Value;
use crate::world::World;

/// Ordered collection of agents of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSet {
    kind: AgentKind,
    breed: Option<String>,
    members: Vec<AgentRef>,
}

impl AgentSet {
    #[must_use]
    pub const fn empty(kind: AgentKind) -> Self {
        Self {
            kind,
            breed: None,
            members: Vec::new(),
        }
    }

    /// Build a set, rejecting members of another kind.
    pub fn new(kind: AgentKind, members: Vec<AgentRef>) -> WorldResult<Self> {
        if let Some(stray) = members.iter().find(|member| member.kind() != kind) {
            return Err(WorldError::KindMismatch {
                operation: "agentset",
                expected: kind,
                found: stray.kind(),
            });
        }
        Ok(Self::from_members(kind, members))
    }

    /// Singleton set.
    #[must_use]
    pub fn of_one(agent: AgentRef) -> Self {
        Self::from_members(agent.kind(), vec![agent])
    }

    pub(crate) fn from_members(kind: AgentKind, members: Vec<AgentRef>) -> Self {
        Self {
            kind,
            breed: None,
            members,
        }
    }

    pub(crate) fn with_breed(mut self, name: &str) -> Self {
        self.breed = Some(name.to_string());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Breed the set was drawn from, if it is a breed set.
    #[must_use]
    pub fn breed_name(&self) -> Option<&str> {
        self.breed.as_deref()
    }

    /// Number of members, dead ones included. See [`World::count`] for the live count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AgentRef> {
        self.members.iter()
    }

    #[must_use]
    pub fn members(&self) -> &[AgentRef] {
        &self.members
    }

    #[must_use]
    pub fn contains(&self, agent: AgentRef) -> bool {
        self.members.contains(&agent)
    }

    /// Same set minus `agent`.
    #[must_use]
    pub fn without(&self, agent: AgentRef) -> Self {
        Self {
            kind: self.kind,
            breed: self.breed.clone(),
            members: self
                .members
                .iter()
                .copied()
                .filter(|member| *member != agent)
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AgentSet {
    type Item = &'a AgentRef;
    type IntoIter = std::slice::Iter<'a, AgentRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl World {
    /// Number of live members.
    #[must_use]
    pub fn count(&self, set: &AgentSet) -> usize {
        set.iter().filter(|agent| self.is_alive(**agent)).count()
    }

    /// True when at least one member is alive.
    #[must_use]
    pub fn any(&self, set: &AgentSet) -> bool {
        set.iter().any(|agent| self.is_alive(*agent))
    }

    /// Uniformly chosen live member, or `None` (nobody) when there is none.
    pub fn one_of(&mut self, set: &AgentSet) -> Option<AgentRef> {
        let live: Vec<AgentRef> = set
            .iter()
            .copied()
            .filter(|agent| self.is_alive(*agent))
            .collect();
        if live.is_empty() {
            return None;
        }
        let idx = self.rng().index(live.len());
        Some(live[idx])
    }

    /// Up to `count` distinct live members, chosen uniformly, in set order.
    pub fn n_of(&mut self, count: usize, set: &AgentSet) -> AgentSet {
        let mut live: Vec<usize> = set
            .iter()
            .enumerate()
            .filter(|(_, agent)| self.is_alive(**agent))
            .map(|(idx, _)| idx)
            .collect();
        self.rng().shuffle(&mut live);
        live.truncate(count);
        live.sort_unstable();
        AgentSet {
            kind: set.kind,
            breed: set.breed.clone(),
            members: live.into_iter().map(|idx| set.members[idx]).collect(),
        }
    }
}

impl Context<'_> {
    /// Run `action` once per live member with that member as `self`.
    ///
    /// With `randomize`, members are visited in a fresh random order. A
    /// [`Flow::Stop`] from the action ends the traversal and is returned.
    pub fn ask<F, R>(&mut self, set: &AgentSet, randomize: bool, mut action: F) -> WorldResult<Flow>
    where
        F: FnMut(&mut Self) -> WorldResult<R>,
        R: Into<Flow>,
    {
        let mut order = set.members.clone();
        if randomize {
            self.rng().shuffle(&mut order);
        }
        for agent in order {
            if !self.is_alive(agent) {
                continue;
            }
            let flow: Flow = self.visit(agent, &mut action)?.into();
            if flow.is_stop() {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Run `action` for one agent; dead agents are `NobodyReference`.
    pub fn ask_agent<F, R>(&mut self, agent: AgentRef, mut action: F) -> WorldResult<Flow>
    where
        F: FnMut(&mut Self) -> WorldResult<R>,
        R: Into<Flow>,
    {
        if !self.is_alive(agent) {
            return Err(WorldError::NobodyReference);
        }
        Ok(self.visit(agent, &mut action)?.into())
    }

    /// Ask whatever a variable holds: an agent, a set (in random order), or nobody.
    pub fn ask_value<F, R>(&mut self, target: &Value, action: F) -> WorldResult<Flow>
    where
        F: FnMut(&mut Self) -> WorldResult<R>,
        R: Into<Flow>,
    {
        match target {
            Value::Agent(agent) => self.ask_agent(*agent, action),
            Value::Set(set) => self.ask(set, true, action),
            Value::Nobody => Err(WorldError::NobodyReference),
            other => Err(WorldError::TypeMismatch {
                expected: "agent or agentset",
                found: other.type_name(),
            }),
        }
    }

    /// Evaluate `expr` for each live member in storage order.
    pub fn of<F, T>(&mut self, set: &AgentSet, mut expr: F) -> WorldResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> WorldResult<T>,
    {
        let mut out = Vec::with_capacity(set.len());
        for agent in set.members.clone() {
            if self.is_alive(agent) {
                out.push(self.visit(agent, &mut expr)?);
            }
        }
        Ok(out)
    }

    /// Evaluate `expr` for one agent; dead agents are `NobodyReference`.
    pub fn of_agent<F, T>(&mut self, agent: AgentRef, mut expr: F) -> WorldResult<T>
    where
        F: FnMut(&mut Self) -> WorldResult<T>,
    {
        if !self.is_alive(agent) {
            return Err(WorldError::NobodyReference);
        }
        self.visit(agent, &mut expr)
    }

    /// Live members satisfying `predicate`, relative order preserved.
    pub fn with<F>(&mut self, set: &AgentSet, mut predicate: F) -> WorldResult<AgentSet>
    where
        F: FnMut(&mut Self) -> WorldResult<bool>,
    {
        let mut members = Vec::new();
        for agent in set.members.clone() {
            if self.is_alive(agent) && self.visit(agent, &mut predicate)? {
                members.push(agent);
            }
        }
        Ok(AgentSet {
            kind: set.kind,
            breed: set.breed.clone(),
            members,
        })
    }

    /// Member with the smallest key; the first one encountered wins ties.
    pub fn min_one_of<F>(&mut self, set: &AgentSet, key: F) -> WorldResult<Option<AgentRef>>
    where
        F: FnMut(&mut Self) -> WorldResult<f64>,
    {
        self.extreme_of(set, key, |candidate, best| candidate < best)
    }

    /// Member with the largest key; the first one encountered wins ties.
    pub fn max_one_of<F>(&mut self, set: &AgentSet, key: F) -> WorldResult<Option<AgentRef>>
    where
        F: FnMut(&mut Self) -> WorldResult<f64>,
    {
        self.extreme_of(set, key, |candidate, best| candidate > best)
    }

    fn extreme_of<F>(
        &mut self,
        set: &AgentSet,
        mut key: F,
        better: fn(OrderedFloat<f64>, OrderedFloat<f64>) -> bool,
    ) -> WorldResult<Option<AgentRef>>
    where
        F: FnMut(&mut Self) -> WorldResult<f64>,
    {
        let mut best: Option<(OrderedFloat<f64>, AgentRef)> = None;
        for agent in set.members.clone() {
            if !self.is_alive(agent) {
                continue;
            }
            let value = OrderedFloat(self.visit(agent, &mut key)?);
            if best.map_or(true, |(current, _)| better(value, current)) {
                best = Some((value, agent));
            }
        }
        Ok(best.map(|(_, agent)| agent))
    }

    /// Sum of `expr` over live members.
    pub fn sum_of<F>(&mut self, set: &AgentSet, expr: F) -> WorldResult<f64>
    where
        F: FnMut(&mut Self) -> WorldResult<f64>,
    {
        Ok(self.of(set, expr)?.into_iter().sum())
    }

    /// Number of live members satisfying `predicate`.
    pub fn count_with<F>(&mut self, set: &AgentSet, predicate: F) -> WorldResult<usize>
    where
        F: FnMut(&mut Self) -> WorldResult<bool>,
    {
        Ok(self.with(set, predicate)?.len())
    }

    /// True when some live member satisfies `predicate`. Stops at the first match.
    pub fn any_with<F>(&mut self, set: &AgentSet, mut predicate: F) -> WorldResult<bool>
    where
        F: FnMut(&mut Self) -> WorldResult<bool>,
    {
        for agent in set.members.clone() {
            if self.is_alive(agent) && self.visit(agent, &mut predicate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True when every live member satisfies `predicate`. Stops at the first miss.
    pub fn all<F>(&mut self, set: &AgentSet, mut predicate: F) -> WorldResult<bool>
    where
        F: FnMut(&mut Self) -> WorldResult<bool>,
    {
        for agent in set.members.clone() {
            if self.is_alive(agent) && !self.visit(agent, &mut predicate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
