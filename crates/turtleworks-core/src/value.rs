//! Dynamically typed variable values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::{AgentRef, LinkId, PatchId, TurtleId};
use crate::agentset::AgentSet;
use crate::error::{WorldError, WorldResult};

/// Contents of one variable slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Agent(AgentRef),
    Set(AgentSet),
    /// The empty-agent sentinel.
    Nobody,
}

impl Default for Value {
    fn default() -> Self {
        Self::zero()
    }
}

impl Value {
    /// Initial value of every declared variable.
    #[must_use]
    pub const fn zero() -> Self {
        Self::Number(0.0)
    }

    /// Short name of the dynamic type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Agent(_) => "agent",
            Self::Set(_) => "agentset",
            Self::Nobody => "nobody",
        }
    }

    #[must_use]
    pub const fn is_nobody(&self) -> bool {
        matches!(self, Self::Nobody)
    }

    pub fn as_number(&self) -> WorldResult<f64> {
        match self {
            Self::Number(value) => Ok(*value),
            other => Err(mismatch("number", other)),
        }
    }

    pub fn as_bool(&self) -> WorldResult<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(mismatch("boolean", other)),
        }
    }

    pub fn as_str(&self) -> WorldResult<&str> {
        match self {
            Self::Str(value) => Ok(value),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_list(&self) -> WorldResult<&[Value]> {
        match self {
            Self::List(values) => Ok(values),
            other => Err(mismatch("list", other)),
        }
    }

    /// Dereference an agent value; `Nobody` fails with [`WorldError::NobodyReference`].
    pub fn as_agent(&self) -> WorldResult<AgentRef> {
        match self {
            Self::Agent(agent) => Ok(*agent),
            Self::Nobody => Err(WorldError::NobodyReference),
            other => Err(mismatch("agent", other)),
        }
    }

    pub fn as_set(&self) -> WorldResult<&AgentSet> {
        match self {
            Self::Set(set) => Ok(set),
            Self::Nobody => Err(WorldError::NobodyReference),
            other => Err(mismatch("agentset", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> WorldError {
    WorldError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::List(values) => {
                f.write_str("[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Agent(agent) => write!(f, "({} agent)", agent.kind()),
            Self::Set(set) => write!(f, "(agentset, {} {}s)", set.len(), set.kind()),
            Self::Nobody => f.write_str("nobody"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl From<AgentRef> for Value {
    fn from(agent: AgentRef) -> Self {
        Self::Agent(agent)
    }
}

impl From<TurtleId> for Value {
    fn from(id: TurtleId) -> Self {
        Self::Agent(AgentRef::Turtle(id))
    }
}

impl From<PatchId> for Value {
    fn from(id: PatchId) -> Self {
        Self::Agent(AgentRef::Patch(id))
    }
}

impl From<LinkId> for Value {
    fn from(id: LinkId) -> Self {
        Self::Agent(AgentRef::Link(id))
    }
}

impl From<Option<AgentRef>> for Value {
    fn from(agent: Option<AgentRef>) -> Self {
        agent.map_or(Self::Nobody, Self::Agent)
    }
}

impl From<AgentSet> for Value {
    fn from(set: AgentSet) -> Self {
        Self::Set(set)
    }
}
