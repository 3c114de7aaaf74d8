use thiserror::Error;
use turtleworks_index::IndexError;

use crate::agent::AgentKind;
use crate::vars::VarScope;

/// Fatal conditions raised by world operations.
///
/// Stopping a run is not an error; see [`crate::Flow`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    /// A variable name or slot was never registered for the scope.
    #[error("unknown {scope} variable `{key}`")]
    UnknownVariable { scope: VarScope, key: String },
    /// The variable exists but may not be assigned.
    #[error("{scope} variable `{name}` is read-only")]
    ReadOnlyVariable { scope: VarScope, name: String },
    /// Slot storage was resized after it was already in use.
    #[error("{scope} variable table is sealed: agents or breeds already depend on it")]
    SchemaSealed { scope: VarScope },
    /// A breed name was registered twice with differing schemas.
    #[error("breed `{0}` is already registered with a different schema")]
    DuplicateBreed(String),
    /// A breed name that was never registered.
    #[error("unknown breed `{0}`")]
    UnknownBreed(String),
    /// A link with identical endpoints and directedness already exists.
    #[error("a {} link between turtles {end1} and {end2} already exists", link_kind(.directed))]
    DuplicateLink { end1: u64, end2: u64, directed: bool },
    /// Links must join two distinct turtles.
    #[error("turtle {0} cannot link to itself")]
    SelfLink(u64),
    /// `tick` was called before `reset_ticks`.
    #[error("the tick counter has not been started; call reset_ticks first")]
    SchedulerNotStarted,
    /// The empty-agent sentinel (or a dead agent) was dereferenced.
    #[error("that agent is nobody")]
    NobodyReference,
    /// A value had the wrong dynamic type for the operation.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// An operation was applied to an agent of the wrong kind.
    #[error("{operation} requires a {expected} but got a {found}")]
    KindMismatch {
        operation: &'static str,
        expected: AgentKind,
        found: AgentKind,
    },
    /// An agent-only primitive was called from the observer context.
    #[error("{0} can only be used by an agent")]
    NoAgentContext(&'static str),
    /// A bounded edge blocked an explicit placement.
    #[error("cannot move to ({x}, {y}): outside the world")]
    OffWorld { x: f64, y: f64 },
    /// Movement by an infinite or NaN distance.
    #[error("cannot move a non-finite distance ({0})")]
    NonFiniteDistance(f64),
    /// Heading toward a point that coincides with the agent's own position.
    #[error("no heading is defined from a point to itself")]
    UndefinedHeading,
    /// Construction-time configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Index(#[from] IndexError),
}

fn link_kind(directed: &bool) -> &'static str {
    if *directed {
        "directed"
    } else {
        "undirected"
    }
}

/// Convenience alias used throughout the crate.
pub type WorldResult<T> = Result<T, WorldError>;
