//! Agent identities and the turtle, patch and link records owned by the world.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

use crate::breed::BreedId;
use crate::value::Value;

new_key_type! {
    /// Stable handle for turtles backed by a generational slot map.
    pub struct TurtleId;
    /// Stable handle for links backed by a generational slot map.
    pub struct LinkId;
}

/// Dense index of a patch. Patches live as long as the world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PatchId(pub usize);

/// The three agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Turtle,
    Patch,
    Link,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Turtle => "turtle",
            Self::Patch => "patch",
            Self::Link => "link",
        })
    }
}

/// Identity of any agent. Agent sets and variables hold these, never the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRef {
    Turtle(TurtleId),
    Patch(PatchId),
    Link(LinkId),
}

impl AgentRef {
    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        match self {
            Self::Turtle(_) => AgentKind::Turtle,
            Self::Patch(_) => AgentKind::Patch,
            Self::Link(_) => AgentKind::Link,
        }
    }

    #[must_use]
    pub const fn as_turtle(&self) -> Option<TurtleId> {
        match self {
            Self::Turtle(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_patch(&self) -> Option<PatchId> {
        match self {
            Self::Patch(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_link(&self) -> Option<LinkId> {
        match self {
            Self::Link(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<TurtleId> for AgentRef {
    fn from(id: TurtleId) -> Self {
        Self::Turtle(id)
    }
}

impl From<PatchId> for AgentRef {
    fn from(id: PatchId) -> Self {
        Self::Patch(id)
    }
}

impl From<LinkId> for AgentRef {
    fn from(id: LinkId) -> Self {
        Self::Link(id)
    }
}

/// Builtin turtle variables, in slot order.
pub const TURTLE_BUILTINS: [&str; 13] = [
    "who",
    "color",
    "heading",
    "xcor",
    "ycor",
    "shape",
    "label",
    "label-color",
    "breed",
    "hidden?",
    "size",
    "pen-size",
    "pen-mode",
];

/// Builtin patch variables, in slot order.
pub const PATCH_BUILTINS: [&str; 5] = ["pxcor", "pycor", "pcolor", "plabel", "plabel-color"];

/// Builtin link variables, in slot order.
pub const LINK_BUILTINS: [&str; 10] = [
    "end1",
    "end2",
    "color",
    "label",
    "label-color",
    "hidden?",
    "breed",
    "thickness",
    "shape",
    "tie-mode",
];

/// Slot numbers of the builtin turtle variables.
pub mod turtle_slot {
    pub const WHO: usize = 0;
    pub const COLOR: usize = 1;
    pub const HEADING: usize = 2;
    pub const XCOR: usize = 3;
    pub const YCOR: usize = 4;
    pub const SHAPE: usize = 5;
    pub const LABEL: usize = 6;
    pub const LABEL_COLOR: usize = 7;
    pub const BREED: usize = 8;
    pub const HIDDEN: usize = 9;
    pub const SIZE: usize = 10;
    pub const PEN_SIZE: usize = 11;
    pub const PEN_MODE: usize = 12;
}

/// Slot numbers of the builtin patch variables.
pub mod patch_slot {
    pub const PXCOR: usize = 0;
    pub const PYCOR: usize = 1;
    pub const PCOLOR: usize = 2;
    pub const PLABEL: usize = 3;
    pub const PLABEL_COLOR: usize = 4;
}

/// Slot numbers of the builtin link variables.
pub mod link_slot {
    pub const END1: usize = 0;
    pub const END2: usize = 1;
    pub const COLOR: usize = 2;
    pub const LABEL: usize = 3;
    pub const LABEL_COLOR: usize = 4;
    pub const HIDDEN: usize = 5;
    pub const BREED: usize = 6;
    pub const THICKNESS: usize = 7;
    pub const SHAPE: usize = 8;
    pub const TIE_MODE: usize = 9;
}

const DEFAULT_LABEL_COLOR: f64 = 9.9;
const LINK_GRAY: f64 = 5.0;

/// Wrap a heading in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_heading(heading: f64) -> f64 {
    if !heading.is_finite() {
        return 0.0;
    }
    let wrapped = heading.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// A mobile agent.
///
/// `who`, `heading`, `xcor`, `ycor` and `breed` are held in typed fields; their
/// entries in `vars` are unused placeholders so slot numbers line up.
#[derive(Debug, Clone)]
pub struct Turtle {
    pub(crate) who: u64,
    pub(crate) breed: BreedId,
    pub(crate) xcor: f64,
    pub(crate) ycor: f64,
    pub(crate) heading: f64,
    pub(crate) patch: PatchId,
    pub(crate) vars: Vec<Value>,
}

impl Turtle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        who: u64,
        breed: BreedId,
        width: usize,
        shape: &str,
        color: f64,
        heading: f64,
        position: (f64, f64),
        patch: PatchId,
    ) -> Self {
        let mut vars = vec![Value::zero(); width];
        vars[turtle_slot::COLOR] = Value::Number(color);
        vars[turtle_slot::SHAPE] = Value::from(shape);
        vars[turtle_slot::LABEL] = Value::from("");
        vars[turtle_slot::LABEL_COLOR] = Value::Number(DEFAULT_LABEL_COLOR);
        vars[turtle_slot::HIDDEN] = Value::Bool(false);
        vars[turtle_slot::SIZE] = Value::Number(1.0);
        vars[turtle_slot::PEN_SIZE] = Value::Number(1.0);
        vars[turtle_slot::PEN_MODE] = Value::from("up");
        Self {
            who,
            breed,
            xcor: position.0,
            ycor: position.1,
            heading: normalize_heading(heading),
            patch,
            vars,
        }
    }

    #[must_use]
    pub const fn who(&self) -> u64 {
        self.who
    }

    #[must_use]
    pub const fn breed(&self) -> BreedId {
        self.breed
    }

    #[must_use]
    pub const fn position(&self) -> (f64, f64) {
        (self.xcor, self.ycor)
    }

    #[must_use]
    pub const fn heading(&self) -> f64 {
        self.heading
    }

    /// Patch currently containing the turtle.
    #[must_use]
    pub const fn patch(&self) -> PatchId {
        self.patch
    }
}

/// A fixed grid cell.
#[derive(Debug, Clone)]
pub struct Patch {
    pub(crate) pxcor: i32,
    pub(crate) pycor: i32,
    pub(crate) vars: Vec<Value>,
}

impl Patch {
    pub(crate) fn new(pxcor: i32, pycor: i32, width: usize) -> Self {
        let mut patch = Self {
            pxcor,
            pycor,
            vars: Vec::new(),
        };
        patch.reset(width);
        patch
    }

    /// Restore every variable to its post-construction default.
    pub(crate) fn reset(&mut self, width: usize) {
        self.vars.clear();
        self.vars.resize(width, Value::zero());
        self.vars[patch_slot::PXCOR] = Value::Number(f64::from(self.pxcor));
        self.vars[patch_slot::PYCOR] = Value::Number(f64::from(self.pycor));
        self.vars[patch_slot::PLABEL] = Value::from("");
        self.vars[patch_slot::PLABEL_COLOR] = Value::Number(DEFAULT_LABEL_COLOR);
    }

    #[must_use]
    pub const fn coords(&self) -> (i32, i32) {
        (self.pxcor, self.pycor)
    }
}

/// A relation between two turtles.
///
/// `end1`, `end2` and `breed` are held in typed fields.
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) id: u64,
    pub(crate) end1: TurtleId,
    pub(crate) end2: TurtleId,
    pub(crate) directed: bool,
    pub(crate) breed: BreedId,
    pub(crate) vars: Vec<Value>,
}

impl Link {
    pub(crate) fn new(
        id: u64,
        ends: (TurtleId, TurtleId),
        directed: bool,
        breed: BreedId,
        width: usize,
    ) -> Self {
        let mut vars = vec![Value::zero(); width];
        vars[link_slot::COLOR] = Value::Number(LINK_GRAY);
        vars[link_slot::LABEL] = Value::from("");
        vars[link_slot::LABEL_COLOR] = Value::Number(DEFAULT_LABEL_COLOR);
        vars[link_slot::HIDDEN] = Value::Bool(false);
        vars[link_slot::SHAPE] = Value::from("default");
        vars[link_slot::TIE_MODE] = Value::from("none");
        Self {
            id,
            end1: ends.0,
            end2: ends.1,
            directed,
            breed,
            vars,
        }
    }

    /// Creation number of the link.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn ends(&self) -> (TurtleId, TurtleId) {
        (self.end1, self.end2)
    }

    #[must_use]
    pub const fn is_directed(&self) -> bool {
        self.directed
    }

    #[must_use]
    pub const fn breed(&self) -> BreedId {
        self.breed
    }

    /// The endpoint opposite `turtle`, if `turtle` is attached to this link.
    #[must_use]
    pub fn other_end(&self, turtle: TurtleId) -> Option<TurtleId> {
        if self.end1 == turtle {
            Some(self.end2)
        } else if self.end2 == turtle {
            Some(self.end1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_wrap_into_one_turn() {
        assert_eq!(normalize_heading(370.0), 10.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(f64::NAN), 0.0);
    }

    #[test]
    fn patch_reset_restores_builtins() {
        let mut patch = Patch::new(3, -2, PATCH_BUILTINS.len() + 1);
        patch.vars[patch_slot::PCOLOR] = Value::Number(15.0);
        patch.vars[5] = Value::from("dirty");
        patch.reset(PATCH_BUILTINS.len() + 1);
        assert_eq!(patch.vars[patch_slot::PXCOR], Value::Number(3.0));
        assert_eq!(patch.vars[patch_slot::PYCOR], Value::Number(-2.0));
        assert_eq!(patch.vars[patch_slot::PCOLOR], Value::zero());
        assert_eq!(patch.vars[5], Value::zero());
    }

    #[test]
    fn builtin_tables_line_up_with_slot_constants() {
        assert_eq!(TURTLE_BUILTINS[turtle_slot::PEN_MODE], "pen-mode");
        assert_eq!(TURTLE_BUILTINS[turtle_slot::BREED], "breed");
        assert_eq!(PATCH_BUILTINS[patch_slot::PLABEL_COLOR], "plabel-color");
        assert_eq!(LINK_BUILTINS[link_slot::TIE_MODE], "tie-mode");
    }
}
