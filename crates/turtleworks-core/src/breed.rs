//! Named turtle and link sub-kinds with their own variable schemas.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agent::{AgentKind, LINK_BUILTINS, TURTLE_BUILTINS, link_slot, turtle_slot};
use crate::error::{WorldError, WorldResult};
use crate::vars::{VarScope, VariableTable};

/// Index into the breed registry. Stable for the lifetime of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BreedId(pub(crate) u32);

/// Name of the breed every plain turtle belongs to.
pub const TURTLES: &str = "turtles";
/// Name of the breed every plain link belongs to.
pub const LINKS: &str = "links";

const DEFAULT_SHAPE: &str = "default";

/// A registered breed.
#[derive(Debug, Clone)]
pub struct Breed {
    name: String,
    kind: AgentKind,
    own: Vec<String>,
    schema: VariableTable,
    default_shape: String,
    directed: bool,
}

impl Breed {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Variables declared by the breed itself, after the kind-wide ones.
    #[must_use]
    pub fn own_variables(&self) -> &[String] {
        &self.own
    }

    /// Full slot layout of members: builtins, kind-wide variables, then breed variables.
    #[must_use]
    pub fn schema(&self) -> &VariableTable {
        &self.schema
    }

    #[must_use]
    pub fn default_shape(&self) -> &str {
        &self.default_shape
    }

    /// Only meaningful for link breeds.
    #[must_use]
    pub const fn is_directed(&self) -> bool {
        self.directed
    }
}

/// All breeds of one world, plus the kind-wide turtle and link tables they extend.
#[derive(Debug, Clone)]
pub struct BreedRegistry {
    turtle_base: VariableTable,
    link_base: VariableTable,
    breeds: Vec<Breed>,
    by_name: HashMap<String, BreedId>,
}

impl BreedRegistry {
    /// Breed of plain turtles.
    pub const TURTLES: BreedId = BreedId(0);
    /// Breed of plain (undirected) links.
    pub const LINKS: BreedId = BreedId(1);

    pub fn new(turtles_own: &[String], links_own: &[String]) -> WorldResult<Self> {
        let turtle_base = VariableTable::new(
            VarScope::Turtle,
            &TURTLE_BUILTINS,
            &[turtle_slot::WHO, turtle_slot::BREED],
            turtles_own,
        )?;
        let link_base = VariableTable::new(
            VarScope::Link,
            &LINK_BUILTINS,
            &[link_slot::END1, link_slot::END2, link_slot::BREED],
            links_own,
        )?;
        let mut registry = Self {
            breeds: Vec::new(),
            by_name: HashMap::new(),
            turtle_base,
            link_base,
        };
        registry.push(TURTLES, AgentKind::Turtle, &[], DEFAULT_SHAPE, false)?;
        registry.push(LINKS, AgentKind::Link, &[], DEFAULT_SHAPE, false)?;
        Ok(registry)
    }

    fn push(
        &mut self,
        name: &str,
        kind: AgentKind,
        own: &[String],
        default_shape: &str,
        directed: bool,
    ) -> WorldResult<BreedId> {
        let base = match kind {
            AgentKind::Link => &self.link_base,
            _ => &self.turtle_base,
        };
        let schema = base.extend(own)?;
        let id = BreedId(self.breeds.len() as u32);
        self.by_name.insert(name.to_ascii_lowercase(), id);
        self.breeds.push(Breed {
            name: name.to_ascii_lowercase(),
            kind,
            own: own.iter().map(|var| var.to_ascii_lowercase()).collect(),
            schema,
            default_shape: default_shape.to_string(),
            directed,
        });
        Ok(id)
    }

    /// Register a turtle breed. Re-registering the same name with the same
    /// variables returns the existing id.
    pub fn register_breed(
        &mut self,
        name: &str,
        variables: &[String],
        default_shape: Option<&str>,
    ) -> WorldResult<BreedId> {
        self.register(name, AgentKind::Turtle, variables, default_shape, false)
    }

    /// Register a link breed with fixed directedness.
    pub fn register_link_breed(
        &mut self,
        name: &str,
        variables: &[String],
        directed: bool,
    ) -> WorldResult<BreedId> {
        self.register(name, AgentKind::Link, variables, None, directed)
    }

    fn register(
        &mut self,
        name: &str,
        kind: AgentKind,
        variables: &[String],
        default_shape: Option<&str>,
        directed: bool,
    ) -> WorldResult<BreedId> {
        let key = name.to_ascii_lowercase();
        if key.is_empty() {
            return Err(WorldError::InvalidConfig("breed names must not be empty".into()));
        }
        if let Some(&id) = self.by_name.get(&key) {
            let existing = &self.breeds[id.0 as usize];
            let same_schema = id != Self::TURTLES
                && id != Self::LINKS
                && existing.kind == kind
                && existing.directed == directed
                && existing.own.len() == variables.len()
                && existing
                    .own
                    .iter()
                    .zip(variables)
                    .all(|(a, b)| a.eq_ignore_ascii_case(b));
            return if same_schema {
                Ok(id)
            } else {
                Err(WorldError::DuplicateBreed(key))
            };
        }
        self.push(
            &key,
            kind,
            variables,
            default_shape.unwrap_or(DEFAULT_SHAPE),
            directed,
        )
    }

    /// Resolve a breed by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> WorldResult<BreedId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&name.to_ascii_lowercase()))
            .copied()
            .ok_or_else(|| WorldError::UnknownBreed(name.to_string()))
    }

    /// Resolve a breed name and require it to describe agents of `kind`.
    pub fn lookup_kind(&self, name: &str, kind: AgentKind) -> WorldResult<BreedId> {
        let id = self.lookup(name)?;
        let found = self.get(id).kind;
        if found != kind {
            return Err(WorldError::KindMismatch {
                operation: "breed lookup",
                expected: kind,
                found,
            });
        }
        Ok(id)
    }

    /// Registered breed by id. Ids only come from this registry.
    #[must_use]
    pub fn get(&self, id: BreedId) -> &Breed {
        &self.breeds[id.0 as usize]
    }

    pub fn set_default_shape(&mut self, name: &str, shape: &str) -> WorldResult<()> {
        let id = self.lookup(name)?;
        self.breeds[id.0 as usize].default_shape = shape.to_string();
        Ok(())
    }

    /// True once any breed beyond the two defaults is registered.
    #[must_use]
    pub fn has_custom_breeds(&self, kind: AgentKind) -> bool {
        self.breeds.iter().skip(2).any(|breed| breed.kind == kind)
    }

    /// Resize the kind-wide declared variables of turtles or links.
    ///
    /// Breed tables are derived from the kind-wide table, so this is refused
    /// once a custom breed of that kind exists.
    pub fn init_own(&mut self, kind: AgentKind, count: usize) -> WorldResult<()> {
        let (scope, default) = match kind {
            AgentKind::Turtle => (VarScope::Turtle, Self::TURTLES),
            AgentKind::Link => (VarScope::Link, Self::LINKS),
            AgentKind::Patch => {
                return Err(WorldError::InvalidConfig(
                    "patch variables are not breed-scoped".into(),
                ))
            }
        };
        if self.has_custom_breeds(kind) {
            return Err(WorldError::SchemaSealed { scope });
        }
        let base = match kind {
            AgentKind::Link => &mut self.link_base,
            _ => &mut self.turtle_base,
        };
        base.init(count)?;
        let schema = base.clone();
        self.breeds[default.0 as usize].schema = schema;
        Ok(())
    }

    /// Kind-wide table shared by every breed of `kind`.
    #[must_use]
    pub fn base_table(&self, kind: AgentKind) -> &VariableTable {
        match kind {
            AgentKind::Link => &self.link_base,
            _ => &self.turtle_base,
        }
    }

    /// Every registered breed in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (BreedId, &Breed)> + '_ {
        self.breeds
            .iter()
            .enumerate()
            .map(|(idx, breed)| (BreedId(idx as u32), breed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarKey;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn breed_variables_follow_kind_wide_variables() {
        let mut registry = BreedRegistry::new(&names(&["known?"]), &[]).expect("registry");
        let ball = registry
            .register_breed("ball", &names(&["speed"]), Some("circle"))
            .expect("ball");
        let schema = registry.get(ball).schema();
        assert_eq!(schema.resolve(VarKey::Name("known?")), Ok(13));
        assert_eq!(schema.resolve(VarKey::Name("speed")), Ok(14));
        assert!(matches!(
            schema.resolve(VarKey::Name("color2")),
            Err(WorldError::UnknownVariable { .. })
        ));
        assert_eq!(registry.get(ball).default_shape(), "circle");
        assert_eq!(registry.lookup("BALL"), Ok(ball));
    }

    #[test]
    fn re_registration_requires_the_same_schema() {
        let mut registry = BreedRegistry::new(&[], &[]).expect("registry");
        let first = registry
            .register_breed("ball", &names(&["speed"]), None)
            .expect("ball");
        assert_eq!(registry.register_breed("ball", &names(&["Speed"]), None), Ok(first));
        assert_eq!(
            registry.register_breed("ball", &names(&["speed", "spin"]), None),
            Err(WorldError::DuplicateBreed("ball".into()))
        );
        assert_eq!(
            registry.register_link_breed("ball", &names(&["speed"]), true),
            Err(WorldError::DuplicateBreed("ball".into()))
        );
        assert!(registry.register_breed(TURTLES, &[], None).is_err());
    }

    #[test]
    fn kind_wide_tables_seal_once_breeds_exist() {
        let mut registry = BreedRegistry::new(&[], &[]).expect("registry");
        registry.init_own(AgentKind::Turtle, 2).expect("init");
        assert_eq!(
            registry.get(BreedRegistry::TURTLES).schema().width(),
            TURTLE_BUILTINS.len() + 2
        );
        registry.register_breed("ball", &[], None).expect("ball");
        assert_eq!(
            registry.init_own(AgentKind::Turtle, 3),
            Err(WorldError::SchemaSealed {
                scope: VarScope::Turtle
            })
        );
        registry.init_own(AgentKind::Link, 1).expect("links still open");
    }

    #[test]
    fn link_breeds_remember_direction() {
        let mut registry = BreedRegistry::new(&[], &[]).expect("registry");
        let roads = registry
            .register_link_breed("roads", &names(&["lanes"]), true)
            .expect("roads");
        assert!(registry.get(roads).is_directed());
        assert!(!registry.get(BreedRegistry::LINKS).is_directed());
        assert_eq!(
            registry.lookup_kind("roads", AgentKind::Turtle),
            Err(WorldError::KindMismatch {
                operation: "breed lookup",
                expected: AgentKind::Turtle,
                found: AgentKind::Link
            })
        );
        registry.set_default_shape("roads", "dashed").expect("shape");
        assert_eq!(registry.get(roads).default_shape(), "dashed");
        assert_eq!(registry.iter().count(), 3);
    }
}
