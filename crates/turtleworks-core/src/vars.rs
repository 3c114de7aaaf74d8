//! Fixed-schema variable tables.
//!
//! Every scope (globals, turtles, patches, links, and each breed) resolves
//! variable names to slot numbers once, when the table is built. Lookups by
//! name go through that map; lookups by slot only check the width.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{WorldError, WorldResult};
use crate::value::Value;

/// Which kind of storage a variable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarScope {
    Global,
    Turtle,
    Patch,
    Link,
}

impl fmt::Display for VarScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Turtle => "turtle",
            Self::Patch => "patch",
            Self::Link => "link",
        })
    }
}

/// A variable addressed either by slot number or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKey<'a> {
    Slot(usize),
    Name(&'a str),
}

impl From<usize> for VarKey<'_> {
    fn from(slot: usize) -> Self {
        Self::Slot(slot)
    }
}

impl<'a> From<&'a str> for VarKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for VarKey<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name.as_str())
    }
}

impl fmt::Display for VarKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(slot) => write!(f, "#{slot}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Name-to-slot layout for one scope.
///
/// Slots `0..builtins` are engine-defined; the remainder are declared by the
/// model. The declared width may exceed the number of named variables when
/// a table is sized with [`VariableTable::init`] and addressed by slot only.
#[derive(Debug, Clone)]
pub struct VariableTable {
    scope: VarScope,
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    builtins: usize,
    read_only: Vec<usize>,
    width: usize,
}

impl VariableTable {
    /// Build a table with the given builtin names followed by declared names.
    pub fn new(
        scope: VarScope,
        builtins: &[&str],
        read_only: &[usize],
        declared: &[String],
    ) -> WorldResult<Self> {
        let mut table = Self {
            scope,
            names: Vec::with_capacity(builtins.len() + declared.len()),
            lookup: HashMap::with_capacity(builtins.len() + declared.len()),
            builtins: builtins.len(),
            read_only: read_only.to_vec(),
            width: 0,
        };
        for name in builtins {
            table.push_name(name)?;
        }
        for name in declared {
            table.push_name(name)?;
        }
        Ok(table)
    }

    /// Derive a table that appends `extra` after every slot of `self`.
    pub fn extend(&self, extra: &[String]) -> WorldResult<Self> {
        let mut table = self.clone();
        // Anonymous slots sized by `init` keep their positions.
        while table.names.len() < table.width {
            table.names.push(String::new());
        }
        for name in extra {
            table.push_name(name)?;
        }
        Ok(table)
    }

    fn push_name(&mut self, name: &str) -> WorldResult<()> {
        let key = name.to_ascii_lowercase();
        if key.is_empty() || self.lookup.contains_key(&key) {
            return Err(WorldError::InvalidConfig(format!(
                "duplicate or empty {} variable name `{name}`",
                self.scope
            )));
        }
        let slot = self.names.len();
        self.lookup.insert(key.clone(), slot);
        self.names.push(key);
        self.width = self.width.max(self.names.len());
        Ok(())
    }

    /// Size the declared (non-builtin) part of the table to `count` slots.
    ///
    /// Callers must reject this once agents of the scope exist.
    pub fn init(&mut self, count: usize) -> WorldResult<()> {
        let named = self.named_declared();
        if count < named {
            return Err(WorldError::InvalidConfig(format!(
                "{} variable table needs at least {named} slots, got {count}",
                self.scope
            )));
        }
        self.width = self.builtins + count;
        Ok(())
    }

    fn named_declared(&self) -> usize {
        self.names
            .iter()
            .skip(self.builtins)
            .rposition(|name| !name.is_empty())
            .map_or(0, |pos| pos + 1)
    }

    /// Resolve a key to its slot, failing with `UnknownVariable`.
    pub fn resolve(&self, key: VarKey<'_>) -> WorldResult<usize> {
        let slot = match key {
            VarKey::Slot(slot) => (slot < self.width).then_some(slot),
            VarKey::Name(name) => self.lookup.get(name).copied().or_else(|| {
                // Names are case-insensitive; only allocate when the fast path misses.
                self.lookup.get(&name.to_ascii_lowercase()).copied()
            }),
        };
        slot.ok_or_else(|| WorldError::UnknownVariable {
            scope: self.scope,
            key: key.to_string(),
        })
    }

    /// Resolve a key and reject writes to read-only builtins.
    pub fn resolve_writable(&self, key: VarKey<'_>) -> WorldResult<usize> {
        let slot = self.resolve(key)?;
        if self.read_only.contains(&slot) {
            return Err(WorldError::ReadOnlyVariable {
                scope: self.scope,
                name: self.names[slot].clone(),
            });
        }
        Ok(slot)
    }

    #[must_use]
    pub const fn scope(&self) -> VarScope {
        self.scope
    }

    /// Total number of slots, builtins included.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn builtin_count(&self) -> usize {
        self.builtins
    }

    /// Name stored at `slot`, if the slot is named.
    #[must_use]
    pub fn name(&self, slot: usize) -> Option<&str> {
        self.names
            .get(slot)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Names of every variable declared for a breed, in slot order.
    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

/// Observer-scope variables.
///
/// Interface globals (slider/switch values fed in from outside) survive
/// [`Globals::reset`]; everything else returns to zero.
#[derive(Debug, Clone)]
pub struct Globals {
    table: VariableTable,
    values: Vec<Value>,
    interface: Vec<bool>,
}

impl Globals {
    pub fn new(names: &[String], interface: &[String]) -> WorldResult<Self> {
        let table = VariableTable::new(VarScope::Global, &[], &[], names)?;
        let mut flags = vec![false; table.width()];
        for name in interface {
            let slot = table.resolve(VarKey::Name(name)).map_err(|_| {
                WorldError::InvalidConfig(format!(
                    "interface global `{name}` is not a declared global"
                ))
            })?;
            flags[slot] = true;
        }
        Ok(Self {
            values: vec![Value::zero(); table.width()],
            table,
            interface: flags,
        })
    }

    /// Size the table to `count` slots, keeping existing values.
    pub fn init(&mut self, count: usize) -> WorldResult<()> {
        self.table.init(count)?;
        self.values.resize(count, Value::zero());
        self.interface.resize(count, false);
        Ok(())
    }

    pub fn get(&self, key: VarKey<'_>) -> WorldResult<&Value> {
        let slot = self.table.resolve(key)?;
        Ok(&self.values[slot])
    }

    pub fn set(&mut self, key: VarKey<'_>, value: Value) -> WorldResult<()> {
        let slot = self.table.resolve(key)?;
        self.values[slot] = value;
        Ok(())
    }

    /// Zero every non-interface global.
    pub fn reset(&mut self) {
        for (value, keep) in self.values.iter_mut().zip(&self.interface) {
            if !keep {
                *value = Value::zero();
            }
        }
    }

    #[must_use]
    pub fn table(&self) -> &VariableTable {
        &self.table
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn resolves_names_and_slots() {
        let table = VariableTable::new(
            VarScope::Turtle,
            &["who", "color"],
            &[0],
            &names(&["speed", "Energy"]),
        )
        .expect("table");
        assert_eq!(table.width(), 4);
        assert_eq!(table.resolve(VarKey::Name("speed")), Ok(2));
        assert_eq!(table.resolve(VarKey::Name("ENERGY")), Ok(3));
        assert_eq!(table.resolve(VarKey::Slot(1)), Ok(1));
        assert_eq!(
            table.resolve(VarKey::Slot(4)),
            Err(WorldError::UnknownVariable {
                scope: VarScope::Turtle,
                key: "#4".into()
            })
        );
        assert!(matches!(
            table.resolve(VarKey::Name("color2")),
            Err(WorldError::UnknownVariable { .. })
        ));
        assert!(matches!(
            table.resolve_writable(VarKey::Name("who")),
            Err(WorldError::ReadOnlyVariable { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = VariableTable::new(VarScope::Patch, &["pcolor"], &[], &names(&["PCOLOR"]));
        assert!(matches!(result, Err(WorldError::InvalidConfig(_))));
    }

    #[test]
    fn init_sizes_anonymous_slots_and_extend_appends_after_them() {
        let mut table =
            VariableTable::new(VarScope::Turtle, &["who"], &[0], &names(&["a"])).expect("table");
        assert!(table.init(0).is_err());
        table.init(3).expect("init");
        assert_eq!(table.width(), 4);
        assert_eq!(table.resolve(VarKey::Slot(3)), Ok(3));
        assert_eq!(table.name(3), None);

        let breed = table.extend(&names(&["speed"])).expect("breed");
        assert_eq!(breed.resolve(VarKey::Name("speed")), Ok(4));
        assert_eq!(breed.width(), 5);
        assert!(breed.extend(&names(&["a"])).is_err());
    }

    #[test]
    fn globals_reset_keeps_interface_values() {
        let mut globals =
            Globals::new(&names(&["kicks", "goal-size"]), &names(&["goal-size"])).expect("globals");
        globals.set(VarKey::Name("kicks"), Value::from(4)).expect("set");
        globals.set(VarKey::Slot(1), Value::from(11)).expect("set");
        globals.reset();
        assert_eq!(globals.get(VarKey::Name("kicks")), Ok(&Value::zero()));
        assert_eq!(globals.get(VarKey::Name("goal-size")), Ok(&Value::from(11)));
        assert!(Globals::new(&names(&["a"]), &names(&["b"])).is_err());
    }

    #[test]
    fn globals_init_grows_index_only_storage() {
        let mut globals = Globals::new(&[], &[]).expect("globals");
        assert!(globals.get(VarKey::Slot(0)).is_err());
        globals.init(11).expect("init");
        globals.set(VarKey::Slot(10), Value::from(200)).expect("set");
        assert_eq!(globals.get(VarKey::Slot(10)), Ok(&Value::from(200)));
        assert_eq!(globals.values().len(), 11);
    }
}
