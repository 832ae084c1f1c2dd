//! Entities and the circuit collection.

use std::fmt;

use indexmap::IndexMap;

use crate::behaviour::{BindContext, DeviceBehaviour};
use crate::error::{Error, Result};
use crate::params::ParameterSet;

/// A circuit entity: a named device with an ordered pin list and a
/// parameter set.
///
/// The structure of an entity is immutable during a simulation; per-analysis
/// state lives in the behaviour object `bind` constructs for each run.
pub trait Device: fmt::Debug {
    /// Stable entity name.
    fn name(&self) -> &str;

    /// Ordered list of node names this entity connects to.
    fn pins(&self) -> Vec<String>;

    /// The entity's parameters.
    fn params(&self) -> &ParameterSet;

    /// Mutable access for parameter assignment before a simulation.
    fn params_mut(&mut self) -> &mut ParameterSet;

    /// Name of the entity whose branch current this device reads, if any.
    ///
    /// Current-controlled sources return their controlling voltage source
    /// here; the binder orders construction so the reference resolves.
    fn controlling(&self) -> Option<&str> {
        None
    }

    /// Construct this entity's behaviour for one simulation.
    ///
    /// Reads the parameter set, allocates node/branch variables and resolves
    /// sibling references through the context.
    fn bind(&self, ctx: &mut BindContext) -> Result<Box<dyn DeviceBehaviour>>;
}

/// An ordered collection of entities.
#[derive(Debug, Default)]
pub struct Circuit {
    entities: IndexMap<String, Box<dyn Device>>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Fails with [`Error::DuplicateEntity`] when the name
    /// (compared case-insensitively) is already present.
    pub fn add(&mut self, device: impl Device + 'static) -> Result<()> {
        let key = canonical(device.name());
        if self.entities.contains_key(&key) {
            return Err(Error::DuplicateEntity(device.name().to_string()));
        }
        self.entities.insert(key, Box::new(device));
        Ok(())
    }

    /// Remove an entity by name.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Device>> {
        self.entities.shift_remove(&canonical(name))
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<&dyn Device> {
        self.entities.get(&canonical(name)).map(|d| d.as_ref())
    }

    /// Mutable lookup, for parameter assignment.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Box<dyn Device>> {
        self.entities.get_mut(&canonical(name))
    }

    /// Iterate over entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Device> {
        self.entities.values().map(|d| d.as_ref())
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the circuit is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}
