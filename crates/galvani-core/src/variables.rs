//! Variable set: maps circuit nodes and branch unknowns to solver indices.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// The physical kind of an unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// A node voltage (V).
    Voltage,
    /// A branch current (A).
    Current,
    /// A temperature unknown (K).
    Temperature,
}

/// A solved unknown: an index into the solution vector plus its kind.
///
/// Index 0 is always ground and is never part of the solved system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    index: usize,
    kind: VariableKind,
}

impl Variable {
    /// Index into the solution vector.
    pub fn index(self) -> usize {
        self.index
    }

    /// The kind of unknown.
    pub fn kind(self) -> VariableKind {
        self.kind
    }

    /// Whether this is the ground variable.
    pub fn is_ground(self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "#{}", self.index)
        }
    }
}

/// Allocates and resolves variables by name.
///
/// Names are compared case-insensitively after trimming. Creation order
/// defines the index ordering; the solver sees the contiguous index set
/// `{0..N}` with 0 reserved for ground.
#[derive(Debug, Clone)]
pub struct VariableSet {
    entries: Vec<(String, VariableKind)>,
    lookup: HashMap<String, usize>,
}

impl Default for VariableSet {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableSet {
    /// Create a set containing only the ground variable.
    pub fn new() -> Self {
        let mut set = Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
        };
        set.entries.push(("0".into(), VariableKind::Voltage));
        set.lookup.insert("0".into(), 0);
        set
    }

    /// The ground variable (index 0).
    pub fn ground(&self) -> Variable {
        Variable {
            index: 0,
            kind: VariableKind::Voltage,
        }
    }

    /// Create a variable, or return the existing one with the same name.
    ///
    /// Fails with [`Error::DuplicateVariable`] when the name is already bound
    /// to a different kind.
    pub fn create(&mut self, name: &str, kind: VariableKind) -> Result<Variable> {
        let key = canonical(name);
        if let Some(&index) = self.lookup.get(&key) {
            let existing = self.entries[index].1;
            if existing != kind {
                return Err(Error::DuplicateVariable(name.trim().to_string()));
            }
            return Ok(Variable { index, kind });
        }
        let index = self.entries.len();
        self.entries.push((key.clone(), kind));
        self.lookup.insert(key, index);
        Ok(Variable { index, kind })
    }

    /// Case-insensitive lookup.
    pub fn map(&self, name: &str) -> Option<Variable> {
        let key = canonical(name);
        self.lookup.get(&key).map(|&index| Variable {
            index,
            kind: self.entries[index].1,
        })
    }

    /// The name a variable was created under.
    pub fn name(&self, variable: Variable) -> &str {
        &self.entries[variable.index()].0
    }

    /// Variable for a given index, if allocated.
    pub fn get(&self, index: usize) -> Option<Variable> {
        self.entries.get(index).map(|&(_, kind)| Variable { index, kind })
    }

    /// Total number of variables including ground.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when only ground exists.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    /// Number of solved unknowns (excludes ground).
    pub fn unknowns(&self) -> usize {
        self.entries.len() - 1
    }

    /// Iterate over all variables in creation order, ground first.
    pub fn iter(&self) -> impl Iterator<Item = Variable> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, &(_, kind))| Variable { index, kind })
    }
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}
