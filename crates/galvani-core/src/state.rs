//! Per-simulation solver state and time-step history.

use std::collections::HashMap;

use nalgebra::DVector;

use crate::variables::Variable;

/// Newton initialisation mode.
///
/// The driver walks `Junction` (first iteration: nonlinear devices choose
/// their critical starting voltage) → `Fix` (second iteration: devices
/// flagged off are held) → `Float` (normal operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    Junction,
    Fix,
    Float,
}

/// Mutable state threaded through every behaviour `load` call.
///
/// Entry 0 of both vectors is pinned to ground (0.0), so behaviours index
/// them directly by [`Variable::index`] without ground special-casing.
#[derive(Debug, Clone)]
pub struct BiasState {
    /// Solution of the previous Newton iteration (the linearisation point).
    pub solution: DVector<f64>,
    /// Solution of the iteration before that, for convergence checks.
    pub old_solution: DVector<f64>,
    /// Current initialisation mode.
    pub init_mode: InitMode,
    /// Raised by a device that limited its own update; forces at least one
    /// further Newton iteration.
    pub check: bool,
    /// Shunt conductance currently applied to every voltage node.
    pub gmin: f64,
    /// Independent-source scaling factor for source stepping (0..=1).
    pub source_factor: f64,
    /// Operating temperature (K).
    pub temperature: f64,
    /// Simulation time; `None` during DC-style analyses.
    pub time: Option<f64>,
    sweep_overrides: HashMap<String, f64>,
}

impl BiasState {
    /// Create a state for `unknowns` solved variables.
    pub fn new(unknowns: usize, temperature: f64, gmin: f64) -> Self {
        Self {
            solution: DVector::zeros(unknowns + 1),
            old_solution: DVector::zeros(unknowns + 1),
            init_mode: InitMode::Junction,
            check: false,
            gmin,
            source_factor: 1.0,
            temperature,
            time: None,
            sweep_overrides: HashMap::new(),
        }
    }

    /// Value of a variable at the current linearisation point.
    pub fn value(&self, variable: Variable) -> f64 {
        self.solution[variable.index()]
    }

    /// Voltage difference between two variables.
    pub fn voltage_diff(&self, pos: Variable, neg: Variable) -> f64 {
        self.solution[pos.index()] - self.solution[neg.index()]
    }

    /// Override the DC value of a named source (used by the DC sweep driver).
    pub fn set_sweep_override(&mut self, entity: &str, value: f64) {
        self.sweep_overrides
            .insert(entity.trim().to_lowercase(), value);
    }

    /// The sweep override for an entity, if one is active.
    pub fn sweep_override(&self, entity: &str) -> Option<f64> {
        self.sweep_overrides.get(&entity.trim().to_lowercase()).copied()
    }

    /// Remove all sweep overrides.
    pub fn clear_sweep_overrides(&mut self) {
        self.sweep_overrides.clear();
    }
}

/// Offset of one scalar in the integration history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSlot(usize);

impl StateSlot {
    /// Raw offset, for diagnostics.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// Ring buffer of integration states.
///
/// Generation 0 is the working state of the current (not yet accepted) time
/// point; generations 1.. are previously accepted points, newest first.
/// Rejecting a step simply discards generation 0; accepting rotates.
#[derive(Debug, Clone)]
pub struct StateHistory {
    slots: usize,
    generations: Vec<DVector<f64>>,
}

/// History depth: current point plus two accepted points, enough for
/// second-order integration and its error estimate.
const DEPTH: usize = 3;

impl Default for StateHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHistory {
    /// Create an empty history; devices allocate slots before `build`.
    pub fn new() -> Self {
        Self {
            slots: 0,
            generations: Vec::new(),
        }
    }

    /// Allocate `count` consecutive slots and return the first.
    pub fn allocate(&mut self, count: usize) -> StateSlot {
        assert!(
            self.generations.is_empty(),
            "state slots must be allocated before build()"
        );
        let slot = StateSlot(self.slots);
        self.slots += count;
        slot
    }

    /// Materialise the ring buffer after all allocations.
    pub fn build(&mut self) {
        self.generations = (0..DEPTH).map(|_| DVector::zeros(self.slots.max(1))).collect();
    }

    /// Number of allocated slots.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Read a slot at the given age (0 = working, 1 = last accepted, ...).
    pub fn value(&self, slot: StateSlot, age: usize) -> f64 {
        self.generations[age][slot.0]
    }

    /// Write a slot of the working generation.
    pub fn set(&mut self, slot: StateSlot, value: f64) {
        self.generations[0][slot.0] = value;
    }

    /// Copy the working generation into every age, seeding the history at
    /// the start of a transient run.
    pub fn seed(&mut self) {
        for age in 1..DEPTH {
            let current = self.generations[0].clone();
            self.generations[age].copy_from(&current);
        }
    }

    /// Commit the working generation: ages shift by one.
    pub fn rotate(&mut self) {
        for age in (1..DEPTH).rev() {
            let newer = self.generations[age - 1].clone();
            self.generations[age].copy_from(&newer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{VariableKind, VariableSet};

    #[test]
    fn test_ground_entry_stays_zero() {
        let mut vars = VariableSet::new();
        let a = vars.create("a", VariableKind::Voltage).unwrap();
        let mut state = BiasState::new(vars.unknowns(), 300.15, 1e-12);
        state.solution[a.index()] = 3.0;
        assert_eq!(state.value(vars.ground()), 0.0);
        assert_eq!(state.voltage_diff(a, vars.ground()), 3.0);
    }

    #[test]
    fn test_sweep_override_is_case_insensitive() {
        let mut state = BiasState::new(0, 300.15, 1e-12);
        state.set_sweep_override("V1", 2.5);
        assert_eq!(state.sweep_override(" v1 "), Some(2.5));
        assert_eq!(state.sweep_override("v2"), None);
    }

    #[test]
    fn test_history_rotation() {
        let mut history = StateHistory::new();
        let q = history.allocate(2);
        history.build();

        history.set(q, 1.0);
        history.seed();
        history.set(q, 2.0);
        assert_eq!(history.value(q, 0), 2.0);
        assert_eq!(history.value(q, 1), 1.0);

        history.rotate();
        assert_eq!(history.value(q, 1), 2.0);
        assert_eq!(history.value(q, 2), 1.0);
    }

    #[test]
    fn test_reject_discards_working_generation() {
        let mut history = StateHistory::new();
        let q = history.allocate(1);
        history.build();
        history.set(q, 1.0);
        history.seed();

        // A rejected step writes the working slot but never rotates.
        history.set(q, 99.0);
        assert_eq!(history.value(q, 1), 1.0);
    }
}
