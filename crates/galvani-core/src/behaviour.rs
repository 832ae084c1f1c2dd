//! The per-simulation behaviour a device binds to an analysis.
//!
//! Entities are passive descriptions; at the start of a run every entity
//! constructs one behaviour object through [`crate::entity::Device::bind`].
//! The behaviour owns the matrix handles, state slots and cached model
//! values for that run, and is discarded at `unsetup`.

use std::collections::HashMap;

use num_complex::Complex;

use crate::config::BaseConfiguration;
use crate::error::{Error, Result};
use crate::integrate::Integrator;
use crate::sparse::Solver;
use crate::state::{BiasState, StateHistory};
use crate::variables::{Variable, VariableKind, VariableSet};

/// Context handed to [`crate::entity::Device::bind`].
///
/// Wraps the variable set with the naming conventions of the simulator:
/// pins are voltage variables, branch equations are current variables
/// published under the owning entity's name.
pub struct BindContext<'a> {
    /// Simulation configuration (read-only).
    pub config: &'a BaseConfiguration,
    variables: &'a mut VariableSet,
    branches: &'a mut HashMap<String, Variable>,
}

impl<'a> BindContext<'a> {
    /// Create a context over a variable set and branch registry.
    pub fn new(
        config: &'a BaseConfiguration,
        variables: &'a mut VariableSet,
        branches: &'a mut HashMap<String, Variable>,
    ) -> Self {
        Self {
            config,
            variables,
            branches,
        }
    }

    /// Resolve a pin to its node voltage variable, creating it on first use.
    pub fn node(&mut self, name: &str) -> Result<Variable> {
        self.variables.create(name, VariableKind::Voltage)
    }

    /// Allocate an internal node private to `entity` (e.g. the diode's
    /// series-resistance node).
    pub fn internal(&mut self, entity: &str, suffix: &str) -> Result<Variable> {
        self.variables
            .create(&format!("{entity}#{suffix}"), VariableKind::Voltage)
    }

    /// Allocate the branch-current variable of `entity` and publish it for
    /// current-controlled devices.
    pub fn branch(&mut self, entity: &str) -> Result<Variable> {
        let variable = self
            .variables
            .create(&format!("{entity}#branch"), VariableKind::Current)?;
        self.branches
            .insert(entity.trim().to_lowercase(), variable);
        Ok(variable)
    }

    /// Look up the published branch variable of a controlling entity.
    ///
    /// Fails with [`Error::UnknownEntity`] when no such branch exists; the
    /// binder constructs controlling sources first, so a miss means the
    /// reference is genuinely unresolved.
    pub fn controlling_branch(&self, entity: &str) -> Result<Variable> {
        self.branches
            .get(&entity.trim().to_lowercase())
            .copied()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }
}

/// Analysis-facing behaviour of one bound entity.
///
/// The default implementations make every method beyond biasing optional:
/// a resistor only overrides the biasing and AC loads, a capacitor the
/// reactive ones, a waveform source the breakpoint hook, and so on.
pub trait DeviceBehaviour {
    /// Recompute temperature-dependent model values.
    ///
    /// Called once before the first load and again whenever the simulation
    /// temperature changes. Parameter range checks that depend on the
    /// temperature-adjusted values live here.
    fn temperature(&mut self, _config: &BaseConfiguration) -> Result<()> {
        Ok(())
    }

    /// Request all real matrix and RHS handles.
    fn bind_matrix(&mut self, solver: &mut Solver<f64>);

    /// Request complex handles for AC analysis.
    fn bind_ac_matrix(&mut self, _solver: &mut Solver<Complex<f64>>) {}

    /// Allocate integration-state slots.
    fn allocate_state(&mut self, _history: &mut StateHistory) {}

    /// Seed integration state from the initial operating point.
    fn init_state(&mut self, _state: &BiasState, _history: &mut StateHistory) {}

    /// Stamp the biasing (DC / transient resistive) contribution.
    ///
    /// Contributions at Newton iteration *k* may depend only on the
    /// solution at iteration *k-1* (`state.solution`) and on accepted
    /// history. A behaviour that limited its own update sets `state.check`.
    fn load(&mut self, state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()>;

    /// Stamp the reactive companion contribution during transient analysis.
    fn load_time(
        &mut self,
        _state: &mut BiasState,
        _integrator: &Integrator,
        _history: &mut StateHistory,
        _solver: &mut Solver<f64>,
    ) -> Result<()> {
        Ok(())
    }

    /// Stamp the small-signal contribution at angular frequency `omega`.
    ///
    /// Runs after the operating point converged; nonlinear behaviours stamp
    /// the Jacobian values they recorded during their last biasing load.
    fn load_ac(&mut self, _omega: f64, _solver: &mut Solver<Complex<f64>>) {}

    /// Per-device convergence verdict for the current iterate.
    fn is_convergent(&self, _state: &BiasState, _config: &BaseConfiguration) -> bool {
        true
    }

    /// Local truncation error of this behaviour's states for the step just
    /// solved. Non-reactive behaviours report zero.
    fn truncation_error(&self, _integrator: &Integrator, _history: &StateHistory) -> f64 {
        0.0
    }

    /// Time points the transient driver must land on exactly.
    fn breakpoints(&self, _stop: f64) -> Vec<f64> {
        Vec::new()
    }

    /// Notification that the pending time point was committed.
    fn accept(&mut self, _state: &BiasState, _history: &StateHistory) {}

    /// Release per-simulation resources. Matrix handles become invalid when
    /// the driver clears the solver afterwards.
    fn unsetup(&mut self) {}
}
