//! The shared simulation engine: binding, the Newton loop, and the
//! operating-point recovery ladder.

use std::collections::HashMap;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::{MatrixElement, Solver};
use galvani_core::{
    BaseConfiguration, BiasState, Circuit, Error, InitMode, Integrator, Result, StateHistory,
    VariableKind, VariableSet,
};

use crate::solution::Solution;

/// What the Newton loop loads each iteration.
#[derive(Clone, Copy)]
pub(crate) enum LoadMode<'a> {
    /// Biasing only (OP, DC sweep).
    Bias,
    /// Biasing plus reactive companion models.
    Time(&'a Integrator),
}

/// A circuit bound to one simulation run.
pub(crate) struct Engine {
    pub(crate) config: BaseConfiguration,
    pub(crate) variables: VariableSet,
    behaviours: Vec<(String, Box<dyn DeviceBehaviour>)>,
    pub(crate) solver: Solver<f64>,
    pub(crate) state: BiasState,
    pub(crate) history: StateHistory,
    /// Diagonal handles of every voltage node, for gmin stepping.
    shunts: Vec<MatrixElement>,
    /// Extra shunt conductance applied during gmin stepping.
    shunt_gmin: f64,
}

impl Engine {
    /// Bind every entity of the circuit, in topological order of controlling
    /// references, and prepare solver, state and history.
    pub(crate) fn bind(circuit: &Circuit, config: &BaseConfiguration) -> Result<Engine> {
        let order = bind_order(circuit)?;

        let mut variables = VariableSet::new();
        let mut branches = HashMap::new();
        let mut behaviours = Vec::with_capacity(order.len());
        for name in &order {
            let device = circuit
                .lookup(name)
                .ok_or_else(|| Error::UnknownEntity(name.clone()))?;
            let mut ctx = BindContext::new(config, &mut variables, &mut branches);
            let behaviour = device.bind(&mut ctx)?;
            behaviours.push((device.name().to_string(), behaviour));
        }

        let mut solver = Solver::new(
            variables.unknowns(),
            config.pivot_rel_tol,
            config.pivot_abs_tol,
        );
        for (name, behaviour) in &mut behaviours {
            solver.set_debug_tag(name);
            behaviour.bind_matrix(&mut solver);
        }

        for (_, behaviour) in &mut behaviours {
            behaviour.temperature(config)?;
        }

        let mut history = StateHistory::new();
        for (_, behaviour) in &mut behaviours {
            behaviour.allocate_state(&mut history);
        }
        history.build();

        let shunts = variables
            .iter()
            .filter(|v| !v.is_ground() && v.kind() == VariableKind::Voltage)
            .map(|v| solver.get_element(v.index(), v.index()))
            .collect();

        let state = BiasState::new(variables.unknowns(), config.temperature, config.gmin);

        Ok(Engine {
            config: config.clone(),
            variables,
            behaviours,
            solver,
            state,
            history,
            shunts,
            shunt_gmin: 0.0,
        })
    }

    /// Run the Newton loop until convergence or `max_iter`.
    ///
    /// Convergence requires every variable's update within tolerance, no
    /// behaviour raising `check`, and every behaviour's own convergence
    /// verdict. The first two iterations walk the Junction/Fix init modes
    /// and never count as converged.
    pub(crate) fn iterate(&mut self, max_iter: usize, mode: LoadMode) -> Result<usize> {
        let unknowns = self.variables.unknowns();
        let mut max_delta = f64::INFINITY;

        for iteration in 1..=max_iter {
            if self.config.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let settling = self.state.init_mode != InitMode::Float;

            self.solver.reset();
            self.state.check = false;
            for (_, behaviour) in &mut self.behaviours {
                behaviour.load(&mut self.state, &mut self.solver)?;
            }
            if let LoadMode::Time(integrator) = mode {
                for (_, behaviour) in &mut self.behaviours {
                    behaviour.load_time(
                        &mut self.state,
                        integrator,
                        &mut self.history,
                        &mut self.solver,
                    )?;
                }
            }
            if self.shunt_gmin > 0.0 {
                for &shunt in &self.shunts {
                    self.solver.add(shunt, self.shunt_gmin);
                }
            }

            self.solver.factor()?;
            let x = self.solver.solve()?;

            self.state.old_solution.copy_from(&self.state.solution);
            for i in 0..unknowns {
                self.state.solution[i + 1] = x[i];
            }

            max_delta = 0.0;
            let mut within_tolerance = true;
            for variable in self.variables.iter().skip(1) {
                let new = self.state.solution[variable.index()];
                let old = self.state.old_solution[variable.index()];
                let delta = (new - old).abs();
                max_delta = max_delta.max(delta);
                let abs = match variable.kind() {
                    VariableKind::Voltage => self.config.vn_tol,
                    _ => self.config.abs_tol,
                };
                if delta > self.config.rel_tol * new.abs().max(old.abs()) + abs {
                    within_tolerance = false;
                }
            }

            // Advance the init-mode ladder.
            self.state.init_mode = match self.state.init_mode {
                InitMode::Junction => InitMode::Fix,
                InitMode::Fix | InitMode::Float => InitMode::Float,
            };

            if settling || !within_tolerance || self.state.check {
                continue;
            }
            let devices_agree = self
                .behaviours
                .iter()
                .all(|(_, b)| b.is_convergent(&self.state, &self.config));
            if devices_agree {
                return Ok(iteration);
            }
        }

        Err(Error::NoConvergence {
            iterations: max_iter,
            residual: max_delta,
            step: 0.0,
        })
    }

    /// Operating-point solve with the recovery ladder: plain Newton, then
    /// source stepping, then gmin stepping.
    pub(crate) fn op_solve(&mut self) -> Result<usize> {
        self.state.init_mode = InitMode::Junction;
        let err = match self.iterate(self.config.itl1, LoadMode::Bias) {
            Ok(n) => return Ok(n),
            Err(e @ Error::NoConvergence { .. }) => e,
            Err(e) => return Err(e),
        };

        log::warn!("operating point did not converge, enabling source stepping");
        match self.source_stepping() {
            Ok(n) => return Ok(n),
            Err(Error::NoConvergence { .. }) => {}
            Err(e) => return Err(e),
        }

        log::warn!("source stepping failed, enabling gmin stepping");
        match self.gmin_stepping() {
            Ok(n) => return Ok(n),
            Err(Error::NoConvergence { .. }) => {}
            Err(e) => return Err(e),
        }

        Err(err)
    }

    /// Scale all independent sources from 0 to 1 in `src_steps` substeps,
    /// each solved from the previous substep's solution.
    fn source_stepping(&mut self) -> Result<usize> {
        self.state.solution.fill(0.0);
        self.state.init_mode = InitMode::Junction;
        let mut iterations = 0;
        for step in 1..=self.config.src_steps {
            self.state.source_factor = step as f64 / self.config.src_steps as f64;
            match self.iterate(self.config.itl2, LoadMode::Bias) {
                Ok(n) => iterations += n,
                Err(e) => {
                    self.state.source_factor = 1.0;
                    return Err(e);
                }
            }
        }
        self.state.source_factor = 1.0;
        Ok(iterations)
    }

    /// Shunt every voltage node to ground, starting hard and releasing one
    /// decade at a time down to the configured gmin.
    fn gmin_stepping(&mut self) -> Result<usize> {
        self.state.solution.fill(0.0);
        self.state.init_mode = InitMode::Junction;
        let mut iterations = 0;
        for step in (0..=self.config.gmin_steps).rev() {
            self.shunt_gmin = if step == 0 {
                0.0
            } else {
                self.config.gmin * 10f64.powi(step as i32)
            };
            match self.iterate(self.config.itl2, LoadMode::Bias) {
                Ok(n) => iterations += n,
                Err(e) => {
                    self.shunt_gmin = 0.0;
                    return Err(e);
                }
            }
        }
        self.shunt_gmin = 0.0;
        Ok(iterations)
    }

    /// Snapshot the current solution with the variable map.
    pub(crate) fn solution(&self) -> Solution {
        Solution::new(self.variables.clone(), self.state.solution.clone())
    }

    /// Seed integration state from the current (operating-point) solution.
    pub(crate) fn init_time_states(&mut self) {
        for (_, behaviour) in &mut self.behaviours {
            behaviour.init_state(&self.state, &mut self.history);
        }
        self.history.seed();
    }

    /// All breakpoints published by the behaviours, in `(0, stop]`.
    pub(crate) fn breakpoints(&self, stop: f64) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .behaviours
            .iter()
            .flat_map(|(_, b)| b.breakpoints(stop))
            .collect();
        points.sort_by(|a, b| a.partial_cmp(b).expect("breakpoints are finite"));
        points.dedup_by(|a, b| (*a - *b).abs() < stop * 1e-12);
        points
    }

    /// Largest truncation error reported by any behaviour.
    pub(crate) fn truncation_error(&self, integrator: &Integrator) -> f64 {
        self.behaviours
            .iter()
            .map(|(_, b)| b.truncation_error(integrator, &self.history))
            .fold(0.0, f64::max)
    }

    /// Commit the pending time point: rotate history, notify behaviours.
    pub(crate) fn accept(&mut self) {
        self.history.rotate();
        for (_, behaviour) in &mut self.behaviours {
            behaviour.accept(&self.state, &self.history);
        }
    }

    /// Tear the run down: unsetup every behaviour and invalidate handles.
    pub(crate) fn finish(&mut self) {
        for (_, behaviour) in &mut self.behaviours {
            behaviour.unsetup();
        }
        self.solver.clear();
    }

    pub(crate) fn behaviours_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut Box<dyn DeviceBehaviour>)> {
        self.behaviours
            .iter_mut()
            .map(|(name, b)| (name.as_str(), b))
    }
}

/// Order entities so that anything a device names as its controlling source
/// is bound before the device itself.
fn bind_order(circuit: &Circuit) -> Result<Vec<String>> {
    let mut placed: Vec<String> = Vec::with_capacity(circuit.len());
    let mut done: HashMap<String, bool> = HashMap::new();
    let mut pending: Vec<&dyn galvani_core::Device> = circuit.iter().collect();

    // Every controlling reference must name an entity in the circuit.
    for device in &pending {
        if let Some(ctrl) = device.controlling() {
            if circuit.lookup(ctrl).is_none() {
                return Err(Error::UnknownEntity(ctrl.to_string()));
            }
        }
    }

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|device| {
            let ready = device
                .controlling()
                .map(|ctrl| done.get(&canonical(ctrl)).copied().unwrap_or(false))
                .unwrap_or(true);
            if ready {
                done.insert(canonical(device.name()), true);
                placed.push(device.name().to_string());
            }
            !ready
        });
        if pending.len() == before {
            // A reference cycle; report one participant.
            return Err(Error::UnknownEntity(pending[0].name().to_string()));
        }
    }

    Ok(placed)
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}
