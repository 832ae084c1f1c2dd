//! Linear inductor.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::{MatrixElement, Solver};
use galvani_core::{
    BaseConfiguration, BiasState, Device, Error, Integrator, ParameterSet, Result, StateHistory,
    StateSlot, Variable,
};

use crate::stamp::BranchStamp;

/// A linear inductor.
///
/// Carries a branch-current unknown: a short at DC, flux integration during
/// transient analysis, `jωL` branch impedance in AC.
#[derive(Debug)]
pub struct Inductor {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl Inductor {
    /// Create an inductor.
    pub fn new(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>, inductance: f64) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("inductance", 0.0).declare("ic", 0.0);
        params
            .set("inductance", inductance)
            .expect("declared just above");
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }

    /// Set the initial current used to seed the transient history.
    pub fn with_ic(mut self, current: f64) -> Self {
        self.params.set("ic", current).expect("declared");
        self
    }
}

impl Device for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![self.pos.clone(), self.neg.clone()]
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn bind(&self, ctx: &mut BindContext) -> Result<Box<dyn DeviceBehaviour>> {
        Ok(Box::new(InductorBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            branch: ctx.branch(&self.name)?,
            inductance: self.params.real("inductance"),
            ic: self.params.given("ic").then(|| self.params.real("ic")),
            flux: None,
            deriv: None,
            stamp: None,
            diag: None,
            ac_stamp: None,
            ac_diag: None,
        }))
    }
}

#[derive(Debug)]
struct InductorBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    branch: Variable,
    inductance: f64,
    ic: Option<f64>,
    flux: Option<StateSlot>,
    deriv: Option<StateSlot>,
    stamp: Option<BranchStamp>,
    diag: Option<MatrixElement>,
    ac_stamp: Option<BranchStamp>,
    ac_diag: Option<MatrixElement>,
}

impl DeviceBehaviour for InductorBehaviour {
    fn temperature(&mut self, _config: &BaseConfiguration) -> Result<()> {
        if self.inductance <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "inductance",
                format!("must be positive, is {}", self.inductance),
            ));
        }
        Ok(())
    }

    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(BranchStamp::bind(solver, self.pos, self.neg, self.branch));
        self.diag = Some(solver.get_element(self.branch.index(), self.branch.index()));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(BranchStamp::bind(solver, self.pos, self.neg, self.branch));
        self.ac_diag = Some(solver.get_element(self.branch.index(), self.branch.index()));
    }

    fn allocate_state(&mut self, history: &mut StateHistory) {
        self.flux = Some(history.allocate(1));
        self.deriv = Some(history.allocate(1));
    }

    fn init_state(&mut self, state: &BiasState, history: &mut StateHistory) {
        let i = self.ic.unwrap_or_else(|| state.value(self.branch));
        let flux = self.flux.expect("allocate_state precedes init_state");
        let deriv = self.deriv.expect("allocate_state precedes init_state");
        history.set(flux, self.inductance * i);
        history.set(deriv, 0.0);
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        // The ±1 coupling pattern; at DC the branch equation degenerates to
        // V(pos) - V(neg) = 0, i.e. a short.
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp_pattern(solver);
        Ok(())
    }

    fn load_time(
        &mut self,
        state: &mut BiasState,
        integrator: &Integrator,
        history: &mut StateHistory,
        solver: &mut Solver<f64>,
    ) -> Result<()> {
        let i = state.value(self.branch);
        let flux = self.flux.expect("allocate_state precedes load_time");
        let deriv = self.deriv.expect("allocate_state precedes load_time");
        history.set(flux, self.inductance * i);

        let res = integrator.integrate(history, flux, deriv, self.inductance);

        // Branch equation: V(pos) - V(neg) - geq * i = history terms.
        let diag = self.diag.expect("bind_matrix precedes load_time");
        let stamp = self.stamp.expect("bind_matrix precedes load_time");
        solver.add(diag, -res.geq);
        stamp.stamp_rhs(solver, res.ceq - res.geq * i);
        Ok(())
    }

    fn load_ac(&mut self, omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        let diag = self.ac_diag.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp_pattern(solver);
        solver.add(diag, -Complex::new(0.0, omega * self.inductance));
    }

    fn truncation_error(&self, integrator: &Integrator, history: &StateHistory) -> f64 {
        let flux = self.flux.expect("allocate_state precedes truncation_error");
        let deriv = self.deriv.expect("allocate_state precedes truncation_error");
        integrator.truncation_error(history, flux, deriv)
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.diag = None;
        self.ac_stamp = None;
        self.ac_diag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_dc_load_is_a_short() {
        let config = BaseConfiguration::default();
        let l = Inductor::new("L1", "a", "b", 1e-3);
        let mut vars = galvani_core::VariableSet::new();
        let mut branches = HashMap::new();
        let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
        let mut behaviour = l.bind(&mut ctx).unwrap();

        assert_eq!(vars.unknowns(), 3, "two nodes plus one branch");

        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);
        behaviour.bind_matrix(&mut solver);
        let mut state = BiasState::new(vars.unknowns(), config.temperature, config.gmin);
        behaviour.load(&mut state, &mut solver).unwrap();

        // Row 3 is the branch equation V(a) - V(b) = 0.
        assert_eq!(solver.value_at(3, 1), 1.0);
        assert_eq!(solver.value_at(3, 2), -1.0);
        assert_eq!(solver.value_at(3, 3), 0.0);
        assert_eq!(solver.rhs_at(3), 0.0);
    }

    #[test]
    fn test_nonpositive_inductance_rejected() {
        let config = BaseConfiguration::default();
        let l = Inductor::new("L1", "a", "0", -1.0);
        let mut vars = galvani_core::VariableSet::new();
        let mut branches = HashMap::new();
        let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
        let mut behaviour = l.bind(&mut ctx).unwrap();
        assert!(behaviour.temperature(&config).is_err());
    }
}
