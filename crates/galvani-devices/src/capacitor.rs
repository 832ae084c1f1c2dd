//! Linear capacitor.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::Solver;
use galvani_core::{
    BaseConfiguration, BiasState, Device, Error, Integrator, ParameterSet, Result, StateHistory,
    StateSlot, Variable,
};

use crate::stamp::{ConductanceStamp, CurrentStamp};

/// A linear capacitor. Open at DC; integrated as a Norton companion during
/// transient analysis; `jωC` in AC.
#[derive(Debug)]
pub struct Capacitor {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl Capacitor {
    /// Create a capacitor.
    pub fn new(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>, capacitance: f64) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("capacitance", 0.0).declare("ic", 0.0);
        params
            .set("capacitance", capacitance)
            .expect("declared just above");
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }

    /// Set the initial voltage used to seed the transient history.
    pub fn with_ic(mut self, voltage: f64) -> Self {
        self.params.set("ic", voltage).expect("declared");
        self
    }
}

impl Device for Capacitor {
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
        Ok(Box::new(CapacitorBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            capacitance: self.params.real("capacitance"),
            ic: self.params.given("ic").then(|| self.params.real("ic")),
            charge: None,
            deriv: None,
            stamp: None,
            current: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct CapacitorBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    capacitance: f64,
    ic: Option<f64>,
    charge: Option<StateSlot>,
    deriv: Option<StateSlot>,
    stamp: Option<ConductanceStamp<f64>>,
    current: Option<CurrentStamp>,
    ac_stamp: Option<ConductanceStamp<Complex<f64>>>,
}

impl DeviceBehaviour for CapacitorBehaviour {
    fn temperature(&mut self, _config: &BaseConfiguration) -> Result<()> {
        if self.capacitance <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "capacitance",
                format!("must be positive, is {}", self.capacitance),
            ));
        }
        Ok(())
    }

    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
        self.current = Some(CurrentStamp::bind(solver, self.pos, self.neg));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
    }

    fn allocate_state(&mut self, history: &mut StateHistory) {
        self.charge = Some(history.allocate(1));
        self.deriv = Some(history.allocate(1));
    }

    fn init_state(&mut self, state: &BiasState, history: &mut StateHistory) {
        let v = self.ic.unwrap_or_else(|| state.voltage_diff(self.pos, self.neg));
        let charge = self.charge.expect("allocate_state precedes init_state");
        let deriv = self.deriv.expect("allocate_state precedes init_state");
        history.set(charge, self.capacitance * v);
        history.set(deriv, 0.0);
    }

    fn load(&mut self, _state: &mut BiasState, _solver: &mut Solver<f64>) -> Result<()> {
        // Open circuit at DC; all stamping happens in load_time.
        Ok(())
    }

    fn load_time(
        &mut self,
        state: &mut BiasState,
        integrator: &Integrator,
        history: &mut StateHistory,
        solver: &mut Solver<f64>,
    ) -> Result<()> {
        let v = state.voltage_diff(self.pos, self.neg);
        let charge = self.charge.expect("allocate_state precedes load_time");
        let deriv = self.deriv.expect("allocate_state precedes load_time");
        history.set(charge, self.capacitance * v);

        let res = integrator.integrate(history, charge, deriv, self.capacitance);
        let ieq = res.ceq - res.geq * v;

        let stamp = self.stamp.expect("bind_matrix precedes load_time");
        let current = self.current.expect("bind_matrix precedes load_time");
        stamp.stamp(solver, res.geq);
        current.stamp(solver, ieq);
        Ok(())
    }

    fn load_ac(&mut self, omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp(solver, Complex::new(0.0, omega * self.capacitance));
    }

    fn truncation_error(&self, integrator: &Integrator, history: &StateHistory) -> f64 {
        let charge = self.charge.expect("allocate_state precedes truncation_error");
        let deriv = self.deriv.expect("allocate_state precedes truncation_error");
        integrator.truncation_error(history, charge, deriv)
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.current = None;
        self.ac_stamp = None;
    }
}
