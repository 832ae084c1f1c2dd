//! Resistor device model.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::Solver;
use galvani_core::{
    BaseConfiguration, BiasState, Device, Error, ParameterSet, Result, Variable,
};

use crate::stamp::ConductanceStamp;

/// A resistor with optional first/second-order temperature coefficients.
#[derive(Debug)]
pub struct Resistor {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl Resistor {
    /// Create a resistor.
    pub fn new(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>, resistance: f64) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params
            .declare("resistance", 0.0)
            .declare("tc1", 0.0)
            .declare("tc2", 0.0);
        params
            .set("resistance", resistance)
            .expect("declared just above");
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }
}

impl Device for Resistor {
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
        Ok(Box::new(ResistorBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            resistance: self.params.real("resistance"),
            tc1: self.params.real("tc1"),
            tc2: self.params.real("tc2"),
            conductance: 0.0,
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct ResistorBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    resistance: f64,
    tc1: f64,
    tc2: f64,
    conductance: f64,
    stamp: Option<ConductanceStamp<f64>>,
    ac_stamp: Option<ConductanceStamp<Complex<f64>>>,
}

impl DeviceBehaviour for ResistorBehaviour {
    fn temperature(&mut self, config: &BaseConfiguration) -> Result<()> {
        let dt = config.temperature - config.nominal_temperature;
        let r = self.resistance * (1.0 + self.tc1 * dt + self.tc2 * dt * dt);
        if r <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "resistance",
                format!("must be positive, is {r} at T = {} K", config.temperature),
            ));
        }
        self.conductance = 1.0 / r;
        Ok(())
    }

    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp(solver, self.conductance);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp(solver, Complex::new(self.conductance, 0.0));
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}
