//! Independent voltage and current sources.
//!
//! Both sources are waveform-valued: the DC analyses use the waveform's DC
//! value, transient analysis evaluates it at the current time, and the AC
//! driver uses the separate small-signal magnitude/phase parameters. Source
//! stepping scales both through `BiasState::source_factor`, and the DC sweep
//! overrides the value by entity name.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::Solver;
use galvani_core::{
    BiasState, Device, ParameterSet, Result, Variable, Waveform,
};

use crate::stamp::{BranchStamp, CurrentStamp};

fn source_value(state: &BiasState, name: &str, waveform: &Waveform) -> f64 {
    let value = match state.sweep_override(name) {
        Some(v) => v,
        None => match state.time {
            Some(t) => waveform.value_at(t),
            None => waveform.dc_value(),
        },
    };
    value * state.source_factor
}

/// An independent voltage source.
///
/// Adds one branch-current variable; the branch equation enforces
/// `V(pos) - V(neg) = value`.
#[derive(Debug)]
pub struct VoltageSource {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl VoltageSource {
    /// Create a DC voltage source.
    pub fn dc(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>, voltage: f64) -> Self {
        Self::with_waveform(name, pos, neg, Waveform::dc(voltage))
    }

    /// Create a source driven by an arbitrary waveform.
    pub fn with_waveform(
        name: impl Into<String>,
        pos: impl Into<String>,
        neg: impl Into<String>,
        waveform: Waveform,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params
            .declare("waveform", Waveform::dc(0.0))
            .declare("acmag", 0.0)
            .declare("acphase", 0.0);
        params.set("waveform", waveform).expect("declared just above");
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }

    /// Set the small-signal magnitude (and zero phase) for AC analysis.
    pub fn with_ac(mut self, magnitude: f64) -> Self {
        self.params.set("acmag", magnitude).expect("declared");
        self
    }
}

impl Device for VoltageSource {
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
        Ok(Box::new(VoltageSourceBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            branch: ctx.branch(&self.name)?,
            waveform: self.params.waveform("waveform").clone(),
            acmag: self.params.real("acmag"),
            acphase: self.params.real("acphase"),
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct VoltageSourceBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    branch: Variable,
    waveform: Waveform,
    acmag: f64,
    acphase: f64,
    stamp: Option<BranchStamp>,
    ac_stamp: Option<BranchStamp>,
}

impl DeviceBehaviour for VoltageSourceBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(BranchStamp::bind(solver, self.pos, self.neg, self.branch));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(BranchStamp::bind(solver, self.pos, self.neg, self.branch));
    }

    fn load(&mut self, state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let value = source_value(state, &self.name, &self.waveform);
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp(solver, value);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        let phase = self.acphase.to_radians();
        stamp.stamp(solver, Complex::from_polar(self.acmag, phase));
    }

    fn breakpoints(&self, stop: f64) -> Vec<f64> {
        self.waveform.breakpoints(stop)
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}

/// An independent current source. Current flows from `pos` through the
/// source to `neg`.
#[derive(Debug)]
pub struct CurrentSource {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl CurrentSource {
    /// Create a DC current source.
    pub fn dc(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>, current: f64) -> Self {
        Self::with_waveform(name, pos, neg, Waveform::dc(current))
    }

    /// Create a source driven by an arbitrary waveform.
    pub fn with_waveform(
        name: impl Into<String>,
        pos: impl Into<String>,
        neg: impl Into<String>,
        waveform: Waveform,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params
            .declare("waveform", Waveform::dc(0.0))
            .declare("acmag", 0.0)
            .declare("acphase", 0.0);
        params.set("waveform", waveform).expect("declared just above");
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }

    /// Set the small-signal magnitude for AC analysis.
    pub fn with_ac(mut self, magnitude: f64) -> Self {
        self.params.set("acmag", magnitude).expect("declared");
        self
    }
}

impl Device for CurrentSource {
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
        Ok(Box::new(CurrentSourceBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            waveform: self.params.waveform("waveform").clone(),
            acmag: self.params.real("acmag"),
            acphase: self.params.real("acphase"),
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct CurrentSourceBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    waveform: Waveform,
    acmag: f64,
    acphase: f64,
    stamp: Option<CurrentStamp>,
    ac_stamp: Option<CurrentStamp>,
}

impl DeviceBehaviour for CurrentSourceBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(CurrentStamp::bind(solver, self.pos, self.neg));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(CurrentStamp::bind(solver, self.pos, self.neg));
    }

    fn load(&mut self, state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let value = source_value(state, &self.name, &self.waveform);
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp(solver, value);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        let phase = self.acphase.to_radians();
        stamp.stamp(solver, Complex::from_polar(self.acmag, phase));
    }

    fn breakpoints(&self, stop: f64) -> Vec<f64> {
        self.waveform.breakpoints(stop)
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}
