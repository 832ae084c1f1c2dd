//! Voltage-controlled switch with hysteresis.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::Solver;
use galvani_core::{
    BaseConfiguration, BiasState, Device, Error, ParameterSet, Result, StateHistory, Variable,
};

use crate::stamp::ConductanceStamp;

/// A voltage-controlled switch.
///
/// Closes when the controlling voltage rises through `von`, opens when it
/// falls through `voff`; between the two thresholds the previously accepted
/// state is retained, which is what prevents chatter. The state commits only
/// in `accept`, so a rejected time point cannot toggle the switch.
#[derive(Debug)]
pub struct VSwitch {
    name: String,
    pos: String,
    neg: String,
    ctrl_pos: String,
    ctrl_neg: String,
    params: ParameterSet,
}

impl VSwitch {
    /// Create a switch with the default model (von=1, voff=0, ron=1,
    /// roff=1meg), initially open.
    pub fn new(
        name: impl Into<String>,
        pos: impl Into<String>,
        neg: impl Into<String>,
        ctrl_pos: impl Into<String>,
        ctrl_neg: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params
            .declare("von", 1.0)
            .declare("voff", 0.0)
            .declare("ron", 1.0)
            .declare("roff", 1e6)
            .declare("ic", false);
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            ctrl_pos: ctrl_pos.into(),
            ctrl_neg: ctrl_neg.into(),
            params,
        }
    }
}

impl Device for VSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![
            self.pos.clone(),
            self.neg.clone(),
            self.ctrl_pos.clone(),
            self.ctrl_neg.clone(),
        ]
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn bind(&self, ctx: &mut BindContext) -> Result<Box<dyn DeviceBehaviour>> {
        let initial = self.params.bool("ic");
        Ok(Box::new(VSwitchBehaviour {
            name: self.name.clone(),
            pos: ctx.node(&self.pos)?,
            neg: ctx.node(&self.neg)?,
            ctrl_pos: ctx.node(&self.ctrl_pos)?,
            ctrl_neg: ctx.node(&self.ctrl_neg)?,
            von: self.params.real("von"),
            voff: self.params.real("voff"),
            g_on: 0.0,
            g_off: 0.0,
            ron: self.params.real("ron"),
            roff: self.params.real("roff"),
            accepted_on: initial,
            loaded_on: initial,
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct VSwitchBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    ctrl_pos: Variable,
    ctrl_neg: Variable,
    von: f64,
    voff: f64,
    ron: f64,
    roff: f64,
    g_on: f64,
    g_off: f64,
    /// State committed at the last accepted point; the in-band fallback.
    accepted_on: bool,
    /// State used by the most recent load, for chatter detection.
    loaded_on: bool,
    stamp: Option<ConductanceStamp<f64>>,
    ac_stamp: Option<ConductanceStamp<Complex<f64>>>,
}

impl VSwitchBehaviour {
    /// The hysteretic decision for a controlling voltage.
    fn decide(&self, vctrl: f64) -> bool {
        if vctrl >= self.von {
            true
        } else if vctrl <= self.voff {
            false
        } else {
            self.accepted_on
        }
    }
}

impl DeviceBehaviour for VSwitchBehaviour {
    fn temperature(&mut self, _config: &BaseConfiguration) -> Result<()> {
        if self.ron <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "ron",
                format!("must be positive, is {}", self.ron),
            ));
        }
        if self.roff <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "roff",
                format!("must be positive, is {}", self.roff),
            ));
        }
        if self.von <= self.voff {
            return Err(Error::bad_parameter(
                &self.name,
                "von",
                format!(
                    "hysteresis band is empty: von = {} <= voff = {}",
                    self.von, self.voff
                ),
            ));
        }
        self.g_on = 1.0 / self.ron;
        self.g_off = 1.0 / self.roff;
        Ok(())
    }

    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(ConductanceStamp::bind(solver, self.pos, self.neg));
    }

    fn load(&mut self, state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let vctrl = state.voltage_diff(self.ctrl_pos, self.ctrl_neg);
        let on = self.decide(vctrl);
        if on != self.loaded_on {
            // The switch flipped within this Newton solve; iterate again so
            // the rest of the circuit settles against the new conductance.
            state.check = true;
        }
        self.loaded_on = on;

        let g = if on { self.g_on } else { self.g_off };
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp(solver, g);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let g = if self.accepted_on { self.g_on } else { self.g_off };
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp(solver, Complex::new(g, 0.0));
    }

    fn accept(&mut self, state: &BiasState, _history: &StateHistory) {
        let vctrl = state.voltage_diff(self.ctrl_pos, self.ctrl_neg);
        self.accepted_on = self.decide(vctrl);
        self.loaded_on = self.accepted_on;
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}
