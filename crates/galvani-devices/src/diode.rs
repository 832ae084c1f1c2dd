//! Junction diode model.
//!
//! Three continuous current regimes: forward/weak-reverse exponential,
//! deep-reverse polynomial, and breakdown exponential (active only when a
//! breakdown voltage was explicitly given). Series resistance allocates an
//! internal node; the depletion capacitance feeds the integrator during
//! transient analysis and stamps `jω·Cj(vd)` in AC.

use std::f64::consts::{E, SQRT_2};

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::Solver;
use galvani_core::{
    BaseConfiguration, BiasState, Device, Error, InitMode, Integrator, ParameterSet, Result,
    StateHistory, StateSlot, Variable,
};

use crate::limit::pnjlim;
use crate::stamp::{ConductanceStamp, CurrentStamp};

/// Thermal voltage kT/q at a given temperature.
pub fn thermal_voltage(temp_k: f64) -> f64 {
    const K_BOLTZMANN: f64 = 1.380649e-23;
    const Q_ELECTRON: f64 = 1.602176634e-19;
    K_BOLTZMANN * temp_k / Q_ELECTRON
}

/// A junction diode.
#[derive(Debug)]
pub struct Diode {
    name: String,
    pos: String,
    neg: String,
    params: ParameterSet,
}

impl Diode {
    /// Create a diode with default model parameters.
    pub fn new(name: impl Into<String>, pos: impl Into<String>, neg: impl Into<String>) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params
            .declare("is", 1e-14)
            .declare("n", 1.0)
            .declare("rs", 0.0)
            .declare("bv", f64::INFINITY)
            .declare("ibv", 1e-3)
            .declare("cjo", 0.0)
            .declare("vj", 1.0)
            .declare("m", 0.5)
            .declare("fc", 0.5)
            .declare("off", false);
        Self {
            name,
            pos: pos.into(),
            neg: neg.into(),
            params,
        }
    }
}

impl Device for Diode {
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
        Ok(Box::new(self.behaviour(ctx)?))
    }
}

impl Diode {
    fn behaviour(&self, ctx: &mut BindContext) -> Result<DiodeBehaviour> {
        let pos = ctx.node(&self.pos)?;
        let neg = ctx.node(&self.neg)?;
        let rs = self.params.real("rs");
        // The internal anode exists only when series resistance separates it
        // from the terminal; otherwise it aliases the terminal node.
        let internal = if rs > 0.0 {
            ctx.internal(&self.name, "internal")?
        } else {
            pos
        };
        Ok(DiodeBehaviour {
            name: self.name.clone(),
            pos,
            neg,
            internal,
            is: self.params.real("is"),
            n: self.params.real("n"),
            rs,
            bv: self.params.given("bv").then(|| self.params.real("bv")),
            ibv: self.params.real("ibv"),
            cjo: self.params.real("cjo"),
            vj: self.params.real("vj"),
            m: self.params.real("m"),
            fc: self.params.real("fc"),
            off: self.params.bool("off"),
            nvt: 0.0,
            vcrit: 0.0,
            xbv: None,
            gspr: if rs > 0.0 { 1.0 / rs } else { 0.0 },
            vd: 0.0,
            id: 0.0,
            gd: 0.0,
            cap: 0.0,
            junction: None,
            current: None,
            series: None,
            ac_junction: None,
            ac_series: None,
            charge: None,
            deriv: None,
        })
    }
}

#[derive(Debug)]
struct DiodeBehaviour {
    name: String,
    pos: Variable,
    neg: Variable,
    internal: Variable,
    // Model parameters.
    is: f64,
    n: f64,
    rs: f64,
    bv: Option<f64>,
    ibv: f64,
    cjo: f64,
    vj: f64,
    m: f64,
    fc: f64,
    off: bool,
    // Temperature-derived values.
    nvt: f64,
    vcrit: f64,
    /// Effective breakdown voltage, shifted so the current at -bv is ibv.
    xbv: Option<f64>,
    gspr: f64,
    // Operating point of the last load, reused for convergence checks,
    // limiting and the AC stamp.
    vd: f64,
    id: f64,
    gd: f64,
    cap: f64,
    // Handles and state.
    junction: Option<ConductanceStamp<f64>>,
    current: Option<CurrentStamp>,
    series: Option<ConductanceStamp<f64>>,
    ac_junction: Option<ConductanceStamp<Complex<f64>>>,
    ac_series: Option<ConductanceStamp<Complex<f64>>>,
    charge: Option<StateSlot>,
    deriv: Option<StateSlot>,
}

impl DiodeBehaviour {
    /// Diode current and conductance at junction voltage `vd`, without the
    /// gmin contribution.
    fn evaluate(&self, vd: f64) -> (f64, f64) {
        if vd >= -3.0 * self.nvt {
            // Forward and weak reverse: the Shockley exponential.
            let evd = (vd / self.nvt).exp();
            let id = self.is * (evd - 1.0);
            let gd = self.is * evd / self.nvt;
            (id, gd)
        } else if self.xbv.map_or(true, |xbv| vd >= -xbv) {
            // Deep reverse: polynomial continuation, value and slope
            // continuous at vd = -3·n·vt.
            let arg = 3.0 * self.nvt / (vd * E);
            let arg3 = arg * arg * arg;
            let id = -self.is * (1.0 + arg3);
            let gd = self.is * 3.0 * arg3 / vd;
            (id, gd)
        } else {
            // Breakdown: exponential rise; xbv is placed so the current
            // reaches ibv at the specified breakdown voltage.
            let xbv = self.xbv.expect("breakdown arm requires bv");
            let evrev = (-(xbv + vd) / self.nvt).exp();
            let id = -self.is * evrev;
            let gd = self.is * evrev / self.nvt;
            (id, gd)
        }
    }

    /// Apply junction limiting to the candidate voltage, honouring the
    /// breakdown region when one exists.
    fn limit(&self, vnew: f64, state: &mut BiasState) -> f64 {
        let vold = self.vd;
        // In breakdown the exponential runs in -(xbv + vd); limit that
        // variable with the same rule.
        if let Some(xbv) = self.xbv {
            if vnew < (-xbv + 10.0 * self.nvt).min(0.0) {
                let res = pnjlim(-(xbv + vnew), -(xbv + vold), self.nvt, self.vcrit);
                if res.force_extra_iteration {
                    state.check = true;
                }
                return -(xbv + res.vd);
            }
        }
        let res = pnjlim(vnew, vold, self.nvt, self.vcrit);
        if res.force_extra_iteration {
            state.check = true;
        }
        res.vd
    }

    /// Depletion charge and capacitance at junction voltage `vd`.
    fn depletion(&self, vd: f64) -> (f64, f64) {
        let fcvj = self.fc * self.vj;
        if vd < fcvj {
            let arg = 1.0 - vd / self.vj;
            let sarg = arg.powf(-self.m);
            let q = self.cjo * self.vj * (1.0 - arg * sarg) / (1.0 - self.m);
            let c = self.cjo * sarg;
            (q, c)
        } else {
            // Linear extrapolation past fc·vj where the power law blows up.
            let f1 = self.vj * (1.0 - (1.0 - self.fc).powf(1.0 - self.m)) / (1.0 - self.m);
            let f2 = (1.0 - self.fc).powf(1.0 + self.m);
            let f3 = 1.0 - self.fc * (1.0 + self.m);
            let q = self.cjo * f1
                + self.cjo / f2
                    * (f3 * (vd - fcvj) + self.m / (2.0 * self.vj) * (vd * vd - fcvj * fcvj));
            let c = self.cjo / f2 * (f3 + self.m * vd / self.vj);
            (q, c)
        }
    }
}

impl DeviceBehaviour for DiodeBehaviour {
    fn temperature(&mut self, config: &BaseConfiguration) -> Result<()> {
        if self.is <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "is",
                format!("saturation current must be positive, is {}", self.is),
            ));
        }
        if self.n <= 0.0 {
            return Err(Error::bad_parameter(
                &self.name,
                "n",
                format!("emission coefficient must be positive, is {}", self.n),
            ));
        }
        self.nvt = self.n * thermal_voltage(config.temperature);
        self.vcrit = self.nvt * (self.nvt / (SQRT_2 * self.is)).ln();
        self.xbv = self
            .bv
            .map(|bv| bv - self.nvt * (self.ibv / self.is).ln());
        Ok(())
    }

    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.junction = Some(ConductanceStamp::bind(solver, self.internal, self.neg));
        self.current = Some(CurrentStamp::bind(solver, self.internal, self.neg));
        if self.rs > 0.0 {
            self.series = Some(ConductanceStamp::bind(solver, self.pos, self.internal));
        }
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_junction = Some(ConductanceStamp::bind(solver, self.internal, self.neg));
        if self.rs > 0.0 {
            self.ac_series = Some(ConductanceStamp::bind(solver, self.pos, self.internal));
        }
    }

    fn allocate_state(&mut self, history: &mut StateHistory) {
        if self.cjo > 0.0 {
            self.charge = Some(history.allocate(1));
            self.deriv = Some(history.allocate(1));
        }
    }

    fn init_state(&mut self, state: &BiasState, history: &mut StateHistory) {
        if let Some(charge) = self.charge {
            let vd = state.voltage_diff(self.internal, self.neg);
            let (q, _) = self.depletion(vd);
            history.set(charge, q);
            history.set(self.deriv.expect("allocated with charge"), 0.0);
        }
    }

    fn load(&mut self, state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let vd = match state.init_mode {
            InitMode::Junction => {
                if self.off {
                    0.0
                } else {
                    self.vcrit
                }
            }
            InitMode::Fix if self.off => 0.0,
            _ => self.limit(state.voltage_diff(self.internal, self.neg), state),
        };

        let (id, gd) = self.evaluate(vd);
        let id = id + state.gmin * vd;
        let gd = gd + state.gmin;
        let ieq = id - gd * vd;

        let junction = self.junction.expect("bind_matrix precedes load");
        let current = self.current.expect("bind_matrix precedes load");
        junction.stamp(solver, gd);
        current.stamp(solver, ieq);
        if let Some(series) = self.series {
            series.stamp(solver, self.gspr);
        }

        self.vd = vd;
        self.id = id;
        self.gd = gd;
        self.cap = self.depletion(vd).1;
        Ok(())
    }

    fn load_time(
        &mut self,
        state: &mut BiasState,
        integrator: &Integrator,
        history: &mut StateHistory,
        solver: &mut Solver<f64>,
    ) -> Result<()> {
        let (charge, deriv) = match (self.charge, self.deriv) {
            (Some(q), Some(dq)) => (q, dq),
            _ => return Ok(()),
        };
        let vd = state.voltage_diff(self.internal, self.neg);
        let (q, c) = self.depletion(vd);
        history.set(charge, q);

        let res = integrator.integrate(history, charge, deriv, c);
        let ieq = res.ceq - res.geq * vd;

        let junction = self.junction.expect("bind_matrix precedes load_time");
        let current = self.current.expect("bind_matrix precedes load_time");
        junction.stamp(solver, res.geq);
        current.stamp(solver, ieq);
        Ok(())
    }

    fn load_ac(&mut self, omega: f64, solver: &mut Solver<Complex<f64>>) {
        // The Jacobian at the operating point: gd in the real part, the
        // depletion capacitance as jw*Cj(vd).
        let junction = self.ac_junction.expect("bind_ac_matrix precedes load_ac");
        junction.stamp(solver, Complex::new(self.gd, omega * self.cap));
        if let Some(series) = self.ac_series {
            series.stamp(solver, Complex::new(self.gspr, 0.0));
        }
    }

    fn is_convergent(&self, state: &BiasState, config: &BaseConfiguration) -> bool {
        let vd_new = state.voltage_diff(self.internal, self.neg);
        // Current predicted by the linearisation of the previous load versus
        // the actual device current at the new voltage.
        let i_hat = self.id + self.gd * (vd_new - self.vd);
        let (i_act, _) = self.evaluate(vd_new);
        let i_act = i_act + state.gmin * vd_new;
        let tol = config.rel_tol * i_hat.abs().max(i_act.abs()) + config.abs_tol;
        (i_hat - i_act).abs() <= tol
    }

    fn truncation_error(&self, integrator: &Integrator, history: &StateHistory) -> f64 {
        match (self.charge, self.deriv) {
            (Some(q), Some(dq)) => integrator.truncation_error(history, q, dq),
            _ => 0.0,
        }
    }

    fn unsetup(&mut self) {
        self.junction = None;
        self.current = None;
        self.series = None;
        self.ac_junction = None;
        self.ac_series = None;
    }
}
