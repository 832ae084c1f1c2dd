//! Linear controlled sources: VCVS, VCCS, CCCS, CCVS.
//!
//! The voltage-controlled pair reads its controlling node voltages directly;
//! the current-controlled pair reads the branch-current variable its
//! controlling voltage source published at bind time. All four are linear,
//! so the AC stamp is the operating-point coefficient itself.

use num_complex::Complex;

use galvani_core::behaviour::{BindContext, DeviceBehaviour};
use galvani_core::sparse::{MatrixElement, Solver};
use galvani_core::{BiasState, Device, ParameterSet, Result, Variable};

use crate::stamp::BranchStamp;

/// Handles for the four transconductance slots of a VCCS-shaped stamp.
#[derive(Debug, Clone, Copy)]
struct GmStamp {
    op_cp: MatrixElement,
    op_cn: MatrixElement,
    on_cp: MatrixElement,
    on_cn: MatrixElement,
}

impl GmStamp {
    fn bind<T: galvani_core::sparse::Scalar>(
        solver: &mut Solver<T>,
        out_pos: Variable,
        out_neg: Variable,
        ctrl_pos: Variable,
        ctrl_neg: Variable,
    ) -> Self {
        Self {
            op_cp: solver.get_element(out_pos.index(), ctrl_pos.index()),
            op_cn: solver.get_element(out_pos.index(), ctrl_neg.index()),
            on_cp: solver.get_element(out_neg.index(), ctrl_pos.index()),
            on_cn: solver.get_element(out_neg.index(), ctrl_neg.index()),
        }
    }

    fn stamp<T: galvani_core::sparse::Scalar>(&self, solver: &mut Solver<T>, gm: T) {
        solver.add(self.op_cp, gm);
        solver.add(self.op_cn, -gm);
        solver.add(self.on_cp, -gm);
        solver.add(self.on_cn, gm);
    }
}

/// Voltage-controlled voltage source: `V(out) = gain * V(ctrl)`.
#[derive(Debug)]
pub struct Vcvs {
    name: String,
    out_pos: String,
    out_neg: String,
    ctrl_pos: String,
    ctrl_neg: String,
    params: ParameterSet,
}

impl Vcvs {
    /// Create a VCVS.
    pub fn new(
        name: impl Into<String>,
        out_pos: impl Into<String>,
        out_neg: impl Into<String>,
        ctrl_pos: impl Into<String>,
        ctrl_neg: impl Into<String>,
        gain: f64,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("gain", 0.0);
        params.set("gain", gain).expect("declared just above");
        Self {
            name,
            out_pos: out_pos.into(),
            out_neg: out_neg.into(),
            ctrl_pos: ctrl_pos.into(),
            ctrl_neg: ctrl_neg.into(),
            params,
        }
    }
}

impl Device for Vcvs {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![
            self.out_pos.clone(),
            self.out_neg.clone(),
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
        Ok(Box::new(VcvsBehaviour {
            out_pos: ctx.node(&self.out_pos)?,
            out_neg: ctx.node(&self.out_neg)?,
            ctrl_pos: ctx.node(&self.ctrl_pos)?,
            ctrl_neg: ctx.node(&self.ctrl_neg)?,
            branch: ctx.branch(&self.name)?,
            gain: self.params.real("gain"),
            stamp: None,
            ctrl: None,
            ac_stamp: None,
            ac_ctrl: None,
        }))
    }
}

#[derive(Debug)]
struct VcvsBehaviour {
    out_pos: Variable,
    out_neg: Variable,
    ctrl_pos: Variable,
    ctrl_neg: Variable,
    branch: Variable,
    gain: f64,
    stamp: Option<BranchStamp>,
    ctrl: Option<(MatrixElement, MatrixElement)>,
    ac_stamp: Option<BranchStamp>,
    ac_ctrl: Option<(MatrixElement, MatrixElement)>,
}

impl DeviceBehaviour for VcvsBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(BranchStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.branch,
        ));
        self.ctrl = Some((
            solver.get_element(self.branch.index(), self.ctrl_pos.index()),
            solver.get_element(self.branch.index(), self.ctrl_neg.index()),
        ));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(BranchStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.branch,
        ));
        self.ac_ctrl = Some((
            solver.get_element(self.branch.index(), self.ctrl_pos.index()),
            solver.get_element(self.branch.index(), self.ctrl_neg.index()),
        ));
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        // Branch equation: V(out) - gain * V(ctrl) = 0.
        let stamp = self.stamp.expect("bind_matrix precedes load");
        let (cp, cn) = self.ctrl.expect("bind_matrix precedes load");
        stamp.stamp_pattern(solver);
        solver.add(cp, -self.gain);
        solver.add(cn, self.gain);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        let (cp, cn) = self.ac_ctrl.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp_pattern(solver);
        solver.add(cp, Complex::new(-self.gain, 0.0));
        solver.add(cn, Complex::new(self.gain, 0.0));
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ctrl = None;
        self.ac_stamp = None;
        self.ac_ctrl = None;
    }
}

/// Voltage-controlled current source: `I(out) = gain * V(ctrl)`.
#[derive(Debug)]
pub struct Vccs {
    name: String,
    out_pos: String,
    out_neg: String,
    ctrl_pos: String,
    ctrl_neg: String,
    params: ParameterSet,
}

impl Vccs {
    /// Create a VCCS; `gain` is the transconductance in siemens.
    pub fn new(
        name: impl Into<String>,
        out_pos: impl Into<String>,
        out_neg: impl Into<String>,
        ctrl_pos: impl Into<String>,
        ctrl_neg: impl Into<String>,
        gain: f64,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("gain", 0.0);
        params.set("gain", gain).expect("declared just above");
        Self {
            name,
            out_pos: out_pos.into(),
            out_neg: out_neg.into(),
            ctrl_pos: ctrl_pos.into(),
            ctrl_neg: ctrl_neg.into(),
            params,
        }
    }
}

impl Device for Vccs {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![
            self.out_pos.clone(),
            self.out_neg.clone(),
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
        Ok(Box::new(VccsBehaviour {
            out_pos: ctx.node(&self.out_pos)?,
            out_neg: ctx.node(&self.out_neg)?,
            ctrl_pos: ctx.node(&self.ctrl_pos)?,
            ctrl_neg: ctx.node(&self.ctrl_neg)?,
            gain: self.params.real("gain"),
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct VccsBehaviour {
    out_pos: Variable,
    out_neg: Variable,
    ctrl_pos: Variable,
    ctrl_neg: Variable,
    gain: f64,
    stamp: Option<GmStamp>,
    ac_stamp: Option<GmStamp>,
}

impl DeviceBehaviour for VccsBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(GmStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.ctrl_pos,
            self.ctrl_neg,
        ));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(GmStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.ctrl_pos,
            self.ctrl_neg,
        ));
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let stamp = self.stamp.expect("bind_matrix precedes load");
        stamp.stamp(solver, self.gain);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp(solver, Complex::new(self.gain, 0.0));
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}

/// Current-controlled current source: `I(out) = gain * I(ctrl)`.
#[derive(Debug)]
pub struct Cccs {
    name: String,
    out_pos: String,
    out_neg: String,
    ctrl: String,
    params: ParameterSet,
}

impl Cccs {
    /// Create a CCCS controlled by the named voltage source.
    pub fn new(
        name: impl Into<String>,
        out_pos: impl Into<String>,
        out_neg: impl Into<String>,
        ctrl: impl Into<String>,
        gain: f64,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("gain", 0.0);
        params.set("gain", gain).expect("declared just above");
        Self {
            name,
            out_pos: out_pos.into(),
            out_neg: out_neg.into(),
            ctrl: ctrl.into(),
            params,
        }
    }
}

impl Device for Cccs {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![self.out_pos.clone(), self.out_neg.clone()]
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn controlling(&self) -> Option<&str> {
        Some(&self.ctrl)
    }

    fn bind(&self, ctx: &mut BindContext) -> Result<Box<dyn DeviceBehaviour>> {
        Ok(Box::new(CccsBehaviour {
            out_pos: ctx.node(&self.out_pos)?,
            out_neg: ctx.node(&self.out_neg)?,
            ctrl_branch: ctx.controlling_branch(&self.ctrl)?,
            gain: self.params.real("gain"),
            stamp: None,
            ac_stamp: None,
        }))
    }
}

#[derive(Debug)]
struct CccsBehaviour {
    out_pos: Variable,
    out_neg: Variable,
    ctrl_branch: Variable,
    gain: f64,
    stamp: Option<(MatrixElement, MatrixElement)>,
    ac_stamp: Option<(MatrixElement, MatrixElement)>,
}

impl DeviceBehaviour for CccsBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some((
            solver.get_element(self.out_pos.index(), self.ctrl_branch.index()),
            solver.get_element(self.out_neg.index(), self.ctrl_branch.index()),
        ));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some((
            solver.get_element(self.out_pos.index(), self.ctrl_branch.index()),
            solver.get_element(self.out_neg.index(), self.ctrl_branch.index()),
        ));
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        let (p, n) = self.stamp.expect("bind_matrix precedes load");
        solver.add(p, self.gain);
        solver.add(n, -self.gain);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let (p, n) = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        solver.add(p, Complex::new(self.gain, 0.0));
        solver.add(n, Complex::new(-self.gain, 0.0));
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ac_stamp = None;
    }
}

/// Current-controlled voltage source: `V(out) = gain * I(ctrl)`.
#[derive(Debug)]
pub struct Ccvs {
    name: String,
    out_pos: String,
    out_neg: String,
    ctrl: String,
    params: ParameterSet,
}

impl Ccvs {
    /// Create a CCVS controlled by the named voltage source; `gain` is the
    /// transresistance in ohms.
    pub fn new(
        name: impl Into<String>,
        out_pos: impl Into<String>,
        out_neg: impl Into<String>,
        ctrl: impl Into<String>,
        gain: f64,
    ) -> Self {
        let name = name.into();
        let mut params = ParameterSet::new(&name);
        params.declare("gain", 0.0);
        params.set("gain", gain).expect("declared just above");
        Self {
            name,
            out_pos: out_pos.into(),
            out_neg: out_neg.into(),
            ctrl: ctrl.into(),
            params,
        }
    }
}

impl Device for Ccvs {
    fn name(&self) -> &str {
        &self.name
    }

    fn pins(&self) -> Vec<String> {
        vec![self.out_pos.clone(), self.out_neg.clone()]
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn controlling(&self) -> Option<&str> {
        Some(&self.ctrl)
    }

    fn bind(&self, ctx: &mut BindContext) -> Result<Box<dyn DeviceBehaviour>> {
        Ok(Box::new(CcvsBehaviour {
            out_pos: ctx.node(&self.out_pos)?,
            out_neg: ctx.node(&self.out_neg)?,
            ctrl_branch: ctx.controlling_branch(&self.ctrl)?,
            branch: ctx.branch(&self.name)?,
            gain: self.params.real("gain"),
            stamp: None,
            ctrl: None,
            ac_stamp: None,
            ac_ctrl: None,
        }))
    }
}

#[derive(Debug)]
struct CcvsBehaviour {
    out_pos: Variable,
    out_neg: Variable,
    ctrl_branch: Variable,
    branch: Variable,
    gain: f64,
    stamp: Option<BranchStamp>,
    ctrl: Option<MatrixElement>,
    ac_stamp: Option<BranchStamp>,
    ac_ctrl: Option<MatrixElement>,
}

impl DeviceBehaviour for CcvsBehaviour {
    fn bind_matrix(&mut self, solver: &mut Solver<f64>) {
        self.stamp = Some(BranchStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.branch,
        ));
        self.ctrl = Some(solver.get_element(self.branch.index(), self.ctrl_branch.index()));
    }

    fn bind_ac_matrix(&mut self, solver: &mut Solver<Complex<f64>>) {
        self.ac_stamp = Some(BranchStamp::bind(
            solver,
            self.out_pos,
            self.out_neg,
            self.branch,
        ));
        self.ac_ctrl = Some(solver.get_element(self.branch.index(), self.ctrl_branch.index()));
    }

    fn load(&mut self, _state: &mut BiasState, solver: &mut Solver<f64>) -> Result<()> {
        // Branch equation: V(out) - gain * I(ctrl) = 0.
        let stamp = self.stamp.expect("bind_matrix precedes load");
        let ctrl = self.ctrl.expect("bind_matrix precedes load");
        stamp.stamp_pattern(solver);
        solver.add(ctrl, -self.gain);
        Ok(())
    }

    fn load_ac(&mut self, _omega: f64, solver: &mut Solver<Complex<f64>>) {
        let stamp = self.ac_stamp.expect("bind_ac_matrix precedes load_ac");
        let ctrl = self.ac_ctrl.expect("bind_ac_matrix precedes load_ac");
        stamp.stamp_pattern(solver);
        solver.add(ctrl, Complex::new(-self.gain, 0.0));
    }

    fn unsetup(&mut self) {
        self.stamp = None;
        self.ctrl = None;
        self.ac_stamp = None;
        self.ac_ctrl = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galvani_core::{BaseConfiguration, Error, VariableSet};
    use std::collections::HashMap;

    #[test]
    fn test_vccs_stamp_signs() {
        let config = BaseConfiguration::default();
        let g = Vccs::new("G1", "op", "on", "cp", "cn", 2e-3);
        let mut vars = VariableSet::new();
        let mut branches = HashMap::new();
        let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
        let mut behaviour = g.bind(&mut ctx).unwrap();

        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);
        behaviour.bind_matrix(&mut solver);
        let mut state = BiasState::new(vars.unknowns(), config.temperature, config.gmin);
        behaviour.load(&mut state, &mut solver).unwrap();

        // (op,cp) (op,cn) (on,cp) (on,cn) = +gm -gm -gm +gm
        assert_eq!(solver.value_at(1, 3), 2e-3);
        assert_eq!(solver.value_at(1, 4), -2e-3);
        assert_eq!(solver.value_at(2, 3), -2e-3);
        assert_eq!(solver.value_at(2, 4), 2e-3);
    }

    #[test]
    fn test_cccs_reads_published_branch() {
        let config = BaseConfiguration::default();
        let f = Cccs::new("F1", "out", "0", "V1", 3.0);
        let mut vars = VariableSet::new();
        let mut branches = HashMap::new();

        // Simulate the binder having bound V1 first.
        {
            let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
            ctx.node("in").unwrap();
            ctx.branch("V1").unwrap();
        }

        let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
        let mut behaviour = f.bind(&mut ctx).unwrap();

        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);
        behaviour.bind_matrix(&mut solver);
        let mut state = BiasState::new(vars.unknowns(), config.temperature, config.gmin);
        behaviour.load(&mut state, &mut solver).unwrap();

        // out is variable 3, V1's branch is variable 2.
        assert_eq!(solver.value_at(3, 2), 3.0);
    }

    #[test]
    fn test_unresolved_controlling_source_fails() {
        let config = BaseConfiguration::default();
        let f = Cccs::new("F1", "out", "0", "Vmissing", 3.0);
        let mut vars = VariableSet::new();
        let mut branches = HashMap::new();
        let mut ctx = BindContext::new(&config, &mut vars, &mut branches);
        let result = f.bind(&mut ctx);
        assert!(matches!(result, Err(Error::UnknownEntity(_))));
    }
}
