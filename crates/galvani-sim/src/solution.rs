//! Solved-state snapshots handed to exporters.

use nalgebra::DVector;
use num_complex::Complex;

use galvani_core::{Error, Result, Variable, VariableSet};

/// A real solved state: node voltages and branch currents by name.
#[derive(Debug, Clone)]
pub struct Solution {
    variables: VariableSet,
    values: DVector<f64>,
}

impl Solution {
    pub(crate) fn new(variables: VariableSet, values: DVector<f64>) -> Self {
        Self { variables, values }
    }

    /// Voltage of a named node. Ground reads as 0.
    pub fn voltage(&self, node: &str) -> Option<f64> {
        self.variables.map(node).map(|v| self.values[v.index()])
    }

    /// Voltage of a named node, failing with [`Error::UnknownVariable`] when
    /// the name was never bound.
    pub fn try_voltage(&self, node: &str) -> Result<f64> {
        self.voltage(node)
            .ok_or_else(|| Error::UnknownVariable(node.to_string()))
    }

    /// Branch current of a named voltage-source-like entity.
    pub fn branch_current(&self, entity: &str) -> Option<f64> {
        self.variables
            .map(&format!("{entity}#branch"))
            .map(|v| self.values[v.index()])
    }

    /// Value of a variable obtained from [`Solution::variables`].
    pub fn value(&self, variable: Variable) -> f64 {
        self.values[variable.index()]
    }

    /// The variable map this solution is indexed by.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// The raw solution vector, indexed by variable (entry 0 is ground).
    pub fn raw(&self) -> &DVector<f64> {
        &self.values
    }
}

/// A complex (AC phasor) solved state.
#[derive(Debug, Clone)]
pub struct ComplexSolution {
    variables: VariableSet,
    values: DVector<Complex<f64>>,
}

impl ComplexSolution {
    pub(crate) fn new(variables: VariableSet, values: DVector<Complex<f64>>) -> Self {
        Self { variables, values }
    }

    /// Phasor voltage of a named node.
    pub fn voltage(&self, node: &str) -> Option<Complex<f64>> {
        self.variables.map(node).map(|v| self.values[v.index()])
    }

    /// Voltage magnitude of a named node.
    pub fn magnitude(&self, node: &str) -> Option<f64> {
        self.voltage(node).map(|v| v.norm())
    }

    /// Voltage phase of a named node, in radians.
    pub fn phase(&self, node: &str) -> Option<f64> {
        self.voltage(node).map(|v| v.arg())
    }

    /// Phasor branch current of a named voltage-source-like entity.
    pub fn branch_current(&self, entity: &str) -> Option<Complex<f64>> {
        self.variables
            .map(&format!("{entity}#branch"))
            .map(|v| self.values[v.index()])
    }

    /// The variable map this solution is indexed by.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }
}
