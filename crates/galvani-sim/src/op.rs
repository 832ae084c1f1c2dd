//! Operating-point analysis.

use galvani_core::{BaseConfiguration, Circuit, Result};

use crate::engine::Engine;
use crate::solution::Solution;

/// DC operating-point simulation.
#[derive(Debug, Clone, Default)]
pub struct OperatingPoint {
    /// Numerical configuration.
    pub config: BaseConfiguration,
}

/// Result of an operating-point analysis.
#[derive(Debug, Clone)]
pub struct OpResult {
    /// The converged bias point.
    pub solution: Solution,
    /// Newton iterations spent, including any recovery stepping.
    pub iterations: usize,
}

impl OperatingPoint {
    /// Create an operating-point simulation with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an explicit configuration.
    pub fn with_config(config: BaseConfiguration) -> Self {
        Self { config }
    }

    /// Solve the operating point of a circuit.
    pub fn run(&self, circuit: &Circuit) -> Result<OpResult> {
        let mut engine = Engine::bind(circuit, &self.config)?;
        let outcome = engine.op_solve();
        let result = outcome.map(|iterations| OpResult {
            solution: engine.solution(),
            iterations,
        });
        engine.finish();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galvani_devices::{Diode, Resistor, VoltageSource};

    #[test]
    fn test_resistor_divider() {
        let mut circuit = Circuit::new();
        circuit.add(VoltageSource::dc("V1", "in", "0", 10.0)).unwrap();
        circuit.add(Resistor::new("R1", "in", "mid", 1000.0)).unwrap();
        circuit.add(Resistor::new("R2", "mid", "0", 1000.0)).unwrap();

        let op = OperatingPoint::new();
        let result = op.run(&circuit).unwrap();

        assert!((result.solution.voltage("mid").unwrap() - 5.0).abs() < 1e-12);
        assert!((result.solution.voltage("in").unwrap() - 10.0).abs() < 1e-12);
        // The source sinks 5 mA.
        assert!((result.solution.branch_current("V1").unwrap() + 5e-3).abs() < 1e-12);
    }

    #[test]
    fn test_diode_clamp_converges_quickly() {
        // 5 V through 1k into a diode: V(d) in [0.55, 0.65], I = (5 - Vd)/1k.
        let mut circuit = Circuit::new();
        circuit.add(VoltageSource::dc("V1", "in", "0", 5.0)).unwrap();
        circuit.add(Resistor::new("R1", "in", "d", 1000.0)).unwrap();
        circuit.add(Diode::new("D1", "d", "0")).unwrap();

        let op = OperatingPoint::new();
        let result = op.run(&circuit).unwrap();

        let vd = result.solution.voltage("d").unwrap();
        assert!((0.55..=0.75).contains(&vd), "V(D1) = {vd}");

        let i = -result.solution.branch_current("V1").unwrap();
        assert!(
            (i - (5.0 - vd) / 1000.0).abs() < 1e-6,
            "I = {i} vs (5-Vd)/1k"
        );

        // The bias point satisfies the Shockley equation.
        let vt = 1.380649e-23 * 300.15 / 1.602176634e-19;
        let i_diode = 1e-14 * ((vd / vt).exp() - 1.0);
        assert!((i_diode - i).abs() / i < 1e-2, "diode eq: {i_diode} vs {i}");

        assert!(
            result.iterations <= 8,
            "cold-start diode took {} iterations",
            result.iterations
        );
    }

    #[test]
    fn test_unknown_node_is_singular() {
        // A node connected only through one resistor terminal has no DC
        // path to ground: the matrix is singular.
        let mut circuit = Circuit::new();
        circuit.add(Resistor::new("R1", "a", "b", 1000.0)).unwrap();

        let op = OperatingPoint::new();
        assert!(op.run(&circuit).is_err());
    }
}
