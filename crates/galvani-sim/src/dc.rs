//! DC sweep analysis.

use galvani_core::{BaseConfiguration, Circuit, Error, InitMode, Result};

use crate::engine::{Engine, LoadMode};
use crate::solution::Solution;

/// DC sweep of one independent source.
#[derive(Debug, Clone)]
pub struct DcSweep {
    /// Numerical configuration.
    pub config: BaseConfiguration,
    /// Name of the swept source.
    pub source: String,
    /// Start value.
    pub start: f64,
    /// Stop value.
    pub stop: f64,
    /// Step size (sign gives the direction).
    pub step: f64,
}

/// Result of a DC sweep.
#[derive(Debug, Clone)]
pub struct DcSweepResult {
    /// Name of the swept source.
    pub source: String,
    /// Sweep values, in order.
    pub sweep_values: Vec<f64>,
    /// The solved state at each sweep value.
    pub solutions: Vec<Solution>,
}

impl DcSweepResult {
    /// `(sweep value, node voltage)` pairs for a named node.
    pub fn voltage_waveform(&self, node: &str) -> Vec<(f64, f64)> {
        self.sweep_values
            .iter()
            .zip(self.solutions.iter())
            .filter_map(|(&sv, sol)| sol.voltage(node).map(|v| (sv, v)))
            .collect()
    }
}

impl DcSweep {
    /// Create a sweep with default configuration.
    pub fn new(source: impl Into<String>, start: f64, stop: f64, step: f64) -> Self {
        Self {
            config: BaseConfiguration::default(),
            source: source.into(),
            start,
            stop,
            step,
        }
    }

    /// Run the sweep.
    ///
    /// The first point gets the full operating-point treatment (junction
    /// initialisation plus the recovery ladder); later points continue from
    /// the previous solution under the `itl2` iteration limit.
    pub fn run(&self, circuit: &Circuit) -> Result<DcSweepResult> {
        if circuit.lookup(&self.source).is_none() {
            return Err(Error::UnknownEntity(self.source.clone()));
        }
        if self.step == 0.0 || (self.stop - self.start) * self.step < 0.0 {
            return Err(Error::bad_parameter(
                &self.source,
                "step",
                format!(
                    "step {} cannot reach {} from {}",
                    self.step, self.stop, self.start
                ),
            ));
        }

        let mut sweep_values = Vec::new();
        let direction = self.step.signum();
        let mut value = self.start;
        loop {
            sweep_values.push(value);
            value += self.step;
            if direction * value > direction * self.stop * (1.0 + 1e-10) + 1e-30 {
                break;
            }
        }

        let mut engine = Engine::bind(circuit, &self.config)?;
        let outcome = self.sweep(&mut engine, &sweep_values);
        engine.finish();
        let solutions = outcome?;

        Ok(DcSweepResult {
            source: self.source.clone(),
            sweep_values,
            solutions,
        })
    }

    fn sweep(&self, engine: &mut Engine, sweep_values: &[f64]) -> Result<Vec<Solution>> {
        let mut solutions = Vec::with_capacity(sweep_values.len());
        for (index, &value) in sweep_values.iter().enumerate() {
            engine.state.set_sweep_override(&self.source, value);
            if index == 0 {
                engine.op_solve()?;
            } else {
                engine.state.init_mode = InitMode::Float;
                engine.iterate(self.config.itl2, LoadMode::Bias)?;
            }
            solutions.push(engine.solution());
        }
        Ok(solutions)
    }
}
