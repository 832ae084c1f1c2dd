//! AC small-signal frequency-domain analysis.

use std::f64::consts::PI;

use nalgebra::DVector;
use num_complex::Complex;

use galvani_core::sparse::Solver;
use galvani_core::{BaseConfiguration, Circuit, Error, Result};

use crate::engine::Engine;
use crate::solution::ComplexSolution;

/// AC sweep spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcSweepType {
    /// Linear frequency spacing.
    Linear,
    /// Logarithmic spacing, points per decade.
    Decade,
    /// Logarithmic spacing, points per octave.
    Octave,
}

/// AC sweep analysis.
#[derive(Debug, Clone)]
pub struct AcSweep {
    /// Numerical configuration.
    pub config: BaseConfiguration,
    /// Sweep spacing.
    pub sweep_type: AcSweepType,
    /// Number of points (total for Linear, per decade/octave otherwise).
    pub num_points: usize,
    /// Start frequency (Hz).
    pub fstart: f64,
    /// Stop frequency (Hz).
    pub fstop: f64,
}

/// Result of an AC sweep.
#[derive(Debug, Clone)]
pub struct AcResult {
    /// Swept frequencies (Hz), in order.
    pub frequencies: Vec<f64>,
    /// Phasor solution at each frequency.
    pub solutions: Vec<ComplexSolution>,
}

impl AcResult {
    /// `(frequency, magnitude)` pairs for a named node.
    pub fn magnitude_waveform(&self, node: &str) -> Vec<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(self.solutions.iter())
            .filter_map(|(&f, sol)| sol.magnitude(node).map(|m| (f, m)))
            .collect()
    }
}

/// Generate the frequency grid for a sweep.
pub fn generate_frequencies(
    sweep_type: AcSweepType,
    num_points: usize,
    fstart: f64,
    fstop: f64,
) -> Vec<f64> {
    match sweep_type {
        AcSweepType::Linear => {
            if num_points <= 1 {
                return vec![fstart];
            }
            let step = (fstop - fstart) / (num_points - 1) as f64;
            (0..num_points).map(|i| fstart + step * i as f64).collect()
        }
        AcSweepType::Decade => log_sweep(num_points, fstart, fstop, 10.0),
        AcSweepType::Octave => log_sweep(num_points, fstart, fstop, 2.0),
    }
}

fn log_sweep(points_per_interval: usize, fstart: f64, fstop: f64, base: f64) -> Vec<f64> {
    let ratio = base.powf(1.0 / points_per_interval.max(1) as f64);
    let mut freqs = Vec::new();
    let mut f = fstart;
    while f < fstop * (1.0 + 1e-9) {
        freqs.push(f);
        f *= ratio;
    }
    freqs
}

impl AcSweep {
    /// Create a sweep with default configuration.
    pub fn new(sweep_type: AcSweepType, num_points: usize, fstart: f64, fstop: f64) -> Self {
        Self {
            config: BaseConfiguration::default(),
            sweep_type,
            num_points,
            fstart,
            fstop,
        }
    }

    /// Run the sweep: an operating-point solve to linearise every nonlinear
    /// device, then one complex factor/solve per frequency point.
    pub fn run(&self, circuit: &Circuit) -> Result<AcResult> {
        if self.fstart <= 0.0 || self.fstop < self.fstart {
            return Err(Error::bad_parameter(
                "ac",
                "fstart",
                format!("invalid frequency range {}..{}", self.fstart, self.fstop),
            ));
        }

        let mut engine = Engine::bind(circuit, &self.config)?;
        let outcome = self.execute(&mut engine);
        engine.finish();
        outcome
    }

    fn execute(&self, engine: &mut Engine) -> Result<AcResult> {
        engine.op_solve()?;

        // The biasing loads of the converged OP recorded every nonlinear
        // device's small-signal parameters; now build the complex system.
        let unknowns = engine.variables.unknowns();
        let mut solver: Solver<Complex<f64>> = Solver::new(
            unknowns,
            self.config.pivot_rel_tol,
            self.config.pivot_abs_tol,
        );
        for (name, behaviour) in engine.behaviours_mut() {
            solver.set_debug_tag(name);
            behaviour.bind_ac_matrix(&mut solver);
        }

        let frequencies =
            generate_frequencies(self.sweep_type, self.num_points, self.fstart, self.fstop);
        let mut solutions = Vec::with_capacity(frequencies.len());

        for &frequency in &frequencies {
            if self.config.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let omega = 2.0 * PI * frequency;
            solver.reset();
            for (_, behaviour) in engine.behaviours_mut() {
                behaviour.load_ac(omega, &mut solver);
            }
            solver.factor()?;
            let x = solver.solve()?;

            let mut values = DVector::from_element(unknowns + 1, Complex::new(0.0, 0.0));
            for i in 0..unknowns {
                values[i + 1] = x[i];
            }
            solutions.push(ComplexSolution::new(engine.variables.clone(), values));
        }

        Ok(AcResult {
            frequencies,
            solutions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_grid() {
        let f = generate_frequencies(AcSweepType::Linear, 5, 100.0, 500.0);
        assert_eq!(f, vec![100.0, 200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn test_decade_grid() {
        let f = generate_frequencies(AcSweepType::Decade, 10, 1.0, 100.0);
        assert_eq!(f.len(), 21, "two decades at 10/decade plus endpoint");
        assert!((f[10] - 10.0).abs() < 1e-9);
        assert!((f[20] - 100.0).abs() < 1e-7);
    }

    #[test]
    fn test_octave_grid_doubles() {
        let f = generate_frequencies(AcSweepType::Octave, 1, 1.0, 8.0);
        assert_eq!(f.len(), 4);
        assert!((f[3] - 8.0).abs() < 1e-9);
    }
}
