//! Time-domain (transient) analysis with adaptive step control.

use nalgebra::DVector;

use galvani_core::{
    BaseConfiguration, Circuit, Error, InitMode, Integrator, Result, VariableSet,
};

use crate::engine::{Engine, LoadMode};

/// One export point of a transient run.
#[derive(Debug, Clone, Copy)]
pub struct ExportPoint<'a> {
    /// Time of the committed point (s).
    pub time: f64,
    /// Solution vector indexed by variable (entry 0 is ground).
    pub values: &'a DVector<f64>,
    /// The variable map.
    pub variables: &'a VariableSet,
}

impl ExportPoint<'_> {
    /// Voltage of a named node.
    pub fn voltage(&self, node: &str) -> Option<f64> {
        self.variables.map(node).map(|v| self.values[v.index()])
    }

    /// Branch current of a named voltage-source-like entity.
    pub fn branch_current(&self, entity: &str) -> Option<f64> {
        self.variables
            .map(&format!("{entity}#branch"))
            .map(|v| self.values[v.index()])
    }
}

/// A buffered time point.
#[derive(Debug, Clone)]
pub struct TimePoint {
    /// Time (s).
    pub time: f64,
    /// Solution vector indexed by variable (entry 0 is ground).
    pub solution: DVector<f64>,
}

/// Buffered result of a transient run.
#[derive(Debug, Clone)]
pub struct TransientResult {
    variables: VariableSet,
    /// Accepted time points in order.
    pub points: Vec<TimePoint>,
}

impl TransientResult {
    /// `(time, voltage)` pairs for a named node.
    pub fn voltage_waveform(&self, node: &str) -> Vec<(f64, f64)> {
        match self.variables.map(node) {
            Some(v) => self
                .points
                .iter()
                .map(|p| (p.time, p.solution[v.index()]))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Linearly interpolated voltage of a named node at `time`.
    pub fn voltage_at(&self, node: &str, time: f64) -> Option<f64> {
        let v = self.variables.map(node)?;
        let idx = v.index();
        if self.points.is_empty() {
            return None;
        }
        if time <= self.points[0].time {
            return Some(self.points[0].solution[idx]);
        }
        if time >= self.points.last()?.time {
            return Some(self.points.last()?.solution[idx]);
        }
        for pair in self.points.windows(2) {
            let (t0, t1) = (pair[0].time, pair[1].time);
            if time >= t0 && time <= t1 {
                let alpha = (time - t0) / (t1 - t0);
                return Some(pair[0].solution[idx] * (1.0 - alpha) + pair[1].solution[idx] * alpha);
            }
        }
        None
    }

    /// All committed time values.
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.time).collect()
    }

    /// The variable map the points are indexed by.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }
}

/// Transient simulation.
#[derive(Debug, Clone)]
pub struct Transient {
    /// Numerical configuration (including the integration method).
    pub config: BaseConfiguration,
    /// Suggested time step (s).
    pub step: f64,
    /// Stop time (s).
    pub stop: f64,
    /// Output start time (s); points before it are computed but not emitted.
    pub start: f64,
    /// Hard ceiling on the internal step; defaults to `step`.
    pub max_step: Option<f64>,
}

impl Transient {
    /// Create a transient simulation from 0 to `stop`.
    pub fn new(step: f64, stop: f64) -> Self {
        Self {
            config: BaseConfiguration::default(),
            step,
            stop,
            start: 0.0,
            max_step: None,
        }
    }

    /// Set the maximum internal step.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Run and buffer every emitted point.
    pub fn run(&self, circuit: &Circuit) -> Result<TransientResult> {
        let mut points = Vec::new();
        let variables = self.run_with(circuit, |point| {
            points.push(TimePoint {
                time: point.time,
                solution: point.values.clone(),
            });
        })?;
        Ok(TransientResult { variables, points })
    }

    /// Run, streaming each committed point to `sink` as it is accepted.
    ///
    /// Nothing is buffered beyond the current step; the returned variable
    /// map is the one the streamed vectors are indexed by.
    pub fn run_with(
        &self,
        circuit: &Circuit,
        mut sink: impl FnMut(&ExportPoint),
    ) -> Result<VariableSet> {
        if self.step <= 0.0 || self.stop <= 0.0 {
            return Err(Error::bad_parameter(
                "tran",
                "step",
                format!("invalid step/stop: {}/{}", self.step, self.stop),
            ));
        }

        let mut engine = Engine::bind(circuit, &self.config)?;
        let outcome = self.execute(&mut engine, &mut sink);
        engine.finish();
        outcome?;
        Ok(engine.variables.clone())
    }

    fn execute(&self, engine: &mut Engine, sink: &mut impl FnMut(&ExportPoint)) -> Result<()> {
        let max_step = self.max_step.unwrap_or(self.step).min(self.stop);
        let delta_min = max_step * 1e-9;

        // Initial condition: operating point with reactive loads excluded
        // (capacitors open, inductors short).
        engine.state.time = None;
        engine.op_solve()?;
        engine.state.time = Some(0.0);
        engine.init_time_states();

        let mut integrator = Integrator::new(self.config.method);
        let breakpoints = engine.breakpoints(self.stop);
        let mut next_breakpoint = 0usize;

        if self.start <= 0.0 {
            sink(&ExportPoint {
                time: 0.0,
                values: &engine.state.solution,
                variables: &engine.variables,
            });
        }

        let mut t = 0.0;
        let mut h = self.step.min(max_step);
        let mut consecutive_accepts = 0usize;

        while t < self.stop * (1.0 - 1e-12) {
            if self.config.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Skip breakpoints already passed (within roundoff).
            while next_breakpoint < breakpoints.len()
                && breakpoints[next_breakpoint] <= t + delta_min
            {
                next_breakpoint += 1;
            }

            let mut h_attempt = h.clamp(delta_min, max_step);
            let mut on_breakpoint = false;
            if let Some(&bp) = breakpoints.get(next_breakpoint) {
                if t + h_attempt >= bp - delta_min {
                    h_attempt = bp - t;
                    on_breakpoint = true;
                }
            }
            if t + h_attempt > self.stop {
                h_attempt = self.stop - t;
            }

            integrator.begin_step(h_attempt);
            engine.state.time = Some(t + h_attempt);
            engine.state.init_mode = InitMode::Float;
            let entry_solution = engine.state.solution.clone();

            match engine.iterate(self.config.itl4, LoadMode::Time(&integrator)) {
                Ok(_) => {}
                Err(Error::NoConvergence { .. }) => {
                    engine.state.solution.copy_from(&entry_solution);
                    consecutive_accepts = 0;
                    h = h_attempt / 2.0;
                    if h < delta_min {
                        return Err(Error::NoConvergence {
                            iterations: self.config.itl4,
                            residual: f64::NAN,
                            step: h_attempt,
                        });
                    }
                    log::debug!("newton failed at t = {:.6e}, halving step to {h:.3e}", t);
                    continue;
                }
                Err(e) => return Err(e),
            }

            // Truncation-error control.
            let lte = engine.truncation_error(&integrator);
            let max_x = engine
                .state
                .solution
                .iter()
                .fold(0.0_f64, |m, &v| m.max(v.abs()));
            let tol = self.config.tr_tol * (self.config.rel_tol * max_x + self.config.abs_tol);
            if lte > tol && h_attempt > delta_min * 2.0 {
                engine.state.solution.copy_from(&entry_solution);
                consecutive_accepts = 0;
                h = h_attempt / 2.0;
                log::debug!("LTE {lte:.3e} > {tol:.3e} at t = {:.6e}, halving step", t);
                continue;
            }

            // Commit.
            t += h_attempt;
            integrator.accept();
            engine.accept();
            consecutive_accepts += 1;

            if integrator.order() < 2 {
                integrator.raise_order();
            }
            if on_breakpoint {
                // Waveform discontinuity: restart the ramp.
                integrator.reset_order();
                next_breakpoint += 1;
            }

            if t >= self.start * (1.0 - 1e-12) {
                sink(&ExportPoint {
                    time: t,
                    values: &engine.state.solution,
                    variables: &engine.variables,
                });
            }

            // Step growth: only after a run of clean accepts, at most
            // doubling, never past max_step.
            h = if consecutive_accepts >= 3 {
                let factor = if lte > 0.0 {
                    (tol / lte).sqrt().clamp(1.0, 2.0)
                } else {
                    2.0
                };
                (h_attempt * factor).min(max_step)
            } else {
                h_attempt.min(max_step)
            };
        }

        Ok(())
    }
}
