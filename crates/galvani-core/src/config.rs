//! Simulation configuration and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::integrate::IntegrationMethod;

/// Celsius-to-Kelvin offset used throughout the simulator.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Cooperative cancellation token polled by the simulation drivers.
///
/// Cloning the token shares the underlying flag, so a caller can hand one
/// clone to a simulation and keep another to request cancellation from a
/// different thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Global numerical constants and iteration limits.
///
/// Defaults match the classic SPICE option set. The configuration is
/// immutable during a simulation and passed by reference to every behaviour;
/// there is no module-level mutable state.
#[derive(Debug, Clone)]
pub struct BaseConfiguration {
    /// Relative convergence tolerance.
    pub rel_tol: f64,
    /// Absolute current tolerance (A).
    pub abs_tol: f64,
    /// Absolute voltage tolerance (V).
    pub vn_tol: f64,
    /// Minimum junction conductance (S).
    pub gmin: f64,
    /// Transient truncation-error overestimation factor.
    pub tr_tol: f64,
    /// Charge tolerance (C).
    pub chg_tol: f64,
    /// Relative pivot threshold for the sparse LU.
    pub pivot_rel_tol: f64,
    /// Absolute pivot threshold for the sparse LU.
    pub pivot_abs_tol: f64,
    /// Operating-point iteration limit.
    pub itl1: usize,
    /// Per-point iteration limit during DC sweeps.
    pub itl2: usize,
    /// Per-timepoint iteration limit during transient analysis.
    pub itl4: usize,
    /// Number of substeps for source stepping.
    pub src_steps: usize,
    /// Number of decades for gmin stepping.
    pub gmin_steps: usize,
    /// Nominal temperature at which device parameters are specified (K).
    pub nominal_temperature: f64,
    /// Operating temperature of the circuit (K).
    pub temperature: f64,
    /// Numerical integration method for transient analysis.
    pub method: IntegrationMethod,
    /// Cancellation token polled at every Newton iteration and time point.
    pub cancel: CancelToken,
}

impl Default for BaseConfiguration {
    fn default() -> Self {
        Self {
            rel_tol: 1e-3,
            abs_tol: 1e-12,
            vn_tol: 1e-6,
            gmin: 1e-12,
            tr_tol: 7.0,
            chg_tol: 1e-14,
            pivot_rel_tol: 1e-3,
            pivot_abs_tol: 1e-13,
            itl1: 100,
            itl2: 50,
            itl4: 10,
            src_steps: 10,
            gmin_steps: 10,
            nominal_temperature: 27.0 + CELSIUS_TO_KELVIN,
            temperature: 27.0 + CELSIUS_TO_KELVIN,
            method: IntegrationMethod::Trapezoidal,
            cancel: CancelToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spice() {
        let cfg = BaseConfiguration::default();
        assert_eq!(cfg.rel_tol, 1e-3);
        assert_eq!(cfg.abs_tol, 1e-12);
        assert_eq!(cfg.vn_tol, 1e-6);
        assert_eq!(cfg.itl1, 100);
        assert!((cfg.nominal_temperature - 300.15).abs() < 1e-12);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
