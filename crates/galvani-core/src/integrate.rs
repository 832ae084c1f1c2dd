//! Numerical integration for reactive elements.
//!
//! A reactive behaviour stores a charge (or flux) in one history slot and
//! its time derivative in the next. [`Integrator::integrate`] turns the
//! current charge into the Norton companion pair `(geq, ceq)` that the
//! behaviour stamps: `geq` is the equivalent conductance seen by the matrix
//! and `ceq` the equivalent current already containing the history terms.

use crate::state::{StateHistory, StateSlot};

/// Supported integration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMethod {
    /// Trapezoidal rule: second order, A-stable.
    Trapezoidal,
    /// Gear / BDF: up to second order, L-stable.
    Gear,
}

/// Result of integrating one charge slot.
#[derive(Debug, Clone, Copy)]
pub struct Integrated {
    /// Equivalent conductance `d(dq/dt)/dv = ag0 * dq/dv`.
    pub geq: f64,
    /// The derivative `dq/dt` at the new time point.
    pub ceq: f64,
}

/// Variable-step integrator state shared by all reactive behaviours.
#[derive(Debug, Clone)]
pub struct Integrator {
    method: IntegrationMethod,
    order: usize,
    /// Current step size.
    delta: f64,
    /// Previous accepted step size.
    old_delta: f64,
    /// Leading derivative coefficient for the active method and order.
    ag0: f64,
}

impl Integrator {
    /// Create an integrator; the order ramps from 1 at the first point.
    pub fn new(method: IntegrationMethod) -> Self {
        Self {
            method,
            order: 1,
            delta: 0.0,
            old_delta: 0.0,
            ag0: 0.0,
        }
    }

    /// The active method.
    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    /// The active order (1 or 2).
    pub fn order(&self) -> usize {
        self.order
    }

    /// The current step size.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Begin a step of size `delta`, recomputing the method coefficients.
    pub fn begin_step(&mut self, delta: f64) {
        self.delta = delta;
        self.ag0 = match (self.method, self.order) {
            (_, 1) => 1.0 / delta,
            (IntegrationMethod::Trapezoidal, _) => 2.0 / delta,
            (IntegrationMethod::Gear, _) => {
                // Non-uniform BDF2 leading coefficient; reduces to 3/(2h)
                // for equal steps.
                let rho = delta / self.old_delta;
                (1.0 + 2.0 * rho) / ((1.0 + rho) * delta)
            }
        };
    }

    /// Raise the order to 2 once a first point has been accepted.
    pub fn raise_order(&mut self) {
        self.order = 2;
    }

    /// Drop back to first order (after a discontinuity such as a breakpoint).
    pub fn reset_order(&mut self) {
        self.order = 1;
    }

    /// Record an accepted step of the current size.
    pub fn accept(&mut self) {
        self.old_delta = self.delta;
    }

    /// Integrate the charge in `charge` (already written for the working
    /// generation), producing `dq/dt` into `deriv` and the companion pair.
    ///
    /// `dqdv` is the instantaneous derivative of the charge with respect to
    /// its controlling variable (the capacitance or inductance).
    pub fn integrate(
        &self,
        history: &mut StateHistory,
        charge: StateSlot,
        deriv: StateSlot,
        dqdv: f64,
    ) -> Integrated {
        let q0 = history.value(charge, 0);
        let q1 = history.value(charge, 1);
        let ceq = match (self.method, self.order) {
            // Backward Euler while the order ramps.
            (_, 1) => (q0 - q1) / self.delta,
            (IntegrationMethod::Trapezoidal, _) => {
                let qdot1 = history.value(deriv, 1);
                2.0 / self.delta * (q0 - q1) - qdot1
            }
            (IntegrationMethod::Gear, _) => {
                let q2 = history.value(charge, 2);
                let rho = self.delta / self.old_delta;
                let a0 = (1.0 + 2.0 * rho) / ((1.0 + rho) * self.delta);
                let a1 = -(1.0 + rho) / self.delta;
                let a2 = rho * rho / ((1.0 + rho) * self.delta);
                a0 * q0 + a1 * q1 + a2 * q2
            }
        };
        history.set(deriv, ceq);
        Integrated {
            geq: self.ag0 * dqdv,
            ceq,
        }
    }

    /// Local-truncation-error estimate for one charge slot.
    ///
    /// Compares the method derivative against the backward-Euler derivative
    /// over the same step (Milne device); exact for linear ramps, grows with
    /// curvature.
    pub fn truncation_error(&self, history: &StateHistory, charge: StateSlot, deriv: StateSlot) -> f64 {
        if self.order < 2 {
            return 0.0;
        }
        let method_deriv = history.value(deriv, 0);
        let be_deriv = (history.value(charge, 0) - history.value(charge, 1)) / self.delta;
        (method_deriv - be_deriv).abs() / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (StateHistory, StateSlot, StateSlot) {
        let mut history = StateHistory::new();
        let q = history.allocate(1);
        let dq = history.allocate(1);
        history.build();
        (history, q, dq)
    }

    #[test]
    fn test_backward_euler_first_step() {
        let (mut history, q, dq) = setup();
        let mut int = Integrator::new(IntegrationMethod::Trapezoidal);
        int.begin_step(1e-6);

        // q jumps from 0 to 1e-6 C in 1us: dq/dt = 1 A.
        history.set(q, 1e-6);
        let res = int.integrate(&mut history, q, dq, 1e-6);
        assert!((res.ceq - 1.0).abs() < 1e-12);
        assert!((res.geq - 1.0).abs() < 1e-12, "geq = C/h at order 1");
    }

    #[test]
    fn test_trapezoidal_derivative() {
        let (mut history, q, dq) = setup();
        let mut int = Integrator::new(IntegrationMethod::Trapezoidal);

        // First step at order 1 establishes q and dq/dt history.
        int.begin_step(1e-6);
        history.set(q, 1e-6);
        int.integrate(&mut history, q, dq, 1e-6);
        history.rotate();
        int.accept();
        int.raise_order();

        // Constant-rate charge: trapezoidal must reproduce dq/dt exactly.
        int.begin_step(1e-6);
        history.set(q, 2e-6);
        let res = int.integrate(&mut history, q, dq, 1e-6);
        assert!((res.ceq - 1.0).abs() < 1e-9, "ceq = {}", res.ceq);
        assert!((res.geq - 2.0).abs() < 1e-12, "geq = 2C/h at order 2");
    }

    #[test]
    fn test_gear2_uniform_coefficients() {
        let (mut history, q, dq) = setup();
        let mut int = Integrator::new(IntegrationMethod::Gear);

        int.begin_step(1.0);
        history.set(q, 1.0);
        int.integrate(&mut history, q, dq, 1.0);
        history.rotate();
        int.accept();
        int.raise_order();

        int.begin_step(1.0);
        history.set(q, 2.0);
        // Uniform-step BDF2: dq/dt = 1.5*q0 - 2*q1 + 0.5*q2 = 3 - 2 + 0 = 1.
        let res = int.integrate(&mut history, q, dq, 1.0);
        assert!((res.ceq - 1.0).abs() < 1e-12, "ceq = {}", res.ceq);
        assert!((res.geq - 1.5).abs() < 1e-12, "ag0 = 3/(2h) for BDF2");
    }

    #[test]
    fn test_lte_zero_for_linear_ramp() {
        let (mut history, q, dq) = setup();
        let mut int = Integrator::new(IntegrationMethod::Trapezoidal);

        int.begin_step(1.0);
        history.set(q, 1.0);
        int.integrate(&mut history, q, dq, 1.0);
        history.rotate();
        int.accept();
        int.raise_order();

        int.begin_step(1.0);
        history.set(q, 2.0);
        int.integrate(&mut history, q, dq, 1.0);
        let lte = int.truncation_error(&history, q, dq);
        assert!(lte < 1e-12, "linear ramp should have no LTE: {lte}");
    }

    #[test]
    fn test_lte_positive_for_curved_charge() {
        let (mut history, q, dq) = setup();
        let mut int = Integrator::new(IntegrationMethod::Trapezoidal);

        int.begin_step(1.0);
        history.set(q, 1.0);
        int.integrate(&mut history, q, dq, 1.0);
        history.rotate();
        int.accept();
        int.raise_order();

        int.begin_step(1.0);
        history.set(q, 4.0); // quadratic growth
        int.integrate(&mut history, q, dq, 1.0);
        let lte = int.truncation_error(&history, q, dq);
        assert!(lte > 0.1, "curvature must register as LTE: {lte}");
    }
}
