//! Reusable stamp geometries.
//!
//! Most devices stamp one of three shapes: a conductance across two nodes,
//! a current injection into two RHS rows, or a branch equation row/column
//! pair. These helpers bundle the handles for each shape so behaviours stay
//! small and the inner Newton loop stays branch-free.

use galvani_core::sparse::{MatrixElement, RhsElement, Scalar, Solver};
use galvani_core::Variable;

/// Handles for a conductance between two nodes: the four (pos/neg)² slots.
#[derive(Debug, Clone, Copy)]
pub struct ConductanceStamp<T: Scalar> {
    pp: MatrixElement,
    pn: MatrixElement,
    np: MatrixElement,
    nn: MatrixElement,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Scalar> ConductanceStamp<T> {
    /// Request the four handles for a conductance between `pos` and `neg`.
    pub fn bind(solver: &mut Solver<T>, pos: Variable, neg: Variable) -> Self {
        Self {
            pp: solver.get_element(pos.index(), pos.index()),
            pn: solver.get_element(pos.index(), neg.index()),
            np: solver.get_element(neg.index(), pos.index()),
            nn: solver.get_element(neg.index(), neg.index()),
            _marker: std::marker::PhantomData,
        }
    }

    /// Accumulate the conductance `g`.
    pub fn stamp(&self, solver: &mut Solver<T>, g: T) {
        solver.add(self.pp, g);
        solver.add(self.nn, g);
        solver.add(self.pn, -g);
        solver.add(self.np, -g);
    }
}

/// Handles for a current injection: current flows from `pos` to `neg`
/// through the device, i.e. it leaves the circuit at `pos` and returns at
/// `neg`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentStamp {
    pos: RhsElement,
    neg: RhsElement,
}

impl CurrentStamp {
    /// Request the two RHS handles.
    pub fn bind<T: Scalar>(solver: &mut Solver<T>, pos: Variable, neg: Variable) -> Self {
        Self {
            pos: solver.get_rhs(pos.index()),
            neg: solver.get_rhs(neg.index()),
        }
    }

    /// Accumulate the current `i` flowing from `pos` to `neg`.
    pub fn stamp<T: Scalar>(&self, solver: &mut Solver<T>, i: T) {
        solver.add_rhs(self.pos, -i);
        solver.add_rhs(self.neg, i);
    }
}

/// Handles for a branch equation: the ±1 row/column pair of a voltage
/// source, plus the branch RHS row carrying the source value.
#[derive(Debug, Clone, Copy)]
pub struct BranchStamp {
    pb: MatrixElement,
    bp: MatrixElement,
    nb: MatrixElement,
    bn: MatrixElement,
    rhs: RhsElement,
}

impl BranchStamp {
    /// Request the handles for branch variable `branch` tied to `pos`/`neg`.
    pub fn bind<T: Scalar>(
        solver: &mut Solver<T>,
        pos: Variable,
        neg: Variable,
        branch: Variable,
    ) -> Self {
        Self {
            pb: solver.get_element(pos.index(), branch.index()),
            bp: solver.get_element(branch.index(), pos.index()),
            nb: solver.get_element(neg.index(), branch.index()),
            bn: solver.get_element(branch.index(), neg.index()),
            rhs: solver.get_rhs(branch.index()),
        }
    }

    /// Stamp the ±1 coupling pattern and the branch equation value:
    /// `V(pos) - V(neg) = value`.
    pub fn stamp<T: Scalar>(&self, solver: &mut Solver<T>, value: T) {
        self.stamp_pattern(solver);
        solver.add_rhs(self.rhs, value);
    }

    /// Stamp only the ±1 coupling pattern (branch value supplied elsewhere,
    /// as for inductors and controlled sources).
    pub fn stamp_pattern<T: Scalar>(&self, solver: &mut Solver<T>) {
        solver.add(self.pb, T::ONE);
        solver.add(self.bp, T::ONE);
        solver.add(self.nb, -T::ONE);
        solver.add(self.bn, -T::ONE);
    }

    /// Accumulate into the branch RHS row.
    pub fn stamp_rhs<T: Scalar>(&self, solver: &mut Solver<T>, value: T) {
        solver.add_rhs(self.rhs, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galvani_core::{VariableKind, VariableSet};

    #[test]
    fn test_conductance_stamp_pattern() {
        let mut vars = VariableSet::new();
        let a = vars.create("a", VariableKind::Voltage).unwrap();
        let b = vars.create("b", VariableKind::Voltage).unwrap();
        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);

        let stamp = ConductanceStamp::bind(&mut solver, a, b);
        stamp.stamp(&mut solver, 2.0);

        assert_eq!(solver.value_at(1, 1), 2.0);
        assert_eq!(solver.value_at(2, 2), 2.0);
        assert_eq!(solver.value_at(1, 2), -2.0);
        assert_eq!(solver.value_at(2, 1), -2.0);
    }

    #[test]
    fn test_conductance_to_ground_drops_off_diagonals() {
        let mut vars = VariableSet::new();
        let a = vars.create("a", VariableKind::Voltage).unwrap();
        let gnd = vars.ground();
        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);

        let stamp = ConductanceStamp::bind(&mut solver, a, gnd);
        stamp.stamp(&mut solver, 1.5);

        assert_eq!(solver.value_at(1, 1), 1.5);
        // Everything that touched ground went to the sink.
        assert_eq!(solver.element_count(), 1);
    }

    #[test]
    fn test_branch_stamp() {
        let mut vars = VariableSet::new();
        let p = vars.create("p", VariableKind::Voltage).unwrap();
        let b = vars.create("v1#branch", VariableKind::Current).unwrap();
        let mut solver: Solver<f64> = Solver::new(vars.unknowns(), 1e-3, 1e-13);

        let stamp = BranchStamp::bind(&mut solver, p, vars.ground(), b);
        stamp.stamp(&mut solver, 5.0);

        assert_eq!(solver.value_at(1, 2), 1.0);
        assert_eq!(solver.value_at(2, 1), 1.0);
        assert_eq!(solver.rhs_at(2), 5.0);
    }
}
