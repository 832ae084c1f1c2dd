//! Handle-based sparse matrix and LU solver.
//!
//! Devices request [`MatrixElement`]/[`RhsElement`] handles once at bind time
//! and stamp through them in O(1) inside the Newton loop, which keeps the
//! inner loop branch-free. Two requests for the same coordinate return the
//! same handle, so independent behaviours stamping one slot compose
//! additively. Any coordinate touching ground (row or column 0) resolves to
//! a shared sink that discards writes.
//!
//! Factorisation is sparse LU with Markowitz pivot selection: the first
//! `factor()` of a simulation performs the structural search, later calls
//! reuse the recorded pivot sequence and redo only the numerical
//! elimination. A pivot that degrades below `pivot_rel_tol * max|row|`
//! triggers a fresh search; an empty remaining submatrix fails with
//! [`Error::SingularMatrix`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use nalgebra::DVector;
use num_complex::Complex;

use crate::error::{Error, Result};

/// Matrix entry scalar: implemented for `f64` (biasing) and `Complex<f64>`
/// (small-signal AC).
pub trait Scalar:
    Copy
    + PartialEq
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + nalgebra::Scalar
    + 'static
{
    const ZERO: Self;
    const ONE: Self;

    /// Magnitude used for pivot selection.
    fn magnitude(self) -> f64;
}

impl Scalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl Scalar for Complex<f64> {
    const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };
    const ONE: Complex<f64> = Complex { re: 1.0, im: 0.0 };

    fn magnitude(self) -> f64 {
        self.norm()
    }
}

/// Accumulating handle to one matrix coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixElement {
    cell: usize,
    generation: u32,
}

impl MatrixElement {
    /// Whether this handle targets the ground sink.
    pub fn is_sink(self) -> bool {
        self.cell == 0
    }
}

/// Accumulating handle to one RHS row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RhsElement {
    row: usize,
    generation: u32,
}

impl RhsElement {
    /// Whether this handle targets the ground sink.
    pub fn is_sink(self) -> bool {
        self.row == 0
    }
}

#[derive(Debug, Clone)]
struct Cell<T> {
    row: usize,
    col: usize,
    value: T,
    #[cfg(debug_assertions)]
    tag: Option<String>,
}

#[derive(Debug, Clone)]
struct Factored<T> {
    /// Pivot (row, col) per elimination step, 0-based internal indices.
    pivots: Vec<(usize, usize)>,
    /// Per step: (target row, multiplier) pairs of the L factor.
    multipliers: Vec<Vec<(usize, T)>>,
    /// Per step: the pivot row after elimination, excluding the pivot column.
    upper: Vec<Vec<(usize, T)>>,
    /// Pivot values.
    diag: Vec<T>,
}

/// Sparse solver for `A x = b` over real or complex entries.
///
/// External rows and columns are numbered `0..=size` where 0 is ground;
/// ground never materialises in the factorised matrix.
#[derive(Debug, Clone)]
pub struct Solver<T: Scalar> {
    size: usize,
    cells: Vec<Cell<T>>,
    index: HashMap<(usize, usize), usize>,
    rhs: Vec<T>,
    generation: u32,
    pivot_rel_tol: f64,
    pivot_abs_tol: f64,
    pattern: Option<Vec<(usize, usize)>>,
    factored: Option<Factored<T>>,
    #[cfg(debug_assertions)]
    current_tag: Option<String>,
}

/// Outcome of a numerical refactorisation along a recorded pivot pattern.
enum Elimination<T> {
    Done(Factored<T>),
    /// A recorded pivot fell below the relative threshold.
    Degraded,
}

impl<T: Scalar> Solver<T> {
    /// Create a solver for `size` unknowns (ground excluded).
    pub fn new(size: usize, pivot_rel_tol: f64, pivot_abs_tol: f64) -> Self {
        Self {
            size,
            cells: vec![Cell {
                row: 0,
                col: 0,
                value: T::ZERO,
                #[cfg(debug_assertions)]
                tag: None,
            }],
            index: HashMap::new(),
            rhs: vec![T::ZERO; size + 1],
            generation: 0,
            pivot_rel_tol,
            pivot_abs_tol,
            pattern: None,
            factored: None,
            #[cfg(debug_assertions)]
            current_tag: None,
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of materialised (non-sink) elements.
    pub fn element_count(&self) -> usize {
        self.cells.len() - 1
    }

    /// Name the entity whose bind calls follow, for diagnostic builds.
    pub fn set_debug_tag(&mut self, _name: &str) {
        #[cfg(debug_assertions)]
        {
            self.current_tag = Some(_name.to_string());
        }
    }

    /// Get (or create) the handle for coordinate `(row, col)`.
    ///
    /// Row or column 0 returns the sink handle.
    pub fn get_element(&mut self, row: usize, col: usize) -> MatrixElement {
        assert!(row <= self.size && col <= self.size, "coordinate out of range");
        if row == 0 || col == 0 {
            return MatrixElement {
                cell: 0,
                generation: self.generation,
            };
        }
        let generation = self.generation;
        if let Some(&cell) = self.index.get(&(row, col)) {
            return MatrixElement { cell, generation };
        }
        let cell = self.cells.len();
        self.cells.push(Cell {
            row,
            col,
            value: T::ZERO,
            #[cfg(debug_assertions)]
            tag: self.current_tag.clone(),
        });
        self.index.insert((row, col), cell);
        // The structural pattern changed; any recorded pivot order is void.
        self.pattern = None;
        self.factored = None;
        MatrixElement { cell, generation }
    }

    /// Get the handle for RHS row `row`. Row 0 returns the sink handle.
    pub fn get_rhs(&mut self, row: usize) -> RhsElement {
        assert!(row <= self.size, "row out of range");
        RhsElement {
            row,
            generation: self.generation,
        }
    }

    /// Accumulate into a matrix element.
    pub fn add(&mut self, element: MatrixElement, value: T) {
        assert_eq!(
            element.generation, self.generation,
            "stale matrix handle (solver was cleared)"
        );
        self.cells[element.cell].value += value;
    }

    /// Accumulate into an RHS row.
    pub fn add_rhs(&mut self, element: RhsElement, value: T) {
        assert_eq!(
            element.generation, self.generation,
            "stale rhs handle (solver was cleared)"
        );
        self.rhs[element.row] += value;
    }

    /// Zero all live elements and the RHS, keeping the structure.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.value = T::ZERO;
        }
        for v in &mut self.rhs {
            *v = T::ZERO;
        }
    }

    /// Drop all elements and invalidate every outstanding handle.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cells.truncate(1);
        self.cells[0].value = T::ZERO;
        self.index.clear();
        self.rhs = vec![T::ZERO; self.size + 1];
        self.pattern = None;
        self.factored = None;
    }

    /// Read the value currently accumulated at a coordinate, for tests and
    /// diagnostics. Ground coordinates read as zero.
    pub fn value_at(&self, row: usize, col: usize) -> T {
        if row == 0 || col == 0 {
            return T::ZERO;
        }
        self.index
            .get(&(row, col))
            .map(|&c| self.cells[c].value)
            .unwrap_or(T::ZERO)
    }

    /// Read the accumulated RHS value at a row.
    pub fn rhs_at(&self, row: usize) -> T {
        if row == 0 {
            T::ZERO
        } else {
            self.rhs[row]
        }
    }

    /// Factor the matrix.
    ///
    /// The first call performs the Markowitz pivot search; subsequent calls
    /// reuse the pivot order and only redo the numerical elimination,
    /// falling back to a fresh search when a pivot degrades.
    pub fn factor(&mut self) -> Result<()> {
        let rows = self.build_rows();
        if let Some(pattern) = self.pattern.clone() {
            match self.eliminate_with(&pattern, rows.clone())? {
                Elimination::Done(f) => {
                    self.factored = Some(f);
                    return Ok(());
                }
                Elimination::Degraded => {
                    // Numerical degradation: redo the pivot search below.
                }
            }
        }
        let factored = self.markowitz(rows)?;
        self.pattern = Some(factored.pivots.clone());
        self.factored = Some(factored);
        Ok(())
    }

    /// Solve with the current factorisation.
    ///
    /// The returned vector is indexed by internal unknown, i.e. external row
    /// `r` maps to entry `r - 1`.
    pub fn solve(&self) -> Result<DVector<T>> {
        let factored = self
            .factored
            .as_ref()
            .expect("factor() must succeed before solve()");
        let n = self.size;
        let mut y: Vec<T> = self.rhs[1..=n].to_vec();

        for (k, &(pr, _)) in factored.pivots.iter().enumerate() {
            let yp = y[pr];
            for &(r, f) in &factored.multipliers[k] {
                let delta = f * yp;
                y[r] -= delta;
            }
        }

        let mut x = vec![T::ZERO; n];
        for (k, &(pr, pc)) in factored.pivots.iter().enumerate().rev() {
            let mut sum = y[pr];
            for &(c, v) in &factored.upper[k] {
                let delta = v * x[c];
                sum -= delta;
            }
            x[pc] = sum / factored.diag[k];
        }

        Ok(DVector::from_vec(x))
    }

    /// Assemble internal 0-based row maps from the live cells.
    fn build_rows(&self) -> Vec<BTreeMap<usize, T>> {
        let mut rows = vec![BTreeMap::new(); self.size];
        for cell in self.cells.iter().skip(1) {
            *rows[cell.row - 1].entry(cell.col - 1).or_insert(T::ZERO) += cell.value;
        }
        rows
    }

    /// Column occupancy sets for the given rows.
    fn build_cols(&self, rows: &[BTreeMap<usize, T>]) -> Vec<BTreeSet<usize>> {
        let mut cols = vec![BTreeSet::new(); self.size];
        for (r, row) in rows.iter().enumerate() {
            for &c in row.keys() {
                cols[c].insert(r);
            }
        }
        cols
    }

    /// Numerical elimination along a fixed pivot sequence.
    fn eliminate_with(
        &self,
        pivots: &[(usize, usize)],
        mut rows: Vec<BTreeMap<usize, T>>,
    ) -> Result<Elimination<T>> {
        let mut cols = self.build_cols(&rows);
        let mut factored = Factored {
            pivots: Vec::with_capacity(pivots.len()),
            multipliers: Vec::with_capacity(pivots.len()),
            upper: Vec::with_capacity(pivots.len()),
            diag: Vec::with_capacity(pivots.len()),
        };

        for &(pr, pc) in pivots {
            let piv = match rows[pr].get(&pc) {
                Some(&v) => v,
                None => return Ok(Elimination::Degraded),
            };
            let row_max = rows[pr]
                .values()
                .map(|v| v.magnitude())
                .fold(0.0_f64, f64::max);
            if piv.magnitude() < self.pivot_abs_tol
                || piv.magnitude() < self.pivot_rel_tol * row_max
            {
                return Ok(Elimination::Degraded);
            }
            Self::eliminate_step(&mut rows, &mut cols, &mut factored, pr, pc, piv);
        }

        Ok(Elimination::Done(factored))
    }

    /// Full factorisation with Markowitz pivot selection.
    fn markowitz(&self, mut rows: Vec<BTreeMap<usize, T>>) -> Result<Factored<T>> {
        let n = self.size;
        let mut cols = self.build_cols(&rows);
        let mut active_rows: BTreeSet<usize> = (0..n).collect();
        let mut factored = Factored {
            pivots: Vec::with_capacity(n),
            multipliers: Vec::with_capacity(n),
            upper: Vec::with_capacity(n),
            diag: Vec::with_capacity(n),
        };

        for _ in 0..n {
            let mut best: Option<(usize, usize, T, usize, f64)> = None;

            for &r in &active_rows {
                let row = &rows[r];
                let row_max = row.values().map(|v| v.magnitude()).fold(0.0_f64, f64::max);
                let threshold = self.pivot_abs_tol.max(self.pivot_rel_tol * row_max);
                let row_count = row.len();
                for (&c, &v) in row {
                    let mag = v.magnitude();
                    if mag < threshold || mag < self.pivot_abs_tol {
                        continue;
                    }
                    let score = (row_count - 1) * (cols[c].len() - 1);
                    let better = match best {
                        None => true,
                        Some((_, _, _, best_score, best_mag)) => {
                            score < best_score || (score == best_score && mag > best_mag)
                        }
                    };
                    if better {
                        best = Some((r, c, v, score, mag));
                    }
                }
            }

            let (pr, pc, piv, _, _) = best.ok_or_else(|| self.singular_error(&active_rows, &rows))?;
            active_rows.remove(&pr);
            Self::eliminate_step(&mut rows, &mut cols, &mut factored, pr, pc, piv);
        }

        Ok(factored)
    }

    /// One elimination step: record L/U contributions of pivot `(pr, pc)`
    /// and update the remaining submatrix, creating fill-in as needed.
    fn eliminate_step(
        rows: &mut [BTreeMap<usize, T>],
        cols: &mut [BTreeSet<usize>],
        factored: &mut Factored<T>,
        pr: usize,
        pc: usize,
        piv: T,
    ) {
        // Detach the pivot row; its remaining entries form the U row.
        let pivot_row = std::mem::take(&mut rows[pr]);
        let mut upper = Vec::with_capacity(pivot_row.len().saturating_sub(1));
        for (&c, &v) in &pivot_row {
            cols[c].remove(&pr);
            if c != pc {
                upper.push((c, v));
            }
        }

        // Eliminate the pivot column from every remaining row.
        let targets: Vec<usize> = cols[pc].iter().copied().collect();
        cols[pc].clear();
        let mut multipliers = Vec::with_capacity(targets.len());
        for r in targets {
            let f = rows[r].remove(&pc).expect("column set out of sync") / piv;
            multipliers.push((r, f));
            for &(c, uv) in &upper {
                let entry = rows[r].entry(c).or_insert(T::ZERO);
                *entry -= f * uv;
                cols[c].insert(r);
            }
        }

        factored.pivots.push((pr, pc));
        factored.multipliers.push(multipliers);
        factored.upper.push(upper);
        factored.diag.push(piv);
    }

    /// Build the singular-matrix error, reporting the emptiest active row.
    fn singular_error(
        &self,
        active_rows: &BTreeSet<usize>,
        rows: &[BTreeMap<usize, T>],
    ) -> Error {
        let offending = active_rows
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let ma = rows[a].values().map(|v| v.magnitude()).fold(0.0_f64, f64::max);
                let mb = rows[b].values().map(|v| v.magnitude()).fold(0.0_f64, f64::max);
                ma.partial_cmp(&mb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        Error::SingularMatrix {
            row: offending + 1,
            tag: self.row_tag(offending + 1),
        }
    }

    #[cfg(debug_assertions)]
    fn row_tag(&self, row: usize) -> Option<String> {
        self.cells
            .iter()
            .skip(1)
            .find(|c| c.row == row && c.tag.is_some())
            .and_then(|c| c.tag.clone())
    }

    #[cfg(not(debug_assertions))]
    fn row_tag(&self, _row: usize) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp_conductance(solver: &mut Solver<f64>, a: usize, b: usize, g: f64) {
        let aa = solver.get_element(a, a);
        let bb = solver.get_element(b, b);
        let ab = solver.get_element(a, b);
        let ba = solver.get_element(b, a);
        solver.add(aa, g);
        solver.add(bb, g);
        solver.add(ab, -g);
        solver.add(ba, -g);
    }

    #[test]
    fn test_ground_maps_to_sink() {
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        let sink = solver.get_element(0, 1);
        assert!(sink.is_sink());
        let sink2 = solver.get_element(2, 0);
        assert!(sink2.is_sink());
        solver.add(sink, 123.0);
        // No element with row or column 0 is ever materialised.
        assert_eq!(solver.element_count(), 0);
    }

    #[test]
    fn test_same_coordinate_same_handle() {
        let mut solver: Solver<f64> = Solver::new(3, 1e-3, 1e-13);
        let a = solver.get_element(1, 2);
        let b = solver.get_element(1, 2);
        assert_eq!(a, b);
        solver.add(a, 2.0);
        solver.add(b, 3.0);
        assert_eq!(solver.value_at(1, 2), 5.0);
    }

    #[test]
    fn test_additive_stamps_compose() {
        // Two "devices" stamping disjoint and overlapping coordinates sum up.
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        stamp_conductance(&mut solver, 1, 2, 1e-3);
        stamp_conductance(&mut solver, 1, 2, 2e-3);
        assert!((solver.value_at(1, 1) - 3e-3).abs() < 1e-18);
        assert!((solver.value_at(1, 2) + 3e-3).abs() < 1e-18);
    }

    #[test]
    fn test_resistor_network_is_symmetric() {
        let mut solver: Solver<f64> = Solver::new(3, 1e-3, 1e-13);
        stamp_conductance(&mut solver, 1, 2, 1.0 / 1000.0);
        stamp_conductance(&mut solver, 2, 3, 1.0 / 2200.0);
        stamp_conductance(&mut solver, 1, 3, 1.0 / 470.0);
        stamp_conductance(&mut solver, 3, 0, 1.0 / 100.0);
        for r in 1..=3 {
            for c in 1..=3 {
                assert_eq!(
                    solver.value_at(r, c),
                    solver.value_at(c, r),
                    "asymmetry at ({r},{c})"
                );
            }
        }
    }

    #[test]
    fn test_solve_2x2() {
        // 2x + y = 5, x + 3y = 6 -> x = 1.8, y = 1.4
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        let e11 = solver.get_element(1, 1);
        let e12 = solver.get_element(1, 2);
        let e21 = solver.get_element(2, 1);
        let e22 = solver.get_element(2, 2);
        let r1 = solver.get_rhs(1);
        let r2 = solver.get_rhs(2);
        solver.add(e11, 2.0);
        solver.add(e12, 1.0);
        solver.add(e21, 1.0);
        solver.add(e22, 3.0);
        solver.add_rhs(r1, 5.0);
        solver.add_rhs(r2, 6.0);

        solver.factor().unwrap();
        let x = solver.solve().unwrap();
        assert!((x[0] - 1.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_resistive_divider_residual_is_machine_zero() {
        // 10V source modelled as a branch equation, two 1k resistors.
        // Unknowns: v(1), v(mid), i(branch).
        let mut solver: Solver<f64> = Solver::new(3, 1e-3, 1e-13);
        let g = 1.0 / 1000.0;
        stamp_conductance(&mut solver, 1, 2, g);
        stamp_conductance(&mut solver, 2, 0, g);
        // Branch equation: v(1) = 10.
        let e1b = solver.get_element(1, 3);
        let eb1 = solver.get_element(3, 1);
        let rb = solver.get_rhs(3);
        solver.add(e1b, 1.0);
        solver.add(eb1, 1.0);
        solver.add_rhs(rb, 10.0);

        solver.factor().unwrap();
        let x = solver.solve().unwrap();
        assert!((x[0] - 10.0).abs() < 1e-12, "V(1) = {}", x[0]);
        assert!((x[1] - 5.0).abs() < 1e-12, "V(mid) = {}", x[1]);
        assert!((x[2] + 5e-3).abs() < 1e-12, "I(V1) = {}", x[2]);

        // Residual check: A x - b at machine precision.
        let residual_mid = g * (x[1] - x[0]) + g * x[1];
        assert!(residual_mid.abs() <= 1e-12);
    }

    #[test]
    fn test_pattern_reuse_after_value_change() {
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        let e11 = solver.get_element(1, 1);
        let e22 = solver.get_element(2, 2);
        let e12 = solver.get_element(1, 2);
        let r1 = solver.get_rhs(1);

        solver.add(e11, 1.0);
        solver.add(e12, 0.5);
        solver.add(e22, 1.0);
        solver.add_rhs(r1, 1.0);
        solver.factor().unwrap();
        let x1 = solver.solve().unwrap();
        assert!((x1[0] - 1.0).abs() < 1e-12);

        // Same pattern, new values: second factor reuses the pivot order.
        solver.reset();
        solver.add(e11, 2.0);
        solver.add(e12, 0.5);
        solver.add(e22, 1.0);
        solver.add_rhs(r1, 2.0);
        solver.factor().unwrap();
        let x2 = solver.solve().unwrap();
        assert!((x2[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pivot_degradation_triggers_fresh_search() {
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        let e11 = solver.get_element(1, 1);
        let e12 = solver.get_element(1, 2);
        let e21 = solver.get_element(2, 1);
        let e22 = solver.get_element(2, 2);
        let r1 = solver.get_rhs(1);
        let r2 = solver.get_rhs(2);

        solver.add(e11, 1.0);
        solver.add(e12, 0.0);
        solver.add(e21, 0.0);
        solver.add(e22, 1.0);
        solver.factor().unwrap();

        // Kill the old pivot position numerically; the solver must recover
        // by searching for a new pivot order.
        solver.reset();
        solver.add(e11, 0.0);
        solver.add(e12, 1.0);
        solver.add(e21, 1.0);
        solver.add(e22, 0.0);
        solver.add_rhs(r1, 3.0);
        solver.add_rhs(r2, 7.0);
        solver.factor().unwrap();
        let x = solver.solve().unwrap();
        assert!((x[0] - 7.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_reports_row() {
        let mut solver: Solver<f64> = Solver::new(2, 1e-3, 1e-13);
        let e11 = solver.get_element(1, 1);
        solver.add(e11, 1.0);
        // Row 2 is empty: no acceptable pivot exists there.
        let err = solver.factor().unwrap_err();
        match err {
            Error::SingularMatrix { row, .. } => assert_eq!(row, 2),
            other => panic!("expected SingularMatrix, got {other:?}"),
        }
    }

    #[test]
    fn test_complex_solve() {
        let mut solver: Solver<Complex<f64>> = Solver::new(1, 1e-3, 1e-13);
        let e = solver.get_element(1, 1);
        let r = solver.get_rhs(1);
        // (1 + j) x = 2 -> x = 1 - j
        solver.add(e, Complex::new(1.0, 1.0));
        solver.add_rhs(r, Complex::new(2.0, 0.0));
        solver.factor().unwrap();
        let x = solver.solve().unwrap();
        assert!((x[0].re - 1.0).abs() < 1e-12);
        assert!((x[0].im + 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "stale matrix handle")]
    fn test_stale_handle_is_rejected() {
        let mut solver: Solver<f64> = Solver::new(1, 1e-3, 1e-13);
        let e = solver.get_element(1, 1);
        solver.clear();
        solver.add(e, 1.0);
    }

    #[test]
    fn test_fill_in_is_handled() {
        // Arrow matrix: dense first row/column, diagonal elsewhere.
        // Elimination order matters; Markowitz should avoid blowing it up,
        // and the answer must still be right.
        let n = 6;
        let mut solver: Solver<f64> = Solver::new(n, 1e-3, 1e-13);
        for i in 1..=n {
            let d = solver.get_element(i, i);
            solver.add(d, 4.0);
            if i > 1 {
                let a = solver.get_element(1, i);
                let b = solver.get_element(i, 1);
                solver.add(a, 1.0);
                solver.add(b, 1.0);
            }
            let r = solver.get_rhs(i);
            solver.add_rhs(r, i as f64);
        }
        solver.factor().unwrap();
        let x = solver.solve().unwrap();

        // Verify A x = b directly.
        for i in 1..=n {
            let mut lhs = 4.0 * x[i - 1];
            if i == 1 {
                for j in 2..=n {
                    lhs += x[j - 1];
                }
            } else {
                lhs += x[0];
            }
            assert!((lhs - i as f64).abs() < 1e-10, "row {i}: {lhs}");
        }
    }
}
