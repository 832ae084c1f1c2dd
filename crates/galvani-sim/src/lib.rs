//! Simulation drivers for the galvani circuit simulator.
//!
//! Four analyses share one engine: [`OperatingPoint`], [`DcSweep`],
//! [`AcSweep`] and [`Transient`]. The engine binds every entity of a
//! [`galvani_core::Circuit`] into per-run behaviours, drives the Newton
//! loop with junction initialisation and the source/gmin recovery ladder,
//! and owns the sparse solver, state vectors and integration history.
//!
//! # Example
//!
//! ```rust
//! use galvani_core::Circuit;
//! use galvani_devices::{Resistor, VoltageSource};
//! use galvani_sim::OperatingPoint;
//!
//! let mut circuit = Circuit::new();
//! circuit.add(VoltageSource::dc("V1", "in", "0", 10.0)).unwrap();
//! circuit.add(Resistor::new("R1", "in", "mid", 1000.0)).unwrap();
//! circuit.add(Resistor::new("R2", "mid", "0", 1000.0)).unwrap();
//!
//! let result = OperatingPoint::new().run(&circuit).unwrap();
//! assert!((result.solution.voltage("mid").unwrap() - 5.0).abs() < 1e-9);
//! ```

mod engine;

pub mod ac;
pub mod dc;
pub mod op;
pub mod solution;
pub mod transient;

pub use ac::{generate_frequencies, AcResult, AcSweep, AcSweepType};
pub use dc::{DcSweep, DcSweepResult};
pub use op::{OperatingPoint, OpResult};
pub use solution::{ComplexSolution, Solution};
pub use transient::{ExportPoint, TimePoint, Transient, TransientResult};
