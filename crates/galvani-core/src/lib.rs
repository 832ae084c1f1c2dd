//! Core layer of the galvani circuit simulator.
//!
//! This crate provides the machinery every analysis is built from:
//!
//! - [`VariableSet`]: maps circuit nodes and branch unknowns to solver
//!   indices; index 0 is ground and never enters the solved system.
//! - [`sparse::Solver`]: handle-based sparse matrix with Markowitz LU,
//!   shared by real (biasing) and complex (AC) analyses.
//! - [`BiasState`] / [`StateHistory`]: the Newton iteration state and the
//!   time-step history ring buffer.
//! - [`Integrator`]: trapezoidal and Gear-2 companion-model integration.
//! - [`Device`] / [`DeviceBehaviour`]: the entity/behaviour split between
//!   circuit description and per-run simulation state.
//! - [`ParameterSet`]: named parameters with explicit *given* tracking.
//!
//! # Example: stamping through handles
//!
//! ```rust
//! use galvani_core::sparse::Solver;
//!
//! let mut solver: Solver<f64> = Solver::new(1, 1e-3, 1e-13);
//! let diag = solver.get_element(1, 1);
//! let rhs = solver.get_rhs(1);
//! solver.add(diag, 1e-3);
//! solver.add_rhs(rhs, 5e-3);
//! solver.factor().unwrap();
//! let x = solver.solve().unwrap();
//! assert!((x[0] - 5.0).abs() < 1e-12);
//! ```

pub mod behaviour;
pub mod config;
pub mod entity;
pub mod error;
pub mod integrate;
pub mod params;
pub mod sparse;
pub mod state;
pub mod variables;
pub mod waveform;

pub use behaviour::{BindContext, DeviceBehaviour};
pub use config::{BaseConfiguration, CancelToken, CELSIUS_TO_KELVIN};
pub use entity::{Circuit, Device};
pub use error::{Error, Result};
pub use integrate::{Integrated, IntegrationMethod, Integrator};
pub use params::{ParamValue, ParameterSet};
pub use state::{BiasState, InitMode, StateHistory, StateSlot};
pub use variables::{Variable, VariableKind, VariableSet};
pub use waveform::Waveform;
