//! # galvani
//!
//! A SPICE-compatible analog circuit simulator core written in Rust.
//!
//! Galvani provides the simulation engine of a SPICE-class simulator:
//! - DC operating point and DC sweep analysis
//! - AC small-signal frequency response
//! - Adaptive time-domain (transient) simulation with trapezoidal and
//!   Gear-2 integration
//! - A handle-based sparse LU solver with Markowitz pivoting
//! - An entity/behaviour device model with a representative library
//!   (resistors, reactive elements, independent and controlled sources,
//!   a junction diode and a hysteretic switch)
//!
//! ## Quick start
//!
//! ```rust
//! use galvani::prelude::*;
//!
//! // A 10 V divider: V1 -- R1 -- mid -- R2 -- GND.
//! let mut circuit = Circuit::new();
//! circuit.add(VoltageSource::dc("V1", "in", "0", 10.0)).unwrap();
//! circuit.add(Resistor::new("R1", "in", "mid", 1000.0)).unwrap();
//! circuit.add(Resistor::new("R2", "mid", "0", 1000.0)).unwrap();
//!
//! let op = OperatingPoint::new().run(&circuit).unwrap();
//! assert!((op.solution.voltage("mid").unwrap() - 5.0).abs() < 1e-9);
//! ```

pub use galvani_core as core;
pub use galvani_devices as devices;
pub use galvani_sim as sim;

/// The types most applications need.
pub mod prelude {
    pub use galvani_core::{
        BaseConfiguration, CancelToken, Circuit, Device, Error, IntegrationMethod, Result,
        Waveform,
    };
    pub use galvani_devices::{
        Capacitor, Cccs, Ccvs, CurrentSource, Diode, Inductor, Resistor, VSwitch, Vccs, Vcvs,
        VoltageSource,
    };
    pub use galvani_sim::{
        AcSweep, AcSweepType, DcSweep, OperatingPoint, Transient,
    };
}
