//! Device library for the galvani simulator.
//!
//! Every device follows the same split: the entity type (`Resistor`,
//! `Diode`, ...) is a passive description created by the user or a parser,
//! and binding it to a simulation produces the behaviour object that owns
//! matrix handles and per-run state.

pub mod capacitor;
pub mod controlled;
pub mod diode;
pub mod inductor;
pub mod limit;
pub mod resistor;
pub mod sources;
pub mod stamp;
pub mod vswitch;

pub use capacitor::Capacitor;
pub use controlled::{Cccs, Ccvs, Vccs, Vcvs};
pub use diode::Diode;
pub use inductor::Inductor;
pub use limit::{pnjlim, LimitResult};
pub use resistor::Resistor;
pub use sources::{CurrentSource, VoltageSource};
pub use vswitch::VSwitch;

// The waveform type lives in the core crate because parameter values embed
// it; re-export it here where users expect to find it.
pub use galvani_core::Waveform;
