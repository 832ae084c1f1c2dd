//! AC small-signal integration tests.

use galvani_core::Circuit;
use galvani_devices::{Capacitor, Diode, Inductor, Resistor, VoltageSource};
use galvani_sim::{AcSweep, AcSweepType, OperatingPoint};

/// Series RLC: the current magnitude peaks at the resonant frequency and
/// the capacitor voltage there is Q times the drive.
#[test]
fn test_series_rlc_resonance() {
    // R = 10, L = 1 mH, C = 100 nF: f0 = 15.92 kHz, Q = (1/R) sqrt(L/C) = 10.
    let mut circuit = Circuit::new();
    circuit
        .add(VoltageSource::dc("V1", "in", "0", 0.0).with_ac(1.0))
        .unwrap();
    circuit.add(Resistor::new("R1", "in", "n1", 10.0)).unwrap();
    circuit.add(Inductor::new("L1", "n1", "n2", 1e-3)).unwrap();
    circuit.add(Capacitor::new("C1", "n2", "0", 100e-9)).unwrap();

    let sweep = AcSweep::new(AcSweepType::Decade, 20, 100.0, 100e3);
    let result = sweep.run(&circuit).unwrap();

    // Find the grid point with maximum source-current magnitude.
    let mut peak_f = 0.0;
    let mut peak_i = 0.0;
    for (f, sol) in result.frequencies.iter().zip(&result.solutions) {
        let i = sol.branch_current("V1").unwrap().norm();
        if i > peak_i {
            peak_i = i;
            peak_f = *f;
        }
    }

    let f0 = 1.0 / (2.0 * std::f64::consts::PI * (1e-3_f64 * 100e-9).sqrt());
    let grid_ratio = 10f64.powf(1.0 / 20.0);
    assert!(
        peak_f >= f0 / grid_ratio && peak_f <= f0 * grid_ratio,
        "peak at {peak_f:.1} Hz, f0 = {f0:.1} Hz"
    );

    // At resonance the impedance is just R: |I| = 1/10.
    assert!((peak_i - 0.1).abs() < 5e-3, "peak |I| = {peak_i}");

    // Capacitor voltage at the peak is about Q times the drive.
    let peak_idx = result
        .frequencies
        .iter()
        .position(|&f| f == peak_f)
        .unwrap();
    let vc = result.solutions[peak_idx].magnitude("n2").unwrap();
    assert!(vc > 9.0 && vc < 11.0, "|V(C)| at resonance = {vc} (Q = 10)");
}

/// RC low-pass: -3 dB at 1/(2 pi R C) and -20 dB/decade rolloff.
#[test]
fn test_rc_lowpass_corner() {
    // R = 1k, C = 159.15 nF: fc ~ 1 kHz.
    let mut circuit = Circuit::new();
    circuit
        .add(VoltageSource::dc("V1", "in", "0", 0.0).with_ac(1.0))
        .unwrap();
    circuit.add(Resistor::new("R1", "in", "out", 1000.0)).unwrap();
    circuit
        .add(Capacitor::new("C1", "out", "0", 159.155e-9))
        .unwrap();

    let sweep = AcSweep::new(AcSweepType::Decade, 10, 10.0, 100e3);
    let result = sweep.run(&circuit).unwrap();

    for (f, sol) in result.frequencies.iter().zip(&result.solutions) {
        let mag = sol.magnitude("out").unwrap();
        let expected = 1.0 / (1.0 + (f / 1000.0).powi(2)).sqrt();
        assert!(
            (mag - expected).abs() < 1e-3,
            "|V(out)| at {f:.1} Hz: {mag} vs {expected}"
        );
    }
}

/// At very low frequency the AC response equals the small-signal Jacobian
/// of the DC operating point applied to the AC excitation.
#[test]
fn test_ac_matches_linearised_dc_at_low_frequency() {
    let mut circuit = Circuit::new();
    circuit
        .add(VoltageSource::dc("V1", "in", "0", 5.0).with_ac(1.0))
        .unwrap();
    circuit.add(Resistor::new("R1", "in", "d", 1000.0)).unwrap();
    circuit.add(Diode::new("D1", "d", "0")).unwrap();

    // Small-signal conductance from the operating point.
    let op = OperatingPoint::new().run(&circuit).unwrap();
    let vd = op.solution.voltage("d").unwrap();
    let vt = 1.380649e-23 * 300.15 / 1.602176634e-19;
    let gd = 1e-14 / vt * (vd / vt).exp();

    // Analytic small-signal divider: vd_ac = g / (g + gd).
    let g = 1.0 / 1000.0;
    let expected = g / (g + gd);

    let sweep = AcSweep::new(AcSweepType::Linear, 1, 1e-3, 1e-3);
    let result = sweep.run(&circuit).unwrap();
    let mag = result.solutions[0].magnitude("d").unwrap();

    // The AC stamp uses the Jacobian recorded at the last Newton load,
    // which sits within the convergence tolerance of the committed bias
    // point; allow that slack in gd.
    assert!(
        (mag - expected).abs() / expected < 0.05,
        "AC {mag} vs linearised DC {expected}"
    );
}

/// An inductor is transparent at low frequency and blocking at high
/// frequency (series RL high-pass behaviour at the output node).
#[test]
fn test_rl_frequency_response() {
    // V -- L -- out -- R -- gnd: |V(out)| = R / |R + jwL|.
    let mut circuit = Circuit::new();
    circuit
        .add(VoltageSource::dc("V1", "in", "0", 0.0).with_ac(1.0))
        .unwrap();
    circuit.add(Inductor::new("L1", "in", "out", 10e-3)).unwrap();
    circuit.add(Resistor::new("R1", "out", "0", 100.0)).unwrap();

    let sweep = AcSweep::new(AcSweepType::Decade, 10, 10.0, 100e3);
    let result = sweep.run(&circuit).unwrap();

    for (f, sol) in result.frequencies.iter().zip(&result.solutions) {
        let mag = sol.magnitude("out").unwrap();
        let wl = 2.0 * std::f64::consts::PI * f * 10e-3;
        let expected = 100.0 / (100.0_f64.powi(2) + wl * wl).sqrt();
        assert!(
            (mag - expected).abs() < 1e-6 + expected * 1e-6,
            "|V(out)| at {f:.1} Hz: {mag} vs {expected}"
        );
    }
}
