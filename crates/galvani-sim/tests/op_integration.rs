//! Operating-point and DC integration tests over full circuits.

use galvani_core::{BaseConfiguration, CancelToken, Circuit, Device, Error};
use galvani_devices::{Cccs, Ccvs, Diode, Resistor, VSwitch, Vccs, Vcvs, VoltageSource};
use galvani_sim::{DcSweep, OperatingPoint};

#[test]
fn test_resistor_divider_exact() {
    // Two 1k resistors from a 10 V source: V(mid) = 5.0 exactly.
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 10.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "mid", 1000.0)).unwrap();
    circuit.add(Resistor::new("R2", "mid", "0", 1000.0)).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    let mid = result.solution.voltage("mid").unwrap();
    assert!((mid - 5.0).abs() <= 1e-12, "V(mid) = {mid}");

    // Ohm's law residual at machine precision: the two resistor currents
    // balance exactly at the midpoint.
    let i1 = (result.solution.voltage("in").unwrap() - mid) / 1000.0;
    let i2 = mid / 1000.0;
    assert!((i1 - i2).abs() <= 1e-12, "KCL residual {:.3e}", i1 - i2);
}

#[test]
fn test_diode_clamp_bias_point() {
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 5.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "d", 1000.0)).unwrap();
    circuit.add(Diode::new("D1", "d", "0")).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    let vd = result.solution.voltage("d").unwrap();
    let i = -result.solution.branch_current("V1").unwrap();

    assert!(vd > 0.55 && vd < 0.75, "V(D1) = {vd}");
    assert!((i - (5.0 - vd) / 1000.0).abs() < 1e-9, "I = {i}");
    assert!(result.iterations <= 8, "{} iterations", result.iterations);
}

#[test]
fn test_diode_with_series_resistance() {
    // Rs shifts the terminal voltage up by I*Rs relative to the junction.
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 5.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "d", 1000.0)).unwrap();
    let mut d = Diode::new("D1", "d", "0");
    d.params_mut().set("rs", 50.0).unwrap();
    circuit.add(d).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    let vd_term = result.solution.voltage("d").unwrap();
    let vd_int = result.solution.voltage("d1#internal").unwrap();
    let i = -result.solution.branch_current("V1").unwrap();

    assert!(vd_term > vd_int, "series drop raises the terminal voltage");
    assert!(
        ((vd_term - vd_int) - i * 50.0).abs() < 1e-9,
        "drop {} vs I*Rs {}",
        vd_term - vd_int,
        i * 50.0
    );
}

#[test]
fn test_cccs_gain() {
    // V1 = 1 V across 1 ohm; F1 with gain 3 into 2 ohm: V(out) = 6 V.
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 1.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "0", 1.0)).unwrap();
    circuit.add(Cccs::new("F1", "out", "0", "V1", 3.0)).unwrap();
    circuit.add(Resistor::new("R2", "out", "0", 2.0)).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    let vout = result.solution.voltage("out").unwrap();
    assert!((vout - 6.0).abs() < 1e-9, "V(out) = {vout}");

    // The controlled current is 3 A into the 2 ohm load.
    assert!((vout / 2.0 - 3.0).abs() < 1e-9);
}

#[test]
fn test_vcvs_gain() {
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 2.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "0", 1000.0)).unwrap();
    circuit
        .add(Vcvs::new("E1", "out", "0", "in", "0", 5.0))
        .unwrap();
    circuit.add(Resistor::new("R2", "out", "0", 1000.0)).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    assert!((result.solution.voltage("out").unwrap() - 10.0).abs() < 1e-9);
}

#[test]
fn test_vccs_transconductance() {
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 1.0)).unwrap();
    circuit
        .add(Vccs::new("G1", "0", "out", "in", "0", 2e-3))
        .unwrap();
    circuit.add(Resistor::new("RL", "out", "0", 1000.0)).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    // 2 mA/V * 1 V into 1k, sourced into the node: V(out) = 2 V.
    assert!((result.solution.voltage("out").unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn test_ccvs_transresistance() {
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 1.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "0", 1.0)).unwrap();
    circuit
        .add(Ccvs::new("H1", "out", "0", "V1", 4.0))
        .unwrap();
    circuit.add(Resistor::new("R2", "out", "0", 1000.0)).unwrap();

    let result = OperatingPoint::new().run(&circuit).unwrap();
    // I(V1) = -1 A, so V(out) = 4 * (-1) = -4 V.
    assert!((result.solution.voltage("out").unwrap() + 4.0).abs() < 1e-9);
}

#[test]
fn test_switch_open_and_closed_dc() {
    let build = |vcont: f64| {
        let mut circuit = Circuit::new();
        circuit.add(VoltageSource::dc("V1", "in", "0", 1.0)).unwrap();
        circuit.add(Resistor::new("R1", "in", "a", 1000.0)).unwrap();
        circuit
            .add(VoltageSource::dc("Vc", "cont", "0", vcont))
            .unwrap();
        let mut s = VSwitch::new("S1", "a", "0", "cont", "0");
        s.params_mut().set("von", 1.5).unwrap();
        s.params_mut().set("voff", 0.5).unwrap();
        circuit.add(s).unwrap();
        circuit
    };

    // Control well below voff: open, V(a) ~ 1 V.
    let result = OperatingPoint::new().run(&build(0.0)).unwrap();
    assert!(result.solution.voltage("a").unwrap() > 0.99);

    // Control above von: closed, V(a) ~ 1 mV.
    let result = OperatingPoint::new().run(&build(2.0)).unwrap();
    assert!(result.solution.voltage("a").unwrap() < 2e-3);
}

#[test]
fn test_dc_sweep_diode_against_op_points() {
    // Each sweep point must match an independent operating-point solve.
    let build = |v: f64| {
        let mut circuit = Circuit::new();
        circuit.add(VoltageSource::dc("V1", "in", "0", v)).unwrap();
        circuit.add(Resistor::new("R1", "in", "d", 470.0)).unwrap();
        circuit.add(Diode::new("D1", "d", "0")).unwrap();
        circuit
    };

    let sweep = DcSweep::new("V1", 0.0, 2.0, 0.5).run(&build(0.0)).unwrap();
    for (&sv, sol) in sweep.sweep_values.iter().zip(&sweep.solutions) {
        let op = OperatingPoint::new().run(&build(sv)).unwrap();
        let v_sweep = sol.voltage("d").unwrap();
        let v_op = op.solution.voltage("d").unwrap();
        assert!(
            (v_sweep - v_op).abs() < 2e-3,
            "sweep {sv}: {v_sweep} vs op {v_op}"
        );
    }
}

#[test]
fn test_cancellation_surfaces_cleanly() {
    let mut circuit = Circuit::new();
    circuit.add(VoltageSource::dc("V1", "in", "0", 1.0)).unwrap();
    circuit.add(Resistor::new("R1", "in", "0", 1.0)).unwrap();

    let mut config = BaseConfiguration::default();
    let token = CancelToken::new();
    token.cancel();
    config.cancel = token;

    let result = OperatingPoint::with_config(config).run(&circuit);
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn test_duplicate_entity_rejected() {
    let mut circuit = Circuit::new();
    circuit.add(Resistor::new("R1", "a", "0", 1.0)).unwrap();
    let err = circuit.add(Resistor::new("r1", "b", "0", 2.0)).unwrap_err();
    assert!(matches!(err, Error::DuplicateEntity(_)));
}
