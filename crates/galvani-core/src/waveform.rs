//! Time-varying source waveforms.
//!
//! Waveforms are the value-producing half of the independent sources: the
//! source behaviours evaluate them at each time point and ask them for the
//! breakpoints the transient driver must land on exactly.

use std::f64::consts::PI;

/// A time-varying waveform specification.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Waveform {
    /// Constant DC value (time-independent).
    Dc(f64),

    /// Pulse waveform: PULSE(V1 V2 TD TR TF PW PER)
    ///
    /// - V1: Initial value
    /// - V2: Pulsed value
    /// - TD: Delay time (before first pulse)
    /// - TR: Rise time
    /// - TF: Fall time
    /// - PW: Pulse width (at V2)
    /// - PER: Period (0 for single pulse)
    Pulse {
        v1: f64,
        v2: f64,
        td: f64,
        tr: f64,
        tf: f64,
        pw: f64,
        per: f64,
    },

    /// Sinusoidal waveform: SIN(VO VA FREQ TD THETA PHASE)
    ///
    /// - VO: DC offset
    /// - VA: Amplitude
    /// - FREQ: Frequency in Hz
    /// - TD: Delay time (before sinusoid starts)
    /// - THETA: Damping factor (1/s), 0 for undamped
    /// - PHASE: Phase in degrees
    Sin {
        vo: f64,
        va: f64,
        freq: f64,
        td: f64,
        theta: f64,
        phase: f64,
    },

    /// Exponential waveform: EXP(V1 V2 TD1 TAU1 TD2 TAU2)
    Exp {
        v1: f64,
        v2: f64,
        td1: f64,
        tau1: f64,
        td2: f64,
        tau2: f64,
    },

    /// Piecewise linear waveform: PWL(T1 V1 T2 V2 ...)
    ///
    /// Linear interpolation between specified (time, value) points.
    Pwl {
        /// Time-value pairs, sorted by time.
        points: Vec<(f64, f64)>,
    },

    /// Single-frequency FM: SFFM(VO VA FC MDI FS)
    Sffm {
        vo: f64,
        va: f64,
        fc: f64,
        mdi: f64,
        fs: f64,
    },
}

impl Waveform {
    /// Create a DC waveform.
    pub fn dc(value: f64) -> Self {
        Waveform::Dc(value)
    }

    /// Create a pulse waveform.
    pub fn pulse(v1: f64, v2: f64, td: f64, tr: f64, tf: f64, pw: f64, per: f64) -> Self {
        Waveform::Pulse {
            v1,
            v2,
            td,
            tr,
            tf,
            pw,
            per,
        }
    }

    /// Create an undamped sinusoidal waveform.
    pub fn sin(vo: f64, va: f64, freq: f64) -> Self {
        Waveform::Sin {
            vo,
            va,
            freq,
            td: 0.0,
            theta: 0.0,
            phase: 0.0,
        }
    }

    /// Create a sinusoidal waveform with full parameters.
    pub fn sin_full(vo: f64, va: f64, freq: f64, td: f64, theta: f64, phase: f64) -> Self {
        Waveform::Sin {
            vo,
            va,
            freq,
            td,
            theta,
            phase,
        }
    }

    /// Create an exponential waveform.
    pub fn exp(v1: f64, v2: f64, td1: f64, tau1: f64, td2: f64, tau2: f64) -> Self {
        Waveform::Exp {
            v1,
            v2,
            td1,
            tau1,
            td2,
            tau2,
        }
    }

    /// Create a piecewise linear waveform.
    pub fn pwl(points: Vec<(f64, f64)>) -> Self {
        Waveform::Pwl { points }
    }

    /// Create a single-frequency FM waveform.
    pub fn sffm(vo: f64, va: f64, fc: f64, mdi: f64, fs: f64) -> Self {
        Waveform::Sffm {
            vo,
            va,
            fc,
            mdi,
            fs,
        }
    }

    /// Evaluate the waveform at a given time.
    pub fn value_at(&self, time: f64) -> f64 {
        match self {
            Waveform::Dc(v) => *v,
            Waveform::Pulse {
                v1,
                v2,
                td,
                tr,
                tf,
                pw,
                per,
            } => eval_pulse(*v1, *v2, *td, *tr, *tf, *pw, *per, time),
            Waveform::Sin {
                vo,
                va,
                freq,
                td,
                theta,
                phase,
            } => eval_sin(*vo, *va, *freq, *td, *theta, *phase, time),
            Waveform::Exp {
                v1,
                v2,
                td1,
                tau1,
                td2,
                tau2,
            } => eval_exp(*v1, *v2, *td1, *tau1, *td2, *tau2, time),
            Waveform::Pwl { points } => eval_pwl(points, time),
            Waveform::Sffm {
                vo,
                va,
                fc,
                mdi,
                fs,
            } => {
                let wc = 2.0 * PI * fc;
                let ws = 2.0 * PI * fs;
                vo + va * (wc * time + mdi * (ws * time).sin()).sin()
            }
        }
    }

    /// The value used for DC and operating-point analysis.
    ///
    /// For PULSE and EXP this is V1, for SIN and SFFM the offset VO, for PWL
    /// the first value.
    pub fn dc_value(&self) -> f64 {
        match self {
            Waveform::Dc(v) => *v,
            Waveform::Pulse { v1, .. } => *v1,
            Waveform::Sin { vo, .. } => *vo,
            Waveform::Exp { v1, .. } => *v1,
            Waveform::Pwl { points } => points.first().map(|&(_, v)| v).unwrap_or(0.0),
            Waveform::Sffm { vo, .. } => *vo,
        }
    }

    /// Time points the transient driver must land on exactly.
    ///
    /// Pulse edges repeat once per period up to `stop`; PWL publishes its
    /// segment boundaries; the delayed waveforms publish their start time.
    pub fn breakpoints(&self, stop: f64) -> Vec<f64> {
        let mut bps = Vec::new();
        match self {
            Waveform::Dc(_) => {}
            Waveform::Pulse {
                td,
                tr,
                tf,
                pw,
                per,
                ..
            } => {
                let edges = [*td, td + tr, td + tr + pw, td + tr + pw + tf];
                if *per > 0.0 {
                    let mut base = 0.0;
                    while base <= stop {
                        for e in edges {
                            bps.push(base + e);
                        }
                        base += per;
                    }
                } else {
                    bps.extend(edges);
                }
            }
            Waveform::Sin { td, .. } => bps.push(*td),
            Waveform::Exp { td1, td2, .. } => {
                bps.push(*td1);
                bps.push(*td2);
            }
            Waveform::Pwl { points } => bps.extend(points.iter().map(|&(t, _)| t)),
            Waveform::Sffm { .. } => {}
        }
        bps.retain(|&t| t > 0.0 && t <= stop);
        bps
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_pulse(v1: f64, v2: f64, td: f64, tr: f64, tf: f64, pw: f64, per: f64, time: f64) -> f64 {
    if time < td {
        return v1;
    }
    // Fold periodic pulses into the first period.
    let mut t = time - td;
    if per > 0.0 {
        t %= per;
    }

    if t < tr {
        if tr <= 0.0 {
            v2
        } else {
            v1 + (v2 - v1) * t / tr
        }
    } else if t < tr + pw {
        v2
    } else if t < tr + pw + tf {
        if tf <= 0.0 {
            v1
        } else {
            v2 + (v1 - v2) * (t - tr - pw) / tf
        }
    } else {
        v1
    }
}

fn eval_sin(vo: f64, va: f64, freq: f64, td: f64, theta: f64, phase: f64, time: f64) -> f64 {
    let phase_rad = phase * PI / 180.0;
    if time < td {
        return vo + va * phase_rad.sin();
    }
    let t = time - td;
    let damping = if theta != 0.0 { (-t * theta).exp() } else { 1.0 };
    vo + va * damping * (2.0 * PI * freq * t + phase_rad).sin()
}

fn eval_exp(v1: f64, v2: f64, td1: f64, tau1: f64, td2: f64, tau2: f64, time: f64) -> f64 {
    let mut v = v1;
    if time > td1 && tau1 > 0.0 {
        v += (v2 - v1) * (1.0 - (-(time - td1) / tau1).exp());
    }
    if time > td2 && tau2 > 0.0 {
        v += (v1 - v2) * (1.0 - (-(time - td2) / tau2).exp());
    }
    v
}

fn eval_pwl(points: &[(f64, f64)], time: f64) -> f64 {
    match points {
        [] => 0.0,
        [(t0, v0), ..] if time <= *t0 => *v0,
        _ => {
            for pair in points.windows(2) {
                let (t0, v0) = pair[0];
                let (t1, v1) = pair[1];
                if time <= t1 {
                    if t1 <= t0 {
                        return v1;
                    }
                    return v0 + (v1 - v0) * (time - t0) / (t1 - t0);
                }
            }
            points.last().map(|&(_, v)| v).unwrap_or(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_is_flat() {
        let w = Waveform::dc(5.0);
        assert_eq!(w.value_at(0.0), 5.0);
        assert_eq!(w.value_at(1.0), 5.0);
        assert_eq!(w.dc_value(), 5.0);
    }

    #[test]
    fn test_pulse_edges() {
        // 0->1V pulse, 1us delay, 1us rise/fall, 5us width, no repeat
        let w = Waveform::pulse(0.0, 1.0, 1e-6, 1e-6, 1e-6, 5e-6, 0.0);
        assert_eq!(w.value_at(0.0), 0.0);
        assert!((w.value_at(1.5e-6) - 0.5).abs() < 1e-12, "mid-rise");
        assert_eq!(w.value_at(3e-6), 1.0);
        assert!((w.value_at(7.5e-6) - 0.5).abs() < 1e-12, "mid-fall");
        assert_eq!(w.value_at(10e-6), 0.0);
    }

    #[test]
    fn test_pulse_periodic() {
        let w = Waveform::pulse(0.0, 1.0, 0.0, 1e-6, 1e-6, 3e-6, 10e-6);
        // Second period looks like the first.
        assert!((w.value_at(2e-6) - w.value_at(12e-6)).abs() < 1e-12);
    }

    #[test]
    fn test_sin_starts_after_delay() {
        let w = Waveform::sin_full(1.0, 2.0, 1e3, 1e-3, 0.0, 0.0);
        assert_eq!(w.value_at(0.5e-3), 1.0);
        // Quarter period after the delay: peak.
        assert!((w.value_at(1e-3 + 0.25e-3) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_exp_approaches_v2() {
        let w = Waveform::exp(0.0, 1.0, 0.0, 1e-6, 1.0, 1e-6);
        assert!((w.value_at(10e-6) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_pwl_interpolates() {
        let w = Waveform::pwl(vec![(0.0, 0.0), (1e-3, 2.0), (2e-3, 0.0)]);
        assert!((w.value_at(0.5e-3) - 1.0).abs() < 1e-12);
        assert!((w.value_at(1.5e-3) - 1.0).abs() < 1e-12);
        assert_eq!(w.value_at(5e-3), 0.0);
    }

    #[test]
    fn test_pulse_breakpoints_in_range() {
        let w = Waveform::pulse(0.0, 1.0, 1e-6, 1e-6, 1e-6, 5e-6, 0.0);
        let bps = w.breakpoints(10e-6);
        assert_eq!(bps, vec![1e-6, 2e-6, 7e-6, 8e-6]);
    }

    #[test]
    fn test_sffm_offset() {
        let w = Waveform::sffm(1.0, 0.5, 1e3, 2.0, 100.0);
        assert_eq!(w.value_at(0.0), 1.0);
        assert_eq!(w.dc_value(), 1.0);
    }
}
