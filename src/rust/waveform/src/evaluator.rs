// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Sampling of waveform expressions onto a shared time base.
//!
//! Every node of the tree is sampled at the same instants
//! `t_i = i * duration / N`, each computed directly from its index so that
//! no error accumulates along the buffer and re-renders are bit-identical.

use siggen_units::{Duration, Frequency, Hertz, Second, hertz};

use crate::expression::{Extent, Node, Waveform};
use crate::{Error, Result};

/// `N` evenly spaced instants over `[0, duration)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    duration: Duration<Second>,
    samples: usize,
}

impl TimeBase {
    pub fn new(duration: Duration<Second>, samples: usize) -> Result<Self> {
        if !duration.is_positive() {
            return Err(Error::Configuration(format!(
                "duration must be positive and finite, got {duration}"
            )));
        }
        if samples == 0 {
            return Err(Error::Configuration(
                "sample count must be at least 1".to_string(),
            ));
        }
        Ok(TimeBase { duration, samples })
    }

    /// Time base of `samples` points taken at `sample_rate`.
    pub fn from_sample_rate(sample_rate: Frequency<Hertz>, samples: usize) -> Result<Self> {
        Self::new(sample_rate.to_period() * samples as f64, samples)
    }

    pub fn duration(&self) -> Duration<Second> {
        self.duration
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn sample_rate(&self) -> Frequency<Hertz> {
        hertz(self.samples as f64 / self.duration.value())
    }

    /// The instant of sample `index`, in seconds.
    pub fn instant(&self, index: usize) -> f64 {
        index as f64 * self.duration.value() / self.samples as f64
    }

    pub fn instants(&self) -> Vec<f64> {
        (0..self.samples).map(|index| self.instant(index)).collect()
    }
}

/// The duration an expression covers when no explicit one is given.
///
/// Finite expressions use their natural duration and periodic ones a single
/// period. Timeless and aperiodic expressions have none and fail with
/// [`Error::ShapeMismatch`].
pub fn natural_duration(waveform: &Waveform) -> Result<Duration<Second>> {
    match waveform.extent()? {
        Extent::Finite(duration) | Extent::Periodic(duration) => Ok(duration),
        Extent::Timeless | Extent::Aperiodic => Err(Error::ShapeMismatch(format!(
            "'{}' has no natural period, an explicit duration is required",
            waveform.label()
        ))),
    }
}

/// Sample `waveform` at every instant of `time_base`.
///
/// The tree is validated before sampling, and the output is checked for
/// non-finite values so that nothing downstream quantizes garbage.
pub fn evaluate(waveform: &Waveform, time_base: &TimeBase) -> Result<Vec<f64>> {
    waveform.extent()?;
    let samples = render(waveform, &time_base.instants())?;
    if let Some((index, value)) = samples
        .iter()
        .enumerate()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(Error::NonFiniteSample {
            index,
            value: *value,
        });
    }
    Ok(samples)
}

fn render(waveform: &Waveform, times: &[f64]) -> Result<Vec<f64>> {
    match waveform.node() {
        Node::Primitive(primitive) => Ok(times.iter().map(|t| primitive.value_at(*t)).collect()),
        Node::Scaled { child, factor } => {
            let mut samples = render(child, times)?;
            samples.iter_mut().for_each(|sample| *sample *= factor);
            Ok(samples)
        }
        Node::Sum { children } => render_parallel(waveform, children, times, 0.0, |a, b| a + b),
        Node::Product { children } => {
            render_parallel(waveform, children, times, 1.0, |a, b| a * b)
        }
        Node::Sequence { children } => render_sequence(children, times),
    }
}

fn render_parallel(
    parent: &Waveform,
    children: &[Waveform],
    times: &[f64],
    identity: f64,
    fold: fn(f64, f64) -> f64,
) -> Result<Vec<f64>> {
    let span = match parent.extent()? {
        Extent::Finite(duration) => Some(duration.value()),
        _ => None,
    };
    let mut out = vec![identity; times.len()];
    for child in children {
        let child_samples = match (span, child.extent()?) {
            // Shorter finite children repeat to fill the parent span.
            (Some(span), Extent::Finite(duration)) if duration.value() < span => {
                let local = duration.value();
                let mapped: Vec<f64> = times
                    .iter()
                    .map(|t| {
                        if *t >= 0.0 && *t < span {
                            t.rem_euclid(local)
                        } else {
                            *t
                        }
                    })
                    .collect();
                render(child, &mapped)?
            }
            _ => render(child, times)?,
        };
        for (acc, sample) in out.iter_mut().zip(child_samples) {
            *acc = fold(*acc, sample);
        }
    }
    Ok(out)
}

fn render_sequence(children: &[Waveform], times: &[f64]) -> Result<Vec<f64>> {
    let mut out = vec![0.0; times.len()];
    let mut start = 0.0;
    for child in children {
        let Extent::Finite(duration) = child.extent()? else {
            return Err(Error::ShapeMismatch(format!(
                "sequence element '{}' has no finite duration",
                child.label()
            )));
        };
        let end = start + duration.value();
        let (indices, local): (Vec<usize>, Vec<f64>) = times
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= start && **t < end)
            .map(|(index, t)| (index, t - start))
            .unzip();
        if !indices.is_empty() {
            for (index, sample) in indices.into_iter().zip(render(child, &local)?) {
                out[index] = sample;
            }
        }
        start = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{
        add, arbitrary, concat, constant, delay, harmonics, multiply, ramp, scale, sine, square,
    };
    use siggen_units::seconds;

    macro_rules! assert_approx_eq {
        ($left:expr, $right:expr, $tolerance:expr) => {
            let (left, right, tolerance) = ($left, $right, $tolerance);
            assert!(
                (left - right).abs() < tolerance,
                "left: {left}, right: {right}, tolerance: {tolerance}"
            );
        };
        ($left:expr, $right:expr) => {
            assert_approx_eq!($left, $right, 1e-12);
        };
    }

    fn time_base(duration: f64, samples: usize) -> TimeBase {
        TimeBase::new(seconds(duration), samples).unwrap()
    }

    #[test]
    fn test_time_base() {
        let tb = time_base(1.0, 4);
        assert_eq!(tb.instants(), vec![0.0, 0.25, 0.5, 0.75]);
        assert_approx_eq!(time_base(1e-3, 4).sample_rate().value(), 4e3, 1e-6);
        assert!(TimeBase::new(seconds(0.0), 4).is_err());
        assert!(TimeBase::new(seconds(1.0), 0).is_err());
        let tb = TimeBase::from_sample_rate(hertz(1e3), 10).unwrap();
        assert_approx_eq!(tb.duration().value(), 1e-2);
    }

    #[test]
    fn test_deterministic() {
        let wave = harmonics(seconds(1e-3), &[(1, 1.0), (3, 1.0 / 3.0), (5, 0.2)]).unwrap();
        let tb = time_base(1e-3, 1000);
        let first = evaluate(&wave, &tb).unwrap();
        let second = evaluate(&wave, &tb).unwrap();
        assert!(first.iter().zip(&second).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_scale_is_linear() {
        let wave: Waveform = add([sine(seconds(1e-3)), square(seconds(0.5e-3), 0.3)])
            .unwrap();
        let tb = time_base(1e-3, 257);
        let base = evaluate(&wave, &tb).unwrap();
        for factor in [-2.5, 0.0, 0.1, 7.0] {
            let scaled = evaluate(&scale(&wave, factor), &tb).unwrap();
            for (s, b) in scaled.iter().zip(&base) {
                assert_approx_eq!(*s, factor * b);
            }
        }
    }

    #[test]
    fn test_sum_is_additive() {
        let w1 = Waveform::from(sine(seconds(1e-3)));
        let w2 = scale(sine(seconds(1e-3 / 3.0)), 1.0 / 3.0);
        let tb = time_base(1e-3, 500);
        let sum = evaluate(&add([w1.clone(), w2.clone()]).unwrap(), &tb).unwrap();
        let a = evaluate(&w1, &tb).unwrap();
        let b = evaluate(&w2, &tb).unwrap();
        for i in 0..sum.len() {
            assert_approx_eq!(sum[i], a[i] + b[i]);
        }
    }

    #[test]
    fn test_gibbs_overshoot_of_odd_harmonics() {
        // Fundamental plus three odd harmonics with a 1/k envelope approximate
        // a square wave of level pi/4; the overshoot is ~9 % of the jump.
        let wave = harmonics(
            seconds(1e-3),
            &[(1, 1.0), (3, 1.0 / 3.0), (5, 1.0 / 5.0), (7, 1.0 / 7.0)],
        )
        .unwrap();
        let samples = evaluate(&wave, &time_base(1e-3, 20_000)).unwrap();
        let level = std::f64::consts::FRAC_PI_4;
        let peak = samples.iter().copied().fold(f64::MIN, f64::max);
        let overshoot = (peak - level) / (2.0 * level);
        assert_approx_eq!(overshoot, 0.092, 0.003);
        // The waveform is odd-symmetric around the half period.
        let trough = samples.iter().copied().fold(f64::MAX, f64::min);
        assert_approx_eq!(peak, -trough, 1e-6);
    }

    #[test]
    fn test_product() {
        let wave = multiply([sine(seconds(1.0)), constant(0.5)]).unwrap();
        let samples = evaluate(&wave, &time_base(1.0, 4)).unwrap();
        assert_approx_eq!(samples[1], 0.5);
        assert_approx_eq!(samples[3], -0.5);
    }

    #[test]
    fn test_shorter_finite_child_repeats() {
        // A single 1 s square cycle next to a 2 s ramp: the ramp spans the
        // whole sum, the square repeats once per second.
        let wave = add([
            Waveform::from(square(seconds(1.0), 0.5).times(1)),
            ramp(seconds(2.0), true).into(),
        ])
        .unwrap();
        let samples = evaluate(&wave, &time_base(2.0, 8)).unwrap();
        let expected = [1.0, 1.125, -0.75, -0.625, 1.5, 1.625, -0.25, -0.125];
        for (sample, expected) in samples.iter().zip(expected) {
            assert_approx_eq!(*sample, expected);
        }
    }

    #[test]
    fn test_sequence() {
        let wave = concat([
            delay(seconds(1.0), 0.5),
            ramp(seconds(2.0), false),
            arbitrary(seconds(1.0), vec![-1.0, -1.0]),
        ])
        .unwrap();
        assert_eq!(natural_duration(&wave).unwrap(), seconds(4.0));
        let samples = evaluate(&wave, &time_base(4.0, 8)).unwrap();
        let expected = [0.5, 0.5, 1.0, 0.75, 0.5, 0.25, -1.0, -1.0];
        for (sample, expected) in samples.iter().zip(expected) {
            assert_approx_eq!(*sample, expected);
        }
    }

    #[test]
    fn test_finite_primitive_past_its_end() {
        let wave = Waveform::from(sine(seconds(1.0)).times(1));
        let samples = evaluate(&wave, &time_base(2.0, 8)).unwrap();
        assert_approx_eq!(samples[1], 1.0);
        assert!(samples[4..].iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_natural_duration() {
        let periodic = Waveform::from(sine(seconds(2e-3)));
        assert_eq!(natural_duration(&periodic).unwrap(), seconds(2e-3));
        let aperiodic = add([sine(seconds(1.0)), sine(seconds(0.7))]).unwrap();
        assert!(matches!(
            natural_duration(&aperiodic),
            Err(Error::ShapeMismatch(_))
        ));
        // An explicit time base still renders it.
        assert_eq!(evaluate(&aperiodic, &time_base(1.0, 16)).unwrap().len(), 16);
    }

    #[test]
    fn test_mismatched_tree_is_rejected_at_evaluation() {
        // Deserialized trees skip the builder checks.
        let two = serde_json::to_value(Waveform::from(sine(seconds(1.0)).times(2))).unwrap();
        let three = serde_json::to_value(Waveform::from(sine(seconds(1.0)).times(3))).unwrap();
        let json = serde_json::json!({ "node": "sum", "children": [two, three] });
        let wave: Waveform = serde_json::from_value(json).unwrap();
        assert!(matches!(
            evaluate(&wave, &time_base(6.0, 12)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_left_folded_sum_chain() {
        let terms = 500;
        let mut wave = Waveform::from(sine(seconds(1e-3)));
        for k in 2..=terms {
            wave = add([wave, scale(sine(seconds(1e-3)), 1.0 / f64::from(k))]).unwrap();
        }
        let samples = evaluate(&wave, &time_base(1e-3, 16)).unwrap();
        let harmonic_number: f64 = (1..=terms).map(|k| 1.0 / f64::from(k)).sum();
        assert_approx_eq!(samples[4], harmonic_number, 1e-9);
        assert_approx_eq!(samples[12], -harmonic_number, 1e-9);
    }

    #[test]
    fn test_non_finite_samples_are_rejected() {
        let wave = scale(sine(seconds(1.0)).with_phase(0.1), f64::INFINITY);
        assert!(matches!(
            evaluate(&wave, &time_base(1.0, 4)),
            Err(Error::NonFiniteSample { index: 0, .. })
        ));
    }
}
