// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Immutable, composable waveform expressions.
//!
//! A [`Waveform`] is a cheaply clonable handle to a node of an expression
//! tree. Leaves are [`Primitive`] generators, inner nodes combine their
//! children pointwise ([`add`], [`multiply`], [`scale`]) or in time
//! ([`concat`]). No node is ever mutated: every combinator returns a new
//! node that shares its children with the inputs.
//!
//! ```rust
//! use siggen_units::seconds;
//! use waveform::expression::{add, scale, sine};
//!
//! let fundamental = sine(seconds(1e-3));
//! let third = scale(sine(seconds(1e-3 / 3.0)), 1.0 / 3.0).named("third");
//! let approx_square = add([fundamental.into(), third]).unwrap();
//! assert_eq!(approx_square.label(), "(sine(0.001)+third)");
//! ```

use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use siggen_units::{Duration, Second, seconds};

use crate::{Error, Result};

/// Relative tolerance used when checking that one duration is an integer
/// multiple of another.
pub(crate) const RATIO_TOLERANCE: f64 = 1e-9;

/// How many times a primitive plays its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Play the cycle the given number of times, then hold zero.
    Count(u32),
    /// Repeat until the requested duration truncates it.
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimitiveKind {
    Sine,
    /// High (`+1`) for the first `duty` fraction of the cycle, low (`-1`) after.
    Square {
        duty: f64,
    },
    Triangle,
    /// Rises linearly from 0 to `+1`, jumps to `-1`, rises back to 0.
    Sawtooth,
    /// Linear 0 to 1 (or 1 to 0) across one cycle.
    Ramp {
        rising: bool,
    },
    Constant {
        value: f64,
    },
    /// Points spanning one cycle end to end, the first at the start and the
    /// last at the end, linearly interpolated in between.
    Arbitrary {
        points: Arc<[f64]>,
    },
}

/// A closed-form generator of one cycle of a normalized signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    kind: PrimitiveKind,
    period: Duration<Second>,
    /// Phase offset in radians.
    phase: f64,
    repeat: Repeat,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind, period: Duration<Second>) -> Self {
        Primitive {
            kind,
            period,
            phase: 0.0,
            repeat: Repeat::Unbounded,
        }
    }

    pub fn kind(&self) -> &PrimitiveKind {
        &self.kind
    }

    pub fn period(&self) -> Duration<Second> {
        self.period
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Play the cycle `count` times.
    pub fn times(self, count: u32) -> Self {
        self.with_repeat(Repeat::Count(count))
    }

    /// Wrap the primitive into a named expression node.
    pub fn named<S: Into<String>>(self, name: S) -> Waveform {
        Waveform::from(self).named(name)
    }

    fn validate(&self) -> Result<()> {
        if !self.period.is_positive() {
            return Err(Error::Configuration(format!(
                "period of {} must be positive and finite, got {}",
                self.label(),
                self.period
            )));
        }
        if !self.phase.is_finite() {
            return Err(Error::Configuration(format!(
                "phase of {} must be finite",
                self.label()
            )));
        }
        if self.repeat == Repeat::Count(0) {
            return Err(Error::Configuration(format!(
                "repeat count of {} must be at least 1",
                self.label()
            )));
        }
        match &self.kind {
            PrimitiveKind::Square { duty } if !(*duty > 0.0 && *duty < 1.0) => {
                Err(Error::Configuration(format!(
                    "duty cycle must be within (0.0, 1.0), got {duty}"
                )))
            }
            PrimitiveKind::Constant { value } if !value.is_finite() => Err(Error::Configuration(
                format!("constant value must be finite, got {value}"),
            )),
            PrimitiveKind::Arbitrary { points } if points.len() < 2 => {
                Err(Error::Configuration(format!(
                    "arbitrary waveform needs at least 2 points, got {}",
                    points.len()
                )))
            }
            _ => Ok(()),
        }
    }

    fn extent(&self) -> Result<Extent> {
        self.validate()?;
        let extent = match (&self.kind, self.repeat) {
            (_, Repeat::Count(count)) => Extent::Finite(self.period * f64::from(count)),
            (PrimitiveKind::Constant { .. }, Repeat::Unbounded) => Extent::Timeless,
            (_, Repeat::Unbounded) => Extent::Periodic(self.period),
        };
        Ok(extent)
    }

    /// Value at time `t` (seconds), evaluated directly from the closed form.
    pub(crate) fn value_at(&self, t: f64) -> f64 {
        let period = self.period.value();
        let end = match self.repeat {
            Repeat::Count(count) => period * f64::from(count),
            Repeat::Unbounded => f64::INFINITY,
        };
        if t < 0.0 || t >= end {
            return 0.0;
        }
        if matches!(self.kind, PrimitiveKind::Sine) {
            return (2.0 * PI * t / period + self.phase).sin();
        }
        let position = (t / period + self.phase / (2.0 * PI)).rem_euclid(1.0);
        self.cycle_value(position)
    }

    /// Value at `position` within one cycle, `0.0 <= position < 1.0`.
    fn cycle_value(&self, position: f64) -> f64 {
        match &self.kind {
            PrimitiveKind::Sine => (2.0 * PI * position).sin(),
            PrimitiveKind::Square { duty } => {
                if position < *duty {
                    1.0
                } else {
                    -1.0
                }
            }
            PrimitiveKind::Triangle => {
                if position < 0.25 {
                    4.0 * position
                } else if position < 0.75 {
                    2.0 - 4.0 * position
                } else {
                    4.0 * position - 4.0
                }
            }
            PrimitiveKind::Sawtooth => {
                if position < 0.5 {
                    2.0 * position
                } else {
                    2.0 * position - 2.0
                }
            }
            PrimitiveKind::Ramp { rising: true } => position,
            PrimitiveKind::Ramp { rising: false } => 1.0 - position,
            PrimitiveKind::Constant { value } => *value,
            PrimitiveKind::Arbitrary { points } => {
                let last = points.len() - 1;
                let scaled = position * last as f64;
                let index = (scaled.floor() as usize).min(last - 1);
                let fraction = scaled - index as f64;
                let start = points[index];
                start + (points[index + 1] - start) * fraction
            }
        }
    }

    fn label(&self) -> String {
        let kind = match &self.kind {
            PrimitiveKind::Sine => "sine",
            PrimitiveKind::Square { .. } => "square",
            PrimitiveKind::Triangle => "triangle",
            PrimitiveKind::Sawtooth => "sawtooth",
            PrimitiveKind::Ramp { .. } => "ramp",
            PrimitiveKind::Constant { value } => return format!("{value}"),
            PrimitiveKind::Arbitrary { .. } => "arb",
        };
        format!("{kind}({})", self.period.value())
    }
}

/// The time span an expression naturally covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    /// Plays once over the given duration.
    Finite(Duration<Second>),
    /// Repeats forever with the given period.
    Periodic(Duration<Second>),
    /// Unbounded and identical at every instant, e.g. a constant.
    Timeless,
    /// Unbounded without a common period; needs an explicit duration.
    Aperiodic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Primitive(Primitive),
    Scaled { child: Waveform, factor: f64 },
    Sum { children: Vec<Waveform> },
    Product { children: Vec<Waveform> },
    Sequence { children: Vec<Waveform> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WaveformNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(flatten)]
    node: Node,
    /// Resolved once; children are immutable so it never goes stale.
    #[serde(skip)]
    extent: OnceLock<Extent>,
}

impl PartialEq for WaveformNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.node == other.node
    }
}

/// Handle to an immutable node of a waveform expression tree.
///
/// Equality is structural; display names take part in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Waveform(Arc<WaveformNode>);

impl PartialEq for Waveform {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl From<Primitive> for Waveform {
    fn from(primitive: Primitive) -> Self {
        Waveform::new(Node::Primitive(primitive))
    }
}

impl From<&Waveform> for Waveform {
    fn from(waveform: &Waveform) -> Self {
        waveform.clone()
    }
}

impl Waveform {
    fn new(node: Node) -> Self {
        Waveform(Arc::new(WaveformNode {
            name: None,
            node,
            extent: OnceLock::new(),
        }))
    }

    pub fn node(&self) -> &Node {
        &self.0.node
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// A copy of this node carrying a display name. Children stay shared.
    pub fn named<S: Into<String>>(&self, name: S) -> Waveform {
        Waveform(Arc::new(WaveformNode {
            name: Some(name.into()),
            node: self.0.node.clone(),
            extent: self.0.extent.clone(),
        }))
    }

    /// The display name, or one derived from the tree shape.
    pub fn label(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }
        match self.node() {
            Node::Primitive(primitive) => primitive.label(),
            Node::Scaled { child, factor } => format!("({}*{factor})", child.label()),
            Node::Sum { children } => join_labels('(', children, '+', ')'),
            Node::Product { children } => join_labels('(', children, '*', ')'),
            Node::Sequence { children } => join_labels('[', children, ',', ']'),
        }
    }

    /// Resolve the natural extent of the expression.
    ///
    /// Fails with [`Error::ShapeMismatch`] if the children of a node cannot
    /// share a time base, and with [`Error::Configuration`] if a primitive
    /// carries invalid parameters. The result is kept with the node, so
    /// every subtree is resolved at most once.
    pub fn extent(&self) -> Result<Extent> {
        if let Some(extent) = self.0.extent.get() {
            return Ok(*extent);
        }
        let extent = match self.node() {
            Node::Primitive(primitive) => primitive.extent(),
            Node::Scaled { child, .. } => child.extent(),
            Node::Sum { children } | Node::Product { children } => {
                parallel_extent(self, children)
            }
            Node::Sequence { children } => sequence_extent(self, children),
        }?;
        Ok(*self.0.extent.get_or_init(|| extent))
    }
}

fn join_labels(open: char, children: &[Waveform], separator: char, close: char) -> String {
    let mut out = String::new();
    out.push(open);
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            out.push(separator);
        }
        out.push_str(&child.label());
    }
    out.push(close);
    out
}

/// Whether `whole` is an integer multiple (at least 1) of `part`.
pub(crate) fn divides(whole: Duration<Second>, part: Duration<Second>) -> bool {
    let ratio = whole.ratio(part);
    let rounded = ratio.round();
    rounded >= 1.0 && (ratio - rounded).abs() <= RATIO_TOLERANCE * rounded
}

fn parallel_extent(parent: &Waveform, children: &[Waveform]) -> Result<Extent> {
    let extents = children
        .iter()
        .map(Waveform::extent)
        .collect::<Result<Vec<_>>>()?;

    let finite: Vec<_> = extents
        .iter()
        .filter_map(|extent| match extent {
            Extent::Finite(duration) => Some(*duration),
            _ => None,
        })
        .collect();
    if let Some(longest) = longest(&finite) {
        // Unbounded children defer to the finite ones; finite ones must tile
        // the longest duration exactly.
        if let Some(misfit) = finite.iter().find(|d| !divides(longest, **d)) {
            return Err(Error::ShapeMismatch(format!(
                "'{}': finite duration {misfit} does not divide {longest}",
                parent.label()
            )));
        }
        return Ok(Extent::Finite(longest));
    }

    if extents.contains(&Extent::Aperiodic) {
        return Ok(Extent::Aperiodic);
    }
    let periods: Vec<_> = extents
        .iter()
        .filter_map(|extent| match extent {
            Extent::Periodic(period) => Some(*period),
            _ => None,
        })
        .collect();
    match longest(&periods) {
        None => Ok(Extent::Timeless),
        Some(period) if periods.iter().all(|p| divides(period, *p)) => {
            Ok(Extent::Periodic(period))
        }
        Some(_) => Ok(Extent::Aperiodic),
    }
}

fn sequence_extent(parent: &Waveform, children: &[Waveform]) -> Result<Extent> {
    let mut total = seconds(0.0);
    for child in children {
        match child.extent()? {
            Extent::Finite(duration) => total = total + duration,
            _ => {
                return Err(Error::ShapeMismatch(format!(
                    "'{}': sequence element '{}' has no finite duration",
                    parent.label(),
                    child.label()
                )));
            }
        }
    }
    Ok(Extent::Finite(total))
}

fn longest(durations: &[Duration<Second>]) -> Option<Duration<Second>> {
    durations
        .iter()
        .copied()
        .reduce(|a, b| if b > a { b } else { a })
}

pub fn sine(period: Duration<Second>) -> Primitive {
    Primitive::new(PrimitiveKind::Sine, period)
}

pub fn square(period: Duration<Second>, duty: f64) -> Primitive {
    Primitive::new(PrimitiveKind::Square { duty }, period)
}

pub fn triangle(period: Duration<Second>) -> Primitive {
    Primitive::new(PrimitiveKind::Triangle, period)
}

pub fn sawtooth(period: Duration<Second>) -> Primitive {
    Primitive::new(PrimitiveKind::Sawtooth, period)
}

/// A single linear ramp over `period`.
pub fn ramp(period: Duration<Second>, rising: bool) -> Primitive {
    Primitive::new(PrimitiveKind::Ramp { rising }, period).times(1)
}

/// A value that holds forever.
///
/// The period of an unbounded constant never influences duration
/// resolution, so a nominal one second is used.
pub fn constant(value: f64) -> Primitive {
    Primitive::new(PrimitiveKind::Constant { value }, seconds(1.0))
}

/// A constant segment of the given length, used to pad sequences.
pub fn delay(duration: Duration<Second>, value: f64) -> Primitive {
    Primitive::new(PrimitiveKind::Constant { value }, duration).times(1)
}

/// One cycle of arbitrary data points, played once.
pub fn arbitrary<P: Into<Arc<[f64]>>>(period: Duration<Second>, points: P) -> Primitive {
    Primitive::new(
        PrimitiveKind::Arbitrary {
            points: points.into(),
        },
        period,
    )
    .times(1)
}

/// Pointwise multiply an expression by `factor`.
///
/// Negative factors invert the phase, zero silences the branch while
/// keeping it in the tree.
pub fn scale<W: Into<Waveform>>(waveform: W, factor: f64) -> Waveform {
    Waveform::new(Node::Scaled {
        child: waveform.into(),
        factor,
    })
}

fn combine<I, W>(waveforms: I, make: fn(Vec<Waveform>) -> Node, what: &str) -> Result<Waveform>
where
    I: IntoIterator<Item = W>,
    W: Into<Waveform>,
{
    let children: Vec<Waveform> = waveforms.into_iter().map(Into::into).collect();
    if children.is_empty() {
        return Err(Error::Configuration(format!(
            "{what} needs at least one waveform"
        )));
    }
    let waveform = Waveform::new(make(children));
    waveform.extent()?;
    Ok(waveform)
}

/// Pointwise sum of all waveforms over a shared time base.
pub fn add<I, W>(waveforms: I) -> Result<Waveform>
where
    I: IntoIterator<Item = W>,
    W: Into<Waveform>,
{
    combine(waveforms, |children| Node::Sum { children }, "add")
}

/// Pointwise product of all waveforms, e.g. an envelope applied to a carrier.
pub fn multiply<I, W>(waveforms: I) -> Result<Waveform>
where
    I: IntoIterator<Item = W>,
    W: Into<Waveform>,
{
    combine(waveforms, |children| Node::Product { children }, "multiply")
}

/// Play the waveforms one after another. Every element must be finite.
pub fn concat<I, W>(waveforms: I) -> Result<Waveform>
where
    I: IntoIterator<Item = W>,
    W: Into<Waveform>,
{
    combine(waveforms, |children| Node::Sequence { children }, "concat")
}

/// Shift a waveform by a constant value.
pub fn offset<W: Into<Waveform>>(waveform: W, value: f64) -> Result<Waveform> {
    add([waveform.into(), constant(value).into()])
}

/// Sum of sines `a_k * sin(2π k t / period)` for each `(k, a_k)` term.
pub fn harmonics(period: Duration<Second>, terms: &[(u32, f64)]) -> Result<Waveform> {
    if let Some((index, _)) = terms.iter().find(|(index, _)| *index == 0) {
        return Err(Error::Configuration(format!(
            "harmonic index must be at least 1, got {index}"
        )));
    }
    add(terms
        .iter()
        .map(|(index, amplitude)| scale(sine(period / f64::from(*index)), *amplitude)))
}
