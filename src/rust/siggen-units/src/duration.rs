// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};

use num_traits::Float;

crate::quantity!(Duration);
crate::quantity!(Frequency);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Second;

impl Display for Second {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hertz;

impl Display for Hertz {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Hz")
    }
}

pub const fn seconds<T>(value: T) -> Duration<Second, T> {
    Duration {
        value,
        unit: Second,
    }
}

pub const fn hertz<T>(value: T) -> Frequency<Hertz, T> {
    Frequency { value, unit: Hertz }
}

impl<T: Float> Duration<Second, T> {
    /// The frequency whose period is this duration.
    pub fn to_frequency(self) -> Frequency<Hertz, T> {
        hertz(self.value.recip())
    }

    /// Ratio of two durations, e.g. how many times `other` fits into `self`.
    pub fn ratio(self, other: Self) -> T {
        self.value / other.value
    }

    /// Whether the duration is a strictly positive, finite value.
    pub fn is_positive(self) -> bool {
        self.value.is_finite() && self.value > T::zero()
    }
}

impl<T: Float> Frequency<Hertz, T> {
    /// The period of one cycle at this frequency.
    pub fn to_period(self) -> Duration<Second, T> {
        seconds(self.value.recip())
    }
}
