// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Limits of the instrument a signal is rendered for.
//!
//! Profiles are plain data so that a new instrument can be described in a
//! JSON file instead of code:
//!
//! ```
//! use waveform::device::{DeviceProfile, SamplingMode};
//!
//! let profile = DeviceProfile::from_json(
//!     r#"{
//!         "name": "bench-awg",
//!         "channels": 1,
//!         "resolution_bits": 14,
//!         "reference_amplitude": 5.0,
//!         "max_amplitude": 5.0,
//!         "mode": "true_arb",
//!         "default_depth": 4096,
//!         "max_depth": 1000000,
//!         "max_sample_rate": 100000000.0
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(profile.mode, SamplingMode::TrueArb);
//! assert_eq!(profile.code_range().unwrap().max(), 8191);
//! ```

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use siggen_units::{Duration, Frequency, Hertz, Second, hertz};

use crate::quantizer::CodeRange;
use crate::{Error, Result};

/// One-based output channel of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn new(number: u8) -> Result<Self> {
        if number == 0 {
            return Err(Error::Configuration(
                "channels are numbered from 1".to_string(),
            ));
        }
        Ok(ChannelId(number))
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = Error;

    fn try_from(number: u8) -> Result<Self> {
        Self::new(number)
    }
}

impl From<ChannelId> for u8 {
    fn from(channel: ChannelId) -> Self {
        channel.0
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// How the instrument plays back waveform memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Direct digital synthesis: a fixed-size table stepped through at the
    /// configured frequency.
    Dds,
    /// Point-by-point playback at an explicit sample rate.
    TrueArb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: Cow<'static, str>,
    pub channels: u8,
    /// Width of the signed two's complement DAC code.
    pub resolution_bits: u32,
    /// Peak output, in volts, that maps to full scale.
    pub reference_amplitude: f64,
    /// Largest peak amplitude the analog front end accepts, in volts.
    pub max_amplitude: f64,
    pub mode: SamplingMode,
    /// Depth used in DDS mode and when no better depth can be derived.
    pub default_depth: usize,
    pub max_depth: usize,
    pub max_sample_rate: Frequency<Hertz>,
}

pub const SDG2000X_DDS: DeviceProfile = DeviceProfile {
    name: Cow::Borrowed("SDG2000X"),
    channels: 2,
    resolution_bits: 16,
    reference_amplitude: 10.0,
    max_amplitude: 10.0,
    mode: SamplingMode::Dds,
    default_depth: 16384,
    max_depth: 8_000_000,
    max_sample_rate: hertz(75e6),
};

pub const SDG2000X_TARB: DeviceProfile = DeviceProfile {
    mode: SamplingMode::TrueArb,
    ..SDG2000X_DDS
};

impl DeviceProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: DeviceProfile = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid device profile: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |what: String| {
            Err(Error::Configuration(format!(
                "device profile '{}': {what}",
                self.name
            )))
        };
        if self.channels == 0 {
            return invalid("at least one channel is required".to_string());
        }
        self.code_range()?;
        for (field, value) in [
            ("reference_amplitude", self.reference_amplitude),
            ("max_amplitude", self.max_amplitude),
            ("max_sample_rate", self.max_sample_rate.value()),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{field} must be positive and finite, got {value}"));
            }
        }
        if self.default_depth == 0 || self.default_depth > self.max_depth {
            return invalid(format!(
                "default depth {} must be within 1..={}",
                self.default_depth, self.max_depth
            ));
        }
        Ok(())
    }

    pub fn code_range(&self) -> Result<CodeRange> {
        CodeRange::signed(self.resolution_bits)
    }

    pub fn check_channel(&self, channel: ChannelId) -> Result<()> {
        if channel.number() > self.channels {
            return Err(Error::Configuration(format!(
                "{} has no channel {channel}, it has {} channels",
                self.name, self.channels
            )));
        }
        Ok(())
    }

    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth == 0 || depth > self.max_depth {
            return Err(Error::Configuration(format!(
                "sample depth {depth} must be within 1..={} on {}",
                self.max_depth, self.name
            )));
        }
        Ok(())
    }

    /// Number of points used to render one `period` when none is requested.
    ///
    /// In DDS mode the table always has the default depth. In true arbitrary
    /// mode the period is sampled at the maximum rate, which fails if the
    /// result does not fit the waveform memory.
    pub fn derive_depth(&self, period: Duration<Second>) -> Result<usize> {
        let depth = match self.mode {
            SamplingMode::Dds => self.default_depth,
            SamplingMode::TrueArb => {
                let points = (period.value() * self.max_sample_rate.value()).round();
                if !(1.0..=self.max_depth as f64).contains(&points) {
                    return Err(Error::Configuration(format!(
                        "a period of {period} needs {points} points at {}, {} holds 1..={}",
                        self.max_sample_rate, self.name, self.max_depth
                    )));
                }
                points as usize
            }
        };
        self.check_depth(depth)?;
        Ok(depth)
    }
}
