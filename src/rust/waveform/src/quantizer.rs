// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Mapping of real samples onto a device's integer code range.
//!
//! The nominal range `[-1, 1]` maps linearly onto `[min, max]`, codes are
//! rounded half to even so that large buffers carry no systematic DC bias,
//! and anything outside the range is clamped and counted.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Inclusive range of codes accepted by a device's DAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeRange {
    min: i32,
    max: i32,
}

impl CodeRange {
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if max <= min {
            return Err(Error::Configuration(format!(
                "code range maximum {max} must exceed minimum {min}"
            )));
        }
        Ok(CodeRange { min, max })
    }

    /// Two's complement range of a signed `bits`-wide code, e.g.
    /// `-32768..=32767` for 16 bits.
    pub fn signed(bits: u32) -> Result<Self> {
        if !(2..=32).contains(&bits) {
            return Err(Error::Configuration(format!(
                "resolution must be between 2 and 32 bits, got {bits}"
            )));
        }
        let max = ((1_i64 << (bits - 1)) - 1) as i32;
        Self::new(-max - 1, max)
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn contains(&self, code: i32) -> bool {
        (self.min..=self.max).contains(&code)
    }

    /// The normalized sample that quantizes to `code` at unit gain.
    pub fn normalize(&self, code: i32) -> f64 {
        (f64::from(code) - f64::from(self.min)) / self.span() * 2.0 - 1.0
    }

    fn span(&self) -> f64 {
        f64::from(self.max) - f64::from(self.min)
    }

    /// Bytes needed to store one code of this range.
    pub fn code_width(&self) -> usize {
        if i16::try_from(self.min).is_ok() && i16::try_from(self.max).is_ok() {
            2
        } else {
            4
        }
    }
}

/// The integer codes uploaded to a device, plus how many samples clipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedBuffer {
    codes: Vec<i32>,
    range: CodeRange,
    clipped: usize,
}

impl QuantizedBuffer {
    pub fn codes(&self) -> &[i32] {
        &self.codes
    }

    pub fn range(&self) -> CodeRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of samples that fell outside the code range and were clamped.
    pub fn clipped_count(&self) -> usize {
        self.clipped
    }

    pub fn is_clipped(&self) -> bool {
        self.clipped > 0
    }

    /// Codes serialized little-endian at [`CodeRange::code_width`] bytes each.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let width = self.range.code_width();
        let mut bytes = Vec::with_capacity(self.codes.len() * width);
        for code in &self.codes {
            if width == 2 {
                // The range check in `code_width` guarantees the narrowing.
                bytes.extend_from_slice(&(*code as i16).to_le_bytes());
            } else {
                bytes.extend_from_slice(&code.to_le_bytes());
            }
        }
        bytes
    }
}

/// Linear quantizer from normalized samples to device codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    range: CodeRange,
    gain: f64,
}

impl Quantizer {
    /// A quantizer where `reference_amplitude` maps to full scale.
    ///
    /// Samples are scaled by `amplitude / reference_amplitude` before they are
    /// mapped onto the code range.
    pub fn new(range: CodeRange, amplitude: f64, reference_amplitude: f64) -> Result<Self> {
        if !(reference_amplitude.is_finite() && reference_amplitude > 0.0) {
            return Err(Error::Configuration(format!(
                "reference amplitude must be positive and finite, got {reference_amplitude}"
            )));
        }
        if !(amplitude.is_finite() && amplitude >= 0.0) {
            return Err(Error::Configuration(format!(
                "amplitude must be non-negative and finite, got {amplitude}"
            )));
        }
        Ok(Self::with_gain(range, amplitude / reference_amplitude))
    }

    pub fn with_gain(range: CodeRange, gain: f64) -> Self {
        Quantizer { range, gain }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Code for a single sample, and whether it had to be clamped.
    pub fn code(&self, sample: f64) -> (i32, bool) {
        let scaled = sample * self.gain;
        if scaled.is_nan() {
            let midpoint = ((f64::from(self.range.min) + f64::from(self.range.max)) / 2.0)
                .round_ties_even();
            return (midpoint as i32, true);
        }
        let code = ((scaled + 1.0) / 2.0 * self.range.span() + f64::from(self.range.min))
            .round_ties_even();
        if code < f64::from(self.range.min) {
            (self.range.min, true)
        } else if code > f64::from(self.range.max) {
            (self.range.max, true)
        } else {
            (code as i32, false)
        }
    }

    pub fn quantize(&self, samples: &[f64]) -> QuantizedBuffer {
        let mut clipped = 0;
        let codes = samples
            .iter()
            .map(|sample| {
                let (code, clip) = self.code(*sample);
                clipped += usize::from(clip);
                code
            })
            .collect();
        QuantizedBuffer {
            codes,
            range: self.range,
            clipped,
        }
    }
}

/// Gain that brings the largest sample magnitude to full scale.
///
/// A silent buffer keeps unit gain.
pub fn peak_gain(samples: &[f64]) -> f64 {
    let peak = samples.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()));
    if peak > 0.0 { peak.recip() } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdg_range() -> CodeRange {
        CodeRange::signed(16).unwrap()
    }

    #[test]
    fn test_code_range() {
        assert_eq!(sdg_range(), CodeRange::new(-32768, 32767).unwrap());
        assert_eq!(CodeRange::signed(32).unwrap().min(), i32::MIN);
        assert_eq!(CodeRange::signed(32).unwrap().max(), i32::MAX);
        assert!(CodeRange::signed(1).is_err());
        assert!(CodeRange::signed(33).is_err());
        assert!(CodeRange::new(5, 5).is_err());
        assert!(CodeRange::new(5, -5).is_err());
        assert_eq!(sdg_range().code_width(), 2);
        assert_eq!(CodeRange::signed(18).unwrap().code_width(), 4);
    }

    #[test]
    fn test_full_scale_mapping() {
        let quantizer = Quantizer::new(sdg_range(), 1.0, 1.0).unwrap();
        assert_eq!(quantizer.code(1.0), (32767, false));
        assert_eq!(quantizer.code(-1.0), (-32768, false));
        // 0.0 lands on -0.5 and rounds to the even neighbour.
        assert_eq!(quantizer.code(0.0), (0, false));
    }

    #[test]
    fn test_ties_round_to_even() {
        let quantizer = Quantizer::with_gain(CodeRange::new(0, 4).unwrap(), 1.0);
        // (s + 1) / 2 * 4 lands exactly on x.5 for these samples.
        assert_eq!(quantizer.code(-0.75).0, 0);
        assert_eq!(quantizer.code(-0.25).0, 2);
        assert_eq!(quantizer.code(0.25).0, 2);
        assert_eq!(quantizer.code(0.75).0, 4);
    }

    #[test]
    fn test_amplitude_scaling() {
        let quantizer = Quantizer::new(sdg_range(), 5.0, 10.0).unwrap();
        assert_eq!(quantizer.gain(), 0.5);
        assert_eq!(quantizer.code(1.0), (16383, false));
        assert!(Quantizer::new(sdg_range(), 1.0, 0.0).is_err());
        assert!(Quantizer::new(sdg_range(), -1.0, 1.0).is_err());
        assert!(Quantizer::new(sdg_range(), f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_clipping_is_counted() {
        let quantizer = Quantizer::with_gain(sdg_range(), 1.0);
        let buffer = quantizer.quantize(&[0.0, 1.5, -3.0, 0.5, f64::INFINITY, f64::NAN]);
        assert_eq!(
            buffer.codes(),
            &[0, 32767, -32768, 16383, 32767, 0][..]
        );
        assert_eq!(buffer.clipped_count(), 4);
        assert!(buffer.is_clipped());
    }

    #[test]
    fn test_le_bytes() {
        let buffer = Quantizer::with_gain(sdg_range(), 1.0).quantize(&[1.0, -1.0]);
        assert_eq!(buffer.to_le_bytes(), vec![0xff, 0x7f, 0x00, 0x80]);
        let wide = Quantizer::with_gain(CodeRange::signed(24).unwrap(), 1.0).quantize(&[-1.0]);
        assert_eq!(wide.to_le_bytes(), (-8388608_i32).to_le_bytes().to_vec());
    }

    #[test]
    fn test_normalize_inverts_unit_gain() {
        let range = sdg_range();
        assert_eq!(range.normalize(-32768), -1.0);
        assert_eq!(range.normalize(32767), 1.0);
        let quantizer = Quantizer::with_gain(range, 1.0);
        for code in [-32768, -12345, -1, 0, 1, 777, 32767] {
            assert_eq!(quantizer.code(range.normalize(code)), (code, false));
        }
    }

    #[test]
    fn test_peak_gain() {
        assert_eq!(peak_gain(&[0.25, -0.5, 0.1]), 2.0);
        assert_eq!(peak_gain(&[0.0, 0.0]), 1.0);
        assert_eq!(peak_gain(&[]), 1.0);
    }

    mod properties {
        use crate::quantizer::{CodeRange, Quantizer};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn codes_stay_in_range(
                samples in prop::collection::vec(-1e6f64..1e6, 1..64),
                bits in 2u32..=32,
                gain in 0.0f64..1e3,
            ) {
                let range = CodeRange::signed(bits).unwrap();
                let buffer = Quantizer::with_gain(range, gain).quantize(&samples);
                prop_assert_eq!(buffer.len(), samples.len());
                prop_assert!(buffer.codes().iter().all(|code| range.contains(*code)));
            }

            #[test]
            fn larger_amplitude_never_shrinks_unclipped_codes(
                sample in -1.0f64..=1.0,
                amplitude in 0.0f64..10.0,
                increase in 0.0f64..10.0,
            ) {
                let range = CodeRange::signed(16).unwrap();
                let low = Quantizer::new(range, amplitude, 10.0).unwrap();
                let high = Quantizer::new(range, amplitude + increase, 10.0).unwrap();
                let (low_code, _) = low.code(sample);
                let (high_code, high_clipped) = high.code(sample);
                if !high_clipped {
                    if sample >= 0.0 {
                        prop_assert!(high_code >= low_code);
                    } else {
                        prop_assert!(high_code <= low_code);
                    }
                }
            }
        }
    }
}
