// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Typed physical quantities used across the signal generator crates.
//!
//! Periods and durations are expressed as [`Duration<Second>`], playback and
//! sampling rates as [`Frequency<Hertz>`]. Both are thin wrappers around a
//! floating point value whose unit is carried as a zero-sized type, so that a
//! period can never be passed where a sample rate is expected.
//!
//! # Examples
//! ```rust
//! use siggen_units::{hertz, seconds};
//!
//! let period = seconds(1e-3);
//! assert_eq!(period.to_frequency(), hertz(1e3));
//! ```

pub mod duration;
pub mod unit;

pub use duration::{Duration, Frequency, Hertz, Second, hertz, seconds};
