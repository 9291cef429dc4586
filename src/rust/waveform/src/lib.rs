// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Composition and quantization of waveforms for arbitrary-waveform
//! generators.
//!
//! Waveforms are built as immutable expression trees from periodic
//! primitives, sampled on a shared time base, quantized into a device's
//! integer code range and handed to an [`InstrumentSink`].
//!
//! ```
//! use siggen_units::seconds;
//! use waveform::{ChannelId, RecordingSink, SDG2000X_DDS, Signal, SignalConfig};
//! use waveform::{add, config_signal, scale, set_signal, sine};
//!
//! let period = seconds(1e-3);
//! let square_ish = add([sine(period).into(), scale(sine(period / 3.0), 1.0 / 3.0)]).unwrap();
//! let channel = ChannelId::new(1).unwrap();
//! let signal = Signal::new(
//!     square_ish.named("sqr"),
//!     SignalConfig::new(5.0, channel).with_depth(1000),
//!     SDG2000X_DDS,
//! )
//! .unwrap();
//!
//! let mut sink = RecordingSink::new();
//! set_signal(&mut sink, &signal).unwrap();
//! config_signal(&mut sink, &signal, true).unwrap();
//! assert_eq!(sink.last_upload(channel).unwrap().buffer.len(), 1000);
//! assert!(!signal.buffer().unwrap().is_clipped());
//! ```

pub mod device;
pub mod evaluator;
pub mod expression;
pub mod quantizer;
pub mod signal;
pub mod sink;

pub use device::{ChannelId, DeviceProfile, SDG2000X_DDS, SDG2000X_TARB, SamplingMode};
pub use evaluator::{TimeBase, evaluate, natural_duration};
pub use expression::{
    Extent, Node, Primitive, PrimitiveKind, Repeat, Waveform, add, arbitrary, concat, constant,
    delay, harmonics, multiply, offset, ramp, sawtooth, scale, sine, square, triangle,
};
pub use quantizer::{CodeRange, QuantizedBuffer, Quantizer, peak_gain};
pub use signal::{Scaling, Signal, SignalConfig};
pub use sink::{
    ChannelSettings, InstrumentSink, RecordedUpload, RecordingSink, config_signal, set_signal,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Children of a composite cannot be combined, or an expression lacks
    /// the extent an operation needs.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A parameter lies outside what the expression or the device accepts.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("sample {index} evaluated to {value}")]
    NonFiniteSample { index: usize, value: f64 },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
