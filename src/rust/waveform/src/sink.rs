// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! The boundary between rendered signals and whatever plays them back.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use siggen_units::{Duration, Frequency, Hertz, Second};

use crate::Result;
use crate::device::{ChannelId, SamplingMode};
use crate::quantizer::QuantizedBuffer;
use crate::signal::Signal;

/// Analog front-end parameters of a channel playing back an uploaded buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Name under which the buffer was uploaded.
    pub label: String,
    /// Peak output amplitude, in volts.
    pub amplitude: f64,
    /// DC offset, in volts.
    pub offset: f64,
    /// Duration of one pass through the buffer.
    pub period: Duration<Second>,
    /// Repetition frequency of the whole buffer.
    pub frequency: Frequency<Hertz>,
    pub sample_rate: Frequency<Hertz>,
    pub mode: SamplingMode,
    pub enabled: bool,
}

/// An instrument, simulator or recorder that accepts rendered signals.
///
/// Implementations own all device communication. Failures are reported as
/// [`crate::Error::Anyhow`] and are never retried by the caller.
pub trait InstrumentSink {
    /// Store `buffer` in the waveform memory of `channel` under `label`.
    fn upload(
        &mut self,
        channel: ChannelId,
        label: &str,
        buffer: &QuantizedBuffer,
        sample_rate: Frequency<Hertz>,
    ) -> Result<()>;

    fn configure(&mut self, channel: ChannelId, settings: &ChannelSettings) -> Result<()>;
}

/// Upload the buffer of `signal`, rendering it first if needed.
pub fn set_signal<S: InstrumentSink + ?Sized>(sink: &mut S, signal: &Signal) -> Result<()> {
    let buffer = signal.buffer()?;
    sink.upload(signal.channel(), &signal.label(), buffer, signal.sample_rate())
}

/// Configure the channel of `signal` to play back its buffer.
///
/// The buffer is rendered before anything reaches the sink, so that an
/// expression which cannot be evaluated never leaves a half-configured
/// channel behind.
pub fn config_signal<S: InstrumentSink + ?Sized>(
    sink: &mut S,
    signal: &Signal,
    enabled: bool,
) -> Result<()> {
    signal.buffer()?;
    sink.configure(signal.channel(), &signal.channel_settings(enabled))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpload {
    pub label: String,
    pub buffer: QuantizedBuffer,
    pub sample_rate: Frequency<Hertz>,
}

/// In-memory sink keeping the latest upload and settings of every channel.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    uploads: IndexMap<ChannelId, RecordedUpload>,
    settings: IndexMap<ChannelId, ChannelSettings>,
    upload_count: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_upload(&self, channel: ChannelId) -> Option<&RecordedUpload> {
        self.uploads.get(&channel)
    }

    pub fn settings(&self, channel: ChannelId) -> Option<&ChannelSettings> {
        self.settings.get(&channel)
    }

    /// Channels in the order they were first uploaded to or configured.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.uploads
            .keys()
            .chain(self.settings.keys().filter(|c| !self.uploads.contains_key(*c)))
            .copied()
    }

    /// Total number of uploads received, including overwritten ones.
    pub fn upload_count(&self) -> usize {
        self.upload_count
    }
}

impl InstrumentSink for RecordingSink {
    fn upload(
        &mut self,
        channel: ChannelId,
        label: &str,
        buffer: &QuantizedBuffer,
        sample_rate: Frequency<Hertz>,
    ) -> Result<()> {
        self.upload_count += 1;
        self.uploads.insert(
            channel,
            RecordedUpload {
                label: label.to_string(),
                buffer: buffer.clone(),
                sample_rate,
            },
        );
        Ok(())
    }

    fn configure(&mut self, channel: ChannelId, settings: &ChannelSettings) -> Result<()> {
        self.settings.insert(channel, settings.clone());
        Ok(())
    }
}
