// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! A waveform bound to the parameters it is uploaded with.
//!
//! A [`Signal`] resolves period, depth and code range once, when it is
//! created, so that every configuration error surfaces before anything is
//! rendered. The quantized buffer itself is rendered on first use and kept
//! until one of the parameters that shape it is changed.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use siggen_log::{diagnostic, warn};
use siggen_units::{Duration, Frequency, Hertz, Second, hertz};

use crate::device::{ChannelId, DeviceProfile};
use crate::evaluator::{TimeBase, evaluate, natural_duration};
use crate::expression::{Node, PrimitiveKind, Waveform};
use crate::quantizer::{CodeRange, QuantizedBuffer, Quantizer, peak_gain};
use crate::sink::ChannelSettings;
use crate::{Error, Result};

/// How a signal's amplitude is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Codes encode `amplitude / reference_amplitude`; the front end stays
    /// at the reference amplitude. Samples beyond it clip.
    #[default]
    Reference,
    /// The buffer is normalized so that its largest sample is full scale and
    /// the front end is set to the amplitude.
    Peak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Peak amplitude of a unit sample, in volts.
    pub amplitude: f64,
    #[serde(default)]
    pub offset: f64,
    pub channel: ChannelId,
    /// Overrides the expression's label as the upload name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    /// Rendered duration, required for expressions without a natural one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Duration<Second>>,
    #[serde(default)]
    pub scaling: Scaling,
}

impl SignalConfig {
    pub fn new(amplitude: f64, channel: ChannelId) -> Self {
        SignalConfig {
            amplitude,
            offset: 0.0,
            channel,
            name: None,
            depth: None,
            period: None,
            scaling: Scaling::default(),
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_period(mut self, period: Duration<Second>) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }
}

#[derive(Debug)]
pub struct Signal {
    expression: Waveform,
    config: SignalConfig,
    device: DeviceProfile,
    period: Duration<Second>,
    depth: usize,
    range: CodeRange,
    buffer: OnceLock<QuantizedBuffer>,
}

impl Signal {
    pub fn new<W: Into<Waveform>>(
        expression: W,
        config: SignalConfig,
        device: DeviceProfile,
    ) -> Result<Self> {
        let expression = expression.into();
        device.validate()?;
        device.check_channel(config.channel)?;
        check_amplitude(&device, config.scaling, config.amplitude)?;
        if !config.offset.is_finite() {
            return Err(Error::Configuration(format!(
                "offset must be finite, got {}",
                config.offset
            )));
        }
        let period = match config.period {
            Some(period) => {
                expression.extent()?;
                period
            }
            None => natural_duration(&expression)?,
        };
        if !period.is_positive() {
            return Err(Error::Configuration(format!(
                "period must be positive and finite, got {period}"
            )));
        }
        let depth = resolve_depth(&expression, &device, config.depth, period)?;
        let range = device.code_range()?;
        Ok(Signal {
            expression,
            config,
            device,
            period,
            depth,
            range,
            buffer: OnceLock::new(),
        })
    }

    pub fn expression(&self) -> &Waveform {
        &self.expression
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn channel(&self) -> ChannelId {
        self.config.channel
    }

    pub fn amplitude(&self) -> f64 {
        self.config.amplitude
    }

    /// The configured name, or the expression's label.
    pub fn label(&self) -> String {
        self.config
            .name
            .clone()
            .unwrap_or_else(|| self.expression.label())
    }

    /// Duration covered by one pass through the buffer.
    pub fn period(&self) -> Duration<Second> {
        self.period
    }

    pub fn frequency(&self) -> Frequency<Hertz> {
        self.period.to_frequency()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn sample_rate(&self) -> Frequency<Hertz> {
        hertz(self.depth as f64 / self.period.value())
    }

    pub fn code_range(&self) -> CodeRange {
        self.range
    }

    pub fn time_base(&self) -> Result<TimeBase> {
        TimeBase::new(self.period, self.depth)
    }

    /// Real samples over one period, before quantization.
    ///
    /// An arbitrary waveform holding exactly one point per sample is played
    /// back point for point, so stored waveforms re-upload unchanged.
    pub fn samples(&self) -> Result<Vec<f64>> {
        if let Some(points) = self.stored_points() {
            self.expression.extent()?;
            if let Some((index, value)) = points
                .iter()
                .enumerate()
                .find(|(_, value)| !value.is_finite())
            {
                return Err(Error::NonFiniteSample {
                    index,
                    value: *value,
                });
            }
            return Ok(points.to_vec());
        }
        evaluate(&self.expression, &self.time_base()?)
    }

    fn stored_points(&self) -> Option<&[f64]> {
        let Node::Primitive(primitive) = self.expression.node() else {
            return None;
        };
        match primitive.kind() {
            PrimitiveKind::Arbitrary { points }
                if points.len() == self.depth
                    && primitive.phase() == 0.0
                    && primitive.period() == self.period =>
            {
                Some(points)
            }
            _ => None,
        }
    }

    /// The quantized buffer, rendered on first access.
    pub fn buffer(&self) -> Result<&QuantizedBuffer> {
        if let Some(buffer) = self.buffer.get() {
            return Ok(buffer);
        }
        let buffer = self.render()?;
        Ok(self.buffer.get_or_init(|| buffer))
    }

    /// Hex SHA-1 of the uploaded bytes; equal fingerprints mean identical
    /// uploads.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha1::new();
        hasher.update(self.buffer()?.to_le_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Peak amplitude the front end is set to.
    pub fn output_amplitude(&self) -> f64 {
        match self.config.scaling {
            Scaling::Reference => self.device.reference_amplitude,
            Scaling::Peak => self.config.amplitude,
        }
    }

    pub fn channel_settings(&self, enabled: bool) -> ChannelSettings {
        ChannelSettings {
            label: self.label(),
            amplitude: self.output_amplitude(),
            offset: self.config.offset,
            period: self.period,
            frequency: self.frequency(),
            sample_rate: self.sample_rate(),
            mode: self.device.mode,
            enabled,
        }
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<()> {
        check_amplitude(&self.device, self.config.scaling, amplitude)?;
        self.config.amplitude = amplitude;
        self.invalidate("amplitude");
        Ok(())
    }

    pub fn set_channel(&mut self, channel: ChannelId) -> Result<()> {
        self.device.check_channel(channel)?;
        self.config.channel = channel;
        self.invalidate("channel");
        Ok(())
    }

    /// Change the depth; `None` derives it from the device again.
    pub fn set_depth(&mut self, depth: Option<usize>) -> Result<()> {
        self.depth = resolve_depth(&self.expression, &self.device, depth, self.period)?;
        self.config.depth = depth;
        self.invalidate("depth");
        Ok(())
    }

    fn invalidate(&mut self, what: &str) {
        if self.buffer.take().is_some() {
            diagnostic!("{} of '{}' changed, buffer dropped", what, self.label());
        }
    }

    fn render(&self) -> Result<QuantizedBuffer> {
        let samples = self.samples()?;
        let quantizer = match self.config.scaling {
            Scaling::Reference => Quantizer::new(
                self.range,
                self.config.amplitude,
                self.device.reference_amplitude,
            )?,
            Scaling::Peak => Quantizer::with_gain(self.range, peak_gain(&samples)),
        };
        let buffer = quantizer.quantize(&samples);
        diagnostic!(
            "Rendered '{}': {} points at {}",
            self.label(),
            self.depth,
            self.sample_rate()
        );
        if buffer.is_clipped() {
            warn!(
                "{} of {} samples of '{}' clipped at amplitude {} V (reference {} V)",
                buffer.clipped_count(),
                buffer.len(),
                self.label(),
                self.config.amplitude,
                self.device.reference_amplitude
            );
        }
        Ok(buffer)
    }
}

fn check_amplitude(device: &DeviceProfile, scaling: Scaling, amplitude: f64) -> Result<()> {
    if !(amplitude.is_finite() && amplitude >= 0.0) {
        return Err(Error::Configuration(format!(
            "amplitude must be non-negative and finite, got {amplitude}"
        )));
    }
    if scaling == Scaling::Peak && amplitude > device.max_amplitude {
        return Err(Error::Configuration(format!(
            "amplitude {amplitude} V exceeds the {} V of {}",
            device.max_amplitude, device.name
        )));
    }
    Ok(())
}

/// Explicit depths are checked against the device. Otherwise an arbitrary
/// waveform keeps one point per stored value and everything else follows
/// the device's sampling mode.
fn resolve_depth(
    expression: &Waveform,
    device: &DeviceProfile,
    depth: Option<usize>,
    period: Duration<Second>,
) -> Result<usize> {
    let depth = match (depth, expression.node()) {
        (Some(depth), _) => depth,
        (None, Node::Primitive(primitive)) => match primitive.kind() {
            PrimitiveKind::Arbitrary { points } => points.len(),
            _ => return device.derive_depth(period),
        },
        (None, _) => return device.derive_depth(period),
    };
    device.check_depth(depth)?;
    Ok(depth)
}
