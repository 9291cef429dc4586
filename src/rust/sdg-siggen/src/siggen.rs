// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use siggen_log::debug;
use siggen_units::{Duration, Frequency, Hertz, Second, seconds};
use waveform::device::{ChannelId, SDG2000X_DDS, SDG2000X_TARB, SamplingMode};
use waveform::{
    ChannelSettings, InstrumentSink, QuantizedBuffer, Signal, SignalConfig, Waveform, arbitrary,
};

use crate::commands::{
    channel_commands, decode_wavedata, encode_codes, key_value, parse_stored_name,
    response_values, stored_name, upload_header, validate_name,
};
use crate::transport::Transport;
use crate::{Error, Result};

/// Period assumed for the instrument's built-in waveforms.
const BUILTIN_PERIOD: Duration<Second> = seconds(1e-3);

/// A waveform read back from instrument memory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWaveform {
    pub name: String,
    pub period: Duration<Second>,
    /// DDS tables hold at most the DDS depth; anything longer was uploaded
    /// for true arbitrary playback.
    pub mode: SamplingMode,
    /// The stored codes as an arbitrary waveform over one period.
    pub waveform: Waveform,
}

impl StoredWaveform {
    /// Bind the waveform to a channel again, keeping one point per stored
    /// code.
    pub fn into_signal(self, config: SignalConfig) -> Result<Signal> {
        let device = match self.mode {
            SamplingMode::Dds => SDG2000X_DDS,
            SamplingMode::TrueArb => SDG2000X_TARB,
        };
        let config = config.with_period(self.period).with_name(self.name);
        Ok(Signal::new(self.waveform, config, device)?)
    }
}

/// Siglent SDG2000X signal generator.
pub struct Siggen<T> {
    transport: T,
    /// Label and stored name of the last upload per channel.
    uploaded: IndexMap<ChannelId, (String, String)>,
}

impl<T: Transport> Siggen<T> {
    pub fn new(transport: T) -> Self {
        Siggen {
            transport,
            uploaded: IndexMap::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn write(&mut self, command: &str) -> Result<()> {
        debug!(">> {}", command);
        self.transport.write(command)
    }

    pub fn query(&mut self, command: &str) -> Result<String> {
        debug!(">> {}", command);
        let response = self.transport.query(command)?.trim().to_string();
        debug!("<< {}", response);
        Ok(response)
    }

    pub fn identify(&mut self) -> Result<String> {
        self.query("*IDN?")
    }

    /// Write `{command} {new}` unless the queried state lacks `old`.
    fn switch(&mut self, command: &str, old: &str, new: &str) -> Result<()> {
        let response = self.query(&format!("{command}?"))?;
        if response_values(&response).contains(&old) {
            self.write(&format!("{command} {new}"))?;
        }
        Ok(())
    }

    /// Write `{command} {key},{value}` unless the instrument already reports
    /// that value.
    fn set_key_value(&mut self, command: &str, key: &str, value: &str) -> Result<()> {
        let response = self.query(&format!("{command}?"))?;
        if key_value(&response, key) != Some(value) {
            self.write(&format!("{command} {key},{value}"))?;
        }
        Ok(())
    }

    /// Names of the waveforms stored on the instrument.
    ///
    /// User waveforms are listed under their stored names, built-in ones
    /// under their `M<n>` index.
    pub fn list_signals(&mut self, builtin: bool) -> Result<Vec<String>> {
        let names = if builtin {
            let response = self.query("STL?")?;
            response_values(&response)
                .into_iter()
                .filter(|name| name.starts_with('M'))
                .map(str::to_string)
                .collect()
        } else {
            let response = self.query("STL? USER")?;
            response_values(&response)
                .into_iter()
                .filter(|name| !name.is_empty() && *name != "WVNM")
                .map(str::to_string)
                .collect()
        };
        Ok(names)
    }

    /// Read a stored waveform back.
    ///
    /// `name` is either the exact stored name or, for user waveforms, the
    /// name without its period suffix if only one stored waveform matches.
    pub fn get_signal(&mut self, name: &str, builtin: bool) -> Result<StoredWaveform> {
        let names = self.list_signals(builtin)?;
        let stored = if names.iter().any(|n| n == name) {
            name.to_string()
        } else {
            let matches: Vec<String> = names
                .into_iter()
                .filter(|n| n.split('_').next() == Some(name))
                .collect();
            if matches.len() > 1 {
                return Err(Error::Ambiguous {
                    name: name.to_string(),
                    matches,
                });
            }
            matches
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound(name.to_string()))?
        };

        let source = if builtin { "BUILDIN" } else { "USER" };
        self.write(&format!("WVDT? {source},{stored}"))?;
        let codes = decode_wavedata(&self.transport.read_raw()?)?;
        debug!("<< {} points of {}", codes.len(), stored);
        if codes.len() < 2 {
            return Err(Error::Response {
                command: format!("WVDT? {source},{stored}"),
                response: format!("{} points", codes.len()),
            });
        }

        let (name, period) = if builtin {
            (stored.clone(), BUILTIN_PERIOD)
        } else {
            let (name, period) = parse_stored_name(&stored)?;
            (name.to_string(), period)
        };
        let range = SDG2000X_DDS.code_range()?;
        let points: Vec<f64> = codes
            .iter()
            .map(|code| range.normalize(i32::from(*code)))
            .collect();
        let mode = if codes.len() > SDG2000X_DDS.default_depth {
            SamplingMode::TrueArb
        } else {
            SamplingMode::Dds
        };
        Ok(StoredWaveform {
            waveform: arbitrary(period, points).named(name.as_str()),
            name,
            period,
            mode,
        })
    }

    pub fn enable(&mut self, channel: ChannelId) -> Result<()> {
        self.switch(&format!("{channel}:OUTP"), "OFF", "ON")
    }

    pub fn disable(&mut self, channel: ChannelId) -> Result<()> {
        self.switch(&format!("{channel}:OUTP"), "ON", "OFF")
    }

    /// Start bursts on `channel` from a rising edge of the external trigger.
    pub fn burst_ext_trigger(&mut self, channel: ChannelId, enable: bool) -> Result<()> {
        let mode = if enable { "RISE" } else { "OFF" };
        self.set_key_value(&format!("{channel}:BTWV"), "TRMD", mode)
    }

    /// Route both channels to the output of `channel`, or give each channel
    /// its own output again with `None`.
    pub fn combine(&mut self, channel: Option<ChannelId>) -> Result<()> {
        match channel {
            None => {
                self.switch("C1:CMBN", "ON", "OFF")?;
                self.switch("C2:CMBN", "ON", "OFF")
            }
            Some(channel) => {
                let other = if channel.number() == 1 { "C2" } else { "C1" };
                self.switch(&format!("{channel}:CMBN"), "OFF", "ON")?;
                self.switch(&format!("{other}:CMBN"), "ON", "OFF")
            }
        }
    }

    /// Let a trigger on either channel start both.
    pub fn trigger_both(&mut self, enable: bool) -> Result<()> {
        let state = if enable { "ON" } else { "OFF" };
        self.set_key_value("COUP", "TRDUCH", state)
    }

    /// Align the phase of both channels.
    pub fn sync_phase(&mut self) -> Result<()> {
        self.write("EQPHASE")
    }

    fn upload_buffer(
        &mut self,
        channel: ChannelId,
        label: &str,
        buffer: &QuantizedBuffer,
        sample_rate: Frequency<Hertz>,
    ) -> Result<()> {
        validate_name(label)?;
        let period = sample_rate.to_period() * buffer.len() as f64;
        let stored = stored_name(label, period);
        let header = upload_header(channel, &stored);
        let payload = encode_codes(buffer)?;
        debug!(">> {}<{} bytes>", header, payload.len());
        self.transport.write_binary(&header, &payload)?;
        self.uploaded.insert(channel, (label.to_string(), stored));
        Ok(())
    }

    /// The name the channel's waveform was uploaded under. Waveforms not
    /// uploaded through this instance are assumed stored under their period.
    fn stored_name_for(&self, channel: ChannelId, settings: &ChannelSettings) -> String {
        match self.uploaded.get(&channel) {
            Some((label, stored)) if *label == settings.label => stored.clone(),
            _ => stored_name(&settings.label, settings.period),
        }
    }

    fn configure_channel(&mut self, channel: ChannelId, settings: &ChannelSettings) -> Result<()> {
        validate_name(&settings.label)?;
        let stored = self.stored_name_for(channel, settings);
        for command in channel_commands(channel, &stored, settings) {
            self.write(&command)?;
        }
        if settings.enabled {
            self.enable(channel)
        } else {
            self.disable(channel)
        }
    }
}

impl<T: Transport> InstrumentSink for Siggen<T> {
    fn upload(
        &mut self,
        channel: ChannelId,
        label: &str,
        buffer: &QuantizedBuffer,
        sample_rate: Frequency<Hertz>,
    ) -> waveform::Result<()> {
        Ok(self.upload_buffer(channel, label, buffer, sample_rate)?)
    }

    fn configure(&mut self, channel: ChannelId, settings: &ChannelSettings) -> waveform::Result<()> {
        Ok(self.configure_channel(channel, settings)?)
    }
}
