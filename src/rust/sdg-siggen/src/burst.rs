// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! One-shot playback of a signal using the burst mode of a channel.

use siggen_log::info;
use siggen_units::{Duration, Second};
use waveform::device::SamplingMode;
use waveform::{Signal, config_signal, set_signal};

use crate::siggen::Siggen;
use crate::transport::Transport;
use crate::{Error, Result};

/// Plays `count` periods of a DDS signal per manual trigger, after `delay`.
#[derive(Debug)]
pub struct BurstOneshot<'s> {
    signal: &'s Signal,
    delay: Duration<Second>,
    count: u32,
}

impl<'s> BurstOneshot<'s> {
    pub fn new(signal: &'s Signal, delay: Duration<Second>, count: u32) -> Result<Self> {
        if signal.device().mode != SamplingMode::Dds {
            return Err(Error::Configuration(format!(
                "burst playback of '{}' needs a DDS signal",
                signal.label()
            )));
        }
        if !(delay.value().is_finite() && delay.value() >= 0.0) {
            return Err(Error::Configuration(format!(
                "burst delay must be non-negative, got {delay}"
            )));
        }
        if count == 0 {
            return Err(Error::Configuration(
                "burst count must be at least 1".to_string(),
            ));
        }
        Ok(BurstOneshot {
            signal,
            delay,
            count,
        })
    }

    /// Upload the signal, configure its channel with the output off and arm
    /// the burst.
    pub fn configure<T: Transport>(&self, siggen: &mut Siggen<T>) -> Result<()> {
        set_signal(siggen, self.signal)?;
        config_signal(siggen, self.signal, false)?;
        let channel = self.signal.channel();
        for setting in self.settings() {
            siggen.write(&format!("{channel}:BTWV {setting}"))?;
        }
        info!(
            "Armed burst of {} x '{}' on {}",
            self.count,
            self.signal.label(),
            channel
        );
        Ok(())
    }

    /// Fire the burst.
    pub fn trigger<T: Transport>(&self, siggen: &mut Siggen<T>) -> Result<()> {
        siggen.write(&format!("{}:BTWV MTRIG", self.signal.channel()))
    }

    pub fn output_enable<T: Transport>(&self, siggen: &mut Siggen<T>, on: bool) -> Result<()> {
        if on {
            siggen.enable(self.signal.channel())
        } else {
            siggen.disable(self.signal.channel())
        }
    }

    fn settings(&self) -> [String; 8] {
        [
            "STATE,ON".to_string(),
            format!("DLAY,{}", self.delay.value()),
            format!("TIME,{}", self.count),
            "TRSR,MAN".to_string(),
            "EDGE,RISE".to_string(),
            "STPS,0".to_string(),
            "CARR,WVTP,ARB".to_string(),
            "GATE_NCYC,NCYC".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use siggen_units::seconds;
    use waveform::device::{ChannelId, SDG2000X_DDS, SDG2000X_TARB};
    use waveform::{SignalConfig, sine};

    fn pulse(device: waveform::DeviceProfile) -> Signal {
        Signal::new(
            sine(seconds(1e-6)).named("pulse"),
            SignalConfig::new(10.0, ChannelId::new(2).unwrap()).with_depth(64),
            device,
        )
        .unwrap()
    }

    #[test]
    fn test_burst_configuration() {
        let signal = pulse(SDG2000X_DDS);
        let burst = BurstOneshot::new(&signal, seconds(1e-5), 3).unwrap();
        let mut transport = MockTransport::new().respond("C2:OUTP?", "C2:OUTP ON,LOAD,HZ");
        let mut siggen = Siggen::new(&mut transport);

        burst.configure(&mut siggen).unwrap();
        burst.output_enable(&mut siggen, true).unwrap();
        burst.trigger(&mut siggen).unwrap();

        let commands = transport.commands();
        assert_eq!(
            commands[..4],
            [
                "C2:ARWV NAME,pulse_0_000001000",
                "C2:SRATE MODE,DDS",
                "C2:BSWV WVDT,ARB,PERI,0.000001,AMP,20,OFST,0",
                "C2:OUTP?",
            ]
        );
        assert_eq!(
            commands[4..],
            [
                "C2:OUTP OFF",
                "C2:BTWV STATE,ON",
                "C2:BTWV DLAY,0.00001",
                "C2:BTWV TIME,3",
                "C2:BTWV TRSR,MAN",
                "C2:BTWV EDGE,RISE",
                "C2:BTWV STPS,0",
                "C2:BTWV CARR,WVTP,ARB",
                "C2:BTWV GATE_NCYC,NCYC",
                "C2:OUTP?",
                "C2:BTWV MTRIG",
            ]
        );
    }

    #[test]
    fn test_burst_requires_dds() {
        let signal = pulse(SDG2000X_TARB);
        assert!(BurstOneshot::new(&signal, seconds(0.0), 1).is_err());
        let signal = pulse(SDG2000X_DDS);
        assert!(BurstOneshot::new(&signal, seconds(0.0), 0).is_err());
        assert!(BurstOneshot::new(&signal, seconds(-1.0), 1).is_err());
        BurstOneshot::new(&signal, seconds(0.0), 1).unwrap();
    }
}
