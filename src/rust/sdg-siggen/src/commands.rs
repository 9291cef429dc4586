// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Formatting and parsing of SDG2000X command strings.

use siggen_units::{Duration, Second, seconds};
use waveform::device::{ChannelId, SamplingMode};
use waveform::{ChannelSettings, QuantizedBuffer};

use crate::{Error, Result};

/// Characters the instrument reserves in stored waveform names.
pub const RESERVED_NAME_CHARS: [char; 6] = ['.', '_', ':', '-', '*', '+'];

const WAVEDATA_MARKER: &[u8] = b"WAVEDATA,";

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Configuration(
            "waveform name must not be empty".to_string(),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| RESERVED_NAME_CHARS.contains(c) || c.is_whitespace() || *c == ',')
    {
        return Err(Error::Configuration(format!(
            "waveform name '{name}' contains '{c}', names must not contain any of {}",
            RESERVED_NAME_CHARS.iter().collect::<String>()
        )));
    }
    Ok(())
}

/// Name a waveform is stored under: the name followed by the period in
/// seconds with nine decimals, e.g. `tone_0_001000000`.
pub fn stored_name(name: &str, period: Duration<Second>) -> String {
    let period = format!("{:.9}", period.value()).replace('.', "_");
    format!("{name}_{period}")
}

/// Split a stored name back into waveform name and period.
pub fn parse_stored_name(stored: &str) -> Result<(&str, Duration<Second>)> {
    let invalid = || Error::Response {
        command: "STL? USER".to_string(),
        response: stored.to_string(),
    };
    let (name, period) = stored.split_once('_').ok_or_else(invalid)?;
    let period: f64 = period.replace('_', ".").parse().map_err(|_| invalid())?;
    Ok((name, seconds(period)))
}

pub fn upload_header(channel: ChannelId, stored_name: &str) -> String {
    format!("{channel}:WVDT WVNM,{stored_name},WAVEDATA,")
}

/// Codes as the little-endian 16-bit words the instrument stores.
pub fn encode_codes(buffer: &QuantizedBuffer) -> Result<Vec<u8>> {
    if buffer.range().code_width() != 2 {
        return Err(Error::Configuration(format!(
            "the SDG2000X stores 16-bit codes, the buffer uses {}..={}",
            buffer.range().min(),
            buffer.range().max()
        )));
    }
    Ok(buffer.to_le_bytes())
}

/// Extract the codes following `WAVEDATA,` in a waveform query response.
pub fn decode_wavedata(response: &[u8]) -> Result<Vec<i16>> {
    let invalid = |reason: &str| Error::Response {
        command: "WVDT?".to_string(),
        response: reason.to_string(),
    };
    let start = response
        .windows(WAVEDATA_MARKER.len())
        .position(|window| window == WAVEDATA_MARKER)
        .ok_or_else(|| invalid("no WAVEDATA block"))?;
    let words = response[start + WAVEDATA_MARKER.len()..].chunks_exact(2);
    if !words.remainder().is_empty() {
        return Err(invalid("WAVEDATA block has an odd number of bytes"));
    }
    Ok(words
        .map(|word| i16::from_le_bytes([word[0], word[1]]))
        .collect())
}

fn mode_name(mode: SamplingMode) -> &'static str {
    match mode {
        SamplingMode::Dds => "DDS",
        SamplingMode::TrueArb => "TARB",
    }
}

/// Commands selecting the stored waveform and setting up playback.
///
/// Amplitudes are sent peak-to-peak, as the instrument expects.
pub fn channel_commands(
    channel: ChannelId,
    stored_name: &str,
    settings: &ChannelSettings,
) -> Vec<String> {
    let amplitude = 2.0 * settings.amplitude;
    let mut commands = vec![
        format!("{channel}:ARWV NAME,{stored_name}"),
        format!("{channel}:SRATE MODE,{}", mode_name(settings.mode)),
    ];
    match settings.mode {
        SamplingMode::Dds => commands.push(format!(
            "{channel}:BSWV WVDT,ARB,PERI,{},AMP,{amplitude},OFST,{}",
            settings.period.value(),
            settings.offset
        )),
        SamplingMode::TrueArb => {
            commands.push(format!(
                "{channel}:SRATE VALUE,{}",
                settings.sample_rate.value().round()
            ));
            commands.push(format!(
                "{channel}:BSWV WVDT,ARB,AMP,{amplitude},OFST,{}",
                settings.offset
            ));
        }
    }
    commands
}

/// Values of a query response: everything after the echoed command header,
/// split at commas.
pub fn response_values(response: &str) -> Vec<&str> {
    let values = response
        .split_once(' ')
        .map_or(response, |(_, values)| values);
    values.split(',').map(str::trim).collect()
}

/// The value following `key` in a `KEY,VALUE,...` response.
pub fn key_value<'a>(response: &'a str, key: &str) -> Option<&'a str> {
    let values = response_values(response);
    let index = values.iter().position(|value| *value == key)?;
    values.get(index + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use siggen_units::hertz;
    use waveform::{CodeRange, Quantizer};

    fn channel(number: u8) -> ChannelId {
        ChannelId::new(number).unwrap()
    }

    fn settings(mode: SamplingMode) -> ChannelSettings {
        ChannelSettings {
            label: "tone".to_string(),
            amplitude: 2.5,
            offset: 0.1,
            period: seconds(1e-3),
            frequency: hertz(1e3),
            sample_rate: hertz(75e6),
            mode,
            enabled: true,
        }
    }

    #[test]
    fn test_validate_name() {
        validate_name("RFID").unwrap();
        validate_name("tone2").unwrap();
        for name in ["", "a.b", "a_b", "a:b", "a-b", "a*b", "a+b", "a b", "a,b"] {
            assert!(validate_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_stored_name() {
        assert_eq!(stored_name("tone", seconds(1e-3)), "tone_0_001000000");
        assert_eq!(stored_name("slow", seconds(2.5)), "slow_2_500000000");
        let (name, period) = parse_stored_name("tone_0_001000000").unwrap();
        assert_eq!(name, "tone");
        assert_eq!(period, seconds(1e-3));
        assert!(parse_stored_name("tone").is_err());
        assert!(parse_stored_name("tone_x").is_err());
    }

    #[test]
    fn test_upload_header_and_payload() {
        assert_eq!(
            upload_header(channel(2), "tone_0_001000000"),
            "C2:WVDT WVNM,tone_0_001000000,WAVEDATA,"
        );
        let buffer = Quantizer::with_gain(CodeRange::signed(16).unwrap(), 1.0).quantize(&[1.0, -1.0]);
        assert_eq!(encode_codes(&buffer).unwrap(), vec![0xff, 0x7f, 0x00, 0x80]);
        let wide = Quantizer::with_gain(CodeRange::signed(18).unwrap(), 1.0).quantize(&[1.0]);
        assert!(encode_codes(&wide).is_err());
    }

    #[test]
    fn test_decode_wavedata() {
        let response = b"WVDT USER,tone,WAVEDATA,\xff\x7f\x00\x80\x01\x00";
        assert_eq!(decode_wavedata(response).unwrap(), vec![32767, -32768, 1]);
        assert!(decode_wavedata(b"WVDT USER,tone,").is_err());
        assert!(decode_wavedata(b"WAVEDATA,\x01").is_err());
    }

    #[test]
    fn test_dds_channel_commands() {
        assert_eq!(
            channel_commands(channel(1), "tone_0_001000000", &settings(SamplingMode::Dds)),
            vec![
                "C1:ARWV NAME,tone_0_001000000",
                "C1:SRATE MODE,DDS",
                "C1:BSWV WVDT,ARB,PERI,0.001,AMP,5,OFST,0.1",
            ]
        );
    }

    #[test]
    fn test_tarb_channel_commands() {
        assert_eq!(
            channel_commands(channel(2), "tone_0_001000000", &settings(SamplingMode::TrueArb)),
            vec![
                "C2:ARWV NAME,tone_0_001000000",
                "C2:SRATE MODE,TARB",
                "C2:SRATE VALUE,75000000",
                "C2:BSWV WVDT,ARB,AMP,5,OFST,0.1",
            ]
        );
    }

    #[test]
    fn test_response_values() {
        let response = "C1:OUTP OFF,LOAD,HZ,PLRT,NOR";
        assert_eq!(response_values(response), vec!["OFF", "LOAD", "HZ", "PLRT", "NOR"]);
        assert_eq!(key_value(response, "LOAD"), Some("HZ"));
        assert_eq!(key_value(response, "NOR"), None);
        assert_eq!(key_value(response, "GAIN"), None);
        assert_eq!(key_value("COUP TRDUCH,ON,RCOUP,OFF", "TRDUCH"), Some("ON"));
    }
}
