// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Siglent SDG2000X arbitrary waveform generator.
//!
//! [`Siggen`] speaks the instrument's SCPI dialect over any [`Transport`] and
//! implements [`waveform::InstrumentSink`], so rendered signals are uploaded
//! with [`waveform::set_signal`] and configured with
//! [`waveform::config_signal`]. Opening the connection itself is left to the
//! transport.

pub mod burst;
pub mod commands;
pub mod siggen;
pub mod transport;

pub use burst::BurstOneshot;
pub use siggen::{Siggen, StoredWaveform};
pub use transport::{MockTransport, Sent, Transport};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("unexpected response to '{command}': {response}")]
    Response { command: String, response: String },
    #[error("no signal named '{0}' on the instrument")]
    NotFound(String),
    #[error("'{name}' matches several signals: {}", .matches.join(", "))]
    Ambiguous { name: String, matches: Vec<String> },
    #[error(transparent)]
    Waveform(#[from] waveform::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

impl From<Error> for waveform::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Waveform(err) => err,
            Error::Configuration(msg) => waveform::Error::Configuration(msg),
            other => waveform::Error::Anyhow(other.into()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
