// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::{Error, Result};

/// Message channel to an instrument.
///
/// Implementations handle connection setup, termination characters and
/// timeouts. Responses are returned as received.
pub trait Transport {
    fn write(&mut self, command: &str) -> Result<()>;

    /// Write `command` and read the response.
    fn query(&mut self, command: &str) -> Result<String>;

    /// Write `header` immediately followed by a raw binary block, without a
    /// length prefix or termination.
    fn write_binary(&mut self, header: &str, payload: &[u8]) -> Result<()>;

    /// Read a raw response, e.g. binary waveform data.
    fn read_raw(&mut self) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, command: &str) -> Result<()> {
        (**self).write(command)
    }

    fn query(&mut self, command: &str) -> Result<String> {
        (**self).query(command)
    }

    fn write_binary(&mut self, header: &str, payload: &[u8]) -> Result<()> {
        (**self).write_binary(header, payload)
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        (**self).read_raw()
    }
}

/// A message written to a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Command(String),
    Binary { header: String, payload: Vec<u8> },
}

/// Transport that records what is sent and replays scripted responses.
///
/// Queries are answered from a table keyed by the exact query string, so the
/// same query always gets the same response. Raw reads are served in order.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Vec<Sent>,
    responses: IndexMap<String, String>,
    raw: VecDeque<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond<Q: Into<String>, R: Into<String>>(mut self, query: Q, response: R) -> Self {
        self.responses.insert(query.into(), response.into());
        self
    }

    pub fn push_raw<B: Into<Vec<u8>>>(&mut self, data: B) {
        self.raw.push_back(data.into());
    }

    pub fn sent(&self) -> &[Sent] {
        &self.sent
    }

    /// Commands and queries sent so far, binary blocks excluded.
    pub fn commands(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Command(command) => Some(command.as_str()),
                Sent::Binary { .. } => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for MockTransport {
    fn write(&mut self, command: &str) -> Result<()> {
        self.sent.push(Sent::Command(command.to_string()));
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.sent.push(Sent::Command(command.to_string()));
        self.responses
            .get(command)
            .cloned()
            .ok_or_else(|| Error::new(&format!("no response scripted for '{command}'")))
    }

    fn write_binary(&mut self, header: &str, payload: &[u8]) -> Result<()> {
        self.sent.push(Sent::Binary {
            header: header.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        self.raw
            .pop_front()
            .ok_or_else(|| Error::new("no raw response scripted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_and_replays() {
        let mut transport = MockTransport::new().respond("*IDN?", "Siglent,SDG2042X\n");
        transport.push_raw(b"abc".to_vec());

        transport.write("EQPHASE").unwrap();
        assert_eq!(transport.query("*IDN?").unwrap(), "Siglent,SDG2042X\n");
        transport.write_binary("HDR,", &[1, 2]).unwrap();
        assert_eq!(transport.read_raw().unwrap(), b"abc");

        assert!(transport.query("C1:OUTP?").is_err());
        assert!(transport.read_raw().is_err());
        assert_eq!(transport.commands(), vec!["EQPHASE", "*IDN?", "C1:OUTP?"]);
        assert_eq!(
            transport.sent()[2],
            Sent::Binary {
                header: "HDR,".to_string(),
                payload: vec![1, 2]
            }
        );
        transport.clear();
        assert!(transport.sent().is_empty());
    }
}
