//! AT protocol encoding and decoding, matching the firmware.

#![allow(dead_code)]

use anyhow::{bail, Result};

/// End-of-command delimiter
pub const EOC: u8 = b'\r';

/// Prefix of the firmware's version string
pub const VERSION_PREFIX: &str = "ATBridge v";

/// Reply status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail,
}

/// A decoded reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub text: String,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Fail with a readable message unless the reply is `OK <expected>`
    pub fn expect_ok(&self, expected: &str) -> Result<()> {
        if self.status != Status::Ok || self.text != expected {
            bail!("Expected \"OK {}\", got {:?}", expected, self);
        }
        Ok(())
    }

    /// Fail unless the reply is `FAIL <expected>`
    pub fn expect_fail(&self, expected: &str) -> Result<()> {
        if self.status != Status::Fail || self.text != expected {
            bail!("Expected \"FAIL {}\", got {:?}", expected, self);
        }
        Ok(())
    }
}

/// Build a text command frame
pub fn build_command(command: &str) -> Vec<u8> {
    let mut frame = command.as_bytes().to_vec();
    frame.push(EOC);
    frame
}

/// Build a byte-counted `BLENOTIFY`/`BLEWRITE` frame
pub fn build_transfer(keyword: &str, service: u8, characteristic: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() > 127 {
        bail!("Transfer length must be 1..=127, got {}", data.len());
    }
    let mut frame = format!("{} {:X} {:X} {:X} ", keyword, service, characteristic, data.len()).into_bytes();
    frame.extend_from_slice(data);
    frame.push(EOC);
    Ok(frame)
}

/// Parse one reply line (EOC stripped)
pub fn parse_reply(line: &[u8]) -> Result<Reply> {
    let line = String::from_utf8_lossy(line);
    if let Some(text) = line.strip_prefix("OK ") {
        Ok(Reply {
            status: Status::Ok,
            text: text.to_string(),
        })
    } else if let Some(text) = line.strip_prefix("FAIL ") {
        Ok(Reply {
            status: Status::Fail,
            text: text.to_string(),
        })
    } else {
        bail!("Unrecognised reply line: {:?}", line)
    }
}
