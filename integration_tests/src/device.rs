//! Device communication client.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{build_command, parse_reply, Reply, EOC, VERSION_PREFIX};

/// Find ports whose device answers VERSION like the firmware does.
pub fn find_command_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    let mut command_ports = Vec::new();

    for port_info in ports {
        // USB-UART bridges show up as ttyUSB, native USB as ttyACM
        let name = &port_info.port_name;
        if !name.contains("ttyUSB") && !name.contains("ttyACM") {
            continue;
        }

        if let Ok(mut client) = DeviceClient::new(name, 115200) {
            client.set_timeout(Duration::from_millis(500));
            if let Ok(reply) = client.send("VERSION") {
                if reply.is_ok() && reply.text.starts_with(VERSION_PREFIX) {
                    command_ports.push(name.clone());
                }
            }
        }
    }

    Ok(command_ports)
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }
    match find_command_ports()?.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No command port found - ensure the device UART is connected"),
    }
}

/// Client for the device's AT command port.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
        })
    }

    /// Set the reply timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Clear any pending data in the serial buffer.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    /// Read and discard anything still arriving.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send a text command and wait for its reply.
    pub fn send(&mut self, command: &str) -> Result<Reply> {
        self.send_frame(&build_command(command))
    }

    /// Send raw frame bytes (EOC included) and wait for the reply.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<Reply> {
        self.port.write_all(frame)?;
        self.port.flush()?;

        let line = self.read_line()?;
        parse_reply(&line)
    }

    /// Send raw bytes without waiting for anything.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read bytes until EOC.
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut buf = [0u8; 1];
        let start = Instant::now();

        while start.elapsed() < self.timeout {
            match self.port.read(&mut buf) {
                Ok(1) => {
                    if buf[0] == EOC {
                        return Ok(data);
                    }
                    data.push(buf[0]);
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        anyhow::bail!(
            "Timeout waiting for reply, got {} bytes: {:?}",
            data.len(),
            String::from_utf8_lossy(&data)
        );
    }
}
