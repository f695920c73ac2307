// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{self, Read as _, Write as _},
    thread,
    time::{Duration, Instant},
};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::Transport;
use crate::{
    codec::{
        MAX_LINE_LEN,
        ascii::{decode_line, encode_line},
    },
    error::*,
};

pub const BAUD_RATE: u32 = 115_200;

/// Deadline for a complete reply line.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Deadline for writing a command line.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

// Some USB serial drivers drop the first bytes written right after opening.
#[cfg(target_os = "macos")]
const SETTLE_TIME: Option<Duration> = Some(Duration::from_secs(2));
#[cfg(not(target_os = "macos"))]
const SETTLE_TIME: Option<Duration> = None;

/// Names of the serial ports found on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// A serial line with `115200` baud, 8 data bits, no parity and one stop bit.
///
/// The port may be closed: opening failures are logged and leave the
/// transport closed, every exchange then fails with [`Error::PortNotOpen`].
/// Any I/O fault other than a timeout closes the port.
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    rx: Vec<u8>,
}

impl SerialTransport {
    /// A transport without an open port.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            name: String::new(),
            port: None,
            rx: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Try to open `port_name`.
    #[must_use]
    pub fn open(port_name: &str) -> Self {
        let mut transport = Self::closed();
        transport.reopen(port_name);
        transport
    }

    /// Close the current port and open `port_name` instead.
    ///
    /// Returns whether the new port is open.
    pub fn reopen(&mut self, port_name: &str) -> bool {
        self.close();
        self.name = port_name.to_owned();
        match open_port(port_name) {
            Ok(port) => {
                info!("Opened serial port '{port_name}'");
                self.port = Some(port);
                true
            }
            Err(err) => {
                error!("Failed to open serial port '{port_name}': {err}");
                false
            }
        }
    }

    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial port '{}'", self.name);
        }
        self.rx.clear();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Name of the most recently requested port.
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.name
    }

    fn fault(&mut self, err: Error) -> Error {
        error!("Serial port '{}' failed: {err}", self.name);
        self.close();
        err
    }

    // Split off the first complete line buffered so far.
    fn take_line(&mut self) -> Option<String> {
        let end = self.rx.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.rx.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::closed()
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(Error::PortNotOpen);
        };
        let line = encode_line(payload);
        trace!("WRITE: {}", line.trim_end());
        let res = port
            .set_timeout(WRITE_TIMEOUT)
            .map_err(Error::from)
            .and_then(|()| {
                port.write_all(line.as_bytes())?;
                port.flush()?;
                Ok(())
            });
        match res {
            Ok(()) => Ok(()),
            Err(Error::Io(err)) if err.kind() == io::ErrorKind::TimedOut => Err(Error::Timeout),
            Err(err) => Err(self.fault(err)),
        }
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        if self.port.is_none() {
            return Err(Error::PortNotOpen);
        }
        let deadline = Instant::now() + READ_TIMEOUT;
        let mut chunk = [0; 64];
        loop {
            if let Some(line) = self.take_line() {
                trace!("READ: {}", line.trim_end());
                return decode_line(&line);
            }
            if self.rx.len() > MAX_LINE_LEN {
                warn!("Discarding {} bytes without line terminator", self.rx.len());
                self.rx.clear();
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            let Some(port) = self.port.as_mut() else {
                return Err(Error::PortNotOpen);
            };
            let res = port
                .set_timeout(remaining)
                .map_err(Error::from)
                .and_then(|()| Ok(port.read(&mut chunk)?));
            match res {
                Ok(cnt) => self.rx.extend_from_slice(&chunk[..cnt]),
                Err(Error::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(Error::Io(err))
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Err(Error::Timeout);
                }
                Err(err) => return Err(self.fault(err)),
            }
        }
    }
}

fn open_port(port_name: &str) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()?;
    port.clear(ClearBuffer::All)?;
    if let Some(settle) = SETTLE_TIME {
        debug!("Waiting {settle:?} for '{port_name}' to settle");
        thread::sleep(settle);
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_transport_fails_fast() {
        let mut transport = SerialTransport::closed();
        assert!(!transport.is_open());
        assert!(matches!(transport.send(&[1, 2, 3]), Err(Error::PortNotOpen)));
        assert!(matches!(transport.receive(), Err(Error::PortNotOpen)));
    }

    #[test]
    fn open_missing_port() {
        let transport = SerialTransport::open("/dev/does-not-exist-asciibus");
        assert!(!transport.is_open());
        assert_eq!(transport.port_name(), "/dev/does-not-exist-asciibus");
    }

    #[test]
    fn split_buffered_lines() {
        let mut transport = SerialTransport::closed();
        transport.rx.extend_from_slice(b":0102\r\n:03");
        assert_eq!(transport.take_line().as_deref(), Some(":0102\r\n"));
        assert_eq!(transport.take_line(), None);
        assert_eq!(transport.rx, b":03");
    }

    #[cfg(unix)]
    mod pty {
        use std::io::{Read, Write};

        use serialport::TTYPort;

        use super::super::*;

        // The transport owns one end of a pseudo terminal, the test plays
        // the slave on the other end.
        fn connected() -> (SerialTransport, TTYPort) {
            let (local, mut peer) = TTYPort::pair().unwrap();
            peer.set_timeout(Duration::from_millis(500)).unwrap();
            let transport = SerialTransport {
                name: "pty".into(),
                port: Some(Box::new(local)),
                rx: Vec::new(),
            };
            (transport, peer)
        }

        #[test]
        fn send_encoded_line() {
            let (mut transport, mut peer) = connected();
            transport
                .send(&[0x01, 0x04, 0x01, 0x00, 0x00, 0x01, 0x07])
                .unwrap();
            let mut line = [0; 17];
            peer.read_exact(&mut line).unwrap();
            assert_eq!(&line, b":01040100000107\r\n");
        }

        #[test]
        fn receive_line() {
            let (mut transport, mut peer) = connected();
            peer.write_all(b":010402000007\r\n").unwrap();
            assert_eq!(transport.receive().unwrap(), vec![1, 4, 2, 0, 0, 7]);
            assert!(matches!(transport.receive(), Err(Error::Timeout)));
            assert!(transport.is_open());
        }

        #[test]
        fn receive_lines_across_chunks() {
            let (mut transport, mut peer) = connected();
            peer.write_all(b":0102\r\n:03").unwrap();
            assert_eq!(transport.receive().unwrap(), vec![1, 2]);

            let writer = thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                peer.write_all(b"04\r\n").unwrap();
                peer
            });
            assert_eq!(transport.receive().unwrap(), vec![3, 4]);
            writer.join().unwrap();
        }

        #[test]
        fn receive_timeout() {
            let (mut transport, _peer) = connected();
            let started = Instant::now();
            assert!(matches!(transport.receive(), Err(Error::Timeout)));
            assert!(started.elapsed() >= READ_TIMEOUT - Duration::from_millis(10));
            assert!(started.elapsed() < READ_TIMEOUT * 5);
            assert!(transport.is_open());
        }

        #[test]
        fn close_on_hangup() {
            let (mut transport, peer) = connected();
            drop(peer);
            let res = transport
                .send(&[0x01])
                .and_then(|()| transport.receive());
            assert!(
                matches!(res, Err(ref err) if !matches!(err, Error::Timeout)),
                "{res:?}"
            );
            assert!(!transport.is_open());
            assert!(matches!(transport.send(&[0x01]), Err(Error::PortNotOpen)));
            assert!(matches!(transport.receive(), Err(Error::PortNotOpen)));
        }
    }
}
