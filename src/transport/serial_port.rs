use super::{Timer, Transport};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// [`Transport`] over a host serial port
///
/// The port has no "bytes available" query, so a 1-byte read with a short timeout is used as
/// a peek and the byte is kept until [`Transport::read_byte`] takes it.
pub struct SerialTransport<P: serial::SerialPort> {
    port: P,
    pending: Option<u8>,
}

impl<P: serial::SerialPort> SerialTransport<P> {
    pub fn new(mut port: P) -> io::Result<Self> {
        port.set_timeout(Duration::from_millis(1))
            .map_err(io::Error::from)?;
        Ok(Self {
            port,
            pending: None,
        })
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

impl<P: serial::SerialPort> Transport for SerialTransport<P> {
    type Error = io::Error;

    fn available(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => {
                self.pending = Some(buf[0]);
                true
            }
            _ => false,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.available() {
            self.pending.take()
        } else {
            None
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), io::Error> {
        self.port.write_all(data)?;
        self.port.flush()
    }
}

/// [`Timer`] over `std::time`
pub struct StdTimer {
    started: Instant,
}

impl Default for StdTimer {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Timer for StdTimer {
    #[allow(clippy::cast_possible_truncation)]
    fn millis(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
