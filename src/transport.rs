//! Serial line collaborators
//!
//! The engine never blocks: every wait on the line is a bounded number of polls separated by
//! [`Timer::delay_ms`], which on an RTOS yields to the scheduler.
use crate::consts::MODBUS_MAX_ADU_LEN;
use crate::ErrorKind;

/// Byte oriented serial duplex
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Is at least one byte ready to be read
    fn available(&mut self) -> bool;

    /// Next received byte, `None` if nothing is buffered
    fn read_byte(&mut self) -> Option<u8>;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Discard whatever is currently buffered
    ///
    /// Reads at most one ADU worth of bytes, so a saturated line can not hold the caller.
    fn flush_input(&mut self) {
        for _ in 0..MODBUS_MAX_ADU_LEN {
            if !self.available() || self.read_byte().is_none() {
                break;
            }
        }
    }
}

/// Monotonic clock and cooperative delay
pub trait Timer {
    /// Milliseconds since start, wrapping
    fn millis(&self) -> u32;
    fn delay_ms(&mut self, ms: u32);
}

/// Wait for the next byte for at most `polls` attempts
pub fn wait_byte<T: Transport, D: Timer>(
    transport: &mut T,
    timer: &mut D,
    polls: u8,
    interval_ms: u32,
) -> Result<u8, ErrorKind> {
    let mut attempt = 0;
    loop {
        if transport.available() {
            if let Some(b) = transport.read_byte() {
                return Ok(b);
            }
        }
        attempt += 1;
        if attempt >= polls {
            return Err(ErrorKind::Timeout);
        }
        timer.delay_ms(interval_ms);
    }
}

/// Best-effort drain of the garbage following a rejected frame
///
/// Returns when the line stays quiet for one interval or after `polls` drain rounds.
pub fn drain<T: Transport, D: Timer>(
    transport: &mut T,
    timer: &mut D,
    polls: u8,
    interval_ms: u32,
) {
    let mut attempt = 0;
    while transport.available() && attempt < polls {
        transport.flush_input();
        timer.delay_ms(interval_ms);
        attempt += 1;
    }
}

#[cfg(feature = "std")]
mod serial_port;

#[cfg(feature = "std")]
pub use serial_port::{SerialTransport, StdTimer};
