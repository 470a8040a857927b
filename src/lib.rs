#![ doc = include_str!( concat!( env!( "CARGO_MANIFEST_DIR" ), "/", "README.md" ) ) ]
#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[cfg(any(feature = "alloc", feature = "std", test))]
extern crate alloc;

#[macro_use]
mod macros;

pub mod bank;
pub mod client;
pub mod config;
pub mod consts;
pub mod slave;
pub mod transport;

mod vector;
pub use vector::VectorTrait;

mod error;
pub use error::ErrorKind;


/// Standard Modbus RTU frame buffer
///
/// As max length of a Modbus RTU ADU is 256 bytes, the frame buffer is a fixed [u8; 256] array.
pub type ModbusFrameBuf = [u8; consts::MODBUS_MAX_ADU_LEN];

/// Modbus CRC-16 (init 0xFFFF, reflected polynomial 0xA001)
///
/// Returns the raw accumulator. On the wire the low byte goes first, see [`append_crc`].
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for b in data {
        crc ^= u16::from(*b);
        for _ in 0..8 {
            if (crc & 0x0001) == 0 {
                crc >>= 1;
            } else {
                crc >>= 1;
                crc ^= 0xA001;
            }
        }
    }
    crc
}

/// Verify the two trailing CRC bytes of a complete RTU frame
///
/// Frames shorter than 2 bytes are never valid.
pub fn check_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (data, tail) = frame.split_at(frame.len() - 2);
    crc16(data) == u16::from_le_bytes([tail[0], tail[1]])
}

/// Append CRC to a frame being built
pub fn append_crc<V: VectorTrait<u8>>(frame: &mut V) -> Result<(), ErrorKind> {
    let crc = crc16(frame.as_slice());
    frame.extend(&crc.to_le_bytes())
}
