use crate::consts::{
    MODBUS_ERROR_ILLEGAL_DATA_ADDRESS, MODBUS_ERROR_ILLEGAL_DATA_VALUE,
    MODBUS_ERROR_ILLEGAL_FUNCTION, MODBUS_INFORMATIVE_RX_TIMEOUT,
};

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// response buffer overflow
    OOB,
    /// register access outside of a bank
    OOBContext,
    /// frame too short to be decoded
    FrameBroken,
    FrameTooLong,
    FrameCRCError,
    /// no byte within the inter-byte window
    Timeout,
    /// the frame is for some other slave
    NotForUs,
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    /// the transport refused the reply
    CommunicationError,
    InvalidConfig,
    UnknownError,
}

impl ErrorKind {
    pub fn from_modbus_error(code: u8) -> Self {
        match code {
            MODBUS_ERROR_ILLEGAL_FUNCTION => ErrorKind::IllegalFunction,
            MODBUS_ERROR_ILLEGAL_DATA_ADDRESS => ErrorKind::IllegalDataAddress,
            MODBUS_ERROR_ILLEGAL_DATA_VALUE => ErrorKind::IllegalDataValue,
            _ => ErrorKind::UnknownError,
        }
    }

    /// Modbus exception code to reply with, if the error is reported to the master
    pub fn exception_code(self) -> Option<u8> {
        match self {
            ErrorKind::IllegalFunction => Some(MODBUS_ERROR_ILLEGAL_FUNCTION),
            ErrorKind::IllegalDataAddress => Some(MODBUS_ERROR_ILLEGAL_DATA_ADDRESS),
            ErrorKind::IllegalDataValue | ErrorKind::FrameTooLong => {
                Some(MODBUS_ERROR_ILLEGAL_DATA_VALUE)
            }
            _ => None,
        }
    }

    /// Coarse loop status
    ///
    /// 0 for filtered frames, `-1 - code` otherwise, where code is the Modbus exception or
    /// informative code. Errors without a dedicated code return -1.
    pub fn status_code(self) -> i16 {
        match self {
            ErrorKind::NotForUs => 0,
            ErrorKind::Timeout => -1 - i16::from(MODBUS_INFORMATIVE_RX_TIMEOUT),
            other => match other.exception_code() {
                Some(code) => -1 - i16::from(code),
                None => -1,
            },
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &str = match self {
            ErrorKind::OOB => "OUT OF BUFFER",
            ErrorKind::OOBContext => "OUT OF BANK",
            ErrorKind::FrameBroken => "FRAME BROKEN",
            ErrorKind::FrameTooLong => "FRAME TOO LONG",
            ErrorKind::FrameCRCError => "FRAME CRC ERROR",
            ErrorKind::Timeout => "RX TIMEOUT",
            ErrorKind::NotForUs => "NOT FOR US",
            ErrorKind::IllegalFunction => "MODBUS ERROR CODE 01 - ILLEGAL FUNCTION",
            ErrorKind::IllegalDataAddress => "MODBUS ERROR CODE 02 - ILLEGAL DATA ADDRESS",
            ErrorKind::IllegalDataValue => "MODBUS ERROR CODE 03 - ILLEGAL DATA VALUE",
            ErrorKind::CommunicationError => "TRANSPORT WRITE ERROR",
            ErrorKind::InvalidConfig => "INVALID SLAVE CONFIG",
            ErrorKind::UnknownError => "UNKNOWN MODBUS ERROR",
        };
        write!(f, "{}", msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}
