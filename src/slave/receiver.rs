use crate::config::SlaveConfig;
use crate::consts::{
    MODBUS_BROADCAST, MODBUS_CRC_LEN, MODBUS_GET_HOLDINGS, MODBUS_MAX_ADU_LEN,
    MODBUS_SET_HOLDINGS_BULK,
};
use crate::{check_crc, ErrorKind, ModbusFrameBuf};

/// Receiver progress
///
/// RTU frames carry no length, it is discovered chunk by chunk: slave id + function first, then
/// the fixed request header, then data (writes) and CRC.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    AwaitingFunction,
    AwaitingMeta,
    AwaitingData,
}

/// Result of feeding a byte
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    Pending,
    /// a frame of the given length with a valid CRC is in the buffer
    Complete(usize),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rejection {
    pub error: ErrorKind,
    pub slave_id: u8,
    pub func: u8,
    /// the rest of the frame is still on the line and must be drained
    pub flush: bool,
}

pub struct FrameReceiver {
    buf: ModbusFrameBuf,
    len: usize,
    remaining: usize,
    state: RxState,
    slave_ids: [u8; 3],
}

impl FrameReceiver {
    pub fn new(config: &SlaveConfig) -> Self {
        Self {
            buf: [0; MODBUS_MAX_ADU_LEN],
            len: 0,
            remaining: 2,
            state: RxState::AwaitingFunction,
            slave_ids: config.slave_ids(),
        }
    }

    /// Forget the frame in progress
    pub fn reset(&mut self) {
        self.len = 0;
        self.remaining = 2;
        self.state = RxState::AwaitingFunction;
    }

    #[inline]
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Bytes received so far for the frame in progress
    #[inline]
    pub fn received(&self) -> usize {
        self.len
    }

    /// Frame reported by [`Feed::Complete`]
    ///
    /// Valid until the next byte is fed.
    #[inline]
    pub fn frame(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(MODBUS_MAX_ADU_LEN)]
    }

    #[inline]
    fn accepts(&self, slave_id: u8) -> bool {
        slave_id == MODBUS_BROADCAST || self.slave_ids.contains(&slave_id)
    }

    fn reject(&mut self, error: ErrorKind, flush: bool) -> Feed {
        let rejection = Rejection {
            error,
            slave_id: self.buf[0],
            func: self.buf[1],
            flush,
        };
        self.reset();
        Feed::Rejected(rejection)
    }

    /// Advance the state machine by one byte
    pub fn feed(&mut self, byte: u8) -> Feed {
        if self.len >= MODBUS_MAX_ADU_LEN {
            return self.reject(ErrorKind::FrameTooLong, true);
        }
        self.buf[self.len] = byte;
        self.len += 1;
        self.remaining -= 1;
        if self.remaining > 0 {
            return Feed::Pending;
        }
        match self.state {
            RxState::AwaitingFunction => {
                if !self.accepts(self.buf[0]) {
                    return self.reject(ErrorKind::NotForUs, true);
                }
                self.remaining = match self.buf[1] {
                    // reg, count
                    MODBUS_GET_HOLDINGS => 4,
                    // reg, count, bytes
                    MODBUS_SET_HOLDINGS_BULK => 5,
                    _ => return self.reject(ErrorKind::IllegalFunction, true),
                };
                self.state = RxState::AwaitingMeta;
                Feed::Pending
            }
            RxState::AwaitingMeta => {
                let mut remaining = MODBUS_CRC_LEN;
                if self.buf[1] == MODBUS_SET_HOLDINGS_BULK {
                    remaining += usize::from(self.buf[6]);
                }
                if self.len + remaining > MODBUS_MAX_ADU_LEN {
                    return self.reject(ErrorKind::FrameTooLong, true);
                }
                self.remaining = remaining;
                self.state = RxState::AwaitingData;
                Feed::Pending
            }
            RxState::AwaitingData => {
                let len = self.len;
                if check_crc(&self.buf[..len]) {
                    self.reset();
                    Feed::Complete(len)
                } else {
                    self.reject(ErrorKind::FrameCRCError, false)
                }
            }
        }
    }
}
