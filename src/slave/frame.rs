use crate::bank::{BankId, RegisterBank, RequestMeta};
use crate::config::SlaveConfig;
use crate::consts::{
    MODBUS_BROADCAST, MODBUS_CRC_LEN, MODBUS_ERROR_ILLEGAL_DATA_ADDRESS,
    MODBUS_ERROR_ILLEGAL_DATA_VALUE, MODBUS_ERROR_ILLEGAL_FUNCTION, MODBUS_GET_HOLDINGS,
    MODBUS_MAX_READ_COUNT, MODBUS_MAX_WRITE_COUNT, MODBUS_REQ_HEADER_LEN,
    MODBUS_SET_HOLDINGS_BULK, MODBUS_WRITE_DATA_START, REG_EVENT_FLAGS,
};
use crate::{append_crc, check_crc, ErrorKind, VectorTrait};

/// Modbus RTU request processor
///
/// ```rust
/// use rmodbusino::bank::{Bank, RegisterBank};
/// use rmodbusino::config::SlaveConfig;
/// use rmodbusino::slave::ModbusFrame;
///
/// let bank: Bank<64> = Bank::new();
/// let config = SlaveConfig::default();
/// // read 2 holdings of slave 1 starting from 8
/// let request = [0x01, 0x03, 0x00, 0x08, 0x00, 0x02, 0x45, 0xC9];
/// let mut response: heapless::Vec<u8, 256> = heapless::Vec::new();
/// let mut frame = ModbusFrame::new(&request, &mut response);
/// frame.parse(&config).unwrap();
/// if frame.processing_required && frame.check(bank.capacity(), 0) {
///     frame.stamp(&bank, 1, 0);
///     frame.process_read(&bank).unwrap();
/// }
/// if frame.response_required {
///     frame.finalize_response().unwrap();
/// }
/// assert_eq!(response.len(), 9);
/// ```
pub struct ModbusFrame<'a, V: VectorTrait<u8>> {
    buf: &'a [u8],
    pub response: &'a mut V,
    pub slave_id: u8,
    /// function requested
    pub func: u8,
    /// starting register, as requested
    pub reg: u16,
    /// registers to process
    pub count: u16,
    /// Modbus exception code, 0 if none
    pub error: u8,
    pub broadcast: bool,
    /// after parse: is processing required
    pub processing_required: bool,
    /// is response required
    pub response_required: bool,
    /// is request read-only
    pub readonly: bool,
}

/// Registers written by a request, EEPROM offset applied
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Changes {
    pub bank: BankId,
    pub reg: u16,
    pub count: u16,
}

impl<'a, V: VectorTrait<u8>> ModbusFrame<'a, V> {
    /// `buf` must hold exactly one ADU, CRC included
    pub fn new(buf: &'a [u8], response: &'a mut V) -> Self {
        response.clear();
        Self {
            buf,
            response,
            slave_id: 0,
            func: 0,
            reg: 0,
            count: 0,
            error: 0,
            broadcast: false,
            processing_required: false,
            response_required: false,
            readonly: true,
        }
    }

    /// Parse the request
    ///
    /// Errors are returned only for frames which can not be answered at all, Modbus exceptions
    /// are stored in `error` and sent by [`ModbusFrame::finalize_response`].
    pub fn parse(&mut self, config: &SlaveConfig) -> Result<(), ErrorKind> {
        if self.buf.len() < 2 + MODBUS_CRC_LEN {
            return Err(ErrorKind::FrameBroken);
        }
        if !check_crc(self.buf) {
            return Err(ErrorKind::FrameCRCError);
        }
        self.slave_id = self.buf[0];
        self.func = self.buf[1];
        if !config.accepts(self.slave_id) {
            return Ok(());
        }
        self.broadcast = self.slave_id == MODBUS_BROADCAST;
        self.response_required = !self.broadcast || config.reply_to_broadcast;
        match self.func {
            MODBUS_GET_HOLDINGS => {
                if self.buf.len() != MODBUS_REQ_HEADER_LEN + MODBUS_CRC_LEN {
                    return Err(ErrorKind::FrameBroken);
                }
                if self.broadcast {
                    // nobody to return the registers to
                    self.response_required = false;
                    return Ok(());
                }
            }
            MODBUS_SET_HOLDINGS_BULK => {
                if self.buf.len() < MODBUS_WRITE_DATA_START + MODBUS_CRC_LEN
                    || self.buf.len()
                        != MODBUS_WRITE_DATA_START
                            + usize::from(self.buf[MODBUS_REQ_HEADER_LEN])
                            + MODBUS_CRC_LEN
                {
                    return Err(ErrorKind::FrameBroken);
                }
                self.readonly = false;
            }
            _ => {
                self.error = MODBUS_ERROR_ILLEGAL_FUNCTION;
                return Ok(());
            }
        }
        self.reg = u16::from_be_bytes([self.buf[2], self.buf[3]]);
        self.count = u16::from_be_bytes([self.buf[4], self.buf[5]]);
        self.processing_required = true;
        Ok(())
    }

    /// Validate count and register range against a bank
    ///
    /// `offset` is added to the requested register before the range check (EEPROM writes).
    /// A count of 0, above 125 (reads) / 123 (writes), or a write byte count other than
    /// `2 * count` is an illegal data value. Sets `error` and returns false if the request must be answered with an exception.
    pub fn check(&mut self, capacity: usize, offset: u16) -> bool {
        let count_valid = if self.readonly {
            (1..=MODBUS_MAX_READ_COUNT).contains(&self.count)
        } else {
            (1..=MODBUS_MAX_WRITE_COUNT).contains(&self.count)
                && usize::from(self.buf[MODBUS_REQ_HEADER_LEN]) == usize::from(self.count) * 2
        };
        if !count_valid {
            self.error = MODBUS_ERROR_ILLEGAL_DATA_VALUE;
            return false;
        }
        if usize::from(self.reg) + usize::from(offset) + usize::from(self.count) > capacity {
            self.error = MODBUS_ERROR_ILLEGAL_DATA_ADDRESS;
            return false;
        }
        self.error = 0;
        true
    }

    /// Write the bookkeeping prefix of the bank
    pub fn stamp(&self, bank: &(impl RegisterBank + ?Sized), counter: u16, timestamp: u32) {
        let meta = RequestMeta {
            timestamp,
            counter,
            slave_id: self.slave_id,
            func: self.func,
            reg: self.reg,
            count: self.count,
        };
        bank.with_registers(&mut |regs| meta.write_to(regs));
    }

    /// Process read holdings
    ///
    /// The whole range is copied under one lock, so values spanning several registers (u32, f32)
    /// are never returned half-updated. The event flags register is cleared under the same lock.
    pub fn process_read(&mut self, bank: &(impl RegisterBank + ?Sized)) -> Result<(), ErrorKind> {
        // 2b slave and func
        self.response.extend(&self.buf[..2])?;
        #[allow(clippy::cast_possible_truncation)]
        // 1b data len, count <= 125
        self.response.push((self.count << 1) as u8)?;
        let start = usize::from(self.reg);
        let count = usize::from(self.count);
        let mut values = [0u16; MODBUS_MAX_READ_COUNT as usize];
        let dst = values.get_mut(..count).ok_or(ErrorKind::OOB)?;
        let mut copied = false;
        bank.with_registers(&mut |regs| {
            if let Some(src) = regs.get_mut(start..start + count) {
                dst.copy_from_slice(src);
                let flags = usize::from(REG_EVENT_FLAGS);
                if (start..start + count).contains(&flags) {
                    src[flags - start] = 0;
                }
                copied = true;
            }
        });
        if !copied {
            return Err(ErrorKind::OOBContext);
        }
        for value in &values[..count] {
            self.response.extend(&value.to_be_bytes())?;
        }
        Ok(())
    }

    /// Process write multiple holdings
    ///
    /// All registers are written under one lock, then the request header is echoed.
    pub fn process_write(
        &mut self,
        bank: &(impl RegisterBank + ?Sized),
        offset: u16,
    ) -> Result<(), ErrorKind> {
        let start = usize::from(self.reg) + usize::from(offset);
        let buf = self.buf;
        let data = buf
            .get(MODBUS_WRITE_DATA_START..MODBUS_WRITE_DATA_START + usize::from(self.count) * 2)
            .ok_or(ErrorKind::FrameBroken)?;
        let mut written = false;
        bank.with_registers(&mut |regs| {
            if let Some(dst) = regs.get_mut(start..start + data.len() / 2) {
                for (r, pair) in dst.iter_mut().zip(data.chunks_exact(2)) {
                    *r = u16::from_be_bytes([pair[0], pair[1]]);
                }
                written = true;
            }
        });
        if !written {
            return Err(ErrorKind::OOBContext);
        }
        self.echo_request()
    }

    /// 6b slave, func, reg, count
    pub fn echo_request(&mut self) -> Result<(), ErrorKind> {
        self.response.clear();
        self.response.extend(&self.buf[..MODBUS_REQ_HEADER_LEN])
    }

    /// Should be always called if response needs to be sent
    ///
    /// Replaces the response with the exception if one is set, adds CRC.
    pub fn finalize_response(&mut self) -> Result<(), ErrorKind> {
        if self.error > 0 {
            self.response.clear();
            self.response
                .extend(&[self.slave_id, self.func | 0x80, self.error])?;
        }
        append_crc(self.response)
    }

    /// Registers changed by the request, None for reads and rejected requests
    pub fn changes(&self, bank: BankId, offset: u16) -> Option<Changes> {
        if self.readonly || !self.processing_required || self.error > 0 {
            return None;
        }
        Some(Changes {
            bank,
            reg: self.reg.wrapping_add(offset),
            count: self.count,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bank::{Bank, BankContext};

    fn request(data: &[u8]) -> Vec<u8> {
        let mut frame = data.to_vec();
        append_crc(&mut frame).unwrap();
        frame
    }

    #[test]
    fn test_parse_read() {
        let buf = request(&[0x01, 0x03, 0x01, 0x02, 0x00, 0x7d]);
        let mut response: Vec<u8> = Vec::new();
        let mut frame = ModbusFrame::new(&buf, &mut response);
        frame.parse(&SlaveConfig::default()).unwrap();
        assert!(frame.processing_required);
        assert!(frame.response_required);
        assert!(frame.readonly);
        assert_eq!(frame.reg, 0x0102);
        assert_eq!(frame.count, 125);
        assert!(frame.check(1024, 0));
        frame.count = 126;
        assert!(!frame.check(1024, 0));
        assert_eq!(frame.error, MODBUS_ERROR_ILLEGAL_DATA_VALUE);
    }

    #[test]
    fn test_parse_broken() {
        let mut response: Vec<u8> = Vec::new();
        let buf = request(&[0x01, 0x03, 0x00]);
        let mut frame = ModbusFrame::new(&buf, &mut response);
        assert_eq!(
            frame.parse(&SlaveConfig::default()),
            Err(ErrorKind::FrameBroken)
        );
        let mut buf = request(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        buf[2] = 1;
        let mut frame = ModbusFrame::new(&buf, &mut response);
        assert_eq!(
            frame.parse(&SlaveConfig::default()),
            Err(ErrorKind::FrameCRCError)
        );
    }

    #[test]
    fn test_other_slave_is_ignored() {
        let buf = request(&[0x07, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let mut response: Vec<u8> = Vec::new();
        let mut frame = ModbusFrame::new(&buf, &mut response);
        frame.parse(&SlaveConfig::default()).unwrap();
        assert!(!frame.processing_required);
        assert!(!frame.response_required);
    }

    #[test]
    fn test_write_byte_count_mismatch() {
        let buf = request(&[0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x01]);
        let mut response: Vec<u8> = Vec::new();
        let mut frame = ModbusFrame::new(&buf, &mut response);
        frame.parse(&SlaveConfig::default()).unwrap();
        assert!(!frame.check(64, 0));
        assert_eq!(frame.error, MODBUS_ERROR_ILLEGAL_DATA_VALUE);
        frame.finalize_response().unwrap();
        assert_eq!(&response[..3], &[0x01, 0x90, 0x03]);
    }

    #[test]
    fn test_write_with_offset() {
        let bank: Bank<32> = Bank::new();
        let buf = request(&[0x02, 0x10, 0x00, 0x01, 0x00, 0x01, 0x02, 0xab, 0xcd]);
        let mut response: Vec<u8> = Vec::new();
        let mut frame = ModbusFrame::new(&buf, &mut response);
        frame.parse(&SlaveConfig::default()).unwrap();
        assert!(frame.check(bank.capacity(), 10));
        frame.process_write(&bank, 10).unwrap();
        assert_eq!(
            frame.changes(BankId::Eeprom, 10),
            Some(Changes {
                bank: BankId::Eeprom,
                reg: 11,
                count: 1
            })
        );
        frame.finalize_response().unwrap();
        assert_eq!(bank.get_holding(11).unwrap(), 0xabcd);
        assert_eq!(bank.get_holding(1).unwrap(), 0);
        assert_eq!(&response[..6], &buf[..6]);
        // 21 + 10 + 2 > 32
        let buf = request(&[0x02, 0x10, 0x00, 0x15, 0x00, 0x02, 0x04, 0, 1, 0, 2]);
        let mut frame = ModbusFrame::new(&buf, &mut response);
        frame.parse(&SlaveConfig::default()).unwrap();
        assert!(!frame.check(bank.capacity(), 10));
        assert_eq!(frame.error, MODBUS_ERROR_ILLEGAL_DATA_ADDRESS);
        assert!(frame.changes(BankId::Eeprom, 10).is_none());
    }
}
