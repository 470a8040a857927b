//! Modbus RTU slave engine
//!
//! ```rust,no_run
//! use rmodbusino::bank::{Bank, BorrowedBank};
//! use rmodbusino::config::SlaveConfig;
//! use rmodbusino::consts::{EEPROM_WORDS, LFS_REGISTER_SIZE, PERIPHERALS_REGISTER_SIZE};
//! use rmodbusino::slave::ModbusSlave;
//! # use rmodbusino::transport::{Timer, Transport};
//! # struct Uart;
//! # impl Transport for Uart {
//! #     type Error = ();
//! #     fn available(&mut self) -> bool { false }
//! #     fn read_byte(&mut self) -> Option<u8> { None }
//! #     fn write(&mut self, _data: &[u8]) -> Result<(), ()> { Ok(()) }
//! # }
//! # struct Ticks;
//! # impl Timer for Ticks {
//! #     fn millis(&self) -> u32 { 0 }
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//!
//! static PERIPHERALS: Bank<PERIPHERALS_REGISTER_SIZE> = Bank::new();
//! static LFS: Bank<LFS_REGISTER_SIZE> = Bank::new();
//!
//! # fn code(eeprom_words: &'static mut [u16; EEPROM_WORDS]) {
//! let eeprom = BorrowedBank::new(eeprom_words);
//! let mut slave = ModbusSlave::new(
//!     SlaveConfig::default(),
//!     &PERIPHERALS,
//!     &eeprom,
//!     &LFS,
//!     Uart,
//!     Ticks,
//! )
//! .unwrap();
//! loop {
//!     // slave id served, 0 if idle, negative on errors
//!     let _status = slave.poll();
//! }
//! # }
//! ```
mod frame;
mod receiver;

pub use frame::{Changes, ModbusFrame};
pub use receiver::{Feed, FrameReceiver, Rejection, RxState};

use crate::bank::{BankId, BankSet, RegisterBank};
use crate::config::SlaveConfig;
use crate::consts::{MODBUS_BROADCAST, MODBUS_MAX_ADU_LEN};
use crate::transport::{drain, wait_byte, Timer, Transport};
use crate::{append_crc, ErrorKind, VectorTrait};

/// Response buffer
pub type ResponseBuf = heapless::Vec<u8, MODBUS_MAX_ADU_LEN>;

/// A request served by the engine
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Served {
    pub slave_id: u8,
    pub func: u8,
    /// registers written, one entry per bank (broadcast writes may touch all of them)
    pub changes: heapless::Vec<Changes, 3>,
}

pub struct ModbusSlave<'a, T: Transport, D: Timer> {
    config: SlaveConfig,
    banks: BankSet<'a>,
    transport: T,
    timer: D,
    receiver: FrameReceiver,
    counters: [u16; 3],
}

impl<'a, T: Transport, D: Timer> ModbusSlave<'a, T, D> {
    pub fn new(
        config: SlaveConfig,
        peripherals: &'a dyn RegisterBank,
        eeprom: &'a dyn RegisterBank,
        lfs: &'a dyn RegisterBank,
        transport: T,
        timer: D,
    ) -> Result<Self, ErrorKind> {
        config.validate()?;
        Ok(Self {
            banks: BankSet::new(&config, peripherals, eeprom, lfs),
            receiver: FrameReceiver::new(&config),
            config,
            transport,
            timer,
            counters: [0; 3],
        })
    }

    #[inline]
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    #[inline]
    pub fn banks(&self) -> &BankSet<'a> {
        &self.banks
    }

    /// Requests seen by the bank, including rejected ones
    #[inline]
    pub fn request_counter(&self, bank: BankId) -> u16 {
        self.counters[bank.index()]
    }

    #[inline]
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (T, D) {
        (self.transport, self.timer)
    }

    /// One loop cycle, coarse status
    ///
    /// Returns the slave id served, 0 if there was nothing to do or the frame was for someone
    /// else, `-1 - code` for errors (see [`ErrorKind::status_code`]).
    pub fn poll(&mut self) -> i16 {
        match self.poll_request() {
            Ok(Some(served)) => i16::from(served.slave_id),
            Ok(None) => 0,
            Err(e) => e.status_code(),
        }
    }

    /// One loop cycle: receive a frame if the line has data, process it and reply
    ///
    /// Exception replies are already sent when the corresponding error is returned.
    pub fn poll_request(&mut self) -> Result<Option<Served>, ErrorKind> {
        if !self.transport.available() {
            return Ok(None);
        }
        let len = match self.receive() {
            Ok(len) => len,
            Err(ErrorKind::NotForUs) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut buf = [0u8; MODBUS_MAX_ADU_LEN];
        buf[..len].copy_from_slice(self.receiver.frame(len));
        let mut response = ResponseBuf::new();
        let result = self.process(&buf[..len], &mut response);
        if !response.is_empty() {
            self.send(&response)?;
        }
        result
    }

    /// Receive one frame, returns its length
    ///
    /// Rejected frames are drained and answered with an exception when required.
    pub fn receive(&mut self) -> Result<usize, ErrorKind> {
        self.receiver.reset();
        loop {
            let byte = match wait_byte(
                &mut self.transport,
                &mut self.timer,
                self.config.byte_timeout_polls,
                self.config.byte_poll_interval_ms,
            ) {
                Ok(b) => b,
                Err(e) => {
                    trace!("rx timeout after {} bytes", self.receiver.received());
                    self.receiver.reset();
                    return Err(e);
                }
            };
            match self.receiver.feed(byte) {
                Feed::Pending => {}
                Feed::Complete(len) => return Ok(len),
                Feed::Rejected(rejection) => {
                    self.reject(rejection)?;
                    return Err(rejection.error);
                }
            }
        }
    }

    fn reject(&mut self, rejection: Rejection) -> Result<(), ErrorKind> {
        if rejection.flush {
            drain(
                &mut self.transport,
                &mut self.timer,
                self.config.flush_polls,
                self.config.flush_interval_ms,
            );
        }
        if rejection.error == ErrorKind::NotForUs {
            trace!("frame for slave {} ignored", rejection.slave_id);
            return Ok(());
        }
        warn!(
            "frame rejected, slave {} func {}: {}",
            rejection.slave_id, rejection.func, rejection.error
        );
        if let Some(code) = rejection.error.exception_code() {
            if self.reply_allowed(rejection.slave_id) {
                let mut response: heapless::Vec<u8, 5> = heapless::Vec::new();
                response
                    .extend_from_slice(&[rejection.slave_id, rejection.func | 0x80, code])
                    .map_err(|_| ErrorKind::OOB)?;
                append_crc(&mut response)?;
                self.send(&response)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn reply_allowed(&self, slave_id: u8) -> bool {
        self.config.is_own(slave_id)
            || (slave_id == MODBUS_BROADCAST && self.config.reply_to_broadcast)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        self.transport.write(data).map_err(|_| {
            warn!("reply of {} bytes not sent", data.len());
            ErrorKind::CommunicationError
        })
    }

    /// Process a complete frame and build the reply in `response`
    ///
    /// The response is left empty when no reply is due. An error returned along with a
    /// non-empty response means the response is a Modbus exception.
    pub fn process<V: VectorTrait<u8>>(
        &mut self,
        buf: &[u8],
        response: &mut V,
    ) -> Result<Option<Served>, ErrorKind> {
        let mut frame = ModbusFrame::new(buf, response);
        frame.parse(&self.config)?;
        if !frame.processing_required {
            if frame.error > 0 && frame.response_required {
                frame.finalize_response()?;
            }
            return if frame.error > 0 {
                Err(ErrorKind::from_modbus_error(frame.error))
            } else {
                Ok(None)
            };
        }
        let mut served = Served {
            slave_id: frame.slave_id,
            func: frame.func,
            changes: heapless::Vec::new(),
        };
        let now = self.timer.millis();
        if frame.broadcast {
            // writes only, applied to every bank accepting the range
            for id in BankId::ALL {
                if self.serve(&mut frame, id, now)? {
                    if let Some(changes) = frame.changes(id, self.offset(id, &frame)) {
                        served.changes.push(changes).map_err(|_| ErrorKind::OOB)?;
                    }
                }
            }
            frame.error = 0;
            if frame.response_required {
                frame.echo_request()?;
                frame.finalize_response()?;
            } else {
                frame.response.clear();
            }
        } else {
            let Some((id, _)) = self.banks.resolve(frame.slave_id) else {
                return Ok(None);
            };
            let served_ok = self.serve(&mut frame, id, now)?;
            if served_ok {
                if let Some(changes) = frame.changes(id, self.offset(id, &frame)) {
                    served.changes.push(changes).map_err(|_| ErrorKind::OOB)?;
                }
            }
            frame.finalize_response()?;
            if !served_ok {
                let err = ErrorKind::from_modbus_error(frame.error);
                warn!("slave {} exception: {}", frame.slave_id, err);
                return Err(err);
            }
        }
        debug!(
            "slave {} func {} served, reg {} count {}",
            frame.slave_id, frame.func, frame.reg, frame.count
        );
        Ok(Some(served))
    }

    #[inline]
    fn offset<V: VectorTrait<u8>>(&self, id: BankId, frame: &ModbusFrame<'_, V>) -> u16 {
        if id == BankId::Eeprom && !frame.readonly {
            self.config.eeprom_data_start
        } else {
            0
        }
    }

    /// Count, check, stamp and access one bank. Returns false if the request was rejected with
    /// an exception.
    fn serve<V: VectorTrait<u8>>(
        &mut self,
        frame: &mut ModbusFrame<'_, V>,
        id: BankId,
        now: u32,
    ) -> Result<bool, ErrorKind> {
        let bank = self.banks.bank(id);
        let counter = self.counters[id.index()].wrapping_add(1);
        self.counters[id.index()] = counter;
        let offset = self.offset(id, frame);
        if !frame.check(bank.capacity(), offset) {
            return Ok(false);
        }
        frame.stamp(bank, counter, now);
        if frame.readonly {
            frame.process_read(bank)?;
        } else {
            frame.process_write(bank, offset)?;
        }
        Ok(true)
    }
}
