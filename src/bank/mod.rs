//! Register banks
//!
//! A bank is a fixed-size array of 16-bit holding registers shared between the Modbus slave
//! engine and the tasks producing the values (sensor sampling, EEPROM loader etc.). Every access
//! goes through [`RegisterBank::with_registers`], which holds the bank lock for the duration of
//! the closure only, so keep the closures short.
//!
//! ```rust
//! use rmodbusino::bank::{Bank, BankContext};
//!
//! static PERIPHERALS: Bank<1024> = Bank::new();
//!
//! PERIPHERALS.set_holdings_from_f32(66, 21.5).unwrap();
//! assert_eq!(PERIPHERALS.get_holdings_as_f32(66).unwrap(), 21.5);
//! ```
pub mod context;

pub use context::BankContext;

use crate::config::SlaveConfig;
use crate::consts::{
    REG_ADDRESS, REG_COUNT, REG_FUNCTION, REG_META_LEN, REG_REQ_COUNTER, REG_REQ_TIMESTAMP_HI,
    REG_REQ_TIMESTAMP_LO, REG_SLAVE_ID,
};
use spin::Mutex;

/// Shared register storage
pub trait RegisterBank: Sync {
    /// Number of 16-bit registers
    fn capacity(&self) -> usize;
    /// Run `f` with exclusive access to the registers
    fn with_registers(&self, f: &mut dyn FnMut(&mut [u16]));
}

/// Bank owning its registers
///
/// `new` is const, so banks may live in statics and be shared with producer tasks.
pub struct Bank<const N: usize> {
    regs: Mutex<[u16; N]>,
}

impl<const N: usize> Bank<N> {
    pub const fn new() -> Self {
        Self {
            regs: Mutex::new([0; N]),
        }
    }
}

impl<const N: usize> Default for Bank<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegisterBank for Bank<N> {
    #[inline]
    fn capacity(&self) -> usize {
        N
    }
    #[inline]
    fn with_registers(&self, f: &mut dyn FnMut(&mut [u16])) {
        let mut regs = self.regs.lock();
        f(&mut regs[..]);
    }
}

#[cfg(feature = "with_bincode")]
impl<const N: usize> Bank<N> {
    /// Encode the bank image into the buffer, returns the number of bytes written
    pub fn dump(&self, buf: &mut [u8]) -> Result<usize, crate::ErrorKind> {
        let regs = *self.regs.lock();
        bincode::encode_into_slice(regs, buf, bincode::config::standard())
            .map_err(|_| crate::ErrorKind::OOB)
    }

    /// Replace the bank image with one made by [`Bank::dump`]
    pub fn restore(&self, buf: &[u8]) -> Result<usize, crate::ErrorKind> {
        let (regs, len): ([u16; N], usize) =
            bincode::decode_from_slice(buf, bincode::config::standard())
                .map_err(|_| crate::ErrorKind::FrameBroken)?;
        *self.regs.lock() = regs;
        Ok(len)
    }
}

/// Bank over storage owned by someone else, e.g. the word view of the EEPROM image
pub struct BorrowedBank<'a> {
    regs: Mutex<&'a mut [u16]>,
    capacity: usize,
}

impl<'a> BorrowedBank<'a> {
    pub fn new(storage: &'a mut [u16]) -> Self {
        let capacity = storage.len();
        Self {
            regs: Mutex::new(storage),
            capacity,
        }
    }
}

impl RegisterBank for BorrowedBank<'_> {
    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }
    #[inline]
    fn with_registers(&self, f: &mut dyn FnMut(&mut [u16])) {
        let mut regs = self.regs.lock();
        f(&mut regs[..]);
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BankId {
    Peripherals,
    Eeprom,
    Lfs,
}

impl BankId {
    pub const ALL: [BankId; 3] = [BankId::Peripherals, BankId::Eeprom, BankId::Lfs];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            BankId::Peripherals => 0,
            BankId::Eeprom => 1,
            BankId::Lfs => 2,
        }
    }
}

/// Slave id to bank resolver
pub struct BankSet<'a> {
    banks: [&'a dyn RegisterBank; 3],
    slave_ids: [u8; 3],
}

impl<'a> BankSet<'a> {
    pub fn new(
        config: &SlaveConfig,
        peripherals: &'a dyn RegisterBank,
        eeprom: &'a dyn RegisterBank,
        lfs: &'a dyn RegisterBank,
    ) -> Self {
        Self {
            banks: [peripherals, eeprom, lfs],
            slave_ids: config.slave_ids(),
        }
    }

    #[inline]
    pub fn bank(&self, id: BankId) -> &'a dyn RegisterBank {
        self.banks[id.index()]
    }

    #[inline]
    pub fn slave_id(&self, id: BankId) -> u8 {
        self.slave_ids[id.index()]
    }

    /// Find the bank answering as `slave_id`
    ///
    /// Broadcast never resolves, callers decide what to do with broadcast writes.
    pub fn resolve(&self, slave_id: u8) -> Option<(BankId, &'a dyn RegisterBank)> {
        BankId::ALL
            .into_iter()
            .find(|id| self.slave_ids[id.index()] == slave_id)
            .map(|id| (id, self.bank(id)))
    }
}

/// Bookkeeping block stamped into registers 0-7 of a bank before each request is served
///
/// Register 3 (event flags) is not a part of it, it belongs to the producers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestMeta {
    /// monotonic clock, ms
    pub timestamp: u32,
    pub counter: u16,
    pub slave_id: u8,
    pub func: u8,
    pub reg: u16,
    pub count: u16,
}

impl RequestMeta {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn write_to(&self, regs: &mut [u16]) {
        if regs.len() < usize::from(REG_META_LEN) {
            return;
        }
        regs[usize::from(REG_REQ_TIMESTAMP_HI)] = (self.timestamp >> 16) as u16;
        regs[usize::from(REG_REQ_TIMESTAMP_LO)] = self.timestamp as u16;
        regs[usize::from(REG_REQ_COUNTER)] = self.counter;
        regs[usize::from(REG_SLAVE_ID)] = u16::from(self.slave_id);
        regs[usize::from(REG_FUNCTION)] = u16::from(self.func);
        regs[usize::from(REG_ADDRESS)] = self.reg;
        regs[usize::from(REG_COUNT)] = self.count;
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn read_from(regs: &[u16]) -> Option<Self> {
        if regs.len() < usize::from(REG_META_LEN) {
            return None;
        }
        Some(Self {
            timestamp: (u32::from(regs[usize::from(REG_REQ_TIMESTAMP_HI)]) << 16)
                | u32::from(regs[usize::from(REG_REQ_TIMESTAMP_LO)]),
            counter: regs[usize::from(REG_REQ_COUNTER)],
            slave_id: regs[usize::from(REG_SLAVE_ID)] as u8,
            func: regs[usize::from(REG_FUNCTION)] as u8,
            reg: regs[usize::from(REG_ADDRESS)],
            count: regs[usize::from(REG_COUNT)],
        })
    }
}
