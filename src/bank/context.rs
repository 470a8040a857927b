use super::{RegisterBank, RequestMeta};
use crate::consts::REG_EVENT_FLAGS;
use crate::{ErrorKind, VectorTrait};
use ieee754::Ieee754;

/// Typed register access for producers and the host application
///
/// Implemented for every [`RegisterBank`]. Each method is a single critical section, and the
/// slave copies a whole read request under one lock as well, so multi register values (u32, f32)
/// read by the master in one request are never half-written.
pub trait BankContext: RegisterBank {
    /// Get a single holding
    fn get_holding(&self, reg: u16) -> Result<u16, ErrorKind> {
        let mut result = Err(ErrorKind::OOBContext);
        self.with_registers(&mut |regs| {
            if let Some(v) = regs.get(usize::from(reg)) {
                result = Ok(*v);
            }
        });
        result
    }

    /// Set a single holding
    fn set_holding(&self, reg: u16, value: u16) -> Result<(), ErrorKind> {
        let mut result = Err(ErrorKind::OOBContext);
        self.with_registers(&mut |regs| {
            if let Some(v) = regs.get_mut(usize::from(reg)) {
                *v = value;
                result = Ok(());
            }
        });
        result
    }

    /// Bulk get holdings
    ///
    /// Note: Vec is always appended
    fn get_holdings_bulk<V: VectorTrait<u16>>(
        &self,
        reg: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        let mut res = Err(ErrorKind::OOBContext);
        let start = usize::from(reg);
        self.with_registers(&mut |regs| {
            if let Some(values) = regs.get(start..start + usize::from(count)) {
                res = result.extend(values);
            }
        });
        res
    }

    /// Bulk set holdings, nothing is written if the range does not fit
    fn set_holdings_bulk(&self, reg: u16, values: &[u16]) -> Result<(), ErrorKind> {
        let mut result = Err(ErrorKind::OOBContext);
        let start = usize::from(reg);
        self.with_registers(&mut |regs| {
            if let Some(dst) = regs.get_mut(start..start + values.len()) {
                dst.copy_from_slice(values);
                result = Ok(());
            }
        });
        result
    }

    /// Get two holdings as u32
    ///
    /// Returns 32-bit value (big-endian)
    fn get_holdings_as_u32(&self, reg: u16) -> Result<u32, ErrorKind> {
        let mut result = Err(ErrorKind::OOBContext);
        let start = usize::from(reg);
        self.with_registers(&mut |regs| {
            if let Some(pair) = regs.get(start..start + 2) {
                result = Ok((u32::from(pair[0]) << 16) + u32::from(pair[1]));
            }
        });
        result
    }

    /// Set two holdings from u32
    ///
    /// Uses 32-bit value to set two registers (big-endian)
    #[allow(clippy::cast_possible_truncation)]
    fn set_holdings_from_u32(&self, reg: u16, value: u32) -> Result<(), ErrorKind> {
        self.set_holdings_bulk(reg, &[(value >> 16) as u16, value as u16])
    }

    /// Get two holding registers as IEEE754 32-bit float
    fn get_holdings_as_f32(&self, reg: u16) -> Result<f32, ErrorKind> {
        Ok(Ieee754::from_bits(self.get_holdings_as_u32(reg)?))
    }

    /// Set IEEE 754 f32 to two holding registers
    fn set_holdings_from_f32(&self, reg: u16, value: f32) -> Result<(), ErrorKind> {
        self.set_holdings_from_u32(reg, value.bits())
    }

    /// Raise event flags for the master, they are cleared when the master reads them
    fn raise_event(&self, mask: u16) -> Result<(), ErrorKind> {
        let mut result = Err(ErrorKind::OOBContext);
        self.with_registers(&mut |regs| {
            if let Some(flags) = regs.get_mut(usize::from(REG_EVENT_FLAGS)) {
                *flags |= mask;
                result = Ok(());
            }
        });
        result
    }

    /// Bookkeeping of the last request served by the bank
    fn request_meta(&self) -> Option<RequestMeta> {
        let mut meta = None;
        self.with_registers(&mut |regs| meta = RequestMeta::read_from(regs));
        meta
    }

    fn clear_holdings(&self) {
        self.with_registers(&mut |regs| regs.fill(0));
    }
}

impl<B: RegisterBank + ?Sized> BankContext for B {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bank::Bank;

    #[test]
    fn test_holdings_oob() {
        let bank: Bank<16> = Bank::new();
        let mut result: Vec<u16> = Vec::new();
        assert_eq!(
            bank.get_holdings_bulk(0, 17, &mut result),
            Err(ErrorKind::OOBContext)
        );
        assert_eq!(
            bank.get_holdings_bulk(16, 1, &mut result),
            Err(ErrorKind::OOBContext)
        );
        bank.get_holdings_bulk(15, 1, &mut result).unwrap();
        assert_eq!(bank.get_holding(16), Err(ErrorKind::OOBContext));
        assert_eq!(
            bank.set_holdings_bulk(15, &[1, 2]),
            Err(ErrorKind::OOBContext)
        );
        assert_eq!(bank.get_holding(15).unwrap(), 0);
        assert_eq!(
            bank.set_holdings_from_u32(15, 1),
            Err(ErrorKind::OOBContext)
        );
    }

    #[test]
    fn test_u32_f32() {
        let bank: Bank<128> = Bank::new();
        bank.set_holdings_from_u32(33, 0x1234_5678).unwrap();
        assert_eq!(bank.get_holding(33).unwrap(), 0x1234);
        assert_eq!(bank.get_holding(34).unwrap(), 0x5678);
        assert_eq!(bank.get_holdings_as_u32(33).unwrap(), 0x1234_5678);
        bank.set_holdings_from_f32(66, 935.77).unwrap();
        assert_eq!(bank.get_holdings_as_f32(66).unwrap(), 935.77);
    }

    #[test]
    fn test_raise_event() {
        let bank: Bank<8> = Bank::new();
        bank.raise_event(0b01).unwrap();
        bank.raise_event(0b100).unwrap();
        assert_eq!(bank.get_holding(REG_EVENT_FLAGS).unwrap(), 0b101);
        bank.clear_holdings();
        assert_eq!(bank.get_holding(REG_EVENT_FLAGS).unwrap(), 0);
        let tiny: Bank<2> = Bank::new();
        assert_eq!(tiny.raise_event(1), Err(ErrorKind::OOBContext));
        assert_eq!(tiny.request_meta(), None);
    }
}
