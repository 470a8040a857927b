use crate::consts::{EEPROM_DATA_START, MODBUS_BROADCAST, MODBUS_MAX_SLAVE_ID};
use crate::ErrorKind;

/// Slave engine configuration
///
/// Defaults match the controller firmware: the peripheral bank answers as slave 1, the EEPROM
/// bank as slave 2, the lfs bank as slave 3.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(
    feature = "with_serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveConfig {
    pub peripheral_slave: u8,
    pub eeprom_slave: u8,
    pub lfs_slave: u8,
    /// EEPROM words below this offset are reserved for the storage header
    pub eeprom_data_start: u16,
    /// how many times to poll the transport for the next byte of a frame
    pub byte_timeout_polls: u8,
    pub byte_poll_interval_ms: u32,
    /// drain window after a rejected frame
    pub flush_polls: u8,
    pub flush_interval_ms: u32,
    /// Modbus forbids answering broadcast requests, some legacy masters wait for a reply anyway
    pub reply_to_broadcast: bool,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            peripheral_slave: 1,
            eeprom_slave: 2,
            lfs_slave: 3,
            eeprom_data_start: EEPROM_DATA_START,
            byte_timeout_polls: 10,
            byte_poll_interval_ms: 1,
            flush_polls: 10,
            flush_interval_ms: 3,
            reply_to_broadcast: false,
        }
    }
}

impl SlaveConfig {
    pub fn slave_ids(&self) -> [u8; 3] {
        [self.peripheral_slave, self.eeprom_slave, self.lfs_slave]
    }

    /// Is the slave id served by one of the banks
    #[inline]
    pub fn is_own(&self, slave_id: u8) -> bool {
        slave_id != MODBUS_BROADCAST && self.slave_ids().contains(&slave_id)
    }

    /// Should a frame with this slave id be received at all
    #[inline]
    pub fn accepts(&self, slave_id: u8) -> bool {
        slave_id == MODBUS_BROADCAST || self.is_own(slave_id)
    }

    /// Ids must be unicast, in range and distinct; the receive window must not be empty
    pub fn validate(&self) -> Result<(), ErrorKind> {
        let ids = self.slave_ids();
        for (i, id) in ids.iter().enumerate() {
            if *id == MODBUS_BROADCAST || *id > MODBUS_MAX_SLAVE_ID {
                return Err(ErrorKind::InvalidConfig);
            }
            if ids[i + 1..].contains(id) {
                return Err(ErrorKind::InvalidConfig);
            }
        }
        if self.byte_timeout_polls == 0 {
            return Err(ErrorKind::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlaveConfig::default();
        config.validate().unwrap();
        assert!(config.accepts(0));
        assert!(!config.is_own(0));
        assert!(config.is_own(3));
        assert!(!config.accepts(4));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = SlaveConfig {
            lfs_slave: 2,
            ..SlaveConfig::default()
        };
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));
        config.lfs_slave = 248;
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));
        config.lfs_slave = 0;
        assert_eq!(config.validate(), Err(ErrorKind::InvalidConfig));
        config.lfs_slave = 7;
        config.validate().unwrap();
    }
}
