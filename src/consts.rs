//! MODBUS Constants

// MODBUS Functions
pub const MODBUS_GET_HOLDINGS: u8 = 3;
pub const MODBUS_SET_HOLDINGS_BULK: u8 = 16;

// MODBUS Errors
pub const MODBUS_ERROR_ILLEGAL_FUNCTION: u8 = 1;
pub const MODBUS_ERROR_ILLEGAL_DATA_ADDRESS: u8 = 2;
pub const MODBUS_ERROR_ILLEGAL_DATA_VALUE: u8 = 3;

// Informative (non-exception) loop status codes
pub const MODBUS_INFORMATIVE_NOT_FOR_US: u8 = 4;
pub const MODBUS_INFORMATIVE_RX_TIMEOUT: u8 = 5;

pub const MODBUS_BROADCAST: u8 = 0;
pub const MODBUS_MAX_SLAVE_ID: u8 = 247;

/// Max RTU ADU length, slave + PDU + CRC
pub const MODBUS_MAX_ADU_LEN: usize = 256;
pub const MODBUS_CRC_LEN: usize = 2;
/// slave, func, reg hi/lo, count hi/lo
pub const MODBUS_REQ_HEADER_LEN: usize = 6;
/// Offset of the first data byte of a write multiple registers request
pub const MODBUS_WRITE_DATA_START: usize = 7;

/// Max registers a single read reply can carry
pub const MODBUS_MAX_READ_COUNT: u16 = 125;
/// Max registers a single write request can carry
pub const MODBUS_MAX_WRITE_COUNT: u16 = 123;

// Metadata prefix, present at the start of every bank
pub const REG_REQ_TIMESTAMP_HI: u16 = 0;
pub const REG_REQ_TIMESTAMP_LO: u16 = 1;
pub const REG_REQ_COUNTER: u16 = 2;
pub const REG_EVENT_FLAGS: u16 = 3;
pub const REG_SLAVE_ID: u16 = 4;
pub const REG_FUNCTION: u16 = 5;
pub const REG_ADDRESS: u16 = 6;
pub const REG_COUNT: u16 = 7;
pub const REG_META_LEN: u16 = 8;

/// First EEPROM word available to the master, words below hold the storage header
pub const EEPROM_DATA_START: u16 = 10;
/// EEPROM size in bytes
pub const EEPROM_SIZE: usize = 1024;
pub const EEPROM_WORDS: usize = EEPROM_SIZE / 2;
pub const PERIPHERALS_REGISTER_SIZE: usize = 1024;
pub const LFS_REGISTER_SIZE: usize = 128;
