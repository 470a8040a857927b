#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rmodbusino::{
    bank::Bank,
    config::SlaveConfig,
    consts::{EEPROM_WORDS, LFS_REGISTER_SIZE, PERIPHERALS_REGISTER_SIZE},
    slave::{Feed, FrameReceiver, ModbusSlave, ResponseBuf},
    transport::{Timer, Transport},
};

struct Line<'a> {
    rx: &'a [u8],
}

impl Transport for Line<'_> {
    type Error = ();

    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let (b, rest) = self.rx.split_first()?;
        self.rx = rest;
        Some(*b)
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), ()> {
        Ok(())
    }
}

struct Clock(u32);

impl Timer for Clock {
    fn millis(&self) -> u32 {
        self.0
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0 = self.0.wrapping_add(ms);
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzInput<'a> {
    reply_to_broadcast: bool,
    now: u32,
    line: &'a [u8],
}

fuzz_target!(|input: FuzzInput| {
    let config = SlaveConfig {
        reply_to_broadcast: input.reply_to_broadcast,
        ..SlaveConfig::default()
    };
    let peripherals: Bank<PERIPHERALS_REGISTER_SIZE> = Bank::new();
    let eeprom: Bank<EEPROM_WORDS> = Bank::new();
    let lfs: Bank<LFS_REGISTER_SIZE> = Bank::new();

    // raw frames straight into the processor
    let mut slave = ModbusSlave::new(
        config,
        &peripherals,
        &eeprom,
        &lfs,
        Line { rx: &[] },
        Clock(input.now),
    )
    .unwrap();
    let mut response = ResponseBuf::new();
    let _ = slave.process(input.line, &mut response);

    // the receiver must only hand out frames it has fully seen
    let mut rx = FrameReceiver::new(&config);
    for b in input.line {
        if let Feed::Complete(len) = rx.feed(*b) {
            assert!(len <= 256);
            let _ = slave.process(rx.frame(len), &mut response);
        }
    }

    // and the whole loop
    let mut slave = ModbusSlave::new(
        config,
        &peripherals,
        &eeprom,
        &lfs,
        Line { rx: input.line },
        Clock(input.now),
    )
    .unwrap();
    while slave.transport().available() {
        let _ = slave.poll();
    }
});
