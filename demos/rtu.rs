use serial::prelude::*;
use std::time::Duration;

use rmodbusino::{
    bank::{Bank, BankContext, BankId, BorrowedBank},
    config::SlaveConfig,
    consts::{EEPROM_WORDS, LFS_REGISTER_SIZE, PERIPHERALS_REGISTER_SIZE},
    slave::ModbusSlave,
    transport::{SerialTransport, StdTimer},
};

static PERIPHERALS: Bank<PERIPHERALS_REGISTER_SIZE> = Bank::new();
static LFS: Bank<LFS_REGISTER_SIZE> = Bank::new();

// fake sensor, a temperature in 64..65 and an uptime counter in 66
fn sample() {
    let mut uptime: u16 = 0;
    loop {
        PERIPHERALS
            .set_holdings_from_f32(64, 20.0 + f32::from(uptime % 50) / 10.0)
            .unwrap();
        PERIPHERALS.set_holding(66, uptime).unwrap();
        if uptime % 60 == 0 {
            PERIPHERALS.raise_event(0x0001).unwrap();
        }
        uptime = uptime.wrapping_add(1);
        std::thread::sleep(Duration::from_secs(1));
    }
}

pub fn rtuserver(port: &str) {
    let mut port = serial::open(port).unwrap();
    port.reconfigure(&|settings| {
        (settings.set_baud_rate(serial::Baud9600).unwrap());
        settings.set_char_size(serial::Bits8);
        settings.set_parity(serial::ParityNone);
        settings.set_stop_bits(serial::Stop1);
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })
    .unwrap();
    let mut image = [0u16; EEPROM_WORDS];
    let eeprom = BorrowedBank::new(&mut image);
    let mut slave = ModbusSlave::new(
        SlaveConfig::default(),
        &PERIPHERALS,
        &eeprom,
        &LFS,
        SerialTransport::new(port).unwrap(),
        StdTimer::default(),
    )
    .unwrap();
    std::thread::spawn(sample);
    loop {
        match slave.poll_request() {
            Ok(Some(served)) => {
                for changes in served.changes {
                    if changes.bank == BankId::Eeprom {
                        log::info!(
                            "eeprom words {}..{} changed, commit pending",
                            changes.reg,
                            changes.reg + changes.count
                        );
                    }
                }
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => log::warn!("request failed: {}", e),
        }
    }
}

fn main() {
    env_logger::init();
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_owned());
    rtuserver(&port);
}
