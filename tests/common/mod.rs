//! Simulated 28C256 and helpers shared by the host tests.
#![allow(dead_code)]

use std::{cell::Cell, collections::HashSet, rc::Rc};

use embedded_hal::delay::DelayNs;
use pgm28c::{bus::ParallelBus, BLANK, CAPACITY};

const ERASE_SEQUENCE: [(u16, u8); 6] = [
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x80),
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x10),
];

const UNLOCK_SEQUENCE: [(u16, u8); 6] = [
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x80),
    (0x5555, 0xAA),
    (0x2AAA, 0x55),
    (0x5555, 0x20),
];

const LOCK_SEQUENCE: [(u16, u8); 3] = [(0x5555, 0xAA), (0x2AAA, 0x55), (0x5555, 0xA0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

/// Behavioural model of the chip at the pin level.
///
/// Write strobes are latched on the rising /WE edge. The latched bytes are
/// committed as one write cycle on the next data sample, then the chip
/// reports busy through the toggle bit for `busy_samples` samples.
pub struct SimBus {
    memory: Vec<u8>,
    address: u16,
    driven: Option<u8>,
    chip_enable: bool,
    output_enable: bool,
    write_enable: bool,
    pending: Vec<(u16, u8)>,
    busy_left: u32,
    toggle: bool,
    last_written: u8,
    stuck: HashSet<u16>,
    /// Rising /WE edges seen with /CE asserted
    pub write_pulses: usize,
    /// Internal program cycles started
    pub program_cycles: usize,
    /// Bulk erase sequences recognised
    pub bulk_erases: usize,
    pub locked: bool,
    /// The chip honours the chip erase sequence
    pub bulk_erase_works: bool,
    /// Samples a program cycle stays busy for
    pub busy_samples: u32,
    /// Program cycles never finish
    pub hang: bool,
    /// Every bus access fails
    pub faulty: bool,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            memory: vec![BLANK; CAPACITY as usize],
            address: 0,
            driven: None,
            chip_enable: false,
            output_enable: false,
            write_enable: false,
            pending: Vec::new(),
            busy_left: 0,
            toggle: false,
            last_written: BLANK,
            stuck: HashSet::new(),
            write_pulses: 0,
            program_cycles: 0,
            bulk_erases: 0,
            locked: false,
            bulk_erase_works: true,
            busy_samples: 6,
            hang: false,
            faulty: false,
        }
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Preload memory contents, bypassing the bus
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    /// Cell that keeps `value` no matter what is written to it
    pub fn stick(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
        self.stuck.insert(address);
    }

    /// All strobes released and the data port floating
    pub fn is_idle(&self) -> bool {
        !self.chip_enable && !self.output_enable && !self.write_enable && self.driven.is_none()
    }

    fn check(&self) -> Result<(), BusFault> {
        if self.faulty {
            Err(BusFault)
        } else {
            Ok(())
        }
    }

    fn program(&mut self, address: u16, byte: u8) {
        let address = address & 0x7FFF;
        if !self.stuck.contains(&address) {
            self.memory[address as usize] = byte;
        }
        self.last_written = byte;
    }

    fn start_cycle(&mut self) {
        self.program_cycles += 1;
        self.busy_left = if self.hang { u32::MAX } else { self.busy_samples };
    }

    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);

        if pending == ERASE_SEQUENCE {
            self.bulk_erases += 1;
            if self.bulk_erase_works {
                for address in 0..CAPACITY as u16 {
                    if !self.stuck.contains(&address) {
                        self.memory[address as usize] = BLANK;
                    }
                }
            }
            return;
        }
        if pending == UNLOCK_SEQUENCE {
            self.locked = false;
            self.start_cycle();
            return;
        }

        let data = if pending.starts_with(&LOCK_SEQUENCE) {
            self.locked = true;
            &pending[LOCK_SEQUENCE.len()..]
        } else if self.locked {
            // protected, the strobes are ignored
            return;
        } else {
            &pending[..]
        };
        for &(address, byte) in data {
            self.program(address, byte);
        }
        self.start_cycle();
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelBus for SimBus {
    type Error = BusFault;

    fn set_address(&mut self, address: u16) -> Result<(), BusFault> {
        self.check()?;
        self.address = address;
        Ok(())
    }

    fn drive_data(&mut self, byte: u8) -> Result<(), BusFault> {
        self.check()?;
        self.driven = Some(byte);
        Ok(())
    }

    fn release_data(&mut self) -> Result<(), BusFault> {
        self.check()?;
        self.driven = None;
        Ok(())
    }

    fn sample_data(&mut self) -> Result<u8, BusFault> {
        self.check()?;
        assert!(self.chip_enable && self.output_enable, "sampled without /CE and /OE");
        assert!(self.driven.is_none(), "sampled while driving the data port");
        self.commit();
        if self.busy_left > 0 {
            self.busy_left -= 1;
            self.toggle = !self.toggle;
            let toggle = if self.toggle { 0x40 } else { 0x00 };
            return Ok((!self.last_written & 0x80) | toggle);
        }
        Ok(self.memory[(self.address & 0x7FFF) as usize])
    }

    fn set_chip_enable(&mut self, asserted: bool) -> Result<(), BusFault> {
        self.check()?;
        self.chip_enable = asserted;
        Ok(())
    }

    fn set_output_enable(&mut self, asserted: bool) -> Result<(), BusFault> {
        self.check()?;
        self.output_enable = asserted;
        Ok(())
    }

    fn set_write_enable(&mut self, asserted: bool) -> Result<(), BusFault> {
        self.check()?;
        if self.write_enable && !asserted && self.chip_enable {
            let byte = self.driven.expect("write strobe with a floating data port");
            self.pending.push((self.address, byte));
            self.write_pulses += 1;
        }
        self.write_enable = asserted;
        Ok(())
    }
}

/// Delay that only adds up the requested time
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns.get()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ns as u64);
    }
}

/// Watchdog closure counting its kicks into `kicks`
pub fn counting(kicks: &Rc<Cell<u32>>) -> impl FnMut() + 'static {
    let kicks = kicks.clone();
    move || kicks.set(kicks.get() + 1)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
