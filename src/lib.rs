#![no_std]
//! This is a platform agnostic firmware core for a 28C256 parallel EEPROM programmer using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! The microcontroller bit-bangs the address, data and control lines of the
//! memory chip and talks to a host over a hardware flow-controlled serial
//! line. The host sends text commands and Intel HEX records, one per line.
//!
//! * [`blocking::Chip`] drives the bus cycles, the toggle-bit busy poll and
//!   the verified byte/page writes.
//! * [`protocol`] adds the software data protection sequences, chip erase
//!   and blank check on top of it.
//! * [`serial::Transport`] holds the receive/transmit queues shared with the
//!   UART interrupts and drives the clear-to-send line.
//! * [`hex`] decodes incoming records and encodes memory dumps.
//! * [`interpreter::Interpreter`] is the line editor and command dispatcher.
//!
//! A foreground loop looks roughly like this:
//!
//! ```ignore
//! static UART: Transport = Transport::new(Watermarks::DEFAULT);
//!
//! let chip = Chip::new(PortBus::take(), Delay, kick)?;
//! let mut shell = Interpreter::new(chip, UART.port(enable_udre, kick));
//! loop {
//!     sleep_until_interrupt();
//!     kick();
//!     if let Some(byte) = shell.output_mut().read_byte() {
//!         shell.feed(byte)?;
//!     }
//! }
//! ```

#[macro_use]
mod fmt;

pub mod blocking;
pub mod bus;
mod command;
pub mod error;
pub mod hex;
pub mod interpreter;
pub mod protocol;
pub mod queue;
pub mod register;
pub mod serial;
pub mod timing;
pub mod watchdog;

use crate::error::Error;

/// Number of addressable bytes on a 28C256
pub const CAPACITY: u32 = 0x8000;

/// Size of the on-chip page load buffer
pub const PAGE_SIZE: u32 = 64;

/// Value of an erased cell
pub const BLANK: u8 = 0xFF;

/// Checks that `length` bytes starting at `start` stay inside the chip and
/// that at least one byte is requested.
pub fn check_range(start: u16, length: u16) -> bool {
    let start = start as u32;
    let length = length as u32;
    start < CAPACITY && length > 0 && length <= CAPACITY - start
}

pub(crate) fn check_erase<E>(from: u32, to: u32) -> Result<(), Error<E>> {
    if from > to || to > CAPACITY {
        return Err(Error::OutOfBounds);
    }
    // only the whole array can be erased
    if from != 0 || to != CAPACITY {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_write<E>(offset: u32, length: usize) -> Result<(), Error<E>> {
    let length = length as u32;
    if length > CAPACITY || offset > CAPACITY - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}
