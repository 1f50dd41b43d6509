use crate::{
    bus::ParallelBus, error::Error, register::Status, timing::Timing, watchdog::Watchdog,
};
use embedded_hal::delay::DelayNs;

/// The 28C256 bus driver.
///
/// Owns the bus, the delay source and the watchdog. The current address is
/// tracked here and only pushed to the address lines when it changes, the
/// same way the port latches hold it on real hardware.
pub struct Chip<BUS, D, W> {
    bus: BUS,
    delay: D,
    watchdog: W,
    timing: Timing,
    address: u16,
}

impl<BUS, D, W, E> Chip<BUS, D, W>
where
    BUS: ParallelBus<Error = E>,
    D: DelayNs,
    W: Watchdog,
{
    /// Create a new instance with the default timings. All control lines are
    /// released and the address is reset to zero.
    pub fn new(bus: BUS, delay: D, watchdog: W) -> Result<Self, Error<E>> {
        Self::with_timing(bus, delay, watchdog, Timing::DEFAULT)
    }

    pub fn with_timing(mut bus: BUS, delay: D, watchdog: W, timing: Timing) -> Result<Self, Error<E>> {
        bus.set_write_enable(false).map_err(Error::Bus)?;
        bus.set_output_enable(false).map_err(Error::Bus)?;
        bus.set_chip_enable(false).map_err(Error::Bus)?;
        bus.release_data().map_err(Error::Bus)?;
        bus.set_address(0).map_err(Error::Bus)?;
        Ok(Self {
            bus,
            delay,
            watchdog,
            timing,
            address: 0,
        })
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn bus(&self) -> &BUS {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut BUS {
        &mut self.bus
    }

    /// Give back the bus, delay and watchdog
    pub fn release(self) -> (BUS, D, W) {
        (self.bus, self.delay, self.watchdog)
    }

    pub fn kick_watchdog(&mut self) {
        self.watchdog.kick();
    }

    pub(crate) fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn edge(&mut self) {
        self.delay.delay_ns(self.timing.edge_ns);
    }

    /// Put a new address on the bus
    pub fn set_address(&mut self, address: u16) -> Result<u16, Error<E>> {
        self.bus.set_address(address).map_err(Error::Bus)?;
        self.address = address;
        Ok(address)
    }

    /// Address currently on the bus
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Step to the next address. Wraps around at the top of the 16 bit space,
    /// bounds are the caller's business.
    pub fn advance_address(&mut self) -> Result<(), Error<E>> {
        self.set_address(self.address.wrapping_add(1))?;
        Ok(())
    }

    /// Read the byte at the current address
    pub fn read(&mut self) -> Result<u8, Error<E>> {
        self.bus.set_chip_enable(true).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_output_enable(true).map_err(Error::Bus)?;
        self.edge();
        let byte = self.bus.sample_data().map_err(Error::Bus)?;
        self.bus.set_output_enable(false).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_chip_enable(false).map_err(Error::Bus)?;
        self.edge();
        Ok(byte)
    }

    /// Read `buff.len()` bytes starting at `start`. The address is left one
    /// past the last byte read.
    pub fn read_bytes(&mut self, start: u16, buff: &mut [u8]) -> Result<(), Error<E>> {
        self.set_address(start)?;
        for byte in buff.iter_mut() {
            *byte = self.read()?;
            self.advance_address()?;
        }
        Ok(())
    }

    /// One write strobe at the current address, no matter what the cell
    /// holds. Used both for data and for the command sequences.
    pub fn raw_write(&mut self, byte: u8) -> Result<(), Error<E>> {
        self.bus.drive_data(byte).map_err(Error::Bus)?;
        self.bus.set_chip_enable(true).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_write_enable(true).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_write_enable(false).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_chip_enable(false).map_err(Error::Bus)?;
        self.edge();
        self.bus.release_data().map_err(Error::Bus)
    }

    /// Check if the chip has a write or erase cycle in progress, using the
    /// toggle bit: two reads with /OE cycled in between disagree on DQ6
    /// while the chip is busy.
    pub fn is_busy(&mut self) -> Result<bool, Error<E>> {
        self.bus.set_chip_enable(true).map_err(Error::Bus)?;
        self.bus.set_output_enable(true).map_err(Error::Bus)?;
        self.edge();
        let first = self.bus.sample_data().map_err(Error::Bus)?;
        self.bus.set_output_enable(false).map_err(Error::Bus)?;
        self.bus.set_chip_enable(false).map_err(Error::Bus)?;
        self.edge();
        self.bus.set_chip_enable(true).map_err(Error::Bus)?;
        self.bus.set_output_enable(true).map_err(Error::Bus)?;
        self.edge();
        let second = self.bus.sample_data().map_err(Error::Bus)?;
        self.bus.set_output_enable(false).map_err(Error::Bus)?;
        self.bus.set_chip_enable(false).map_err(Error::Bus)?;
        Ok(Status::toggled(first.into(), second.into()))
    }

    /// Poll until the chip is idle, at most for the program window.
    /// Returns `false` if it was still busy at the end.
    pub fn poll_ready(&mut self) -> Result<bool, Error<E>> {
        for _ in 0..self.timing.poll_attempts() {
            if !self.is_busy()? {
                return Ok(true);
            }
            self.delay.delay_ns(self.timing.poll_interval_ns);
        }
        Ok(false)
    }

    /// Wait for the start of the write cycle, then poll it to completion
    fn finish_program(&mut self, address: u16) -> Result<(), Error<E>> {
        self.watchdog.kick();
        self.delay.delay_us(self.timing.program_start_us);
        if !self.poll_ready()? {
            warn!("write cycle at {:#x} did not finish", address);
            return Err(Error::Timeout { address });
        }
        Ok(())
    }

    /// Program one byte at the current address and verify it. Nothing is
    /// written if the cell already holds `byte`.
    pub fn write(&mut self, byte: u8) -> Result<(), Error<E>> {
        let address = self.address;
        if self.read()? == byte {
            return Ok(());
        }
        self.raw_write(byte)?;
        self.finish_program(address)?;
        if self.read()? != byte {
            warn!("verify failed at {:#x}", address);
            return Err(Error::Verify { address });
        }
        Ok(())
    }

    /// Program `buff` starting at the current address as one page load, then
    /// verify every byte.
    ///
    /// If the chip already holds `buff` no write cycle is started at all. The
    /// data must not cross a [`PAGE_SIZE`](crate::PAGE_SIZE) boundary, the
    /// chip would wrap inside the page.
    pub fn page_write(&mut self, buff: &[u8]) -> Result<(), Error<E>> {
        let start = self.address;

        let mut dirty = false;
        for &expected in buff {
            if self.read()? != expected {
                dirty = true;
                break;
            }
            self.advance_address()?;
        }
        if !dirty {
            debug!("{} bytes at {:#x} already programmed", buff.len(), start);
            return Ok(());
        }

        self.set_address(start)?;
        for &byte in buff {
            self.raw_write(byte)?;
            self.advance_address()?;
        }
        self.set_address(start)?;
        self.finish_program(start)?;

        for &expected in buff {
            if self.read()? != expected {
                let address = self.address;
                warn!("verify failed at {:#x}", address);
                return Err(Error::Verify { address });
            }
            self.advance_address()?;
        }
        Ok(())
    }
}

/// Implementation of the `NorFlash` traits of the `embedded_storage` crate.
///
/// The EEPROM does not need an erase before writing, so an erase only exists
/// for the whole array.
mod es {
    use super::*;
    use crate::{check_erase, check_write, CAPACITY, PAGE_SIZE};
    use core::fmt::Debug;
    use embedded_storage::nor_flash::{
        check_read, ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    impl<E> From<NorFlashErrorKind> for Error<E> {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::NotAligned,
                _ => Error::OutOfBounds,
            }
        }
    }

    impl<BusError> NorFlashError for Error<BusError>
    where
        BusError: Debug,
    {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Error::NotAligned => NorFlashErrorKind::NotAligned,
                _ => NorFlashErrorKind::Other,
            }
        }
    }

    impl<BUS, D, W, E> ErrorType for Chip<BUS, D, W>
    where
        BUS: ParallelBus<Error = E>,
        E: Debug,
    {
        type Error = Error<E>;
    }

    impl<BUS, D, W, E> ReadNorFlash for Chip<BUS, D, W>
    where
        BUS: ParallelBus<Error = E>,
        D: DelayNs,
        W: Watchdog,
        E: Debug,
    {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            self.read_bytes(offset as u16, bytes)
        }

        fn capacity(&self) -> usize {
            CAPACITY as usize
        }
    }

    impl<BUS, D, W, E> NorFlash for Chip<BUS, D, W>
    where
        BUS: ParallelBus<Error = E>,
        D: DelayNs,
        W: Watchdog,
        E: Debug,
    {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = CAPACITY as usize;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(from, to)?;
            self.chip_erase()
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(offset, bytes.len())?;
            let mut offset = offset;
            let mut rest = bytes;
            while !rest.is_empty() {
                let room = (PAGE_SIZE - offset % PAGE_SIZE) as usize;
                let (page, tail) = rest.split_at(room.min(rest.len()));
                self.set_address(offset as u16)?;
                self.page_write(page)?;
                offset += page.len() as u32;
                rest = tail;
            }
            Ok(())
        }
    }
}
