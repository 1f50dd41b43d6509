//! Whole-chip operations built from raw bus cycles: software data protection,
//! chip erase and blank check.

use crate::{
    blocking::Chip,
    bus::ParallelBus,
    command::{CHIP_ERASE, PROTECT_DISABLE, PROTECT_ENABLE},
    error::Error,
    watchdog::Watchdog,
    BLANK, CAPACITY,
};
use embedded_hal::delay::DelayNs;

impl<BUS, D, W, E> Chip<BUS, D, W>
where
    BUS: ParallelBus<Error = E>,
    D: DelayNs,
    W: Watchdog,
{
    fn send_command(&mut self, sequence: &[(u16, u8)]) -> Result<(), Error<E>> {
        for &(address, byte) in sequence {
            self.set_address(address)?;
            self.raw_write(byte)?;
        }
        Ok(())
    }

    /// Wait for the write cycle started by a command sequence. There is no
    /// timeout here, a chip that never settles is left to the watchdog.
    fn settle_command(&mut self) -> Result<(), Error<E>> {
        let start_us = self.timing().program_start_us;
        self.delay_us(start_us);
        while self.is_busy()? {}
        Ok(())
    }

    /// Erase the whole array.
    ///
    /// Sends the bulk erase sequence and waits the fixed erase time. Chips
    /// that ignore the sequence are erased one cell at a time instead. Fails
    /// with [`Error::NotBlank`] if a cell still holds data afterwards.
    pub fn chip_erase(&mut self) -> Result<(), Error<E>> {
        self.send_command(&CHIP_ERASE)?;
        let erase_us = self.timing().erase_us;
        self.delay_us(erase_us);
        if self.blank_check()? {
            return Ok(());
        }

        warn!("bulk erase left data behind, erasing cell by cell");
        self.set_address(0)?;
        while (self.address() as u32) < CAPACITY {
            match self.write(BLANK) {
                Ok(()) => {}
                Err(Error::Bus(e)) => return Err(Error::Bus(e)),
                Err(_) => debug!("cell {:#x} did not erase", self.address()),
            }
            self.advance_address()?;
            self.kick_watchdog();
        }

        match self.first_non_blank()? {
            None => Ok(()),
            Some(address) => Err(Error::NotBlank { address }),
        }
    }

    /// Turn software data protection on. The chip ignores plain writes
    /// until [`Chip::unlock`] is sent.
    pub fn lock(&mut self) -> Result<(), Error<E>> {
        self.send_command(&PROTECT_ENABLE)?;
        self.settle_command()
    }

    /// Turn software data protection off
    pub fn unlock(&mut self) -> Result<(), Error<E>> {
        self.send_command(&PROTECT_DISABLE)?;
        self.settle_command()
    }

    /// Scan the array from address zero and return the first cell that is not
    /// blank.
    pub fn first_non_blank(&mut self) -> Result<Option<u16>, Error<E>> {
        self.set_address(0)?;
        while (self.address() as u32) < CAPACITY {
            if self.read()? != BLANK {
                return Ok(Some(self.address()));
            }
            self.advance_address()?;
            self.kick_watchdog();
        }
        Ok(None)
    }

    /// `true` if every cell holds 0xFF
    pub fn blank_check(&mut self) -> Result<bool, Error<E>> {
        Ok(self.first_non_blank()?.is_none())
    }
}
