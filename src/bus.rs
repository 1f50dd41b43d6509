//! Hardware side of the memory bus.
//!
//! The driver only ever talks to the chip through this trait. A board
//! support crate implements it on top of its port registers; the host tests
//! implement it on top of a simulated chip.

/// The pins wired to the memory chip: 15 address lines, 8 bidirectional
/// data lines and the three active-low control strobes.
///
/// For the control lines `true` means *asserted*, i.e. the pin is driven low.
pub trait ParallelBus {
    type Error;

    /// Put `address` on the address lines
    fn set_address(&mut self, address: u16) -> Result<(), Self::Error>;

    /// Switch the data port to output and drive `byte` onto it
    fn drive_data(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Switch the data port back to input with pull-ups enabled, so the chip
    /// can drive it
    fn release_data(&mut self) -> Result<(), Self::Error>;

    /// Sample the data port
    fn sample_data(&mut self) -> Result<u8, Self::Error>;

    /// /CE
    fn set_chip_enable(&mut self, asserted: bool) -> Result<(), Self::Error>;

    /// /OE
    fn set_output_enable(&mut self, asserted: bool) -> Result<(), Self::Error>;

    /// /WE
    fn set_write_enable(&mut self, asserted: bool) -> Result<(), Self::Error>;
}

impl<T: ParallelBus + ?Sized> ParallelBus for &mut T {
    type Error = T::Error;

    fn set_address(&mut self, address: u16) -> Result<(), Self::Error> {
        T::set_address(self, address)
    }

    fn drive_data(&mut self, byte: u8) -> Result<(), Self::Error> {
        T::drive_data(self, byte)
    }

    fn release_data(&mut self) -> Result<(), Self::Error> {
        T::release_data(self)
    }

    fn sample_data(&mut self) -> Result<u8, Self::Error> {
        T::sample_data(self)
    }

    fn set_chip_enable(&mut self, asserted: bool) -> Result<(), Self::Error> {
        T::set_chip_enable(self, asserted)
    }

    fn set_output_enable(&mut self, asserted: bool) -> Result<(), Self::Error> {
        T::set_output_enable(self, asserted)
    }

    fn set_write_enable(&mut self, asserted: bool) -> Result<(), Self::Error> {
        T::set_write_enable(self, asserted)
    }
}
