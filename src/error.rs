/// All possible errors emitted by the driver
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<BusError> {
    /// Internal bus error
    Bus(BusError),

    /// The chip was still toggling when the poll window closed
    Timeout { address: u16 },

    /// Read-back after programming differs from the requested value
    Verify { address: u16 },

    /// A cell still holds data after erasing
    NotBlank { address: u16 },

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned
    NotAligned,
}

impl<E> Error<E> {
    /// Address the failure was observed at, if the error carries one
    pub fn address(&self) -> Option<u16> {
        match self {
            Error::Timeout { address } | Error::Verify { address } | Error::NotBlank { address } => {
                Some(*address)
            }
            _ => None,
        }
    }
}
