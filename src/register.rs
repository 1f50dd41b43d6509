use bit::BitIndex;

/// What the chip drives onto the data bus while an internal write or erase
/// cycle is running, instead of the cell contents.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// DQ6, flips on every read while the cycle runs
    pub toggle: bool,
}

impl From<u8> for Status {
    fn from(val: u8) -> Status {
        Status {
            toggle: val.bit(6),
        }
    }
}

impl Status {
    /// Toggle-bit test on two consecutive samples
    pub fn toggled(first: Status, second: Status) -> bool {
        first.toggle != second.toggle
    }
}
