/// Bus timing budgets, in real time units.
///
/// The defaults match what a 28C256 needs at 5V: one microsecond per control
/// edge, 200µs for the write cycle to start after the last load strobe, a
/// 12ms program window and 22ms for a bulk erase.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Settle time around every control line edge
    pub edge_ns: u32,
    /// Wait between the last write strobe and the first status poll
    pub program_start_us: u32,
    /// How long a write cycle may keep the toggle bit running
    pub program_timeout_us: u32,
    /// Extra pause between two status polls
    pub poll_interval_ns: u32,
    /// Fixed wait after the chip erase sequence
    pub erase_us: u32,
}

impl Timing {
    pub const DEFAULT: Timing = Timing {
        edge_ns: 1_000,
        program_start_us: 200,
        program_timeout_us: 12_000,
        poll_interval_ns: 0,
        erase_us: 22_000,
    };

    /// Number of toggle-bit polls that fit into the program window.
    ///
    /// Each poll costs the three edge delays of the toggle-bit read pair plus
    /// the poll interval.
    pub const fn poll_attempts(&self) -> u32 {
        let per_poll = 3 * self.edge_ns as u64 + self.poll_interval_ns as u64;
        if per_poll == 0 {
            return u32::MAX;
        }
        let attempts = self.program_timeout_us as u64 * 1_000 / per_poll;
        if attempts > u32::MAX as u64 {
            u32::MAX
        } else if attempts == 0 {
            1
        } else {
            attempts as u32
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}
