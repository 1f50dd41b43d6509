/// Liveness signal for the supervisory watchdog.
///
/// Every loop that can run for more than a few milliseconds calls
/// [`Watchdog::kick`] on each iteration. If the kicks stop, the watchdog
/// hard resets the programmer.
pub trait Watchdog {
    fn kick(&mut self);
}

impl<F: FnMut()> Watchdog for F {
    fn kick(&mut self) {
        self()
    }
}
