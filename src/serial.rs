//! Interrupt driven serial transport with hardware handshake.
//!
//! The UART interrupts and the foreground loop share a [`Transport`]: the
//! receive interrupt pushes into the receive queue, the data register empty
//! interrupt pops from the transmit queue, and the foreground pops received
//! bytes and pushes bytes to send through a [`Port`]. Every access to the
//! queues is one push or pop inside a critical section.
//!
//! The host is paused through an active-low clear-to-send line once the
//! receive queue fills past the high watermark, and resumed from the timer
//! tick once the foreground drained it below the low watermark.

use crate::{hex::hex_digits, queue::RingQueue, watchdog::Watchdog};
use core::{cell::RefCell, convert::Infallible};
use critical_section::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_io::{ErrorType, Read, ReadReady, Write};

pub const RX_CAPACITY: usize = 256;
pub const TX_CAPACITY: usize = 32;

/// Receive queue occupancy thresholds for the clear-to-send line
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    /// Pause the host once more than this many bytes are queued
    pub high: usize,
    /// Resume the host once fewer than this many bytes are queued
    pub low: usize,
}

impl Watermarks {
    pub const DEFAULT: Watermarks = Watermarks { high: 128, low: 64 };
}

impl Default for Watermarks {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Byte handed to the transmit interrupt
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmit {
    pub byte: u8,
    /// The transmit queue is empty now, disable the ready interrupt
    pub drained: bool,
}

/// Re-arms the transmit ready interrupt after the foreground queued a byte
pub trait TxInterrupt {
    fn enable(&mut self);
}

impl<F: FnMut()> TxInterrupt for F {
    fn enable(&mut self) {
        self()
    }
}

struct Queues<const RX: usize, const TX: usize> {
    rx: RingQueue<u8, RX>,
    tx: RingQueue<u8, TX>,
    paused: bool,
    overruns: usize,
}

pub struct Transport<const RX: usize = RX_CAPACITY, const TX: usize = TX_CAPACITY> {
    queues: Mutex<RefCell<Queues<RX, TX>>>,
    watermarks: Watermarks,
}

impl<const RX: usize, const TX: usize> Transport<RX, TX> {
    pub const fn new(watermarks: Watermarks) -> Self {
        assert!(
            watermarks.low < watermarks.high && watermarks.high <= RX,
            "watermarks must satisfy low < high <= receive capacity"
        );
        Self {
            queues: Mutex::new(RefCell::new(Queues {
                rx: RingQueue::new(0),
                tx: RingQueue::new(0),
                paused: false,
                overruns: 0,
            })),
            watermarks,
        }
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    /// Let the host send. Call once after the UART is configured.
    pub fn start<P: OutputPin>(&self, cts: &mut P) -> Result<(), P::Error> {
        cts.set_low()?;
        self.set_paused(false);
        Ok(())
    }

    /// Receive interrupt: queue `byte` and pause the host if the queue runs
    /// full. A byte arriving at a full queue is dropped.
    ///
    /// The transport only counts as paused once the line was driven, so a
    /// failed pin write is retried on the next byte.
    pub fn on_receive<P: OutputPin>(&self, byte: u8, cts: &mut P) -> Result<(), P::Error> {
        let (pause, dropped) = critical_section::with(|cs| {
            let mut queues = self.queues.borrow_ref_mut(cs);
            let dropped = !queues.rx.push(byte);
            if dropped {
                queues.overruns += 1;
            }
            let pause = !queues.paused && queues.rx.len() > self.watermarks.high;
            (pause, dropped)
        });
        if dropped {
            trace!("receive queue full, dropped {:#x}", byte);
        }
        if pause {
            cts.set_high()?;
            self.set_paused(true);
        }
        Ok(())
    }

    /// Periodic timer interrupt: resume the host once the foreground caught up
    pub fn on_timer_tick<P: OutputPin>(&self, cts: &mut P) -> Result<(), P::Error> {
        let resume = critical_section::with(|cs| {
            let queues = self.queues.borrow_ref(cs);
            queues.paused && queues.rx.len() < self.watermarks.low
        });
        if resume {
            cts.set_low()?;
            self.set_paused(false);
        }
        Ok(())
    }

    fn set_paused(&self, paused: bool) {
        critical_section::with(|cs| self.queues.borrow_ref_mut(cs).paused = paused);
    }

    /// Transmit ready interrupt: next byte for the data register. `None`
    /// means there is nothing to send and the interrupt should be disabled.
    pub fn on_transmit_ready(&self) -> Option<Transmit> {
        critical_section::with(|cs| {
            let mut queues = self.queues.borrow_ref_mut(cs);
            let byte = queues.tx.pop()?;
            Some(Transmit {
                byte,
                drained: queues.tx.is_empty(),
            })
        })
    }

    /// Foreground handle
    pub fn port<I: TxInterrupt, W: Watchdog>(&self, tx_interrupt: I, watchdog: W) -> Port<'_, I, W, RX, TX> {
        Port {
            transport: self,
            tx_interrupt,
            watchdog,
        }
    }

    pub fn rx_len(&self) -> usize {
        critical_section::with(|cs| self.queues.borrow_ref(cs).rx.len())
    }

    pub fn tx_len(&self) -> usize {
        critical_section::with(|cs| self.queues.borrow_ref(cs).tx.len())
    }

    /// Whether the clear-to-send line currently holds the host off
    pub fn is_paused(&self) -> bool {
        critical_section::with(|cs| self.queues.borrow_ref(cs).paused)
    }

    /// Number of received bytes dropped because the receive queue was full
    pub fn overruns(&self) -> usize {
        critical_section::with(|cs| self.queues.borrow_ref(cs).overruns)
    }
}

/// Foreground side of a [`Transport`]
pub struct Port<'a, I, W, const RX: usize = RX_CAPACITY, const TX: usize = TX_CAPACITY> {
    transport: &'a Transport<RX, TX>,
    tx_interrupt: I,
    watchdog: W,
}

impl<'a, I, W, const RX: usize, const TX: usize> Port<'a, I, W, RX, TX>
where
    I: TxInterrupt,
    W: Watchdog,
{
    pub fn transport(&self) -> &'a Transport<RX, TX> {
        self.transport
    }

    /// At least one received byte is waiting
    pub fn ready(&self) -> bool {
        self.transport.rx_len() != 0
    }

    /// Pop one received byte, if any
    pub fn read_byte(&mut self) -> Option<u8> {
        critical_section::with(|cs| self.transport.queues.borrow_ref_mut(cs).rx.pop())
    }

    /// Queue `byte` for sending. Spins, kicking the watchdog, for as long as
    /// the transmit queue is full.
    pub fn send(&mut self, byte: u8) {
        loop {
            let queued = critical_section::with(|cs| {
                let queued = self.transport.queues.borrow_ref_mut(cs).tx.push(byte);
                if queued {
                    self.tx_interrupt.enable();
                }
                queued
            });
            if queued {
                return;
            }
            self.watchdog.kick();
        }
    }

    /// Everything queued has been handed to the UART
    pub fn is_flushed(&self) -> bool {
        self.transport.tx_len() == 0
    }
}

impl<I, W, const RX: usize, const TX: usize> ErrorType for Port<'_, I, W, RX, TX> {
    type Error = Infallible;
}

impl<I, W, const RX: usize, const TX: usize> Read for Port<'_, I, W, RX, TX>
where
    I: TxInterrupt,
    W: Watchdog,
{
    /// Blocks until at least one byte arrived, then takes whatever else is
    /// already queued.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        buf[0] = loop {
            if let Some(byte) = self.read_byte() {
                break byte;
            }
            self.watchdog.kick();
        };
        let mut count = 1;
        while count < buf.len() {
            match self.read_byte() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl<I, W, const RX: usize, const TX: usize> ReadReady for Port<'_, I, W, RX, TX>
where
    I: TxInterrupt,
    W: Watchdog,
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.ready())
    }
}

impl<I, W, const RX: usize, const TX: usize> Write for Port<'_, I, W, RX, TX>
where
    I: TxInterrupt,
    W: Watchdog,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            self.send(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while !self.is_flushed() {
            self.watchdog.kick();
        }
        Ok(())
    }
}

/// Text output helpers for any byte sink
pub trait Print: Write {
    fn print(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write_all(s.as_bytes())
    }

    /// Two uppercase hex digits
    fn print_hex8(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.write_all(&hex_digits(byte))
    }

    /// Four uppercase hex digits
    fn print_hex16(&mut self, word: u16) -> Result<(), Self::Error> {
        self.print_hex8((word >> 8) as u8)?;
        self.print_hex8(word as u8)
    }

    fn print_decimal(&mut self, n: i32) -> Result<(), Self::Error> {
        let mut digits = [0u8; 11];
        let mut pos = digits.len();
        let mut value = n.unsigned_abs();
        loop {
            pos -= 1;
            digits[pos] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        if n < 0 {
            pos -= 1;
            digits[pos] = b'-';
        }
        self.write_all(&digits[pos..])
    }
}

impl<T: Write + ?Sized> Print for T {}
