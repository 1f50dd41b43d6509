//! Line editor and command dispatcher.
//!
//! Bytes from the host are echoed and collected into a line. On CR or LF
//! the line is executed and the prompt is printed. Lines starting with `:`
//! are Intel HEX records and get programmed, anything else is a command:
//!
//! ```text
//! read                whole chip as Intel HEX
//! read <adr>          from <adr> to the end of the chip
//! read <adr> <len>    <len> bytes from <adr>, both in hex
//! erase
//! lock                software data protection on
//! unlock              software data protection off
//! blankcheck
//! help | ?
//! ```

use crate::{
    blocking::Chip,
    bus::ParallelBus,
    check_range,
    error::Error,
    hex::{self, nibble, DumpError, HexError, Record},
    serial::Print,
    watchdog::Watchdog,
    CAPACITY,
};
use embedded_hal::delay::DelayNs;
use embedded_io::Write;
use heapless::Vec;

/// Longest line kept, extra characters are dropped
pub const LINE_LENGTH: usize = 127;

const BACKSPACE: u8 = 0x08;

const PROMPT: &str = "\r\n>";

const HELP: &str = "Commands:\r\nblankcheck\r\nread [adr len]\r\nhelp\r\n\
                    erase\r\nlock\r\nunlock\r\nsend intel hex to write\r\n";

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingLine,
    LineReady,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Blank line
    Empty,
    Read { start: u16, length: u16 },
    /// `read` with arguments outside the chip
    InvalidParameters,
    Help,
    Erase,
    Lock,
    Unlock,
    BlankCheck,
    Unknown,
}

impl Command {
    /// Parse a command line. The command word is case insensitive, extra
    /// arguments are ignored.
    pub fn parse(line: &[u8]) -> Command {
        let mut tokens = line
            .split(|c| c.is_ascii_whitespace())
            .filter(|token| !token.is_empty());
        let Some(word) = tokens.next() else {
            return Command::Empty;
        };

        if word.eq_ignore_ascii_case(b"read") {
            let Some(start) = tokens.next().map(parse_hex) else {
                return Command::Read {
                    start: 0,
                    length: CAPACITY as u16,
                };
            };
            let length = tokens
                .next()
                .map(parse_hex)
                .unwrap_or((CAPACITY as u16).wrapping_sub(start));
            if check_range(start, length) {
                Command::Read { start, length }
            } else {
                Command::InvalidParameters
            }
        } else if word.eq_ignore_ascii_case(b"help") || word == b"?" {
            Command::Help
        } else if word.eq_ignore_ascii_case(b"erase") {
            Command::Erase
        } else if word.eq_ignore_ascii_case(b"lock") {
            Command::Lock
        } else if word.eq_ignore_ascii_case(b"unlock") {
            Command::Unlock
        } else if word.eq_ignore_ascii_case(b"blankcheck") {
            Command::BlankCheck
        } else {
            Command::Unknown
        }
    }
}

/// Leading hex digits of `token`; parsing stops at the first other character
fn parse_hex(token: &[u8]) -> u16 {
    token
        .iter()
        .take_while(|c| c.is_ascii_hexdigit())
        .fold(0u16, |acc, &c| (acc << 4) | nibble(c) as u16)
}

pub struct Interpreter<BUS, D, W, O> {
    chip: Chip<BUS, D, W>,
    output: O,
    line: Vec<u8, LINE_LENGTH>,
    state: State,
}

impl<BUS, D, W, E, O> Interpreter<BUS, D, W, O>
where
    BUS: ParallelBus<Error = E>,
    D: DelayNs,
    W: Watchdog,
    O: Write,
{
    pub fn new(chip: Chip<BUS, D, W>, output: O) -> Self {
        Self {
            chip,
            output,
            line: Vec::new(),
            state: State::AwaitingLine,
        }
    }

    pub fn chip(&self) -> &Chip<BUS, D, W> {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut Chip<BUS, D, W> {
        &mut self.chip
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Characters collected so far
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    pub fn release(self) -> (Chip<BUS, D, W>, O) {
        (self.chip, self.output)
    }

    /// Handle one byte from the host
    pub fn feed(&mut self, byte: u8) -> Result<(), O::Error> {
        match byte {
            b'\r' | b'\n' => {
                self.state = State::LineReady;
                let line = core::mem::take(&mut self.line);
                let result = self
                    .output
                    .write_all(b"\r\n")
                    .and_then(|()| self.execute(&line));
                self.state = State::AwaitingLine;
                result
            }
            BACKSPACE => {
                if self.line.pop().is_some() {
                    self.output.write_all(b"\x08 \x08")?;
                }
                Ok(())
            }
            _ => {
                if self.line.push(byte).is_ok() {
                    self.output.write_all(&[byte])?;
                } else {
                    trace!("line full, dropped {:#x}", byte);
                }
                Ok(())
            }
        }
    }

    /// Run one complete line and print the prompt
    pub fn execute(&mut self, line: &[u8]) -> Result<(), O::Error> {
        if line.first() == Some(&b':') {
            self.program(line)?;
        } else {
            let command = Command::parse(line);
            debug!("command {:?}", command);
            self.run(command)?;
        }
        self.output.print(PROMPT)
    }

    fn program(&mut self, line: &[u8]) -> Result<(), O::Error> {
        let record = match Record::decode(line) {
            Ok(record) => record,
            Err(HexError::BadChecksum) => return self.output.print("bad checksum\r\n"),
            Err(HexError::UnsupportedType(kind)) => {
                debug!("record type {:#x} not supported", kind);
                return self.output.print("unsupported record type\r\n");
            }
        };
        match hex::write_record(&mut self.chip, &record) {
            Ok(()) => Ok(()),
            Err(Error::Bus(_)) => self.bus_error(),
            Err(e) => {
                let address = e.address().unwrap_or(record.address);
                self.output.print("write error at ")?;
                self.output.print_hex16(address)?;
                self.output.print("\r\n")
            }
        }
    }

    fn run(&mut self, command: Command) -> Result<(), O::Error> {
        match command {
            Command::Empty => Ok(()),
            Command::Read { start, length } => {
                match hex::dump_range(&mut self.chip, start, length, &mut self.output) {
                    Ok(()) => Ok(()),
                    Err(DumpError::Output(e)) => Err(e),
                    Err(DumpError::Chip(_)) => self.bus_error(),
                }
            }
            Command::InvalidParameters => self.output.print("Invalid parameter(s)\r\n"),
            Command::Help => self.output.print(HELP),
            Command::Erase => match self.chip.chip_erase() {
                Ok(()) => Ok(()),
                Err(Error::Bus(_)) => self.bus_error(),
                Err(_) => self.output.print("Erase failed\r\n"),
            },
            Command::Lock => match self.chip.lock() {
                Ok(()) => Ok(()),
                Err(_) => self.bus_error(),
            },
            Command::Unlock => match self.chip.unlock() {
                Ok(()) => Ok(()),
                Err(_) => self.bus_error(),
            },
            Command::BlankCheck => match self.chip.blank_check() {
                Ok(true) => Ok(()),
                Ok(false) => self.output.print("Not blank\r\n"),
                Err(_) => self.bus_error(),
            },
            Command::Unknown => self.output.print("?"),
        }
    }

    fn bus_error(&mut self) -> Result<(), O::Error> {
        error!("bus error");
        self.output.print("bus error\r\n")
    }
}
