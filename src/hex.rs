//! Intel HEX records: decoding what the host sends, encoding memory dumps.
//!
//! Decoding is lenient the same way the programmer always was: a character
//! that is not a hex digit counts as digit `0`, and missing digits at the end
//! of a line read as zero. Such a line almost always fails the checksum
//! anyway.

use crate::{blocking::Chip, bus::ParallelBus, error::Error, serial::Print, watchdog::Watchdog};
use embedded_hal::delay::DelayNs;
use embedded_io::Write;
use heapless::Vec;

/// A record can announce at most 255 data bytes
pub const MAX_DATA: usize = 255;

/// Data bytes per record in a dump
pub const DUMP_RECORD_SIZE: usize = 16;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    Data = 0x00,
    EndOfFile = 0x01,
    /// Upper 16 address bits. The chip is only 32kB, so they are taken as zero.
    ExtendedLinearAddress = 0x04,
}

impl TryFrom<u8> for RecordType {
    type Error = HexError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0x00 => Ok(RecordType::Data),
            0x01 => Ok(RecordType::EndOfFile),
            0x04 => Ok(RecordType::ExtendedLinearAddress),
            other => Err(HexError::UnsupportedType(other)),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    BadChecksum,
    UnsupportedType(u8),
}

/// Failure while dumping memory as HEX records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpError<BusError, OutputError> {
    Chip(Error<BusError>),
    Output(OutputError),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordType,
    pub address: u16,
    pub data: Vec<u8, MAX_DATA>,
}

impl Record {
    /// Parse one record line, with or without the leading `:`. The checksum
    /// is checked before anything else.
    pub fn decode(line: &[u8]) -> Result<Record, HexError> {
        if !checksum_ok(line) {
            return Err(HexError::BadChecksum);
        }
        let mut digits = Digits::new(line);
        let count = digits.next_byte();
        let high = digits.next_byte();
        let low = digits.next_byte();
        let kind = RecordType::try_from(digits.next_byte())?;
        let data = (0..count).map(|_| digits.next_byte()).collect();
        Ok(Record {
            kind,
            address: u16::from_be_bytes([high, low]),
            data,
        })
    }
}

/// Sum of every byte on the line, checksum included, is zero
pub fn checksum_ok(line: &[u8]) -> bool {
    let mut digits = Digits::new(line);
    let mut sum = 0u8;
    while !digits.is_empty() {
        sum = sum.wrapping_add(digits.next_byte());
    }
    sum == 0
}

pub(crate) fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

pub(crate) fn hex_digits(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

/// Pairs of hex digits read as bytes
struct Digits<'a> {
    rest: &'a [u8],
}

impl<'a> Digits<'a> {
    fn new(line: &'a [u8]) -> Self {
        Self {
            rest: line.strip_prefix(b":").unwrap_or(line),
        }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn next_byte(&mut self) -> u8 {
        let rest = self.rest;
        match rest {
            [] => 0,
            [high] => {
                self.rest = &[];
                nibble(*high) << 4
            }
            [high, low, tail @ ..] => {
                self.rest = tail;
                (nibble(*high) << 4) | nibble(*low)
            }
        }
    }
}

/// Write one record terminated by CRLF
pub fn encode_record<O: Write + ?Sized>(
    out: &mut O,
    kind: RecordType,
    address: u16,
    data: &[u8],
) -> Result<(), O::Error> {
    debug_assert!(data.len() <= MAX_DATA);
    let [high, low] = address.to_be_bytes();
    let count = data.len() as u8;
    let mut sum = count
        .wrapping_add(high)
        .wrapping_add(low)
        .wrapping_add(kind as u8);

    out.write_all(b":")?;
    out.print_hex8(count)?;
    out.print_hex16(address)?;
    out.print_hex8(kind as u8)?;
    for &byte in data {
        sum = sum.wrapping_add(byte);
        out.print_hex8(byte)?;
    }
    out.print_hex8(sum.wrapping_neg())?;
    out.write_all(b"\r\n")
}

/// Program the payload of a data record. Other record types need no action.
pub fn write_record<BUS, D, W, E>(chip: &mut Chip<BUS, D, W>, record: &Record) -> Result<(), Error<E>>
where
    BUS: ParallelBus<Error = E>,
    D: DelayNs,
    W: Watchdog,
{
    match record.kind {
        RecordType::Data => {
            chip.set_address(record.address)?;
            chip.page_write(&record.data)
        }
        RecordType::EndOfFile | RecordType::ExtendedLinearAddress => Ok(()),
    }
}

/// Dump `length` bytes from `start` as a complete HEX file: an extended
/// linear address record, 16 byte data records and the end-of-file record.
///
/// Bounds are not checked, see [`check_range`](crate::check_range).
pub fn dump_range<BUS, D, W, E, O>(
    chip: &mut Chip<BUS, D, W>,
    start: u16,
    length: u16,
    out: &mut O,
) -> Result<(), DumpError<E, O::Error>>
where
    BUS: ParallelBus<Error = E>,
    D: DelayNs,
    W: Watchdog,
    O: Write + ?Sized,
{
    encode_record(out, RecordType::ExtendedLinearAddress, 0, &[0, 0]).map_err(DumpError::Output)?;

    let mut address = start;
    let mut remaining = length as usize;
    let mut chunk = [0u8; DUMP_RECORD_SIZE];
    while remaining > 0 {
        let size = remaining.min(DUMP_RECORD_SIZE);
        chip.read_bytes(address, &mut chunk[..size]).map_err(DumpError::Chip)?;
        encode_record(out, RecordType::Data, address, &chunk[..size]).map_err(DumpError::Output)?;
        address = address.wrapping_add(size as u16);
        remaining -= size;
        chip.kick_watchdog();
    }

    encode_record(out, RecordType::EndOfFile, 0, &[]).map_err(DumpError::Output)
}
