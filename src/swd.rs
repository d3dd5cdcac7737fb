//! SWD packet codec.
//!
//! Everything in here is free of side effects: bit-string conversions,
//! parity, request packet construction and ACK decoding. Bit strings are
//! always least-significant bit first, which is the order SWD puts bits on
//! the wire.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};

/// The JTAG-to-SWD switching sequence, clocked out LSB first.
pub const JTAG_TO_SWD: u16 = 0xE79E;

/// Address flag OR-ed into the register offset by
/// [`SwdEngine::write_access_port`](crate::engine::SwdEngine::write_access_port).
pub const AP_WRITE_FLAG: u8 = 0x10;

/// Available DP registers, as byte offsets.
#[repr(u8)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, IntoPrimitive, TryFromPrimitive)]
#[allow(missing_docs)]
pub enum DPRegister {
    DPIDR = 0x0,
    CTRLSTAT = 0x4,
    SELECT = 0x8,
    RDBUFF = 0xC,
}

/// Registers of the default AHB-AP, as byte offsets.
#[repr(u8)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, IntoPrimitive, TryFromPrimitive)]
#[allow(missing_docs)]
pub enum APRegister {
    CSW = 0x00,
    TAR = 0x04,
    DRW = 0x0C,
    IDR = 0xFC,
}

/// Encode if a transaction is for AP or DP.
#[repr(u8)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, IntoPrimitive, TryFromPrimitive)]
pub enum APnDP {
    /// For DP.
    DP = 0,
    /// For AP.
    AP = 1,
}

/// Encode if an SWD transaction is a read or a write.
#[repr(u8)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, IntoPrimitive, TryFromPrimitive)]
pub enum RnW {
    /// Write flag.
    W = 0,
    /// Read flag.
    R = 1,
}

/// The different kinds of SWD Ack.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Ack {
    /// `0b001`
    Ok,
    /// `0b010`, the target is busy and the request should be repeated.
    Wait,
    /// `0b100`
    Fault,
    /// Anything else. `0b111` means nobody drove the line, `0b000` means it
    /// was held low.
    Protocol(u8),
}

impl Ack {
    /// Decode the three ACK bits, packed LSB first.
    pub fn from_bits(ack: u8) -> Self {
        match ack & 0b111 {
            0b001 => Ack::Ok,
            0b010 => Ack::Wait,
            0b100 => Ack::Fault,
            other => Ack::Protocol(other),
        }
    }

    /// Map a non-OK ack to the matching error. `Wait` reports one attempt.
    pub fn try_ok(self) -> Result<()> {
        match self {
            Ack::Ok => Ok(()),
            Ack::Wait => Err(Error::AckWait(1)),
            Ack::Fault => Err(Error::AckFault),
            Ack::Protocol(raw) => Err(Error::AckProtocol(raw)),
        }
    }
}

/// Result of a 32-bit read from the target.
///
/// A parity mismatch does not fail the read, real links glitch now and then
/// and the caller gets to decide. Use [`Transfer::checked`] to turn it into
/// an error.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Transfer {
    /// The data word.
    pub value: u32,
    /// Whether the received parity bit matched the data.
    pub parity_ok: bool,
}

impl Transfer {
    /// Decode 32 data bits followed by one parity bit.
    pub fn from_bits(bits: &[bool]) -> Result<Self> {
        if bits.len() != 33 {
            return Err(Error::Protocol(format!(
                "expected 33 data bits, got {}",
                bits.len()
            )));
        }
        let value = bits_to_int(&bits[..32]);
        Ok(Transfer {
            value,
            parity_ok: bits[32] == calculate_parity(value, 32),
        })
    }

    /// The value, or [`Error::BadParity`] if the parity bit was wrong.
    pub fn checked(self) -> Result<u32> {
        if self.parity_ok {
            Ok(self.value)
        } else {
            Err(Error::BadParity(self.value))
        }
    }
}

/// Convert an LSB-first bit string to an integer.
///
/// Bits past the 32nd are ignored.
pub fn bits_to_int(bits: &[bool]) -> u32 {
    bits.iter()
        .take(32)
        .enumerate()
        .fold(0, |acc, (i, &bit)| acc | ((bit as u32) << i))
}

/// Convert the low `width` bits of `value` to an LSB-first bit string.
pub fn int_to_bits(value: u32, width: usize) -> Vec<bool> {
    (0..width)
        .map(|i| i < 32 && value & (1 << i) != 0)
        .collect()
}

/// Returns `true` if the low `width` bits of `value` contain an odd number
/// of ones, i.e. the parity bit to append so the total count is even.
pub fn calculate_parity(value: u32, width: usize) -> bool {
    let masked = if width >= 32 {
        value
    } else {
        value & ((1 << width) - 1)
    };
    masked.count_ones() % 2 == 1
}

/// Build the 8-bit request packet.
///
/// Layout, bit 0 first: start(1), APnDP, RnW, A2, A3, parity over the four
/// previous fields, stop(0), park(1). Only bits [3:2] of `addr` are used.
pub fn build_request(apndp: APnDP, rnw: RnW, addr: u8) -> u8 {
    let a2 = (addr >> 2) & 1;
    let a3 = (addr >> 3) & 1;
    let fields = (apndp as u8) | (rnw as u8) << 1 | a2 << 2 | a3 << 3;
    let parity = calculate_parity(fields as u32, 4) as u8;
    0b1000_0001 | fields << 1 | parity << 5
}
