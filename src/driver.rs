//! Bit bridge driver.
//!
//! The bridge is a small microcontroller exposing two GPIOs (SWCLK and
//! SWDIO) through a single-byte command protocol on a serial link. The
//! [`BitBridge`] trait is the pin-level capability the SWD engine is written
//! against, [`SerialBridge`] implements it over any [`Channel`].

use std::io;
use std::time::Duration;

use bitflags::bitflags;
use serialport::{ClearBuffer, SerialPort};

pub use embedded_hal::delay::DelayNs;

use crate::error::Result;

mod command;
mod serial;

pub use command::*;
pub use serial::*;

bitflags! {
    /// Last pin state driven through the bridge.
    pub struct Pins: u8 {
        /// SWCLK is high.
        const SWCLK = 1 << 0;
        /// SWDIO is driven high.
        const SWDIO = 1 << 1;
        /// SWDIO is an output.
        const SWDIO_OUTPUT = 1 << 2;
    }
}

/// A duplex byte stream to the bridge.
pub trait Channel: io::Read + io::Write {
    /// Drop any bytes received but not yet read.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl Channel for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Connection settings for a [`SerialBridge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Serial port path, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    /// Baud rate. The bridge is USB CDC so this is mostly cosmetic.
    pub baud_rate: u32,
    /// Upper bound for every blocking read.
    pub timeout: Duration,
    /// How long to wait after opening the port before talking to the bridge.
    pub settle: Duration,
    /// Substring the status reply must contain.
    pub identity: String,
}

impl BridgeConfig {
    /// Default settings for the given port.
    pub fn new(port: impl Into<String>) -> Self {
        BridgeConfig {
            port: port.into(),
            ..Default::default()
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            port: String::new(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(1),
            settle: Duration::from_millis(600),
            identity: "SWD Bridge".into(),
        }
    }
}

/// [`DelayNs`] backed by `std::thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

/// Pin-level access to the SWD lines.
///
/// Every method blocks until the bridge has accepted the command and, where
/// the command has a reply, until the reply has been read.
pub trait BitBridge {
    /// Drive SWCLK high.
    fn clock_high(&mut self) -> Result<()>;
    /// Drive SWCLK low.
    fn clock_low(&mut self) -> Result<()>;
    /// Drive SWDIO high. Only has an effect in output mode.
    fn data_high(&mut self) -> Result<()>;
    /// Drive SWDIO low. Only has an effect in output mode.
    fn data_low(&mut self) -> Result<()>;
    /// Release SWDIO so the target can drive it.
    fn data_input(&mut self) -> Result<()>;
    /// Drive SWDIO from the bridge.
    fn data_output(&mut self) -> Result<()>;
    /// Sample SWDIO.
    fn data_read(&mut self) -> Result<bool>;

    /// Clock out up to 255 bits, LSB first.
    fn write_bits(&mut self, bits: &[bool]) -> Result<()>;
    /// Clock in up to 255 bits, LSB first.
    fn read_bits(&mut self, count: usize) -> Result<Vec<bool>>;

    /// Clock out one byte, LSB first.
    fn write_byte(&mut self, value: u8) -> Result<()>;
    /// Clock in one byte, LSB first.
    fn read_byte(&mut self) -> Result<u8>;

    /// At least 50 clocks with SWDIO high, performed by the bridge.
    fn line_reset(&mut self) -> Result<()>;

    /// `count` clocks with SWDIO driven low.
    fn idle_cycles(&mut self, count: usize) -> Result<()> {
        self.data_output()?;
        self.data_low()?;
        for _ in 0..count {
            self.clock_high()?;
            self.clock_low()?;
        }
        Ok(())
    }

    /// One clock with SWDIO released, for switching line direction.
    fn turnaround(&mut self) -> Result<()> {
        self.data_input()?;
        self.clock_high()?;
        self.clock_low()
    }

    /// Clock out a single bit using the pin primitives.
    fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.data_output()?;
        if bit {
            self.data_high()?;
        } else {
            self.data_low()?;
        }
        self.clock_high()?;
        self.clock_low()
    }

    /// Clock in a single bit using the pin primitives.
    fn read_bit(&mut self) -> Result<bool> {
        self.data_input()?;
        self.clock_high()?;
        let bit = self.data_read()?;
        self.clock_low()?;
        Ok(bit)
    }

    /// Clock out a 32-bit word as four bytes, least significant first.
    fn write_word(&mut self, word: u32) -> Result<()> {
        for byte in word.to_le_bytes() {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Clock in a 32-bit word as four bytes, least significant first.
    fn read_word(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for byte in bytes.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(u32::from_le_bytes(bytes))
    }
}
