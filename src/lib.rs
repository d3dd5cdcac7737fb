//! SWD host driver for bit-banged GPIO bridges.
//!
//! The bridge is a microcontroller that exposes SWCLK and SWDIO through a
//! one-byte command protocol on a serial port. [`driver::SerialBridge`]
//! speaks that protocol and implements [`driver::BitBridge`], the pin-level
//! interface [`engine::SwdEngine`] runs the SWD wire protocol on.
//!
//! ```no_run
//! use bitbridge_swd::driver::{BridgeConfig, SerialBridge};
//! use bitbridge_swd::engine::{Config, SwdEngine};
//! use bitbridge_swd::idcode::IdCode;
//!
//! # fn main() -> bitbridge_swd::error::Result<()> {
//! let bridge = SerialBridge::open(&BridgeConfig::new("/dev/ttyACM0"))?;
//! let mut swd = SwdEngine::new(bridge, Config::default());
//! swd.switch_to_swd()?;
//! let idcode = IdCode::from(swd.read_idcode()?.checked()?);
//! println!("IDCODE: {idcode:#}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod driver;
pub mod engine;
pub mod error;
pub mod idcode;
pub mod swd;

#[cfg(test)]
mod mock_device;
