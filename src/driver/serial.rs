//! [`BitBridge`] over the bridge's serial command protocol.

use std::io::ErrorKind;

use serialport::SerialPort;

use super::{BitBridge, BridgeConfig, Channel, Command, DelayNs, Pins, Response, StdDelay};
use crate::error::{Error, Result};

/// A reply read according to [`Command::response`].
#[derive(Clone, Debug, PartialEq, Eq)]
enum Reply {
    None,
    Byte(Option<u8>),
    Line(String),
    Lines(Vec<String>),
}

impl Reply {
    fn expect_ok(self, what: &str) -> Result<()> {
        match self {
            Reply::Line(line) if line == "OK" => Ok(()),
            Reply::Line(line) => Err(Error::Protocol(format!("{what} failed: {line:?}"))),
            other => Err(Error::Protocol(format!("{what} failed: {other:?}"))),
        }
    }
}

/// The bit bridge driver.
///
/// Owns the channel for its whole lifetime; dropping the bridge closes it.
pub struct SerialBridge<C: Channel> {
    channel: C,
    identity: String,
    pins: Pins,
}

impl SerialBridge<Box<dyn SerialPort>> {
    /// Open the serial port named in `config` and [`connect`](Self::connect)
    /// to the bridge on it.
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        info!("opening {} at {} baud", config.port, config.baud_rate);
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.timeout)
            .open()?;
        Self::connect(port, config, &mut StdDelay)
    }
}

impl<C: Channel> SerialBridge<C> {
    /// Take over an open channel and check that a bridge is listening.
    ///
    /// Waits `config.settle` for the device, throws away anything it printed
    /// at startup and sends a status query. The reply must contain
    /// `config.identity`, otherwise [`Error::Connection`] is returned and the
    /// channel is dropped.
    pub fn connect<D: DelayNs>(channel: C, config: &BridgeConfig, delay: &mut D) -> Result<Self> {
        let mut bridge = SerialBridge {
            channel,
            identity: String::new(),
            pins: Pins::empty(),
        };

        delay.delay_ms(config.settle.as_millis().try_into().unwrap_or(u32::MAX));
        bridge.channel.clear_input()?;

        let lines = match bridge.command(Command::Status, &[])? {
            Reply::Lines(lines) => lines,
            other => return Err(Error::Connection(format!("{other:?}"))),
        };
        let response = lines.join("\n");
        if !response.contains(config.identity.as_str()) {
            return Err(Error::Connection(response));
        }

        bridge.identity = lines.into_iter().next().unwrap_or_default();
        info!("connected to: {}", bridge.identity);
        Ok(bridge)
    }

    /// First line of the bridge's status reply.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Pin state as last driven by this driver.
    pub fn pins(&self) -> Pins {
        self.pins
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Borrow the underlying channel mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give back the channel without closing it.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Send one command and read its reply.
    fn command(&mut self, command: Command, args: &[u8]) -> Result<Reply> {
        trace!("bridge <- {:?} ({} arg bytes)", command, args.len());

        let mut frame = Vec::with_capacity(1 + args.len());
        frame.push(command.into());
        frame.extend_from_slice(args);
        self.channel.write_all(&frame)?;
        self.channel.flush()?;

        let reply = match command.response() {
            Response::None => Reply::None,
            Response::Byte => Reply::Byte(self.read_raw()?),
            Response::Line => Reply::Line(self.read_line()?),
            Response::Lines => Reply::Lines(self.read_lines()?),
        };
        trace!("bridge -> {:?}", reply);
        Ok(reply)
    }

    /// One byte, or `None` if the channel timed out.
    fn read_raw(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.channel.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// A trimmed line. A timeout part way through returns what arrived, a
    /// timeout before anything arrived is [`Error::Timeout`].
    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        loop {
            match self.read_raw()? {
                Some(b'\n') => break,
                Some(byte) => line.push(byte),
                None if line.is_empty() => return Err(Error::Timeout),
                None => break,
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Lines up to an empty one or a timeout.
    fn read_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            match self.read_line() {
                Ok(line) if line.is_empty() => break,
                Ok(line) => lines.push(line),
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(lines)
    }

    fn pin_command(&mut self, command: Command) -> Result<()> {
        self.command(command, &[])?;
        match command {
            Command::ClockHigh => self.pins.insert(Pins::SWCLK),
            Command::ClockLow => self.pins.remove(Pins::SWCLK),
            Command::DataHigh => self.pins.insert(Pins::SWDIO),
            Command::DataLow => self.pins.remove(Pins::SWDIO),
            Command::DataInput => self.pins.remove(Pins::SWDIO_OUTPUT),
            Command::DataOutput => self.pins.insert(Pins::SWDIO_OUTPUT),
            _ => {}
        }
        Ok(())
    }
}

impl<C: Channel> BitBridge for SerialBridge<C> {
    fn clock_high(&mut self) -> Result<()> {
        self.pin_command(Command::ClockHigh)
    }

    fn clock_low(&mut self) -> Result<()> {
        self.pin_command(Command::ClockLow)
    }

    fn data_high(&mut self) -> Result<()> {
        self.pin_command(Command::DataHigh)
    }

    fn data_low(&mut self) -> Result<()> {
        self.pin_command(Command::DataLow)
    }

    fn data_input(&mut self) -> Result<()> {
        self.pin_command(Command::DataInput)
    }

    fn data_output(&mut self) -> Result<()> {
        self.pin_command(Command::DataOutput)
    }

    fn data_read(&mut self) -> Result<bool> {
        match self.command(Command::DataRead, &[])? {
            Reply::Byte(Some(b'1')) => Ok(true),
            Reply::Byte(Some(b'0')) => Ok(false),
            Reply::Byte(None) => Err(Error::Timeout),
            other => Err(Error::Protocol(format!("pin read returned {other:?}"))),
        }
    }

    fn write_bits(&mut self, bits: &[bool]) -> Result<()> {
        let count = u8::try_from(bits.len()).map_err(|_| Error::TooManyBits(bits.len()))?;

        let mut args = Vec::with_capacity(1 + bits.len());
        args.push(count);
        args.extend(bits.iter().map(|&bit| if bit { b'1' } else { b'0' }));

        self.command(Command::WriteBits, &args)?.expect_ok("write bits")?;
        self.pins.insert(Pins::SWDIO_OUTPUT);
        Ok(())
    }

    fn read_bits(&mut self, count: usize) -> Result<Vec<bool>> {
        let n = u8::try_from(count).map_err(|_| Error::TooManyBits(count))?;

        let line = match self.command(Command::ReadBits, &[n])? {
            Reply::Line(line) => line,
            other => return Err(Error::Protocol(format!("read bits returned {other:?}"))),
        };
        self.pins.remove(Pins::SWDIO_OUTPUT);

        if line.len() != count {
            return Err(Error::Protocol(format!(
                "expected {count} bits, got {}",
                line.len()
            )));
        }
        line.bytes()
            .map(|c| match c {
                b'1' => Ok(true),
                b'0' => Ok(false),
                other => Err(Error::Protocol(format!(
                    "invalid bit character {:?}",
                    other as char
                ))),
            })
            .collect()
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.command(Command::WriteByte, &[value])?;
        self.pins.insert(Pins::SWDIO_OUTPUT);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        match self.command(Command::ReadByte, &[])? {
            Reply::Byte(Some(value)) => {
                self.pins.remove(Pins::SWDIO_OUTPUT);
                Ok(value)
            }
            _ => Err(Error::Protocol("failed to read byte".into())),
        }
    }

    fn line_reset(&mut self) -> Result<()> {
        self.channel.clear_input()?;
        self.command(Command::LineReset, &[])?.expect_ok("line reset")?;
        self.pins.insert(Pins::SWDIO_OUTPUT | Pins::SWDIO);
        Ok(())
    }
}
