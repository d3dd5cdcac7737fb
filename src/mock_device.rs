use std::collections::VecDeque;
use std::io;

use crate::driver::{BitBridge, Channel, Command, DelayNs};
use crate::error::Result;

#[mockall::automock]
pub trait BridgeDevice {
    // pins
    fn clock_high(&mut self) -> Result<()>;
    fn clock_low(&mut self) -> Result<()>;
    fn data_high(&mut self) -> Result<()>;
    fn data_low(&mut self) -> Result<()>;
    fn data_input(&mut self) -> Result<()>;
    fn data_output(&mut self) -> Result<()>;
    fn data_read(&mut self) -> Result<bool>;

    // buffered
    fn write_bits(&mut self, bits: &[bool]) -> Result<()>;
    fn read_bits(&mut self, count: usize) -> Result<Vec<bool>>;
    fn write_byte(&mut self, value: u8) -> Result<()>;
    fn read_byte(&mut self) -> Result<u8>;
    fn line_reset(&mut self) -> Result<()>;

    // composite
    fn idle_cycles(&mut self, count: usize) -> Result<()>;
    fn turnaround(&mut self) -> Result<()>;
}

impl BitBridge for MockBridgeDevice {
    fn clock_high(&mut self) -> Result<()> {
        BridgeDevice::clock_high(self)
    }

    fn clock_low(&mut self) -> Result<()> {
        BridgeDevice::clock_low(self)
    }

    fn data_high(&mut self) -> Result<()> {
        BridgeDevice::data_high(self)
    }

    fn data_low(&mut self) -> Result<()> {
        BridgeDevice::data_low(self)
    }

    fn data_input(&mut self) -> Result<()> {
        BridgeDevice::data_input(self)
    }

    fn data_output(&mut self) -> Result<()> {
        BridgeDevice::data_output(self)
    }

    fn data_read(&mut self) -> Result<bool> {
        BridgeDevice::data_read(self)
    }

    fn write_bits(&mut self, bits: &[bool]) -> Result<()> {
        BridgeDevice::write_bits(self, bits)
    }

    fn read_bits(&mut self, count: usize) -> Result<Vec<bool>> {
        BridgeDevice::read_bits(self, count)
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        BridgeDevice::write_byte(self, value)
    }

    fn read_byte(&mut self) -> Result<u8> {
        BridgeDevice::read_byte(self)
    }

    fn line_reset(&mut self) -> Result<()> {
        BridgeDevice::line_reset(self)
    }

    fn idle_cycles(&mut self, count: usize) -> Result<()> {
        BridgeDevice::idle_cycles(self, count)
    }

    fn turnaround(&mut self) -> Result<()> {
        BridgeDevice::turnaround(self)
    }
}

/// Skips the settle delay.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// In-memory stand-in for the bridge firmware.
///
/// Buffered bit and byte writes are queued and handed back by the matching
/// reads, so anything written can be read back.
pub struct SimChannel {
    /// Lines answered to a status query.
    pub banner: Vec<String>,
    /// Line sent where the firmware would send `OK`.
    pub ok_reply: String,
    /// Overrides the pin read reply.
    pub pin_reply: Option<u8>,
    /// Number of characters to leave off buffered read replies.
    pub drop_read_bits: usize,
    /// Never answer anything.
    pub silent: bool,
    /// What a read of an empty reply queue reports, `None` for a
    /// zero-length read.
    pub empty_read: Option<io::ErrorKind>,
    swdio: bool,
    pending: Vec<u8>,
    written: Vec<u8>,
    commands: Vec<Command>,
    reply: VecDeque<u8>,
    bits: VecDeque<bool>,
    scripted_bits: VecDeque<String>,
    bytes: VecDeque<u8>,
}

impl SimChannel {
    pub fn new() -> Self {
        SimChannel {
            banner: vec!["SWD Bridge v1.0".into(), "SWCLK=GP2 SWDIO=GP3".into()],
            ok_reply: "OK".into(),
            pin_reply: None,
            drop_read_bits: 0,
            silent: false,
            empty_read: Some(io::ErrorKind::TimedOut),
            swdio: false,
            pending: Vec::new(),
            written: Vec::new(),
            commands: Vec::new(),
            // Printed by the firmware at boot, must be flushed by connect.
            reply: b"SWD Bridge Ready\r\n".iter().copied().collect(),
            bits: VecDeque::new(),
            scripted_bits: VecDeque::new(),
            bytes: VecDeque::new(),
        }
    }

    /// Every byte sent by the host.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Every complete command received.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Answer the next buffered bit read with `bits` instead of looping
    /// written bits back, e.g. a target's ACK or data phase.
    pub fn queue_bits(&mut self, bits: &str) {
        self.scripted_bits.push_back(bits.to_string());
    }

    /// Queue unsolicited bytes for the host.
    pub fn inject(&mut self, data: &[u8]) {
        self.reply.extend(data);
    }

    fn line(&mut self, line: &str) {
        self.reply.extend(line.as_bytes());
        self.reply.extend(b"\r\n");
    }

    /// Run every complete command in `pending`.
    fn process(&mut self) {
        loop {
            let Some(&opcode) = self.pending.first() else {
                return;
            };
            let command = match Command::try_from(opcode) {
                Ok(command) => command,
                Err(_) => {
                    self.pending.remove(0);
                    continue;
                }
            };
            let mut len = 1 + command.arg_len();
            if command == Command::WriteBits && self.pending.len() > 1 {
                len += self.pending[1] as usize;
            }
            if self.pending.len() < len {
                return;
            }
            let frame: Vec<u8> = self.pending.drain(..len).collect();
            self.commands.push(command);
            if !self.silent {
                self.execute(command, &frame[1..]);
            }
        }
    }

    fn execute(&mut self, command: Command, args: &[u8]) {
        match command {
            Command::Status => {
                for line in self.banner.clone() {
                    self.line(&line);
                }
                self.line("");
            }
            Command::DataHigh => self.swdio = true,
            Command::DataLow => self.swdio = false,
            Command::DataRead => {
                let reply = self
                    .pin_reply
                    .unwrap_or(if self.swdio { b'1' } else { b'0' });
                self.reply.push_back(reply);
            }
            Command::LineReset => {
                let ok = self.ok_reply.clone();
                self.line(&ok);
            }
            Command::WriteBits => {
                self.bits.extend(args[1..].iter().map(|&c| c == b'1'));
                let ok = self.ok_reply.clone();
                self.line(&ok);
            }
            Command::ReadBits if !self.scripted_bits.is_empty() => {
                let line = self.scripted_bits.pop_front().unwrap_or_default();
                self.line(&line);
            }
            Command::ReadBits => {
                let count = (args[0] as usize).saturating_sub(self.drop_read_bits);
                let line: String = (0..count)
                    .map(|_| if self.bits.pop_front().unwrap_or(false) { '1' } else { '0' })
                    .collect();
                self.line(&line);
            }
            Command::WriteByte => self.bytes.push_back(args[0]),
            Command::ReadByte => {
                if let Some(byte) = self.bytes.pop_front() {
                    self.reply.push_back(byte);
                }
            }
            _ => {}
        }
    }
}

impl io::Read for SimChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.reply.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 {
            if let Some(kind) = self.empty_read {
                return Err(kind.into());
            }
        }
        Ok(n)
    }
}

impl io::Write for SimChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        self.pending.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for SimChannel {
    fn clear_input(&mut self) -> io::Result<()> {
        self.reply.clear();
        Ok(())
    }
}
