//! SWD transaction engine.
//!
//! Drives request, ACK and data phases over a [`BitBridge`]. Every register
//! access runs to completion, or fails, before the next one starts.

use crate::driver::BitBridge;
use crate::error::{Error, Result};
use crate::swd::{
    bits_to_int, build_request, calculate_parity, int_to_bits, APRegister, APnDP, Ack,
    DPRegister, RnW, Transfer, AP_WRITE_FLAG, JTAG_TO_SWD,
};

/// The SWD engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of attempts while the target answers WAIT, used by the
    /// shorthand accessors.
    pub max_retries: usize,
    /// The number of idle cycles after a transfer.
    pub idle_cycles: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_retries: 100,
            idle_cycles: 8,
        }
    }
}

/// SWD host on top of a bit bridge.
pub struct SwdEngine<B: BitBridge> {
    bridge: B,
    config: Config,
    current_ap: u8,
}

impl<B: BitBridge> SwdEngine<B> {
    /// Wrap a connected bridge. Call [`switch_to_swd`](Self::switch_to_swd)
    /// before the first register access.
    pub fn new(bridge: B, config: Config) -> Self {
        SwdEngine {
            bridge,
            config,
            current_ap: 0,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// AP selected by the last successful [`select_ap`](Self::select_ap).
    pub fn current_ap(&self) -> u8 {
        self.current_ap
    }

    /// Borrow the bridge.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Borrow the bridge mutably, e.g. to drive pins directly.
    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Release the bridge.
    pub fn into_inner(self) -> B {
        self.bridge
    }

    /// SWD line reset.
    pub fn line_reset(&mut self) -> Result<()> {
        self.bridge.line_reset()
    }

    /// Move the target's debug port from JTAG to SWD.
    ///
    /// Harmless to repeat, it also serves to resynchronise after a
    /// protocol error.
    pub fn switch_to_swd(&mut self) -> Result<()> {
        debug!("switching target to SWD");
        self.bridge.line_reset()?;
        self.bridge.write_bits(&int_to_bits(JTAG_TO_SWD as u32, 16))?;
        self.idle()?;
        self.bridge.line_reset()?;
        self.idle()
    }

    /// Read a register, retrying while the target answers WAIT.
    ///
    /// `max_retries` counts attempts, so after `max_retries` WAITs in a row
    /// [`Error::AckWait`] is returned. A parity mismatch is logged and
    /// reported through [`Transfer::parity_ok`].
    pub fn read_register(&mut self, apndp: APnDP, addr: u8, max_retries: usize) -> Result<Transfer> {
        debug!("read_register({:?}, {:#x})", apndp, addr);
        let result = self.read_inner(apndp, addr, max_retries);
        self.reset_on_bridge_error(result)
    }

    /// Write a register, retrying while the target answers WAIT.
    pub fn write_register(
        &mut self,
        apndp: APnDP,
        addr: u8,
        data: u32,
        max_retries: usize,
    ) -> Result<()> {
        debug!("write_register({:?}, {:#x}, {:#010x})", apndp, addr, data);
        let result = self.write_inner(apndp, addr, data, max_retries);
        self.reset_on_bridge_error(result)
    }

    /// Read an AP register.
    ///
    /// AP reads are posted: the data phase of the AP request returns the
    /// result of the previous AP read and is discarded. The value is then
    /// fetched from RDBUFF. Only the RDBUFF read retries on WAIT.
    pub fn read_access_port(&mut self, addr: u8, max_retries: usize) -> Result<Transfer> {
        debug!("read_access_port({:#x})", addr);
        let posted = self.post_ap_read(addr);
        self.reset_on_bridge_error(posted)?;
        self.read_register(APnDP::DP, DPRegister::RDBUFF.into(), max_retries)
    }

    /// Write an AP register.
    ///
    /// Goes out as a DP write with [`AP_WRITE_FLAG`] OR-ed into the address.
    pub fn write_access_port(&mut self, addr: u8, data: u32, max_retries: usize) -> Result<()> {
        self.write_register(APnDP::DP, addr | AP_WRITE_FLAG, data, max_retries)
    }

    /// Read DPIDR.
    pub fn read_idcode(&mut self) -> Result<Transfer> {
        self.read_dp(DPRegister::DPIDR)
    }

    /// Read a DP register with the configured retry count.
    pub fn read_dp(&mut self, reg: DPRegister) -> Result<Transfer> {
        self.read_register(APnDP::DP, reg.into(), self.config.max_retries)
    }

    /// Write a DP register with the configured retry count.
    pub fn write_dp(&mut self, reg: DPRegister, data: u32) -> Result<()> {
        self.write_register(APnDP::DP, reg.into(), data, self.config.max_retries)
    }

    /// Read a register of the selected AP with the configured retry count.
    pub fn read_ap(&mut self, reg: APRegister) -> Result<Transfer> {
        self.read_access_port(reg.into(), self.config.max_retries)
    }

    /// Write a register of the selected AP with the configured retry count.
    pub fn write_ap(&mut self, reg: APRegister, data: u32) -> Result<()> {
        self.write_access_port(reg.into(), data, self.config.max_retries)
    }

    /// Point DP SELECT at another AP, bank 0.
    pub fn select_ap(&mut self, apsel: u8) -> Result<()> {
        self.write_dp(DPRegister::SELECT, (apsel as u32) << 24)?;
        self.current_ap = apsel;
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        self.bridge.idle_cycles(self.config.idle_cycles)
    }

    /// Send a request packet and collect the target's ACK.
    fn request(&mut self, apndp: APnDP, rnw: RnW, addr: u8) -> Result<Ack> {
        let req = build_request(apndp, rnw, addr);
        self.bridge.write_bits(&int_to_bits(req as u32, 8))?;
        self.bridge.turnaround()?;
        let ack = bits_to_int(&self.bridge.read_bits(3)?) as u8;
        trace!("request {:#04x} ack {:#05b}", req, ack);
        Ok(Ack::from_bits(ack))
    }

    /// Put the line back into a known state after a non-OK ACK and report it.
    fn finish_ack(&mut self, ack: Ack) -> Result<()> {
        match ack {
            Ack::Ok => {}
            Ack::Wait => {
                self.bridge.turnaround()?;
                self.idle()?;
            }
            Ack::Fault => self.bridge.turnaround()?,
            Ack::Protocol(raw) => {
                if let Err(e) = self.bridge.line_reset() {
                    warn!("line reset after ACK {:#05b} failed: {}", raw, e);
                }
            }
        }
        ack.try_ok()
    }

    fn read_inner(&mut self, apndp: APnDP, addr: u8, max_retries: usize) -> Result<Transfer> {
        for attempt in 1..=max_retries {
            let ack = self.request(apndp, RnW::R, addr)?;
            match self.finish_ack(ack) {
                Ok(()) => {}
                Err(Error::AckWait(_)) => {
                    trace!("WAIT on attempt {}", attempt);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let transfer = Transfer::from_bits(&self.bridge.read_bits(33)?)?;
            self.bridge.turnaround()?;
            self.idle()?;

            if !transfer.parity_ok {
                warn!(
                    "parity error reading {:?} {:#x}: {:#010x}",
                    apndp, addr, transfer.value
                );
            }
            return Ok(transfer);
        }

        warn!(
            "timeout reading {:?} {:#x} after {} WAIT responses",
            apndp, addr, max_retries
        );
        Err(Error::AckWait(max_retries))
    }

    fn write_inner(&mut self, apndp: APnDP, addr: u8, data: u32, max_retries: usize) -> Result<()> {
        for attempt in 1..=max_retries {
            let ack = self.request(apndp, RnW::W, addr)?;
            match self.finish_ack(ack) {
                Ok(()) => {}
                Err(Error::AckWait(_)) => {
                    trace!("WAIT on attempt {}", attempt);
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.bridge.turnaround()?;
            let mut bits = int_to_bits(data, 32);
            bits.push(calculate_parity(data, 32));
            self.bridge.write_bits(&bits)?;
            self.idle()?;
            return Ok(());
        }

        warn!(
            "timeout writing {:?} {:#x} after {} WAIT responses",
            apndp, addr, max_retries
        );
        Err(Error::AckWait(max_retries))
    }

    fn post_ap_read(&mut self, addr: u8) -> Result<()> {
        let ack = self.request(APnDP::AP, RnW::R, addr)?;
        self.finish_ack(ack)?;

        let stale = Transfer::from_bits(&self.bridge.read_bits(33)?)?;
        trace!("discarding posted read data {:#010x}", stale.value);
        self.bridge.turnaround()?;
        self.idle()
    }

    /// A garbled bridge reply leaves the line in an unknown state, so reset
    /// it before handing the error back.
    fn reset_on_bridge_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Protocol(msg)) = &result {
            warn!("bridge protocol error ({}), resetting line", msg);
            if let Err(e) = self.bridge.line_reset() {
                warn!("line reset failed: {}", e);
            }
        }
        result
    }
}
