//! DP IDCODE decoding.

use core::fmt;

/// JEP106 designer code of ARM Ltd.
pub const DESIGNER_ARM: u16 = 0x23B;

/// Part number reported by the RP2040.
pub const PART_RP2040: u16 = 0x0001;

/// The value of the DP IDCODE (DPIDR) register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdCode(u32);

impl IdCode {
    /// Wrap a raw register value.
    pub const fn new(value: u32) -> Self {
        IdCode(value)
    }

    /// The raw register value.
    pub fn data(&self) -> u32 {
        self.0
    }

    /// Bits 31:28.
    pub fn version(&self) -> u8 {
        ((self.0 >> 28) & 0xF) as u8
    }

    /// Bits 27:12.
    pub fn part_number(&self) -> u16 {
        ((self.0 >> 12) & 0xFFFF) as u16
    }

    /// JEP106 designer, bits 11:1.
    pub fn designer(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// Bit 0, reads as one on every valid IDCODE.
    pub fn rao(&self) -> bool {
        self.0 & 1 != 0
    }

    /// Designed by ARM.
    pub fn is_arm(&self) -> bool {
        self.designer() == DESIGNER_ARM
    }

    /// Part number matches the RP2040.
    pub fn is_rp2040(&self) -> bool {
        self.part_number() == PART_RP2040
    }

    /// Name of the designer if known.
    pub fn designer_name(&self) -> &'static str {
        match self.designer() {
            DESIGNER_ARM => "ARM Ltd",
            _ => "Unknown",
        }
    }
}

impl From<u32> for IdCode {
    fn from(value: u32) -> Self {
        IdCode(value)
    }
}

impl fmt::Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(
                f,
                "{:#010X} (version {}, part {:#06X}, designer {:#05X} {})",
                self.0,
                self.version(),
                self.part_number(),
                self.designer(),
                self.designer_name()
            )
        } else {
            write!(f, "{:#010X}", self.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cortex_m0_plus_dp() {
        let idcode = IdCode::new(0x0BC1_1477);
        assert_eq!(idcode.version(), 0);
        assert_eq!(idcode.part_number(), 0xBC11);
        assert_eq!(idcode.designer(), DESIGNER_ARM);
        assert!(idcode.rao());
        assert!(idcode.is_arm());
        assert!(!idcode.is_rp2040());
    }

    #[test]
    fn rp2040_part() {
        let idcode = IdCode::from(0x1000_1477);
        assert_eq!(idcode.version(), 1);
        assert!(idcode.is_rp2040());
        assert_eq!(idcode.designer_name(), "ARM Ltd");
    }

    #[test]
    fn display() {
        let idcode = IdCode::new(0x0BC1_1477);
        assert_eq!(format!("{idcode}"), "0x0BC11477");
        assert_eq!(
            format!("{idcode:#}"),
            "0x0BC11477 (version 0, part 0xBC11, designer 0x23B ARM Ltd)"
        );
        assert_eq!(IdCode::new(0x0BC1_1000).designer_name(), "Unknown");
    }
}
