use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bridge command opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Command {
    // Identification
    Status = 0x3F, // '?'

    // Pin control
    ClockHigh = 0x43, // 'C'
    ClockLow = 0x63, // 'c'
    DataHigh = 0x44, // 'D'
    DataLow = 0x64, // 'd'
    DataInput = 0x49, // 'I'
    DataOutput = 0x4F, // 'O'
    DataRead = 0x52, // 'R'

    // Sequences
    LineReset = 0x72, // 'r'
    WriteBits = 0x57, // 'W'
    ReadBits = 0x58, // 'X'
    WriteByte = 0x42, // 'B'
    ReadByte = 0x62, // 'b'
}

/// What the bridge sends back after a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Nothing.
    None,
    /// A single raw byte.
    Byte,
    /// One newline-terminated text line.
    Line,
    /// Text lines up to an empty line.
    Lines,
}

impl Command {
    /// Number of argument bytes following the opcode. `WriteBits` is
    /// additionally followed by as many bit characters as its first argument
    /// says.
    #[cfg(test)]
    pub(crate) fn arg_len(self) -> usize {
        match self {
            Command::WriteBits | Command::ReadBits | Command::WriteByte => 1,
            _ => 0,
        }
    }

    /// The reply shape for this command.
    pub fn response(self) -> Response {
        match self {
            Command::Status => Response::Lines,
            Command::DataRead | Command::ReadByte => Response::Byte,
            Command::LineReset | Command::WriteBits | Command::ReadBits => Response::Line,
            _ => Response::None,
        }
    }
}
