use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer direction selected by the low bit of the address byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Direction {
    /// Master writes to the responder (R/W bit 0).
    Write,
    /// Master reads from the responder (R/W bit 1).
    Read,
}

impl Direction {
    pub const fn from_bit(byte: u8) -> Self {
        if byte & 0x01 == 0x01 {
            Self::Read
        } else {
            Self::Write
        }
    }

    #[must_use]
    pub const fn bit(&self) -> u8 {
        match self {
            Self::Write => 0,
            Self::Read => 1,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "Write",
            Self::Read => "Read",
        }
    }
}

impl AsRef<str> for Direction {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// An observable protocol event produced by the responder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Start,
    Stop,
    /// Address byte decoded after a start condition.
    Address {
        byte: u8,
        address: u8,
        direction: Direction,
        matched: bool,
    },
    /// Data byte received during a write transfer.
    Received { byte: u8 },
    /// Data byte transmitted during a read transfer, with the master's response.
    Transmitted { byte: u8, acked: bool },
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::Stop => write!(f, "Stop"),
            Self::Address {
                byte,
                address,
                direction,
                matched,
            } => write!(
                f,
                "Received: 0x{byte:02x} address 0x{address:02x} {} {}",
                direction.as_str(),
                if *matched { "matched" } else { "ignored" }
            ),
            Self::Received { byte } => write!(f, "Received: 0x{byte:02x}"),
            Self::Transmitted { byte, acked } => write!(
                f,
                "Transmit: 0x{byte:02x} {}",
                if *acked { "ACK" } else { "NACK" }
            ),
        }
    }
}
