//! The STCP wire format.
//!
//! Every datagram starts with a fixed 12-byte header in network byte order.
//! There are no ports (the host framework demultiplexes before the transport
//! sees a datagram), no checksum (the channel below is assumed to corrupt
//! nothing it delivers), and no options. The payload begins at
//! `4 * data_offset` bytes into the datagram.

use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// The fixed STCP segment header.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        Sequence Number                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Acknowledgment Number                      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Offset|  Rsvd |     Flags     |            Window             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StcpHeader {
    pub seq: u32,
    /// Only significant when the ACK control bit is set.
    pub ack: u32,
    pub ctl: Control,
    pub window: u16,
}

impl StcpHeader {
    /// The size of the header in bytes (12).
    pub const SIZE: usize = 12;

    /// Decodes a header from the front of a datagram. Returns the header and
    /// the offset at which the payload starts.
    pub fn from_bytes(datagram: &[u8]) -> Result<(Self, usize), WireError> {
        if datagram.len() < Self::SIZE {
            return Err(WireError::HeaderTooShort);
        }
        let seq = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        let ack = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
        let data_start = ((datagram[8] >> 4) as usize) * 4;
        let ctl = Control::from(datagram[9]);
        let window = u16::from_be_bytes([datagram[10], datagram[11]]);
        if data_start < Self::SIZE || data_start > datagram.len() {
            return Err(WireError::BogusDataOffset(data_start));
        }
        Ok((
            StcpHeader {
                seq,
                ack,
                ctl,
                window,
            },
            data_start,
        ))
    }

    /// Encodes the header for transmission. The data offset is always the
    /// fixed header size.
    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let seq = self.seq.to_be_bytes();
        let ack = self.ack.to_be_bytes();
        let window = self.window.to_be_bytes();
        [
            seq[0],
            seq[1],
            seq[2],
            seq[3],
            ack[0],
            ack[1],
            ack[2],
            ack[3],
            ((Self::SIZE / 4) as u8) << 4,
            self.ctl.into(),
            window[0],
            window[1],
        ]
    }
}

/// The control bits of a segment, in the classic `tcphdr` bit positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Control(u8);

impl Control {
    const FIN_BIT: u8 = 0x01;
    const SYN_BIT: u8 = 0x02;
    const ACK_BIT: u8 = 0x10;

    /// No control bits, e.g. for bare data probes.
    pub const NONE: Control = Control(0);
    /// A pure connection request.
    pub const SYN: Control = Control(Self::SYN_BIT);
    /// The second leg of the handshake.
    pub const SYN_ACK: Control = Control(Self::SYN_BIT | Self::ACK_BIT);
    /// An acknowledgment, with or without piggy-backed data.
    pub const ACK: Control = Control(Self::ACK_BIT);
    /// End of the local write stream.
    pub const FIN: Control = Control(Self::FIN_BIT);

    /// Acknowledgment field significant
    pub fn ack(self) -> bool {
        self.0 & Self::ACK_BIT != 0
    }

    /// Synchronize sequence numbers
    pub fn syn(self) -> bool {
        self.0 & Self::SYN_BIT != 0
    }

    /// No more data from sender
    pub fn fin(self) -> bool {
        self.0 & Self::FIN_BIT != 0
    }

    /// Strips the SYN and FIN bits. Used when a segment is clipped to the
    /// receive window and the markers fall outside it.
    pub fn clear_markers(&mut self) {
        self.0 &= !(Self::SYN_BIT | Self::FIN_BIT);
    }
}

impl From<u8> for Control {
    fn from(n: u8) -> Self {
        Self(n)
    }
}

impl From<Control> for u8 {
    fn from(control: Control) -> Self {
        control.0
    }
}

impl Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (bit, name) in [
            (Self::SYN_BIT, "SYN"),
            (Self::ACK_BIT, "ACK"),
            (Self::FIN_BIT, "FIN"),
        ] {
            if self.0 & bit != 0 {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        if sep.is_empty() {
            write!(f, "-")?;
        }
        Ok(())
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram shorter than the fixed header")]
    HeaderTooShort,
    #[error("data offset of {0} bytes does not fit the datagram")]
    BogusDataOffset(usize),
}
