use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tokio_util::bytes::Buf;

use crate::{
    errors::RtpFormatError,
    packet_traits::{FixedSizePacket, TryReadFrom, WriteTo},
};

/// The 32-bit word every RTCP packet opens with. `packet_type` stays a raw
/// byte here so a compound scan can step over kinds it does not know.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtcpCommonHeader {
    pub version: u8,
    pub padding: bool,
    /// Reception report count, source count, or APP subtype, depending on
    /// the packet type.
    pub count: u8,
    pub packet_type: u8,
    /// The length of this RTCP packet in 32-bit words minus one, including
    /// the header and any padding.
    pub length: u16,
}

impl FixedSizePacket for RtcpCommonHeader {
    const SIZE: usize = 4;
}

impl<R: AsRef<[u8]>> TryReadFrom<R> for RtcpCommonHeader {
    type Error = RtpFormatError;
    fn try_read_from(cursor: &mut Cursor<R>) -> Result<Option<Self>, Self::Error> {
        if cursor.remaining() < Self::SIZE {
            return Ok(None);
        }
        let word = cursor.read_u32::<BigEndian>()?;
        Ok(Some(Self {
            version: ((word >> 30) & 0b11) as u8,
            padding: ((word >> 29) & 0b1) == 0b1,
            count: ((word >> 24) & 0b1_1111) as u8,
            packet_type: ((word >> 16) & 0b1111_1111) as u8,
            length: (word & 0xFFFF) as u16,
        }))
    }
}

impl<W: io::Write> WriteTo<W> for RtcpCommonHeader {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        let word = ((self.version as u32) << 30)
            | ((self.padding as u32) << 29)
            | ((self.count as u32) << 24)
            | ((self.packet_type as u32) << 16)
            | (self.length as u32);
        writer.write_u32::<BigEndian>(word)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_common_header_round_trip() {
        let header = RtcpCommonHeader {
            version: 2,
            padding: false,
            count: 3,
            packet_type: 201,
            length: 7,
        };
        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0x83, 0xC9, 0x00, 0x07]);

        let decoded = RtcpCommonHeader::try_read_from(&mut Cursor::new(&buffer))
            .unwrap()
            .unwrap();
        assert_eq!(decoded.version, 2);
        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.packet_type, 201);
        assert_eq!(decoded.length, 7);
    }
}
