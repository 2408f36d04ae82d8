use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num::ToPrimitive;

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{FixedSizePacket, PacketSize, ReadRemainingFrom, WriteTo},
    padding::{needs_padding, padding_bytes, padding_size},
};

use super::{common_header::RtcpCommonHeader, payload_type::RtcpPayloadType};

// @see: RFC 3550 6.6 BYE: Goodbye RTCP Packet
///        0                   1                   2                   3
///        0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |V=2|P|    SC   |   PT=BYE=203  |            length             |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |                           SSRC/CSRC                           |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       :                              ...                              :
///       +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// (opt) |     length    |            reason for leaving               ...
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Default, Clone)]
pub struct ByePacket {
    pub ssrc_list: Vec<u32>,
    pub reason: Option<String>,
}

impl ByePacket {
    pub fn builder() -> ByePacketBuilder {
        Default::default()
    }

    fn raw_size(&self) -> usize {
        RtcpCommonHeader::SIZE
            + self.ssrc_list.len() * 4
            + self.reason.as_ref().map_or(0, |reason| 1 + reason.len())
    }

    pub(crate) fn header(&self) -> RtcpCommonHeader {
        let raw_size = self.raw_size();
        RtcpCommonHeader {
            version: 2,
            padding: needs_padding(raw_size),
            count: self.ssrc_list.len() as u8,
            packet_type: RtcpPayloadType::Bye.into(),
            length: (self.packet_size() / 4 - 1) as u16,
        }
    }
}

impl PacketSize for ByePacket {
    fn packet_size(&self) -> usize {
        let raw_size = self.raw_size();
        raw_size + padding_size(raw_size)
    }
}

impl<R: io::Read> ReadRemainingFrom<RtcpCommonHeader, R> for ByePacket {
    type Error = RtpFormatError;
    fn read_remaining_from(header: RtcpCommonHeader, reader: &mut R) -> Result<Self, Self::Error> {
        if header.packet_type != RtcpPayloadType::Bye.into() {
            return Err(RtpFormatError::WrongPayloadType(format!(
                "expect bye, got type {}",
                header.packet_type
            )));
        }

        let mut ssrc_list = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            ssrc_list.push(reader.read_u32::<BigEndian>()?);
        }

        // the reason text is optional, anything left is length + text + pad
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        let reason = match rest.first() {
            None | Some(0) => None,
            Some(&length) => {
                let length = length as usize;
                if rest.len() < 1 + length {
                    return Err(RtpFormatError::PacketTruncated("bye reason"));
                }
                Some(String::from_utf8(rest[1..1 + length].to_vec())?)
            }
        };

        Ok(Self { ssrc_list, reason })
    }
}

impl<W: io::Write> WriteTo<W> for ByePacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.header().write_to(writer)?;
        self.ssrc_list
            .iter()
            .try_for_each(|ssrc| writer.write_u32::<BigEndian>(*ssrc))?;

        if let Some(reason) = &self.reason {
            writer.write_u8(reason.len().to_u8().unwrap_or(u8::MAX))?;
            writer.write_all(reason.as_bytes())?;
        }

        if let Some(pad) = padding_bytes(self.raw_size()) {
            writer.write_all(&pad)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ByePacketBuilder(ByePacket);

impl ByePacketBuilder {
    pub fn ssrc(mut self, ssrc: u32) -> Self {
        self.0.ssrc_list.push(ssrc);
        self
    }

    pub fn ssrcs(mut self, mut ssrcs: Vec<u32>) -> Self {
        self.0.ssrc_list.append(&mut ssrcs);
        self
    }

    pub fn reason(mut self, reason: String) -> Self {
        self.0.reason = Some(reason);
        self
    }

    pub fn build(self) -> RtpFormatResult<ByePacket> {
        if self.0.ssrc_list.len() > 31 {
            return Err(RtpFormatError::ByeTooManySources);
        }
        if let Some(reason) = &self.0.reason {
            if reason.len() > 255 {
                return Err(RtpFormatError::ByeReasonTooLarge(reason.clone()));
            }
        }
        Ok(self.0)
    }
}
