use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tokio_util::bytes::Bytes;

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{FixedSizePacket, PacketSize, ReadRemainingFrom, WriteTo},
    padding::{needs_padding, padding_bytes, padding_size},
};

use super::{common_header::RtcpCommonHeader, payload_type::RtcpPayloadType};

// @see: RFC 3550 6.7 APP: Application-Defined RTCP Packet
///        0                   1                   2                   3
///        0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |V=2|P| subtype |   PT=APP=204  |             length            |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |                           SSRC/CSRC                           |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |                          name (ASCII)                         |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |                   application-dependent data                ...
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone)]
pub struct AppPacket {
    pub subtype: u8,
    pub ssrc: u32,
    pub name: [u8; 4],
    pub data: Bytes,
}

impl AppPacket {
    pub fn builder() -> AppPacketBuilder {
        Default::default()
    }

    fn raw_size(&self) -> usize {
        RtcpCommonHeader::SIZE + 4 + 4 + self.data.len()
    }

    pub(crate) fn header(&self) -> RtcpCommonHeader {
        let raw_size = self.raw_size();
        RtcpCommonHeader {
            version: 2,
            padding: needs_padding(raw_size),
            count: self.subtype,
            packet_type: RtcpPayloadType::App.into(),
            length: (self.packet_size() / 4 - 1) as u16,
        }
    }
}

impl PacketSize for AppPacket {
    fn packet_size(&self) -> usize {
        let raw_size = self.raw_size();
        raw_size + padding_size(raw_size)
    }
}

impl<R: io::Read> ReadRemainingFrom<RtcpCommonHeader, R> for AppPacket {
    type Error = RtpFormatError;
    fn read_remaining_from(header: RtcpCommonHeader, reader: &mut R) -> Result<Self, Self::Error> {
        if header.packet_type != RtcpPayloadType::App.into() {
            return Err(RtpFormatError::WrongPayloadType(format!(
                "expect app, got type {}",
                header.packet_type
            )));
        }

        let ssrc = reader.read_u32::<BigEndian>()?;
        let mut name = [0_u8; 4];
        reader.read_exact(&mut name)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        Ok(Self {
            subtype: header.count,
            ssrc,
            name,
            data: Bytes::from(data),
        })
    }
}

impl<W: io::Write> WriteTo<W> for AppPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.header().write_to(writer)?;
        writer.write_u32::<BigEndian>(self.ssrc)?;
        writer.write_all(&self.name)?;
        writer.write_all(&self.data)?;
        if let Some(pad) = padding_bytes(self.raw_size()) {
            writer.write_all(&pad)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct AppPacketBuilder(AppPacket);

impl Default for AppPacketBuilder {
    fn default() -> Self {
        Self(AppPacket {
            subtype: 0,
            ssrc: 0,
            name: [0; 4],
            data: Bytes::new(),
        })
    }
}

impl AppPacketBuilder {
    pub fn subtype(mut self, subtype: u8) -> Self {
        self.0.subtype = subtype;
        self
    }

    pub fn ssrc(mut self, ssrc: u32) -> Self {
        self.0.ssrc = ssrc;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        let mut bytes = [0_u8; 4];
        for (slot, byte) in bytes.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }
        self.0.name = bytes;
        self
    }

    pub fn data(mut self, data: Bytes) -> Self {
        self.0.data = data;
        self
    }

    pub fn build(self) -> RtpFormatResult<AppPacket> {
        if self.0.subtype > 0b1_1111 {
            return Err(RtpFormatError::BadAppSubtype(self.0.subtype));
        }
        if !self.0.name.iter().all(|byte| byte.is_ascii()) {
            return Err(RtpFormatError::BadAppPacketName);
        }
        Ok(self.0)
    }
}
