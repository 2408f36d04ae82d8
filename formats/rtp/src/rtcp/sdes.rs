use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num::ToPrimitive;

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{FixedSizePacket, PacketSize, ReadFrom, ReadRemainingFrom, WriteTo},
};

use super::{common_header::RtcpCommonHeader, payload_type::RtcpPayloadType};

// @see: RFC 3550 6.5 SDES: Source Description RTCP Packet
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// header |V=2|P|    SC   |  PT=SDES=202  |             length            |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// chunk  |                          SSRC/CSRC_1                          |
///     1  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                           SDES items                          |
///        |                              ...                              |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdesItemKind {
    Cname = 1,
    Name = 2,
    Email = 3,
    Phone = 4,
    Location = 5,
    Tool = 6,
    Note = 7,
    Priv = 8,
}

impl From<SdesItemKind> for u8 {
    fn from(value: SdesItemKind) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for SdesItemKind {
    type Error = RtpFormatError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cname),
            2 => Ok(Self::Name),
            3 => Ok(Self::Email),
            4 => Ok(Self::Phone),
            5 => Ok(Self::Location),
            6 => Ok(Self::Tool),
            7 => Ok(Self::Note),
            8 => Ok(Self::Priv),
            _ => Err(RtpFormatError::UnknownSdesItemKind(value)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SdesItem {
    pub kind: SdesItemKind,
    pub value: String,
}

impl SdesItem {
    pub fn new(kind: SdesItemKind, value: String) -> RtpFormatResult<Self> {
        if value.len() > 255 {
            return Err(RtpFormatError::SdesValueTooLarge(value));
        }
        Ok(Self { kind, value })
    }
}

impl PacketSize for SdesItem {
    fn packet_size(&self) -> usize {
        2 + self.value.len()
    }
}

impl<R: io::Read> ReadFrom<R> for SdesItem {
    type Error = RtpFormatError;
    fn read_from(reader: &mut R) -> Result<Self, Self::Error> {
        let kind: SdesItemKind = reader.read_u8()?.try_into()?;
        let length = reader.read_u8()? as usize;
        let mut value = vec![0_u8; length];
        reader.read_exact(&mut value)?;
        Ok(Self {
            kind,
            value: String::from_utf8(value)?,
        })
    }
}

impl<W: io::Write> WriteTo<W> for SdesItem {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        writer.write_u8(self.kind.into())?;
        writer.write_u8(self.value.len().to_u8().unwrap_or(u8::MAX))?;
        writer.write_all(self.value.as_bytes())?;
        Ok(())
    }
}

/// One source's item list. On the wire a chunk is closed by at least one
/// zero octet and padded out to a 32-bit boundary.
#[derive(Debug, Clone)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub items: Vec<SdesItem>,
}

impl SdesChunk {
    pub fn item(&self, kind: SdesItemKind) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.value.as_str())
    }

    fn items_size(&self) -> usize {
        4 + self
            .items
            .iter()
            .fold(0, |sum, item| sum + item.packet_size())
    }
}

impl PacketSize for SdesChunk {
    fn packet_size(&self) -> usize {
        // terminator plus padding: always at least one zero octet
        let raw_size = self.items_size();
        raw_size + 4 - (raw_size % 4)
    }
}

impl<R: io::Read> ReadFrom<R> for SdesChunk {
    type Error = RtpFormatError;
    fn read_from(reader: &mut R) -> Result<Self, Self::Error> {
        let ssrc = reader.read_u32::<BigEndian>()?;
        let mut bytes_read = 4;
        let mut items = Vec::new();
        loop {
            let kind = reader.read_u8()?;
            bytes_read += 1;
            if kind == 0 {
                // swallow the padding zeros up to the word boundary
                while bytes_read % 4 != 0 {
                    reader.read_u8()?;
                    bytes_read += 1;
                }
                break;
            }

            let length = reader.read_u8()? as usize;
            let mut value = vec![0_u8; length];
            reader.read_exact(&mut value)?;
            bytes_read += 1 + length;
            items.push(SdesItem {
                kind: kind.try_into()?,
                value: String::from_utf8(value)?,
            });
        }

        Ok(Self { ssrc, items })
    }
}

impl<W: io::Write> WriteTo<W> for SdesChunk {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        writer.write_u32::<BigEndian>(self.ssrc)?;
        self.items
            .iter()
            .try_for_each(|item| item.write_to(writer))?;
        let raw_size = self.items_size();
        for _ in 0..(4 - raw_size % 4) {
            writer.write_u8(0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SourceDescriptionPacket {
    pub chunks: Vec<SdesChunk>,
}

impl SourceDescriptionPacket {
    pub fn builder() -> SourceDescriptionPacketBuilder {
        Default::default()
    }

    pub fn cname(&self) -> Option<&str> {
        self.chunks
            .iter()
            .find_map(|chunk| chunk.item(SdesItemKind::Cname))
    }

    pub fn cname_of(&self, ssrc: u32) -> Option<&str> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.ssrc == ssrc)
            .find_map(|chunk| chunk.item(SdesItemKind::Cname))
    }

    fn raw_size(&self) -> usize {
        RtcpCommonHeader::SIZE
            + self
                .chunks
                .iter()
                .fold(0, |sum, chunk| sum + chunk.packet_size())
    }

    pub(crate) fn header(&self) -> RtcpCommonHeader {
        RtcpCommonHeader {
            version: 2,
            padding: false,
            count: self.chunks.len() as u8,
            packet_type: RtcpPayloadType::SourceDescription.into(),
            length: (self.packet_size() / 4 - 1) as u16,
        }
    }
}

impl PacketSize for SourceDescriptionPacket {
    fn packet_size(&self) -> usize {
        // chunks are word aligned on their own
        self.raw_size()
    }
}

impl<R: io::Read> ReadRemainingFrom<RtcpCommonHeader, R> for SourceDescriptionPacket {
    type Error = RtpFormatError;
    fn read_remaining_from(header: RtcpCommonHeader, reader: &mut R) -> Result<Self, Self::Error> {
        if header.packet_type != RtcpPayloadType::SourceDescription.into() {
            return Err(RtpFormatError::WrongPayloadType(format!(
                "expect source description, got type {}",
                header.packet_type
            )));
        }

        let mut chunks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            chunks.push(SdesChunk::read_from(reader.by_ref())?);
        }

        Ok(Self { chunks })
    }
}

impl<W: io::Write> WriteTo<W> for SourceDescriptionPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.header().write_to(writer)?;
        self.chunks
            .iter()
            .try_for_each(|chunk| chunk.write_to(writer))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SourceDescriptionPacketBuilder(SourceDescriptionPacket);

impl SourceDescriptionPacketBuilder {
    pub fn item(mut self, ssrc: u32, item: SdesItem) -> Self {
        if let Some(chunk) = self.0.chunks.iter_mut().find(|chunk| chunk.ssrc == ssrc) {
            chunk.items.push(item);
        } else {
            self.0.chunks.push(SdesChunk {
                ssrc,
                items: vec![item],
            });
        }
        self
    }

    fn item_from_parts(self, ssrc: u32, kind: SdesItemKind, value: String) -> RtpFormatResult<Self> {
        SdesItem::new(kind, value).map(|item| self.item(ssrc, item))
    }

    pub fn cname(self, ssrc: u32, cname: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Cname, cname)
    }

    pub fn name(self, ssrc: u32, name: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Name, name)
    }

    pub fn email(self, ssrc: u32, email: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Email, email)
    }

    pub fn phone(self, ssrc: u32, phone: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Phone, phone)
    }

    pub fn location(self, ssrc: u32, location: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Location, location)
    }

    pub fn tool(self, ssrc: u32, tool: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Tool, tool)
    }

    pub fn note(self, ssrc: u32, note: String) -> RtpFormatResult<Self> {
        self.item_from_parts(ssrc, SdesItemKind::Note, note)
    }

    pub fn build(self) -> RtpFormatResult<SourceDescriptionPacket> {
        if self.0.chunks.len() > 31 {
            return Err(RtpFormatError::SdesTooManyChunks);
        }
        Ok(self.0)
    }
}
