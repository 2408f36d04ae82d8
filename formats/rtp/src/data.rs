use std::io::{self};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tokio_util::bytes::{Buf, Bytes};

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{PacketSize, TryReadFrom, WriteTo},
    padding::{needs_padding, padding_bytes, padding_size},
};

// @see: RFC 3550 5.1 RTP Fixed Header Fields
///        0                   1                   2                   3
///        0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |V=2|P|X|  CC   |M|     PT      |       sequence number         |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |                           timestamp                           |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///       |           synchronization source (SSRC) identifier            |
///       +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
///       |            contributing source (CSRC) identifiers             |
///       |                               ...                             |
///       +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone)]
pub struct RtpDataPacket {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc_list: Vec<u32>,
    pub extension: Option<RtpHeaderExtension>,
    pub payload: Bytes,
}

/// Profile-specific header extension, carried when the X bit is set.
/// `words` holds the extension body, always a whole number of 32-bit words.
#[derive(Debug, Clone)]
pub struct RtpHeaderExtension {
    pub profile_defined: u16,
    pub words: Bytes,
}

pub const RTP_VERSION: u8 = 2;
const FIXED_HEADER_SIZE: usize = 12;

impl RtpDataPacket {
    pub fn builder() -> RtpDataPacketBuilder {
        Default::default()
    }

    fn raw_size(&self) -> usize {
        FIXED_HEADER_SIZE
            + self.csrc_list.len() * 4
            + self.extension.as_ref().map_or(0, |e| 4 + e.words.len())
            + self.payload.len()
    }
}

impl PacketSize for RtpDataPacket {
    fn packet_size(&self) -> usize {
        let raw_size = self.raw_size();
        raw_size + padding_size(raw_size)
    }
}

impl<R: AsRef<[u8]>> TryReadFrom<R> for RtpDataPacket {
    type Error = RtpFormatError;
    fn try_read_from(cursor: &mut std::io::Cursor<R>) -> Result<Option<Self>, Self::Error> {
        if cursor.remaining() < FIXED_HEADER_SIZE {
            return Ok(None);
        }

        let first_byte = cursor.read_u8()?;
        let version = (first_byte >> 6) & 0b11;
        if version != RTP_VERSION {
            return Err(RtpFormatError::UnsupportedVersion(version));
        }
        let padding = ((first_byte >> 5) & 0b1) == 0b1;
        let has_extension = ((first_byte >> 4) & 0b1) == 0b1;
        let csrc_count = first_byte & 0b1111;

        let second_byte = cursor.read_u8()?;
        let marker = ((second_byte >> 7) & 0b1) == 0b1;
        let payload_type = second_byte & 0b0111_1111;

        let sequence_number = cursor.read_u16::<BigEndian>()?;
        let timestamp = cursor.read_u32::<BigEndian>()?;
        let ssrc = cursor.read_u32::<BigEndian>()?;

        if cursor.remaining() < csrc_count as usize * 4 {
            return Ok(None);
        }
        let mut csrc_list = Vec::with_capacity(csrc_count as usize);
        for _ in 0..csrc_count {
            csrc_list.push(cursor.read_u32::<BigEndian>()?);
        }

        let extension = if has_extension {
            if cursor.remaining() < 4 {
                return Ok(None);
            }
            let profile_defined = cursor.read_u16::<BigEndian>()?;
            let word_count = cursor.read_u16::<BigEndian>()? as usize;
            if cursor.remaining() < word_count * 4 {
                return Ok(None);
            }
            Some(RtpHeaderExtension {
                profile_defined,
                words: cursor.copy_to_bytes(word_count * 4),
            })
        } else {
            None
        };

        let payload_size = cursor.remaining();
        let payload = cursor.copy_to_bytes(payload_size);
        if padding {
            let pad = *payload.last().ok_or(RtpFormatError::BadPaddingSize(0))? as usize;
            if pad == 0 || pad > payload_size {
                return Err(RtpFormatError::BadPaddingSize(pad));
            }
            return Ok(Some(Self {
                version,
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc_list,
                extension,
                payload: payload.slice(..payload_size - pad),
            }));
        }

        Ok(Some(Self {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc_list,
            extension,
            payload,
        }))
    }
}

impl<W: io::Write> WriteTo<W> for RtpDataPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        let raw_size = self.raw_size();
        let first_byte = (RTP_VERSION << 6)
            | ((needs_padding(raw_size) as u8) << 5)
            | ((self.extension.is_some() as u8) << 4)
            | (self.csrc_list.len() as u8);
        writer.write_u8(first_byte)?;
        writer.write_u8(((self.marker as u8) << 7) | self.payload_type)?;
        writer.write_u16::<BigEndian>(self.sequence_number)?;
        writer.write_u32::<BigEndian>(self.timestamp)?;
        writer.write_u32::<BigEndian>(self.ssrc)?;
        self.csrc_list
            .iter()
            .try_for_each(|csrc| writer.write_u32::<BigEndian>(*csrc))?;
        if let Some(extension) = &self.extension {
            writer.write_u16::<BigEndian>(extension.profile_defined)?;
            writer.write_u16::<BigEndian>((extension.words.len() / 4) as u16)?;
            writer.write_all(&extension.words)?;
        }
        writer.write_all(&self.payload)?;
        if let Some(pad) = padding_bytes(raw_size) {
            writer.write_all(&pad)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RtpDataPacketBuilder(RtpDataPacket);

impl Default for RtpDataPacketBuilder {
    fn default() -> Self {
        Self(RtpDataPacket {
            version: RTP_VERSION,
            padding: false,
            marker: false,
            payload_type: 0,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrc_list: Vec::new(),
            extension: None,
            payload: Bytes::new(),
        })
    }
}

impl RtpDataPacketBuilder {
    pub fn payload_type(mut self, payload_type: u8) -> Self {
        self.0.payload_type = payload_type;
        self
    }

    pub fn sequence_number(mut self, sequence_number: u16) -> Self {
        self.0.sequence_number = sequence_number;
        self
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.0.timestamp = timestamp;
        self
    }

    pub fn ssrc(mut self, ssrc: u32) -> Self {
        self.0.ssrc = ssrc;
        self
    }

    pub fn marker(mut self, marker: bool) -> Self {
        self.0.marker = marker;
        self
    }

    pub fn csrc(mut self, csrc: u32) -> Self {
        self.0.csrc_list.push(csrc);
        self
    }

    pub fn extension(mut self, extension: RtpHeaderExtension) -> Self {
        self.0.extension = Some(extension);
        self
    }

    pub fn payload(mut self, payload: Bytes) -> Self {
        self.0.payload = payload;
        self
    }

    pub fn build(self) -> RtpFormatResult<RtpDataPacket> {
        if self.0.payload_type > 0b0111_1111 {
            return Err(RtpFormatError::PayloadTypeOutOfRange(self.0.payload_type));
        }
        if self.0.csrc_list.len() > 15 {
            return Err(RtpFormatError::TooManyCsrc);
        }
        Ok(self.0)
    }
}
