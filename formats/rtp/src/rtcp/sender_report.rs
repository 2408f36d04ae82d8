use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{FixedSizePacket, PacketSize, ReadFrom, ReadRemainingFrom, WriteTo},
    padding::{needs_padding, padding_size},
};

use super::{
    common_header::RtcpCommonHeader, ntp::NtpTimestamp, payload_type::RtcpPayloadType,
    report_block::ReportBlock,
};

// @see: RFC 3550 6.4.1 SR: Sender Report RTCP Packet
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// header |V=2|P|   RC    |   PT=SR=200   |             length            |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                           SSRC of sender                      |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// sender |             NTP timestamp, most significant word              |
/// info   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |             NTP timestamp, least significant word             |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         RTP timestamp                         |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                      sender's packet count                    |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                      sender's octet count                     |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// report |                           blocks ...                          |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
#[derive(Debug, Default, Clone)]
pub struct SenderReportPacket {
    pub sender_ssrc: u32,
    pub ntp_timestamp: NtpTimestamp,
    pub rtp_timestamp: u32,
    pub sender_packet_count: u32,
    pub sender_octet_count: u32,
    pub report_blocks: Vec<ReportBlock>,
}

impl SenderReportPacket {
    pub fn builder() -> SenderReportPacketBuilder {
        Default::default()
    }

    fn raw_size(&self) -> usize {
        RtcpCommonHeader::SIZE + 4 + 20 + self.report_blocks.len() * ReportBlock::SIZE
    }

    pub(crate) fn header(&self) -> RtcpCommonHeader {
        let raw_size = self.raw_size();
        RtcpCommonHeader {
            version: 2,
            padding: needs_padding(raw_size),
            count: self.report_blocks.len() as u8,
            packet_type: RtcpPayloadType::SenderReport.into(),
            length: (self.packet_size() / 4 - 1) as u16,
        }
    }
}

impl PacketSize for SenderReportPacket {
    fn packet_size(&self) -> usize {
        let raw_size = self.raw_size();
        raw_size + padding_size(raw_size)
    }
}

impl<R: io::Read> ReadRemainingFrom<RtcpCommonHeader, R> for SenderReportPacket {
    type Error = RtpFormatError;
    fn read_remaining_from(header: RtcpCommonHeader, reader: &mut R) -> Result<Self, Self::Error> {
        if header.packet_type != RtcpPayloadType::SenderReport.into() {
            return Err(RtpFormatError::WrongPayloadType(format!(
                "expect sender report, got type {}",
                header.packet_type
            )));
        }

        let sender_ssrc = reader.read_u32::<BigEndian>()?;
        let ntp_timestamp = reader.read_u64::<BigEndian>()?.into();
        let rtp_timestamp = reader.read_u32::<BigEndian>()?;
        let sender_packet_count = reader.read_u32::<BigEndian>()?;
        let sender_octet_count = reader.read_u32::<BigEndian>()?;

        let mut report_blocks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            report_blocks.push(ReportBlock::read_from(reader)?);
        }

        Ok(Self {
            sender_ssrc,
            ntp_timestamp,
            rtp_timestamp,
            sender_packet_count,
            sender_octet_count,
            report_blocks,
        })
    }
}

impl<W: io::Write> WriteTo<W> for SenderReportPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.header().write_to(writer)?;
        writer.write_u32::<BigEndian>(self.sender_ssrc)?;
        writer.write_u64::<BigEndian>(self.ntp_timestamp.into())?;
        writer.write_u32::<BigEndian>(self.rtp_timestamp)?;
        writer.write_u32::<BigEndian>(self.sender_packet_count)?;
        writer.write_u32::<BigEndian>(self.sender_octet_count)?;
        self.report_blocks
            .iter()
            .try_for_each(|block| block.write_to(writer))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SenderReportPacketBuilder(SenderReportPacket);

impl SenderReportPacketBuilder {
    pub fn sender_ssrc(mut self, ssrc: u32) -> Self {
        self.0.sender_ssrc = ssrc;
        self
    }

    pub fn ntp_timestamp<T: Into<NtpTimestamp>>(mut self, timestamp: T) -> Self {
        self.0.ntp_timestamp = timestamp.into();
        self
    }

    pub fn rtp_timestamp(mut self, timestamp: u32) -> Self {
        self.0.rtp_timestamp = timestamp;
        self
    }

    pub fn sender_packet_count(mut self, count: u32) -> Self {
        self.0.sender_packet_count = count;
        self
    }

    pub fn sender_octet_count(mut self, count: u32) -> Self {
        self.0.sender_octet_count = count;
        self
    }

    pub fn report_block(mut self, block: ReportBlock) -> Self {
        self.0.report_blocks.push(block);
        self
    }

    pub fn report_blocks(mut self, mut blocks: Vec<ReportBlock>) -> Self {
        self.0.report_blocks.append(&mut blocks);
        self
    }

    pub fn build(self) -> RtpFormatResult<SenderReportPacket> {
        if self.0.report_blocks.len() > 31 {
            return Err(RtpFormatError::TooManyReportBlocks);
        }
        Ok(self.0)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::packet_traits::TryReadFrom;

    use super::*;

    #[test]
    fn test_sender_report_round_trip() {
        let report = SenderReportPacket::builder()
            .sender_ssrc(0xCAFE_F00D)
            .sender_packet_count(17)
            .sender_octet_count(1700)
            .report_block(ReportBlock::builder().ssrc(0x1111).build())
            .build()
            .unwrap();

        let mut buffer = Vec::new();
        report.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), report.packet_size());
        // length field counts 32-bit words minus one
        assert_eq!(buffer[3] as usize, buffer.len() / 4 - 1);

        let mut cursor = Cursor::new(&buffer);
        let header = RtcpCommonHeader::try_read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(header.count, 1);
        let decoded =
            SenderReportPacket::read_remaining_from(header, &mut cursor).unwrap();
        assert_eq!(decoded.sender_ssrc, 0xCAFE_F00D);
        assert_eq!(decoded.sender_packet_count, 17);
        assert_eq!(decoded.sender_octet_count, 1700);
        assert_eq!(decoded.report_blocks.len(), 1);
    }
}
