use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{FixedSizePacket, PacketSize, ReadFrom, ReadRemainingFrom, WriteTo},
    padding::{needs_padding, padding_size},
};

use super::{
    common_header::RtcpCommonHeader, payload_type::RtcpPayloadType, report_block::ReportBlock,
};

// @see: RFC 3550 6.4.2 RR: Receiver Report RTCP Packet
///         0                   1                   2                   3
///         0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// header |V=2|P|   RC    |   PT=RR=201   |             length            |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                     SSRC of packet sender                     |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// report |                           blocks ...                          |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
#[derive(Debug, Default, Clone)]
pub struct ReceiverReportPacket {
    pub sender_ssrc: u32,
    pub report_blocks: Vec<ReportBlock>,
}

impl ReceiverReportPacket {
    pub fn builder() -> ReceiverReportPacketBuilder {
        Default::default()
    }

    fn raw_size(&self) -> usize {
        RtcpCommonHeader::SIZE + 4 + self.report_blocks.len() * ReportBlock::SIZE
    }

    pub(crate) fn header(&self) -> RtcpCommonHeader {
        let raw_size = self.raw_size();
        RtcpCommonHeader {
            version: 2,
            padding: needs_padding(raw_size),
            count: self.report_blocks.len() as u8,
            packet_type: RtcpPayloadType::ReceiverReport.into(),
            length: (self.packet_size() / 4 - 1) as u16,
        }
    }
}

impl PacketSize for ReceiverReportPacket {
    fn packet_size(&self) -> usize {
        let raw_size = self.raw_size();
        raw_size + padding_size(raw_size)
    }
}

impl<R: io::Read> ReadRemainingFrom<RtcpCommonHeader, R> for ReceiverReportPacket {
    type Error = RtpFormatError;
    fn read_remaining_from(header: RtcpCommonHeader, reader: &mut R) -> Result<Self, Self::Error> {
        if header.packet_type != RtcpPayloadType::ReceiverReport.into() {
            return Err(RtpFormatError::WrongPayloadType(format!(
                "expect receiver report, got type {}",
                header.packet_type
            )));
        }

        let sender_ssrc = reader.read_u32::<BigEndian>()?;
        let mut report_blocks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            report_blocks.push(ReportBlock::read_from(reader)?);
        }

        Ok(Self {
            sender_ssrc,
            report_blocks,
        })
    }
}

impl<W: io::Write> WriteTo<W> for ReceiverReportPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.header().write_to(writer)?;
        writer.write_u32::<BigEndian>(self.sender_ssrc)?;
        self.report_blocks
            .iter()
            .try_for_each(|block| block.write_to(writer))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ReceiverReportPacketBuilder(ReceiverReportPacket);

impl ReceiverReportPacketBuilder {
    pub fn sender_ssrc(mut self, ssrc: u32) -> Self {
        self.0.sender_ssrc = ssrc;
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

    pub fn build(self) -> RtpFormatResult<ReceiverReportPacket> {
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
    fn test_empty_receiver_report_is_two_words() {
        let report = ReceiverReportPacket::builder()
            .sender_ssrc(0x0102_0304)
            .build()
            .unwrap();
        let mut buffer = Vec::new();
        report.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer[3], 1);

        let mut cursor = Cursor::new(&buffer);
        let header = RtcpCommonHeader::try_read_from(&mut cursor).unwrap().unwrap();
        let decoded = ReceiverReportPacket::read_remaining_from(header, &mut cursor).unwrap();
        assert_eq!(decoded.sender_ssrc, 0x0102_0304);
        assert!(decoded.report_blocks.is_empty());
    }
}
