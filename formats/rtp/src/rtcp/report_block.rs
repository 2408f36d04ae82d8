use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    errors::RtpFormatError,
    packet_traits::{FixedSizePacket, ReadFrom, WriteTo},
};

/// One reception report block, as appended to SR and RR packets.
///
/// `extended_highest_sequence` packs the wrap cycle count into the high 16
/// bits and the highest sequence number seen into the low 16.
#[derive(Debug, Default, Clone)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub cumulative_lost: i32,
    pub extended_highest_sequence: u32,
    pub interarrival_jitter: u32,
    /// Middle 32 bits of the last SR's NTP timestamp, zero when no SR has
    /// been received from this source.
    pub last_sender_report: u32,
    /// Delay since that SR in 1/65536 seconds, zero when none received.
    pub delay_since_last_sender_report: u32,
}

impl FixedSizePacket for ReportBlock {
    const SIZE: usize = 24;
}

impl<R: io::Read> ReadFrom<R> for ReportBlock {
    type Error = RtpFormatError;
    fn read_from(reader: &mut R) -> Result<Self, Self::Error> {
        let ssrc = reader.read_u32::<BigEndian>()?;
        let fraction_lost = reader.read_u8()?;
        let cumulative_lost = reader.read_i24::<BigEndian>()?;
        let extended_highest_sequence = reader.read_u32::<BigEndian>()?;
        let interarrival_jitter = reader.read_u32::<BigEndian>()?;
        let last_sender_report = reader.read_u32::<BigEndian>()?;
        let delay_since_last_sender_report = reader.read_u32::<BigEndian>()?;
        Ok(Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            extended_highest_sequence,
            interarrival_jitter,
            last_sender_report,
            delay_since_last_sender_report,
        })
    }
}

impl<W: io::Write> WriteTo<W> for ReportBlock {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        writer.write_u32::<BigEndian>(self.ssrc)?;
        writer.write_u8(self.fraction_lost)?;
        writer.write_i24::<BigEndian>(self.cumulative_lost)?;
        writer.write_u32::<BigEndian>(self.extended_highest_sequence)?;
        writer.write_u32::<BigEndian>(self.interarrival_jitter)?;
        writer.write_u32::<BigEndian>(self.last_sender_report)?;
        writer.write_u32::<BigEndian>(self.delay_since_last_sender_report)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ReportBlockBuilder(ReportBlock);

impl ReportBlock {
    pub fn builder() -> ReportBlockBuilder {
        Default::default()
    }
}

impl ReportBlockBuilder {
    pub fn ssrc(mut self, ssrc: u32) -> Self {
        self.0.ssrc = ssrc;
        self
    }

    pub fn fraction_lost(mut self, fraction_lost: u8) -> Self {
        self.0.fraction_lost = fraction_lost;
        self
    }

    pub fn cumulative_lost(mut self, cumulative_lost: i32) -> Self {
        self.0.cumulative_lost = cumulative_lost;
        self
    }

    pub fn extended_highest_sequence(mut self, cycles: u16, sequence_number: u16) -> Self {
        self.0.extended_highest_sequence = ((cycles as u32) << 16) | sequence_number as u32;
        self
    }

    pub fn interarrival_jitter(mut self, jitter: u32) -> Self {
        self.0.interarrival_jitter = jitter;
        self
    }

    pub fn last_sender_report(mut self, lsr: u32) -> Self {
        self.0.last_sender_report = lsr;
        self
    }

    pub fn delay_since_last_sender_report(mut self, dlsr: u32) -> Self {
        self.0.delay_since_last_sender_report = dlsr;
        self
    }

    pub fn build(self) -> ReportBlock {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_report_block_layout() {
        let block = ReportBlock::builder()
            .ssrc(0x1111_2222)
            .fraction_lost(0x40)
            .cumulative_lost(-3)
            .extended_highest_sequence(1, 0x00FF)
            .build();

        let mut buffer = Vec::new();
        block.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), ReportBlock::SIZE);
        assert_eq!(&buffer[..4], &[0x11, 0x11, 0x22, 0x22]);
        assert_eq!(buffer[4], 0x40);
        assert_eq!(&buffer[5..8], &[0xFF, 0xFF, 0xFD]);
        assert_eq!(&buffer[8..12], &[0x00, 0x01, 0x00, 0xFF]);

        let decoded = ReportBlock::read_from(&mut buffer.as_slice()).unwrap();
        assert_eq!(decoded.cumulative_lost, -3);
        assert_eq!(decoded.extended_highest_sequence, 0x0001_00FF);
    }
}
