use std::io::{self, Cursor};

use crate::{
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{PacketSize, TryReadFrom, WriteTo},
};

use super::{RtcpPacket, ScannedPacket, payload_type::RtcpPayloadType, scan_packet};

/// An ordered run of RTCP packets serialized back to back in one datagram.
///
/// Decoding steps over payload types this crate does not model, so a
/// compound carrying an extension packet still yields its known members.
#[derive(Debug, Default, Clone)]
pub struct RtcpCompoundPacket {
    packets: Vec<RtcpPacket>,
}

impl RtcpCompoundPacket {
    pub fn builder() -> RtcpCompoundPacketBuilder {
        Default::default()
    }

    pub fn packets(&self) -> &[RtcpPacket] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<RtcpPacket> {
        self.packets
    }

    /// RFC 3550 6.1 compound discipline: non-empty, opens with SR or RR,
    /// and carries a CNAME. Advisory — a BYE-only farewell is deliberately
    /// not a conforming compound, so encoding does not call this.
    pub fn validate(&self) -> RtpFormatResult<()> {
        let first = self
            .packets
            .first()
            .ok_or(RtpFormatError::EmptyCompoundPacket)?;
        if !matches!(
            first.payload_type(),
            RtcpPayloadType::SenderReport | RtcpPayloadType::ReceiverReport
        ) {
            return Err(RtpFormatError::BadFirstPacketInCompound);
        }

        let has_cname = self.packets.iter().any(|packet| {
            matches!(packet, RtcpPacket::SourceDescription(sdes) if sdes.cname().is_some())
        });
        if !has_cname {
            return Err(RtpFormatError::MissingCnameInCompound);
        }
        Ok(())
    }
}

impl PacketSize for RtcpCompoundPacket {
    fn packet_size(&self) -> usize {
        self.packets
            .iter()
            .fold(0, |sum, packet| sum + packet.packet_size())
    }
}

impl<R: AsRef<[u8]>> TryReadFrom<R> for RtcpCompoundPacket {
    type Error = RtpFormatError;
    fn try_read_from(cursor: &mut Cursor<R>) -> Result<Option<Self>, Self::Error> {
        let mut packets = Vec::new();
        loop {
            match scan_packet(cursor)? {
                None => break,
                Some(ScannedPacket::Incomplete) => return Ok(None),
                Some(ScannedPacket::Unknown) => continue,
                Some(ScannedPacket::Known(packet)) => packets.push(packet),
            }
        }

        if packets.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { packets }))
    }
}

impl<W: io::Write> WriteTo<W> for RtcpCompoundPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        if self.packets.is_empty() {
            return Err(RtpFormatError::EmptyCompoundPacket);
        }
        self.packets
            .iter()
            .try_for_each(|packet| packet.write_to(writer))
    }
}

#[derive(Debug, Default)]
pub struct RtcpCompoundPacketBuilder(RtcpCompoundPacket);

impl RtcpCompoundPacketBuilder {
    pub fn packet(mut self, packet: RtcpPacket) -> Self {
        self.0.packets.push(packet);
        self
    }

    pub fn packets(mut self, mut packets: Vec<RtcpPacket>) -> Self {
        self.0.packets.append(&mut packets);
        self
    }

    pub fn build(self) -> RtpFormatResult<RtcpCompoundPacket> {
        if self.0.packets.is_empty() {
            return Err(RtpFormatError::EmptyCompoundPacket);
        }
        Ok(self.0)
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, WriteBytesExt};

    use crate::rtcp::{
        bye::ByePacket, receiver_report::ReceiverReportPacket, sdes::SourceDescriptionPacket,
    };

    use super::*;

    fn join_compound(ssrc: u32) -> RtcpCompoundPacket {
        RtcpCompoundPacket::builder()
            .packet(RtcpPacket::ReceiverReport(
                ReceiverReportPacket::builder()
                    .sender_ssrc(ssrc)
                    .build()
                    .unwrap(),
            ))
            .packet(RtcpPacket::SourceDescription(
                SourceDescriptionPacket::builder()
                    .cname(ssrc, "peer@host".to_string())
                    .unwrap()
                    .build()
                    .unwrap(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_compound_round_trip() {
        let compound = join_compound(0x7777);
        let mut buffer = Vec::new();
        compound.write_to(&mut buffer).unwrap();

        let decoded = RtcpCompoundPacket::try_read_from(&mut Cursor::new(&buffer))
            .unwrap()
            .unwrap();
        assert_eq!(decoded.packets().len(), 2);
        assert!(matches!(decoded.packets()[0], RtcpPacket::ReceiverReport(_)));
        assert!(matches!(
            &decoded.packets()[1],
            RtcpPacket::SourceDescription(sdes) if sdes.cname_of(0x7777) == Some("peer@host")
        ));
        decoded.validate().unwrap();
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let compound = join_compound(0x7777);
        let mut buffer = Vec::new();
        compound.write_to(&mut buffer).unwrap();

        // splice an unknown payload-type packet (two words) in the middle
        let mut spliced = buffer[..8].to_vec();
        spliced.write_u32::<BigEndian>(0x80_CD_00_01).unwrap();
        spliced.write_u32::<BigEndian>(0xDEAD_BEEF).unwrap();
        spliced.extend_from_slice(&buffer[8..]);

        let decoded = RtcpCompoundPacket::try_read_from(&mut Cursor::new(&spliced))
            .unwrap()
            .unwrap();
        assert_eq!(decoded.packets().len(), 2);
    }

    #[test]
    fn test_farewell_compound_fails_validation_but_encodes() {
        let farewell = RtcpCompoundPacket::builder()
            .packet(RtcpPacket::SourceDescription(
                SourceDescriptionPacket::builder()
                    .cname(0x1234, "peer@host".to_string())
                    .unwrap()
                    .build()
                    .unwrap(),
            ))
            .packet(RtcpPacket::Bye(
                ByePacket::builder().ssrc(0x1234).build().unwrap(),
            ))
            .build()
            .unwrap();

        assert!(matches!(
            farewell.validate(),
            Err(RtpFormatError::BadFirstPacketInCompound)
        ));
        let mut buffer = Vec::new();
        farewell.write_to(&mut buffer).unwrap();
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_truncated_compound_yields_none() {
        let compound = join_compound(0x7777);
        let mut buffer = Vec::new();
        compound.write_to(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 2);

        let decoded = RtcpCompoundPacket::try_read_from(&mut Cursor::new(&buffer)).unwrap();
        assert!(decoded.is_none());
    }
}
