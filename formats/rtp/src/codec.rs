use std::io::Cursor;

use tokio_util::bytes::Bytes;

use crate::{
    data::RtpDataPacket,
    errors::{RtpFormatError, RtpFormatResult},
    packet_traits::{PacketSize, TryReadFrom, WriteTo},
    rtcp::compound::RtcpCompoundPacket,
};

/// Boundary between the session engine and the wire. A transport hands the
/// engine raw datagrams; this trait turns them into packet records and back.
pub trait PacketCodec: Send + Sync {
    fn decode_data(&self, buffer: &[u8]) -> RtpFormatResult<RtpDataPacket>;
    fn decode_control(&self, buffer: &[u8]) -> RtpFormatResult<RtcpCompoundPacket>;
    fn encode_data(&self, packet: &RtpDataPacket) -> RtpFormatResult<Bytes>;
    fn encode_control(&self, packet: &RtcpCompoundPacket) -> RtpFormatResult<Bytes>;
}

/// Plain RFC 3550 framing, one packet (or compound run) per datagram.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rfc3550Codec;

impl PacketCodec for Rfc3550Codec {
    fn decode_data(&self, buffer: &[u8]) -> RtpFormatResult<RtpDataPacket> {
        RtpDataPacket::try_read_from(&mut Cursor::new(buffer))?
            .ok_or(RtpFormatError::PacketTruncated("rtp data packet"))
    }

    fn decode_control(&self, buffer: &[u8]) -> RtpFormatResult<RtcpCompoundPacket> {
        RtcpCompoundPacket::try_read_from(&mut Cursor::new(buffer))?
            .ok_or(RtpFormatError::PacketTruncated("rtcp compound packet"))
    }

    fn encode_data(&self, packet: &RtpDataPacket) -> RtpFormatResult<Bytes> {
        let mut buffer = Vec::with_capacity(packet.packet_size());
        packet.write_to(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }

    fn encode_control(&self, packet: &RtcpCompoundPacket) -> RtpFormatResult<Bytes> {
        let mut buffer = Vec::with_capacity(packet.packet_size());
        packet.write_to(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod test {
    use crate::rtcp::{RtcpPacket, receiver_report::ReceiverReportPacket, sdes::SourceDescriptionPacket};

    use super::*;

    #[test]
    fn test_codec_data_round_trip() {
        let codec = Rfc3550Codec;
        let packet = RtpDataPacket::builder()
            .payload_type(8)
            .sequence_number(7)
            .ssrc(0x9999)
            .payload(Bytes::from_static(&[1, 2, 3, 4]))
            .build()
            .unwrap();

        let wire = codec.encode_data(&packet).unwrap();
        let decoded = codec.decode_data(&wire).unwrap();
        assert_eq!(decoded.sequence_number, 7);
        assert_eq!(decoded.ssrc, 0x9999);
    }

    #[test]
    fn test_codec_control_round_trip() {
        let codec = Rfc3550Codec;
        let compound = RtcpCompoundPacket::builder()
            .packet(RtcpPacket::ReceiverReport(
                ReceiverReportPacket::builder()
                    .sender_ssrc(0x1234)
                    .build()
                    .unwrap(),
            ))
            .packet(RtcpPacket::SourceDescription(
                SourceDescriptionPacket::builder()
                    .cname(0x1234, "tester@host".to_string())
                    .unwrap()
                    .build()
                    .unwrap(),
            ))
            .build()
            .unwrap();

        let wire = codec.encode_control(&compound).unwrap();
        let decoded = codec.decode_control(&wire).unwrap();
        assert_eq!(decoded.packets().len(), 2);
    }

    #[test]
    fn test_codec_rejects_truncated_data() {
        let codec = Rfc3550Codec;
        let result = codec.decode_data(&[0x80, 0x00, 0x01]);
        assert!(matches!(result, Err(RtpFormatError::PacketTruncated(_))));
    }
}
