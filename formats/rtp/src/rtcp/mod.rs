use std::io::{self, Cursor, Read};

use tokio_util::bytes::Buf;

use crate::{
    errors::RtpFormatError,
    packet_traits::{PacketSize, ReadRemainingFrom, TryReadFrom, WriteTo},
};

use self::{
    app::AppPacket, bye::ByePacket, common_header::RtcpCommonHeader,
    payload_type::RtcpPayloadType, receiver_report::ReceiverReportPacket,
    sdes::SourceDescriptionPacket, sender_report::SenderReportPacket,
};

pub mod app;
pub mod bye;
pub mod common_header;
pub mod compound;
pub mod ntp;
pub mod payload_type;
pub mod receiver_report;
pub mod report_block;
pub mod sdes;
pub mod sender_report;

#[derive(Debug, Clone)]
pub enum RtcpPacket {
    SenderReport(SenderReportPacket),
    ReceiverReport(ReceiverReportPacket),
    SourceDescription(SourceDescriptionPacket),
    Bye(ByePacket),
    App(AppPacket),
}

impl RtcpPacket {
    pub fn payload_type(&self) -> RtcpPayloadType {
        match self {
            RtcpPacket::SenderReport(_) => RtcpPayloadType::SenderReport,
            RtcpPacket::ReceiverReport(_) => RtcpPayloadType::ReceiverReport,
            RtcpPacket::SourceDescription(_) => RtcpPayloadType::SourceDescription,
            RtcpPacket::Bye(_) => RtcpPayloadType::Bye,
            RtcpPacket::App(_) => RtcpPayloadType::App,
        }
    }

    /// SSRC of the packet's originator, for the kinds that carry one up
    /// front. SDES and BYE name sources in their bodies instead.
    pub fn sender_ssrc(&self) -> Option<u32> {
        match self {
            RtcpPacket::SenderReport(packet) => Some(packet.sender_ssrc),
            RtcpPacket::ReceiverReport(packet) => Some(packet.sender_ssrc),
            RtcpPacket::App(packet) => Some(packet.ssrc),
            RtcpPacket::SourceDescription(_) | RtcpPacket::Bye(_) => None,
        }
    }

    /// Parse one packet body. `reader` must hold exactly the bytes the
    /// common header's length field promised, padding included.
    pub fn read_remaining_from<R: io::Read>(
        header: RtcpCommonHeader,
        reader: &mut R,
    ) -> Result<Self, RtpFormatError> {
        match RtcpPayloadType::try_from(header.packet_type)? {
            RtcpPayloadType::SenderReport => Ok(Self::SenderReport(
                SenderReportPacket::read_remaining_from(header, reader)?,
            )),
            RtcpPayloadType::ReceiverReport => Ok(Self::ReceiverReport(
                ReceiverReportPacket::read_remaining_from(header, reader)?,
            )),
            RtcpPayloadType::SourceDescription => Ok(Self::SourceDescription(
                SourceDescriptionPacket::read_remaining_from(header, reader)?,
            )),
            RtcpPayloadType::Bye => Ok(Self::Bye(ByePacket::read_remaining_from(header, reader)?)),
            RtcpPayloadType::App => Ok(Self::App(AppPacket::read_remaining_from(header, reader)?)),
        }
    }
}

impl PacketSize for RtcpPacket {
    fn packet_size(&self) -> usize {
        match self {
            RtcpPacket::SenderReport(packet) => packet.packet_size(),
            RtcpPacket::ReceiverReport(packet) => packet.packet_size(),
            RtcpPacket::SourceDescription(packet) => packet.packet_size(),
            RtcpPacket::Bye(packet) => packet.packet_size(),
            RtcpPacket::App(packet) => packet.packet_size(),
        }
    }
}

impl<W: io::Write> WriteTo<W> for RtcpPacket {
    type Error = RtpFormatError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        match self {
            RtcpPacket::SenderReport(packet) => packet.write_to(writer),
            RtcpPacket::ReceiverReport(packet) => packet.write_to(writer),
            RtcpPacket::SourceDescription(packet) => packet.write_to(writer),
            RtcpPacket::Bye(packet) => packet.write_to(writer),
            RtcpPacket::App(packet) => packet.write_to(writer),
        }
    }
}

/// Outcome of scanning one packet slot inside a compound buffer.
pub(crate) enum ScannedPacket {
    Known(RtcpPacket),
    /// A payload type this implementation does not model; the scan already
    /// stepped over its body.
    Unknown,
    /// Not enough bytes buffered for the announced length.
    Incomplete,
}

/// Read one packet from the cursor, stepping over unknown payload types
/// instead of failing the surrounding compound.
pub(crate) fn scan_packet<R: AsRef<[u8]>>(
    cursor: &mut Cursor<R>,
) -> Result<Option<ScannedPacket>, RtpFormatError> {
    let Some(header) = RtcpCommonHeader::try_read_from(cursor)? else {
        return Ok(None);
    };

    let body_size = header.length as usize * 4;
    if cursor.remaining() < body_size {
        return Ok(Some(ScannedPacket::Incomplete));
    }

    if RtcpPayloadType::try_from(header.packet_type).is_err() {
        cursor.advance(body_size);
        return Ok(Some(ScannedPacket::Unknown));
    }

    let mut body = vec![0_u8; body_size];
    cursor.read_exact(&mut body)?;
    if header.padding && !body.is_empty() {
        let pad = *body.last().unwrap() as usize;
        if pad == 0 || pad > body.len() {
            return Err(RtpFormatError::BadPaddingSize(pad));
        }
        body.truncate(body.len() - pad);
    }

    let packet = RtcpPacket::read_remaining_from(header, &mut Cursor::new(&body))?;
    Ok(Some(ScannedPacket::Known(packet)))
}
