use std::{net::SocketAddr, time::Instant};

use efflux_formats::rtcp::sdes::{SdesChunk, SdesItemKind};

/// Source-description identity of one participant, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub ssrc: u32,
    pub cname: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub tool: Option<String>,
    pub note: Option<String>,
}

impl ParticipantInfo {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            cname: None,
            name: None,
            email: None,
            phone: None,
            location: None,
            tool: None,
            note: None,
        }
    }

    /// Fold an SDES chunk into this identity. Returns true when any field
    /// actually changed. A CNAME, once set to a non-empty value, is never
    /// cleared or blanked by later chunks.
    pub fn update_from_sdes_chunk(&mut self, chunk: &SdesChunk) -> bool {
        let mut changed = false;
        for item in &chunk.items {
            let field = match item.kind {
                SdesItemKind::Cname => {
                    if item.value.is_empty() {
                        continue;
                    }
                    &mut self.cname
                }
                SdesItemKind::Name => &mut self.name,
                SdesItemKind::Email => &mut self.email,
                SdesItemKind::Phone => &mut self.phone,
                SdesItemKind::Location => &mut self.location,
                SdesItemKind::Tool => &mut self.tool,
                SdesItemKind::Note => &mut self.note,
                SdesItemKind::Priv => continue,
            };
            if field.as_deref() != Some(item.value.as_str()) {
                *field = Some(item.value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// Runtime record of a remote participant: where it talks from, what it has
/// sent, and whether it has said goodbye.
#[derive(Debug, Clone)]
pub struct RtpParticipant {
    info: ParticipantInfo,
    data_address: Option<SocketAddr>,
    control_address: Option<SocketAddr>,
    last_data_origin: Option<SocketAddr>,
    last_control_origin: Option<SocketAddr>,
    last_sequence_number: i32,
    received_packet_count: u64,
    bye_received: bool,
    received_sdes: bool,
    last_activity: Instant,
}

impl RtpParticipant {
    pub fn new(ssrc: u32) -> Self {
        Self {
            info: ParticipantInfo::new(ssrc),
            data_address: None,
            control_address: None,
            last_data_origin: None,
            last_control_origin: None,
            last_sequence_number: -1,
            received_packet_count: 0,
            bye_received: false,
            received_sdes: false,
            last_activity: Instant::now(),
        }
    }

    /// An explicit egress target with both channels known up front.
    pub fn new_receiver(ssrc: u32, data_address: SocketAddr, control_address: SocketAddr) -> Self {
        let mut participant = Self::new(ssrc);
        participant.data_address = Some(data_address);
        participant.control_address = Some(control_address);
        participant
    }

    pub fn info(&self) -> &ParticipantInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ParticipantInfo {
        &mut self.info
    }

    pub fn ssrc(&self) -> u32 {
        self.info.ssrc
    }

    pub fn is_receiver(&self) -> bool {
        self.data_address.is_some() && self.control_address.is_some()
    }

    pub fn data_address(&self) -> Option<SocketAddr> {
        self.data_address
    }

    pub fn control_address(&self) -> Option<SocketAddr> {
        self.control_address
    }

    pub fn set_data_address(&mut self, address: SocketAddr) {
        self.data_address = Some(address);
    }

    pub fn set_control_address(&mut self, address: SocketAddr) {
        self.control_address = Some(address);
    }

    pub fn last_data_origin(&self) -> Option<SocketAddr> {
        self.last_data_origin
    }

    pub fn last_control_origin(&self) -> Option<SocketAddr> {
        self.last_control_origin
    }

    pub fn set_last_data_origin(&mut self, origin: SocketAddr) {
        self.last_data_origin = Some(origin);
    }

    pub fn set_last_control_origin(&mut self, origin: SocketAddr) {
        self.last_control_origin = Some(origin);
    }

    pub fn last_sequence_number(&self) -> i32 {
        self.last_sequence_number
    }

    /// Records unconditionally; the out-of-order discard policy lives in
    /// the session, not here.
    pub fn set_last_sequence_number(&mut self, sequence_number: i32) {
        self.last_sequence_number = sequence_number;
    }

    pub fn received_packet_count(&self) -> u64 {
        self.received_packet_count
    }

    pub fn increment_received_packets(&mut self) {
        self.received_packet_count += 1;
    }

    pub fn bye_received(&self) -> bool {
        self.bye_received
    }

    /// Latches; a participant never un-says goodbye.
    pub fn mark_bye_received(&mut self) {
        self.bye_received = true;
    }

    pub fn received_sdes(&self) -> bool {
        self.received_sdes
    }

    pub fn mark_sdes_received(&mut self) {
        self.received_sdes = true;
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

#[cfg(test)]
mod test {
    use efflux_formats::rtcp::sdes::SourceDescriptionPacket;

    use super::*;

    fn chunk_with(build: impl FnOnce(efflux_formats::rtcp::sdes::SourceDescriptionPacketBuilder) -> efflux_formats::rtcp::sdes::SourceDescriptionPacketBuilder) -> SdesChunk {
        let packet = build(SourceDescriptionPacket::builder()).build().unwrap();
        packet.chunks.into_iter().next().unwrap()
    }

    #[test]
    fn test_update_reports_changes_once() {
        let mut info = ParticipantInfo::new(0x2222);
        let chunk = chunk_with(|b| b.cname(0x2222, "alice".to_string()).unwrap());

        assert!(info.update_from_sdes_chunk(&chunk));
        assert_eq!(info.cname.as_deref(), Some("alice"));
        // identical chunk again: nothing changes
        assert!(!info.update_from_sdes_chunk(&chunk));
    }

    #[test]
    fn test_cname_survives_chunks_without_one() {
        let mut info = ParticipantInfo::new(0x2222);
        let cname_chunk = chunk_with(|b| b.cname(0x2222, "alice".to_string()).unwrap());
        assert!(info.update_from_sdes_chunk(&cname_chunk));

        let name_chunk = chunk_with(|b| b.name(0x2222, "Alice".to_string()).unwrap());
        assert!(info.update_from_sdes_chunk(&name_chunk));
        assert_eq!(info.cname.as_deref(), Some("alice"));
        assert_eq!(info.name.as_deref(), Some("Alice"));

        // an empty CNAME value must not blank the stored one
        let blank = chunk_with(|b| b.cname(0x2222, String::new()).unwrap());
        assert!(!info.update_from_sdes_chunk(&blank));
        assert_eq!(info.cname.as_deref(), Some("alice"));
    }

    #[test]
    fn test_receiver_requires_both_addresses() {
        let mut participant = RtpParticipant::new(0x1111);
        assert!(!participant.is_receiver());
        participant.set_data_address("10.0.0.1:6000".parse().unwrap());
        assert!(!participant.is_receiver());
        participant.set_control_address("10.0.0.1:6001".parse().unwrap());
        assert!(participant.is_receiver());
    }

    #[test]
    fn test_bye_latches() {
        let mut participant = RtpParticipant::new(0x1111);
        assert!(!participant.bye_received());
        participant.mark_bye_received();
        participant.mark_bye_received();
        assert!(participant.bye_received());
    }

    #[test]
    fn test_sequence_number_starts_unset() {
        let participant = RtpParticipant::new(0x1111);
        assert_eq!(participant.last_sequence_number(), -1);
    }
}
