use std::{
    collections::HashSet,
    fmt,
    net::SocketAddr,
    sync::{
        Arc, RwLock, Weak,
        atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering},
    },
};

use efflux_formats::{
    codec::PacketCodec,
    data::RtpDataPacket,
    rtcp::{
        RtcpPacket, bye::ByePacket, compound::RtcpCompoundPacket,
        receiver_report::ReceiverReportPacket, report_block::ReportBlock,
        sdes::SourceDescriptionPacket, sender_report::SenderReportPacket,
    },
};
use num::ToPrimitive;
use tokio_util::{bytes::Bytes, sync::CancellationToken};
use uuid::Uuid;

use crate::{
    collision::{self, SsrcVerdict},
    config::SessionConfig,
    database::{ParticipantDatabase, ParticipantEventListener},
    errors::{RtpSessionError, RtpSessionResult},
    listener::{ListenerRegistry, RtpControlListener, RtpDataListener, RtpSessionEventListener},
    participant::{ParticipantInfo, RtpParticipant},
    scheduler::{FixedInterval, RtcpScheduler},
    sync::{read_lock, write_lock},
    transport::{DatagramChannel, DatagramHandler, DatagramTransport},
};

const TOOL_SIGNATURE: &str = concat!("efflux ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The host application asked for the teardown.
    Requested,
    /// Our own traffic arrived back from our own address.
    SelfLoopDetected,
    /// SSRC collisions kept happening past the configured budget.
    CollisionLoopDetected,
}

impl TerminationCause {
    fn bye_reason(&self) -> &'static str {
        match self {
            TerminationCause::Requested => "session terminated",
            TerminationCause::SelfLoopDetected => "loop to own address detected",
            TerminationCause::CollisionLoopDetected => "too many ssrc collisions",
        }
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bye_reason())
    }
}

#[derive(Clone)]
struct SessionChannels {
    data: Arc<dyn DatagramChannel>,
    control: Arc<dyn DatagramChannel>,
}

/// A single-stream RTP peer: frames and broadcasts outbound media, keeps a
/// live participant database from inbound RTP and RTCP, arbitrates SSRC
/// conflicts, and emits periodic compound reports.
///
/// Lifecycle is `created -> running -> terminated`, driven by [`init`] and
/// [`terminate`]; both directions are one-way.
///
/// [`init`]: RtpSession::init
/// [`terminate`]: RtpSession::terminate
pub struct RtpSession {
    config: SessionConfig,
    transport: Arc<dyn DatagramTransport>,
    codec: Arc<dyn PacketCodec>,
    database: Arc<ParticipantDatabase>,
    listeners: ListenerRegistry,
    local_info: RwLock<ParticipantInfo>,
    local_ssrc: AtomicU32,
    running: AtomicBool,
    teardown_started: AtomicBool,
    sequence: AtomicU16,
    sent_or_received: AtomicBool,
    collisions: AtomicU32,
    sent_packets: AtomicU64,
    sent_bytes: AtomicU64,
    channels: RwLock<Option<SessionChannels>>,
    /// Serializes `init` against `terminate`; everything else is lock-free
    /// or takes short read/write sections.
    lifecycle: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    scheduler: RtcpScheduler,
}

impl RtpSession {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn DatagramTransport>,
        codec: Arc<dyn PacketCodec>,
    ) -> Arc<Self> {
        let local_ssrc = collision::draw_ssrc(0, &HashSet::new());
        let mut local_info = ParticipantInfo::new(local_ssrc);
        local_info.cname = config.local.cname.clone();
        local_info.name = config.local.name.clone();
        local_info.email = config.local.email.clone();
        local_info.phone = config.local.phone.clone();
        local_info.location = config.local.location.clone();
        local_info.tool = config.local.tool.clone();
        local_info.note = config.local.note.clone();

        let shutdown = CancellationToken::new();
        let scheduler = RtcpScheduler::new(
            Arc::new(FixedInterval::new(config.periodic_rtcp_interval)),
            shutdown.child_token(),
        );

        let session = Arc::new(Self {
            config,
            transport,
            codec,
            database: Arc::new(ParticipantDatabase::new()),
            listeners: ListenerRegistry::default(),
            local_info: RwLock::new(local_info),
            local_ssrc: AtomicU32::new(local_ssrc),
            running: AtomicBool::new(false),
            teardown_started: AtomicBool::new(false),
            sequence: AtomicU16::new(0),
            sent_or_received: AtomicBool::new(false),
            collisions: AtomicU32::new(0),
            sent_packets: AtomicU64::new(0),
            sent_bytes: AtomicU64::new(0),
            channels: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            shutdown,
            scheduler,
        });

        let session_dyn: Arc<dyn ParticipantEventListener> = session.clone();
        let events: Weak<dyn ParticipantEventListener> = Arc::downgrade(&session_dyn);
        session.database.set_event_listener(events);
        session
    }

    /// Bind both channels and start running. Returns false when either
    /// bind fails (releasing whatever did bind), when already running, or
    /// after termination.
    pub async fn init(self: &Arc<Self>) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        if self.running.load(Ordering::Acquire) || self.teardown_started.load(Ordering::Acquire) {
            return false;
        }

        let data_handler: Arc<dyn DatagramHandler> = Arc::new(DataChannelHandler {
            session: Arc::downgrade(self),
        });
        let data = match self
            .transport
            .bind(self.config.local.data_address, data_handler)
            .await
        {
            Ok(channel) => channel,
            Err(err) => {
                tracing::error!(
                    "failed to bind data channel on {}: {}",
                    self.config.local.data_address,
                    err
                );
                return false;
            }
        };

        let control_handler: Arc<dyn DatagramHandler> = Arc::new(ControlChannelHandler {
            session: Arc::downgrade(self),
        });
        let control = match self
            .transport
            .bind(self.config.local.control_address, control_handler)
            .await
        {
            Ok(channel) => channel,
            Err(err) => {
                tracing::error!(
                    "failed to bind control channel on {}: {}",
                    self.config.local.control_address,
                    err
                );
                data.close();
                return false;
            }
        };

        *write_lock(&self.channels) = Some(SessionChannels { data, control });
        self.running.store(true, Ordering::Release);

        // announce ourselves: empty receiver report plus our SDES
        self.broadcast_join(self.local_ssrc());

        if self.config.automated_rtcp_handling {
            let weak = Arc::downgrade(self);
            self.scheduler.start(move || {
                let weak = weak.clone();
                Box::pin(async move {
                    match weak.upgrade() {
                        None => false,
                        Some(session) => {
                            session.emit_compound_rtcp();
                            session.is_running()
                        }
                    }
                })
            });
        }
        self.database.spawn_idle_sweeper(
            self.config.participant_idle_timeout,
            self.shutdown.child_token(),
        );

        tracing::info!(
            "rtp session {} running with ssrc {:08x}",
            self.config.id,
            self.local_ssrc()
        );
        true
    }

    /// Tear the session down: close the data channel, say goodbye on the
    /// control channel, close it, stop the timers, notify, and drop all
    /// listeners. Idempotent; only the first caller does the work.
    pub async fn terminate(&self) {
        self.shutdown_session(TerminationCause::Requested).await;
    }

    async fn shutdown_session(&self, cause: TerminationCause) {
        if self.teardown_started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.running.store(false, Ordering::Release);
        let _lifecycle = self.lifecycle.lock().await;
        // an init may have finished while we waited for the lock
        self.running.store(false, Ordering::Release);
        self.shutdown.cancel();

        let channels = write_lock(&self.channels).take();
        let was_running = channels.is_some();
        if let Some(channels) = channels {
            channels.data.close();
            match self.build_farewell(self.local_ssrc(), cause.bye_reason()) {
                Ok(farewell) => self.send_control_to_receivers(&channels, &farewell),
                Err(err) => tracing::error!("failed to build farewell compound: {}", err),
            }
            channels.control.close();
        }

        if was_running {
            self.listeners
                .event
                .notify(|listener| listener.session_terminated(self.config.id.as_str(), &cause));
        }
        self.listeners.clear_all();
        tracing::info!("rtp session {} terminated: {}", self.config.id, cause);
    }

    fn terminate_async(self: &Arc<Self>, cause: TerminationCause) {
        // stop ingress right away; the blocking part of the teardown runs
        // off the dispatch path
        self.running.store(false, Ordering::Release);
        let session = self.clone();
        tokio::spawn(async move {
            session.shutdown_session(cause).await;
        });
    }

    /// Frame `payload` as a data packet and broadcast it to the receivers.
    pub fn send_data(&self, payload: Bytes, timestamp: u32, marker: bool) -> bool {
        match RtpDataPacket::builder()
            .timestamp(timestamp)
            .marker(marker)
            .payload(payload)
            .build()
        {
            Ok(packet) => self.send_data_packet(packet),
            Err(err) => {
                tracing::error!("failed to build data packet: {}", err);
                false
            }
        }
    }

    /// Broadcast a caller-built data packet. The engine owns identity and
    /// ordering on egress, so the packet's payload type, SSRC and sequence
    /// number are overwritten.
    pub fn send_data_packet(&self, mut packet: RtpDataPacket) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(channels) = self.channel_snapshot() else {
            return false;
        };

        packet.payload_type = self.config.payload_type;
        packet.ssrc = self.local_ssrc();
        packet.sequence_number = self.next_sequence_number();

        let wire = match self.codec.encode_data(&packet) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::error!("failed to encode data packet: {}", err);
                return false;
            }
        };

        self.database.do_with_receivers(|receiver| {
            if receiver.bye_received() {
                return;
            }
            let Some(address) = receiver.data_address() else {
                return;
            };
            if let Err(err) = channels.data.send(wire.clone(), address) {
                tracing::warn!("data send to {} failed: {}", address, err);
            }
        });

        self.sent_or_received.store(true, Ordering::Release);
        self.sent_packets.fetch_add(1, Ordering::AcqRel);
        self.sent_bytes
            .fetch_add(packet.payload.len() as u64, Ordering::AcqRel);
        true
    }

    /// Send one control packet to the receivers. With automated RTCP
    /// handling on, the engine owns reports, SDES and BYE, so only APP
    /// packets pass.
    pub fn send_control_packet(&self, packet: RtcpPacket) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.config.automated_rtcp_handling && !matches!(packet, RtcpPacket::App(_)) {
            tracing::warn!("automated rtcp handling owns report, sdes and bye emission");
            return false;
        }
        match RtcpCompoundPacket::builder().packet(packet).build() {
            Ok(compound) => self.dispatch_control(&compound),
            Err(err) => {
                tracing::error!("failed to build control compound: {}", err);
                false
            }
        }
    }

    /// Compound variant of [`send_control_packet`], same APP-only rule.
    ///
    /// [`send_control_packet`]: RtpSession::send_control_packet
    pub fn send_control_compound(&self, compound: RtcpCompoundPacket) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.config.automated_rtcp_handling
            && compound
                .packets()
                .iter()
                .any(|packet| !matches!(packet, RtcpPacket::App(_)))
        {
            tracing::warn!("automated rtcp handling owns report, sdes and bye emission");
            return false;
        }
        self.dispatch_control(&compound)
    }

    /// Inbound data entry point; called by the data channel handler with
    /// decoded packets in per-origin arrival order.
    pub fn on_data(self: &Arc<Self>, origin: SocketAddr, packet: RtpDataPacket) {
        if !self.is_running() {
            return;
        }
        if packet.payload_type != self.config.payload_type {
            tracing::trace!(
                "dropping data packet with foreign payload type {}",
                packet.payload_type
            );
            return;
        }

        match collision::classify(
            packet.ssrc,
            origin,
            self.local_ssrc(),
            self.config.local.data_address,
            self.collisions.load(Ordering::Acquire),
            self.config.max_collisions_before_loop,
            &self.database.member_ssrcs(),
        ) {
            SsrcVerdict::SelfLoop => {
                tracing::error!("own traffic looped back from {}", origin);
                self.terminate_async(TerminationCause::SelfLoopDetected);
                return;
            }
            SsrcVerdict::LoopByCollisions => {
                tracing::error!("ssrc collision budget exhausted, assuming loop");
                self.terminate_async(TerminationCause::CollisionLoopDetected);
                return;
            }
            SsrcVerdict::Collision { new_ssrc } => self.resolve_collision(new_ssrc),
            SsrcVerdict::Normal => {}
        }

        let participant = self.database.get_or_create_from_data_packet(origin, &packet);
        let info = {
            let mut participant = write_lock(&participant);
            let sequence_number = packet.sequence_number as i32;
            if self.config.discard_out_of_order
                && sequence_number <= participant.last_sequence_number()
            {
                tracing::trace!(
                    "discarding out of order packet {} (last delivered {})",
                    sequence_number,
                    participant.last_sequence_number()
                );
                return;
            }
            participant.set_last_sequence_number(sequence_number);
            participant.set_last_data_origin(origin);
            if participant.data_address().is_none() {
                participant.set_data_address(origin);
            }
            participant.increment_received_packets();
            participant.touch();
            participant.info().clone()
        };
        self.sent_or_received.store(true, Ordering::Release);

        self.listeners.data.notify(|listener| {
            listener.data_packet_received(self.config.id.as_str(), &info, &packet)
        });
    }

    /// Inbound control entry point. With automated handling off the raw
    /// compound goes straight to the control listeners; otherwise the
    /// constituent packets are dispatched in order.
    pub fn on_control(&self, origin: SocketAddr, compound: RtcpCompoundPacket) {
        if !self.is_running() {
            return;
        }
        if !self.config.automated_rtcp_handling {
            self.listeners.control.notify(|listener| {
                listener.control_packet_received(self.config.id.as_str(), &compound)
            });
            return;
        }

        for packet in compound.packets() {
            match packet {
                RtcpPacket::SenderReport(report) => {
                    self.process_report(origin, report.sender_ssrc, &report.report_blocks)
                }
                RtcpPacket::ReceiverReport(report) => {
                    self.process_report(origin, report.sender_ssrc, &report.report_blocks)
                }
                RtcpPacket::SourceDescription(sdes) => self.process_sdes(origin, sdes),
                RtcpPacket::Bye(bye) => self.process_bye(bye),
                RtcpPacket::App(app) => self.listeners.control.notify(|listener| {
                    listener.app_data_received(self.config.id.as_str(), app)
                }),
            }
        }
    }

    /// One scheduler tick: send `{report, SDES}` to every live receiver,
    /// picking a sender or receiver report by whether media has gone out.
    pub fn emit_compound_rtcp(&self) {
        if !self.is_running() {
            return;
        }
        let Some(channels) = self.channel_snapshot() else {
            return;
        };
        let local_ssrc = self.local_ssrc();
        let sdes = match self.build_sdes(local_ssrc) {
            Ok(sdes) => sdes,
            Err(err) => {
                tracing::error!("failed to build sdes packet: {}", err);
                return;
            }
        };

        self.database.do_with_receivers(|receiver| {
            if receiver.bye_received() {
                return;
            }
            let Some(address) = receiver.control_address() else {
                return;
            };
            let compound = self
                .build_report(local_ssrc, receiver)
                .and_then(|report| {
                    RtcpCompoundPacket::builder()
                        .packet(report)
                        .packet(RtcpPacket::SourceDescription(sdes.clone()))
                        .build()
                        .map_err(RtpSessionError::Format)
                });
            let compound = match compound {
                Ok(compound) => compound,
                Err(err) => {
                    tracing::error!(
                        "failed to build report compound for {:08x}: {}",
                        receiver.ssrc(),
                        err
                    );
                    return;
                }
            };
            match self.codec.encode_control(&compound) {
                Ok(wire) => {
                    if let Err(err) = channels.control.send(wire, address) {
                        tracing::warn!("control send to {} failed: {}", address, err);
                    }
                }
                Err(err) => tracing::error!("failed to encode report compound: {}", err),
            }
        });
    }

    pub fn add_receiver(&self, participant: RtpParticipant) -> bool {
        if participant.ssrc() == self.local_ssrc() {
            return false;
        }
        self.database.add_receiver(participant)
    }

    pub fn remove_receiver(&self, ssrc: u32) -> bool {
        self.database.remove_receiver(ssrc)
    }

    pub fn remote_participant(&self, ssrc: u32) -> Option<RtpParticipant> {
        self.database
            .get_participant(ssrc)
            .map(|participant| read_lock(&participant).clone())
    }

    pub fn remote_participants(&self) -> Vec<RtpParticipant> {
        self.database.get_members().into_values().collect()
    }

    pub fn add_data_listener(&self, listener: Arc<dyn RtpDataListener>) -> Uuid {
        self.listeners.data.add(listener)
    }

    pub fn remove_data_listener(&self, id: Uuid) -> bool {
        self.listeners.data.remove(id)
    }

    pub fn add_control_listener(&self, listener: Arc<dyn RtpControlListener>) -> Uuid {
        self.listeners.control.add(listener)
    }

    pub fn remove_control_listener(&self, id: Uuid) -> bool {
        self.listeners.control.remove(id)
    }

    pub fn add_event_listener(&self, listener: Arc<dyn RtpSessionEventListener>) -> Uuid {
        self.listeners.event.add(listener)
    }

    pub fn remove_event_listener(&self, id: Uuid) -> bool {
        self.listeners.event.remove(id)
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn local_ssrc(&self) -> u32 {
        self.local_ssrc.load(Ordering::Acquire)
    }

    pub fn local_participant_info(&self) -> ParticipantInfo {
        read_lock(&self.local_info).clone()
    }

    pub fn sent_packet_count(&self) -> u64 {
        self.sent_packets.load(Ordering::Acquire)
    }

    pub fn sent_octet_count(&self) -> u64 {
        self.sent_bytes.load(Ordering::Acquire)
    }

    pub fn collision_count(&self) -> u32 {
        self.collisions.load(Ordering::Acquire)
    }

    fn next_sequence_number(&self) -> u16 {
        // increments before use; the first packet carries 1, and the
        // atomic wraps at 2^16 on its own
        self.sequence.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    fn channel_snapshot(&self) -> Option<SessionChannels> {
        read_lock(&self.channels).clone()
    }

    fn dispatch_control(&self, compound: &RtcpCompoundPacket) -> bool {
        let Some(channels) = self.channel_snapshot() else {
            return false;
        };
        self.send_control_to_receivers(&channels, compound);
        true
    }

    fn send_control_to_receivers(&self, channels: &SessionChannels, compound: &RtcpCompoundPacket) {
        let wire = match self.codec.encode_control(compound) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::error!("failed to encode control compound: {}", err);
                return;
            }
        };
        self.database.do_with_receivers(|receiver| {
            if receiver.bye_received() {
                return;
            }
            let Some(address) = receiver.control_address() else {
                return;
            };
            if let Err(err) = channels.control.send(wire.clone(), address) {
                tracing::warn!("control send to {} failed: {}", address, err);
            }
        });
    }

    fn resolve_collision(&self, new_ssrc: u32) {
        let old_ssrc = self.local_ssrc.swap(new_ssrc, Ordering::AcqRel);
        self.collisions.fetch_add(1, Ordering::AcqRel);
        write_lock(&self.local_info).ssrc = new_ssrc;
        tracing::warn!(
            "ssrc collision resolved: {:08x} -> {:08x}",
            old_ssrc,
            new_ssrc
        );

        // RFC 3550 8.2: a source that has not sent or processed anything
        // yet just changes identity silently
        if self.sent_or_received.load(Ordering::Acquire) {
            if let Some(channels) = self.channel_snapshot() {
                match self.build_farewell(old_ssrc, "ssrc collision") {
                    Ok(farewell) => self.send_control_to_receivers(&channels, &farewell),
                    Err(err) => tracing::error!("failed to build collision farewell: {}", err),
                }
            }
            self.broadcast_join(new_ssrc);
        }

        self.listeners.event.notify(|listener| {
            listener.resolved_ssrc_conflict(self.config.id.as_str(), old_ssrc, new_ssrc)
        });
    }

    fn process_report(&self, origin: SocketAddr, sender_ssrc: u32, blocks: &[ReportBlock]) {
        // a sender must announce itself through data or SDES first
        let Some(participant) = self.database.get_participant(sender_ssrc) else {
            tracing::debug!("ignoring report from unknown ssrc {:08x}", sender_ssrc);
            return;
        };
        {
            let mut participant = write_lock(&participant);
            participant.set_last_control_origin(origin);
            participant.touch();
        }
        let local_ssrc = self.local_ssrc();
        for block in blocks.iter().filter(|block| block.ssrc == local_ssrc) {
            // feedback about the local stream; loss and jitter tracking
            // will consume these blocks
            tracing::trace!(
                "reception report for local stream: fraction_lost={}, jitter={}",
                block.fraction_lost,
                block.interarrival_jitter
            );
        }
    }

    fn process_sdes(&self, origin: SocketAddr, sdes: &SourceDescriptionPacket) {
        for chunk in &sdes.chunks {
            let participant = self.database.get_or_create_from_sdes_chunk(origin, chunk);
            let (changed, info) = {
                let mut participant = write_lock(&participant);
                let first_sdes = !participant.received_sdes();
                participant.mark_sdes_received();
                participant.set_last_control_origin(origin);
                participant.touch();
                let changed = if self.config.try_to_update_on_every_sdes || first_sdes {
                    participant.info_mut().update_from_sdes_chunk(chunk)
                } else {
                    false
                };
                (changed, participant.info().clone())
            };
            if changed {
                self.listeners.event.notify(|listener| {
                    listener.participant_data_updated(self.config.id.as_str(), &info)
                });
            }
        }
    }

    fn process_bye(&self, bye: &ByePacket) {
        for ssrc in &bye.ssrc_list {
            let Some(participant) = self.database.get_participant(*ssrc) else {
                continue;
            };
            let info = {
                let mut participant = write_lock(&participant);
                participant.mark_bye_received();
                participant.touch();
                participant.info().clone()
            };
            // not deleted here; the idle sweep reaps the entry so late
            // duplicate BYEs still resolve to the same identity
            tracing::debug!("participant {:08x} left the session", ssrc);
            self.listeners
                .event
                .notify(|listener| listener.participant_left(self.config.id.as_str(), &info));
        }
    }

    fn build_report(
        &self,
        local_ssrc: u32,
        context: &RtpParticipant,
    ) -> RtpSessionResult<RtcpPacket> {
        // loss, jitter and LSR/DLSR stay zero until reception tracking
        // fills them in
        let block = (context.received_packet_count() > 0)
            .then(|| ReportBlock::builder().ssrc(context.ssrc()).build());

        if self.sent_packets.load(Ordering::Acquire) > 0 {
            let mut builder = SenderReportPacket::builder()
                .sender_ssrc(local_ssrc)
                .sender_packet_count(
                    self.sent_packets
                        .load(Ordering::Acquire)
                        .to_u32()
                        .unwrap_or(u32::MAX),
                )
                .sender_octet_count(
                    self.sent_bytes
                        .load(Ordering::Acquire)
                        .to_u32()
                        .unwrap_or(u32::MAX),
                );
            if let Some(block) = block {
                builder = builder.report_block(block);
            }
            Ok(RtcpPacket::SenderReport(builder.build()?))
        } else {
            let mut builder = ReceiverReportPacket::builder().sender_ssrc(local_ssrc);
            if let Some(block) = block {
                builder = builder.report_block(block);
            }
            Ok(RtcpPacket::ReceiverReport(builder.build()?))
        }
    }

    fn build_sdes(&self, ssrc: u32) -> RtpSessionResult<SourceDescriptionPacket> {
        let info = read_lock(&self.local_info).clone();
        let cname = info
            .cname
            .filter(|cname| !cname.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "efflux/{}@{}",
                    self.config.id, self.config.local.data_address
                )
            });

        let mut builder = SourceDescriptionPacket::builder().cname(ssrc, cname)?;
        if let Some(name) = info.name {
            builder = builder.name(ssrc, name)?;
        }
        if let Some(email) = info.email {
            builder = builder.email(ssrc, email)?;
        }
        if let Some(phone) = info.phone {
            builder = builder.phone(ssrc, phone)?;
        }
        if let Some(location) = info.location {
            builder = builder.location(ssrc, location)?;
        }
        if let Some(note) = info.note {
            builder = builder.note(ssrc, note)?;
        }
        let tool = info
            .tool
            .filter(|tool| !tool.is_empty())
            .unwrap_or_else(|| TOOL_SIGNATURE.to_string());
        builder = builder.tool(ssrc, tool)?;

        builder.build().map_err(RtpSessionError::Format)
    }

    fn build_join(&self, ssrc: u32) -> RtpSessionResult<RtcpCompoundPacket> {
        let report = ReceiverReportPacket::builder().sender_ssrc(ssrc).build()?;
        RtcpCompoundPacket::builder()
            .packet(RtcpPacket::ReceiverReport(report))
            .packet(RtcpPacket::SourceDescription(self.build_sdes(ssrc)?))
            .build()
            .map_err(RtpSessionError::Format)
    }

    fn broadcast_join(&self, ssrc: u32) {
        let Some(channels) = self.channel_snapshot() else {
            return;
        };
        match self.build_join(ssrc) {
            Ok(join) => self.send_control_to_receivers(&channels, &join),
            Err(err) => tracing::error!("failed to build join compound: {}", err),
        }
    }

    fn build_farewell(&self, ssrc: u32, reason: &str) -> RtpSessionResult<RtcpCompoundPacket> {
        let bye = ByePacket::builder()
            .ssrc(ssrc)
            .reason(reason.to_string())
            .build()?;
        RtcpCompoundPacket::builder()
            .packet(RtcpPacket::SourceDescription(self.build_sdes(ssrc)?))
            .packet(RtcpPacket::Bye(bye))
            .build()
            .map_err(RtpSessionError::Format)
    }
}

impl ParticipantEventListener for RtpSession {
    fn participant_created_from_data_packet(&self, participant: &RtpParticipant) {
        self.listeners.event.notify(|listener| {
            listener.participant_created_from_data_packet(
                self.config.id.as_str(),
                participant.info(),
            )
        });
    }

    fn participant_created_from_sdes_chunk(&self, participant: &RtpParticipant) {
        self.listeners.event.notify(|listener| {
            listener
                .participant_created_from_sdes_chunk(self.config.id.as_str(), participant.info())
        });
    }

    fn participant_deleted(&self, participant: &RtpParticipant) {
        self.listeners.event.notify(|listener| {
            listener.participant_deleted(self.config.id.as_str(), participant.info())
        });
    }
}

struct DataChannelHandler {
    session: Weak<RtpSession>,
}

impl DatagramHandler for DataChannelHandler {
    fn on_datagram(&self, origin: SocketAddr, datagram: Bytes) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        match session.codec.decode_data(&datagram) {
            Ok(packet) => session.on_data(origin, packet),
            Err(err) => {
                tracing::debug!("dropping undecodable data datagram from {}: {}", origin, err)
            }
        }
    }
}

struct ControlChannelHandler {
    session: Weak<RtpSession>,
}

impl DatagramHandler for ControlChannelHandler {
    fn on_datagram(&self, origin: SocketAddr, datagram: Bytes) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        match session.codec.decode_control(&datagram) {
            Ok(compound) => session.on_control(origin, compound),
            Err(err) => tracing::debug!(
                "dropping undecodable control datagram from {}: {}",
                origin,
                err
            ),
        }
    }
}
