use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{Arc, RwLock, Weak},
    time::Duration,
};

use efflux_formats::{data::RtpDataPacket, rtcp::sdes::SdesChunk};
use tokio_util::sync::CancellationToken;

use crate::{
    participant::RtpParticipant,
    sync::{read_lock, write_lock},
};

/// Callback surface the owning session injects to hear about participant
/// lifecycle without the database holding a back-pointer.
pub trait ParticipantEventListener: Send + Sync {
    fn participant_created_from_data_packet(&self, _participant: &RtpParticipant) {}
    fn participant_created_from_sdes_chunk(&self, _participant: &RtpParticipant) {}
    fn participant_deleted(&self, _participant: &RtpParticipant) {}
}

/// How often the idle sweep wakes up to look for stale entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// SSRC-keyed store of remote participants.
///
/// Entries are individually locked so ingress paths can update one
/// participant without holding the whole table, and every iteration works
/// on a snapshot. The local SSRC is never a key here; the session
/// arbitrates collisions before anything reaches this store.
pub struct ParticipantDatabase {
    members: RwLock<HashMap<u32, Arc<RwLock<RtpParticipant>>>>,
    /// SSRCs admitted as explicit egress targets via `add_receiver`.
    receivers: RwLock<HashSet<u32>>,
    events: RwLock<Option<Weak<dyn ParticipantEventListener>>>,
}

impl Default for ParticipantDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantDatabase {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            receivers: RwLock::new(HashSet::new()),
            events: RwLock::new(None),
        }
    }

    pub fn set_event_listener(&self, listener: Weak<dyn ParticipantEventListener>) {
        *write_lock(&self.events) = Some(listener);
    }

    fn notify(&self, op: impl FnOnce(&dyn ParticipantEventListener)) {
        let listener = read_lock(&self.events)
            .as_ref()
            .and_then(|listener| listener.upgrade());
        if let Some(listener) = listener {
            op(listener.as_ref());
        }
    }

    /// Admit an explicit egress target. Fails when the participant lacks
    /// either address, when it is already an explicit receiver, or when an
    /// existing entry with the same SSRC carries conflicting addresses.
    pub fn add_receiver(&self, participant: RtpParticipant) -> bool {
        if !participant.is_receiver() {
            return false;
        }
        let ssrc = participant.ssrc();

        let mut receivers = write_lock(&self.receivers);
        if receivers.contains(&ssrc) {
            return false;
        }

        let mut members = write_lock(&self.members);
        match members.get(&ssrc) {
            None => {
                members.insert(ssrc, Arc::new(RwLock::new(participant)));
            }
            Some(existing) => {
                let mut existing = write_lock(existing);
                let conflicting = |known: Option<SocketAddr>, new: Option<SocketAddr>| {
                    known.is_some() && new.is_some() && known != new
                };
                if conflicting(existing.data_address(), participant.data_address())
                    || conflicting(existing.control_address(), participant.control_address())
                {
                    return false;
                }
                if let Some(address) = participant.data_address() {
                    existing.set_data_address(address);
                }
                if let Some(address) = participant.control_address() {
                    existing.set_control_address(address);
                }
            }
        }
        receivers.insert(ssrc);
        true
    }

    pub fn remove_receiver(&self, ssrc: u32) -> bool {
        write_lock(&self.receivers).remove(&ssrc)
    }

    pub fn is_receiver(&self, ssrc: u32) -> bool {
        read_lock(&self.receivers).contains(&ssrc)
    }

    pub fn get_participant(&self, ssrc: u32) -> Option<Arc<RwLock<RtpParticipant>>> {
        read_lock(&self.members).get(&ssrc).cloned()
    }

    /// Participant for an inbound data packet, created on first sight with
    /// the packet's origin as its data address.
    pub fn get_or_create_from_data_packet(
        &self,
        origin: SocketAddr,
        packet: &RtpDataPacket,
    ) -> Arc<RwLock<RtpParticipant>> {
        if let Some(existing) = self.get_participant(packet.ssrc) {
            return existing;
        }

        let created = {
            let mut members = write_lock(&self.members);
            match members.entry(packet.ssrc) {
                std::collections::hash_map::Entry::Occupied(entry) => {
                    return entry.get().clone();
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let mut participant = RtpParticipant::new(packet.ssrc);
                    participant.set_data_address(origin);
                    participant.set_last_data_origin(origin);
                    entry.insert(Arc::new(RwLock::new(participant))).clone()
                }
            }
        };
        let snapshot = read_lock(&created).clone();
        self.notify(|listener| listener.participant_created_from_data_packet(&snapshot));
        created
    }

    /// Participant for an SDES chunk. A member discovered earlier through
    /// data is one identity, so it is augmented with the control origin
    /// instead of spawning a second entry.
    pub fn get_or_create_from_sdes_chunk(
        &self,
        origin: SocketAddr,
        chunk: &SdesChunk,
    ) -> Arc<RwLock<RtpParticipant>> {
        if let Some(existing) = self.get_participant(chunk.ssrc) {
            let mut participant = write_lock(&existing);
            if participant.control_address().is_none() {
                let same_host = participant
                    .last_data_origin()
                    .is_none_or(|data_origin| data_origin.ip() == origin.ip());
                if same_host {
                    participant.set_control_address(origin);
                }
            }
            drop(participant);
            return existing;
        }

        let created = {
            let mut members = write_lock(&self.members);
            match members.entry(chunk.ssrc) {
                std::collections::hash_map::Entry::Occupied(entry) => {
                    return entry.get().clone();
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let mut participant = RtpParticipant::new(chunk.ssrc);
                    participant.set_control_address(origin);
                    participant.set_last_control_origin(origin);
                    entry.insert(Arc::new(RwLock::new(participant))).clone()
                }
            }
        };
        let snapshot = read_lock(&created).clone();
        self.notify(|listener| listener.participant_created_from_sdes_chunk(&snapshot));
        created
    }

    /// Run `op` over a snapshot of the explicit receivers. Entries added or
    /// removed while iterating do not affect the pass.
    pub fn do_with_receivers(&self, mut op: impl FnMut(&RtpParticipant)) {
        let snapshot: Vec<Arc<RwLock<RtpParticipant>>> = {
            let receivers = read_lock(&self.receivers);
            let members = read_lock(&self.members);
            receivers
                .iter()
                .filter_map(|ssrc| members.get(ssrc).cloned())
                .collect()
        };
        for participant in snapshot {
            op(&read_lock(&participant));
        }
    }

    pub fn get_members(&self) -> HashMap<u32, RtpParticipant> {
        read_lock(&self.members)
            .iter()
            .map(|(ssrc, participant)| (*ssrc, read_lock(participant).clone()))
            .collect()
    }

    pub fn member_ssrcs(&self) -> HashSet<u32> {
        read_lock(&self.members).keys().copied().collect()
    }

    pub fn member_count(&self) -> usize {
        read_lock(&self.members).len()
    }

    /// Drop members that have been silent past `idle_timeout`. Explicit
    /// receivers are host-managed egress targets and stay, unless a BYE
    /// marked them gone.
    pub fn evict_idle(&self, idle_timeout: Duration) {
        // lock order everywhere: receivers before members
        let stale: Vec<(u32, RtpParticipant)> = {
            let receivers = read_lock(&self.receivers);
            let members = read_lock(&self.members);
            members
                .iter()
                .filter_map(|(ssrc, participant)| {
                    let participant = read_lock(participant);
                    let idle = participant.last_activity().elapsed() > idle_timeout;
                    let protected = receivers.contains(ssrc) && !participant.bye_received();
                    (idle && !protected).then(|| (*ssrc, participant.clone()))
                })
                .collect()
        };

        if stale.is_empty() {
            return;
        }
        {
            let mut receivers = write_lock(&self.receivers);
            let mut members = write_lock(&self.members);
            for (ssrc, _) in &stale {
                members.remove(ssrc);
                receivers.remove(ssrc);
            }
        }
        for (ssrc, participant) in stale {
            tracing::debug!("evicting idle participant with ssrc {:08x}", ssrc);
            self.notify(|listener| listener.participant_deleted(&participant));
        }
    }

    /// Periodic reaper behind `evict_idle`; the only timer this store needs.
    pub fn spawn_idle_sweeper(
        self: &Arc<Self>,
        idle_timeout: Duration,
        token: CancellationToken,
    ) {
        let database = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                        database.evict_idle(idle_timeout);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use efflux_formats::rtcp::sdes::SourceDescriptionPacket;
    use tokio_util::bytes::Bytes;

    use super::*;

    fn data_packet(ssrc: u32) -> RtpDataPacket {
        RtpDataPacket::builder()
            .ssrc(ssrc)
            .payload(Bytes::from_static(&[0]))
            .build()
            .unwrap()
    }

    fn sdes_chunk(ssrc: u32) -> SdesChunk {
        SourceDescriptionPacket::builder()
            .cname(ssrc, "peer@host".to_string())
            .unwrap()
            .build()
            .unwrap()
            .chunks
            .into_iter()
            .next()
            .unwrap()
    }

    #[derive(Default)]
    struct CountingListener {
        from_data: AtomicUsize,
        from_sdes: AtomicUsize,
        deleted: AtomicUsize,
    }

    impl ParticipantEventListener for CountingListener {
        fn participant_created_from_data_packet(&self, _participant: &RtpParticipant) {
            self.from_data.fetch_add(1, Ordering::SeqCst);
        }
        fn participant_created_from_sdes_chunk(&self, _participant: &RtpParticipant) {
            self.from_sdes.fetch_add(1, Ordering::SeqCst);
        }
        fn participant_deleted(&self, _participant: &RtpParticipant) {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wired() -> (Arc<ParticipantDatabase>, Arc<CountingListener>) {
        let database = Arc::new(ParticipantDatabase::new());
        let listener = Arc::new(CountingListener::default());
        let listener_dyn: Arc<dyn ParticipantEventListener> = listener.clone();
        let weak: Weak<dyn ParticipantEventListener> = Arc::downgrade(&listener_dyn);
        database.set_event_listener(weak);
        (database, listener)
    }

    #[test]
    fn test_create_from_data_packet_once() {
        let (database, listener) = wired();
        let origin: SocketAddr = "10.0.0.5:4000".parse().unwrap();

        let first = database.get_or_create_from_data_packet(origin, &data_packet(0x2222));
        let second = database.get_or_create_from_data_packet(origin, &data_packet(0x2222));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(listener.from_data.load(Ordering::SeqCst), 1);
        assert_eq!(
            read_lock(&first).data_address(),
            Some("10.0.0.5:4000".parse().unwrap())
        );
    }

    #[test]
    fn test_sdes_augments_data_born_member() {
        let (database, listener) = wired();
        let data_origin: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let control_origin: SocketAddr = "10.0.0.5:4001".parse().unwrap();

        database.get_or_create_from_data_packet(data_origin, &data_packet(0x2222));
        let participant = database.get_or_create_from_sdes_chunk(control_origin, &sdes_chunk(0x2222));

        assert_eq!(database.member_count(), 1);
        assert_eq!(listener.from_sdes.load(Ordering::SeqCst), 0);
        let participant = read_lock(&participant);
        assert_eq!(participant.control_address(), Some(control_origin));
        assert!(participant.is_receiver());
    }

    #[test]
    fn test_add_receiver_conflicting_addresses_rejected() {
        let (database, _listener) = wired();
        let receiver = RtpParticipant::new_receiver(
            0x1111,
            "10.0.0.9:6000".parse().unwrap(),
            "10.0.0.9:6001".parse().unwrap(),
        );
        assert!(database.add_receiver(receiver.clone()));
        assert!(database.is_receiver(0x1111));
        // second registration of the same target is refused
        assert!(!database.add_receiver(receiver));

        database.remove_receiver(0x1111);
        let conflicting = RtpParticipant::new_receiver(
            0x1111,
            "10.9.9.9:6000".parse().unwrap(),
            "10.9.9.9:6001".parse().unwrap(),
        );
        assert!(!database.add_receiver(conflicting));
    }

    #[test]
    fn test_do_with_receivers_sees_snapshot() {
        let (database, _listener) = wired();
        for ssrc in 1..=3_u32 {
            let receiver = RtpParticipant::new_receiver(
                ssrc,
                format!("10.0.0.{}:6000", ssrc).parse().unwrap(),
                format!("10.0.0.{}:6001", ssrc).parse().unwrap(),
            );
            assert!(database.add_receiver(receiver));
        }

        let mut seen = Vec::new();
        database.do_with_receivers(|participant| {
            // mutating mid-pass must not disturb the snapshot
            database.remove_receiver(2);
            seen.push(participant.ssrc());
        });
        assert_eq!(seen.len(), 3);
        assert!(!database.is_receiver(2));
    }

    #[test]
    fn test_idle_eviction_spares_live_receivers() {
        let (database, listener) = wired();
        let receiver = RtpParticipant::new_receiver(
            0x1111,
            "10.0.0.9:6000".parse().unwrap(),
            "10.0.0.9:6001".parse().unwrap(),
        );
        assert!(database.add_receiver(receiver));
        database
            .get_or_create_from_data_packet("10.0.0.5:4000".parse().unwrap(), &data_packet(0x2222));

        // zero timeout: everything is instantly stale
        database.evict_idle(Duration::ZERO);
        assert_eq!(listener.deleted.load(Ordering::SeqCst), 1);
        assert!(database.get_participant(0x2222).is_none());
        assert!(database.get_participant(0x1111).is_some());

        // a receiver that said goodbye is fair game
        if let Some(participant) = database.get_participant(0x1111) {
            write_lock(&participant).mark_bye_received();
        }
        database.evict_idle(Duration::ZERO);
        assert!(database.get_participant(0x1111).is_none());
        assert!(!database.is_receiver(0x1111));
    }
}
