use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, RwLock},
};

use efflux_formats::{
    data::RtpDataPacket,
    rtcp::{app::AppPacket, compound::RtcpCompoundPacket},
};
use uuid::Uuid;

use crate::{
    participant::ParticipantInfo,
    session::TerminationCause,
    sync::{read_lock, write_lock},
};

pub trait RtpDataListener: Send + Sync {
    fn data_packet_received(
        &self,
        session_id: &str,
        participant: &ParticipantInfo,
        packet: &RtpDataPacket,
    );
}

pub trait RtpControlListener: Send + Sync {
    /// Raw compound delivery, used when automated RTCP handling is off.
    fn control_packet_received(&self, _session_id: &str, _packet: &RtcpCompoundPacket) {}
    fn app_data_received(&self, _session_id: &str, _packet: &AppPacket) {}
}

pub trait RtpSessionEventListener: Send + Sync {
    fn participant_created_from_data_packet(
        &self,
        _session_id: &str,
        _participant: &ParticipantInfo,
    ) {
    }
    fn participant_created_from_sdes_chunk(
        &self,
        _session_id: &str,
        _participant: &ParticipantInfo,
    ) {
    }
    fn participant_data_updated(&self, _session_id: &str, _participant: &ParticipantInfo) {}
    fn participant_left(&self, _session_id: &str, _participant: &ParticipantInfo) {}
    fn participant_deleted(&self, _session_id: &str, _participant: &ParticipantInfo) {}
    fn resolved_ssrc_conflict(&self, _session_id: &str, _old_ssrc: u32, _new_ssrc: u32) {}
    fn session_terminated(&self, _session_id: &str, _cause: &TerminationCause) {}
}

/// One registration list. Fan-out walks a snapshot, so listeners may add
/// or remove registrations from inside a callback, and a panicking
/// listener is logged and kept rather than poisoning the dispatch.
pub struct ListenerList<L: ?Sized> {
    entries: RwLock<Vec<(Uuid, Arc<L>)>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub fn add(&self, listener: Arc<L>) -> Uuid {
        let id = Uuid::now_v7();
        write_lock(&self.entries).push((id, listener));
        id
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut entries = write_lock(&self.entries);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        write_lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        read_lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.entries).is_empty()
    }

    pub fn notify(&self, op: impl Fn(&L)) {
        let snapshot: Vec<Arc<L>> = read_lock(&self.entries)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| op(listener.as_ref()))).is_err() {
                tracing::error!("listener panicked during dispatch, keeping it registered");
            }
        }
    }
}

/// The session's three independent subscription lists.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    pub data: ListenerList<dyn RtpDataListener>,
    pub control: ListenerList<dyn RtpControlListener>,
    pub event: ListenerList<dyn RtpSessionEventListener>,
}

impl ListenerRegistry {
    pub fn clear_all(&self) {
        self.data.clear();
        self.control.clear();
        self.event.clear();
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Recorder(AtomicUsize);

    impl RtpSessionEventListener for Recorder {
        fn resolved_ssrc_conflict(&self, _session_id: &str, _old: u32, _new: u32) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl RtpSessionEventListener for Panicker {
        fn resolved_ssrc_conflict(&self, _session_id: &str, _old: u32, _new: u32) {
            panic!("bad listener");
        }
    }

    #[test]
    fn test_add_remove() {
        let list: ListenerList<dyn RtpSessionEventListener> = Default::default();
        let id = list.add(Arc::new(Recorder(AtomicUsize::new(0))));
        assert_eq!(list.len(), 1);
        assert!(list.remove(id));
        assert!(!list.remove(id));
        assert!(list.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated_and_kept() {
        let list: ListenerList<dyn RtpSessionEventListener> = Default::default();
        let recorder = Arc::new(Recorder(AtomicUsize::new(0)));
        list.add(Arc::new(Panicker));
        list.add(recorder.clone());

        list.notify(|listener| listener.resolved_ssrc_conflict("s1", 1, 2));
        // the healthy listener still ran, the panicker is still registered
        assert_eq!(recorder.0.load(Ordering::SeqCst), 1);
        assert_eq!(list.len(), 2);

        list.notify(|listener| listener.resolved_ssrc_conflict("s1", 2, 3));
        assert_eq!(recorder.0.load(Ordering::SeqCst), 2);
    }
}
