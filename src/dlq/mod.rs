//! Data link event queue
//!
//! The one way into the connected-mode link layer. Receive paths, client
//! connections and the transmitter append events from any task; a single
//! dispatcher removes them in order. Each event is owned by whoever holds
//! it, so it is released exactly once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error};

use crate::ax25::Packet;
use crate::core::{AudioLevel, FecType, OutputKind};
use crate::util::LogOnce;

/// Identifies a client connection of the AGW server.
pub type ClientId = usize;

/// Queue depth at which we complain that nothing is draining it.
pub const BACKLOG_WARN: usize = 10;

/// A frame that arrived over the radio.
#[derive(Debug, Clone, PartialEq)]
pub struct RecFrame {
    pub chan: usize,
    /// Demodulator within the channel
    pub subchan: usize,
    /// Slicer within the demodulator
    pub slice: usize,
    pub pp: Packet,
    pub alevel: AudioLevel,
    pub fec_type: FecType,
    /// Effort spent to get a good frame: bits fixed for plain AX.25,
    /// symbols corrected for FX.25 and IL2P
    pub retries: usize,
    /// Which decoders heard it, for display
    pub spectrum: String,
}

/// Data a client wants sent over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnData {
    pub pid: u8,
    pub data: Vec<u8>,
}

/// Everything the link layer reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RecFrame(Box<RecFrame>),
    ConnectRequest {
        chan: usize,
        client: ClientId,
        /// Destination, source, then any digipeaters
        addrs: Vec<String>,
        pid: u8,
    },
    DisconnectRequest {
        chan: usize,
        client: ClientId,
        addrs: Vec<String>,
    },
    XmitDataRequest {
        chan: usize,
        client: ClientId,
        addrs: Vec<String>,
        data: ConnData,
    },
    RegisterCallsign {
        chan: usize,
        client: ClientId,
        callsign: String,
    },
    UnregisterCallsign {
        chan: usize,
        client: ClientId,
        callsign: String,
    },
    OutstandingFramesRequest {
        chan: usize,
        client: ClientId,
        addrs: Vec<String>,
    },
    /// Our transmitter keyed or someone else's carrier came and went
    ChannelBusy {
        chan: usize,
        activity: OutputKind,
        busy: bool,
    },
    /// The transmitter honored a seize request
    SeizeConfirm { chan: usize },
    /// A client went away; release everything held on its behalf
    ClientCleanup { client: ClientId },
}

impl Event {
    /// Channel the event concerns, if any
    pub fn chan(&self) -> Option<usize> {
        match self {
            Event::RecFrame(r) => Some(r.chan),
            Event::ConnectRequest { chan, .. }
            | Event::DisconnectRequest { chan, .. }
            | Event::XmitDataRequest { chan, .. }
            | Event::RegisterCallsign { chan, .. }
            | Event::UnregisterCallsign { chan, .. }
            | Event::OutstandingFramesRequest { chan, .. }
            | Event::ChannelBusy { chan, .. }
            | Event::SeizeConfirm { chan } => Some(*chan),
            Event::ClientCleanup { .. } => None,
        }
    }

    /// Client the event came from, if any
    pub fn client(&self) -> Option<ClientId> {
        match self {
            Event::ConnectRequest { client, .. }
            | Event::DisconnectRequest { client, .. }
            | Event::XmitDataRequest { client, .. }
            | Event::RegisterCallsign { client, .. }
            | Event::UnregisterCallsign { client, .. }
            | Event::OutstandingFramesRequest { client, .. }
            | Event::ClientCleanup { client } => Some(*client),
            _ => None,
        }
    }
}

/// The event queue.
#[derive(Debug, Default)]
pub struct Dlq {
    queue: Mutex<VecDeque<Event>>,
    wake: Notify,
    /// Set once a backlog has been reported, cleared when it drains
    backlog_reported: AtomicBool,
    /// Shared by the demodulators handing over raw frames
    malformed: LogOnce,
}

impl Dlq {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends any event and wakes the consumer.
    pub fn append(&self, event: Event) {
        let len = {
            let mut q = self.lock();
            q.push_back(event);
            q.len()
        };
        if len > BACKLOG_WARN && !self.backlog_reported.swap(true, Ordering::Relaxed) {
            error!(
                len,
                "received frames are backing up; is something blocked writing to a client?"
            );
        }
        self.wake.notify_one();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rec_frame(
        &self,
        chan: usize,
        subchan: usize,
        slice: usize,
        mut pp: Packet,
        alevel: AudioLevel,
        fec_type: FecType,
        retries: usize,
        spectrum: &str,
    ) {
        pp.meta.chan = Some(chan);
        pp.meta.subchan = subchan;
        pp.meta.slice = slice;
        pp.meta.alevel = alevel;
        pp.meta.fec_type = fec_type;
        self.append(Event::RecFrame(Box::new(RecFrame {
            chan,
            subchan,
            slice,
            pp,
            alevel,
            fec_type,
            retries,
            spectrum: spectrum.to_string(),
        })));
    }

    /// Decodes a frame as it came off the demodulator (no FCS) and queues
    /// it. Returns false, queueing nothing, when the bytes are not a valid
    /// AX.25 frame.
    #[allow(clippy::too_many_arguments)]
    pub fn rec_frame_bytes(
        &self,
        chan: usize,
        subchan: usize,
        slice: usize,
        bytes: &[u8],
        alevel: AudioLevel,
        fec_type: FecType,
        retries: usize,
        spectrum: &str,
    ) -> bool {
        match Packet::from_bytes(bytes, alevel).filter(Packet::check_addresses) {
            Some(pp) => {
                self.rec_frame(chan, subchan, slice, pp, alevel, fec_type, retries, spectrum);
                true
            }
            None if self.malformed.first() => {
                error!(chan, len = bytes.len(), "dropping malformed frame from the receiver");
                false
            }
            None => {
                debug!(chan, len = bytes.len(), "dropping malformed frame from the receiver");
                false
            }
        }
    }

    pub fn connect_request(&self, addrs: Vec<String>, chan: usize, client: ClientId, pid: u8) {
        self.append(Event::ConnectRequest { chan, client, addrs, pid });
    }

    pub fn disconnect_request(&self, addrs: Vec<String>, chan: usize, client: ClientId) {
        self.append(Event::DisconnectRequest { chan, client, addrs });
    }

    pub fn outstanding_frames_request(&self, addrs: Vec<String>, chan: usize, client: ClientId) {
        self.append(Event::OutstandingFramesRequest { chan, client, addrs });
    }

    pub fn xmit_data_request(
        &self,
        addrs: Vec<String>,
        chan: usize,
        client: ClientId,
        pid: u8,
        data: &[u8],
    ) {
        let data = ConnData { pid, data: data.to_vec() };
        self.append(Event::XmitDataRequest { chan, client, addrs, data });
    }

    pub fn register_callsign(&self, callsign: &str, chan: usize, client: ClientId) {
        self.append(Event::RegisterCallsign { chan, client, callsign: callsign.to_string() });
    }

    pub fn unregister_callsign(&self, callsign: &str, chan: usize, client: ClientId) {
        self.append(Event::UnregisterCallsign { chan, client, callsign: callsign.to_string() });
    }

    pub fn channel_busy(&self, chan: usize, activity: OutputKind, busy: bool) {
        self.append(Event::ChannelBusy { chan, activity, busy });
    }

    pub fn seize_confirm(&self, chan: usize) {
        self.append(Event::SeizeConfirm { chan });
    }

    pub fn client_cleanup(&self, client: ClientId) {
        debug!(client, "client cleanup queued");
        self.append(Event::ClientCleanup { client });
    }

    /// Waits until the queue has something in it, or until the timeout
    /// passes. Returns true on timeout.
    pub async fn wait_while_empty(&self, timeout: Option<Duration>) -> bool {
        let notified = self.wake.notified();
        if !self.is_empty() {
            return false;
        }
        match timeout {
            Some(t) => tokio::time::timeout(t, notified).await.is_err(),
            None => {
                notified.await;
                false
            }
        }
    }

    /// Takes the oldest event.
    pub fn remove(&self) -> Option<Event> {
        let mut q = self.lock();
        let event = q.pop_front();
        if q.is_empty() {
            self.backlog_reported.store(false, Ordering::Relaxed);
        }
        event
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

static GLOBAL: OnceLock<Arc<Dlq>> = OnceLock::new();

/// The process-wide queue.
pub fn global() -> Arc<Dlq> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(Dlq::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::logging::count_errors;

    fn pkt() -> Packet {
        Packet::from_text("W1AW>APRS:hi", true).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let dlq = Dlq::new();
        dlq.rec_frame(1, 0, 2, pkt(), AudioLevel::new(50, 40, 30), FecType::Fx25, 3, "|");
        dlq.register_callsign("N0CALL", 0, 7);
        dlq.client_cleanup(7);
        assert_eq!(dlq.len(), 3);

        match dlq.remove() {
            Some(Event::RecFrame(r)) => {
                assert_eq!((r.chan, r.slice, r.retries), (1, 2, 3));
                assert_eq!(r.pp.meta.chan, Some(1));
                assert_eq!(r.pp.meta.fec_type, FecType::Fx25);
                assert_eq!(r.spectrum, "|");
            }
            other => panic!("unexpected {:?}", other),
        }
        let e = dlq.remove().unwrap();
        assert_eq!(e.chan(), Some(0));
        assert_eq!(e.client(), Some(7));
        assert_eq!(dlq.remove(), Some(Event::ClientCleanup { client: 7 }));
        assert!(dlq.remove().is_none());
    }

    #[test]
    fn test_rec_frame_bytes() {
        let dlq = Dlq::new();
        let al = AudioLevel::new(60, 0, 0);
        let errors = count_errors(|| {
            assert!(!dlq.rec_frame_bytes(0, 0, 0, b"not a frame at all", al, FecType::None, 0, ""));
            assert!(!dlq.rec_frame_bytes(0, 0, 0, &[0x01], al, FecType::None, 0, ""));
        });
        assert_eq!(errors, 1);
        assert!(dlq.is_empty());

        let bytes = pkt().frame_bytes().to_vec();
        assert!(dlq.rec_frame_bytes(2, 1, 0, &bytes, al, FecType::Il2p, 1, "."));
        match dlq.remove() {
            Some(Event::RecFrame(r)) => {
                assert_eq!((r.chan, r.subchan, r.retries), (2, 1, 1));
                assert_eq!(r.pp.frame_bytes(), &bytes[..]);
                assert_eq!(r.pp.meta.fec_type, FecType::Il2p);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_xmit_data_copies() {
        let dlq = Dlq::new();
        let addrs = vec!["W1AW".to_string(), "N0CALL".to_string()];
        dlq.xmit_data_request(addrs.clone(), 0, 1, 0xf0, b"data");
        assert_eq!(
            dlq.remove(),
            Some(Event::XmitDataRequest {
                chan: 0,
                client: 1,
                addrs,
                data: ConnData { pid: 0xf0, data: b"data".to_vec() },
            })
        );
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&global(), &global()));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let dlq = Dlq::new();
        assert!(dlq.wait_while_empty(Some(Duration::from_millis(10))).await);
        dlq.seize_confirm(0);
        assert!(!dlq.wait_while_empty(Some(Duration::from_millis(10))).await);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_append() {
        let dlq = Arc::new(Dlq::new());
        let consumer = {
            let dlq = Arc::clone(&dlq);
            tokio::spawn(async move {
                let timed_out = dlq.wait_while_empty(Some(Duration::from_secs(5))).await;
                (timed_out, dlq.remove())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        dlq.channel_busy(0, OutputKind::Dcd, true);
        let (timed_out, event) = consumer.await.unwrap();
        assert!(!timed_out);
        assert_eq!(event, Some(Event::ChannelBusy { chan: 0, activity: OutputKind::Dcd, busy: true }));
    }
}
