//! Receive fan-out to attached client applications
//!
//! Every connected KISS or AGW client is one subscriber. A received frame
//! is offered to the whole table in one pass and each wire format is
//! rendered at most once, however many clients want it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agw::{monitor_message, raw_message};
use crate::ax25::Packet;
use crate::core::MAX_CHANS;
use crate::dlq::ClientId;
use crate::kiss::encapsulate;
use crate::util::LogOnce;

/// Messages queued per client before frames are dropped for it.
pub const CLIENT_QUEUE_LEN: usize = 256;

/// How a client is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// KISS over a TCP listener
    KissTcp { port: u16 },
    KissSerial,
    KissPty,
    Agw,
}

impl Transport {
    fn is_kiss(self) -> bool {
        !matches!(self, Transport::Agw)
    }
}

/// Delivery formats an AGW client has switched on. Written by the client's
/// own command reader, read by the fan-out.
#[derive(Debug, Default)]
pub struct AgwFormats {
    raw: AtomicBool,
    monitor: AtomicBool,
    malformed: LogOnce,
}

impl AgwFormats {
    /// Bad data to or from this client is logged at error level once.
    pub fn malformed(&self) -> &LogOnce {
        &self.malformed
    }

    pub fn raw(&self) -> bool {
        self.raw.load(Ordering::Relaxed)
    }

    pub fn monitor(&self) -> bool {
        self.monitor.load(Ordering::Relaxed)
    }

    /// Flips raw delivery, returning the new state.
    pub fn toggle_raw(&self) -> bool {
        !self.raw.fetch_xor(true, Ordering::Relaxed)
    }

    /// Flips monitor delivery, returning the new state.
    pub fn toggle_monitor(&self) -> bool {
        !self.monitor.fetch_xor(true, Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Subscriber {
    id: ClientId,
    transport: Transport,
    /// KISS listener restricted to one channel
    pin: Option<usize>,
    agw: Option<Arc<AgwFormats>>,
    sink: mpsc::Sender<Bytes>,
}

/// Handle returned to the transport that registered a client.
#[derive(Debug)]
pub struct Subscription {
    pub id: ClientId,
    /// Everything to be written to the client
    pub rx: mpsc::Receiver<Bytes>,
}

/// Table of attached clients.
#[derive(Debug, Default)]
pub struct Subscriptions {
    subs: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
}

impl Subscriptions {
    /// Creates a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, transport: Transport, pin: Option<usize>, agw: Option<Arc<AgwFormats>>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sink, rx) = mpsc::channel(CLIENT_QUEUE_LEN);
        self.subs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, transport, pin, agw, sink });
        debug!(id, ?transport, ?pin, "client subscribed");
        Subscription { id, rx }
    }

    /// Registers a KISS client. `pin` restricts it to one channel, which it
    /// sees as KISS channel 0.
    pub fn subscribe(&self, transport: Transport, pin: Option<usize>) -> Subscription {
        self.add(transport, pin, None)
    }

    /// Registers an AGW client with both deliveries off.
    pub fn subscribe_agw(&self) -> (Subscription, Arc<AgwFormats>) {
        let formats = Arc::new(AgwFormats::default());
        (self.add(Transport::Agw, None, Some(Arc::clone(&formats))), formats)
    }

    /// State of an attached AGW client.
    pub fn agw_formats(&self, id: ClientId) -> Option<Arc<AgwFormats>> {
        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        subs.iter().find(|s| s.id == id).and_then(|s| s.agw.clone())
    }

    pub fn unsubscribe(&self, id: ClientId) {
        self.subs.write().unwrap_or_else(PoisonError::into_inner).retain(|s| s.id != id);
        debug!(id, "client unsubscribed");
    }

    pub fn len(&self) -> usize {
        self.subs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues bytes for one client. False if it is gone.
    pub fn send_to(&self, id: ClientId, bytes: Bytes) -> bool {
        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        match subs.iter().find(|s| s.id == id) {
            Some(sub) => deliver(sub, bytes),
            None => false,
        }
    }

    /// Offers a received frame to every client. Returns the number of
    /// messages queued.
    pub fn publish(&self, chan: usize, pp: &Packet) -> usize {
        let mut kiss_all: Option<Bytes> = None;
        let mut kiss_pinned: Option<Bytes> = None;
        let mut agw_raw: Option<Bytes> = None;
        let mut agw_mon: Option<Bytes> = None;

        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        let mut sent = 0;
        for sub in subs.iter() {
            let bytes = if sub.transport.is_kiss() {
                match sub.pin {
                    Some(pin) if pin != chan => continue,
                    Some(_) => kiss_pinned.get_or_insert_with(|| kiss_data(0, pp)).clone(),
                    None if chan >= MAX_CHANS => continue,
                    None => kiss_all.get_or_insert_with(|| kiss_data(chan, pp)).clone(),
                }
            } else {
                let Some(formats) = &sub.agw else { continue };
                if formats.raw() && deliver(sub, agw_raw.get_or_insert_with(|| raw_message(chan, pp)).clone()) {
                    sent += 1;
                }
                if !formats.monitor() {
                    continue;
                }
                agw_mon.get_or_insert_with(|| monitor_message(chan, pp, false)).clone()
            };
            if deliver(sub, bytes) {
                sent += 1;
            }
        }
        sent
    }

    /// Shows a frame we transmitted to AGW clients in monitor mode.
    pub fn publish_own_xmit(&self, chan: usize, pp: &Packet) -> usize {
        let mut msg: Option<Bytes> = None;
        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        subs.iter()
            .filter(|s| s.agw.as_ref().map_or(false, |f| f.monitor()))
            .filter(|s| deliver(s, msg.get_or_insert_with(|| monitor_message(chan, pp, true)).clone()))
            .count()
    }

    /// Copies a KISS message from one TCP client to the other TCP clients
    /// that can see the channel. `msg` is the unwrapped message; its type
    /// byte is rewritten for each listener.
    pub fn kiss_copy(&self, from: ClientId, chan: usize, msg: &[u8]) -> usize {
        let Some((&kind, data)) = msg.split_first() else {
            return 0;
        };
        let cmd = kind & 0x0f;
        let render = |c: usize| {
            let mut m = Vec::with_capacity(msg.len());
            m.push(((c as u8) << 4) | cmd);
            m.extend_from_slice(data);
            Bytes::from(encapsulate(&m))
        };
        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        subs.iter()
            .filter(|s| s.id != from && matches!(s.transport, Transport::KissTcp { .. }))
            .filter(|s| s.pin.map_or(true, |p| p == chan))
            .filter(|s| deliver(s, render(if s.pin.is_some() { 0 } else { chan })))
            .count()
    }
}

/// Drains a client's queue to its stream. Ends once the client is
/// unsubscribed and the queue is empty, or on a write error.
pub async fn write_stream<W: AsyncWrite + Unpin>(mut wr: W, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = wr.write_all(&bytes).await {
            warn!("Failed to send to client application: {}", e);
            return;
        }
    }
    let _ = wr.shutdown().await;
}

fn kiss_data(chan: usize, pp: &Packet) -> Bytes {
    let mut msg = Vec::with_capacity(pp.frame_len() + 1);
    msg.push((chan as u8) << 4);
    msg.extend_from_slice(pp.frame_bytes());
    Bytes::from(encapsulate(&msg))
}

fn deliver(sub: &Subscriber, bytes: Bytes) -> bool {
    match sub.sink.try_send(bytes) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(id = sub.id, "client is not keeping up, dropping a message");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiss::unwrap;

    fn frame(text: &str) -> Packet {
        Packet::from_text(text, true).unwrap()
    }

    #[test]
    fn test_kiss_pin_rewrites_channel() {
        let subs = Subscriptions::new();
        let mut all = subs.subscribe(Transport::KissTcp { port: 8001 }, None);
        let mut pinned = subs.subscribe(Transport::KissTcp { port: 8002 }, Some(1));
        let pp = frame("A>B:hello");

        assert_eq!(subs.publish(0, &pp), 1);
        assert_eq!(unwrap(&all.rx.try_recv().unwrap())[0], 0x00);
        assert!(pinned.rx.try_recv().is_err());

        assert_eq!(subs.publish(1, &pp), 2);
        let msg = unwrap(&all.rx.try_recv().unwrap());
        assert_eq!(msg[0], 0x10);
        assert_eq!(&msg[1..], pp.frame_bytes());
        assert_eq!(unwrap(&pinned.rx.try_recv().unwrap())[0], 0x00);
    }

    #[test]
    fn test_agw_formats_toggle() {
        let subs = Subscriptions::new();
        let (mut sub, formats) = subs.subscribe_agw();
        let pp = frame("A>B:hello");

        assert_eq!(subs.publish(0, &pp), 0);
        assert!(formats.toggle_raw());
        assert_eq!(subs.publish(0, &pp), 1);
        let raw = sub.rx.try_recv().unwrap();
        assert_eq!(raw[4], b'K');

        assert!(formats.toggle_monitor());
        assert_eq!(subs.publish(0, &pp), 2);
        assert_eq!(sub.rx.try_recv().unwrap()[4], b'K');
        assert_eq!(sub.rx.try_recv().unwrap()[4], b'U');

        assert!(!formats.toggle_raw());
        assert_eq!(subs.publish_own_xmit(0, &pp), 1);
        assert_eq!(sub.rx.try_recv().unwrap()[4], b'T');
    }

    #[test]
    fn test_kiss_copy_skips_origin_and_serial() {
        let subs = Subscriptions::new();
        let origin = subs.subscribe(Transport::KissTcp { port: 8001 }, None);
        let mut other = subs.subscribe(Transport::KissTcp { port: 8001 }, None);
        let mut pinned = subs.subscribe(Transport::KissTcp { port: 8002 }, Some(2));
        let mut serial = subs.subscribe(Transport::KissSerial, None);

        assert_eq!(subs.kiss_copy(origin.id, 2, &[0x20, 1, 2]), 2);
        assert_eq!(unwrap(&other.rx.try_recv().unwrap()), vec![0x20, 1, 2]);
        assert_eq!(unwrap(&pinned.rx.try_recv().unwrap()), vec![0x00, 1, 2]);
        assert!(serial.rx.try_recv().is_err());

        assert_eq!(subs.kiss_copy(origin.id, 3, &[0x30, 1]), 1);
    }

    #[test]
    fn test_unsubscribe_and_send_to() {
        let subs = Subscriptions::new();
        let mut a = subs.subscribe(Transport::KissPty, None);
        assert!(subs.send_to(a.id, Bytes::from_static(b"x")));
        assert_eq!(a.rx.try_recv().unwrap(), Bytes::from_static(b"x"));
        subs.unsubscribe(a.id);
        assert!(subs.is_empty());
        assert!(!subs.send_to(a.id, Bytes::from_static(b"x")));
    }

    #[test]
    fn test_full_queue_drops() {
        let subs = Subscriptions::new();
        let _slow = subs.subscribe(Transport::KissPty, None);
        let pp = frame("A>B:x");
        let sent: usize = (0..CLIENT_QUEUE_LEN + 5).map(|_| subs.publish(0, &pp)).sum();
        assert_eq!(sent, CLIENT_QUEUE_LEN);
    }
}
