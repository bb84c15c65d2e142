//! Transmit queue
//!
//! One FIFO per channel and priority. High priority holds digipeated
//! frames and is drained before low priority, which holds frames we
//! originate. A frame taken for transmission sits in an in-flight slot
//! until the transmitter reports it sent, so that queue depth queries from
//! clients still see it.

pub mod timing;
pub mod xmit;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{error, warn};

use crate::ax25::{Packet, DESTINATION, MIN_ADDRS, SOURCE};
use crate::core::{ChannelConfig, Medium, Priority, MAX_CHANS};

pub use self::timing::{ChannelTiming, TimingTable};
pub use self::xmit::{ChannelActivity, FrameSender, Ptt, Transmitter};

/// APRS frames are dropped once this many are waiting at one priority.
pub const APRS_QUEUE_LIMIT: usize = 100;

/// Link layer frames past this depth get a warning.
pub const LINK_QUEUE_WARN: usize = 250;

/// What [`TransmitQueue::count`] adds up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountUnit {
    #[default]
    Frames,
    Bytes,
}

/// Selection for [`TransmitQueue::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountQuery {
    /// One priority, or both when `None`
    pub prio: Option<Priority>,
    /// Source address with SSID that must match, when given
    pub source: Option<String>,
    /// Destination address with SSID that must match, when given
    pub dest: Option<String>,
    pub unit: CountUnit,
    /// Also count the frame currently being sent
    pub include_in_flight: bool,
}

impl CountQuery {
    /// All frames at all priorities, in-flight included
    pub fn frames() -> Self {
        CountQuery { include_in_flight: true, ..Default::default() }
    }

    /// Bytes at all priorities, in-flight included
    pub fn bytes() -> Self {
        CountQuery { unit: CountUnit::Bytes, include_in_flight: true, ..Default::default() }
    }

    fn matches(&self, pp: &Packet) -> bool {
        if pp.num_addr() < MIN_ADDRS {
            return false;
        }
        if let Some(src) = self.source.as_deref().filter(|s| !s.is_empty()) {
            if pp.get_addr_with_ssid(SOURCE) != src {
                return false;
            }
        }
        if let Some(dst) = self.dest.as_deref().filter(|s| !s.is_empty()) {
            if pp.get_addr_with_ssid(DESTINATION) != dst {
                return false;
            }
        }
        true
    }

    fn measure(&self, pp: &Packet) -> usize {
        match self.unit {
            CountUnit::Frames => 1,
            CountUnit::Bytes => pp.frame_len(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    /// Indexed by [`Priority::index`]
    prio: [VecDeque<Packet>; 2],
    /// Frame handed to the transmitter and not yet reported sent
    in_flight: Option<Packet>,
}

impl QueueState {
    fn is_empty(&self) -> bool {
        self.prio.iter().all(VecDeque::is_empty)
    }
}

#[derive(Debug, Default)]
struct ChannelQueue {
    state: Mutex<QueueState>,
    /// Wakes the transmitter when a frame arrives
    wake: Notify,
}

/// Per-channel transmit queues, shared between producers and the
/// transmitter tasks.
#[derive(Debug)]
pub struct TransmitQueue {
    /// Indexed by channel
    chans: Vec<ChannelQueue>,
    /// Medium of each configured channel
    media: Vec<Medium>,
}

impl TransmitQueue {
    /// Creates queues for the configured channels
    pub fn new(channels: &[ChannelConfig]) -> Self {
        TransmitQueue {
            chans: (0..MAX_CHANS).map(|_| ChannelQueue::default()).collect(),
            media: channels.iter().map(|c| c.medium).collect(),
        }
    }

    fn medium(&self, chan: usize) -> Medium {
        self.media.get(chan).copied().unwrap_or(Medium::None)
    }

    fn lock(&self, chan: usize) -> Option<MutexGuard<'_, QueueState>> {
        self.chans
            .get(chan)
            .map(|c| c.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, chan: usize, prio: Priority, pp: Packet) {
        if let Some(mut q) = self.lock(chan) {
            q.prio[prio.index()].push_back(pp);
        }
        if let Some(c) = self.chans.get(chan) {
            c.wake.notify_one();
        }
    }

    /// Queues a frame from a client, the digipeater or a beacon.
    ///
    /// Frames for a channel with nothing attached are dropped, as are APRS
    /// frames once too many are already waiting. Returns true if queued.
    pub fn append(&self, chan: usize, prio: Priority, pp: Packet) -> bool {
        if chan >= MAX_CHANS || self.medium(chan) == Medium::None {
            error!(chan, "transmit request for invalid channel, frame dropped");
            return false;
        }
        if pp.is_aprs() {
            let waiting = self.count(chan, &CountQuery { prio: Some(prio), ..Default::default() });
            if waiting > APRS_QUEUE_LIMIT {
                warn!(
                    chan,
                    waiting,
                    "transmit queue overflow, discarding frame; \
                     perhaps the channel is so busy it never gets a chance to transmit"
                );
                return false;
            }
        }
        self.push(chan, prio, pp);
        true
    }

    /// Queues a frame from the connected-mode link layer. Only radio
    /// channels accept these.
    pub fn lm_data_request(&self, chan: usize, prio: Priority, pp: Packet) -> bool {
        if self.medium(chan) != Medium::Radio {
            error!(chan, "link layer transmit request for non-radio channel");
            return false;
        }
        let waiting = self.count(chan, &CountQuery { prio: Some(prio), ..Default::default() });
        if waiting > LINK_QUEUE_WARN {
            warn!(chan, waiting, "link layer transmit queue is getting long");
        }
        self.push(chan, prio, pp);
        true
    }

    /// Asks the transmitter to key up even with nothing to send. The link
    /// layer hears back through a seize-confirm event.
    pub fn lm_seize_request(&self, chan: usize) -> bool {
        if self.medium(chan) != Medium::Radio {
            return false;
        }
        self.push(chan, Priority::Low, Packet::null());
        true
    }

    /// Takes the next frame for transmission, high priority first, and
    /// places it in the in-flight slot. Any frame still in flight is
    /// considered done.
    pub fn remove(&self, chan: usize) -> Option<(Priority, Packet)> {
        let mut q = self.lock(chan)?;
        for prio in Priority::ALL {
            if let Some(pp) = q.prio[prio.index()].pop_front() {
                q.in_flight = Some(pp.dup());
                return Some((prio, pp));
            }
        }
        None
    }

    /// Takes the next frame of one priority, without touching the
    /// in-flight slot.
    pub fn remove_prio(&self, chan: usize, prio: Priority) -> Option<Packet> {
        self.lock(chan)?.prio[prio.index()].pop_front()
    }

    /// Whether anything waits at the given priority, seize requests
    /// included.
    pub fn has_waiting(&self, chan: usize, prio: Priority) -> bool {
        self.lock(chan).map_or(false, |q| !q.prio[prio.index()].is_empty())
    }

    /// Clears the in-flight slot.
    pub fn transmission_complete(&self, chan: usize) {
        if let Some(mut q) = self.lock(chan) {
            q.in_flight = None;
        }
    }

    pub fn is_empty(&self, chan: usize) -> bool {
        self.lock(chan).map_or(true, |q| q.is_empty())
    }

    /// Waits until the channel has something queued.
    pub async fn wait_while_empty(&self, chan: usize) {
        let Some(c) = self.chans.get(chan) else {
            return;
        };
        loop {
            let notified = c.wake.notified();
            if !self.is_empty(chan) {
                return;
            }
            notified.await;
        }
    }

    /// Counts frames or bytes waiting on a channel.
    ///
    /// Only frames with at least two addresses count, so seize requests
    /// are invisible. Source and destination filters compare the full
    /// address with SSID.
    pub fn count(&self, chan: usize, query: &CountQuery) -> usize {
        let Some(q) = self.lock(chan) else {
            return 0;
        };
        let prios: &[Priority] = match &query.prio {
            Some(Priority::High) => &[Priority::High],
            Some(Priority::Low) => &[Priority::Low],
            None => &Priority::ALL,
        };
        let queued = prios.iter().flat_map(|p| q.prio[p.index()].iter());
        let in_flight = q.in_flight.iter().filter(|_| query.include_in_flight);
        queued
            .chain(in_flight)
            .filter(|pp| query.matches(pp))
            .map(|pp| query.measure(pp))
            .sum()
    }

    /// Discards everything waiting on a channel. Returns how many frames
    /// were dropped.
    pub fn flush(&self, chan: usize) -> usize {
        let Some(mut q) = self.lock(chan) else {
            return 0;
        };
        q.prio.iter_mut().map(|d| d.drain(..).count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn queue() -> TransmitQueue {
        TransmitQueue::new(&[ChannelConfig::radio("N0CALL"), ChannelConfig::default()])
    }

    fn frame(text: &str) -> Packet {
        Packet::from_text(text, true).unwrap()
    }

    #[test]
    fn test_priority_and_fifo() {
        let tq = queue();
        assert!(tq.append(0, Priority::Low, frame("A>B:1")));
        assert!(tq.append(0, Priority::Low, frame("A>B:2")));
        assert!(tq.append(0, Priority::High, frame("A>B:3")));

        let order: Vec<_> = std::iter::from_fn(|| tq.remove(0))
            .map(|(prio, pp)| (prio, pp.get_info().to_vec()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Priority::High, b"3".to_vec()),
                (Priority::Low, b"1".to_vec()),
                (Priority::Low, b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_invalid_channel() {
        let tq = queue();
        assert!(!tq.append(1, Priority::Low, frame("A>B:x")));
        assert!(!tq.append(99, Priority::Low, frame("A>B:x")));
        assert!(!tq.lm_data_request(1, Priority::Low, frame("A>B:x")));
        assert_eq!(tq.count(99, &CountQuery::frames()), 0);
    }

    #[test]
    fn test_count_filters() {
        let tq = queue();
        tq.append(0, Priority::Low, frame("W1AW-1>APRS:abc"));
        tq.append(0, Priority::Low, frame("W1AW>APRS:abcdef"));
        tq.append(0, Priority::High, frame("W1AW-1>ID:x"));
        tq.lm_seize_request(0);

        assert_eq!(tq.count(0, &CountQuery::frames()), 3);
        let q = CountQuery { source: Some("W1AW-1".into()), ..Default::default() };
        assert_eq!(tq.count(0, &q), 2);
        let q = CountQuery { dest: Some("APRS".into()), prio: Some(Priority::Low), ..Default::default() };
        assert_eq!(tq.count(0, &q), 2);
        let q = CountQuery { prio: Some(Priority::High), unit: CountUnit::Bytes, ..Default::default() };
        assert_eq!(tq.count(0, &q), 14 + 2 + 1);
    }

    #[test]
    fn test_in_flight() {
        let tq = queue();
        tq.append(0, Priority::Low, frame("A>B:hello"));
        let (_, pp) = tq.remove(0).unwrap();
        assert_eq!(pp.get_info(), b"hello");
        assert_eq!(tq.count(0, &CountQuery::frames()), 1);
        assert_eq!(tq.count(0, &CountQuery::default()), 0);
        tq.transmission_complete(0);
        assert_eq!(tq.count(0, &CountQuery::frames()), 0);
    }

    #[test]
    fn test_aprs_overflow() {
        let tq = queue();
        for _ in 0..=APRS_QUEUE_LIMIT {
            assert!(tq.append(0, Priority::Low, frame("A>B:x")));
        }
        assert!(!tq.append(0, Priority::Low, frame("A>B:x")));
        assert!(tq.append(0, Priority::High, frame("A>B:x")));
        assert_eq!(tq.flush(0), APRS_QUEUE_LIMIT + 2);
        assert!(tq.is_empty(0));
    }

    #[tokio::test]
    async fn test_wait_while_empty_wakes() {
        let tq = Arc::new(queue());
        let waiter = {
            let tq = Arc::clone(&tq);
            tokio::spawn(async move {
                tq.wait_while_empty(0).await;
                tq.remove(0).map(|(_, pp)| pp.get_info().to_vec())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tq.append(0, Priority::Low, frame("A>B:wake"));
        let got = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got, Some(b"wake".to_vec()));
    }
}
