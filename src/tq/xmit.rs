//! Transmitter drain loop
//!
//! One task per radio channel waits for frames, waits for a clear channel,
//! keys the transmitter and sends everything queued in one transmission.
//! The modem and the PTT line are behind traits so the loop can be driven
//! without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info};

use crate::ax25::Packet;
use crate::core::{OutputKind, Priority, Result, MAX_CHANS};
use crate::dlq::Dlq;

use super::{ChannelTiming, TimingTable, TransmitQueue};

/// Give up on a busy channel after this long and discard what is queued.
pub const CLEAR_CHANNEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Controls output lines of a channel.
pub trait Ptt: Send + Sync {
    fn ptt_set(&self, kind: OutputKind, chan: usize, on: bool);
}

/// Turns a frame into a signal on the air.
pub trait FrameSender: Send + Sync {
    /// Sends one frame and returns once the modem has accepted it.
    fn send_frame(&self, chan: usize, pp: &Packet) -> Result<()>;
}

/// Carrier detect state for every channel, fed by the receive side.
#[derive(Debug)]
pub struct ChannelActivity {
    busy: Vec<AtomicBool>,
    changed: Vec<Notify>,
}

impl Default for ChannelActivity {
    fn default() -> Self {
        ChannelActivity {
            busy: (0..MAX_CHANS).map(|_| AtomicBool::new(false)).collect(),
            changed: (0..MAX_CHANS).map(|_| Notify::new()).collect(),
        }
    }
}

impl ChannelActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_busy(&self, chan: usize, busy: bool) {
        if let Some(b) = self.busy.get(chan) {
            b.store(busy, Ordering::Release);
            self.changed[chan].notify_waiters();
        }
    }

    pub fn is_busy(&self, chan: usize) -> bool {
        self.busy.get(chan).map_or(false, |b| b.load(Ordering::Acquire))
    }

    async fn wait_until_clear(&self, chan: usize) {
        let Some(changed) = self.changed.get(chan) else {
            return;
        };
        loop {
            let notified = changed.notified();
            if !self.is_busy(chan) {
                return;
            }
            notified.await;
        }
    }
}

/// Drains the transmit queue of one channel.
pub struct Transmitter {
    /// Channel served
    chan: usize,
    /// Frames waiting to go out
    tq: Arc<TransmitQueue>,
    /// Current timing, changed by KISS clients
    timing: Arc<TimingTable>,
    /// Carrier detect from the receive side
    activity: Arc<ChannelActivity>,
    /// Link layer events
    dlq: Arc<Dlq>,
    ptt: Arc<dyn Ptt>,
    modem: Arc<dyn FrameSender>,
    /// For the p-persistence decision
    rng: StdRng,
}

impl Transmitter {
    /// Creates a new transmitter for one channel
    pub fn new(
        chan: usize,
        tq: Arc<TransmitQueue>,
        timing: Arc<TimingTable>,
        activity: Arc<ChannelActivity>,
        dlq: Arc<Dlq>,
        ptt: Arc<dyn Ptt>,
        modem: Arc<dyn FrameSender>,
    ) -> Self {
        Transmitter {
            chan,
            tq,
            timing,
            activity,
            dlq,
            ptt,
            modem,
            rng: StdRng::from_entropy(),
        }
    }

    /// Runs until the shutdown flag turns true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(chan = self.chan, "transmitter started");
        loop {
            tokio::select! {
                _ = self.tq.wait_while_empty(self.chan) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let timing = self.timing.get(self.chan).unwrap_or_default();
            let clear = tokio::time::timeout(CLEAR_CHANNEL_TIMEOUT, self.wait_for_clear_channel(&timing));
            if clear.await.is_err() {
                let dropped = self.tq.flush(self.chan);
                error!(chan = self.chan, dropped, "waited too long for clear channel, discarding queued frames");
                continue;
            }
            self.transmit(&timing).await;
        }
        info!(chan = self.chan, "transmitter stopped");
    }

    /// Waits for no carrier, then a slot time, then lets p-persistence
    /// decide. Anything at high priority skips the random wait.
    async fn wait_for_clear_channel(&mut self, timing: &ChannelTiming) {
        if timing.fulldup {
            return;
        }
        'start: loop {
            self.activity.wait_until_clear(self.chan).await;
            while !self.tq.has_waiting(self.chan, Priority::High) {
                tokio::time::sleep(timing.slottime()).await;
                if self.activity.is_busy(self.chan) {
                    continue 'start;
                }
                if timing.persistence_allows(&mut self.rng) {
                    break;
                }
            }
            return;
        }
    }

    /// One transmission: key up, send all that is queued, unkey.
    async fn transmit(&mut self, timing: &ChannelTiming) {
        let chan = self.chan;
        self.ptt.ptt_set(OutputKind::Ptt, chan, true);
        self.dlq.channel_busy(chan, OutputKind::Ptt, true);
        tokio::time::sleep(timing.txdelay()).await;

        let mut sent = 0usize;
        while let Some((prio, pp)) = self.tq.remove(chan) {
            if pp.is_null_frame() {
                self.dlq.seize_confirm(chan);
            } else {
                match self.modem.send_frame(chan, &pp) {
                    Ok(()) => {
                        debug!(chan, ?prio, frame = %pp.format_addrs(), "sent");
                        sent += 1;
                    }
                    Err(e) => error!(chan, "Failed to send frame: {}", e),
                }
            }
            self.tq.transmission_complete(chan);
            // Digipeated APRS goes one frame per transmission.
            if prio == Priority::High && pp.is_aprs() {
                break;
            }
        }

        tokio::time::sleep(timing.txtail()).await;
        self.ptt.ptt_set(OutputKind::Ptt, chan, false);
        self.dlq.channel_busy(chan, OutputKind::Ptt, false);
        debug!(chan, sent, "transmission complete");
    }
}
