//! Receive dispatcher
//!
//! Drains the data link queue. Received frames are recorded, shown to
//! clients, offered to the digipeater and then handed to the link layer.
//! Everything else goes straight to the link layer.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::ax25::{alevel_to_text, safe_print, Packet};
use crate::core::{OutputKind, Result};
use crate::digipeater::Digipeater;
use crate::dlq::{Dlq, Event, RecFrame};
use crate::mheard::Mheard;
use crate::router::Subscriptions;
use crate::tq::{ChannelActivity, FrameSender, TransmitQueue};

/// The connected-mode link state machine, or whatever stands in for it.
pub trait LinkHandler: Send + Sync {
    /// A frame received over the radio, after monitoring and digipeating
    fn rec_frame(&self, frame: &RecFrame);

    /// A client request or transmitter notification
    fn client_event(&self, event: Event);
}

/// Used when no link layer is attached. Connected-mode requests go nowhere.
#[derive(Debug, Default)]
pub struct NoLinkLayer;

impl LinkHandler for NoLinkLayer {
    fn rec_frame(&self, _frame: &RecFrame) {}

    fn client_event(&self, event: Event) {
        debug!(?event, "no link layer attached, event ignored");
    }
}

/// Moves events from the queue to where they belong.
pub struct Dispatcher {
    dlq: Arc<Dlq>,
    subs: Arc<Subscriptions>,
    mheard: Arc<Mheard>,
    digipeater: Option<Arc<Digipeater>>,
    tq: Arc<TransmitQueue>,
    activity: Arc<ChannelActivity>,
    link: Arc<dyn LinkHandler>,
}

impl Dispatcher {
    /// Creates a new dispatcher
    pub fn new(
        dlq: Arc<Dlq>,
        subs: Arc<Subscriptions>,
        mheard: Arc<Mheard>,
        digipeater: Option<Arc<Digipeater>>,
        tq: Arc<TransmitQueue>,
        activity: Arc<ChannelActivity>,
        link: Arc<dyn LinkHandler>,
    ) -> Self {
        Dispatcher { dlq, subs, mheard, digipeater, tq, activity, link }
    }

    /// Handles one event.
    pub fn dispatch(&self, event: Event) {
        match event {
            Event::RecFrame(r) => self.rec_frame(&r),
            Event::ChannelBusy { chan, activity: OutputKind::Dcd, busy } => {
                self.activity.set_busy(chan, busy);
                self.link.client_event(Event::ChannelBusy { chan, activity: OutputKind::Dcd, busy });
            }
            other => self.link.client_event(other),
        }
    }

    fn rec_frame(&self, r: &RecFrame) {
        let pp = &r.pp;
        info!(
            chan = r.chan,
            audio = %alevel_to_text(r.alevel),
            "{}{}",
            pp.format_addrs(),
            safe_print(pp.get_info(), false)
        );
        self.mheard.save_rf(r.chan, None, pp, r.alevel, r.retries);
        let delivered = self.subs.publish(r.chan, pp);
        debug!(chan = r.chan, delivered, "frame delivered to clients");
        if let Some(digi) = &self.digipeater {
            digi.digipeat(r.chan, pp, &self.tq);
        }
        self.link.rec_frame(r);
    }

    /// Runs until shutdown, draining whatever is queued each time it wakes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            while let Some(event) = self.dlq.remove() {
                self.dispatch(event);
            }
            tokio::select! {
                _ = self.dlq.wait_while_empty(None) => {}
                _ = shutdown.changed() => break,
            }
        }
        debug!("dispatcher stopped");
    }
}

/// Wraps the modem so that each frame sent is also shown to monitoring
/// clients as our own transmission.
pub struct MonitoredSender {
    inner: Arc<dyn FrameSender>,
    subs: Arc<Subscriptions>,
}

impl MonitoredSender {
    pub fn new(inner: Arc<dyn FrameSender>, subs: Arc<Subscriptions>) -> Self {
        MonitoredSender { inner, subs }
    }
}

impl FrameSender for MonitoredSender {
    fn send_frame(&self, chan: usize, pp: &Packet) -> Result<()> {
        self.inner.send_frame(chan, pp)?;
        self.subs.publish_own_xmit(chan, pp);
        Ok(())
    }
}
