//! Per-channel transmit timing, adjustable at run time by KISS commands.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;

use crate::core::{ChannelConfig, MAX_CHANS};

/// Timing for one channel. Times are in 10 ms units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTiming {
    pub txdelay: u8,
    pub persist: u8,
    pub slottime: u8,
    pub txtail: u8,
    pub fulldup: bool,
}

impl From<&ChannelConfig> for ChannelTiming {
    fn from(c: &ChannelConfig) -> Self {
        ChannelTiming {
            txdelay: c.txdelay,
            persist: c.persist,
            slottime: c.slottime,
            txtail: c.txtail,
            fulldup: c.fulldup,
        }
    }
}

impl Default for ChannelTiming {
    fn default() -> Self {
        (&ChannelConfig::default()).into()
    }
}

fn tens_of_ms(v: u8) -> Duration {
    Duration::from_millis(v as u64 * 10)
}

impl ChannelTiming {
    pub fn txdelay(&self) -> Duration {
        tens_of_ms(self.txdelay)
    }

    pub fn slottime(&self) -> Duration {
        tens_of_ms(self.slottime)
    }

    pub fn txtail(&self) -> Duration {
        tens_of_ms(self.txtail)
    }

    /// p-persistence: after a slot time of clear channel, transmit with
    /// probability (persist + 1) / 256.
    pub fn persistence_allows<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<u8>() <= self.persist
    }
}

/// Timing table for all channels, internally synchronized.
#[derive(Debug)]
pub struct TimingTable {
    chans: Mutex<Vec<ChannelTiming>>,
}

impl TimingTable {
    /// Creates a table from the channel configuration; unconfigured
    /// channels get defaults.
    pub fn new(channels: &[ChannelConfig]) -> Self {
        let mut chans: Vec<ChannelTiming> = channels.iter().map(ChannelTiming::from).collect();
        chans.resize(MAX_CHANS, ChannelTiming::default());
        TimingTable { chans: Mutex::new(chans) }
    }

    /// Current timing of a channel.
    pub fn get(&self, chan: usize) -> Option<ChannelTiming> {
        self.chans.lock().unwrap_or_else(PoisonError::into_inner).get(chan).copied()
    }

    /// Changes a channel's timing. Returns false for an unknown channel.
    pub fn update(&self, chan: usize, f: impl FnOnce(&mut ChannelTiming)) -> bool {
        let mut chans = self.chans.lock().unwrap_or_else(PoisonError::into_inner);
        match chans.get_mut(chan) {
            Some(t) => {
                f(t);
                true
            }
            None => false,
        }
    }
}
