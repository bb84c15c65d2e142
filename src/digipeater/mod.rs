//! Connected-mode digipeater
//!
//! Repeats frames whose next unused repeater address is our call or
//! matches a configured alias. Unlike APRS digipeating there is no
//! duplicate suppression; connected mode acknowledges end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use tracing::{debug, error};

use crate::ax25::{Packet, REPEATER_1};
use crate::core::{Error, Medium, Priority, Result, TncConfig, MAX_CHANS};
use crate::tq::TransmitQueue;

/// Evaluates a packet filter expression. A result of 1 means pass.
pub trait FilterEvaluator: Send + Sync {
    fn evaluate(&self, from_chan: usize, to_chan: usize, filter: &str, pp: &Packet) -> i32;
}

#[derive(Debug)]
struct Rule {
    from_chan: usize,
    to_chan: usize,
    alias: Option<Regex>,
    filter: Option<String>,
}

/// The digipeater with its compiled rules.
pub struct Digipeater {
    /// Rules in configuration order
    rules: Vec<Rule>,
    /// Station callsign per channel
    mycall: Vec<String>,
    /// Channels with a radio attached
    radio: Vec<bool>,
    /// Filter engine; with none, any configured filter rejects
    filter: Option<Arc<dyn FilterEvaluator>>,
    /// Frames repeated per (from, to) pair
    counts: Mutex<HashMap<(usize, usize), u64>>,
}

impl std::fmt::Debug for Digipeater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Digipeater")
            .field("rules", &self.rules)
            .field("mycall", &self.mycall)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

impl Digipeater {
    /// Creates a new digipeater from the configuration, compiling aliases.
    pub fn new(config: &TncConfig) -> Result<Self> {
        let rules = config
            .cdigi
            .rules
            .iter()
            .map(|r| {
                let alias = r
                    .alias
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| Error::config(format!("Failed to compile digipeater alias: {}", e)))?;
                Ok(Rule { from_chan: r.from_chan, to_chan: r.to_chan, alias, filter: r.filter.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Digipeater {
            rules,
            mycall: config.channels.iter().map(|c| c.mycall.clone()).collect(),
            radio: config.channels.iter().map(|c| c.medium == Medium::Radio).collect(),
            filter: None,
            counts: Mutex::new(HashMap::new()),
        })
    }

    /// Attaches a filter expression engine.
    pub fn with_filter(mut self, filter: Arc<dyn FilterEvaluator>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Offers a received frame to every rule for its channel and queues
    /// the results at high priority. Same-channel rules go first. Returns
    /// how many frames were queued.
    pub fn digipeat(&self, from_chan: usize, pp: &Packet, tq: &TransmitQueue) -> usize {
        if from_chan >= MAX_CHANS || !self.radio.get(from_chan).copied().unwrap_or(false) {
            error!(from_chan, "digipeater: did not expect to receive on invalid channel");
            return 0;
        }
        let same = self.rules.iter().filter(|r| r.from_chan == from_chan && r.to_chan == from_chan);
        let cross = self.rules.iter().filter(|r| r.from_chan == from_chan && r.to_chan != from_chan);

        let mut queued = 0;
        for rule in same.chain(cross) {
            if let Some(result) = self.digipeat_match(rule, pp) {
                if tq.append(rule.to_chan, Priority::High, result) {
                    *self
                        .counts
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry((rule.from_chan, rule.to_chan))
                        .or_default() += 1;
                    queued += 1;
                }
            }
        }
        queued
    }

    /// Returns the frame to transmit for one rule, if any. The received
    /// packet is never modified.
    fn digipeat_match(&self, rule: &Rule, pp: &Packet) -> Option<Packet> {
        if let Some(filter) = &rule.filter {
            let result = self
                .filter
                .as_ref()
                .map_or(-1, |f| f.evaluate(rule.from_chan, rule.to_chan, filter, pp));
            if result != 1 {
                return None;
            }
        }

        let r = pp.get_first_not_repeated()?;
        if r < REPEATER_1 {
            return None;
        }
        let repeater = pp.get_addr_with_ssid(r);
        let mycall_rec = self.mycall.get(rule.from_chan)?;
        let mycall_xmit = self.mycall.get(rule.to_chan)?;

        let matched = repeater == *mycall_rec
            || rule.alias.as_ref().map_or(false, |re| re.is_match(&repeater));
        if !matched {
            return None;
        }
        debug!(%repeater, from = rule.from_chan, to = rule.to_chan, "digipeating");
        let mut result = pp.dup();
        result.set_addr(r, mycall_xmit);
        result.set_h(r);
        Some(result)
    }

    /// Frames repeated from one channel to another so far.
    pub fn count(&self, from_chan: usize, to_chan: usize) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(from_chan, to_chan))
            .copied()
            .unwrap_or(0)
    }
}
