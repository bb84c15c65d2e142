use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::logging::LogConfig;

/// Audio level reported by the demodulator for a received frame.
///
/// Values of -1 mean "not known", e.g. for frames that arrived from a
/// client application rather than over the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioLevel {
    /// Received signal level
    pub rec: i32,
    /// Mark tone level, or baseband positive peak
    pub mark: i32,
    /// Space tone level, or baseband negative peak
    pub space: i32,
}

impl AudioLevel {
    /// Creates a new audio level
    pub fn new(rec: i32, mark: i32, space: i32) -> Self {
        AudioLevel { rec, mark, space }
    }

    /// Level used for frames that did not come from a demodulator
    pub fn unknown() -> Self {
        AudioLevel { rec: -1, mark: -1, space: -1 }
    }
}

impl Default for AudioLevel {
    fn default() -> Self {
        AudioLevel::unknown()
    }
}

/// Forward error correction used to receive a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FecType {
    #[default]
    None,
    Fx25,
    Il2p,
}

/// Transmit queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Digipeated frames, sent first
    High = 0,
    /// Frames we originate
    Low = 1,
}

impl Priority {
    /// Both priorities in drain order
    pub const ALL: [Priority; 2] = [Priority::High, Priority::Low];

    /// Array index for per-priority storage
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Output control line of a radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// Push to talk
    Ptt,
    /// Data carrier detect indicator
    Dcd,
    /// Connected indicator
    Con,
}

/// What a channel is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    #[default]
    None,
    Radio,
    Igate,
    NetTnc,
}

/// Configuration of one radio channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// What the channel is attached to
    pub medium: Medium,
    /// Station callsign used on this channel
    pub mycall: String,
    /// Transmit delay in 10 ms units
    pub txdelay: u8,
    /// p-persistence value, 0..255
    pub persist: u8,
    /// Slot time in 10 ms units
    pub slottime: u8,
    /// Transmit tail in 10 ms units
    pub txtail: u8,
    /// Full duplex operation
    pub fulldup: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            medium: Medium::None,
            mycall: "NOCALL".to_string(),
            txdelay: super::DEFAULT_TXDELAY,
            persist: super::DEFAULT_PERSIST,
            slottime: super::DEFAULT_SLOTTIME,
            txtail: super::DEFAULT_TXTAIL,
            fulldup: false,
        }
    }
}

impl ChannelConfig {
    /// A radio channel with the given callsign
    pub fn radio(mycall: &str) -> Self {
        ChannelConfig {
            medium: Medium::Radio,
            mycall: mycall.to_string(),
            ..Default::default()
        }
    }
}

/// One KISS TCP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KissPortConfig {
    /// TCP port number, 0 picks an ephemeral port
    pub port: u16,
    /// Only this radio channel is visible to clients, as KISS channel 0
    #[serde(default)]
    pub chan: Option<usize>,
}

/// KISS over a serial port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialKissConfig {
    /// Device name, e.g. /dev/ttyUSB0
    pub device: String,
    /// Baud rate
    pub baud: u32,
    /// Retry opening the device at this interval while it is absent
    #[serde(default)]
    #[serde(with = "super::serde::opt_duration")]
    pub poll_interval: Option<Duration>,
}

/// KISS over a pseudo terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtyKissConfig {
    /// Symlink created to the slave side, if any
    pub symlink: Option<String>,
}

impl Default for PtyKissConfig {
    fn default() -> Self {
        PtyKissConfig {
            symlink: Some(super::DEFAULT_PTY_SYMLINK.to_string()),
        }
    }
}

/// KISS transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KissConfig {
    /// TCP listeners
    pub tcp_ports: Vec<KissPortConfig>,
    /// Serial port transport
    pub serial: Option<SerialKissConfig>,
    /// Pseudo terminal transport
    pub pty: Option<PtyKissConfig>,
    /// Copy data frames from one TCP client to the other TCP clients
    pub kiss_copy: bool,
    /// Concurrent clients per TCP listener
    pub max_clients: usize,
}

impl Default for KissConfig {
    fn default() -> Self {
        KissConfig {
            tcp_ports: vec![KissPortConfig { port: super::DEFAULT_KISS_PORT, chan: None }],
            serial: None,
            pty: None,
            kiss_copy: false,
            max_clients: super::MAX_NET_CLIENTS,
        }
    }
}

/// AGW network protocol server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgwConfig {
    /// TCP port number, None disables the server
    pub port: Option<u16>,
    /// Concurrent clients
    pub max_clients: usize,
}

impl Default for AgwConfig {
    fn default() -> Self {
        AgwConfig {
            port: Some(super::DEFAULT_AGW_PORT),
            max_clients: super::MAX_NET_CLIENTS,
        }
    }
}

/// Connected-mode digipeating from one channel to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdigiRule {
    /// Channel the frame was received on
    pub from_chan: usize,
    /// Channel to transmit on
    pub to_chan: usize,
    /// Regular expression matched against the next repeater address
    #[serde(default)]
    pub alias: Option<String>,
    /// Filter expression that must evaluate to 1
    #[serde(default)]
    pub filter: Option<String>,
}

/// Connected-mode digipeater
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdigiConfig {
    pub rules: Vec<CdigiRule>,
}

/// Which waypoint sentence formats to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointFormats {
    /// $GPWPL
    pub nmea_generic: bool,
    /// $PKWDWPL
    pub kenwood: bool,
    /// AIS sentences passed through unchanged
    pub ais: bool,
}

impl Default for WaypointFormats {
    fn default() -> Self {
        WaypointFormats { nmea_generic: true, kenwood: true, ais: false }
    }
}

/// Waypoint sentence output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConfig {
    /// Serial device, written at 4800 baud
    pub serial_port: Option<String>,
    /// UDP destination host name
    pub udp_host: Option<String>,
    /// UDP destination port
    pub udp_port: Option<u16>,
    /// Sentences to generate
    pub formats: WaypointFormats,
}

/// Configuration for the whole TNC core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TncConfig {
    /// Radio channels, indexed by channel number
    pub channels: Vec<ChannelConfig>,
    /// KISS transports
    pub kiss: KissConfig,
    /// AGW server
    pub agw: AgwConfig,
    /// Connected-mode digipeater
    pub cdigi: CdigiConfig,
    /// Waypoint output
    pub waypoint: WaypointConfig,
    /// Logging
    pub log: LogConfig,
    /// How long shutdown waits for in-flight client writes
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub shutdown_grace: Duration,
}

impl Default for TncConfig {
    fn default() -> Self {
        TncConfig {
            channels: vec![ChannelConfig::radio("NOCALL")],
            kiss: KissConfig::default(),
            agw: AgwConfig::default(),
            cdigi: CdigiConfig::default(),
            waypoint: WaypointConfig::default(),
            log: LogConfig::default(),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl TncConfig {
    /// Configuration for a channel, if it exists
    pub fn channel(&self, chan: usize) -> Option<&ChannelConfig> {
        self.channels.get(chan)
    }

    /// True if the channel exists and has some medium attached
    pub fn is_valid_channel(&self, chan: usize) -> bool {
        self.channel(chan).map_or(false, |c| c.medium != Medium::None)
    }

    /// True if the channel is attached to a radio
    pub fn is_radio_channel(&self, chan: usize) -> bool {
        self.channel(chan).map_or(false, |c| c.medium == Medium::Radio)
    }

    /// Rejects configurations that cannot work.
    pub fn validate(&self) -> crate::core::Result<()> {
        if self.channels.is_empty() || self.channels.len() > super::MAX_CHANS {
            return Err(crate::core::Error::config(format!(
                "between 1 and {} channels required, got {}",
                super::MAX_CHANS,
                self.channels.len()
            )));
        }
        for p in &self.kiss.tcp_ports {
            if let Some(chan) = p.chan {
                if !self.is_valid_channel(chan) {
                    return Err(crate::core::Error::config(format!(
                        "KISS TCP port {} pinned to invalid channel {}",
                        p.port, chan
                    )));
                }
            }
        }
        for r in &self.cdigi.rules {
            if !self.is_radio_channel(r.from_chan) || !self.is_radio_channel(r.to_chan) {
                return Err(crate::core::Error::config(format!(
                    "connected digipeater rule {} -> {} uses a non-radio channel",
                    r.from_chan, r.to_chan
                )));
            }
        }
        Ok(())
    }
}
