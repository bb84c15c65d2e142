//! Acting on messages from KISS clients.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::ax25::{Packet, REPEATER_1};
use crate::core::{AudioLevel, ChannelConfig, Medium, Priority, PRODUCT_NAME, MAX_CHANS};
use crate::tq::{CountQuery, TimingTable, TransmitQueue};
use crate::util::LogOnce;

pub const CMD_DATA_FRAME: u8 = 0;
pub const CMD_TXDELAY: u8 = 1;
pub const CMD_PERSISTENCE: u8 = 2;
pub const CMD_SLOTTIME: u8 = 3;
pub const CMD_TXTAIL: u8 = 4;
pub const CMD_FULLDUPLEX: u8 = 5;
pub const CMD_SET_HARDWARE: u8 = 6;
pub const XKISS_CMD_DATA: u8 = 12;
pub const XKISS_CMD_POLL: u8 = 14;
pub const CMD_END_KISS: u8 = 15;

/// Version string given to `TNC:` queries
pub fn tnc_version() -> String {
    format!(
        "{} {}.{}",
        PRODUCT_NAME,
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Shared by every KISS transport.
#[derive(Debug)]
pub struct KissProcessor {
    /// Where data frames go
    tq: Arc<TransmitQueue>,
    /// Updated by timing commands
    timing: Arc<TimingTable>,
    /// What each channel is attached to
    media: Vec<Medium>,
}

impl KissProcessor {
    /// Creates a new processor for the configured channels
    pub fn new(channels: &[ChannelConfig], tq: Arc<TransmitQueue>, timing: Arc<TimingTable>) -> Self {
        KissProcessor { tq, timing, media: channels.iter().map(|c| c.medium).collect() }
    }

    fn medium(&self, chan: usize) -> Medium {
        self.media.get(chan).copied().unwrap_or(Medium::None)
    }

    /// Handles one unwrapped message: type byte, then data.
    ///
    /// `pin` is the channel of a single-channel listener; it overrides the
    /// channel nibble. `malformed` belongs to the sending client and keeps
    /// undecodable frames to one error line per session. Returns a reply
    /// for the originating client only, unwrapped.
    pub fn process_msg(&self, msg: &[u8], pin: Option<usize>, malformed: &LogOnce) -> Option<Vec<u8>> {
        let (&kind, data) = msg.split_first()?;
        let chan = pin.unwrap_or((kind >> 4) as usize);
        let cmd = kind & 0x0f;

        match cmd {
            CMD_DATA_FRAME => {
                self.data_frame(chan, data, malformed);
                None
            }
            CMD_TXDELAY | CMD_PERSISTENCE | CMD_SLOTTIME | CMD_TXTAIL | CMD_FULLDUPLEX => {
                self.set_timing(chan, cmd, data);
                None
            }
            CMD_SET_HARDWARE => {
                if data.is_empty() {
                    error!("KISS: missing value for SET HARDWARE command");
                    return None;
                }
                let text = String::from_utf8_lossy(data);
                let text = text.trim_end_matches('\0');
                info!(chan, "KISS protocol set hardware \"{}\"", text);
                let response = self.set_hardware(chan, text)?;
                let reply_chan = if pin.is_some() { 0 } else { chan as u8 };
                let mut reply = vec![(reply_chan << 4) | CMD_SET_HARDWARE];
                reply.extend_from_slice(response.as_bytes());
                Some(reply)
            }
            CMD_END_KISS => {
                info!("KISS protocol end KISS mode, ignored");
                None
            }
            XKISS_CMD_DATA | XKISS_CMD_POLL => {
                error!(cmd, "KISS: the XKISS protocol is not supported; configure the application for standard KISS");
                None
            }
            _ => {
                error!(cmd, "KISS: invalid command");
                None
            }
        }
    }

    fn data_frame(&self, chan: usize, frame: &[u8], malformed: &LogOnce) {
        if chan >= MAX_CHANS || self.medium(chan) == Medium::None {
            if malformed.first() {
                error!(
                    chan,
                    "Invalid transmit channel from KISS client app; \
                     is it using a KISS variant that uses the channel field differently?"
                );
            } else {
                debug!(chan, "Invalid transmit channel from KISS client app");
            }
            return;
        }
        let Some(pp) = Packet::from_bytes(frame, AudioLevel::unknown()) else {
            if malformed.first() {
                error!(chan, len = frame.len(), "Invalid KISS data frame from client app");
            } else {
                debug!(chan, len = frame.len(), "Invalid KISS data frame from client app");
            }
            return;
        };
        // Already through a digipeater means repeated, so send it soon.
        let prio = if pp.num_repeaters() >= 1 && pp.get_h(REPEATER_1) {
            Priority::High
        } else {
            Priority::Low
        };
        debug!(chan, ?prio, frame = %pp.format_addrs(), "KISS data frame queued");
        self.tq.append(chan, prio, pp);
    }

    fn set_timing(&self, chan: usize, cmd: u8, data: &[u8]) {
        let Some(&value) = data.first() else {
            error!(cmd, "KISS: missing value for timing command");
            return;
        };
        let (name, extreme) = match cmd {
            CMD_TXDELAY => ("TXDELAY", !(4..=100).contains(&value)),
            CMD_PERSISTENCE => ("PERSISTENCE", !(5..=250).contains(&value)),
            CMD_SLOTTIME => ("SLOTTIME", !(2..=50).contains(&value)),
            CMD_TXTAIL => ("TXTAIL", value < 2),
            _ => ("FULLDUPLEX", false),
        };
        info!(chan, "KISS protocol set {} = {}", name, value);
        if extreme {
            warn!(chan, "Are you sure you want such an extreme value for {}?", name);
        }
        let known = self.timing.update(chan, |t| match cmd {
            CMD_TXDELAY => t.txdelay = value,
            CMD_PERSISTENCE => t.persist = value,
            CMD_SLOTTIME => t.slottime = value,
            CMD_TXTAIL => t.txtail = value,
            _ => t.fulldup = value != 0,
        });
        if !known {
            error!(chan, "KISS: timing command for invalid channel");
        }
    }

    /// `COMMAND:parameter` queries. Returns the response text.
    fn set_hardware(&self, chan: usize, text: &str) -> Option<String> {
        let Some((command, param)) = text.split_once(':') else {
            error!("KISS Set Hardware \"{}\" expected the form COMMAND:[parameter[,parameter...]]", text);
            return None;
        };
        match command {
            "TNC" => {
                if !param.is_empty() {
                    error!("KISS Set Hardware TNC: did not expect a parameter");
                }
                Some(tnc_version())
            }
            "TXBUF" => {
                if !param.is_empty() {
                    error!("KISS Set Hardware TXBUF: did not expect a parameter");
                }
                Some(format!("TXBUF:{}", self.tq.count(chan, &CountQuery::bytes())))
            }
            _ => {
                error!("KISS Set Hardware unrecognized command: {}", command);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::logging::count_errors;

    fn setup() -> (Arc<TransmitQueue>, Arc<TimingTable>, KissProcessor) {
        let chans = vec![ChannelConfig::radio("N0CALL"), ChannelConfig::default(), ChannelConfig::radio("N0CALL")];
        let tq = Arc::new(TransmitQueue::new(&chans));
        let timing = Arc::new(TimingTable::new(&chans));
        let kp = KissProcessor::new(&chans, Arc::clone(&tq), Arc::clone(&timing));
        (tq, timing, kp)
    }

    fn data_msg(kind: u8, text: &str) -> Vec<u8> {
        let mut msg = vec![kind];
        msg.extend_from_slice(Packet::from_text(text, true).unwrap().frame_bytes());
        msg
    }

    #[test]
    fn test_data_frame_priority() {
        let (tq, _, kp) = setup();
        assert!(kp.process_msg(&data_msg(0x00, "A>B:orig"), None, &LogOnce::new()).is_none());
        kp.process_msg(&data_msg(0x00, "A>B,D1*:rpt"), None, &LogOnce::new());
        kp.process_msg(&data_msg(0x20, "A>B:chan2"), None, &LogOnce::new());

        let (prio, pp) = tq.remove(0).unwrap();
        assert_eq!((prio, pp.get_info()), (Priority::High, &b"rpt"[..]));
        let (prio, pp) = tq.remove(0).unwrap();
        assert_eq!((prio, pp.get_info()), (Priority::Low, &b"orig"[..]));
        assert_eq!(tq.remove(2).unwrap().1.get_info(), b"chan2");
    }

    #[test]
    fn test_data_frame_rejected() {
        let (tq, _, kp) = setup();
        kp.process_msg(&data_msg(0x10, "A>B:x"), None, &LogOnce::new());
        kp.process_msg(&data_msg(0x90, "A>B:x"), None, &LogOnce::new());
        kp.process_msg(&[0x00, 1, 2, 3], None, &LogOnce::new());
        assert!((0..MAX_CHANS).all(|c| tq.is_empty(c)));
    }

    #[test]
    fn test_bad_frames_logged_once_per_client() {
        let (tq, _, kp) = setup();
        let first = LogOnce::new();
        let errors = count_errors(|| {
            kp.process_msg(&[0x00, 0x01], None, &first);
            kp.process_msg(&[0x00, 1, 2, 3], None, &first);
            kp.process_msg(&data_msg(0x10, "A>B:no such channel"), None, &first);
            kp.process_msg(&data_msg(0x00, "A>B:still fine"), None, &first);
        });
        assert_eq!(errors, 1);
        assert!(!tq.is_empty(0));

        // Another client gets its own first report.
        let second = LogOnce::new();
        assert_eq!(count_errors(|| drop(kp.process_msg(&[0x00, 0x01], None, &second))), 1);
    }

    #[test]
    fn test_pin_overrides_channel() {
        let (tq, _, kp) = setup();
        kp.process_msg(&data_msg(0x00, "A>B:x"), Some(2), &LogOnce::new());
        assert!(tq.is_empty(0));
        assert!(!tq.is_empty(2));
    }

    #[test]
    fn test_timing_commands() {
        let (_, timing, kp) = setup();
        kp.process_msg(&[0x01, 50], None, &LogOnce::new());
        kp.process_msg(&[0x02, 128], None, &LogOnce::new());
        kp.process_msg(&[0x03, 1], None, &LogOnce::new());
        kp.process_msg(&[0x04, 1], None, &LogOnce::new());
        kp.process_msg(&[0x25, 1], None, &LogOnce::new());
        kp.process_msg(&[0x01], None, &LogOnce::new());

        let t = timing.get(0).unwrap();
        assert_eq!((t.txdelay, t.persist, t.slottime, t.txtail, t.fulldup), (50, 128, 1, 1, false));
        assert!(timing.get(2).unwrap().fulldup);
    }

    #[test]
    fn test_set_hardware() {
        let (tq, _, kp) = setup();
        let reply = kp.process_msg(b"\x06TNC:", None, &LogOnce::new()).unwrap();
        assert_eq!(reply[0], 0x06);
        assert_eq!(String::from_utf8_lossy(&reply[1..]), tnc_version());
        assert!(tnc_version().starts_with("AX25TNC "));

        kp.process_msg(&data_msg(0x20, "A>B:12345"), None, &LogOnce::new());
        let reply = kp.process_msg(b"\x26TXBUF:", None, &LogOnce::new()).unwrap();
        assert_eq!(reply, b"\x26TXBUF:21".to_vec());

        let reply = kp.process_msg(b"\x06TXBUF:", Some(2), &LogOnce::new()).unwrap();
        assert_eq!(reply, b"\x06TXBUF:21".to_vec());
        assert_eq!(tq.count(2, &CountQuery::frames()), 1);

        assert!(kp.process_msg(b"\x06NOCOLON", None, &LogOnce::new()).is_none());
        assert!(kp.process_msg(b"\x06FOO:1", None, &LogOnce::new()).is_none());
        assert!(kp.process_msg(b"\x06", None, &LogOnce::new()).is_none());
    }

    #[test]
    fn test_other_commands_ignored() {
        let (_, timing, kp) = setup();
        let before = timing.get(0);
        for msg in [&[0xff][..], &[0x0c, 1][..], &[0x0e][..], &[0x07, 9][..]] {
            assert!(kp.process_msg(msg, None, &LogOnce::new()).is_none());
        }
        assert_eq!(timing.get(0), before);
        assert!(kp.process_msg(&[], None, &LogOnce::new()).is_none());
    }
}
