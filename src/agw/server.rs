//! AGW TCP server
//!
//! One accept loop hands each connection to a reader task. Everything
//! going back to a client, replies and received frames alike, goes through
//! its queue in the subscription table and out through a writer task.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio_util::codec::FramedRead;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::ax25::{Packet, MAX_INFO_LEN, PID_NO_LAYER_3, REPEATER_1};
use crate::core::{AudioLevel, ChannelConfig, Error, Medium, Priority, Result, MAX_CHANS};
use crate::dlq::{ClientId, Dlq};
use crate::router::{write_stream, AgwFormats, Subscriptions};
use crate::tq::{CountQuery, TransmitQueue};
use crate::util::{from_fixed, LogOnce};
use crate::util::net::bind_listener;

use super::header::{AgwCodec, AgwMessage};

/// Version we claim to be, as AGWPE numbers it.
pub const AGW_MAJOR_VERSION: u32 = 2005;
pub const AGW_MINOR_VERSION: u32 = 127;

/// Digipeaters allowed in a connect-via request.
const MAX_VIA: usize = 7;

/// Length of a callsign field in request data.
const CALL_FIELD_LEN: usize = 10;

/// What command handling needs, shared by every client task.
#[derive(Debug)]
pub struct AgwContext {
    /// Medium of each configured channel
    media: Vec<Medium>,
    tq: Arc<TransmitQueue>,
    dlq: Arc<Dlq>,
    subs: Arc<Subscriptions>,
}

impl AgwContext {
    /// Creates a new context
    pub fn new(channels: &[ChannelConfig], tq: Arc<TransmitQueue>, dlq: Arc<Dlq>, subs: Arc<Subscriptions>) -> Self {
        AgwContext { media: channels.iter().map(|c| c.medium).collect(), tq, dlq, subs }
    }

    fn medium(&self, chan: usize) -> Medium {
        self.media.get(chan).copied().unwrap_or(Medium::None)
    }

    fn reply(&self, client: ClientId, msg: AgwMessage) {
        if !self.subs.send_to(client, msg.to_bytes()) {
            debug!(client, "reply for a client that is gone");
        }
    }

    /// Acts on one command. An error means the client must be dropped.
    /// `malformed` belongs to the client and keeps frames that cannot be
    /// built to one error line per session.
    pub fn process(&self, client: ClientId, formats: &AgwFormats, malformed: &LogOnce, msg: AgwMessage) -> Result<()> {
        let h = msg.header;
        let kind = char::from(h.datakind);
        let chan = h.port as usize;
        if chan >= MAX_CHANS {
            return Err(Error::protocol(format!(
                "Invalid port number {} in command '{}' from AGW client {}",
                chan, kind, client
            )));
        }
        let data = &msg.data[..];
        debug!(client, chan, %kind, len = data.len(), "AGW command");

        match h.datakind {
            b'R' => {
                let mut ver = Vec::with_capacity(8);
                ver.extend_from_slice(&AGW_MAJOR_VERSION.to_le_bytes());
                ver.extend_from_slice(&AGW_MINOR_VERSION.to_le_bytes());
                self.reply(client, AgwMessage::new(0, b'R').data(ver));
            }
            b'G' => self.reply(client, AgwMessage::new(0, b'G').data(self.port_info())),
            b'g' => {
                // baud, traffic level, txdelay, txtail, persist, slottime,
                // maxframe, active connections, then how many bytes.
                let mut caps = vec![0, 1, 0x19, 4, 0xc8, 4, 7, 0];
                caps.extend_from_slice(&1u32.to_le_bytes());
                self.reply(client, AgwMessage::new(h.port, b'g').data(caps));
            }
            b'k' => {
                let on = formats.toggle_raw();
                info!(client, on, "AGW raw frame delivery");
            }
            b'm' => {
                let on = formats.toggle_monitor();
                info!(client, on, "AGW monitor frame delivery");
            }
            b'V' => {
                let (via, info) = split_via(data);
                self.send_unproto(chan, &h.call_from(), &h.call_to(), &via, info, 'V', malformed);
            }
            b'M' => self.send_unproto(chan, &h.call_from(), &h.call_to(), &[], data, 'M', malformed),
            b'K' => self.send_raw(chan, data, malformed),
            b'X' => {
                let call = h.call_from();
                let ok = self.medium(chan) == Medium::Radio;
                if ok {
                    self.dlq.register_callsign(&call, chan, client);
                } else {
                    error!(chan, "AGW protocol error: register callsign for invalid channel");
                }
                let mut reply = AgwMessage::new(h.port, b'X').data(vec![u8::from(ok)]);
                reply.header.call_from = h.call_from;
                self.reply(client, reply);
            }
            b'x' => {
                if self.medium(chan) == Medium::Radio {
                    self.dlq.unregister_callsign(&h.call_from(), chan, client);
                } else {
                    error!(chan, "AGW protocol error: unregister callsign for invalid channel");
                }
            }
            b'C' | b'v' | b'c' => {
                let mut addrs = vec![h.call_to(), h.call_from()];
                let pid = if h.datakind == b'c' { h.pid } else { PID_NO_LAYER_3 };
                if h.datakind == b'v' {
                    addrs.extend(connect_via(data, malformed));
                }
                self.dlq.connect_request(addrs, chan, client, pid);
            }
            b'D' => {
                let addrs = vec![h.call_to(), h.call_from()];
                self.dlq.xmit_data_request(addrs, chan, client, h.pid, data);
            }
            b'd' => self.dlq.disconnect_request(vec![h.call_to(), h.call_from()], chan, client),
            b'Y' => self.dlq.outstanding_frames_request(vec![h.call_to(), h.call_from()], chan, client),
            b'y' => {
                let query = CountQuery::default();
                let n = self.tq.count(chan, &query) as u32;
                self.reply(client, AgwMessage::new(h.port, b'y').data(n.to_le_bytes().to_vec()));
            }
            b'P' => info!(client, "AGW application login ignored"),
            _ => warn!(client, %kind, "Unexpected command from application using AGW protocol"),
        }
        Ok(())
    }

    /// `n;Port1 ...;Port2 ...;` with a NUL at the end.
    fn port_info(&self) -> Vec<u8> {
        let ports: Vec<(usize, Medium)> =
            self.media.iter().copied().enumerate().filter(|(_, m)| *m != Medium::None).collect();
        let mut text = format!("{};", ports.len());
        for (chan, medium) in ports {
            let desc = match medium {
                Medium::Radio => format!("radio channel {}", chan),
                Medium::Igate => "Internet Gateway".to_string(),
                Medium::NetTnc => "Network TNC".to_string(),
                Medium::None => continue,
            };
            text.push_str(&format!("Port{} {};", chan + 1, desc));
        }
        let mut data = text.into_bytes();
        data.push(0);
        data
    }

    #[allow(clippy::too_many_arguments)]
    fn send_unproto(
        &self,
        chan: usize,
        from: &str,
        to: &str,
        via: &[String],
        info: &[u8],
        kind: char,
        malformed: &LogOnce,
    ) {
        let mut text = format!("{}>{}", from, to);
        for v in via {
            text.push(',');
            text.push_str(v);
        }
        text.push(':');
        text.push_str(&from_fixed(info));
        match Packet::from_text(&text, true) {
            // An original, and the protocol cannot mark digipeaters used.
            Some(pp) => {
                self.tq.append(chan, Priority::Low, pp);
            }
            None if malformed.first() => error!(%kind, "Failed to create frame from AGW '{}' message", kind),
            None => debug!(%kind, "Failed to create frame from AGW '{}' message", kind),
        }
    }

    fn send_raw(&self, chan: usize, data: &[u8], malformed: &LogOnce) {
        let Some(pp) = data.get(1..).and_then(|f| Packet::from_bytes(f, AudioLevel::unknown())) else {
            if malformed.first() {
                error!("Failed to create frame from AGW 'K' message");
            } else {
                debug!("Failed to create frame from AGW 'K' message");
            }
            return;
        };
        let prio = if pp.num_repeaters() >= 1 && pp.get_h(REPEATER_1) {
            Priority::High
        } else {
            Priority::Low
        };
        self.tq.append(chan, prio, pp);
    }
}

/// `V` data: digipeater count, 10 byte calls, then the information.
fn split_via(data: &[u8]) -> (Vec<String>, &[u8]) {
    let Some((&n, mut rest)) = data.split_first() else {
        return (Vec::new(), data);
    };
    let mut via = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let take = rest.len().min(CALL_FIELD_LEN);
        via.push(from_fixed(&rest[..take]));
        rest = &rest[take..];
    }
    (via, rest)
}

/// `v` data: digipeater count then up to seven 10 byte calls.
fn connect_via(data: &[u8], malformed: &LogOnce) -> Vec<String> {
    let n = data.first().copied().unwrap_or(0) as usize;
    if !(1..=MAX_VIA).contains(&n) {
        if malformed.first() {
            error!(n, "AGW client, connect via, has invalid number of digipeaters");
        } else {
            debug!(n, "AGW client, connect via, has invalid number of digipeaters");
        }
        return Vec::new();
    }
    let expected = n * CALL_FIELD_LEN + 1;
    if data.len() != expected && data.len() != expected + 1 {
        if malformed.first() {
            error!(len = data.len(), expected, "AGW client, connect via, has unexpected data length");
        } else {
            debug!(len = data.len(), expected, "AGW client, connect via, has unexpected data length");
        }
    }
    data[1..]
        .chunks(CALL_FIELD_LEN)
        .take(n)
        .map(from_fixed)
        .collect()
}

/// Tells a client a link is up.
pub fn link_established(subs: &Subscriptions, chan: usize, client: ClientId, remote: &str, own: &str, incoming: bool) -> bool {
    let text = if incoming {
        format!("*** CONNECTED To Station {}\r\0", remote)
    } else {
        format!("*** CONNECTED With Station {}\r\0", remote)
    };
    let msg = AgwMessage::new(chan as u8, b'C').calls(remote, own).data(text.into_bytes());
    subs.send_to(client, msg.to_bytes())
}

/// Tells a client a link is gone, or never came up.
pub fn link_terminated(subs: &Subscriptions, chan: usize, client: ClientId, remote: &str, own: &str, timeout: bool) -> bool {
    let text = if timeout {
        format!("*** DISCONNECTED RETRYOUT With {}\r\0", remote)
    } else {
        format!("*** DISCONNECTED From Station {}\r\0", remote)
    };
    let msg = AgwMessage::new(chan as u8, b'd').calls(remote, own).data(text.into_bytes());
    subs.send_to(client, msg.to_bytes())
}

/// Passes connected-mode data up to a client.
pub fn rec_conn_data(
    subs: &Subscriptions,
    chan: usize,
    client: ClientId,
    remote: &str,
    own: &str,
    pid: u8,
    data: &[u8],
) -> bool {
    let data = if data.len() > MAX_INFO_LEN {
        if subs.agw_formats(client).map_or(true, |f| f.malformed().first()) {
            error!(len = data.len(), client, "Invalid length for connected data");
        } else {
            debug!(len = data.len(), client, "Invalid length for connected data");
        }
        &data[..MAX_INFO_LEN]
    } else {
        data
    };
    let msg = AgwMessage::new(chan as u8, b'D').calls(remote, own).pid(pid).data(data.to_vec());
    subs.send_to(client, msg.to_bytes())
}

/// Answers `Y` with frames not yet acknowledged by the other station.
pub fn outstanding_frames_reply(
    subs: &Subscriptions,
    chan: usize,
    client: ClientId,
    own: &str,
    remote: &str,
    count: u32,
) -> bool {
    let msg = AgwMessage::new(chan as u8, b'Y').calls(own, remote).data(count.to_le_bytes().to_vec());
    subs.send_to(client, msg.to_bytes())
}

/// The listening server.
pub struct AgwServer {
    listener: TcpListener,
    ctx: Arc<AgwContext>,
    /// Concurrent clients
    slots: Arc<Semaphore>,
}

impl AgwServer {
    /// Binds the listening socket.
    pub fn bind(addr: SocketAddr, max_clients: usize, ctx: Arc<AgwContext>) -> Result<Self> {
        let listener = bind_listener(addr)?;
        info!(%addr, max_clients, "Ready to accept AGW client applications");
        Ok(AgwServer { listener, ctx, slots: Arc::new(Semaphore::new(max_clients)) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    /// Accepts clients until shutdown. Client tasks are spawned on
    /// `tracker` so shutdown can wait for their writes to drain.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>, tracker: TaskTracker) {
        loop {
            let permit = tokio::select! {
                p = Arc::clone(&self.slots).acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };
            let accepted = tokio::select! {
                a = self.listener.accept() => a,
                _ = shutdown.changed() => break,
            };
            match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "Connected to AGW client application");
                    let ctx = Arc::clone(&self.ctx);
                    let shutdown = shutdown.clone();
                    let t = tracker.clone();
                    tracker.spawn(async move {
                        serve_client(stream, ctx, shutdown, t).await;
                        drop(permit);
                        info!(%peer, "AGW client application disconnected");
                    });
                }
                Err(e) => error!("Failed to accept AGW client: {}", e),
            }
        }
        info!("AGW server stopped accepting");
    }
}

async fn serve_client(stream: TcpStream, ctx: Arc<AgwContext>, mut shutdown: watch::Receiver<bool>, tracker: TaskTracker) {
    let (sub, formats) = ctx.subs.subscribe_agw();
    let id = sub.id;
    let (rd, wr) = stream.into_split();
    tracker.spawn(write_stream(wr, sub.rx));

    let mut frames = FramedRead::new(rd, AgwCodec::new());
    loop {
        let next = tokio::select! {
            n = frames.next() => n,
            _ = shutdown.changed() => break,
        };
        match next {
            Some(Ok(msg)) => {
                if let Err(e) = ctx.process(id, &formats, formats.malformed(), msg) {
                    error!(client = id, "{}; closing connection", e);
                    break;
                }
            }
            Some(Err(e)) => {
                error!(client = id, "{}; closing connection", e);
                break;
            }
            None => break,
        }
    }
    ctx.dlq.client_cleanup(id);
    ctx.subs.unsubscribe(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agw::header::{AgwHeader, HEADER_LEN};
    use crate::dlq::Event;
    use crate::util::logging::count_errors;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn context() -> (Arc<TransmitQueue>, Arc<Dlq>, Arc<Subscriptions>, AgwContext) {
        let chans = vec![ChannelConfig::radio("N0CALL"), ChannelConfig::default()];
        let tq = Arc::new(TransmitQueue::new(&chans));
        let dlq = Arc::new(Dlq::new());
        let subs = Arc::new(Subscriptions::new());
        let ctx = AgwContext::new(&chans, Arc::clone(&tq), Arc::clone(&dlq), Arc::clone(&subs));
        (tq, dlq, subs, ctx)
    }

    fn header(bytes: &Bytes) -> AgwHeader {
        AgwHeader::from_bytes(&bytes[..HEADER_LEN]).unwrap()
    }

    #[test]
    fn test_version_and_ports() {
        let (_, _, subs, ctx) = context();
        let (mut sub, formats) = subs.subscribe_agw();
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'R')).unwrap();
        let reply = sub.rx.try_recv().unwrap();
        assert_eq!(reply.len(), 44);
        assert_eq!(header(&reply).data_len, 8);
        assert_eq!(&reply[HEADER_LEN..], &[0xd5, 0x07, 0, 0, 0x7f, 0, 0, 0]);

        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'G')).unwrap();
        let reply = sub.rx.try_recv().unwrap();
        assert_eq!(&reply[HEADER_LEN..], b"1;Port1 radio channel 0;\0");

        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'g')).unwrap();
        let reply = sub.rx.try_recv().unwrap();
        assert_eq!(&reply[HEADER_LEN..], &[0, 1, 0x19, 4, 0xc8, 4, 7, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_toggles() {
        let (_, _, subs, ctx) = context();
        let (sub, formats) = subs.subscribe_agw();
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'k')).unwrap();
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'm')).unwrap();
        assert!(formats.raw() && formats.monitor());
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'm')).unwrap();
        assert!(!formats.monitor());
    }

    #[test]
    fn test_transmit_variants() {
        let (tq, _, subs, ctx) = context();
        let (sub, formats) = subs.subscribe_agw();

        let mut v = vec![2u8];
        v.extend_from_slice(b"WIDE1-1\0\0\0WIDE2-2\0\0\0hello");
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'V').calls("N0CALL", "APRS").data(v)).unwrap();
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'M').calls("N0CALL", "CQ").data(&b"hi\0"[..])).unwrap();

        let rpt = Packet::from_text("N0CALL>APRS,W1AW*:x", true).unwrap();
        let mut k = vec![0u8];
        k.extend_from_slice(rpt.frame_bytes());
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'K').data(k)).unwrap();

        let (prio, pp) = tq.remove(0).unwrap();
        assert_eq!((prio, pp.format_addrs()), (Priority::High, "N0CALL>APRS,W1AW*:".to_string()));
        let (prio, pp) = tq.remove(0).unwrap();
        assert_eq!(prio, Priority::Low);
        assert_eq!(pp.format_addrs(), "N0CALL>APRS,WIDE1-1,WIDE2-2:");
        assert_eq!(pp.get_info(), b"hello");
        let (_, pp) = tq.remove(0).unwrap();
        assert_eq!(pp.get_info(), b"hi");
        assert!(tq.remove(0).is_none());
    }

    #[test]
    fn test_bad_frames_logged_once_per_client() {
        let (tq, dlq, subs, ctx) = context();
        let (mut sub, formats) = subs.subscribe_agw();
        let errors = count_errors(|| {
            for _ in 0..3 {
                ctx.process(sub.id, &formats, formats.malformed(), AgwMessage::new(0, b'K').data(vec![0u8, 1, 2]))
                    .unwrap();
            }
            let bad_call = AgwMessage::new(0, b'M').calls("TOOLONGCALL", "CQ").data(&b"x\0"[..]);
            ctx.process(sub.id, &formats, formats.malformed(), bad_call).unwrap();
            let bad_via = AgwMessage::new(0, b'v').calls("N0CALL", "W1AW").data(vec![9u8]);
            ctx.process(sub.id, &formats, formats.malformed(), bad_via).unwrap();
            assert!(rec_conn_data(&subs, 0, sub.id, "W1AW", "N0CALL", 0xf0, &[b'x'; MAX_INFO_LEN + 1]));
        });
        assert_eq!(errors, 1);
        assert!(tq.is_empty(0));
        assert!(matches!(dlq.remove(), Some(Event::ConnectRequest { .. })));
        assert!(sub.rx.try_recv().is_ok());

        // A new client gets its own first report.
        let (other, other_formats) = subs.subscribe_agw();
        let errors = count_errors(|| {
            ctx.process(other.id, &other_formats, other_formats.malformed(), AgwMessage::new(0, b'K').data(vec![0u8]))
                .unwrap();
        });
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_register_callsign() {
        let (_, dlq, subs, ctx) = context();
        let (mut sub, formats) = subs.subscribe_agw();

        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'X').calls("N0CALL-1", "")).unwrap();
        let reply = sub.rx.try_recv().unwrap();
        assert_eq!(header(&reply).call_from(), "N0CALL-1");
        assert_eq!(&reply[HEADER_LEN..], &[1]);
        assert_eq!(
            dlq.remove(),
            Some(Event::RegisterCallsign { chan: 0, client: sub.id, callsign: "N0CALL-1".to_string() })
        );

        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(1, b'X').calls("N0CALL-1", "")).unwrap();
        assert_eq!(&sub.rx.try_recv().unwrap()[HEADER_LEN..], &[0]);
        assert!(dlq.is_empty());
    }

    #[test]
    fn test_connected_mode_requests() {
        let (_, dlq, subs, ctx) = context();
        let (sub, formats) = subs.subscribe_agw();
        let id = sub.id;

        let mut via = vec![2u8];
        via.extend_from_slice(b"RELAY\0\0\0\0\0WIDE2-1\0\0\0");
        ctx.process(id, &formats, &LogOnce::new(), AgwMessage::new(0, b'v').calls("N0CALL", "W1AW").data(via)).unwrap();
        ctx.process(id, &formats, &LogOnce::new(), AgwMessage::new(0, b'c').calls("N0CALL", "W1AW").pid(0xcf)).unwrap();
        ctx.process(id, &formats, &LogOnce::new(), AgwMessage::new(0, b'D').calls("N0CALL", "W1AW").pid(0xf0).data(&b"data"[..]))
            .unwrap();
        ctx.process(id, &formats, &LogOnce::new(), AgwMessage::new(0, b'Y').calls("N0CALL", "W1AW")).unwrap();
        ctx.process(id, &formats, &LogOnce::new(), AgwMessage::new(0, b'd').calls("N0CALL", "W1AW")).unwrap();

        let pair = vec!["W1AW".to_string(), "N0CALL".to_string()];
        assert_eq!(
            dlq.remove(),
            Some(Event::ConnectRequest {
                chan: 0,
                client: id,
                addrs: vec!["W1AW".into(), "N0CALL".into(), "RELAY".into(), "WIDE2-1".into()],
                pid: 0xf0,
            })
        );
        assert_eq!(dlq.remove(), Some(Event::ConnectRequest { chan: 0, client: id, addrs: pair.clone(), pid: 0xcf }));
        match dlq.remove() {
            Some(Event::XmitDataRequest { addrs, data, .. }) => {
                assert_eq!(addrs, pair);
                assert_eq!((data.pid, &data.data[..]), (0xf0, &b"data"[..]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dlq.remove(), Some(Event::OutstandingFramesRequest { chan: 0, client: id, addrs: pair.clone() }));
        assert_eq!(dlq.remove(), Some(Event::DisconnectRequest { chan: 0, client: id, addrs: pair }));
    }

    #[test]
    fn test_outstanding_on_port() {
        let (tq, _, subs, ctx) = context();
        let (mut sub, formats) = subs.subscribe_agw();
        tq.append(0, Priority::Low, Packet::from_text("A>B:x", true).unwrap());
        tq.append(0, Priority::High, Packet::from_text("A>B:y", true).unwrap());
        ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(0, b'y')).unwrap();
        assert_eq!(&sub.rx.try_recv().unwrap()[HEADER_LEN..], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_invalid_port_is_error() {
        let (_, _, subs, ctx) = context();
        let (sub, formats) = subs.subscribe_agw();
        assert!(ctx.process(sub.id, &formats, &LogOnce::new(), AgwMessage::new(16, b'R')).is_err());
    }

    #[test]
    fn test_link_notifications() {
        let subs = Subscriptions::new();
        let (mut sub, _) = subs.subscribe_agw();

        assert!(link_established(&subs, 0, sub.id, "W1AW", "N0CALL", true));
        let msg = sub.rx.try_recv().unwrap();
        let h = header(&msg);
        assert_eq!((h.datakind, h.call_from(), h.call_to()), (b'C', "W1AW".into(), "N0CALL".into()));
        assert_eq!(&msg[HEADER_LEN..], b"*** CONNECTED To Station W1AW\r\0");

        assert!(link_terminated(&subs, 0, sub.id, "W1AW", "N0CALL", true));
        assert_eq!(&sub.rx.try_recv().unwrap()[HEADER_LEN..], b"*** DISCONNECTED RETRYOUT With W1AW\r\0");

        assert!(rec_conn_data(&subs, 0, sub.id, "W1AW", "N0CALL", 0xf0, b"abc"));
        let msg = sub.rx.try_recv().unwrap();
        assert_eq!((header(&msg).datakind, header(&msg).pid), (b'D', 0xf0));

        assert!(outstanding_frames_reply(&subs, 0, sub.id, "N0CALL", "W1AW", 5));
        let msg = sub.rx.try_recv().unwrap();
        assert_eq!(header(&msg).call_from(), "N0CALL");
        assert_eq!(&msg[HEADER_LEN..], &[5, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_version_over_tcp() {
        let (_, dlq, subs, ctx) = context();
        let server = AgwServer::bind("127.0.0.1:0".parse().unwrap(), 3, Arc::new(ctx)).unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let tracker = TaskTracker::new();
        let task = tokio::spawn(server.run(stop_rx, tracker.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&AgwHeader::new(0, b'R').to_bytes().unwrap()).await.unwrap();
        let mut reply = [0u8; 44];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut reply)).await.unwrap().unwrap();
        let h = AgwHeader::from_bytes(&reply[..HEADER_LEN]).unwrap();
        assert_eq!((h.datakind, h.data_len), (b'R', 8));
        assert_eq!(u32::from_le_bytes([reply[36], reply[37], reply[38], reply[39]]), 2005);
        assert_eq!(u32::from_le_bytes([reply[40], reply[41], reply[42], reply[43]]), 127);
        assert_eq!(subs.len(), 1);

        // Oversized data length closes the connection.
        let mut bad = AgwHeader::new(0, b'D');
        bad.data_len = 5000;
        client.write_all(&bad.to_bytes().unwrap()).await.unwrap();
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !subs.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(dlq.remove(), Some(Event::ClientCleanup { .. })));

        stop_tx.send(true).unwrap();
        task.await.unwrap();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(2), tracker.wait()).await.unwrap();
    }
}
