//! KISS over a serial port
//!
//! Blocking serial I/O on two dedicated threads. The reader feeds bytes
//! through the KISS decoder one at a time; the writer drains the
//! subscriber queue. With a poll interval configured, a port that is
//! missing or goes away (a USB adapter unplugged, say) is reopened.

use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serialport::SerialPort;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::core::{Error, Result, SerialKissConfig};
use crate::router::Transport;

use super::frame::KissCodec;
use super::session::{KissContext, KissSession};

/// Read timeout, also how often shutdown is noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens the serial device in raw mode.
pub fn open_port(device: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(device, baud)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| Error::serial(format!("Failed to open serial port {}: {}", device, e)))
}

/// Serial KISS endpoint.
pub struct KissSerial {
    config: SerialKissConfig,
    ctx: Arc<KissContext>,
}

impl KissSerial {
    /// Creates a new serial endpoint. Nothing is opened until `spawn`.
    pub fn new(config: SerialKissConfig, ctx: Arc<KissContext>) -> Self {
        KissSerial { config, ctx }
    }

    /// Starts the reader thread. The first open is attempted right away;
    /// without polling, failure to open is returned to the caller.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Result<thread::JoinHandle<()>> {
        let first = match open_port(&self.config.device, self.config.baud) {
            Ok(port) => Some(port),
            Err(e) if self.config.poll_interval.is_some() => {
                warn!(device = %self.config.device, "{}, will keep trying", e);
                None
            }
            Err(e) => return Err(e),
        };
        thread::Builder::new()
            .name("kiss-serial".into())
            .spawn(move || self.run(first, shutdown))
            .map_err(|e| Error::serial(format!("Failed to start serial thread: {}", e)))
    }

    fn run(self, mut port: Option<Box<dyn SerialPort>>, shutdown: watch::Receiver<bool>) {
        let subs = Arc::clone(self.ctx.subs());
        loop {
            if *shutdown.borrow() {
                break;
            }
            let p = match port.take() {
                Some(p) => p,
                None => match self.config.poll_interval {
                    Some(interval) => {
                        thread::sleep(interval);
                        match open_port(&self.config.device, self.config.baud) {
                            Ok(p) => {
                                info!(device = %self.config.device, "Serial port for KISS client application is back");
                                p
                            }
                            Err(e) => {
                                debug!("{}", e);
                                continue;
                            }
                        }
                    }
                    None => break,
                },
            };

            let writer = match p.try_clone() {
                Ok(w) => w,
                Err(e) => {
                    error!(device = %self.config.device, "Failed to clone serial port: {}", e);
                    continue;
                }
            };
            let sub = subs.subscribe(Transport::KissSerial, None);
            let id = sub.id;
            let write_thread = thread::Builder::new()
                .name("kiss-serial-tx".into())
                .spawn(move || write_port(writer, sub.rx));
            if let Err(e) = write_thread {
                error!("Failed to start serial writer: {}", e);
                subs.unsubscribe(id);
                continue;
            }

            info!(device = %self.config.device, baud = self.config.baud, "Serial port ready for KISS client application");
            read_port(p, &self.ctx, id, &shutdown);
            // Dropping the subscription ends the writer.
            subs.unsubscribe(id);
            if self.config.poll_interval.is_none() {
                break;
            }
        }
        info!(device = %self.config.device, "Serial KISS stopped");
    }
}

fn read_port(mut port: Box<dyn SerialPort>, ctx: &KissContext, id: usize, shutdown: &watch::Receiver<bool>) {
    let session = KissSession::new(id, Transport::KissSerial, None);
    let mut codec = KissCodec::new();
    let mut buf = [0u8; 256];
    while !*shutdown.borrow() {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                for &b in &buf[..n] {
                    if let Some(item) = codec.push_byte(b) {
                        ctx.handle(&session, item);
                    }
                }
            }
            Err(e) if e.kind() == IoErrorKind::TimedOut || e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Lost communication with serial KISS client application: {}", e);
                break;
            }
        }
    }
}

fn write_port(mut port: Box<dyn SerialPort>, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(data) = rx.blocking_recv() {
        if let Err(e) = port.write_all(&data).and_then(|_| port.flush()) {
            error!("Serial port KISS write failed: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelConfig;
    use crate::kiss::process::KissProcessor;
    use crate::router::Subscriptions;
    use crate::tq::{TimingTable, TransmitQueue};

    fn context() -> Arc<KissContext> {
        let chans = vec![ChannelConfig::radio("N0CALL")];
        let tq = Arc::new(TransmitQueue::new(&chans));
        let kp = KissProcessor::new(&chans, tq, Arc::new(TimingTable::new(&chans)));
        Arc::new(KissContext::new(kp, Arc::new(Subscriptions::new()), false))
    }

    #[test]
    fn test_missing_device_without_polling() {
        let cfg = SerialKissConfig {
            device: "/dev/does-not-exist-kiss".into(),
            baud: 9600,
            poll_interval: None,
        };
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(KissSerial::new(cfg, context()).spawn(rx), Err(Error::Serial(_))));
    }

    #[test]
    fn test_missing_device_with_polling_waits() {
        let ctx = context();
        let cfg = SerialKissConfig {
            device: "/dev/does-not-exist-kiss".into(),
            baud: 9600,
            poll_interval: Some(Duration::from_millis(10)),
        };
        let (tx, rx) = watch::channel(false);
        let handle = KissSerial::new(cfg, Arc::clone(&ctx)).spawn(rx).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(ctx.subs().is_empty());
        tx.send(true).unwrap();
        handle.join().unwrap();
    }
}
