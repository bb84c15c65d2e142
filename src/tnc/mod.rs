//! TNC runtime
//!
//! Builds every component from one configuration, starts the client
//! servers and background tasks, and shuts them all down together.

pub mod dispatch;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::agw::{AgwContext, AgwServer};
use crate::core::{Error, Medium, Result, TncConfig};
use crate::digipeater::{Digipeater, FilterEvaluator};
use crate::dlq::Dlq;
use crate::kiss::{KissContext, KissProcessor, KissSerial, KissTcpServer};
use crate::mheard::Mheard;
use crate::router::Subscriptions;
use crate::tq::{ChannelActivity, FrameSender, Ptt, TimingTable, TransmitQueue, Transmitter};
use crate::util::net::any_addr;
use crate::waypoint::WaypointSender;

pub use self::dispatch::{Dispatcher, LinkHandler, MonitoredSender, NoLinkLayer};

/// What the core is attached to on the outside.
#[derive(Clone)]
pub struct Attachments {
    /// Connected-mode link layer
    pub link: Arc<dyn LinkHandler>,
    /// PTT control and modem for radio channels. Without them nothing is
    /// transmitted and queued frames stay queued.
    pub radio: Option<(Arc<dyn Ptt>, Arc<dyn FrameSender>)>,
    /// Filter engine for digipeater rules
    pub filter: Option<Arc<dyn FilterEvaluator>>,
}

impl Default for Attachments {
    fn default() -> Self {
        Attachments { link: Arc::new(NoLinkLayer), radio: None, filter: None }
    }
}

/// A running TNC.
pub struct Tnc {
    config: TncConfig,
    tq: Arc<TransmitQueue>,
    timing: Arc<TimingTable>,
    dlq: Arc<Dlq>,
    subs: Arc<Subscriptions>,
    mheard: Arc<Mheard>,
    activity: Arc<ChannelActivity>,
    waypoints: Arc<WaypointSender>,
    shutdown: watch::Sender<bool>,
    tracker: TaskTracker,
    kiss_addrs: Vec<SocketAddr>,
    agw_addr: Option<SocketAddr>,
    pty_name: Option<String>,
    serial: Option<JoinHandle<()>>,
}

impl Tnc {
    /// Starts everything the configuration asks for, with nothing attached.
    pub async fn start(config: TncConfig) -> Result<Self> {
        Self::start_with(config, Attachments::default()).await
    }

    /// Starts everything the configuration asks for.
    pub async fn start_with(config: TncConfig, attach: Attachments) -> Result<Self> {
        config.validate()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let tracker = TaskTracker::new();

        let tq = Arc::new(TransmitQueue::new(&config.channels));
        let timing = Arc::new(TimingTable::new(&config.channels));
        let dlq = Arc::new(Dlq::new());
        let subs = Arc::new(Subscriptions::new());
        let mheard = Arc::new(Mheard::new());
        let activity = Arc::new(ChannelActivity::new());

        let mut digipeater = Digipeater::new(&config)?;
        if let Some(filter) = attach.filter.clone() {
            digipeater = digipeater.with_filter(filter);
        }
        let digipeater = digipeater.is_enabled().then(|| Arc::new(digipeater));

        let kiss = Arc::new(KissContext::new(
            KissProcessor::new(&config.channels, Arc::clone(&tq), Arc::clone(&timing)),
            Arc::clone(&subs),
            config.kiss.kiss_copy,
        ));

        let mut kiss_addrs = Vec::new();
        for p in &config.kiss.tcp_ports {
            let server = KissTcpServer::bind(any_addr(p.port), p.chan, config.kiss.max_clients, Arc::clone(&kiss))?;
            kiss_addrs.push(server.local_addr()?);
            tracker.spawn(server.run(shutdown_rx.clone(), tracker.clone()));
        }

        let serial = match &config.kiss.serial {
            Some(cfg) => Some(KissSerial::new(cfg.clone(), Arc::clone(&kiss)).spawn(shutdown_rx.clone())?),
            None => None,
        };

        let pty_name = match &config.kiss.pty {
            #[cfg(target_os = "linux")]
            Some(cfg) => Some(crate::kiss::pty::spawn(cfg, Arc::clone(&kiss), shutdown_rx.clone(), &tracker)?),
            #[cfg(not(target_os = "linux"))]
            Some(_) => return Err(Error::config("pseudo terminal KISS is only available on Linux")),
            None => None,
        };

        let agw_addr = match config.agw.port {
            Some(port) => {
                let ctx = AgwContext::new(&config.channels, Arc::clone(&tq), Arc::clone(&dlq), Arc::clone(&subs));
                let server = AgwServer::bind(any_addr(port), config.agw.max_clients, Arc::new(ctx))?;
                let addr = server.local_addr()?;
                tracker.spawn(server.run(shutdown_rx.clone(), tracker.clone()));
                Some(addr)
            }
            None => None,
        };

        let dispatcher = Dispatcher::new(
            Arc::clone(&dlq),
            Arc::clone(&subs),
            Arc::clone(&mheard),
            digipeater,
            Arc::clone(&tq),
            Arc::clone(&activity),
            Arc::clone(&attach.link),
        );
        tracker.spawn(dispatcher.run(shutdown_rx.clone()));

        if let Some((ptt, modem)) = &attach.radio {
            let modem: Arc<dyn FrameSender> = Arc::new(MonitoredSender::new(Arc::clone(modem), Arc::clone(&subs)));
            for (chan, _) in config.channels.iter().enumerate().filter(|(_, c)| c.medium == Medium::Radio) {
                let xmit = Transmitter::new(
                    chan,
                    Arc::clone(&tq),
                    Arc::clone(&timing),
                    Arc::clone(&activity),
                    Arc::clone(&dlq),
                    Arc::clone(ptt),
                    Arc::clone(&modem),
                );
                tracker.spawn(xmit.run(shutdown_rx.clone()));
            }
        }

        let waypoints = Arc::new(WaypointSender::open(&config.waypoint).await);

        info!(
            channels = config.channels.len(),
            kiss = kiss_addrs.len(),
            agw = agw_addr.is_some(),
            "TNC started"
        );
        Ok(Tnc {
            config,
            tq,
            timing,
            dlq,
            subs,
            mheard,
            activity,
            waypoints,
            shutdown,
            tracker,
            kiss_addrs,
            agw_addr,
            pty_name,
            serial,
        })
    }

    pub fn config(&self) -> &TncConfig {
        &self.config
    }

    pub fn transmit_queue(&self) -> &Arc<TransmitQueue> {
        &self.tq
    }

    /// Transmit timing, as changed by KISS clients
    pub fn timing(&self) -> &Arc<TimingTable> {
        &self.timing
    }

    /// Where receivers put frames and link events
    pub fn dlq(&self) -> &Arc<Dlq> {
        &self.dlq
    }

    pub fn subscriptions(&self) -> &Arc<Subscriptions> {
        &self.subs
    }

    pub fn mheard(&self) -> &Arc<Mheard> {
        &self.mheard
    }

    /// Carrier detect state; the receive side reports through the DLQ
    pub fn activity(&self) -> &Arc<ChannelActivity> {
        &self.activity
    }

    pub fn waypoints(&self) -> &Arc<WaypointSender> {
        &self.waypoints
    }

    /// Bound address of each KISS TCP listener, in configuration order
    pub fn kiss_addrs(&self) -> &[SocketAddr] {
        &self.kiss_addrs
    }

    pub fn agw_addr(&self) -> Option<SocketAddr> {
        self.agw_addr
    }

    /// Slave side of the KISS pseudo terminal
    pub fn pty_name(&self) -> Option<&str> {
        self.pty_name.as_deref()
    }

    /// Stops accepting, closes listeners and client connections, then
    /// waits up to `shutdown_grace` for pending client writes.
    pub async fn shutdown(self) {
        info!("TNC shutting down");
        let _ = self.shutdown.send(true);
        self.tracker.close();
        let grace = self.config.shutdown_grace;
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(tasks = self.tracker.len(), "tasks still running after {:?}, abandoning them", grace);
        }
        if let Some(handle) = self.serial {
            let joined = tokio::task::spawn_blocking(move || handle.join());
            if tokio::time::timeout(grace.max(Duration::from_millis(200)), joined).await.is_err() {
                warn!("serial KISS thread did not stop in time");
            }
        }
        info!("TNC stopped");
    }

    /// Runs until SIGINT or SIGTERM, then shuts down.
    pub async fn run_until_signal(self) -> Result<()> {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| Error::invalid_state(format!("Failed to install signal handler: {}", e)))?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                if let Err(e) = r {
                    error!("Failed to wait for interrupt: {}", e);
                }
                info!("interrupted");
            }
            _ = term.recv() => info!("terminated"),
        }
        self.shutdown().await;
        Ok(())
    }
}
