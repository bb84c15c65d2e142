//! KISS over TCP
//!
//! Any number of listeners, each with its own port and optionally pinned
//! to one radio channel. Each accepts a limited number of clients.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio_util::codec::FramedRead;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::core::{Error, Result};
use crate::router::{write_stream, Transport};
use crate::util::net::bind_listener;

use super::frame::KissCodec;
use super::session::{KissContext, KissSession};

/// One listening port.
pub struct KissTcpServer {
    listener: TcpListener,
    /// Port clients see this listener as
    port: u16,
    /// Radio channel this listener is restricted to
    pin: Option<usize>,
    ctx: Arc<KissContext>,
    slots: Arc<Semaphore>,
}

impl KissTcpServer {
    /// Binds the listening socket.
    pub fn bind(addr: SocketAddr, pin: Option<usize>, max_clients: usize, ctx: Arc<KissContext>) -> Result<Self> {
        let listener = bind_listener(addr)?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))?
            .port();
        match pin {
            Some(chan) => info!(port, chan, max_clients, "Ready to accept KISS TCP client applications, single channel"),
            None => info!(port, max_clients, "Ready to accept KISS TCP client applications"),
        }
        Ok(KissTcpServer { listener, port, pin, ctx, slots: Arc::new(Semaphore::new(max_clients)) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    /// Accepts clients until shutdown.
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
                    info!(port = self.port, %peer, "Connected to KISS client application");
                    let ctx = Arc::clone(&self.ctx);
                    let transport = Transport::KissTcp { port: self.port };
                    let (pin, shutdown, t) = (self.pin, shutdown.clone(), tracker.clone());
                    let port = self.port;
                    tracker.spawn(async move {
                        serve_client(stream, transport, pin, ctx, shutdown, t).await;
                        drop(permit);
                        info!(port, %peer, "KISS client application disconnected");
                    });
                }
                Err(e) => error!(port = self.port, "Failed to accept KISS client: {}", e),
            }
        }
        info!(port = self.port, "KISS TCP listener stopped accepting");
    }
}

async fn serve_client(
    stream: TcpStream,
    transport: Transport,
    pin: Option<usize>,
    ctx: Arc<KissContext>,
    mut shutdown: watch::Receiver<bool>,
    tracker: TaskTracker,
) {
    let sub = ctx.subs().subscribe(transport, pin);
    let id = sub.id;
    let session = KissSession::new(id, transport, pin);
    let (rd, wr) = stream.into_split();
    tracker.spawn(write_stream(wr, sub.rx));

    let mut items = FramedRead::new(rd, KissCodec::new());
    loop {
        let next = tokio::select! {
            n = items.next() => n,
            _ = shutdown.changed() => break,
        };
        match next {
            Some(Ok(item)) => ctx.handle(&session, item),
            Some(Err(e)) => {
                error!(client = id, "Error receiving from KISS client application: {}", e);
                break;
            }
            None => break,
        }
    }
    ctx.subs().unsubscribe(id);
}
