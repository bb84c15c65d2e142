//! KISS over a pseudo terminal
//!
//! Applications that only know how to talk to a serial TNC open the
//! slave side. The slave name changes from run to run, so a fixed symlink
//! is pointed at it.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{symlink, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, SpecialCharacterIndices};
use tokio::io::unix::AsyncFd;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::core::{Error, PtyKissConfig, Result};
use crate::router::Transport;

use super::frame::KissCodec;
use super::session::{KissContext, KissSession};

/// Master side of the pseudo terminal plus everything needed to undo it.
pub struct KissPty {
    master: AsyncFd<PtyMaster>,
    /// Held open so the slave does not vanish before an application opens it
    _slave: File,
    slave_name: String,
    symlink: Option<PathBuf>,
    ctx: Arc<KissContext>,
}

fn pty_error(what: &str, e: Errno) -> Error {
    Error::serial(format!("Could not create pseudo terminal for KISS TNC, {} failed: {}", what, e))
}

impl KissPty {
    /// Creates the pseudo terminal in raw mode and, if configured, the
    /// symlink to its slave side. Must be called inside the runtime.
    pub fn open(config: &PtyKissConfig, ctx: Arc<KissContext>) -> Result<Self> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(|e| pty_error("posix_openpt", e))?;
        grantpt(&master).map_err(|e| pty_error("grantpt", e))?;
        unlockpt(&master).map_err(|e| pty_error("unlockpt", e))?;
        let slave_name = ptsname_r(&master).map_err(|e| pty_error("ptsname", e))?;

        let fd = master.as_raw_fd();
        let mut ts = tcgetattr(fd).map_err(|e| pty_error("tcgetattr", e))?;
        cfmakeraw(&mut ts);
        ts.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        ts.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        tcsetattr(fd, SetArg::TCSANOW, &ts).map_err(|e| pty_error("tcsetattr", e))?;

        // Writes must never block when nothing reads the other side.
        let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|e| pty_error("fcntl", e))?;
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(|e| pty_error("fcntl", e))?;

        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(&slave_name)
            .map_err(|e| Error::serial(format!("Can't open {}: {}", slave_name, e)))?;

        let master = AsyncFd::new(master).map_err(|e| Error::serial(format!("Failed to register pseudo terminal: {}", e)))?;
        info!(slave = %slave_name, "Virtual KISS TNC is available");

        let symlink = match &config.symlink {
            Some(link) => {
                let link = PathBuf::from(link);
                let _ = std::fs::remove_file(&link);
                match symlink(&slave_name, &link) {
                    Ok(()) => {
                        info!("Created symlink {} -> {}", link.display(), slave_name);
                        Some(link)
                    }
                    Err(e) => {
                        warn!("Failed to create symlink {}: {}", link.display(), e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(KissPty { master, _slave: slave, slave_name, symlink, ctx })
    }

    /// Name of the slave side, e.g. /dev/pts/3
    pub fn slave_name(&self) -> &str {
        &self.slave_name
    }

    /// Symlink pointing at the slave side, if one was created
    pub fn symlink(&self) -> Option<&Path> {
        self.symlink.as_deref()
    }

    /// Moves bytes in both directions until shutdown or a read error.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let subs = Arc::clone(self.ctx.subs());
        let mut sub = subs.subscribe(Transport::KissPty, None);
        let id = sub.id;
        let session = KissSession::new(id, Transport::KissPty, None);
        let mut codec = KissCodec::new();
        let mut buf = [0u8; 256];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                out = sub.rx.recv() => match out {
                    Some(data) => self.write(&data),
                    None => break,
                },
                ready = self.master.readable() => {
                    let mut guard = match ready {
                        Ok(g) => g,
                        Err(e) => {
                            error!("Pseudo terminal poll failed: {}", e);
                            break;
                        }
                    };
                    let n = match guard.try_io(|m| nix::unistd::read(m.as_raw_fd(), &mut buf).map_err(io::Error::from)) {
                        Ok(Ok(n)) => n,
                        Ok(Err(e)) => {
                            error!("Lost communication with pseudo terminal KISS client application: {}", e);
                            break;
                        }
                        Err(_would_block) => continue,
                    };
                    for &b in &buf[..n] {
                        if let Some(item) = codec.push_byte(b) {
                            self.ctx.handle(&session, item);
                        }
                    }
                }
            }
        }
        subs.unsubscribe(id);
        self.close();
    }

    fn write(&self, data: &Bytes) {
        let fd = self.master.get_ref().as_raw_fd();
        match nix::unistd::write(fd, data) {
            Ok(n) if n == data.len() => {}
            Ok(n) => warn!(written = n, len = data.len(), "Short write to pseudo terminal"),
            Err(Errno::EAGAIN) => {
                info!("KISS pseudo terminal buffer full, frame discarded. Maybe no one is listening");
            }
            Err(e) => error!("Pseudo terminal KISS write failed: {}", e),
        }
    }

    fn close(self) {
        if let Some(link) = &self.symlink {
            if let Err(e) = std::fs::remove_file(link) {
                warn!("Failed to remove symlink {}: {}", link.display(), e);
            }
        }
        info!(slave = %self.slave_name, "Pseudo terminal KISS closed");
    }
}

/// Spawns the pseudo terminal endpoint as a task.
pub fn spawn(
    config: &PtyKissConfig,
    ctx: Arc<KissContext>,
    shutdown: watch::Receiver<bool>,
    tracker: &TaskTracker,
) -> Result<String> {
    let pty = KissPty::open(config, ctx)?;
    let name = pty.slave_name().to_string();
    tracker.spawn(pty.run(shutdown));
    Ok(name)
}
