//! TCP listener setup shared by the KISS and AGW servers.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::core::{Error, Result};

/// Pending connections the kernel holds for us.
const LISTEN_BACKLOG: i32 = 16;

/// Binds a listener with SO_REUSEADDR so a restarted TNC can take its
/// port back while old connections linger in TIME_WAIT.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| Error::network(format!("Failed to create socket: {}", e)))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::network(format!("Failed to set SO_REUSEADDR: {}", e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::network(format!("Failed to set non-blocking: {}", e)))?;
    socket
        .bind(&addr.into())
        .map_err(|e| Error::network(format!("Failed to bind {}: {}", addr, e)))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| Error::network(format!("Failed to listen on {}: {}", addr, e)))?;
    TcpListener::from_std(socket.into())
        .map_err(|e| Error::network(format!("Failed to register listener: {}", e)))
}

/// Listen on all interfaces.
pub fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::net::TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), client);
        assert!(accepted.is_ok());
        assert!(connected.is_ok());
    }

    #[test]
    fn test_any_addr() {
        assert_eq!(any_addr(8000).to_string(), "0.0.0.0:8000");
    }
}
