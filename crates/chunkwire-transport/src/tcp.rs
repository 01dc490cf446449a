use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 10000;

/// Maximum number of queued, not yet accepted connections.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 5;

/// A bound, listening TCP socket.
///
/// The listening socket is closed when this value is dropped.
pub struct TcpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    accept_timeout: Option<Duration>,
}

impl TcpServer {
    /// Bind to `addr` and start listening.
    ///
    /// The socket may re-bind immediately after a previous server on the same
    /// port went away. `backlog` caps the queue of pending connections and
    /// `timeout` bounds every [`accept`](Self::accept) call; `None` blocks.
    pub fn bind_and_listen(addr: &str, backlog: u32, timeout: Option<Duration>) -> Result<Self> {
        debug!(addr, backlog, "bind_and_listen");
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        set_listen_backlog(&listener, backlog).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
            accept_timeout: timeout,
        })
    }

    /// Accept an incoming connection.
    ///
    /// Blocks for at most the accept timeout given at bind time.
    pub fn accept(&self) -> Result<(Connection, SocketAddr)> {
        let (stream, peer) = match self.accept_timeout {
            Some(timeout) => self
                .accept_within(timeout)?
                .ok_or(TransportError::Timeout(timeout))?,
            None => self.accept_blocking()?,
        };
        debug!(%peer, "accept");
        Ok((Connection::from_tcp(stream, peer), peer))
    }

    /// The address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Timeout applied to each accept call.
    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout
    }

    /// Change the timeout applied to subsequent accept calls.
    pub fn set_accept_timeout(&mut self, timeout: Option<Duration>) {
        self.accept_timeout = timeout;
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }

    fn accept_blocking(&self) -> Result<(TcpStream, SocketAddr)> {
        loop {
            match self.listener.accept() {
                Ok(accepted) => return Ok(accepted),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    #[cfg(unix)]
    fn accept_within(&self, timeout: Duration) -> Result<Option<(TcpStream, SocketAddr)>> {
        use std::os::fd::AsRawFd;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut pfd = libc::pollfd {
                fd: self.listener.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = remaining.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

            // SAFETY: `pfd` is a valid, writable pollfd and the count passed is 1.
            // The descriptor belongs to `self.listener`, which outlives this call.
            let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(TransportError::Accept(err));
            }
            if rc == 0 {
                return Ok(None);
            }
            // The pending connection may be gone by now; poll again.
            if let Some(accepted) = self.try_accept()? {
                return Ok(Some(accepted));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    #[cfg(not(unix))]
    fn accept_within(&self, timeout: Duration) -> Result<Option<(TcpStream, SocketAddr)>> {
        // No poll(2) here: probe until the deadline.
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(accepted) = self.try_accept()? {
                return Ok(Some(accepted));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            std::thread::sleep(remaining.min(Duration::from_millis(10)));
        }
    }

    /// Accept one pending connection without blocking.
    ///
    /// Returns `None` when the queue is empty or the pending connection was
    /// aborted before it could be taken.
    fn try_accept(&self) -> Result<Option<(TcpStream, SocketAddr)>> {
        self.listener.set_nonblocking(true)?;
        let outcome = loop {
            match self.listener.accept() {
                Ok(accepted) => break Ok(Some(accepted)),
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::WouldBlock | ErrorKind::ConnectionAborted
                    ) =>
                {
                    break Ok(None)
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(TransportError::Accept(err)),
            }
        };
        self.listener.set_nonblocking(false)?;

        let accepted = outcome?;
        if let Some((stream, _)) = &accepted {
            stream.set_nonblocking(false)?;
        }
        Ok(accepted)
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("local_addr", &self.local_addr)
            .field("accept_timeout", &self.accept_timeout)
            .finish()
    }
}

/// Connect to a listening TCP server.
///
/// Every address `addr` resolves to is tried in order. `timeout` bounds each
/// connect attempt and becomes the connection's initial read and write
/// timeout; `None` blocks.
pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<Connection> {
    debug!(addr, "connect");
    let candidates = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
        addr: addr.to_string(),
        source: e,
    })?;

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)?;
                debug!(peer = %candidate, "connected to tcp socket");
                return Ok(Connection::from_tcp(stream, candidate));
            }
            Err(err) => {
                debug!(peer = %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(source) => {
            tracing::error!(addr, error = %source, "connection attempt failed");
            Err(TransportError::Connect {
                addr: addr.to_string(),
                source,
            })
        }
        None => Err(TransportError::Resolve {
            addr: addr.to_string(),
        }),
    }
}

#[cfg(unix)]
fn set_listen_backlog(listener: &TcpListener, backlog: u32) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let backlog = backlog.min(libc::c_int::MAX as u32) as libc::c_int;
    // SAFETY: the descriptor is an open, bound, listening TCP socket owned by
    // `listener`. Calling listen(2) again only updates the queue length.
    let rc = unsafe { libc::listen(listener.as_raw_fd(), backlog) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn set_listen_backlog(_listener: &TcpListener, backlog: u32) -> std::io::Result<()> {
    debug!(backlog, "listen backlog not adjustable on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::traits::StreamTimeouts;

    #[test]
    fn test_bind_accept_connect() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", DEFAULT_LISTEN_BACKLOG, None).unwrap();
        let addr = server.local_addr().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = connect(&addr, Some(Duration::from_secs(5))).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut conn, peer) = server.accept().unwrap();
        assert_eq!(conn.peer_addr(), peer);
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_accept_times_out() {
        let server =
            TcpServer::bind_and_listen("127.0.0.1:0", 1, Some(Duration::from_millis(50))).unwrap();

        let start = Instant::now();
        let result = server.accept();
        assert!(matches!(result, Err(TransportError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_accept_with_timeout_when_client_pending() {
        let server =
            TcpServer::bind_and_listen("127.0.0.1:0", 1, Some(Duration::from_secs(5))).unwrap();
        let _client = connect(&server.local_addr().to_string(), None).unwrap();

        let (conn, _) = server.accept().unwrap();
        assert_eq!(conn.local_addr().unwrap(), server.local_addr());
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop so the port is known to be closed.
        let port = {
            let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
            server.local_addr().port()
        };
        let result = connect(&format!("127.0.0.1:{port}"), Some(Duration::from_secs(1)));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_invalid_address() {
        let result = TcpServer::bind_and_listen("not-an-address", 1, None);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_connect_applies_timeouts() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        let client = connect(&server.local_addr().to_string(), Some(Duration::from_secs(2))).unwrap();

        // The kernel rounds socket timeouts to its tick.
        let applied = StreamTimeouts::read_timeout(&client).unwrap().unwrap();
        assert!(applied >= Duration::from_secs(2), "{applied:?}");
        assert!(applied < Duration::from_millis(2100), "{applied:?}");
    }

    #[test]
    fn test_shutdown_signals_eof_to_peer() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        let client = connect(&server.local_addr().to_string(), None).unwrap();
        let (mut conn, _) = server.accept().unwrap();

        client.shutdown().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(conn.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_set_accept_timeout() {
        let mut server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        assert_eq!(server.accept_timeout(), None);
        server.set_accept_timeout(Some(Duration::from_millis(10)));
        assert!(matches!(server.accept(), Err(TransportError::Timeout(_))));
        assert_eq!(server.transport_name(), "tcp");
    }

    #[test]
    fn test_try_accept_without_pending_connection() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        assert!(server.try_accept().unwrap().is_none());

        let _client = connect(&server.local_addr().to_string(), None).unwrap();
        let (stream, _) = server
            .accept_within(Duration::from_secs(5))
            .unwrap()
            .expect("pending client should be accepted");
        // Accepted streams block normally again.
        assert_eq!(stream.read_timeout().unwrap(), None);
        assert!(server.try_accept().unwrap().is_none());
    }

    #[test]
    fn test_accept_within_survives_repeated_empty_probes() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        assert!(server
            .accept_within(Duration::from_millis(20))
            .unwrap()
            .is_none());

        let addr = server.local_addr().to_string();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            connect(&addr, None).unwrap()
        });
        let accepted = server.accept_within(Duration::from_secs(5)).unwrap();
        assert!(accepted.is_some());
        handle.join().unwrap();
    }
}
