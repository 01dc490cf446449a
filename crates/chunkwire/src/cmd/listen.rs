use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chunkwire_frame::{ChunkyStream, FrameError};
use chunkwire_transport::{Connection, TcpServer, TransportError};

use crate::cmd::{parse_timeout, Framing, ListenArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let framing = args.framing.resolve()?;
    let mut config = args.stream.frame_config()?;
    let accept_timeout = match &args.accept_timeout {
        Some(text) => parse_timeout(text)?,
        None => None,
    };
    let stop = (!args.no_stop).then(|| args.stop.as_bytes().to_vec());

    // Blocking calls wake up regularly so Ctrl-C is noticed. An idle peer
    // only costs another read.
    config.read_timeout = Some(
        config
            .read_timeout
            .map_or(SHUTDOWN_POLL_INTERVAL, |t| t.min(SHUTDOWN_POLL_INTERVAL)),
    );

    let server = TcpServer::bind_and_listen(&args.addr, args.backlog, Some(SHUTDOWN_POLL_INTERVAL))
        .map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(addr = %server.local_addr(), framing = %framing.describe(), "server running");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some((conn, peer)) = accept_until(&server, &running, accept_timeout)? else {
            break;
        };

        let mut stream = ChunkyStream::with_config_timeouts(conn, config.clone())
            .map_err(|err| frame_error("configure connection failed", err))?
            .with_span(tracing::info_span!("conn", %peer));

        while running.load(Ordering::SeqCst) {
            let message = match receive(&mut stream, &framing) {
                Ok(message) => message,
                Err(FrameError::ConnectionBroken) => {
                    tracing::info!(%peer, "peer closed connection");
                    break;
                }
                Err(FrameError::Timeout) => {
                    tracing::trace!(%peer, backlog = stream.backlog_len(), "waiting for peer");
                    continue;
                }
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            print_message(&message, printed, peer, format);
            printed = printed.saturating_add(1);

            if stop.as_deref() == Some(message.as_ref()) {
                tracing::debug!(%peer, "stop marker received");
                return close(stream);
            }

            if let Some(count) = args.count {
                if printed >= count {
                    return close(stream);
                }
            }
        }
    }

    tracing::info!("shutting down");
    Ok(SUCCESS)
}

/// How often blocking accepts and reads return to check for shutdown.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wait for the next client. `None` means shutdown was requested first.
/// `limit` bounds the whole wait; `None` waits until shutdown.
fn accept_until(
    server: &TcpServer,
    running: &AtomicBool,
    limit: Option<Duration>,
) -> CliResult<Option<(Connection, SocketAddr)>> {
    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        match server.accept() {
            Ok(accepted) => return Ok(Some(accepted)),
            Err(TransportError::Timeout(_)) => {
                if let Some(limit) = limit {
                    if started.elapsed() >= limit {
                        return Err(transport_error(
                            "accept failed",
                            TransportError::Timeout(limit),
                        ));
                    }
                }
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        }
    }
    Ok(None)
}

fn receive<T: Read>(stream: &mut ChunkyStream<T>, framing: &Framing) -> Result<Bytes, FrameError> {
    match framing {
        Framing::Separator(separator) => stream.recv_to_separator(separator),
        Framing::Length(length) => stream.recv_exact(*length),
    }
}

fn close(stream: ChunkyStream<Connection>) -> CliResult<i32> {
    stream
        .close()
        .map_err(|err| frame_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chunkwire_frame::Separator;

    use super::*;

    #[test]
    fn receive_follows_framing_rule() {
        let sep = Separator::new(&b";"[..]).unwrap();
        let mut stream = ChunkyStream::new(Cursor::new(b"ab;cdef".to_vec()));

        let first = receive(&mut stream, &Framing::Separator(sep)).unwrap();
        assert_eq!(first.as_ref(), b"ab");

        let second = receive(&mut stream, &Framing::Length(4)).unwrap();
        assert_eq!(second.as_ref(), b"cdef");

        let err = receive(&mut stream, &Framing::Length(1)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionBroken));
    }

    #[test]
    fn accept_until_honours_limit() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, Some(SHUTDOWN_POLL_INTERVAL)).unwrap();
        let running = AtomicBool::new(true);

        let started = Instant::now();
        let err = accept_until(&server, &running, Some(Duration::from_millis(300))).unwrap_err();
        assert_eq!(err.code, crate::exit::TIMEOUT);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn accept_until_stops_when_shutdown_requested() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, Some(SHUTDOWN_POLL_INTERVAL)).unwrap();
        let running = AtomicBool::new(false);
        assert!(accept_until(&server, &running, None).unwrap().is_none());
    }

    #[test]
    fn accept_until_returns_pending_client() {
        let server = TcpServer::bind_and_listen("127.0.0.1:0", 1, Some(SHUTDOWN_POLL_INTERVAL)).unwrap();
        let running = AtomicBool::new(true);
        let _client = chunkwire_transport::connect(&server.local_addr().to_string(), None).unwrap();

        let (_, peer) = accept_until(&server, &running, None).unwrap().unwrap();
        assert_eq!(peer.ip(), server.local_addr().ip());
    }
}
