use std::net::SocketAddr;
use std::thread;

use bytes::Bytes;
use chunkwire_frame::{ChunkyStream, FrameConfig, Separator};
use chunkwire_transport::{connect, TcpServer, DEFAULT_LISTEN_BACKLOG};

use crate::cmd::DemoArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// Sample messages, chosen so that separator bytes straddle message
/// boundaries and an empty message is included. The last one ends the run.
pub const DEMO_MESSAGES: [&[u8]; 9] = [
    b"abcdef",
    b"1234",
    b"a",
    b"bc",
    b"de\x00",
    b"\x01\x02\x01\x00fghi",
    b"xyzZYX",
    b"",
    b"+++",
];

const END_OF_STREAM: &[u8] = b"+++";

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.stream.frame_config()?;
    let separator = Separator::demo();

    let server = TcpServer::bind_and_listen("127.0.0.1:0", DEFAULT_LISTEN_BACKLOG, config.read_timeout)
        .map_err(|err| transport_error("bind failed", err))?;
    let addr = server.local_addr();

    let server_thread = {
        let config = config.clone();
        let separator = separator.clone();
        thread::spawn(move || serve(&server, config, &separator))
    };
    let client_thread = {
        let separator = separator.clone();
        thread::spawn(move || send_all(addr, config, &separator))
    };

    let sent = join(client_thread, "client")?;
    let (peer, received) = join(server_thread, "server")?;

    for (index, message) in received.iter().enumerate() {
        print_message(message, index, peer, format);
    }

    let received: Vec<&[u8]> = received.iter().map(|m| m.as_ref()).collect();
    if received != DEMO_MESSAGES {
        tracing::error!(
            expected = DEMO_MESSAGES.len(),
            received = received.len(),
            "received messages differ from sent messages"
        );
        return Ok(FAILURE);
    }

    tracing::info!(messages = received.len(), bytes = sent, "demo complete");
    Ok(SUCCESS)
}

fn serve(
    server: &TcpServer,
    config: FrameConfig,
    separator: &Separator,
) -> CliResult<(SocketAddr, Vec<Bytes>)> {
    tracing::info!("server running");
    let (conn, peer) = server
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    tracing::debug!(%peer, "accepted client");

    let mut stream = ChunkyStream::with_config_timeouts(conn, config)
        .map_err(|err| frame_error("configure connection failed", err))?
        .with_span(tracing::info_span!("server.cs"));

    let mut received = Vec::new();
    loop {
        let message = stream
            .recv_to_separator(separator)
            .map_err(|err| frame_error("receive failed", err))?;
        tracing::info!(message = %message.escape_ascii(), "MSG");
        let done = message.as_ref() == END_OF_STREAM;
        received.push(message);
        if done {
            tracing::debug!("end of stream received");
            break;
        }
    }

    tracing::info!("server closing connection");
    stream
        .close()
        .map_err(|err| frame_error("close failed", err))?;
    Ok((peer, received))
}

fn send_all(addr: SocketAddr, config: FrameConfig, separator: &Separator) -> CliResult<usize> {
    tracing::info!("client running");
    let conn = connect(&addr.to_string(), config.write_timeout)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut stream = ChunkyStream::with_config_timeouts(conn, config)
        .map_err(|err| frame_error("configure connection failed", err))?
        .with_span(tracing::info_span!("client.socket"));

    let mut sent = 0usize;
    for message in DEMO_MESSAGES {
        let wire = separator.terminate(message);
        sent += stream.send(&wire).map_err(|err| {
            tracing::error!(bytes = wire.len(), error = %err, "send failed, client terminating");
            frame_error("send failed", err)
        })?;
    }
    Ok(sent)
}

fn join<T>(handle: thread::JoinHandle<CliResult<T>>, role: &str) -> CliResult<T> {
    handle
        .join()
        .map_err(|_| CliError::new(INTERNAL, format!("{role} thread panicked")))?
}
