use std::fs;

use chunkwire_frame::{find_separator, ChunkyStream};
use chunkwire_transport::connect;

use crate::cmd::{Framing, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_send_summary, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let framing = args.framing.resolve()?;
    let config = args.stream.frame_config()?;
    let payloads = resolve_payloads(&args)?;
    let wire = frame_payloads(&payloads, &framing)?;

    let conn = connect(&args.addr, args.stream.timeout()?)
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = conn.peer_addr();
    let mut stream = ChunkyStream::with_config_timeouts(conn, config)
        .map_err(|err| frame_error("configure connection failed", err))?
        .with_span(tracing::info_span!("client", %peer));

    let mut bytes_sent = 0usize;
    for message in &wire {
        bytes_sent += stream
            .send(message)
            .map_err(|err| frame_error("send failed", err))?;
    }
    stream
        .close()
        .map_err(|err| frame_error("close failed", err))?;

    print_send_summary(peer, &framing.describe(), wire.len(), bytes_sent, format);
    Ok(SUCCESS)
}

fn resolve_payloads(args: &SendArgs) -> CliResult<Vec<Vec<u8>>> {
    if let Some(path) = &args.file {
        let contents = fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return Ok(vec![contents]);
    }
    if args.data.is_empty() {
        return Err(CliError::new(USAGE, "nothing to send: pass --data or --file"));
    }
    Ok(args.data.iter().map(|d| d.as_bytes().to_vec()).collect())
}

/// Apply the framing rule to each payload, refusing payloads the receiver
/// could not delimit correctly.
fn frame_payloads(payloads: &[Vec<u8>], framing: &Framing) -> CliResult<Vec<Vec<u8>>> {
    payloads
        .iter()
        .enumerate()
        .map(|(index, payload)| match framing {
            Framing::Separator(sep) => {
                if find_separator(payload, sep.as_bytes(), 0).is_some() {
                    return Err(CliError::new(
                        DATA_INVALID,
                        format!("message {index} contains the separator {sep}"),
                    ));
                }
                Ok(sep.terminate(payload))
            }
            Framing::Length(length) => {
                if payload.len() != *length {
                    return Err(CliError::new(
                        DATA_INVALID,
                        format!(
                            "message {index} is {} bytes but --length is {length}",
                            payload.len()
                        ),
                    ));
                }
                Ok(payload.clone())
            }
        })
        .collect()
}
