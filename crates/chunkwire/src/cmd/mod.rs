use std::path::PathBuf;
use std::time::Duration;

use chunkwire_frame::{FrameConfig, Separator, DEFAULT_READ_CHUNK_SIZE};
use chunkwire_transport::DEFAULT_LISTEN_BACKLOG;
use clap::{Args, Subcommand};

use crate::exit::{frame_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and print every received message.
    Listen(ListenArgs),
    /// Connect and send one or more messages.
    Send(SendArgs),
    /// Run an in-process server and client exchanging the sample messages.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How messages are delimited on the wire.
#[derive(Args, Debug, Clone)]
pub struct FramingArgs {
    /// Message separator as hex bytes.
    #[arg(long, value_name = "HEX", default_value = "0001020100")]
    pub separator: String,
    /// Use fixed-length messages of N bytes instead of a separator.
    #[arg(long, value_name = "N", conflicts_with = "separator")]
    pub length: Option<usize>,
}

/// Resolved framing rule.
#[derive(Debug, Clone)]
pub enum Framing {
    Separator(Separator),
    Length(usize),
}

impl FramingArgs {
    pub fn resolve(&self) -> CliResult<Framing> {
        match self.length {
            Some(0) => Err(CliError::new(USAGE, "--length must be greater than zero")),
            Some(length) => Ok(Framing::Length(length)),
            None => Separator::from_hex(&self.separator)
                .map(Framing::Separator)
                .map_err(|err| frame_error("invalid --separator", err)),
        }
    }
}

impl Framing {
    pub fn describe(&self) -> String {
        match self {
            Framing::Separator(sep) => format!("separator {sep}"),
            Framing::Length(length) => format!("length {length}"),
        }
    }
}

/// Stream tuning shared by every command that opens a connection.
#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Per-operation timeout (e.g. 5s, 500ms). 0 blocks indefinitely. `listen`
    /// keeps waiting on idle clients instead of failing.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Maximum bytes requested per socket read.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_READ_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Leading message bytes to include in debug logs.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub preview_bytes: usize,
    /// Log every socket read at trace level.
    #[arg(long)]
    pub trace_chunks: bool,
}

impl StreamArgs {
    pub fn timeout(&self) -> CliResult<Option<Duration>> {
        parse_timeout(&self.timeout)
    }

    pub fn frame_config(&self) -> CliResult<FrameConfig> {
        let timeout = self.timeout()?;
        let config = FrameConfig {
            read_chunk_size: self.chunk_size,
            read_timeout: timeout,
            write_timeout: timeout,
            log_preview_bytes: self.preview_bytes,
            trace_chunks: self.trace_chunks,
        };
        config
            .validate()
            .map_err(|err| frame_error("invalid stream options", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    #[arg(default_value = "127.0.0.1:10000")]
    pub addr: String,
    #[command(flatten)]
    pub framing: FramingArgs,
    #[command(flatten)]
    pub stream: StreamArgs,
    /// Maximum number of queued connections.
    #[arg(long, default_value_t = DEFAULT_LISTEN_BACKLOG)]
    pub backlog: u32,
    /// Give up when no client connects within this time. Default: wait forever.
    #[arg(long)]
    pub accept_timeout: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after receiving this message.
    #[arg(long, default_value = "+++")]
    pub stop: String,
    /// Do not treat any message as a stop marker.
    #[arg(long, conflicts_with = "stop")]
    pub no_stop: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    #[arg(default_value = "127.0.0.1:10000")]
    pub addr: String,
    #[command(flatten)]
    pub framing: FramingArgs,
    #[command(flatten)]
    pub stream: StreamArgs,
    /// Message to send; repeat for several messages.
    #[arg(long, short = 'd', conflicts_with = "file")]
    pub data: Vec<String>,
    /// Send the contents of a file as one message.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub stream: StreamArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds. Zero means no timeout.
pub fn parse_timeout(input: &str) -> CliResult<Option<Duration>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(match (value, millis) {
        (0, _) => None,
        (value, true) => Some(Duration::from_millis(value)),
        (value, false) => Some(Duration::from_secs(value)),
    })
}
