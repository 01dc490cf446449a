mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "chunkwire", version, about = "Framed messages over TCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "chunkwire",
            "send",
            "127.0.0.1:10000",
            "--data",
            "hello",
            "--data",
            "world",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => assert_eq!(args.data, vec!["hello", "world"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_framing_args() {
        let err = Cli::try_parse_from([
            "chunkwire",
            "listen",
            "--separator",
            "0a",
            "--length",
            "4",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "chunkwire",
            "send",
            "--data",
            "x",
            "--file",
            "/tmp/payload.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_defaults() {
        let cli = Cli::try_parse_from(["chunkwire", "listen"]).expect("listen args should parse");
        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.addr, "127.0.0.1:10000");
                assert_eq!(args.framing.separator, "0001020100");
                assert_eq!(args.stop, "+++");
                assert_eq!(args.backlog, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["chunkwire", "demo", "--format", "json", "--log-level", "debug"])
            .expect("demo args should parse");
        assert!(matches!(cli.command, Command::Demo(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
