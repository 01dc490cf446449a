use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    index: usize,
    size: usize,
    payload: String,
    payload_hex: String,
    peer: String,
    timestamp: &'a str,
}

#[derive(Serialize)]
struct SendOutput<'a> {
    peer: String,
    framing: &'a str,
    messages: usize,
    bytes_sent: usize,
}

pub fn print_message(message: &[u8], index: usize, peer: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let timestamp = now_unix_seconds();
            let out = MessageOutput {
                index,
                size: message.len(),
                payload: payload_preview(message),
                payload_hex: hex::encode(message),
                peer: peer.to_string(),
                timestamp: &timestamp,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    message.len().to_string(),
                    peer.to_string(),
                    payload_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} size={} peer={} payload={}",
                index,
                message.len(),
                peer,
                payload_preview(message)
            );
        }
        OutputFormat::Raw => {
            print_raw(message);
        }
    }
}

pub fn print_send_summary(
    peer: SocketAddr,
    framing: &str,
    messages: usize,
    bytes_sent: usize,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                peer: peer.to_string(),
                framing,
                messages,
                bytes_sent,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["PEER", "FRAMING", "MESSAGES", "BYTES"])
                .add_row(vec![
                    peer.to_string(),
                    framing.to_string(),
                    messages.to_string(),
                    bytes_sent.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("sent {messages} message(s), {bytes_sent} bytes to {peer} ({framing})");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// UTF-8 payloads print as text, anything else as escaped bytes.
fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => payload.escape_ascii().to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
