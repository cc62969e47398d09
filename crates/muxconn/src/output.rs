use std::io::{IsTerminal, Write};
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

/// A run of bytes received on one logical connection.
pub struct Chunk<'a> {
    pub channel: u32,
    pub channels: usize,
    pub data: &'a [u8],
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    channel: u32,
    channels: usize,
    size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_chunk(chunk: &Chunk<'_>, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", chunk_json(chunk, peer)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    format!("{}/{}", chunk.channel, chunk.channels),
                    chunk.data.len().to_string(),
                    peer.to_string(),
                    payload_preview(chunk.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={}/{} size={} peer={} payload={}",
                chunk.channel,
                chunk.channels,
                chunk.data.len(),
                peer,
                payload_preview(chunk.data)
            );
        }
        OutputFormat::Raw => print_raw(chunk.data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn chunk_json(chunk: &Chunk<'_>, peer: &str) -> String {
    let out = ChunkOutput {
        channel: chunk.channel,
        channels: chunk.channels,
        size: chunk.data.len(),
        payload: payload_preview(chunk.data),
        peer,
        timestamp: now_unix_seconds(),
    };
    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_carries_channel_and_payload() {
        let chunk = Chunk {
            channel: 3,
            channels: 4,
            data: b"hello",
        };
        let value: serde_json::Value =
            serde_json::from_str(&chunk_json(&chunk, "tcp://127.0.0.1:9")).unwrap();
        assert_eq!(value["channel"], 3);
        assert_eq!(value["channels"], 4);
        assert_eq!(value["size"], 5);
        assert_eq!(value["payload"], "hello");
        assert_eq!(value["peer"], "tcp://127.0.0.1:9");
    }

    #[test]
    fn binary_payloads_are_summarised() {
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
