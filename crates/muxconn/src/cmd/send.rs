use std::fs;
use std::io::{Read, Write};

use muxconn_split::split_with_config;
use muxconn_transport::connect;

use crate::cmd::SendArgs;
use crate::exit::{io_error, mux_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_chunk, Chunk, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = args.split.channels;
    let index = channel_index(args.channel, channels)?;
    let payload = resolve_payload(&args)?;

    let stream = connect(&args.address).map_err(|err| transport_error("connect failed", err))?;
    let conns = split_with_config(stream, channels, args.split.mux_config())
        .map_err(|err| mux_error("split failed", err))?;
    let conn = &conns[index];

    (&*conn)
        .write_all(&payload)
        .map_err(|err| io_error("send failed", err))?;
    tracing::debug!(channel = args.channel, size = payload.len(), "payload sent");

    if args.wait && !payload.is_empty() {
        let mut reply = vec![0u8; payload.len()];
        (&*conn)
            .read_exact(&mut reply)
            .map_err(|err| io_error("receive failed", err))?;
        print_chunk(
            &Chunk {
                channel: args.channel,
                channels,
                data: &reply,
            },
            &conn.peer_addr().to_string(),
            format,
        );
    }

    Ok(SUCCESS)
}

fn channel_index(channel: u32, channels: usize) -> CliResult<usize> {
    let index = channel as usize;
    if index >= channels {
        return Err(CliError::new(
            USAGE,
            format!("channel {channel} out of range for {channels} channels"),
        ));
    }
    Ok(index)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_must_be_below_count() {
        assert_eq!(channel_index(0, 1).unwrap(), 0);
        assert_eq!(channel_index(3, 4).unwrap(), 3);
        assert_eq!(channel_index(4, 4).unwrap_err().code, USAGE);
    }
}
