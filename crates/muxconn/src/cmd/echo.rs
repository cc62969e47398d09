use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use muxconn_split::{split_with_config, MuxConfig, MuxConn};
use muxconn_transport::{Connection, Listener, Stream};

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{mux_error, transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = args.split.mux_config();
    let channels = args.split.channels;
    let listener =
        Listener::bind(&args.address).map_err(|err| transport_error("bind failed", err))?;
    if let Ok(local) = listener.local_endpoint() {
        tracing::info!(%local, channels, "echo server listening");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while let Some(stream) = listener
        .accept_while(|| running.load(Ordering::SeqCst), ACCEPT_POLL)
        .map_err(|err| transport_error("accept failed", err))?
    {
        let config = config.clone();
        thread::spawn(move || {
            if let Err(err) = serve(stream, channels, config) {
                tracing::warn!(error = %err, "echo session failed");
            }
        });
    }

    tracing::info!("echo server stopped");
    Ok(SUCCESS)
}

fn serve(stream: Stream, channels: usize, config: MuxConfig) -> CliResult<()> {
    let peer = stream
        .remote_endpoint()
        .map(|endpoint| endpoint.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let conns = split_with_config(stream, channels, config)
        .map_err(|err| mux_error("split failed", err))?;
    tracing::info!(%peer, channels, "peer connected");

    thread::scope(|scope| {
        for conn in &conns {
            scope.spawn(move || echo_channel(conn));
        }
    });

    tracing::info!(%peer, "peer disconnected");
    Ok(())
}

/// Copy everything received on `conn` back onto it until end-of-stream.
fn echo_channel<C: Connection>(conn: &MuxConn<C>) {
    let mut reader = conn;
    let mut writer = conn;
    match io::copy(&mut reader, &mut writer) {
        Ok(bytes) => tracing::debug!(channel = conn.channel(), bytes, "channel drained"),
        Err(err) => tracing::warn!(channel = conn.channel(), error = %err, "echo failed"),
    }
    if let Err(err) = conn.close() {
        tracing::warn!(channel = conn.channel(), error = %err, "close failed");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use muxconn_split::split;

    use super::*;

    #[test]
    fn echoes_each_channel_independently() {
        let (client, server) = UnixStream::pair().unwrap();
        let server_conns = split(server, 3).unwrap();
        let client_conns = split(client, 3).unwrap();

        thread::scope(|scope| {
            for conn in &server_conns {
                scope.spawn(move || echo_channel(conn));
            }

            for conn in &client_conns {
                let msg = format!("echo-{}", conn.channel());
                (&*conn).write_all(msg.as_bytes()).unwrap();
                let mut buf = vec![0u8; msg.len()];
                (&*conn).read_exact(&mut buf).unwrap();
                assert_eq!(buf, msg.as_bytes());
            }

            for conn in &client_conns {
                conn.close().unwrap();
            }
        });
    }
}
