use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use muxconn_split::{split_with_config, MuxConn};
use muxconn_transport::{Listener, Stream};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{io_error, mux_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_chunk, Chunk, OutputFormat};

const READ_CHUNK_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

enum Event {
    Data { channel: u32, data: Vec<u8> },
    Failed { channel: u32, error: std::io::Error },
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = args.split.channels;
    let config = args.split.mux_config();
    let listener =
        Listener::bind(&args.address).map_err(|err| transport_error("bind failed", err))?;
    if let Ok(local) = listener.local_endpoint() {
        tracing::info!(%local, channels, "waiting for a connection");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let Some(stream) = listener
        .accept_while(|| running.load(Ordering::SeqCst), POLL_INTERVAL)
        .map_err(|err| transport_error("accept failed", err))?
    else {
        tracing::info!("interrupted before a peer connected");
        return Ok(SUCCESS);
    };
    let conns = Arc::new(
        split_with_config(stream, channels, config)
            .map_err(|err| mux_error("split failed", err))?,
    );
    let peer = conns
        .first()
        .map(|conn| conn.peer_addr().to_string())
        .unwrap_or_default();
    tracing::info!(%peer, "peer connected");

    let (tx, rx) = mpsc::channel();
    for index in 0..conns.len() {
        let conns = Arc::clone(&conns);
        let tx = tx.clone();
        thread::spawn(move || read_channel(&conns[index], &tx));
    }
    drop(tx);

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match event {
            Event::Data { channel, data } => {
                print_chunk(
                    &Chunk {
                        channel,
                        channels,
                        data: &data,
                    },
                    &peer,
                    format,
                );
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Event::Failed { channel, error } => {
                return Err(io_error(&format!("receive on channel {channel} failed"), error));
            }
        }
    }

    Ok(SUCCESS)
}

fn read_channel(conn: &MuxConn<Stream>, tx: &mpsc::Sender<Event>) {
    let channel = conn.channel();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let event = match conn.recv(&mut buf) {
            Ok(0) => break,
            Ok(n) => Event::Data {
                channel,
                data: buf[..n].to_vec(),
            },
            Err(error) => Event::Failed { channel, error },
        };
        let failed = matches!(event, Event::Failed { .. });
        if tx.send(event).is_err() || failed {
            break;
        }
    }
    tracing::debug!(channel, "channel ended");
}
