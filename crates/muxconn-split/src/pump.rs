//! Receive pump: the single reader of the physical connection.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use muxconn_frame::{FrameConfig, FrameReader};

use crate::error::ProtocolViolation;
use crate::queue::{Delivery, StreamEnd};
use crate::session::Demux;

const PUMP_THREAD_NAME: &str = "muxconn-pump";

pub(crate) fn spawn<R, S>(
    reader: R,
    session: Arc<S>,
    max_frame_size: usize,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    S: Demux + 'static,
{
    let frames = FrameReader::with_config(
        reader,
        FrameConfig {
            max_payload_size: max_frame_size,
        },
    );
    thread::Builder::new()
        .name(PUMP_THREAD_NAME.to_string())
        .spawn(move || run(frames, &*session))
}

fn run<R: Read, S: Demux + ?Sized>(mut frames: FrameReader<R>, session: &S) {
    let inbound = session.inbound();
    let channels = inbound.channels();
    tracing::debug!(channels, "receive pump started");

    loop {
        let frame = match frames.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                if session.closed_locally() {
                    tracing::debug!("source released locally");
                } else if err.is_closed() {
                    tracing::debug!(error = %err, "physical connection closed by peer");
                } else {
                    tracing::warn!(error = %err, "undecodable frame stream; ending all channels");
                }
                inbound.finish_all(StreamEnd::Eof);
                break;
            }
        };

        let Some(queue) = inbound.queue(frame.channel) else {
            session.fail(ProtocolViolation {
                channel: frame.channel,
                channels,
            });
            break;
        };
        if session.closed_locally() {
            tracing::debug!("every channel closed locally; releasing source");
            inbound.finish_all(StreamEnd::Eof);
            break;
        }

        tracing::trace!(
            channel = frame.channel,
            len = frame.payload.len(),
            "frame received"
        );
        if frame.payload.is_empty() {
            continue;
        }
        if queue.push(frame.payload) == Delivery::Discarded {
            tracing::warn!(
                channel = frame.channel,
                "payload discarded for locally closed connection"
            );
        }
    }

    tracing::debug!(channels, "receive pump stopped");
}
