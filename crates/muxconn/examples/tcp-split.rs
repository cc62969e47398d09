//! Split one TCP connection into a request channel and a bulk channel.
//!
//! Run with:
//!   cargo run --example tcp-split

use std::io::{Read, Write};
use std::thread;

use muxconn::transport::{connect, Address, Endpoint, Listener};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind(&"tcp://127.0.0.1:0".parse()?)?;
    let Endpoint::Tcp(bound) = listener.local_endpoint()? else {
        return Err("expected a tcp endpoint".into());
    };

    let server = thread::spawn(
        move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let stream = listener.accept()?;
            let conns = muxconn::split_buffered(stream, 2, 64 * 1024)?;
            eprintln!("[server] peer connected: {}", conns[0].peer_addr());

            thread::scope(|scope| {
                for conn in &conns {
                    scope.spawn(move || {
                        let mut reader = conn;
                        let mut writer = conn;
                        let copied = std::io::copy(&mut reader, &mut writer).unwrap_or(0);
                        eprintln!("[server] channel {} echoed {copied} bytes", conn.channel());
                    });
                }
            });
            Ok(())
        },
    );

    let stream = connect(&Address::Tcp(bound.to_string()))?;
    let conns = muxconn::split_buffered(stream, 2, 64 * 1024)?;
    let (requests, bulk) = (&conns[0], &conns[1]);

    // Push a large transfer on the bulk channel while requests keep flowing.
    let blob = vec![0x5a_u8; 256 * 1024];
    let blob_back = thread::scope(|scope| -> std::io::Result<Vec<u8>> {
        let reader = scope.spawn(|| -> std::io::Result<Vec<u8>> {
            let mut back = vec![0u8; blob.len()];
            (&*bulk).read_exact(&mut back)?;
            Ok(back)
        });
        (&*bulk).write_all(&blob)?;

        (&*requests).write_all(b"{\"action\":\"ping\"}")?;
        let mut reply = [0u8; 17];
        (&*requests).read_exact(&mut reply)?;
        eprintln!("[client] request reply: {}", String::from_utf8_lossy(&reply));

        reader
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("bulk reader panicked")))
    })?;
    eprintln!("[client] bulk transfer intact: {}", blob_back == blob);

    drop(conns);
    server
        .join()
        .map_err(|_| "server thread panicked")?
        .map_err(|err| err.to_string())?;
    Ok(())
}
