use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use muxconn_frame::MAX_FRAME_PAYLOAD;
use muxconn_split::MuxConfig;
use muxconn_transport::Address;

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and echo every channel back on itself.
    Echo(EchoArgs),
    /// Connect, split and send a payload on one channel.
    Send(SendArgs),
    /// Accept one connection and print what arrives on every channel.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that splits a connection.
#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Number of logical connections. Must match the peer.
    #[arg(long, short = 'n', env = "MUXCONN_CHANNELS")]
    pub channels: usize,
    /// Buffer up to CAP received bytes per channel instead of relaying.
    #[arg(long, value_name = "CAP", env = "MUXCONN_BUFFER")]
    pub buffer: Option<usize>,
    /// Maximum frame payload in bytes. Must match the peer.
    #[arg(long, value_name = "BYTES", env = "MUXCONN_MAX_FRAME", default_value_t = MAX_FRAME_PAYLOAD)]
    pub max_frame: usize,
}

impl SplitArgs {
    pub fn mux_config(&self) -> MuxConfig {
        let config = match self.buffer {
            Some(capacity) => MuxConfig::buffered(capacity),
            None => MuxConfig::relay(),
        };
        config
            .with_max_frame_size(self.max_frame)
            .with_fatal_hook(|violation| {
                tracing::error!(%violation, "peer broke the framing protocol");
            })
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (tcp://host:port, unix:///path, host:port or /path).
    pub address: Address,
    #[command(flatten)]
    pub split: SplitArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub address: Address,
    /// Channel to send on.
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u32,
    #[command(flatten)]
    pub split: SplitArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Read the payload back from the same channel and print it.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind.
    pub address: Address,
    #[command(flatten)]
    pub split: SplitArgs,
    /// Exit after printing N chunks.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
